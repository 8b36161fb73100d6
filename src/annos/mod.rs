//! Annotation of variants from indexed reference datasets.

pub mod annotate;
pub mod annotators;
pub mod bigwig;
pub mod clinvar;
pub mod conf;
pub mod coords;
pub mod fetch;
pub mod list;
pub mod registry;
pub mod tabix;
#[cfg(test)]
pub mod testing;

use self::{
    annotators::{DnaseClusters, EncodeSegInfo, EspInfo, GmsInfo, ThousandGInfo},
    clinvar::ClinvarInfo,
    conf::{AnnoConfig, SourceName},
    registry::Registry,
};

/// Arguments for configuring the annotation sources.
#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory with the annotation files.
    #[arg(long, env = "VARANNO_ANNOTATION_DIR")]
    pub path_annos: String,
    /// Sources to use, all if not given.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub sources: Vec<SourceName>,
    /// Fail if the contigs of a source do not match its naming convention.
    #[arg(long, default_value_t = false)]
    pub strict_contig_naming: bool,
}

impl ConfigArgs {
    pub fn anno_config(&self) -> Result<AnnoConfig, anyhow::Error> {
        let mut conf = AnnoConfig::new(&self.path_annos)?.with_sources(self.sources.clone());
        conf.strict_contig_naming = self.strict_contig_naming;
        Ok(conf)
    }
}

/// A variant to annotate, with 0-based, half-open coordinates.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Variant {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    #[serde(rename = "ref")]
    pub reference: String,
    /// Alternative allele(s), comma-separated.
    #[serde(rename = "alt")]
    pub alternative: String,
}

impl Variant {
    /// The first alternative allele.
    pub fn first_alt(&self) -> &str {
        self.alternative
            .split(',')
            .next()
            .unwrap_or(&self.alternative)
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}:{}",
            self.chrom, self.start, self.end, self.reference, self.alternative
        )
    }
}

/// Handling of per-source data defects.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString, clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum OnError {
    /// Fail the whole run.
    #[default]
    Abort,
    /// Log, leave the source's fields absent and record the message.
    Skip,
}

/// All annotations of one variant.
///
/// Sources that are not registered are left out.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VariantAnnotations {
    #[serde(flatten)]
    pub variant: Variant,
    pub cpg_island: Option<bool>,
    pub cytoband: Option<String>,
    pub dbsnp: Option<String>,
    pub clinvar: Option<ClinvarInfo>,
    pub rmsk: Option<String>,
    pub segdup: Option<bool>,
    pub conserved: Option<bool>,
    pub esp: Option<EspInfo>,
    #[serde(rename = "1000g")]
    pub thousand_genomes: Option<ThousandGInfo>,
    pub recomb_rate: Option<f64>,
    pub gms: Option<GmsInfo>,
    pub grc: Option<String>,
    pub cse: Option<bool>,
    pub encode_tfbs: Option<String>,
    pub encode_dnase1: Option<DnaseClusters>,
    pub encode_consensus_segs: Option<EncodeSegInfo>,
    pub gerp_bp: Option<f64>,
    pub gerp_elements: Option<f64>,
    pub pfam_domain: Option<String>,
    /// Messages of skipped per-source failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Collects the results of the annotators of one variant.
struct Annotating<'a> {
    registry: &'a Registry,
    variant: &'a Variant,
    on_error: OnError,
    errors: Vec<String>,
}

impl<'a> Annotating<'a> {
    fn run<T, F>(&mut self, name: SourceName, f: F) -> Result<Option<T>, anyhow::Error>
    where
        F: FnOnce(&Registry, &Variant) -> Result<T, anyhow::Error>,
    {
        if !self.registry.contains(name) {
            return Ok(None);
        }
        match f(self.registry, self.variant) {
            Ok(value) => Ok(Some(value)),
            Err(e) => match self.on_error {
                OnError::Abort => Err(anyhow::anyhow!(
                    "problem annotating {} with {}: {}",
                    self.variant,
                    name,
                    e
                )),
                OnError::Skip => {
                    tracing::warn!("skipping {} for {}: {}", name, self.variant, e);
                    self.errors.push(format!("{}: {}", name, e));
                    Ok(None)
                }
            },
        }
    }
}

fn presence(name: SourceName) -> impl Fn(&Registry, &Variant) -> Result<bool, anyhow::Error> {
    move |registry, variant| annotators::get_presence(registry, name, variant)
}

/// Run all annotators of the registered sources on `variant`.
pub fn annotate_variant(
    registry: &Registry,
    variant: &Variant,
    on_error: OnError,
) -> Result<VariantAnnotations, anyhow::Error> {
    use annotators::*;

    let mut a = Annotating {
        registry,
        variant,
        on_error,
        errors: Vec::new(),
    };
    Ok(VariantAnnotations {
        variant: variant.clone(),
        cpg_island: a.run(SourceName::CpgIsland, presence(SourceName::CpgIsland))?,
        cytoband: a.run(SourceName::Cytoband, get_cyto_info)?.flatten(),
        dbsnp: a.run(SourceName::Dbsnp, get_dbsnp_info)?.flatten(),
        clinvar: a.run(SourceName::Clinvar, get_clinvar_info)?,
        rmsk: a.run(SourceName::Rmsk, get_rmsk_info)?.flatten(),
        segdup: a.run(SourceName::Segdup, presence(SourceName::Segdup))?,
        conserved: a.run(SourceName::Conserved, presence(SourceName::Conserved))?,
        esp: a.run(SourceName::Esp, get_esp_info)?,
        thousand_genomes: a.run(SourceName::ThousandGenomes, get_1000g_info)?,
        recomb_rate: a.run(SourceName::Recomb, get_recomb_info)?.flatten(),
        gms: a.run(SourceName::Gms, get_gms)?,
        grc: a.run(SourceName::Grc, get_grc)?.flatten(),
        cse: a.run(SourceName::Cse, presence(SourceName::Cse))?,
        encode_tfbs: a.run(SourceName::EncodeTfbs, get_encode_tfbs)?.flatten(),
        encode_dnase1: a.run(SourceName::EncodeDnase1, get_encode_dnase_clusters)?,
        encode_consensus_segs: a.run(SourceName::EncodeConsensusSegs, get_encode_consensus_segs)?,
        gerp_bp: a.run(SourceName::GerpBp, get_gerp_bp)?.flatten(),
        gerp_elements: a.run(SourceName::GerpElements, get_gerp_elements)?.flatten(),
        pfam_domain: a.run(SourceName::PfamDomain, get_pfam_domains)?.flatten(),
        errors: a.errors,
    })
}

#[cfg(test)]
pub mod test {
    use pretty_assertions::assert_eq;

    use super::{annotate_variant, OnError, Variant};
    use crate::annos::{
        conf::{AnnoConfig, SourceName},
        registry::{Handle, RegisteredSource, Registry},
        testing::MemorySource,
    };

    pub fn variant() -> Variant {
        Variant {
            chrom: "chr1".into(),
            start: 149,
            end: 150,
            reference: "A".into(),
            alternative: "G".into(),
        }
    }

    #[test]
    fn first_alt() {
        let mut var = variant();
        assert_eq!(var.first_alt(), "G");
        var.alternative = "T,C".into();
        assert_eq!(var.first_alt(), "T");
        assert_eq!(var.to_string(), "chr1:149-150:A:T,C");
    }

    #[test]
    fn annotate_fixture_sources() -> Result<(), anyhow::Error> {
        let conf = AnnoConfig::new("tests/data/annos")?
            .with_sources(vec![SourceName::Segdup, SourceName::Dbsnp]);
        let registry = Registry::new(conf);
        registry.load()?;

        let result = annotate_variant(&registry, &variant(), OnError::Abort)?;
        assert_eq!(result.segdup, Some(true));
        assert_eq!(result.dbsnp, Some("rs1,rs2".to_string()));
        assert_eq!(result.cytoband, None);
        assert_eq!(result.clinvar, None);
        assert!(result.errors.is_empty());

        let json = serde_json::to_value(&result)?;
        assert_eq!(
            json,
            serde_json::json!({
                "chrom": "chr1",
                "start": 149,
                "end": 150,
                "ref": "A",
                "alt": "G",
                "dbsnp": "rs1,rs2",
                "segdup": true,
            })
        );
        Ok(())
    }

    /// Registry whose `recomb` records have a malformed rate.
    pub fn defect_registry() -> Registry {
        let conf = AnnoConfig::new("/dev/null")
            .expect("invalid path")
            .with_sources(vec![SourceName::Recomb, SourceName::Segdup]);
        let mut sources = conf.annotation_sources().into_iter();
        let recomb = sources.next().expect("no recomb");
        let segdup = sources.next().expect("no segdup");
        Registry::with_handles(
            conf,
            vec![
                RegisteredSource {
                    source: recomb,
                    handle: Handle::Interval(Box::new(MemorySource::new(&["chr1\t0\t1000\tfast"]))),
                },
                RegisteredSource {
                    source: segdup,
                    handle: Handle::Interval(Box::new(MemorySource::new(&["chr1\t0\t1000\tsd"]))),
                },
            ],
        )
    }

    #[test]
    fn data_defect_aborts() {
        let registry = defect_registry();
        let err = annotate_variant(&registry, &variant(), OnError::Abort).unwrap_err();
        assert!(err.to_string().contains("recomb"));
    }

    #[test]
    fn data_defect_skipped() -> Result<(), anyhow::Error> {
        let registry = defect_registry();
        let result = annotate_variant(&registry, &variant(), OnError::Skip)?;
        assert_eq!(result.recomb_rate, None);
        assert_eq!(result.segdup, Some(true));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("recomb: "));
        Ok(())
    }
}
