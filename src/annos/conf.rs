//! Configuration of the annotation sources.

use std::path::{Path, PathBuf};

use strum::IntoEnumIterator;

use super::{coords::Naming, fetch::RecordKind};
use crate::err::RegistryError;

/// The fixed set of known annotation sources.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum SourceName {
    PfamDomain,
    Cytoband,
    Dbsnp,
    Clinvar,
    Gwas,
    Rmsk,
    Segdup,
    Conserved,
    CpgIsland,
    Dgv,
    Esp,
    #[serde(rename = "1000g")]
    #[strum(serialize = "1000g")]
    #[value(name = "1000g")]
    ThousandGenomes,
    Recomb,
    Gms,
    Grc,
    Cse,
    EncodeTfbs,
    EncodeDnase1,
    EncodeConsensusSegs,
    GerpBp,
    GerpElements,
}

impl SourceName {
    /// File name of the source below the annotation directory.
    pub fn file_name(self) -> &'static str {
        match self {
            SourceName::PfamDomain => "hg19.pfam.ucscgenes.bed.gz",
            SourceName::Cytoband => "hg19.cytoband.bed.gz",
            SourceName::Dbsnp => "dbsnp.137.vcf.gz",
            SourceName::Clinvar => "clinvar_20130118.vcf.gz",
            SourceName::Gwas => "hg19.gwas.bed.gz",
            SourceName::Rmsk => "hg19.rmsk.bed.gz",
            SourceName::Segdup => "hg19.segdup.bed.gz",
            SourceName::Conserved => {
                "29way_pi_lods_elements_12mers.chr_specific.fdr_0.1_with_scores.txt.hg19.merged.bed.gz"
            }
            SourceName::CpgIsland => "hg19.CpG.bed.gz",
            SourceName::Dgv => "hg19.dgv.bed.gz",
            SourceName::Esp => "ESP6500SI.all.snps_indels.vcf.gz",
            SourceName::ThousandGenomes => {
                "ALL.wgs.integrated_phase1_v3.20101123.snps_indels_sv.sites.2012Oct12.vcf.gz"
            }
            SourceName::Recomb => "genetic_map_HapMapII_GRCh37.gz",
            SourceName::Gms => "GRCh37-gms-mappability.vcf.gz",
            SourceName::Grc => "GRC_patch_regions.bed.gz",
            SourceName::Cse => "cse-hiseq-8_4-2013-02-20.bed.gz",
            SourceName::EncodeTfbs => "wgEncodeRegTfbsClusteredV2.cell_count.20130213.bed.gz",
            SourceName::EncodeDnase1 => "stam.125cells.dnaseI.hg19.bed.gz",
            SourceName::EncodeConsensusSegs => "encode.6celltypes.consensus.bedg.gz",
            SourceName::GerpBp => "hg19.gerp.bw",
            SourceName::GerpElements => "hg19.gerp.elements.bed.gz",
        }
    }

    /// Contig naming convention the source file uses.
    pub fn naming(self) -> Naming {
        match self {
            SourceName::Dbsnp
            | SourceName::Clinvar
            | SourceName::Esp
            | SourceName::ThousandGenomes
            | SourceName::Gms
            | SourceName::Grc
            | SourceName::Cse => Naming::Grch37,
            _ => Naming::Ucsc,
        }
    }

    /// Shape of the records in the source file.
    pub fn record_kind(self) -> RecordKind {
        match self {
            SourceName::Dbsnp
            | SourceName::Clinvar
            | SourceName::Esp
            | SourceName::ThousandGenomes
            | SourceName::Gms => RecordKind::Vcf,
            SourceName::GerpElements
            | SourceName::EncodeTfbs
            | SourceName::EncodeDnase1
            | SourceName::EncodeConsensusSegs => RecordKind::Tuple,
            SourceName::GerpBp => RecordKind::None,
            _ => RecordKind::Bed,
        }
    }
}

/// How an annotation file is accessed, selected by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum FormatKind {
    /// BGZF-compressed positional file with tabix index (`.gz`).
    IntervalIndexed,
    /// Numeric signal file with interval summaries (`.bw`).
    NumericSummary,
}

impl FormatKind {
    /// Select the format kind from the extension of `path`.
    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Ok(FormatKind::IntervalIndexed),
            Some("bw") => Ok(FormatKind::NumericSummary),
            _ => Err(RegistryError::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

/// Full definition of one configured annotation source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationSource {
    pub name: SourceName,
    pub path: PathBuf,
    pub naming: Naming,
    pub record_kind: RecordKind,
}

impl AnnotationSource {
    pub fn format_kind(&self) -> Result<FormatKind, RegistryError> {
        FormatKind::from_path(&self.path)
    }
}

/// Configuration of the annotation registry.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AnnoConfig {
    /// Directory holding the annotation files.
    pub annotation_dir: PathBuf,
    /// Sources to register; all known sources if empty.
    #[serde(default)]
    pub sources: Vec<SourceName>,
    /// Fail instead of warn if a source's contigs contradict its naming.
    #[serde(default)]
    pub strict_contig_naming: bool,
}

impl AnnoConfig {
    /// Construct for all known sources below `annotation_dir`.
    ///
    /// The directory is expanded with `shellexpand` so `~` and `$VAR` work.
    pub fn new(annotation_dir: &str) -> Result<Self, anyhow::Error> {
        let expanded = shellexpand::full(annotation_dir).map_err(|e| {
            anyhow::anyhow!("could not expand annotation directory {:?}: {}", annotation_dir, e)
        })?;
        Ok(Self {
            annotation_dir: PathBuf::from(expanded.as_ref()),
            sources: Vec::new(),
            strict_contig_naming: false,
        })
    }

    /// Restrict the configuration to `sources` (all if empty).
    pub fn with_sources(mut self, sources: Vec<SourceName>) -> Self {
        self.sources = sources;
        self
    }

    /// The configured sources, sorted by name and de-duplicated.
    pub fn source_names(&self) -> Vec<SourceName> {
        let mut names = if self.sources.is_empty() {
            SourceName::iter().collect::<Vec<_>>()
        } else {
            self.sources.clone()
        };
        names.sort_by_key(|name| name.to_string());
        names.dedup();
        names
    }

    /// Build the full source definitions.
    pub fn annotation_sources(&self) -> Vec<AnnotationSource> {
        self.source_names()
            .into_iter()
            .map(|name| AnnotationSource {
                name,
                path: self.annotation_dir.join(name.file_name()),
                naming: name.naming(),
                record_kind: name.record_kind(),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::{AnnoConfig, FormatKind, SourceName};
    use crate::annos::{coords::Naming, fetch::RecordKind};

    #[rstest::rstest]
    #[case("dbsnp", SourceName::Dbsnp)]
    #[case("1000g", SourceName::ThousandGenomes)]
    #[case("encode_dnase1", SourceName::EncodeDnase1)]
    #[case("gerp_bp", SourceName::GerpBp)]
    fn source_name_from_str(#[case] s: &str, #[case] expected: SourceName) -> Result<(), anyhow::Error> {
        let name: SourceName = s.parse()?;
        assert_eq!(name, expected);
        assert_eq!(name.to_string(), s);
        Ok(())
    }

    #[rstest::rstest]
    #[case("hg19.gerp.bw", Some(FormatKind::NumericSummary))]
    #[case("dbsnp.137.vcf.gz", Some(FormatKind::IntervalIndexed))]
    #[case("notes.txt", None)]
    fn format_kind_from_path(#[case] path: &str, #[case] expected: Option<FormatKind>) {
        assert_eq!(FormatKind::from_path(Path::new(path)).ok(), expected);
    }

    #[test]
    fn sources_sorted_by_name() -> Result<(), anyhow::Error> {
        let conf = AnnoConfig::new("/data/annos")?;
        let names = conf
            .source_names()
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 21);
        assert_eq!(names[0], "1000g");
        Ok(())
    }

    #[test]
    fn annotation_sources_selected() -> Result<(), anyhow::Error> {
        let conf = AnnoConfig::new("/data/annos")?
            .with_sources(vec![SourceName::Segdup, SourceName::Clinvar, SourceName::Segdup]);
        let sources = conf.annotation_sources();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, SourceName::Clinvar);
        assert_eq!(sources[0].naming, Naming::Grch37);
        assert_eq!(sources[0].record_kind, RecordKind::Vcf);
        assert_eq!(
            sources[0].path,
            Path::new("/data/annos/clinvar_20130118.vcf.gz")
        );
        assert_eq!(sources[1].name, SourceName::Segdup);
        assert_eq!(sources[1].naming, Naming::Ucsc);
        Ok(())
    }
}
