//! Per-source annotators.
//!
//! Each annotator fetches the hits of one source for a variant and reduces
//! them with the source's policy (presence, label join, aggregate, strict
//! single match, or first hit).

use super::{
    clinvar::ClinvarInfo,
    conf::SourceName,
    fetch::{AnnotationHit, Hits, InfoMap, VcfHit},
    registry::Registry,
    Variant,
};

fn hits<'a>(registry: &'a Registry, name: SourceName, var: &Variant) -> Result<Hits<'a>, anyhow::Error> {
    registry.fetch(name, &var.chrom, var.start, var.end)
}

/// Whether at least one record of `name` overlaps the variant.
///
/// Used for `cpg_island`, `segdup`, `conserved` and `cse`.
pub fn get_presence(registry: &Registry, name: SourceName, var: &Variant) -> Result<bool, anyhow::Error> {
    match hits(registry, name, var)?.next() {
        Some(hit) => hit.map(|_| true),
        None => Ok(false),
    }
}

/// Names of all overlapping BED records of `name`, in fetch order.
fn bed_names(registry: &Registry, name: SourceName, var: &Variant) -> Result<Vec<String>, anyhow::Error> {
    hits(registry, name, var)?
        .map(|hit| {
            let hit = hit?.into_bed()?;
            Ok(hit.name()?.to_string())
        })
        .collect()
}

fn join_nonempty(values: Vec<String>) -> Option<String> {
    (!values.is_empty()).then(|| values.join(","))
}

/// Comma-separated cytobands, each as contig plus band name.
pub fn get_cyto_info(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    let bands = hits(registry, SourceName::Cytoband, var)?
        .map(|hit| {
            let hit = hit?.into_bed()?;
            Ok(format!("{}{}", &hit.contig, hit.name()?))
        })
        .collect::<Result<Vec<_>, anyhow::Error>>()?;
    Ok(join_nonempty(bands))
}

/// Comma-separated overlapping Pfam-A domains.
pub fn get_pfam_domains(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    Ok(join_nonempty(bed_names(registry, SourceName::PfamDomain, var)?))
}

/// Comma-separated overlapping RepeatMasker repeats.
pub fn get_rmsk_info(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    Ok(join_nonempty(bed_names(registry, SourceName::Rmsk, var)?))
}

/// Sorted, de-duplicated GRC patch regions.
pub fn get_grc(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    let mut regions = bed_names(registry, SourceName::Grc, var)?;
    regions.sort();
    regions.dedup();
    Ok(join_nonempty(regions))
}

/// Minimal GERP score over the variant.
pub fn get_gerp_bp(registry: &Registry, var: &Variant) -> Result<Option<f64>, anyhow::Error> {
    registry.summary(SourceName::GerpBp, &var.chrom, var.start, var.end)
}

/// Reduce conservation element p-values: the single value, or the minimum.
pub fn min_p_value<S: AsRef<str>>(p_values: &[S]) -> Result<Option<f64>, anyhow::Error> {
    p_values
        .iter()
        .map(|p| {
            p.as_ref()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("invalid p-value {:?}: {}", p.as_ref(), e))
        })
        .try_fold(None, |acc: Option<f64>, p| {
            let p = p?;
            Ok(Some(acc.map_or(p, |acc| acc.min(p))))
        })
}

/// P-value of the overlapping GERP elements.
pub fn get_gerp_elements(registry: &Registry, var: &Variant) -> Result<Option<f64>, anyhow::Error> {
    let p_values = hits(registry, SourceName::GerpElements, var)?
        .map(|hit| tuple_field(hit?, 3))
        .collect::<Result<Vec<_>, _>>()?;
    min_p_value(&p_values)
}

/// Mean recombination rate of the overlapping records.
///
/// The rate is stored in the name column; records on `chrY` are skipped.
pub fn get_recomb_info(registry: &Registry, var: &Variant) -> Result<Option<f64>, anyhow::Error> {
    let mut count = 0usize;
    let mut total = 0.0;
    for hit in hits(registry, SourceName::Recomb, var)? {
        let hit = hit?.into_bed()?;
        if hit.contig == "chrY" {
            continue;
        }
        let rate = hit
            .name()?
            .parse::<f64>()
            .map_err(|e| anyhow::anyhow!("invalid recombination rate in {:?}: {}", &hit, e))?;
        count += 1;
        total += rate;
    }
    Ok((count > 0).then(|| total / count as f64))
}

/// Comma-separated dbSNP identifiers of all overlapping records.
pub fn get_dbsnp_info(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    let ids = hits(registry, SourceName::Dbsnp, var)?
        .map(|hit| Ok(hit?.into_vcf()?.id))
        .collect::<Result<Vec<_>, anyhow::Error>>()?;
    Ok(join_nonempty(ids))
}

/// The single overlapping VCF record, if it describes the variant's alleles.
///
/// Records on `exclude_contig` are not counted. Zero or several records
/// give `None`, as does one record with different alleles.
pub fn single_allele_match<I>(
    hits: I,
    var: &Variant,
    exclude_contig: Option<&str>,
) -> Result<Option<VcfHit>, anyhow::Error>
where
    I: Iterator<Item = Result<AnnotationHit, anyhow::Error>>,
{
    let mut candidates = Vec::new();
    for hit in hits {
        let hit = hit?.into_vcf()?;
        if Some(hit.contig.as_str()) != exclude_contig {
            candidates.push(hit);
        }
    }
    match candidates.len() {
        1 => {
            let hit = candidates.remove(0);
            if hit.matches_alleles(&var.reference, var.first_alt()) {
                Ok(Some(hit))
            } else {
                tracing::trace!("allele mismatch for {:?} and {:?}", var, &hit);
                Ok(None)
            }
        }
        n => {
            tracing::trace!("{} candidate records for {:?}", n, var);
            Ok(None)
        }
    }
}

/// ClinVar annotation from the single allele-matching record.
pub fn get_clinvar_info(registry: &Registry, var: &Variant) -> Result<ClinvarInfo, anyhow::Error> {
    match single_allele_match(hits(registry, SourceName::Clinvar, var)?, var, None)? {
        Some(hit) => ClinvarInfo::from_info(&hit.info_map()),
        None => Ok(ClinvarInfo::default()),
    }
}

fn parse_info_f64(info: &InfoMap, key: &str) -> Result<Option<f64>, anyhow::Error> {
    info.get(key)
        .and_then(|value| value.as_deref())
        .map(|value| {
            value
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("invalid value {:?} for INFO key {}: {}", value, key, e))
        })
        .transpose()
}

/// Exome Sequencing Project allele frequencies.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EspInfo {
    pub found: bool,
    /// European American alternate allele frequency.
    pub aaf_ea: Option<f64>,
    /// African American alternate allele frequency.
    pub aaf_aa: Option<f64>,
    pub aaf_all: Option<f64>,
    pub exome_chip: Option<bool>,
}

impl EspInfo {
    /// Build from the INFO map of a matching record.
    ///
    /// `MAF` holds percentages for EA, AA and all samples.
    pub fn from_info(info: &InfoMap) -> Result<Self, anyhow::Error> {
        let mut result = Self {
            found: true,
            ..Default::default()
        };
        if let Some(Some(maf)) = info.get("MAF") {
            let values = maf
                .split(',')
                .map(|value| {
                    value
                        .parse::<f64>()
                        .map(|value| value / 100.0)
                        .map_err(|e| anyhow::anyhow!("invalid ESP MAF {:?}: {}", maf, e))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if values.len() < 3 {
                anyhow::bail!("ESP MAF needs three values: {:?}", maf);
            }
            result.aaf_ea = Some(values[0]);
            result.aaf_aa = Some(values[1]);
            result.aaf_all = Some(values[2]);
        }
        result.exome_chip = match info.get("EXOME_CHIP").and_then(|v| v.as_deref()) {
            Some("yes") => Some(true),
            Some("no") => Some(false),
            _ => None,
        };
        Ok(result)
    }
}

pub fn get_esp_info(registry: &Registry, var: &Variant) -> Result<EspInfo, anyhow::Error> {
    match single_allele_match(hits(registry, SourceName::Esp, var)?, var, Some("Y"))? {
        Some(hit) => EspInfo::from_info(&hit.info_map()),
        None => Ok(EspInfo::default()),
    }
}

/// 1000 Genomes phase 1 allele frequencies.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ThousandGInfo {
    pub found: bool,
    pub aaf_all: Option<f64>,
    pub aaf_amr: Option<f64>,
    pub aaf_asn: Option<f64>,
    pub aaf_afr: Option<f64>,
    pub aaf_eur: Option<f64>,
}

impl ThousandGInfo {
    pub fn from_info(info: &InfoMap) -> Result<Self, anyhow::Error> {
        Ok(Self {
            found: true,
            aaf_all: parse_info_f64(info, "AF")?,
            aaf_amr: parse_info_f64(info, "AMR_AF")?,
            aaf_asn: parse_info_f64(info, "ASN_AF")?,
            aaf_afr: parse_info_f64(info, "AFR_AF")?,
            aaf_eur: parse_info_f64(info, "EUR_AF")?,
        })
    }
}

pub fn get_1000g_info(registry: &Registry, var: &Variant) -> Result<ThousandGInfo, anyhow::Error> {
    match single_allele_match(hits(registry, SourceName::ThousandGenomes, var)?, var, None)? {
        Some(hit) => ThousandGInfo::from_info(&hit.info_map()),
        None => Ok(ThousandGInfo::default()),
    }
}

/// Genome mappability scores per sequencing technology.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GmsInfo {
    pub illumina: Option<f64>,
    pub solid: Option<f64>,
    pub iontorrent: Option<f64>,
}

/// Mappability scores from the first overlapping record.
pub fn get_gms(registry: &Registry, var: &Variant) -> Result<GmsInfo, anyhow::Error> {
    match hits(registry, SourceName::Gms, var)?.next() {
        Some(hit) => {
            let info = hit?.into_vcf()?.info_map();
            Ok(GmsInfo {
                illumina: parse_info_f64(&info, "GMS_illumina")?,
                solid: parse_info_f64(&info, "GMS_solid")?,
                iontorrent: parse_info_f64(&info, "GMS_iontorrent")?,
            })
        }
        None => Ok(GmsInfo::default()),
    }
}

fn tuple_field(hit: AnnotationHit, idx: usize) -> Result<String, anyhow::Error> {
    let mut fields = hit.into_tuple()?;
    if idx >= fields.len() {
        anyhow::bail!("record {:?} has no column {}", &fields, idx + 1);
    }
    Ok(fields.swap_remove(idx))
}

/// Comma-separated `<factor>_<cell count>` of all overlapping TFBS clusters.
pub fn get_encode_tfbs(registry: &Registry, var: &Variant) -> Result<Option<String>, anyhow::Error> {
    let factors = hits(registry, SourceName::EncodeTfbs, var)?
        .map(|hit| {
            let fields = hit?.into_tuple()?;
            match (fields.get(3), fields.get(4)) {
                (Some(factor), Some(count)) => Ok(format!("{}_{}", factor, count)),
                _ => anyhow::bail!("TFBS record needs 5 columns: {:?}", &fields),
            }
        })
        .collect::<Result<Vec<_>, anyhow::Error>>()?;
    Ok(join_nonempty(factors))
}

/// DNaseI hypersensitivity cluster of the first overlapping record.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DnaseClusters {
    /// Number of cell types with a DNaseI HS in the interval.
    pub cell_count: Option<u32>,
    /// Comma- or semicolon-separated list of these cell types.
    pub cell_list: Option<String>,
}

pub fn get_encode_dnase_clusters(
    registry: &Registry,
    var: &Variant,
) -> Result<DnaseClusters, anyhow::Error> {
    match hits(registry, SourceName::EncodeDnase1, var)?.next() {
        Some(hit) => {
            let fields = hit?.into_tuple()?;
            match (fields.get(3), fields.get(5)) {
                (Some(count), Some(list)) => Ok(DnaseClusters {
                    cell_count: Some(count.parse::<u32>().map_err(|e| {
                        anyhow::anyhow!("invalid DNaseI cell count {:?}: {}", count, e)
                    })?),
                    cell_list: Some(list.clone()),
                }),
                _ => anyhow::bail!("DNaseI record needs 6 columns: {:?}", &fields),
            }
        }
        None => Ok(DnaseClusters::default()),
    }
}

/// Consensus chromatin state of six ENCODE cell types.
///
/// States: CTCF (CTCF-enriched), E (enhancer), PF (promoter flanking),
/// R (repressed), TSS (promoter with TSS), T (transcribed), WE (weak
/// enhancer).
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EncodeSegInfo {
    pub gm12878: Option<String>,
    pub h1hesc: Option<String>,
    pub helas3: Option<String>,
    pub hepg2: Option<String>,
    pub huvec: Option<String>,
    pub k562: Option<String>,
}

pub fn get_encode_consensus_segs(
    registry: &Registry,
    var: &Variant,
) -> Result<EncodeSegInfo, anyhow::Error> {
    match hits(registry, SourceName::EncodeConsensusSegs, var)?.next() {
        Some(hit) => {
            let fields = hit?.into_tuple()?;
            if fields.len() < 9 {
                anyhow::bail!("segmentation record needs 9 columns: {:?}", &fields);
            }
            let mut states = fields.into_iter().skip(3).map(Some);
            Ok(EncodeSegInfo {
                gm12878: states.next().flatten(),
                h1hesc: states.next().flatten(),
                helas3: states.next().flatten(),
                hepg2: states.next().flatten(),
                huvec: states.next().flatten(),
                k562: states.next().flatten(),
            })
        }
        None => Ok(EncodeSegInfo::default()),
    }
}
