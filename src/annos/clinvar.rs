//! ClinVar code tables and the per-variant ClinVar bundle.

use super::fetch::InfoMap;

/// Allele origin, from the `CLNORIGIN` INFO code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Origin {
    Unknown,
    Germline,
    Somatic,
    Inherited,
    Paternal,
    Maternal,
    DeNovo,
    Biparental,
    Uniparental,
    NotTested,
    TestedInconclusive,
    Other,
    /// Code not in the table.
    Unrecognized,
}

impl From<&str> for Origin {
    fn from(code: &str) -> Self {
        match code {
            "0" => Origin::Unknown,
            "1" => Origin::Germline,
            "2" => Origin::Somatic,
            "4" => Origin::Inherited,
            "8" => Origin::Paternal,
            "16" => Origin::Maternal,
            "32" => Origin::DeNovo,
            "64" => Origin::Biparental,
            "128" => Origin::Uniparental,
            "256" => Origin::NotTested,
            "512" => Origin::TestedInconclusive,
            "1073741824" => Origin::Other,
            _ => Origin::Unrecognized,
        }
    }
}

impl Origin {
    /// `None` for unrecognized codes.
    pub fn known(self) -> Option<Self> {
        (self != Origin::Unrecognized).then_some(self)
    }
}

/// Clinical significance, from the `CLNSIG` INFO code.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Significance {
    Unknown,
    Untested,
    NonPathogenic,
    ProbableNonPathogenic,
    ProbablePathogenic,
    Pathogenic,
    DrugResponse,
    Histocompatibility,
    Other,
    /// Composite code whose components have different meanings.
    Mixed,
    /// Code not in the table.
    Unrecognized,
}

impl Significance {
    fn from_single(code: &str) -> Self {
        match code {
            "0" => Significance::Unknown,
            "1" => Significance::Untested,
            "2" => Significance::NonPathogenic,
            "3" => Significance::ProbableNonPathogenic,
            "4" => Significance::ProbablePathogenic,
            "5" => Significance::Pathogenic,
            "6" => Significance::DrugResponse,
            "7" => Significance::Histocompatibility,
            "255" => Significance::Other,
            _ => Significance::Unrecognized,
        }
    }

    /// `None` for unrecognized codes.
    pub fn known(self) -> Option<Self> {
        (self != Significance::Unrecognized).then_some(self)
    }
}

impl From<&str> for Significance {
    /// Resolve a possibly `|`-joined code.
    ///
    /// A composite code resolves to its single distinct component, or to
    /// `Mixed` if it has several distinct components.
    fn from(code: &str) -> Self {
        let mut codes = code.split('|').collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        match codes.as_slice() {
            [single] => Significance::from_single(single),
            _ => Significance::Mixed,
        }
    }
}

/// ClinVar annotation of one variant.
///
/// All fields are `None` unless a single, allele-matching record was found.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClinvarInfo {
    pub dbsource: Option<String>,
    pub dbsource_id: Option<String>,
    pub origin: Option<Origin>,
    pub significance: Option<Significance>,
    pub dsdb: Option<String>,
    pub dsdbid: Option<String>,
    pub disease_name: Option<String>,
    pub disease_acc: Option<String>,
    pub in_omim: Option<bool>,
    pub in_locus_spec_db: Option<bool>,
    pub on_diag_assay: Option<bool>,
}

impl ClinvarInfo {
    /// Build from the INFO map of a matching record.
    ///
    /// All value keys must be present; empty values are treated as absent.
    pub fn from_info(info: &InfoMap) -> Result<Self, anyhow::Error> {
        Ok(Self {
            dbsource: required(info, "CLNSRC")?,
            dbsource_id: required(info, "CLNSRCID")?,
            origin: required(info, "CLNORIGIN")?.and_then(|code| Origin::from(code.as_str()).known()),
            significance: required(info, "CLNSIG")?
                .and_then(|code| Significance::from(code.as_str()).known()),
            dsdb: required(info, "CLNDSDB")?,
            dsdbid: required(info, "CLNDSDBID")?,
            disease_name: required(info, "CLNDBN")?.map(|name| decode_hex_escapes(&name)),
            disease_acc: required(info, "CLNACC")?,
            in_omim: Some(info.contains_key("OM")),
            in_locus_spec_db: Some(info.contains_key("LSD")),
            on_diag_assay: Some(info.contains_key("CDA")),
        })
    }
}

/// Value of INFO key `key`, failing if the key is missing.
fn required(info: &InfoMap, key: &str) -> Result<Option<String>, anyhow::Error> {
    let value = info
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("ClinVar record lacks INFO key {}", key))?;
    Ok(value.as_ref().filter(|value| !value.is_empty()).cloned())
}

/// Decode `\xNN` escapes (e.g., `\x2c` for commas) in ClinVar strings.
pub fn decode_hex_escapes(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok();
            if let Some(byte) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                result.push(byte);
                i += 4;
                continue;
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}
