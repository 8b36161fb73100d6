//! Chromosome naming conventions and source-specific coordinates.

/// Contig naming convention used by an annotation source.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Naming {
    /// UCSC style, `chr`-prefixed (`chr1`, `chrX`, `chrM`).
    #[default]
    Ucsc,
    /// GRCh37 style, bare names (`1`, `X`, `MT`).
    Grch37,
}

/// A 0-based, half-open interval on a named contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

/// Convert `chrom` to UCSC naming by adding a `chr` prefix if missing.
pub fn chrom_as_ucsc(chrom: &str) -> String {
    if chrom.starts_with("chr") {
        chrom.to_string()
    } else {
        format!("chr{}", chrom)
    }
}

/// Convert `chrom` to GRCh37 naming by stripping the `chr` prefix.
///
/// `chrM` is the only name that is remapped (to `MT`).
pub fn chrom_as_grch37(chrom: &str) -> String {
    if chrom == "chrM" {
        return "MT".to_string();
    }
    chrom.strip_prefix("chr").unwrap_or(chrom).to_string()
}

/// Build the coordinate to use for querying a source with the given naming.
pub fn normalize(chrom: &str, start: u64, end: u64, naming: Naming) -> Coordinate {
    let chrom = match naming {
        Naming::Ucsc => chrom_as_ucsc(chrom),
        Naming::Grch37 => chrom_as_grch37(chrom),
    };
    Coordinate { chrom, start, end }
}

/// Guess the naming convention from the contig names of a source.
///
/// A source is considered UCSC-style as soon as one contig starts with `chr`.
/// Returns `None` if the source lists no contigs at all.
pub fn guess_naming<I, S>(contigs: I) -> Option<Naming>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut any = false;
    for contig in contigs {
        if contig.as_ref().starts_with("chr") {
            return Some(Naming::Ucsc);
        }
        any = true;
    }
    any.then_some(Naming::Grch37)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Naming;

    #[rstest::rstest]
    #[case("1", Naming::Ucsc, "chr1")]
    #[case("chr1", Naming::Ucsc, "chr1")]
    #[case("X", Naming::Ucsc, "chrX")]
    #[case("MT", Naming::Ucsc, "chrMT")]
    #[case("chr1", Naming::Grch37, "1")]
    #[case("1", Naming::Grch37, "1")]
    #[case("chrM", Naming::Grch37, "MT")]
    #[case("chrMT", Naming::Grch37, "MT")]
    #[case("M", Naming::Grch37, "M")]
    #[case("GL000192.1", Naming::Grch37, "GL000192.1")]
    fn normalize(#[case] chrom: &str, #[case] naming: Naming, #[case] expected: &str) {
        let coord = super::normalize(chrom, 10, 11, naming);
        assert_eq!(coord.chrom, expected);
        assert_eq!((coord.start, coord.end), (10, 11));
    }

    #[rstest::rstest]
    #[case("chr1", Naming::Ucsc)]
    #[case("chrX", Naming::Ucsc)]
    #[case("1", Naming::Grch37)]
    #[case("MT", Naming::Grch37)]
    fn normalize_idempotent(#[case] chrom: &str, #[case] naming: Naming) {
        let once = super::normalize(chrom, 0, 1, naming);
        let twice = super::normalize(&once.chrom, 0, 1, naming);
        assert_eq!(once.chrom, chrom);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_chrm_grch37_not_idempotent_on_input() {
        let coord = super::normalize("chrM", 0, 1, Naming::Grch37);
        assert_eq!(coord.chrom, "MT");
    }

    #[rstest::rstest]
    #[case(vec!["1", "2", "chrX"], Some(Naming::Ucsc))]
    #[case(vec!["1", "2", "X"], Some(Naming::Grch37))]
    #[case(vec![], None)]
    fn guess_naming(#[case] contigs: Vec<&str>, #[case] expected: Option<Naming>) {
        assert_eq!(super::guess_naming(contigs), expected);
    }

    #[test]
    fn coordinate_display() {
        let coord = super::normalize("1", 99, 100, Naming::Ucsc);
        assert_eq!(coord.to_string(), "chr1:99-100");
    }
}
