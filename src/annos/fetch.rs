//! Region fetch adapter: query interval sources and parse their records.

use indexmap::IndexMap;

use super::coords::Coordinate;
use crate::err::FetchError;

/// Boxed iterator of raw, tab-separated record lines.
pub type RawLines<'a> = Box<dyn Iterator<Item = Result<String, anyhow::Error>> + 'a>;

/// Access to a positionally indexed source of text records.
///
/// Implementations return all records overlapping a 0-based, half-open
/// interval, or `FetchError::InvalidRegion` if the contig cannot be queried.
pub trait IntervalSource: Send + Sync {
    /// Names of the contigs known to the source's index.
    fn contigs(&self) -> Vec<String>;

    /// Query the raw lines overlapping `coord`.
    fn query(&self, coord: &Coordinate) -> Result<RawLines<'_>, FetchError>;
}

/// Access to a numeric signal source that summarizes intervals.
pub trait SummarySource: Send + Sync {
    /// Names of the contigs known to the source.
    fn contigs(&self) -> Vec<String>;

    /// Minimal value over `coord`, `None` if no value is covered.
    fn min_value(&self, coord: &Coordinate) -> Result<Option<f64>, FetchError>;
}

/// Record shapes that a source's lines are parsed into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RecordKind {
    /// BED-like: contig, start, end, optional name.
    Bed,
    /// VCF-like: contig, pos, id, ref, alt, qual, filter, info.
    Vcf,
    /// Generic tab-separated fields.
    Tuple,
    /// Unparsed line.
    None,
}

impl RecordKind {
    /// Parse one raw line into a hit of this kind.
    pub fn parse(self, line: &str) -> Result<AnnotationHit, anyhow::Error> {
        match self {
            RecordKind::Bed => BedHit::parse(line).map(AnnotationHit::Bed),
            RecordKind::Vcf => VcfHit::parse(line).map(AnnotationHit::Vcf),
            RecordKind::Tuple => Ok(AnnotationHit::Tuple(
                line.split('\t').map(|s| s.to_string()).collect(),
            )),
            RecordKind::None => Ok(AnnotationHit::Raw(line.to_string())),
        }
    }

    /// Whether the positional column of the records is 1-based.
    pub fn is_one_based(self) -> bool {
        matches!(self, RecordKind::Vcf)
    }
}

/// Interval-plus-name record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedHit {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub name: Option<String>,
}

impl BedHit {
    fn parse(line: &str) -> Result<Self, anyhow::Error> {
        let fields = line.split('\t').collect::<Vec<_>>();
        if fields.len() < 3 {
            anyhow::bail!("BED record needs at least 3 columns: {:?}", line);
        }
        Ok(Self {
            contig: fields[0].to_string(),
            start: parse_column(fields[1], "start", line)?,
            end: parse_column(fields[2], "end", line)?,
            name: fields.get(3).map(|s| s.to_string()),
        })
    }

    /// The name column, failing if the record has none.
    pub fn name(&self) -> Result<&str, anyhow::Error> {
        self.name.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "BED record {}:{}-{} has no name column",
                &self.contig,
                self.start,
                self.end
            )
        })
    }
}

/// Value of a single INFO entry; flags have no value.
pub type InfoMap = IndexMap<String, Option<String>>;

/// VCF-like record with raw INFO column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcfHit {
    pub contig: String,
    /// 1-based position.
    pub pos: u64,
    pub id: String,
    pub reference: String,
    pub alternative: String,
    pub info: String,
}

impl VcfHit {
    fn parse(line: &str) -> Result<Self, anyhow::Error> {
        let fields = line.split('\t').collect::<Vec<_>>();
        if fields.len() < 5 {
            anyhow::bail!("VCF record needs at least 5 columns: {:?}", line);
        }
        Ok(Self {
            contig: fields[0].to_string(),
            pos: parse_column(fields[1], "pos", line)?,
            id: fields[2].to_string(),
            reference: fields[3].to_string(),
            alternative: fields[4].to_string(),
            info: fields.get(7).map(|s| s.to_string()).unwrap_or_default(),
        })
    }

    /// Parse the `;`-delimited INFO column.
    ///
    /// Entries are split on the first `=`; entries without `=` are flags.
    pub fn info_map(&self) -> InfoMap {
        parse_info(&self.info)
    }

    /// Whether the record describes the given alleles.
    pub fn matches_alleles(&self, reference: &str, alternative: &str) -> bool {
        self.reference == reference && self.alternative == alternative
    }
}

/// Parse a raw INFO string into an `InfoMap`.
pub fn parse_info(info: &str) -> InfoMap {
    info.split(';')
        .filter(|entry| !entry.is_empty() && *entry != ".")
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (entry.to_string(), None),
        })
        .collect()
}

/// A parsed record from an annotation source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationHit {
    Bed(BedHit),
    Vcf(VcfHit),
    Tuple(Vec<String>),
    Raw(String),
}

impl AnnotationHit {
    pub fn into_bed(self) -> Result<BedHit, anyhow::Error> {
        match self {
            AnnotationHit::Bed(hit) => Ok(hit),
            other => Err(anyhow::anyhow!("expected BED record, got {:?}", other)),
        }
    }

    pub fn into_vcf(self) -> Result<VcfHit, anyhow::Error> {
        match self {
            AnnotationHit::Vcf(hit) => Ok(hit),
            other => Err(anyhow::anyhow!("expected VCF record, got {:?}", other)),
        }
    }

    pub fn into_tuple(self) -> Result<Vec<String>, anyhow::Error> {
        match self {
            AnnotationHit::Tuple(fields) => Ok(fields),
            other => Err(anyhow::anyhow!("expected tuple record, got {:?}", other)),
        }
    }
}

/// Lazy, single-pass sequence of hits for one fetch call.
pub struct Hits<'a> {
    lines: Option<RawLines<'a>>,
    kind: RecordKind,
}

impl<'a> Hits<'a> {
    /// A sequence without any hits.
    pub fn empty(kind: RecordKind) -> Self {
        Self { lines: None, kind }
    }
}

impl<'a> Iterator for Hits<'a> {
    type Item = Result<AnnotationHit, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kind;
        let line = self.lines.as_mut()?.next()?;
        Some(line.and_then(|line| kind.parse(&line)))
    }
}

/// Fetch the hits of `source` overlapping `coord`, parsed as `kind`.
///
/// An invalid region (e.g., a contig unknown to the index) yields an empty
/// sequence; other I/O problems are returned as errors.
pub fn fetch<'a>(
    coord: &Coordinate,
    source: &'a dyn IntervalSource,
    kind: RecordKind,
) -> Result<Hits<'a>, anyhow::Error> {
    match source.query(coord) {
        Ok(lines) => Ok(Hits {
            lines: Some(lines),
            kind,
        }),
        Err(FetchError::InvalidRegion(msg)) => {
            tracing::trace!("no hits for {}: {}", coord, msg);
            Ok(Hits::empty(kind))
        }
        Err(e) => Err(anyhow::anyhow!("problem fetching {}: {}", coord, e)),
    }
}

/// Summary (minimal value) of `source` over `coord`.
///
/// Invalid regions map to `None` just like empty hit sequences.
pub fn summary(coord: &Coordinate, source: &dyn SummarySource) -> Result<Option<f64>, anyhow::Error> {
    match source.min_value(coord) {
        Ok(value) => Ok(value),
        Err(FetchError::InvalidRegion(msg)) => {
            tracing::trace!("no summary for {}: {}", coord, msg);
            Ok(None)
        }
        Err(e) => Err(anyhow::anyhow!("problem summarizing {}: {}", coord, e)),
    }
}

fn parse_column(value: &str, column: &str, line: &str) -> Result<u64, anyhow::Error> {
    value
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("invalid {} column {:?} in {:?}: {}", column, value, line, e))
}
