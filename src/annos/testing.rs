//! In-memory sources for tests.

use super::{
    coords::Coordinate,
    fetch::{IntervalSource, RawLines, SummarySource},
};
use crate::err::FetchError;

/// Interval source backed by a list of tab-separated lines.
pub struct MemorySource {
    lines: Vec<String>,
    one_based: bool,
    failing: bool,
}

impl MemorySource {
    /// Lines with 0-based start and end in columns 2 and 3.
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            one_based: false,
            failing: false,
        }
    }

    /// VCF lines with 1-based position in column 2 and reference in column 4.
    pub fn vcf(lines: &[&str]) -> Self {
        Self {
            one_based: true,
            ..Self::new(lines)
        }
    }

    /// Source whose queries fail with an I/O error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(&[])
        }
    }

    fn interval(&self, fields: &[&str]) -> (u64, u64) {
        let start = fields[1].parse::<u64>().expect("invalid start");
        if self.one_based {
            (start - 1, start - 1 + fields[3].len() as u64)
        } else {
            (start, fields[2].parse::<u64>().expect("invalid end"))
        }
    }
}

impl IntervalSource for MemorySource {
    fn contigs(&self) -> Vec<String> {
        let mut contigs = Vec::new();
        for line in &self.lines {
            let contig = line.split('\t').next().unwrap_or_default().to_string();
            if !contigs.contains(&contig) {
                contigs.push(contig);
            }
        }
        contigs
    }

    fn query(&self, coord: &Coordinate) -> Result<RawLines<'_>, FetchError> {
        if self.failing {
            return Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated failure",
            )));
        }
        if !self.contigs().contains(&coord.chrom) {
            return Err(FetchError::InvalidRegion(coord.to_string()));
        }
        let coord = coord.clone();
        Ok(Box::new(
            self.lines
                .iter()
                .filter(move |line| {
                    let fields = line.split('\t').collect::<Vec<_>>();
                    let (start, end) = self.interval(&fields);
                    fields[0] == coord.chrom && start < coord.end && coord.start < end
                })
                .map(|line| Ok::<_, anyhow::Error>(line.clone())),
        ))
    }
}

/// Summary source backed by `(chrom, start, end, value)` intervals.
pub struct MemorySummary {
    values: Vec<(String, u64, u64, f64)>,
}

impl MemorySummary {
    pub fn new(values: &[(&str, u64, u64, f64)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(chrom, start, end, value)| (chrom.to_string(), *start, *end, *value))
                .collect(),
        }
    }
}

impl SummarySource for MemorySummary {
    fn contigs(&self) -> Vec<String> {
        self.values.iter().map(|(chrom, ..)| chrom.clone()).collect()
    }

    fn min_value(&self, coord: &Coordinate) -> Result<Option<f64>, FetchError> {
        if !self.contigs().contains(&coord.chrom) {
            return Err(FetchError::InvalidRegion(coord.to_string()));
        }
        Ok(self
            .values
            .iter()
            .filter(|(chrom, start, end, _)| {
                *chrom == coord.chrom && *start < coord.end && coord.start < *end
            })
            .map(|(.., value)| *value)
            .reduce(f64::min))
    }
}
