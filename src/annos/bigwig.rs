//! Numeric signal files (bigWig) with interval summaries.

use std::path::{Path, PathBuf};

use bigtools::BigWigRead;

use super::{coords::Coordinate, fetch::SummarySource};
use crate::err::FetchError;

/// Opened bigWig file.
///
/// Reading needs a mutable reader, so every summary call opens its own
/// reader; only the chromosome list is cached.
#[derive(Debug)]
pub struct BigWigHandle {
    path: PathBuf,
    /// Chromosome names and lengths from the file header.
    chroms: Vec<(String, u32)>,
}

impl BigWigHandle {
    pub fn open(path: &Path) -> Result<Self, anyhow::Error> {
        let reader = BigWigRead::open_file(path)
            .map_err(|e| anyhow::anyhow!("problem opening bigWig file {:?}: {}", path, e))?;
        let chroms = reader
            .chroms()
            .iter()
            .map(|info| (info.name.clone(), info.length))
            .collect::<Vec<_>>();
        tracing::debug!("opened {:?} with {} chromosomes", path, chroms.len());

        Ok(Self {
            path: path.to_path_buf(),
            chroms,
        })
    }
}

impl SummarySource for BigWigHandle {
    fn contigs(&self) -> Vec<String> {
        self.chroms.iter().map(|(name, _)| name.clone()).collect()
    }

    fn min_value(&self, coord: &Coordinate) -> Result<Option<f64>, FetchError> {
        let length = self
            .chroms
            .iter()
            .find(|(name, _)| name == &coord.chrom)
            .map(|(_, length)| *length)
            .ok_or_else(|| FetchError::InvalidRegion(format!("unknown contig in {}", coord)))?;
        let start = u32::try_from(coord.start)
            .map_err(|e| FetchError::InvalidRegion(format!("{}: {}", coord, e)))?;
        let end = u32::try_from(std::cmp::max(coord.end, coord.start + 1))
            .map_err(|e| FetchError::InvalidRegion(format!("{}: {}", coord, e)))?
            .min(length);
        if start >= end {
            return Err(FetchError::InvalidRegion(format!(
                "{} beyond contig length {}",
                coord, length
            )));
        }

        let mut reader = BigWigRead::open_file(&self.path)
            .map_err(|e| io_error(format!("problem opening {:?}: {}", &self.path, e)))?;
        let mut result: Option<f64> = None;
        for value in reader
            .get_interval(&coord.chrom, start, end)
            .map_err(|e| io_error(format!("problem querying {}: {}", coord, e)))?
        {
            let value = value.map_err(|e| io_error(format!("problem reading {}: {}", coord, e)))?;
            let value = value.value as f64;
            result = Some(result.map_or(value, |current| current.min(value)));
        }
        Ok(result)
    }
}

fn io_error(message: String) -> FetchError {
    FetchError::Io(std::io::Error::new(std::io::ErrorKind::Other, message))
}
