//! Interval-indexed annotation files (BGZF-compressed text with tabix index).

use std::{
    fs::File,
    io::BufRead,
    path::{Path, PathBuf},
};

use noodles_bgzf as bgzf;
use noodles_core::{region::Interval, Position};
use noodles_csi::{binning_index::index::reference_sequence::bin::Chunk, BinningIndex};
use noodles_tabix as tabix;

use super::{
    coords::Coordinate,
    fetch::{IntervalSource, RawLines, RecordKind},
};
use crate::err::FetchError;

/// Opened tabix-indexed file.
///
/// The index is held in memory; each query opens its own reader on the data
/// file so that the handle can be shared between threads without locking.
pub struct TabixHandle {
    /// Path to the BGZF-compressed data file.
    path: PathBuf,
    /// The loaded tabix index.
    index: tabix::Index,
    /// Contig names in the order of the index.
    contigs: Vec<String>,
    /// Record layout, used for overlap filtering.
    kind: RecordKind,
}

impl std::fmt::Debug for TabixHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabixHandle")
            .field("path", &self.path)
            .field("contigs", &self.contigs)
            .field("kind", &self.kind)
            .finish()
    }
}

impl TabixHandle {
    /// Open the data file at `path` together with its `.tbi` index.
    pub fn open(path: &Path, kind: RecordKind) -> Result<Self, anyhow::Error> {
        File::open(path).map_err(|e| anyhow::anyhow!("{}", e))?;
        let path_tbi = PathBuf::from(format!("{}.tbi", path.display()));
        let index = tabix::read(&path_tbi)
            .map_err(|e| anyhow::anyhow!("problem reading index {:?}: {}", &path_tbi, e))?;
        let header = BinningIndex::header(&index)
            .ok_or_else(|| anyhow::anyhow!("index {:?} has no tabix header", &path_tbi))?;
        let contigs = header
            .reference_sequence_names()
            .iter()
            .map(|name| String::from_utf8_lossy(AsRef::<[u8]>::as_ref(name)).into_owned())
            .collect::<Vec<_>>();
        tracing::debug!(
            "opened {:?} with {} contigs in index",
            path,
            contigs.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            index,
            contigs,
            kind,
        })
    }
}

impl IntervalSource for TabixHandle {
    fn contigs(&self) -> Vec<String> {
        self.contigs.clone()
    }

    fn query(&self, coord: &Coordinate) -> Result<RawLines<'_>, FetchError> {
        let reference_sequence_id = self
            .contigs
            .iter()
            .position(|contig| contig == &coord.chrom)
            .ok_or_else(|| FetchError::InvalidRegion(format!("unknown contig in {}", coord)))?;

        // 1-based, closed interval for the index query.
        let end = std::cmp::max(coord.end, coord.start + 1);
        let to_position = |pos: u64| {
            Position::try_from(pos as usize)
                .map_err(|e| FetchError::InvalidRegion(format!("{}: {}", coord, e)))
        };
        let interval = Interval::from(to_position(coord.start + 1)?..=to_position(end)?);
        let chunks = BinningIndex::query(&self.index, reference_sequence_id, interval)
            .map_err(|e| FetchError::InvalidRegion(format!("{}: {}", coord, e)))?;

        let reader = File::open(&self.path).map(bgzf::Reader::new)?;
        Ok(Box::new(TabixLines {
            reader,
            chunks: chunks.into_iter(),
            chunk_end: None,
            coord: Coordinate {
                chrom: coord.chrom.clone(),
                start: coord.start,
                end,
            },
            kind: self.kind,
            buf: String::new(),
            done: false,
        }))
    }
}

/// Iterator over the lines of the chunks returned by an index query that
/// really overlap the query interval.
struct TabixLines {
    reader: bgzf::Reader<File>,
    chunks: std::vec::IntoIter<Chunk>,
    chunk_end: Option<bgzf::VirtualPosition>,
    coord: Coordinate,
    kind: RecordKind,
    buf: String,
    done: bool,
}

impl Iterator for TabixLines {
    type Item = Result<String, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let chunk_end = match self.chunk_end {
                Some(chunk_end) => chunk_end,
                None => {
                    let chunk = self.chunks.next()?;
                    if let Err(e) = self.reader.seek(chunk.start()) {
                        self.done = true;
                        return Some(Err(anyhow::anyhow!("problem seeking in BGZF file: {}", e)));
                    }
                    self.chunk_end = Some(chunk.end());
                    chunk.end()
                }
            };
            if self.reader.virtual_position() >= chunk_end {
                self.chunk_end = None;
                continue;
            }

            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    self.chunk_end = None;
                    continue;
                }
                Ok(_) => (),
                Err(e) => {
                    self.done = true;
                    return Some(Err(anyhow::anyhow!("problem reading BGZF file: {}", e)));
                }
            }

            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match record_interval(line, self.kind) {
                Ok((contig, start, end)) => {
                    if contig != self.coord.chrom {
                        continue;
                    }
                    if start >= self.coord.end {
                        // Records are sorted, nothing after this one can overlap.
                        self.done = true;
                    } else if self.coord.start < end {
                        return Some(Ok(line.to_string()));
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Extract contig and 0-based, half-open interval of a record line.
fn record_interval(line: &str, kind: RecordKind) -> Result<(&str, u64, u64), anyhow::Error> {
    let mut fields = line.split('\t');
    let contig = fields.next().unwrap_or_default();
    let begin = fields
        .next()
        .ok_or_else(|| anyhow::anyhow!("missing position column in {:?}", line))?
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("invalid position in {:?}: {}", line, e))?;
    if kind.is_one_based() {
        let reference = fields.nth(1).unwrap_or_default();
        let begin = begin.saturating_sub(1);
        Ok((contig, begin, begin + std::cmp::max(reference.len(), 1) as u64))
    } else {
        let end = match fields.next() {
            Some(end) => end
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("invalid end in {:?}: {}", line, e))?,
            None => begin + 1,
        };
        Ok((contig, begin, end))
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use super::TabixHandle;
    use crate::annos::{
        coords::{normalize, Naming},
        fetch::{IntervalSource, RecordKind},
    };

    #[rstest::rstest]
    #[case("chr1\t100\t200\tname", RecordKind::Bed, ("chr1", 100, 200))]
    #[case("chr1\t100", RecordKind::Tuple, ("chr1", 100, 101))]
    #[case("1\t150\trs1\tACGT\tA", RecordKind::Vcf, ("1", 149, 153))]
    fn record_interval(
        #[case] line: &str,
        #[case] kind: RecordKind,
        #[case] expected: (&str, u64, u64),
    ) -> Result<(), anyhow::Error> {
        assert_eq!(super::record_interval(line, kind)?, expected);
        Ok(())
    }

    #[test]
    fn record_interval_malformed() {
        assert!(super::record_interval("chr1\tx\t200", RecordKind::Bed).is_err());
        assert!(super::record_interval("chr1", RecordKind::Bed).is_err());
    }

    fn fetch_lines(handle: &TabixHandle, chrom: &str, start: u64, end: u64) -> Vec<String> {
        handle
            .query(&normalize(chrom, start, end, Naming::Ucsc))
            .expect("query failed")
            .collect::<Result<Vec<_>, _>>()
            .expect("reading failed")
    }

    #[test]
    fn open_and_query_bed() -> Result<(), anyhow::Error> {
        let handle = TabixHandle::open(
            Path::new("tests/data/annos/hg19.segdup.bed.gz"),
            RecordKind::Bed,
        )?;
        assert_eq!(handle.contigs(), vec!["chr1", "chr2"]);

        assert_eq!(
            fetch_lines(&handle, "chr1", 120, 121),
            vec!["chr1\t100\t200\tsegdup1"]
        );
        assert_eq!(fetch_lines(&handle, "chr1", 160, 161).len(), 2);
        assert_eq!(fetch_lines(&handle, "chr1", 300, 400).len(), 0);
        assert_eq!(fetch_lines(&handle, "chr1", 0, 100).len(), 0);
        assert_eq!(
            fetch_lines(&handle, "chr2", 1500, 1501),
            vec!["chr2\t1000\t2000\tsegdup3"]
        );
        Ok(())
    }

    #[test]
    fn query_unknown_contig_is_invalid_region() -> Result<(), anyhow::Error> {
        let handle = TabixHandle::open(
            Path::new("tests/data/annos/hg19.segdup.bed.gz"),
            RecordKind::Bed,
        )?;
        let result = handle.query(&normalize("chr1", 0, 10, Naming::Grch37));
        assert!(matches!(
            result,
            Err(crate::err::FetchError::InvalidRegion(_))
        ));
        Ok(())
    }

    #[test]
    fn open_and_query_vcf() -> Result<(), anyhow::Error> {
        let handle = TabixHandle::open(
            Path::new("tests/data/annos/dbsnp.137.vcf.gz"),
            RecordKind::Vcf,
        )?;
        assert_eq!(handle.contigs(), vec!["1", "2"]);

        let lines = handle
            .query(&normalize("chr1", 149, 150, Naming::Grch37))?
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1\t150\trs1"));

        // deletion spans 400..403 (1-based)
        let lines = handle
            .query(&normalize("1", 401, 402, Naming::Grch37))?
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(lines.len(), 1);
        Ok(())
    }

    #[test]
    fn open_missing_file() {
        assert!(TabixHandle::open(
            Path::new("tests/data/annos/missing.bed.gz"),
            RecordKind::Bed
        )
        .is_err());
    }
}
