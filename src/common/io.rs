//! Common, IO-related code.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open {:?} for reading: {}", path.as_ref(), e))?;
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let decoder = MultiGzDecoder::new(BufReader::new(file));
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open a file with gzip encoder, or stdout for `-`.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref() == Path::new("-") {
        tracing::trace!("Writing to stdout");
        return Ok(Box::new(BufWriter::new(std::io::stdout())));
    }
    let file = File::create(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not open {:?} for writing: {}", path.as_ref(), e))?;
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for writing", path.as_ref());
        let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        Ok(Box::new(encoder))
    } else {
        tracing::trace!("Opening {:?} as plain text for writing", path.as_ref());
        Ok(Box::new(BufWriter::new(file)))
    }
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("test.txt")]
    #[case("test.txt.gz")]
    fn write_then_read_maybe_gz(#[case] filename: &str) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();

        {
            let mut f = super::open_write_maybe_gz(tmp_dir.join(filename))?;
            f.write_all(b"chrom\tstart\n1\t100\n")?;
            f.flush()?;
        }

        let mut buf = String::new();
        super::open_read_maybe_gz(tmp_dir.join(filename))?.read_to_string(&mut buf)?;
        assert_eq!(buf, "chrom\tstart\n1\t100\n");

        Ok(())
    }

    #[test]
    fn open_read_missing_file() {
        let tmp_dir = temp_testdir::TempDir::default();
        assert!(super::open_read_maybe_gz(tmp_dir.join("missing.txt")).is_err());
    }
}
