//! Common functionality.

use byte_unit::{Byte, UnitType};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(rss) => tracing::debug!(
            "RSS now: {:.2}",
            Byte::from_u64(rss).get_appropriate_unit(UnitType::Binary)
        ),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Split a delimited string into its non-empty, trimmed parts.
pub fn split_nonempty(value: &str, delim: char) -> impl Iterator<Item = &str> {
    value
        .split(delim)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[test]
    fn trace_rss_now_smoke() {
        super::trace_rss_now();
    }

    #[rstest::rstest]
    #[case("A,B,C", vec!["A", "B", "C"])]
    #[case("A, B ,,C,", vec!["A", "B", "C"])]
    #[case("", vec![])]
    fn split_nonempty(#[case] value: &str, #[case] expected: Vec<&str>) {
        let actual = super::split_nonempty(value, ',').collect::<Vec<_>>();
        assert_eq!(expected, actual);
    }
}
