//! Implementation of the `annos annotate` sub command.

use std::{io::Write, time::Instant};

use clap::Parser;
use rayon::prelude::*;
use thousands::Separable;

use super::{annotate_variant, registry::Registry, ConfigArgs, OnError, Variant};
use crate::common::{io::open_write_maybe_gz, trace_rss_now};

/// Command line arguments for `annos annotate` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Annotate variants from a TSV file", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Path to the input TSV file with `chrom`, `start`, `end`, `ref`, `alt`
    /// columns (0-based, half-open; may be gzip-compressed).
    #[arg(long, required = true)]
    pub path_input: String,
    /// Path to the output JSONL file, `-` for stdout.
    #[arg(long, default_value = "-")]
    pub path_output: String,
    /// What to do if a source's record for a variant is malformed.
    #[arg(long, value_enum, default_value_t = OnError::Abort)]
    pub on_error: OnError,
    /// Number of variants to annotate in parallel before writing.
    #[arg(long, default_value_t = 10_000)]
    pub batch_size: usize,
}

/// Annotate one batch in parallel and write the results in input order.
fn process_batch(
    registry: &Registry,
    batch: &[Variant],
    on_error: OnError,
    writer: &mut dyn Write,
) -> Result<(), anyhow::Error> {
    // Workers log within the caller's span.
    let span = tracing::Span::current();
    let results = batch
        .par_iter()
        .map(|variant| {
            let _entered = span.enter();
            annotate_variant(registry, variant, on_error)
        })
        .collect::<Result<Vec<_>, _>>()?;
    for result in &results {
        serde_json::to_writer(&mut *writer, result)
            .map_err(|e| anyhow::anyhow!("could not write annotation: {}", e))?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Read variants from `args.path_input` and write their annotations.
pub fn run_with_registry(registry: &Registry, args: &Args) -> Result<usize, anyhow::Error> {
    let reader = crate::common::io::open_read_maybe_gz(&args.path_input)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);
    let mut writer = open_write_maybe_gz(&args.path_output)?;

    let batch_size = std::cmp::max(args.batch_size, 1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut count = 0;
    for result in reader.deserialize() {
        let variant: Variant =
            result.map_err(|e| anyhow::anyhow!("could not parse input variant: {}", e))?;
        batch.push(variant);
        if batch.len() >= batch_size {
            process_batch(registry, &batch, args.on_error, &mut writer)?;
            count += batch.len();
            tracing::debug!(
                "annotated {} variants so far",
                count.separate_with_commas()
            );
            batch.clear();
        }
    }
    if !batch.is_empty() {
        process_batch(registry, &batch, args.on_error, &mut writer)?;
        count += batch.len();
    }
    writer.flush()?;
    Ok(count)
}

/// Main entry point for `annos annotate` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    tracing::info!("Loading annotation sources...");
    let registry = Registry::new(args.config.anno_config()?);
    registry.load()?;
    trace_rss_now();

    tracing::info!("Annotating variants...");
    let before_annotation = Instant::now();
    let count = run_with_registry(&registry, args)?;
    tracing::info!(
        "... done annotating {} variants in {:?}",
        count.separate_with_commas(),
        before_annotation.elapsed()
    );

    trace_rss_now();
    tracing::info!(
        "All of `annos annotate` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Args;
    use crate::annos::{conf::SourceName, ConfigArgs, OnError, VariantAnnotations};

    fn args(tmp_dir: &temp_testdir::TempDir, batch_size: usize) -> Args {
        Args {
            config: ConfigArgs {
                path_annos: "tests/data/annos".into(),
                sources: vec![SourceName::Segdup, SourceName::Dbsnp],
                strict_contig_naming: true,
            },
            path_input: tmp_dir.join("input.tsv").to_string_lossy().to_string(),
            path_output: tmp_dir.join("output.jsonl").to_string_lossy().to_string(),
            on_error: OnError::Abort,
            batch_size,
        }
    }

    #[rstest::rstest]
    #[case(1)]
    #[case(100)]
    fn run_smoke(#[case] batch_size: usize) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        std::fs::write(
            tmp_dir.join("input.tsv"),
            "chrom\tstart\tend\tref\talt\n\
             chr1\t149\t150\tA\tG\n\
             chr2\t1500\t1501\tC\tT\n\
             chr3\t10\t11\tC\tT\n",
        )?;
        let args = args(&tmp_dir, batch_size);

        super::run(&Default::default(), &args)?;

        let output = std::fs::read_to_string(tmp_dir.join("output.jsonl"))?;
        let records = output
            .lines()
            .map(serde_json::from_str::<VariantAnnotations>)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].variant.chrom, "chr1");
        assert_eq!(records[0].segdup, Some(true));
        assert_eq!(records[0].dbsnp, Some("rs1,rs2".to_string()));
        assert_eq!(records[1].variant.chrom, "chr2");
        assert_eq!(records[1].segdup, Some(true));
        assert_eq!(records[1].dbsnp, None);
        assert_eq!(records[2].segdup, Some(false));
        assert_eq!(records[2].dbsnp, None);
        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn skipped_defects_are_logged_from_workers() -> Result<(), anyhow::Error> {
        let registry = crate::annos::test::defect_registry();
        let batch = vec![crate::annos::test::variant(); 8];
        let mut buf = Vec::new();

        super::process_batch(&registry, &batch, OnError::Skip, &mut buf)?;

        let records = String::from_utf8(buf)?
            .lines()
            .map(serde_json::from_str::<VariantAnnotations>)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(records.len(), 8);
        assert!(records.iter().all(|r| r.errors.len() == 1));
        assert!(logs_contain("skipping recomb for chr1:149-150:A:G"));
        Ok(())
    }

    #[test]
    fn run_malformed_input() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        std::fs::write(
            tmp_dir.join("input.tsv"),
            "chrom\tstart\tend\tref\talt\nchr1\tx\t150\tA\tG\n",
        )?;
        assert!(super::run(&Default::default(), &args(&tmp_dir, 10)).is_err());
        Ok(())
    }
}
