//! Querying variants with sample-aware filtering.

pub mod predicate;
pub mod region;
pub mod store;
pub mod subjects;

use std::{collections::HashSet, io::Write, path::Path, time::Instant};

use clap::Parser;
use thousands::Separable;

use self::{
    predicate::{family_wise_predicate, select_subjects_predicate, InSubject, Predicate},
    region::{add_region_to_query, Region},
    store::{GenotypeStore, RowSink, SqliteStore},
    subjects::{get_family_dict, get_subjects},
};
use crate::common::{io::open_write_maybe_gz, split_nonempty, trace_rss_now};

/// Name of the column with the comma-separated names of the carriers.
pub const VARIANT_SAMPLES: &str = "variant_samples";

/// Command line arguments for `query` sub command.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Run a variant query with sample filters", long_about = None)]
pub struct Args {
    /// Path to the variant database.
    #[arg(long, required = true)]
    pub path_db: String,
    /// The SQL query to run.
    #[arg(long, required = true)]
    pub query: String,
    /// SQL condition on the `samples` table selecting the subjects.
    #[arg(long)]
    pub sample_filter: Option<String>,
    /// How the carriers must relate to the subjects; modes are combined
    /// with AND.
    #[arg(
        long = "in",
        value_enum,
        value_delimiter = ',',
        default_values_t = vec![InSubject::Only]
    )]
    pub in_subject: Vec<InSubject>,
    /// Evaluate the sample filter within each family.
    #[arg(long, default_value_t = false)]
    pub family_wise: bool,
    /// Minimal number of families that must pass with `--family-wise`.
    #[arg(long, default_value_t = 1)]
    pub min_kindreds: usize,
    /// Restrict to `chrom:start-end` or `chrom`.
    #[arg(long)]
    pub region: Option<String>,
    /// Append the carriers of each variant as the last column.
    #[arg(long, default_value_t = false)]
    pub show_variant_samples: bool,
    /// Delimiter for the carriers with `--show-variant-samples`.
    #[arg(long, default_value = ",")]
    pub sample_delim: String,
    /// Write a header line.
    #[arg(long, default_value_t = false)]
    pub header: bool,
    /// Path to the output TSV file, `-` for stdout.
    #[arg(long, default_value = "-")]
    pub path_output: String,
}

/// Whether the carriers of each variant must be loaded.
pub fn needs_genotypes(args: &Args) -> bool {
    args.show_variant_samples || args.family_wise || args.sample_filter.is_some()
}

/// Whether `query` reads from the variants table.
pub fn queries_variants(query: &str) -> bool {
    query.to_lowercase().contains("variants")
}

/// Build the predicates selected by `args`.
///
/// `--family-wise` takes precedence over a plain `--sample-filter`.
pub fn get_predicates(
    store: &dyn GenotypeStore,
    args: &Args,
) -> Result<Vec<Predicate>, anyhow::Error> {
    let mut predicates = Vec::new();
    if args.family_wise {
        let families = get_family_dict(store)?;
        let subjects = get_subjects(store, args.sample_filter.as_deref())?;
        tracing::debug!(
            "family-wise predicate over {} families and {} subjects",
            families.len(),
            subjects.len()
        );
        predicates.push(family_wise_predicate(
            &families,
            &subjects,
            &args.in_subject,
            args.min_kindreds,
        ));
    } else if let Some(sample_filter) = &args.sample_filter {
        let subjects = get_subjects(store, Some(sample_filter))?;
        tracing::debug!("sample predicate over {} subjects", subjects.len());
        predicates.push(select_subjects_predicate(
            subjects.values(),
            &args.in_subject,
            None,
        ));
    }
    Ok(predicates)
}

/// Apply the `--region` restriction to the query, if any.
pub fn modify_query(args: &Args) -> Result<String, anyhow::Error> {
    match &args.region {
        Some(region) => {
            let region: Region = region.parse()?;
            Ok(add_region_to_query(&args.query, &region))
        }
        None => Ok(args.query.clone()),
    }
}

/// Counters of a query run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    pub count_total: usize,
    pub count_passed: usize,
}

/// Writes the rows passing all predicates as TSV.
///
/// When carriers are needed, the `variant_samples` column is removed from
/// the output and appended as the last column with `--show-variant-samples`.
struct FilterSink<W: Write> {
    writer: csv::Writer<W>,
    predicates: Vec<Predicate>,
    needs_genotypes: bool,
    show_variant_samples: bool,
    sample_delim: String,
    write_header: bool,
    idx_variant_samples: Option<usize>,
    stats: QueryStats,
}

impl<W: Write> FilterSink<W> {
    fn new(writer: W, predicates: Vec<Predicate>, args: &Args) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .delimiter(b'\t')
                .quote_style(csv::QuoteStyle::Never)
                .has_headers(false)
                .from_writer(writer),
            predicates,
            needs_genotypes: needs_genotypes(args),
            show_variant_samples: args.show_variant_samples,
            sample_delim: args.sample_delim.clone(),
            write_header: args.header,
            idx_variant_samples: None,
            stats: QueryStats::default(),
        }
    }

    fn finish(mut self) -> Result<QueryStats, anyhow::Error> {
        self.writer.flush()?;
        Ok(self.stats)
    }
}

impl<W: Write> RowSink for FilterSink<W> {
    fn header(&mut self, columns: &[String]) -> Result<(), anyhow::Error> {
        // Without sample filtering, `variant_samples` is a regular column.
        self.idx_variant_samples = if self.needs_genotypes {
            columns.iter().position(|c| c == VARIANT_SAMPLES)
        } else {
            None
        };
        if self.needs_genotypes && self.idx_variant_samples.is_none() {
            anyhow::bail!(
                "sample filtering needs the {} column in the query result",
                VARIANT_SAMPLES
            );
        }
        if self.write_header {
            let mut header = columns
                .iter()
                .enumerate()
                .filter(|(idx, _)| Some(*idx) != self.idx_variant_samples)
                .map(|(_, column)| column.as_str())
                .collect::<Vec<_>>();
            if self.show_variant_samples {
                header.push(VARIANT_SAMPLES);
            }
            self.writer.write_record(&header)?;
        }
        Ok(())
    }

    fn row(&mut self, values: Vec<Option<String>>) -> Result<(), anyhow::Error> {
        self.stats.count_total += 1;

        let carriers = match self.idx_variant_samples {
            Some(idx) if self.needs_genotypes => values[idx]
                .as_deref()
                .map(|value| {
                    split_nonempty(value, ',')
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let carrier_set = carriers.iter().cloned().collect::<HashSet<_>>();
        if !self.predicates.iter().all(|p| p.matches(&carrier_set)) {
            tracing::trace!("row {} filtered by sample predicates", self.stats.count_total);
            return Ok(());
        }
        self.stats.count_passed += 1;

        let mut record = values
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != self.idx_variant_samples)
            .map(|(_, value)| value.unwrap_or_default())
            .collect::<Vec<_>>();
        if self.show_variant_samples {
            record.push(carriers.join(&self.sample_delim));
        }
        self.writer.write_record(&record)?;
        Ok(())
    }
}

/// Run the query of `args` against `store` and write the result to `writer`.
pub fn run_with_store<W: Write>(
    store: &dyn GenotypeStore,
    args: &Args,
    writer: W,
) -> Result<QueryStats, anyhow::Error> {
    let predicates = get_predicates(store, args)?;
    let query = modify_query(args)?;
    if needs_genotypes(args) && !queries_variants(&query) {
        anyhow::bail!("sample filtering is only possible on queries of the variants table");
    }

    let mut sink = FilterSink::new(writer, predicates, args);
    store.query(&query, &mut sink)?;
    sink.finish()
}

/// Main entry point for `query` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    if !Path::new(&args.path_db).exists() {
        anyhow::bail!("database {} does not exist", &args.path_db);
    }
    let store = SqliteStore::open(&args.path_db)?;
    let mut writer = open_write_maybe_gz(&args.path_output)?;

    tracing::info!("Running query...");
    let stats = run_with_store(&store, args, &mut writer)?;
    writer.flush()?;
    tracing::info!(
        "... {} of {} rows passed the filters",
        stats.count_passed.separate_with_commas(),
        stats.count_total.separate_with_commas()
    );

    trace_rss_now();
    tracing::info!(
        "All of `query` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{predicate::InSubject, store::test::example_store, Args, QueryStats};

    fn args(query: &str) -> Args {
        Args {
            path_db: "unused.db".into(),
            query: query.into(),
            sample_filter: None,
            in_subject: vec![InSubject::Only],
            family_wise: false,
            min_kindreds: 1,
            region: None,
            show_variant_samples: false,
            sample_delim: ",".into(),
            header: false,
            path_output: "-".into(),
        }
    }

    fn run(args: &Args) -> Result<(String, QueryStats), anyhow::Error> {
        let store = example_store();
        let mut buf = Vec::new();
        let stats = super::run_with_store(&store, args, &mut buf)?;
        Ok((String::from_utf8(buf)?, stats))
    }

    #[rstest::rstest]
    #[case("SELECT * FROM variants", true)]
    #[case("select chrom from VARIANTS", true)]
    #[case("SELECT * FROM samples", false)]
    fn queries_variants(#[case] query: &str, #[case] expected: bool) {
        assert_eq!(super::queries_variants(query), expected);
    }

    #[test]
    fn needs_genotypes() {
        let mut args = args("SELECT * FROM variants");
        assert!(!super::needs_genotypes(&args));
        args.family_wise = true;
        assert!(super::needs_genotypes(&args));
        args.family_wise = false;
        args.sample_filter = Some("phenotype = 2".into());
        assert!(super::needs_genotypes(&args));
    }

    #[test]
    fn get_predicates_precedence() -> Result<(), anyhow::Error> {
        let store = example_store();
        let mut args = args("SELECT * FROM variants");
        assert!(super::get_predicates(&store, &args)?.is_empty());
        args.sample_filter = Some("phenotype = 2".into());
        assert!(matches!(
            super::get_predicates(&store, &args)?.as_slice(),
            [super::Predicate::Conjunction(_)]
        ));
        args.family_wise = true;
        assert!(matches!(
            super::get_predicates(&store, &args)?.as_slice(),
            [super::Predicate::FamilyWise { .. }]
        ));
        Ok(())
    }

    #[test]
    fn only_in_affected() -> Result<(), anyhow::Error> {
        let mut args = args("SELECT chrom, start, gene, variant_samples FROM variants");
        args.sample_filter = Some("phenotype = 2".into());
        args.show_variant_samples = true;
        args.sample_delim = ";".into();
        args.header = true;

        let (output, stats) = run(&args)?;
        assert_eq!(
            output,
            "chrom\tstart\tgene\tvariant_samples\n\
             chr1\t100\tGENE1\tkid1;kid2\n\
             chr2\t300\t\tkid2\n"
        );
        assert_eq!(
            stats,
            QueryStats {
                count_total: 4,
                count_passed: 2
            }
        );
        Ok(())
    }

    #[test]
    fn family_wise_any() -> Result<(), anyhow::Error> {
        let mut args = args("SELECT chrom, start, gene, variant_samples FROM variants");
        args.sample_filter = Some("phenotype = 2".into());
        args.family_wise = true;
        args.in_subject = vec![InSubject::Any];
        args.min_kindreds = 2;

        let (output, _) = run(&args)?;
        assert_eq!(output, "chr1\t100\tGENE1\n");
        Ok(())
    }

    #[test]
    fn variant_samples_kept_without_sample_filter() -> Result<(), anyhow::Error> {
        let mut args = args("SELECT chrom, start, variant_samples FROM variants WHERE chrom = 'chr1'");
        args.header = true;
        let (output, _) = run(&args)?;
        assert_eq!(
            output,
            "chrom\tstart\tvariant_samples\n\
             chr1\t100\tkid1,kid2\n\
             chr1\t200\tdad1,kid1\n"
        );
        Ok(())
    }

    #[rstest::rstest]
    #[case("chr2", "chr2\t300\nchr2\t400\n")]
    #[case("chr2:350-450", "chr2\t400\n")]
    #[case("chr3", "")]
    fn region_filter(#[case] region: &str, #[case] expected: &str) -> Result<(), anyhow::Error> {
        let mut args = args("SELECT chrom, start FROM variants ORDER BY start");
        args.region = Some(region.into());
        let (output, _) = run(&args)?;
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn sample_filter_without_variant_samples_fails() {
        let mut args = args("SELECT chrom, start FROM variants");
        args.sample_filter = Some("phenotype = 2".into());
        assert!(run(&args).is_err());
    }

    #[test]
    fn sample_filter_on_samples_table_fails() {
        let mut args = args("SELECT * FROM samples");
        args.sample_filter = Some("phenotype = 2".into());
        assert!(run(&args).is_err());
    }

    #[test]
    fn run_missing_database() {
        let tmp_dir = temp_testdir::TempDir::default();
        let mut args = args("SELECT * FROM variants");
        args.path_db = tmp_dir.join("missing.db").to_string_lossy().to_string();
        assert!(super::run(&Default::default(), &args).is_err());
    }
}
