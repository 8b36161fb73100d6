//! Implementation of the `annos list` sub command.

use std::io::Write;

use clap::Parser;

use super::{registry::Registry, ConfigArgs};
use crate::common::io::open_write_maybe_gz;

/// Command line arguments for `annos list` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "List the configured annotation sources", long_about = None)]
pub struct Args {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Also open all sources to check that they are installed.
    #[arg(long, default_value_t = false)]
    pub check: bool,
    /// Path to the output TSV file, `-` for stdout.
    #[arg(long, default_value = "-")]
    pub path_output: String,
}

/// Write the `(name, file name)` table of `registry` as TSV.
pub fn write_sources(registry: &Registry, writer: &mut dyn Write) -> Result<(), anyhow::Error> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(["name", "file"])?;
    for (name, file_name) in registry.list_sources() {
        csv_writer.write_record([&name, &file_name])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Main entry point for `annos list` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let registry = Registry::new(args.config.anno_config()?);
    if args.check {
        registry.load()?;
    }
    let mut writer = open_write_maybe_gz(&args.path_output)?;
    write_sources(&registry, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::annos::{
        conf::{AnnoConfig, SourceName},
        registry::Registry,
    };

    #[test]
    fn write_sources() -> Result<(), anyhow::Error> {
        let registry = Registry::new(
            AnnoConfig::new("/data/annos")?.with_sources(vec![SourceName::Segdup, SourceName::Dbsnp]),
        );
        let mut buf = Vec::new();
        super::write_sources(&registry, &mut buf)?;
        assert_eq!(
            String::from_utf8(buf)?,
            "name\tfile\ndbsnp\tdbsnp.137.vcf.gz\nsegdup\thg19.segdup.bed.gz\n"
        );
        Ok(())
    }

    #[test]
    fn run_check_missing_files_fails() {
        let tmp_dir = temp_testdir::TempDir::default();
        let args = super::Args {
            config: crate::annos::ConfigArgs {
                path_annos: tmp_dir.to_string_lossy().to_string(),
                sources: vec![SourceName::Cytoband],
                strict_contig_naming: false,
            },
            check: true,
            path_output: tmp_dir.join("out.tsv").to_string_lossy().to_string(),
        };
        assert!(super::run(&Default::default(), &args).is_err());
    }
}
