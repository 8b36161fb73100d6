use std::path::PathBuf;

/// Errors raised while setting up or accessing the annotation registry.
///
/// All of these are fatal for a run: annotators assume a fully populated
/// registry.
#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("annotation registry has not been loaded")]
    NotLoaded,
    #[error("annotation registry has already been loaded")]
    AlreadyLoaded,
    #[error("annotation source {0:?} is not registered")]
    Unregistered(String),
    #[error(
        "cannot open annotation file {path:?}: {message}\n\
         Have you installed the annotation files? If so, have they been moved or \
         deleted? Point --path-annos (or VARANNO_ANNOTATION_DIR) at the directory \
         holding the annotation files and their .tbi indices."
    )]
    Open { path: PathBuf, message: String },
    #[error("unsupported annotation file extension for {0:?} (expected .gz or .bw)")]
    UnsupportedExtension(PathBuf),
    #[error("annotation source {source_name} is configured as {expected} but its contigs look like {found}")]
    ContigNaming {
        source_name: String,
        expected: String,
        found: String,
    },
}

/// Errors raised by the region fetch layer.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Unknown contig, empty index or an otherwise unusable interval.
    #[error("invalid region {0}")]
    InvalidRegion(String),
    #[error("I/O error during region fetch: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    #[test]
    fn open_error_mentions_path_and_guidance() {
        let err = super::RegistryError::Open {
            path: "/data/annos/dbsnp.137.vcf.gz".into(),
            message: "No such file or directory".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dbsnp.137.vcf.gz"));
        assert!(msg.contains("installed the annotation files"));
    }
}
