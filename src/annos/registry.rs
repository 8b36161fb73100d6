//! Registry of opened annotation sources, populated once per process.

use std::collections::BTreeMap;

use once_cell::sync::OnceCell;

use super::{
    bigwig::BigWigHandle,
    conf::{AnnoConfig, AnnotationSource, FormatKind, SourceName},
    coords::{guess_naming, normalize},
    fetch::{self, Hits, IntervalSource, SummarySource},
    tabix::TabixHandle,
};
use crate::err::RegistryError;

/// An opened handle of one of the supported format kinds.
pub enum Handle {
    Interval(Box<dyn IntervalSource>),
    Summary(Box<dyn SummarySource>),
}

impl Handle {
    pub fn format_kind(&self) -> FormatKind {
        match self {
            Handle::Interval(_) => FormatKind::IntervalIndexed,
            Handle::Summary(_) => FormatKind::NumericSummary,
        }
    }

    fn contigs(&self) -> Vec<String> {
        match self {
            Handle::Interval(handle) => handle.contigs(),
            Handle::Summary(handle) => handle.contigs(),
        }
    }
}

/// A source definition together with its opened handle.
pub struct RegisteredSource {
    pub source: AnnotationSource,
    pub handle: Handle,
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("source", &self.source)
            .field("format_kind", &self.handle.format_kind())
            .finish()
    }
}

/// Owns the handles of all configured annotation sources.
///
/// Handles are opened by `load()` and shared read-only afterwards, so a
/// `&Registry` can be handed to worker threads.
pub struct Registry {
    conf: AnnoConfig,
    handles: OnceCell<BTreeMap<SourceName, RegisteredSource>>,
}

impl Registry {
    pub fn new(conf: AnnoConfig) -> Self {
        Self {
            conf,
            handles: OnceCell::new(),
        }
    }

    /// Construct an already loaded registry from the given handles.
    pub fn with_handles<I>(conf: AnnoConfig, handles: I) -> Self
    where
        I: IntoIterator<Item = RegisteredSource>,
    {
        let handles = handles
            .into_iter()
            .map(|registered| (registered.source.name, registered))
            .collect::<BTreeMap<_, _>>();
        Self {
            conf,
            handles: OnceCell::with_value(handles),
        }
    }

    /// Open the handles of all configured sources.
    ///
    /// Any file that cannot be opened fails the whole load.
    pub fn load(&self) -> Result<(), anyhow::Error> {
        if self.handles.get().is_some() {
            return Err(RegistryError::AlreadyLoaded.into());
        }

        let before_loading = std::time::Instant::now();
        let mut handles = BTreeMap::new();
        for source in self.conf.annotation_sources() {
            let handle = open_handle(&source)?;
            check_naming(&source, &handle.contigs(), self.conf.strict_contig_naming)?;
            tracing::debug!(
                "registered {} ({}) from {:?}",
                source.name,
                handle.format_kind(),
                &source.path
            );
            handles.insert(source.name, RegisteredSource { source, handle });
        }
        let count = handles.len();
        self.handles
            .set(handles)
            .map_err(|_| RegistryError::AlreadyLoaded)?;
        tracing::info!(
            "loaded {} annotation sources in {:?}",
            count,
            before_loading.elapsed()
        );
        Ok(())
    }

    /// Whether `name` has been registered by `load()`.
    pub fn contains(&self, name: SourceName) -> bool {
        self.handles
            .get()
            .map(|handles| handles.contains_key(&name))
            .unwrap_or(false)
    }

    pub fn lookup(&self, name: SourceName) -> Result<&RegisteredSource, RegistryError> {
        self.handles
            .get()
            .ok_or(RegistryError::NotLoaded)?
            .get(&name)
            .ok_or_else(|| RegistryError::Unregistered(name.to_string()))
    }

    /// Look up by the string name of a source.
    pub fn lookup_str(&self, name: &str) -> Result<&RegisteredSource, RegistryError> {
        let name = name
            .parse::<SourceName>()
            .map_err(|_| RegistryError::Unregistered(name.to_string()))?;
        self.lookup(name)
    }

    /// Hits of interval source `name` overlapping the given 0-based interval.
    ///
    /// The chromosome is converted to the source's naming first.
    pub fn fetch(
        &self,
        name: SourceName,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> Result<Hits<'_>, anyhow::Error> {
        let registered = self.lookup(name)?;
        match &registered.handle {
            Handle::Interval(handle) => fetch::fetch(
                &normalize(chrom, start, end, registered.source.naming),
                handle.as_ref(),
                registered.source.record_kind,
            ),
            Handle::Summary(_) => anyhow::bail!("source {} has no interval records", name),
        }
    }

    /// Minimal value of summary source `name` over the given interval.
    pub fn summary(
        &self,
        name: SourceName,
        chrom: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<f64>, anyhow::Error> {
        let registered = self.lookup(name)?;
        match &registered.handle {
            Handle::Summary(handle) => fetch::summary(
                &normalize(chrom, start, end, registered.source.naming),
                handle.as_ref(),
            ),
            Handle::Interval(_) => anyhow::bail!("source {} has no numeric summary", name),
        }
    }

    /// Configured sources as `(name, file name)`, sorted by name.
    ///
    /// Does not require `load()`.
    pub fn list_sources(&self) -> Vec<(String, String)> {
        self.conf
            .source_names()
            .into_iter()
            .map(|name| (name.to_string(), name.file_name().to_string()))
            .collect()
    }
}

fn open_handle(source: &AnnotationSource) -> Result<Handle, RegistryError> {
    let open_error = |e: anyhow::Error| RegistryError::Open {
        path: source.path.clone(),
        message: e.to_string(),
    };
    match source.format_kind()? {
        FormatKind::IntervalIndexed => TabixHandle::open(&source.path, source.record_kind)
            .map(|handle| Handle::Interval(Box::new(handle)))
            .map_err(open_error),
        FormatKind::NumericSummary => BigWigHandle::open(&source.path)
            .map(|handle| Handle::Summary(Box::new(handle)))
            .map_err(open_error),
    }
}

/// Compare the configured naming of `source` against its contig names.
///
/// Mismatches are logged, or returned as error if `strict` is set.
fn check_naming(
    source: &AnnotationSource,
    contigs: &[String],
    strict: bool,
) -> Result<(), RegistryError> {
    let found = match guess_naming(contigs) {
        Some(found) => found,
        None => return Ok(()),
    };
    if found == source.naming {
        return Ok(());
    }
    let err = RegistryError::ContigNaming {
        source_name: source.name.to_string(),
        expected: source.naming.to_string(),
        found: found.to_string(),
    };
    if strict {
        Err(err)
    } else {
        tracing::warn!("{}", err);
        Ok(())
    }
}
