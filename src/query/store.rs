//! Access to the variant, sample and genotype tables.

use std::path::Path;

use rusqlite::{types::ValueRef, Connection, OpenFlags};

use super::subjects::Subject;

/// Receives the result of a query, row by row.
pub trait RowSink {
    /// Called once with the column names before any row.
    fn header(&mut self, columns: &[String]) -> Result<(), anyhow::Error>;

    /// Called for each result row; `None` values are SQL `NULL`.
    fn row(&mut self, values: Vec<Option<String>>) -> Result<(), anyhow::Error>;
}

/// Queryable storage of variants and samples.
pub trait GenotypeStore {
    /// Load the `samples` table, optionally restricted by an SQL condition.
    fn samples(&self, filter: Option<&str>) -> Result<Vec<Subject>, anyhow::Error>;

    /// Run `sql` and stream its result into `sink`.
    fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<(), anyhow::Error>;
}

/// SQLite implementation of `GenotypeStore`.
pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    /// Open the database at `path` read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(path.as_ref(), flags)
            .map_err(|e| anyhow::anyhow!("could not open database {:?}: {}", path.as_ref(), e))?;
        Ok(Self { connection })
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }
}

/// Render an SQLite value as text.
fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

impl GenotypeStore for SqliteStore {
    fn samples(&self, filter: Option<&str>) -> Result<Vec<Subject>, anyhow::Error> {
        let sql = match filter {
            Some(filter) => format!("SELECT * FROM samples WHERE {}", filter),
            None => "SELECT * FROM samples".to_string(),
        };
        tracing::debug!("loading samples: {}", &sql);
        let mut stmt = self
            .connection
            .prepare(&sql)
            .map_err(|e| anyhow::anyhow!("problem preparing samples query: {}", e))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        let idx = |name: &str| columns.iter().position(|c| c == name);
        let idx_name = idx("name")
            .ok_or_else(|| anyhow::anyhow!("samples table has no name column"))?;
        let idx_family_id = idx("family_id");
        let idx_paternal_id = idx("paternal_id");
        let idx_maternal_id = idx("maternal_id");
        let idx_sex = idx("sex");
        let idx_phenotype = idx("phenotype");

        let mut rows = stmt.query([])?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let get = |idx: Option<usize>| -> Result<Option<String>, rusqlite::Error> {
                match idx {
                    Some(idx) => Ok(value_to_string(row.get_ref(idx)?)),
                    None => Ok(None),
                }
            };
            result.push(Subject {
                name: get(Some(idx_name))?
                    .ok_or_else(|| anyhow::anyhow!("sample without name"))?,
                family_id: get(idx_family_id)?,
                paternal_id: get(idx_paternal_id)?,
                maternal_id: get(idx_maternal_id)?,
                sex: get(idx_sex)?,
                phenotype: get(idx_phenotype)?,
            });
        }
        Ok(result)
    }

    fn query(&self, sql: &str, sink: &mut dyn RowSink) -> Result<(), anyhow::Error> {
        tracing::debug!("running query: {}", sql);
        let mut stmt = self
            .connection
            .prepare(sql)
            .map_err(|e| anyhow::anyhow!("problem preparing query {:?}: {}", sql, e))?;
        let columns = stmt
            .column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        sink.header(&columns)?;

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|idx| row.get_ref(idx).map(value_to_string))
                .collect::<Result<Vec<_>, _>>()?;
            sink.row(values)?;
        }
        Ok(())
    }
}
