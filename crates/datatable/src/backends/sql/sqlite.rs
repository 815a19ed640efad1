//! SQLite record store.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::core::{
    Association, AssociationSource, BackendCapabilities, Deobfuscate, RecordStore, RelationSize,
    SqlDialect,
};
use crate::error::{BackendError, DatatableError, DatatableResult};
use crate::types::{ColumnType, Record};

use super::fragment::{SqlFragment, SqlParam};
use super::relation::Relation;

const BACKEND_NAME: &str = "sqlite";

/// Configuration for the SQLite record store.
///
/// Missing keys take their [`Default`] values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteStoreConfig {
    /// Pool size for file databases. An in-memory store always holds one.
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in milliseconds.
    pub connection_timeout_ms: u64,

    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,

    /// Journal file databases in WAL mode.
    pub enable_wal: bool,

    /// Enforce foreign key constraints.
    pub enable_foreign_keys: bool,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteStoreConfig {
    /// Attaches the per-connection pragmas to `manager`.
    ///
    /// Pragmas are connection state, so they run on every pooled connection.
    fn prepare(&self, manager: SqliteConnectionManager, is_memory: bool) -> SqliteConnectionManager {
        let busy_timeout = Duration::from_millis(u64::from(self.busy_timeout_ms));
        let foreign_keys = self.enable_foreign_keys;
        let wal = self.enable_wal && !is_memory;

        manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            if wal {
                // journal_mode answers with the new mode as a row
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            }
            Ok(())
        })
    }
}

type SharedDeobfuscator = Arc<dyn Deobfuscate + Send + Sync>;

/// A [`RecordStore`] over a SQLite database.
///
/// Associations are not discoverable from the schema, so they are
/// registered per table with [`SqliteStore::with_association`].
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
    is_memory: bool,
    capabilities: BackendCapabilities,
    associations: HashMap<(String, String), Association>,
    deobfuscator: Option<SharedDeobfuscator>,
}

impl Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .field("associations", &self.associations.len())
            .finish_non_exhaustive()
    }
}

fn query_failed(e: rusqlite::Error) -> DatatableError {
    BackendError::query_failed(BACKEND_NAME, e.to_string()).into()
}

impl SqliteStore {
    /// Creates an in-memory store.
    ///
    /// The pool holds a single connection so every query sees the same database.
    pub fn in_memory() -> DatatableResult<Self> {
        let config = SqliteStoreConfig {
            max_connections: 1,
            ..SqliteStoreConfig::default()
        };
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .build(config.prepare(SqliteConnectionManager::memory(), true))
            .map_err(|e| BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_pool(pool, config, true))
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(path: P) -> DatatableResult<Self> {
        Self::with_config(path, SqliteStoreConfig::default())
    }

    /// Opens a file-based database with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteStoreConfig) -> DatatableResult<Self> {
        let manager = config.prepare(SqliteConnectionManager::file(path.as_ref()), false);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_pool(pool, config, false))
    }

    fn from_pool(
        pool: Pool<SqliteConnectionManager>,
        config: SqliteStoreConfig,
        is_memory: bool,
    ) -> Self {
        Self {
            pool,
            config,
            is_memory,
            capabilities: BackendCapabilities::sqlite(),
            associations: HashMap::new(),
            deobfuscator: None,
        }
    }

    /// Registers an association declared on `table`.
    pub fn with_association(mut self, table: impl Into<String>, association: Association) -> Self {
        self.associations
            .insert((table.into(), association.name.clone()), association);
        self
    }

    /// Sets the identifier deobfuscation function.
    pub fn with_deobfuscator<D>(mut self, deobfuscator: D) -> Self
    where
        D: Deobfuscate + Send + Sync + 'static,
    {
        self.deobfuscator = Some(Arc::new(deobfuscator));
        self
    }

    /// Overrides the reported capabilities.
    pub fn with_capabilities(mut self, capabilities: BackendCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Runs a batch of statements, e.g. schema setup.
    pub fn execute_batch(&self, sql: &str) -> DatatableResult<()> {
        self.get_connection()?
            .execute_batch(sql)
            .map_err(query_failed)
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    fn get_connection(&self) -> DatatableResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn query_i64s(&self, sql: &SqlFragment) -> DatatableResult<Vec<i64>> {
        let rendered = sql.render(SqlDialect::Sqlite);
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&rendered.sql).map_err(query_failed)?;
        let values = stmt
            .query_map(rusqlite::params_from_iter(rendered.params.iter()), |row| {
                row.get::<_, Option<i64>>(0)
            })
            .map_err(query_failed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed)?;
        Ok(values.into_iter().flatten().collect())
    }
}

/// Maps a declared SQLite column type to a column type.
fn column_type_for(declared: &str) -> ColumnType {
    let declared = declared.to_uppercase();
    if declared.contains("DATETIME") || declared.contains("TIMESTAMP") {
        ColumnType::Datetime
    } else if declared.contains("DATE") {
        ColumnType::Date
    } else if declared.contains("BOOL") {
        ColumnType::Boolean
    } else if declared.contains("INT") {
        ColumnType::Integer
    } else if ["DEC", "NUMERIC", "REAL", "FLOA", "DOUB"]
        .iter()
        .any(|t| declared.contains(t))
    {
        ColumnType::Decimal
    } else if declared.contains("TEXT") || declared.contains("CLOB") {
        ColumnType::Text
    } else {
        ColumnType::String
    }
}

fn cell_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::from(s.as_str()),
            SqlParam::Integer(i) => ToSqlOutput::from(*i),
            SqlParam::Float(f) => ToSqlOutput::from(*f),
            SqlParam::Decimal(d) => ToSqlOutput::from(d.to_f64().unwrap_or_default()),
            SqlParam::Bool(b) => ToSqlOutput::from(*b),
            SqlParam::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            SqlParam::Timestamp(t) => {
                ToSqlOutput::from(t.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            SqlParam::Null => ToSqlOutput::from(rusqlite::types::Null),
        })
    }
}

impl Deobfuscate for SqliteStore {
    fn deobfuscate(&self, token: &str) -> String {
        match &self.deobfuscator {
            Some(deobfuscator) => deobfuscator.deobfuscate(token),
            None => token.to_string(),
        }
    }
}

impl AssociationSource for SqliteStore {
    fn association(&self, table: &str, name: &str) -> Option<Association> {
        self.associations
            .get(&(table.to_string(), name.to_string()))
            .cloned()
    }

    fn columns(&self, table: &str) -> DatatableResult<Vec<(String, ColumnType)>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(query_failed)?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get(2)?;
                Ok((name, column_type_for(&declared)))
            })
            .map_err(query_failed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed)?;
        Ok(columns)
    }

    fn pluck_ids(&self, sql: &SqlFragment) -> DatatableResult<Vec<i64>> {
        self.query_i64s(sql)
    }
}

impl RecordStore for SqliteStore {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn select(&self, sql: &SqlFragment) -> DatatableResult<Vec<Record>> {
        let rendered = sql.render(SqlDialect::Sqlite);
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&rendered.sql).map_err(query_failed)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(rusqlite::params_from_iter(rendered.params.iter()), |row| {
                let mut record = Record::new();
                for (i, name) in names.iter().enumerate() {
                    record.insert(name.clone(), cell_to_json(row.get_ref(i)?));
                }
                Ok(record)
            })
            .map_err(query_failed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed)?;
        Ok(rows)
    }

    fn size(&self, relation: &Relation) -> DatatableResult<RelationSize> {
        if relation.has_custom_projection() {
            return Ok(RelationSize::Unknown);
        }
        if relation.is_grouped() {
            let sizes = self.query_i64s(&relation.group_sizes_sql())?;
            return Ok(RelationSize::Grouped(
                sizes.into_iter().map(|n| n.max(0) as u64).collect(),
            ));
        }
        self.count(&relation.count_sql()).map(RelationSize::Exact)
    }

    fn count(&self, sql: &SqlFragment) -> DatatableResult<u64> {
        let rendered = sql.render(SqlDialect::Sqlite);
        let conn = self.get_connection()?;
        let count: i64 = conn
            .query_row(
                &rendered.sql,
                rusqlite::params_from_iter(rendered.params.iter()),
                |row| row.get(0),
            )
            .map_err(query_failed)?;
        Ok(count.max(0) as u64)
    }
}
