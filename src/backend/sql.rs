//! SQL table cache backend implementation.
//!
//! Entries live in a single `entries` table keyed by `key`. The backend talks
//! to the store through sqlx's `Any` driver, so a MySQL URL is the production
//! setup and a SQLite URL works through the same statements.

use super::{expire_at, Cache, Entry, DEFAULT_TTL};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::fallback::Fallback;
use crate::serialization::{Codec, JsonCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sqlx::error::DatabaseError;
use sqlx::{AnyConnection, Connection};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default MySQL port.
const DEFAULT_PORT: u16 = 3306;

/// MySQL: table already exists.
const ER_TABLE_EXISTS_ERROR: u16 = 1050;
/// MySQL: duplicate key (index) name.
const ER_DUP_KEYNAME: u16 = 1061;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS entries (\
     `key` VARCHAR(255) NOT NULL, \
     `value` VARCHAR(8192) NOT NULL, \
     `expire_at` BIGINT NOT NULL, \
     PRIMARY KEY (`key`))";
const CREATE_INDEX_SQL: &str = "CREATE INDEX entries_key_index ON entries (`key`)";

const GET_SQL: &str = "SELECT `value`, `expire_at` FROM entries WHERE `key` = ?";
const INSERT_SQL: &str = "INSERT INTO entries (`key`, `value`, `expire_at`) VALUES (?, ?, ?)";
const REPLACE_SQL: &str = "REPLACE INTO entries (`key`, `value`, `expire_at`) VALUES (?, ?, ?)";
const DELETE_SQL: &str = "DELETE FROM entries WHERE `key` = ?";
const DELETE_EXPIRED_SQL: &str = "DELETE FROM entries WHERE `expire_at` <= ?";
const CLEAR_SQL: &str = "DELETE FROM entries";

/// Configuration mapping keys read by [`SqlConfig::from_map`].
pub const HOST_KEY: &str = "CACHE_MYSQL_HOST";
pub const DATABASE_KEY: &str = "CACHE_MYSQL_DATABASE";
pub const USER_KEY: &str = "CACHE_MYSQL_USER";
pub const PASSWORD_KEY: &str = "CACHE_MYSQL_PASSWORD";
pub const PORT_KEY: &str = "CACHE_MYSQL_PORT";
pub const TTL_KEY: &str = "CACHE_TTL";

/// Configuration for the SQL backend.
#[derive(Clone, Debug)]
pub struct SqlConfig {
    pub host: String,
    pub port: u16,
    pub database_name: String,
    pub user_name: String,
    pub password: String,
    /// Default TTL for writes that do not pass one.
    pub ttl: Duration,
}

impl Default for SqlConfig {
    fn default() -> Self {
        SqlConfig {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database_name: "cache".to_string(),
            user_name: "username".to_string(),
            password: "password".to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}

impl SqlConfig {
    /// Build MySQL connection string.
    ///
    /// User name and password are percent-encoded so reserved characters
    /// (`@`, `/`, `#`, `:`) stay inside the credentials.
    pub fn connection_string(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            utf8_percent_encode(&self.user_name, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.password, NON_ALPHANUMERIC),
            self.host,
            self.port,
            self.database_name
        )
    }

    /// Read the configuration from a string mapping.
    ///
    /// Missing keys and values that do not parse fall back to the defaults.
    pub fn from_map(config: &HashMap<String, String>) -> Self {
        let defaults = SqlConfig::default();
        let text = |key: &str, default: String| config.get(key).cloned().unwrap_or(default);

        SqlConfig {
            host: text(HOST_KEY, defaults.host),
            port: config
                .get(PORT_KEY)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            database_name: text(DATABASE_KEY, defaults.database_name),
            user_name: text(USER_KEY, defaults.user_name),
            password: text(PASSWORD_KEY, defaults.password),
            ttl: config
                .get(TTL_KEY)
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ttl),
        }
    }

    /// Read the configuration from environment variables with the same keys
    /// as [`SqlConfig::from_map`].
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }
}

/// Lifecycle of the backend's single connection.
enum ConnectionState {
    /// No connection attempted yet.
    Uninitialized,
    /// Connection open and schema bootstrapped.
    Connected(AnyConnection),
    /// `close()` was called; the backend is no longer usable.
    Closed,
}

/// SQL table backend with a lazily opened connection.
///
/// The connection is opened and the schema bootstrapped on first use, then
/// reused for the lifetime of the backend. Clones share that connection and
/// each operation holds it for its whole read-modify-write sequence.
///
/// Encoded values are stored in a `VARCHAR(8192)` column. On MySQL a payload
/// longer than 8192 characters is rejected in strict mode and truncated
/// otherwise, so values must encode within that limit.
///
/// # Example
///
/// ```no_run
/// # use relcache::backend::{Cache, SqlBackend, SqlConfig};
/// # use relcache::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = SqlBackend::new(SqlConfig::default());
///
/// backend.put("key", "value".to_string(), None).await?;
/// let value: Option<String> = backend.get("key").await?;
///
/// backend.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqlBackend<C: Codec = JsonCodec> {
    url: Arc<str>,
    state: Arc<Mutex<ConnectionState>>,
    codec: C,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SqlBackend {
    /// Create a MySQL backend from configuration.
    ///
    /// No connection is made until the first operation.
    pub fn new(config: SqlConfig) -> Self {
        Self::from_connection_string(&config.connection_string()).with_ttl(config.ttl)
    }

    /// Create from any sqlx connection URL (`mysql://...`, `sqlite::memory:`).
    ///
    /// No connection is made until the first operation.
    pub fn from_connection_string(url: &str) -> Self {
        SqlBackend {
            url: Arc::from(url),
            state: Arc::new(Mutex::new(ConnectionState::Uninitialized)),
            codec: JsonCodec,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
        }
    }
}

impl<C: Codec> SqlBackend<C> {
    /// Set the default TTL used when a write does not pass one.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the value codec.
    pub fn with_codec<D: Codec>(self, codec: D) -> SqlBackend<D> {
        SqlBackend {
            url: self.url,
            state: self.state,
            codec,
            clock: self.clock,
            ttl: self.ttl,
        }
    }

    /// Default TTL for writes.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the connection is currently open.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected(_))
    }

    /// Health check - open the connection if needed and run `SELECT 1`.
    ///
    /// # Errors
    /// Returns `Err` if the store is not reachable.
    pub async fn health_check(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(true)
    }

    /// Raw row lookup that ignores expiry and never evicts.
    ///
    /// # Errors
    /// Returns `Err` if the store is not reachable.
    pub async fn entry(&self, key: &str) -> Result<Option<Entry>> {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        let row: Option<(String, i64)> = sqlx::query_as(GET_SQL)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(|(value, expire_at)| Entry {
            key: key.to_string(),
            value,
            expire_at,
        }))
    }

    /// Close the connection.
    ///
    /// Safe to call more than once and on a backend that never connected.
    /// Afterwards every operation on this backend and its clones fails.
    ///
    /// # Errors
    /// Returns `Err` if the store reports an error while closing.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;

        match std::mem::replace(&mut *state, ConnectionState::Closed) {
            ConnectionState::Connected(conn) => {
                if let Err(e) = conn.close().await {
                    warn!("⚠ SQL backend close failed: {}", e);
                    return Err(e.into());
                }
                info!("✓ SQL backend connection closed");
            }
            ConnectionState::Uninitialized => debug!("SQL backend closed before connecting"),
            ConnectionState::Closed => debug!("SQL backend already closed"),
        }

        Ok(())
    }

    /// Open the connection if it is not open yet.
    async fn open<'a>(&self, state: &'a mut ConnectionState) -> Result<&'a mut AnyConnection> {
        if matches!(state, ConnectionState::Uninitialized) {
            let conn = self.connect().await?;
            *state = ConnectionState::Connected(conn);
        }

        match state {
            ConnectionState::Connected(conn) => Ok(conn),
            ConnectionState::Closed => Err(Error::BackendError(
                "SQL backend is closed".to_string(),
            )),
            ConnectionState::Uninitialized => Err(Error::BackendError(
                "SQL connection was not established".to_string(),
            )),
        }
    }

    async fn connect(&self) -> Result<AnyConnection> {
        sqlx::any::install_default_drivers();

        let mut conn = AnyConnection::connect(&self.url).await?;
        bootstrap(&mut conn).await?;

        info!("✓ SQL backend initialized ({})", conn.backend_name());
        Ok(conn)
    }

    /// Insert the row, replacing it if the key is already present.
    async fn write(
        &self,
        conn: &mut AnyConnection,
        key: &str,
        payload: &str,
        expire_at: i64,
    ) -> Result<()> {
        let inserted = sqlx::query(INSERT_SQL)
            .bind(key)
            .bind(payload)
            .bind(expire_at)
            .execute(&mut *conn)
            .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                debug!("SQL INSERT {} hit an existing key, replacing", key);
                sqlx::query(REPLACE_SQL)
                    .bind(key)
                    .bind(payload)
                    .bind(expire_at)
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Encode and write `value` with expiry `now + ttl`.
    async fn store<T: Serialize>(
        &self,
        conn: &mut AnyConnection,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let payload = self.codec.encode(value)?;
        let expire_at = expire_at(self.clock.now(), ttl);
        self.write(conn, key, &payload, expire_at).await?;

        debug!("✓ SQL PUT {} (TTL: {:?})", key, ttl);
        Ok(())
    }
}

impl<C: Codec> Cache for SqlBackend<C> {
    async fn get_with<T>(
        &self,
        key: &str,
        fallback: Fallback<T>,
        ttl: Option<Duration>,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        let row: Option<(String, i64)> = sqlx::query_as(GET_SQL)
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;
        let now = self.clock.now();

        match row {
            Some((payload, expires)) if expires > now => {
                debug!("✓ SQL GET {} -> HIT", key);
                if let Some(ttl) = ttl {
                    sqlx::query(REPLACE_SQL)
                        .bind(key)
                        .bind(payload.as_str())
                        .bind(expire_at(now, ttl))
                        .execute(&mut *conn)
                        .await?;
                    debug!("✓ SQL TOUCH {} (TTL: {:?})", key, ttl);
                }
                return self.codec.decode(&payload).map(Some);
            }
            Some(_) => {
                sqlx::query(DELETE_SQL)
                    .bind(key)
                    .execute(&mut *conn)
                    .await?;
                debug!("✓ SQL GET {} -> EXPIRED (evicted)", key);
            }
            None => debug!("✓ SQL GET {} -> MISS", key),
        }

        match fallback.resolve(self.ttl) {
            Some((value, ttl)) => {
                self.store(conn, key, &value, ttl).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn put<T>(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<T>
    where
        T: Serialize + Send,
    {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        self.store(conn, key, &value, ttl.unwrap_or(self.ttl))
            .await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        sqlx::query(DELETE_SQL)
            .bind(key)
            .execute(&mut *conn)
            .await?;

        debug!("✓ SQL DELETE {}", key);
        Ok(())
    }

    async fn flush(&self, expired_only: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let conn = self.open(&mut state).await?;

        if expired_only {
            let removed = sqlx::query(DELETE_EXPIRED_SQL)
                .bind(self.clock.now())
                .execute(&mut *conn)
                .await?
                .rows_affected();
            debug!("✓ SQL FLUSH {} expired entries", removed);
        } else {
            sqlx::query(CLEAR_SQL).execute(&mut *conn).await?;
            warn!("⚠ SQL FLUSH executed - all cache cleared!");
        }

        Ok(())
    }
}

/// Create the table and key index, tolerating objects that already exist.
async fn bootstrap(conn: &mut AnyConnection) -> Result<()> {
    for statement in [CREATE_TABLE_SQL, CREATE_INDEX_SQL] {
        match sqlx::query(statement).execute(&mut *conn).await {
            Ok(_) => {}
            Err(e) if is_already_exists(&e) => {
                debug!("Schema object already exists, skipping: {}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn is_already_exists(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db_err| {
        schema_object_exists(mysql_error_number(db_err), db_err.message())
    })
}

/// MySQL reports existing objects by error number; other drivers only by message.
fn schema_object_exists(mysql_number: Option<u16>, message: &str) -> bool {
    match mysql_number {
        Some(number) => matches!(number, ER_TABLE_EXISTS_ERROR | ER_DUP_KEYNAME),
        None => message.contains("already exists"),
    }
}

#[cfg(feature = "mysql")]
fn mysql_error_number(db_err: &(dyn DatabaseError + 'static)) -> Option<u16> {
    db_err
        .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
        .map(|e| e.number())
}

#[cfg(not(feature = "mysql"))]
fn mysql_error_number(_db_err: &(dyn DatabaseError + 'static)) -> Option<u16> {
    None
}
