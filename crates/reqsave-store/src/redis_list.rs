//! List pushes to Redis (or any server speaking its protocol: Valkey,
//! Pelikan) through a pooled `redis` client.

use std::time::Duration;

use redis::{ConnectionLike, RedisError, Value};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::list::ListStore;

/// Which end of the list new values go to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushCommand {
    #[default]
    Lpush,
    Rpush,
}

impl PushCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lpush => "LPUSH",
            Self::Rpush => "RPUSH",
        }
    }
}

/// Pool sizing and timeouts.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on open connections; a push waits for a free one.
    pub max_connections: u32,
    /// Idle connections older than this are closed by the pool.
    pub idle_timeout: Option<Duration>,
    /// How long a checkout may wait for a connection before failing.
    pub connect_timeout: Duration,
    /// Read/write timeout applied to every socket.
    pub io_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 3,
            idle_timeout: Some(Duration::from_secs(240)),
            connect_timeout: Duration::from_secs(5),
            io_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Opens client connections with the configured timeouts.
#[derive(Debug)]
struct ClientManager {
    client: redis::Client,
    connect_timeout: Duration,
    io_timeout: Option<Duration>,
}

impl r2d2::ManageConnection for ClientManager {
    type Connection = redis::Connection;
    type Error = RedisError;

    fn connect(&self) -> Result<redis::Connection, RedisError> {
        let conn = self.client.get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(self.io_timeout)?;
        conn.set_write_timeout(self.io_timeout)?;
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut redis::Connection) -> Result<(), RedisError> {
        redis::cmd("PING").query::<()>(conn)
    }

    fn has_broken(&self, conn: &mut redis::Connection) -> bool {
        !conn.is_open()
    }
}

/// Routes pool connection failures to the log.
#[derive(Debug)]
struct LogErrors {
    addr: String,
}

impl r2d2::HandleError<RedisError> for LogErrors {
    fn handle_error(&self, error: RedisError) {
        warn!(addr = %self.addr, error = %error, "store connection failed");
    }
}

/// Pool of connections to one server.
///
/// Connections are opened lazily on first checkout and returned on drop.
/// A connection the client saw drop is discarded instead of reused.
pub struct ConnectionPool {
    addr: String,
    pool: r2d2::Pool<ClientManager>,
}

impl ConnectionPool {
    /// `addr` is `host:port` or a full `redis://` URL.
    pub fn new(addr: impl Into<String>, config: PoolConfig) -> StoreResult<Self> {
        let addr = addr.into();
        let url = if addr.contains("://") {
            addr.clone()
        } else {
            format!("redis://{addr}/")
        };
        let manager = ClientManager {
            client: redis::Client::open(url)?,
            connect_timeout: config.connect_timeout.max(Duration::from_millis(1)),
            io_timeout: config.io_timeout.filter(|t| !t.is_zero()),
        };
        let pool = r2d2::Pool::builder()
            .max_size(config.max_connections.max(1))
            .min_idle(Some(0))
            .idle_timeout(config.idle_timeout.filter(|t| !t.is_zero()))
            .connection_timeout(manager.connect_timeout)
            .test_on_check_out(false)
            .error_handler(Box::new(LogErrors { addr: addr.clone() }))
            .build_unchecked(manager);
        Ok(Self { addr, pool })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of idle connections currently held.
    pub fn idle_count(&self) -> usize {
        self.pool.state().idle_connections as usize
    }

    fn get(&self) -> StoreResult<r2d2::PooledConnection<ClientManager>> {
        self.pool.get().map_err(|source| StoreError::Connect {
            addr: self.addr.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("ConnectionPool")
            .field("addr", &self.addr)
            .field("connections", &state.connections)
            .field("idle", &state.idle_connections)
            .finish()
    }
}

/// Error replies become [`StoreError::Remote`]; transport and parse failures
/// stay [`StoreError::Redis`].
fn reply_error(e: RedisError) -> StoreError {
    if e.code().is_some() {
        StoreError::Remote(e.to_string())
    } else {
        StoreError::Redis(e)
    }
}

/// [`ListStore`] backed by a Redis server.
///
/// A push succeeds only when the server answers with a non-negative integer
/// (the new list length).
#[derive(Debug)]
pub struct RedisListStore {
    pool: ConnectionPool,
    command: PushCommand,
}

impl RedisListStore {
    pub fn new(pool: ConnectionPool, command: PushCommand) -> Self {
        Self { pool, command }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Round-trip a `PING`; the server must answer `PONG`.
    pub fn ping(&self) -> StoreResult<()> {
        let mut conn = self.pool.get()?;
        match redis::cmd("PING").query::<Value>(&mut *conn).map_err(reply_error)? {
            Value::SimpleString(s) if s == "PONG" => Ok(()),
            other => Err(StoreError::Protocol(format!("unexpected PING reply {other:?}"))),
        }
    }
}

impl ListStore for RedisListStore {
    fn push(&self, key: &[u8], value: &[u8]) -> StoreResult<u64> {
        let mut conn = self.pool.get()?;
        let reply = redis::cmd(self.command.as_str())
            .arg(key)
            .arg(value)
            .query::<Value>(&mut *conn)
            .map_err(reply_error)?;
        match reply {
            Value::Int(n) if n >= 0 => Ok(n as u64),
            other => Err(StoreError::Protocol(format!(
                "unexpected {} reply {other:?}",
                self.command.as_str()
            ))),
        }
    }
}
