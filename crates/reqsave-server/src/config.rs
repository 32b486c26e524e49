use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use reqsave_archive::WriteErrorPolicy;
use reqsave_store::PushCommand;

use crate::capture::OversizePolicy;
use crate::error::{ServerError, ServerResult};

/// Server configuration, loaded from TOML.
///
/// ```toml
/// bind_addr = "0.0.0.0:8888"
/// body_limit = 65536
/// oversize = "reject"
///
/// [sink]
/// type = "file"
/// dir = "/var/lib/reqsave"
///
/// [limiter]
/// type = "window"
/// max = 100
/// window_ms = 1000
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest body, in bytes, that is captured.
    pub body_limit: usize,
    /// What to do with a body larger than `body_limit`.
    pub oversize: OversizePolicy,
    pub write_error_policy: WriteErrorPolicy,
    /// Run saves one at a time.
    pub serialize_saves: bool,
    pub sink: SinkConfig,
    pub limiter: Option<LimiterConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8888)),
            body_limit: 64 * 1024,
            oversize: OversizePolicy::default(),
            write_error_policy: WriteErrorPolicy::default(),
            serialize_saves: false,
            sink: SinkConfig::default(),
            limiter: None,
        }
    }
}

impl ServerConfig {
    /// Load a configuration file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }
}

/// Where saved requests go.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// One file per request.
    File(FileSinkConfig),
    /// Append every request to a single file.
    Stream { path: PathBuf },
    /// Push every request onto a list on a RESP server.
    Redis(RedisSinkConfig),
    /// Keep requests in process memory.
    Memory {
        #[serde(default = "default_list_key")]
        key: String,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self::File(FileSinkConfig::default())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Temporary file renamed into place.
    #[default]
    Durable,
    /// Buffered writes, flushed and closed, never synced.
    Buffered,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    /// Permission bits of each file.
    pub mode: u32,
    pub durability: Durability,
    pub buffer_capacity: usize,
    /// fsync before rename (durable mode only).
    pub sync: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("requests"),
            prefix: "req-".into(),
            extension: "tar".into(),
            mode: reqsave_store::fs::DEFAULT_FILE_MODE,
            durability: Durability::default(),
            buffer_capacity: reqsave_store::fs::DEFAULT_BUFFER_CAPACITY,
            sync: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSinkConfig {
    pub addr: String,
    pub key: String,
    pub command: PushCommand,
    #[serde(alias = "max_idle")]
    pub max_connections: u32,
    pub idle_timeout_secs: u64,
    pub connect_timeout_ms: u64,
    pub io_timeout_secs: Option<u64>,
}

impl Default for RedisSinkConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".into(),
            key: default_list_key(),
            command: PushCommand::default(),
            max_connections: 3,
            idle_timeout_secs: 240,
            connect_timeout_ms: 5000,
            io_timeout_secs: Some(10),
        }
    }
}

fn default_list_key() -> String {
    "reqsave".into()
}

/// Admission limit in front of the saver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LimiterConfig {
    /// Reject every request after the first `max`.
    Count { max: u64 },
    /// At most `max` requests per `window_ms`.
    Window { max: usize, window_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8888".parse::<SocketAddr>().unwrap());
        assert_eq!(c.body_limit, 65536);
        assert_eq!(c.oversize, OversizePolicy::Reject);
        assert_eq!(c.write_error_policy, WriteErrorPolicy::Abort);
        assert!(!c.serialize_saves);
        assert!(c.limiter.is_none());
        assert!(matches!(c.sink, SinkConfig::File(ref f) if f.durability == Durability::Durable));
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn full_toml() {
        let c = ServerConfig::from_toml(
            r#"
            bind_addr = "0.0.0.0:9000"
            body_limit = 1024
            oversize = "truncate"
            write_error_policy = "collect"
            serialize_saves = true

            [sink]
            type = "redis"
            addr = "cache:6379"
            key = "inbox"
            command = "rpush"

            [limiter]
            type = "window"
            max = 10
            window_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.body_limit, 1024);
        assert_eq!(c.oversize, OversizePolicy::Truncate);
        assert_eq!(c.write_error_policy, WriteErrorPolicy::Collect);
        assert!(c.serialize_saves);
        match c.sink {
            SinkConfig::Redis(r) => {
                assert_eq!(r.addr, "cache:6379");
                assert_eq!(r.key, "inbox");
                assert_eq!(r.command, PushCommand::Rpush);
                assert_eq!(r.max_connections, 3);
                assert_eq!(r.connect_timeout_ms, 5000);
            }
            other => panic!("wrong sink: {other:?}"),
        }
        assert_eq!(c.limiter, Some(LimiterConfig::Window { max: 10, window_ms: 500 }));
    }

    #[test]
    fn redis_pool_size_accepts_max_idle() {
        let c = ServerConfig::from_toml(
            r#"
            [sink]
            type = "redis"
            max_idle = 8
            connect_timeout_ms = 250
            "#,
        )
        .unwrap();
        match c.sink {
            SinkConfig::Redis(r) => {
                assert_eq!(r.max_connections, 8);
                assert_eq!(r.connect_timeout_ms, 250);
                assert_eq!(r.addr, "127.0.0.1:6379");
            }
            other => panic!("wrong sink: {other:?}"),
        }
    }

    #[test]
    fn file_sink_toml() {
        let c = ServerConfig::from_toml(
            r#"
            [sink]
            type = "file"
            dir = "/tmp/saved"
            durability = "buffered"
            mode = 0o640
            "#,
        )
        .unwrap();
        let SinkConfig::File(f) = c.sink else { panic!("wrong sink") };
        assert_eq!(f.dir, PathBuf::from("/tmp/saved"));
        assert_eq!(f.durability, Durability::Buffered);
        assert_eq!(f.mode, 0o640);
        assert_eq!(f.extension, "tar");
    }

    #[test]
    fn memory_and_stream_sinks() {
        let c = ServerConfig::from_toml("[sink]\ntype = \"memory\"\n").unwrap();
        assert_eq!(c.sink, SinkConfig::Memory { key: "reqsave".into() });
        let c = ServerConfig::from_toml("[sink]\ntype = \"stream\"\npath = \"all.tar\"\n").unwrap();
        assert_eq!(c.sink, SinkConfig::Stream { path: "all.tar".into() });
    }

    #[test]
    fn unknown_sink_is_config_error() {
        let err = ServerConfig::from_toml("[sink]\ntype = \"tape\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqsave.toml");
        std::fs::write(&path, "body_limit = 10\n[limiter]\ntype = \"count\"\nmax = 5\n").unwrap();
        let c = ServerConfig::load(&path).unwrap();
        assert_eq!(c.body_limit, 10);
        assert_eq!(c.limiter, Some(LimiterConfig::Count { max: 5 }));
        assert!(ServerConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
