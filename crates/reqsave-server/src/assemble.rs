use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use reqsave_archive::RequestSerializer;
use reqsave_saver::{
    guard, lock, CountingLimiter, Pipeline, RequestSaver, SlidingWindowLimiter, WindowLimit,
};
use reqsave_store::{
    BufferedFileSink, ByteSink, ConnectionPool, DurableFileSink, InMemoryListStore, ListSink,
    PoolConfig, RedisListStore, StreamSink, TimestampNames,
};

use crate::capture::CapturedRequest;
use crate::config::{Durability, FileSinkConfig, LimiterConfig, RedisSinkConfig, ServerConfig, SinkConfig};
use crate::error::ServerResult;

/// The saver behind the HTTP handler.
pub type DynSaver = Arc<dyn RequestSaver<CapturedRequest, Output = u64> + Send + Sync>;

type SharedSink = Box<dyn ByteSink + Send + Sync>;

/// Build the saver described by `config`.
///
/// A redis sink is pinged once here, so an unreachable server fails startup
/// rather than the first request.
pub fn build_saver(config: &ServerConfig) -> ServerResult<DynSaver> {
    let serializer = RequestSerializer::tar_with_policy(config.write_error_policy);
    let saver: DynSaver = match &config.sink {
        SinkConfig::Stream { path } => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            info!(path = %path.display(), "appending requests to stream file");
            // One writer for every request: always serialized.
            Arc::new(lock(Pipeline::new(serializer, StreamSink::new(file))))
        }
        SinkConfig::File(file) => wrap_shared(config, serializer, file_sink(file)?),
        SinkConfig::Redis(redis) => wrap_shared(config, serializer, redis_sink(redis)?),
        SinkConfig::Memory { key } => {
            info!(key = %key, "keeping requests in memory");
            let sink = ListSink::new(Arc::new(InMemoryListStore::new()), key.as_str());
            wrap_shared(config, serializer, Box::new(sink))
        }
    };
    Ok(with_limiter(config.limiter, saver))
}

/// Wrap an already built sink the same way [`build_saver`] would.
pub fn saver_for_sink<K>(config: &ServerConfig, sink: K) -> DynSaver
where
    K: ByteSink + Send + Sync + 'static,
{
    let serializer = RequestSerializer::tar_with_policy(config.write_error_policy);
    with_limiter(config.limiter, wrap_shared(config, serializer, Box::new(sink)))
}

fn wrap_shared(config: &ServerConfig, serializer: RequestSerializer, sink: SharedSink) -> DynSaver {
    let pipeline = Pipeline::new(serializer, sink);
    if config.serialize_saves {
        Arc::new(lock(pipeline))
    } else {
        Arc::new(pipeline)
    }
}

fn with_limiter(limiter: Option<LimiterConfig>, saver: DynSaver) -> DynSaver {
    match limiter {
        None => saver,
        Some(LimiterConfig::Count { max }) => {
            Arc::new(guard(CountingLimiter::new(), max).wrap(saver))
        }
        Some(LimiterConfig::Window { max, window_ms }) => Arc::new(
            guard(
                SlidingWindowLimiter::new(),
                WindowLimit::new(max, Duration::from_millis(window_ms)),
            )
            .wrap(saver),
        ),
    }
}

fn file_sink(config: &FileSinkConfig) -> ServerResult<SharedSink> {
    std::fs::create_dir_all(&config.dir)?;
    let names = TimestampNames::new(&config.dir, &config.prefix, &config.extension);
    info!(
        dir = %config.dir.display(),
        durability = ?config.durability,
        "saving requests to files"
    );
    let sink: SharedSink = match config.durability {
        Durability::Durable => Box::new(DurableFileSink::with_mode(names, config.mode).with_sync(config.sync)),
        Durability::Buffered => Box::new(BufferedFileSink::new(names).with_capacity(config.buffer_capacity)),
    };
    Ok(sink)
}

fn redis_sink(config: &RedisSinkConfig) -> ServerResult<SharedSink> {
    let pool = ConnectionPool::new(
        config.addr.as_str(),
        PoolConfig {
            max_connections: config.max_connections,
            idle_timeout: Some(Duration::from_secs(config.idle_timeout_secs)),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            io_timeout: config.io_timeout_secs.map(Duration::from_secs),
        },
    )?;
    let store = RedisListStore::new(pool, config.command);
    store.ping()?;
    info!(addr = %config.addr, key = %config.key, "saving requests to remote list");
    Ok(Box::new(ListSink::new(store, config.key.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedHeaders;
    use bytes::Bytes;
    use reqsave_archive::ArchiveReader;
    use reqsave_types::Request;

    fn captured(body: &'static str) -> CapturedRequest {
        Request::new(CapturedHeaders::default(), Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn file_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            sink: SinkConfig::File(FileSinkConfig {
                dir: dir.path().join("nested"),
                ..FileSinkConfig::default()
            }),
            ..ServerConfig::default()
        };
        let saver = build_saver(&config).unwrap();
        let written = saver.save(captured("to a file")).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let bytes = std::fs::read(&files[0]).unwrap();
        assert_eq!(bytes.len() as u64, written);
        assert_eq!(ArchiveReader::from_bytes(&bytes).unwrap().body(), Some(b"to a file".as_slice()));
    }

    #[test]
    fn buffered_file_sink_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            sink: SinkConfig::File(FileSinkConfig {
                dir: dir.path().to_path_buf(),
                durability: Durability::Buffered,
                ..FileSinkConfig::default()
            }),
            ..ServerConfig::default()
        };
        let saver = build_saver(&config).unwrap();
        saver.save(captured("a")).unwrap();
        saver.save(captured("b")).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn stream_sink_appends_every_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.tar");
        let config = ServerConfig {
            sink: SinkConfig::Stream { path: path.clone() },
            ..ServerConfig::default()
        };
        let saver = build_saver(&config).unwrap();
        let first = saver.save(captured("first")).unwrap();
        let second = saver.save(captured("second")).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), first + second);
    }

    #[test]
    fn count_limiter_from_config() {
        let config = ServerConfig {
            sink: SinkConfig::Memory { key: "k".into() },
            limiter: Some(LimiterConfig::Count { max: 1 }),
            ..ServerConfig::default()
        };
        let saver = build_saver(&config).unwrap();
        saver.save(captured("ok")).unwrap();
        assert!(saver.save(captured("nope")).unwrap_err().is_too_many());
    }

    #[test]
    fn saver_for_sink_uses_given_sink() {
        let store = Arc::new(InMemoryListStore::new());
        let config = ServerConfig {
            serialize_saves: true,
            ..ServerConfig::default()
        };
        let saver = saver_for_sink(&config, ListSink::new(Arc::clone(&store), "saved"));
        saver.save(captured("kept")).unwrap();
        let blobs = store.values(b"saved").unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(ArchiveReader::from_bytes(&blobs[0]).unwrap().body(), Some(b"kept".as_slice()));
    }

    #[test]
    fn unreachable_redis_fails_startup() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let config = ServerConfig {
            sink: SinkConfig::Redis(RedisSinkConfig {
                addr,
                connect_timeout_ms: 200,
                ..RedisSinkConfig::default()
            }),
            ..ServerConfig::default()
        };
        assert!(build_saver(&config).is_err());
    }
}
