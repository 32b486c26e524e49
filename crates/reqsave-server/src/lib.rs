//! HTTP front end for reqsave.
//!
//! Every request that is not `GET /v1/health` is captured (headers plus at
//! most `body_limit` body bytes), serialized into a tar archive, and handed
//! to the configured sink. The client sees `200 saved`, `429` when the
//! admission guard rejects, `413` for an oversized body under the reject
//! policy, and an opaque `500` otherwise.

pub mod assemble;
pub mod capture;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use assemble::{build_saver, saver_for_sink, DynSaver};
pub use capture::{CaptureAdapter, Captured, CapturedHeaders, CapturedRequest, OversizePolicy};
pub use config::{Durability, FileSinkConfig, LimiterConfig, RedisSinkConfig, ServerConfig, SinkConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse};
pub use server::ReqSaveServer;
