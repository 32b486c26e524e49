use axum::body::Body;
use axum::http::{header, HeaderMap};
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use reqsave_types::{HeaderSource, Request};

use crate::error::{ServerError, ServerResult};

/// What the capture adapter does with a body over its limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Keep the first `limit` bytes and drop the rest.
    Truncate,
    /// Fail the request with [`ServerError::PayloadTooLarge`].
    #[default]
    Reject,
}

/// Transport headers as a [`HeaderSource`].
///
/// Pairs come out in `HeaderMap` iteration order, one per value, with names
/// as the transport normalized them (lowercase).
#[derive(Clone, Debug, Default)]
pub struct CapturedHeaders(pub HeaderMap);

impl HeaderSource for CapturedHeaders {
    fn for_each_pair(&self, visit: &mut dyn FnMut(&[u8], &[u8])) {
        for (name, value) in &self.0 {
            visit(name.as_str().as_bytes(), value.as_bytes());
        }
    }
}

/// A request as handed to the saver.
pub type CapturedRequest = Request<CapturedHeaders, Bytes>;

/// Result of a capture.
#[derive(Debug)]
pub struct Captured {
    pub request: CapturedRequest,
    /// Bytes past the limit were dropped.
    pub truncated: bool,
}

/// Converts an inbound HTTP request into a [`CapturedRequest`], reading at
/// most `limit` body bytes.
#[derive(Clone, Copy, Debug)]
pub struct CaptureAdapter {
    limit: usize,
    policy: OversizePolicy,
}

impl CaptureAdapter {
    pub fn new(limit: usize, policy: OversizePolicy) -> Self {
        Self { limit, policy }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> OversizePolicy {
        self.policy
    }

    pub async fn convert(&self, request: axum::extract::Request) -> ServerResult<Captured> {
        let (parts, body) = request.into_parts();

        if self.policy == OversizePolicy::Reject {
            let declared = parts
                .headers
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            if declared.is_some_and(|len| len > self.limit as u64) {
                return Err(ServerError::PayloadTooLarge { limit: self.limit });
            }
        }

        let (bytes, truncated) = read_limited(body, self.limit).await?;
        if truncated {
            match self.policy {
                OversizePolicy::Reject => {
                    return Err(ServerError::PayloadTooLarge { limit: self.limit });
                }
                OversizePolicy::Truncate => {
                    warn!(
                        limit = self.limit,
                        method = %parts.method,
                        uri = %parts.uri,
                        "request body truncated"
                    );
                }
            }
        }

        Ok(Captured {
            request: Request::new(CapturedHeaders(parts.headers), bytes),
            truncated,
        })
    }
}

/// Buffer up to `limit` bytes of `body`. The flag is set when the body held
/// more; reading stops at the first byte past the limit.
async fn read_limited(mut body: Body, limit: usize) -> ServerResult<(Bytes, bool)> {
    let mut buf = BytesMut::new();
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| ServerError::Body(e.to_string()))?;
        let Ok(data) = frame.into_data() else {
            continue;
        };
        let room = limit - buf.len();
        if data.len() > room {
            buf.extend_from_slice(&data[..room]);
            return Ok((buf.freeze(), true));
        }
        buf.extend_from_slice(&data);
    }
    Ok((buf.freeze(), false))
}
