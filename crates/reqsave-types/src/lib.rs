//! Foundation types for reqsave.
//!
//! Every other reqsave crate depends on `reqsave-types`. The types here are
//! deliberately transport-agnostic: a [`Request`] is an immutable pair of a
//! header representation and a body representation, and the two traits
//! [`HeaderSource`] and [`BodySource`] describe how each side is projected
//! into bytes.
//!
//! # Key Types
//!
//! - [`Request`]: immutable (header, body) pair, generic over both
//! - [`HeaderSource`]: yields `(key, value)` byte pairs in source order
//! - [`BodySource`]: consumes a body into a byte vector
//! - [`HeaderMultiMap`]: ordered multimap of header names to values

pub mod body;
pub mod header;
pub mod request;

pub use body::{BodySource, ReadBody};
pub use header::{first_or_default, HeaderMultiMap, HeaderSource, NoHeaders};
pub use request::Request;
