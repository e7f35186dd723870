//! HTTP layer for the Workers AI REST API
//!
//! This module handles:
//! - Connection pooling and client management
//! - Run URL and query string assembly
//! - Error mapping with request ID correlation
//! - Server-Sent Event streams for streamed calls

pub mod client;
pub mod error;

pub use client::RestTransport;
pub use error::map_http_error;
