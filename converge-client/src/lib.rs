//! # converge-client
//!
//! Read-only client for the resource server's manifest surface.
//!
//! [`ManifestSource`] is the seam the sync executor consumes;
//! [`HttpManifestClient`] implements it over blocking HTTP with bounded
//! timeouts. A missing manifest (HTTP 404) is a soft condition reported as
//! `Ok(None)`; every other failure is a typed [`ClientError`].

pub mod error;
pub mod http;
pub mod source;

pub use error::ClientError;
pub use http::HttpManifestClient;
pub use source::{ManifestEntry, ManifestSource, RemoteResource, ServiceMetadata};
