//! # restcheck_core
//!
//! HTTP exchange model and capture ingestion for restcheck.
//!
//! This crate provides:
//! - **Samples**: validated request/response pairs with case-insensitive headers
//! - **Capture ingestion**: JSON, JSON lines and YAML capture files, or directories of them
//! - **Archetype resolution**: document / collection / store / controller classification
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use restcheck_core::{ArchetypeResolver, CaptureReader, RouteRule, Archetype};
//!
//! let resolver = ArchetypeResolver::with_routes(&[
//!     RouteRule::new("/carts/*/checkout", Archetype::Controller),
//! ])?;
//! let mut reader = CaptureReader::new(resolver);
//! let batch = reader.read_path(Path::new("captures/"))?;
//!
//! for rejection in batch.rejected() {
//!     println!("{}: {}", rejection.sample_id, rejection.reason);
//! }
//! ```

pub mod capture;
pub mod classify;
pub mod error;
pub mod model;

pub use capture::{CaptureBatch, CaptureFormat, CaptureReader, CaptureRecord, Ingested, Rejection};
pub use classify::{ArchetypeResolver, RouteRule};
pub use error::{CoreError, CoreResult};
pub use model::{is_json_media_type, Archetype, Body, Headers, Method, Sample, StatusCode};
