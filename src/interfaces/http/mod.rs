//! HTTP REST API and live stream
//!
//! - `common`: response envelope, validated JSON extractor
//! - `modules`: handlers grouped by resource
//! - `router`: router assembly and OpenAPI document

pub mod common;
pub mod modules;
pub mod router;

pub use router::{create_api_router, ApiDoc, AppState};
