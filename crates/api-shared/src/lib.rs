//! # API Shared
//!
//! Shared request/response types for the MediLingua APIs.
//!
//! Contains:
//! - Wire DTOs (`wire` module) with serde + OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` so that the wire shape is defined in exactly one
//! place.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
