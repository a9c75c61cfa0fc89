//! Wireproof metadata model
//!
//! Parses a service's CSDL metadata document into an immutable, navigable
//! type graph (`ServiceModel`), answers fixture-search queries over it,
//! and derives per-entity-set capability restrictions from vocabulary
//! annotations.
//!
//! The model is the leaf dependency of the verification core: it performs
//! no I/O and, once parsed, is safe to share read-only across concurrent
//! verification attempts.

pub mod error;
pub mod model;
mod parser;

pub use error::{MetadataError, MetadataResult};
pub use model::{ModelConfig, ServiceModel, TypeFilter};
