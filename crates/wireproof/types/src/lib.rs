//! Wireproof shared data model
//!
//! Types that cross crate boundaries in the verification core: the entity
//! type graph parsed from a metadata document, resolved navigation stacks,
//! descriptors for resources created during synthesis, capability
//! restrictions, and the tri-state verification verdict.

pub mod model;
pub mod outcome;

pub use model::{
    EntityType, Multiplicity, NavigationProperty, NavigationStack, NavigationStep,
    PrimitiveType, Property, Restrictions, SynthesizedResource, UnsupportedPrimitive,
};
pub use outcome::{Diagnostic, Outcome, Verdict};
