//! Wireproof transactional verifier
//!
//! The orchestrating layer of the verification core: it issues the
//! mutating round-trip a conformance check needs, validates the response
//! against derived structural expectations, and unconditionally rolls
//! back every resource it created before reporting a tri-state verdict.
//!
//! # Quick start
//!
//! ```no_run
//! use wireproof_metadata::ServiceModel;
//! use wireproof_verify::{ServiceSession, SessionConfig, Verifier};
//!
//! # async fn run(metadata_xml: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let model = ServiceModel::parse(metadata_xml)?;
//! let session = ServiceSession::new(SessionConfig::new("https://svc.example/odata"))?;
//! let verifier = Verifier::new(session, &model);
//! let report = verifier.verify_deep_insert("Customers", "Orders").await;
//! println!("{:?}", report.verdict.outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod rule;
pub mod session;
pub mod verifier;

pub use error::{VerifyError, VerifyResult};
pub use rule::{ConformanceRule, RuleRegistry};
pub use session::{Exchange, ServiceSession, SessionConfig};
pub use verifier::{CleanupAttempt, VerificationReport, Verifier};
