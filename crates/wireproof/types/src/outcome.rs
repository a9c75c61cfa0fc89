//! Tri-state verification verdicts
//!
//! `Inconclusive` is a first-class outcome: a rule that finds no
//! exercisable fixture in the service's metadata reports "cannot verify",
//! never "violation". `Outcome` has no `Default` and `Verdict` cannot be
//! built without one, so a code path that forgets to decide does not
//! compile.

use serde::{Deserialize, Serialize};

/// Result of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The service behaved as the specification requires
    Passed,
    /// The service's observed behavior violates the specification
    Failed,
    /// No suitable fixture exists to exercise this check
    Inconclusive,
}

/// Diagnostic detail captured alongside an outcome.
///
/// Carries enough of the request/response exchange to reproduce a failure
/// manually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Target URL of the decisive request, if one was issued
    pub url: Option<String>,
    /// HTTP method of the decisive request
    pub method: Option<String>,
    /// Request body as sent
    pub request_body: Option<String>,
    /// HTTP status of the decisive response
    pub response_status: Option<u16>,
    /// Raw response body
    pub response_body: Option<String>,
    /// Human-readable explanation of the outcome
    pub explanation: String,
}

impl Diagnostic {
    /// A diagnostic with only an explanation, for attempts that never
    /// issued a request.
    pub fn note(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            ..Self::default()
        }
    }
}

/// A tri-state outcome plus its diagnostic detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub detail: Diagnostic,
}

impl Verdict {
    pub fn passed(detail: Diagnostic) -> Self {
        Self {
            outcome: Outcome::Passed,
            detail,
        }
    }

    pub fn failed(detail: Diagnostic) -> Self {
        Self {
            outcome: Outcome::Failed,
            detail,
        }
    }

    pub fn inconclusive(detail: Diagnostic) -> Self {
        Self {
            outcome: Outcome::Inconclusive,
            detail,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconclusive_is_distinct_from_failed() {
        let v = Verdict::inconclusive(Diagnostic::note("no fixture"));
        assert_eq!(v.outcome, Outcome::Inconclusive);
        assert_ne!(v.outcome, Outcome::Failed);
        assert!(!v.is_passed());
    }

    #[test]
    fn test_diagnostic_note_has_no_request_detail() {
        let d = Diagnostic::note("nothing issued");
        assert!(d.url.is_none());
        assert!(d.response_status.is_none());
        assert_eq!(d.explanation, "nothing issued");
    }

    #[test]
    fn test_verdict_serializes() {
        let v = Verdict::failed(Diagnostic {
            url: Some("http://svc/Customers".into()),
            method: Some("POST".into()),
            request_body: Some("{}".into()),
            response_status: Some(500),
            response_body: Some("boom".into()),
            explanation: "create returned 500".into(),
        });
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("Failed"));
        assert!(json.contains("create returned 500"));
    }
}
