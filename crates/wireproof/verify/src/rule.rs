//! Conformance rule interface and registry
//!
//! Individual conformance checks live outside this workspace; they
//! implement [`ConformanceRule`] and call into the core. Discovery is an
//! explicit registry populated from a static list at process start, not
//! self-registration.

use std::collections::BTreeMap;

use async_trait::async_trait;
use wireproof_metadata::ServiceModel;

use crate::session::ServiceSession;
use crate::verifier::VerificationReport;

/// One externally supplied conformance check.
#[async_trait]
pub trait ConformanceRule: Send + Sync {
    /// Stable identifier of the rule, e.g. `"create.deep-insert"`.
    fn id(&self) -> &'static str;

    /// One-line description of the specification requirement checked.
    fn description(&self) -> &'static str;

    /// Run the check against a live service.
    ///
    /// Implementations must return an explicit tri-state verdict; a rule
    /// that finds nothing to exercise reports inconclusive.
    async fn verify(&self, session: &ServiceSession, model: &ServiceModel)
        -> VerificationReport;
}

/// Explicit mapping from rule identifier to implementation.
#[derive(Default)]
pub struct RuleRegistry {
    rules: BTreeMap<&'static str, Box<dyn ConformanceRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a static list of rules.
    pub fn from_rules(rules: Vec<Box<dyn ConformanceRule>>) -> Self {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule);
        }
        registry
    }

    pub fn register(&mut self, rule: Box<dyn ConformanceRule>) {
        self.rules.insert(rule.id(), rule);
    }

    pub fn get(&self, id: &str) -> Option<&dyn ConformanceRule> {
        self.rules.get(id).map(Box::as_ref)
    }

    /// Registered rule identifiers, sorted.
    pub fn ids(&self) -> Vec<&'static str> {
        self.rules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireproof_types::{Diagnostic, Verdict};

    struct NoopRule;

    #[async_trait]
    impl ConformanceRule for NoopRule {
        fn id(&self) -> &'static str {
            "noop"
        }

        fn description(&self) -> &'static str {
            "always inconclusive"
        }

        async fn verify(
            &self,
            _session: &ServiceSession,
            _model: &ServiceModel,
        ) -> VerificationReport {
            VerificationReport {
                verdict: Verdict::inconclusive(Diagnostic::note("nothing to exercise")),
                resources: Vec::new(),
                cleanup: Vec::new(),
            }
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = RuleRegistry::from_rules(vec![Box::new(NoopRule)]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec!["noop"]);
        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
    }
}
