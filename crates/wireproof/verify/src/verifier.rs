//! Transactional verifier
//!
//! Drives one verification attempt through its state machine:
//!
//! `Start → Synthesized → Created → (Read | ReadFailed) → Cleaned → Done`
//!
//! with an escape edge from every state to `Cleaned` on internal fault.
//! Whatever happens inside the attempt, every resource the synthesizer
//! created is handed to cleanup before the verdict is returned, so the
//! service is left in its pre-verification state.
//!
//! Fixture problems (nothing to exercise, unsupported key types,
//! unresolvable paths) become `Inconclusive`. Transport failures, non-2xx
//! statuses and structural mismatches become `Failed` with the full
//! exchange captured. Cleanup failures are logged and reported but never
//! override the primary outcome.

use serde_json::Value;
use wireproof_metadata::ServiceModel;
use wireproof_schema::{derive_schema, FormatVersion};
use wireproof_synth::Synthesizer;
use wireproof_types::{Diagnostic, NavigationStack, SynthesizedResource, Verdict};

use crate::error::VerifyResult;
use crate::session::{Exchange, ServiceSession};

/// One cleanup delete, attempted or skipped, for caller audit.
#[derive(Debug, Clone)]
pub struct CleanupAttempt {
    /// Resource URL the delete targeted
    pub url: String,
    /// Whether the delete came back 2xx
    pub delivered: bool,
    /// HTTP status of the delete response, when one arrived
    pub status: Option<u16>,
    /// Transport error detail, when the delete never completed
    pub note: Option<String>,
}

/// The verdict of an attempt plus its rollback audit trail.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub verdict: Verdict,
    /// Every resource the synthesizer produced for this attempt
    pub resources: Vec<SynthesizedResource>,
    /// Cleanup deletes in the order they were issued (reverse creation
    /// order, children before parents)
    pub cleanup: Vec<CleanupAttempt>,
}

/// Orchestrates verification attempts against one service.
pub struct Verifier<'m> {
    session: ServiceSession,
    model: &'m ServiceModel,
}

impl<'m> Verifier<'m> {
    pub fn new(session: ServiceSession, model: &'m ServiceModel) -> Self {
        Self { session, model }
    }

    pub fn session(&self) -> &ServiceSession {
        &self.session
    }

    /// Verify a deep-insert round-trip against an entity set.
    ///
    /// `expression` names the navigation path to populate and expand; an
    /// empty expression degrades to a plain create/read/delete probe.
    /// When the expression branches, the first branch drives the deep
    /// insert.
    pub async fn verify_deep_insert(
        &self,
        entity_set: &str,
        expression: &str,
    ) -> VerificationReport {
        let mut resources = Vec::new();
        let verdict = match self.attempt(entity_set, expression, &mut resources).await {
            Ok(verdict) => verdict,
            // Escape edge: internal/transport fault from any state.
            Err(fault) => Verdict::failed(Diagnostic::note(format!(
                "transport fault during verification: {fault}"
            ))),
        };
        let cleanup = self.cleanup(&resources).await;
        tracing::info!(
            entity_set,
            outcome = ?verdict.outcome,
            cleaned = cleanup.len(),
            "verification attempt finished"
        );
        VerificationReport {
            verdict,
            resources,
            cleanup,
        }
    }

    async fn attempt(
        &self,
        entity_set: &str,
        expression: &str,
        resources: &mut Vec<SynthesizedResource>,
    ) -> VerifyResult<Verdict> {
        let version = self.session.format_version();

        // Start -> Synthesized. Fixture selection failures are all
        // "cannot verify", never "violation".
        let Some(ty) = self.model.entity_type_for_set(entity_set) else {
            return Ok(Verdict::inconclusive(Diagnostic::note(format!(
                "metadata declares no entity set '{entity_set}'"
            ))));
        };
        let restrictions = self.model.restrictions_for(entity_set);
        if !restrictions.insertable {
            return Ok(Verdict::inconclusive(Diagnostic::note(format!(
                "entity set '{entity_set}' does not permit inserts"
            ))));
        }
        let stacks = match wireproof_navigate::resolve(self.model, ty, expression) {
            Ok(stacks) => stacks,
            Err(err) => {
                return Ok(Verdict::inconclusive(Diagnostic::note(format!(
                    "navigation expression unusable: {err}"
                ))));
            }
        };
        let stack = stacks.into_iter().next();
        if let Some(first) = stack.as_ref().and_then(|s| s.steps.first()) {
            if !restrictions.allows_deep_insert(&first.property.name) {
                return Ok(Verdict::inconclusive(Diagnostic::note(format!(
                    "deep insert through '{}' is not permitted on '{entity_set}'",
                    first.property.name
                ))));
            }
        }

        let type_name = ty.qualified_name.clone();
        let mut synthesizer = Synthesizer::new(self.model);
        let synthesis = match &stack {
            Some(stack) => synthesizer.synthesize_stack(entity_set, &type_name, stack),
            None => synthesizer.synthesize(entity_set, &type_name, &[]),
        };
        let synthesis = match synthesis {
            Ok(synthesis) => synthesis,
            Err(err) => {
                return Ok(Verdict::inconclusive(Diagnostic::note(format!(
                    "no usable fixture: {err}"
                ))));
            }
        };
        *resources = synthesis.resources.clone();

        // Synthesized -> Created.
        let root_is_media = resources.first().is_some_and(|r| r.is_media);
        let create = if root_is_media {
            self.session
                .create_media(entity_set, b"wireproof media content".to_vec())
                .await?
        } else {
            self.session.create(entity_set, &synthesis.payload).await?
        };

        // Capture whatever identifier the service returned before
        // judging the status: a failed create may still have created
        // state that cleanup must target.
        let root_id = create
            .location
            .clone()
            .or_else(|| create.json().as_ref().and_then(|v| entity_id(v, version)));
        if let (Some(root), Some(id)) = (resources.first_mut(), &root_id) {
            root.url = Some(self.session.absolute(id));
            root.etag = create.etag.clone();
        }
        if !create.is_success() {
            return Ok(Verdict::failed(diagnostic(
                &create,
                format!("create returned status {}", create.status),
            )));
        }
        let Some(root_id) = root_id else {
            return Ok(Verdict::failed(diagnostic(
                &create,
                "create succeeded but returned no resource identifier",
            )));
        };
        let root_url = self.session.absolute(&root_id);

        // Created -> Read.
        let expand = stack.as_ref().map(|s| expand_expression(s, version));
        let read = self.session.read(&root_url, expand.as_deref()).await?;
        if !read.is_success() {
            return Ok(Verdict::failed(diagnostic(
                &read,
                format!("follow-up read returned status {}", read.status),
            )));
        }
        let Some(body) = read.json() else {
            return Ok(Verdict::failed(diagnostic(
                &read,
                "follow-up read returned a non-JSON body",
            )));
        };

        // The read response names the nested entities the deep insert
        // created; harvest their identifiers so cleanup can reach them.
        self.harvest_identifiers(resources, &body, version);

        // Read -> validated.
        if let Some(stack) = &stack {
            let schema = derive_schema(stack, version);
            if let Err(mismatch) = schema.validate(&body) {
                return Ok(Verdict::failed(diagnostic(&read, mismatch.to_string())));
            }
        }
        Ok(Verdict::passed(diagnostic(
            &read,
            "create/read round-trip matched structural expectations",
        )))
    }

    /// Fill in URLs and ETags for nested resources from the read body.
    fn harvest_identifiers(
        &self,
        resources: &mut [SynthesizedResource],
        body: &Value,
        version: FormatVersion,
    ) {
        for resource in resources.iter_mut() {
            let Some(entity) = locate(body, &resource.local_path, version) else {
                continue;
            };
            if resource.url.is_none() {
                resource.url = entity_id(entity, version).map(|id| self.session.absolute(&id));
            }
            if resource.etag.is_none() {
                resource.etag = entity_etag(entity, version);
            }
        }
    }

    /// Delete every synthesized resource with a known URL, children
    /// before parents. Best-effort and independent per resource; a
    /// failed delete never aborts the remaining ones and never changes
    /// the attempt's verdict.
    async fn cleanup(&self, resources: &[SynthesizedResource]) -> Vec<CleanupAttempt> {
        let mut attempts = Vec::new();
        for resource in resources.iter().rev() {
            let Some(url) = &resource.url else {
                continue;
            };
            match self.session.delete(url, resource.etag.as_deref()).await {
                Ok(exchange) => {
                    if !exchange.is_success() {
                        tracing::warn!(
                            url = %url,
                            status = exchange.status,
                            "cleanup delete rejected"
                        );
                    }
                    attempts.push(CleanupAttempt {
                        url: url.clone(),
                        delivered: exchange.is_success(),
                        status: Some(exchange.status),
                        note: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "cleanup delete failed");
                    attempts.push(CleanupAttempt {
                        url: url.clone(),
                        delivered: false,
                        status: None,
                        note: Some(err.to_string()),
                    });
                }
            }
        }
        attempts
    }
}

fn diagnostic(exchange: &Exchange, explanation: impl Into<String>) -> Diagnostic {
    Diagnostic {
        url: Some(exchange.url.clone()),
        method: Some(exchange.method.clone()),
        request_body: exchange.request_body.clone(),
        response_status: Some(exchange.status),
        response_body: Some(exchange.response_body.clone()),
        explanation: explanation.into(),
    }
}

/// The `$expand` expression that asks the service to embed the stack's
/// path in the read response, in the encoding the generation expects.
fn expand_expression(stack: &NavigationStack, version: FormatVersion) -> String {
    let names: Vec<&str> = stack
        .steps
        .iter()
        .map(|s| s.property.name.as_str())
        .collect();
    match version {
        FormatVersion::V3 => names.join("/"),
        FormatVersion::V4 => names
            .iter()
            .rev()
            .fold(String::new(), |inner, name| {
                if inner.is_empty() {
                    (*name).to_string()
                } else {
                    format!("{name}($expand={inner})")
                }
            }),
    }
}

/// Resource identifier of one entity object in a response payload.
fn entity_id(entity: &Value, version: FormatVersion) -> Option<String> {
    let id = match version {
        FormatVersion::V4 => entity
            .get("@odata.id")
            .or_else(|| entity.get("@odata.editLink")),
        FormatVersion::V3 => entity.get("__metadata").and_then(|m| m.get("uri")),
    };
    id.and_then(Value::as_str).map(str::to_string)
}

fn entity_etag(entity: &Value, version: FormatVersion) -> Option<String> {
    let etag = match version {
        FormatVersion::V4 => entity.get("@odata.etag"),
        FormatVersion::V3 => entity.get("__metadata").and_then(|m| m.get("etag")),
    };
    etag.and_then(Value::as_str).map(str::to_string)
}

/// Walk a read payload down a synthesized resource's local path.
///
/// Numeric segments index into collections; under the V3 encoding the
/// collection lives behind a `results` wrapper.
fn locate<'a>(body: &'a Value, path: &[String], version: FormatVersion) -> Option<&'a Value> {
    let mut current = body;
    for segment in path {
        if let Ok(index) = segment.parse::<usize>() {
            let collection = match version {
                FormatVersion::V4 => current,
                FormatVersion::V3 => current.get("results")?,
            };
            current = collection.get(index)?;
        } else {
            current = current.get(segment)?;
        }
    }
    Some(current)
}
