//! User verification handler
//!
//! Presents proposed tables for confirmation through a Verifier
//! collaborator. Verification is a critical task kind: if the verifier
//! errors (or there is nothing to approve), the plan must abort rather
//! than run a query against unconfirmed schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use queryflow_core::handler::{HandlerError, ResolvedInput, TaskHandler};
use queryflow_core::types::{TaskKind, TaskResult};

use super::{find_field, string_items};
use crate::collaborator::CollaboratorError;

/// Minimum relevance for silent auto-selection
const AUTO_SELECT_THRESHOLD: f64 = 0.7;

/// One ranked table offered for approval
#[derive(Debug, Clone)]
pub struct TableSuggestion {
    pub table_name: String,
    pub relevance_score: f64,
}

/// What the verifier is asked to confirm
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Ranked suggestions from schema discovery
    pub suggestions: Vec<TableSuggestion>,
    /// Raw discovery list, used when no ranked suggestions exist
    pub discovered_tables: Vec<String>,
    /// Similarity-matched tables, the last resort
    pub matched_tables: Vec<String>,
}

/// The verifier's decision
#[derive(Debug, Clone)]
pub struct VerificationDecision {
    /// Tables approved for query generation
    pub approved_tables: Vec<String>,
    /// How the selection was made (for the response payload)
    pub selection_method: String,
}

/// Interactive confirmation seam
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn confirm(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationDecision, CollaboratorError>;
}

/// Default verifier: approves the top suggestion without interaction,
/// falling back through discovery and similarity candidates.
pub struct AutoApproveVerifier;

#[async_trait]
impl Verifier for AutoApproveVerifier {
    async fn confirm(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationDecision, CollaboratorError> {
        if let Some(top) = request.suggestions.first() {
            let method = if top.relevance_score > AUTO_SELECT_THRESHOLD {
                "auto_selected"
            } else {
                "default_first"
            };
            tracing::info!(
                table = %top.table_name,
                score = top.relevance_score,
                method,
                "auto-approving top table suggestion"
            );
            return Ok(VerificationDecision {
                approved_tables: vec![top.table_name.clone()],
                selection_method: method.to_string(),
            });
        }

        if let Some(first) = request.discovered_tables.first() {
            return Ok(VerificationDecision {
                approved_tables: vec![first.clone()],
                selection_method: "discovered_fallback".to_string(),
            });
        }

        if let Some(first) = request.matched_tables.first() {
            return Ok(VerificationDecision {
                approved_tables: vec![first.clone()],
                selection_method: "similarity_fallback".to_string(),
            });
        }

        Err(CollaboratorError::Execution(
            "no tables available for selection".to_string(),
        ))
    }
}

pub struct UserVerificationHandler {
    verifier: Arc<dyn Verifier>,
}

impl UserVerificationHandler {
    pub fn new(verifier: Arc<dyn Verifier>) -> Self {
        Self { verifier }
    }
}

fn parse_suggestions(input: &ResolvedInput) -> Vec<TableSuggestion> {
    find_field(input, "table_suggestions")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(TableSuggestion {
                        table_name: item.get("table_name")?.as_str()?.to_string(),
                        relevance_score: item
                            .get("relevance_score")
                            .and_then(|v| v.as_f64())
                            .unwrap_or(0.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl TaskHandler for UserVerificationHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::UserVerification
    }

    async fn execute(&self, input: ResolvedInput) -> Result<TaskResult, HandlerError> {
        let request = VerificationRequest {
            suggestions: parse_suggestions(&input),
            discovered_tables: string_items(find_field(&input, "discovered_tables")),
            matched_tables: string_items(find_field(&input, "matched_tables")),
        };

        let had_suggestions = !request.suggestions.is_empty();
        let decision = self
            .verifier
            .confirm(request)
            .await
            .map_err(|e| HandlerError::Execution(e.to_string()))?;

        Ok(TaskResult::from_pairs([
            ("approved_tables", json!(decision.approved_tables)),
            ("confirmed_tables", json!(decision.approved_tables)),
            ("selection_method", json!(decision.selection_method)),
            (
                "confidence",
                json!(if had_suggestions { "high" } else { "medium" }),
            ),
        ]))
    }
}
