//! Lead API abstraction
//!
//! The import pipeline talks to the CRM backend only through `LeadApi`:
//! - `GraphqlLeadApi` for production (create + assign mutations over HTTP)
//! - `MockLeadApi` for tests and dry runs (deterministic, no network)
//!
//! Configuration via LEAD_API_BACKEND env variable:
//! - "graphql" → GraphqlLeadApi (default)
//! - "mock" → MockLeadApi

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::Config;
use crate::types::LeadInput;

/// Tally label for leads the backend assigned without naming an RM
pub const UNASSIGNED_LABEL: &str = "(unassigned)";

/// GraphQL error code for the fatal no-assignee condition
const NO_ELIGIBLE_ASSIGNEE_CODE: &str = "NO_ELIGIBLE_ASSIGNEE";

/// Lowercase phrases the backend uses when nobody can receive a lead
const NO_ASSIGNEE_PHRASES: &[&str] = &[
    "no eligible assignee",
    "no assignees",
    "no active rm",
    "no rm available",
    "no rms available",
];

/// Error from a lead API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeadApiError {
    /// Nobody can receive assignments; the whole run must stop
    #[error("{0}")]
    NoEligibleAssignee(String),
    /// Backend rejected this particular lead
    #[error("{0}")]
    Rejected(String),
    #[error("lead API request failed: {0}")]
    Transport(String),
    #[error("Create lead returned no id")]
    MissingId,
}

impl LeadApiError {
    /// Classify a backend error message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_no_assignee_message(&message) {
            LeadApiError::NoEligibleAssignee(message)
        } else {
            LeadApiError::Rejected(message)
        }
    }

    /// Run-level failure rather than a problem with one row
    pub fn is_fatal(&self) -> bool {
        matches!(self, LeadApiError::NoEligibleAssignee(_))
    }
}

/// Whether a backend message reports that no assignee is available.
///
/// Only used when the backend gives no structured error code. The wording is
/// backend-specific; keep every phrase in `NO_ASSIGNEE_PHRASES`.
pub fn is_no_assignee_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    NO_ASSIGNEE_PHRASES.iter().any(|p| lower.contains(p))
}

/// Remote lead operations consumed by the importer
#[async_trait]
pub trait LeadApi: Send + Sync {
    /// Create a lead and return its id
    async fn create_lead(&self, input: &LeadInput) -> Result<String, LeadApiError>;

    /// Assign a created lead and return the assignee's name
    async fn assign_lead(&self, lead_id: &str) -> Result<String, LeadApiError>;

    /// Get the name of this implementation
    fn name(&self) -> &'static str;
}

// ==========================================================================
// GraphqlLeadApi Implementation
// ==========================================================================

const CREATE_LEAD_MUTATION: &str = "mutation CreateIpkLeadd($input: CreateIpkLeaddInput!) { createIpkLeadd(input: $input) { id } }";
const ASSIGN_LEAD_MUTATION: &str = "mutation AssignLead($id: ID!) { assignLead(id: $id) { id assignedRM } }";

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    extensions: Option<serde_json::Value>,
}

impl GraphqlError {
    fn into_lead_error(self) -> LeadApiError {
        let code = self
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(|c| c.as_str());
        if code == Some(NO_ELIGIBLE_ASSIGNEE_CODE) {
            LeadApiError::NoEligibleAssignee(self.message)
        } else {
            LeadApiError::from_message(self.message)
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateLeadData {
    #[serde(rename = "createIpkLeadd")]
    create_ipk_leadd: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct AssignedLead {
    #[serde(rename = "assignedRM")]
    assigned_rm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignLeadData {
    #[serde(rename = "assignLead")]
    assign_lead: Option<AssignedLead>,
}

/// Lead API backed by the CRM GraphQL endpoint
pub struct GraphqlLeadApi {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl GraphqlLeadApi {
    pub fn new(url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lead-import/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: url.to_string(),
            token,
            client,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> Result<T, LeadApiError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LeadApiError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LeadApiError::Transport(e.to_string()))?;

        // GraphQL servers may answer errors with a non-2xx status and a JSON body
        let parsed: GraphqlResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(LeadApiError::Transport(format!("HTTP {}", status)));
            }
            Err(e) => return Err(LeadApiError::Transport(format!("invalid response: {}", e))),
        };

        if let Some(error) = parsed.errors.and_then(|errs| errs.into_iter().next()) {
            return Err(error.into_lead_error());
        }
        parsed
            .data
            .ok_or_else(|| LeadApiError::Transport("response had no data".to_string()))
    }
}

#[async_trait]
impl LeadApi for GraphqlLeadApi {
    async fn create_lead(&self, input: &LeadInput) -> Result<String, LeadApiError> {
        let data: CreateLeadData = self
            .execute(CREATE_LEAD_MUTATION, json!({ "input": input }))
            .await?;
        data.create_ipk_leadd
            .and_then(|lead| lead.id)
            .filter(|id| !id.is_empty())
            .ok_or(LeadApiError::MissingId)
    }

    async fn assign_lead(&self, lead_id: &str) -> Result<String, LeadApiError> {
        let data: AssignLeadData = self
            .execute(ASSIGN_LEAD_MUTATION, json!({ "id": lead_id }))
            .await?;
        Ok(data
            .assign_lead
            .and_then(|lead| lead.assigned_rm)
            .filter(|rm| !rm.trim().is_empty())
            .unwrap_or_else(|| UNASSIGNED_LABEL.to_string()))
    }

    fn name(&self) -> &'static str {
        "graphql"
    }
}

// ==========================================================================
// MockLeadApi Implementation
// ==========================================================================

/// Deterministic in-memory lead API.
///
/// Assignees rotate round-robin. Individual phones can be rejected at
/// creation, and specific create attempts (1-based) can be made to fail
/// assignment with the no-assignee error.
pub struct MockLeadApi {
    assignees: Vec<String>,
    rejected_phones: HashMap<String, String>,
    fatal_attempts: HashSet<usize>,
    attempts: AtomicUsize,
    assigned: AtomicUsize,
    attempt_by_id: Mutex<HashMap<String, usize>>,
}

impl MockLeadApi {
    pub fn new() -> Self {
        Self::with_assignees(&["Ramya", "Haripriya", "Bharath"])
    }

    pub fn with_assignees(names: &[&str]) -> Self {
        Self {
            assignees: names.iter().map(|n| n.to_string()).collect(),
            rejected_phones: HashMap::new(),
            fatal_attempts: HashSet::new(),
            attempts: AtomicUsize::new(0),
            assigned: AtomicUsize::new(0),
            attempt_by_id: Mutex::new(HashMap::new()),
        }
    }

    /// Reject creation of any lead with this phone
    #[cfg(test)]
    pub fn reject_phone(mut self, phone: &str, reason: &str) -> Self {
        self.rejected_phones.insert(phone.to_string(), reason.to_string());
        self
    }

    /// Fail assignment of the lead created by the `attempt`-th create call
    #[cfg(test)]
    pub fn fatal_on_attempt(mut self, attempt: usize) -> Self {
        self.fatal_attempts.insert(attempt);
        self
    }

    /// Number of create calls made so far
    #[cfg(test)]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MockLeadApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadApi for MockLeadApi {
    async fn create_lead(&self, input: &LeadInput) -> Result<String, LeadApiError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::task::yield_now().await;

        if let Some(reason) = self.rejected_phones.get(&input.phone) {
            return Err(LeadApiError::from_message(reason.clone()));
        }

        let id = format!("lead-{}", attempt);
        self.attempt_by_id.lock().insert(id.clone(), attempt);
        Ok(id)
    }

    async fn assign_lead(&self, lead_id: &str) -> Result<String, LeadApiError> {
        tokio::task::yield_now().await;

        let attempt = self
            .attempt_by_id
            .lock()
            .get(lead_id)
            .copied()
            .ok_or_else(|| LeadApiError::Rejected(format!("Lead {} not found", lead_id)))?;
        if self.fatal_attempts.contains(&attempt) {
            return Err(LeadApiError::from_message("No active RMs available for assignment"));
        }
        if self.assignees.is_empty() {
            return Ok(UNASSIGNED_LABEL.to_string());
        }

        let n = self.assigned.fetch_add(1, Ordering::SeqCst);
        Ok(self.assignees[n % self.assignees.len()].clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// Factory function
// ==========================================================================

/// Create the lead API selected by `config.lead_api_backend`
pub fn create_lead_api(config: &Config) -> anyhow::Result<Arc<dyn LeadApi>> {
    match config.lead_api_backend.as_str() {
        "graphql" => {
            tracing::info!("Using GraphqlLeadApi at {}", config.lead_api_url);
            Ok(Arc::new(GraphqlLeadApi::new(&config.lead_api_url, config.lead_api_token.clone())?))
        }
        "mock" => {
            tracing::info!("Using MockLeadApi");
            Ok(Arc::new(MockLeadApi::new()))
        }
        other => {
            tracing::warn!("Unknown LEAD_API_BACKEND '{}', using mock", other);
            Ok(Arc::new(MockLeadApi::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(phone: &str) -> LeadInput {
        LeadInput {
            first_name: "Test".to_string(),
            last_name: "Lead".to_string(),
            phone: phone.to_string(),
            lead_source: "meta".to_string(),
            email: None,
            remark: None,
            location: None,
            approach_at: None,
            client_qa: None,
        }
    }

    #[test]
    fn test_no_assignee_predicate() {
        assert!(is_no_assignee_message("No active RMs available"));
        assert!(is_no_assignee_message("Assignment failed: no eligible assignee"));
        assert!(!is_no_assignee_message("Phone already exists"));
    }

    #[test]
    fn test_from_message_classifies_fatal() {
        assert!(LeadApiError::from_message("No assignees configured").is_fatal());
        assert!(!LeadApiError::from_message("Duplicate lead").is_fatal());
        assert!(!LeadApiError::Transport("timeout".to_string()).is_fatal());
        assert!(!LeadApiError::MissingId.is_fatal());
    }

    #[test]
    fn test_structured_code_wins_over_wording() {
        let err = GraphqlError {
            message: "Assignment pool exhausted".to_string(),
            extensions: Some(json!({ "code": "NO_ELIGIBLE_ASSIGNEE" })),
        };
        assert!(err.into_lead_error().is_fatal());

        let err = GraphqlError {
            message: "Invalid phone".to_string(),
            extensions: Some(json!({ "code": "BAD_USER_INPUT" })),
        };
        assert_eq!(err.into_lead_error(), LeadApiError::Rejected("Invalid phone".to_string()));
    }

    #[test]
    fn test_graphql_response_parses_assigned_rm() {
        let body = r#"{"data":{"assignLead":{"id":"1","assignedRM":"Ramya"}}}"#;
        let parsed: GraphqlResponse<AssignLeadData> = serde_json::from_str(body).unwrap();
        let rm = parsed.data.unwrap().assign_lead.unwrap().assigned_rm;
        assert_eq!(rm.as_deref(), Some("Ramya"));
    }

    #[tokio::test]
    async fn test_mock_round_robin_assignees() {
        let api = MockLeadApi::with_assignees(&["A", "B"]);
        let mut names = Vec::new();
        for _ in 0..3 {
            let id = api.create_lead(&lead("9876543210")).await.unwrap();
            names.push(api.assign_lead(&id).await.unwrap());
        }
        assert_eq!(names, vec!["A", "B", "A"]);
        assert_eq!(api.attempts(), 3);
    }

    #[tokio::test]
    async fn test_mock_rejects_phone_and_fails_fatal_attempt() {
        let api = MockLeadApi::new()
            .reject_phone("1111111111", "Phone already exists")
            .fatal_on_attempt(2);

        let err = api.create_lead(&lead("1111111111")).await.unwrap_err();
        assert_eq!(err, LeadApiError::Rejected("Phone already exists".to_string()));

        let id = api.create_lead(&lead("2222222222")).await.unwrap();
        assert!(api.assign_lead(&id).await.unwrap_err().is_fatal());
    }

    #[test]
    fn test_mock_name_is_mock() {
        assert_eq!(MockLeadApi::new().name(), "mock");
    }
}
