//! Directory read tool — gives the matchmaker the full attendee list.
//!
//! Returns the public profile cards (never emails) as pretty-printed JSON
//! so the model can reason over skills and interests. Takes no arguments.

use async_trait::async_trait;
use std::sync::Arc;
use tentacool_core::error::ToolError;
use tentacool_core::tool::{Tool, ToolResult};
use tentacool_store::ProfileStore;
use tracing::debug;

/// A tool that fetches every attendee profile from the store.
pub struct FetchProfilesTool {
    store: Arc<dyn ProfileStore>,
}

impl FetchProfilesTool {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FetchProfilesTool {
    fn name(&self) -> &str {
        "fetch_profiles"
    }

    fn description(&self) -> &str {
        "Fetch all attendee profiles from the event directory, including job title, \
         company, experience, tech skills, and interests. Use this to find good \
         matches for the current user."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        match self.store.list_profiles().await {
            Ok(cards) => {
                debug!(count = cards.len(), "fetched attendee profiles");
                let output = if cards.is_empty() {
                    "No attendee profiles are registered yet.".to_string()
                } else {
                    serde_json::to_string_pretty(&cards).map_err(|e| {
                        ToolError::ExecutionFailed {
                            tool_name: "fetch_profiles".into(),
                            reason: format!("failed to serialize profiles: {e}"),
                        }
                    })?
                };
                Ok(ToolResult {
                    call_id: String::new(),
                    success: true,
                    output,
                })
            }
            Err(e) => Ok(ToolResult {
                call_id: String::new(),
                success: false,
                output: format!("Could not fetch profiles: {e}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tentacool_store::{InMemoryStore, ProfileDraft};

    fn draft() -> ProfileDraft {
        ProfileDraft {
            job_title: Some("Backend Dev".into()),
            company: Some("Acme".into()),
            experience: Some("5 years".into()),
            tech_skills: vec!["Rust".into()],
            interests: vec!["Chess".into()],
        }
    }

    #[test]
    fn tool_definition() {
        let tool = FetchProfilesTool::new(Arc::new(InMemoryStore::new()));
        assert_eq!(tool.name(), "fetch_profiles");
        let schema = tool.parameters_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_directory_message() {
        let tool = FetchProfilesTool::new(Arc::new(InMemoryStore::new()));
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("No attendee profiles"));
    }

    #[tokio::test]
    async fn returns_profiles_without_emails() {
        let store = Arc::new(InMemoryStore::new());
        store
            .seed_user("Ana", "ana@example.com", draft())
            .await
            .unwrap();

        let tool = FetchProfilesTool::new(store);
        let result = tool.execute(serde_json::json!({})).await.unwrap();

        assert!(result.success);
        assert!(result.output.contains("Ana"));
        assert!(result.output.contains("Rust"));
        assert!(!result.output.contains("ana@example.com"));
    }
}
