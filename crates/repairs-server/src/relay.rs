//! Chat relay: forwards user messages to an Azure OpenAI chat deployment.

use anyhow::{Context, Result, bail};
use repairs_core::config::RelayConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const GREETING: &str = "Hi there! I'm an agent to chat with you.";
pub const FAILURE_REPLY: &str = "The agent encountered an error or bug.";

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimal inbound activity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub members_added: Vec<serde_json::Value>,
}

/// Outbound reply activity. `text` is omitted when there is nothing to say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Reply {
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            text: Some(text.into()),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: "message".to_string(),
            text: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

impl ChatRelay {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RelayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .context("build relay http client")?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, self.config.deployment, self.config.api_version
        )
    }

    /// Produce the reply for one inbound activity.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream call fails or answers with a
    /// non-success status or an unreadable body.
    pub async fn respond(&self, activity: &Activity) -> Result<Reply> {
        match activity.kind.as_str() {
            "conversationUpdate" if !activity.members_added.is_empty() => {
                Ok(Reply::message(GREETING))
            }
            "message" => match activity.text.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(text) => self.complete(text).await.map(Reply::message),
                None => Ok(Reply::empty()),
            },
            _ => Ok(Reply::empty()),
        }
    }

    async fn complete(&self, user_text: &str) -> Result<String> {
        let body = json!({
            "messages": [
                { "role": "system", "content": self.config.system_prompt },
                { "role": "user", "content": user_text },
            ]
        });

        let response = self
            .client
            .post(self.completions_url())
            .header("api-key", self.config.api_key.expose())
            .json(&body)
            .send()
            .await
            .context("send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            bail!("chat completion upstream returned {status}");
        }

        let completion: Completion = response
            .json()
            .await
            .context("decode chat completion response")?;
        debug!(
            choices = completion.choices.len(),
            "chat completion received"
        );

        Ok(completion
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect())
    }
}
