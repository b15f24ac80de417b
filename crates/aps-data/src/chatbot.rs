//! Client for the model chatbot endpoint.
//!
//! The chatbot server answers questions about one model at a time, identified
//! by its derivative URN. It authenticates the caller with the same bearer
//! token used for the data-management API.

use std::sync::Arc;

use aps_auth::CredentialProvider;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result, bearer_header};

/// Default base URL of the chatbot server.
pub const DEFAULT_CHATBOT_URL: &str = "http://localhost:8000";

#[derive(Debug, Serialize)]
struct PromptRequest<'a> {
    urn: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct PromptResponse {
    responses: Vec<String>,
}

#[derive(Clone)]
pub struct ChatbotClient {
    client: reqwest::Client,
    base_url: Url,
    provider: Arc<dyn CredentialProvider>,
}

impl ChatbotClient {
    pub fn new(client: reqwest::Client, base_url: Url, provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client,
            base_url,
            provider,
        }
    }

    /// Ask a question about the model at `urn`.
    ///
    /// The answer is the server's responses joined by blank lines. A non-2xx
    /// reply becomes [`Error::Chatbot`] carrying the response body.
    pub async fn submit_prompt(&self, urn: &str, prompt: &str) -> Result<String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Chatbot(format!("invalid chatbot URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(["chatbot", "prompt"]);

        let credentials = self.provider.credentials().await?;
        debug!(%urn, prompt_len = prompt.len(), "submitting chatbot prompt");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer_header(&credentials)?)
            .json(&PromptRequest { urn, prompt })
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chatbot request failed");
            return Err(Error::Chatbot(body));
        }

        let answer: PromptResponse = response
            .json()
            .await
            .map_err(|e| Error::Decode(format!("chatbot response: {e}")))?;
        Ok(answer.responses.join("\n\n"))
    }
}
