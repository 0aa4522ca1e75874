//! Composition through an OpenAI-compatible chat completions endpoint.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use leadmail_common::{ConfigurationError, Lead, tracing};
use serde::{Deserialize, Serialize};

use crate::{ComposeError, ComposedMessage, Composer, html};

/// Endpoint settings for [`GenerativeComposer`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerativeConfig {
    /// API root, e.g. `https://api.openai.com/v1`. `/chat/completions` is appended.
    pub base_url: String,

    pub model: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "defaults::api_key_env")]
    pub api_key_env: String,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The JSON object the model is asked to reply with.
#[derive(Deserialize)]
struct Draft {
    subject: String,
    body: String,
}

/// Asks a language model to write each email.
pub struct GenerativeComposer {
    config: GenerativeConfig,
    from_name: String,
    api_key: String,
    http: reqwest::Client,
}

impl fmt::Debug for GenerativeComposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerativeComposer")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

impl GenerativeComposer {
    /// Reads the API key from `config.api_key_env`.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingSecret`] when the variable is not set.
    pub fn from_config(
        config: GenerativeConfig,
        from_name: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ConfigurationError::MissingSecret(config.api_key_env.clone()))?;
        Self::with_api_key(config, from_name, api_key)
    }

    /// # Errors
    ///
    /// [`ConfigurationError::Invalid`] if the HTTP client cannot be built.
    pub fn with_api_key(
        config: GenerativeConfig,
        from_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                field: "composer".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            from_name: from_name.into(),
            api_key: api_key.into(),
            http,
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn system_prompt(&self) -> String {
        format!(
            "You write short, personal cold outreach emails. Sign every email as {}. \
             Reply with a single JSON object with exactly two string fields: \
             \"subject\" and \"body\". The body is plain text with paragraphs \
             separated by blank lines. Do not wrap the JSON in markdown.",
            self.from_name
        )
    }
}

fn user_prompt(lead: &Lead, instruction: &str) -> String {
    format!(
        "Recipient name: {}\nRecipient company: {}\n\nInstructions:\n{}",
        lead.name, lead.company, instruction
    )
}

/// Parses the model's reply into a subject and body.
///
/// Models sometimes wrap JSON in a code fence or add a sentence around it, so
/// only the outermost braces are parsed.
fn parse_draft(content: &str) -> Result<Draft, ComposeError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(ComposeError::Malformed(
                "reply does not contain a JSON object".to_string(),
            ));
        }
    };

    let draft: Draft = serde_json::from_str(json)
        .map_err(|e| ComposeError::Malformed(format!("invalid draft JSON: {e}")))?;

    if draft.subject.trim().is_empty() {
        return Err(ComposeError::Malformed("empty subject".to_string()));
    }
    if draft.body.trim().is_empty() {
        return Err(ComposeError::Malformed("empty body".to_string()));
    }

    Ok(draft)
}

fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    let value = response.headers().get("retry-after")?.to_str().ok()?;
    let secs = value.trim().parse::<f64>().ok()?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((secs.max(0.0) * 1000.0) as u64)
}

#[async_trait]
impl Composer for GenerativeComposer {
    async fn compose(
        &self,
        lead: &Lead,
        instruction: &str,
    ) -> Result<ComposedMessage, ComposeError> {
        let system = self.system_prompt();
        let user = user_prompt(lead, instruction);
        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.config.temperature,
        };

        tracing::debug!(model = %self.config.model, to = %lead.email, "Requesting draft");

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_ms = retry_after_ms(&response).unwrap_or(1000);
            tracing::warn!(retry_after_ms, "Draft request rate limited");
            return Err(ComposeError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComposeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ComposeError::Malformed("no completion choices".to_string()))?;

        let draft = parse_draft(&content)?;
        let html_body = html::render_plain(&draft.body);

        Ok(ComposedMessage {
            subject: draft.subject.trim().to_string(),
            text_body: draft.body,
            html_body: Some(html_body),
        })
    }
}

mod defaults {
    pub fn api_key_env() -> String {
        "OPENAI_API_KEY".to_string()
    }

    pub const fn temperature() -> f32 {
        0.7
    }

    pub const fn timeout_secs() -> u64 {
        60
    }
}
