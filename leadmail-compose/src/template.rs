//! Deterministic composition from the operator's own wording.

use std::sync::LazyLock;

use async_trait::async_trait;
use leadmail_common::Lead;
use regex::{NoExpand, Regex};

use crate::{ComposeError, ComposedMessage, Composer, html, subject::generate_subject};

const SIGN_OFF: &str = "Looking forward to hearing from you!";

static NAME_PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\{name\}").ok());
static COMPANY_PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\{company\}").ok());
static GREETING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:hi|hey|hello|dear|greetings)\b").ok());
static CLOSING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:thanks|thank you|regards|best|cheers|sincerely|warm regards|looking forward)\b")
        .ok()
});

/// Uses the instruction itself as the email body.
///
/// `{name}` and `{company}` are substituted (case-insensitively). A greeting
/// is added unless the first paragraph already opens with one, and a sign-off
/// with the sender's name unless the last paragraph already closes the email.
#[derive(Debug, Clone)]
pub struct TemplateComposer {
    from_name: String,
}

impl TemplateComposer {
    #[must_use]
    pub fn new(from_name: impl Into<String>) -> Self {
        Self {
            from_name: from_name.into(),
        }
    }

    /// Builds the text and HTML bodies for `lead`.
    #[must_use]
    pub fn render(&self, lead: &Lead, instruction: &str) -> (String, String) {
        let body = substitute(&NAME_PLACEHOLDER, instruction, &lead.name);
        let body = substitute(&COMPANY_PLACEHOLDER, &body, &lead.company);
        let paragraphs = html::paragraphs(&body);

        let has_greeting = paragraphs
            .first()
            .is_some_and(|p| starts_with(&GREETING, p));
        let has_closing = paragraphs.last().is_some_and(|p| starts_with(&CLOSING, p));

        let from_name = html::escape(&self.from_name);
        let mut html_parts = Vec::with_capacity(paragraphs.len() + 2);
        let mut text_parts = Vec::with_capacity(paragraphs.len() + 2);

        if !has_greeting {
            html_parts.push(format!("<p>Hi {},</p>", html::escape(&lead.name)));
            text_parts.push(format!("Hi {},", lead.name));
        }

        for paragraph in &paragraphs {
            html_parts.push(format!(
                "<p>{}</p>",
                html::highlight(paragraph, &lead.company)
            ));
            text_parts.push((*paragraph).to_string());
        }

        if has_closing {
            html_parts.push(format!("<p><strong>{from_name}</strong></p>"));
            text_parts.push(self.from_name.clone());
        } else {
            html_parts.push(format!(
                "<p style=\"margin-top: 24px;\">{SIGN_OFF}<br /><strong>{from_name}</strong></p>"
            ));
            text_parts.push(format!("\n{SIGN_OFF}\n{}", self.from_name));
        }

        (text_parts.join("\n\n"), html::container(&html_parts))
    }
}

#[async_trait]
impl Composer for TemplateComposer {
    async fn compose(
        &self,
        lead: &Lead,
        instruction: &str,
    ) -> Result<ComposedMessage, ComposeError> {
        let (text_body, html_body) = self.render(lead, instruction);
        Ok(ComposedMessage {
            subject: generate_subject(instruction, &lead.company),
            text_body,
            html_body: Some(html_body),
        })
    }
}

fn substitute(pattern: &LazyLock<Option<Regex>>, text: &str, value: &str) -> String {
    match LazyLock::force(pattern) {
        Some(re) => re.replace_all(text, NoExpand(value)).into_owned(),
        None => text.to_string(),
    }
}

fn starts_with(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    LazyLock::force(pattern)
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}
