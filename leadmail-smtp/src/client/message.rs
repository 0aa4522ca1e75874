//! Email message builder producing `multipart/alternative` MIME.

use std::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use ulid::Ulid;

use super::error::{ClientError, Result};

/// Builder for an outbound message with a plain-text part and an optional
/// HTML alternative.
///
/// Bodies are base64 encoded so arbitrary UTF-8 and long lines survive any
/// relay. Non-ASCII subjects and display names are RFC 2047 encoded.
///
/// # Examples
///
/// ```
/// use leadmail_smtp::client::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("sender@example.com")
///     .from_name("Sender")
///     .to("lead@example.com")
///     .subject("Hello")
///     .text("Plain body")
///     .html("<p>HTML body</p>")
///     .build()
///     .unwrap();
///
/// assert!(message.contains("multipart/alternative"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    from_name: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    headers: Vec<(String, String)>,
    text: Option<String>,
    html: Option<String>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.from = Some(email.into());
        self
    }

    /// Display name shown next to the From address.
    #[must_use]
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.to.push(email.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a custom header, emitted in insertion order.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.text = Some(content.into());
        self
    }

    #[must_use]
    pub fn html(mut self, content: impl Into<String>) -> Self {
        self.html = Some(content.into());
        self
    }

    /// Renders the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// [`ClientError::BuilderError`] if the sender or recipients are missing, or
    /// a header value contains a line break.
    pub fn build(self) -> Result<String> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| ClientError::BuilderError("missing From address".to_string()))?;
        if self.to.is_empty() {
            return Err(ClientError::BuilderError("missing recipient".to_string()));
        }

        let mut message = String::with_capacity(2048);

        let from_header = match &self.from_name {
            Some(name) => format!("{} <{from}>", encode_display_name(name)),
            None => from.to_string(),
        };
        header(&mut message, "From", &from_header)?;
        header(&mut message, "To", &self.to.join(", "))?;
        if let Some(subject) = &self.subject {
            header(&mut message, "Subject", &encode_word(subject))?;
        }
        header(&mut message, "Date", &Utc::now().to_rfc2822())?;
        header(
            &mut message,
            "Message-ID",
            &format!("<{}@{}>", Ulid::new(), domain_of(from)),
        )?;
        for (name, value) in &self.headers {
            header(&mut message, name, value)?;
        }
        header(&mut message, "MIME-Version", "1.0")?;

        let text = self.text.unwrap_or_default();
        match &self.html {
            None => {
                header(&mut message, "Content-Type", "text/plain; charset=utf-8")?;
                header(&mut message, "Content-Transfer-Encoding", "base64")?;
                message.push_str("\r\n");
                message.push_str(&base64_lines(text.as_bytes()));
            }
            Some(html) => {
                let boundary = format!("----=_Part_{}", Ulid::new());
                header(
                    &mut message,
                    "Content-Type",
                    &format!("multipart/alternative; boundary=\"{boundary}\""),
                )?;
                message.push_str("\r\n");

                part(&mut message, &boundary, "text/plain; charset=utf-8", &text);
                part(&mut message, &boundary, "text/html; charset=utf-8", html);
                let _ = write!(message, "--{boundary}--\r\n");
            }
        }

        Ok(message)
    }
}

fn header(message: &mut String, name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) || name.contains(['\r', '\n', ':']) {
        return Err(ClientError::BuilderError(format!(
            "header {name} contains a line break"
        )));
    }
    let _ = write!(message, "{name}: {value}\r\n");
    Ok(())
}

fn part(message: &mut String, boundary: &str, content_type: &str, body: &str) {
    let _ = write!(
        message,
        "--{boundary}\r\nContent-Type: {content_type}\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
        base64_lines(body.as_bytes())
    );
}

/// Base64 with lines wrapped at 76 characters, each ending in CRLF.
fn base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 76 * 2 + 2);
    for chunk in encoded.as_bytes().chunks(76) {
        // Base64 output is ASCII, so every chunk boundary is a char boundary.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// RFC 2047 `B` encoding for header text that is not plain ASCII.
fn encode_word(text: &str) -> String {
    if text.is_ascii() {
        text.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(text))
    }
}

fn encode_display_name(name: &str) -> String {
    if name.is_ascii() {
        format!("\"{}\"", name.replace(['"', '\\'], ""))
    } else {
        encode_word(name)
    }
}

fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_body(message: &str) -> String {
        let body = message.split("\r\n\r\n").nth(1).unwrap();
        let joined = body.lines().collect::<String>();
        String::from_utf8(STANDARD.decode(joined).unwrap()).unwrap()
    }

    #[test]
    fn test_plain_message() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Test")
            .text("Hello World")
            .build()
            .unwrap();

        assert!(message.contains("From: sender@example.com\r\n"));
        assert!(message.contains("To: recipient@example.com\r\n"));
        assert!(message.contains("Subject: Test\r\n"));
        assert!(message.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(message.contains("Message-ID: <"));
        assert!(message.contains("@example.com>\r\n"));
        assert_eq!(decode_body(&message), "Hello World");
    }

    #[test]
    fn test_display_name() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .from_name("Your \"Name\"")
            .to("recipient@example.com")
            .build()
            .unwrap();

        assert!(message.contains("From: \"Your Name\" <sender@example.com>\r\n"));
    }

    #[test]
    fn test_alternative_parts() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .text("plain")
            .html("<p>rich</p>")
            .build()
            .unwrap();

        assert!(message.contains("multipart/alternative; boundary=\"----=_Part_"));
        assert!(message.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(message.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(message.contains(&STANDARD.encode("<p>rich</p>")));
        assert!(message.trim_end().ends_with("--"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Quick idea for Zürich")
            .build()
            .unwrap();

        assert!(message.contains("Subject: =?UTF-8?B?"));
    }

    #[test]
    fn test_header_injection_is_rejected() {
        let result = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("hi\r\nBcc: victim@example.com")
            .build();

        assert!(matches!(result, Err(ClientError::BuilderError(_))));
    }

    #[test]
    fn test_missing_recipient() {
        let result = MessageBuilder::new().from("sender@example.com").build();
        assert!(matches!(result, Err(ClientError::BuilderError(_))));
    }

    #[test]
    fn test_long_bodies_are_wrapped() {
        let encoded = base64_lines(&[b'x'; 200]);
        assert!(encoded.lines().all(|line| line.len() <= 76));
    }
}
