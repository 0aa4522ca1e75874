//! SMTP reply parsing.

use super::error::{ClientError, Result};

/// A single line of an SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub code: u16,
    /// `false` for `250-` continuation lines.
    pub is_last: bool,
    pub message: String,
}

/// A complete, possibly multi-line, SMTP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Response {
    #[must_use]
    pub const fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// The reply text with lines joined by newlines.
    #[must_use]
    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// `334` continuation during AUTH, `354` after DATA.
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code >= 300 && self.code < 400
    }

    #[must_use]
    pub const fn is_temporary_error(&self) -> bool {
        self.code >= 400 && self.code < 500
    }

    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code >= 500 && self.code < 600
    }

    /// Returns whether an EHLO reply advertises `keyword` (case-insensitive).
    ///
    /// The first line is the server's greeting and is never a keyword.
    #[must_use]
    pub fn advertises(&self, keyword: &str) -> bool {
        self.lines.iter().skip(1).any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
        })
    }

    /// SASL mechanisms from the `AUTH` line of an EHLO reply, upper-cased.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<String> {
        self.lines
            .iter()
            .skip(1)
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                let keyword = words.next()?;
                // Some older servers still send `AUTH=LOGIN PLAIN`.
                let rest = keyword
                    .strip_prefix("AUTH=")
                    .or_else(|| keyword.strip_prefix("auth="));
                if keyword.eq_ignore_ascii_case("AUTH") || rest.is_some() {
                    Some(
                        rest.into_iter()
                            .chain(words)
                            .map(str::to_uppercase)
                            .collect::<Vec<_>>(),
                    )
                } else {
                    None
                }
            })
            .flatten()
            .collect()
    }

    /// Converts a 4xx/5xx reply into an error, passing anything else through.
    ///
    /// # Errors
    ///
    /// [`ClientError::SmtpError`] carrying the reply code and text.
    pub fn into_result(self) -> Result<Self> {
        if self.is_temporary_error() || self.is_permanent_error() {
            Err(ClientError::SmtpError {
                code: self.code,
                message: self.message(),
            })
        } else {
            Ok(self)
        }
    }

    /// Parses a single reply line (without its line ending).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the line doesn't match SMTP format.
    pub fn parse_line(line: &str) -> Result<ResponseLine> {
        let Some(code_str) = line.get(..3) else {
            return Err(ClientError::ParseError(format!(
                "Response line too short: '{line}'"
            )));
        };

        let code = code_str
            .parse::<u16>()
            .map_err(|_| ClientError::ParseError(format!("Invalid status code: '{code_str}'")))?;

        let is_last = match line[3..].chars().next() {
            None | Some(' ') => true,
            Some('-') => false,
            Some(c) => {
                return Err(ClientError::ParseError(format!(
                    "Invalid separator character: '{c}'"
                )));
            }
        };

        Ok(ResponseLine {
            code,
            is_last,
            message: line.get(4..).unwrap_or_default().to_string(),
        })
    }

    /// Parses one complete reply from the front of `buffer`.
    ///
    /// Returns the reply and the number of bytes it occupied, or `None` if the
    /// buffer does not yet hold a complete reply.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::ParseError` if the reply is malformed.
    pub fn parse_response(buffer: &[u8]) -> Result<Option<(Self, usize)>> {
        let mut consumed = 0;
        let mut code = None;
        let mut lines = Vec::new();

        while let Some(newline) = buffer[consumed..].iter().position(|&b| b == b'\n') {
            let raw = &buffer[consumed..consumed + newline];
            consumed += newline + 1;

            let text = std::str::from_utf8(raw)?.trim_end_matches('\r');
            if text.is_empty() {
                continue;
            }

            let parsed = Self::parse_line(text)?;
            match code {
                Some(expected) if expected != parsed.code => {
                    return Err(ClientError::ParseError(format!(
                        "Status code mismatch in multi-line response: expected {expected}, got {}",
                        parsed.code
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed.code),
            }

            lines.push(parsed.message);

            if parsed.is_last {
                return Ok(Some((Self::new(parsed.code, lines), consumed)));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_line() {
        let line = ResponseLine {
            code: 220,
            is_last: true,
            message: "smtp.example.com ESMTP".to_string(),
        };
        assert_eq!(
            Response::parse_line("220 smtp.example.com ESMTP").unwrap(),
            line
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let line = Response::parse_line("250").unwrap();
        assert!(line.is_last);
        assert!(line.message.is_empty());
    }

    #[test]
    fn test_parse_multi_line_response() {
        let data = b"250-smtp.example.com\r\n250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.code, 250);
        assert_eq!(
            response.lines,
            vec!["smtp.example.com", "SIZE 35882577", "AUTH LOGIN PLAIN"]
        );
        assert_eq!(consumed, data.len());
    }

    #[test]
    fn test_parse_leaves_trailing_bytes() {
        let data = b"250 OK\r\n221 Bye\r\n";
        let (response, consumed) = Response::parse_response(data).unwrap().unwrap();
        assert_eq!(response.lines, vec!["OK"]);
        assert_eq!(consumed, 8);
    }

    #[test]
    fn test_parse_incomplete_response() {
        assert!(Response::parse_response(b"250-smtp.example.com\r\n250-SIZE")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_code_mismatch_is_rejected() {
        assert!(Response::parse_response(b"250-a\r\n251 b\r\n").is_err());
    }

    #[test]
    fn test_ehlo_capabilities() {
        let response = Response::new(
            250,
            vec![
                "smtp.example.com at your service".to_string(),
                "STARTTLS".to_string(),
                "AUTH LOGIN plain XOAUTH2".to_string(),
            ],
        );

        assert!(response.advertises("starttls"));
        assert!(!response.advertises("SMTPUTF8"));
        assert_eq!(response.auth_mechanisms(), vec!["LOGIN", "PLAIN", "XOAUTH2"]);
    }

    #[test]
    fn test_legacy_auth_equals_syntax() {
        let response = Response::new(250, vec!["hi".to_string(), "AUTH=LOGIN PLAIN".to_string()]);
        assert_eq!(response.auth_mechanisms(), vec!["LOGIN", "PLAIN"]);
    }

    #[test]
    fn test_into_result() {
        assert!(Response::new(354, vec![]).into_result().is_ok());
        assert!(matches!(
            Response::new(535, vec!["bad credentials".to_string()]).into_result(),
            Err(ClientError::SmtpError { code: 535, .. })
        ));
    }
}
