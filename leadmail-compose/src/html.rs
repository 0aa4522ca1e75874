//! HTML rendering helpers shared by the composers.

use regex::RegexBuilder;

const CONTAINER_STYLE: &str =
    "font-family: 'Segoe UI', Arial, sans-serif; color: #1a1a1a; line-height: 1.7; max-width: 600px;";

/// Splits text into trimmed, non-empty paragraphs. Blank lines and single
/// line breaks both separate paragraphs.
pub fn paragraphs(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes `paragraph` and bolds every case-insensitive mention of `term`.
pub fn highlight(paragraph: &str, term: &str) -> String {
    let escaped = escape(paragraph);
    let term = escape(term.trim());
    if term.is_empty() {
        return escaped;
    }

    match RegexBuilder::new(&regex::escape(&term))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern
            .replace_all(&escaped, "<strong>${0}</strong>")
            .into_owned(),
        Err(_) => escaped,
    }
}

/// Wraps rendered parts in the styled container every email uses.
pub fn container(parts: &[String]) -> String {
    format!(
        "<div style=\"{CONTAINER_STYLE}\">\n  {}\n</div>",
        parts.join("\n  ")
    )
}

/// Renders free text as escaped paragraphs inside the container.
pub fn render_plain(text: &str) -> String {
    let parts = paragraphs(text)
        .into_iter()
        .map(|p| format!("<p>{}</p>", escape(p)))
        .collect::<Vec<_>>();
    container(&parts)
}
