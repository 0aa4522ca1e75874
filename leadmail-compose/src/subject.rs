//! Subject lines derived from the instruction's topic.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

const MAX_TOPIC_CHARS: usize = 50;

static TOPIC_PHRASE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:about|for|regarding|offering|pitch|sell|promote)\s+(?:our\s+|my\s+|the\s+)?(.+?)(?:\.|,|$)",
    )
    .ok()
});

static TOPIC_KEYWORD: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:voice\s+agent|ai\s+agent|chatbot|automation|marketing|seo|design|development|consulting|saas|software|app|service)",
    )
    .ok()
});

/// Extracts what the instruction is pitching, if anything recognisable.
///
/// A "for/about/offering ..." phrase wins over a bare service keyword. The
/// first pattern that matches decides, even if its topic trims to nothing.
pub fn extract_topic(instruction: &str) -> Option<String> {
    let raw = if let Some(caps) = LazyLock::force(&TOPIC_PHRASE)
        .as_ref()
        .and_then(|re| re.captures(instruction))
    {
        caps.get(1).map_or("", |m| m.as_str())
    } else {
        LazyLock::force(&TOPIC_KEYWORD)
            .as_ref()
            .and_then(|re| re.find(instruction))?
            .as_str()
    };

    let topic = raw
        .trim()
        .trim_end_matches(['.', '!', '?', ',', ';'])
        .chars()
        .take(MAX_TOPIC_CHARS)
        .collect::<String>();

    (!topic.is_empty()).then_some(topic)
}

fn candidates(company: &str, topic: Option<&str>) -> [String; 8] {
    match topic {
        Some(topic) => [
            format!("Quick idea for {company} — {topic}"),
            format!("{company} + {topic} = growth?"),
            format!("A thought about {topic} for {company}"),
            format!("Can {topic} help {company} grow?"),
            format!("{company} — have you considered {topic}?"),
            format!("Thought this might help {company}"),
            format!("Quick question for {company}"),
            format!("An idea for {company}'s growth"),
        ],
        None => [
            format!("Quick idea for {company}"),
            format!("A thought I had about {company}"),
            format!("Can I help {company} grow?"),
            format!("{company} — I noticed something interesting"),
            format!("Thought this might help {company}"),
            format!("Quick question for {company}"),
            format!("An idea for {company}"),
            format!("Something {company} should know"),
        ],
    }
}

/// Picks one of eight subject templates for `company`, mentioning the
/// instruction's topic when one can be found.
pub fn generate_subject(instruction: &str, company: &str) -> String {
    generate_subject_with(&mut rand::rng(), instruction, company)
}

pub(crate) fn generate_subject_with(
    rng: &mut impl Rng,
    instruction: &str,
    company: &str,
) -> String {
    let topic = extract_topic(instruction);
    let mut options = candidates(company, topic.as_deref());
    let pick = rng.random_range(0..options.len());
    std::mem::take(&mut options[pick])
}
