//! Filtering, search and summary statistics over result records.

use std::{fmt, str::FromStr};

use leadmail_common::ResultRecord;
use serde::{Deserialize, Serialize};

/// Which records to show, by reply state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    #[default]
    All,
    Replied,
    NoReply,
}

impl Filter {
    #[must_use]
    pub const fn accepts(self, record: &ResultRecord) -> bool {
        match self {
            Self::All => true,
            Self::Replied => record.replied,
            Self::NoReply => !record.replied,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "all",
            Self::Replied => "replied",
            Self::NoReply => "no-reply",
        })
    }
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "replied" => Ok(Self::Replied),
            "no-reply" | "noreply" => Ok(Self::NoReply),
            other => Err(format!(
                "unknown filter '{other}', expected all, replied or no-reply"
            )),
        }
    }
}

/// Records passing `filter` whose name, company or email contains `search`
/// (case-insensitive; blank matches everything), newest first.
#[must_use]
pub fn select(mut records: Vec<ResultRecord>, filter: Filter, search: &str) -> Vec<ResultRecord> {
    let search = search.trim();
    records.retain(|r| filter.accepts(r) && (search.is_empty() || r.matches(search)));
    records.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
    records
}

/// Totals shown above the results list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub replied: usize,
    pub no_reply: usize,
    /// Whole percent, rounded half up. Zero when nothing was sent.
    pub reply_rate: u32,
}

impl Stats {
    #[must_use]
    pub fn of(records: &[ResultRecord]) -> Self {
        let total = records.len();
        let replied = records.iter().filter(|r| r.replied).count();

        let reply_rate = if total == 0 {
            0
        } else {
            // (replied * 100 + total / 2) / total, rounding half up.
            u32::try_from((replied * 200 + total) / (total * 2)).unwrap_or(100)
        };

        Self {
            total,
            replied,
            no_reply: total - replied,
            reply_rate,
        }
    }
}
