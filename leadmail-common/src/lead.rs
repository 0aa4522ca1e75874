use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A prospective recipient.
///
/// Leads carry no identity of their own; within a run a lead is identified by
/// its position in the ordered list, and duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub company: String,
}

impl Lead {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            company: company.into(),
        }
    }
}

/// The persisted outcome of a lead that was sent successfully.
///
/// `replied` is the only field that changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub company: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub replied: bool,
}

impl ResultRecord {
    /// Creates a record for `lead`, stamped now, with a fresh ULID.
    #[must_use]
    pub fn sent(lead: &Lead) -> Self {
        Self::sent_at(lead, Utc::now())
    }

    #[must_use]
    pub fn sent_at(lead: &Lead, sent_at: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            name: lead.name.clone(),
            email: lead.email.clone(),
            company: lead.company.clone(),
            sent_at,
            replied: false,
        }
    }

    /// Case-insensitive match against name, company or email.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.company.to_lowercase().contains(&query)
            || self.email.to_lowercase().contains(&query)
    }
}
