//! Lead-list parsing.
//!
//! The format is deliberately simple: a header row naming at least `name`,
//! `email` and `company` (any order, any case), then one comma-separated row per
//! lead. Quoting is not supported. Rows missing any of the three fields are
//! dropped rather than rejected.

use crate::{Lead, ValidationError};

/// Parses a lead list.
///
/// # Errors
///
/// - [`ValidationError::MissingColumns`] if the header lacks a required column
/// - [`ValidationError::NoValidRows`] if no row carries all three fields
pub fn parse_leads(text: &str) -> Result<Vec<Lead>, ValidationError> {
    let mut lines = text.trim().lines().map(|line| line.trim_end_matches('\r'));

    let Some(header) = lines.next() else {
        return Err(ValidationError::NoValidRows);
    };

    let headers = header
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect::<Vec<_>>();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let (Some(name_idx), Some(email_idx), Some(company_idx)) =
        (column("name"), column("email"), column("company"))
    else {
        return Err(ValidationError::MissingColumns);
    };

    let leads = lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let cols = line.split(',').map(str::trim).collect::<Vec<_>>();
            let field = |idx: usize| cols.get(idx).copied().unwrap_or_default();

            let lead = Lead::new(field(name_idx), field(email_idx), field(company_idx));
            (!lead.name.is_empty() && !lead.email.is_empty() && !lead.company.is_empty())
                .then_some(lead)
        })
        .collect::<Vec<_>>();

    if leads.is_empty() {
        return Err(ValidationError::NoValidRows);
    }

    Ok(leads)
}
