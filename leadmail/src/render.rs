//! Text rendering for the terminal.

use chrono::{DateTime, Utc};
use leadmail_campaign::{CampaignRun, ProgressEvent, Status};
use leadmail_common::ResultRecord;
use leadmail_store::Stats;

/// Cooldown display, `m:ss`.
#[must_use]
pub fn countdown(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Elapsed display: `42s`, `3m 7s`, `1h 2m 3s`.
#[must_use]
pub fn elapsed(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

/// Coarse age of `then` relative to `now`: `2mo ago`, `3d ago`, `5h ago`,
/// `10m ago` or `just now`.
#[must_use]
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();

    if days > 30 {
        format!("{}mo ago", days / 30)
    } else if days > 0 {
        format!("{days}d ago")
    } else if diff.num_hours() > 0 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_minutes() > 0 {
        format!("{}m ago", diff.num_minutes())
    } else {
        "just now".to_string()
    }
}

const fn status_marker(status: Status) -> &'static str {
    match status {
        Status::Pending => " ",
        Status::Sending => "…",
        Status::Sent => "✓",
        Status::Failed => "✗",
    }
}

/// One-line summary of a run in progress.
#[must_use]
pub fn progress(run: &CampaignRun) -> String {
    let mut line = format!(
        "[{}/{}] {} sent, {} failed | elapsed {}",
        run.done_count(),
        run.leads.len(),
        run.sent_count(),
        run.failed_count(),
        elapsed(run.elapsed_secs)
    );

    if let Some(remaining) = run.cooldown_remaining {
        line.push_str(&format!(" | next in {}", countdown(remaining)));
    }
    if let Some(eta) = run.eta_secs() {
        line.push_str(&format!(" | ETA {}", elapsed(eta)));
    }

    line
}

/// The line to print for `event`, if any.
///
/// Cooldown ticks are reported every `tick_every` seconds and for the last
/// five, so a long cooldown does not flood the terminal.
#[must_use]
pub fn event(event: &ProgressEvent, run: &CampaignRun, tick_every: u64) -> Option<String> {
    let lead = |index: usize| {
        run.leads
            .get(index)
            .map_or_else(|| format!("#{index}"), |l| format!("{} <{}>", l.name, l.email))
    };

    match event {
        ProgressEvent::Started { total } => Some(format!("Sending to {total} leads")),
        ProgressEvent::Sending { index } => Some(format!(
            "{} {}/{} {}",
            status_marker(Status::Sending),
            index + 1,
            run.leads.len(),
            lead(*index)
        )),
        ProgressEvent::Sent { index, subject } => Some(format!(
            "{} {} \"{subject}\"",
            status_marker(Status::Sent),
            lead(*index)
        )),
        ProgressEvent::Failed {
            index,
            kind,
            reason,
            ..
        } => Some(format!(
            "{} {} ({kind} failed: {reason})",
            status_marker(Status::Failed),
            lead(*index)
        )),
        ProgressEvent::CooldownStarted { secs } => {
            Some(format!("  waiting {} before the next send", countdown(*secs)))
        }
        ProgressEvent::CooldownTick { remaining } => {
            let due = *remaining > 0 && (*remaining <= 5 || remaining % tick_every.max(1) == 0);
            due.then(|| format!("  {}", progress(run)))
        }
        ProgressEvent::Finished { .. } => None,
    }
}

/// What to say when the operator interrupts a run. The send in flight, if any,
/// is abandoned with the process.
#[must_use]
pub fn interrupted(run: &CampaignRun) -> String {
    let sending = run
        .active_index
        .filter(|&i| run.statuses.get(i) == Some(&Status::Sending))
        .and_then(|i| run.leads.get(i));

    match sending {
        Some(lead) => format!(
            "Interrupted while sending to {} <{}>; that message may not have gone out",
            lead.name, lead.email
        ),
        None => "Interrupted; no further leads will be sent".to_string(),
    }
}

/// Final report of a run.
#[must_use]
pub fn summary(run: &CampaignRun) -> String {
    let mut out = format!(
        "Done in {}: {} sent, {} failed",
        elapsed(run.elapsed_secs),
        run.sent_count(),
        run.failed_count()
    );

    let failed = run.failed_leads();
    if !failed.is_empty() {
        out.push_str("\nFailed leads:");
        for (lead, failure) in run
            .leads
            .iter()
            .zip(&run.failures)
            .filter_map(|(lead, failure)| failure.as_ref().map(|f| (lead, f)))
        {
            out.push_str(&format!("\n  {} ({}: {})", lead.email, failure.kind, failure.reason));
        }
    }

    out
}

#[must_use]
pub fn stats(stats: &Stats) -> String {
    format!(
        "Total: {}  Replied: {}  No reply: {}  Reply rate: {}%",
        stats.total, stats.replied, stats.no_reply, stats.reply_rate
    )
}

#[must_use]
pub fn results_table(records: &[ResultRecord], now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{:<28} {:<20} {:<20} {:<32} {:<8} {}\n{}",
        "ID",
        "NAME",
        "COMPANY",
        "EMAIL",
        "REPLIED",
        "SENT",
        "-".repeat(120)
    );

    for record in records {
        out.push_str(&format!(
            "\n{:<28} {:<20} {:<20} {:<32} {:<8} {}",
            record.id,
            record.name,
            record.company,
            record.email,
            if record.replied { "yes" } else { "no" },
            time_ago(record.sent_at, now)
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use leadmail_common::Lead;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn countdown_format() {
        assert_eq!(countdown(120), "2:00");
        assert_eq!(countdown(65), "1:05");
        assert_eq!(countdown(9), "0:09");
        assert_eq!(countdown(0), "0:00");
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(elapsed(0), "0s");
        assert_eq!(elapsed(42), "42s");
        assert_eq!(elapsed(187), "3m 7s");
        assert_eq!(elapsed(3723), "1h 2m 3s");
        assert_eq!(elapsed(3600), "1h 0m 0s");
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc::now();
        let ago = |delta: TimeDelta| time_ago(now - delta, now);

        assert_eq!(ago(TimeDelta::seconds(30)), "just now");
        assert_eq!(ago(TimeDelta::minutes(10)), "10m ago");
        assert_eq!(ago(TimeDelta::hours(5)), "5h ago");
        assert_eq!(ago(TimeDelta::days(3)), "3d ago");
        assert_eq!(ago(TimeDelta::days(30)), "30d ago");
        assert_eq!(ago(TimeDelta::days(65)), "2mo ago");
    }

    #[test]
    fn stats_line() {
        let line = stats(&Stats {
            total: 3,
            replied: 1,
            no_reply: 2,
            reply_rate: 33,
        });
        assert_eq!(line, "Total: 3  Replied: 1  No reply: 2  Reply rate: 33%");
    }

    #[test]
    fn table_has_a_row_per_record() {
        let now = Utc::now();
        let mut record = ResultRecord::sent_at(&Lead::new("Ada", "ada@acme.test", "Acme"), now);
        record.replied = true;

        let table = results_table(&[record.clone()], now);
        let lines = table.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with(&record.id));
        assert!(lines[2].contains("yes"));
        assert!(lines[2].ends_with("just now"));
    }
}
