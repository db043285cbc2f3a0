use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{ActivityLevel, ChangeEvent};
use crate::resolve::MemberAssessment;

pub struct ChangeTypeSummary {
    pub change_type: &'static str,
    pub count: usize,
}

pub fn summarize_by_type(events: &[ChangeEvent]) -> Vec<ChangeTypeSummary> {
    let mut map: std::collections::HashMap<&'static str, usize> = std::collections::HashMap::new();

    for event in events {
        *map.entry(event.kind.type_label()).or_insert(0) += 1;
    }

    let mut summaries: Vec<ChangeTypeSummary> = map
        .into_iter()
        .map(|(change_type, count)| ChangeTypeSummary { change_type, count })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.change_type.cmp(b.change_type)));
    summaries
}

pub fn build_report(
    clan_name: &str,
    clan_tag: &str,
    generated_at: DateTime<Utc>,
    snapshot_captured_at: DateTime<Utc>,
    events: &[ChangeEvent],
    assessments: &[MemberAssessment],
) -> String {
    let summaries = summarize_by_type(events);

    let mut output = String::new();
    let _ = writeln!(output, "# Clan Activity Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}) at {}",
        clan_name,
        clan_tag,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(
        output,
        "Latest snapshot captured {}",
        snapshot_captured_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Change Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No changes between the last two snapshots.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(output, "- {}: {}", summary.change_type, summary.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster Changes");

    if events.is_empty() {
        let _ = writeln!(output, "No changes between the last two snapshots.");
    } else {
        for event in events.iter() {
            let _ = writeln!(output, "- {}", event.description);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Activity Levels");

    let mut counts: [usize; 5] = [0; 5];
    let mut unknown = 0usize;
    for assessment in assessments {
        match &assessment.verdict {
            Some(verdict) => {
                let idx = match verdict.activity_level {
                    ActivityLevel::VeryHigh => 0,
                    ActivityLevel::High => 1,
                    ActivityLevel::Medium => 2,
                    ActivityLevel::Low => 3,
                    ActivityLevel::Inactive => 4,
                };
                counts[idx] += 1;
            }
            None => unknown += 1,
        }
    }

    let labels = ["Very High", "High", "Medium", "Low", "Inactive"];
    for (label, count) in labels.iter().zip(counts.iter()) {
        let _ = writeln!(output, "- {}: {}", label, count);
    }
    let _ = writeln!(output, "- Unknown: {}", unknown);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Members");

    if assessments.is_empty() {
        let _ = writeln!(output, "No members in the latest snapshot.");
    } else {
        for assessment in assessments.iter() {
            match &assessment.verdict {
                Some(verdict) => {
                    let _ = writeln!(
                        output,
                        "- {} ({}): {} [{}] {} ({} days since activity)",
                        assessment.member_name,
                        assessment.member_tag,
                        verdict.activity_level,
                        verdict.confidence,
                        verdict.evidence.join("; "),
                        verdict.days_since_activity
                    );
                }
                None => {
                    let _ = writeln!(
                        output,
                        "- {} ({}): unknown (no evidence)",
                        assessment.member_name, assessment.member_tag
                    );
                }
            }
        }
    }

    output
}

#[derive(serde::Serialize)]
struct VerdictRow<'a> {
    tag: &'a str,
    name: &'a str,
    activity_level: String,
    confidence: String,
    priority: u8,
    days_since_activity: i64,
    is_real_time: bool,
    last_active_at: String,
    evidence: String,
}

/// Flat CSV of per-member verdicts. Members without a verdict are written
/// with an "unknown" level so the roster stays complete.
pub fn write_verdicts_csv<W: std::io::Write>(
    writer: W,
    assessments: &[MemberAssessment],
) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;

    for assessment in assessments {
        let row = match &assessment.verdict {
            Some(verdict) => VerdictRow {
                tag: &assessment.member_tag,
                name: &assessment.member_name,
                activity_level: verdict.activity_level.label().to_string(),
                confidence: verdict.confidence.label().to_string(),
                priority: verdict.priority,
                days_since_activity: verdict.days_since_activity,
                is_real_time: verdict.is_real_time,
                last_active_at: verdict.last_active_at.to_rfc3339(),
                evidence: verdict.evidence.join("; "),
            },
            None => VerdictRow {
                tag: &assessment.member_tag,
                name: &assessment.member_name,
                activity_level: "unknown".to_string(),
                confidence: String::new(),
                priority: 0,
                days_since_activity: 0,
                is_real_time: false,
                last_active_at: String::new(),
                evidence: String::new(),
            },
        };
        csv_writer.serialize(row)?;
        written += 1;
    }

    csv_writer.flush()?;
    Ok(written)
}
