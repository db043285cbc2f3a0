use chrono::{DateTime, Utc};

use crate::changes;
use crate::evidence;
use crate::models::{
    ActivityLevel, ActivityVerdict, ChangeEvent, EvidenceRecord, MemberRecord, RosterSnapshot,
};

/// Picks the strongest evidence for one member and applies snapshot-age decay.
/// Returns `None` when there is no evidence at all: "unknown" is a different
/// fact than "inactive" and callers must not collapse the two.
pub fn resolve(
    member: &MemberRecord,
    real_time: &[EvidenceRecord],
    historical: &[EvidenceRecord],
    now: DateTime<Utc>,
    snapshot_captured_at: DateTime<Utc>,
) -> Option<ActivityVerdict> {
    // Real-time first: on a priority tie the earlier record wins, which keeps
    // selection deterministic and favors live counters.
    let combined: Vec<&EvidenceRecord> = real_time.iter().chain(historical.iter()).collect();

    let mut selected: Option<&EvidenceRecord> = None;
    for record in combined {
        match selected {
            Some(best) if record.priority <= best.priority => {}
            _ => selected = Some(record),
        }
    }
    let selected = selected?;

    let days_since_activity = (now - selected.last_active_at).num_days().max(0);
    let activity_level = if selected.is_real_time {
        selected.activity_level
    } else {
        let days_since_snapshot = (now - snapshot_captured_at).num_days().max(0);
        decayed_level(selected.activity_level, days_since_snapshot)
    };

    Some(ActivityVerdict {
        member_tag: member.tag.clone(),
        member_name: member.name.clone(),
        last_active_at: selected.last_active_at,
        confidence: selected.confidence,
        evidence: selected.evidence.clone(),
        priority: selected.priority,
        activity_level,
        days_since_activity,
        is_real_time: selected.is_real_time,
    })
}

/// Snapshot-age decay: a day-old snapshot is trusted as-is, a week-old one
/// costs two steps, and anything older than a week reads as Inactive.
pub fn decayed_level(level: ActivityLevel, days_since_snapshot: i64) -> ActivityLevel {
    match days_since_snapshot {
        i64::MIN..=1 => level,
        2..=3 => level.downgrade(1),
        4..=7 => level.downgrade(2),
        _ => ActivityLevel::Inactive,
    }
}

/// One member's assessment: the verdict, or `None` when nothing is known.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MemberAssessment {
    pub member_tag: String,
    pub member_name: String,
    pub verdict: Option<ActivityVerdict>,
}

/// Runs the whole engine for one roster: diff the snapshots, extract both
/// evidence branches per member, and resolve. Members present only in
/// `previous` get change events (left_member) but no assessment.
pub fn assess_roster(
    previous: Option<&RosterSnapshot>,
    current: &RosterSnapshot,
    now: DateTime<Utc>,
) -> (Vec<ChangeEvent>, Vec<MemberAssessment>) {
    let events = match previous {
        Some(previous) => changes::detect_changes(previous, current),
        None => Vec::new(),
    };

    let assessments = current
        .members
        .iter()
        .filter(|m| !m.tag.is_empty())
        .map(|member| {
            let member_events: Vec<ChangeEvent> = events
                .iter()
                .filter(|e| e.member_tag == member.tag)
                .cloned()
                .collect();
            let real_time = evidence::from_current_state(member, now);
            let historical = evidence::from_changes(&member_events, current.captured_at);
            MemberAssessment {
                member_tag: member.tag.clone(),
                member_name: member.name.clone(),
                verdict: resolve(member, &real_time, &historical, now, current.captured_at),
            }
        })
        .collect();

    (events, assessments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 12, 12, 0, 0).unwrap()
    }

    fn quiet_member(tag: &str, name: &str) -> MemberRecord {
        MemberRecord {
            tag: tag.to_string(),
            name: name.to_string(),
            town_hall_level: 13,
            bk: None,
            aq: None,
            gw: None,
            rc: None,
            mp: None,
            trophies: 0,
            donations: 0,
            donations_received: 0,
            role: "member".to_string(),
            attack_wins: 0,
            versus_battle_wins: 0,
            versus_trophies: 0,
            capital_contributions: 0,
        }
    }

    fn historical(priority: u8, level: ActivityLevel, at: DateTime<Utc>) -> EvidenceRecord {
        EvidenceRecord {
            last_active_at: at,
            confidence: Confidence::High,
            evidence: vec![format!("signal p{priority}")],
            priority,
            activity_level: level,
            days_since_activity: 0,
            is_real_time: false,
        }
    }

    fn snapshot(members: Vec<MemberRecord>, captured_at: DateTime<Utc>) -> RosterSnapshot {
        RosterSnapshot {
            clan_tag: "#2PR8R8V8P".to_string(),
            clan_name: "Test Clan".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            captured_at,
            members,
        }
    }

    #[test]
    fn empty_evidence_yields_no_verdict() {
        let member = quiet_member("#AAA", "Avery");
        assert_eq!(resolve(&member, &[], &[], now(), now()), None);
    }

    #[test]
    fn highest_priority_wins() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now();
        let records = vec![
            historical(3, ActivityLevel::High, captured),
            historical(5, ActivityLevel::VeryHigh, captured),
            historical(2, ActivityLevel::Medium, captured),
        ];
        let verdict = resolve(&member, &[], &records, now(), captured).unwrap();
        assert_eq!(verdict.priority, 5);
        assert_eq!(verdict.evidence, vec!["signal p5".to_string()]);
    }

    #[test]
    fn priority_ties_keep_list_order() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now();
        let mut first = historical(3, ActivityLevel::High, captured);
        first.evidence = vec!["first".to_string()];
        let mut second = historical(3, ActivityLevel::High, captured);
        second.evidence = vec!["second".to_string()];

        let verdict = resolve(&member, &[], &[first, second], now(), captured).unwrap();
        assert_eq!(verdict.evidence, vec!["first".to_string()]);
    }

    #[test]
    fn real_time_beats_equal_priority_historical() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now() - Duration::days(2);
        let mut live = historical(3, ActivityLevel::High, now());
        live.is_real_time = true;
        live.evidence = vec!["live".to_string()];
        let stale = historical(3, ActivityLevel::High, captured);

        let verdict = resolve(&member, &[live], &[stale], now(), captured).unwrap();
        assert_eq!(verdict.evidence, vec!["live".to_string()]);
        assert!(verdict.is_real_time);
    }

    #[test]
    fn days_since_activity_is_floored() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now() - Duration::hours(30);
        let records = vec![historical(3, ActivityLevel::High, captured)];
        let verdict = resolve(&member, &[], &records, now(), captured).unwrap();
        assert_eq!(verdict.days_since_activity, 1);
    }

    #[test]
    fn decay_tiers() {
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 0), ActivityLevel::VeryHigh);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 1), ActivityLevel::VeryHigh);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 2), ActivityLevel::High);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 3), ActivityLevel::High);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 4), ActivityLevel::Medium);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 7), ActivityLevel::Medium);
        assert_eq!(decayed_level(ActivityLevel::VeryHigh, 8), ActivityLevel::Inactive);
        assert_eq!(decayed_level(ActivityLevel::Low, 8), ActivityLevel::Inactive);
    }

    #[test]
    fn stale_snapshot_forces_inactive_for_historical_evidence() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now() - Duration::days(8);
        let records = vec![historical(5, ActivityLevel::VeryHigh, captured)];
        let verdict = resolve(&member, &[], &records, now(), captured).unwrap();
        assert_eq!(verdict.activity_level, ActivityLevel::Inactive);
        assert_eq!(verdict.days_since_activity, 8);
        // The winning record's provenance is preserved even after decay.
        assert_eq!(verdict.confidence, Confidence::High);
        assert_eq!(verdict.priority, 5);
    }

    #[test]
    fn fresh_snapshot_never_decays() {
        let member = quiet_member("#AAA", "Avery");
        let captured = now();
        let records = vec![historical(3, ActivityLevel::High, captured)];
        let verdict = resolve(&member, &[], &records, now(), captured).unwrap();
        assert_eq!(verdict.activity_level, ActivityLevel::High);
    }

    #[test]
    fn real_time_evidence_ignores_snapshot_age() {
        let mut member = quiet_member("#AAA", "Avery");
        member.attack_wins = 1;
        let captured = now() - Duration::days(30);

        let real_time = evidence::from_current_state(&member, now());
        let verdict = resolve(&member, &real_time, &[], now(), captured).unwrap();
        assert_eq!(verdict.activity_level, ActivityLevel::VeryHigh);
        assert_eq!(verdict.confidence, Confidence::Definitive);
        assert_eq!(verdict.days_since_activity, 0);
        assert!(verdict.is_real_time);
    }

    #[test]
    fn attack_wins_dominate_donations_in_full_pipeline() {
        let mut before = quiet_member("#AAA", "Avery");
        before.donations = 100;
        let mut after = quiet_member("#AAA", "Avery");
        after.donations = 140;
        after.attack_wins = 2;

        let captured = now();
        let previous = snapshot(vec![before], captured - Duration::hours(12));
        let current = snapshot(vec![after], captured);

        let (events, assessments) = assess_roster(Some(&previous), &current, now());
        assert!(events
            .iter()
            .any(|e| e.kind.type_label() == "donation_change"));
        assert!(events
            .iter()
            .any(|e| e.kind.type_label() == "attack_wins_change"));

        let verdict = assessments[0].verdict.clone().unwrap();
        assert_eq!(verdict.priority, 5);
        assert_eq!(verdict.confidence, Confidence::Definitive);
    }

    #[test]
    fn assessments_cover_current_members_only() {
        let before = vec![quiet_member("#AAA", "Avery"), quiet_member("#BBB", "Blake")];
        let after = vec![quiet_member("#AAA", "Avery")];
        let captured = now();
        let previous = snapshot(before, captured - Duration::days(1));
        let current = snapshot(after, captured);

        let (events, assessments) = assess_roster(Some(&previous), &current, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.type_label(), "left_member");
        assert_eq!(assessments.len(), 1);
        assert_eq!(assessments[0].member_tag, "#AAA");
        // A fully quiet member is unknown, not inactive.
        assert_eq!(assessments[0].verdict, None);
    }

    #[test]
    fn engine_is_deterministic_end_to_end() {
        let mut before = quiet_member("#AAA", "Avery");
        before.trophies = 3000;
        let mut after = quiet_member("#AAA", "Avery");
        after.trophies = 3050;
        after.donations = 300;

        let captured = now() - Duration::days(2);
        let previous = snapshot(vec![before], captured - Duration::days(1));
        let current = snapshot(vec![after], captured);

        let first = assess_roster(Some(&previous), &current, now());
        let second = assess_roster(Some(&previous), &current, now());
        assert_eq!(first, second);
    }
}
