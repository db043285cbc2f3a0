use chrono::{DateTime, Utc};

use crate::models::{
    ActivityLevel, ChangeEvent, ChangeKind, Confidence, EvidenceRecord, MemberRecord,
};

/// The single ranking table for historical signals: change type ->
/// (priority, confidence). Role changes and departures carry no activity
/// information and are excluded.
pub fn signal_rank(kind: &ChangeKind) -> Option<(u8, Confidence)> {
    match kind {
        ChangeKind::AttackWinsChange { .. } => Some((5, Confidence::Definitive)),
        ChangeKind::CapitalContributionsChange { .. } => Some((4, Confidence::Definitive)),
        ChangeKind::DonationChange { .. }
        | ChangeKind::DonationReceivedChange { .. }
        | ChangeKind::TownHallUpgrade { .. }
        | ChangeKind::HeroUpgrade { .. } => Some((3, Confidence::High)),
        ChangeKind::TrophyChange { .. }
        | ChangeKind::VersusBattleWinsChange { .. }
        | ChangeKind::VersusTrophiesChange { .. } => Some((2, Confidence::Medium)),
        ChangeKind::NewMember => Some((1, Confidence::Weak)),
        ChangeKind::LeftMember | ChangeKind::RoleChange { .. } => None,
    }
}

/// Inferred level for a historical signal tracks its priority, so the decayed
/// display value still reflects signal strength.
pub fn level_for_priority(priority: u8) -> ActivityLevel {
    match priority {
        4..=u8::MAX => ActivityLevel::VeryHigh,
        3 => ActivityLevel::High,
        2 => ActivityLevel::Medium,
        _ => ActivityLevel::Low,
    }
}

/// Maps one member's change events to evidence records. `captured_at` is the
/// snapshot capture instant, not "now": the change happened at some point
/// before capture, and the resolver accounts for the gap.
pub fn from_changes(events: &[ChangeEvent], captured_at: DateTime<Utc>) -> Vec<EvidenceRecord> {
    events
        .iter()
        .filter_map(|event| {
            let (priority, confidence) = signal_rank(&event.kind)?;
            Some(EvidenceRecord {
                last_active_at: captured_at,
                confidence,
                evidence: vec![change_evidence_text(&event.kind)],
                priority,
                activity_level: level_for_priority(priority),
                days_since_activity: 0,
                is_real_time: false,
            })
        })
        .collect()
}

fn change_evidence_text(kind: &ChangeKind) -> String {
    match kind {
        ChangeKind::NewMember => "joined the clan".to_string(),
        ChangeKind::LeftMember => "left the clan".to_string(),
        ChangeKind::TownHallUpgrade { previous, current } => {
            format!("townHallLevel: {} -> {}", previous, current)
        }
        ChangeKind::HeroUpgrade {
            hero,
            previous,
            current,
        } => match previous {
            Some(prev) => format!("{}: {} -> {}", hero.code(), prev, current),
            None => format!("{}: unlocked at {}", hero.code(), current),
        },
        ChangeKind::TrophyChange { previous, current } => {
            format!("trophies: {:+}", current - previous)
        }
        ChangeKind::DonationChange { previous, current } => {
            format!("donations: {:+}", current - previous)
        }
        ChangeKind::DonationReceivedChange { previous, current } => {
            format!("donationsReceived: {:+}", current - previous)
        }
        ChangeKind::AttackWinsChange { previous, current } => {
            format!("attackWins: {:+}", current - previous)
        }
        ChangeKind::VersusBattleWinsChange { previous, current } => {
            format!("versusBattleWins: {:+}", current - previous)
        }
        ChangeKind::VersusTrophiesChange { previous, current } => {
            format!("versusTrophies: {:+}", current - previous)
        }
        ChangeKind::CapitalContributionsChange { previous, current } => {
            format!("capitalContributions: {:+}", current - previous)
        }
        ChangeKind::RoleChange { previous, current } => {
            format!("role: {} -> {}", previous, current)
        }
    }
}

/// Reads activity straight off a member's current counters, independent of
/// any diff. These records use `now` and never decay: a live counter is live
/// no matter how old the snapshot that carried it.
pub fn from_current_state(member: &MemberRecord, now: DateTime<Utc>) -> Vec<EvidenceRecord> {
    let mut records = Vec::new();

    if let Some(level) = donation_tier(member.donations) {
        records.push(real_time(
            now,
            Confidence::High,
            format!("donations: {} this season", member.donations),
            3,
            level,
        ));
    }

    if let Some(level) = trophy_tier(member.trophies) {
        records.push(real_time(
            now,
            Confidence::Medium,
            format!("trophies: {}", member.trophies),
            2,
            level,
        ));
    }

    if member.capital_contributions > 0 {
        records.push(real_time(
            now,
            Confidence::Definitive,
            format!(
                "capitalContributions: {} this season",
                member.capital_contributions
            ),
            4,
            ActivityLevel::VeryHigh,
        ));
    }

    // Attack wins only accrue through played attacks in the current combat
    // period, so any non-zero value is proof of recent participation.
    if member.attack_wins > 0 {
        records.push(real_time(
            now,
            Confidence::Definitive,
            format!("attackWins: {} this season", member.attack_wins),
            5,
            ActivityLevel::VeryHigh,
        ));
    }

    records
}

fn donation_tier(donations: i64) -> Option<ActivityLevel> {
    match donations {
        1000.. => Some(ActivityLevel::VeryHigh),
        500..=999 => Some(ActivityLevel::High),
        200..=499 => Some(ActivityLevel::Medium),
        50..=199 => Some(ActivityLevel::Low),
        _ => None,
    }
}

fn trophy_tier(trophies: i64) -> Option<ActivityLevel> {
    match trophies {
        5000.. => Some(ActivityLevel::VeryHigh),
        4000..=4999 => Some(ActivityLevel::High),
        3000..=3999 => Some(ActivityLevel::Medium),
        2000..=2999 => Some(ActivityLevel::Low),
        _ => None,
    }
}

fn real_time(
    now: DateTime<Utc>,
    confidence: Confidence,
    text: String,
    priority: u8,
    level: ActivityLevel,
) -> EvidenceRecord {
    EvidenceRecord {
        last_active_at: now,
        confidence,
        evidence: vec![text],
        priority,
        activity_level: level,
        days_since_activity: 0,
        is_real_time: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 6, 0, 0).unwrap()
    }

    fn event(kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            member_tag: "#AAA".to_string(),
            member_name: "Avery".to_string(),
            role: "member".to_string(),
            town_hall_level: 13,
            kind,
            description: String::new(),
        }
    }

    fn quiet_member() -> MemberRecord {
        MemberRecord {
            tag: "#AAA".to_string(),
            name: "Avery".to_string(),
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

    #[test]
    fn historical_table_ranks_signal_families() {
        let attack = ChangeKind::AttackWinsChange {
            previous: 0,
            current: 2,
        };
        let capital = ChangeKind::CapitalContributionsChange {
            previous: 0,
            current: 500,
        };
        let donation = ChangeKind::DonationChange {
            previous: 100,
            current: 140,
        };
        let trophy = ChangeKind::TrophyChange {
            previous: 2000,
            current: 2040,
        };
        assert_eq!(signal_rank(&attack), Some((5, Confidence::Definitive)));
        assert_eq!(signal_rank(&capital), Some((4, Confidence::Definitive)));
        assert_eq!(signal_rank(&donation), Some((3, Confidence::High)));
        assert_eq!(signal_rank(&trophy), Some((2, Confidence::Medium)));
        assert_eq!(signal_rank(&ChangeKind::NewMember), Some((1, Confidence::Weak)));
    }

    #[test]
    fn role_changes_and_departures_are_not_activity() {
        let role = ChangeKind::RoleChange {
            previous: "member".to_string(),
            current: "elder".to_string(),
        };
        assert_eq!(signal_rank(&role), None);
        assert_eq!(signal_rank(&ChangeKind::LeftMember), None);

        let records = from_changes(&[event(role), event(ChangeKind::LeftMember)], captured());
        assert!(records.is_empty());
    }

    #[test]
    fn historical_records_use_capture_time() {
        let records = from_changes(
            &[event(ChangeKind::AttackWinsChange {
                previous: 0,
                current: 2,
            })],
            captured(),
        );
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.last_active_at, captured());
        assert_eq!(record.priority, 5);
        assert_eq!(record.confidence, Confidence::Definitive);
        assert_eq!(record.activity_level, ActivityLevel::VeryHigh);
        assert_eq!(record.evidence, vec!["attackWins: +2".to_string()]);
        assert_eq!(record.days_since_activity, 0);
        assert!(!record.is_real_time);
    }

    #[test]
    fn donation_change_maps_to_priority_three() {
        let records = from_changes(
            &[event(ChangeKind::DonationChange {
                previous: 100,
                current: 140,
            })],
            captured(),
        );
        assert_eq!(records[0].priority, 3);
        assert_eq!(records[0].confidence, Confidence::High);
        assert_eq!(records[0].evidence, vec!["donations: +40".to_string()]);
    }

    #[test]
    fn donation_tiers_match_thresholds() {
        assert_eq!(donation_tier(49), None);
        assert_eq!(donation_tier(50), Some(ActivityLevel::Low));
        assert_eq!(donation_tier(200), Some(ActivityLevel::Medium));
        assert_eq!(donation_tier(500), Some(ActivityLevel::High));
        assert_eq!(donation_tier(1000), Some(ActivityLevel::VeryHigh));
    }

    #[test]
    fn trophy_tiers_match_thresholds() {
        assert_eq!(trophy_tier(1999), None);
        assert_eq!(trophy_tier(2000), Some(ActivityLevel::Low));
        assert_eq!(trophy_tier(3000), Some(ActivityLevel::Medium));
        assert_eq!(trophy_tier(4000), Some(ActivityLevel::High));
        assert_eq!(trophy_tier(5000), Some(ActivityLevel::VeryHigh));
    }

    #[test]
    fn quiet_member_produces_no_real_time_evidence() {
        let now = captured();
        assert!(from_current_state(&quiet_member(), now).is_empty());
    }

    #[test]
    fn real_time_records_keep_field_check_order() {
        let mut member = quiet_member();
        member.donations = 600;
        member.trophies = 3100;
        member.capital_contributions = 200;
        member.attack_wins = 1;

        let now = captured();
        let records = from_current_state(&member, now);
        let priorities: Vec<u8> = records.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![3, 2, 4, 5]);
        assert!(records.iter().all(|r| r.is_real_time));
        assert!(records.iter().all(|r| r.last_active_at == now));
        assert!(records.iter().all(|r| r.days_since_activity == 0));
    }

    #[test]
    fn attack_wins_are_the_strongest_real_time_signal() {
        let mut member = quiet_member();
        member.attack_wins = 3;

        let records = from_current_state(&member, captured());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].priority, 5);
        assert_eq!(records[0].confidence, Confidence::Definitive);
        assert_eq!(records[0].activity_level, ActivityLevel::VeryHigh);
    }
}
