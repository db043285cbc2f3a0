use std::collections::HashMap;

use crate::models::{ChangeEvent, ChangeKind, Hero, MemberRecord, RosterSnapshot};

pub const TROPHY_DELTA_THRESHOLD: i64 = 20;
pub const DONATION_DELTA_THRESHOLD: i64 = 25;
pub const VERSUS_TROPHY_DELTA_THRESHOLD: i64 = 10;

/// Compares two snapshots of the same clan and returns every significant
/// difference, in a fixed order: joins, then departures, then per-member field
/// changes in the order town hall, heroes, trophies, donations, donations
/// received, attack wins, versus battles, versus trophies, capital
/// contributions, role. Consumers that take the first event per member rely on
/// this order.
pub fn detect_changes(previous: &RosterSnapshot, current: &RosterSnapshot) -> Vec<ChangeEvent> {
    let previous_by_tag: HashMap<&str, &MemberRecord> = previous
        .members
        .iter()
        .filter(|m| !m.tag.is_empty())
        .map(|m| (m.tag.as_str(), m))
        .collect();
    let current_by_tag: HashMap<&str, &MemberRecord> = current
        .members
        .iter()
        .filter(|m| !m.tag.is_empty())
        .map(|m| (m.tag.as_str(), m))
        .collect();

    let mut events = Vec::new();

    for member in current.members.iter().filter(|m| !m.tag.is_empty()) {
        if !previous_by_tag.contains_key(member.tag.as_str()) {
            events.push(event(
                member,
                ChangeKind::NewMember,
                format!("{} joined the clan", member.name),
            ));
        }
    }

    for member in previous.members.iter().filter(|m| !m.tag.is_empty()) {
        if !current_by_tag.contains_key(member.tag.as_str()) {
            events.push(event(
                member,
                ChangeKind::LeftMember,
                format!("{} left the clan", member.name),
            ));
        }
    }

    for member in current.members.iter().filter(|m| !m.tag.is_empty()) {
        if let Some(before) = previous_by_tag.get(member.tag.as_str()) {
            compare_member(before, member, &mut events);
        }
    }

    events
}

fn compare_member(before: &MemberRecord, after: &MemberRecord, events: &mut Vec<ChangeEvent>) {
    if after.town_hall_level != before.town_hall_level {
        events.push(event(
            after,
            ChangeKind::TownHallUpgrade {
                previous: before.town_hall_level,
                current: after.town_hall_level,
            },
            format!(
                "{} upgraded Town Hall {} -> {}",
                after.name, before.town_hall_level, after.town_hall_level
            ),
        ));
    }

    // Heroes only move up in-game; a decrease in the data is noise, not an
    // event. An absent previous level is non-comparable, so a newly unlocked
    // hero does not fire either.
    for hero in Hero::ALL {
        if let (Some(prev), Some(curr)) = (before.hero_level(hero), after.hero_level(hero)) {
            if curr > prev {
                events.push(event(
                    after,
                    ChangeKind::HeroUpgrade {
                        hero,
                        previous: Some(prev),
                        current: curr,
                    },
                    format!(
                        "{} upgraded {} to level {}",
                        after.name,
                        hero.display_name(),
                        curr
                    ),
                ));
            }
        }
    }

    let trophy_delta = after.trophies - before.trophies;
    if trophy_delta.abs() >= TROPHY_DELTA_THRESHOLD {
        let verb = if trophy_delta > 0 { "gained" } else { "lost" };
        events.push(event(
            after,
            ChangeKind::TrophyChange {
                previous: before.trophies,
                current: after.trophies,
            },
            format!("{} {} {} trophies", after.name, verb, trophy_delta.abs()),
        ));
    }

    // Donation counters reset each season; only increases are meaningful.
    let donation_delta = after.donations - before.donations;
    if donation_delta >= DONATION_DELTA_THRESHOLD {
        events.push(event(
            after,
            ChangeKind::DonationChange {
                previous: before.donations,
                current: after.donations,
            },
            format!("{} donated {} troops", after.name, donation_delta),
        ));
    }

    let received_delta = after.donations_received - before.donations_received;
    if received_delta >= DONATION_DELTA_THRESHOLD {
        events.push(event(
            after,
            ChangeKind::DonationReceivedChange {
                previous: before.donations_received,
                current: after.donations_received,
            },
            format!("{} received {} troops", after.name, received_delta),
        ));
    }

    let attack_delta = after.attack_wins - before.attack_wins;
    if attack_delta > 0 {
        events.push(event(
            after,
            ChangeKind::AttackWinsChange {
                previous: before.attack_wins,
                current: after.attack_wins,
            },
            format!("{} won {} attacks", after.name, attack_delta),
        ));
    }

    let versus_delta = after.versus_battle_wins - before.versus_battle_wins;
    if versus_delta > 0 {
        events.push(event(
            after,
            ChangeKind::VersusBattleWinsChange {
                previous: before.versus_battle_wins,
                current: after.versus_battle_wins,
            },
            format!("{} won {} versus battles", after.name, versus_delta),
        ));
    }

    let versus_trophy_delta = after.versus_trophies - before.versus_trophies;
    if versus_trophy_delta.abs() >= VERSUS_TROPHY_DELTA_THRESHOLD {
        events.push(event(
            after,
            ChangeKind::VersusTrophiesChange {
                previous: before.versus_trophies,
                current: after.versus_trophies,
            },
            format!(
                "{} versus trophies changed by {}",
                after.name, versus_trophy_delta
            ),
        ));
    }

    let capital_delta = after.capital_contributions - before.capital_contributions;
    if capital_delta > 0 {
        events.push(event(
            after,
            ChangeKind::CapitalContributionsChange {
                previous: before.capital_contributions,
                current: after.capital_contributions,
            },
            format!("{} contributed {} capital gold", after.name, capital_delta),
        ));
    }

    if after.role != before.role {
        events.push(event(
            after,
            ChangeKind::RoleChange {
                previous: before.role.clone(),
                current: after.role.clone(),
            },
            format!(
                "{} role changed from {} to {}",
                after.name, before.role, after.role
            ),
        ));
    }
}

fn event(member: &MemberRecord, kind: ChangeKind, description: String) -> ChangeEvent {
    ChangeEvent {
        member_tag: member.tag.clone(),
        member_name: member.name.clone(),
        role: member.role.clone(),
        town_hall_level: member.town_hall_level,
        kind,
        description,
    }
}
