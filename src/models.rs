use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Ordered activity scale, strongest first. Decay only ever moves toward
/// `Inactive`; it never wraps and never improves a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    #[serde(rename = "Very High")]
    VeryHigh,
    High,
    Medium,
    Low,
    Inactive,
}

impl ActivityLevel {
    const ORDERED: [ActivityLevel; 5] = [
        ActivityLevel::VeryHigh,
        ActivityLevel::High,
        ActivityLevel::Medium,
        ActivityLevel::Low,
        ActivityLevel::Inactive,
    ];

    fn index(self) -> usize {
        Self::ORDERED.iter().position(|l| *l == self).unwrap_or(4)
    }

    pub fn downgrade(self, steps: usize) -> ActivityLevel {
        let idx = (self.index() + steps).min(Self::ORDERED.len() - 1);
        Self::ORDERED[idx]
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityLevel::VeryHigh => "Very High",
            ActivityLevel::High => "High",
            ActivityLevel::Medium => "Medium",
            ActivityLevel::Low => "Low",
            ActivityLevel::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Qualitative strength of an evidence record, independent of numeric priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Definitive,
    High,
    Medium,
    Weak,
}

impl Confidence {
    pub fn label(self) -> &'static str {
        match self {
            Confidence::Definitive => "definitive",
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Weak => "weak",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The five hero slots tracked per member, in upgrade-check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hero {
    Bk,
    Aq,
    Gw,
    Rc,
    Mp,
}

impl Hero {
    pub const ALL: [Hero; 5] = [Hero::Bk, Hero::Aq, Hero::Gw, Hero::Rc, Hero::Mp];

    pub fn code(self) -> &'static str {
        match self {
            Hero::Bk => "bk",
            Hero::Aq => "aq",
            Hero::Gw => "gw",
            Hero::Rc => "rc",
            Hero::Mp => "mp",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Hero::Bk => "Barbarian King",
            Hero::Aq => "Archer Queen",
            Hero::Gw => "Grand Warden",
            Hero::Rc => "Royal Champion",
            Hero::Mp => "Minion Prince",
        }
    }
}

/// One member's counters at a snapshot instant. Field names follow the upstream
/// game API's camelCase JSON. Numeric fields degrade to 0 when missing or
/// non-numeric; hero levels degrade to absent (absent ≠ level 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRecord {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "townHallLevel", deserialize_with = "lenient_i64")]
    pub town_hall_level: i64,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub bk: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub aq: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub gw: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub rc: Option<i64>,
    #[serde(default, deserialize_with = "lenient_opt_i64")]
    pub mp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub trophies: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub donations: i64,
    #[serde(default, rename = "donationsReceived", deserialize_with = "lenient_i64")]
    pub donations_received: i64,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, rename = "attackWins", deserialize_with = "lenient_i64")]
    pub attack_wins: i64,
    #[serde(default, rename = "versusBattleWins", deserialize_with = "lenient_i64")]
    pub versus_battle_wins: i64,
    #[serde(default, rename = "versusTrophies", deserialize_with = "lenient_i64")]
    pub versus_trophies: i64,
    #[serde(
        default,
        rename = "capitalContributions",
        deserialize_with = "lenient_i64"
    )]
    pub capital_contributions: i64,
}

impl MemberRecord {
    pub fn hero_level(&self, hero: Hero) -> Option<i64> {
        match hero {
            Hero::Bk => self.bk,
            Hero::Aq => self.aq,
            Hero::Gw => self.gw,
            Hero::Rc => self.rc,
            Hero::Mp => self.mp,
        }
    }
}

fn default_role() -> String {
    "member".to_string()
}

/// Upstream data is occasionally incomplete: a counter may arrive as a number,
/// a numeric string, null, or garbage. Anything non-numeric becomes the
/// default rather than a deserialization error.
fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_i64(&value).unwrap_or(0))
}

fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce_i64(&value))
}

fn coerce_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// A captured, dated roster state. Immutable once built; members keep their
/// insertion order, and tags are unique within one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub clan_tag: String,
    #[serde(default)]
    pub clan_name: String,
    pub date: NaiveDate,
    #[serde(rename = "fetchedAt")]
    pub captured_at: DateTime<Utc>,
    pub members: Vec<MemberRecord>,
}

/// One detected difference for one member. The `type` tag vocabulary is a
/// downstream contract; see the serde attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    NewMember,
    LeftMember,
    TownHallUpgrade {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    HeroUpgrade {
        hero: Hero,
        #[serde(rename = "previousValue")]
        previous: Option<i64>,
        #[serde(rename = "newValue")]
        current: i64,
    },
    TrophyChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    DonationChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    DonationReceivedChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    AttackWinsChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    VersusBattleWinsChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    VersusTrophiesChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    CapitalContributionsChange {
        #[serde(rename = "previousValue")]
        previous: i64,
        #[serde(rename = "newValue")]
        current: i64,
    },
    RoleChange {
        #[serde(rename = "previousValue")]
        previous: String,
        #[serde(rename = "newValue")]
        current: String,
    },
}

impl ChangeKind {
    pub fn type_label(&self) -> &'static str {
        match self {
            ChangeKind::NewMember => "new_member",
            ChangeKind::LeftMember => "left_member",
            ChangeKind::TownHallUpgrade { .. } => "town_hall_upgrade",
            ChangeKind::HeroUpgrade { .. } => "hero_upgrade",
            ChangeKind::TrophyChange { .. } => "trophy_change",
            ChangeKind::DonationChange { .. } => "donation_change",
            ChangeKind::DonationReceivedChange { .. } => "donation_received_change",
            ChangeKind::AttackWinsChange { .. } => "attack_wins_change",
            ChangeKind::VersusBattleWinsChange { .. } => "versus_battle_wins_change",
            ChangeKind::VersusTrophiesChange { .. } => "versus_trophies_change",
            ChangeKind::CapitalContributionsChange { .. } => "capital_contributions_change",
            ChangeKind::RoleChange { .. } => "role_change",
        }
    }

    pub fn previous_text(&self) -> Option<String> {
        match self {
            ChangeKind::NewMember | ChangeKind::LeftMember => None,
            ChangeKind::TownHallUpgrade { previous, .. }
            | ChangeKind::TrophyChange { previous, .. }
            | ChangeKind::DonationChange { previous, .. }
            | ChangeKind::DonationReceivedChange { previous, .. }
            | ChangeKind::AttackWinsChange { previous, .. }
            | ChangeKind::VersusBattleWinsChange { previous, .. }
            | ChangeKind::VersusTrophiesChange { previous, .. }
            | ChangeKind::CapitalContributionsChange { previous, .. } => Some(previous.to_string()),
            ChangeKind::HeroUpgrade { previous, .. } => previous.map(|v| v.to_string()),
            ChangeKind::RoleChange { previous, .. } => Some(previous.clone()),
        }
    }

    pub fn new_text(&self) -> Option<String> {
        match self {
            ChangeKind::NewMember | ChangeKind::LeftMember => None,
            ChangeKind::TownHallUpgrade { current, .. }
            | ChangeKind::TrophyChange { current, .. }
            | ChangeKind::DonationChange { current, .. }
            | ChangeKind::DonationReceivedChange { current, .. }
            | ChangeKind::AttackWinsChange { current, .. }
            | ChangeKind::VersusBattleWinsChange { current, .. }
            | ChangeKind::VersusTrophiesChange { current, .. }
            | ChangeKind::CapitalContributionsChange { current, .. }
            | ChangeKind::HeroUpgrade { current, .. } => Some(current.to_string()),
            ChangeKind::RoleChange { current, .. } => Some(current.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub member_tag: String,
    pub member_name: String,
    pub role: String,
    pub town_hall_level: i64,
    #[serde(flatten)]
    pub kind: ChangeKind,
    pub description: String,
}

/// A normalized activity signal for one member, from either a change event or
/// raw current counters. `days_since_activity` stays 0 until the resolver
/// recomputes it; `is_real_time` distinguishes "read off live counters just
/// now" from "zero days old".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidenceRecord {
    pub last_active_at: DateTime<Utc>,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
    pub priority: u8,
    pub activity_level: ActivityLevel,
    pub days_since_activity: i64,
    pub is_real_time: bool,
}

/// Final per-member output: the winning evidence record after decay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityVerdict {
    pub member_tag: String,
    pub member_name: String,
    pub last_active_at: DateTime<Utc>,
    pub confidence: Confidence,
    pub evidence: Vec<String>,
    pub priority: u8,
    pub activity_level: ActivityLevel,
    pub days_since_activity: i64,
    pub is_real_time: bool,
}
