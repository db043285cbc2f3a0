use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ChangeEvent, MemberRecord, RosterSnapshot};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let clan_tag = "#2PR8R8V8P";
    let clan_name = "Heckin Chonkers";
    let day_one = NaiveDate::from_ymd_opt(2026, 2, 10).context("invalid date")?;
    let day_two = NaiveDate::from_ymd_opt(2026, 2, 11).context("invalid date")?;
    let captured_one = day_one
        .and_hms_opt(6, 0, 0)
        .context("invalid time")?
        .and_utc();
    let captured_two = captured_one + Duration::days(1);

    let first = RosterSnapshot {
        clan_tag: clan_tag.to_string(),
        clan_name: clan_name.to_string(),
        date: day_one,
        captured_at: captured_one,
        members: vec![
            seed_member("#L2QQ8YV9", "warfroggy", "leader", 14, 4100, 480, 2, 300),
            seed_member("#P0LYRG8C", "DoubleD", "coLeader", 13, 3250, 120, 0, 0),
            seed_member("#Y8VC2J0U", "andrew", "member", 11, 1800, 0, 0, 0),
            seed_member("#G9KQ22LM", "Mags", "elder", 12, 2600, 210, 1, 0),
        ],
    };

    let mut second = first.clone();
    second.date = day_two;
    second.captured_at = captured_two;
    // warfroggy keeps playing, DoubleD gets promoted, andrew goes quiet,
    // Mags leaves and Pixel joins.
    second.members[0].donations = 540;
    second.members[0].trophies = 4140;
    second.members[0].attack_wins = 4;
    second.members[0].capital_contributions = 800;
    second.members[1].role = "leader".to_string();
    second.members.remove(3);
    second
        .members
        .push(seed_member("#2R0V8QXJ", "Pixel", "member", 10, 2100, 60, 0, 0));

    insert_snapshot(pool, &first).await?;
    insert_snapshot(pool, &second).await?;
    Ok(())
}

fn seed_member(
    tag: &str,
    name: &str,
    role: &str,
    town_hall: i64,
    trophies: i64,
    donations: i64,
    attack_wins: i64,
    capital_contributions: i64,
) -> MemberRecord {
    MemberRecord {
        tag: tag.to_string(),
        name: name.to_string(),
        town_hall_level: town_hall,
        bk: Some(town_hall * 5),
        aq: Some(town_hall * 5),
        gw: if town_hall >= 11 { Some(town_hall * 3) } else { None },
        rc: if town_hall >= 13 { Some(town_hall * 2) } else { None },
        mp: None,
        trophies,
        donations,
        donations_received: donations / 2,
        role: role.to_string(),
        attack_wins,
        versus_battle_wins: 0,
        versus_trophies: trophies / 2,
        capital_contributions,
    }
}

pub async fn insert_snapshot(pool: &PgPool, snapshot: &RosterSnapshot) -> anyhow::Result<Uuid> {
    let mut tx = pool.begin().await?;

    let snapshot_id: Uuid = sqlx::query(
        r#"
        INSERT INTO clan_activity.snapshots (id, clan_tag, clan_name, snapshot_date, captured_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (clan_tag, captured_at) DO UPDATE
        SET clan_name = EXCLUDED.clan_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&snapshot.clan_tag)
    .bind(&snapshot.clan_name)
    .bind(snapshot.date)
    .bind(snapshot.captured_at)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    sqlx::query("DELETE FROM clan_activity.snapshot_members WHERE snapshot_id = $1")
        .bind(snapshot_id)
        .execute(&mut *tx)
        .await?;

    for (position, member) in snapshot.members.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO clan_activity.snapshot_members
            (id, snapshot_id, position, tag, name, town_hall_level,
             bk, aq, gw, rc, mp,
             trophies, donations, donations_received, role,
             attack_wins, versus_battle_wins, versus_trophies, capital_contributions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(snapshot_id)
        .bind(position as i32)
        .bind(&member.tag)
        .bind(&member.name)
        .bind(member.town_hall_level)
        .bind(member.bk)
        .bind(member.aq)
        .bind(member.gw)
        .bind(member.rc)
        .bind(member.mp)
        .bind(member.trophies)
        .bind(member.donations)
        .bind(member.donations_received)
        .bind(&member.role)
        .bind(member.attack_wins)
        .bind(member.versus_battle_wins)
        .bind(member.versus_trophies)
        .bind(member.capital_contributions)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(snapshot_id)
}

/// Most recent snapshots for a clan, newest first.
pub async fn latest_snapshots(
    pool: &PgPool,
    clan_tag: &str,
    limit: i64,
) -> anyhow::Result<Vec<RosterSnapshot>> {
    let headers = sqlx::query(
        r#"
        SELECT id, clan_tag, clan_name, snapshot_date, captured_at
        FROM clan_activity.snapshots
        WHERE clan_tag = $1
        ORDER BY captured_at DESC
        LIMIT $2
        "#,
    )
    .bind(clan_tag)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::new();
    for header in headers {
        let snapshot_id: Uuid = header.get("id");
        snapshots.push(RosterSnapshot {
            clan_tag: header.get("clan_tag"),
            clan_name: header.get("clan_name"),
            date: header.get("snapshot_date"),
            captured_at: header.get("captured_at"),
            members: fetch_members(pool, snapshot_id).await?,
        });
    }

    Ok(snapshots)
}

async fn fetch_members(pool: &PgPool, snapshot_id: Uuid) -> anyhow::Result<Vec<MemberRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT tag, name, town_hall_level, bk, aq, gw, rc, mp,
               trophies, donations, donations_received, role,
               attack_wins, versus_battle_wins, versus_trophies, capital_contributions
        FROM clan_activity.snapshot_members
        WHERE snapshot_id = $1
        ORDER BY position
        "#,
    )
    .bind(snapshot_id)
    .fetch_all(pool)
    .await?;

    let mut members = Vec::new();
    for row in rows {
        members.push(MemberRecord {
            tag: row.get("tag"),
            name: row.get("name"),
            town_hall_level: row.get("town_hall_level"),
            bk: row.get("bk"),
            aq: row.get("aq"),
            gw: row.get("gw"),
            rc: row.get("rc"),
            mp: row.get("mp"),
            trophies: row.get("trophies"),
            donations: row.get("donations"),
            donations_received: row.get("donations_received"),
            role: row.get("role"),
            attack_wins: row.get("attack_wins"),
            versus_battle_wins: row.get("versus_battle_wins"),
            versus_trophies: row.get("versus_trophies"),
            capital_contributions: row.get("capital_contributions"),
        });
    }

    Ok(members)
}

/// Persists detected events to the change log for downstream narrative and
/// history features. Returns the number of rows written.
pub async fn record_changes(
    pool: &PgPool,
    clan_tag: &str,
    detected_at: DateTime<Utc>,
    events: &[ChangeEvent],
) -> anyhow::Result<usize> {
    let mut written = 0usize;

    for event in events {
        sqlx::query(
            r#"
            INSERT INTO clan_activity.change_log
            (id, clan_tag, detected_at, member_tag, member_name, change_type,
             previous_value, new_value, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(clan_tag)
        .bind(detected_at)
        .bind(&event.member_tag)
        .bind(&event.member_name)
        .bind(event.kind.type_label())
        .bind(event.kind.previous_text())
        .bind(event.kind.new_text())
        .bind(&event.description)
        .execute(pool)
        .await?;
        written += 1;
    }

    Ok(written)
}
