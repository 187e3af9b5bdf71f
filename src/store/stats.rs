//! SQLite completion history and the cumulative stats row.
//!
//! Completion rows are joined with their challenge using aliased columns so
//! every field is read by a distinct name. A row that fails to map is an
//! error, never a half-filled record.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, instrument};

use super::{Database, StatsRepository, StoreError, DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::domain::{Challenge, ChallengeId, CompletedChallenge, DateRange, NewCompletion, UserStats};

const COMPLETION_SELECT: &str = r#"
SELECT cc.id               AS completion_id,
       cc.challenge_id     AS completion_challenge_id,
       cc.completion_date  AS completion_date,
       c.id                AS challenge_id,
       c.name              AS challenge_name,
       c.description       AS challenge_description,
       c.category          AS challenge_category,
       c.difficulty        AS challenge_difficulty,
       c.duration_minutes  AS challenge_duration,
       c.image_path        AS challenge_image
FROM completed_challenges cc
LEFT JOIN challenges c ON c.id = cc.challenge_id
"#;

#[derive(Clone)]
pub struct SqliteStats {
    db: Database,
}

impl SqliteStats {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Every completion, newest first.
    pub fn list_all_completions(&self) -> Result<Vec<CompletedChallenge>, StoreError> {
        let conn = self.db.conn()?;
        query_completions(
            &conn,
            &format!("{COMPLETION_SELECT} ORDER BY cc.completion_date DESC, cc.id DESC"),
            params![],
        )
    }

    pub fn completions_for_challenge(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<Vec<CompletedChallenge>, StoreError> {
        let conn = self.db.conn()?;
        query_completions(
            &conn,
            &format!(
                "{COMPLETION_SELECT} WHERE cc.challenge_id = ?1 ORDER BY cc.completion_date DESC, cc.id DESC"
            ),
            params![challenge_id],
        )
    }

    /// Completion counts per category, most frequent first. Completions of
    /// deleted challenges are not counted. Labels differing only by case or
    /// surrounding space share one count under the first label stored, as in
    /// `SqliteChallenges::categories`.
    pub fn counts_by_category(&self) -> Result<Vec<(String, u32)>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.category AS category, MIN(c.id) AS first_id, COUNT(*) AS total \
             FROM completed_challenges cc \
             JOIN challenges c ON c.id = cc.challenge_id \
             GROUP BY lower(trim(c.category)) \
             ORDER BY total DESC, lower(trim(c.category))",
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((r.get::<_, String>("category")?, r.get::<_, u32>("total")?))
        })?;
        let mut out = vec![];
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Completion counts per calendar day inside `range`. Days without
    /// completions are absent.
    pub fn counts_by_date(&self, range: DateRange) -> Result<Vec<(NaiveDate, u32)>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date(completion_date) AS day, COUNT(*) AS total FROM completed_challenges \
             WHERE date(completion_date) BETWEEN ?1 AND ?2 \
             GROUP BY date(completion_date) ORDER BY day",
        )?;
        let rows = stmt.query_map(params![fmt_date(range.start), fmt_date(range.end)], |r| {
            Ok((r.get::<_, String>("day")?, r.get::<_, u32>("total")?))
        })?;
        let mut out = vec![];
        for r in rows {
            let (day, total) = r?;
            out.push((parse_date(&day)?, total));
        }
        Ok(out)
    }
}

impl StatsRepository for SqliteStats {
    fn load_stats(&self) -> Result<Option<UserStats>, StoreError> {
        let conn = self.db.conn()?;
        let row = conn
            .query_row(
                "SELECT total_challenges_completed, total_minutes_exercised, streak_days, last_challenge_date \
                 FROM user_stats WHERE id = 1",
                [],
                |r| {
                    Ok((
                        r.get::<_, u32>(0)?,
                        r.get::<_, u32>(1)?,
                        r.get::<_, u32>(2)?,
                        r.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((total, minutes, streak, last)) = row else {
            return Ok(None);
        };
        let last_challenge_date = last.as_deref().map(parse_date).transpose()?;
        Ok(Some(UserStats {
            total_challenges_completed: total,
            total_minutes_exercised: minutes,
            streak_days: streak,
            last_challenge_date,
        }))
    }

    fn save_stats(&self, stats: &UserStats) -> Result<(), StoreError> {
        let conn = self.db.conn()?;
        write_stats(&conn, stats)
    }

    fn append_completion(&self, completion: &NewCompletion) -> Result<CompletedChallenge, StoreError> {
        let conn = self.db.conn()?;
        let id = insert_completion(&conn, completion)?;
        load_completion(&conn, id)
    }

    #[instrument(level = "debug", skip_all, fields(challenge_id = completion.challenge_id))]
    fn commit_completion(
        &self,
        completion: &NewCompletion,
        stats: &UserStats,
    ) -> Result<CompletedChallenge, StoreError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        let id = insert_completion(&tx, completion)?;
        write_stats(&tx, stats)?;
        let saved = load_completion(&tx, id)?;
        tx.commit()?;
        debug!(target: "stats", completion_id = id, "Completion and stats committed");
        Ok(saved)
    }

    fn delete_all_completions(&self) -> Result<usize, StoreError> {
        let conn = self.db.conn()?;
        Ok(conn.execute("DELETE FROM completed_challenges", [])?)
    }

    fn list_completions(&self, range: DateRange) -> Result<Vec<CompletedChallenge>, StoreError> {
        let conn = self.db.conn()?;
        query_completions(
            &conn,
            &format!(
                "{COMPLETION_SELECT} WHERE date(cc.completion_date) BETWEEN ?1 AND ?2 \
                 ORDER BY cc.completion_date DESC, cc.id DESC"
            ),
            params![fmt_date(range.start), fmt_date(range.end)],
        )
    }
}

fn write_stats(conn: &Connection, stats: &UserStats) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO user_stats (id, total_challenges_completed, total_minutes_exercised, streak_days, last_challenge_date) \
         VALUES (1, ?1, ?2, ?3, ?4) \
         ON CONFLICT(id) DO UPDATE SET \
             total_challenges_completed = ?1, total_minutes_exercised = ?2, \
             streak_days = ?3, last_challenge_date = ?4",
        params![
            stats.total_challenges_completed,
            stats.total_minutes_exercised,
            stats.streak_days,
            stats.last_challenge_date.map(fmt_date),
        ],
    )?;
    Ok(())
}

fn insert_completion(conn: &Connection, completion: &NewCompletion) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO completed_challenges (challenge_id, completion_date) VALUES (?1, ?2)",
        params![
            completion.challenge_id,
            completion.completed_at.format(TIMESTAMP_FORMAT).to_string()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn load_completion(conn: &Connection, id: i64) -> Result<CompletedChallenge, StoreError> {
    let mut found = query_completions(conn, &format!("{COMPLETION_SELECT} WHERE cc.id = ?1"), params![id])?;
    found
        .pop()
        .ok_or_else(|| StoreError::Corrupt(format!("completion {id} vanished after insert")))
}

fn query_completions(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<CompletedChallenge>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(args)?;
    let mut out = vec![];
    while let Some(row) = rows.next()? {
        out.push(map_completion(row)?);
    }
    Ok(out)
}

fn map_completion(row: &Row) -> Result<CompletedChallenge, StoreError> {
    let raw_date: String = row.get("completion_date")?;
    let completed_at = NaiveDateTime::parse_from_str(&raw_date, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("completion_date '{raw_date}': {e}")))?;

    let challenge = match row.get::<_, Option<ChallengeId>>("challenge_id")? {
        Some(id) => Some(Challenge {
            id,
            name: row.get("challenge_name")?,
            description: row.get("challenge_description")?,
            category: row.get("challenge_category")?,
            difficulty: row.get("challenge_difficulty")?,
            duration_minutes: row.get("challenge_duration")?,
            image_path: row.get("challenge_image")?,
        }),
        None => None,
    };

    Ok(CompletedChallenge {
        id: row.get("completion_id")?,
        challenge_id: row.get("completion_challenge_id")?,
        completed_at,
        challenge,
    })
}

fn fmt_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("date '{s}': {e}")))
}
