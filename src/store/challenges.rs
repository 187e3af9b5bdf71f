//! SQLite challenge bank.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, instrument};

use super::{ChallengeRepository, Database, StoreError};
use crate::domain::{Challenge, ChallengeId, NewChallenge};

const SELECT_COLUMNS: &str =
    "SELECT id, name, description, category, difficulty, duration_minutes, image_path FROM challenges";

#[derive(Clone)]
pub struct SqliteChallenges {
    db: Database,
}

impl SqliteChallenges {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(level = "debug", skip(self, challenge), fields(name = %challenge.name))]
    pub fn create(&self, challenge: &NewChallenge) -> Result<Challenge, StoreError> {
        let conn = self.db.conn()?;
        let id = insert(&conn, challenge)?;
        Ok(challenge.clone().with_id(id))
    }

    /// Returns `false` when no challenge has that id.
    #[instrument(level = "debug", skip(self, challenge))]
    pub fn update(&self, id: ChallengeId, challenge: &NewChallenge) -> Result<bool, StoreError> {
        let conn = self.db.conn()?;
        let changed = conn.execute(
            "UPDATE challenges SET name = ?1, description = ?2, category = ?3, difficulty = ?4, \
             duration_minutes = ?5, image_path = ?6 WHERE id = ?7",
            params![
                challenge.name,
                challenge.description,
                challenge.category,
                challenge.difficulty,
                challenge.duration_minutes,
                challenge.image_path,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Returns `false` when no challenge has that id.
    #[instrument(level = "debug", skip(self))]
    pub fn delete(&self, id: ChallengeId) -> Result<bool, StoreError> {
        let conn = self.db.conn()?;
        let changed = conn.execute("DELETE FROM challenges WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    pub fn find_by_category(&self, category: &str) -> Result<Vec<Challenge>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE lower(trim(category)) = lower(trim(?1)) ORDER BY id"
        ))?;
        let rows = stmt.query_map([category], map_challenge)?;
        collect(rows)
    }

    pub fn find_by_difficulty(&self, difficulty: u8) -> Result<Vec<Challenge>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE difficulty = ?1 ORDER BY id"))?;
        let rows = stmt.query_map([difficulty], map_challenge)?;
        collect(rows)
    }

    /// Inclusive on both ends.
    pub fn find_by_duration_range(&self, min: u32, max: u32) -> Result<Vec<Challenge>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE duration_minutes BETWEEN ?1 AND ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map([min, max], map_challenge)?;
        collect(rows)
    }

    /// Distinct category labels, sorted case-insensitively. Labels differing
    /// only by case collapse to the first one stored.
    pub fn categories(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(
            "SELECT category, MIN(id) FROM challenges GROUP BY lower(trim(category)) \
             ORDER BY lower(trim(category))",
        )?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = vec![];
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM challenges", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// First-run seeding: inserts `defaults` only if the bank is empty.
    pub fn seed_if_empty(&self, defaults: &[NewChallenge]) -> Result<usize, StoreError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        let n: i64 = tx.query_row("SELECT COUNT(*) FROM challenges", [], |r| r.get(0))?;
        if n > 0 {
            return Ok(0);
        }
        for c in defaults {
            insert(&tx, c)?;
        }
        tx.commit()?;
        info!(target: "challenge", inserted = defaults.len(), "Seeded empty challenge bank");
        Ok(defaults.len())
    }
}

impl ChallengeRepository for SqliteChallenges {
    fn list_all(&self) -> Result<Vec<Challenge>, StoreError> {
        let conn = self.db.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let rows = stmt.query_map([], map_challenge)?;
        collect(rows)
    }

    fn find_by_id(&self, id: ChallengeId) -> Result<Option<Challenge>, StoreError> {
        let conn = self.db.conn()?;
        let found = conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], map_challenge)
            .optional()?;
        Ok(found)
    }

    #[instrument(level = "info", skip_all, fields(defaults = defaults.len()))]
    fn replace_all(&self, defaults: &[NewChallenge]) -> Result<usize, StoreError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM challenges", [])?;
        for c in defaults {
            insert(&tx, c)?;
        }
        tx.commit()?;
        info!(target: "challenge", removed, inserted = defaults.len(), "Challenge bank replaced");
        Ok(defaults.len())
    }
}

fn insert(conn: &Connection, c: &NewChallenge) -> Result<ChallengeId, StoreError> {
    conn.execute(
        "INSERT INTO challenges (name, description, category, difficulty, duration_minutes, image_path) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![c.name, c.description, c.category, c.difficulty, c.duration_minutes, c.image_path],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_challenge(row: &Row) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        difficulty: row.get(4)?,
        duration_minutes: row.get(5)?,
        image_path: row.get(6)?,
    })
}

fn collect(
    rows: impl Iterator<Item = rusqlite::Result<Challenge>>,
) -> Result<Vec<Challenge>, StoreError> {
    let mut out = vec![];
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
