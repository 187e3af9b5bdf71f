//! Key/value application settings.

use rusqlite::{params, OptionalExtension};

use super::{Database, StoreError};

#[derive(Clone)]
pub struct SqliteSettings {
    db: Database,
}

impl SqliteSettings {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.db.conn()?;
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |r| r.get(0))
            .optional()?;
        Ok(value)
    }

    /// Write several keys in one transaction.
    pub fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut conn = self.db.conn()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_overwrite() {
        let settings = SqliteSettings::new(Database::open_in_memory().unwrap());
        assert_eq!(settings.get("a").unwrap(), None);
        settings.set_many(&[("a", "1".into()), ("b", "x".into())]).unwrap();
        settings.set_many(&[("a", "2".into())]).unwrap();
        assert_eq!(settings.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(settings.get("b").unwrap().as_deref(), Some("x"));
    }
}
