use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app_dirs::AppDirs;
use crate::error::StoreError;
use crate::model::{
    new_id, now_millis, AssistanceConfig, Card, CardPatch, Deck, DeckPatch, NewTimeRecord, Scope,
    StudyData, TimeRecord,
};
use crate::store::{trimmed_description, Store, BEST_TIMES_KEPT};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS decks (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS cards (
        id TEXT PRIMARY KEY,
        deck_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cards_deck ON cards(deck_id);
    CREATE TABLE IF NOT EXISTS time_records (
        id TEXT PRIMARY KEY,
        scope TEXT NOT NULL,
        scope_id TEXT NOT NULL,
        elapsed_ms INTEGER NOT NULL,
        completed_at INTEGER NOT NULL,
        ghost_text BOOLEAN NOT NULL,
        full_text BOOLEAN NOT NULL,
        autocorrect BOOLEAN NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_time_records_scope ON time_records(scope, scope_id);
"#;

const DECK_COLUMNS: &str = "id, name, description, created_at, updated_at";
const CARD_COLUMNS: &str = "id, deck_id, title, content, created_at, updated_at";
const RECORD_COLUMNS: &str =
    "id, scope, scope_id, elapsed_ms, completed_at, ghost_text, full_text, autocorrect";

/// SQLite-backed [`Store`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at the default state location, creating it if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("verbatim.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn invalidate_deck_records(conn: &Connection, deck_id: &str) -> rusqlite::Result<usize> {
        conn.execute(
            "DELETE FROM time_records WHERE scope = 'deck' AND scope_id = ?1",
            [deck_id],
        )
    }

    fn card_deck_id(&self, card_id: &str) -> Result<String, StoreError> {
        self.conn
            .query_row("SELECT deck_id FROM cards WHERE id = ?1", [card_id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StoreError::CardNotFound(card_id.to_string()))
    }

    fn insert_all(tx: &Transaction<'_>, data: &StudyData) -> rusqlite::Result<()> {
        for d in &data.decks {
            tx.execute(
                "INSERT INTO decks (id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![d.id, d.name, d.description, d.created_at, d.updated_at],
            )?;
        }
        for c in &data.cards {
            tx.execute(
                "INSERT INTO cards (id, deck_id, title, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![c.id, c.deck_id, c.title, c.content, c.created_at, c.updated_at],
            )?;
        }
        for r in &data.records {
            insert_record(tx, r)?;
        }
        Ok(())
    }
}

fn insert_record(conn: &Connection, r: &TimeRecord) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO time_records
        (id, scope, scope_id, elapsed_ms, completed_at, ghost_text, full_text, autocorrect)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            r.id,
            r.scope.to_string(),
            r.scope_id,
            r.elapsed_ms as i64,
            r.completed_at,
            r.assistance.ghost_text,
            r.assistance.full_text,
            r.assistance.autocorrect,
        ],
    )
}

fn deck_from_row(row: &Row<'_>) -> rusqlite::Result<Deck> {
    Ok(Deck {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        deck_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TimeRecord> {
    let scope_str: String = row.get(1)?;
    let scope = scope_str.parse::<Scope>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let elapsed_ms: i64 = row.get(3)?;

    Ok(TimeRecord {
        id: row.get(0)?,
        scope,
        scope_id: row.get(2)?,
        elapsed_ms: elapsed_ms.max(0) as u64,
        completed_at: row.get(4)?,
        assistance: AssistanceConfig {
            ghost_text: row.get(5)?,
            full_text: row.get(6)?,
            autocorrect: row.get(7)?,
        },
    })
}

impl Store for SqliteStore {
    fn create_deck(&mut self, name: &str, description: Option<&str>) -> Result<Deck, StoreError> {
        let now = now_millis();
        let deck = Deck {
            id: new_id(),
            name: name.trim().to_string(),
            description: trimmed_description(description),
            created_at: now,
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO decks (id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![deck.id, deck.name, deck.description, deck.created_at, deck.updated_at],
        )?;
        info!(deck = %deck.id, name = %deck.name, "deck created");
        Ok(deck)
    }

    fn update_deck(&mut self, id: &str, patch: DeckPatch) -> Result<(), StoreError> {
        let mut deck = self
            .deck(id)?
            .ok_or_else(|| StoreError::DeckNotFound(id.to_string()))?;
        if let Some(name) = patch.name {
            deck.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            deck.description = trimmed_description(Some(&description));
        }
        self.conn.execute(
            "UPDATE decks SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
            params![deck.id, deck.name, deck.description, now_millis()],
        )?;
        Ok(())
    }

    fn delete_deck(&mut self, id: &str) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM decks WHERE id = ?1", [id])?;
        if removed == 0 {
            return Err(StoreError::DeckNotFound(id.to_string()));
        }
        tx.execute(
            "DELETE FROM time_records WHERE scope = 'card' AND scope_id IN (SELECT id FROM cards WHERE deck_id = ?1)",
            [id],
        )?;
        Self::invalidate_deck_records(&tx, id)?;
        let cards = tx.execute("DELETE FROM cards WHERE deck_id = ?1", [id])?;
        tx.commit()?;
        info!(deck = %id, cards, "deck deleted");
        Ok(())
    }

    fn create_card(&mut self, deck_id: &str, title: &str, content: &str) -> Result<Card, StoreError> {
        if self.deck(deck_id)?.is_none() {
            return Err(StoreError::DeckNotFound(deck_id.to_string()));
        }
        let now = now_millis();
        let card = Card {
            id: new_id(),
            deck_id: deck_id.to_string(),
            title: title.trim().to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO cards (id, deck_id, title, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![card.id, card.deck_id, card.title, card.content, card.created_at, card.updated_at],
        )?;
        Self::invalidate_deck_records(&tx, deck_id)?;
        tx.commit()?;
        info!(card = %card.id, deck = %deck_id, "card created");
        Ok(card)
    }

    fn update_card(&mut self, id: &str, patch: CardPatch) -> Result<(), StoreError> {
        let mut card = self
            .card(id)?
            .ok_or_else(|| StoreError::CardNotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            card.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            card.content = content;
        }
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE cards SET title = ?2, content = ?3, updated_at = ?4 WHERE id = ?1",
            params![card.id, card.title, card.content, now_millis()],
        )?;
        Self::invalidate_deck_records(&tx, &card.deck_id)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_card(&mut self, id: &str) -> Result<(), StoreError> {
        let deck_id = self.card_deck_id(id)?;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cards WHERE id = ?1", [id])?;
        tx.execute(
            "DELETE FROM time_records WHERE scope = 'card' AND scope_id = ?1",
            [id],
        )?;
        Self::invalidate_deck_records(&tx, &deck_id)?;
        tx.commit()?;
        info!(card = %id, "card deleted");
        Ok(())
    }

    fn add_time_record(&mut self, record: NewTimeRecord) -> Result<TimeRecord, StoreError> {
        let rec = TimeRecord {
            id: new_id(),
            scope: record.scope,
            scope_id: record.scope_id,
            elapsed_ms: record.elapsed_ms,
            completed_at: now_millis(),
            assistance: record.assistance,
        };
        let tx = self.conn.transaction()?;
        insert_record(&tx, &rec)?;
        tx.execute(
            r#"
            DELETE FROM time_records
            WHERE scope = ?1 AND scope_id = ?2 AND id NOT IN (
                SELECT id FROM time_records
                WHERE scope = ?1 AND scope_id = ?2
                ORDER BY elapsed_ms ASC, rowid ASC
                LIMIT ?3
            )
            "#,
            params![rec.scope.to_string(), rec.scope_id, BEST_TIMES_KEPT as i64],
        )?;
        tx.commit()?;
        Ok(rec)
    }

    fn best_times(&self, scope: Scope, scope_id: &str) -> Result<Vec<TimeRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM time_records WHERE scope = ?1 AND scope_id = ?2 ORDER BY elapsed_ms ASC, rowid ASC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(
            params![scope.to_string(), scope_id, BEST_TIMES_KEPT as i64],
            record_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn decks(&self) -> Result<Vec<Deck>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DECK_COLUMNS} FROM decks ORDER BY created_at, rowid"))?;
        let rows = stmt.query_map([], deck_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn deck(&self, id: &str) -> Result<Option<Deck>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {DECK_COLUMNS} FROM decks WHERE id = ?1"),
                [id],
                deck_from_row,
            )
            .optional()?)
    }

    fn card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1"),
                [id],
                card_from_row,
            )
            .optional()?)
    }

    fn cards_in_deck(&self, deck_id: &str) -> Result<Vec<Card>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE deck_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let rows = stmt.query_map([deck_id], card_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn snapshot(&self) -> Result<StudyData, StoreError> {
        let decks = self.decks()?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {CARD_COLUMNS} FROM cards ORDER BY created_at, rowid"))?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM time_records ORDER BY rowid"))?;
        let records = stmt
            .query_map([], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(StudyData {
            decks,
            cards,
            records,
        })
    }

    fn restore(&mut self, data: StudyData) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch("DELETE FROM time_records; DELETE FROM cards; DELETE FROM decks;")?;
        Self::insert_all(&tx, &data)?;
        tx.commit()?;
        info!(
            decks = data.decks.len(),
            cards = data.cards.len(),
            records = data.records.len(),
            "store restored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn record(scope: Scope, scope_id: &str, elapsed_ms: u64) -> NewTimeRecord {
        NewTimeRecord {
            scope,
            scope_id: scope_id.to_string(),
            elapsed_ms,
            assistance: AssistanceConfig {
                autocorrect: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn deck_and_card_crud() {
        let mut db = SqliteStore::in_memory().unwrap();
        let deck = db.create_deck(" Speeches ", Some("iconic")).unwrap();
        let a = db.create_card(&deck.id, "A", "first").unwrap();
        let b = db.create_card(&deck.id, "B", "second").unwrap();

        assert_eq!(db.decks().unwrap(), vec![deck.clone()]);
        let cards = db.cards_in_deck(&deck.id).unwrap();
        assert_eq!(cards, vec![a.clone(), b.clone()]);

        db.update_card(
            &a.id,
            CardPatch {
                title: Some(" A2 ".into()),
                content: None,
            },
        )
        .unwrap();
        let updated = db.card(&a.id).unwrap().unwrap();
        assert_eq!(updated.title, "A2");
        assert_eq!(updated.content, "first");

        db.delete_card(&b.id).unwrap();
        assert_eq!(db.cards_in_deck(&deck.id).unwrap().len(), 1);
        assert_matches!(db.delete_card(&b.id), Err(StoreError::CardNotFound(_)));
    }

    #[test]
    fn best_times_keep_three_fastest() {
        let mut db = SqliteStore::in_memory().unwrap();
        for ms in [5_000, 3_000, 4_000, 9_000] {
            db.add_time_record(record(Scope::Card, "c1", ms)).unwrap();
        }
        let best = db.best_times(Scope::Card, "c1").unwrap();
        assert_eq!(
            best.iter().map(|r| r.elapsed_ms).collect::<Vec<_>>(),
            vec![3_000, 4_000, 5_000]
        );
        assert!(best.iter().all(|r| r.assistance.autocorrect));
        assert_eq!(db.snapshot().unwrap().records.len(), 3);
    }

    #[test]
    fn card_changes_invalidate_deck_records() {
        let mut db = SqliteStore::in_memory().unwrap();
        let deck = db.create_deck("Verse", None).unwrap();
        let card = db.create_card(&deck.id, "A", "first").unwrap();

        db.add_time_record(record(Scope::Deck, &deck.id, 1_000)).unwrap();
        db.add_time_record(record(Scope::Card, &card.id, 500)).unwrap();
        db.create_card(&deck.id, "B", "second").unwrap();

        assert!(db.best_times(Scope::Deck, &deck.id).unwrap().is_empty());
        assert_eq!(db.best_times(Scope::Card, &card.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_deck_cascades() {
        let mut db = SqliteStore::in_memory().unwrap();
        let deck = db.create_deck("Verse", None).unwrap();
        let card = db.create_card(&deck.id, "A", "first").unwrap();
        db.add_time_record(record(Scope::Card, &card.id, 1)).unwrap();
        db.add_time_record(record(Scope::Deck, &deck.id, 2)).unwrap();

        db.delete_deck(&deck.id).unwrap();
        let snap = db.snapshot().unwrap();
        assert!(snap.is_empty());
        assert_matches!(db.delete_deck(&deck.id), Err(StoreError::DeckNotFound(_)));
    }

    #[test]
    fn restore_replaces_contents_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("verbatim.db");

        let snap = {
            let mut db = SqliteStore::open(&path).unwrap();
            let deck = db.create_deck("Verse", None).unwrap();
            db.create_card(&deck.id, "A", "first").unwrap();
            db.snapshot().unwrap()
        };

        let mut other = SqliteStore::in_memory().unwrap();
        other.create_deck("Stale", None).unwrap();
        other.restore(snap.clone()).unwrap();
        assert_eq!(other.snapshot().unwrap(), snap);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.snapshot().unwrap(), snap);
    }
}
