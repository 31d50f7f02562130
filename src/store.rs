//! Decks, cards and best times.
//!
//! [`Store`] is the only way the rest of the crate reaches persisted state.
//! Every implementation enforces the same rules:
//! - a card change (create, update, delete) drops the deck-scope records of
//!   its deck, since a deck time depends on the deck's set of cards;
//! - only the best three records per (scope, scope id) are kept.

use itertools::Itertools;
use tracing::info;

use crate::error::StoreError;
use crate::model::{
    new_id, now_millis, Card, CardPatch, Deck, DeckPatch, NewTimeRecord, Scope, StudyData,
    TimeRecord,
};
use crate::session::{StudyCard, StudyPlan};

pub const BEST_TIMES_KEPT: usize = 3;

pub trait Store {
    fn create_deck(&mut self, name: &str, description: Option<&str>) -> Result<Deck, StoreError>;
    fn update_deck(&mut self, id: &str, patch: DeckPatch) -> Result<(), StoreError>;
    /// Removes the deck, its cards, and every record attached to either.
    fn delete_deck(&mut self, id: &str) -> Result<(), StoreError>;

    fn create_card(&mut self, deck_id: &str, title: &str, content: &str) -> Result<Card, StoreError>;
    fn update_card(&mut self, id: &str, patch: CardPatch) -> Result<(), StoreError>;
    fn delete_card(&mut self, id: &str) -> Result<(), StoreError>;

    fn add_time_record(&mut self, record: NewTimeRecord) -> Result<TimeRecord, StoreError>;
    /// Up to three records, fastest first.
    fn best_times(&self, scope: Scope, scope_id: &str) -> Result<Vec<TimeRecord>, StoreError>;

    fn decks(&self) -> Result<Vec<Deck>, StoreError>;
    fn deck(&self, id: &str) -> Result<Option<Deck>, StoreError>;
    fn card(&self, id: &str) -> Result<Option<Card>, StoreError>;
    /// Cards of a deck in creation order.
    fn cards_in_deck(&self, deck_id: &str) -> Result<Vec<Card>, StoreError>;

    fn snapshot(&self) -> Result<StudyData, StoreError>;
    /// Replace everything with `data`.
    fn restore(&mut self, data: StudyData) -> Result<(), StoreError>;

    /// Plan for studying one card. `None` when the card does not exist.
    fn card_plan(&self, card_id: &str) -> Result<Option<StudyPlan>, StoreError> {
        Ok(self
            .card(card_id)?
            .map(|card| StudyPlan::single(StudyCard::from(&card))))
    }

    /// Plan for studying a whole deck. `None` when the deck is missing or empty.
    fn deck_plan(&self, deck_id: &str) -> Result<Option<StudyPlan>, StoreError> {
        let Some(deck) = self.deck(deck_id)? else {
            return Ok(None);
        };
        let cards = self.cards_in_deck(deck_id)?;
        if cards.is_empty() {
            return Ok(None);
        }
        Ok(Some(StudyPlan::deck(
            &deck,
            cards.iter().map(StudyCard::from).collect(),
        )))
    }
}

/// The whole store as one owned value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: StudyData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &StudyData {
        &self.data
    }

    fn invalidate_deck_records(&mut self, deck_id: &str) {
        self.data
            .records
            .retain(|r| !(r.scope == Scope::Deck && r.scope_id == deck_id));
    }
}

/// Keep the best [`BEST_TIMES_KEPT`] records for (`scope`, `scope_id`).
/// Ties keep the earlier record.
pub fn retain_best(records: Vec<TimeRecord>, scope: Scope, scope_id: &str) -> Vec<TimeRecord> {
    let (matching, mut others): (Vec<_>, Vec<_>) = records
        .into_iter()
        .partition(|r| r.scope == scope && r.scope_id == scope_id);

    others.extend(
        matching
            .into_iter()
            .sorted_by_key(|r| r.elapsed_ms)
            .take(BEST_TIMES_KEPT),
    );
    others
}

/// Blank descriptions are stored as absent.
pub(crate) fn trimmed_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

impl Store for MemoryStore {
    fn create_deck(&mut self, name: &str, description: Option<&str>) -> Result<Deck, StoreError> {
        let now = now_millis();
        let deck = Deck {
            id: new_id(),
            name: name.trim().to_string(),
            description: trimmed_description(description),
            created_at: now,
            updated_at: now,
        };
        info!(deck = %deck.id, name = %deck.name, "deck created");
        self.data.decks.push(deck.clone());
        Ok(deck)
    }

    fn update_deck(&mut self, id: &str, patch: DeckPatch) -> Result<(), StoreError> {
        let deck = self
            .data
            .decks
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::DeckNotFound(id.to_string()))?;
        if let Some(name) = patch.name {
            deck.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            deck.description = trimmed_description(Some(&description));
        }
        deck.updated_at = now_millis();
        Ok(())
    }

    fn delete_deck(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.data.decks.iter().any(|d| d.id == id) {
            return Err(StoreError::DeckNotFound(id.to_string()));
        }
        let card_ids: Vec<String> = self
            .data
            .cards
            .iter()
            .filter(|c| c.deck_id == id)
            .map(|c| c.id.clone())
            .collect();

        self.data.decks.retain(|d| d.id != id);
        self.data.cards.retain(|c| c.deck_id != id);
        self.data.records.retain(|r| match r.scope {
            Scope::Deck => r.scope_id != id,
            Scope::Card => !card_ids.contains(&r.scope_id),
        });
        info!(deck = %id, cards = card_ids.len(), "deck deleted");
        Ok(())
    }

    fn create_card(&mut self, deck_id: &str, title: &str, content: &str) -> Result<Card, StoreError> {
        if !self.data.decks.iter().any(|d| d.id == deck_id) {
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
        self.data.cards.push(card.clone());
        self.invalidate_deck_records(deck_id);
        info!(card = %card.id, deck = %deck_id, "card created");
        Ok(card)
    }

    fn update_card(&mut self, id: &str, patch: CardPatch) -> Result<(), StoreError> {
        let card = self
            .data
            .cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CardNotFound(id.to_string()))?;
        if let Some(title) = patch.title {
            card.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            card.content = content;
        }
        card.updated_at = now_millis();
        let deck_id = card.deck_id.clone();
        self.invalidate_deck_records(&deck_id);
        Ok(())
    }

    fn delete_card(&mut self, id: &str) -> Result<(), StoreError> {
        let pos = self
            .data
            .cards
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::CardNotFound(id.to_string()))?;
        let card = self.data.cards.remove(pos);
        self.data
            .records
            .retain(|r| !(r.scope == Scope::Card && r.scope_id == id));
        self.invalidate_deck_records(&card.deck_id);
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
        let mut records = std::mem::take(&mut self.data.records);
        records.push(rec.clone());
        self.data.records = retain_best(records, rec.scope, &rec.scope_id);
        Ok(rec)
    }

    fn best_times(&self, scope: Scope, scope_id: &str) -> Result<Vec<TimeRecord>, StoreError> {
        Ok(self
            .data
            .records
            .iter()
            .filter(|r| r.scope == scope && r.scope_id == scope_id)
            .sorted_by_key(|r| r.elapsed_ms)
            .take(BEST_TIMES_KEPT)
            .cloned()
            .collect())
    }

    fn decks(&self) -> Result<Vec<Deck>, StoreError> {
        Ok(self.data.decks.clone())
    }

    fn deck(&self, id: &str) -> Result<Option<Deck>, StoreError> {
        Ok(self.data.decks.iter().find(|d| d.id == id).cloned())
    }

    fn card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        Ok(self.data.cards.iter().find(|c| c.id == id).cloned())
    }

    fn cards_in_deck(&self, deck_id: &str) -> Result<Vec<Card>, StoreError> {
        Ok(self
            .data
            .cards
            .iter()
            .filter(|c| c.deck_id == deck_id)
            .cloned()
            .collect())
    }

    fn snapshot(&self) -> Result<StudyData, StoreError> {
        Ok(self.data.clone())
    }

    fn restore(&mut self, data: StudyData) -> Result<(), StoreError> {
        self.data = data;
        Ok(())
    }
}
