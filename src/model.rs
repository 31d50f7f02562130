use serde::{Deserialize, Serialize};

pub type Id = String;

/// Session-wide toggles that relax matching or add hints. Fixed once a
/// session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistanceConfig {
    pub ghost_text: bool,
    pub full_text: bool,
    pub autocorrect: bool,
}

impl AssistanceConfig {
    /// Names of the enabled toggles, in display order.
    pub fn enabled_flags(&self) -> Vec<&'static str> {
        [
            (self.ghost_text, "ghost text"),
            (self.full_text, "full text"),
            (self.autocorrect, "autocorrect"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    Card,
    Deck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Id,
    pub deck_id: Id,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An immutable completion fact. Only the best three per scope/id are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    pub id: Id,
    pub scope: Scope,
    pub scope_id: Id,
    pub elapsed_ms: u64,
    pub completed_at: i64,
    pub assistance: AssistanceConfig,
}

/// A completion reported by a session, before the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeRecord {
    pub scope: Scope,
    pub scope_id: Id,
    pub elapsed_ms: u64,
    pub assistance: AssistanceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Persisted shape of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyData {
    pub decks: Vec<Deck>,
    pub cards: Vec<Card>,
    pub records: Vec<TimeRecord>,
}

impl StudyData {
    pub fn is_empty(&self) -> bool {
        self.decks.is_empty() && self.cards.is_empty() && self.records.is_empty()
    }
}

pub fn new_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistance_serializes_camel_case() {
        let cfg = AssistanceConfig {
            ghost_text: true,
            full_text: false,
            autocorrect: true,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(json, r#"{"ghostText":true,"fullText":false,"autocorrect":true}"#);
    }

    #[test]
    fn enabled_flags_lists_only_active_toggles() {
        let cfg = AssistanceConfig {
            ghost_text: false,
            full_text: true,
            autocorrect: true,
        };
        assert_eq!(cfg.enabled_flags(), vec!["full text", "autocorrect"]);
        assert!(AssistanceConfig::default().enabled_flags().is_empty());
    }

    #[test]
    fn scope_display_and_parse() {
        assert_eq!(Scope::Card.to_string(), "card");
        assert_eq!(Scope::Deck.to_string(), "deck");
        assert_eq!("deck".parse::<Scope>(), Ok(Scope::Deck));
        assert_eq!("card".parse::<Scope>(), Ok(Scope::Card));
        assert!("Deck".parse::<Scope>().is_err());
    }

    #[test]
    fn study_data_roundtrips_persisted_shape() {
        let raw = r#"{
            "decks": [{"id":"d1","name":"Verse","createdAt":1,"updatedAt":2}],
            "cards": [{"id":"c1","deckId":"d1","title":"T","content":"abc","createdAt":1,"updatedAt":1}],
            "records": [{"id":"r1","scope":"deck","scopeId":"d1","elapsedMs":900,"completedAt":5,
                         "assistance":{"ghostText":false,"fullText":false,"autocorrect":true}}]
        }"#;
        let data: StudyData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.decks[0].description, None);
        assert_eq!(data.records[0].scope, Scope::Deck);
        assert!(data.records[0].assistance.autocorrect);
        assert!(!data.is_empty());
    }
}
