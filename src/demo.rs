use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::info;

use crate::error::StoreError;
use crate::store::Store;

static DEMO_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/demo");

#[derive(Deserialize, Clone, Debug)]
pub struct DemoCard {
    pub title: String,
    pub content: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DemoDeck {
    pub name: String,
    pub description: Option<String>,
    pub cards: Vec<DemoCard>,
}

/// Bundled sample decks, in file name order.
pub fn demo_decks() -> Result<Vec<DemoDeck>, StoreError> {
    DEMO_DIR
        .files()
        .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
        .sorted_by(|a, b| a.path().cmp(b.path()))
        .map(|f| -> Result<DemoDeck, StoreError> {
            let text = f.contents_utf8().unwrap_or_default();
            Ok(serde_json::from_str(text)?)
        })
        .collect()
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Add every sample deck whose name is not taken yet. Returns how many
/// decks were added.
pub fn load_demo_data<S: Store + ?Sized>(store: &mut S) -> Result<usize, StoreError> {
    let existing: HashSet<String> = store.decks()?.iter().map(|d| name_key(&d.name)).collect();

    let mut added = 0;
    for demo in demo_decks()? {
        if existing.contains(&name_key(&demo.name)) {
            continue;
        }
        let deck = store.create_deck(&demo.name, demo.description.as_deref())?;
        for card in &demo.cards {
            store.create_card(&deck.id, &card.title, &card.content)?;
        }
        added += 1;
    }
    info!(added, "demo decks loaded");
    Ok(added)
}

/// Seed the sample decks on first run, when the store holds nothing at all.
pub fn seed_if_empty<S: Store + ?Sized>(store: &mut S) -> Result<bool, StoreError> {
    if !store.snapshot()?.is_empty() {
        return Ok(false);
    }
    load_demo_data(store)?;
    Ok(true)
}
