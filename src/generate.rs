//! Card generation from a natural-language prompt.
//!
//! The language model is asked for JSON but rarely obeys exactly, so
//! [`parse_generated`] falls through progressively looser readings of the
//! reply and never fails: the last resort turns raw lines into cards.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{GenerateError, StoreError};
use crate::store::Store;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_CARDS: usize = 20;
const FALLBACK_LINES: usize = 5;
const FALLBACK_TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCard {
    pub title: String,
    pub content: String,
}

impl GeneratedCard {
    fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

pub trait CardGenerator {
    fn generate(&self, prompt: &str) -> Result<Vec<GeneratedCard>, GenerateError>;
}

/// Text prepended to the user's request.
pub fn build_instruction(prompt: &str) -> String {
    [
        "You are an assistant that creates flashcards.",
        "Respond with ONLY a JSON object, no markdown, no code fences, no extra text.",
        r#"Schema: {"cards": [{"title": string, "content": string}, ...]}"#,
        "Max 10 cards. Keep each content under 400 characters.",
        "",
        "Task:",
        prompt,
    ]
    .join("\n")
}

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, GenerateError> {
        let key = cfg.api_key().ok_or(GenerateError::MissingApiKey)?;
        Ok(Self::new(key, cfg.gemini_model.clone()))
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": build_instruction(prompt) }]
            }],
            "generationConfig": {
                "thinkingConfig": { "thinkingBudget": 0 }
            }
        })
    }

    fn fetch_text(&self, prompt: &str) -> Result<String, GenerateError> {
        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model);
        let body = Self::request_body(prompt).to_string();

        let raw = ureq::post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .map_err(|e| GenerateError::Http(e.to_string()))?
            .into_body()
            .read_to_string()
            .map_err(|e| GenerateError::Http(e.to_string()))?;

        let reply: Value =
            serde_json::from_str(&raw).map_err(|e| GenerateError::Response(e.to_string()))?;
        Ok(response_text(&reply))
    }
}

impl CardGenerator for GeminiGenerator {
    fn generate(&self, prompt: &str) -> Result<Vec<GeneratedCard>, GenerateError> {
        info!(model = %self.model, "requesting generated cards");
        let text = self.fetch_text(prompt)?;
        if text.trim().is_empty() {
            return Err(GenerateError::Response("empty reply".to_string()));
        }
        Ok(parse_generated(&text))
    }
}

/// Concatenated text parts of the first candidate.
pub fn response_text(reply: &Value) -> String {
    reply
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Turn a model reply into cards, tolerating any amount of malformed structure.
pub fn parse_generated(reply: &str) -> Vec<GeneratedCard> {
    let text = strip_fence(reply.trim());

    let parsed = parse_cards_json(text)
        .or_else(|| outer_json_object(text).and_then(parse_cards_json))
        .or_else(|| parse_loose_objects(text))
        .or_else(|| parse_title_lines(text));

    if let Some(cards) = parsed {
        return cards
            .into_iter()
            .map(|c| GeneratedCard::new(c.title.trim(), c.content.trim()))
            .filter(|c| !c.title.is_empty() || !c.content.is_empty())
            .take(MAX_CARDS)
            .collect();
    }

    warn!("generation reply had no recognizable structure, using raw lines");
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(FALLBACK_LINES)
        .enumerate()
        .map(|(i, line)| {
            let title: String = line.chars().take(FALLBACK_TITLE_CHARS).collect();
            let title = if title.is_empty() {
                format!("Card {}", i + 1)
            } else {
                title
            };
            GeneratedCard::new(title, line)
        })
        .collect()
}

/// Body of the first fenced block (```lang\n ... ```), or the text unchanged.
fn strip_fence(text: &str) -> &str {
    let mut search = text;
    while let Some(open) = search.find("```") {
        let after = &search[open + 3..];
        let lang_len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        if let Some(body) = after[lang_len..].strip_prefix('\n') {
            if let Some(close) = body.find("```") {
                return body[..close].trim();
            }
        }
        search = after;
    }
    text
}

fn value_text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// `{"cards": [...]}` with at least one entry.
fn parse_cards_json(text: &str) -> Option<Vec<GeneratedCard>> {
    let value: Value = serde_json::from_str(text).ok()?;
    let cards = value.get("cards")?.as_array()?;
    if cards.is_empty() {
        return None;
    }
    Some(
        cards
            .iter()
            .map(|c| GeneratedCard::new(value_text(c.get("title")), value_text(c.get("content"))))
            .collect(),
    )
}

/// From the first `{` to the last `}`.
fn outer_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Flat `{...}` objects carrying string `title` and `content`.
fn parse_loose_objects(text: &str) -> Option<Vec<GeneratedCard>> {
    let mut cards = Vec::new();
    let mut pos = 0;

    while let Some(open) = text[pos..].find('{').map(|i| pos + i) {
        let Some(close) = text[open..].find('}').map(|i| open + i) else {
            break;
        };
        let candidate = &text[open..=close];
        match serde_json::from_str::<Value>(candidate) {
            Ok(obj) => {
                if let (Some(Value::String(title)), Some(Value::String(content))) =
                    (obj.get("title"), obj.get("content"))
                {
                    cards.push(GeneratedCard::new(title.as_str(), content.as_str()));
                }
                pos = close + 1;
            }
            Err(_) => pos = open + 1,
        }
    }

    (!cards.is_empty()).then_some(cards)
}

/// Position just past `key` and its colon, e.g. `"title" :` or `title:`.
fn after_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let lower = line.to_ascii_lowercase();
    lower.match_indices(key).find_map(|(idx, _)| {
        let rest = &line[idx + key.len()..];
        let rest = rest.strip_prefix('"').unwrap_or(rest);
        rest.trim_start().strip_prefix(':')
    })
}

/// The quoted value of `key` on this line: `"title": "Value"`.
fn quoted_field(line: &str, key: &str) -> Option<String> {
    let rest = after_key(line, key)?.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    (end > 0).then(|| rest[..end].to_string())
}

/// `"title": "..."` lines, each followed by a `"content": "..."` line or a
/// plain line taken as content.
fn parse_title_lines(text: &str) -> Option<Vec<GeneratedCard>> {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut cards = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(title) = quoted_field(lines[i], "title") else {
            i += 1;
            continue;
        };

        let mut content = String::new();
        match lines.get(i + 1) {
            Some(next) => {
                if let Some(c) = quoted_field(next, "content") {
                    content = c;
                    i += 2;
                } else if after_key(next, "title").is_none() {
                    content = next
                        .strip_prefix(&['-', '*'][..])
                        .map(str::trim_start)
                        .unwrap_or(*next)
                        .to_string();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            None => i += 1,
        }
        cards.push(GeneratedCard::new(title, content));
    }

    (!cards.is_empty()).then_some(cards)
}

/// Create a card in `deck_id` for every generated entry with content.
/// Returns the number of cards created.
pub fn replay_into_store<S: Store + ?Sized>(
    store: &mut S,
    deck_id: &str,
    cards: &[GeneratedCard],
) -> Result<usize, StoreError> {
    let mut created = 0;
    for card in cards {
        let content = card.content.trim();
        if content.is_empty() {
            continue;
        }
        let title = match card.title.trim() {
            "" => "Untitled",
            t => t,
        };
        store.create_card(deck_id, title, content)?;
        created += 1;
    }
    info!(deck = %deck_id, created, "generated cards stored");
    Ok(created)
}
