use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a study session needs at least one card")]
    EmptySequence,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("deck {0} not found")]
    DeckNotFound(String),

    #[error("card {0} not found")]
    CardNotFound(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Gemini API key missing. Set GEMINI_API_KEY or gemini_api_key in the config file")]
    MissingApiKey,

    #[error("generation request failed: {0}")]
    Http(String),

    #[error("generation returned an unreadable response: {0}")]
    Response(String),
}
