/// Core error type for quizscout.
///
/// Adapter crates should map their specific errors into this type so the core
/// can handle failures consistently (user-facing status text vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid room code: {0}")]
    InvalidIdentifier(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("answer set contained no usable entries")]
    EmptyAnswerSet,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
