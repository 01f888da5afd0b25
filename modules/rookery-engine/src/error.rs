use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed response: {snippet}")]
    MalformedResponse { snippet: String },
}
