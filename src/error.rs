use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SatchelError {
    #[error("submission timed out after {attempts} attempt(s)")]
    TimedOut { attempts: u32 },

    #[error("network error after {attempts} attempt(s): {detail}")]
    Network { attempts: u32, detail: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("submission already in flight: {0}")]
    AlreadyInFlight(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SatchelError>;

impl SatchelError {
    /// True for failures worth showing alongside the "saved locally" notice:
    /// the payload reached a terminal failure after real delivery attempts.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            SatchelError::TimedOut { .. } | SatchelError::Network { .. }
        )
    }
}
