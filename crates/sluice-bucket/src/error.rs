#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LimitError {
    #[error("rate must be a positive finite number of tokens per second, got {0}")]
    InvalidRate(f64),

    #[error("rate {0} exceeds one token per nanosecond")]
    RateTooHigh(f64),

    #[error("capacity must be positive, got {0}")]
    InvalidCapacity(i64),
}

pub type Result<T> = std::result::Result<T, LimitError>;
