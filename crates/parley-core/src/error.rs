use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid worker id {id} (max {max})")]
    InvalidWorkerId { id: u16, max: u16 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ParleyError {
    /// Short error code string for logs and HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ParleyError::Config(_) => "CONFIG_ERROR",
            ParleyError::InvalidWorkerId { .. } => "INVALID_WORKER_ID",
            ParleyError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_convert_to_serialization() {
        let err: ParleyError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, ParleyError::Serialization(_)));
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn worker_id_error_names_bounds() {
        let err = ParleyError::InvalidWorkerId { id: 2000, max: 1023 };
        assert_eq!(err.code(), "INVALID_WORKER_ID");
        assert_eq!(err.to_string(), "Invalid worker id 2000 (max 1023)");
    }
}
