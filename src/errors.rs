use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphLoadError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("mapping error: {0}")]
    Mapping(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("transaction error: {0}")]
    Transaction(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("fault injected: {0}")]
    FaultInjected(String),
}

impl GraphLoadError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Validation(msg.into())
    }

    pub fn mapping<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Mapping(msg.into())
    }

    pub fn backend<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Backend(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Transaction(msg.into())
    }

    pub fn connection<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Connection(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Schema(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::Config(msg.into())
    }

    pub fn fault_injection<T: Into<String>>(msg: T) -> Self {
        GraphLoadError::FaultInjected(msg.into())
    }

    /// True for the error kinds raised while building operations, before any backend call.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            GraphLoadError::Validation(_) | GraphLoadError::Mapping(_)
        )
    }
}
