use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("chain not found: {0}")]
    ChainNotFound(String),

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("duplicate rule: {0}")]
    DuplicateRule(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("port not found: {0}")]
    PortNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("engine error: {0}")]
    EngineError(String),
}
