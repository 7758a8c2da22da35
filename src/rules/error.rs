use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Invalid rule expression: {0}")]
    InvalidExpression(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid rule value for {0}")]
    InvalidRule(String),
}
