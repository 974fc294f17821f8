use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("base environment reference is empty")]
    EmptyBaseRef,
    #[error("command is empty")]
    EmptyCommand,
    #[error("command program is blank")]
    BlankProgram,
    #[error("span name is empty")]
    EmptySpanName,
    #[error("invalid environment variable key: {0:?}")]
    InvalidEnvKey(String),
}
