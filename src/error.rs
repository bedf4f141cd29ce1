use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelkitError {
    #[error("Load error at {node}: {message}")]
    Load { node: String, message: String },
    #[error("Integrity error: {0}")]
    Integrity(String),
    #[error("'{attribute}' is not a valid attribute of class '{class}'")]
    InvalidAttribute { class: String, attribute: String },
    #[error("Key not set: {0}")]
    KeyNotSet(String),
    #[error("Empty input sequence")]
    EmptyInput,
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelkitError>;

// Helper conversions
impl From<rusqlite::Error> for ModelkitError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

impl ModelkitError {
    /// Shorthand for a load failure that points at the offending node.
    pub fn load(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            node: node.into(),
            message: message.into(),
        }
    }
}
