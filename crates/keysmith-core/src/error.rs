//! Error types for keysmith-core

use thiserror::Error;

/// Result type alias using keysmith-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for keysmith
#[derive(Error, Debug)]
pub enum Error {
    /// The store file does not exist yet
    #[error("Store file not found: {path}. It will be created on the first write.")]
    NewStore { path: String },

    /// The store exists but has no entry with this name
    #[error("No secret named '{name}' in {path}")]
    NameNotFound { name: String, path: String },

    /// A principal list resolved to nothing
    #[error("There must be at least one entry.")]
    EmptyPrincipalList,

    /// Label cannot be embedded in stack and alias names
    #[error("Invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    /// Unknown encryption algorithm
    #[error("Unknown algorithm '{algorithm}'. Valid algorithms: {valid}")]
    InvalidAlgorithm { algorithm: String, valid: String },

    /// Key identifier is not an alias ARN
    #[error("Key ID '{key_id}' is not a KMS alias ARN")]
    NotAnAliasArn { key_id: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new-store error
    pub fn new_store(path: impl Into<String>) -> Self {
        Self::NewStore { path: path.into() }
    }

    /// Create a name-not-found error
    pub fn name_not_found(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NameNotFound {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Create an invalid label error
    pub fn invalid_label(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidLabel {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-an-alias error
    pub fn not_an_alias_arn(key_id: impl Into<String>) -> Self {
        Self::NotAnAliasArn {
            key_id: key_id.into(),
        }
    }

    /// True when the error only means "nothing stored yet"
    pub fn is_empty_store(&self) -> bool {
        matches!(self, Self::NewStore { .. } | Self::NameNotFound { .. })
    }
}
