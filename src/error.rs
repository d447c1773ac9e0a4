use thiserror::Error;

pub type CommandResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{context}: {source}")]
    Import {
        context: String,
        #[source]
        source: csv::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Config {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Inventory core is not configured")]
    NotConfigured,

    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),
}

impl CatalogError {
    pub fn storage(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn import(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Import {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn config(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Config {
            context: context.into(),
            source,
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage",
            Self::Import { .. } => "import",
            Self::Io { .. } => "io",
            Self::Config { .. } => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::NotConfigured => "not_configured",
            Self::Serialization { .. } | Self::Poisoned(_) => "internal",
        }
    }

    /// Message safe to hand back across the bridge. Backend failures are
    /// reported generically; their detail goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage { .. } | Self::Poisoned(_) => "Storage operation failed".to_string(),
            Self::Io { .. } => "File operation failed".to_string(),
            Self::Import { .. } => "Error reading CSV.".to_string(),
            Self::Serialization { .. } => "Internal error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. }
                | Self::Io { .. }
                | Self::Import { .. }
                | Self::Serialization { .. }
                | Self::Poisoned(_)
        )
    }
}
