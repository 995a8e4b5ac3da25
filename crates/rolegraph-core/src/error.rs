use std::fmt;

/// Result alias used by every storage operation.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures surfaced by the items storage.
///
/// "Not found" on plain lookups and removals of absent edges are not errors;
/// those return `None`/`false` or succeed as no-ops.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Malformed storage configuration, rejected at construction.
    #[error("{0}")]
    InvalidConfiguration(String),

    /// An item with this name already exists.
    #[error("item '{0}' already exists")]
    DuplicateName(String),

    /// The operation references an item that does not exist.
    #[error("item not found: '{0}'")]
    UnknownItem(String),

    /// The parent/child edge is already present.
    #[error("item '{parent}' already has child '{child}'")]
    EdgeExists { parent: String, child: String },

    /// Adding the edge would close a cycle. `path` starts and ends at
    /// `parent`, e.g. `["C", "A", "B", "C"]`.
    #[error("adding '{child}' as a child of '{parent}' would create a cycle: {}", .path.join(" -> "))]
    CycleDetected {
        parent: String,
        child: String,
        path: Vec<String>,
    },

    /// A stored item name contains the configured names separator.
    #[error("Separator collision has been detected.")]
    SeparatorCollision,

    /// The `type` column holds an unknown value.
    #[error("item '{name}' has unknown type '{value}'")]
    InvalidItemType { name: String, value: String },

    /// The `data` column could not be encoded or decoded as JSON.
    #[error("invalid data payload for item '{name}': {source}")]
    Data {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backing store failed.
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl StorageError {
    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfiguration(_) => ErrorCode::InvalidConfiguration,
            Self::DuplicateName(_) => ErrorCode::DuplicateName,
            Self::UnknownItem(_) => ErrorCode::UnknownItem,
            Self::EdgeExists { .. } => ErrorCode::EdgeExists,
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::SeparatorCollision => ErrorCode::SeparatorCollision,
            Self::InvalidItemType { .. } | Self::Data { .. } => ErrorCode::CorruptItem,
            Self::Db(_) => ErrorCode::StoreFailure,
        }
    }
}

/// Machine-readable error codes for callers that branch on failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidConfiguration,
    DuplicateName,
    UnknownItem,
    EdgeExists,
    CycleDetected,
    SeparatorCollision,
    CorruptItem,
    StoreFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "E1001",
            Self::DuplicateName => "E2001",
            Self::UnknownItem => "E2002",
            Self::EdgeExists => "E2003",
            Self::CycleDetected => "E2004",
            Self::SeparatorCollision => "E2005",
            Self::CorruptItem => "E3001",
            Self::StoreFailure => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidConfiguration => "Invalid storage configuration",
            Self::DuplicateName => "Item name already taken",
            Self::UnknownItem => "Item not found",
            Self::EdgeExists => "Child already attached",
            Self::CycleDetected => "Cycle would be created",
            Self::SeparatorCollision => "Item name contains the names separator",
            Self::CorruptItem => "Corrupt item row",
            Self::StoreFailure => "Database failure",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidConfiguration => {
                Some("Use a single-character names separator and plain SQL table names.")
            }
            Self::DuplicateName => Some("Pick another name or update the existing item."),
            Self::UnknownItem | Self::EdgeExists => None,
            Self::CycleDetected => Some("Remove or adjust child links to keep the graph acyclic."),
            Self::SeparatorCollision => {
                Some("Configure a names separator that no item name contains.")
            }
            Self::CorruptItem => Some("Fix the offending row in the items table."),
            Self::StoreFailure => Some("Retry once. If persistent, check the database file."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
