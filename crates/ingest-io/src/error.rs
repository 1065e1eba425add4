use ingest_types::LedgerEntryType;

/// Errors produced by readers, adapters, and the change model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IoError {
    /// The requested ledger (or checkpoint) does not exist in the source.
    #[error("not found")]
    NotFound,

    #[error("reader is closed")]
    Closed,

    #[error("ledger upgrade changes were present but never read or ignored")]
    UpgradeChangesNotRead,

    #[error("entry change at index {index} is not preceded by a state record")]
    UnpairedChange { index: usize },

    #[error("expected {expected} entry, found {found}")]
    EntryTypeMismatch {
        expected: LedgerEntryType,
        found: LedgerEntryType,
    },

    #[error("temp set error: {0}")]
    TempSet(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl IoError {
    /// Returns `true` for the "ledger not found" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type IoResult<T> = Result<T, IoError>;
