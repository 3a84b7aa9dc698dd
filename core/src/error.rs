use thiserror::Error;

/// User-facing validation failures. Each one aborts the operation before any
/// state is written, so the caller can report it and let the user retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Add food description before saving.")]
    EmptyFoods,
    #[error("Invalid backup format: expected a snapshot with `entries` or a list of entries")]
    InvalidFormat,
    #[error("Nothing to export: the log is empty")]
    NothingToExport,
    #[error("Add a photo or description first.")]
    MissingAnalysisInput,
    #[error("Import cancelled; local entries left unchanged")]
    ImportCancelled,
    #[error("Clear cancelled; local entries left unchanged")]
    ClearCancelled,
    #[error("Cannot snooze the backup reminder for {0} days")]
    InvalidSnoozeDays(i64),
}

/// Returns the validation error wrapped in `err`, if that is what it carries.
#[must_use]
pub fn as_validation(err: &anyhow::Error) -> Option<&ValidationError> {
    err.downcast_ref::<ValidationError>()
}
