use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    presentation::RenderError,
    state::spin_machine::{SessionId, TransitionError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A group with this name already exists, or the name is blank.
    #[error("{}", duplicate_group_message(.0))]
    DuplicateGroup(String),
    /// The referenced group is not part of the collection.
    #[error("group `{0}` not found")]
    GroupNotFound(String),
    /// Option labels must contain at least one non-whitespace character.
    #[error("option text must not be empty")]
    EmptyOption,
    /// The option is already listed in the group.
    #[error("option `{option}` already exists in group `{group}`")]
    DuplicateOption {
        /// Group that already holds the option.
        group: String,
        /// Offending option label.
        option: String,
    },
    /// Option index does not address an entry of the group.
    #[error("option index {index} is out of range for group `{group}` ({len} options)")]
    IndexOutOfRange {
        /// Group the index was applied to.
        group: String,
        /// Requested index.
        index: usize,
        /// Number of options in the group.
        len: usize,
    },
    /// Operation needs a selected group but none is selected.
    #[error("no group is selected")]
    NoGroupSelected,
    /// Structural change refused while the group is being spun.
    #[error("group `{0}` is locked while a spin is in progress")]
    GroupLocked(String),
    /// Storage could not follow the in-memory collection.
    ///
    /// With `applied` set the change is held in memory but not saved. Without
    /// it the stored collection could not be read, so the change was refused.
    #[error("{}", persistence_message(*.revision, *.applied))]
    PersistenceFailure {
        /// Store revision that failed to persist.
        revision: u64,
        /// Whether the in-memory collection holds the change.
        applied: bool,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },
    /// Spinning requires at least one option.
    #[error("group `{0}` has no options to spin")]
    NoOptionsAvailable(String),
    /// Only one spin may be active at a time.
    #[error("a spin is already in progress")]
    AlreadySpinning,
    /// Stop requested while no spin animation is running.
    #[error("no spin is in progress")]
    NotSpinning,
    /// The rendering surface rejected a draw call.
    #[error("wheel surface unavailable")]
    Presentation(#[from] RenderError),
    /// A spin session was addressed after it ended.
    #[error("spin session {0} is no longer active")]
    StaleSession(SessionId),
}

/// Coarse categories used to decide how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected user input; nothing changed.
    Validation,
    /// Stale reference to a group or option; nothing changed.
    NotFound,
    /// Memory changed but storage did not follow.
    Persistence,
    /// Guard on starting or stopping a spin.
    SpinGuard,
    /// Rendering or session bookkeeping failure.
    Internal,
}

impl ServiceError {
    /// Classify the error into the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::DuplicateGroup(_)
            | ServiceError::EmptyOption
            | ServiceError::DuplicateOption { .. }
            | ServiceError::NoGroupSelected
            | ServiceError::GroupLocked(_) => ErrorKind::Validation,
            ServiceError::GroupNotFound(_) | ServiceError::IndexOutOfRange { .. } => {
                ErrorKind::NotFound
            }
            ServiceError::PersistenceFailure { .. } => ErrorKind::Persistence,
            ServiceError::NoOptionsAvailable(_)
            | ServiceError::AlreadySpinning
            | ServiceError::NotSpinning => ErrorKind::SpinGuard,
            ServiceError::Presentation(_) | ServiceError::StaleSession(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request can succeed without user changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::PersistenceFailure { .. })
    }
}

fn duplicate_group_message(name: &str) -> String {
    if name.trim().is_empty() {
        "group name must not be empty".to_owned()
    } else {
        format!("group `{name}` already exists")
    }
}

fn persistence_message(revision: u64, applied: bool) -> String {
    if applied {
        format!("change (revision {revision}) may not be durable")
    } else {
        "stored groups could not be read; the change was not made".to_owned()
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::SessionMismatch { got, .. } => ServiceError::StaleSession(got),
            TransitionError::Invalid(_) => ServiceError::NotSpinning,
        }
    }
}
