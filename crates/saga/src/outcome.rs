//! Status-code lookup tables, one per saga step.
//!
//! Each dependency gives its status codes a meaning of its own (AUTH's
//! `/validate` answers 200 for an existing user and 204 for a new one), so
//! every step classifies through an explicit table instead of inline checks.

use crate::services::{NormalizedResponse, TransportFailure};

/// Maps status codes to outcomes, with a fallback for anything unlisted.
#[derive(Debug, Clone, Copy)]
pub struct StatusTable<T: Copy + 'static> {
    entries: &'static [(u16, T)],
    fallback: T,
}

impl<T: Copy + 'static> StatusTable<T> {
    pub const fn new(entries: &'static [(u16, T)], fallback: T) -> Self {
        Self { entries, fallback }
    }

    /// Returns the outcome for a status code.
    pub fn classify(&self, status: u16) -> T {
        self.entries
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, outcome)| *outcome)
            .unwrap_or(self.fallback)
    }
}

/// Outcome of the AUTH identity validation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
    /// Identity checks passed and the user is new.
    Validated,
    AlreadyRegistered,
    InvalidId,
    WeakPassword,
    /// AUTH answered with a status it does not document.
    ServiceError,
    /// AUTH could not be reached.
    Unreachable,
}

/// AUTH `/validate`.
pub const VALIDATE_IDENTITY: StatusTable<AuthOutcome> = StatusTable::new(
    &[
        (204, AuthOutcome::Validated),
        (200, AuthOutcome::AlreadyRegistered),
        (421, AuthOutcome::InvalidId),
        (422, AuthOutcome::WeakPassword),
    ],
    AuthOutcome::ServiceError,
);

/// Result of identity validation, with AUTH's own message where it sent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub outcome: AuthOutcome,
    pub detail: Option<String>,
}

impl AuthResult {
    /// Classifies an AUTH `/validate` response.
    pub fn from_response(response: &NormalizedResponse) -> Self {
        let outcome = VALIDATE_IDENTITY.classify(response.status);
        let detail = match outcome {
            AuthOutcome::WeakPassword => response.detail(),
            _ => None,
        };
        Self { outcome, detail }
    }

    /// Wraps a transport failure talking to AUTH.
    pub fn unreachable(failure: &TransportFailure) -> Self {
        Self {
            outcome: AuthOutcome::Unreachable,
            detail: Some(failure.to_string()),
        }
    }
}

/// Outcome of a step that either succeeds on one status or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    Proceed,
    Rejected,
}

/// USERS `/create`.
pub const CREATE_PROFILE: StatusTable<StepOutcome> =
    StatusTable::new(&[(200, StepOutcome::Proceed)], StepOutcome::Rejected);

/// AUTH `/login`.
pub const LOGIN: StatusTable<StepOutcome> =
    StatusTable::new(&[(200, StepOutcome::Proceed)], StepOutcome::Rejected);

/// DOCUMENTS `PUT /doc/...`. Only enforced when strict uploads are enabled.
pub const UPLOAD_DOCUMENT: StatusTable<StepOutcome> = StatusTable::new(
    &[
        (200, StepOutcome::Proceed),
        (201, StepOutcome::Proceed),
        (204, StepOutcome::Proceed),
    ],
    StepOutcome::Rejected,
);

/// Registry `/authenticateDocument`.
pub const REPORT_SIGNED_DOCUMENT: StatusTable<StepOutcome> =
    StatusTable::new(&[(200, StepOutcome::Proceed)], StepOutcome::Rejected);
