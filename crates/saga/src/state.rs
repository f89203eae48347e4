//! Saga state machines.

/// The state of a registration saga.
///
/// State transitions:
/// ```text
/// Start ──► AuthChecked ──► ProfileCreated ──► LoggedIn ──► DocumentUploaded ──► Done
///   │            │                │               │                │
///   └────────────┴────────────────┴───────────────┴────────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegistrationState {
    #[default]
    Start,
    AuthChecked,
    ProfileCreated,
    LoggedIn,
    DocumentUploaded,
    /// All four steps succeeded (terminal state).
    Done,
    /// `step` failed; nothing already done is rolled back (terminal state).
    Failed { step: &'static str },
}

impl RegistrationState {
    /// Returns the state reached when the pending step succeeds.
    pub fn next(&self) -> Option<RegistrationState> {
        match self {
            RegistrationState::Start => Some(RegistrationState::AuthChecked),
            RegistrationState::AuthChecked => Some(RegistrationState::ProfileCreated),
            RegistrationState::ProfileCreated => Some(RegistrationState::LoggedIn),
            RegistrationState::LoggedIn => Some(RegistrationState::DocumentUploaded),
            RegistrationState::DocumentUploaded => Some(RegistrationState::Done),
            RegistrationState::Done | RegistrationState::Failed { .. } => None,
        }
    }

    /// Moves past the pending step. Terminal states stay put.
    pub fn advance(&mut self) {
        if let Some(next) = self.next() {
            *self = next;
        }
    }

    /// Marks the pending step as failed and returns its name.
    pub fn fail(&mut self) -> &'static str {
        let step = self.failed_step().or(self.pending_step()).unwrap_or("unknown");
        *self = RegistrationState::Failed { step };
        step
    }

    /// Returns the name of the step run from this state.
    pub fn pending_step(&self) -> Option<&'static str> {
        use crate::registration::{
            STEP_CREATE_PROFILE, STEP_LOGIN, STEP_UPLOAD_DOCUMENT, STEP_VALIDATE_IDENTITY,
        };
        match self {
            RegistrationState::Start => Some(STEP_VALIDATE_IDENTITY),
            RegistrationState::AuthChecked => Some(STEP_CREATE_PROFILE),
            RegistrationState::ProfileCreated => Some(STEP_LOGIN),
            RegistrationState::LoggedIn => Some(STEP_UPLOAD_DOCUMENT),
            _ => None,
        }
    }

    /// Returns the step that failed, if the saga failed.
    pub fn failed_step(&self) -> Option<&'static str> {
        match self {
            RegistrationState::Failed { step } => Some(*step),
            _ => None,
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationState::Done | RegistrationState::Failed { .. })
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationState::Start => "Start",
            RegistrationState::AuthChecked => "AuthChecked",
            RegistrationState::ProfileCreated => "ProfileCreated",
            RegistrationState::LoggedIn => "LoggedIn",
            RegistrationState::DocumentUploaded => "DocumentUploaded",
            RegistrationState::Done => "Done",
            RegistrationState::Failed { .. } => "Failed",
        }
    }
}

impl std::fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a document signing flow.
///
/// ```text
/// Start ──► UrlSigned ──► MetadataMarked ──► Done
///   └──────────┴──────────────┴──────────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningState {
    #[default]
    Start,
    UrlSigned,
    MetadataMarked,
    Done,
    Failed { step: &'static str },
}

impl SigningState {
    pub fn next(&self) -> Option<SigningState> {
        match self {
            SigningState::Start => Some(SigningState::UrlSigned),
            SigningState::UrlSigned => Some(SigningState::MetadataMarked),
            SigningState::MetadataMarked => Some(SigningState::Done),
            SigningState::Done | SigningState::Failed { .. } => None,
        }
    }

    pub fn advance(&mut self) {
        if let Some(next) = self.next() {
            *self = next;
        }
    }

    /// Marks the pending step as failed and returns its name.
    pub fn fail(&mut self) -> &'static str {
        let step = self.failed_step().or(self.pending_step()).unwrap_or("unknown");
        *self = SigningState::Failed { step };
        step
    }

    /// Returns the name of the step run from this state.
    pub fn pending_step(&self) -> Option<&'static str> {
        use crate::signing::{STEP_MARK_SIGNED, STEP_REPORT_TO_REGISTRY, STEP_SIGN_URL};
        match self {
            SigningState::Start => Some(STEP_SIGN_URL),
            SigningState::UrlSigned => Some(STEP_MARK_SIGNED),
            SigningState::MetadataMarked => Some(STEP_REPORT_TO_REGISTRY),
            SigningState::Done | SigningState::Failed { .. } => None,
        }
    }

    pub fn failed_step(&self) -> Option<&'static str> {
        match self {
            SigningState::Failed { step } => Some(*step),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SigningState::Done | SigningState::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SigningState::Start => "Start",
            SigningState::UrlSigned => "UrlSigned",
            SigningState::MetadataMarked => "MetadataMarked",
            SigningState::Done => "Done",
            SigningState::Failed { .. } => "Failed",
        }
    }
}

impl std::fmt::Display for SigningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
