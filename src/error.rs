//! Error abstractions & process exit-code mapping.

use thiserror::Error;

/// Fatal failure classes, each mapped to a distinct process exit code for operator alerting.
#[derive(Debug, Error)]
pub enum BootError {
    /// No cloud region was configured for the compute group API.
    #[error("missing region configuration, cannot query the compute group roster")]
    MissingRegion,
    /// No API credentials were configured for the compute group API.
    #[error("missing API credentials, cannot query the compute group roster")]
    MissingCredentials,
    /// The compute group roster came back empty.
    #[error("compute group roster is empty, cannot determine expected membership")]
    EmptyRoster,
    /// The local instance does not appear in its own group roster.
    #[error("local instance {0} does not appear in its own group roster")]
    SelfNotInRoster(String),
    /// A stale member could not be evicted within the retry budget.
    #[error("failed evicting stale member {member_id}, last status: {last_status}")]
    EvictionFailed { member_id: String, last_status: String },
    /// Self-registration could not be completed within the retry budget.
    #[error("failed registering with the cluster, last status: {last_status}")]
    RegistrationFailed { last_status: String },
    /// The health monitor loop was terminated by an interrupt signal.
    #[error("health monitor loop interrupted by signal")]
    HealthLoopInterrupted,
}

/// Exit code for missing credentials/region preconditions.
pub const EXIT_PRECONDITION: i32 = 2;
/// Exit code for a failed stale-member eviction.
pub const EXIT_EVICTION: i32 = 3;
/// Exit code for a failed self-registration.
pub const EXIT_REGISTRATION: i32 = 4;
/// Exit code for an interrupted health monitor loop.
pub const EXIT_HEALTH_INTERRUPTED: i32 = 5;

impl BootError {
    /// The process exit code of this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingRegion | Self::MissingCredentials => EXIT_PRECONDITION,
            Self::EvictionFailed { .. } => EXIT_EVICTION,
            Self::RegistrationFailed { .. } => EXIT_REGISTRATION,
            Self::HealthLoopInterrupted => EXIT_HEALTH_INTERRUPTED,
            Self::EmptyRoster | Self::SelfNotInRoster(_) => 1,
        }
    }
}

/// Derive the process exit code for the given top-level error.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BootError>().map(BootError::exit_code).unwrap_or(1)
}
