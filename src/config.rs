//! Driver configuration.

/// OctoQuad register protocol revision.
///
/// Revision B (firmware 2.x) is the current protocol. Revision A (firmware
/// 1.x) is kept for boards that have not been updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolRevision {
    A,
    #[default]
    B,
}

/// What the verification gate does when the board reports an unexpected
/// chip ID or firmware major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MismatchPolicy {
    /// Abort the operation with an error. The session stays unverified and
    /// the check is repeated on the next call.
    Fail,
    /// Record a [`VerificationWarning`](crate::VerificationWarning) and carry on.
    Warn,
}

impl MismatchPolicy {
    /// Policy the stock driver for `revision` applies.
    pub fn default_for(revision: ProtocolRevision) -> Self {
        match revision {
            ProtocolRevision::A => MismatchPolicy::Fail,
            ProtocolRevision::B => MismatchPolicy::Warn,
        }
    }
}

/// Configuration for [`OctoQuad`](crate::OctoQuad).
///
/// # Example
///
/// ```
/// use octoquad_driver::{DriverConfig, MismatchPolicy, ProtocolRevision};
///
/// let config = DriverConfig::for_revision(ProtocolRevision::B)
///     .with_mismatch_policy(MismatchPolicy::Fail);
/// assert_eq!(config.mismatch_policy, MismatchPolicy::Fail);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverConfig {
    pub revision: ProtocolRevision,
    pub mismatch_policy: MismatchPolicy,
}

impl DriverConfig {
    /// Config for `revision` with that revision's default mismatch policy.
    pub fn for_revision(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            mismatch_policy: MismatchPolicy::default_for(revision),
        }
    }

    pub fn with_mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.mismatch_policy = policy;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::for_revision(ProtocolRevision::default())
    }
}
