//! How background tasks are bounded in time.

use std::time::Duration;

use crate::config::OffloadSettings;

/// What happens to a task that runs too long.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum TimeoutPolicy {
    /// Unbounded.
    #[default]
    None,
    /// Abort the task once the duration has passed.
    Cancel(Duration),
    /// Let the task finish, then warn if it took longer than the duration.
    Warn(Duration),
}

/// Settings of an [`OffloadManager`](super::OffloadManager).
#[derive(Debug, Clone)]
pub(crate) struct OffloadConfig {
    pub(crate) timeout_policy: TimeoutPolicy,
    pub(crate) deduplicate: bool,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self::from(&OffloadSettings::default())
    }
}

impl From<&OffloadSettings> for OffloadConfig {
    fn from(settings: &OffloadSettings) -> Self {
        let timeout_policy = match (settings.timeout, settings.warn_after) {
            (Some(limit), _) => TimeoutPolicy::Cancel(limit),
            (None, Some(threshold)) => TimeoutPolicy::Warn(threshold),
            (None, None) => TimeoutPolicy::None,
        };
        Self {
            timeout_policy,
            deduplicate: settings.deduplicate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_takes_precedence_over_warn() {
        let mut settings = OffloadSettings {
            warn_after: Some(Duration::from_secs(1)),
            ..OffloadSettings::default()
        };
        assert_eq!(
            OffloadConfig::from(&settings).timeout_policy,
            TimeoutPolicy::Warn(Duration::from_secs(1))
        );

        settings.timeout = Some(Duration::from_secs(5));
        assert_eq!(
            OffloadConfig::from(&settings).timeout_policy,
            TimeoutPolicy::Cancel(Duration::from_secs(5))
        );
        assert_eq!(OffloadConfig::default().timeout_policy, TimeoutPolicy::None);
    }
}
