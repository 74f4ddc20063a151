//! Provisioner settings, constructed once per run and passed to every
//! component.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use idforge_directory::models::SIGN_IN_AUDIENCE_MY_ORG;

use crate::retry::{Backoff, RetryPolicy};
use crate::{ProvisioningError, ProvisioningResult};

/// Longest password credential lifetime the directory accepts.
pub const MAX_CREDENTIAL_LIFETIME_DAYS: i64 = 730;

/// Retry budget as written in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Added to the delay after each retry. Zero gives a fixed delay.
    pub delay_step_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            delay_step_ms: 0,
        }
    }
}

impl RetrySettings {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.initial_delay_ms);
        let backoff = if self.delay_step_ms == 0 {
            Backoff::Fixed(initial)
        } else {
            Backoff::Linear {
                initial,
                step: Duration::from_millis(self.delay_step_ms),
            }
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

/// Settings shared by the provisioners, the wiring step and the admin
/// authorization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Audience set on created applications.
    pub sign_in_audience: String,
    /// Display name given to minted password credentials.
    pub credential_description: String,
    /// Between 1 and [`MAX_CREDENTIAL_LIFETIME_DAYS`].
    pub credential_lifetime_days: i64,
    /// Single wait before the first admin authorization attempt.
    pub authorization_initial_delay_ms: u64,
    /// Wait between successive role-assignment attempts.
    pub authorization_inter_grant_delay_ms: u64,
    /// Budget for transient role-assignment failures.
    pub authorization_retry: RetrySettings,
    /// Budget for principal creation while the application is not yet indexed.
    pub principal_retry: RetrySettings,
    /// Auth callback paths registered for proxy-only enterprise objects,
    /// relative to the external address.
    pub proxy_callback_paths: Vec<String>,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            sign_in_audience: SIGN_IN_AUDIENCE_MY_ORG.to_string(),
            credential_description: "idforge".to_string(),
            credential_lifetime_days: MAX_CREDENTIAL_LIFETIME_DAYS,
            authorization_initial_delay_ms: 10_000,
            authorization_inter_grant_delay_ms: 2_000,
            authorization_retry: RetrySettings::default(),
            principal_retry: RetrySettings {
                max_attempts: 5,
                initial_delay_ms: 2_000,
                delay_step_ms: 2_000,
            },
            proxy_callback_paths: vec!["/.auth/login/aad/callback".to_string()],
        }
    }
}

impl ProvisionerConfig {
    /// Configuration with every delay set to zero, for tests and local mocks.
    #[must_use]
    pub fn for_testing() -> Self {
        let immediate = |max_attempts| RetrySettings {
            max_attempts,
            initial_delay_ms: 0,
            delay_step_ms: 0,
        };
        Self {
            authorization_initial_delay_ms: 0,
            authorization_inter_grant_delay_ms: 0,
            authorization_retry: immediate(3),
            principal_retry: immediate(5),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn authorization_initial_delay(&self) -> Duration {
        Duration::from_millis(self.authorization_initial_delay_ms)
    }

    #[must_use]
    pub fn authorization_inter_grant_delay(&self) -> Duration {
        Duration::from_millis(self.authorization_inter_grant_delay_ms)
    }

    /// Lifetime of minted credentials, or `None` when the configured number
    /// of days is out of range.
    #[must_use]
    pub fn credential_lifetime(&self) -> Option<chrono::Duration> {
        if !(1..=MAX_CREDENTIAL_LIFETIME_DAYS).contains(&self.credential_lifetime_days) {
            return None;
        }
        chrono::Duration::try_days(self.credential_lifetime_days)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::InvalidTopology`] naming the setting.
    pub fn validate(&self) -> ProvisioningResult<()> {
        if self.credential_lifetime().is_none() {
            return Err(ProvisioningError::InvalidTopology(format!(
                "credential_lifetime_days must be 1..={MAX_CREDENTIAL_LIFETIME_DAYS}, got {}",
                self.credential_lifetime_days
            )));
        }
        Ok(())
    }
}
