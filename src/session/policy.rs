use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, SessionError, VerifyError};
use crate::session::Session;

/// Session lifetime rules.
///
/// The initiator stamps `issued_at` and `issued_at + lifetime` into every
/// blob. A recipient with `enforce_expiry` refuses sessions outside that
/// window, widened by `max_clock_skew` on both ends. Sessions are never
/// extended in place: rotation means a new blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    pub lifetime: Duration,
    pub max_clock_skew: Duration,
    pub enforce_expiry: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(24 * 3600),
            max_clock_skew: Duration::from_secs(300),
            enforce_expiry: true,
        }
    }
}

impl SessionPolicy {
    pub fn validate(&self) -> Result<(), Error> {
        if self.lifetime < Duration::from_secs(1) {
            return Err(Error::InvalidConfig(
                "session lifetime must be at least 1 second".into(),
            ));
        }
        if self.lifetime.subsec_nanos() != 0 || self.max_clock_skew.subsec_nanos() != 0 {
            return Err(Error::InvalidConfig(
                "session durations must be whole seconds".into(),
            ));
        }
        if self.max_clock_skew >= self.lifetime {
            return Err(Error::InvalidConfig(
                "max_clock_skew must be shorter than the session lifetime".into(),
            ));
        }
        Ok(())
    }

    /// Whether `session` is usable at `now`.
    pub fn check(&self, session: &Session, now: u64) -> Result<(), SessionError> {
        if !self.enforce_expiry {
            return Ok(());
        }
        let skew = self.max_clock_skew.as_secs();
        if session.issued_at > now.saturating_add(skew) {
            return Err(SessionError::NotYetValid {
                issued_at: session.issued_at,
                now,
            });
        }
        if now >= session.expires_at.saturating_add(skew) {
            return Err(SessionError::Expired {
                expires_at: session.expires_at,
                now,
            });
        }
        Ok(())
    }

    /// Whether a token stamped `created` could have been minted during `session`.
    /// Always true when `enforce_expiry` is off.
    pub fn covers(&self, session: &Session, created: u64) -> bool {
        if !self.enforce_expiry {
            return true;
        }
        let skew = self.max_clock_skew.as_secs();
        created.saturating_add(skew) >= session.issued_at
            && created <= session.expires_at.saturating_add(skew)
    }
}

/// Token timestamp rules. Both bounds are off by default, which keeps token
/// validation a pure function of its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    /// Reject tokens stamped further than this in the future.
    pub max_future_skew: Option<Duration>,
    /// Reject tokens older than this.
    pub max_age: Option<Duration>,
}

impl FreshnessPolicy {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_age == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig("max_age must be positive".into()));
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.max_future_skew.is_some() || self.max_age.is_some()
    }

    pub fn check(&self, created: u64, now: u64) -> Result<(), VerifyError> {
        if let Some(skew) = self.max_future_skew {
            if created > now.saturating_add(skew.as_secs()) {
                return Err(VerifyError::FutureToken);
            }
        }
        if let Some(max_age) = self.max_age {
            if now.saturating_sub(created) > max_age.as_secs() {
                return Err(VerifyError::StaleToken);
            }
        }
        Ok(())
    }
}
