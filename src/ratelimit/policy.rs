//! Named limiter instances shared across request handlers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use super::clock::Clock;
use super::limiter::RateLimiter;
use crate::config::PoliciesConfig;
use crate::error::{FormgateError, Result};

/// Which named policy a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyName {
    /// Public contact/intake form submissions
    Contact,
    /// Sensitive endpoints with a longer window
    Strict,
}

impl PolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Contact => "contact",
            PolicyName::Strict => "strict",
        }
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyName {
    type Err = FormgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "contact" => Ok(PolicyName::Contact),
            "strict" => Ok(PolicyName::Strict),
            other => Err(FormgateError::Config(format!("unknown policy '{}'", other))),
        }
    }
}

/// The process-wide limiter instances, built once at startup and handed to
/// whatever needs them.
#[derive(Clone)]
pub struct Policies {
    pub contact: Arc<RateLimiter>,
    pub strict: Arc<RateLimiter>,
}

impl Policies {
    /// Build both limiters from configuration on a shared clock.
    pub fn from_config(config: &PoliciesConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.contact.validate("contact")?;
        config.strict.validate("strict")?;

        let policies = Self {
            contact: Arc::new(RateLimiter::from_config(&config.contact, clock.clone())),
            strict: Arc::new(RateLimiter::from_config(&config.strict, clock)),
        };

        for name in [PolicyName::Contact, PolicyName::Strict] {
            let limiter = policies.get(name);
            info!(
                policy = %name,
                window_ms = limiter.window_ms(),
                max_tracked_identifiers = limiter.max_tracked_identifiers(),
                "Rate limit policy initialized"
            );
        }

        Ok(policies)
    }

    /// Look up a limiter by name.
    pub fn get(&self, name: PolicyName) -> &Arc<RateLimiter> {
        match name {
            PolicyName::Contact => &self.contact,
            PolicyName::Strict => &self.strict,
        }
    }

    /// Every limiter, for maintenance tasks such as the sweeper.
    pub fn all(&self) -> Vec<Arc<RateLimiter>> {
        vec![self.contact.clone(), self.strict.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::ratelimit::ManualClock;

    #[test]
    fn test_default_policies() {
        let clock = Arc::new(ManualClock::new(0));
        let policies = Policies::from_config(&PoliciesConfig::default(), clock).unwrap();

        assert_eq!(policies.contact.window_ms(), 3_600_000);
        assert_eq!(policies.contact.max_tracked_identifiers(), 500);
        assert_eq!(policies.strict.window_ms(), 86_400_000);
        assert_eq!(policies.strict.max_tracked_identifiers(), 100);
    }

    #[test]
    fn test_policies_have_separate_state() {
        let clock = Arc::new(ManualClock::new(0));
        let policies = Policies::from_config(&PoliciesConfig::default(), clock).unwrap();

        assert!(policies.get(PolicyName::Contact).check_and_increment("ip", 1).success);
        assert!(policies.get(PolicyName::Strict).check_and_increment("ip", 1).success);
        assert!(!policies.contact.check_and_increment("ip", 1).success);
    }

    #[test]
    fn test_clones_share_limiters() {
        let clock = Arc::new(ManualClock::new(0));
        let policies = Policies::from_config(&PoliciesConfig::default(), clock).unwrap();
        let handle = policies.clone();

        handle.contact.check_and_increment("ip", 1);
        assert!(!policies.contact.peek("ip", 1).success);
        assert_eq!(policies.all().len(), 2);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let config = PoliciesConfig {
            contact: PolicyConfig {
                window_ms: 0,
                max_tracked_identifiers: 10,
            },
            ..PoliciesConfig::default()
        };

        assert!(Policies::from_config(&config, clock).is_err());
    }

    #[test]
    fn test_policy_name_parsing() {
        assert_eq!("contact".parse::<PolicyName>().unwrap(), PolicyName::Contact);
        assert_eq!("STRICT".parse::<PolicyName>().unwrap(), PolicyName::Strict);
        assert!("lenient".parse::<PolicyName>().is_err());
        assert_eq!(PolicyName::Strict.to_string(), "strict");
    }
}
