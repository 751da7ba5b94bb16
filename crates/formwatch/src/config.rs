#![forbid(unsafe_code)]

//! Global error-display configuration.
//!
//! ```toml
//! showErrorsWhenInput = "dirty"
//! showMaxErrors = 1
//! ```
//!
//! With the `policy-config` feature (on by default) the configuration loads
//! from TOML or JSON. Keys are camelCase; both are optional.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::policy::ShowWhen;

/// Bounded poll that watches a control while its async validation is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPoll {
    /// Time between polls.
    pub interval: Duration,
    /// Polls made before giving up.
    pub max_ticks: u32,
}

impl PendingPoll {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);
    pub const DEFAULT_MAX_TICKS: u32 = 100;
}

impl Default for PendingPoll {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_ticks: Self::DEFAULT_MAX_TICKS,
        }
    }
}

/// Composition-wide defaults for error blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase", default, deny_unknown_fields)
)]
pub struct ErrorsConfig {
    /// Policy used when neither the block nor its group names one.
    pub show_errors_when_input: ShowWhen,
    /// Cap on simultaneously visible errors per group; `None` is unlimited.
    #[cfg_attr(
        feature = "policy-config",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub show_max_errors: Option<NonZeroUsize>,
    /// Pending-status poll settings. Not part of the file format.
    #[cfg_attr(feature = "policy-config", serde(skip))]
    pub pending_poll: PendingPoll,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            show_errors_when_input: ShowWhen::TOUCHED,
            show_max_errors: None,
            pending_poll: PendingPoll::default(),
        }
    }
}

impl ErrorsConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global default policy.
    #[must_use]
    pub fn show_when(mut self, show_when: impl Into<ShowWhen>) -> Self {
        self.show_errors_when_input = show_when.into();
        self
    }

    /// Cap visible errors per group. Zero removes the cap.
    #[must_use]
    pub fn max_errors(mut self, max: usize) -> Self {
        self.show_max_errors = NonZeroUsize::new(max);
        self
    }

    /// Tune the pending-status poll.
    #[must_use]
    pub fn pending_poll(mut self, interval: Duration, max_ticks: u32) -> Self {
        self.pending_poll = PendingPoll {
            interval,
            max_ticks,
        };
        self
    }
}

#[cfg(feature = "policy-config")]
mod loaders {
    use super::ErrorsConfig;
    use crate::error::{FormwatchError, Result};

    impl ErrorsConfig {
        /// Parse a TOML document.
        pub fn from_toml_str(source: &str) -> Result<Self> {
            toml::from_str(source).map_err(|e| FormwatchError::Config(e.to_string()))
        }

        /// Parse a JSON document.
        pub fn from_json_str(source: &str) -> Result<Self> {
            serde_json::from_str(source).map_err(|e| FormwatchError::Config(e.to_string()))
        }

        /// Render as TOML.
        pub fn to_toml_string(&self) -> Result<String> {
            toml::to_string(self).map_err(|e| FormwatchError::Config(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_touched_and_unlimited() {
        let config = ErrorsConfig::default();
        assert_eq!(config.show_errors_when_input, ShowWhen::TOUCHED);
        assert_eq!(config.show_max_errors, None);
        assert_eq!(config.pending_poll.interval, Duration::from_millis(50));
        assert_eq!(config.pending_poll.max_ticks, 100);
    }

    #[test]
    fn builder_zero_clears_the_cap() {
        let config = ErrorsConfig::new().max_errors(2);
        assert_eq!(config.show_max_errors.map(NonZeroUsize::get), Some(2));
        assert_eq!(config.max_errors(0).show_max_errors, None);
    }

    #[cfg(feature = "policy-config")]
    mod files {
        use super::*;
        use crate::error::FormwatchError;

        #[test]
        fn toml_round_trip() {
            let config = ErrorsConfig::from_toml_str(
                "showErrorsWhenInput = \"dirty\"\nshowMaxErrors = 1\n",
            )
            .expect("valid toml");
            assert_eq!(config.show_errors_when_input, ShowWhen::DIRTY);
            assert_eq!(config.show_max_errors.map(NonZeroUsize::get), Some(1));

            let rendered = config.to_toml_string().expect("serializable");
            assert_eq!(ErrorsConfig::from_toml_str(&rendered), Ok(config));
        }

        #[test]
        fn json_keys_are_optional() {
            let config = ErrorsConfig::from_json_str("{}").expect("empty object");
            assert_eq!(config, ErrorsConfig::default());

            let config = ErrorsConfig::from_json_str(r#"{"showErrorsWhenInput":"formIsSubmitted"}"#)
                .expect("valid json");
            assert_eq!(config.show_errors_when_input, ShowWhen::FORM_IS_SUBMITTED);
        }

        #[test]
        fn zero_cap_and_unknown_keys_are_rejected() {
            assert!(matches!(
                ErrorsConfig::from_toml_str("showMaxErrors = 0"),
                Err(FormwatchError::Config(_))
            ));
            assert!(matches!(
                ErrorsConfig::from_json_str(r#"{"showErrorsOnlyIfInputDirty":true}"#),
                Err(FormwatchError::Config(_))
            ));
        }
    }
}
