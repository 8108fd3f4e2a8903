//! Server configuration from environment variables

use crate::state_machine::state::DEFAULT_RESET_DELAY;
use crate::state_machine::FlowStep;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PROCESSOR_URL: &str = "http://localhost:8000";
const DEFAULT_PROCESSOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub processor_url: String,
    pub directory_url: String,
    pub reset_delay: Duration,
    pub processor_timeout: Duration,
    pub confirmation_steps: Vec<FlowStep>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset and empty values take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("FRONTDESK_PORT") {
            Some(value) => parse_number("FRONTDESK_PORT", &value)?,
            None => DEFAULT_PORT,
        };

        let processor_url =
            var("FRONTDESK_PROCESSOR_URL").unwrap_or_else(|| DEFAULT_PROCESSOR_URL.to_string());
        let directory_url = var("FRONTDESK_DIRECTORY_URL").unwrap_or_else(|| processor_url.clone());

        let reset_delay = match var("FRONTDESK_RESET_DELAY_SECS") {
            Some(value) => Duration::from_secs(parse_number("FRONTDESK_RESET_DELAY_SECS", &value)?),
            None => DEFAULT_RESET_DELAY,
        };

        let processor_timeout = match var("FRONTDESK_PROCESSOR_TIMEOUT_SECS") {
            Some(value) => {
                let secs: u64 = parse_number("FRONTDESK_PROCESSOR_TIMEOUT_SECS", &value)?;
                if secs == 0 {
                    return Err(ConfigError::Zero {
                        name: "FRONTDESK_PROCESSOR_TIMEOUT_SECS",
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_PROCESSOR_TIMEOUT,
        };

        let confirmation_steps = var("FRONTDESK_CONFIRMATION_STEPS").map_or_else(
            || vec![FlowStep::confirmation()],
            |list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|step| !step.is_empty())
                    .map(FlowStep::new)
                    .collect()
            },
        );

        Ok(Self {
            port,
            processor_url,
            directory_url,
            reset_delay,
            processor_timeout,
            confirmation_steps,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}
