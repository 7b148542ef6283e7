//! Startup configuration read from the environment

use crate::runtime::RuntimeSettings;
use crate::state_machine::FlowConfig;
use chrono::{TimeDelta, Utc};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name}={value:?} is not valid: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Everything the process needs to start. No `Debug`: it holds the bot token.
#[derive(Clone)]
pub struct DeskConfig {
    pub bot_token: String,
    /// Chat that receives summaries and issues reply commands
    pub operator_channel: Option<i64>,
    pub db_path: PathBuf,
    pub port: u16,
    pub flow: FlowConfig,
    pub runtime: RuntimeSettings,
}

impl DeskConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let operator_channel = parse(var("SUPPORT_GROUP_ID"), "SUPPORT_GROUP_ID", "a chat id")?;

        let db_path = var("DESK_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".desk-relay").join("sessions.db")
            },
            PathBuf::from,
        );

        let port = parse(var("DESK_PORT"), "DESK_PORT", "a port number")?.unwrap_or(8000);

        let defaults = RuntimeSettings::default();
        let session_ttl = match parse::<u64>(
            var("DESK_SESSION_TTL_SECS"),
            "DESK_SESSION_TTL_SECS",
            "a positive number of seconds",
        )? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "DESK_SESSION_TTL_SECS",
                    value: "0".to_string(),
                    expected: "a positive number of seconds",
                })
            }
            Some(secs) => {
                let ttl = Duration::from_secs(secs);
                // Writes compute now + ttl, which must not overflow
                let representable = TimeDelta::from_std(ttl)
                    .ok()
                    .and_then(|delta| Utc::now().checked_add_signed(delta))
                    .is_some();
                if !representable {
                    return Err(ConfigError::Invalid {
                        name: "DESK_SESSION_TTL_SECS",
                        value: secs.to_string(),
                        expected: "a positive number of seconds",
                    });
                }
                ttl
            }
            None => defaults.session_ttl,
        };
        let store_timeout = match parse::<u64>(
            var("DESK_STORE_TIMEOUT_MS"),
            "DESK_STORE_TIMEOUT_MS",
            "a positive number of milliseconds",
        )? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    name: "DESK_STORE_TIMEOUT_MS",
                    value: "0".to_string(),
                    expected: "a positive number of milliseconds",
                })
            }
            Some(millis) => Duration::from_millis(millis),
            None => defaults.store_timeout,
        };

        let flow = FlowConfig {
            ask_case_type: parse_flag(var("DESK_ASK_CASE_TYPE"), "DESK_ASK_CASE_TYPE")?,
            forward_reply_syntax: parse_flag(
                var("DESK_FORWARD_REPLY_SYNTAX"),
                "DESK_FORWARD_REPLY_SYNTAX",
            )?,
            callback_phone: var("DESK_CALLBACK_PHONE"),
        };

        Ok(Self {
            bot_token,
            operator_channel,
            db_path,
            port,
            flow,
            runtime: RuntimeSettings {
                session_ttl,
                store_timeout,
                ..defaults
            },
        })
    }
}

fn parse<T: FromStr>(
    value: Option<String>,
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|raw| {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value: raw.clone(),
                expected,
            })
        })
        .transpose()
}

fn parse_flag(value: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(_) => Err(ConfigError::Invalid {
            name,
            value: value.unwrap_or_default(),
            expected: "true or false",
        }),
    }
}
