//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::logger::buffer::{BufferLimits, DEFAULT_MAX_MESSAGES_PER_TRACE, DEFAULT_MAX_TRACES};

/// Output format of process diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration.
///
/// Every flag can also be supplied through the environment variable shown in `--help`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "routekit",
    version,
    about = "HTTP service with request-scoped, bounded log buffering"
)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Maximum number of traces buffered at once
    #[arg(long, env = "ROUTEKIT_MAX_TRACES", default_value_t = DEFAULT_MAX_TRACES)]
    pub max_traces: usize,

    /// Maximum number of records buffered per trace
    #[arg(
        long,
        env = "ROUTEKIT_MAX_MESSAGES_PER_TRACE",
        default_value_t = DEFAULT_MAX_MESSAGES_PER_TRACE
    )]
    pub max_messages_per_trace: usize,

    /// Drop buffered traces older than this (e.g. "5m")
    #[arg(
        long,
        env = "ROUTEKIT_TRACE_IDLE_TIMEOUT",
        default_value = "5m",
        value_parser = humantime::parse_duration
    )]
    pub trace_idle_timeout: Duration,

    /// How often to look for idle traces
    #[arg(
        long,
        env = "ROUTEKIT_SWEEP_INTERVAL",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub sweep_interval: Duration,

    /// How long in-flight requests may take to finish on shutdown
    #[arg(
        long,
        env = "ROUTEKIT_SHUTDOWN_GRACE",
        default_value = "5s",
        value_parser = humantime::parse_duration
    )]
    pub shutdown_grace: Duration,

    /// Format of process diagnostics
    #[arg(long, env = "ROUTEKIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Bearer token required on auth-gated routes. Unset disables the gate.
    #[arg(long, env = "ROUTEKIT_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            max_traces: DEFAULT_MAX_TRACES,
            max_messages_per_trace: DEFAULT_MAX_MESSAGES_PER_TRACE,
            trace_idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(5),
            log_format: LogFormat::Text,
            auth_token: None,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    Zero {
        /// Name of the offending setting
        name: &'static str,
    },

    #[error("auth token must not be empty")]
    EmptyAuthToken,
}

impl Config {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_traces == 0 {
            return Err(ConfigError::Zero { name: "max-traces" });
        }
        if self.max_messages_per_trace == 0 {
            return Err(ConfigError::Zero {
                name: "max-messages-per-trace",
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::Zero {
                name: "sweep-interval",
            });
        }
        if self.auth_token.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyAuthToken);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn buffer_limits(&self) -> BufferLimits {
        BufferLimits {
            max_traces: self.max_traces,
            max_messages_per_trace: self.max_messages_per_trace,
        }
    }
}
