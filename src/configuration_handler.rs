use crate::{configuration::Configuration, identity_provider::DEFAULT_SESSION_TTL};
use clap::Parser;
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Parser)]
#[command(name = "slot_booker", about = "Hourly appointment booking service")]
pub struct ConfigurationHandler {
    /// Port the HTTP server listens on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// JSON file mirroring the slot list. Slots stay in memory when unset
    #[arg(long, env = "STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Delay added to every request to mimic a remote backend
    #[arg(long, env = "SIMULATED_LATENCY_MS", default_value_t = 0)]
    simulated_latency_ms: u64,

    /// Origin allowed by CORS. Any origin when unset
    #[arg(long, env = "ALLOWED_ORIGIN")]
    allowed_origin: Option<String>,

    /// Minutes a login session stays valid
    #[arg(
        long,
        env = "SESSION_TTL_MINUTES",
        default_value_t = DEFAULT_SESSION_TTL.as_secs() / 60,
        value_parser = clap::value_parser!(u64).range(1..=525_600)
    )]
    session_ttl_minutes: u64,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> u16 {
        self.port
    }

    fn state_file(&self) -> Option<PathBuf> {
        self.state_file.clone()
    }

    fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    fn allowed_origin(&self) -> Option<String> {
        self.allowed_origin.clone()
    }

    fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_minutes * 60)
    }
}
