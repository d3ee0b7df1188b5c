use std::{path::PathBuf, time::Duration};

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> u16;
    fn state_file(&self) -> Option<PathBuf>;
    fn simulated_latency(&self) -> Duration;
    fn allowed_origin(&self) -> Option<String>;
    fn session_ttl(&self) -> Duration;
}
