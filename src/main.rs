use std::{sync::Arc, time::Duration};

use crate::{
    backend::SlotBackend, configuration::Configuration,
    configuration_handler::ConfigurationHandler, http::create_app,
    identity::DemoAccountVerifier, identity_provider::IdentityProvider, local_slots::LocalSlots,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod backend;
mod configuration;
mod configuration_handler;
mod error;
mod http;
mod identity;
mod identity_provider;
mod local_slots;
#[cfg(test)]
mod testutils;
mod types;

#[derive(Clone)]
pub struct AppState<T: SlotBackend> {
    pub slot_backend: T,
    pub identities: IdentityProvider,
    pub simulated_latency: Duration,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let configuration = ConfigurationHandler::parse_arguments();

    let backend = match configuration.state_file() {
        Some(path) => LocalSlots::with_snapshot(&path).map_err(|err| {
            error!(%err, path = %path.display(), "Failed to load slot snapshot");
            err
        })?,
        None => {
            info!("No state file configured, bookings are kept in memory only");
            LocalSlots::default()
        }
    };
    let identities = IdentityProvider::new(
        Arc::new(DemoAccountVerifier::default()),
        configuration.session_ttl(),
    );
    let app = create_app(backend, identities, &configuration);

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Slot booker accessible at {address}");

    axum::serve(listener, app).await?;
    Ok(())
}
