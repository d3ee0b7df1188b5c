use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::StreamExt;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;

use crate::{
    backend::SlotBackend,
    configuration::Configuration,
    error::BookingError,
    http::create_app,
    identity::DemoAccountVerifier,
    identity_provider::{IdentityProvider, DEFAULT_SESSION_TTL},
    types::{Identity, SlotId, TimeSlot},
};

pub struct MockSlotBackendInner {
    pub success: AtomicBool,
    pub calls_to_slot_stream: AtomicU64,
    pub calls_to_slots: AtomicU64,
    pub calls_to_book_slot: AtomicU64,
    pub calls_to_cancel_slot: AtomicU64,
    pub calls_to_reset_all: AtomicU64,
    pub slots: Mutex<Vec<TimeSlot>>,
    pub sender: watch::Sender<Vec<TimeSlot>>,
}

#[derive(Clone)]
pub struct MockSlotBackend(pub Arc<MockSlotBackendInner>);

impl MockSlotBackendInner {
    fn new() -> Self {
        let (sender, _) = watch::channel(vec![]);
        Self {
            success: AtomicBool::new(true),
            calls_to_slot_stream: AtomicU64::default(),
            calls_to_slots: AtomicU64::default(),
            calls_to_book_slot: AtomicU64::default(),
            calls_to_cancel_slot: AtomicU64::default(),
            calls_to_reset_all: AtomicU64::default(),
            slots: Mutex::default(),
            sender,
        }
    }
}

impl MockSlotBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockSlotBackendInner::new()))
    }

    pub fn calls(&self, operation: &str) -> u64 {
        let counter = match operation {
            "slot_stream" => &self.0.calls_to_slot_stream,
            "slots" => &self.0.calls_to_slots,
            "book_slot" => &self.0.calls_to_book_slot,
            "cancel_slot" => &self.0.calls_to_cancel_slot,
            "reset_all" => &self.0.calls_to_reset_all,
            _ => unimplemented!(),
        };
        counter.load(Ordering::SeqCst)
    }

    fn succeeds(&self) -> bool {
        self.0.success.load(Ordering::SeqCst)
    }
}

impl SlotBackend for MockSlotBackend {
    fn slot_stream(&self) -> WatchStream<Vec<TimeSlot>> {
        self.0.calls_to_slot_stream.fetch_add(1, Ordering::SeqCst);
        WatchStream::new(self.0.sender.subscribe())
    }

    fn slots(&self) -> Vec<TimeSlot> {
        self.0.calls_to_slots.fetch_add(1, Ordering::SeqCst);
        self.0.slots.lock().unwrap().clone()
    }

    fn book_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
        display_name: &str,
    ) -> Result<TimeSlot, BookingError> {
        self.0.calls_to_book_slot.fetch_add(1, Ordering::SeqCst);
        let identity = identity.ok_or(BookingError::Unauthenticated)?;
        match self.succeeds() {
            true => Ok(TimeSlot::available(id).booked(identity, display_name)),
            false => Err(BookingError::AlreadyBooked),
        }
    }

    fn cancel_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
    ) -> Result<TimeSlot, BookingError> {
        self.0.calls_to_cancel_slot.fetch_add(1, Ordering::SeqCst);
        identity.ok_or(BookingError::Unauthenticated)?;
        match self.succeeds() {
            true => Ok(TimeSlot::available(id)),
            false => Err(BookingError::NotBooked),
        }
    }

    fn reset_all(&self) {
        self.0.calls_to_reset_all.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestConfiguration {
    pub simulated_latency: Duration,
}

impl Configuration for TestConfiguration {
    fn port(&self) -> u16 {
        0
    }

    fn state_file(&self) -> Option<PathBuf> {
        None
    }

    fn simulated_latency(&self) -> Duration {
        self.simulated_latency
    }

    fn allowed_origin(&self) -> Option<String> {
        None
    }

    fn session_ttl(&self) -> Duration {
        DEFAULT_SESSION_TTL
    }
}

/// Serves the app on an ephemeral port and returns its base url.
pub async fn spawn_app<T: SlotBackend>(
    backend: T,
    configuration: TestConfiguration,
) -> (JoinHandle<()>, String) {
    let identities = IdentityProvider::new(
        Arc::new(DemoAccountVerifier::default()),
        configuration.session_ttl(),
    );
    let app = create_app(backend, identities, &configuration);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address: SocketAddr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, format!("http://{address}"))
}

pub async fn read_from_slot_stream(stream: &mut WatchStream<Vec<TimeSlot>>) -> Vec<TimeSlot> {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("No slot update received")
        .expect("Slot stream closed")
}
