use crate::{
    backend::SlotBackend,
    error::BookingError,
    types::{Identity, SlotId, TimeSlot},
};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

type SlotMap = BTreeMap<SlotId, TimeSlot>;

/// In-process slot store. Every mutation runs inside one exclusive section,
/// so a slot can never end up with two bookings.
#[derive(Debug, Clone)]
pub struct LocalSlots {
    slots: Arc<Mutex<SlotMap>>,
    sender: Arc<Sender<Vec<TimeSlot>>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl Default for LocalSlots {
    fn default() -> Self {
        Self::from_slots(Self::fresh_slots(), None)
    }
}

impl LocalSlots {
    /// Store mirrored to a JSON file. An existing file is restored, a missing
    /// one is created.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, BookingError> {
        let path = path.into();
        let mut slots = Self::fresh_slots();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let stored: Vec<TimeSlot> = serde_json::from_str(&contents)?;
                Self::restore(&mut slots, stored);
                info!(path = %path.display(), "Restored slots from snapshot");
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No snapshot found, starting with empty schedule");
            }
            Err(err) => return Err(err.into()),
        }

        write_snapshot(&path, &slots.values().cloned().collect::<Vec<_>>())?;
        Ok(Self::from_slots(slots, Some(path)))
    }

    fn from_slots(slots: SlotMap, snapshot_path: Option<PathBuf>) -> Self {
        let (sender, _) = watch::channel(slots.values().cloned().collect());
        Self {
            slots: Arc::new(Mutex::new(slots)),
            sender: Arc::new(sender),
            snapshot_path: snapshot_path.map(Arc::new),
        }
    }

    fn fresh_slots() -> SlotMap {
        SlotId::all().map(|id| (id, TimeSlot::available(id))).collect()
    }

    fn restore(slots: &mut SlotMap, stored: Vec<TimeSlot>) {
        for slot in stored {
            if !slot.id.is_bookable() || !slot.is_consistent() {
                warn!(id = %slot.id, status = ?slot.status, "Dropping invalid snapshot entry");
                continue;
            }
            let restored = TimeSlot {
                display_time: slot.id.display_time(),
                ..slot
            };
            slots.insert(restored.id, restored);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotMap> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes the new state. Called with the lock held so subscribers and
    /// the snapshot file observe mutations in order.
    fn commit(&self, slots: &SlotMap) {
        let current: Vec<TimeSlot> = slots.values().cloned().collect();
        if let Some(path) = &self.snapshot_path {
            if let Err(err) = write_snapshot(path, &current) {
                error!(%err, path = %path.display(), "Failed to write slot snapshot");
            }
        }
        self.sender.send_replace(current);
    }
}

fn write_snapshot(path: &Path, slots: &[TimeSlot]) -> Result<(), BookingError> {
    let contents = serde_json::to_string_pretty(slots)?;
    fs::write(path, contents)?;
    Ok(())
}

impl SlotBackend for LocalSlots {
    fn slot_stream(&self) -> WatchStream<Vec<TimeSlot>> {
        WatchStream::new(self.sender.subscribe())
    }

    fn slots(&self) -> Vec<TimeSlot> {
        self.lock().values().cloned().collect()
    }

    fn book_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
        display_name: &str,
    ) -> Result<TimeSlot, BookingError> {
        let identity = identity.ok_or(BookingError::Unauthenticated)?;

        let mut slots = self.lock();
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(id.to_string()))?;
        if slot.is_booked() {
            return Err(BookingError::AlreadyBooked);
        }
        *slot = slot.booked(identity, display_name);
        let booked = slot.clone();
        self.commit(&slots);

        info!(slot = %id, user = %identity.id, "Slot booked");
        Ok(booked)
    }

    fn cancel_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
    ) -> Result<TimeSlot, BookingError> {
        let identity = identity.ok_or(BookingError::Unauthenticated)?;

        let mut slots = self.lock();
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| BookingError::NotFound(id.to_string()))?;
        if !slot.is_booked() {
            return Err(BookingError::NotBooked);
        }
        if !slot.is_booked_by(&identity.id) && !identity.is_admin {
            return Err(BookingError::Forbidden(
                "You can only cancel your own bookings".into(),
            ));
        }
        *slot = slot.released();
        let released = slot.clone();
        self.commit(&slots);

        info!(slot = %id, user = %identity.id, "Booking cancelled");
        Ok(released)
    }

    fn reset_all(&self) {
        let mut slots = self.lock();
        for slot in slots.values_mut() {
            *slot = slot.released();
        }
        self.commit(&slots);

        info!("All bookings reset");
    }
}
