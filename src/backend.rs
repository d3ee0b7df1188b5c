use crate::{
    error::BookingError,
    types::{Identity, SlotId, TimeSlot},
};
use tokio_stream::wrappers::WatchStream;

pub trait SlotBackend: Clone + Send + Sync + 'static {
    /// Yields the current slot list right away and again after every change.
    fn slot_stream(&self) -> WatchStream<Vec<TimeSlot>>;
    /// All slots, ascending by id.
    fn slots(&self) -> Vec<TimeSlot>;
    fn book_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
        display_name: &str,
    ) -> Result<TimeSlot, BookingError>;
    fn cancel_slot(
        &self,
        id: SlotId,
        identity: Option<&Identity>,
    ) -> Result<TimeSlot, BookingError>;
    fn reset_all(&self);

    fn slots_booked_by(&self, user_id: &str) -> Vec<TimeSlot> {
        self.slots()
            .into_iter()
            .filter(|slot| slot.is_booked_by(user_id))
            .collect()
    }
}
