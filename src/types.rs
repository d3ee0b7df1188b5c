use crate::error::BookingError;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::{fmt, ops::RangeInclusive, str::FromStr};
use uuid::Uuid;

/// Hours of the business day that can be booked. One slot per hour.
pub const BUSINESS_HOURS: RangeInclusive<u8> = 10..=17;

/// Slot identifier: the hour the slot starts at. Travels as a string ("12").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SlotId(u8);

impl SlotId {
    pub fn new(hour: u8) -> Self {
        Self(hour)
    }

    pub fn hour(&self) -> u8 {
        self.0
    }

    pub fn is_bookable(&self) -> bool {
        BUSINESS_HOURS.contains(&self.0)
    }

    pub fn all() -> impl Iterator<Item = SlotId> {
        BUSINESS_HOURS.map(SlotId)
    }

    pub fn display_time(&self) -> String {
        match NaiveTime::from_hms_opt(u32::from(self.0), 0, 0) {
            Some(time) => time.format("%-I:%M %p").to_string(),
            None => format!("{}:00", self.0),
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SlotId {
    type Err = BookingError;

    /// Only the canonical form is an id: "12" parses, "012" or "+12" do not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>().map(SlotId) {
            Ok(id) if id.to_string() == s => Ok(id),
            _ => Err(BookingError::NotFound(s.to_string())),
        }
    }
}

impl From<SlotId> for String {
    fn from(id: SlotId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SlotId {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

impl FromStr for SlotStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(SlotStatus::Available),
            "booked" => Ok(SlotStatus::Booked),
            other => Err(BookingError::Validation(format!(
                "Unknown slot status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: SlotId,
    pub display_time: String,
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_by_name: Option<String>,
}

impl TimeSlot {
    pub fn available(id: SlotId) -> Self {
        Self {
            id,
            display_time: id.display_time(),
            status: SlotStatus::Available,
            booked_by_user_id: None,
            booked_by_name: None,
        }
    }

    /// Booked copy of this slot. A blank `display_name` falls back to the
    /// identity's own name.
    pub fn booked(&self, identity: &Identity, display_name: &str) -> Self {
        let display_name = match display_name.trim() {
            "" => identity.name.clone(),
            name => name.to_string(),
        };
        Self {
            status: SlotStatus::Booked,
            booked_by_user_id: Some(identity.id.clone()),
            booked_by_name: Some(display_name),
            ..Self::available(self.id)
        }
    }

    pub fn released(&self) -> Self {
        Self::available(self.id)
    }

    pub fn is_booked(&self) -> bool {
        self.status == SlotStatus::Booked
    }

    pub fn is_booked_by(&self, user_id: &str) -> bool {
        self.is_booked() && self.booked_by_user_id.as_deref() == Some(user_id)
    }

    /// Booker fields are present exactly when the slot is booked.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            SlotStatus::Available => {
                self.booked_by_user_id.is_none() && self.booked_by_name.is_none()
            }
            SlotStatus::Booked => {
                self.booked_by_user_id.is_some() && self.booked_by_name.is_some()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Uuid,
    pub identity: Identity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    pub total: usize,
    pub booked: usize,
    pub available: usize,
}

impl SlotSummary {
    pub fn from_slots(slots: &[TimeSlot]) -> Self {
        let booked = slots.iter().filter(|slot| slot.is_booked()).count();
        Self {
            total: slots.len(),
            booked,
            available: slots.len() - booked,
        }
    }
}
