//! Canonical domain types persisted through the [`RecordStore`](crate::store::RecordStore).

mod inventory;
mod mac;
mod records;

pub use inventory::{Machine, Room, Switch};
pub use mac::MacAddress;
pub use records::{AccessSchedule, PortBinding, PortSnapshot};
