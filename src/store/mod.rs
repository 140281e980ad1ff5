pub mod error;
pub mod sqlite;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use chrono::{DateTime, Utc};

pub use error::StoreError;
pub use sqlite::SqliteStore;
pub use types::{PreviousStationRecord, TimerRecord, WorkstationSequence, normalize_barcode};

/// The narrow interface to the external record store.
///
/// Every call is a synchronous point-in-time request; callers on the async
/// runtime move them onto a blocking thread.
pub trait RecordStore {
    /// Writes one start event for `station`.
    fn insert_record(&self, record: &TimerRecord, station: &str) -> Result<(), StoreError>;

    /// Latest event for `barcode` at `previous_station`, newest first.
    fn previous_station_record(
        &self,
        barcode: &str,
        previous_station: &str,
    ) -> Result<Option<PreviousStationRecord>, StoreError>;

    /// The store's own clock.
    fn current_time(&self) -> Result<DateTime<Utc>, StoreError>;

    fn station_exists(&self, station: &str) -> Result<bool, StoreError>;

    fn valid_stations(&self) -> Result<Vec<String>, StoreError>;

    /// Predecessor configuration for `station`; a station without a row is
    /// the first in its line.
    fn workstation_sequence(&self, station: &str) -> Result<WorkstationSequence, StoreError>;
}
