//! In-memory [`RecordStore`] for unit tests.

use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{PreviousStationRecord, RecordStore, StoreError, TimerRecord, WorkstationSequence};

pub struct FakeStore {
    pub now: Mutex<DateTime<Utc>>,
    pub previous: Mutex<Option<PreviousStationRecord>>,
    pub inserted: Mutex<Vec<(TimerRecord, String)>>,
    pub stations: Vec<(String, Option<String>)>,
    pub fail_queries: bool,
    pub fail_inserts: Mutex<u32>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()),
            previous: Mutex::new(None),
            inserted: Mutex::new(Vec::new()),
            stations: vec![("P1".into(), None), ("P2".into(), Some("P1".into()))],
            fail_queries: false,
            fail_inserts: Mutex::new(0),
        }
    }

    /// Previous-station event that happened `ago` seconds before the store's now.
    pub fn with_previous(self, dwell_seconds: i64, ago: i64) -> Self {
        let recorded_at = *self.now.lock().unwrap() - Duration::seconds(ago);
        *self.previous.lock().unwrap() = Some(PreviousStationRecord {
            barcode: "LOT1".into(),
            station: "P1".into(),
            dwell_seconds,
            recorded_at,
        });
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// The next `n` inserts fail.
    pub fn failing_inserts(self, n: u32) -> Self {
        *self.fail_inserts.lock().unwrap() = n;
        self
    }

    pub fn inserted(&self) -> Vec<(TimerRecord, String)> {
        self.inserted.lock().unwrap().clone()
    }

    fn query_guard(&self) -> Result<(), StoreError> {
        if self.fail_queries {
            Err(StoreError::Worker("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FakeStore {
    fn insert_record(&self, record: &TimerRecord, station: &str) -> Result<(), StoreError> {
        let mut fail = self.fail_inserts.lock().unwrap();
        if *fail > 0 {
            *fail -= 1;
            return Err(StoreError::NotInserted);
        }
        self.inserted
            .lock()
            .unwrap()
            .push((record.clone(), station.to_string()));
        Ok(())
    }

    fn previous_station_record(
        &self,
        barcode: &str,
        previous_station: &str,
    ) -> Result<Option<PreviousStationRecord>, StoreError> {
        self.query_guard()?;
        Ok(self
            .previous
            .lock()
            .unwrap()
            .clone()
            .filter(|r| r.barcode == barcode && r.station == previous_station))
    }

    fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        self.query_guard()?;
        Ok(*self.now.lock().unwrap())
    }

    fn station_exists(&self, station: &str) -> Result<bool, StoreError> {
        self.query_guard()?;
        Ok(self.stations.iter().any(|(s, _)| s == station))
    }

    fn valid_stations(&self) -> Result<Vec<String>, StoreError> {
        self.query_guard()?;
        Ok(self.stations.iter().map(|(s, _)| s.clone()).collect())
    }

    fn workstation_sequence(&self, station: &str) -> Result<WorkstationSequence, StoreError> {
        self.query_guard()?;
        let previous = self
            .stations
            .iter()
            .find(|(s, _)| s == station)
            .and_then(|(_, p)| p.clone());
        Ok(WorkstationSequence::new(station, previous))
    }
}
