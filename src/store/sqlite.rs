//! SQLite-backed record store.
//!
//! Every row's `recorded_at` is stamped by SQLite itself and
//! [`current_time`](RecordStore::current_time) reads the same clock, so the
//! dwell arithmetic never depends on the workstation's local clock.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::{PreviousStationRecord, RecordStore, StoreError, TimerRecord, WorkstationSequence};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS timer_records (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        barcode          TEXT NOT NULL,
        slot_code        TEXT NOT NULL,
        second_slot_code TEXT,
        station          TEXT NOT NULL,
        event_name       TEXT NOT NULL DEFAULT 'PRESSURE',
        duration_seconds INTEGER NOT NULL,
        started_at       TEXT NOT NULL,
        input_mode       TEXT NOT NULL,
        recorded_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    );
    CREATE INDEX IF NOT EXISTS idx_timer_records_lookup
        ON timer_records (barcode, station, recorded_at);
    CREATE TABLE IF NOT EXISTS stations (
        name             TEXT PRIMARY KEY,
        previous_station TEXT,
        description      TEXT
    );
";

const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Adds or updates a station and its predecessor.
    pub fn register_station(
        &self,
        name: &str,
        previous: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT INTO stations (name, previous_station, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                 previous_station = excluded.previous_station,
                 description = excluded.description",
            params![name, previous, description],
        )?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for SqliteStore {
    fn insert_record(&self, record: &TimerRecord, station: &str) -> Result<(), StoreError> {
        let rows = self.lock().execute(
            "INSERT INTO timer_records
                 (barcode, slot_code, second_slot_code, station, duration_seconds, started_at, input_mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.barcode,
                record.first_code,
                record.second_code,
                station,
                record.duration_seconds,
                record.started_at.format("%Y/%m/%d %H:%M:%S").to_string(),
                record.input_mode.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(StoreError::NotInserted);
        }
        debug!(barcode = %record.barcode, codes = %record.codes(), station, "Record inserted");
        Ok(())
    }

    fn previous_station_record(
        &self,
        barcode: &str,
        previous_station: &str,
    ) -> Result<Option<PreviousStationRecord>, StoreError> {
        let row: Option<(String, String, i64, String)> = self
            .lock()
            .query_row(
                "SELECT barcode, station, duration_seconds, recorded_at
                 FROM timer_records
                 WHERE barcode = ?1 AND station = ?2
                 ORDER BY recorded_at DESC, id DESC
                 LIMIT 1",
                params![barcode, previous_station],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        row.map(|(barcode, station, dwell_seconds, recorded_at)| {
            Ok(PreviousStationRecord {
                barcode,
                station,
                dwell_seconds,
                recorded_at: parse_store_time(&recorded_at)?,
            })
        })
        .transpose()
    }

    fn current_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let now: String = self.lock().query_row(
            "SELECT strftime('%Y-%m-%d %H:%M:%f', 'now')",
            [],
            |row| row.get(0),
        )?;
        parse_store_time(&now)
    }

    fn station_exists(&self, station: &str) -> Result<bool, StoreError> {
        let count: i64 = self.lock().query_row(
            "SELECT COUNT(*) FROM stations WHERE name = ?1",
            params![station],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn valid_stations(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT name FROM stations ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn workstation_sequence(&self, station: &str) -> Result<WorkstationSequence, StoreError> {
        let previous: Option<Option<String>> = self
            .lock()
            .query_row(
                "SELECT previous_station FROM stations WHERE name = ?1",
                params![station],
                |row| row.get(0),
            )
            .optional()?;
        Ok(WorkstationSequence::new(station, previous.flatten()))
    }
}

fn parse_store_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw.trim(), STORE_TIME_FORMAT)
        .map(|t| t.and_utc())
        .map_err(|_| StoreError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InputMode;
    use chrono::Duration;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn record(barcode: &str, code: &str, second: Option<&str>, secs: u32) -> TimerRecord {
        let mode = if second.is_some() {
            InputMode::TripleInput
        } else {
            InputMode::DoubleInput
        };
        TimerRecord::new(barcode, code, second.map(String::from), secs, mode)
    }

    fn backdate_all(store: &SqliteStore, seconds: i64) {
        store
            .lock()
            .execute(
                "UPDATE timer_records SET recorded_at =
                     strftime('%Y-%m-%d %H:%M:%f', recorded_at, ?1)",
                params![format!("-{seconds} seconds")],
            )
            .unwrap();
    }

    #[test]
    fn missing_record_is_none() {
        let store = store();
        assert!(store.previous_station_record("LOT1", "P1").unwrap().is_none());
    }

    #[test]
    fn latest_record_wins() {
        let store = store();
        store.insert_record(&record("LOT1", "A-01", None, 600), "P1").unwrap();
        backdate_all(&store, 100);
        store.insert_record(&record("LOT1", "A-02", None, 1200), "P1").unwrap();
        store.insert_record(&record("LOT1", "A-03", None, 30), "P2").unwrap();
        store.insert_record(&record("LOT2", "A-04", None, 30), "P1").unwrap();

        let prev = store.previous_station_record("LOT1", "P1").unwrap().unwrap();
        assert_eq!(prev.barcode, "LOT1");
        assert_eq!(prev.station, "P1");
        assert_eq!(prev.dwell_seconds, 1200);
    }

    #[test]
    fn recorded_time_uses_store_clock() {
        let store = store();
        store.insert_record(&record("LOT1", "A-01", None, 60), "P1").unwrap();
        backdate_all(&store, 3600);

        let prev = store.previous_station_record("LOT1", "P1").unwrap().unwrap();
        let now = store.current_time().unwrap();
        let elapsed = now - prev.recorded_at;
        assert!(elapsed >= Duration::seconds(3599) && elapsed <= Duration::seconds(3605));
    }

    #[test]
    fn combined_record_keeps_both_codes() {
        let store = store();
        store
            .insert_record(&record("LOT9", "C-01", Some("C-02"), 90), "P1")
            .unwrap();
        let (first, second, mode): (String, Option<String>, String) = store
            .lock()
            .query_row(
                "SELECT slot_code, second_slot_code, input_mode FROM timer_records",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(first, "C-01");
        assert_eq!(second.as_deref(), Some("C-02"));
        assert_eq!(mode, "TripleInput");
    }

    #[test]
    fn stations_and_sequence() {
        let store = store();
        store.register_station("P2", Some("P1"), Some("second press")).unwrap();
        store.register_station("P1", None, None).unwrap();

        assert!(store.station_exists("P1").unwrap());
        assert!(!store.station_exists("P9").unwrap());
        assert_eq!(store.valid_stations().unwrap(), vec!["P1", "P2"]);

        let seq = store.workstation_sequence("P2").unwrap();
        assert_eq!(seq.previous_station(), Some("P1"));
        assert!(!store.workstation_sequence("P1").unwrap().has_previous_station());
        assert!(!store.workstation_sequence("P9").unwrap().has_previous_station());

        store.register_station("P2", None, None).unwrap();
        assert!(!store.workstation_sequence("P2").unwrap().has_previous_station());
    }

    #[test]
    fn reopens_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pressure.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_record(&record("LOT1", "A-01", None, 60), "P1").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.previous_station_record("LOT1", "P1").unwrap().is_some());
    }

    #[test]
    fn parses_store_timestamps() {
        let t = parse_store_time("2026-10-14 08:30:00.250").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-10-14T08:30:00.250+00:00");
        assert!(parse_store_time("14/10/2026").is_err());
    }
}
