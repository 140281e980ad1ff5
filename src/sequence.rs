use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::PressureConfig;
use crate::error::PressureError;
use crate::store::{PreviousStationRecord, RecordStore, WorkstationSequence};

/// Why a barcode was allowed to start its dwell here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clearance {
    /// This station has no predecessor.
    NotRequired { station: String },
    /// The previous station's dwell has fully elapsed on the store clock.
    Satisfied { elapsed: i64, required: i64 },
}

impl Clearance {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clearance::NotRequired { station } => {
                write!(f, "no verification needed: {station} is an initial station")
            }
            Clearance::Satisfied { elapsed, required } => write!(
                f,
                "dwell verified: elapsed {elapsed}s ≥ previous station dwell {required}s"
            ),
        }
    }
}

/// Decides whether a barcode may start at this station.
#[derive(Debug, Clone)]
pub struct SequenceValidator {
    sequence: WorkstationSequence,
}

impl SequenceValidator {
    pub fn new(sequence: WorkstationSequence) -> Self {
        Self { sequence }
    }

    pub fn sequence(&self) -> &WorkstationSequence {
        &self.sequence
    }

    /// Fails closed: any store error rejects the barcode.
    pub fn validate<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        barcode: &str,
    ) -> Result<Clearance, PressureError> {
        let Some(previous) = self.sequence.previous_station() else {
            return Ok(Clearance::NotRequired {
                station: self.sequence.current.clone(),
            });
        };

        let record = store.previous_station_record(barcode, previous)?.ok_or_else(|| {
            PressureError::MissingUpstreamRecord {
                barcode: barcode.to_string(),
                station: previous.to_string(),
            }
        })?;

        // "Now" comes from the store that recorded the previous event, never
        // from this host.
        let now = store.current_time()?;
        let verdict = check_dwell(now, &record);
        match &verdict {
            Ok(clearance) => info!(barcode, %clearance, "Sequence check passed"),
            Err(err) => warn!(barcode, error = %err, "Sequence check failed"),
        }
        verdict
    }
}

/// Boundary-inclusive: passes when exactly the required dwell has elapsed.
/// Compared at millisecond precision; reported in whole seconds, floored.
pub fn check_dwell(
    now: DateTime<Utc>,
    record: &PreviousStationRecord,
) -> Result<Clearance, PressureError> {
    let elapsed_ms = (now - record.recorded_at).num_milliseconds();
    let required = record.dwell_seconds;
    let elapsed = elapsed_ms.div_euclid(1000);
    if elapsed_ms >= required.saturating_mul(1000) {
        Ok(Clearance::Satisfied { elapsed, required })
    } else {
        Err(PressureError::DwellNotSatisfied { elapsed, required })
    }
}

/// Verifies this station against the store and derives its sequence.
///
/// Run once at startup; every error here is fatal to the process.
pub fn establish_sequence<S: RecordStore + ?Sized>(
    store: &S,
    config: &PressureConfig,
) -> Result<WorkstationSequence, PressureError> {
    config.validate()?;
    let station = config.station.trim();

    if !store.station_exists(station)? {
        let valid = store.valid_stations()?;
        let listing = if valid.is_empty() {
            "no stations configured".to_string()
        } else {
            valid.join(", ")
        };
        return Err(PressureError::ConfigurationInvalid(format!(
            "{station} is not a valid station (valid stations: {listing})"
        )));
    }

    let sequence = match config
        .previous_station
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        Some(previous) => WorkstationSequence::new(station, Some(previous.to_string())),
        None => store.workstation_sequence(station)?,
    };

    info!(
        %sequence,
        dwell_check = sequence.has_previous_station(),
        "Workstation sequence established"
    );
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeStore;
    use crate::store::StoreError;
    use chrono::{Duration, TimeZone};

    fn validator_with_previous() -> SequenceValidator {
        SequenceValidator::new(WorkstationSequence::new("P2", Some("P1".into())))
    }

    #[test]
    fn no_previous_station_always_passes() {
        let validator = SequenceValidator::new(WorkstationSequence::new("P1", None));
        let store = FakeStore::new().failing_queries();
        let clearance = validator.validate(&store, "LOT1").unwrap();
        assert_eq!(
            clearance,
            Clearance::NotRequired {
                station: "P1".into()
            }
        );
        assert!(clearance.reason().contains("no verification needed"));
    }

    #[test]
    fn missing_upstream_record_fails() {
        let store = FakeStore::new();
        let err = validator_with_previous().validate(&store, "LOT1").unwrap_err();
        assert!(matches!(
            err,
            PressureError::MissingUpstreamRecord { ref barcode, ref station }
                if barcode == "LOT1" && station == "P1"
        ));
    }

    #[test]
    fn one_second_short_fails_with_shortfall() {
        let store = FakeStore::new().with_previous(3600, 3599);
        let err = validator_with_previous().validate(&store, "LOT1").unwrap_err();
        assert_eq!(err.shortfall_seconds(), Some(1));
        assert!(err.to_string().contains("short by 1s"));
    }

    #[test]
    fn exact_dwell_passes() {
        let store = FakeStore::new().with_previous(3600, 3600);
        let clearance = validator_with_previous().validate(&store, "LOT1").unwrap();
        assert_eq!(
            clearance,
            Clearance::Satisfied {
                elapsed: 3600,
                required: 3600
            }
        );
    }

    #[test]
    fn other_barcodes_do_not_count() {
        let store = FakeStore::new().with_previous(60, 7200);
        let err = validator_with_previous().validate(&store, "LOT2").unwrap_err();
        assert!(matches!(err, PressureError::MissingUpstreamRecord { .. }));
    }

    #[test]
    fn store_errors_fail_closed() {
        let store = FakeStore::new().with_previous(60, 7200).failing_queries();
        let err = validator_with_previous().validate(&store, "LOT1").unwrap_err();
        assert!(matches!(err, PressureError::StoreUnavailable(StoreError::Worker(_))));
    }

    #[test]
    fn check_dwell_boundary_grid() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        for (dwell, ago, passes) in [(0, 0, true), (10, 9, false), (10, 10, true), (10, 11, true), (10, -5, false)] {
            let record = PreviousStationRecord {
                barcode: "LOT".into(),
                station: "P1".into(),
                dwell_seconds: dwell,
                recorded_at: now - Duration::seconds(ago),
            };
            assert_eq!(check_dwell(now, &record).is_ok(), passes, "dwell={dwell} ago={ago}");
        }
    }

    #[test]
    fn check_dwell_keeps_fractional_seconds() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let record = |dwell: i64, ago_ms: i64| PreviousStationRecord {
            barcode: "LOT".into(),
            station: "P1".into(),
            dwell_seconds: dwell,
            recorded_at: now - Duration::milliseconds(ago_ms),
        };

        // Stamped half a second in the future: not yet elapsed.
        let err = check_dwell(now, &record(0, -500)).unwrap_err();
        assert!(matches!(err, PressureError::DwellNotSatisfied { elapsed: -1, required: 0 }));

        let err = check_dwell(now, &record(10, 9_999)).unwrap_err();
        assert_eq!(err.shortfall_seconds(), Some(1));

        assert_eq!(
            check_dwell(now, &record(10, 10_500)).unwrap(),
            Clearance::Satisfied {
                elapsed: 10,
                required: 10
            }
        );
    }

    #[test]
    fn establish_uses_store_sequence() {
        let store = FakeStore::new();
        let config = PressureConfig {
            station: "P2".into(),
            ..Default::default()
        };
        let seq = establish_sequence(&store, &config).unwrap();
        assert_eq!(seq.previous_station(), Some("P1"));
    }

    #[test]
    fn establish_prefers_configured_previous() {
        let store = FakeStore::new();
        let config = PressureConfig {
            station: "P1".into(),
            previous_station: Some("P0".into()),
            ..Default::default()
        };
        let seq = establish_sequence(&store, &config).unwrap();
        assert_eq!(seq.to_string(), "P0 → P1");
    }

    #[test]
    fn establish_rejects_unknown_station() {
        let store = FakeStore::new();
        let config = PressureConfig {
            station: "P9".into(),
            ..Default::default()
        };
        let err = establish_sequence(&store, &config).unwrap_err();
        match err {
            PressureError::ConfigurationInvalid(msg) => assert!(msg.contains("P1, P2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn establish_is_fatal_when_store_is_down() {
        let store = FakeStore::new().failing_queries();
        let config = PressureConfig {
            station: "P1".into(),
            ..Default::default()
        };
        assert!(matches!(
            establish_sequence(&store, &config),
            Err(PressureError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn establish_requires_station_id() {
        let store = FakeStore::new();
        assert!(matches!(
            establish_sequence(&store, &PressureConfig::default()),
            Err(PressureError::ConfigurationInvalid(_))
        ));
    }
}
