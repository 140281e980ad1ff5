use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PressureError {
    #[error("Invalid timer code: {0}")]
    InvalidCode(String),

    #[error("Missing input: enter a {0} first")]
    MissingInput(String),

    #[error("Barcode {barcode} has no record at previous station {station}")]
    MissingUpstreamRecord { barcode: String, station: String },

    #[error(
        "Dwell time not satisfied: elapsed {elapsed}s < required {required}s at previous station (short by {}s)",
        dwell_shortfall(.required, .elapsed)
    )]
    DwellNotSatisfied { elapsed: i64, required: i64 },

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigurationInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PressureError {
    /// Operator-recoverable errors reset the input session; the rest are
    /// fatal at startup or surface as warnings during steady state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PressureError::InvalidCode(_)
                | PressureError::MissingInput(_)
                | PressureError::MissingUpstreamRecord { .. }
                | PressureError::DwellNotSatisfied { .. }
        )
    }

    /// Seconds still missing before a barcode may proceed, if that is why it was rejected.
    pub fn shortfall_seconds(&self) -> Option<i64> {
        match self {
            PressureError::DwellNotSatisfied { elapsed, required } => {
                Some(dwell_shortfall(required, elapsed))
            }
            _ => None,
        }
    }
}

fn dwell_shortfall(required: &i64, elapsed: &i64) -> i64 {
    required.saturating_sub(*elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dwell_message_reports_shortfall() {
        let err = PressureError::DwellNotSatisfied {
            elapsed: 3599,
            required: 3600,
        };
        assert_eq!(
            err.to_string(),
            "Dwell time not satisfied: elapsed 3599s < required 3600s at previous station (short by 1s)"
        );
        assert_eq!(err.shortfall_seconds(), Some(1));
    }

    #[test]
    fn extreme_dwell_values_saturate() {
        let err = PressureError::DwellNotSatisfied {
            elapsed: i64::MIN,
            required: i64::MAX,
        };
        assert_eq!(err.shortfall_seconds(), Some(i64::MAX));
        assert!(err.to_string().contains(&format!("short by {}s", i64::MAX)));
    }

    #[test]
    fn recoverable_classification() {
        assert!(PressureError::InvalidCode("A-99".into()).is_recoverable());
        assert!(
            PressureError::MissingUpstreamRecord {
                barcode: "LOT1".into(),
                station: "P1".into(),
            }
            .is_recoverable()
        );
        assert!(!PressureError::ConfigurationInvalid("no station".into()).is_recoverable());
        assert!(!PressureError::StoreUnavailable(StoreError::NotInserted).is_recoverable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PressureError>();
    }
}
