//! Quality codes attached to every sample.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse quality of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Uncertain,
    Bad,
}

/// Quality code: severity plus the reason behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    #[default]
    Good,
    /// The sensor stopped updating; this is the last value it reported.
    UncertainLastUsableValue,
    UncertainSensorNotAccurate,
    /// No stored sample exists for the requested time.
    BadNoData,
    BadInvalidArgument,
    BadOutOfService,
    BadSensorFailure,
}

impl StatusCode {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Good => Severity::Good,
            Self::UncertainLastUsableValue | Self::UncertainSensorNotAccurate => Severity::Uncertain,
            Self::BadNoData | Self::BadInvalidArgument | Self::BadOutOfService | Self::BadSensorFailure => {
                Severity::Bad
            }
        }
    }

    #[must_use]
    pub const fn is_good(&self) -> bool {
        matches!(self.severity(), Severity::Good)
    }

    #[must_use]
    pub const fn is_uncertain(&self) -> bool {
        matches!(self.severity(), Severity::Uncertain)
    }

    #[must_use]
    pub const fn is_bad(&self) -> bool {
        matches!(self.severity(), Severity::Bad)
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::UncertainLastUsableValue => "Uncertain_LastUsableValue",
            Self::UncertainSensorNotAccurate => "Uncertain_SensorNotAccurate",
            Self::BadNoData => "Bad_NoData",
            Self::BadInvalidArgument => "Bad_InvalidArgument",
            Self::BadOutOfService => "Bad_OutOfService",
            Self::BadSensorFailure => "Bad_SensorFailure",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert!(StatusCode::Good.is_good());
        assert!(StatusCode::UncertainLastUsableValue.is_uncertain());
        assert!(StatusCode::BadNoData.is_bad());
        assert!(!StatusCode::BadNoData.is_good());
    }

    #[test]
    fn test_default_is_good() {
        assert_eq!(StatusCode::default(), StatusCode::Good);
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::BadNoData.to_string(), "Bad_NoData");
    }
}
