//! Market codelists used on readings, master data and published results.
//!
//! Every enum serializes to its market code (`"E17"`, `"56"`, ...) so tables
//! written by the publisher stay compatible with downstream message builders.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::SettleError;

/// Declares a codelist enum with code-based serde, `Display` and `FromStr`.
macro_rules! codelist {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            pub fn code(&self) -> &'static str {
                match self {
                    $( $name::$variant => $code, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = SettleError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $code => Ok($name::$variant), )+
                    other => Err(SettleError::Parse(format!(
                        "unknown {} code '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

codelist! {
    /// Data quality of a reading or an aggregated quantity.
    Quality {
        /// Measured value.
        AsRead => "E01",
        Estimated => "56",
        QuantityMissing => "QM",
    }
}

codelist! {
    /// Market evaluation point type.
    PointType {
        Consumption => "E17",
        Production => "E18",
        Exchange => "E20",
    }
}

codelist! {
    SettlementMethod {
        Flex => "D01",
        Profiled => "E01",
        NonProfiled => "E02",
    }
}

codelist! {
    /// Physical connection state of a metering point.
    ConnectionState {
        /// Created but not yet connected.
        New => "D03",
        Connected => "E22",
        Disconnected => "E23",
        ClosedDown => "D02",
    }
}

codelist! {
    /// Settlement process a run belongs to; sent to the coordinator with every result.
    ProcessType {
        Aggregation => "D03",
        BalanceFixing => "D04",
        WholesaleFixing => "D05",
        CorrectionSettlement => "D32",
    }
}

codelist! {
    /// Time resolution of aggregated results.
    Resolution {
        Quarterly => "PT15M",
        Hourly => "PT1H",
    }
}

impl Resolution {
    pub fn duration(&self) -> Duration {
        match self {
            Resolution::Quarterly => Duration::minutes(15),
            Resolution::Hourly => Duration::hours(1),
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Hourly
    }
}

impl Default for ProcessType {
    fn default() -> Self {
        ProcessType::Aggregation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_str() {
        for quality in Quality::ALL {
            assert_eq!(quality.code().parse::<Quality>().unwrap(), *quality);
        }
        for state in ConnectionState::ALL {
            assert_eq!(state.to_string().parse::<ConnectionState>().unwrap(), *state);
        }
    }

    #[test]
    fn unknown_code_is_a_parse_error() {
        let err = "E99".parse::<PointType>().unwrap_err();
        assert!(matches!(err, SettleError::Parse(_)));
        assert!(err.to_string().contains("PointType"));
    }

    #[test]
    fn serde_uses_market_codes() {
        let json = serde_json::to_string(&PointType::Production).unwrap();
        assert_eq!(json, "\"E18\"");
        let method: SettlementMethod = serde_json::from_str("\"D01\"").unwrap();
        assert_eq!(method, SettlementMethod::Flex);
    }

    #[test]
    fn resolution_widths() {
        assert_eq!(Resolution::Hourly.duration(), Duration::hours(1));
        assert_eq!(Resolution::Quarterly.duration(), Duration::minutes(15));
    }
}
