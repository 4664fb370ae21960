// =============================================================================
// Shared types used across the Nimbus signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// One of the five independent scoring axes fused into a composite signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Whale,
    Technical,
    Derivatives,
    Narrative,
    Market,
}

impl Dimension {
    /// All five dimensions, in fusion order.
    pub const ALL: [Dimension; 5] = [
        Self::Whale,
        Self::Technical,
        Self::Derivatives,
        Self::Narrative,
        Self::Market,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Whale => "whale",
            Self::Technical => "technical",
            Self::Derivatives => "derivatives",
            Self::Narrative => "narrative",
            Self::Market => "market",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directional read of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Neutral => write!(f, "neutral"),
            Self::Bearish => write!(f, "bearish"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullish" => Ok(Self::Bullish),
            "neutral" => Ok(Self::Neutral),
            "bearish" => Ok(Self::Bearish),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Trend of an asset's composite score relative to its previous value.
///
/// Absent entirely (not defaulted) on an asset's first fusion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Improving,
    Stable,
    Degrading,
}

impl std::fmt::Display for Momentum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Improving => write!(f, "improving"),
            Self::Stable => write!(f, "stable"),
            Self::Degrading => write!(f, "degrading"),
        }
    }
}

impl std::str::FromStr for Momentum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "improving" => Ok(Self::Improving),
            "stable" => Ok(Self::Stable),
            "degrading" => Ok(Self::Degrading),
            other => Err(format!("unknown momentum '{other}'")),
        }
    }
}

/// Elapsed-time window at which a snapshot's prediction is checked against
/// realized price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "24h")]
    H24,
    #[serde(rename = "48h")]
    H48,
    #[serde(rename = "7d")]
    D7,
}

impl Horizon {
    /// All evaluation horizons, shortest first.
    pub const ALL: [Horizon; 3] = [Self::H24, Self::H48, Self::D7];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::H24 => "24h",
            Self::H48 => "48h",
            Self::D7 => "7d",
        }
    }

    /// The horizon as a chrono duration.
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Self::H24 => chrono::Duration::hours(24),
            Self::H48 => chrono::Duration::hours(48),
            Self::D7 => chrono::Duration::days(7),
        }
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Self::H24),
            "48h" => Ok(Self::H48),
            "7d" => Ok(Self::D7),
            other => Err(format!("unknown horizon '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_roundtrip() {
        for dim in Dimension::ALL {
            let json = serde_json::to_string(&dim).unwrap();
            let back: Dimension = serde_json::from_str(&json).unwrap();
            assert_eq!(dim, back);
        }
    }

    #[test]
    fn horizon_durations_ordered() {
        assert!(Horizon::H24.duration() < Horizon::H48.duration());
        assert!(Horizon::H48.duration() < Horizon::D7.duration());
    }

    #[test]
    fn direction_parse() {
        assert_eq!("bullish".parse::<Direction>().unwrap(), Direction::Bullish);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn horizon_serde_names() {
        assert_eq!(serde_json::to_string(&Horizon::D7).unwrap(), "\"7d\"");
        let h: Horizon = serde_json::from_str("\"48h\"").unwrap();
        assert_eq!(h, Horizon::H48);
    }
}
