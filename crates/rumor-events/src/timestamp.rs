//! Simulation Clock Values
//!
//! Every rumor, variant, and spread record is stamped with a [`SimTimestamp`]:
//! a monotonic tick plus the calendar date that tick falls on.
//!
//! # Example
//!
//! ```
//! use rumor_events::{SimTimestamp, Season};
//!
//! let ts = SimTimestamp::at(3_250);
//! assert_eq!(ts.tick, 3_250);
//! assert_eq!(ts.date.season, Season::Summer);
//! assert_eq!(ts.date.to_string(), "year_1.summer.day_3");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of days in each season.
pub const DAYS_PER_SEASON: u8 = 30;

/// Number of ticks per simulated day.
pub const TICKS_PER_DAY: u64 = 100;

const SEASONS_PER_YEAR: u64 = 4;
const DAYS_PER_YEAR: u64 = DAYS_PER_SEASON as u64 * SEASONS_PER_YEAR;

/// Season of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Season for a zero-based index within the year (wraps).
    pub fn from_index(index: u64) -> Self {
        match index % SEASONS_PER_YEAR {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    /// Zero-based position of this season within the year.
    pub fn index(self) -> u64 {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Autumn => 2,
            Season::Winter => 3,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Spring => write!(f, "spring"),
            Season::Summer => write!(f, "summer"),
            Season::Autumn => write!(f, "autumn"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

impl FromStr for Season {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            _ => Err(ParseDateError::InvalidSeason(s.to_string())),
        }
    }
}

/// Calendar date of a tick.
///
/// Serializes to strings like "year_3.winter.day_12".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimDate {
    pub year: u32,
    pub season: Season,
    pub day: u8,
}

impl SimDate {
    pub fn new(year: u32, season: Season, day: u8) -> Self {
        Self { year, season, day }
    }

    /// Date on which the given tick falls. Tick 0 is year 1, spring, day 1.
    pub fn from_tick(tick: u64) -> Self {
        let day_index = tick / TICKS_PER_DAY;
        let year = 1 + day_index / DAYS_PER_YEAR;
        let day_of_year = day_index % DAYS_PER_YEAR;
        let season = Season::from_index(day_of_year / DAYS_PER_SEASON as u64);
        let day = (day_of_year % DAYS_PER_SEASON as u64) as u8 + 1;
        Self {
            year: u32::try_from(year).unwrap_or(u32::MAX),
            season,
            day,
        }
    }

    /// First tick of this date.
    pub fn first_tick(&self) -> u64 {
        let years = u64::from(self.year.saturating_sub(1));
        let days = years * DAYS_PER_YEAR
            + self.season.index() * DAYS_PER_SEASON as u64
            + u64::from(self.day.saturating_sub(1));
        days * TICKS_PER_DAY
    }
}

impl fmt::Display for SimDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year_{}.{}.day_{}", self.year, self.season, self.day)
    }
}

/// Error type for parsing SimDate from strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseDateError {
    InvalidFormat(String),
    InvalidYear(String),
    InvalidSeason(String),
    InvalidDay(String),
}

impl fmt::Display for ParseDateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDateError::InvalidFormat(s) => {
                write!(f, "invalid date format: '{}', expected 'year_N.season.day_M'", s)
            }
            ParseDateError::InvalidYear(s) => write!(f, "invalid year: '{}'", s),
            ParseDateError::InvalidSeason(s) => write!(f, "invalid season: '{}'", s),
            ParseDateError::InvalidDay(s) => write!(f, "invalid day: '{}'", s),
        }
    }
}

impl std::error::Error for ParseDateError {}

impl FromStr for SimDate {
    type Err = ParseDateError;

    /// Parses a SimDate from a string like "year_3.winter.day_12".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(year_part), Some(season_part), Some(day_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseDateError::InvalidFormat(s.to_string()));
        };

        let year = year_part
            .strip_prefix("year_")
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| ParseDateError::InvalidYear(year_part.to_string()))?;

        let season = season_part.parse::<Season>()?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?
            .parse::<u8>()
            .map_err(|_| ParseDateError::InvalidDay(day_part.to_string()))?;
        if day == 0 || day > DAYS_PER_SEASON {
            return Err(ParseDateError::InvalidDay(day_part.to_string()));
        }

        Ok(SimDate { year, season, day })
    }
}

impl Serialize for SimDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A point in simulation time.
///
/// Ordering only looks at the tick; the date is a readable projection of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTimestamp {
    /// Monotonically increasing simulation tick.
    pub tick: u64,
    /// Human-readable date.
    pub date: SimDate,
}

impl SimTimestamp {
    /// Timestamp for a tick, with the date derived from it.
    pub fn at(tick: u64) -> Self {
        Self {
            tick,
            date: SimDate::from_tick(tick),
        }
    }

    /// Timestamp for the start of the simulation.
    pub fn start() -> Self {
        Self::at(0)
    }

    /// Ticks elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn ticks_since(&self, earlier: &SimTimestamp) -> u64 {
        self.tick.saturating_sub(earlier.tick)
    }

    /// True if the stored date matches the one derived from the tick.
    pub fn is_consistent(&self) -> bool {
        self.date == SimDate::from_tick(self.tick)
    }
}

impl Default for SimTimestamp {
    fn default() -> Self {
        Self::start()
    }
}

impl PartialOrd for SimTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tick.cmp(&other.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_parse() {
        assert_eq!("spring".parse::<Season>().unwrap(), Season::Spring);
        assert_eq!("Summer".parse::<Season>().unwrap(), Season::Summer);
        assert_eq!("WINTER".parse::<Season>().unwrap(), Season::Winter);
        assert!("monsoon".parse::<Season>().is_err());
    }

    #[test]
    fn test_date_from_tick() {
        assert_eq!(SimDate::from_tick(0), SimDate::new(1, Season::Spring, 1));
        assert_eq!(SimDate::from_tick(99), SimDate::new(1, Season::Spring, 1));
        assert_eq!(SimDate::from_tick(100), SimDate::new(1, Season::Spring, 2));
        assert_eq!(SimDate::from_tick(3_000), SimDate::new(1, Season::Summer, 1));
        assert_eq!(SimDate::from_tick(11_999), SimDate::new(1, Season::Winter, 30));
        assert_eq!(SimDate::from_tick(12_000), SimDate::new(2, Season::Spring, 1));
    }

    #[test]
    fn test_first_tick_inverts_from_tick() {
        for tick in [0, 100, 2_900, 3_000, 11_900, 12_000, 84_700] {
            let date = SimDate::from_tick(tick);
            assert_eq!(date.first_tick(), tick);
        }
    }

    #[test]
    fn test_sim_date_parse() {
        let date: SimDate = "year_3.winter.day_12".parse().unwrap();
        assert_eq!(date, SimDate::new(3, Season::Winter, 12));
    }

    #[test]
    fn test_parse_date_error() {
        assert!("invalid".parse::<SimDate>().is_err());
        assert!("year_one.spring.day_1".parse::<SimDate>().is_err());
        assert!("year_1.invalid.day_1".parse::<SimDate>().is_err());
        assert!("year_1.spring.day_one".parse::<SimDate>().is_err());
        assert!("year_1.spring.day_0".parse::<SimDate>().is_err());
        assert!("year_1.spring.day_31".parse::<SimDate>().is_err());
        assert!("year_1.spring.day_1.extra".parse::<SimDate>().is_err());
    }

    #[test]
    fn test_timestamp_ordering_uses_tick() {
        let early = SimTimestamp::at(10);
        let late = SimTimestamp::at(250);
        assert!(early < late);
        assert_eq!(late.ticks_since(&early), 240);
        assert_eq!(early.ticks_since(&late), 0);
    }

    #[test]
    fn test_timestamp_serialization() {
        let ts = SimTimestamp::at(84_729);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#"{"tick":84729,"date":"year_8.spring.day_8"}"#);

        let parsed: SimTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ts);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn test_inconsistent_timestamp_detected() {
        let json = r#"{"tick":0,"date":"year_4.autumn.day_2"}"#;
        let ts: SimTimestamp = serde_json::from_str(json).unwrap();
        assert!(!ts.is_consistent());
    }
}
