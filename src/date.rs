//! In-game calendar dates.
//!
//! Stellaris uses twelve 30-day months, so dates such as `2200.02.30` are valid
//! here even though they are not Gregorian.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::Error;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct GameDate {
    pub year: u16,
    /// In range `1..=12`
    pub month: u8,
    /// In range `1..=30`
    pub day: u8,
}

impl GameDate {
    pub const fn new(year: u16, month: u8, day: u8) -> Option<GameDate> {
        if !matches!(month, 1..=12) || !matches!(day, 1..=30) {
            return None;
        }
        Some(GameDate { year, month, day })
    }

    /// `YYYY-MM-DD`, as stored and published.
    pub fn to_iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    /// `YYYY-MM`, the month key used for snapshot dedup.
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Accepts the save format (`2311.11.18`, optionally quoted) and ISO (`2311-11-18`).
impl FromStr for GameDate {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim().trim_matches('"');
        let separator = if trimmed.contains('-') { '-' } else { '.' };
        let parts = trimmed.split(separator).collect::<Vec<&str>>();
        let [y, m, d] = parts.as_slice() else {
            return Err(Error::InvalidDate(text.to_string()));
        };
        let invalid = |_| Error::InvalidDate(text.to_string());
        let year = y.parse::<u16>().map_err(invalid)?;
        let month = m.parse::<u8>().map_err(invalid)?;
        let day = d.parse::<u8>().map_err(invalid)?;

        GameDate::new(year, month, day).ok_or_else(|| Error::InvalidDate(text.to_string()))
    }
}

impl Display for GameDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}.{:02}", self.year, self.month, self.day)
    }
}

impl Serialize for GameDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_save_format() {
        let date: GameDate = "2311.11.18".parse().unwrap();
        assert_eq!(date, GameDate::new(2311, 11, 18).unwrap());
        assert_eq!(date.to_iso(), "2311-11-18");
        assert_eq!(date.to_string(), "2311.11.18");
    }

    #[test]
    fn test_parse_quoted_and_iso() {
        let quoted: GameDate = "\"2200.02.30\"".parse().unwrap();
        let iso: GameDate = "2200-02-30".parse().unwrap();
        assert_eq!(quoted, iso);
    }

    #[test]
    fn test_rejects_invalid() {
        assert!("2200.13.01".parse::<GameDate>().is_err());
        assert!("2200.01.31".parse::<GameDate>().is_err());
        assert!("2200.01".parse::<GameDate>().is_err());
        assert!("soon".parse::<GameDate>().is_err());
    }

    #[test]
    fn test_month_key() {
        let a = GameDate::new(2250, 3, 1).unwrap();
        let b = GameDate::new(2250, 3, 30).unwrap();
        let c = GameDate::new(2251, 3, 1).unwrap();
        assert_eq!(a.month_key(), b.month_key());
        assert_ne!(a.month_key(), c.month_key());
        assert_eq!(b.month_key(), "2250-03");
    }
}
