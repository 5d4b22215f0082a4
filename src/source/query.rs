use crate::error::{ElspotError, Result};
use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Dynamic date anchors understood by the dataset API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateAnchor {
    Now,
    UtcNow,
    StartOfDay,
    StartOfMonth,
    StartOfYear,
}

impl DateAnchor {
    const ALL: [Self; 5] = [
        Self::Now,
        Self::UtcNow,
        Self::StartOfDay,
        Self::StartOfMonth,
        Self::StartOfYear,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Now => "Now",
            Self::UtcNow => "UtcNow",
            Self::StartOfDay => "StartOfDay",
            Self::StartOfMonth => "StartOfMonth",
            Self::StartOfYear => "StartOfYear",
        }
    }
}

/// Signed offset from a dynamic anchor, kept in the unit it was given in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOffset {
    Days(i64),
    Hours(i64),
    Minutes(i64),
}

impl DateOffset {
    pub const fn amount(self) -> i64 {
        match self {
            Self::Days(n) | Self::Hours(n) | Self::Minutes(n) => n,
        }
    }

    const fn with_amount(self, amount: i64) -> Self {
        match self {
            Self::Days(_) => Self::Days(amount),
            Self::Hours(_) => Self::Hours(amount),
            Self::Minutes(_) => Self::Minutes(amount),
        }
    }

    /// Offset as a time span; `None` on overflow
    pub fn to_delta(self) -> Option<TimeDelta> {
        match self {
            Self::Days(n) => TimeDelta::try_days(n),
            Self::Hours(n) => TimeDelta::try_hours(n),
            Self::Minutes(n) => TimeDelta::try_minutes(n),
        }
    }

    /// ISO-8601 duration of the magnitude, e.g. `P1D` or `PT24H`
    fn iso_magnitude(self) -> String {
        let n = self.amount().unsigned_abs();
        match self {
            Self::Days(_) => format!("P{}D", n),
            Self::Hours(_) => format!("PT{}H", n),
            Self::Minutes(_) => format!("PT{}M", n),
        }
    }

    /// Parse an unsigned ISO-8601 duration of days, hours or minutes
    fn parse_magnitude(value: &str) -> Option<Self> {
        let (digits, unit) = if let Some(rest) = value.strip_prefix("PT") {
            if let Some(n) = rest.strip_suffix('H') {
                (n, Self::Hours(0))
            } else {
                (rest.strip_suffix('M')?, Self::Minutes(0))
            }
        } else {
            (value.strip_prefix('P')?.strip_suffix('D')?, Self::Days(0))
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let offset = unit.with_amount(digits.parse().ok()?);
        offset.to_delta().map(|_| offset)
    }
}

/// Value of a `start` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DateQueryParameter {
    /// Parameter omitted
    #[default]
    Empty,
    Date(NaiveDate),
    Dynamic {
        anchor: DateAnchor,
        offset: Option<DateOffset>,
    },
}

impl DateQueryParameter {
    pub const fn anchor(anchor: DateAnchor) -> Self {
        Self::Dynamic {
            anchor,
            offset: None,
        }
    }

    pub const fn with_offset(anchor: DateAnchor, offset: DateOffset) -> Self {
        Self::Dynamic {
            anchor,
            offset: Some(offset),
        }
    }

    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for DateQueryParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Dynamic { anchor, offset } => {
                f.write_str(anchor.as_str())?;
                match offset {
                    Some(o) if o.amount() < 0 => write!(f, "-{}", o.iso_magnitude()),
                    Some(o) if o.amount() > 0 => write!(f, "+{}", o.iso_magnitude()),
                    _ => Ok(()),
                }
            }
        }
    }
}

impl FromStr for DateQueryParameter {
    type Err = ElspotError;

    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        if value.is_empty() {
            return Ok(Self::Empty);
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(Self::Date(date));
        }

        let invalid = || ElspotError::validation("start", format!("Invalid date parameter '{}'", s));
        let (name, offset) = match value.find(['+', '-']) {
            Some(i) => {
                let (name, rest) = value.split_at(i);
                let magnitude = DateOffset::parse_magnitude(&rest[1..]).ok_or_else(invalid)?;
                let signed = if rest.starts_with('-') {
                    magnitude.with_amount(-magnitude.amount())
                } else {
                    magnitude
                };
                (name, Some(signed))
            }
            None => (value, None),
        };
        let anchor = DateAnchor::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(invalid)?;
        Ok(Self::Dynamic { anchor, offset })
    }
}

impl Serialize for DateQueryParameter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DateQueryParameter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}
