use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::prelude::*;

const SECONDS_PER_DAY: u32 = 86_400;

/// Calendar date range in which a price component applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidPeriod {
    #[serde(alias = "from_including", alias = "from")]
    pub from_including: NaiveDate,

    /// Exclusive end date, open-ended when absent.
    #[serde(default, alias = "to_excluding", alias = "to", skip_serializing_if = "Option::is_none")]
    pub to_excluding: Option<NaiveDate>,
}

impl ValidPeriod {
    #[must_use]
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let date = at.date();
        self.from_including <= date
            && self.to_excluding.is_none_or(|to_excluding| date < to_excluding)
    }
}

/// Set of daily time windows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, alias = "active_periods")]
    pub active_periods: Vec<ActivePeriod>,
}

impl RecurringPeriod {
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.active_periods.iter().any(|period| period.contains(time))
    }
}

/// Daily window `[from, to)`, wrapping past midnight when `to <= from`.
///
/// Equal ends cover the whole day.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePeriod {
    #[serde(alias = "from_including", alias = "from")]
    pub from_including: TimeOfDay,

    #[serde(alias = "to_excluding", alias = "to")]
    pub to_excluding: TimeOfDay,
}

impl ActivePeriod {
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        let time = TimeOfDay::from(time);
        if self.from_including < self.to_excluding {
            self.from_including <= time && time < self.to_excluding
        } else {
            time >= self.from_including || time < self.to_excluding
        }
    }
}

/// Seconds since midnight, `24:00:00` included so that a window may end at the end of the day.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(SECONDS_PER_DAY);

    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Result<Self> {
        let is_past_end = hours == 24 && (minutes, seconds) != (0, 0);
        if minutes >= 60 || seconds >= 60 || hours > 24 || is_past_end {
            return Err(Error::MalformedTimeOfDay(format!("{hours:02}:{minutes:02}:{seconds:02}")));
        }
        Ok(Self(hours * 3600 + minutes * 60 + seconds))
    }

    #[must_use]
    pub const fn seconds_from_midnight(self) -> u32 {
        self.0
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self(time.num_seconds_from_midnight())
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let malformed = || Error::MalformedTimeOfDay(text.to_owned());
        let parts = text
            .trim()
            .split(':')
            .map(|part| {
                let is_digits = part.bytes().all(|byte| byte.is_ascii_digit());
                if part.is_empty() || part.len() > 2 || !is_digits {
                    return None;
                }
                part.parse::<u32>().ok()
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(malformed)?;
        match parts[..] {
            [hours, minutes] => Self::from_hms(hours, minutes, 0),
            [hours, minutes, seconds] => Self::from_hms(hours, minutes, seconds),
            _ => Err(malformed()),
        }
        .map_err(|_| malformed())
    }
}

impl Display for TimeOfDay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.0 / 3600, self.0 % 3600 / 60, self.0 % 60)
    }
}
