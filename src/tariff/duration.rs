use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{Months, NaiveDateTime, TimeDelta};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::prelude::*;

/// ISO-8601 duration, `PnYnMnWnDTnHnMnS`.
///
/// Years and months are calendar units and are kept apart from the exact part, so that
/// a `P1M` identification period follows calendar months.
#[derive(Clone, Copy, Debug, Eq, PartialEq, DeserializeFromStr, SerializeDisplay)]
pub struct IsoDuration {
    months: u32,
    exact: TimeDelta,
}

impl IsoDuration {
    /// Calendar duration of a positive number of months.
    pub fn from_months(months: u32) -> Result<Self> {
        Self::new(months, TimeDelta::zero())
    }

    /// Exact duration of at least one millisecond.
    pub fn from_time_delta(exact: TimeDelta) -> Result<Self> {
        Self::new(0, exact)
    }

    fn new(months: u32, exact: TimeDelta) -> Result<Self> {
        // Zero-length windows and periods cannot partition anything:
        if exact < TimeDelta::zero() || (months == 0 && exact.num_milliseconds() == 0) {
            return Err(Error::MalformedDuration(format!("{months} month(s) and {exact}")));
        }
        Ok(Self { months, exact })
    }

    pub const fn one_hour() -> Self {
        Self { months: 0, exact: TimeDelta::hours(1) }
    }

    pub const fn one_day() -> Self {
        Self { months: 0, exact: TimeDelta::days(1) }
    }

    pub const fn one_month() -> Self {
        Self { months: 1, exact: TimeDelta::zero() }
    }

    #[must_use]
    pub const fn months(self) -> u32 {
        self.months
    }

    #[must_use]
    pub const fn exact(self) -> TimeDelta {
        self.exact
    }

    /// Exact length, or `None` for calendar durations.
    #[must_use]
    pub const fn as_time_delta(self) -> Option<TimeDelta> {
        if self.months == 0 {
            Some(self.exact)
        } else {
            None
        }
    }

    /// Start of the `index`-th consecutive interval anchored at `anchor`.
    fn boundary(self, anchor: NaiveDateTime, index: i64) -> Option<NaiveDateTime> {
        let n_periods = u32::try_from(index.unsigned_abs()).ok()?;
        let months = Months::new(self.months.checked_mul(n_periods)?);
        let exact = self.exact.checked_mul(i32::try_from(index).ok()?)?;
        let shifted = if index >= 0 {
            anchor.checked_add_months(months)?
        } else {
            anchor.checked_sub_months(months)?
        };
        shifted.checked_add_signed(exact)
    }

    /// Index of the consecutive interval of this length, anchored at `anchor`, that contains `at`.
    ///
    /// Equals `floor((at - anchor) / self)` for exact durations.
    #[must_use]
    pub fn index_of(self, anchor: NaiveDateTime, at: NaiveDateTime) -> i64 {
        if let Some(exact) = self.as_time_delta() {
            let step = exact.num_milliseconds();
            return (at - anchor).num_milliseconds().div_euclid(step);
        }

        let mut index = 0;
        if at >= anchor {
            while self.boundary(anchor, index + 1).is_some_and(|next| next <= at) {
                index += 1;
            }
        } else {
            while self.boundary(anchor, index).is_some_and(|start| start > at) {
                index -= 1;
            }
        }
        index
    }
}

impl FromStr for IsoDuration {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let malformed = || Error::MalformedDuration(text.to_owned());

        let rest = text.trim().strip_prefix('P').ok_or_else(malformed)?;
        let (date_part, time_part) = match rest.split_once('T') {
            Some((_, "")) => return Err(malformed()),
            Some((date_part, time_part)) => (date_part, Some(time_part)),
            None => (rest, None),
        };
        if date_part.is_empty() && time_part.is_none() {
            return Err(malformed());
        }

        let mut months = 0_u32;
        let mut exact = TimeDelta::zero();
        for (value, designator) in Designators::new(date_part) {
            let value = value.ok_or_else(malformed)?;
            match designator {
                'Y' => months += whole(value).ok_or_else(malformed)? * 12,
                'M' => months += whole(value).ok_or_else(malformed)?,
                'W' => exact += seconds(value * 7.0 * 86_400.0).ok_or_else(malformed)?,
                'D' => exact += seconds(value * 86_400.0).ok_or_else(malformed)?,
                _ => return Err(malformed()),
            }
        }
        for (value, designator) in Designators::new(time_part.unwrap_or_default()) {
            let value = value.ok_or_else(malformed)?;
            match designator {
                'H' => exact += seconds(value * 3600.0).ok_or_else(malformed)?,
                'M' => exact += seconds(value * 60.0).ok_or_else(malformed)?,
                'S' => exact += seconds(value).ok_or_else(malformed)?,
                _ => return Err(malformed()),
            }
        }

        Self::new(months, exact).map_err(|_| malformed())
    }
}

impl Display for IsoDuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P")?;
        let (years, months) = (self.months / 12, self.months % 12);
        if years != 0 {
            write!(f, "{years}Y")?;
        }
        if months != 0 {
            write!(f, "{months}M")?;
        }
        let total_millis = self.exact.num_milliseconds();
        let days = total_millis / 86_400_000;
        if days != 0 {
            write!(f, "{days}D")?;
        }
        let hours = total_millis % 86_400_000 / 3_600_000;
        let minutes = total_millis % 3_600_000 / 60_000;
        #[expect(clippy::cast_precision_loss)]
        let seconds = (total_millis % 60_000) as f64 / 1000.0;
        if hours != 0 || minutes != 0 || seconds != 0.0 {
            write!(f, "T")?;
            if hours != 0 {
                write!(f, "{hours}H")?;
            }
            if minutes != 0 {
                write!(f, "{minutes}M")?;
            }
            if seconds != 0.0 {
                write!(f, "{seconds}S")?;
            }
        }
        Ok(())
    }
}

/// Splits `1Y2M3D` into `(Some(1.0), 'Y'), (Some(2.0), 'M'), (Some(3.0), 'D')`.
struct Designators<'a>(&'a str);

impl<'a> Designators<'a> {
    const fn new(text: &'a str) -> Self {
        Self(text)
    }
}

impl Iterator for Designators<'_> {
    type Item = (Option<f64>, char);

    fn next(&mut self) -> Option<Self::Item> {
        if self.0.is_empty() {
            return None;
        }
        let Some(index) = self.0.find(|c: char| c.is_ascii_alphabetic()) else {
            // Trailing number without a designator:
            self.0 = "";
            return Some((None, '?'));
        };
        let (number, rest) = self.0.split_at(index);
        let mut chars = rest.chars();
        let designator = chars.next()?;
        self.0 = chars.as_str();
        let value = if number.is_empty() || number.starts_with(['+', '-']) {
            None
        } else {
            number.replace(',', ".").parse::<f64>().ok().filter(|value| value.is_finite())
        };
        Some((value, designator))
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && value <= f64::from(u32::MAX)).then_some(value as u32)
}

#[expect(clippy::cast_possible_truncation)]
fn seconds(value: f64) -> Option<TimeDelta> {
    let millis = (value * 1000.0).round();
    (millis.abs() < 9.0e15).then(|| TimeDelta::milliseconds(millis as i64))
}
