use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{prelude::*, quantity::power::Kilowatts};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionSample {
    #[serde(rename = "datetime")]
    pub at: NaiveDateTime,

    #[serde(alias = "kW", alias = "kw")]
    pub magnitude: Kilowatts,
}

/// Consumption samples sorted by time, duplicates retained.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ConsumptionSeries(Vec<ConsumptionSample>);

impl ConsumptionSeries {
    #[must_use]
    pub fn new(mut samples: Vec<ConsumptionSample>) -> Self {
        samples.sort_by_key(|sample| sample.at);
        Self(samples)
    }

    /// Accepts either a list of `{datetime, kW}` records or a list of `[datetime, kW]` pairs.
    pub fn from_json(value: &Value) -> Result<Self> {
        let elements = value
            .as_array()
            .ok_or_else(|| Error::InvalidSampleShape(format!("expected a list, got `{value}`")))?;
        let mixed =
            |index: usize| Error::InvalidSampleShape(format!("sample #{index}: mixed shapes"));
        let mut is_record = None;
        let mut samples = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let raw = RawSample::deserialize(element)
                .map_err(|error| Error::InvalidSampleShape(format!("sample #{index}: {error}")))?;
            let sample = match raw {
                RawSample::Record { datetime, magnitude } => {
                    if !*is_record.get_or_insert(true) {
                        return Err(mixed(index));
                    }
                    ConsumptionSample { at: datetime.0, magnitude: Kilowatts::from(magnitude) }
                }
                RawSample::Pair(datetime, magnitude) => {
                    if *is_record.get_or_insert(false) {
                        return Err(mixed(index));
                    }
                    ConsumptionSample { at: datetime.0, magnitude: Kilowatts::from(magnitude) }
                }
            };
            samples.push(sample);
        }
        Ok(Self::new(samples))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json(&serde_json::from_str(json)?)
    }

    /// Appends the samples and restores the ordering.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = ConsumptionSample>) {
        self.0.extend(samples);
        self.0.sort_by_key(|sample| sample.at);
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConsumptionSample> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ConsumptionSample] {
        &self.0
    }

    #[must_use]
    pub fn first(&self) -> Option<&ConsumptionSample> {
        self.0.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&ConsumptionSample> {
        self.0.last()
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Result<Kilowatts> {
        if self.is_empty() {
            return Err(Error::InsufficientSampleData("no samples".into()));
        }
        Ok(self.iter().map(|sample| sample.magnitude).sum::<Kilowatts>() / self.len() as f64)
    }

    /// Time between the first and the last sample.
    pub fn duration(&self) -> Result<TimeDelta> {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) if self.len() >= 2 => Ok(last.at - first.at),
            _ => {
                let reason = format!("{} sample(s), at least 2 needed", self.len());
                Err(Error::InsufficientSampleData(reason))
            }
        }
    }

    /// The same magnitudes, re-timed hourly from `start` and repeated cyclically to `n_hours`
    /// samples.
    #[must_use]
    #[expect(clippy::cast_possible_wrap)]
    pub fn retimed(&self, start: NaiveDateTime, n_hours: usize) -> Self {
        if self.is_empty() {
            return Self::default();
        }
        Self(
            (0..n_hours)
                .zip(self.iter().cycle())
                .map(|(hour, sample)| ConsumptionSample {
                    at: start + TimeDelta::hours(hour as i64),
                    magnitude: sample.magnitude,
                })
                .collect(),
        )
    }
}

impl FromIterator<ConsumptionSample> for ConsumptionSeries {
    fn from_iter<T: IntoIterator<Item = ConsumptionSample>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl FromIterator<(NaiveDateTime, Kilowatts)> for ConsumptionSeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDateTime, Kilowatts)>>(iter: T) -> Self {
        iter.into_iter().map(|(at, magnitude)| ConsumptionSample { at, magnitude }).collect()
    }
}

impl<'a> IntoIterator for &'a ConsumptionSeries {
    type Item = &'a ConsumptionSample;
    type IntoIter = std::slice::Iter<'a, ConsumptionSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSample {
    Record {
        #[serde(alias = "dateTime", alias = "date_time", alias = "time")]
        datetime: LenientDateTime,

        #[serde(alias = "kW", alias = "kw", alias = "value")]
        magnitude: f64,
    },
    Pair(LenientDateTime, f64),
}

/// Naive local timestamp, offsets are dropped after converting to the written local time.
struct LenientDateTime(NaiveDateTime);

impl<'de> Deserialize<'de> for LenientDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_datetime(&text)
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid datetime `{text}`")))
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] =
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"];
    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|datetime| datetime.naive_local()))
}
