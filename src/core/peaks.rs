use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;

use crate::{
    core::{expression::PeakValues, samples::ConsumptionSeries},
    prelude::*,
    quantity::power::Kilowatts,
    tariff::{IsoDuration, MAIN_REFERENCE, PeakIdentificationSettings},
};

/// How peak references missing from a tariff are treated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReferenceMode {
    /// Provide `base` (the `main` value) and `reactive` (zero) when a tariff does not define
    /// them.
    #[default]
    LegacyAliases,

    /// Only references defined by the tariff are available.
    Strict,
}

impl ReferenceMode {
    pub fn apply(self, values: &mut PeakValues) {
        if self == Self::LegacyAliases {
            let main = values.get(MAIN_REFERENCE).copied().unwrap_or_default();
            values.entry("base".to_owned()).or_insert(main);
            values.entry("reactive".to_owned()).or_insert(0.0);
        }
    }
}

/// Peak of one identification period.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    /// First sample of the period.
    pub since: NaiveDateTime,

    /// Average of the top-N window maxima.
    pub value: Kilowatts,
}

/// Average of the top-N window maxima per identification period.
#[must_use]
pub fn identify(
    series: &ConsumptionSeries,
    anchor: NaiveDateTime,
    settings: &PeakIdentificationSettings,
) -> BTreeMap<i64, Peak> {
    let mut periods: BTreeMap<i64, (NaiveDateTime, BTreeMap<i64, Kilowatts>)> = BTreeMap::new();
    for sample in series {
        let period = settings.peak_identification_period.index_of(anchor, sample.at);
        let window = settings.peak_duration.index_of(anchor, sample.at);
        periods
            .entry(period)
            .or_insert_with(|| (sample.at, BTreeMap::new()))
            .1
            .entry(window)
            .and_modify(|peak| *peak = peak.max(sample.magnitude))
            .or_insert(sample.magnitude);
    }
    let n_peaks = settings.number_of_peaks_for_average_calculation.get();
    periods
        .into_iter()
        .map(|(period, (since, windows))| {
            (period, Peak { since, value: top_average(windows.into_values(), n_peaks) })
        })
        .collect()
}

#[expect(clippy::cast_precision_loss)]
fn top_average(peaks: impl IntoIterator<Item = Kilowatts>, n_peaks: usize) -> Kilowatts {
    let mut peaks: Vec<OrderedFloat<f64>> =
        peaks.into_iter().map(|peak| OrderedFloat(peak.0)).collect();
    peaks.sort_unstable_by(|lhs, rhs| rhs.cmp(lhs));
    peaks.truncate(n_peaks);
    if peaks.is_empty() {
        return Kilowatts::ZERO;
    }
    Kilowatts::from(peaks.iter().map(|peak| peak.0).sum::<f64>() / peaks.len() as f64)
}

#[derive(Clone, Debug, PartialEq)]
struct ReferencePeaks {
    period: IsoDuration,
    peaks: BTreeMap<i64, Peak>,
}

/// Identified peaks of every reference, each on the grid of its own identification period.
#[derive(Clone, Debug, PartialEq)]
pub struct PeakTable {
    anchor: NaiveDateTime,
    mode: ReferenceMode,
    references: BTreeMap<String, ReferencePeaks>,
}

impl PeakTable {
    /// Runs the identification for each settings entry.
    ///
    /// The first entry wins for a duplicate reference.
    #[instrument(skip_all, name = "Identifying peaks…", fields(n_samples = series.len()))]
    pub fn identify<'a>(
        series: &ConsumptionSeries,
        anchor: NaiveDateTime,
        settings: impl IntoIterator<Item = &'a PeakIdentificationSettings>,
        mode: ReferenceMode,
    ) -> Self {
        let mut references = BTreeMap::new();
        for settings in settings {
            references.entry(settings.reference().to_owned()).or_insert_with(|| ReferencePeaks {
                period: settings.peak_identification_period,
                peaks: identify(series, anchor, settings),
            });
        }
        debug!(n_references = references.len(), "Identified");
        Self { anchor, mode, references }
    }

    /// Value of every reference in its own period that contains the instant.
    #[must_use]
    pub fn values_at(&self, at: NaiveDateTime) -> PeakValues {
        let mut values: PeakValues = self
            .references
            .iter()
            .filter_map(|(reference, peaks)| {
                let period = peaks.period.index_of(self.anchor, at);
                peaks.peaks.get(&period).map(|peak| (reference.clone(), peak.value.0))
            })
            .collect();
        self.mode.apply(&mut values);
        values
    }

    /// Periods of the reference, each with the values of all references at its first sample.
    pub fn periods_of<'a>(
        &'a self,
        reference: &'a str,
    ) -> impl Iterator<Item = (i64, PeakValues)> + 'a {
        self.references.get(reference).into_iter().flat_map(move |peaks| {
            peaks.peaks.iter().map(move |(period, peak)| (*period, self.values_at(peak.since)))
        })
    }

    /// Identified peaks by reference and period.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64, &Peak)> {
        self.references.iter().flat_map(|(reference, peaks)| {
            peaks.peaks.iter().map(move |(period, peak)| (reference.as_str(), *period, peak))
        })
    }

    /// Number of references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, TimeDelta};

    use super::*;

    /// One day of hourly household load.
    const MAGNITUDES: [f64; 24] = [
        5.0, 4.0, 3.0, 3.0, 4.0, 6.0, 12.0, 25.0, 35.0, 45.0, 55.0, 60.0, 50.0, 30.0, 50.0, 75.0,
        80.0, 75.0, 25.0, 10.0, 7.0, 4.0, 3.0, 2.0,
    ];

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn series(magnitudes: &[f64]) -> ConsumptionSeries {
        magnitudes
            .iter()
            .enumerate()
            .map(|(hour, magnitude)| {
                (start() + TimeDelta::hours(hour.try_into().unwrap()), Kilowatts::from(*magnitude))
            })
            .collect()
    }

    fn settings(n_peaks: usize) -> PeakIdentificationSettings {
        PeakIdentificationSettings {
            number_of_peaks_for_average_calculation: NonZeroUsize::new(n_peaks).unwrap(),
            ..PeakIdentificationSettings::default()
        }
    }

    #[test]
    fn test_top_three_average() {
        let peaks = identify(&series(&MAGNITUDES), start(), &settings(3));
        assert_eq!(peaks.len(), 1);
        assert_abs_diff_eq!(peaks[&0].value.0, 230.0 / 3.0);
    }

    #[test]
    fn test_fewer_windows_than_peaks() {
        let peaks = identify(&series(&[4.0, 2.0]), start(), &settings(5));
        assert_abs_diff_eq!(peaks[&0].value.0, 3.0);
    }

    #[test]
    fn test_window_maximum() {
        let settings = PeakIdentificationSettings {
            peak_duration: "PT2H".parse().unwrap(),
            ..settings(2)
        };
        // Windows: max(1, 5) = 5 and max(3, 4) = 4.
        let peaks = identify(&series(&[1.0, 5.0, 3.0, 4.0]), start(), &settings);
        assert_abs_diff_eq!(peaks[&0].value.0, 4.5);
    }

    #[test]
    fn test_periods() {
        let settings = PeakIdentificationSettings {
            peak_identification_period: "PT12H".parse().unwrap(),
            ..settings(1)
        };
        let peaks = identify(&series(&MAGNITUDES), start(), &settings);
        assert_eq!(peaks.len(), 2);
        assert_abs_diff_eq!(peaks[&0].value.0, 60.0);
        assert_abs_diff_eq!(peaks[&1].value.0, 80.0);
    }

    #[test]
    fn test_calendar_month_periods() {
        let settings = PeakIdentificationSettings {
            peak_identification_period: IsoDuration::one_month(),
            peak_duration: IsoDuration::one_day(),
            ..settings(1)
        };
        let anchor = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let series: ConsumptionSeries = [
            (anchor, 1.0),
            (anchor + TimeDelta::days(27), 2.0),
            (anchor + TimeDelta::days(28), 3.0),
        ]
        .into_iter()
        .map(|(at, magnitude)| (at, Kilowatts::from(magnitude)))
        .collect();
        let peaks = identify(&series, anchor, &settings);
        assert_abs_diff_eq!(peaks[&0].value.0, 2.0);
        assert_abs_diff_eq!(peaks[&1].value.0, 3.0);
    }

    #[test]
    fn test_legacy_aliases() {
        let table = PeakTable::identify(
            &series(&MAGNITUDES),
            start(),
            [&settings(1)],
            ReferenceMode::LegacyAliases,
        );
        let values = table.values_at(start());
        assert_abs_diff_eq!(values["main"], 80.0);
        assert_abs_diff_eq!(values["base"], 80.0);
        assert_abs_diff_eq!(values["reactive"], 0.0);
    }

    #[test]
    fn test_aliases_do_not_override() {
        let base = PeakIdentificationSettings { reference: Some("base".to_owned()), ..settings(2) };
        let table = PeakTable::identify(
            &series(&MAGNITUDES),
            start(),
            [&settings(1), &base],
            ReferenceMode::LegacyAliases,
        );
        let values = table.values_at(start());
        assert_abs_diff_eq!(values["base"], 77.5);
        assert_abs_diff_eq!(values["main"], 80.0);
    }

    #[test]
    fn test_strict_mode() {
        let table = PeakTable::identify(
            &series(&MAGNITUDES),
            start(),
            [&settings(1)],
            ReferenceMode::Strict,
        );
        let values = table.values_at(start());
        assert_eq!(values.keys().collect::<Vec<_>>(), ["main"]);
    }

    #[test]
    fn test_references_on_different_periods() {
        let daily = settings(1);
        let monthly = PeakIdentificationSettings {
            reference: Some("high".to_owned()),
            peak_identification_period: IsoDuration::one_month(),
            ..settings(1)
        };
        // Two days: the second one peaks higher.
        let doubled = MAGNITUDES.map(|magnitude| magnitude * 2.0);
        let magnitudes: Vec<f64> = MAGNITUDES.iter().chain(&doubled).copied().collect();
        let table = PeakTable::identify(
            &series(&magnitudes),
            start(),
            [&daily, &monthly],
            ReferenceMode::Strict,
        );

        let periods: Vec<_> = table.periods_of("main").collect();
        assert_eq!(periods.len(), 2);
        assert_abs_diff_eq!(periods[0].1["main"], 80.0);
        assert_abs_diff_eq!(periods[0].1["high"], 160.0);
        assert_abs_diff_eq!(periods[1].1["main"], 160.0);
        assert_abs_diff_eq!(periods[1].1["high"], 160.0);

        let periods: Vec<_> = table.periods_of("high").collect();
        assert_eq!(periods.len(), 1);
        assert_abs_diff_eq!(periods[0].1["main"], 80.0);
        assert_eq!(table.iter().count(), 3);
    }
}
