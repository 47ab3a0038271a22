use bon::Builder;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

use crate::{
    core::{calculator::Calculator, samples::ConsumptionSeries},
    prelude::*,
    quantity::cost::Cost,
    tariff::Category,
};

/// Longest run that fits the look-ahead horizon.
const HORIZON_HOURS: i64 = 24;

/// Cheapest hour to start a deferrable load within the next 24 hours.
#[derive(Builder)]
#[builder(finish_fn(vis = ""))]
pub struct OptimalStart<'a> {
    calculator: &'a Calculator,
    tariff_id: &'a str,
    category: Category,
    samples: &'a ConsumptionSeries,

    #[builder(default = Local::now().naive_local())]
    now: NaiveDateTime,
}

impl<S: optimal_start_builder::IsComplete> OptimalStartBuilder<'_, S> {
    pub fn find(self) -> Result<NaiveDateTime> {
        self.build().find()
    }
}

impl OptimalStart<'_> {
    #[instrument(
        skip_all,
        name = "Searching for the optimal start…",
        fields(tariff_id = self.tariff_id, category = %self.category),
    )]
    fn find(self) -> Result<NaiveDateTime> {
        let n_hours = self.samples.duration()?.num_hours();
        if n_hours == 0 || n_hours > HORIZON_HOURS {
            return Err(Error::InsufficientSampleData(format!(
                "the samples span {n_hours} whole hour(s), 1 to {HORIZON_HOURS} needed",
            )));
        }
        let duration = TimeDelta::hours(n_hours);
        let tariff = self.calculator.tariff(self.tariff_id)?;
        let first_candidate =
            self.now.date().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(self.now.hour()));

        let mut best: Option<(NaiveDateTime, Cost)> = None;
        let candidates =
            (0..=HORIZON_HOURS - n_hours).map(|offset| first_candidate + TimeDelta::hours(offset));
        for start in candidates {
            #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let shifted = self.samples.retimed(start, n_hours as usize);
            let cost =
                self.calculator.operation_cost(&tariff, self.category, start, duration, &shifted)?;
            debug!(%start, %cost, "Scored");
            if cost.is_finite() && best.is_none_or(|(_, lowest)| cost < lowest) {
                best = Some((start, cost));
            }
        }

        let (start, cost) = best.ok_or(Error::NoFeasibleStart)?;
        info!(%start, %cost, "Found");
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::{provider::Catalog, quantity::power::Kilowatts};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    fn samples(n: u32) -> ConsumptionSeries {
        (0..n).map(|hour| (at(1, hour, 0), Kilowatts::from(1.0))).collect()
    }

    fn calculator(components: serde_json::Value) -> Calculator {
        let document =
            json!({"tariffs": [{"id": "grid", "energyPrice": {"components": components}}]});
        let catalog = Catalog::from_json_str(&document.to_string()).unwrap();
        Calculator::builder().provider(Arc::new(catalog)).build()
    }

    fn window(from: &str, to: &str, price: f64) -> serde_json::Value {
        json!({
            "id": format!("{from}-{to}"),
            "validPeriod": {"fromIncluding": "2025-01-01"},
            "recurringPeriods": [{"activePeriods": [{"fromIncluding": from, "toExcluding": to}]}],
            "price": {"priceIncVat": price},
        })
    }

    #[test]
    fn test_cheapest_window() {
        let calculator = calculator(json!([
            window("00:00", "14:00", 1.0),
            window("14:00", "16:00", 0.1),
            window("16:00", "24:00:00", 1.0),
        ]));
        let start = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("grid")
            .category(Category::Energy)
            .samples(&samples(3))
            .now(at(10, 9, 41))
            .find()
            .unwrap();
        assert_eq!(start, at(10, 14, 0));
    }

    #[test]
    fn test_ties_keep_earliest() {
        let calculator = calculator(json!([window("00:00", "00:00", 1.0)]));
        let start = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("grid")
            .category(Category::Energy)
            .samples(&samples(5))
            .now(at(10, 9, 41))
            .find()
            .unwrap();
        assert_eq!(start, at(10, 9, 0));
    }

    #[test]
    fn test_unpriceable_candidates_are_skipped() {
        // Only the window starting at 20:00 is priced for the whole 2-hour run.
        let calculator = calculator(json!([window("20:00", "22:00", 1.0)]));
        let start = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("grid")
            .category(Category::Energy)
            .samples(&samples(3))
            .now(at(10, 9, 0))
            .find()
            .unwrap();
        assert_eq!(start, at(10, 20, 0));
    }

    #[test]
    fn test_no_feasible_start() {
        let calculator = calculator(json!([]));
        let result = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("grid")
            .category(Category::Energy)
            .samples(&samples(3))
            .now(at(10, 9, 0))
            .find();
        assert!(matches!(result, Err(Error::NoFeasibleStart)));
    }

    #[test]
    fn test_insufficient_samples() {
        let calculator = calculator(json!([window("00:00", "00:00", 1.0)]));
        for samples in [samples(1), samples(0)] {
            let result = OptimalStart::builder()
                .calculator(&calculator)
                .tariff_id("grid")
                .category(Category::Energy)
                .samples(&samples)
                .now(at(10, 9, 0))
                .find();
            assert!(matches!(result, Err(Error::InsufficientSampleData(_))));
        }
        let long: ConsumptionSeries = [at(1, 0, 0), at(2, 1, 0)]
            .into_iter()
            .map(|at| (at, Kilowatts::from(1.0)))
            .collect();
        let result = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("grid")
            .category(Category::Energy)
            .samples(&long)
            .now(at(10, 9, 0))
            .find();
        assert!(matches!(result, Err(Error::InsufficientSampleData(_))));
    }

    #[test]
    fn test_unknown_tariff() {
        let calculator = calculator(json!([]));
        let result = OptimalStart::builder()
            .calculator(&calculator)
            .tariff_id("nope")
            .category(Category::Energy)
            .samples(&samples(3))
            .find();
        assert!(matches!(result, Err(Error::UnknownTariff(_))));
    }
}
