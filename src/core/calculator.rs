use std::sync::Arc;

use bon::Builder;
use chrono::{NaiveDateTime, TimeDelta};

use crate::{
    core::{
        expression::PeakFunction,
        peaks::{PeakTable, ReferenceMode},
        resolver::{get_price, matching, resolve},
        samples::ConsumptionSeries,
    },
    prelude::*,
    provider::TariffProvider,
    quantity::{cost::Cost, power::Kilowatts, rate::KilowattRate},
    tariff::{Category, PriceGroup, PriceQuote, Tariff, extract::extract_price_value},
};

/// Number of hourly steps covering `[start, start + duration)`.
#[must_use]
pub fn n_hours(duration: TimeDelta) -> usize {
    if duration <= TimeDelta::zero() {
        return 0;
    }
    let hour = TimeDelta::hours(1).num_milliseconds();
    usize::try_from((duration.num_milliseconds() + hour - 1) / hour).unwrap_or(usize::MAX)
}

#[derive(Builder)]
pub struct Calculator {
    provider: Arc<dyn TariffProvider>,

    #[builder(default)]
    reference_mode: ReferenceMode,
}

impl Calculator {
    #[must_use]
    pub fn provider(&self) -> &dyn TariffProvider {
        self.provider.as_ref()
    }

    pub fn tariff(&self, tariff_id: &str) -> Result<Arc<Tariff>> {
        self.provider.require_tariff(tariff_id)
    }

    #[instrument(skip_all, name = "Quoting…", fields(tariff_id = tariff_id, at = %at))]
    pub fn get_price(&self, tariff_id: &str, at: NaiveDateTime) -> Result<PriceQuote> {
        Ok(get_price(&*self.tariff(tariff_id)?, at))
    }

    /// Instantaneous cost of the usage under the first matching component.
    #[instrument(
        skip_all,
        name = "Calculating cost…",
        fields(tariff_id = tariff_id, category = %category, at = %at),
    )]
    pub fn get_cost(
        &self,
        tariff_id: &str,
        category: Category,
        at: NaiveDateTime,
        usage: Kilowatts,
    ) -> Result<Cost> {
        let tariff = self.tariff(tariff_id)?;
        let component = resolve(&tariff.group(category).components, at)
            .ok_or(Error::NoMatchingPriceComponent { category, at })?;
        Ok(extract_price_value(component)? * usage)
    }

    #[instrument(
        skip_all,
        name = "Calculating operation cost…",
        fields(tariff_id = tariff_id, category = %category, start = %start, duration = %duration),
    )]
    pub fn get_operation_cost(
        &self,
        tariff_id: &str,
        category: Category,
        start: NaiveDateTime,
        duration: TimeDelta,
        samples: &ConsumptionSeries,
    ) -> Result<Cost> {
        self.operation_cost(&*self.tariff(tariff_id)?, category, start, duration, samples)
    }

    /// Cost of running the sampled load over `[start, start + duration)`.
    ///
    /// Infinite when any hour cannot be priced.
    pub fn operation_cost(
        &self,
        tariff: &Tariff,
        category: Category,
        start: NaiveDateTime,
        duration: TimeDelta,
        samples: &ConsumptionSeries,
    ) -> Result<Cost> {
        let mean = samples.mean()?;
        let n_hours = n_hours(duration);
        let group = tariff.group(category);
        let cost = match category {
            Category::Fixed | Category::Energy => flat_cost(group, category, start, n_hours, mean),
            Category::Power => self.peak_cost(group, start, n_hours, samples)?,
        };
        debug!(%category, n_hours, %cost, "Calculated");
        Ok(cost)
    }

    /// Peak values over the samples re-timed to `[start, start + duration)`, for the power
    /// components active at `start`.
    pub fn peak_table(
        &self,
        tariff: &Tariff,
        start: NaiveDateTime,
        duration: TimeDelta,
        samples: &ConsumptionSeries,
    ) -> PeakTable {
        let series = samples.retimed(start, n_hours(duration));
        let settings = matching(&tariff.power_price.components, start)
            .filter_map(|component| component.peak_identification_settings.as_ref());
        PeakTable::identify(&series, start, settings, self.reference_mode)
    }

    fn peak_cost(
        &self,
        group: &PriceGroup,
        start: NaiveDateTime,
        n_hours: usize,
        samples: &ConsumptionSeries,
    ) -> Result<Cost> {
        if n_hours == 0 {
            return Ok(Cost::ZERO);
        }
        let components: Vec<_> = matching(&group.components, start).collect();
        if components.is_empty() {
            warn!(at = %start, "No power component matches");
            return Ok(Cost::INFINITY);
        }

        let series = samples.retimed(start, n_hours);
        let settings = components
            .iter()
            .filter_map(|component| component.peak_identification_settings.as_ref());
        let table = PeakTable::identify(&series, start, settings, self.reference_mode);

        let mut total = Cost::ZERO;
        for component in components {
            let rate = match extract_price_value(component) {
                Ok(rate) => rate,
                Err(error) => {
                    warn!(component_id = %component.id, %error, "Unpriceable component");
                    return Ok(Cost::INFINITY);
                }
            };
            match &component.peak_identification_settings {
                None => {
                    total += rate * series.mean()?;
                }
                Some(settings) => {
                    let function = PeakFunction::parse(&settings.peak_function())?;
                    for (period, values) in table.periods_of(settings.reference()) {
                        let peak = Kilowatts::from(function.evaluate(&values)?);
                        trace!(component_id = %component.id, period, %peak, "Evaluated");
                        total += rate * peak;
                    }
                }
            }
        }
        Ok(total)
    }
}

fn flat_cost(
    group: &PriceGroup,
    category: Category,
    start: NaiveDateTime,
    n_hours: usize,
    mean: Kilowatts,
) -> Cost {
    let mut total = Cost::ZERO;
    let hours = (0..n_hours).map(|hour| i64::try_from(hour).unwrap_or(i64::MAX));
    for at in hours.map(|hour| start + TimeDelta::hours(hour)) {
        match hourly_rate(group, category, at) {
            Ok(rate) => total += rate * mean,
            Err(error) => {
                warn!(%at, %error, "The hour cannot be priced");
                return Cost::INFINITY;
            }
        }
    }
    total
}

/// Sum of all components active at the instant.
fn hourly_rate(group: &PriceGroup, category: Category, at: NaiveDateTime) -> Result<KilowattRate> {
    let mut components = matching(&group.components, at).peekable();
    if components.peek().is_none() {
        return Err(Error::NoMatchingPriceComponent { category, at });
    }
    components.map(extract_price_value).sum()
}
