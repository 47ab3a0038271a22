use chrono::NaiveDateTime;

use crate::tariff::{Category, PriceComponent, PriceQuote, QuotedComponent, Tariff};

/// Components active at the instant, in declaration order.
pub fn matching(
    components: &[PriceComponent],
    at: NaiveDateTime,
) -> impl Iterator<Item = &PriceComponent> {
    components.iter().filter(move |component| component.is_active_at(at))
}

/// First component active at the instant.
#[must_use]
pub fn resolve(components: &[PriceComponent], at: NaiveDateTime) -> Option<&PriceComponent> {
    matching(components, at).next()
}

/// Materializes every active component of every price group.
#[must_use]
pub fn get_price(tariff: &Tariff, at: NaiveDateTime) -> PriceQuote {
    let quote = |category| {
        let group = tariff.group(category);
        matching(&group.components, at)
            .map(|component| QuotedComponent::new(component, group))
            .collect()
    };
    PriceQuote {
        fixed: quote(Category::Fixed),
        energy: quote(Category::Energy),
        power: quote(Category::Power),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn tariff() -> Tariff {
        serde_json::from_value(json!({
            "id": "t",
            "energyPrice": {
                "costFunction": "sum",
                "components": [
                    {
                        "id": "day",
                        "validPeriod": {"fromIncluding": "2025-01-01", "toExcluding": "2025-06-01"},
                        "recurringPeriods": [{"activePeriods": [
                            {"fromIncluding": "06:00", "toExcluding": "22:00"},
                        ]}],
                        "price": {"priceIncVat": 0.5},
                    },
                    {
                        "id": "night",
                        "validPeriod": {"fromIncluding": "2025-01-01", "toExcluding": "2025-06-01"},
                        "recurringPeriods": [{"activePeriods": [
                            {"fromIncluding": "22:00", "toExcluding": "06:00"},
                        ]}],
                        "price": {"priceIncVat": 0.3},
                        "costFunction": "night",
                    },
                    {
                        "id": "levy",
                        "validPeriod": {"fromIncluding": "2025-01-01"},
                        "price": {"priceIncVat": 0.1},
                    },
                ],
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_first_match() {
        let tariff = tariff();
        let components = &tariff.energy_price.components;
        assert_eq!(resolve(components, at(3, 1, 12)).unwrap().id, "day");
        assert_eq!(resolve(components, at(3, 1, 23)).unwrap().id, "night");
        assert_eq!(resolve(components, at(3, 1, 3)).unwrap().id, "night");
        assert_eq!(resolve(components, at(6, 1, 12)).unwrap().id, "levy");
        let before = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(12, 0, 0).unwrap();
        assert!(resolve(components, before).is_none());
    }

    #[test]
    fn test_matching_all() {
        let tariff = tariff();
        let ids: Vec<&str> = matching(&tariff.energy_price.components, at(3, 1, 12))
            .map(|component| component.id.as_str())
            .collect();
        assert_eq!(ids, ["day", "levy"]);
    }

    #[test]
    fn test_get_price() {
        let quote = get_price(&tariff(), at(3, 1, 23));
        assert!(quote.fixed.is_empty());
        assert!(quote.power.is_empty());
        let energy: Vec<(&str, Option<&str>)> = quote
            .energy
            .iter()
            .map(|quoted| (quoted.id.as_str(), quoted.cost_function.as_deref()))
            .collect();
        assert_eq!(energy, [("night", Some("night")), ("levy", Some("sum"))]);
    }
}
