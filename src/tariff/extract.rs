//! Shape-tolerant access to prices and cost functions.
//!
//! Keys are compared after dropping underscores and lowercasing, so `priceIncVat`,
//! `price_inc_vat` and `PRICEINCVAT` all name the same field.

use serde_json::{Map, Value};

use crate::{
    prelude::*,
    quantity::rate::KilowattRate,
    tariff::{Price, PriceComponent, QuotedComponent},
};

/// Anything a numeric price and a cost function can be pulled out of.
pub trait PriceLike {
    fn price_value(&self) -> Result<KilowattRate>;

    fn cost_function(&self) -> Result<String>;
}

/// VAT-inclusive price of the source, falling back to the VAT-exclusive one.
pub fn extract_price_value<P: PriceLike + ?Sized>(source: &P) -> Result<KilowattRate> {
    source.price_value()
}

pub fn extract_cost_function<P: PriceLike + ?Sized>(source: &P) -> Result<String> {
    source.cost_function()
}

#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}

fn lookup<'a>(map: &'a Map<String, Value>, normalized_key: &str) -> Option<&'a Value> {
    map.iter().find(|(key, _)| normalize_key(key) == normalized_key).map(|(_, value)| value)
}

fn number(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Some)
            .ok_or_else(|| Error::InvalidPriceShape(value.to_string())),
        _ => Err(Error::InvalidPriceShape(value.to_string())),
    }
}

/// Builds a [`Price`] out of a bare number, a price record, or an object nesting one under `price`.
pub fn normalize_price(value: &Value) -> Result<Price> {
    match value {
        Value::Number(_) | Value::String(_) => {
            Ok(Price { price_inc_vat: number(value)?, ..Price::default() })
        }
        Value::Object(map) => {
            let price_inc_vat = lookup(map, "priceincvat").map(number).transpose()?.flatten();
            let price_ex_vat = lookup(map, "priceexvat").map(number).transpose()?.flatten();
            if price_inc_vat.is_none()
                && price_ex_vat.is_none()
                && let Some(nested) = lookup(map, "price")
            {
                return normalize_price(nested);
            }
            Ok(Price {
                price_ex_vat,
                price_inc_vat,
                currency: lookup(map, "currency").and_then(Value::as_str).map(str::to_owned),
            })
        }
        _ => Err(Error::InvalidPriceShape(value.to_string())),
    }
}

impl PriceLike for Price {
    fn price_value(&self) -> Result<KilowattRate> {
        self.value()
    }

    fn cost_function(&self) -> Result<String> {
        Err(Error::MissingCostFunction(format!("{self:?}")))
    }
}

impl PriceLike for PriceComponent {
    fn price_value(&self) -> Result<KilowattRate> {
        self.price.value()
    }

    fn cost_function(&self) -> Result<String> {
        self.cost_function
            .clone()
            .ok_or_else(|| Error::MissingCostFunction(format!("component `{}`", self.id)))
    }
}

impl PriceLike for QuotedComponent {
    fn price_value(&self) -> Result<KilowattRate> {
        self.price.value()
    }

    fn cost_function(&self) -> Result<String> {
        self.cost_function
            .clone()
            .ok_or_else(|| Error::MissingCostFunction(format!("component `{}`", self.id)))
    }
}

impl PriceLike for Value {
    fn price_value(&self) -> Result<KilowattRate> {
        normalize_price(self)?.value()
    }

    fn cost_function(&self) -> Result<String> {
        if let Self::Object(map) = self
            && let Some(value) = lookup(map, "costfunction")
        {
            match value {
                Self::String(cost_function) => return Ok(cost_function.clone()),
                Self::Object(inner) => {
                    if let Some(Self::String(cost_function)) = lookup(inner, "costfunction") {
                        return Ok(cost_function.clone());
                    }
                }
                _ => {}
            }
        }
        Err(Error::MissingCostFunction(self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("price_Inc_Vat"), "priceincvat");
        assert_eq!(normalize_key("costFunction"), "costfunction");
    }

    #[test]
    fn test_inc_vat_preferred() {
        let value = json!({"priceIncVat": 1.5, "priceExVat": 9.9});
        assert_eq!(extract_price_value(&value).unwrap().0, 1.5);
    }

    #[test]
    fn test_ex_vat_fallback() {
        assert_eq!(extract_price_value(&json!({"priceExVat": 2.5})).unwrap().0, 2.5);
    }

    #[test]
    fn test_nested_snake_case() {
        let price = extract_price_value(&json!({"price": {"price_inc_vat": 250.0}})).unwrap();
        assert_eq!(price.0, 250.0);
    }

    #[test]
    fn test_bare_number_and_string() {
        assert_eq!(extract_price_value(&json!(3.25)).unwrap().0, 3.25);
        assert_eq!(extract_price_value(&json!({"price": 4})).unwrap().0, 4.0);
        assert_eq!(extract_price_value(&json!({"PriceIncVat": "0.75"})).unwrap().0, 0.75);
    }

    #[test]
    fn test_invalid_shape() {
        for value in [
            json!({}),
            json!({"price": {}}),
            json!([1.0]),
            json!(null),
            json!({"priceIncVat": "abc"}),
        ] {
            assert!(
                matches!(extract_price_value(&value), Err(Error::InvalidPriceShape(_))),
                "{value} must be rejected",
            );
        }
    }

    #[test]
    fn test_cost_function() {
        assert_eq!(extract_cost_function(&json!({"cost_function": "sum"})).unwrap(), "sum");
        assert_eq!(
            extract_cost_function(&json!({"costFunction": {"costFunction": "average"}})).unwrap(),
            "average",
        );
        assert!(matches!(
            extract_cost_function(&json!({"price": 1.0})),
            Err(Error::MissingCostFunction(_)),
        ));
        assert!(matches!(
            extract_cost_function(&Price::inc_vat(1.0)),
            Err(Error::MissingCostFunction(_)),
        ));
    }

    #[test]
    fn test_price_deserialize_any_shape() {
        let price: Price =
            serde_json::from_value(json!({"price": {"price_ex_vat": 1.25}})).unwrap();
        assert_eq!(price.price_ex_vat, Some(1.25));
        let price: Price = serde_json::from_value(json!(0.5)).unwrap();
        assert_eq!(price, Price::inc_vat(0.5));
    }
}
