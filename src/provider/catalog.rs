use std::{
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;

use crate::{prelude::*, provider::TariffProvider, tariff::Tariff};

/// Decodes either `{"tariffs": [...]}` or a bare list.
///
/// The shape is picked before decoding the tariffs, so that their own errors come through as is.
pub(super) fn decode(json: &str) -> Result<Vec<Arc<Tariff>>> {
    let tariffs = match serde_json::from_str(json)? {
        Value::Object(mut document) => document.remove("tariffs").unwrap_or(Value::Null),
        bare => bare,
    };
    let tariffs: Vec<Tariff> = serde_json::from_value(tariffs)?;
    Ok(tariffs.into_iter().map(Arc::new).collect())
}

/// In-memory tariff catalog, replaced wholesale on refresh.
#[derive(Default)]
pub struct Catalog(RwLock<Vec<Arc<Tariff>>>);

impl Catalog {
    pub fn new(tariffs: impl IntoIterator<Item = Tariff>) -> Self {
        Self(RwLock::new(tariffs.into_iter().map(Arc::new).collect()))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self(RwLock::new(decode(json)?)))
    }

    #[instrument(skip_all, fields(path = %path.display()), name = "Reading tariffs…")]
    pub fn read_from(path: &Path) -> Result<Self> {
        let catalog = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!(n_tariffs = catalog.len(), "Loaded");
        Ok(catalog)
    }

    pub fn replace(&self, tariffs: Vec<Arc<Tariff>>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = tariffs;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TariffProvider for Catalog {
    fn list_tariffs(&self) -> Result<Vec<Arc<Tariff>>> {
        Ok(self.0.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_list() {
        let catalog = Catalog::from_json_str(r#"[{"id": "a", "name": "A"}]"#).unwrap();
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_replace() {
        let catalog = Catalog::from_json_str(r#"{"tariffs": [{"id": "a"}]}"#).unwrap();
        let replacement =
            Catalog::from_json_str(r#"{"tariffs": [{"id": "b"}, {"id": "c"}]}"#).unwrap();
        catalog.replace(replacement.list_tariffs().unwrap());
        assert_eq!(catalog.tariff_ids().unwrap(), ["b", "c"]);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(Catalog::from_json_str(r#"{"tariffs": 1}"#), Err(Error::Decode(_))));
        assert!(matches!(Catalog::from_json_str(r#"{"other": []}"#), Err(Error::Decode(_))));
    }

    #[test]
    fn test_inner_error_is_kept() {
        let json = r#"{"tariffs": [{
            "id": "a",
            "powerPrice": {"components": [{
                "id": "demand",
                "validPeriod": {"fromIncluding": "2025-01-01"},
                "peakIdentificationSettings": {"peakDuration": "PT0S"}
            }]}
        }]}"#;
        let Err(Error::Decode(error)) = Catalog::from_json_str(json) else {
            panic!("the catalog must be rejected");
        };
        assert!(error.to_string().contains("malformed ISO-8601 duration `PT0S`"), "{error}");
    }
}
