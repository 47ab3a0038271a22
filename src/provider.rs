mod catalog;
mod json_file;

use std::sync::Arc;

use itertools::Itertools;

pub use self::{catalog::Catalog, json_file::JsonFile};
use crate::{prelude::*, tariff::Tariff};

/// Source of tariff definitions.
pub trait TariffProvider: Send + Sync {
    fn list_tariffs(&self) -> Result<Vec<Arc<Tariff>>>;

    fn get_tariff(&self, id: &str) -> Result<Option<Arc<Tariff>>> {
        Ok(self.list_tariffs()?.into_iter().find(|tariff| tariff.id == id))
    }

    fn require_tariff(&self, id: &str) -> Result<Arc<Tariff>> {
        self.get_tariff(id)?.ok_or_else(|| Error::UnknownTariff(id.to_owned()))
    }

    fn tariff_ids(&self) -> Result<Vec<String>> {
        Ok(self.list_tariffs()?.iter().map(|tariff| tariff.id.clone()).collect())
    }

    fn tariff_names(&self) -> Result<Vec<String>> {
        Ok(self.list_tariffs()?.iter().map(|tariff| tariff.name.clone()).collect())
    }

    /// Distinct company names, in first-seen order.
    fn companies(&self) -> Result<Vec<String>> {
        Ok(self.list_tariffs()?.iter().map(|tariff| tariff.company_name.clone()).unique().collect())
    }

    fn company_of(&self, id: &str) -> Result<String> {
        Ok(self.require_tariff(id)?.company_name.clone())
    }

    /// Tariff names are only unique within a company.
    fn find_id_by_name(&self, name: &str, company: &str) -> Result<String> {
        self.list_tariffs()?
            .iter()
            .find(|tariff| tariff.name == name && tariff.company_name == company)
            .map(|tariff| tariff.id.clone())
            .ok_or_else(|| Error::UnknownTariff(format!("{name} ({company})")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{"tariffs": [
        {"id": "a", "name": "Home", "companyName": "North Grid"},
        {"id": "b", "name": "Home", "companyName": "South Grid"},
        {"id": "c", "name": "Cabin", "companyName": "North Grid"}
    ]}"#;

    #[test]
    fn test_lookups() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.tariff_ids().unwrap(), ["a", "b", "c"]);
        assert_eq!(catalog.tariff_names().unwrap(), ["Home", "Home", "Cabin"]);
        assert_eq!(catalog.companies().unwrap(), ["North Grid", "South Grid"]);
        assert_eq!(catalog.company_of("c").unwrap(), "North Grid");
        assert_eq!(catalog.find_id_by_name("Home", "South Grid").unwrap(), "b");
    }

    #[test]
    fn test_unknown() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        assert!(catalog.get_tariff("z").unwrap().is_none());
        assert!(matches!(catalog.require_tariff("z"), Err(Error::UnknownTariff(id)) if id == "z"));
        assert!(matches!(catalog.company_of("z"), Err(Error::UnknownTariff(_))));
        assert!(matches!(
            catalog.find_id_by_name("Cabin", "South Grid"),
            Err(Error::UnknownTariff(_)),
        ));
    }
}
