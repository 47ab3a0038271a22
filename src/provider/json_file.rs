use std::{path::PathBuf, sync::Arc};

use crate::{
    prelude::*,
    provider::{TariffProvider, catalog::decode},
    tariff::Tariff,
};

/// Provider re-reading a JSON tariffs document on every call, so that monitors pick up edits.
pub struct JsonFile(PathBuf);

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl TariffProvider for JsonFile {
    #[instrument(skip_all, fields(path = %self.0.display()), name = "Reading tariffs…")]
    fn list_tariffs(&self) -> Result<Vec<Arc<Tariff>>> {
        let tariffs = decode(&std::fs::read_to_string(&self.0)?)?;
        debug!(n_tariffs = tariffs.len(), "Read");
        Ok(tariffs)
    }
}
