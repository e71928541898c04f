use anyhow::anyhow;
use shared::{
    domain::{Oficio, OficioId},
    error::StoreError,
    store::OficioStore,
};
use tracing::{info, warn};

use crate::{error::OficioError, form::OficioForm, rest::OficioFunctions};

/// How many times a create re-reads the highest `numero` after losing a race
/// for the next one.
pub const MAX_NUMBER_ALLOCATION_ATTEMPTS: usize = 5;

/// Create and update operations over any [`OficioStore`].
pub struct OficioService<S> {
    store: S,
}

impl<S: OficioStore> OficioService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get(&self, id: OficioId) -> Result<Option<Oficio>, OficioError> {
        Ok(self.store.fetch_by_id(id).await?)
    }

    /// Highest `numero` in the whole table plus one; 1 for an empty table.
    pub async fn next_numero(&self) -> Result<i64, OficioError> {
        match self.store.max_numero().await? {
            None => Ok(1),
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| OficioError::Unexpected(anyhow!("numero sequence exhausted at {max}"))),
        }
    }

    /// Validates, allocates the next `numero` and inserts.
    ///
    /// The store's unique constraint on `numero` turns a lost race into a
    /// conflict; the allocation is then repeated against a fresh maximum.
    pub async fn create(&self, form: &OficioForm) -> Result<Oficio, OficioError> {
        let validated = form.validate()?;

        let mut attempt = 1;
        loop {
            let numero = self.next_numero().await?;
            match self
                .store
                .insert(&validated.clone().into_new_oficio(numero))
                .await
            {
                Ok(created) => {
                    info!(id = created.id.0, numero, ano = created.ano, "oficio created");
                    return Ok(created);
                }
                Err(StoreError::Conflict(reason)) if attempt < MAX_NUMBER_ALLOCATION_ATTEMPTS => {
                    warn!(numero, attempt, %reason, "numero already taken, allocating again");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Overwrites every editable field of `id`. `numero` and `ano` are left alone.
    pub async fn update(&self, id: OficioId, form: &OficioForm) -> Result<Oficio, OficioError> {
        if id.0 <= 0 {
            return Err(OficioError::validation("ID do ofício não fornecido."));
        }
        let changes = form.validate()?.into_changes();
        let updated = self.store.update(id, &changes).await?;
        info!(id = id.0, numero = updated.numero, "oficio updated");
        Ok(updated)
    }
}

impl<S: OficioStore + OficioFunctions> OficioService<S> {
    /// Alternate create flow: the `add_oficio` remote function assigns the
    /// number server-side.
    pub async fn create_via_function(&self, form: &OficioForm) -> Result<Option<Oficio>, OficioError> {
        let submission = form.validate()?.into_submission();
        let created = self.store.add_oficio(&submission).await?;
        info!(
            id = created.as_ref().map(|oficio| oficio.id.0),
            "oficio created through remote function"
        );
        Ok(created)
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
