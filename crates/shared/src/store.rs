use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{NewOficio, Oficio, OficioChanges, OficioId},
    error::StoreResult,
    protocol::{OficioPage, OficioQuery},
};

/// Narrow repository over the ofícios table.
///
/// Implementations must reject an insert whose `numero` is already taken with
/// [`StoreError::Conflict`](crate::error::StoreError::Conflict).
#[async_trait]
pub trait OficioStore: Send + Sync {
    async fn fetch_page(&self, query: &OficioQuery) -> StoreResult<OficioPage>;
    async fn fetch_by_id(&self, id: OficioId) -> StoreResult<Option<Oficio>>;
    /// Highest `numero` across the whole table, `None` when it is empty.
    async fn max_numero(&self) -> StoreResult<Option<i64>>;
    async fn insert(&self, record: &NewOficio) -> StoreResult<Oficio>;
    async fn update(&self, id: OficioId, changes: &OficioChanges) -> StoreResult<Oficio>;
}

#[async_trait]
impl<S: OficioStore + ?Sized> OficioStore for Arc<S> {
    async fn fetch_page(&self, query: &OficioQuery) -> StoreResult<OficioPage> {
        (**self).fetch_page(query).await
    }

    async fn fetch_by_id(&self, id: OficioId) -> StoreResult<Option<Oficio>> {
        (**self).fetch_by_id(id).await
    }

    async fn max_numero(&self) -> StoreResult<Option<i64>> {
        (**self).max_numero().await
    }

    async fn insert(&self, record: &NewOficio) -> StoreResult<Oficio> {
        (**self).insert(record).await
    }

    async fn update(&self, id: OficioId, changes: &OficioChanges) -> StoreResult<Oficio> {
        (**self).update(id, changes).await
    }
}
