use shared::{
    domain::{Oficio, OficioId},
    error::{ApiError, ErrorCode},
    protocol::{
        total_pages, OficioFilters, OficioQuery, OficiosResponse, PageRange, Pagination,
        SortDirection, SortField, SortSpec, DEFAULT_PAGE_SIZE,
    },
    store::OficioStore,
};
use tracing::{debug, error};

use crate::{
    error::{OficioError, LOAD_ERROR_MESSAGE},
    form::OficioForm,
    rest::OficioFunctions,
    service::OficioService,
};

/// Filter, sort and page state of the ofícios list plus the last page loaded.
///
/// Editing filters only changes state; nothing is fetched until
/// [`apply_filters`](Self::apply_filters), a page change, a sort change,
/// [`clear_filters`](Self::clear_filters) or a successful mutation, each of
/// which ends in [`refresh`](Self::refresh).
pub struct ListingController<S> {
    service: OficioService<S>,
    filters: OficioFilters,
    sort: SortSpec,
    page: u32,
    page_size: u32,
    records: Vec<Oficio>,
    pagination: Pagination,
    last_error: Option<ApiError>,
}

impl<S: OficioStore> ListingController<S> {
    pub fn new(store: S) -> Self {
        Self::with_page_size(store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(store: S, page_size: u32) -> Self {
        Self {
            service: OficioService::new(store),
            filters: OficioFilters::default(),
            sort: SortSpec::default(),
            page: 1,
            page_size: page_size.max(1),
            records: Vec::new(),
            pagination: Pagination::default(),
            last_error: None,
        }
    }

    pub fn service(&self) -> &OficioService<S> {
        &self.service
    }

    pub fn filters(&self) -> &OficioFilters {
        &self.filters
    }

    pub fn sort(&self) -> SortSpec {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn records(&self) -> &[Oficio] {
        &self.records
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn response(&self) -> OficiosResponse {
        OficiosResponse {
            data: self.records.clone(),
            pagination: self.pagination,
        }
    }

    /// The query the next refresh will issue.
    pub fn query(&self) -> OficioQuery {
        OficioQuery {
            filters: self.filters.clone(),
            sort: self.sort,
            range: PageRange::for_page(self.page, self.page_size),
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        self.filters.search = (!search.is_empty()).then_some(search);
    }

    pub fn set_year(&mut self, year: Option<i32>) {
        self.filters.year = year;
    }

    pub fn set_is_used(&mut self, is_used: Option<bool>) {
        self.filters.is_used = is_used;
    }

    /// Reloads the current page under the current filters.
    ///
    /// On failure the visible page is emptied rather than left stale and the
    /// generic load error is recorded.
    pub async fn refresh(&mut self) -> Result<(), OficioError> {
        let query = self.query();
        debug!(?query, "loading oficios");
        match self.service.store().fetch_page(&query).await {
            Ok(page) => {
                self.pagination = Pagination {
                    current_page: self.page,
                    total_pages: total_pages(page.total_count, self.page_size),
                    total_items: page.total_count,
                };
                self.records = page.records;
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                error!(%err, "failed to load oficios");
                self.records.clear();
                self.pagination = Pagination {
                    current_page: self.page,
                    ..Pagination::default()
                };
                self.last_error = Some(ApiError::new(ErrorCode::Remote, LOAD_ERROR_MESSAGE));
                Err(err.into())
            }
        }
    }

    pub async fn go_to_page(&mut self, page: u32) -> Result<(), OficioError> {
        self.page = page.max(1);
        self.refresh().await
    }

    /// Runs the pending filters from the first page.
    pub async fn apply_filters(&mut self) -> Result<(), OficioError> {
        self.page = 1;
        self.refresh().await
    }

    pub async fn clear_filters(&mut self) -> Result<(), OficioError> {
        self.filters = OficioFilters::default();
        self.sort = SortSpec::new(SortField::Numero, SortDirection::Desc);
        self.page = 1;
        self.refresh().await
    }

    pub async fn sort_by(
        &mut self,
        field: SortField,
        direction: SortDirection,
    ) -> Result<(), OficioError> {
        self.sort = SortSpec::new(field, direction);
        self.page = 1;
        self.refresh().await
    }

    /// Sort-menu pick; see [`SortSpec::toggled`].
    pub async fn toggle_sort(&mut self, field: SortField) -> Result<(), OficioError> {
        let next = self.sort.toggled(field);
        self.sort_by(next.field, next.direction).await
    }

    /// Creates a record and, on success, resets `form` for `current_year` and
    /// refreshes the list. On failure `form` is left as submitted.
    pub async fn create(
        &mut self,
        form: &mut OficioForm,
        current_year: i32,
    ) -> Result<Oficio, OficioError> {
        let created = self.service.create(form).await?;
        form.reset(current_year);
        self.refresh_after_mutation().await;
        Ok(created)
    }

    pub async fn update(&mut self, id: OficioId, form: &OficioForm) -> Result<Oficio, OficioError> {
        let updated = self.service.update(id, form).await?;
        self.refresh_after_mutation().await;
        Ok(updated)
    }

    /// A failed reload does not undo the write that preceded it; the load
    /// error is left on the controller.
    async fn refresh_after_mutation(&mut self) {
        let _ = self.refresh().await;
    }
}

impl<S: OficioStore + OficioFunctions> ListingController<S> {
    pub async fn create_via_function(
        &mut self,
        form: &mut OficioForm,
        current_year: i32,
    ) -> Result<Option<Oficio>, OficioError> {
        let created = self.service.create_via_function(form).await?;
        form.reset(current_year);
        self.refresh_after_mutation().await;
        Ok(created)
    }
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
