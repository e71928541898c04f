//! Client side of the ofícios registry: the hosted-backend store, the
//! create/update operations, and the listing controller that ties them to
//! filter, sort and page state.

pub mod error;
pub mod form;
pub mod format;
pub mod listing;
pub mod rest;
pub mod service;

pub use error::OficioError;
pub use form::{OficioForm, ValidatedForm};
pub use listing::ListingController;
pub use rest::{OficioFunctions, RestConfig, RestStore};
pub use service::OficioService;
