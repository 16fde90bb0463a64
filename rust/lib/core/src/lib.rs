pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::ServiceConfig;
pub use error::{FieldErrors, NON_FIELD_ERRORS, ServiceError};
pub use module::Module;
pub use types::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageParams, PageUrl, PageWindow, today};
