//! Repository implementations over the library HTTP API

pub mod catalog_repository;
pub mod transaction_repository;

pub use catalog_repository::HttpCatalogRepository;
pub use transaction_repository::HttpTransactionRepository;
