//! Catalog Domain
//!
//! Relational data model and datastore boundary for the store catalog:
//! categories, products, and recorded purchases.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ Repository  │  ← CatalogRepository trait (+ in-memory / Postgres impls)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Domain entities, inputs, filters, sort specs
//! └─────────────┘
//! ```
//!
//! Multi-step mutations (purchase creation, purchase deletion with stock
//! restoration, product writes with category changes) are single trait
//! methods so each implementation can make them atomic.

pub mod entity;
pub mod error;
pub mod models;
pub mod postgres;
pub mod repository;

pub use error::{CatalogError, CatalogResult};
pub use models::{
    Category, CategoryChanges, CategoryPatch, CategoryWithProducts, NewCategory, NewProduct,
    Product, ProductPatch, ProductSortField, Purchase, PurchaseFilter, PurchaseLine,
    PurchaseLineRequest, PurchaseSortField, SortDirection,
};
pub use postgres::PgCatalogRepository;
pub use repository::{CatalogRepository, InMemoryCatalogRepository};
