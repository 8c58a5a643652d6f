//! Sea-ORM entities for the catalog tables and their conversions to the
//! domain models in [`crate::models`].

pub mod category;
pub mod product;
pub mod product_category;
pub mod purchase;
pub mod purchase_item;
