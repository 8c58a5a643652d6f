//! Command handlers for the three entity groups. Each handler is a
//! function of (repository, data bag) returning a [`CommandOutcome`];
//! the dispatcher composes them without any shared mutable state.

pub mod categories;
pub mod products;
pub mod purchases;
