//! Search provider implementations.
//!
//! Each module provides a struct implementing
//! [`crate::provider::SearchProvider`].

pub mod custom_search;

pub use custom_search::CustomSearchProvider;
