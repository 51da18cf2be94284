pub mod cache;
pub mod config;
pub mod context;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod feature;
pub mod filter;
pub mod form;
mod metrics;
pub mod mutation;
mod pagination;
pub use pagination::Pagination;
pub mod projection;
pub mod query;
pub mod resource;
pub mod tag;
pub mod transport;
pub mod ui_state;

#[cfg(test)]
mod test_support;
