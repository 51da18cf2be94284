pub mod app;
mod auth;
pub mod error;
mod metrics;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
