//! A todo service with interchangeable in-memory and PostgreSQL stores.

pub mod api;
pub mod app;
pub mod infra;
