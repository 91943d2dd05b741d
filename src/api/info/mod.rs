//! Application metadata.

pub mod info_api;
