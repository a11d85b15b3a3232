//! Test helper utilities

pub mod database_helper;

pub use database_helper::TestDatabase;
