//! actiontally - usage event aggregation
//!
//! Ingests usage events (a user performing a named action) and keeps, per
//! `(user_id, action)` pair and calendar month, a single record carrying an
//! occurrence counter and the last-seen timestamp.

pub mod config;
pub mod engine;
pub mod http;
pub mod ledger;
pub mod model;
pub mod storage;
pub mod users;
pub mod utils;
