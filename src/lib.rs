//! Payment settlement backend
//!
//! Opens hosted checkouts at Midtrans, DOKU and Tripay, authenticates their
//! notifications and settles orders exactly once.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod payments;
pub mod settlement;
