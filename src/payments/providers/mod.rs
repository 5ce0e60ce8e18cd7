//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait for different providers.

pub mod doku;
pub mod midtrans;
pub mod tripay;

pub use doku::{DokuConfig, DokuProvider};
pub use midtrans::{MidtransConfig, MidtransProvider};
pub use tripay::{TripayConfig, TripayProvider};
