//! Request and response types for API handlers

pub mod admin;
pub mod common;
pub mod ledger;

pub use admin::*;
pub use common::*;
pub use ledger::*;
