//! HTTP request handlers for the ledger server
//!
//! Handlers are organized by functionality. Authentication handlers live in
//! [`crate::auth::handlers`].

pub mod admin;
pub mod health;
pub mod ledger;
pub mod meta;
pub mod types;

pub use admin::*;
pub use health::*;
pub use ledger::*;
pub use meta::*;

pub use types::*;
