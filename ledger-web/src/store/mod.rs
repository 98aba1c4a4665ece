//! Repositories over the SQLite pool

pub mod activity;
pub mod ledger;
pub mod provinces;
pub mod users;

pub use activity::{ActivityLogRepository, NewAuditEntry};
pub use ledger::{LedgerRepository, MonthlyUserCount, UserEntryCount};
pub use provinces::ProvinceRepository;
pub use users::{UserListFilter, UserRepository};
