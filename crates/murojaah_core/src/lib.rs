pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod pages;
pub mod ports;
pub mod recap;

pub use domain::{
    DailyLog, DailyTotals, NewSessionDetail, PagePosition, Recommendation, SessionDetail,
    SessionStatus, StudentSummary, TargetRange,
};
pub use error::{LedgerError, LedgerResult};
pub use ledger::ProgressLedger;
pub use pages::{total_pages, PAGES_PER_JUZ};
pub use ports::{LedgerStore, LedgerTransaction, PortError, PortResult, RecapStore};
pub use recap::{DailyRecap, MentorDashboardEntry, MentorRollupRow, ProductivityStats, RecapReader};
