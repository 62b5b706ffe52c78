//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use murojaah_core::ports::{LedgerStore, RecapStore};
use murojaah_core::{ProgressLedger, RecapReader};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: ProgressLedger,
    pub recap: RecapReader,
}

impl AppState {
    pub fn new(ledger_store: Arc<dyn LedgerStore>, recap_store: Arc<dyn RecapStore>) -> Self {
        Self {
            ledger: ProgressLedger::new(ledger_store),
            recap: RecapReader::new(recap_store),
        }
    }
}
