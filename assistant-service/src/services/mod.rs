//! Service layer: storage, metering, pricing, chat orchestration,
//! providers and metrics.

pub mod chat;
pub mod database;
pub mod ledger;
pub mod metrics;
pub mod pricing;
pub mod providers;

pub use database::Database;
pub use ledger::{DeductTokens, LedgerError, TokenLedger, WELCOME_BONUS_TOKENS};
pub use metrics::{get_metrics, init_metrics};
