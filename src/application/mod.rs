// Application layer - use cases and orchestration.
// Each component owns a clone of the repository handle; `WalletService`
// wires them together for the CLI.

pub mod consumption;
pub mod error;
pub mod ledger;
pub mod recharge;
pub mod service;
pub mod statement;

pub use consumption::{ConsumptionRecorder, DailyEntry, RecordOutcome};
pub use error::*;
pub use ledger::LedgerStore;
pub use recharge::RechargeProcessor;
pub use service::{AccountInfo, ServiceOptions, WalletService};
pub use statement::StatementBuilder;
