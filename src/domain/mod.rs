mod account;
mod consumption;
mod ledger;
mod money;
mod pricing;
mod statement;
mod transaction;

pub use account::*;
pub use consumption::*;
pub use ledger::*;
pub use money::*;
pub use pricing::*;
pub use statement::*;
pub use transaction::*;
