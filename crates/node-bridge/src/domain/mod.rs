//! # Domain Module
//!
//! Bridge entities and the logic that turns raw node messages into them:
//! status mirroring, ledger update reassembly, output unwrapping and PoW.

pub mod entities;
pub mod events;
pub mod ledger;
pub mod output;
pub mod pow;
pub mod status;

pub use entities::*;
pub use events::BridgeEvents;
pub use ledger::{unwrap_accepted_transaction, BatchContext, LedgerUpdateAssembler};
pub use output::unwrap_output;
pub use pow::{do_pow, work_score, PowMiner, TipRefresher, NONCE_BYTES};
pub use status::{protocol_parameters_from_raw, StatusCache, StatusUpdate};
