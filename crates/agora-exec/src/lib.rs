//! The transactional action executor for the Agora simulation.
//!
//! # Modules
//!
//! - [`interpreter`] -- Validation, dispatch, and the per-kind handlers
//! - [`ledger`] -- The pending-trade ledger
//! - [`error`] -- Handler-internal fault types (never escape `execute`)

pub mod error;
pub mod interpreter;
pub mod ledger;

pub use error::ExecError;
pub use interpreter::ActionInterpreter;
pub use ledger::TradeLedger;
