//! Swap strategy: how much to swap, whether the wallet can fund it, and
//! which way each pair goes next. Pure in-memory logic, no I/O.

pub mod direction;
pub mod gate;
pub mod ranges;

pub use direction::DirectionBook;
pub use gate::{BalanceGate, GateDecision};
pub use ranges::{AmountRange, AmountRangeStore};
