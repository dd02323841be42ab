//! Core engine: swap attempts, nonce-safe submission and the run scheduler.

pub mod approval;
pub mod context;
pub mod executor;
pub mod quote;
pub mod scheduler;
pub mod swap;
pub mod wallet;

pub use context::{SwapContext, SwapSettings};
pub use scheduler::{ControllerState, DelayWindow, RunTicket, ScheduleController};
