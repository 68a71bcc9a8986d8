//! The key lifecycle engine: duration parsing, elapsed-time accounting,
//! device binding, computed access and the validation protocol.
//!
//! Everything in this crate is pure and synchronous. The caller supplies
//! the clock reading (one `now` per logical operation) and the records;
//! the engine returns decisions and mutations for the caller to persist.

pub mod access;
pub mod accountant;
pub mod duration;
pub mod protocol;

pub use access::{AppAccess, PlanLimits, app_access, can_manage_key, key_prefix_for, plan_limits, visible_keys};
pub use accountant::{compute_remaining_ms, freeze, persist_tick, remaining_secs};
pub use duration::parse_duration_ms;
pub use protocol::{KeyState, Outcome, ResultCode, key_state, validate};
