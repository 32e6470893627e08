//! Attendance session lifecycle: check-in, checkout, overdue detection and auto-checkout.

pub mod clock;
pub mod duration;
pub mod error;
pub mod lateness;
pub mod lifecycle;
pub mod locks;
#[cfg(test)]
pub mod memory;
pub mod mysql;
pub mod overdue;
pub mod shift_span;
pub mod store;
