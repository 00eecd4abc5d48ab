//! Domain records held by the stores.
//!
//! These are plain serde records; all lifecycle rules live in the stores that own them.

pub mod assistant;
pub mod booking;
pub mod family;
pub mod follow_up;
pub mod medication;
pub mod pharmacy;
pub mod records;
