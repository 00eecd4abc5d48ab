//! The four state stores.
//!
//! Each store owns one persisted slice and the ephemeral fields that go with it. Stores are
//! plain structs mutated through `&mut self`; every mutation saves the store's slice before
//! returning.

pub mod assistant;
pub mod booking;
pub mod enhanced;
pub mod pharmacy;

pub use assistant::{AssistantSlice, AssistantStore};
pub use booking::{BookingSlice, BookingStore};
pub use enhanced::{EnhancedSlice, EnhancedStore};
pub use pharmacy::{PharmacySlice, PharmacyStore};
