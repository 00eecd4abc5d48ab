//! # Sehati Core
//!
//! Client-side state layer for the Sehati healthcare app.
//!
//! This crate holds the app's domain state and the rules that govern it:
//! - Four stores, each persisting a whitelisted slice through a [`persistence::SliceStorage`]
//! - Simulated payment and pharmacist services behind async traits in [`services`]
//! - A keyword-driven medical assistant and health insights in [`assistant`]
//! - Cross-store flows (booking, post-visit follow-up, pharmacy ordering) in [`workflows`]
//!
//! **No UI or transport concerns**: rendering, navigation and network access belong to the
//! caller. Configuration is resolved once by the binary and passed in as [`CoreConfig`].

pub mod assistant;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod persistence;
pub mod services;
pub mod stores;
pub mod workflows;

pub use config::CoreConfig;
pub use error::{StoreError, StoreResult};
pub use persistence::{FileSliceStorage, MemorySliceStorage, SliceStorage};
pub use stores::{AssistantStore, BookingStore, EnhancedStore, PharmacyStore};
pub use workflows::{BookingReceipt, FamilyBookingDraft, HealthApp, OrderReceipt};

pub use sehati_ids::{EntityId, IdGenerator};
pub use sehati_types::{NonEmptyText, Stars};
