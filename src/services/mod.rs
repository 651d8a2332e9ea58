//! Service layer for BlogHarvest business logic.
//!
//! This module contains domain logic separated from UI concerns.
//! Services emit events over channels so the CLI (or any other frontend)
//! can render progress without the services knowing about terminals.

pub mod harvest;

pub use harvest::{HarvestConfig, HarvestEvent, HarvestResult, HarvestService};
