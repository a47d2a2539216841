//! Address registry for junkmail.
//!
//! The registry is the durable side of the dual store: one row per address
//! with its creation time and message counter. It does not expire with the
//! messages it counts.

mod repository;
mod types;

pub use repository::AddressRepository;
pub use types::{AddressRecord, RegistryStats};
