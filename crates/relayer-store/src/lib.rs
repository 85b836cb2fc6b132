//! The Dedup / State Store component of `spec.md` §4.4.
//!
//! [`traits::StateStore`] is the seam; [`memory::MemoryStateStore`] and
//! [`durable::SledStateStore`] are its two implementations, chosen by whether the
//! relayer's configuration names a `stateStorePath` (`spec.md` §6).

pub mod durable;
pub mod memory;
pub mod traits;

pub use durable::SledStateStore;
pub use memory::MemoryStateStore;
pub use traits::{ClaimOutcome, StateStore, StoreError, StoreStats};
