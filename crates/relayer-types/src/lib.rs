#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types shared by every crate in the bridge relayer.
//!
//! This crate is deliberately chain-agnostic: it defines the normalized event and
//! state-machine types the relayer reasons about (see [`event`] and [`record`]), the
//! [`gateway::ChainGateway`] trait that chain-specific crates implement, and the
//! cross-cutting config/error/retry primitives the rest of the workspace builds on.
//!
//! # Modules
//!
//! - [`chain_id`] - CAIP-2-style chain identifiers
//! - [`config`] - shared configuration primitives (`RpcConfig`, secret resolution)
//! - [`error`] - the relayer-wide error taxonomy (`spec.md` §7)
//! - [`event`] - `BridgeEvent` and `EventKind`
//! - [`gateway`] - the `ChainGateway` trait and its call/receipt types
//! - [`record`] - `ProcessingRecord`, `Cursor`, `QuoteResult`
//! - [`retry`] - the data-bearing `RetryPolicy` value
//! - [`timestamp`] - Unix timestamp wrapper

pub mod chain_id;
pub mod config;
pub mod error;
pub mod event;
pub mod gateway;
pub mod record;
pub mod retry;
pub mod timestamp;

pub use chain_id::ChainId;
pub use error::{GatewayError, RelayError};
pub use event::{BridgeEvent, ChainAddress, EventKind, TargetTokenId};
pub use gateway::{ChainCall, ChainGateway, EventKindFilter, PendingTxId, QuoteAmount, TxReceipt, TxStatus};
pub use record::{Cursor, ProcessingRecord, ProcessingStatus, QuoteResult};
pub use retry::RetryPolicy;
pub use timestamp::UnixTimestamp;
