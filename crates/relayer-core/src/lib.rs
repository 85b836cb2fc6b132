//! Event Source, Finality Gate, Dispatcher, Action Executor, and Swap Protection —
//! the processing pipeline of `spec.md` §4.2-§4.7, wired per-direction in
//! [`pipeline`].

pub mod auth;
pub mod dispatcher;
pub mod event_source;
pub mod executor;
pub mod pipeline;
pub mod swap;

pub use auth::{AuthBinding, AuthError, AuthSigner, EcdsaAuthSigner};
pub use dispatcher::Dispatcher;
pub use event_source::{EventSource, FinalityPolicy};
pub use executor::{ActionExecutor, ExecutionOutcome};
pub use pipeline::{spawn_direction, DirectionConfig};
pub use swap::{min_out, validate_slippage_bps, SlippageConfigError, MAX_SLIPPAGE_BPS};
