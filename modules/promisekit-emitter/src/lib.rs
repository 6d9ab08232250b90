//! Prioritized async event emitter.
//!
//! Listeners register per event name and are dispatched strictly one at a
//! time through `promisekit_series::each_series`. Three dispatch modes share
//! the same ordering rule (untagged listeners in registration order, then
//! `Order::Last` listeners in registration order):
//!
//! - `emit` runs every listener and collects every result.
//! - `emit_or` stops at the first truthy result.
//! - `emit_and` stops at the first falsy result.
//!
//! Any listener failure ends the dispatch and reaches the caller as
//! `EmitError`; nothing is swallowed or retried.

pub mod config;
pub mod emitter;
pub mod error;
mod registry;
pub mod traits;
pub mod types;

pub use config::{load_config, EmitterConfig};
pub use emitter::{AsyncEventEmitter, ListenerHandle, WeakEmitter};
pub use error::{EmitError, EmitResult};
pub use traits::{FnListener, Listener, Truthy};
pub use types::{ListenerId, ListenerOptions, Order};
