//! Future combinators and helpers.
//!
//! The centrepiece is [`each_series`], which runs units of work strictly one
//! after another and collects their results in order. Around it sit the
//! smaller helpers: concurrent joins that report every failure, adapters for
//! callback-style functions, outcome taps, timers, and future-returning
//! assertions.

pub mod assert;
pub mod callback;
pub mod error;
pub mod series;
pub mod settle;
pub mod timing;

pub use assert::{assert_null, assert_true};
pub use callback::{adapt, from_callback, Adapted, Callback, CallbackStrategy, Settler};
pub use error::{AdaptError, AllCatchError, AssertionError, DebounceError};
pub use series::{all_catch, each_series};
pub use settle::SettleExt;
pub use timing::{debounce, delay, Debounced, DebouncedCall};
