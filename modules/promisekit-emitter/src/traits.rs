//! Core traits for the emitter.

use std::future::Future;
use std::marker::PhantomData;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A registered unit of work, invoked with a copy of the dispatch arguments.
///
/// Closures are registered through [`FnListener`]; implement this directly
/// for listeners that carry their own state.
#[async_trait]
pub trait Listener<A, T>: Send + Sync {
    async fn call(&self, args: A) -> Result<T>;
}

/// Adapts `Fn(A) -> impl Future<Output = Result<T>>` into a [`Listener`].
pub struct FnListener<F, Fut> {
    f: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnListener<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<A, T, F, Fut> Listener<A, T> for FnListener<F, Fut>
where
    A: Send + 'static,
    T: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    async fn call(&self, args: A) -> Result<T> {
        (self.f)(args).await
    }
}

/// Truthiness for the short-circuiting dispatch modes.
///
/// `emit_or` starts from [`Truthy::falsy`] and stops at the first truthy
/// result; `emit_and` starts from [`Truthy::truthy`] and stops at the first
/// falsy one.
pub trait Truthy {
    fn is_truthy(&self) -> bool;

    /// Canonical truthy value, the result of `emit_and` when nothing fails.
    fn truthy() -> Self;

    /// Canonical falsy value, the result of `emit_or` when nothing passes.
    fn falsy() -> Self;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }

    fn truthy() -> Self {
        true
    }

    fn falsy() -> Self {
        false
    }
}

/// JavaScript rules: `null`, `false`, `0`, `NaN` and `""` are falsy,
/// everything else (including empty arrays and objects) is truthy.
impl Truthy for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    fn truthy() -> Self {
        Value::Bool(true)
    }

    fn falsy() -> Self {
        Value::Bool(false)
    }
}
