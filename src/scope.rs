//! Scoped enter/exit guards.
//!
//! A [`ScopeGuard`] owns a context value produced by some "enter" step and an
//! exit action that consumes it. The exit action runs exactly once: either
//! when [`ScopeGuard::exit`] is called or when the guard is dropped, which
//! covers early returns through `?` and panic unwinding.
//!
//! Lock guards (exit = release) and scale-in protection guards (exit =
//! restore the prior flag) are both built on this type.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// RAII guard running an exit action over its context value.
pub struct ScopeGuard<'a, T> {
    value: Option<T>,
    on_exit: Option<Box<dyn FnOnce(T) + 'a>>,
}

impl<'a, T> ScopeGuard<'a, T> {
    /// Guard an already-entered context.
    pub fn new<F>(value: T, on_exit: F) -> Self
    where
        F: FnOnce(T) + 'a,
    {
        Self {
            value: Some(value),
            on_exit: Some(Box::new(on_exit)),
        }
    }

    /// Run `enter` and guard its result.
    ///
    /// If `enter` fails nothing was entered, so `on_exit` is dropped unused.
    pub fn enter<E, N, F>(enter: N, on_exit: F) -> Result<Self, E>
    where
        N: FnOnce() -> Result<T, E>,
        F: FnOnce(T) + 'a,
    {
        let value = enter()?;
        Ok(Self::new(value, on_exit))
    }

    /// Run the exit action now.
    pub fn exit(mut self) {
        self.run_exit();
    }

    fn run_exit(&mut self) {
        if let (Some(value), Some(on_exit)) = (self.value.take(), self.on_exit.take()) {
            on_exit(value);
        }
    }
}

/// Enter, run `body` with the context, and always exit afterwards.
pub fn guarded<'a, T, R, E, N, F, B>(enter: N, on_exit: F, body: B) -> Result<R, E>
where
    N: FnOnce() -> Result<T, E>,
    F: FnOnce(T) + 'a,
    B: FnOnce(&mut T) -> Result<R, E>,
{
    let mut guard = ScopeGuard::enter(enter, on_exit)?;
    let result = body(&mut *guard);
    guard.exit();
    result
}

impl<T> Deref for ScopeGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("scope value is present until exit"),
        }
    }
}

impl<T> DerefMut for ScopeGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("scope value is present until exit"),
        }
    }
}

impl<T> Drop for ScopeGuard<'_, T> {
    fn drop(&mut self) {
        self.run_exit();
    }
}

impl<T: fmt::Debug> fmt::Debug for ScopeGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
