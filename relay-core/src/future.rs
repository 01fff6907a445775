//! Shared future aliases.
//!
//! # Why
//! `Channel::closed()`, executor `JoinHandle`s, and bootstrap `bind`/`connect` all need to hand
//! back a boxed, object-safe future without pulling in the `futures` crate for two type aliases.
use alloc::boxed::Box;
use core::{future::Future, pin::Pin};

/// A `Send` future boxed for storage behind a trait object, e.g. as a `Channel` method return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// As [`BoxFuture`] but without the `Send` bound, for futures pinned to one executor thread.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
