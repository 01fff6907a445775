use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use spin::Mutex;

/// A per-channel type-keyed bag for attaching arbitrary side-state to a channel (TLS session
/// info, a rate limiter, request-scoped correlation ids) without growing [`super::Channel`]'s own
/// fields for every collaborator's needs. Modeled on `http::Extensions`.
///
/// Backed by a linear `Vec` rather than a hash map — a channel typically carries a handful of
/// extensions at most, and `TypeId` doesn't implement `Hash`-map-friendly ordering in every Rust
/// edition this crate targets, so a scan avoids pulling in an extra dependency for it.
#[derive(Default)]
pub struct ExtensionsMap {
    entries: Mutex<Vec<(TypeId, Box<dyn Any + Send + Sync>)>>,
}

impl ExtensionsMap {
    pub fn new() -> Self {
        Self { entries: Mutex::new(Vec::new()) }
    }

    /// Inserts `value`, replacing and returning any prior value of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<T> {
        let type_id = TypeId::of::<T>();
        let mut entries = self.entries.lock();
        if let Some(slot) = entries.iter_mut().find(|(id, _)| *id == type_id) {
            let previous = core::mem::replace(&mut slot.1, Box::new(value));
            return previous.downcast::<T>().ok().map(|boxed| *boxed);
        }
        entries.push((type_id, Box::new(value)));
        None
    }

    /// Removes and returns the value of type `T`, if present.
    pub fn remove<T: Any + Send + Sync>(&self) -> Option<T> {
        let type_id = TypeId::of::<T>();
        let mut entries = self.entries.lock();
        let index = entries.iter().position(|(id, _)| *id == type_id)?;
        let (_, boxed) = entries.remove(index);
        boxed.downcast::<T>().ok().map(|boxed| *boxed)
    }

    /// `true` if a value of type `T` is present.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.entries.lock().iter().any(|(id, _)| *id == type_id)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Runs `f` with a reference to the value of type `T`, if present. A closure rather than a
    /// borrowed return value, since the backing `Mutex` guard can't outlive this call.
    pub fn with<T: Any + Send + Sync, R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let entries = self.entries.lock();
        let value = entries
            .iter()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .and_then(|(_, boxed)| boxed.downcast_ref::<T>());
        f(value)
    }
}
