//! Process-wide directory of bound local listeners, keyed by address name.
//!
//! A thin, purpose-built wrapper over a `DashMap` rather than exposing the map type directly, so
//! callers only see `bind`/`unbind`/`lookup`.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use relay_core::error::{CoreError, Result, codes};

use crate::channel::LocalListener;

static REGISTRY: OnceLock<DashMap<String, Arc<LocalListener>>> = OnceLock::new();
static NEXT_ANON_ID: AtomicU64 = AtomicU64::new(0);

fn registry() -> &'static DashMap<String, Arc<LocalListener>> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Mints a name no prior or later call in this process can collide with — the local-transport
/// counterpart of binding TCP to port 0, for resolving `TransportSocketAddr::Any` on bind.
pub fn mint_anonymous_name() -> String {
    let id = NEXT_ANON_ID.fetch_add(1, Ordering::Relaxed);
    format!("anon-{id}")
}

/// Registers `listener` under `name`. Fails if the name is already bound — local addresses are
/// unique for the lifetime of the process, the same way a TCP listener can't double-bind a port.
pub fn bind(name: impl Into<String>, listener: Arc<LocalListener>) -> Result<()> {
    let name = name.into();
    match registry().entry(name.clone()) {
        Entry::Occupied(_) => Err(CoreError::new(
            codes::CHANNEL_ALREADY_BOUND,
            format!("local address '{name}' is already bound"),
        )),
        Entry::Vacant(slot) => {
            slot.insert(listener);
            Ok(())
        }
    }
}

/// Removes a binding, e.g. when a [`LocalListener`] is closed.
pub fn unbind(name: &str) {
    registry().remove(name);
}

/// Looks up a bound listener by name, for [`crate::connector::LocalConnector::connect`].
pub fn lookup(name: &str) -> Option<Arc<LocalListener>> {
    registry().get(name).map(|entry| Arc::clone(entry.value()))
}
