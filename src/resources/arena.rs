//! Reference-counted ownership of native GPU handles.
//!
//! Every texture and view created through a [`ResourceViewProxy`] is acquired
//! by a [`ResourceArena`], which hands out move-only [`ResourceToken`]s. A
//! handle is destroyed on the backend exactly once, when the last token
//! referring to it is released or when the arena is torn down with
//! [`ResourceArena::release_all`].
//!
//! [`ResourceViewProxy`]: crate::resources::ResourceViewProxy

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{GpuBackend, NativeHandle, TextureHandle, TextureViewHandle};

struct ArenaEntry {
    handle: NativeHandle,
    refs: AtomicUsize,
    released: AtomicBool,
}

struct ArenaShared {
    backend: Arc<dyn GpuBackend>,
    entries: Mutex<HashMap<NativeHandle, Arc<ArenaEntry>>>,
}

impl ArenaShared {
    /// Destroy the entry's handle unless someone already did.
    fn free(&self, entry: &ArenaEntry) {
        if entry.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.entries.lock().remove(&entry.handle);
        log::trace!("ResourceArena: releasing {:?}", entry.handle);
        self.backend.destroy(entry.handle);
    }
}

/// Owner of native handles, shared by all proxies of a device.
///
/// Cloning the arena clones a reference to the same state.
#[derive(Clone)]
pub struct ResourceArena {
    shared: Arc<ArenaShared>,
}

impl ResourceArena {
    /// Create an arena releasing handles on `backend`.
    pub fn new(backend: Arc<dyn GpuBackend>) -> Self {
        Self {
            shared: Arc::new(ArenaShared {
                backend,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Take ownership of a freshly created handle.
    pub fn acquire(&self, handle: impl Into<NativeHandle>) -> ResourceToken {
        let handle = handle.into();
        let mut entries = self.shared.entries.lock();
        let entry = match entries.get(&handle) {
            Some(existing) => {
                log::error!("ResourceArena: {handle:?} acquired twice, sharing existing entry");
                existing.refs.fetch_add(1, Ordering::AcqRel);
                Arc::clone(existing)
            }
            None => {
                let entry = Arc::new(ArenaEntry {
                    handle,
                    refs: AtomicUsize::new(1),
                    released: AtomicBool::new(false),
                });
                entries.insert(handle, Arc::clone(&entry));
                entry
            }
        };
        drop(entries);

        log::trace!("ResourceArena: acquired {handle:?}");
        ResourceToken {
            entry,
            shared: Arc::clone(&self.shared),
            held: true,
        }
    }

    /// Add a reference to the handle behind `token`.
    ///
    /// Sharing a token whose handle was already torn down by
    /// [`release_all`](Self::release_all) yields another dead token.
    pub fn share(&self, token: &ResourceToken) -> ResourceToken {
        token.share()
    }

    /// Drop one reference; the handle is destroyed when the count reaches zero.
    pub fn release(&self, token: ResourceToken) {
        token.release();
    }

    /// Destroy every handle still owned by the arena.
    ///
    /// Outstanding tokens become dead; releasing them later is a no-op.
    /// Calling this again is a no-op as well.
    pub fn release_all(&self) {
        let drained: Vec<Arc<ArenaEntry>> = {
            let mut entries = self.shared.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        if drained.is_empty() {
            return;
        }
        log::debug!("ResourceArena: releasing {} tracked handles", drained.len());

        // Views go before the textures they were made from
        let (views, textures): (Vec<_>, Vec<_>) = drained
            .into_iter()
            .partition(|entry| matches!(entry.handle, NativeHandle::View(_)));
        for entry in views.iter().chain(textures.iter()) {
            if !entry.released.swap(true, Ordering::AcqRel) {
                self.shared.backend.destroy(entry.handle);
            }
        }
    }

    /// Number of handles currently owned.
    pub fn tracked_count(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Outstanding references to the handle behind `token`.
    pub fn ref_count(&self, token: &ResourceToken) -> usize {
        token.ref_count()
    }

    /// Whether the handle behind `token` has not been destroyed yet.
    pub fn is_live(&self, token: &ResourceToken) -> bool {
        token.is_live()
    }

    /// Whether the arena still owns `handle`.
    pub fn contains(&self, handle: impl Into<NativeHandle>) -> bool {
        self.shared.entries.lock().contains_key(&handle.into())
    }

    /// Backend the arena releases handles on.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.shared.backend
    }
}

impl std::fmt::Debug for ResourceArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceArena")
            .field("backend", &self.shared.backend.name())
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

/// One counted reference to an arena-owned handle.
///
/// Tokens are not `Clone`: a second reference comes from
/// [`ResourceArena::share`], and [`ResourceArena::release`] consumes the token.
/// A token dropped without being released is released by its destructor.
#[must_use = "dropping a token releases its reference"]
pub struct ResourceToken {
    entry: Arc<ArenaEntry>,
    shared: Arc<ArenaShared>,
    held: bool,
}

impl ResourceToken {
    /// The native handle this token refers to.
    pub fn handle(&self) -> NativeHandle {
        self.entry.handle
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.entry.handle.as_texture()
    }

    pub fn view(&self) -> Option<TextureViewHandle> {
        self.entry.handle.as_view()
    }

    /// Whether the handle has not been destroyed yet.
    pub fn is_live(&self) -> bool {
        !self.entry.released.load(Ordering::Acquire)
    }

    /// Number of outstanding references to the handle.
    pub fn ref_count(&self) -> usize {
        self.entry.refs.load(Ordering::Acquire)
    }

    /// Add a reference to the same handle.
    pub fn share(&self) -> ResourceToken {
        self.entry.refs.fetch_add(1, Ordering::AcqRel);
        ResourceToken {
            entry: Arc::clone(&self.entry),
            shared: Arc::clone(&self.shared),
            held: true,
        }
    }

    /// Give up this reference.
    pub fn release(mut self) {
        self.release_ref();
    }

    fn release_ref(&mut self) {
        if !std::mem::replace(&mut self.held, false) {
            return;
        }
        if self.entry.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.free(&self.entry);
        }
    }
}

impl Drop for ResourceToken {
    fn drop(&mut self) {
        if self.held && self.is_live() {
            log::warn!(
                "ResourceToken for {:?} dropped without release",
                self.entry.handle
            );
        }
        self.release_ref();
    }
}

impl std::fmt::Debug for ResourceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceToken")
            .field("handle", &self.entry.handle)
            .field("refs", &self.ref_count())
            .field("live", &self.is_live())
            .finish()
    }
}

static_assertions::assert_impl_all!(ResourceArena: Send, Sync);
static_assertions::assert_impl_all!(ResourceToken: Send, Sync);
