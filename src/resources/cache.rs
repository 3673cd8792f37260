//! Texture cache keyed by the content of the source stream.
//!
//! Materials loading the same file get proxies sharing one texture. The cache
//! keeps tokens rather than proxies so it never holds the device alive.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use xxhash_rust::xxh3::xxh3_64;

use crate::backend::types::{TextureDescriptor, ViewKind};
use crate::device::GraphicsDevice;
use crate::error::GraphicsResult;
use crate::resources::arena::ResourceToken;
use crate::resources::proxy::ResourceViewProxy;

struct CacheEntry {
    resource: ResourceToken,
    descriptor: TextureDescriptor,
    view: Option<ResourceToken>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.resource.is_live() && self.view.as_ref().map_or(true, ResourceToken::is_live)
    }

    fn proxy(&self, device: &Arc<GraphicsDevice>) -> ResourceViewProxy {
        ResourceViewProxy::from_shared(
            Arc::clone(device),
            self.resource.share(),
            self.descriptor.clone(),
            self.view.as_ref().map(ResourceToken::share),
        )
    }

    fn release(self) {
        if let Some(view) = self.view {
            view.release();
        }
        self.resource.release();
    }
}

/// Content hash of the stream and whether mip generation was disabled.
type CacheKey = (u64, bool);

/// Deduplicates textures decoded from identical byte streams.
#[derive(Default)]
pub struct TextureCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Proxy for the texture decoded from `bytes`, decoding it on first use.
    pub fn get_or_create(
        &self,
        device: &Arc<GraphicsDevice>,
        bytes: &[u8],
        disable_auto_mip_gen: bool,
    ) -> GraphicsResult<ResourceViewProxy> {
        let key = (xxh3_64(bytes), disable_auto_mip_gen);
        let stale = {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get(&key).filter(|entry| entry.is_live()) {
                log::trace!("TextureCache: hit {:016x}", key.0);
                return Ok(entry.proxy(device));
            }
            entries.remove(&key)
        };
        if let Some(stale) = stale {
            stale.release();
        }

        let mut proxy = ResourceViewProxy::new(Some(Arc::clone(device)));
        proxy.create_from_stream(Some(bytes), disable_auto_mip_gen)?;
        let (Some(resource), Some(descriptor)) = (proxy.resource_token(), proxy.descriptor()) else {
            return Ok(proxy);
        };
        let entry = CacheEntry {
            resource: resource.share(),
            descriptor: descriptor.clone(),
            view: proxy.view_token(ViewKind::ShaderResource).map(ResourceToken::share),
        };

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key).filter(|existing| existing.is_live()) {
            // Another thread decoded the same stream first
            let shared = existing.proxy(device);
            drop(entries);
            entry.release();
            return Ok(shared);
        }
        log::debug!(
            "TextureCache: cached {:016x} ({}x{}, {} mips)",
            key.0,
            descriptor.width,
            descriptor.height,
            descriptor.mip_levels
        );
        if let Some(replaced) = entries.insert(key, entry) {
            replaced.release();
        }
        Ok(proxy)
    }

    /// Drop entries whose texture is referenced by the cache alone.
    ///
    /// Returns the number of entries removed.
    pub fn purge_unused(&self) -> usize {
        let unused: Vec<CacheEntry> = {
            let mut entries = self.entries.lock();
            let keys: Vec<CacheKey> = entries
                .iter()
                .filter(|(_, entry)| !entry.is_live() || entry.resource.ref_count() == 1)
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| entries.remove(key)).collect()
        };
        let count = unused.len();
        for entry in unused {
            entry.release();
        }
        if count > 0 {
            log::debug!("TextureCache: purged {count} unused textures");
        }
        count
    }

    /// Release every entry.
    pub fn clear(&self) {
        let drained: Vec<CacheEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.release();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("entries", &self.len())
            .finish()
    }
}
