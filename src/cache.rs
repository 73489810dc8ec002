use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::processing::buffer::PixelBuffer;

/// Identity of a decoded buffer within one blend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKey {
    Content,
    Variant(usize),
}

/// Session-scoped store of decoded pixel buffers.
///
/// Decoding an image into a flat buffer is the expensive part of a blend
/// recompute, so buffers are decoded once per key and handed out as `Arc`
/// clones for read-only use. The lock is held across the decode closure,
/// which serializes inserts per key and rules out duplicate decode races.
/// Cleared explicitly on session teardown; nothing survives the session.
#[derive(Debug, Default)]
pub struct BlendCache {
    entries: Mutex<HashMap<BufferKey, Arc<PixelBuffer>>>,
}

impl BlendCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: BufferKey) -> Option<Arc<PixelBuffer>> {
        self.entries
            .lock()
            .expect("blend cache poisoned")
            .get(&key)
            .cloned()
    }

    /// Returns the cached buffer for `key`, decoding it with `decode` on
    /// first use. A decode that yields `None` is not cached, so a later
    /// attempt may retry.
    pub fn get_or_insert_with(
        &self,
        key: BufferKey,
        decode: impl FnOnce() -> Option<PixelBuffer>,
    ) -> Option<Arc<PixelBuffer>> {
        let mut entries = self.entries.lock().expect("blend cache poisoned");
        if let Some(hit) = entries.get(&key) {
            return Some(Arc::clone(hit));
        }
        let decoded = Arc::new(decode()?);
        entries.insert(key, Arc::clone(&decoded));
        debug!(?key, "cached decoded pixel buffer");
        Some(decoded)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("blend cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every decoded buffer. Called when the user leaves the
    /// blending screen or the style set changes identity.
    pub fn clear(&self) {
        self.entries.lock().expect("blend cache poisoned").clear();
        debug!("blend cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(value: u8) -> PixelBuffer {
        PixelBuffer::from_raw(1, 1, vec![value, value, value, 255]).unwrap()
    }

    #[test]
    fn decodes_once_per_key() {
        let cache = BlendCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let hit = cache.get_or_insert_with(BufferKey::Variant(0), || {
                calls += 1;
                Some(tiny(9))
            });
            assert!(hit.is_some());
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_decode_is_not_cached() {
        let cache = BlendCache::new();
        assert!(
            cache
                .get_or_insert_with(BufferKey::Content, || None)
                .is_none()
        );
        assert!(cache.is_empty());
        let retry = cache.get_or_insert_with(BufferKey::Content, || Some(tiny(1)));
        assert!(retry.is_some());
    }

    #[test]
    fn clear_empties_the_session() {
        let cache = BlendCache::new();
        cache.get_or_insert_with(BufferKey::Content, || Some(tiny(1)));
        cache.get_or_insert_with(BufferKey::Variant(1), || Some(tiny(2)));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(BufferKey::Content).is_none());
    }
}
