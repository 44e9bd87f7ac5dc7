// Caller-owned buffer cache
//
// Finished downloads keyed by resource, quality and track, so a front end
// can offer "save again" without refetching. Nothing in the core holds one
// implicitly; callers pass it in.

use std::collections::HashMap;

use super::models::TrackKind;
use super::orchestrator::DownloadOutput;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource_id: String,
    pub quality: String,
    pub track: TrackKind,
}

impl CacheKey {
    pub fn new(resource_id: impl Into<String>, quality: impl Into<String>, track: TrackKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            quality: quality.into(),
            track,
        }
    }
}

/// Whole outputs are kept so a hit reports the same container, merge and
/// fallback details as the original download
#[derive(Debug, Default)]
pub struct BufferCache {
    entries: HashMap<CacheKey, DownloadOutput>,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloning an output shares its buffer
    pub fn get(&self, key: &CacheKey) -> Option<DownloadOutput> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, output: DownloadOutput) {
        self.entries.insert(key, output);
    }

    /// Drop every entry for one resource (e.g., the user entered a new URL)
    pub fn clear_resource(&mut self, resource_id: &str) {
        self.entries.retain(|key, _| key.resource_id != resource_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn output(resource_id: &str, bytes: &[u8]) -> DownloadOutput {
        DownloadOutput {
            resource_id: resource_id.to_string(),
            title: "t".to_string(),
            quality: "720p".to_string(),
            track: TrackKind::VideoAudio,
            container: "mp4".to_string(),
            bytes: Arc::from(bytes),
            merged: false,
            fell_back_from: None,
        }
    }

    #[test]
    fn test_clear_resource() {
        let mut cache = BufferCache::new();
        cache.insert(CacheKey::new("a", "720p", TrackKind::VideoAudio), output("a", b"1"));
        cache.insert(CacheKey::new("a", "highest", TrackKind::Audio), output("a", b"2"));
        cache.insert(CacheKey::new("b", "720p", TrackKind::VideoAudio), output("b", b"3"));

        cache.clear_resource("a");

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::new("a", "720p", TrackKind::VideoAudio)).is_none());
        let hit = cache.get(&CacheKey::new("b", "720p", TrackKind::VideoAudio)).unwrap();
        assert_eq!(&hit.bytes[..], b"3");
    }
}
