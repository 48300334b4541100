//! PathCache and SpatialKey tests

#[cfg(test)]
mod tests {
    use janet_nav::{AreaMask, CachedPath, PathCache, SpatialKey, Vec3};
    use std::sync::Arc;

    fn key(x: f32) -> SpatialKey {
        SpatialKey::new(
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            AreaMask::WALKABLE,
            0.5,
        )
    }

    fn path(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn miss_is_not_an_error() {
        let cache = PathCache::new();
        assert!(cache.get(key(1.0)).is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn last_writer_wins() {
        let cache = PathCache::new();
        cache.set(key(1.0), path(2));
        cache.set(key(1.0), path(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(key(1.0)).map(|p| p.len()), Some(5));
    }

    #[test]
    fn purge_then_get_misses() {
        let cache = PathCache::new();
        cache.set(key(1.0), path(2));
        cache.set(key(2.0), path(3));
        assert_eq!(cache.purge_all(), 2);
        assert!(cache.is_empty());
        assert!(cache.get(key(1.0)).is_none());
        assert_eq!(cache.purge_count(), 1);
    }

    #[test]
    fn contains_does_not_count() {
        let cache = PathCache::new();
        cache.set(key(1.0), path(2));
        assert!(cache.contains(key(1.0)));
        assert!(!cache.contains(key(3.0)));
        assert_eq!(cache.hits() + cache.misses(), 0);
    }

    #[test]
    fn remove_drops_entry() {
        let cache = PathCache::new();
        cache.set(key(1.0), path(2));
        assert!(cache.remove(key(1.0)).is_some());
        assert!(cache.remove(key(1.0)).is_none());
        assert!(cache.get(key(1.0)).is_none());
    }

    #[test]
    fn readers_keep_their_copy_across_purge() {
        let cache = PathCache::new();
        cache.set(key(1.0), path(4));
        let held: CachedPath = cache.get(key(1.0)).unwrap();
        cache.purge_all();
        assert_eq!(held.len(), 4);
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[test]
    fn purge_is_safe_alongside_writers() {
        let cache = Arc::new(PathCache::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(key((t * 1_000 + i) as f32), path(2));
                    }
                })
            })
            .collect();
        for _ in 0..50 {
            cache.purge_all();
        }
        for w in writers {
            w.join().unwrap();
        }
        assert!(cache.len() <= 800);
        cache.purge_all();
        assert!(cache.is_empty());
    }
}
