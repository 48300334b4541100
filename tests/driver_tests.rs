//! NavDriver tests

#[cfg(all(test, feature = "server"))]
mod tests {
    use janet_nav::{
        AreaMask, Bounds, DriverConfig, NavConfig, NavDriver, NavEngine, PathStatus,
        SurfaceConfig, TraversalProfile, Vec3,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn make_engine() -> Arc<Mutex<NavEngine>> {
        let surface = SurfaceConfig {
            bounds: Bounds::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(20.0, 20.0, 5.0)),
            cell_size: 1.0,
            background_rebuild: false,
            ..Default::default()
        };
        let engine = NavEngine::new(NavConfig::default(), surface).unwrap();
        Arc::new(Mutex::new(engine))
    }

    #[test]
    fn run_ticks_drives_the_engine() {
        let engine = make_engine();
        let handle = {
            let mut e = engine.lock();
            let h = e
                .register_agent(
                    "a",
                    TraversalProfile {
                        area_mask: AreaMask::WALKABLE,
                        position: Vec3::new(1.5, 1.5, 0.0),
                    },
                )
                .unwrap();
            e.request_path(h, Vec3::new(15.5, 12.5, 0.0), AreaMask::WALKABLE)
                .unwrap();
            h
        };

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let driver = NavDriver::new(DriverConfig::default(), engine.clone()).with_events(tx);
        tokio_test::block_on(driver.run_ticks(5));

        assert_eq!(engine.lock().tick_count(), 5);
        assert!(matches!(
            engine.lock().poll(handle).unwrap(),
            PathStatus::Found { .. }
        ));

        // Admission and completion each produced an event; idle ticks did not.
        let mut frames = Vec::new();
        while let Ok(event) = rx.try_recv() {
            frames.push(event.frame);
        }
        assert_eq!(frames, vec![1, 2]);
    }

    #[test]
    fn full_channel_does_not_stall_ticks() {
        let engine = make_engine();
        {
            let mut e = engine.lock();
            for i in 0..4 {
                let h = e
                    .register_agent(
                        format!("a{}", i),
                        TraversalProfile {
                            area_mask: AreaMask::WALKABLE,
                            position: Vec3::new(1.5, 1.5 + i as f32 * 4.0, 0.0),
                        },
                    )
                    .unwrap();
                e.request_path(h, Vec3::new(18.5, 18.5, 0.0), AreaMask::WALKABLE)
                    .unwrap();
            }
        }

        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let driver = NavDriver::new(DriverConfig::default(), engine.clone()).with_events(tx);
        tokio_test::block_on(driver.run_ticks(10));
        assert_eq!(engine.lock().tick_count(), 10);
        assert_eq!(engine.lock().stats().queue_depth, 0);
    }
}
