//! Grid surface primitive tests

#[cfg(test)]
mod tests {
    use janet_nav::error::SurfaceError;
    use janet_nav::obstacle::Obstacle;
    use janet_nav::surface::{CorridorSearch, SearchStatus, WaypointFlags};
    use janet_nav::{
        AreaMask, Bounds, GridSurface, GridSurfaceBuilder, HeightField, NavSurface, ObstacleId,
        ObstacleShape, SurfaceConfig, Transform, Vec3,
    };
    use std::sync::Arc;

    fn bounds() -> Bounds {
        Bounds::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(40.0, 40.0, 5.0))
    }

    fn build(obstacles: &[Obstacle]) -> GridSurface {
        let config = SurfaceConfig {
            bounds: bounds(),
            cell_size: 1.0,
            max_climb: 0.6,
            ..Default::default()
        };
        GridSurfaceBuilder::new(&config).build_grid(obstacles, &bounds())
    }

    fn wall(id: u64) -> Obstacle {
        Obstacle {
            id: ObstacleId(id),
            shape: ObstacleShape::Box {
                half_extents: Vec3::new(0.5, 15.0, 1.0),
            },
            area: AreaMask::NOT_WALKABLE,
            transform: Transform::at(Vec3::new(20.5, 20.5, 0.0)),
        }
    }

    fn extents() -> Vec3 {
        Vec3::new(1.0, 1.0, 2.0)
    }

    fn search_to_end(
        surface: &GridSurface,
        from: Vec3,
        to: Vec3,
        budget: u32,
    ) -> (Box<dyn CorridorSearch>, SearchStatus, usize) {
        let a = surface.project(from, extents(), AreaMask::WALKABLE).unwrap();
        let b = surface.project(to, extents(), AreaMask::WALKABLE).unwrap();
        let mut search = surface.begin_search(a, b, AreaMask::WALKABLE);
        let mut calls = 0;
        loop {
            calls += 1;
            let status = search.advance(budget);
            if status != SearchStatus::InProgress || calls > 10_000 {
                return (search, status, calls);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Projection
    // -----------------------------------------------------------------------

    #[test]
    fn project_keeps_points_on_open_ground() {
        let s = build(&[]);
        let p = Vec3::new(3.3, 4.7, 0.5);
        let loc = s.project(p, extents(), AreaMask::WALKABLE).unwrap();
        assert_eq!(loc.position, Vec3::new(3.3, 4.7, 0.0));
    }

    #[test]
    fn project_snaps_to_nearest_open_cell() {
        let s = build(&[wall(1)]);
        let loc = s
            .project(Vec3::new(20.5, 20.5, 0.0), extents(), AreaMask::WALKABLE)
            .unwrap();
        // Edge of the open cell on either side of the wall.
        assert!(loc.position.x == 20.0 || loc.position.x == 21.0);
        assert_eq!(loc.position.y, 20.5);
    }

    #[test]
    fn project_fails_outside_extents() {
        let s = build(&[]);
        assert!(s
            .project(Vec3::new(5.0, 5.0, 4.0), extents(), AreaMask::WALKABLE)
            .is_none());
        assert!(s
            .project(Vec3::new(-3.0, 5.0, 0.0), extents(), AreaMask::WALKABLE)
            .is_none());
    }

    #[test]
    fn mask_filters_areas() {
        let water = AreaMask(0b10);
        let pond = Obstacle {
            id: ObstacleId(1),
            shape: ObstacleShape::Box {
                half_extents: Vec3::new(3.0, 3.0, 0.0),
            },
            area: water,
            transform: Transform::at(Vec3::new(10.0, 10.0, 0.0)),
        };
        let s = build(&[pond]);
        let centre = Vec3::new(10.0, 10.0, 0.0);
        assert!(s.project(centre, extents(), AreaMask::WALKABLE).is_none());
        assert!(s.project(centre, extents(), water).is_some());
        assert!(s.project(centre, extents(), AreaMask::ALL).is_some());
    }

    // -----------------------------------------------------------------------
    // Ray cast
    // -----------------------------------------------------------------------

    #[test]
    fn ray_cast_reaches_open_target() {
        let s = build(&[]);
        let hit = s.ray_cast(
            Vec3::new(1.5, 1.5, 0.0),
            Vec3::new(30.5, 20.5, 0.0),
            AreaMask::WALKABLE,
        );
        assert_eq!(hit, Some(Vec3::new(30.5, 20.5, 0.0)));
    }

    #[test]
    fn ray_cast_stops_at_wall() {
        let s = build(&[wall(1)]);
        assert!(s
            .ray_cast(
                Vec3::new(2.5, 20.5, 0.0),
                Vec3::new(37.5, 20.5, 0.0),
                AreaMask::WALKABLE
            )
            .is_none());
    }

    #[test]
    fn ray_cast_respects_climb_limit() {
        let plateau = Obstacle {
            id: ObstacleId(1),
            shape: ObstacleShape::HeightField(Arc::new(HeightField::flat(6, 6, 1.0, 1.5).unwrap())),
            area: AreaMask::WALKABLE,
            transform: Transform::at(Vec3::new(20.0, 20.0, 0.0)),
        };
        let s = build(&[plateau]);
        assert_eq!(s.height_at(Vec3::new(20.5, 20.5, 0.0)), Some(1.5));
        assert!(s
            .ray_cast(
                Vec3::new(10.5, 20.5, 0.0),
                Vec3::new(20.5, 20.5, 1.5),
                AreaMask::WALKABLE
            )
            .is_none());
        // On top of the plateau the ground is level again.
        assert!(s
            .ray_cast(
                Vec3::new(18.5, 18.5, 1.5),
                Vec3::new(21.5, 21.5, 1.5),
                AreaMask::WALKABLE
            )
            .is_some());
    }

    // -----------------------------------------------------------------------
    // Corridor search
    // -----------------------------------------------------------------------

    #[test]
    fn search_is_time_sliced() {
        let s = build(&[]);
        let (search, status, calls) =
            search_to_end(&s, Vec3::new(1.5, 1.5, 0.0), Vec3::new(30.5, 1.5, 0.0), 3);
        assert_eq!(status, SearchStatus::Success);
        assert!(calls > 5, "a 3-node budget cannot finish 30 cells in {} calls", calls);
        assert!(search.iterations() <= calls as u64 * 3);
    }

    #[test]
    fn search_fails_when_target_is_sealed() {
        let ring: Vec<Obstacle> = [
            (Vec3::new(30.0, 27.5, 0.0), Vec3::new(3.0, 0.5, 1.0)),
            (Vec3::new(30.0, 32.5, 0.0), Vec3::new(3.0, 0.5, 1.0)),
            (Vec3::new(27.5, 30.0, 0.0), Vec3::new(0.5, 3.0, 1.0)),
            (Vec3::new(32.5, 30.0, 0.0), Vec3::new(0.5, 3.0, 1.0)),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (p, half_extents))| Obstacle {
            id: ObstacleId(i as u64 + 1),
            shape: ObstacleShape::Box { half_extents },
            area: AreaMask::NOT_WALKABLE,
            transform: Transform::at(p),
        })
        .collect();
        let s = build(&ring);
        let (_, status, _) =
            search_to_end(&s, Vec3::new(2.5, 2.5, 0.0), Vec3::new(30.0, 30.0, 0.0), 256);
        assert_eq!(status, SearchStatus::Failure);
    }

    #[test]
    fn corridor_capacity_is_enforced() {
        let s = build(&[]);
        let (search, status, _) =
            search_to_end(&s, Vec3::new(1.5, 1.5, 0.0), Vec3::new(30.5, 1.5, 0.0), 64);
        assert_eq!(status, SearchStatus::Success);

        let mut out = Vec::new();
        assert!(matches!(
            search.corridor(&mut out, 8),
            Err(SurfaceError::BufferOverflow { capacity: 8, .. })
        ));
        search.corridor(&mut out, 256).unwrap();
        assert_eq!(out.len(), 30);
        assert_eq!(out[0].position, Vec3::new(1.5, 1.5, 0.0));
    }

    // -----------------------------------------------------------------------
    // Straight path
    // -----------------------------------------------------------------------

    #[test]
    fn straight_path_bends_around_wall() {
        let s = build(&[wall(1)]);
        let from = Vec3::new(2.5, 20.5, 0.0);
        let to = Vec3::new(37.5, 20.5, 0.0);
        let (search, status, _) = search_to_end(&s, from, to, 4_096);
        assert_eq!(status, SearchStatus::Success);

        let mut corridor = Vec::new();
        search.corridor(&mut corridor, 1_024).unwrap();
        let (mut points, mut flags) = (Vec::new(), Vec::new());
        s.straight_path(&corridor, from, to, AreaMask::WALKABLE, 64, &mut points, &mut flags)
            .unwrap();

        assert!(points.len() > 2);
        assert_eq!(points[0], from);
        assert_eq!(*points.last().unwrap(), to);
        assert!(flags[0].contains(WaypointFlags::START));
        assert!(flags.last().unwrap().contains(WaypointFlags::END));
        for pair in points.windows(2) {
            assert!(s.grid().line_clear(pair[0], pair[1], AreaMask::WALKABLE));
        }
    }

    #[test]
    fn straight_path_overflow_is_reported() {
        let s = build(&[wall(1)]);
        let from = Vec3::new(2.5, 20.5, 0.0);
        let to = Vec3::new(37.5, 20.5, 0.0);
        let (search, _, _) = search_to_end(&s, from, to, 4_096);
        let mut corridor = Vec::new();
        search.corridor(&mut corridor, 1_024).unwrap();

        let (mut points, mut flags) = (Vec::new(), Vec::new());
        let err = s
            .straight_path(&corridor, from, to, AreaMask::WALKABLE, 2, &mut points, &mut flags)
            .unwrap_err();
        assert_eq!(err, SurfaceError::BufferOverflow { needed: 3, capacity: 2 });
    }
}
