//! Behavioural tests for spatial derivation.

use std::{cell::RefCell, fs, path::PathBuf};

use feedstore_core::{FailureKind, ResourceKind};
use feedstore_data::spatial::DerivedOutcome;
use feedstore_data::{
    FeedStore, ImportOptions, SpatialError, SpatialReport, StoreOptions, derive_spatial,
    import_resource,
};
use geo::{Geometry, LineString, Point};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

mod support;

/// Scenario state: the store under test and the last derivation result.
struct SpatialWorld {
    store: RefCell<Option<FeedStore>>,
    result: RefCell<Option<Result<SpatialReport, SpatialError>>>,
}

impl SpatialWorld {
    fn new() -> Self {
        Self {
            store: RefCell::new(None),
            result: RefCell::new(None),
        }
    }

    fn open(&self, options: StoreOptions) {
        let store = FeedStore::open_in_memory(options).expect("open store");
        self.store.replace(Some(store));
    }

    fn seed(&self, kind: ResourceKind, text: &str) {
        let mut guard = self.store.borrow_mut();
        let store = guard.as_mut().expect("store opened");
        import_resource(store, kind, text.as_bytes(), &ImportOptions::default())
            .unwrap_or_else(|err| panic!("failed to seed {kind}: {err}"));
    }

    fn with_store<T>(&self, action: impl FnOnce(&mut FeedStore) -> T) -> T {
        let mut guard = self.store.borrow_mut();
        action(guard.as_mut().expect("store opened"))
    }

    fn report(&self) -> SpatialReport {
        self.result
            .borrow()
            .as_ref()
            .expect("derivation was attempted")
            .as_ref()
            .map(Clone::clone)
            .unwrap_or_else(|err| panic!("derivation failed: {err}"))
    }

    fn error_kind(&self) -> FailureKind {
        match self.result.borrow().as_ref().expect("derivation was attempted") {
            Ok(report) => panic!("expected a failure, got {report:?}"),
            Err(err) => err.kind(),
        }
    }
}

#[fixture]
fn world() -> SpatialWorld {
    SpatialWorld::new()
}

#[given("a spatial store holding two stops")]
fn spatial_store_with_stops(world: &SpatialWorld) {
    world.open(StoreOptions::spatial());
    world.seed(ResourceKind::Stops, support::STOPS);
}

#[given("shape A1 with three points listed out of order")]
fn unordered_shape(world: &SpatialWorld) {
    world.seed(
        ResourceKind::Shapes,
        "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
         A1,40.3,-73.7,30\nA1,40.1,-73.9,10\nA1,40.2,-73.8,20\n",
    );
}

#[given("geometry tables have been derived")]
fn derived_once(world: &SpatialWorld) {
    world
        .with_store(derive_spatial)
        .unwrap_or_else(|err| panic!("first derivation failed: {err}"));
}

#[given("a row has been deleted from stops_geo")]
fn perturb_stops_geo(world: &SpatialWorld) {
    world.with_store(|store| {
        store
            .connection()
            .execute("DELETE FROM stops_geo WHERE stop_id = 'S1'", [])
            .expect("delete derived row");
    });
}

#[given("a store opened without spatial support")]
fn plain_store(world: &SpatialWorld) {
    world.open(StoreOptions::default());
}

#[given("a spatial store holding a stop with an unreadable latitude")]
fn garbage_store(world: &SpatialWorld) {
    world.open(StoreOptions::spatial());
    world.seed(
        ResourceKind::Stops,
        "stop_id,stop_name,stop_lat,stop_lon\nS1,Main St,40.1,-73.9\nS2,Oak Ave,n/a,-73.8\n",
    );
}

#[when("geometry tables are derived")]
fn derive(world: &SpatialWorld) {
    let outcome = world.with_store(derive_spatial);
    world.result.replace(Some(outcome));
}

#[then("stops_geo holds a point for each stop")]
fn stop_points(world: &SpatialWorld) {
    assert_eq!(
        world.report().outcome("stops_geo"),
        Some(DerivedOutcome::Rebuilt { rows: 2 })
    );
    world.with_store(|store| {
        assert_eq!(
            support::geometry_at(store, "SELECT geom FROM stops_geo WHERE stop_id = 'S1'"),
            Geometry::Point(Point::new(-73.9, 40.1))
        );
        assert_eq!(
            support::geometry_at(store, "SELECT geom FROM stops_geo WHERE stop_id = 'S2'"),
            Geometry::Point(Point::new(-73.8, 40.2))
        );
    });
}

#[then("shapes_geo holds a three point line for A1")]
fn shape_line(world: &SpatialWorld) {
    assert_eq!(
        world.report().outcome("shapes_geo"),
        Some(DerivedOutcome::Rebuilt { rows: 1 })
    );
    world.with_store(|store| {
        assert_eq!(
            support::geometry_at(store, "SELECT geom FROM shapes_geo WHERE shape_id = 'A1'"),
            Geometry::LineString(LineString::from(vec![
                (-73.9, 40.1),
                (-73.8, 40.2),
                (-73.7, 40.3)
            ]))
        );
    });
}

#[then("stops_geo is reported as rebuilt with 2 rows")]
fn stops_rebuilt(world: &SpatialWorld) {
    assert_eq!(
        world.report().outcome("stops_geo"),
        Some(DerivedOutcome::Rebuilt { rows: 2 })
    );
    world.with_store(|store| assert_eq!(store.count("stops_geo").expect("count"), 2));
}

#[then("stops_geo is reported as fresh")]
fn stops_fresh(world: &SpatialWorld) {
    assert_eq!(
        world.report().outcome("stops_geo"),
        Some(DerivedOutcome::Fresh { rows: 2 })
    );
}

#[then("derivation fails because the extension is unavailable")]
fn extension_unavailable(world: &SpatialWorld) {
    assert_eq!(world.error_kind(), FailureKind::ExtensionUnavailable);
}

#[then("derivation fails with a consistency error")]
fn consistency_failure(world: &SpatialWorld) {
    assert_eq!(world.error_kind(), FailureKind::Consistency);
}

#[then("no stops_geo table is left behind")]
fn no_partial_table(world: &SpatialWorld) {
    world.with_store(|store| {
        assert!(!store.has_table("stops_geo").expect("introspect"));
    });
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/spatial.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "deriving stop points",
            "deriving an ordered shape line",
            "refreshing a perturbed derived table",
            "leaving fresh tables untouched",
            "deriving without the geometry extension",
            "rejecting garbage coordinates",
        ]
    );
}

#[scenario(path = "tests/features/spatial.feature", index = 0)]
fn deriving_stop_points(world: SpatialWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/spatial.feature", index = 1)]
fn deriving_shape_line(world: SpatialWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/spatial.feature", index = 2)]
fn refreshing_perturbed_table(world: SpatialWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/spatial.feature", index = 3)]
fn leaving_fresh_tables(world: SpatialWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/spatial.feature", index = 4)]
fn deriving_without_extension(world: SpatialWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/spatial.feature", index = 5)]
fn rejecting_garbage_coordinates(world: SpatialWorld) {
    let _ = world;
}
