use geo::{Intersects, Point, line_string};
use geomatch::compute::geometry::rect_polygon;
use geomatch::compute::spatial::{GridIndex, find_reachable_edges};
use geomatch::geohash_grid;
use geomatch::model::{
    Edge, EdgeCollection, EdgeId, ElementRef, EntityKind, Node, NodeCollection, Zone,
    ZoneCollection, category,
};
use geomatch::{Config, GeoMatchError, MatchResult, NetworkBuilder, SpatialNetwork};
use std::collections::BTreeSet;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn single_edge_network() -> SpatialNetwork {
    let edges: EdgeCollection = [Edge::from_line(
        "1",
        "2",
        line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)],
    )]
    .into_iter()
    .collect();

    NetworkBuilder::new()
        .config(Config::default().with_geohash_precision(6))
        .edges(edges)
        .build()
        .expect("Failed to build network")
}

#[test]
fn test_match_single_edge_scenario() {
    init_logging();
    let network = single_edge_network();

    let result = network
        .match_point_to_nearest_edge(114.305, 22.601)
        .expect("Match failed");
    let found = result.into_match().expect("Expected a matched edge");

    assert_eq!(found.edge, EdgeId::new("1", "2"));
    assert!((found.point.y() - 22.60).abs() <= 1e-6);
    assert!(found.point.x() >= 114.30 && found.point.x() <= 114.31);
    assert!((found.distance - 0.001).abs() < 1e-9);
    assert!(found.distance_meters > 100.0 && found.distance_meters < 120.0);
}

#[test]
fn test_match_distance_agrees_with_geometry() {
    let network = single_edge_network();
    let point = Point::new(114.3042, 22.6031);
    let found = network
        .match_point_to_nearest_edge(point.x(), point.y())
        .unwrap()
        .into_match()
        .unwrap();

    let line = network.edges().get(&found.edge).unwrap().line().unwrap();
    assert_eq!(
        found.distance,
        geomatch::compute::geometry::distance(&point, line)
    );
}

#[test]
fn test_zone_covering_four_cells() {
    let grid = GridIndex::new(&Config::default()).unwrap();
    let sw_cell = grid.cell_of(114.305, 22.601).unwrap();
    let ne_cell = geohash_grid::neighbor(
        &geohash_grid::neighbor(&sw_cell, geohash::Direction::N).unwrap(),
        geohash::Direction::E,
    )
    .unwrap();

    let sw = geohash_grid::cell_rect(&sw_cell).unwrap();
    let ne = geohash_grid::cell_rect(&ne_cell).unwrap();
    let zone = rect_polygon(sw.min().x, sw.min().y, ne.max().x, ne.max().y);

    let classification = grid.classify_polygon(&zone).unwrap();
    assert_eq!(classification.contains.len(), 4);
    assert!(classification.intersects.is_empty());
    assert!(classification.contains.contains(&sw_cell));
    assert!(classification.contains.contains(&ne_cell));
}

#[test]
fn test_cold_cell_bridges_two_rings() {
    init_logging();
    let config = Config::default();
    let probe = GridIndex::new(&config).unwrap();

    let query = (114.305, 22.601);
    let start = probe.cell_of(query.0, query.1).unwrap();
    let mut target = start.clone();
    for _ in 0..2 {
        target = geohash_grid::neighbor(&target, geohash::Direction::N).unwrap();
    }
    let rect = geohash_grid::cell_rect(&target).unwrap();
    let centre = rect.center();

    let far = Edge::from_line(
        "a",
        "b",
        line_string![
            (x: centre.x - rect.width() / 4.0, y: centre.y),
            (x: centre.x + rect.width() / 4.0, y: centre.y),
        ],
    );
    // Grid extent reaching from the query cell to the target cell.
    let extent: EdgeCollection = [Edge::from_line(
        "x",
        "y",
        line_string![(x: query.0 - 0.001, y: query.1), (x: query.0 + 0.001, y: centre.y)],
    )]
    .into_iter()
    .collect();

    let mut grid = GridIndex::from_edges(&extent, &config).unwrap();
    let edges: EdgeCollection = [far].into_iter().collect();
    assert!(grid.assign_edges(&edges).is_clean());

    let outcome = find_reachable_edges(&grid, &[start.as_str()], None).unwrap();
    assert_eq!(outcome.depth, 2);
    assert_eq!(outcome.edges, vec![EdgeId::new("a", "b")]);

    let result = geomatch::compute::spatial::match_point(
        &grid, &edges, query.0, query.1, 7, None,
    )
    .unwrap();
    assert_eq!(result.into_match().unwrap().edge, EdgeId::new("a", "b"));
}

#[test]
fn test_empty_grid_reports_no_reachable_edges() {
    let network = NetworkBuilder::new().build().unwrap();
    let result = network.match_point_to_nearest_edge(114.305, 22.601).unwrap();

    let cell = network.grid().cell_of(114.305, 22.601).unwrap();
    assert_eq!(result, MatchResult::NoReachableEdges { cell: cell.clone() });

    match network.require_match(114.305, 22.601) {
        Err(GeoMatchError::NoReachableEdges { cell: origin }) => assert_eq!(origin, cell),
        other => panic!("Expected NoReachableEdges, got {:?}", other),
    }
}

/// Ring distance between two cells of a rectangular grid, in cell steps.
fn ring_distance(a: &str, b: &str) -> usize {
    let ra = geohash_grid::cell_rect(a).unwrap();
    let rb = geohash_grid::cell_rect(b).unwrap();
    let dx = ((ra.min().x - rb.min().x) / ra.width()).round().abs() as usize;
    let dy = ((ra.min().y - rb.min().y) / ra.height()).round().abs() as usize;
    dx.max(dy)
}

#[test]
fn test_bridge_matches_brute_force_nearest_ring() {
    let config = Config::default();
    let extent: EdgeCollection = [Edge::from_line(
        "x",
        "y",
        line_string![(x: 114.25, y: 22.55), (x: 114.33, y: 22.60)],
    )]
    .into_iter()
    .collect();
    let mut grid = GridIndex::from_edges(&extent, &config).unwrap();

    let edges: EdgeCollection = [
        Edge::from_line("1", "2", line_string![(x: 114.3205, y: 22.5905), (x: 114.3207, y: 22.5906)]),
        Edge::from_line("3", "4", line_string![(x: 114.2605, y: 22.5605), (x: 114.2606, y: 22.5607)]),
        Edge::from_line("5", "6", line_string![(x: 114.2905, y: 22.5955), (x: 114.2907, y: 22.5956)]),
    ]
    .into_iter()
    .collect();
    assert!(grid.assign_edges(&edges).is_clean());

    let occupied: Vec<String> = grid
        .cells()
        .values()
        .map(|cell| cell.id().to_string())
        .filter(|id| !grid.edges_in_cell(id).is_empty())
        .collect();
    assert_eq!(occupied.len(), 3);

    for seed in grid.cells().ids().step_by(7) {
        let outcome = find_reachable_edges(&grid, &[seed.as_str()], None).unwrap();
        let nearest = occupied
            .iter()
            .map(|cell| ring_distance(seed, cell))
            .min()
            .unwrap();
        assert_eq!(outcome.depth, nearest, "seed {}", seed);

        let expected: BTreeSet<EdgeId> = occupied
            .iter()
            .filter(|cell| ring_distance(seed, cell) == nearest)
            .flat_map(|cell| grid.edges_in_cell(cell))
            .collect();
        let found: BTreeSet<EdgeId> = outcome.edges.into_iter().collect();
        assert!(found.is_superset(&expected), "seed {}", seed);
    }
}

#[test]
fn test_cell_properties_hold_across_precisions() {
    let samples = [
        (114.305, 22.601),
        (-74.006, 40.7128),
        (0.0, 0.0),
        (-179.9999, -89.9999),
        (179.9999, 89.9999),
    ];

    for precision in 1..=12 {
        for &(lon, lat) in &samples {
            let cell = geohash_grid::encode(lon, lat, precision).unwrap();
            assert_eq!(cell, geohash_grid::encode(lon, lat, precision).unwrap());

            let polygon = geohash_grid::cell_polygon(&cell).unwrap();
            assert!(polygon.intersects(&Point::new(lon, lat)));

        }
    }

    for precision in 1..=12 {
        let cell = geohash_grid::encode(114.305, 22.601, precision).unwrap();
        for neighbour in geohash_grid::neighbors(&cell).unwrap() {
            let back = geohash_grid::neighbors(&neighbour).unwrap();
            assert!(back.contains(&cell), "{} -> {}", cell, neighbour);
        }
    }
}

#[test]
fn test_zone_queries_through_network() {
    init_logging();
    let nodes: NodeCollection = [
        Node::new("a", 114.305, 22.605),
        Node::new("b", 114.335, 22.605),
        Node::new("c", 114.400, 22.605),
    ]
    .into_iter()
    .collect();
    let zones: ZoneCollection = [
        Zone::from_polygon("west", rect_polygon(114.29, 22.59, 114.32, 22.62)),
        Zone::from_polygon("east", rect_polygon(114.32, 22.59, 114.35, 22.62)),
    ]
    .into_iter()
    .collect();

    let mut network = NetworkBuilder::new()
        .nodes(nodes)
        .zones(zones)
        .build()
        .unwrap();

    assert_eq!(network.zone_containing(114.305, 22.605).unwrap().as_deref(), Some("west"));
    assert_eq!(network.zone_containing(114.400, 22.605).unwrap(), None);
    assert_eq!(network.neighboring_zones("east").unwrap(), vec!["west"]);
    assert_eq!(
        network.entities_in_zone("east", EntityKind::Node).unwrap(),
        vec![ElementRef::from("b")]
    );

    assert!(network.assign_node_zones().is_clean());
    let node = network.nodes().get("a").unwrap();
    assert_eq!(node.belonging_of(category::BELONG_ZONE_ID), ["west".to_string()]);
    assert!(network.nodes().get("c").unwrap().belonging_of(category::BELONG_ZONE_ID).is_empty());
}

#[test]
fn test_network_document_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");

    let network = single_edge_network();
    let document = network.to_document();
    std::fs::write(&path, document.to_document().unwrap().to_string()).unwrap();

    let reloaded = NetworkBuilder::new().load_json(&path).unwrap().build().unwrap();
    assert_eq!(reloaded.edges().len(), 1);
    assert_eq!(
        reloaded.match_point_to_nearest_edge(114.305, 22.601).unwrap(),
        network.match_point_to_nearest_edge(114.305, 22.601).unwrap()
    );
}

#[test]
fn test_grid_geojson_export() {
    let network = single_edge_network();
    let collection = network.grid().to_geojson().unwrap();
    assert_eq!(collection.features.len(), network.grid().cell_count());

    let json = geojson::GeoJson::from(collection).to_string();
    assert!(json.contains("FeatureCollection"));
}
