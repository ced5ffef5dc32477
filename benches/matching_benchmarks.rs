use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::line_string;
use geomatch::compute::geometry::rect_polygon;
use geomatch::compute::spatial::find_reachable_edges;
use geomatch::geohash_grid;
use geomatch::model::{Edge, EdgeCollection, EntityKind, Node, NodeCollection, Zone, ZoneCollection};
use geomatch::{Config, NetworkBuilder, SpatialNetwork};

/// Street grid of `size` x `size` blocks starting at (114.20, 22.50).
fn street_grid(size: u32, spacing: f64) -> (NodeCollection, EdgeCollection) {
    let id = |row: u32, col: u32| format!("{}_{}", row, col);
    let coord = |row: u32, col: u32| {
        (
            114.20 + f64::from(col) * spacing,
            22.50 + f64::from(row) * spacing,
        )
    };

    let mut nodes = NodeCollection::new();
    let mut edges = EdgeCollection::new();
    for row in 0..=size {
        for col in 0..=size {
            let (x, y) = coord(row, col);
            nodes.add(Node::new(id(row, col), x, y));

            if col < size {
                let (x2, y2) = coord(row, col + 1);
                edges.add(Edge::from_line(
                    id(row, col),
                    id(row, col + 1),
                    line_string![(x: x, y: y), (x: x2, y: y2)],
                ));
            }
            if row < size {
                let (x2, y2) = coord(row + 1, col);
                edges.add(Edge::from_line(
                    id(row, col),
                    id(row + 1, col),
                    line_string![(x: x, y: y), (x: x2, y: y2)],
                ));
            }
        }
    }
    (nodes, edges)
}

fn build_network(size: u32) -> SpatialNetwork {
    let (nodes, edges) = street_grid(size, 0.01);
    let extent = 0.01 * f64::from(size);
    let zones: ZoneCollection = (0..4)
        .map(|i| {
            let x0 = 114.20 + f64::from(i) * extent / 4.0;
            Zone::from_polygon(
                format!("zone_{}", i),
                rect_polygon(x0, 22.50, x0 + extent / 4.0, 22.50 + extent),
            )
        })
        .collect();

    NetworkBuilder::new()
        .nodes(nodes)
        .edges(edges)
        .zones(zones)
        .build()
        .unwrap()
}

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for size in [5, 10, 20] {
        group.bench_with_input(BenchmarkId::new("street_grid", size), &size, |b, &size| {
            b.iter(|| build_network(black_box(size)))
        });
    }

    group.finish();
}

fn benchmark_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    let network = build_network(20);

    // On a street
    group.bench_function("warm_cell", |b| {
        b.iter(|| {
            network
                .match_point_to_nearest_edge(black_box(114.2551), black_box(22.5001))
                .unwrap()
        })
    });

    // Middle of a block, several cells from any street
    let sparse = {
        let (nodes, edges) = street_grid(4, 0.05);
        NetworkBuilder::new().nodes(nodes).edges(edges).build().unwrap()
    };
    group.bench_function("cold_cell", |b| {
        b.iter(|| {
            sparse
                .match_point_to_nearest_edge(black_box(114.225), black_box(22.525))
                .unwrap()
        })
    });

    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let t = f64::from(i) / 1000.0;
            (114.20 + t * 0.19, 22.50 + (t * 7.0).fract() * 0.19)
        })
        .collect();
    group.bench_function("batch_1000", |b| {
        b.iter(|| network.match_points(black_box(&points)))
    });

    group.finish();
}

fn benchmark_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid");

    for precision in [5, 6, 7] {
        group.bench_with_input(
            BenchmarkId::new("cover_rectangle", precision),
            &precision,
            |b, &precision| {
                b.iter(|| {
                    geohash_grid::cover_rectangle(114.20, 22.50, 114.30, 22.60, precision, 1_000_000)
                        .unwrap()
                })
            },
        );
    }

    let config = Config::default().with_geohash_precision(7);
    let (_, edges) = street_grid(4, 0.05);
    let network = NetworkBuilder::new().config(config).edges(edges).build().unwrap();
    let seed = network.grid().cell_of(114.225, 22.525).unwrap();
    group.bench_function("bridge_search", |b| {
        b.iter(|| find_reachable_edges(network.grid(), &[black_box(seed.as_str())], None).unwrap())
    });

    group.finish();
}

fn benchmark_zone_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("zone_queries");
    let mut network = build_network(20);

    group.bench_function("zone_containing", |b| {
        b.iter(|| network.zone_containing(black_box(114.305), black_box(22.605)).unwrap())
    });

    group.bench_function("nodes_in_zone", |b| {
        b.iter(|| {
            network
                .entities_in_zone(black_box("zone_1"), EntityKind::Node)
                .unwrap()
        })
    });

    group.bench_function("nearest_edges_probe", |b| {
        b.iter(|| {
            network
                .nearest_edges(black_box(114.3051), black_box(22.6001), 5)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_matching,
    benchmark_grid,
    benchmark_zone_queries
);
criterion_main!(benches);
