//! Map Matching Example
//!
//! Builds a small street network, matches GPS fixes to their nearest edge
//! and splits the matched edge at the projected point.

use geo::line_string;
use geomatch::model::{Edge, EdgeCollection, Node, NodeCollection};
use geomatch::{Config, MatchResult, NetworkBuilder};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== geomatch - Map Matching ===\n");

    let nodes: NodeCollection = [
        Node::new("1", 114.30, 22.60),
        Node::new("2", 114.31, 22.60),
        Node::new("3", 114.31, 22.61),
        Node::new("4", 114.36, 22.61),
    ]
    .into_iter()
    .collect();

    let edges: EdgeCollection = [
        Edge::from_line("1", "2", line_string![(x: 114.30, y: 22.60), (x: 114.31, y: 22.60)]),
        Edge::from_line("2", "3", line_string![(x: 114.31, y: 22.60), (x: 114.31, y: 22.61)]),
        Edge::from_line("3", "4", line_string![(x: 114.31, y: 22.61), (x: 114.36, y: 22.61)]),
    ]
    .into_iter()
    .collect();

    let network = NetworkBuilder::new()
        .config(Config::default().with_geohash_precision(6))
        .nodes(nodes)
        .edges(edges)
        .build()?;

    let stats = network.grid().stats();
    println!("✓ Built network");
    println!(
        "   {} cells at precision {}, {} holding edges\n",
        stats.cell_count, stats.precision, stats.cells_with_edges
    );

    // ========================================
    // 1. Single fixes
    // ========================================
    println!("1. Single GPS fixes");
    println!("-------------------");

    let fixes = [
        ("on the first street", 114.305, 22.601),
        ("next to the corner", 114.3095, 22.6052),
        ("between streets", 114.335, 22.603),
    ];

    for (label, lon, lat) in fixes {
        match network.match_point_to_nearest_edge(lon, lat)? {
            MatchResult::Matched(found) => println!(
                "   {:<20} -> edge {} at ({:.7}, {:.7}), {:.1} m",
                label,
                found.edge,
                found.point.x(),
                found.point.y(),
                found.distance_meters
            ),
            MatchResult::NotFound => println!("   {:<20} -> no candidate edge", label),
            MatchResult::NoReachableEdges { cell } => {
                println!("   {:<20} -> nothing reachable from {}", label, cell)
            }
        }
    }

    // ========================================
    // 2. Batch matching
    // ========================================
    println!("\n2. Batch of fixes");
    println!("-----------------");

    let track: Vec<(f64, f64)> = (0..10)
        .map(|i| (114.301 + f64::from(i) * 0.005, 22.6015 + f64::from(i) * 0.0008))
        .collect();
    let matched = network
        .match_points(&track)
        .into_iter()
        .filter(|result| matches!(result, Ok(MatchResult::Matched(_))))
        .count();
    println!("   Matched {} of {} fixes", matched, track.len());

    // ========================================
    // 3. Splitting at the match
    // ========================================
    println!("\n3. Split the matched edge");
    println!("-------------------------");

    if let Some(found) = network.require_match(114.305, 22.601)? {
        let (before, after) = network.split_at_match(&found)?;
        println!(
            "   {} splits into {} + {} vertices",
            found.edge,
            before.0.len(),
            after.0.len()
        );
    }

    Ok(())
}
