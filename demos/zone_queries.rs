//! Zone Queries Example
//!
//! Indexes districts and stops, then answers which district holds a point,
//! which districts border each other and which stops fall inside one.

use geomatch::compute::geometry::rect_polygon;
use geomatch::model::{EntityKind, Node, NodeCollection, Zone, ZoneCollection, category};
use geomatch::NetworkBuilder;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== geomatch - Zone Queries ===\n");

    let zones: ZoneCollection = [
        Zone::from_polygon("futian", rect_polygon(114.00, 22.50, 114.10, 22.58)),
        Zone::from_polygon("luohu", rect_polygon(114.10, 22.52, 114.18, 22.60)),
        Zone::from_polygon("cbd", rect_polygon(114.04, 22.52, 114.07, 22.55)),
    ]
    .into_iter()
    .collect();

    let nodes: NodeCollection = [
        Node::new("stop_a", 114.055, 22.535).with_name("Convention Centre"),
        Node::new("stop_b", 114.020, 22.560).with_name("Xiangmihu"),
        Node::new("stop_c", 114.120, 22.545).with_name("Grand Theatre"),
        Node::new("stop_d", 114.250, 22.560).with_name("Out of town"),
    ]
    .into_iter()
    .collect();

    let mut network = NetworkBuilder::new().zones(zones).nodes(nodes).build()?;
    println!("✓ Indexed {} zones and {} nodes\n", network.zones().len(), network.nodes().len());

    // ========================================
    // 1. Point in zone
    // ========================================
    println!("1. Which zone holds a point");
    println!("---------------------------");
    for (lon, lat) in [(114.02, 22.56), (114.15, 22.58), (114.30, 22.60)] {
        let zone = network.zone_containing(lon, lat)?;
        println!("   ({:.2}, {:.2}) -> {}", lon, lat, zone.as_deref().unwrap_or("none"));
    }

    // ========================================
    // 2. Neighbours and nesting
    // ========================================
    println!("\n2. Zone relations");
    println!("-----------------");
    println!("   futian borders: {:?}", network.neighboring_zones("futian")?);
    let nested = network.entities_in_zone("futian", EntityKind::Zone)?;
    println!("   zones inside futian: {}", nested.len());

    // ========================================
    // 3. Nodes by zone
    // ========================================
    println!("\n3. Nodes by zone");
    println!("----------------");
    for zone_id in ["futian", "luohu", "cbd"] {
        let inside = network.entities_in_zone(zone_id, EntityKind::Node)?;
        let names: Vec<String> = inside.iter().map(ToString::to_string).collect();
        println!("   {:<7} {:?}", zone_id, names);
    }

    let report = network.assign_node_zones();
    println!("\n   Assigned zones ({} failures):", report.failures.len());
    for node in network.nodes().values() {
        println!(
            "     {:<7} {:?}",
            node.id(),
            node.belonging_of(category::BELONG_ZONE_ID)
        );
    }

    // ========================================
    // 4. Proximity
    // ========================================
    println!("\n4. Proximity");
    println!("------------");
    println!("   within 5 km of stop_a: {:?}", network.nodes_near("stop_a", 5_000.0)?);
    println!("   two nearest to stop_a: {:?}", network.nearest_nodes("stop_a", 2)?);

    Ok(())
}
