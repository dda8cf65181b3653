use std::alloc::System;

use stats_alloc::{Region, Stats, StatsAlloc, INSTRUMENTED_SYSTEM};

use healthstream::{
    Materializer, MaterializerConfig, MemoryCatalog, MutationRecord, Node, NodeId, ServiceInstance, Verb,
};

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

fn make_catalog(nodes: usize) -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    for i in 0..nodes {
        let id = NodeId::new(format!("node-{i:05}")).unwrap();
        catalog.register_node(Node::new(id.clone(), "10.0.0.1")).unwrap();
        catalog.register_service(&id, ServiceInstance::new("web", 80)).unwrap();
        catalog.register_service(&id, ServiceInstance::new("api", 8080)).unwrap();
    }
    catalog
}

fn retained_bytes(stats: &Stats) -> i128 {
    stats.bytes_allocated as i128 - stats.bytes_deallocated as i128 + stats.bytes_reallocated as i128
}

// Single test: the allocator is global, so concurrent tests would pollute the regions.
#[test]
fn buffered_snapshot_retains_bounded_memory() {
    let catalog = make_catalog(2_000);
    let m = Materializer::new(MaterializerConfig {
        buffer_capacity: 16,
        ..MaterializerConfig::default()
    });

    // Warm up: register logging callsites before measuring.
    let warm = m.new_buffer();
    m.snapshot_into(&catalog, 1, &warm).expect("warm-up snapshot must succeed");
    drop(warm);

    let buffer = m.new_buffer();
    let region = Region::new(GLOBAL);
    let appended = m.snapshot_into(&catalog, 2, &buffer).expect("measured snapshot must succeed");
    let buffered = region.change();
    assert_eq!(appended, 4_000);
    assert_eq!(buffer.len(), 16);

    let batch = catalog_batch(2_000);
    let region = Region::new(GLOBAL);
    let collected = m.materialize(&catalog, 3, &batch).expect("collect must succeed");
    let collecting = region.change();
    assert_eq!(collected.len(), 4_000);

    // Budgets are intentionally conservative to avoid CI flakiness. The point
    // is that buffered mode keeps a fixed window while collecting mode keeps
    // every event alive.
    assert!(
        retained_bytes(&buffered) <= 256 * 1024,
        "buffered snapshot retained too much: {buffered:?}"
    );
    assert!(
        retained_bytes(&collecting) > 4 * retained_bytes(&buffered),
        "collecting mode should retain far more: buffered={buffered:?} collecting={collecting:?}"
    );
}

fn catalog_batch(nodes: usize) -> Vec<MutationRecord> {
    (0..nodes)
        .map(|i| MutationRecord::node(NodeId::new(format!("node-{i:05}")).unwrap(), Verb::Register))
        .collect()
}
