use std::hint::black_box;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use navgate_auth::{Identity, resolve_accessible_tree};
use navgate_core::{Catalog, NewAction, NewMenuNode, NodeGrant, NodeId, UserGrants, UserId};

/// `roots` root nodes, each with `fanout` children and `fanout` grandchildren per child.
/// Every node owns one action.
fn build_catalog(roots: usize, fanout: usize) -> (Catalog, Vec<NodeId>) {
    let mut catalog = Catalog::new();
    let now = Utc::now();
    let mut root_ids = Vec::with_capacity(roots);
    let mut seq = 0usize;

    let mut add = |catalog: &mut Catalog, new: NewMenuNode| {
        let node = catalog.add_node(new, now).unwrap();
        catalog
            .add_action(NewAction::new(node.id, format!("action.{seq}")))
            .unwrap();
        seq += 1;
        node.id
    };

    for r in 0..roots {
        let root = add(&mut catalog, NewMenuNode::new(format!("root {r}")).with_order(r as i32));
        root_ids.push(root);
        for c in 0..fanout {
            let child = add(
                &mut catalog,
                NewMenuNode::new(format!("child {c}")).with_parent(root),
            );
            for g in 0..fanout {
                add(
                    &mut catalog,
                    NewMenuNode::new(format!("leaf {g}")).with_parent(child),
                );
            }
        }
    }
    (catalog, root_ids)
}

fn bench_tree_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_resolution");

    for (roots, fanout) in [(5usize, 5usize), (20, 10), (50, 20)] {
        let (catalog, root_ids) = build_catalog(roots, fanout);
        group.throughput(Throughput::Elements(catalog.node_count() as u64));

        let superuser = Identity::superuser(UserId::new());
        group.bench_with_input(
            BenchmarkId::new("superuser", catalog.node_count()),
            &catalog,
            |b, catalog| {
                let grants = UserGrants::default();
                b.iter(|| black_box(resolve_accessible_tree(&superuser, catalog, &grants)));
            },
        );

        // Regular user granted every other root.
        let user = Identity::user(UserId::new());
        let grants = UserGrants::new(
            root_ids
                .iter()
                .step_by(2)
                .map(|id| NodeGrant::new(*id, true))
                .collect(),
            vec![],
        );
        group.bench_with_input(
            BenchmarkId::new("half_granted", catalog.node_count()),
            &catalog,
            |b, catalog| {
                b.iter(|| black_box(resolve_accessible_tree(&user, catalog, &grants)));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_tree_resolution);
criterion_main!(benches);
