//! Order and monotonicity properties of the merge rule

use std::collections::BTreeMap;

use ndvr_core::{NextHop, RouterIdentity, RoutingEntry};
use ndvr_routing::RoutingTable;

// Test helpers
fn id(n: u64) -> RouterIdentity {
    RouterIdentity::from_ordinal(n)
}

/// One neighbour advertisement: (neighbour, entries)
type Advert = (RouterIdentity, Vec<RoutingEntry>);

fn adverts() -> Vec<Advert> {
    vec![
        (
            id(1),
            vec![
                RoutingEntry::local(id(1), 4, 0),
                RoutingEntry::via(id(5), id(7), 2, 3, 0),
                RoutingEntry::via(id(6), id(8), 1, 2, 0),
            ],
        ),
        (
            id(2),
            vec![
                RoutingEntry::local(id(2), 1, 0),
                RoutingEntry::via(id(5), id(8), 2, 3, 0),
                RoutingEntry::via(id(6), id(8), 3, 5, 0),
                RoutingEntry::via(id(1), id(9), 1, 4, 0),
            ],
        ),
        (
            id(3),
            vec![
                RoutingEntry::local(id(3), 9, 0),
                RoutingEntry::via(id(5), id(7), 1, 3, 0),
                RoutingEntry::via(id(6), id(0), 0, 9, 0),
                RoutingEntry::via(id(2), id(4), 1, 1, 0),
            ],
        ),
        (
            id(4),
            vec![
                RoutingEntry::local(id(4), 2, 0),
                RoutingEntry::via(id(5), id(3), 0, 2, 0),
                RoutingEntry::via(id(1), id(1), 1, 4, 0),
                RoutingEntry::via(id(3), id(7), 0, 9, 0),
            ],
        ),
    ]
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            out.push(tail);
        }
    }
    out
}

fn merge_all(order: &[Advert]) -> RoutingTable {
    let mut table = RoutingTable::new(id(0));
    for (neighbor, entries) in order {
        table.merge(neighbor, entries, 1).unwrap();
    }
    table
}

#[test]
fn test_confluence_all_orders() {
    let all = adverts();
    let expected = merge_all(&all);

    for order in permutations(&all) {
        assert_eq!(merge_all(&order), expected);
    }

    // Spot check the winners
    assert_eq!(expected.get(&id(5)).unwrap().cost, 2);
    assert_eq!(expected.next_hop_for(&id(5)), Some(&NextHop::Via(id(3))));
    // Entry routed through the owner is never taken
    assert_eq!(expected.get(&id(6)).unwrap().sequence, 5);
    assert_eq!(expected.next_hop_for(&id(1)), Some(&NextHop::Via(id(1))));
    // Equal sequence and cost resolved by the smaller neighbour
    assert_eq!(expected.get(&id(3)).unwrap().cost, 1);
    assert_eq!(expected.next_hop_for(&id(3)), Some(&NextHop::Via(id(3))));
}

#[test]
fn test_sequence_never_regresses() {
    let all = adverts();
    for order in permutations(&all) {
        let mut table = RoutingTable::new(id(0));
        let mut seen: BTreeMap<RouterIdentity, u64> = BTreeMap::new();
        for (round, (neighbor, entries)) in order.iter().enumerate() {
            table.merge(neighbor, entries, round as u64).unwrap();
            for entry in table.entries() {
                let prev = seen.insert(entry.destination.clone(), entry.sequence);
                if let Some(prev) = prev {
                    assert!(entry.sequence >= prev, "sequence regressed for {}", entry.destination);
                }
            }
        }
    }
}

#[test]
fn test_line_distances() {
    // A - B - C, B has learned C; A learns C through B at cost 2
    let (a, b, c) = (id(0), id(1), id(2));
    let mut table_b = RoutingTable::new(b.clone());
    let c_self = RoutingEntry::local(c.clone(), 1, 1);
    table_b.merge(&c, [&c_self], 1).unwrap();

    let mut table_a = RoutingTable::new(a.clone());
    table_a.merge(&b, table_b.entries(), 2).unwrap();

    let route = table_a.get(&c).unwrap();
    assert_eq!(route.cost, 2);
    assert_eq!(route.next_hop, NextHop::Via(b.clone()));
    assert_eq!(table_a.get(&b).unwrap().cost, 1);
    assert_eq!(table_a.len(), 3);
}
