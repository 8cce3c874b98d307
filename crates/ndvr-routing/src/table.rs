//! Distance-vector routing table
//!
//! The [`RoutingTable`] holds one [`RoutingEntry`] per known destination.
//! It is owned by a single router and mutated only when that router merges
//! a verified neighbour advertisement.
//!
//! ## Merge rule
//!
//! For each advertised entry a candidate is built with the neighbour as next
//! hop and the advertised cost plus one. The candidate replaces the held
//! entry when there is none, when its sequence is newer, when the sequence
//! is equal and the cost lower, or when sequence and cost are equal and the
//! neighbour sorts before the held next hop. The last clause makes the
//! result independent of the order advertisements are merged in.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use ndvr_core::{NextHop, RouterIdentity, RoutingEntry};
use tracing::{debug, trace};

use crate::error::{RoutingError, RoutingResult};

/// Routing state of one router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    /// The router owning this table
    owner: RouterIdentity,
    /// Entries indexed by destination
    routes: BTreeMap<RouterIdentity, RoutingEntry>,
}

impl RoutingTable {
    /// Create a table holding only the owner's self route
    pub fn new(owner: RouterIdentity) -> Self {
        let mut routes = BTreeMap::new();
        routes.insert(owner.clone(), RoutingEntry::local(owner.clone(), 0, 0));
        Self { owner, routes }
    }

    /// Merge a neighbour's advertised entries learned in `round`
    ///
    /// Returns the destinations whose entry was replaced.
    pub fn merge<'a>(
        &mut self,
        neighbor: &RouterIdentity,
        incoming: impl IntoIterator<Item = &'a RoutingEntry>,
        round: u64,
    ) -> RoutingResult<BTreeSet<RouterIdentity>> {
        if neighbor == &self.owner {
            return Err(RoutingError::SelfAdvertisement(neighbor.clone()));
        }

        let mut changed = BTreeSet::new();
        for advertised in incoming {
            if advertised.destination == self.owner {
                continue;
            }
            // Split horizon
            if advertised.next_hop.neighbor() == Some(&self.owner) {
                trace!(destination = %advertised.destination, %neighbor, "split horizon");
                continue;
            }

            let candidate = RoutingEntry::via(
                advertised.destination.clone(),
                neighbor.clone(),
                advertised.cost.saturating_add(1),
                advertised.sequence,
                round,
            );

            let replace = match self.routes.get(&candidate.destination) {
                None => true,
                Some(held) => prefer(&candidate, held),
            };

            if replace {
                debug!(
                    destination = %candidate.destination,
                    next_hop = %candidate.next_hop,
                    cost = candidate.cost,
                    sequence = candidate.sequence,
                    "route updated"
                );
                changed.insert(candidate.destination.clone());
                self.routes.insert(candidate.destination.clone(), candidate);
            }
        }

        Ok(changed)
    }

    /// Increment the self-route sequence and return the new value
    pub fn bump_own_sequence(&mut self, round: u64) -> u64 {
        let owner = self.owner.clone();
        let own = self
            .routes
            .entry(owner.clone())
            .or_insert_with(|| RoutingEntry::local(owner, 0, 0));
        own.sequence += 1;
        own.round = round;
        own.sequence
    }

    /// Evict entries not refreshed within `max_age` rounds
    ///
    /// The self route is never evicted.
    pub fn prune_stale(&mut self, current_round: u64, max_age: u64) -> Vec<RouterIdentity> {
        let owner = &self.owner;
        let mut evicted = Vec::new();
        self.routes.retain(|dest, entry| {
            let keep = dest == owner || current_round.saturating_sub(entry.round) <= max_age;
            if !keep {
                evicted.push(dest.clone());
            }
            keep
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), current_round, "pruned stale routes");
        }
        evicted
    }

    /// The router owning this table
    pub fn owner(&self) -> &RouterIdentity {
        &self.owner
    }

    /// Current self-route sequence
    pub fn own_sequence(&self) -> u64 {
        self.routes.get(&self.owner).map_or(0, |e| e.sequence)
    }

    /// Get the entry for a destination
    pub fn get(&self, dest: &RouterIdentity) -> Option<&RoutingEntry> {
        self.routes.get(dest)
    }

    /// Next hop toward a destination
    pub fn next_hop_for(&self, dest: &RouterIdentity) -> Option<&NextHop> {
        self.routes.get(dest).map(|e| &e.next_hop)
    }

    /// Entries in ascending destination order
    pub fn entries(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.routes.values()
    }

    /// Known destinations in ascending order
    pub fn destinations(&self) -> Vec<RouterIdentity> {
        self.routes.keys().cloned().collect()
    }

    /// Copy of the table contents
    pub fn snapshot(&self) -> BTreeMap<RouterIdentity, RoutingEntry> {
        self.routes.clone()
    }

    /// Number of destinations, including the owner
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Always false; the self route is permanent
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Whether `candidate` should replace `held`
fn prefer(candidate: &RoutingEntry, held: &RoutingEntry) -> bool {
    if held.next_hop.is_local() {
        return false;
    }
    match candidate.sequence.cmp(&held.sequence) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match candidate.cost.cmp(&held.cost) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => candidate.next_hop < held.next_hop,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> RouterIdentity {
        RouterIdentity::from_ordinal(n)
    }

    fn advert(dest: u64, via: Option<u64>, cost: u32, seq: u64) -> RoutingEntry {
        match via {
            None => RoutingEntry::local(id(dest), seq, 0),
            Some(n) => RoutingEntry::via(id(dest), id(n), cost, seq, 0),
        }
    }

    #[test]
    fn test_new_has_self_route() {
        let table = RoutingTable::new(id(0));
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
        let own = table.get(&id(0)).unwrap();
        assert_eq!(own.cost, 0);
        assert_eq!(own.next_hop, NextHop::Local);
        assert_eq!(table.own_sequence(), 0);
    }

    #[test]
    fn test_merge_neighbor_self_route() {
        let mut table = RoutingTable::new(id(0));
        let changed = table.merge(&id(1), &[advert(1, None, 0, 1)], 1).unwrap();

        assert_eq!(changed, BTreeSet::from([id(1)]));
        let entry = table.get(&id(1)).unwrap();
        assert_eq!(entry.cost, 1);
        assert_eq!(entry.next_hop, NextHop::Via(id(1)));
        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.round, 1);
    }

    #[test]
    fn test_self_route_never_overwritten() {
        let mut table = RoutingTable::new(id(0));
        table.bump_own_sequence(1);
        let changed = table
            .merge(&id(1), &[advert(0, Some(2), 0, 100)], 2)
            .unwrap();
        assert!(changed.is_empty());
        let own = table.get(&id(0)).unwrap();
        assert_eq!(own.next_hop, NextHop::Local);
        assert_eq!(own.sequence, 1);
    }

    #[test]
    fn test_split_horizon() {
        let mut table = RoutingTable::new(id(0));
        let changed = table
            .merge(&id(1), &[advert(5, Some(0), 3, 9)], 1)
            .unwrap();
        assert!(changed.is_empty());
        assert!(table.get(&id(5)).is_none());
    }

    #[test]
    fn test_newer_sequence_wins_even_if_costlier() {
        let mut table = RoutingTable::new(id(0));
        table.merge(&id(1), &[advert(5, Some(9), 1, 3)], 1).unwrap();
        let changed = table.merge(&id(2), &[advert(5, Some(9), 6, 4)], 2).unwrap();

        assert_eq!(changed, BTreeSet::from([id(5)]));
        let entry = table.get(&id(5)).unwrap();
        assert_eq!(entry.sequence, 4);
        assert_eq!(entry.cost, 7);
        assert_eq!(entry.next_hop, NextHop::Via(id(2)));
    }

    #[test]
    fn test_stale_sequence_discarded() {
        let mut table = RoutingTable::new(id(0));
        table.merge(&id(1), &[advert(5, Some(9), 4, 7)], 1).unwrap();
        let changed = table.merge(&id(2), &[advert(5, Some(9), 0, 6)], 2).unwrap();
        assert!(changed.is_empty());
        assert_eq!(table.get(&id(5)).unwrap().sequence, 7);
    }

    #[test]
    fn test_lower_cost_same_sequence() {
        let mut table = RoutingTable::new(id(0));
        table.merge(&id(1), &[advert(5, Some(9), 4, 7)], 1).unwrap();
        let changed = table.merge(&id(2), &[advert(5, Some(9), 1, 7)], 1).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(table.get(&id(5)).unwrap().cost, 2);
        assert_eq!(table.next_hop_for(&id(5)), Some(&NextHop::Via(id(2))));
    }

    #[test]
    fn test_tie_break_on_next_hop() {
        let mut forward = RoutingTable::new(id(0));
        forward.merge(&id(2), &[advert(5, Some(9), 1, 7)], 1).unwrap();
        let changed = forward.merge(&id(1), &[advert(5, Some(9), 1, 7)], 1).unwrap();
        assert_eq!(changed.len(), 1);

        let mut backward = RoutingTable::new(id(0));
        backward.merge(&id(1), &[advert(5, Some(9), 1, 7)], 1).unwrap();
        let changed = backward.merge(&id(2), &[advert(5, Some(9), 1, 7)], 1).unwrap();
        assert!(changed.is_empty());

        assert_eq!(forward, backward);
        assert_eq!(forward.next_hop_for(&id(5)), Some(&NextHop::Via(id(1))));
    }

    #[test]
    fn test_identical_advert_is_not_a_change() {
        let mut table = RoutingTable::new(id(0));
        table.merge(&id(1), &[advert(1, None, 0, 1)], 1).unwrap();
        let changed = table.merge(&id(1), &[advert(1, None, 0, 1)], 1).unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_cost_saturates() {
        let mut table = RoutingTable::new(id(0));
        table
            .merge(&id(1), &[advert(5, Some(9), u32::MAX, 1)], 1)
            .unwrap();
        assert_eq!(table.get(&id(5)).unwrap().cost, u32::MAX);
    }

    #[test]
    fn test_merge_from_owner_rejected() {
        let mut table = RoutingTable::new(id(0));
        assert_eq!(
            table.merge(&id(0), &[advert(1, None, 0, 1)], 1),
            Err(RoutingError::SelfAdvertisement(id(0)))
        );
    }

    #[test]
    fn test_bump_own_sequence() {
        let mut table = RoutingTable::new(id(0));
        assert_eq!(table.bump_own_sequence(1), 1);
        assert_eq!(table.bump_own_sequence(2), 2);
        assert_eq!(table.own_sequence(), 2);
        assert_eq!(table.get(&id(0)).unwrap().round, 2);
    }

    #[test]
    fn test_prune_stale() {
        let mut table = RoutingTable::new(id(0));
        table.merge(&id(1), &[advert(1, None, 0, 1)], 1).unwrap();
        table.merge(&id(2), &[advert(2, None, 0, 1)], 4).unwrap();

        let evicted = table.prune_stale(5, 2);
        assert_eq!(evicted, vec![id(1)]);
        assert!(table.get(&id(0)).is_some());
        assert!(table.get(&id(2)).is_some());
        assert_eq!(table.destinations(), vec![id(0), id(2)]);
    }

    #[test]
    fn test_snapshot_and_entries_ordered() {
        let mut table = RoutingTable::new(id(3));
        table
            .merge(&id(1), &[advert(1, None, 0, 1), advert(0, Some(2), 1, 1)], 1)
            .unwrap();
        let dests: Vec<_> = table.entries().map(|e| e.destination.clone()).collect();
        assert_eq!(dests, vec![id(0), id(1), id(3)]);
        assert_eq!(table.snapshot().len(), 3);
        assert_eq!(table.owner(), &id(3));
    }
}
