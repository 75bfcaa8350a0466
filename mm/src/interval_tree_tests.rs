use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::MmioError;
use crate::interval_tree::IntervalTree;

/// Small deterministic generator so shuffled workloads repeat exactly.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[test]
fn test_empty_tree() {
    let tree: IntervalTree<u32> = IntervalTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.find(0), None);
    assert_eq!(tree.find(u64::MAX), None);
    assert!(tree.ranges().is_empty());
    tree.check_invariants();
}

#[test]
fn test_disjoint_lookup_and_bounds() {
    let mut tree = IntervalTree::new();
    tree.insert(0x1000, 0x2000, 'a').unwrap();
    tree.insert(0x3000, 0x3010, 'b').unwrap();
    tree.insert(0x2000, 0x2800, 'c').unwrap();
    tree.check_invariants();

    assert_eq!(tree.find(0x0fff), None);
    assert_eq!(tree.find(0x1000), Some(&'a'));
    assert_eq!(tree.find(0x1fff), Some(&'a'));
    assert_eq!(tree.find(0x2000), Some(&'c'));
    assert_eq!(tree.find(0x2800), None);
    assert_eq!(tree.find(0x300f), Some(&'b'));
    assert_eq!(tree.find(0x3010), None);
    assert_eq!(tree.find_range(0x2400), Some((0x2000, 0x2800)));
    assert_eq!(
        tree.ranges(),
        [(0x1000, 0x2000), (0x2000, 0x2800), (0x3000, 0x3010)]
    );
}

#[test]
fn test_rejects_duplicate_start_and_empty_range() {
    let mut tree = IntervalTree::new();
    tree.insert(0x100, 0x200, 1).unwrap();
    assert_eq!(
        tree.insert(0x100, 0x180, 2),
        Err(MmioError::DuplicateStart { start: 0x100 })
    );
    assert_eq!(
        tree.insert(0x500, 0x500, 3),
        Err(MmioError::EmptyRange { start: 0x500 })
    );
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.find(0x150), Some(&1));
}

#[test]
fn test_overlap_prefers_lowest_start() {
    let mut tree = IntervalTree::new();
    // Inserted out of order so the wide range is not the root.
    tree.insert(0x5000, 0x6000, "late").unwrap();
    tree.insert(0x4000, 0x4100, "tiny").unwrap();
    tree.insert(0x1000, 0x9000, "wide").unwrap();
    tree.insert(0x8000, 0x8800, "inner").unwrap();
    tree.check_invariants();

    assert_eq!(tree.find(0x5800), Some(&"wide"));
    assert_eq!(tree.find(0x8400), Some(&"wide"));
    assert_eq!(tree.find(0x4050), Some(&"wide"));

    assert_eq!(tree.remove(0x1000), Some("wide"));
    tree.check_invariants();
    assert_eq!(tree.find(0x5800), Some(&"late"));
    assert_eq!(tree.find(0x8400), Some(&"inner"));
    assert_eq!(tree.find(0x7000), None);
}

#[test]
fn test_nested_range_found_through_left_subtree() {
    let mut tree = IntervalTree::new();
    for (i, start) in [0x10u64, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70].iter().enumerate() {
        tree.insert(*start, start + 8, i).unwrap();
    }
    // Long range low in start order covering addresses beyond many later starts.
    tree.insert(0x05, 0x100, 99).unwrap();
    tree.check_invariants();
    assert_eq!(tree.find(0x74), Some(&99));
    assert_eq!(tree.find(0xff), Some(&99));
    assert_eq!(tree.find(0x100), None);
}

#[test]
fn test_remove_by_inner_address() {
    let mut tree = IntervalTree::new();
    tree.insert(0xd000_0000, 0xd012_c000, 7).unwrap();
    assert_eq!(tree.remove(0xd000_1234), Some(7));
    assert!(tree.is_empty());
    assert_eq!(tree.remove(0xd000_1234), None);
    assert_eq!(tree.find(0xd000_0000), None);
}

#[test]
fn test_adjacent_ranges_at_top_of_address_space() {
    let mut tree = IntervalTree::new();
    tree.insert(u64::MAX - 0x20, u64::MAX - 0x10, 1).unwrap();
    tree.insert(u64::MAX - 0x10, u64::MAX, 2).unwrap();
    assert_eq!(tree.find(u64::MAX - 0x11), Some(&1));
    assert_eq!(tree.find(u64::MAX - 0x10), Some(&2));
    assert_eq!(tree.find(u64::MAX), None);
}

#[test]
fn test_randomized_insert_remove_keeps_invariants() {
    let mut rng = XorShift(0x9e37_79b9_7f4a_7c15);
    let mut tree = IntervalTree::new();
    let mut live: Vec<u64> = Vec::new();

    // Slots of 0x100 bytes; each range occupies a prefix of its slot.
    for _ in 0..600 {
        let slot = rng.next() % 256;
        let start = slot * 0x100;
        let len = 1 + rng.next() % 0x100;
        match tree.insert(start, start + len, slot) {
            Ok(()) => live.push(slot),
            Err(MmioError::DuplicateStart { start: s }) => {
                assert_eq!(s, start);
                assert!(live.contains(&slot));
            }
            Err(e) => panic!("unexpected {e}"),
        }
        tree.check_invariants();

        if rng.next() % 3 == 0 && !live.is_empty() {
            let victim = live.swap_remove((rng.next() as usize) % live.len());
            assert_eq!(tree.remove(victim * 0x100), Some(victim));
            tree.check_invariants();
        }
    }

    assert_eq!(tree.len(), live.len());
    for slot in &live {
        assert_eq!(tree.find(slot * 0x100), Some(slot));
    }
    let starts: Vec<u64> = tree.ranges().iter().map(|&(s, _)| s).collect();
    let mut sorted: Vec<u64> = live.iter().map(|s| s * 0x100).collect();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);

    while let Some(slot) = live.pop() {
        assert_eq!(tree.remove(slot * 0x100), Some(slot));
        tree.check_invariants();
    }
    assert!(tree.is_empty());
}

#[test]
fn test_ascending_and_descending_inserts_stay_balanced() {
    let mut up = IntervalTree::new();
    let mut down = IntervalTree::new();
    for i in 0..512u64 {
        up.insert(i * 16, i * 16 + 8, i).unwrap();
        down.insert((511 - i) * 16, (511 - i) * 16 + 8, i).unwrap();
    }
    up.check_invariants();
    down.check_invariants();
    for i in (0..512u64).step_by(2) {
        assert!(up.remove(i * 16 + 4).is_some());
        assert!(down.remove(i * 16).is_some());
    }
    up.check_invariants();
    down.check_invariants();
    assert_eq!(up.len(), 256);
    assert_eq!(up.find(16 * 3 + 7), Some(&3));
    assert_eq!(up.find(16 * 4), None);
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_values_dropped_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));
    {
        let mut tree = IntervalTree::new();
        for i in 0..10u64 {
            tree.insert(i * 0x10, i * 0x10 + 4, DropCounter(drops.clone()))
                .unwrap();
        }
        // Rejected insert drops the value it was handed.
        assert!(tree.insert(0, 4, DropCounter(drops.clone())).is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let removed = tree.remove(0x32);
        assert!(removed.is_some());
        drop(removed);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 11);
}
