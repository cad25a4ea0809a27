//! Shape of the merge rollup tree over a block's transactions
//!
//! The base rollup outputs of a block's transactions are the leaves of a binary
//! tree of merge rollups. The leaf count need not be a power of two: leaves are
//! paired left to right, and when a level has an odd number of nodes the last
//! one is carried up unmerged until it meets a sibling. This is the shape of a
//! batch insertion into an append only merkle tree.
//!
//! Levels are numbered from the root, which is level 0. The root node feeds the
//! block root rollup, and the leaves sit at `num_merge_levels + 1`. A merge node
//! at `(level, index)` has global id `2^level - 1 + index`

/// `ceil(log2(n))`, with `ceil_log2(0) = ceil_log2(1) = 0`
fn ceil_log2(n: usize) -> u32 {
    if n <= 1 { 0 } else { usize::BITS - (n - 1).leading_zeros() }
}

/// The input slot of a merge node a child's output fills
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeSlot {
    /// The left input, filled by the even child
    Left,
    /// The right input, filled by the odd child
    Right,
}

impl MergeSlot {
    /// The position of the slot in a two element input array
    pub fn index(&self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// The slot a child at the given index fills
    fn of_child(child_index: usize) -> Self {
        if child_index % 2 == 0 { Self::Left } else { Self::Right }
    }
}

/// The merge node that consumes a tree node's output, and the slot it fills
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MergeLocation {
    /// The level of the merge node, 0 for the root
    pub level: u32,
    /// The index of the merge node within its level
    pub index_within_level: usize,
    /// The slot of the merge node the output fills
    pub slot: MergeSlot,
}

impl MergeLocation {
    /// The global id of the merge node, unique across the tree
    pub fn merge_index(&self) -> usize {
        (1usize << self.level) - 1 + self.index_within_level
    }

    /// Whether the merge node is the root of the tree
    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}

/// The number of merge levels below the root for a block of the given size
///
/// A block with one or two transactions has none: their outputs feed the root
/// node directly
pub fn num_merge_levels(total_num_txs: usize) -> u32 {
    ceil_log2(total_num_txs).saturating_sub(1)
}

/// The level the base rollup outputs enter the tree at
pub fn leaf_level(total_num_txs: usize) -> u32 {
    num_merge_levels(total_num_txs) + 1
}

/// The number of nodes at the given level, counting a node carried up from
/// below as a node of every level it passes through
pub fn level_size(total_num_txs: usize, level: u32) -> usize {
    let leaf_level = leaf_level(total_num_txs);
    if level > leaf_level {
        return 0;
    }

    // Each level halves the one below it, rounding up for the carried node
    let shift = leaf_level - level;
    1usize.checked_shl(shift).map_or(1, |divisor| total_num_txs.div_ceil(divisor))
}

/// Find the merge node that consumes the output of the node at `(level, index)`
///
/// Returns `None` if `(level, index)` is not a node of a tree over
/// `total_num_txs` leaves. Level 0 has no consumer in the tree, the root feeds
/// the block root rollup
pub fn find_merge_level(level: u32, index: usize, total_num_txs: usize) -> Option<MergeLocation> {
    if total_num_txs == 0 || level == 0 || index >= level_size(total_num_txs, level) {
        return None;
    }

    // A node without a sibling is carried up a level unmerged until it has one
    let (mut level, mut index) = (level, index);
    while level > 1 && (index ^ 1) >= level_size(total_num_txs, level) {
        level -= 1;
        index >>= 1;
    }

    Some(MergeLocation {
        level: level - 1,
        index_within_level: index >> 1,
        slot: MergeSlot::of_child(index),
    })
}

#[cfg(test)]
mod test {
    use std::collections::{HashMap, HashSet};

    use super::{
        MergeLocation, MergeSlot, find_merge_level, leaf_level, level_size, num_merge_levels,
    };

    /// Build a location
    fn loc(level: u32, index_within_level: usize, slot: MergeSlot) -> MergeLocation {
        MergeLocation { level, index_within_level, slot }
    }

    /// Tests the merge level count against known block sizes
    #[test]
    fn test_num_merge_levels() {
        let cases = [(1, 0), (2, 0), (3, 1), (4, 1), (5, 2), (8, 2), (9, 3), (1024, 9), (1025, 10)];
        for (total_num_txs, expected) in cases {
            assert_eq!(num_merge_levels(total_num_txs), expected, "{total_num_txs} txs");
        }
    }

    /// Tests the level sizes of a five transaction block
    #[test]
    fn test_level_sizes() {
        assert_eq!(leaf_level(5), 3);
        let sizes = (0..=4).map(|level| level_size(5, level)).collect::<Vec<_>>();
        assert_eq!(sizes, vec![1, 2, 3, 5, 0]);
    }

    /// Tests the consumers of every node in a five transaction block
    #[test]
    fn test_five_tx_tree_shape() {
        use MergeSlot::{Left, Right};

        // Leaves pair up, and the fifth is carried to the root's right slot
        assert_eq!(find_merge_level(3, 0, 5), Some(loc(2, 0, Left)));
        assert_eq!(find_merge_level(3, 1, 5), Some(loc(2, 0, Right)));
        assert_eq!(find_merge_level(3, 2, 5), Some(loc(2, 1, Left)));
        assert_eq!(find_merge_level(3, 3, 5), Some(loc(2, 1, Right)));
        assert_eq!(find_merge_level(3, 4, 5), Some(loc(0, 0, Right)));

        // The two merges at level 2 feed level 1, which feeds the root
        assert_eq!(find_merge_level(2, 0, 5), Some(loc(1, 0, Left)));
        assert_eq!(find_merge_level(2, 1, 5), Some(loc(1, 0, Right)));
        assert_eq!(find_merge_level(1, 0, 5), Some(loc(0, 0, Left)));

        assert_eq!(loc(2, 1, Left).merge_index(), 4);
        assert_eq!(loc(1, 0, Left).merge_index(), 1);
        assert_eq!(loc(0, 0, Left).merge_index(), 0);
    }

    /// Tests that positions outside the tree have no consumer
    #[test]
    fn test_invalid_positions() {
        assert_eq!(find_merge_level(0, 0, 5), None);
        assert_eq!(find_merge_level(3, 5, 5), None);
        assert_eq!(find_merge_level(4, 0, 5), None);
        assert_eq!(find_merge_level(1, 0, 0), None);
    }

    /// Tests that a single transaction feeds the root's left slot directly
    #[test]
    fn test_single_tx() {
        assert_eq!(leaf_level(1), 1);
        assert_eq!(find_merge_level(1, 0, 1), Some(loc(0, 0, MergeSlot::Left)));
    }

    /// Tests, for a range of block sizes, that every merge node receives
    /// exactly two inputs in distinct slots, that node ids are unique, and that
    /// the tree has `n - 1` merges ending at the root
    #[test]
    fn test_tree_reduces_to_root() {
        for total_num_txs in 2..=130 {
            let mut inputs: HashMap<usize, HashSet<MergeSlot>> = HashMap::new();
            let mut locations: HashMap<usize, (u32, usize)> = HashMap::new();
            let mut pending: Vec<(u32, usize)> =
                (0..total_num_txs).map(|i| (leaf_level(total_num_txs), i)).collect();

            let mut num_merges = 0;
            while let Some((level, index)) = pending.pop() {
                let location = find_merge_level(level, index, total_num_txs).unwrap();
                assert!(location.index_within_level < (1 << location.level));

                let id = location.merge_index();
                let coords = (location.level, location.index_within_level);
                assert_eq!(*locations.entry(id).or_insert(coords), coords);

                let slots = inputs.entry(id).or_default();
                assert!(slots.insert(location.slot), "slot filled twice");
                if slots.len() == 2 {
                    num_merges += 1;
                    if !location.is_root() {
                        pending.push(coords);
                    }
                }
            }

            assert_eq!(num_merges, total_num_txs - 1, "{total_num_txs} txs");
            assert!(inputs.values().all(|slots| slots.len() == 2));
            assert_eq!(inputs.get(&0).map(HashSet::len), Some(2));
        }
    }
}
