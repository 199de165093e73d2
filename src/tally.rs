//! Max-selection tally over per-candidate vote counts
//!
//! The selection tree is a binary max-reduction ("tournament") tree: leaves
//! are padded to the next power of two, each internal node holds the max of
//! its children, and the root holds the global maximum. Building is O(n) and
//! a point update recomputes only the ancestors, so incremental tallying is
//! O(log n) per changed leaf. The one-shot tally path rebuilds from scratch
//! and scans leaves left-to-right for the winner, which makes the tie-break
//! deterministic: lowest candidate index among the tied maxima.
//!
//! Also hosts the export aggregator that re-derives per-(election, choice)
//! counts from one or more exported vote tables.

use std::fs;
use std::path::Path;

use crate::index::IndexedMap;
use crate::{Error, Result};

/// Binary max-reduction tree over a fixed set of leaves
#[derive(Debug, Clone)]
pub struct SelectionTree {
    // 1-based heap layout; leaves start at tree.len() / 2
    tree: Vec<u64>,
    leaf_count: usize,
}

impl SelectionTree {
    /// Build the tree from per-candidate counts
    ///
    /// Leaves are padded with zeros to the next power of two at or above the
    /// leaf count.
    pub fn build(leaves: &[u64]) -> Result<Self> {
        let base = leaves.len().next_power_of_two().max(1);
        let mut tree = Vec::new();
        tree.try_reserve_exact(base * 2)
            .map_err(|_| Error::allocation("selection tree"))?;
        tree.resize(base * 2, 0);

        tree[base..base + leaves.len()].copy_from_slice(leaves);
        for i in (1..base).rev() {
            tree[i] = tree[i << 1].max(tree[(i << 1) | 1]);
        }

        Ok(Self {
            tree,
            leaf_count: leaves.len(),
        })
    }

    /// Number of real (unpadded) leaves
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Global maximum (the root)
    pub fn max(&self) -> u64 {
        self.tree[1]
    }

    /// Point-update one leaf and recompute its ancestors in O(log n)
    ///
    /// Fails with `InvalidChoice` if the index addresses a padding leaf or
    /// lies beyond the tree.
    pub fn update(&mut self, index: usize, value: u64) -> Result<()> {
        if index >= self.leaf_count {
            return Err(Error::InvalidChoice {
                choice: index as u32,
                candidates: self.leaf_count as u32,
            });
        }
        let base = self.tree.len() / 2;
        let mut pos = base + index;
        self.tree[pos] = value;
        while pos > 1 {
            pos >>= 1;
            self.tree[pos] = self.tree[pos << 1].max(self.tree[(pos << 1) | 1]);
        }
        Ok(())
    }

    /// Index of the first leaf equal to the root maximum
    ///
    /// Ties break to the lowest candidate index. `None` only for a tree
    /// built over zero leaves.
    pub fn winner(&self) -> Option<usize> {
        let base = self.tree.len() / 2;
        let best = self.tree[1];
        (0..self.leaf_count).find(|&i| self.tree[base + i] == best)
    }
}

/// One aggregated (election, choice) count from exported vote tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportCount {
    pub election_id: u64,
    pub choice: u32,
    pub votes: u64,
}

/// Re-derive per-(election, choice) counts from exported vote tables
///
/// Reads each path as a votes export (`id,election_id,voter_id,choice` with
/// a leading column-header row). Unreadable files and unparseable rows are
/// warn-logged and skipped; counts are keyed through an [`IndexedMap`] as
/// `(election_id << 32) | choice` and returned sorted by election then
/// choice for deterministic output.
pub fn aggregate_vote_exports<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<ExportCount>> {
    let mut counts = IndexedMap::new();

    for path in paths {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable vote export");
                continue;
            }
        };

        for line in content.lines() {
            if line.starts_with("id,") || line.is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let _id = fields.next();
            let election_id = fields.next().and_then(|f| f.trim().parse::<u64>().ok());
            let _voter_id = fields.next();
            let choice = fields.next().and_then(|f| f.trim().parse::<u32>().ok());

            let (Some(election_id), Some(choice)) = (election_id, choice) else {
                tracing::warn!(path = %path.display(), line, "skipping malformed export row");
                continue;
            };

            let key = (election_id << 32) | u64::from(choice);
            let votes = counts.get(key).unwrap_or(0);
            counts.put(key, votes + 1)?;
        }
    }

    let mut out: Vec<ExportCount> = counts
        .iter()
        .map(|(key, votes)| ExportCount {
            election_id: key >> 32,
            choice: (key & 0xffff_ffff) as u32,
            votes,
        })
        .collect();
    out.sort_unstable_by_key(|c| (c.election_id, c.choice));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winner_with_deterministic_tie_break() {
        let tree = SelectionTree::build(&[3, 7, 2, 7]).unwrap();
        assert_eq!(tree.max(), 7);
        // Index 3 ties at 7; the lower index wins
        assert_eq!(tree.winner(), Some(1));
    }

    #[test]
    fn test_build_pads_to_power_of_two() {
        let tree = SelectionTree::build(&[5, 1, 4]).unwrap();
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.max(), 5);
        assert_eq!(tree.winner(), Some(0));
        // Padding leaves never win even when all real counts are zero
        let zeros = SelectionTree::build(&[0, 0, 0]).unwrap();
        assert_eq!(zeros.winner(), Some(0));
    }

    #[test]
    fn test_single_leaf() {
        let tree = SelectionTree::build(&[9]).unwrap();
        assert_eq!(tree.max(), 9);
        assert_eq!(tree.winner(), Some(0));
    }

    #[test]
    fn test_empty_tree_has_no_winner() {
        let tree = SelectionTree::build(&[]).unwrap();
        assert_eq!(tree.winner(), None);
        assert_eq!(tree.max(), 0);
    }

    #[test]
    fn test_point_update_recomputes_ancestors() {
        let mut tree = SelectionTree::build(&[3, 7, 2, 7]).unwrap();
        tree.update(2, 10).unwrap();
        assert_eq!(tree.max(), 10);
        assert_eq!(tree.winner(), Some(2));

        tree.update(2, 0).unwrap();
        assert_eq!(tree.max(), 7);
        assert_eq!(tree.winner(), Some(1));
    }

    #[test]
    fn test_update_rejects_padding_and_out_of_range() {
        let mut tree = SelectionTree::build(&[1, 2, 3]).unwrap();
        // Leaf 3 exists only as padding
        assert!(matches!(
            tree.update(3, 9),
            Err(Error::InvalidChoice { .. })
        ));
        assert!(tree.update(2, 9).is_ok());
    }

    #[test]
    fn test_aggregate_vote_exports() {
        let dir = std::env::temp_dir().join(format!("ballot-agg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.csv");
        let b = dir.join("b.csv");
        std::fs::write(&a, "id,election_id,voter_id,choice\n1,1,10,0\n2,1,11,1\n3,1,12,0\n")
            .unwrap();
        std::fs::write(&b, "id,election_id,voter_id,choice\n4,1,13,0\n5,2,10,1\nbad,row\n")
            .unwrap();

        let counts =
            aggregate_vote_exports(&[&a, &b, &dir.join("missing.csv")]).unwrap();
        assert_eq!(
            counts,
            vec![
                ExportCount { election_id: 1, choice: 0, votes: 3 },
                ExportCount { election_id: 1, choice: 1, votes: 1 },
                ExportCount { election_id: 2, choice: 1, votes: 1 },
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
