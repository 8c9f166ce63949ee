//! User-user similarity from item co-occurrence.
//!
//! Two users co-occur on an item when both appear in that item's user list.
//! The similarity of `u` and `v` is
//! ```text
//! w(u, v) = c(u, v) / sqrt(n(u) * n(v))
//! ```
//! where `c(u, v)` counts the items they co-occur on and `n(u)` counts the
//! item lists `u` appears in: the cosine between the users' binary
//! interaction vectors. Pairs that never co-occur get no entry at all.
use std::cmp;
use std::collections::hash_map;
use std::collections::HashMap;

use rayon;
use rayon::prelude::*;

use crate::data::InteractionStore;
use crate::UserId;

/// Number of item lists each user appears in.
pub type InteractionCounts = HashMap<UserId, usize>;

/// Sparse, symmetric user-user similarity matrix without self-entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimilarityMatrix {
    rows: HashMap<UserId, HashMap<UserId, f64>>,
}

impl SimilarityMatrix {
    /// Similarity of two users, if they share at least one item.
    pub fn get(&self, user_id: &str, other_id: &str) -> Option<f64> {
        self.rows
            .get(user_id)
            .and_then(|row| row.get(other_id))
            .cloned()
    }

    /// All users similar to `user_id`, or `None` for users that
    /// share no item with anyone.
    pub fn row(&self, user_id: &str) -> Option<&HashMap<UserId, f64>> {
        self.rows.get(user_id)
    }

    /// Iterate over rows.
    pub fn iter(&self) -> hash_map::Iter<UserId, HashMap<UserId, f64>> {
        self.rows.iter()
    }

    /// Number of users with at least one neighbour.
    pub fn num_users(&self) -> usize {
        self.rows.len()
    }

    /// Number of stored (ordered) user pairs.
    pub fn num_pairs(&self) -> usize {
        self.rows.values().map(|row| row.len()).sum()
    }
}

/// Output of a similarity pass.
#[derive(Clone, Debug, Default)]
pub struct Similarities {
    /// Item-list appearances per user.
    pub counts: InteractionCounts,
    /// Normalized pairwise similarities.
    pub matrix: SimilarityMatrix,
}

/// How the co-occurrence pass is executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parallelism {
    /// A single pass over all items on the calling thread.
    Sequential,
    /// Items are split into one shard per thread; shard counts are
    /// summed before normalization.
    Sharded,
}

/// Raw integer counts, borrowing identifiers from the store.
#[derive(Debug, Default)]
struct CoOccurrences<'a> {
    counts: HashMap<&'a str, usize>,
    pairs: HashMap<&'a str, HashMap<&'a str, usize>>,
}

impl<'a> CoOccurrences<'a> {
    fn add_item(&mut self, users: &'a [UserId]) {
        for u in users {
            *self.counts.entry(u.as_str()).or_insert(0) += 1;

            for v in users {
                if u != v {
                    *self
                        .pairs
                        .entry(u.as_str())
                        .or_insert_with(HashMap::new)
                        .entry(v.as_str())
                        .or_insert(0) += 1;
                }
            }
        }
    }

    fn merge(mut self, other: CoOccurrences<'a>) -> Self {
        for (user, count) in other.counts {
            *self.counts.entry(user).or_insert(0) += count;
        }

        for (user, row) in other.pairs {
            let target = self.pairs.entry(user).or_insert_with(HashMap::new);

            for (other_user, count) in row {
                *target.entry(other_user).or_insert(0) += count;
            }
        }

        self
    }

    fn normalize(self) -> Similarities {
        let counts = &self.counts;

        let rows: HashMap<UserId, HashMap<UserId, f64>> = self
            .pairs
            .iter()
            .map(|(&user, row)| {
                let user_count = counts[user] as f64;

                let row: HashMap<UserId, f64> = row
                    .iter()
                    .map(|(&other, &co_occurrences)| {
                        let other_count = counts[other] as f64;
                        let similarity = co_occurrences as f64 / (user_count * other_count).sqrt();

                        (other.to_owned(), similarity)
                    })
                    .collect();

                (user.to_owned(), row)
            })
            .collect();

        Similarities {
            counts: counts
                .iter()
                .map(|(&user, &count)| (user.to_owned(), count))
                .collect(),
            matrix: SimilarityMatrix { rows },
        }
    }
}

/// Computes interaction counts and the similarity matrix for a store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimilarityEngine {
    parallelism: Parallelism,
    num_threads: usize,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        SimilarityEngine::new()
    }
}

impl SimilarityEngine {
    /// Build a sequential engine.
    pub fn new() -> Self {
        SimilarityEngine {
            parallelism: Parallelism::Sequential,
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Set the type of parallelism.
    pub fn parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the number of shards used in sharded mode.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = cmp::max(num_threads, 1);
        self
    }

    /// Count co-occurrences over every item in `store`, then normalize them.
    pub fn compute(&self, store: &InteractionStore) -> Similarities {
        info!(
            num_users = store.num_users(),
            num_items = store.num_items(),
            parallelism = ?self.parallelism,
            "Computing user similarities"
        );

        let co_occurrences = match self.parallelism {
            Parallelism::Sequential => {
                let mut co_occurrences = CoOccurrences::default();

                for (_, users) in store.iter_items() {
                    co_occurrences.add_item(users);
                }

                co_occurrences
            }
            Parallelism::Sharded => {
                let items: Vec<&[UserId]> = store.iter_items().map(|(_, users)| users).collect();
                let num_shards = cmp::max(self.num_threads, 1);
                let chunk_size = cmp::max(1, (items.len() + num_shards - 1) / num_shards);

                items
                    .par_chunks(chunk_size)
                    .map(|shard| {
                        let mut co_occurrences = CoOccurrences::default();

                        for &users in shard {
                            co_occurrences.add_item(users);
                        }

                        co_occurrences
                    })
                    .reduce(CoOccurrences::default, CoOccurrences::merge)
            }
        };

        let similarities = co_occurrences.normalize();

        info!(
            num_users = similarities.matrix.num_users(),
            num_pairs = similarities.matrix.num_pairs(),
            "Finished computing user similarities"
        );

        similarities
    }
}
