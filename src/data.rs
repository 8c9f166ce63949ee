//! Interaction records and the stores built from them.
use std::collections::HashMap;
use std::iter::FromIterator;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{ItemId, Rating, UserId};

/// A single observed (user, item) affinity, such as a visit count.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    rating: Rating,
}

impl Interaction {
    /// Build a new interaction.
    pub fn new<U: Into<UserId>, I: Into<ItemId>>(user_id: U, item_id: I, rating: Rating) -> Self {
        Interaction {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }

    /// The interacting user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The item interacted with.
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Strength of the interaction.
    pub fn rating(&self) -> Rating {
        self.rating
    }
}

/// Split interactions at random into a `(train, test)` pair, with
/// `test_fraction` of them going into the test set.
pub fn train_test_split<R: Rng>(
    interactions: &mut Interactions,
    rng: &mut R,
    test_fraction: f32,
) -> (Interactions, Interactions) {
    interactions.shuffle(rng);

    let (test, train) = interactions.split_at((test_fraction * interactions.len() as f32) as usize);

    (train, test)
}

/// An ordered collection of interactions.
#[derive(Clone, Debug, Default)]
pub struct Interactions {
    interactions: Vec<Interaction>,
}

impl Interactions {
    /// Build an empty collection.
    pub fn new() -> Self {
        Interactions {
            interactions: Vec::new(),
        }
    }

    /// Append an interaction.
    pub fn push(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    /// The interactions, in insertion order.
    pub fn data(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Shuffle the interactions in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.interactions.shuffle(rng);
    }

    /// Split into the first `idx` interactions and the rest.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let idx = idx.min(self.len());

        let head = Interactions {
            interactions: self.interactions[..idx].to_owned(),
        };
        let tail = Interactions {
            interactions: self.interactions[idx..].to_owned(),
        };

        (head, tail)
    }

    /// Build the user and item indices for these interactions.
    pub fn to_store(&self) -> InteractionStore {
        InteractionStore::from(self)
    }
}

impl From<Vec<Interaction>> for Interactions {
    fn from(data: Vec<Interaction>) -> Interactions {
        Interactions { interactions: data }
    }
}

/// Per-user interaction lists together with the item to users inverted index.
///
/// Records are kept exactly as ingested: nothing is deduplicated, so an item
/// listing the same user twice counts twice during similarity computation.
#[derive(Clone, Debug, Default)]
pub struct InteractionStore {
    train: HashMap<UserId, Vec<(ItemId, Rating)>>,
    item_users: HashMap<ItemId, Vec<UserId>>,
    num_interactions: usize,
}

impl InteractionStore {
    /// Build an empty store.
    pub fn new() -> Self {
        InteractionStore::default()
    }

    /// Append records in order, creating user and item buckets on first sight.
    pub fn ingest<'a, T: IntoIterator<Item = &'a Interaction>>(&mut self, records: T) {
        for record in records {
            self.insert(record.user_id(), record.item_id(), record.rating());
        }
    }

    fn insert(&mut self, user_id: &str, item_id: &str, rating: Rating) {
        self.train
            .entry(user_id.to_owned())
            .or_insert_with(Vec::new)
            .push((item_id.to_owned(), rating));
        self.item_users
            .entry(item_id.to_owned())
            .or_insert_with(Vec::new)
            .push(user_id.to_owned());
        self.num_interactions += 1;
    }

    /// The `(item, rating)` pairs of a user, in ingestion order.
    pub fn user_interactions(&self, user_id: &str) -> Option<&[(ItemId, Rating)]> {
        self.train.get(user_id).map(|x| x.as_slice())
    }

    /// The users that interacted with an item, in ingestion order.
    pub fn item_users(&self, item_id: &str) -> Option<&[UserId]> {
        self.item_users.get(item_id).map(|x| x.as_slice())
    }

    /// Iterate over the inverted index.
    pub fn iter_items(&self) -> impl Iterator<Item = (&str, &[UserId])> {
        self.item_users
            .iter()
            .map(|(item, users)| (item.as_str(), users.as_slice()))
    }

    /// Iterate over known users.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.train.keys().map(|x| x.as_str())
    }

    /// Whether the user has any interactions.
    pub fn contains_user(&self, user_id: &str) -> bool {
        self.train.contains_key(user_id)
    }

    /// Number of distinct users.
    pub fn num_users(&self) -> usize {
        self.train.len()
    }

    /// Number of distinct items.
    pub fn num_items(&self) -> usize {
        self.item_users.len()
    }

    /// Total number of ingested interactions.
    pub fn len(&self) -> usize {
        self.num_interactions
    }

    /// Whether nothing has been ingested.
    pub fn is_empty(&self) -> bool {
        self.num_interactions == 0
    }
}

impl<'a> From<&'a Interactions> for InteractionStore {
    fn from(interactions: &'a Interactions) -> Self {
        let mut store = InteractionStore::new();
        store.ingest(interactions.data());

        store
    }
}

impl FromIterator<Interaction> for InteractionStore {
    fn from_iter<T: IntoIterator<Item = Interaction>>(iter: T) -> Self {
        let mut store = InteractionStore::new();

        for record in iter {
            store.insert(record.user_id(), record.item_id(), record.rating());
        }

        store
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;

    fn scenario() -> Interactions {
        Interactions::from(vec![
            Interaction::new("A", "x", 1.0),
            Interaction::new("A", "y", 2.0),
            Interaction::new("B", "x", 1.0),
            Interaction::new("B", "z", 3.0),
            Interaction::new("C", "y", 1.0),
            Interaction::new("C", "z", 1.0),
        ])
    }

    #[test]
    fn ingest_builds_both_indices() {
        let store = scenario().to_store();

        assert_eq!(store.num_users(), 3);
        assert_eq!(store.num_items(), 3);
        assert_eq!(store.len(), 6);

        assert_eq!(
            store.user_interactions("B").unwrap(),
            &[("x".to_owned(), 1.0), ("z".to_owned(), 3.0)]
        );
        assert_eq!(
            store.item_users("z").unwrap(),
            &["B".to_owned(), "C".to_owned()]
        );
    }

    #[test]
    fn index_is_consistent_with_train() {
        let store = scenario().to_store();

        for user in store.users() {
            for (item, _) in store.user_interactions(user).unwrap() {
                assert!(store.item_users(item).unwrap().iter().any(|u| u == user));
            }
        }
    }

    #[test]
    fn duplicates_are_kept() {
        let store: InteractionStore = vec![
            Interaction::new("A", "x", 1.0),
            Interaction::new("A", "x", 4.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(store.user_interactions("A").unwrap().len(), 2);
        assert_eq!(store.item_users("x").unwrap().len(), 2);
    }

    #[test]
    fn empty_input_gives_empty_store() {
        let store = Interactions::new().to_store();

        assert!(store.is_empty());
        assert_eq!(store.num_users(), 0);
        assert!(store.user_interactions("A").is_none());
    }

    #[test]
    fn split_preserves_all_interactions() {
        let mut data = scenario();
        let mut rng = XorShiftRng::from_seed([42; 16]);

        let (train, test) = train_test_split(&mut data, &mut rng, 0.5);

        assert_eq!(test.len(), 3);
        assert_eq!(train.len() + test.len(), 6);
    }
}
