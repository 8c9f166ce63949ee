//! User-based k-nearest-neighbour recommender.
//!
//! For a target user the model takes the `num_neighbors` most similar users,
//! then scores every item those neighbours interacted with (and the target
//! did not) by summing `similarity * rating` across neighbours. The
//! `num_recommendations` highest scoring items are returned.
//!
//! Ties are broken by identifier, ascending: neighbours with equal
//! similarity are taken in user id order, and items with equal score are
//! returned in item id order. Results are therefore fully deterministic.
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rayon;

use super::Parallelism;
use crate::data::{InteractionStore, Interactions};
use crate::similarity::{Similarities, SimilarityEngine, SimilarityMatrix};
use crate::{FittingError, RankingModel, RecommendationError, Recommendations};

/// Default number of neighbours consulted per recommendation.
pub const DEFAULT_NUM_NEIGHBORS: usize = 30;
/// Default number of recommended items.
pub const DEFAULT_NUM_RECOMMENDATIONS: usize = 10;

fn by_score_then_id(x: &(&str, f64), y: &(&str, f64)) -> Ordering {
    y.1.partial_cmp(&x.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| x.0.cmp(y.0))
}

/// Ranks items for users of `store` from a precomputed similarity matrix.
///
/// Holds nothing but borrows and the two cut-offs, so it is cheap to
/// build per call and safe to share between threads.
#[derive(Clone, Copy, Debug)]
pub struct Recommender<'a> {
    store: &'a InteractionStore,
    matrix: &'a SimilarityMatrix,
    num_neighbors: usize,
    num_recommendations: usize,
}

impl<'a> Recommender<'a> {
    /// Build a recommender with default cut-offs.
    pub fn new(store: &'a InteractionStore, matrix: &'a SimilarityMatrix) -> Self {
        Recommender {
            store,
            matrix,
            num_neighbors: DEFAULT_NUM_NEIGHBORS,
            num_recommendations: DEFAULT_NUM_RECOMMENDATIONS,
        }
    }

    /// Set the number of neighbours (K).
    pub fn num_neighbors(mut self, num_neighbors: usize) -> Self {
        self.num_neighbors = num_neighbors;
        self
    }

    /// Set the number of returned items (N).
    pub fn num_recommendations(mut self, num_recommendations: usize) -> Self {
        self.num_recommendations = num_recommendations;
        self
    }

    /// The at most `num_neighbors` users most similar to `user_id`, best first.
    ///
    /// Users that share no item with anyone have no neighbours.
    pub fn neighbors(&self, user_id: &str) -> Result<Vec<(&'a str, f64)>, RecommendationError> {
        if !self.store.contains_user(user_id) {
            return Err(RecommendationError::UnknownUser(user_id.to_owned()));
        }

        let row = match self.matrix.row(user_id) {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        Ok(row
            .iter()
            .map(|(other, &similarity)| (other.as_str(), similarity))
            .sorted_by(by_score_then_id)
            .take(self.num_neighbors)
            .collect())
    }

    /// Recommend up to `num_recommendations` items `user_id` has not
    /// interacted with, best first.
    pub fn recommend(&self, user_id: &str) -> Result<Recommendations, RecommendationError> {
        let watched: HashSet<&str> = self
            .store
            .user_interactions(user_id)
            .ok_or_else(|| RecommendationError::UnknownUser(user_id.to_owned()))?
            .iter()
            .map(|(item_id, _)| item_id.as_str())
            .collect();

        let neighbors = self.neighbors(user_id)?;

        if neighbors.is_empty() {
            info!(user_id, "No similar users found, nothing to recommend");
            return Ok(Vec::new());
        }

        let mut scores: HashMap<&str, f64> = HashMap::new();

        for &(neighbor, similarity) in &neighbors {
            let interactions = self.store.user_interactions(neighbor).unwrap_or(&[]);

            for (item_id, rating) in interactions {
                if !watched.contains(item_id.as_str()) {
                    *scores.entry(item_id.as_str()).or_insert(0.0) += similarity * rating;
                }
            }
        }

        debug!(
            user_id,
            num_neighbors = neighbors.len(),
            num_candidates = scores.len(),
            "Scored candidate items"
        );

        Ok(scores
            .into_iter()
            .sorted_by(by_score_then_id)
            .take(self.num_recommendations)
            .map(|(item_id, score)| (item_id.to_owned(), score))
            .collect())
    }
}

/// Hyperparameters describing the user-based KNN model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Hyperparameters {
    num_neighbors: usize,
    num_recommendations: usize,
    parallelism: Parallelism,
    num_threads: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters::new()
    }
}

impl Hyperparameters {
    /// Build new hyperparameters.
    pub fn new() -> Self {
        Hyperparameters {
            num_neighbors: DEFAULT_NUM_NEIGHBORS,
            num_recommendations: DEFAULT_NUM_RECOMMENDATIONS,
            parallelism: Parallelism::Sequential,
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Set the number of neighbours consulted per recommendation.
    pub fn num_neighbors(mut self, num_neighbors: usize) -> Self {
        self.num_neighbors = num_neighbors;
        self
    }

    /// Set the number of recommended items.
    pub fn num_recommendations(mut self, num_recommendations: usize) -> Self {
        self.num_recommendations = num_recommendations;
        self
    }

    /// Set the type of parallelism used to compute similarities.
    pub fn parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set number of threads to be used.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the number of neighbours randomly: useful for hyperparameter search.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Hyperparameters {
            num_neighbors: 2_usize.pow(Uniform::new(0, 8).sample(rng)),
            num_recommendations: DEFAULT_NUM_RECOMMENDATIONS,
            parallelism: Parallelism::Sharded,
            num_threads: rayon::current_num_threads(),
        }
    }

    /// Number of neighbours consulted per recommendation.
    pub fn get_num_neighbors(&self) -> usize {
        self.num_neighbors
    }

    /// Build the (unfitted) model.
    pub fn build(self) -> UserKNNModel {
        UserKNNModel {
            hyper: self,
            store: InteractionStore::new(),
            similarities: Similarities::default(),
        }
    }
}

/// User-based KNN model: the training interactions plus their similarities.
#[derive(Clone, Debug)]
pub struct UserKNNModel {
    hyper: Hyperparameters,
    store: InteractionStore,
    similarities: Similarities,
}

impl UserKNNModel {
    /// Fit the model, replacing anything fitted before.
    pub fn fit(&mut self, interactions: &Interactions) -> Result<(), FittingError> {
        if interactions.is_empty() {
            return Err(FittingError::NoInteractions);
        }

        let store = interactions.to_store();
        let similarities = SimilarityEngine::new()
            .parallelism(self.hyper.parallelism)
            .num_threads(self.hyper.num_threads)
            .compute(&store);

        self.store = store;
        self.similarities = similarities;

        Ok(())
    }

    /// The model's hyperparameters.
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyper
    }

    /// The interactions the model was fitted on.
    pub fn store(&self) -> &InteractionStore {
        &self.store
    }

    /// Interaction counts and similarities computed during fitting.
    pub fn similarities(&self) -> &Similarities {
        &self.similarities
    }

    /// A recommender over the fitted data using the model's cut-offs.
    pub fn recommender(&self) -> Recommender {
        Recommender::new(&self.store, &self.similarities.matrix)
            .num_neighbors(self.hyper.num_neighbors)
            .num_recommendations(self.hyper.num_recommendations)
    }

    /// The most similar users to `user_id`, best first.
    pub fn neighbors(&self, user_id: &str) -> Result<Vec<(&str, f64)>, RecommendationError> {
        self.recommender().neighbors(user_id)
    }

    /// Recommend unseen items for `user_id`, best first.
    pub fn recommend(&self, user_id: &str) -> Result<Recommendations, RecommendationError> {
        self.recommender().recommend(user_id)
    }
}

impl RankingModel for UserKNNModel {
    fn recommend(&self, user_id: &str) -> Result<Recommendations, RecommendationError> {
        UserKNNModel::recommend(self, user_id)
    }

    fn num_recommendations(&self) -> usize {
        self.hyper.num_recommendations
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;
    use crate::data::Interaction;

    const TOLERANCE: f64 = 1e-12;

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

    fn fit(data: &Interactions, hyper: Hyperparameters) -> UserKNNModel {
        let mut model = hyper.build();
        model.fit(data).unwrap();

        model
    }

    /// Many users, a few popular items and a long tail.
    fn synthetic() -> Interactions {
        let mut rng = XorShiftRng::from_seed([7; 16]);
        let mut seen = HashSet::new();
        let mut data = Interactions::new();

        for _ in 0..2000 {
            let user = rng.gen_range(0..100);
            let item = if rng.gen_bool(0.5) {
                rng.gen_range(0..10)
            } else {
                rng.gen_range(0..200)
            };

            if seen.insert((user, item)) {
                data.push(Interaction::new(
                    format!("user-{}", user),
                    format!("item-{}", item),
                    rng.gen_range(1..20) as f64,
                ));
            }
        }

        data
    }

    #[test]
    fn scenario_recommendation() {
        let model = fit(
            &scenario(),
            Hyperparameters::new().num_neighbors(2).num_recommendations(5),
        );

        let neighbors = model.neighbors("A").unwrap();
        assert_eq!(
            neighbors.iter().map(|x| x.0).collect::<Vec<_>>(),
            vec!["B", "C"]
        );

        let recommendations = model.recommend("A").unwrap();

        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].0, "z");
        assert!((recommendations[0].1 - 2.0).abs() < TOLERANCE);
    }

    #[test]
    fn neighbor_ties_break_by_user_id() {
        let model = fit(
            &scenario(),
            Hyperparameters::new().num_neighbors(1).num_recommendations(5),
        );

        // B and C are equally similar to A; B wins the tie.
        assert_eq!(model.neighbors("A").unwrap(), vec![("B", 0.5)]);

        let recommendations = model.recommend("A").unwrap();
        assert_eq!(recommendations.len(), 1);
        assert!((recommendations[0].1 - 1.5).abs() < TOLERANCE);
    }

    #[test]
    fn item_ties_break_by_item_id() {
        let data = Interactions::from(vec![
            Interaction::new("A", "x", 1.0),
            Interaction::new("B", "x", 1.0),
            Interaction::new("B", "q", 2.0),
            Interaction::new("B", "p", 2.0),
            Interaction::new("B", "r", 1.0),
        ]);
        let model = fit(&data, Hyperparameters::new());

        let items: Vec<_> = model
            .recommend("A")
            .unwrap()
            .into_iter()
            .map(|(item, _)| item)
            .collect();

        assert_eq!(items, vec!["p", "q", "r"]);
    }

    #[test]
    fn isolated_user_gets_nothing() {
        let mut data = scenario();
        data.push(Interaction::new("D", "w", 4.0));

        let model = fit(&data, Hyperparameters::new());

        assert!(model.neighbors("D").unwrap().is_empty());
        assert_eq!(model.recommend("D").unwrap(), Vec::new());
    }

    #[test]
    fn unknown_user_is_an_error() {
        let model = fit(&scenario(), Hyperparameters::new());

        assert_eq!(
            model.recommend("nonexistent"),
            Err(RecommendationError::UnknownUser("nonexistent".to_owned()))
        );
        assert!(model.neighbors("nonexistent").is_err());
    }

    #[test]
    fn fitting_without_data_fails() {
        let mut model = Hyperparameters::new().build();

        assert_eq!(
            model.fit(&Interactions::new()),
            Err(FittingError::NoInteractions)
        );
    }

    #[test]
    fn recommendations_are_unseen_bounded_and_sorted() {
        let data = synthetic();
        let model = fit(
            &data,
            Hyperparameters::new().num_neighbors(5).num_recommendations(7),
        );
        let store = model.store();

        for user in store.users() {
            let watched: HashSet<&str> = store
                .user_interactions(user)
                .unwrap()
                .iter()
                .map(|(item, _)| item.as_str())
                .collect();

            assert!(model.neighbors(user).unwrap().len() <= 5);

            let recommendations = model.recommend(user).unwrap();
            assert!(recommendations.len() <= 7);

            for (item, _) in &recommendations {
                assert!(!watched.contains(item.as_str()));
            }

            for pair in recommendations.windows(2) {
                assert!(pair[0].1 >= pair[1].1);
            }
        }
    }

    #[test]
    fn recommendations_are_deterministic() {
        let data = synthetic();
        let hyper = Hyperparameters::new().num_neighbors(3).num_recommendations(10);

        let first = fit(&data, hyper.clone());
        let second = fit(&data, hyper.parallelism(Parallelism::Sharded).num_threads(4));

        for user in first.store().users() {
            assert_eq!(first.recommend(user), second.recommend(user));
            assert_eq!(first.recommend(user), first.recommend(user));
        }
    }
}
