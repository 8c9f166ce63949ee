#![deny(missing_docs)]
//! # usercf
//!
//! `usercf` implements user-based collaborative filtering over sparse
//! interaction counts: given how often users interacted with items, it finds
//! each user's most similar neighbours and recommends the items those
//! neighbours interacted with that the user has not seen yet.
//!
//! Similarity between two users is the cosine between their binary
//! interaction vectors, computed only for users that share at least one item.
//!
//! ## Example
//!
//! ```rust
//! # extern crate usercf;
//! use usercf::data::{Interaction, Interactions};
//! use usercf::models::user_knn::Hyperparameters;
//!
//! let data = Interactions::from(vec![
//!     Interaction::new("A", "x", 1.0),
//!     Interaction::new("A", "y", 2.0),
//!     Interaction::new("B", "x", 1.0),
//!     Interaction::new("B", "z", 3.0),
//!     Interaction::new("C", "y", 1.0),
//!     Interaction::new("C", "z", 1.0),
//! ]);
//!
//! let mut model = Hyperparameters::new()
//!     .num_neighbors(2)
//!     .num_recommendations(5)
//!     .build();
//!
//! model.fit(&data).unwrap();
//!
//! let recommendations = model.recommend("A").unwrap();
//!
//! assert_eq!(recommendations.len(), 1);
//! assert_eq!(recommendations[0].0, "z");
//! assert!((recommendations[0].1 - 2.0).abs() < 1e-9);
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate failure;
#[macro_use]
extern crate tracing;

#[cfg(feature = "csv")]
extern crate csv;
extern crate itertools;
extern crate rand;
extern crate rand_xorshift;
extern crate rayon;
extern crate serde;

pub mod data;
#[cfg(feature = "csv")]
pub mod datasets;
pub mod evaluation;
pub mod models;
pub mod similarity;

/// Alias for user identifiers.
pub type UserId = String;
/// Alias for item identifiers.
pub type ItemId = String;
/// Alias for interaction strengths (visit counts and the like).
pub type Rating = f64;

/// A ranked list of `(item, score)` pairs, best first.
pub type Recommendations = Vec<(ItemId, f64)>;

/// Recommendation error types.
#[derive(Debug, Fail, PartialEq)]
pub enum RecommendationError {
    /// The requested user has no interactions in the training data.
    #[fail(display = "Unknown user: {}", _0)]
    UnknownUser(UserId),
}

/// Fitting error types.
#[derive(Debug, Fail, PartialEq)]
pub enum FittingError {
    /// No interactions present.
    #[fail(display = "No interactions present.")]
    NoInteractions,
}

/// Trait describing models that can produce a ranked list of
/// unseen items for a user they were fitted on.
pub trait RankingModel {
    /// Recommend items for `user_id`, best first.
    fn recommend(&self, user_id: &str) -> Result<Recommendations, RecommendationError>;
    /// Maximum number of items a single `recommend` call returns.
    fn num_recommendations(&self) -> usize;
}
