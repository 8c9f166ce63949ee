//! Models module.
pub mod user_knn;

pub use crate::similarity::Parallelism;
