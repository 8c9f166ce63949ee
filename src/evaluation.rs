//! Offline evaluation of ranking models on held-out interactions.
use std::collections::HashSet;

use rayon::prelude::*;

use crate::data::Interactions;
use crate::RankingModel;

/// Evaluation error types.
#[derive(Debug, Fail, PartialEq)]
pub enum EvaluationError {
    /// None of the test users are known to the model.
    #[fail(display = "No test users are known to the model.")]
    NoTestUsers,
}

/// Ranking metrics averaged over test users.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    /// Mean fraction of the `N` recommendation slots that hit a test item.
    pub precision: f64,
    /// Mean fraction of each user's test items that were recommended.
    pub recall: f64,
    /// Fraction of users with at least one hit.
    pub hit_rate: f64,
    /// Number of users the averages are taken over.
    pub num_users: usize,
}

/// Compute precision, recall and hit rate at `N` for every test user the
/// model was fitted on. Users present only in `test` cannot be scored and
/// are skipped.
pub fn precision_recall_at_n<T: RankingModel + Sync>(
    model: &T,
    test: &Interactions,
) -> Result<Metrics, EvaluationError> {
    let test = test.to_store();
    let num_slots = model.num_recommendations().max(1) as f64;
    let users: Vec<&str> = test.users().collect();

    let scores: Vec<(f64, f64, bool)> = users
        .par_iter()
        .filter_map(|&user_id| {
            let recommendations = model.recommend(user_id).ok()?;
            let relevant: HashSet<&str> = test
                .user_interactions(user_id)?
                .iter()
                .map(|(item_id, _)| item_id.as_str())
                .collect();

            let hits = recommendations
                .iter()
                .filter(|(item_id, _)| relevant.contains(item_id.as_str()))
                .count();

            Some((
                hits as f64 / num_slots,
                hits as f64 / relevant.len() as f64,
                hits > 0,
            ))
        })
        .collect();

    if scores.is_empty() {
        return Err(EvaluationError::NoTestUsers);
    }

    let num_users = scores.len() as f64;

    Ok(Metrics {
        precision: scores.iter().map(|x| x.0).sum::<f64>() / num_users,
        recall: scores.iter().map(|x| x.1).sum::<f64>() / num_users,
        hit_rate: scores.iter().filter(|x| x.2).count() as f64 / num_users,
        num_users: scores.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interaction;
    use crate::models::user_knn::Hyperparameters;

    #[test]
    fn held_out_item_is_found() {
        let train = Interactions::from(vec![
            Interaction::new("A", "x", 1.0),
            Interaction::new("A", "y", 1.0),
            Interaction::new("B", "x", 2.0),
            Interaction::new("B", "y", 1.0),
            Interaction::new("B", "z", 5.0),
        ]);
        let test = Interactions::from(vec![
            Interaction::new("A", "z", 1.0),
            Interaction::new("E", "x", 1.0),
        ]);

        let mut model = Hyperparameters::new().num_recommendations(4).build();
        model.fit(&train).unwrap();

        let metrics = precision_recall_at_n(&model, &test).unwrap();

        assert_eq!(metrics.num_users, 1);
        assert!((metrics.precision - 0.25).abs() < 1e-12);
        assert!((metrics.recall - 1.0).abs() < 1e-12);
        assert!((metrics.hit_rate - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_test_users_only() {
        let train = Interactions::from(vec![Interaction::new("A", "x", 1.0)]);
        let test = Interactions::from(vec![Interaction::new("E", "x", 1.0)]);

        let mut model = Hyperparameters::new().build();
        model.fit(&train).unwrap();

        assert_eq!(
            precision_recall_at_n(&model, &test),
            Err(EvaluationError::NoTestUsers)
        );
    }
}
