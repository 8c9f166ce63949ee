//! Loaders turning CSV files into cleaned interactions.
//!
//! Two layouts are supported:
//!
//! - visit logs, one row per visit with `visitor` and `dataset_id` columns.
//!   Visits are counted per (visitor, dataset) pair and the count becomes
//!   the rating. Only the `max_interactions` most visited pairs are kept;
//! - plain `user_id,item_id,rating` triples.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv;
use failure;

use crate::data::{Interaction, Interactions};

/// Number of (visitor, dataset) pairs kept from a visit log by default.
pub const DEFAULT_MAX_INTERACTIONS: usize = 3000;

const VISITOR_COLUMN: &str = "visitor";
const ITEM_COLUMN: &str = "dataset_id";

/// Dataset error types.
#[derive(Debug, Fail)]
pub enum DatasetError {
    /// A required column is absent from the header.
    #[fail(display = "Missing column: {}", _0)]
    MissingColumn(String),
    /// No usable rows.
    #[fail(display = "Dataset contains no interactions.")]
    EmptyDataset,
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|header| header.trim() == name)
        .ok_or_else(|| DatasetError::MissingColumn(name.to_owned()))
}

/// Aggregate a visit log read from `reader`.
pub fn read_visits<R: Read>(
    reader: R,
    max_interactions: usize,
) -> Result<Interactions, failure::Error> {
    let mut reader = csv::Reader::from_reader(reader);

    let headers = reader.headers()?.clone();
    let visitor_idx = column_index(&headers, VISITOR_COLUMN)?;
    let item_idx = column_index(&headers, ITEM_COLUMN)?;

    let mut visits: HashMap<(String, String), usize> = HashMap::new();
    let mut num_rows = 0;

    for record in reader.records() {
        let record = record?;
        num_rows += 1;

        let visitor = record.get(visitor_idx).map(str::trim).unwrap_or("");
        let item = record.get(item_idx).map(str::trim).unwrap_or("");

        if visitor.is_empty() || item.is_empty() {
            continue;
        }

        *visits
            .entry((visitor.to_owned(), item.to_owned()))
            .or_insert(0) += 1;
    }

    if visits.is_empty() {
        return Err(DatasetError::EmptyDataset.into());
    }

    let mut visits: Vec<_> = visits.into_iter().collect();
    visits.sort_by(|(x_key, x_count), (y_key, y_count)| {
        y_count.cmp(x_count).then_with(|| x_key.cmp(y_key))
    });
    visits.truncate(max_interactions);

    debug!(
        num_rows,
        num_kept = visits.len(),
        max_interactions,
        "Aggregated visit log"
    );

    Ok(Interactions::from(
        visits
            .into_iter()
            .map(|((visitor, item), count)| Interaction::new(visitor, item, count as f64))
            .collect::<Vec<_>>(),
    ))
}

/// Load and aggregate a visit log CSV file.
pub fn load_visits<P: AsRef<Path>>(
    path: P,
    max_interactions: usize,
) -> Result<Interactions, failure::Error> {
    info!(path = %path.as_ref().display(), "Loading visit log");

    read_visits(File::open(path)?, max_interactions)
}

/// Read `user_id,item_id,rating` triples from `reader`.
pub fn read_interactions<R: Read>(reader: R) -> Result<Interactions, failure::Error> {
    let mut reader = csv::Reader::from_reader(reader);
    let interactions: Vec<Interaction> = reader.deserialize().collect::<Result<Vec<_>, _>>()?;

    if interactions.is_empty() {
        return Err(DatasetError::EmptyDataset.into());
    }

    Ok(Interactions::from(interactions))
}

/// Load a CSV file of `user_id,item_id,rating` triples.
pub fn load_interactions<P: AsRef<Path>>(path: P) -> Result<Interactions, failure::Error> {
    info!(path = %path.as_ref().display(), "Loading interactions");

    read_interactions(File::open(path)?)
}
