//! Fit a user-based KNN model on a CSV file and print recommendations
//! for one user as JSON.
extern crate clap;
extern crate failure;
extern crate rand;
extern crate rand_xorshift;
extern crate serde_json;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;
extern crate usercf;

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing_subscriber::EnvFilter;

use usercf::datasets::{load_interactions, load_visits, DEFAULT_MAX_INTERACTIONS};
use usercf::models::user_knn::{Hyperparameters, DEFAULT_NUM_NEIGHBORS, DEFAULT_NUM_RECOMMENDATIONS};
use usercf::models::Parallelism;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// One row per visit, with `visitor` and `dataset_id` columns.
    Visits,
    /// `user_id,item_id,rating` rows.
    Triples,
}

#[derive(Parser, Debug)]
#[command(name = "recommend")]
#[command(about = "Recommend items with user-based collaborative filtering")]
#[command(version)]
struct Cli {
    /// Input CSV file
    input: PathBuf,

    /// Layout of the input file
    #[arg(short, long, value_enum, default_value = "visits")]
    format: Format,

    /// Number of most visited (visitor, dataset) pairs kept from a visit log
    #[arg(long, default_value_t = DEFAULT_MAX_INTERACTIONS)]
    max_interactions: usize,

    /// Number of neighbours consulted
    #[arg(short = 'k', long, default_value_t = DEFAULT_NUM_NEIGHBORS)]
    neighbors: usize,

    /// Number of recommended items
    #[arg(short, long, default_value_t = DEFAULT_NUM_RECOMMENDATIONS)]
    num: usize,

    /// User to recommend for; a random known user if absent
    #[arg(short, long)]
    user: Option<String>,

    /// Random seed used to pick a user
    #[arg(long)]
    seed: Option<u64>,

    /// Compute similarities on this many threads
    #[arg(long)]
    threads: Option<usize>,
}

fn run(cli: Cli) -> Result<(), failure::Error> {
    let data = match cli.format {
        Format::Visits => load_visits(&cli.input, cli.max_interactions)?,
        Format::Triples => load_interactions(&cli.input)?,
    };
    info!(num_interactions = data.len(), "Loaded data");

    let mut hyper = Hyperparameters::new()
        .num_neighbors(cli.neighbors)
        .num_recommendations(cli.num);
    if let Some(threads) = cli.threads {
        hyper = hyper.parallelism(Parallelism::Sharded).num_threads(threads);
    }

    let mut model = hyper.build();
    model.fit(&data)?;

    let user = match cli.user {
        Some(user) => user,
        None => {
            let mut rng = match cli.seed {
                Some(seed) => XorShiftRng::seed_from_u64(seed),
                None => XorShiftRng::from_entropy(),
            };

            let mut users: Vec<&str> = model.store().users().collect();
            users.sort();

            users
                .choose(&mut rng)
                .map(|&user| user.to_owned())
                .ok_or_else(|| failure::err_msg("No users to recommend for"))?
        }
    };
    info!(user = %user, "Recommending");

    let recommendations = model.recommend(&user)?;
    info!(num_recommendations = recommendations.len(), "Done");

    println!("{}", serde_json::to_string_pretty(&recommendations)?);

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()) {
        error!(%error, "Recommendation failed");
        std::process::exit(1);
    }
}
