//! Random search over the number of neighbours, scored on a held-out split.
//! Results accumulate in a JSON file, best last.
extern crate clap;
extern crate failure;
extern crate rand;
extern crate rand_xorshift;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;
extern crate usercf;

use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing_subscriber::EnvFilter;

use usercf::data::train_test_split;
use usercf::datasets::{load_visits, DEFAULT_MAX_INTERACTIONS};
use usercf::evaluation::{precision_recall_at_n, Metrics};
use usercf::models::user_knn::Hyperparameters;

#[derive(Parser, Debug)]
#[command(name = "knn_search")]
#[command(about = "Random search over the neighbourhood size")]
struct Cli {
    /// Visit log CSV file
    input: PathBuf,

    /// JSON file results are appended to
    #[arg(short, long, default_value = "knn_results.json")]
    output: PathBuf,

    /// Number of most visited (visitor, dataset) pairs kept
    #[arg(long, default_value_t = DEFAULT_MAX_INTERACTIONS)]
    max_interactions: usize,

    /// Fraction of interactions held out for testing
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f32,

    /// Number of sampled configurations
    #[arg(short, long, default_value_t = 20)]
    iterations: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchResult {
    metrics: Metrics,
    elapsed: Duration,
    hyperparameters: Hyperparameters,
}

fn run(cli: Cli) -> Result<(), failure::Error> {
    let mut data = load_visits(&cli.input, cli.max_interactions)?;
    let mut rng = XorShiftRng::seed_from_u64(cli.seed);

    let (train, test) = train_test_split(&mut data, &mut rng, cli.test_fraction);
    info!(train = train.len(), test = test.len(), "Split data");

    for _ in 0..cli.iterations {
        let mut results: Vec<SearchResult> = match File::open(&cli.output) {
            Ok(file) => serde_json::from_reader(file)?,
            Err(_) => Vec::new(),
        };

        let hyper = Hyperparameters::random(&mut rng);

        let start = Instant::now();
        let mut model = hyper.clone().build();
        model.fit(&train)?;
        let result = SearchResult {
            metrics: precision_recall_at_n(&model, &test)?,
            elapsed: start.elapsed(),
            hyperparameters: hyper,
        };

        info!(
            num_neighbors = result.hyperparameters.get_num_neighbors(),
            precision = result.metrics.precision,
            recall = result.metrics.recall,
            hit_rate = result.metrics.hit_rate,
            "Evaluated configuration"
        );

        results.push(result);
        results.sort_by(|a, b| {
            a.metrics
                .precision
                .partial_cmp(&b.metrics.precision)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(best) = results.last() {
            info!(
                num_neighbors = best.hyperparameters.get_num_neighbors(),
                precision = best.metrics.precision,
                "Best result so far"
            );
        }

        serde_json::to_writer_pretty(File::create(&cli.output)?, &results)?;
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run(Cli::parse()) {
        error!(%error, "Search failed");
        std::process::exit(1);
    }
}
