use anyhow::{Context, Result};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bandersnatch_classifiers::{io, persistence, record, Dataset, Machine, Value};

/// Random monsters whose rarity grows with their stats.
fn synthetic_monsters(n: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    Dataset::from_records((0..n).map(|_| {
        let level: i64 = rng.gen_range(1..=20);
        let rank = (level - 1) / 5;
        let jitter = |rng: &mut StdRng| rng.gen_range(0.8..1.2);
        vec![
            ("Level", Value::Int(level)),
            ("Health", Value::Float(level as f64 * 10.0 * jitter(&mut rng))),
            ("Energy", Value::Float(level as f64 * 8.0 * jitter(&mut rng))),
            ("Sanity", Value::Float(level as f64 * 6.0 * jitter(&mut rng))),
            ("Rarity", Value::Text(format!("Rank {}", rank))),
        ]
    }))
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Warn)
        .parse_env(env_logger::Env::default().filter_or("BANDERSNATCH_LOG", "warn,bandersnatch_classifiers=info"))
        .init();

    let mut args = std::env::args().skip(1);
    let dataset = match args.next() {
        Some(path) => io::read_csv(&path)?,
        None => synthetic_monsters(500, 7),
    };
    let output = args.next().unwrap_or_else(|| "target/machine.bsnm".to_string());

    let machine = Machine::new(&dataset).context("Training failed")?;
    println!("{}", serde_json::to_string_pretty(&machine.describe())?);

    let probe = record([
        ("Level", Value::Int(12)),
        ("Health", Value::Float(118.0)),
        ("Energy", Value::Float(97.0)),
        ("Sanity", Value::Float(70.0)),
    ]);
    match machine.predict(&probe) {
        Ok(prediction) => println!("probe -> {} ({:.2})", prediction.label, prediction.confidence),
        Err(e) => log::warn!("Skipping probe prediction: {}", e),
    }

    persistence::save_to_path(&machine, &output)?;
    let reloaded = persistence::open(&output)?;
    println!("reloaded machine from {} with {} trees", output, reloaded.forest().n_trees());
    Ok(())
}
