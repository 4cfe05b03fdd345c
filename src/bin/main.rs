use clap::{App, Arg};
use fastrand::Rng;
use lgp_lib::error::Error;
use lgp_lib::params::ProblemParameters;
use lgp_lib::program::Program;
use lgp_lib::{get_seed_value, multiclass, symreg, Result};
use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::process;

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {}", error);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("lgp")
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .value_name("seed")
                .help("Seed the run with a given value"),
        )
        .arg(
            Arg::with_name("problem")
                .short("p")
                .long("problem")
                .value_name("problem")
                .default_value("symreg")
                .help("Problem to run: symreg or multiclass"),
        )
        .arg(
            Arg::with_name("patterns")
                .long("patterns")
                .value_name("file")
                .help("Pattern file with training cases (multiclass only)"),
        )
        .arg(
            Arg::with_name("test-patterns")
                .long("test-patterns")
                .value_name("file")
                .help("Pattern file with held-out test cases (multiclass only)"),
        )
        .arg(
            Arg::with_name("registers")
                .long("registers")
                .value_name("n")
                .help("Register count; doubles as the class count for multiclass"),
        )
        .arg(
            Arg::with_name("features")
                .long("features")
                .value_name("n")
                .help("Feature count per fitness case"),
        )
        .arg(
            Arg::with_name("population")
                .long("population")
                .value_name("n")
                .help("Population size"),
        )
        .arg(
            Arg::with_name("generations")
                .long("generations")
                .value_name("n")
                .help("Generation budget"),
        )
        .arg(
            Arg::with_name("epsilon")
                .long("epsilon")
                .value_name("x")
                .help("Fitness at or below this counts as a solution"),
        )
        .arg(
            Arg::with_name("max-length")
                .long("max-length")
                .value_name("n")
                .help("Maximum program length"),
        )
        .arg(
            Arg::with_name("stats-log")
                .long("stats-log")
                .value_name("path")
                .help("Per-generation statistics log path (.txt is appended)"),
        )
        .arg(
            Arg::with_name("pop-log")
                .long("pop-log")
                .value_name("path")
                .help("Population snapshot path (.<generation>.txt is appended)"),
        )
        .arg(
            Arg::with_name("pop-log-interval")
                .long("pop-log-interval")
                .value_name("n")
                .help("Log a population snapshot every n generations"),
        )
        .arg(
            Arg::with_name("run-log")
                .long("run-log")
                .value_name("path")
                .help("CSV file one summary row per run is appended to"),
        )
        .arg(
            Arg::with_name("no-logs")
                .long("no-logs")
                .help("Disable all file logging for this run"),
        )
        .get_matches();

    let seed = match matches.value_of("seed") {
        Some(seed_arg) => seed_arg
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid seed: {}", seed_arg)))?,
        None => get_seed_value(),
    };
    let problem = matches.value_of("problem").unwrap_or("symreg").to_string();

    println!("Using seed value {}. Problem = {}", seed, problem);
    let mut rng = Rng::with_seed(seed);

    match problem.as_str() {
        "symreg" => {
            let mut params = symreg::default_parameters()?;
            apply_overrides(&mut params, &matches)?;
            params.validate()?;

            let summary = symreg::run(&mut rng, &params)?;

            if summary.solved {
                println!("Solution found in generation {}.", summary.generations);
            } else {
                println!("No solution found within {} generations.", summary.generations);
            }
            println!("Best program:\n{}", summary.best.render(true, true));
            println!(
                "{},{},{},{}",
                summary.generations,
                summary.elapsed_ms,
                summary.train_fitness,
                summary.test_fitness
            );

            save_champion(&summary.best, seed, "symreg")?;
        }
        "multiclass" => {
            let patterns = matches.value_of("patterns").ok_or_else(|| {
                Error::Configuration("multiclass requires --patterns <file>".to_string())
            })?;
            let registers = parse_field(&matches, "registers")?.ok_or_else(|| {
                Error::Configuration("multiclass requires --registers <class count>".to_string())
            })?;
            let features = parse_field(&matches, "features")?.ok_or_else(|| {
                Error::Configuration("multiclass requires --features <n>".to_string())
            })?;

            let mut params = multiclass::default_parameters(registers, features)?;
            apply_overrides(&mut params, &matches)?;
            params.validate()?;

            let summary =
                multiclass::run(patterns, matches.value_of("test-patterns"), &mut rng, &params)?;

            if summary.solved {
                println!("Solution found in generation {}.", summary.generations);
            } else {
                println!("No solution found within {} generations.", summary.generations);
            }
            println!("Best program:\n{}", summary.best.render(true, true));
            println!(
                "Training misclassifications: {}{}",
                summary.train_fitness,
                match summary.test_fitness {
                    Some(fitness) => format!(", test misclassifications: {}", fitness),
                    None => String::new(),
                }
            );

            save_champion(&summary.best, seed, "multiclass")?;
        }
        other => {
            return Err(Error::Configuration(format!(
                "unknown problem {:?}; expected symreg or multiclass",
                other
            )));
        }
    }

    println!("Ran with seed {}", seed);
    Ok(())
}

fn parse_field(matches: &clap::ArgMatches, name: &str) -> Result<Option<usize>> {
    match matches.value_of(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Configuration(format!("invalid {}: {}", name, raw))),
        None => Ok(None),
    }
}

fn apply_overrides(params: &mut ProblemParameters, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(population) = parse_field(matches, "population")? {
        params.population_size = population;
    }
    if let Some(generations) = parse_field(matches, "generations")? {
        params.max_generations = generations;
    }
    if let Some(max_length) = parse_field(matches, "max-length")? {
        params.max_length = max_length;
    }
    if let Some(interval) = parse_field(matches, "pop-log-interval")? {
        params.pop_log_interval = interval;
    }
    if let Some(raw) = matches.value_of("epsilon") {
        params.epsilon = raw
            .parse()
            .map_err(|_| Error::Configuration(format!("invalid epsilon: {}", raw)))?;
    }

    if let Some(path) = matches.value_of("stats-log") {
        params.stats_log_file_path = Some(path.to_string());
    }
    if let Some(path) = matches.value_of("pop-log") {
        params.pop_log_file_path = Some(path.to_string());
    }
    if let Some(path) = matches.value_of("run-log") {
        params.run_log_file_path = Some(path.to_string());
    }
    if matches.is_present("no-logs") {
        params.stats_log_file_path = None;
        params.pop_log_file_path = None;
        params.run_log_file_path = None;
    }

    Ok(())
}

fn save_champion(best: &Program, seed: u64, problem: &str) -> Result<()> {
    fs::create_dir_all(format!("champions/{}", seed))?;

    let output_path = format!("champions/{}/{}.json", seed, problem);
    let serialized = serde_json::to_string(best)?;

    let mut file = File::create(&output_path)?;
    write!(file, "{}", serialized)?;

    println!("Wrote champion to {}", output_path);
    Ok(())
}
