use crate::environment::{FitnessCase, FitnessEnvironment};
use crate::error::{Error, Result};
use crate::measure::FitnessMeasure;
use crate::params::ProblemParameters;
use crate::population::Population;
use crate::program::Program;
use fastrand::Rng;
use std::fs::OpenOptions;
use std::io::Write;
use std::time::Instant;

// One pattern per line: source image, x-position and y-position (all ignored), the
// 0-based class number, the class name (ignored), then the feature values.
pub fn parse_pattern_line(line: &str) -> Result<FitnessCase> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 {
        return Err(Error::Configuration(format!(
            "pattern line has {} fields, expected at least 6: {:?}",
            tokens.len(),
            line
        )));
    }

    let class = tokens[3].parse::<usize>().map_err(|_| {
        Error::Configuration(format!("pattern line has non-numeric class: {:?}", line))
    })?;

    let mut features = Vec::with_capacity(tokens.len() - 5);
    for token in tokens[5..].iter() {
        let value = token.parse::<f64>().map_err(|_| {
            Error::Configuration(format!("pattern line has non-numeric feature: {:?}", line))
        })?;
        features.push(value);
    }

    Ok(FitnessCase::multi_class(features, class))
}

// Loads a pattern file and rejects any case whose feature width disagrees with the
// configuration, so a ragged file fails here instead of mid-evaluation.
pub fn load_patterns(path: &str, params: &ProblemParameters) -> Result<FitnessEnvironment> {
    let mut env = FitnessEnvironment::new(params.register_count);
    env.add_cases_from_file(path, parse_pattern_line)?;

    for (i, case) in env.cases().iter().enumerate() {
        if case.features().len() != params.feature_count {
            return Err(Error::Configuration(format!(
                "pattern case {} in {} has {} features, configuration expects {}",
                i,
                path,
                case.features().len(),
                params.feature_count
            )));
        }
    }

    Ok(env)
}

// Classification is winner-take-all over the registers, so the register count doubles
// as the class count. Epsilon 0 asks for a perfect classifier.
pub fn default_parameters(class_count: usize, feature_count: usize) -> Result<ProblemParameters> {
    let mut params = ProblemParameters::new(class_count, feature_count)?;
    params.epsilon = 0.0;
    params.pop_log_file_path = Some("population".to_string());
    params.stats_log_file_path = Some("log".to_string());
    params.run_log_file_path = Some("results.csv".to_string());
    Ok(params)
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generations: usize,
    pub solved: bool,
    pub elapsed_ms: u128,
    pub train_fitness: f64,
    // None when no held-out pattern file was supplied.
    pub test_fitness: Option<f64>,
    pub best: Program,
}

// Evolves classifiers against one pattern file, optionally re-scores the champion on a
// second, and appends one CSV row to the run log. A missing test fitness is logged as
// an empty field.
pub fn run(
    patterns_path: &str,
    test_patterns_path: Option<&str>,
    rng: &mut Rng,
    params: &ProblemParameters,
) -> Result<RunSummary> {
    let mut train = load_patterns(patterns_path, params)?;
    println!(
        "Loaded {} training patterns from {}. Beginning evolution.",
        train.case_count(),
        patterns_path
    );

    let mut population = Population::new(FitnessMeasure::multi_class(), rng, params)?;

    let started = Instant::now();
    let outcome = population.evolve(&mut train, rng, params)?;
    let elapsed_ms = started.elapsed().as_millis();

    let solved = outcome <= params.max_generations;
    let generations = outcome.min(params.max_generations);

    let mut best = population.fittest().clone();
    let train_fitness = best.fitness();

    let test_fitness = match test_patterns_path {
        Some(path) => {
            let mut test = load_patterns(path, params)?;
            best.update_fitness(&mut test)?;
            Some(best.fitness())
        }
        None => None,
    };

    let summary = RunSummary {
        generations,
        solved,
        elapsed_ms,
        train_fitness,
        test_fitness,
        best,
    };
    append_run_log(&summary, params)?;
    Ok(summary)
}

fn append_run_log(summary: &RunSummary, params: &ProblemParameters) -> Result<()> {
    if let Some(path) = &params.run_log_file_path {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let test_field = summary
            .test_fitness
            .map(|fitness| fitness.to_string())
            .unwrap_or_default();
        writeln!(
            file,
            "{},{},{},{}",
            summary.generations, summary.elapsed_ms, summary.train_fitness, test_field
        )?;
    }
    Ok(())
}
