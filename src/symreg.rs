use crate::environment::{FitnessCase, FitnessEnvironment};
use crate::error::Result;
use crate::measure::FitnessMeasure;
use crate::params::ProblemParameters;
use crate::population::Population;
use crate::program::Program;
use fastrand::Rng;
use std::fs::OpenOptions;
use std::io::Write;
use std::time::Instant;

// The benchmark target: a Mexican-hat style bump centred on the origin.
pub fn target(x: f64) -> f64 {
    let x_squared = x * x;
    (1.0 - x_squared / 4.0 - x_squared / 4.0) * (-x_squared / 8.0 - x_squared / 8.0).exp()
}

// Training cases cover [-4, 4] at step 0.02; the test set spans twice that range at
// half the density, so generalisation beyond the training interval shows up in the
// test fitness.
pub fn training_environment(register_count: usize) -> FitnessEnvironment {
    sampled_environment(register_count, -4.0, 4.0, 0.02)
}

pub fn test_environment(register_count: usize) -> FitnessEnvironment {
    sampled_environment(register_count, -8.0, 8.0, 0.04)
}

fn sampled_environment(
    register_count: usize,
    from: f64,
    to: f64,
    step: f64,
) -> FitnessEnvironment {
    let mut env = FitnessEnvironment::new(register_count);
    let mut x = from;
    while x <= to {
        env.add_case(FitnessCase::sym_reg(x, target(x)));
        x += step;
    }
    env
}

// The console-run defaults: six registers over one feature, with every log sink on.
pub fn default_parameters() -> Result<ProblemParameters> {
    let mut params = ProblemParameters::new(6, 1)?;
    params.pop_log_file_path = Some("population".to_string());
    params.stats_log_file_path = Some("log".to_string());
    params.run_log_file_path = Some("results.csv".to_string());
    Ok(params)
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    // Clamped to max_generations, so "solved in the last generation" and "never
    // solved" report the same count; solved tells them apart.
    pub generations: usize,
    pub solved: bool,
    pub elapsed_ms: u128,
    pub train_fitness: f64,
    pub test_fitness: f64,
    pub best: Program,
}

// Runs one full evolution, re-scores the champion on the test set and appends one
// CSV row (generations, elapsed ms, train fitness, test fitness) to the run log.
pub fn run(rng: &mut Rng, params: &ProblemParameters) -> Result<RunSummary> {
    let mut train = training_environment(params.register_count);
    let mut test = test_environment(params.register_count);

    println!(
        "Loaded {} training cases and {} test cases. Beginning evolution.",
        train.case_count(),
        test.case_count()
    );

    let mut population = Population::new(FitnessMeasure::sym_reg(), rng, params)?;

    let started = Instant::now();
    let outcome = population.evolve(&mut train, rng, params)?;
    let elapsed_ms = started.elapsed().as_millis();

    let solved = outcome <= params.max_generations;
    let generations = outcome.min(params.max_generations);

    let mut best = population.fittest().clone();
    let train_fitness = best.fitness();
    best.update_fitness(&mut test)?;
    let test_fitness = best.fitness();

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
        writeln!(
            file,
            "{},{},{},{}",
            summary.generations, summary.elapsed_ms, summary.train_fitness, summary.test_fitness
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_peaks_at_the_origin() {
        assert_eq!(target(0.0), 1.0);
        assert!(target(2.0) < target(0.0));
        // Even function.
        assert_eq!(target(1.5), target(-1.5));
    }

    #[test]
    fn training_cases_cover_the_interval() {
        let env = training_environment(6);
        // 401 samples from -4 to 4 inclusive at step 0.02, give or take float drift
        // at the upper endpoint.
        assert!(env.case_count() >= 400 && env.case_count() <= 401);

        let test = test_environment(6);
        assert!(test.case_count() >= 400 && test.case_count() <= 401);
    }

    #[test]
    fn default_parameters_match_the_console_run() {
        let params = default_parameters().unwrap();
        assert_eq!(params.register_count, 6);
        assert_eq!(params.feature_count, 1);
        assert_eq!(params.epsilon, 0.1);
        assert_eq!(params.population_size, 1000);
        assert_eq!(params.max_generations, 1000);
        assert!(params.validate().is_ok());
    }
}
