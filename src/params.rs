use crate::error::{Error, Result};
use crate::instruction::{Argument, Operation};
use crate::sampler::WeightedSampler;
use fastrand::Rng;

// A parameterless factory for instruction operands; the standard ones live on Argument.
pub type ArgumentGenerator = fn(&mut Rng, &ProblemParameters) -> Argument;

// Relative weights of the evolutionary operators used to fill each new generation.
// Macro mutation, micro mutation and free crossover carry equal weight by default;
// the remaining operators are available but disabled.
#[derive(Debug, Clone)]
pub struct OperatorWeights {
    pub macro_mutation: f64,
    pub micro_mutation: f64,
    pub crossover_free: f64,
    pub crossover_ga: f64,
    pub crossover_homologous: f64,
    pub add_instruction: f64,
    pub remove_instruction: f64,
}

impl Default for OperatorWeights {
    fn default() -> Self {
        OperatorWeights {
            macro_mutation: 30.0,
            micro_mutation: 30.0,
            crossover_free: 30.0,
            crossover_ga: 0.0,
            crossover_homologous: 0.0,
            add_instruction: 0.0,
            remove_instruction: 0.0,
        }
    }
}

// Everything a single run needs to know, read-only to the engine. The two weighted
// tables make the instruction set pluggable per problem without the engine caring
// what is in them.
#[derive(Debug, Clone)]
pub struct ProblemParameters {
    pub register_count: usize,
    pub feature_count: usize,
    // A program with fitness <= epsilon counts as a solution.
    pub epsilon: f64,

    pub initial_min_length: usize,
    pub initial_max_length: usize,
    pub max_length: usize,
    pub population_size: usize,
    pub max_generations: usize,

    pub proportion_elitism: f64,
    pub tournament_size: usize,
    pub operator_weights: OperatorWeights,

    pub argument_generators: WeightedSampler<ArgumentGenerator>,
    pub operations: WeightedSampler<Operation>,

    // Logging sinks; None disables that log. The stats log is appended to, population
    // snapshots overwrite one file per logged generation.
    pub pop_log_interval: usize,
    pub pop_log_file_path: Option<String>,
    pub stats_log_file_path: Option<String>,
    pub run_log_file_path: Option<String>,
}

impl ProblemParameters {
    // Defaults mirror the symbolic-regression console run: all three argument kinds and
    // all five operations at equal weight, 10% elitism, tournaments of two.
    pub fn new(register_count: usize, feature_count: usize) -> Result<ProblemParameters> {
        let mut argument_generators: WeightedSampler<ArgumentGenerator> = WeightedSampler::new();
        argument_generators.add(Argument::random_constant, 1.0)?;
        argument_generators.add(Argument::random_feature, 1.0)?;
        argument_generators.add(Argument::random_register, 1.0)?;

        let mut operations = WeightedSampler::new();
        operations.add(Operation::Plus, 1.0)?;
        operations.add(Operation::Minus, 1.0)?;
        operations.add(Operation::Mult, 1.0)?;
        operations.add(Operation::Div, 1.0)?;
        operations.add(Operation::IfLess, 1.0)?;

        Ok(ProblemParameters {
            register_count,
            feature_count,
            epsilon: 0.1,
            initial_min_length: 6,
            initial_max_length: 10,
            max_length: 200,
            population_size: 1000,
            max_generations: 1000,
            proportion_elitism: 0.1,
            tournament_size: 2,
            operator_weights: OperatorWeights::default(),
            argument_generators,
            operations,
            pop_log_interval: 1,
            pop_log_file_path: None,
            stats_log_file_path: None,
            run_log_file_path: None,
        })
    }

    // Population construction refuses to start from a record that cannot produce a
    // well-formed run.
    pub fn validate(&self) -> Result<()> {
        if self.register_count == 0 {
            return Err(Error::Configuration(
                "register_count must be at least 1".to_string(),
            ));
        }
        // The standard argument table can always produce Feature operands, so a run
        // without features would index past the end of every case's feature vector.
        if self.feature_count == 0 {
            return Err(Error::Configuration(
                "feature_count must be at least 1".to_string(),
            ));
        }
        if self.population_size == 0 {
            return Err(Error::Configuration(
                "population_size must be at least 1".to_string(),
            ));
        }
        if self.initial_min_length == 0 {
            return Err(Error::Configuration(
                "initial_min_length must be at least 1".to_string(),
            ));
        }
        if self.initial_min_length > self.initial_max_length {
            return Err(Error::Configuration(format!(
                "initial_min_length {} exceeds initial_max_length {}",
                self.initial_min_length, self.initial_max_length
            )));
        }
        if self.max_length < self.initial_max_length {
            return Err(Error::Configuration(format!(
                "max_length {} is below initial_max_length {}",
                self.max_length, self.initial_max_length
            )));
        }
        if self.tournament_size == 0 {
            return Err(Error::Configuration(
                "tournament_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.proportion_elitism) {
            return Err(Error::Configuration(format!(
                "proportion_elitism {} is not in [0, 1]",
                self.proportion_elitism
            )));
        }
        if self.argument_generators.is_empty() || self.operations.is_empty() {
            return Err(Error::Configuration(
                "argument and operation tables must both be populated".to_string(),
            ));
        }
        Ok(())
    }
}
