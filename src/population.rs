use crate::environment::FitnessEnvironment;
use crate::error::Result;
use crate::measure::FitnessMeasure;
use crate::params::ProblemParameters;
use crate::program::Program;
use crate::random_below;
use crate::sampler::WeightedSampler;
use fastrand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::fs::OpenOptions;
use std::io::Write;

// Every genetic operator has the same shape: read the current generation, return one
// newly owned child. Iterate draws these from a weighted table.
type GeneticOperator = fn(&Population, &ProblemParameters, &mut Rng) -> Result<Program>;

// The current generation. Iterate replaces the whole vector wholesale, so no program
// ever lives across a generation boundary except via an explicit clone.
#[derive(Debug, Clone)]
pub struct Population {
    programs: Vec<Program>,
}

impl Population {
    // Builds the initial generation. Program lengths are assigned in contiguous
    // equal-size bands spanning [initial_min_length, initial_max_length] in increasing
    // order, so early-indexed programs are the short ones.
    pub fn new(
        measure: FitnessMeasure,
        rng: &mut Rng,
        params: &ProblemParameters,
    ) -> Result<Population> {
        params.validate()?;

        let length_range = params.initial_max_length - params.initial_min_length + 1;
        let band_size = (params.population_size / length_range).max(1);

        let mut programs = Vec::with_capacity(params.population_size);
        let mut length = params.initial_min_length;

        for i in 0..params.population_size {
            programs.push(Program::random(length, measure.clone(), rng, params)?);
            if (i + 1) % band_size == 0 && length < params.initial_max_length {
                length += 1;
            }
        }

        Ok(Population { programs })
    }

    pub fn size(&self) -> usize {
        self.programs.len()
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    // Re-scores every program whose genotype changed since its last evaluation.
    pub fn evaluate_flagged(&mut self, env: &mut FitnessEnvironment) -> Result<()> {
        for program in self.programs.iter_mut() {
            if program.is_fitness_stale() {
                program.update_fitness(env)?;
            }
        }
        Ok(())
    }

    pub fn solution_exists(&self, params: &ProblemParameters) -> bool {
        self.programs
            .iter()
            .any(|program| program.fitness() <= params.epsilon)
    }

    pub fn sort_fittest_first(&mut self) {
        self.programs.sort_by(|a, b| {
            a.fitness()
                .partial_cmp(&b.fitness())
                .unwrap_or(Ordering::Equal)
        });
    }

    pub fn fittest(&self) -> &Program {
        self.programs
            .iter()
            .min_by(|a, b| {
                a.fitness()
                    .partial_cmp(&b.fitness())
                    .unwrap_or(Ordering::Equal)
            })
            .expect("population is never empty")
    }

    // Tournament selection: one incumbent plus tournament_size - 1 distinct challengers,
    // re-drawing on any collision; the index with strictly lower fitness wins. A
    // one-member population short-circuits without consuming the generator.
    pub fn select_by_fitness(&self, rng: &mut Rng, params: &ProblemParameters) -> usize {
        if self.programs.len() == 1 {
            return 0;
        }

        let entrants = params.tournament_size.min(self.programs.len());
        let mut drawn = vec![random_below(rng, self.programs.len())];
        let mut winner = drawn[0];

        while drawn.len() < entrants {
            let challenger = random_below(rng, self.programs.len());
            if drawn.contains(&challenger) {
                continue;
            }
            drawn.push(challenger);
            if self.programs[challenger].fitness() < self.programs[winner].fitness() {
                winner = challenger;
            }
        }

        winner
    }

    fn select_clone(&self, rng: &mut Rng, params: &ProblemParameters) -> Program {
        self.programs[self.select_by_fitness(rng, params)].clone()
    }

    // Replaces one uniformly random instruction with a freshly generated one.
    pub fn macro_mutation(&self, params: &ProblemParameters, rng: &mut Rng) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let index = random_below(rng, child.instructions.len());
        child.instructions[index] = crate::instruction::Instruction::random(rng, params)?;
        child.fitness_stale = true;
        Ok(child)
    }

    // Point-mutates one uniformly random instruction in place.
    pub fn micro_mutation(&self, params: &ProblemParameters, rng: &mut Rng) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let index = random_below(rng, child.instructions.len());
        child.instructions[index].mutate(rng, params)?;
        child.fitness_stale = true;
        Ok(child)
    }

    // Free crossover: a contiguous victim segment of the first parent is replaced by a
    // clone of a contiguous donor segment of the second, in donor order. The two
    // segments may differ in length, so the child is culled back to max_length.
    pub fn crossover_free(&self, params: &ProblemParameters, rng: &mut Rng) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let donor = &self.programs[self.select_by_fitness(rng, params)];

        let victim_start = random_below(rng, child.instructions.len() - 1);
        let victim_end =
            victim_start + 1 + random_below(rng, child.instructions.len() - victim_start);

        let donor_start = random_below(rng, donor.instructions.len() - 1);
        let donor_end =
            donor_start + 1 + random_below(rng, donor.instructions.len() - donor_start);

        child.instructions.splice(
            victim_start..victim_end,
            donor.instructions[donor_start..donor_end].iter().cloned(),
        );

        child.randomly_cull_to_size(params.max_length, rng);
        child.fitness_stale = true;
        Ok(child)
    }

    // Length-preserving crossover: same swap length in both parents, independently drawn
    // anchor positions. Parents of different lengths fall back to free crossover with
    // fresh selections.
    pub fn crossover_ga(&self, params: &ProblemParameters, rng: &mut Rng) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let donor = &self.programs[self.select_by_fitness(rng, params)];

        if child.instructions.len() != donor.instructions.len() {
            return self.crossover_free(params, rng);
        }

        let size = child.instructions.len();
        let victim_start = random_below(rng, size);
        let segment_length = random_below(rng, size - victim_start + 1);
        let donor_start = random_below(rng, size - segment_length + 1);

        child.instructions[victim_start..victim_start + segment_length].clone_from_slice(
            &donor.instructions[donor_start..donor_start + segment_length],
        );

        child.fitness_stale = true;
        Ok(child)
    }

    // Homologous crossover: one segment position, swapped between equal-length parents.
    // Same fallback as crossover_ga on a length mismatch.
    pub fn crossover_homologous(
        &self,
        params: &ProblemParameters,
        rng: &mut Rng,
    ) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let donor = &self.programs[self.select_by_fitness(rng, params)];

        if child.instructions.len() != donor.instructions.len() {
            return self.crossover_free(params, rng);
        }

        let size = child.instructions.len();
        let start = random_below(rng, size);
        let end = start + random_below(rng, size - start + 1);

        child.instructions[start..end].clone_from_slice(&donor.instructions[start..end]);

        child.fitness_stale = true;
        Ok(child)
    }

    // Inserts one fresh instruction at a uniformly random position, including the end.
    pub fn add_random_instruction(
        &self,
        params: &ProblemParameters,
        rng: &mut Rng,
    ) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        let index = random_below(rng, child.instructions.len() + 1);
        child
            .instructions
            .insert(index, crate::instruction::Instruction::random(rng, params)?);
        child.randomly_cull_to_size(params.max_length, rng);
        child.fitness_stale = true;
        Ok(child)
    }

    // Removes one uniformly random instruction. A one-instruction parent degrades to
    // macro mutation instead, since removing the last instruction is disallowed.
    pub fn remove_random_instruction(
        &self,
        params: &ProblemParameters,
        rng: &mut Rng,
    ) -> Result<Program> {
        let mut child = self.select_clone(rng, params);
        if child.instructions.len() == 1 {
            return self.macro_mutation(params, rng);
        }
        child.remove_random_instruction(rng);
        Ok(child)
    }

    fn operator_table(params: &ProblemParameters) -> Result<WeightedSampler<GeneticOperator>> {
        let weights = &params.operator_weights;
        let mut table: WeightedSampler<GeneticOperator> = WeightedSampler::new();
        table.add(Population::macro_mutation, weights.macro_mutation)?;
        table.add(Population::micro_mutation, weights.micro_mutation)?;
        table.add(Population::crossover_free, weights.crossover_free)?;
        table.add(Population::crossover_ga, weights.crossover_ga)?;
        table.add(Population::crossover_homologous, weights.crossover_homologous)?;
        table.add(Population::add_random_instruction, weights.add_instruction)?;
        table.add(Population::remove_random_instruction, weights.remove_instruction)?;
        Ok(table)
    }

    // One generational step: the elite survive verbatim as deep copies, the rest of the
    // next generation is bred through the weighted operator table. Every admitted child
    // is culled to max_length first. The old generation is replaced wholesale.
    pub fn iterate(&mut self, rng: &mut Rng, params: &ProblemParameters) -> Result<()> {
        let operators = Population::operator_table(params)?;
        let elite_count =
            (params.proportion_elitism * self.programs.len() as f64).floor() as usize;

        self.sort_fittest_first();

        let mut next_generation = Vec::with_capacity(self.programs.len());
        next_generation.extend(self.programs[..elite_count].iter().cloned());

        while next_generation.len() < self.programs.len() {
            let operator = operators.sample(rng)?;
            let mut child = operator(self, params, rng)?;
            child.randomly_cull_to_size(params.max_length, rng);
            next_generation.push(child);
        }

        self.programs = next_generation;
        Ok(())
    }

    // Runs the full loop against the case source. Returns the generation at which a
    // solution (fitness <= epsilon) first appears, 0 meaning the initial population
    // already qualifies, or max_generations + 1 if the budget runs out.
    pub fn evolve(
        &mut self,
        env: &mut FitnessEnvironment,
        rng: &mut Rng,
        params: &ProblemParameters,
    ) -> Result<usize> {
        self.evaluate_flagged(env)?;
        self.log_generation(0, params)?;
        if self.solution_exists(params) {
            return Ok(0);
        }

        for generation in 1..=params.max_generations {
            self.iterate(rng, params)?;
            self.evaluate_flagged(env)?;
            self.log_generation(generation, params)?;
            if self.solution_exists(params) {
                return Ok(generation);
            }
        }

        Ok(params.max_generations + 1)
    }

    pub fn render(&self) -> String {
        let mut buffer = String::new();
        for program in self.programs.iter() {
            buffer.push_str(&program.render(true, true));
            buffer.push('\n');
        }
        buffer
    }

    // Logging is an external collaborator invoked between generations, never during
    // evaluation. Both sinks are optional and off by default.
    fn log_generation(&self, generation: usize, params: &ProblemParameters) -> Result<()> {
        self.log_statistics(generation, params)?;
        self.log_snapshot(generation, params)?;
        Ok(())
    }

    fn log_statistics(&self, generation: usize, params: &ProblemParameters) -> Result<()> {
        let path = match &params.stats_log_file_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let count = self.programs.len() as f64;
        let average_fitness =
            self.programs.iter().map(|p| p.fitness()).sum::<f64>() / count;
        let average_size =
            self.programs.iter().map(|p| p.size() as f64).sum::<f64>() / count;
        let distinct: HashSet<String> = self
            .programs
            .iter()
            .map(|p| p.render(false, false))
            .collect();
        let best = self.fittest();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}.txt", path))?;
        writeln!(
            file,
            "generation {}: best fitness {}, average fitness {}, average size {}, {} distinct programs",
            generation,
            best.fitness(),
            average_fitness,
            average_size,
            distinct.len()
        )?;
        writeln!(file, "{}", best.render(true, true))?;
        Ok(())
    }

    fn log_snapshot(&self, generation: usize, params: &ProblemParameters) -> Result<()> {
        if let Some(path) = &params.pop_log_file_path {
            if params.pop_log_interval > 0 && generation % params.pop_log_interval == 0 {
                fs::write(format!("{}.{}.txt", path, generation), self.render())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::FitnessCase;

    fn small_params() -> ProblemParameters {
        let mut params = ProblemParameters::new(3, 1).unwrap();
        params.population_size = 100;
        params.initial_min_length = 6;
        params.initial_max_length = 10;
        params.max_length = 20;
        params.max_generations = 5;
        params
    }

    fn sym_reg_env() -> FitnessEnvironment {
        let mut env = FitnessEnvironment::new(3);
        for i in 0..10 {
            let x = i as f64 * 0.5 - 2.5;
            env.add_case(FitnessCase::sym_reg(x, 2.0 * x));
        }
        env
    }

    #[test]
    fn init_assigns_lengths_in_increasing_bands() {
        let params = small_params();
        let mut rng = Rng::with_seed(17);
        let population =
            Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();

        assert_eq!(population.size(), 100);

        let lengths: Vec<usize> = population.programs().iter().map(|p| p.size()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_unstable();
        assert_eq!(lengths, sorted);

        // 100 programs over 5 lengths: 20 of each.
        for length in 6..=10 {
            assert_eq!(lengths.iter().filter(|l| **l == length).count(), 20);
        }
    }

    #[test]
    fn invalid_parameters_are_rejected_at_construction() {
        let mut params = small_params();
        params.population_size = 0;
        let mut rng = Rng::with_seed(17);
        assert!(Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).is_err());
    }

    #[test]
    fn iterate_preserves_size_and_length_invariants() {
        let params = small_params();
        let mut rng = Rng::with_seed(99);
        let mut population =
            Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();
        let mut env = sym_reg_env();

        for _ in 0..3 {
            population.evaluate_flagged(&mut env).unwrap();
            population.iterate(&mut rng, &params).unwrap();

            assert_eq!(population.size(), params.population_size);
            for program in population.programs() {
                assert!(program.size() >= 1);
                assert!(program.size() <= params.max_length);
            }
        }
    }

    #[test]
    fn elites_survive_verbatim() {
        let mut params = small_params();
        params.population_size = 10;
        params.proportion_elitism = 0.5;

        let mut rng = Rng::with_seed(5);
        let mut population =
            Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();

        for (i, program) in population.programs.iter_mut().enumerate() {
            program.measure = FitnessMeasure::SymReg {
                fitness: i as f64 + 1.0,
            };
            program.fitness_stale = false;
        }

        population.sort_fittest_first();
        let elite: Vec<(String, f64)> = population.programs[..5]
            .iter()
            .map(|p| (p.render(false, false), p.fitness()))
            .collect();

        population.iterate(&mut rng, &params).unwrap();

        for (rendering, fitness) in elite.iter() {
            assert!(population.programs.iter().any(|p| {
                p.render(false, false) == *rendering && p.fitness() == *fitness
            }));
        }
    }

    #[test]
    fn free_crossover_respects_length_bounds() {
        let mut params = small_params();
        params.population_size = 2;
        params.max_length = 10;

        let mut rng = Rng::with_seed(1);
        let mut programs = vec![
            Program::random(5, FitnessMeasure::sym_reg(), &mut rng, &params).unwrap(),
            Program::random(8, FitnessMeasure::sym_reg(), &mut rng, &params).unwrap(),
        ];
        for program in programs.iter_mut() {
            program.measure = FitnessMeasure::SymReg { fitness: 1.0 };
            program.fitness_stale = false;
        }
        let population = Population { programs };

        for seed in 0..200 {
            let mut rng = Rng::with_seed(seed);
            let child = population.crossover_free(&params, &mut rng).unwrap();
            assert!(child.size() >= 1);
            assert!(child.size() <= params.max_length);
            assert!(child.is_fitness_stale());
        }
    }

    #[test]
    fn length_preserving_crossovers_keep_parent_length() {
        let mut params = small_params();
        params.population_size = 2;

        let mut rng = Rng::with_seed(8);
        let mut programs = vec![
            Program::random(6, FitnessMeasure::sym_reg(), &mut rng, &params).unwrap(),
            Program::random(6, FitnessMeasure::sym_reg(), &mut rng, &params).unwrap(),
        ];
        for program in programs.iter_mut() {
            program.fitness_stale = false;
        }
        let population = Population { programs };

        for seed in 0..100 {
            let mut rng = Rng::with_seed(seed);
            let ga_child = population.crossover_ga(&params, &mut rng).unwrap();
            assert_eq!(ga_child.size(), 6);

            let homologous_child =
                population.crossover_homologous(&params, &mut rng).unwrap();
            assert_eq!(homologous_child.size(), 6);
        }
    }

    #[test]
    fn single_member_tournament_returns_without_sampling() {
        let mut params = small_params();
        params.population_size = 1;
        params.initial_min_length = 1;
        params.initial_max_length = 1;

        let mut init_rng = Rng::with_seed(2);
        let population =
            Population::new(FitnessMeasure::sym_reg(), &mut init_rng, &params).unwrap();

        let mut rng = Rng::with_seed(77);
        assert_eq!(population.select_by_fitness(&mut rng, &params), 0);

        // Selection over a single member must not have consumed the generator.
        let mut untouched = Rng::with_seed(77);
        assert_eq!(rng.u64(..), untouched.u64(..));
    }

    #[test]
    fn tournament_prefers_lower_fitness() {
        let mut params = small_params();
        params.population_size = 2;
        params.tournament_size = 2;

        let mut rng = Rng::with_seed(3);
        let mut population =
            Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();
        population.programs[0].measure = FitnessMeasure::SymReg { fitness: 10.0 };
        population.programs[0].fitness_stale = false;
        population.programs[1].measure = FitnessMeasure::SymReg { fitness: 1.0 };
        population.programs[1].fitness_stale = false;

        // Both members always enter a tournament of two, so the better one always wins.
        for _ in 0..50 {
            assert_eq!(population.select_by_fitness(&mut rng, &params), 1);
        }
    }

    #[test]
    fn evolve_returns_a_generation_within_budget() {
        let params = small_params();
        let mut rng = Rng::with_seed(123);
        let mut population =
            Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();
        let mut env = sym_reg_env();

        let generations = population.evolve(&mut env, &mut rng, &params).unwrap();
        assert!(generations <= params.max_generations + 1);

        if generations <= params.max_generations {
            assert!(population.solution_exists(&params));
        } else {
            assert!(!population.solution_exists(&params));
        }
    }

    #[test]
    fn fixed_seed_reproduces_the_run() {
        let params = small_params();

        let run = |seed: u64| -> (usize, String) {
            let mut rng = Rng::with_seed(seed);
            let mut population =
                Population::new(FitnessMeasure::sym_reg(), &mut rng, &params).unwrap();
            let mut env = sym_reg_env();
            let generations = population.evolve(&mut env, &mut rng, &params).unwrap();
            (generations, population.fittest().render(true, false))
        };

        let first = run(4242);
        let second = run(4242);
        assert_eq!(first, second);
    }
}
