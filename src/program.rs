use crate::environment::FitnessEnvironment;
use crate::error::{Error, Result};
use crate::instruction::{ArgumentKind, Instruction};
use crate::measure::FitnessMeasure;
use crate::params::ProblemParameters;
use crate::random_below;
use crate::registers::RegisterBank;
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// One candidate: an ordered, owned sequence of instructions plus its fitness measure.
// Cloning is always a deep copy; no instruction is ever shared between two programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) measure: FitnessMeasure,
    // True when the genotype has changed since the measure was last computed.
    pub(crate) fitness_stale: bool,
    // Register values after the most recent execution, fed to the fitness measure.
    pub(crate) final_registers: RegisterBank,
}

impl Program {
    pub fn random(
        length: usize,
        measure: FitnessMeasure,
        rng: &mut Rng,
        params: &ProblemParameters,
    ) -> Result<Program> {
        let mut instructions = Vec::with_capacity(length);
        for _ in 0..length {
            instructions.push(Instruction::random(rng, params)?);
        }

        Ok(Program {
            instructions,
            measure,
            fitness_stale: true,
            final_registers: RegisterBank::new(params.register_count),
        })
    }

    pub fn size(&self) -> usize {
        self.instructions.len()
    }

    pub fn fitness(&self) -> f64 {
        self.measure.overall_fitness()
    }

    pub fn is_fitness_stale(&self) -> bool {
        self.fitness_stale
    }

    pub fn register_count(&self) -> usize {
        self.final_registers.len()
    }

    // Interprets the genotype against the environment's registers and current case.
    // A false conditional suppresses execution up to and including the next assignment;
    // consecutive false conditionals keep suppressing (conjunction semantics). Marked
    // introns are skipped outright as a speed optimisation and never touch the skip
    // flag. Assumes the registers already hold their starting values.
    pub fn execute(&mut self, env: &mut FitnessEnvironment) {
        let mut execute_next_assignment = true;

        for instruction in self.instructions.iter() {
            if instruction.is_intron {
                continue;
            }

            if execute_next_assignment {
                execute_next_assignment = instruction.execute(env);
            } else if !instruction.is_conditional() {
                // This assignment is the one being skipped; execution resumes after it.
                execute_next_assignment = true;
            }
            // A conditional while suppressed stays skipped and keeps the flag false.
        }

        for i in 0..self.final_registers.len() {
            self.final_registers.write(i, env.read_register(i));
        }
    }

    // Brameier's backward structural-intron detection (On Linear Genetic Programming,
    // 2004, algorithm 3.1). Every register is assumed to take part in the output, so the
    // effective set starts full. A conditional is effective only if the instruction
    // directly after it is; a conditional at the very end of the program, or one followed
    // only by introns, stays an intron.
    pub fn mark_introns(&mut self) {
        for instruction in self.instructions.iter_mut() {
            instruction.is_intron = true;
        }

        let mut effective: HashSet<usize> = (0..self.final_registers.len()).collect();

        for i in (0..self.instructions.len()).rev() {
            if self.instructions[i].is_conditional() {
                if i + 1 < self.instructions.len() && !self.instructions[i + 1].is_intron {
                    self.instructions[i].is_intron = false;
                    insert_register_operands(&self.instructions[i], &mut effective);
                }
            } else if effective.contains(&self.instructions[i].dest) {
                self.instructions[i].is_intron = false;

                // If a conditional directly precedes this assignment it may only be a
                // semantic intron, so its destination stays in the effective set.
                if i > 0 && !self.instructions[i - 1].is_conditional() {
                    effective.remove(&self.instructions[i].dest);
                }

                insert_register_operands(&self.instructions[i], &mut effective);
            }
        }
    }

    // Re-scores this program against every case in the environment.
    pub fn update_fitness(&mut self, env: &mut FitnessEnvironment) -> Result<()> {
        self.measure.zero();
        self.fitness_stale = true;
        self.mark_introns();

        if !env.load_first_case() {
            return Err(Error::NoFitnessCases);
        }

        loop {
            env.zero_registers();
            self.execute(env);
            self.measure
                .accumulate_error(&self.final_registers, env.current_case())?;
            if !env.load_next_case() {
                break;
            }
        }

        self.fitness_stale = false;
        Ok(())
    }

    pub fn remove_random_instruction(&mut self, rng: &mut Rng) {
        let index = random_below(rng, self.instructions.len());
        self.instructions.remove(index);
        self.fitness_stale = true;
    }

    // Removes uniformly random instructions until the program fits the limit. Never
    // shrinks the program below a single instruction.
    pub fn randomly_cull_to_size(&mut self, limit: usize, rng: &mut Rng) {
        while self.instructions.len() > limit && self.instructions.len() > 1 {
            self.remove_random_instruction(rng);
        }
    }

    // One line per instruction in source order, optionally preceded by a fitness summary
    // line, optionally with intron lines commented out. Part of the observable contract;
    // the statistics log and the population snapshots are built from this.
    pub fn render(&self, print_fitness: bool, comment_introns: bool) -> String {
        let mut buffer = String::new();

        if print_fitness {
            buffer.push_str(&format!("// fitness: {}\n", self.measure));
        }

        for instruction in self.instructions.iter() {
            buffer.push_str(&instruction.render(comment_introns));
            buffer.push('\n');
        }

        buffer
    }
}

fn insert_register_operands(instruction: &Instruction, effective: &mut HashSet<usize>) {
    for argument in [&instruction.first, &instruction.second].iter() {
        if argument.kind() == ArgumentKind::Register {
            if let Some(index) = argument.index() {
                effective.insert(index);
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(true, false))
    }
}
