use crate::error::Result;
use crate::registers::RegisterBank;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

// One labelled example: an indexable feature vector plus problem-specific target data.
// The variant has to match the fitness measure it is scored with; a mismatch is a wiring
// bug and surfaces as Error::TypeMismatch when the measure sees the case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitnessCase {
    SymReg { features: Vec<f64>, target: f64 },
    MultiClass { features: Vec<f64>, class: usize },
}

impl FitnessCase {
    pub fn sym_reg(x: f64, target: f64) -> Self {
        FitnessCase::SymReg {
            features: vec![x],
            target,
        }
    }

    pub fn multi_class(features: Vec<f64>, class: usize) -> Self {
        FitnessCase::MultiClass { features, class }
    }

    pub fn feature(&self, i: usize) -> f64 {
        self.features()[i]
    }

    pub fn features(&self) -> &[f64] {
        match self {
            FitnessCase::SymReg { features, .. } => features,
            FitnessCase::MultiClass { features, .. } => features,
        }
    }
}

// The execution context for programs: the read-write register bank plus an ordered,
// rewindable sequence of fitness cases with a cursor over them. Instructions read
// features of the current case and read/write registers through this.
#[derive(Debug)]
pub struct FitnessEnvironment {
    registers: RegisterBank,
    cases: Vec<FitnessCase>,
    current: usize,
}

impl FitnessEnvironment {
    pub fn new(register_count: usize) -> Self {
        FitnessEnvironment {
            registers: RegisterBank::new(register_count),
            cases: vec![],
            current: 0,
        }
    }

    pub fn read_feature(&self, i: usize) -> f64 {
        self.cases[self.current].feature(i)
    }

    pub fn read_register(&self, i: usize) -> f64 {
        self.registers.read(i)
    }

    pub fn write_register(&mut self, i: usize, value: f64) {
        self.registers.write(i, value);
    }

    pub fn zero_registers(&mut self) {
        self.registers.zero();
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    // Rewinds to the first case. Returns false if there are no cases at all.
    pub fn load_first_case(&mut self) -> bool {
        self.current = 0;
        !self.cases.is_empty()
    }

    // Advances the cursor; returns false once the cases are exhausted.
    pub fn load_next_case(&mut self) -> bool {
        self.current += 1;
        self.current < self.cases.len()
    }

    pub fn current_case(&self) -> &FitnessCase {
        &self.cases[self.current]
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    pub fn cases(&self) -> &[FitnessCase] {
        &self.cases
    }

    pub fn add_case(&mut self, case: FitnessCase) {
        self.cases.push(case);
    }

    // Loads one case per non-empty line of a pattern file, through a problem-specific
    // line parser.
    pub fn add_cases_from_file(
        &mut self,
        path: &str,
        parser: fn(&str) -> Result<FitnessCase>,
    ) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            self.cases.push(parser(line)?);
        }
        Ok(())
    }
}

// Renders the current register values, space separated.
impl fmt::Display for FitnessEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_has_no_first_case() {
        let mut env = FitnessEnvironment::new(2);
        assert!(!env.load_first_case());
    }

    #[test]
    fn cursor_walks_cases_in_insertion_order() {
        let mut env = FitnessEnvironment::new(2);
        env.add_case(FitnessCase::sym_reg(1.0, 2.0));
        env.add_case(FitnessCase::sym_reg(3.0, 4.0));

        assert!(env.load_first_case());
        assert_eq!(env.read_feature(0), 1.0);
        assert!(env.load_next_case());
        assert_eq!(env.read_feature(0), 3.0);
        assert!(!env.load_next_case());

        // Rewinding restarts at the first case.
        assert!(env.load_first_case());
        assert_eq!(env.read_feature(0), 1.0);
    }

    #[test]
    fn registers_are_independent_of_cases() {
        let mut env = FitnessEnvironment::new(2);
        env.add_case(FitnessCase::sym_reg(1.0, 2.0));
        env.load_first_case();
        env.write_register(1, 9.0);
        assert_eq!(env.read_register(1), 9.0);
        env.zero_registers();
        assert_eq!(env.read_register(1), 0.0);
    }
}
