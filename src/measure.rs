use crate::environment::FitnessCase;
use crate::error::{Error, Result};
use crate::registers::RegisterBank;
use serde::{Deserialize, Serialize};
use std::fmt;

// The problem-specific error accumulator owned by each program. Zero is perfect and
// higher is worse. The variant must match the kind of fitness case it is fed;
// anything else is a wiring bug between problem setup and engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitnessMeasure {
    // Sum of squared differences between register 0 and the case target.
    SymReg { fitness: f64 },
    // Misclassification count under winner-take-all over all registers.
    MultiClass { fitness: f64 },
}

impl FitnessMeasure {
    pub fn sym_reg() -> Self {
        FitnessMeasure::SymReg { fitness: 0.0 }
    }

    pub fn multi_class() -> Self {
        FitnessMeasure::MultiClass { fitness: 0.0 }
    }

    // Resets to the perfect state; error is accumulated back onto it case by case.
    pub fn zero(&mut self) {
        match self {
            FitnessMeasure::SymReg { fitness } => *fitness = 0.0,
            FitnessMeasure::MultiClass { fitness } => *fitness = 0.0,
        }
    }

    pub fn overall_fitness(&self) -> f64 {
        match self {
            FitnessMeasure::SymReg { fitness } => *fitness,
            FitnessMeasure::MultiClass { fitness } => *fitness,
        }
    }

    pub fn accumulate_error(
        &mut self,
        final_registers: &RegisterBank,
        case: &FitnessCase,
    ) -> Result<()> {
        match (self, case) {
            (FitnessMeasure::SymReg { fitness }, FitnessCase::SymReg { target, .. }) => {
                let difference = final_registers.read(0) - target;
                *fitness += difference * difference;
                Ok(())
            }
            (FitnessMeasure::MultiClass { fitness }, FitnessCase::MultiClass { class, .. }) => {
                if final_registers.largest_index() != *class {
                    *fitness += 1.0;
                }
                Ok(())
            }
            (FitnessMeasure::SymReg { .. }, _) => Err(Error::TypeMismatch(
                "symbolic-regression measure was given a non-regression case".to_string(),
            )),
            (FitnessMeasure::MultiClass { .. }, _) => Err(Error::TypeMismatch(
                "multi-class measure was given a non-classification case".to_string(),
            )),
        }
    }
}

impl fmt::Display for FitnessMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.overall_fitness())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sym_reg_accumulates_squared_error() {
        let mut measure = FitnessMeasure::sym_reg();
        let mut registers = RegisterBank::new(2);
        registers.write(0, 3.0);

        let case = FitnessCase::sym_reg(0.0, 1.0);
        measure.accumulate_error(&registers, &case).unwrap();
        assert_eq!(measure.overall_fitness(), 4.0);

        measure.accumulate_error(&registers, &case).unwrap();
        assert_eq!(measure.overall_fitness(), 8.0);

        measure.zero();
        assert_eq!(measure.overall_fitness(), 0.0);
    }

    #[test]
    fn multi_class_counts_misclassifications() {
        let mut measure = FitnessMeasure::multi_class();
        let mut registers = RegisterBank::new(3);
        registers.write(1, 5.0);

        // Winner is register 1.
        let correct = FitnessCase::multi_class(vec![0.0], 1);
        measure.accumulate_error(&registers, &correct).unwrap();
        assert_eq!(measure.overall_fitness(), 0.0);

        let wrong = FitnessCase::multi_class(vec![0.0], 2);
        measure.accumulate_error(&registers, &wrong).unwrap();
        assert_eq!(measure.overall_fitness(), 1.0);
    }

    #[test]
    fn mismatched_case_kind_is_an_error() {
        let registers = RegisterBank::new(2);

        let mut sym_reg = FitnessMeasure::sym_reg();
        let classification_case = FitnessCase::multi_class(vec![0.0], 0);
        assert!(matches!(
            sym_reg.accumulate_error(&registers, &classification_case),
            Err(Error::TypeMismatch(_))
        ));

        let mut multi_class = FitnessMeasure::multi_class();
        let regression_case = FitnessCase::sym_reg(0.0, 0.0);
        assert!(matches!(
            multi_class.accumulate_error(&registers, &regression_case),
            Err(Error::TypeMismatch(_))
        ));
    }
}
