use serde::{Deserialize, Serialize};
use std::fmt;

// A fixed-size bank of floating-point registers. Indexing is not bounds checked beyond
// what Vec provides; instruction generation only ever produces in-range indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterBank {
    registers: Vec<f64>,
}

impl RegisterBank {
    pub fn new(size: usize) -> Self {
        RegisterBank {
            registers: vec![0.0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn read(&self, i: usize) -> f64 {
        self.registers[i]
    }

    pub fn write(&mut self, i: usize, value: f64) {
        self.registers[i] = value;
    }

    pub fn zero(&mut self) {
        for register in self.registers.iter_mut() {
            *register = 0.0;
        }
    }

    // Index of the largest-valued register; ties go to the lower index. Used by the
    // winner-take-all classification measure.
    pub fn largest_index(&self) -> usize {
        let mut max = 0;
        for i in 1..self.registers.len() {
            if self.registers[i] > self.registers[max] {
                max = i;
            }
        }
        max
    }
}

impl fmt::Display for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, register) in self.registers.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", register)?;
        }
        Ok(())
    }
}
