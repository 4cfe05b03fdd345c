use crate::environment::FitnessEnvironment;
use crate::error::Result;
use crate::params::ProblemParameters;
use crate::{random_below, random_constant_value};
use fastrand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    Constant,
    Feature,
    Register,
}

// One operand of an instruction: an ephemeral constant, a read-only feature of the
// current fitness case, or a read-write register.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Constant(f64),
    Feature(usize),
    Register(usize),
}

impl Argument {
    // The standard generators registered in the configuration's argument table. The
    // constant's value is drawn once, here, and never changes afterwards.
    pub fn random_constant(rng: &mut Rng, _params: &ProblemParameters) -> Argument {
        Argument::Constant(random_constant_value(rng))
    }

    pub fn random_feature(rng: &mut Rng, params: &ProblemParameters) -> Argument {
        Argument::Feature(random_below(rng, params.feature_count))
    }

    pub fn random_register(rng: &mut Rng, params: &ProblemParameters) -> Argument {
        Argument::Register(random_below(rng, params.register_count))
    }

    pub fn value(&self, env: &FitnessEnvironment) -> f64 {
        match self {
            Argument::Constant(value) => *value,
            Argument::Feature(i) => env.read_feature(*i),
            Argument::Register(i) => env.read_register(*i),
        }
    }

    pub fn kind(&self) -> ArgumentKind {
        match self {
            Argument::Constant(_) => ArgumentKind::Constant,
            Argument::Feature(_) => ArgumentKind::Feature,
            Argument::Register(_) => ArgumentKind::Register,
        }
    }

    // Constants have no index; intron marking only asks for register indices.
    pub fn index(&self) -> Option<usize> {
        match self {
            Argument::Constant(_) => None,
            Argument::Feature(i) => Some(*i),
            Argument::Register(i) => Some(*i),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Constant(value) => write!(f, "{}", value),
            Argument::Feature(i) => write!(f, "cf[{}]", i),
            Argument::Register(i) => write!(f, "r[{}]", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Assignment,
    Conditional,
}

// A register-machine operation. Assignments write `first op second` into the destination
// register and always continue; conditionals write nothing and return the comparison,
// a false result telling the interpreter to skip the next assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Plus,
    Minus,
    Mult,
    Div,
    IfLess,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::IfLess => OperationKind::Conditional,
            _ => OperationKind::Assignment,
        }
    }

    pub fn execute(
        &self,
        dest: usize,
        first: &Argument,
        second: &Argument,
        env: &mut FitnessEnvironment,
    ) -> bool {
        let a = first.value(env);
        let b = second.value(env);

        match self {
            Operation::Plus => {
                env.write_register(dest, a + b);
                true
            }
            Operation::Minus => {
                env.write_register(dest, a - b);
                true
            }
            Operation::Mult => {
                env.write_register(dest, a * b);
                true
            }
            Operation::Div => {
                // x/0 is defined as 0, not a trap.
                env.write_register(dest, if b != 0.0 { a / b } else { 0.0 });
                true
            }
            Operation::IfLess => a < b,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Plus => write!(f, "+"),
            Operation::Minus => write!(f, "-"),
            Operation::Mult => write!(f, "*"),
            Operation::Div => write!(f, "/"),
            Operation::IfLess => write!(f, "<"),
        }
    }
}

// One register-machine instruction: operation, destination register and two operands,
// plus the structural-intron flag maintained by Program::mark_introns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: Operation,
    pub dest: usize,
    pub first: Argument,
    pub second: Argument,
    pub is_intron: bool,
}

impl Instruction {
    // Draws the operation from the configured operation table, the destination uniformly
    // over the registers and both operands from the configured argument table.
    pub fn random(rng: &mut Rng, params: &ProblemParameters) -> Result<Instruction> {
        let op = *params.operations.sample(rng)?;
        let dest = random_below(rng, params.register_count);
        let first_generator = *params.argument_generators.sample(rng)?;
        let first = first_generator(rng, params);
        let second_generator = *params.argument_generators.sample(rng)?;
        let second = second_generator(rng, params);

        Ok(Instruction {
            op,
            dest,
            first,
            second,
            is_intron: false,
        })
    }

    pub fn execute(&self, env: &mut FitnessEnvironment) -> bool {
        self.op.execute(self.dest, &self.first, &self.second, env)
    }

    pub fn is_conditional(&self) -> bool {
        self.op.kind() == OperationKind::Conditional
    }

    // Point mutation: pick one of the four parts uniformly and regenerate it until its
    // textual form differs from what was there before, so a mutation is always an
    // observable change. Requires the relevant table to offer at least two distinct
    // renderings, which any sane configuration does.
    pub fn mutate(&mut self, rng: &mut Rng, params: &ProblemParameters) -> Result<()> {
        match random_below(rng, 4) {
            0 => {
                let current = self.op.to_string();
                loop {
                    self.op = *params.operations.sample(rng)?;
                    if self.op.to_string() != current {
                        break;
                    }
                }
            }
            1 => {
                let current = self.dest;
                loop {
                    self.dest = random_below(rng, params.register_count);
                    if self.dest != current {
                        break;
                    }
                }
            }
            2 => {
                let current = self.first.to_string();
                loop {
                    let generator = *params.argument_generators.sample(rng)?;
                    self.first = generator(rng, params);
                    if self.first.to_string() != current {
                        break;
                    }
                }
            }
            _ => {
                let current = self.second.to_string();
                loop {
                    let generator = *params.argument_generators.sample(rng)?;
                    self.second = generator(rng, params);
                    if self.second.to_string() != current {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    // `r[d] = a op b;` for assignments, `if(a op b)` for conditionals. When asked to
    // comment introns, lines whose intron flag is set are prefixed with `//`.
    pub fn render(&self, comment_introns: bool) -> String {
        let prefix = if comment_introns && self.is_intron {
            "//"
        } else {
            ""
        };

        if self.is_conditional() {
            format!("{}if({} {} {})", prefix, self.first, self.op, self.second)
        } else {
            format!(
                "{}r[{}] = {} {} {};",
                prefix, self.dest, self.first, self.op, self.second
            )
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}
