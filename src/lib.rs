//! Interpreter for the assembunny register machine from the
//! [Advent of Code 2016](https://adventofcode.com/2016) puzzles.
//!
//! Programs operate on four integer registers and six instructions, one of
//! which (`tgl`) rewrites other instructions in place while the program is
//! running. Execution is synchronous and runs either until the instruction
//! pointer leaves the program or until a caller-supplied number of `out`
//! values has been emitted.
#![warn(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A virtual machine holding one program together with its register state,
/// instruction pointer and captured output.
///
/// The machine owns its program: `tgl` mutates instructions in place, so
/// callers wanting to run the same program twice should keep their own copy
/// and build a fresh machine from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    registers: [i64; 4],
    program: Vec<Instruction>,
    output: Vec<i64>,

    ip: i64, // instruction pointer, signed so jumps can leave [0, len)
}

impl Machine {
    /// Creates a machine for the given program, with all registers at zero
    /// and the instruction pointer at the first instruction.
    pub fn new(program: Vec<Instruction>) -> Self {
        Self {
            registers: [0; 4],
            program,
            output: Vec::new(),

            ip: 0,
        }
    }

    /// Overrides the initial value of a single register.
    ///
    /// Registers not set this way start at zero.
    pub fn set_register(&mut self, register: Register, value: i64) {
        self.registers[register as usize] = value;
    }

    /// Returns the current value of a register.
    pub fn register(&self, register: Register) -> i64 {
        self.registers[register as usize]
    }

    /// Returns every value emitted by `out` so far, oldest first.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    /// Returns the program in its current state, including any rewrites
    /// made by `tgl`.
    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    /// Returns true once the instruction pointer has left the program.
    pub fn halted(&self) -> bool {
        !(0..self.program.len() as i64).contains(&self.ip)
    }

    /// Runs the program until the instruction pointer leaves it.
    ///
    /// Assembunny programs can loop forever; callers needing a bound should
    /// use [`Machine::run_bounded`] or drive [`Machine::step`] themselves.
    pub fn run(&mut self) {
        while self.step() {}
    }

    /// Runs the program until it halts or until `max_outputs` values have
    /// been emitted, whichever comes first.
    pub fn run_bounded(&mut self, max_outputs: usize) {
        while self.output.len() < max_outputs && self.step() {}
    }

    /// Executes the instruction under the instruction pointer.
    ///
    /// Returns false, without executing anything, once the pointer is
    /// outside the program.
    pub fn step(&mut self) -> bool {
        let instruction = match usize::try_from(self.ip) {
            Ok(ip) if ip < self.program.len() => self.program[ip],
            _ => return false,
        };

        match instruction {
            Instruction::Copy(src, dst) => {
                // A literal destination can only come from a toggle; the
                // instruction is skipped rather than executed.
                if let Operand::Reg(register) = dst {
                    self.registers[register as usize] = self.value(src);
                }
                self.ip += 1;
            }
            Instruction::Increment(operand) => {
                if let Operand::Reg(register) = operand {
                    self.registers[register as usize] += 1;
                }
                self.ip += 1;
            }
            Instruction::Decrement(operand) => {
                if let Operand::Reg(register) = operand {
                    self.registers[register as usize] -= 1;
                }
                self.ip += 1;
            }
            Instruction::JumpNotZero(test, offset) => {
                if self.value(test) != 0 {
                    self.ip += self.value(offset);
                } else {
                    self.ip += 1;
                }
            }
            Instruction::Toggle(offset) => {
                let target = self.ip + self.value(offset);

                if let Ok(target) = usize::try_from(target) {
                    if let Some(instruction) = self.program.get_mut(target) {
                        *instruction = instruction.toggled();
                    }
                }
                self.ip += 1;
            }
            Instruction::Output(operand) => {
                let value = self.value(operand);
                self.output.push(value);
                self.ip += 1;
            }
        }

        true
    }

    /// Resolves an operand, either by returning the literal or by reading
    /// the referenced register.
    fn value(&self, operand: Operand) -> i64 {
        match operand {
            Operand::Lit(value) => value,
            Operand::Reg(register) => self.registers[register as usize],
        }
    }
}

/// One of the four registers an assembunny program operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Register {
    /// Register `a`.
    A,
    /// Register `b`.
    B,
    /// Register `c`.
    C,
    /// Register `d`.
    D,
}

impl Register {
    /// All four registers, in name order.
    pub const ALL: [Register; 4] = [Register::A, Register::B, Register::C, Register::D];
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::D => "d",
        })
    }
}

impl FromStr for Register {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Register::A),
            "b" => Ok(Register::B),
            "c" => Ok(Register::C),
            "d" => Ok(Register::D),
            _ => Err(ParseError::InvalidRegister(s.to_string())),
        }
    }
}

/// Operand of an instruction, either an integer literal or a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Signed integer literal.
    Lit(i64),
    /// Reference to a register's current value.
    Reg(Register),
}

impl FromStr for Operand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A token is a literal exactly when it parses as a signed integer;
        // anything else must be a register name.
        if let Ok(value) = s.parse::<i64>() {
            Ok(Operand::Lit(value))
        } else {
            s.parse().map(Operand::Reg)
        }
    }
}

/// A parsed instruction, including its operands.
///
/// Every operand slot is a full [`Operand`] even where the textual grammar
/// only produces registers: toggling can place a literal into any slot, and
/// such instructions are skipped at runtime instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// `cpy x y`: copies the value of `x` into register `y`.
    Copy(Operand, Operand),
    /// `inc x`: increases register `x` by one.
    Increment(Operand),
    /// `dec x`: decreases register `x` by one.
    Decrement(Operand),
    /// `jnz x y`: jumps `y` instructions away if `x` is not zero.
    JumpNotZero(Operand, Operand),
    /// `tgl x`: rewrites the kind of the instruction `x` away.
    Toggle(Operand),
    /// `out x`: emits the value of `x` to the output stream.
    Output(Operand),
}

impl Instruction {
    /// Returns the instruction this one becomes when targeted by `tgl`.
    ///
    /// `inc` becomes `dec` and every other one-operand instruction becomes
    /// `inc`; `jnz` becomes `cpy` and every other two-operand instruction
    /// becomes `jnz`. Operands are carried over untouched.
    fn toggled(self) -> Self {
        match self {
            Instruction::Increment(x) => Instruction::Decrement(x),
            Instruction::Decrement(x) | Instruction::Toggle(x) | Instruction::Output(x) => {
                Instruction::Increment(x)
            }
            Instruction::JumpNotZero(x, y) => Instruction::Copy(x, y),
            Instruction::Copy(x, y) => Instruction::JumpNotZero(x, y),
        }
    }
}

impl FromStr for Instruction {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let mnemonic = tokens.next().unwrap_or_default();
        let operands: Vec<&str> = tokens.collect();

        let instruction = match (mnemonic, operands.as_slice()) {
            ("cpy", [src, dst]) => Instruction::Copy(src.parse()?, dst.parse()?),
            ("inc", [register]) => Instruction::Increment(register.parse()?),
            ("dec", [register]) => Instruction::Decrement(register.parse()?),
            ("jnz", [test, offset]) => Instruction::JumpNotZero(test.parse()?, offset.parse()?),
            ("tgl", [offset]) => Instruction::Toggle(offset.parse()?),
            ("out", [value]) => Instruction::Output(value.parse()?),
            ("cpy" | "jnz", _) => {
                return Err(ParseError::OperandCount {
                    mnemonic: mnemonic.to_string(),
                    expected: 2,
                    found: operands.len(),
                })
            }
            ("inc" | "dec" | "tgl" | "out", _) => {
                return Err(ParseError::OperandCount {
                    mnemonic: mnemonic.to_string(),
                    expected: 1,
                    found: operands.len(),
                })
            }
            _ => return Err(ParseError::UnknownInstruction(mnemonic.to_string())),
        };

        Ok(instruction)
    }
}

/// Parses a whole program, one instruction per line.
///
/// Blank lines are ignored. Parsing stops at the first line that fails,
/// reporting it with its 1-based line number.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, ParseError> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            line.parse().map_err(|source| ParseError::AtLine {
                line: number + 1,
                source: Box::new(source),
            })
        })
        .collect()
}

/// Error produced when a line of program text cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The mnemonic is not one of the six known instructions.
    #[error("unknown instruction {0:?}")]
    UnknownInstruction(String),
    /// A known mnemonic was given the wrong number of operands.
    #[error("{mnemonic} takes {expected} operand(s), found {found}")]
    OperandCount {
        /// The mnemonic as written.
        mnemonic: String,
        /// Operands the instruction takes.
        expected: usize,
        /// Operands the line supplied.
        found: usize,
    },
    /// An operand is neither an integer literal nor a valid register name.
    #[error("invalid register name {0:?}")]
    InvalidRegister(String),
    /// A failing line, tagged with its 1-based line number.
    #[error("line {line}: {source}")]
    AtLine {
        /// Line number within the program source.
        line: usize,
        /// What went wrong on that line.
        source: Box<ParseError>,
    },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(source: &str) -> Machine {
        let mut machine = Machine::new(parse_program(source).expect("parse failed"));
        machine.run();
        machine
    }

    #[test]
    fn copy_increment_jump() {
        let machine = run("cpy 41 a\ninc a\ninc a\ndec a\njnz a 2\ndec a");

        assert_eq!(machine.register(Register::A), 42);
    }

    #[test]
    fn toggle_chain() {
        let machine = run("cpy 2 a\ntgl a\ntgl a\ntgl a\ncpy 1 a\ndec a\ndec a");

        assert_eq!(machine.register(Register::A), 3);
    }

    #[test]
    fn toggle_cycles() {
        let x = Operand::Reg(Register::A);
        let y = Operand::Lit(2);

        // One-operand kinds: inc <-> dec is a 2-cycle, everything else
        // collapses into inc.
        assert_eq!(
            Instruction::Increment(x).toggled(),
            Instruction::Decrement(x)
        );
        assert_eq!(
            Instruction::Decrement(x).toggled(),
            Instruction::Increment(x)
        );
        assert_eq!(Instruction::Toggle(x).toggled(), Instruction::Increment(x));
        assert_eq!(Instruction::Output(x).toggled(), Instruction::Increment(x));

        // Two-operand kinds: jnz <-> cpy is a 2-cycle.
        assert_eq!(
            Instruction::JumpNotZero(y, x).toggled(),
            Instruction::Copy(y, x)
        );
        assert_eq!(
            Instruction::Copy(y, x).toggled(),
            Instruction::JumpNotZero(y, x)
        );
    }

    #[test]
    fn toggle_out_of_bounds_is_ignored() {
        let source = "tgl 10\ntgl -5\ninc a";
        let machine = run(source);

        assert_eq!(machine.program(), &parse_program(source).unwrap()[..]);
        assert_eq!(machine.register(Register::A), 1);
    }

    #[test]
    fn toggled_invalid_instructions_are_skipped() {
        // The toggle turns `jnz 1 2` into `cpy 1 2`, whose literal
        // destination makes it a no-op when reached.
        let machine = run("tgl 2\ninc a\njnz 1 2\ninc a");

        assert_eq!(
            machine.program()[2],
            Instruction::Copy(Operand::Lit(1), Operand::Lit(2))
        );
        assert_eq!(machine.register(Register::A), 2);
    }

    #[test]
    fn toggled_literal_increment_is_skipped() {
        let machine = run("tgl 1\ntgl -1");

        assert_eq!(
            machine.program()[1],
            Instruction::Increment(Operand::Lit(-1))
        );
        assert_eq!(machine.register(Register::A), 0);
    }

    #[test]
    fn self_toggle_applies_on_later_visit() {
        // `tgl a` with a = 0 rewrites itself into `inc a`; the new
        // instruction only runs when the loop comes back around.
        let mut machine = Machine::new(parse_program("tgl a\njnz a 2\njnz 1 -2").unwrap());
        machine.run();

        assert_eq!(
            machine.program()[0],
            Instruction::Increment(Operand::Reg(Register::A))
        );
        assert_eq!(machine.register(Register::A), 1);
    }

    #[test]
    fn bounded_run_stops_at_output_limit() {
        let mut machine = Machine::new(parse_program("out 0\nout 1\njnz 1 -2").unwrap());
        machine.run_bounded(4);

        assert_eq!(machine.output(), [0, 1, 0, 1]);
        assert!(!machine.halted());
    }

    #[test]
    fn output_resolves_registers() {
        let mut machine = Machine::new(parse_program("out d\nout -3").unwrap());
        machine.set_register(Register::D, 7);
        machine.run();

        assert_eq!(machine.output(), [7, -3]);
        assert!(machine.halted());
    }

    #[test]
    fn copy_from_register() {
        let mut machine = Machine::new(parse_program("cpy c a").unwrap());
        machine.set_register(Register::C, 5);
        machine.run();

        assert_eq!(machine.register(Register::A), 5);
    }

    #[test]
    fn jump_offset_from_register() {
        let mut machine = Machine::new(parse_program("cpy 2 b\njnz 1 b\ninc a").unwrap());
        machine.run();

        assert_eq!(machine.register(Register::A), 0);
        assert_eq!(machine.register(Register::B), 2);
    }

    #[test]
    fn negative_pointer_halts() {
        let machine = run("jnz 1 -2");

        assert!(machine.halted());
        for register in Register::ALL {
            assert_eq!(machine.register(register), 0);
        }
    }

    #[test]
    fn empty_program_halts_immediately() {
        let mut machine = Machine::new(Vec::new());

        assert!(machine.halted());
        assert!(!machine.step());
    }

    #[test]
    fn unset_registers_default_to_zero() {
        let program = parse_program("cpy b a\ninc c").unwrap();

        let mut implicit = Machine::new(program.clone());
        implicit.run();

        let mut explicit = Machine::new(program);
        for register in Register::ALL {
            explicit.set_register(register, 0);
        }
        explicit.run();

        assert_eq!(implicit, explicit);
    }

    #[test]
    fn parse_is_deterministic() {
        let source = "cpy 2 a\ntgl a\njnz a -1\nout b";

        assert_eq!(
            parse_program(source).unwrap(),
            parse_program(source).unwrap()
        );
    }

    #[test]
    fn parse_classifies_operands() {
        assert_eq!(
            parse_program("cpy -5 d\njnz d -2\ntgl 1\ninc a\ndec b\nout d").unwrap(),
            vec![
                Instruction::Copy(Operand::Lit(-5), Operand::Reg(Register::D)),
                Instruction::JumpNotZero(Operand::Reg(Register::D), Operand::Lit(-2)),
                Instruction::Toggle(Operand::Lit(1)),
                Instruction::Increment(Operand::Reg(Register::A)),
                Instruction::Decrement(Operand::Reg(Register::B)),
                Instruction::Output(Operand::Reg(Register::D)),
            ]
        );
    }

    #[test]
    fn parse_skips_blank_lines() {
        assert_eq!(parse_program("inc a\n\n  \ninc a\n").unwrap().len(), 2);
    }

    #[test]
    fn parse_rejects_unknown_instruction() {
        assert_eq!(
            parse_program("mul a b"),
            Err(ParseError::AtLine {
                line: 1,
                source: Box::new(ParseError::UnknownInstruction("mul".to_string())),
            })
        );
    }

    #[test]
    fn parse_rejects_invalid_register() {
        assert_eq!(
            parse_program("inc e"),
            Err(ParseError::AtLine {
                line: 1,
                source: Box::new(ParseError::InvalidRegister("e".to_string())),
            })
        );
    }

    #[test]
    fn parse_rejects_wrong_operand_count() {
        assert_eq!(
            parse_program("cpy 1"),
            Err(ParseError::AtLine {
                line: 1,
                source: Box::new(ParseError::OperandCount {
                    mnemonic: "cpy".to_string(),
                    expected: 2,
                    found: 1,
                }),
            })
        );
    }

    #[test]
    fn parse_reports_line_numbers() {
        let error = parse_program("inc a\n\ncpy 1 c\nbogus d").unwrap_err();

        assert!(matches!(error, ParseError::AtLine { line: 4, .. }));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut machine =
            Machine::new(parse_program("cpy 41 a\ninc a\ninc a\ndec a\njnz a 2\ndec a").unwrap());
        for _ in 0..3 {
            machine.step();
        }

        let bytes = bincode::serialize(&machine).unwrap();
        let mut restored: Machine = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, machine);

        machine.run();
        restored.run();
        assert_eq!(restored, machine);
        assert_eq!(restored.register(Register::A), 42);
    }
}
