use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context, Result};
use structopt::StructOpt;

use assembunny::{parse_program, Instruction, Machine, Register};

/// Runs an assembunny program and prints the final machine state.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Program file, one instruction per line
    #[structopt(required_unless = "resume")]
    program: Option<PathBuf>,

    /// Initial register value, e.g. `-r c=1`; may be repeated, unset
    /// registers start at 0
    #[structopt(short = "r", long = "register", parse(try_from_str = parse_register_override))]
    registers: Vec<(Register, i64)>,

    /// Stop once this many values have been output
    #[structopt(long)]
    max_outputs: Option<usize>,

    /// Search for the lowest initial value of register `a` that makes the
    /// program emit an alternating 0,1 clock signal of this length
    #[structopt(long, conflicts_with = "resume")]
    clock_signal: Option<usize>,

    /// Write the machine state here when interrupted with Ctrl-C
    #[structopt(long)]
    snapshot: Option<PathBuf>,

    /// Resume from a state written by `--snapshot` instead of loading a
    /// program
    #[structopt(long)]
    resume: Option<PathBuf>,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // Assembunny programs can loop forever; the handler lets a run be
    // stopped cleanly between steps.
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    if let Some(length) = opt.clock_signal {
        let program = load_program(&opt)?;

        match find_clock_signal(&program, &opt.registers, length, &running) {
            Some(candidate) => println!("a = {}", candidate),
            None => bail!("interrupted before a clock signal was found"),
        }
        return Ok(());
    }

    let mut machine = match &opt.resume {
        Some(path) => {
            let bytes =
                fs::read(path).with_context(|| format!("reading snapshot {}", path.display()))?;
            bincode::deserialize(&bytes)
                .with_context(|| format!("decoding snapshot {}", path.display()))?
        }
        None => {
            let mut machine = Machine::new(load_program(&opt)?);
            for &(register, value) in &opt.registers {
                machine.set_register(register, value);
            }
            machine
        }
    };

    while running.load(Ordering::SeqCst)
        && opt.max_outputs.map_or(true, |bound| machine.output().len() < bound)
        && machine.step()
    {}

    if !running.load(Ordering::SeqCst) {
        if let Some(path) = &opt.snapshot {
            let bytes = bincode::serialize(&machine).context("encoding snapshot")?;
            fs::write(path, bytes)
                .with_context(|| format!("writing snapshot {}", path.display()))?;
            eprintln!("interrupted, state saved to {}", path.display());
        } else {
            eprintln!("interrupted");
        }
    }

    for register in Register::ALL {
        println!("{} = {}", register, machine.register(register));
    }
    if !machine.output().is_empty() {
        let values: Vec<String> = machine.output().iter().map(i64::to_string).collect();
        println!("output: {}", values.join(","));
    }

    Ok(())
}

fn load_program(opt: &Opt) -> Result<Vec<Instruction>> {
    let path = opt.program.as_ref().context("no program file given")?;
    let source =
        fs::read_to_string(path).with_context(|| format!("reading program {}", path.display()))?;

    Ok(parse_program(&source)?)
}

fn parse_register_override(s: &str) -> Result<(Register, i64)> {
    let (register, value) = s
        .split_once('=')
        .context("expected <register>=<value>, e.g. a=7")?;

    Ok((register.parse()?, value.parse::<i64>()?))
}

// Brute-forces initial values of register `a`, lowest first, until the
// program emits `length` values alternating 0,1. Returns None if interrupted
// before a signal is found.
fn find_clock_signal(
    program: &[Instruction],
    overrides: &[(Register, i64)],
    length: usize,
    running: &AtomicBool,
) -> Option<i64> {
    (0_i64..)
        .take_while(|_| running.load(Ordering::SeqCst))
        .find(|&candidate| {
            // Toggles mutate the program, so every candidate gets a fresh copy.
            let mut machine = Machine::new(program.to_vec());
            for &(register, value) in overrides {
                machine.set_register(register, value);
            }
            machine.set_register(Register::A, candidate);
            machine.run_bounded(length);

            machine.output().len() == length && is_clock_signal(machine.output())
        })
}

fn is_clock_signal(output: &[i64]) -> bool {
    output
        .iter()
        .enumerate()
        .all(|(i, &value)| value == (i % 2) as i64)
}
