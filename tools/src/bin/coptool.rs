//! # coptool
//!
//! Generates a toy instance and optimizes it with one of the methods of the `coptool` library.
//!
//! `magic-square`: an `n`x`n` magic square with hard or weighted line sums.
//! `roster`: a random nurse rostering instance.
//!
//! Logging goes through `env_logger`, set `RUST_LOG=info` to follow the search.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use coptool::{
    methods::{
        BinaryMethod, HybridMethod, IncrementalMethod, LinearMethod, LocalSearchMethod, Method,
        MethodOptions, TwoStepMethod,
    },
    model::Model,
    scop::{fio, LocalSearchOptions},
    translate::{SatTranslator, ScopTranslator},
};
use coptool_tools::instances::{magic_square, Roster, RosterParams};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    cmd: Command,
    #[command(flatten)]
    solve: SolveArgs,
}

#[derive(Subcommand)]
enum Command {
    /// An `n`x`n` magic square
    MagicSquare(MagicSquareArgs),
    /// A random nurse rostering instance
    Roster(RosterArgs),
}

#[derive(Args)]
struct MagicSquareArgs {
    /// The side length
    #[arg(default_value_t = 3)]
    n: usize,
    /// Make the line sums soft constraints of this weight
    #[arg(long)]
    weight: Option<i64>,
}

#[derive(Args)]
struct RosterArgs {
    /// The number of staff members
    #[arg(long, default_value_t = 4)]
    staff: usize,
    /// The number of days
    #[arg(long, default_value_t = 7)]
    days: usize,
    /// The number of shift types
    #[arg(long, default_value_t = 2)]
    shifts: usize,
    /// Maximum number of consecutive working days
    #[arg(long, default_value_t = 4)]
    max_consecutive: usize,
    /// Minimum number of consecutive working days
    #[arg(long, default_value_t = 2)]
    min_consecutive: usize,
    /// The generator seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args)]
struct SolveArgs {
    /// The optimization method
    #[arg(long, value_enum, default_value_t = MethodKind::Linear, global = true)]
    method: MethodKind,
    /// Time limit of a single solver call in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
    /// Time limit of the whole search in seconds
    #[arg(long, global = true)]
    time_limit: Option<u64>,
    /// The local-search executable
    #[arg(long, default_value = "scop", global = true)]
    scop: PathBuf,
    /// Time limit of the local-search solver in seconds. Falls back to `SCOP_TIMEOUT` for the
    /// hybrid method.
    #[arg(long, global = true)]
    scop_timeout: Option<u32>,
    /// The local-search seed
    #[arg(long, default_value_t = 1, global = true)]
    scop_seed: u32,
    /// The local-search verbosity
    #[arg(long, default_value_t = 0, global = true)]
    scop_verbose: u8,
    /// Write the weighted-linear instance to this path
    #[arg(long, global = true)]
    dump_scop: Option<PathBuf>,
    /// Write the CSP expressions to this path
    #[arg(long, global = true)]
    dump_csp: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodKind {
    /// Linear descent on the weighted sum
    Linear,
    /// Bisection on the weighted sum
    Binary,
    /// Only the heaviest tier
    FirstStep,
    /// The heaviest tier, then the rest
    TwoStep,
    /// Tier by tier
    Incremental,
    /// Tier by tier, warm started by local search
    Hybrid,
    /// Only local search
    LocalSearch,
}

impl SolveArgs {
    fn options(&self) -> MethodOptions {
        MethodOptions {
            call_timeout: self.timeout.map(Duration::from_secs),
            time_limit: self.time_limit.map(Duration::from_secs),
            local_search: LocalSearchOptions {
                program: self.scop.clone(),
                verbose: self.scop_verbose,
                seed: self.scop_seed,
                timeout: self.scop_timeout.unwrap_or(0),
                ..Default::default()
            },
        }
    }

    fn method(&self, model: Model) -> anyhow::Result<Box<dyn Method>> {
        let opts = self.options();
        Ok(match self.method {
            MethodKind::Linear => Box::new(LinearMethod::new(model, opts)?),
            MethodKind::Binary => Box::new(BinaryMethod::new(model, opts)?),
            MethodKind::FirstStep => Box::new(TwoStepMethod::first_step(model, opts)?),
            MethodKind::TwoStep => Box::new(TwoStepMethod::new(model, opts)?),
            MethodKind::Incremental => Box::new(IncrementalMethod::new(model, opts)?),
            MethodKind::Hybrid => Box::new(HybridMethod::new(model, opts)?),
            MethodKind::LocalSearch => Box::new(LocalSearchMethod::new(model, opts)),
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let model = match args.cmd {
        Command::MagicSquare(sq) => magic_square(sq.n, sq.weight)?,
        Command::Roster(ro) => {
            let params = RosterParams {
                n_staff: ro.staff,
                n_days: ro.days,
                n_shifts: ro.shifts,
                max_consecutive: ro.max_consecutive,
                min_consecutive: ro.min_consecutive,
                ..Default::default()
            };
            Roster::random(params, ro.seed)?.model()?
        }
    };
    log::info!(
        "model with {} variables and {} constraints",
        model.variables().len(),
        model.constraints().len()
    );

    if let Some(path) = &args.solve.dump_scop {
        let inst = ScopTranslator::new().translate_model(&model)?;
        let mut writer = create(path)?;
        fio::write_instance(&mut writer, &inst)?;
        writer.flush()?;
    }
    if let Some(path) = &args.solve.dump_csp {
        let exprs = SatTranslator::new().translate_model(&model)?;
        let mut writer = create(path)?;
        for expr in &exprs {
            writeln!(writer, "{expr}")?;
        }
        writer.flush()?;
    }

    let mut method = args.solve.method(model)?;
    let report = method.run()?;
    print!("{report}");
    Ok(())
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}
