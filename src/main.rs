use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use blockmm::core::BlockLayout;
use blockmm::data::{GeneratorParams, generate};
use blockmm::engine::{map_stream, reduce_stream};
use blockmm::ops::JoinStrategy;
use blockmm::ops::dense::{DenseMatrix, assemble, max_relative_error, multiply};
use blockmm::parsing::{OutputFormat, format_output_as, parse_cell, parse_output};
use blockmm::{ConfigOverrides, ErrorPolicy, GridConfig, JobConfig, JobError, Matrix, Pipeline};

#[derive(Parser)]
#[command(name = "blockmm", version, about = "Block sparse matrix multiplication as a map/shuffle/reduce job")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run map, shuffle and reduce in process
    Run(RunArgs),
    /// Streaming map phase: input lines on stdin, intermediate lines on stdout
    Map(MapArgs),
    /// Streaming reduce phase: key-grouped intermediate lines on stdin
    Reduce(ReduceArgs),
    /// Generate random sparse A and B in input format
    Generate(GenerateArgs),
    /// Compare a text job output against the dense product of its input
    Verify(VerifyArgs),
}

#[derive(Args)]
struct RunArgs {
    /// JSON job config; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: ConfigOverrides,
    /// Input file, stdin when omitted or "-"
    #[arg(long, short)]
    input: Option<PathBuf>,
    /// Output file, stdout when omitted or "-"
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Print job counters as JSON on stderr
    #[arg(long)]
    stats: bool,
}

#[derive(Args)]
struct MapArgs {
    #[arg(long)]
    grid_dim: usize,
    #[arg(long)]
    block_size: Option<usize>,
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Abort)]
    on_error: ErrorPolicy,
}

#[derive(Args)]
struct ReduceArgs {
    #[arg(long, value_enum, default_value_t = JoinStrategy::RowIndexed)]
    join: JoinStrategy,
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Abort)]
    on_error: ErrorPolicy,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args)]
struct GenerateArgs {
    /// Side of both square matrices
    #[arg(long)]
    size: usize,
    #[arg(long)]
    grid_dim: usize,
    #[arg(long, default_value_t = 0.2)]
    density: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    size: usize,
    #[arg(long)]
    grid_dim: usize,
    /// Job input (cells of A and B)
    #[arg(long, short)]
    input: PathBuf,
    /// Job output in text format
    #[arg(long, short)]
    output: PathBuf,
    #[arg(long, default_value_t = 1e-9)]
    tolerance: f64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run(args) => run_job(args),
        Command::Map(args) => {
            let mut config = JobConfig::new(args.grid_dim);
            config.block_size = args.block_size;
            let grid = config.grid()?;
            let mut out = BufWriter::new(io::stdout().lock());
            map_stream(io::stdin().lock(), &mut out, &grid, args.on_error)?;
            Ok(())
        }
        Command::Reduce(args) => {
            let mut out = BufWriter::new(io::stdout().lock());
            reduce_stream(io::stdin().lock(), &mut out, args.join, args.on_error, args.format)?;
            Ok(())
        }
        Command::Generate(args) => {
            let params = GeneratorParams {
                density: args.density,
                seed: args.seed,
                ..GeneratorParams::new(args.size, args.grid_dim)
            };
            let pair = generate(&params)?;
            let mut out = open_output(args.output.as_deref())?;
            let count = pair.write_lines(&mut out)?;
            info!("Wrote {} cells", count);
            Ok(())
        }
        Command::Verify(args) => verify(args),
    }
}

fn run_job(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = JobConfig::resolve(args.config.as_deref(), &args.overrides)?;
    let pipeline = Pipeline::configure(config)?;
    let lines = read_lines(args.input.as_deref())?;
    let output = pipeline.submit(&lines)?.sorted();

    let mut out = open_output(args.output.as_deref())?;
    for (key, cell) in &output.cells {
        writeln!(out, "{}", format_output_as(key, cell, args.format)?)?;
    }
    out.flush()?;

    if args.stats {
        eprintln!("{}", serde_json::to_string_pretty(&output.stats)?);
    }
    Ok(())
}

fn verify(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = BlockLayout::for_matrix(args.size, args.grid_dim)?;
    let grid = GridConfig::new(args.grid_dim)?.with_block_size(layout.block_size())?;

    let mut cells = Vec::new();
    for (idx, line) in read_lines(Some(args.input.as_path()))?.iter().enumerate() {
        if !line.trim().is_empty() {
            let cell = parse_cell(idx + 1, line)?;
            grid.check_cell(&cell)
                .map_err(|reason| JobError::invalid_record(idx + 1, line, reason))?;
            cells.push(cell);
        }
    }
    let a = DenseMatrix::from_cells(args.size, &layout, Matrix::A, &cells)?;
    let b = DenseMatrix::from_cells(args.size, &layout, Matrix::B, &cells)?;
    let expected = multiply(&a, &b)?;

    let mut emitted = Vec::new();
    for (idx, line) in read_lines(Some(args.output.as_path()))?.iter().enumerate() {
        if !line.trim().is_empty() {
            emitted.push(parse_output(idx + 1, line)?);
        }
    }
    let actual = assemble(args.size, &layout, &emitted)?;

    let err = max_relative_error(&actual, &expected);
    if err > args.tolerance {
        return Err(format!(
            "output differs from dense product: max relative error {:e} > {:e}",
            err, args.tolerance
        )
        .into());
    }
    info!("Output matches dense product (max relative error {:e})", err);
    Ok(())
}

fn read_lines(path: Option<&Path>) -> Result<Vec<String>, JobError> {
    let reader: Box<dyn BufRead> = match path {
        Some(p) if p != Path::new("-") => Box::new(BufReader::new(File::open(p)?)),
        _ => Box::new(io::stdin().lock()),
    };
    Ok(reader.lines().collect::<Result<Vec<_>, _>>()?)
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, JobError> {
    Ok(match path {
        Some(p) if p != Path::new("-") => Box::new(BufWriter::new(File::create(p)?)),
        _ => Box::new(BufWriter::new(io::stdout().lock())),
    })
}
