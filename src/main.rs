use bytepipe::copier::copy_file_with_trace;
use bytepipe::signature::{identify_file, matches_file};
use bytepipe::{CopyMode, CopyStrategy, Error, Format};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "bytepipe", version, about = "Streaming file copy and signature sniffing")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
    /// Log progress at info level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy one file into another
    Copy {
        #[arg(long = "in", value_name = "PATH")]
        input: PathBuf,
        #[arg(long = "out", value_name = "PATH")]
        output: PathBuf,
        /// Copy mode: unbuffered, block or buffered
        #[arg(short, long, default_value = "buffered", value_parser = parse_mode)]
        mode: CopyMode,
        /// Bytes per chunk (default 4096 for block, 16384 for buffered)
        #[arg(short, long)]
        chunk_size: Option<usize>,
        /// Print the length of every chunk as it is written
        #[arg(long)]
        trace: bool,
        /// Print the copy report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check a file's leading bytes against a known signature
    Sniff {
        #[arg(long = "in", value_name = "PATH")]
        input: PathBuf,
        /// Format to check (png, zip, gif, jpeg, pdf); omit to identify
        #[arg(short, long, value_parser = parse_format)]
        format: Option<Format>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.quiet, cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run one subcommand; every failure comes back as an `Error` for `main` to report.
fn run(command: Commands) -> Result<(), Error> {
    match command {

        // ── Copy ─────────────────────────────────────────────────────────────
        Commands::Copy { input, output, mode, chunk_size, trace, json } => {
            let strategy = CopyStrategy::new(mode, chunk_size);
            info!(input = %input.display(), output = %output.display(), %mode, "copying");

            let report = copy_file_with_trace(&input, &output, &strategy, |n| {
                if trace { println!("{n}"); }
            })?;

            if json {
                let out = serde_json::json!({
                    "input":    input.display().to_string(),
                    "output":   output.display().to_string(),
                    "strategy": strategy,
                    "report":   report,
                });
                println!("{out}");
            } else {
                println!("Copied {} bytes in {} chunk(s) ({} mode) -> {}",
                    report.total_bytes, report.chunks, strategy.mode, output.display());
            }
        }

        // ── Sniff ────────────────────────────────────────────────────────────
        Commands::Sniff { input, format } => match format {
            Some(format) => {
                println!("{}", matches_file(&input, &format.signature())?);
            }
            None => {
                let found = identify_file(&input)?;
                println!("{}", found.map(|f| f.name()).unwrap_or("unknown"));
            }
        },
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_mode(s: &str) -> Result<CopyMode, String> {
    s.parse::<CopyMode>().map_err(|e| e.to_string())
}

fn parse_format(s: &str) -> Result<Format, String> {
    s.parse::<Format>().map_err(|e| e.to_string())
}

fn init_logging(debug: bool, quiet: bool, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
