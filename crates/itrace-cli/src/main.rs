// crates/itrace-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, clippy::unwrap_used, clippy::expect_used, clippy::todo)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use itrace_core::DefaultArch;
use itrace_stream::{
    generator::generate_trace, summarize, BinarySink, InstructionPrinter, RecordFile, TraceSink,
    TraceSource, PACKET_BUFFER_SIZE,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "itrace-cli",
    about = "itrace record-file tools",
    long_about = "itrace record-file tools.\n\nUse this tool to replay captured instruction traces as text, generate synthetic traces, and inspect record files.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Replay a record file as disassembly-annotated text, one line per
    /// instruction packet.
    Cat {
        /// Input record file
        #[arg(long)]
        input: PathBuf,

        /// Which operation fragments to render
        #[arg(long, value_enum, default_value_t = DisplayOpt::All)]
        display: DisplayOpt,
    },

    /// Generate a deterministic synthetic trace and persist it as a record
    /// file (handy for exercising downstream tooling without a simulator).
    Simulate {
        /// Number of instruction packets (>0)
        #[arg(long, default_value_t = 256, value_parser = clap::value_parser!(u64).range(1..))]
        instructions: u64,

        /// Generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Packet-buffer capacity of the trace source, in records (>0)
        #[arg(long, default_value_t = PACKET_BUFFER_SIZE as u64, value_parser = clap::value_parser!(u64).range(1..))]
        buffer: u64,

        /// Flush after every record instead of on buffer-full
        #[arg(long, default_value_t = false)]
        aggressive: bool,

        /// Output record file
        #[arg(long, default_value = "out.trace")]
        out: PathBuf,
    },

    /// Per-kind record counts and packet count for a record file
    Info {
        /// Input record file
        #[arg(long)]
        input: PathBuf,

        /// Emit the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum DisplayOpt {
    /// Every operation fragment
    All,
    /// Memory fragments only
    Mem,
    /// Header/opcode/disassembly only
    None,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Cat { input, display } => cat(&input, display),
        Cmd::Simulate {
            instructions,
            seed,
            buffer,
            aggressive,
            out,
        } => simulate(instructions, seed, buffer as usize, aggressive, &out),
        Cmd::Info { input, json } => info_cmd(&input, json),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn cat(input: &Path, display: DisplayOpt) -> Result<()> {
    // A local named `display` collides with the `use tracing::field::display`
    // that tracing's macros inject into their expansion, so log it through a
    // differently-named binding.
    let display_opt = display;
    info!(input=%input.display(), display=?display_opt, "replaying record file");
    let file = RecordFile::open(input)?;

    let arch = DefaultArch;
    let printer = match display {
        DisplayOpt::All => InstructionPrinter::display_all(&arch),
        DisplayOpt::Mem => InstructionPrinter::display_mem_only(&arch),
        DisplayOpt::None => InstructionPrinter::display_none(&arch),
    };

    let mut it = file.iter();
    while !it.at_end() {
        println!("{}", printer.print_instruction(&mut it));
    }
    Ok(())
}

fn simulate(
    instructions: u64,
    seed: u64,
    buffer: usize,
    aggressive: bool,
    out: &Path,
) -> Result<()> {
    info!(instructions, seed, buffer, aggressive, out=%out.display(), "generating synthetic trace");
    ensure_parent_dir(out)?;

    let mut src = TraceSource::new(buffer);
    src.set_sink(TraceSink::Binary(
        BinarySink::create(out).with_context(|| format!("creating {}", out.display()))?,
    ));
    src.set_aggressive_flush(aggressive);

    generate_trace(&mut src, instructions, seed).context("generating trace")?;
    src.flush().context("flushing trace source")?;
    src.terminate().context("terminating trace source")?;
    if let Some(sink) = src.take_sink() {
        sink.close().context("closing record file")?;
    }

    println!(
        "Simulated {} instructions (seed {}) → {}",
        instructions,
        seed,
        out.display()
    );
    Ok(())
}

fn info_cmd(input: &Path, json: bool) -> Result<()> {
    info!(input=%input.display(), "inspecting record file");
    let file = RecordFile::open(input)?;
    let summary = summarize(&file);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serialize summary")?
        );
        return Ok(());
    }

    println!("{}: {} records, {} packets", input.display(), summary.records, summary.packets);
    if summary.extensions > 0 {
        println!("  {} extension records (widened values)", summary.extensions);
    }
    for (kind, count) in &summary.counts {
        println!("  {kind:?}: {count}");
    }
    Ok(())
}
