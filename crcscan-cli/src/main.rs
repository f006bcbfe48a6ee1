use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crcscan_core::{
    constants::pipeline::{DEFAULT_BUFFER_KB, MAX_BUFFER_KB, WORKERS_PER_CPU},
    ErrorRecovery, OptionsBuilder, Pipeline, ScanError, ScanEvent, StdoutSink,
};

const EXIT_USAGE: i32 = 1;
const EXIT_SELF_TEST: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "crcscan",
    version,
    about = "CRC32C (Castagnoli) inventory of file trees",
    long_about = "Walks each PATH and prints one line per regular file:\n\
    <base64 crc32c> <16 hex digit size> <path>\n\
    Diagnostics and the final throughput report go to stderr.",
    after_help = "Examples:\n\
      Inventory a tree with defaults\n\
        crcscan /data > inventory.txt\n\
      64 parallel reads, 256 files listed ahead, 4 MiB read buffers\n\
        crcscan -j 64 -l 256 -s 4M /mnt/nfs/share\n\
    "
)]
struct Args {
    /// Restrict workers to the first N CPUs (Linux)
    #[arg(short = 'p', value_name = "N")]
    cpus: Option<usize>,

    /// Number of parallel reads [default: 4 x CPU count]
    #[arg(short = 'j', value_name = "N")]
    workers: Option<usize>,

    /// Size of the list-ahead queue [default: same as -j]
    #[arg(short = 'l', value_name = "N")]
    list_ahead: Option<usize>,

    /// Size of reads in KiB, or with a K/M suffix (e.g. 512K, 4M)
    #[arg(short = 's', value_name = "SIZE", value_parser = parse_buffer_size)]
    buffer_size: Option<usize>,

    /// Files or directories to inventory
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,
}

/// Plain numbers are KiB; `K`/`M` suffixes are explicit.
fn parse_buffer_size(s: &str) -> Result<usize, String> {
    let sl = s.trim().to_ascii_lowercase();
    let (num, mul) = if let Some(n) = sl.strip_suffix('m') {
        (n, 1024 * 1024)
    } else if let Some(n) = sl.strip_suffix('k') {
        (n, 1024)
    } else {
        (sl.as_str(), 1024)
    };
    match num.trim().parse::<usize>() {
        Ok(0) => Err("buffer size must be greater than zero".into()),
        Ok(n) => match n.checked_mul(mul) {
            Some(bytes) if bytes <= MAX_BUFFER_KB * 1024 => Ok(bytes),
            _ => Err(format!("buffer size '{s}' exceeds the {}M limit", MAX_BUFFER_KB / 1024)),
        },
        Err(e) => Err(format!("invalid buffer size '{s}': {e}")),
    }
}

fn print_usage() {
    let mut cmd = Args::command();
    eprintln!("{}", cmd.render_help());
}

fn render_event(ev: &ScanEvent, flags: &str) {
    match ev {
        ScanEvent::EnterDir(p) => eprintln!("entering dir: {}", p.display()),
        ScanEvent::Ignored(p) => eprintln!("ignoring: {}", p.display()),
        ScanEvent::Error(ScanError::Metadata { path, kind, source }) => {
            eprintln!("{}: error: '{}': {}", kind.label(), path.display(), source)
        }
        ScanEvent::Error(ScanError::Output { source }) => {
            eprintln!("output error: {source}")
        }
        ScanEvent::Error(e) => {
            let path = match e {
                ScanError::Open { path, .. }
                | ScanError::Io { path, .. }
                | ScanError::SizeMismatch { path, .. } => path.display().to_string(),
                _ => String::new(),
            };
            eprintln!("CRC error: '{path}' : {e}")
        }
        ScanEvent::Summary(s) => {
            eprintln!("{flags}");
            eprintln!("{s}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(a) => a,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprint!("{e}");
            std::process::exit(EXIT_USAGE);
        }
    };
    if args.paths.is_empty() {
        eprintln!("error: missing paths");
        print_usage();
        std::process::exit(EXIT_USAGE);
    }

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let workers = args.workers.unwrap_or(cpus * WORKERS_PER_CPU).max(1);
    let list_ahead = args.list_ahead.unwrap_or(workers).max(1);
    let buffer_size = args.buffer_size.unwrap_or(DEFAULT_BUFFER_KB * 1024);
    let cpu_cap = args.cpus.unwrap_or(cpus);

    let flags = format!(
        "Flags: [p={} j={} l={} s={}]",
        cpu_cap,
        workers,
        list_ahead,
        buffer_size / 1024
    );
    let mut builder = OptionsBuilder::new()
        .workers(workers)
        .queue_depth(list_ahead)
        .buffer_size(buffer_size)
        .on_event(move |ev| render_event(ev, &flags));
    if args.cpus.is_some() {
        builder = builder.cpu_cap(cpu_cap);
    }
    let opt = builder.build();
    log::debug!("options: {opt:?}");

    let pipeline = match Pipeline::new(opt) {
        Ok(p) => p,
        Err(e) => {
            debug_assert!(!e.is_recoverable());
            eprintln!("{e}. Terminating.");
            std::process::exit(EXIT_SELF_TEST);
        }
    };

    pipeline.run(&args.paths, Arc::new(StdoutSink))?;
    Ok(())
}
