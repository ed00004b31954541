// Command-line front end for mangler.
//
// Batch mangle/unmangle of files into an output directory, plus stream
// verification and inspection. Each command returns an exit code; `run()`
// parses arguments, installs the logger and exits with that code.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::engine::{self, DEFAULT_MAX_LEN, Options as CodecOptions};
use crate::format::opcode::{LITERAL_MAX, LONG_MAX_DISTANCE, LONG_MAX_LEN};
use crate::format::{Op, OpIterator};
use crate::io::{self, BatchReport, Direction};

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Mangle/unmangle compressor for game data files.
#[derive(Parser, Debug)]
#[command(
    name = "mangler",
    version,
    about = "Mangle/unmangle file compressor",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compress files into an output directory.
    Mangle(MangleArgs),
    /// Decompress mangled files into an output directory.
    Unmangle(UnmangleArgs),
    /// Check that a mangled file decodes to the original.
    Verify(VerifyArgs),
    /// Print the opcode structure of a mangled file.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct LimitArgs {
    /// Largest buffer accepted in either direction (supports K/M/G suffix).
    #[arg(long = "max-size", value_parser = parse_byte_size, default_value_t = DEFAULT_MAX_LEN as u64)]
    max_size: u64,
}

#[derive(Args, Debug)]
struct MangleArgs {
    /// Files to mangle.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    files: Vec<PathBuf>,

    /// Directory receiving `<name>_mang<.ext>` outputs.
    #[arg(long = "out-dir", short = 'o', value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    /// Disable one-step lookahead (greedy encoding).
    #[arg(long = "no-lookahead")]
    no_lookahead: bool,

    #[command(flatten)]
    limit: LimitArgs,
}

#[derive(Args, Debug)]
struct UnmangleArgs {
    /// Files to unmangle.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    files: Vec<PathBuf>,

    /// Directory receiving `<name>_unmang<.ext>` outputs.
    #[arg(long = "out-dir", short = 'o', value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    #[command(flatten)]
    limit: LimitArgs,
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Original (unmangled) file.
    #[arg(value_hint = ValueHint::FilePath)]
    original: PathBuf,

    /// Mangled file to check against it.
    #[arg(value_hint = ValueHint::FilePath)]
    mangled: PathBuf,

    #[command(flatten)]
    limit: LimitArgs,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Mangled file.
    #[arg(value_hint = ValueHint::FilePath)]
    file: PathBuf,

    /// List every opcode with its stream offset.
    #[arg(long)]
    ops: bool,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Mangle,
    Unmangle,
    Verify,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    files: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    list_ops: bool,
    codec: CodecOptions,
}

fn codec_options(limit: &LimitArgs, lookahead: bool) -> CodecOptions {
    CodecOptions {
        max_len: usize::try_from(limit.max_size).unwrap_or(usize::MAX),
        lookahead,
    }
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        files: Vec::new(),
        out_dir: None,
        list_ops: false,
        codec: CodecOptions::default(),
    };

    match cli.command {
        Cmd::Mangle(args) => {
            opts.command = Command::Mangle;
            opts.codec = codec_options(&args.limit, !args.no_lookahead);
            opts.files = args.files;
            opts.out_dir = Some(args.out_dir);
        }
        Cmd::Unmangle(args) => {
            opts.command = Command::Unmangle;
            opts.codec = codec_options(&args.limit, true);
            opts.files = args.files;
            opts.out_dir = Some(args.out_dir);
        }
        Cmd::Verify(args) => {
            opts.command = Command::Verify;
            opts.codec = codec_options(&args.limit, true);
            opts.files = vec![args.original, args.mangled];
        }
        Cmd::Inspect(args) => {
            opts.command = Command::Inspect;
            opts.files = vec![args.file];
            opts.list_ops = args.ops;
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("mangler".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("mangler: json: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("mangler version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_MAX_LEN={DEFAULT_MAX_LEN}");
    eprintln!("LITERAL_MAX={LITERAL_MAX}");
    eprintln!("LONG_MAX_LEN={LONG_MAX_LEN}");
    eprintln!("LONG_MAX_DISTANCE={LONG_MAX_DISTANCE}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Mangle / unmangle commands
// ---------------------------------------------------------------------------

fn cmd_batch(opts: &Options, direction: Direction) -> i32 {
    let Some(out_dir) = &opts.out_dir else {
        eprintln!("mangler: {} requires --out-dir", direction.name());
        return 1;
    };

    let report = io::run_batch(&opts.files, out_dir, direction, &opts.codec, opts.force);

    if opts.verbose > 0 && !opts.quiet {
        for outcome in &report.outcomes {
            if let Ok(stats) = &outcome.result {
                eprintln!(
                    "mangler: {} -> {} ({} -> {} bytes)",
                    outcome.input.display(),
                    outcome.output.display(),
                    stats.input_size,
                    stats.output_size
                );
            }
        }
    }

    if !opts.quiet {
        eprintln!("mangler: {}", batch_summary(&report));
    }

    if opts.json_output {
        print_json(&batch_json(&report));
    }

    if report.is_success() { 0 } else { 1 }
}

fn batch_summary(report: &BatchReport) -> String {
    let ratio = report
        .ratio()
        .map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r * 100.0));
    format!(
        "{}: {} succeeded, {} failed, {} -> {} bytes ({ratio}) in {:.2?}",
        report.direction.name(),
        report.succeeded(),
        report.failed(),
        report.input_bytes(),
        report.output_bytes(),
        report.elapsed
    )
}

fn batch_json(report: &BatchReport) -> serde_json::Value {
    let files: Vec<serde_json::Value> = report
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(stats) => serde_json::json!({
                "input": o.input.display().to_string(),
                "output": o.output.display().to_string(),
                "ok": true,
                "input_size": stats.input_size,
                "output_size": stats.output_size,
                "input_sha256": stats.input_sha256.as_ref().map(|d| io::hex(d)),
                "output_sha256": stats.output_sha256.as_ref().map(|d| io::hex(d)),
            }),
            Err(e) => serde_json::json!({
                "input": o.input.display().to_string(),
                "ok": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    serde_json::json!({
        "command": report.direction.name(),
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "input_bytes": report.input_bytes(),
        "output_bytes": report.output_bytes(),
        "ratio": report.ratio(),
        "elapsed_ms": report.elapsed.as_millis() as u64,
        "files": files,
    })
}

// ---------------------------------------------------------------------------
// Verify command
// ---------------------------------------------------------------------------

fn cmd_verify(opts: &Options) -> i32 {
    let [original_path, mangled_path] = opts.files.as_slice() else {
        eprintln!("mangler: verify requires an original and a mangled file");
        return 1;
    };

    let mut inputs = Vec::with_capacity(2);
    for path in [original_path, mangled_path] {
        match std::fs::read(path) {
            Ok(data) => inputs.push(data),
            Err(e) => {
                eprintln!("mangler: {}: {e}", path.display());
                return 1;
            }
        }
    }

    let ok = engine::verify_with_options(&inputs[0], &inputs[1], &opts.codec);
    if !opts.quiet {
        let verdict = if ok { "OK" } else { "MISMATCH" };
        eprintln!(
            "mangler: {verdict}: {} vs {}",
            mangled_path.display(),
            original_path.display()
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "verify",
            "original": original_path.display().to_string(),
            "mangled": mangled_path.display().to_string(),
            "original_size": inputs[0].len(),
            "mangled_size": inputs[1].len(),
            "ok": ok,
        }));
    }

    if ok { 0 } else { 1 }
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = opts.files.first() else {
        eprintln!("mangler: inspect requires an input file");
        return 1;
    };
    let stream = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("mangler: {}: {e}", path.display());
            return 1;
        }
    };

    let ops = match OpIterator::new(&stream) {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("mangler: {}: {e}", path.display());
            return 1;
        }
    };

    let declared = ops.declared_len();
    println!("declared length:  {declared}");
    println!("stream length:    {}", stream.len());

    // name -> (count, output bytes)
    let mut histogram: BTreeMap<&'static str, (u64, u64)> = BTreeMap::new();
    let mut decoded = 0u64;
    let mut op_count = 0u64;
    let mut terminated = false;
    let mut error = None;

    for item in ops {
        match item {
            Ok((offset, op)) => {
                if opts.list_ops {
                    println!("  {offset:>8}  {:<12} {}", op.name(), op.output_len());
                }
                if op == Op::End {
                    terminated = true;
                    continue;
                }
                let entry = histogram.entry(op.name()).or_default();
                entry.0 += 1;
                entry.1 += op.output_len() as u64;
                decoded += op.output_len() as u64;
                op_count += 1;
            }
            Err(e) => error = Some(e),
        }
    }

    println!("opcodes:          {op_count}");
    println!("decoded length:   {decoded}");
    println!("terminated:       {}", if terminated { "yes" } else { "no" });
    for (name, (count, bytes)) in &histogram {
        println!("  {name:<12} {count:>8} ops {bytes:>10} bytes");
    }

    if opts.json_output {
        let histogram: serde_json::Map<String, serde_json::Value> = histogram
            .iter()
            .map(|(name, (count, bytes))| {
                (
                    name.to_string(),
                    serde_json::json!({ "count": count, "bytes": bytes }),
                )
            })
            .collect();
        print_json(&serde_json::json!({
            "command": "inspect",
            "declared_length": declared,
            "stream_length": stream.len(),
            "opcodes": op_count,
            "decoded_length": decoded,
            "terminated": terminated,
            "histogram": histogram,
            "error": error.as_ref().map(|e| e.to_string()),
        }));
    }

    if let Some(e) = error {
        eprintln!("mangler: {}: {e}", path.display());
        return 1;
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = resolve_options(cli);

    let exit_code = match opts.command {
        Command::Mangle => cmd_batch(&opts, Direction::Mangle),
        Command::Unmangle => cmd_batch(&opts, Direction::Unmangle),
        Command::Verify => cmd_verify(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
