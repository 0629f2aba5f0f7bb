use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use log::{Level, LevelFilter, Log, Metadata, Record};

use blemish_removal::{
    default_output_path, is_supported_image, save_image, Error, RepairOptions, RetouchSession,
};

#[derive(Parser)]
#[command(
    name = "blemish-removal",
    about = "Remove small blemishes by seamlessly cloning nearby texture over them",
    version,
    after_help = "Example: blemish-removal face.jpg --at 212,148 --at 240,301\n\n\
                  Each --at point is repaired in order. A point where no edge is found\n\
                  is reported and skipped; the image is left unchanged for it."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file
    input: String,

    /// Blemish location as X,Y in image pixels (repeatable)
    #[arg(short = 'a', long = "at", value_parser = parse_point, required = true)]
    points: Vec<(u32, u32)>,

    /// Output file (default: {name}_retouched.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Revert the last successful repair before saving
    #[arg(long)]
    undo_last: bool,

    /// Side of the square detection box in pixels (odd)
    #[arg(long, default_value = "35")]
    box_size: u32,

    /// Gradient level (0-255) that marks a blemish edge
    #[arg(short, long, default_value = "50")]
    threshold: u8,

    /// Cells per side of the patch search grid (odd)
    #[arg(long, default_value = "5")]
    grid: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
    let x = x
        .trim()
        .parse()
        .map_err(|e| format!("bad X in '{s}': {e}"))?;
    let y = y
        .trim()
        .parse()
        .map_err(|e| format!("bad Y in '{s}': {e}"))?;
    Ok((x, y))
}

/// Minimal stderr logger for the library's `log` records.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error | Level::Warn => eprintln!("[{}] {}", record.level(), record.args()),
            _ => eprintln!("  -> {}", record.args()),
        }
    }

    fn flush(&self) {}
}

fn init_logging(opts: &RepairOptions) {
    let level = if opts.quiet {
        LevelFilter::Error
    } else if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Off
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() {
    let cli = Cli::parse();

    let opts = RepairOptions {
        box_size: cli.box_size,
        gradient_threshold: cli.threshold,
        grid_size: cli.grid,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    if let Err(e) = opts.validate() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    init_logging(&opts);

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }
    if !is_supported_image(input_path) && !opts.quiet {
        eprintln!("WARNING: Unrecognized extension, trying to decode anyway");
    }

    let mut session = match RetouchSession::open(input_path, opts.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Fatal: Failed to load image: {e}");
            process::exit(1);
        }
    };

    let mut repaired = 0u32;
    let mut skipped = 0u32;
    let mut failed = 0u32;

    for &(x, y) in &cli.points {
        match session.repair(x, y) {
            Ok(done) => {
                repaired += 1;
                if !opts.quiet {
                    eprintln!(
                        "[OK] ({x}, {y}) radius {} px, patch diff {:.1}",
                        done.geometry.radius, done.patch.best.difference
                    );
                }
            }
            Err(e) if e.is_recoverable() => {
                skipped += 1;
                if !opts.quiet {
                    eprintln!("[SKIP] ({x}, {y}): {e}");
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("[FAIL] ({x}, {y}): {e}");
            }
        }
    }

    let succeeded = repaired;
    if cli.undo_last {
        if session.undo() {
            repaired -= 1;
            if !opts.quiet {
                eprintln!("[UNDO] reverted last repair");
            }
        } else if !opts.quiet {
            eprintln!("[UNDO] nothing to revert");
        }
    }

    let output_path = match &cli.output {
        Some(o) => PathBuf::from(o),
        None => default_output_path(input_path),
    };
    let image = session.into_image();
    if let Err(e) = save(&image, &output_path) {
        eprintln!("Fatal: Failed to save {}: {e}", output_path.display());
        process::exit(1);
    }

    if !opts.quiet {
        eprintln!();
        eprint!("[Summary] Repaired: {repaired}");
        if skipped > 0 {
            eprint!(", Skipped: {skipped}");
        }
        if failed > 0 {
            eprint!(", Failed: {failed}");
        }
        eprintln!(" -> {}", output_path.display());
    }

    if failed > 0 || succeeded == 0 {
        process::exit(1);
    }
}

fn save(image: &image::RgbImage, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    save_image(image, path)
}
