use clap::{Parser, Subcommand};
use env_logger::Env;
use imgio::config::{self, IoConfig};
use imgio::output::{self, InfoReport};
use imgio::request::IoMode;
use imgio::{Format, Image, Options, Request, engine};
use log::{LevelFilter, info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "imgio")]
#[command(about = "Read, inspect and convert images")]
#[command(long_about = "\
Read, inspect and convert images

Formats are picked by file extension, or by the file's magic bytes when the
extension is unknown. Each format accepts its own keyword options, given as
key=value pairs:

  imgio convert photo.jpg photo.png -r exifrotate=false -w compression=6
  imgio info anim.gif -o makealpha=true

Default options per format can be set in imgio.toml:

  [defaults.jpeg.write]
  quality = 90

Run 'imgio formats' to list formats and their options.
Run 'imgio gen-config' to generate a documented imgio.toml.")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./imgio.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available formats and their options
    Formats,
    /// Show frames, shapes, dtypes and metadata of an image file
    Info {
        file: PathBuf,
        /// Read option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert an image file to another format
    Convert {
        source: PathBuf,
        dest: PathBuf,
        /// Read option as key=value (repeatable)
        #[arg(short = 'r', long = "read-option", value_name = "KEY=VALUE")]
        read_options: Vec<String>,
        /// Write option as key=value (repeatable)
        #[arg(short = 'w', long = "write-option", value_name = "KEY=VALUE")]
        write_options: Vec<String>,
        /// Output format name, instead of the destination's extension
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a stock imgio.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref())?;
    init_logging(&config, cli.verbose)?;

    let result = run(cli.command, &config);
    engine().show_warnings();
    result
}

/// Install env_logger. `RUST_LOG` wins; otherwise the configured level,
/// raised one step per `-v`.
fn init_logging(config: &IoConfig, verbose: u8) -> Result<(), config::ConfigError> {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let base = config.logging.level_filter()?;
    let start = LEVELS.iter().position(|l| *l == base).unwrap_or(2);
    let level = LEVELS[(start + verbose as usize).min(LEVELS.len() - 1)];
    env_logger::Builder::from_env(Env::default().default_filter_or(level.to_string())).init();
    Ok(())
}

fn run(command: Command, config: &IoConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Formats => output::print_formats(engine().formats()),
        Command::Info {
            file,
            options,
            json,
        } => {
            let given = Options::parse_pairs(&options)?;
            let request = Request::new(&file, "r?")?;
            let format = request.resolve_format()?;
            let options = given.over(&config.options_for(format, IoMode::Read));
            let reader = format.read(request.with_options(options))?;
            let report = InfoReport::from_reader(file.display().to_string(), &reader)?;
            if json {
                println!("{}", report.to_json()?);
            } else {
                output::print_info(&report);
            }
        }
        Command::Convert {
            source,
            dest,
            read_options,
            write_options,
            format,
        } => {
            let read_given = Options::parse_pairs(&read_options)?;
            let write_given = Options::parse_pairs(&write_options)?;
            let (from, frames) = read_all(&source, read_given, config)?;
            let (to, written) =
                write_all(&dest, format.as_deref(), &frames, write_given, config)?;
            output::print_convert(
                &source.display().to_string(),
                &dest.display().to_string(),
                from,
                to,
                written,
            );
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }
    Ok(())
}

fn read_all(
    path: &Path,
    given: Options,
    config: &IoConfig,
) -> Result<(&'static Format, Vec<Image>), imgio::Error> {
    let request = Request::new(path, "rI")?;
    let format = request.resolve_format()?;
    let options = given.over(&config.options_for(format, IoMode::Read));
    let frames = format.read(request.with_options(options))?.into_frames()?;
    info!("read {} frame(s) from {}", frames.len(), path.display());
    Ok((format, frames))
}

/// Write `frames` to `path`; returns the format used and the number of
/// frames written.
fn write_all(
    path: &Path,
    format_name: Option<&str>,
    frames: &[Image],
    given: Options,
    config: &IoConfig,
) -> Result<(&'static Format, usize), imgio::Error> {
    let mut request = Request::new(path, "w?")?;
    if let Some(name) = format_name {
        request = request.with_format(name);
    }
    let format = request.resolve_format()?;
    let options = given.over(&config.options_for(format, IoMode::Write));
    let mut writer = format.save(request.with_options(options))?;

    let frames = if !format.multi_frame && frames.len() > 1 {
        warn!(
            "{} stores a single image; writing the first of {} frames",
            format.name,
            frames.len()
        );
        &frames[..1]
    } else {
        frames
    };
    for frame in frames {
        writer.append_data(frame)?;
    }
    writer.close()?;
    Ok((format, frames.len()))
}
