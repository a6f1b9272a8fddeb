use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use plotbot::config::{ChartKind, PlotConfig};
use plotbot::derive::UnitConversion;
use plotbot::import::{DatetimeFormat, Delimiter, FileType, ImportMethod};
use plotbot::{logging, profile, OutputFormat, Session, Settings};

#[derive(Parser, Debug)]
#[command(name = "plotbot", version)]
#[command(about = "Plot tabular data files as interactive HTML charts", long_about = None)]
struct Args {
    /// Settings file (JSON); defaults to plotbot.json when present
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Directory for generated charts
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    /// Directory for run logs
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load files, derive columns and build one chart
    Plot {
        #[arg(value_enum)]
        kind: ChartKind,
        #[command(flatten)]
        input: InputArgs,
        /// Profile holding the chart configuration
        #[arg(long)]
        profile: PathBuf,
        /// Also render the chart as a PNG image
        #[arg(long)]
        png: Option<PathBuf>,
    },
    /// Load files, derive columns and write the table as CSV
    Export {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        to: PathBuf,
    },
    /// List the variables available after loading
    Variables {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Manage import methods
    Method {
        #[command(subcommand)]
        command: MethodCommand,
    },
    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// List the unit conversion catalogue
    Conversions,
}

#[derive(Subcommand, Debug)]
enum MethodCommand {
    /// Save a new import method to the import directory
    Create {
        name: String,
        #[arg(long)]
        spreadsheet: bool,
        /// Header row (1-based)
        #[arg(long, default_value_t = 1)]
        header: usize,
        /// First data row (1-based)
        #[arg(long, default_value_t = 2)]
        data: usize,
        #[arg(long, value_enum, default_value_t = Delimiter::Comma)]
        delimiter: Delimiter,
        /// Sheet name; the first sheet when omitted
        #[arg(long, default_value = "")]
        sheet: String,
        /// The first column holds seconds since 1970-01-01
        #[arg(long)]
        unix_epoch: bool,
    },
    /// List saved import methods
    List,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Write a profile with the default configuration
    Init { path: PathBuf },
}

#[derive(clap::Args, Debug)]
struct InputArgs {
    /// Import method file (.json, or legacy .cm)
    #[arg(long)]
    method: PathBuf,
    #[arg(required = true)]
    files: Vec<PathBuf>,
    /// Unit conversion NAME=SOURCE:CONVERSION, applied before formulas
    #[arg(long = "convert", value_name = "NAME=SOURCE:CONVERSION")]
    conversions: Vec<String>,
    /// Formula column NAME=EXPR
    #[arg(long = "formula", value_name = "NAME=EXPR")]
    formulas: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = Settings::load(args.settings.as_deref())?;
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }
    if let Some(dir) = args.log_dir {
        settings.log_dir = dir;
    }

    let log_path = logging::init(&settings.log_dir)?;
    let mut session = Session::new(settings, log_path);

    match args.command {
        Command::Plot { kind, input, profile, png } => {
            prepare(&mut session, &input)?;
            session.load_profile(&profile)?;
            if let Some(png) = png {
                session.export_image(kind, &png, OutputFormat::Png)?;
            }
            let path = session.update_plot(kind)?;
            println!("{}", path.display());
        }
        Command::Export { input, to } => {
            prepare(&mut session, &input)?;
            session.export_csv(&to)?;
            println!("{}", to.display());
        }
        Command::Variables { input } => {
            prepare(&mut session, &input)?;
            for name in session.variables() {
                println!("{}", name);
            }
        }
        Command::Method { command } => run_method(&session, command)?,
        Command::Profile { command: ProfileCommand::Init { path } } => {
            profile::save_profile(&PlotConfig::default(), &path)?;
            println!("{}", path.display());
        }
        Command::Conversions => {
            for conversion in UnitConversion::value_variants() {
                if let Some(value) = conversion.to_possible_value() {
                    println!("{:<12} {}", value.get_name(), conversion.label());
                }
            }
        }
    }
    Ok(())
}

/// Load the input files and apply the requested derivations
fn prepare(session: &mut Session, input: &InputArgs) -> Result<()> {
    let method = ImportMethod::load(&input.method)?;
    for skipped in session.open_files(&input.files, &method)? {
        eprintln!("Skipped '{}' (see {})", skipped.display(), session.log_path().display());
    }

    for arg in &input.conversions {
        let (output, source, conversion) = parse_conversion(arg)?;
        session.convert_units(source, conversion, output)?;
    }
    for arg in &input.formulas {
        let (output, expression) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=EXPR, got '{}'", arg))?;
        session.add_formula(expression, output)?;
    }
    Ok(())
}

fn parse_conversion(arg: &str) -> Result<(&str, &str, UnitConversion)> {
    let (output, rest) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=SOURCE:CONVERSION, got '{}'", arg))?;
    let (source, name) = rest
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Expected NAME=SOURCE:CONVERSION, got '{}'", arg))?;
    let conversion = UnitConversion::from_str(name, true)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("Unknown conversion '{}' (see `plotbot conversions`)", name))?;
    Ok((output, source, conversion))
}

fn run_method(session: &Session, command: MethodCommand) -> Result<()> {
    let dir = &session.settings().import_dir;
    match command {
        MethodCommand::Create { name, spreadsheet, header, data, delimiter, sheet, unix_epoch } => {
            let method = ImportMethod {
                file_type: if spreadsheet { FileType::Spreadsheet } else { FileType::Text },
                header_row: header,
                data_row: data,
                delimiter,
                sheet,
                datetime_format: if unix_epoch { DatetimeFormat::UnixEpoch } else { DatetimeFormat::Iso },
            };
            method.validate()?;
            let path = method.save(dir, &name)?;
            log::info!("Saved import method '{}'", path.display());
            println!("{}", path.display());
        }
        MethodCommand::List => {
            for path in ImportMethod::list(dir)? {
                if let Some(stem) = path.file_stem() {
                    println!("{}", stem.to_string_lossy());
                }
            }
        }
    }
    Ok(())
}
