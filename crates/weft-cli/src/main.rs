//! `weft`: render and check templates from the command line.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use weft::{segment, Environment, IoSink, Options, Value};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Render and check weft templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: OptionArgs,
}

#[derive(Args)]
struct OptionArgs {
    /// Report compile errors with positions
    #[arg(long, global = true)]
    debug: bool,

    /// Abort renders that take longer than this many milliseconds
    #[arg(long, global = true, value_name = "MS")]
    timeout_ms: Option<u64>,
}

impl OptionArgs {
    /// Flags override `WEFT_DEBUG` and `WEFT_TIMEOUT_MS`.
    fn resolve(&self) -> Options {
        let mut options = Options::from_env();
        if self.debug {
            options = options.debug(true);
        }
        if let Some(ms) = self.timeout_ms {
            options = options.timeout(Duration::from_millis(ms));
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        /// Template file
        template: PathBuf,

        /// JSON file with the data to render (`-` reads stdin)
        #[arg(short, long, conflicts_with = "json")]
        data: Option<PathBuf>,

        /// Inline JSON data
        #[arg(long)]
        json: Option<String>,

        /// Template files available as partials, named by file name
        #[arg(short, long = "partial", value_name = "FILE")]
        partials: Vec<PathBuf>,
    },

    /// Parse and compile templates without rendering them
    Check {
        /// Template files
        #[arg(required = true)]
        templates: Vec<PathBuf>,
    },

    /// Print the parsed segments of a template as JSON
    Segments {
        /// Template file
        template: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let options = cli.options.resolve();
    match cli.command {
        Commands::Render {
            template,
            data,
            json,
            partials,
        } => {
            render(&template, load_data(data.as_deref(), json.as_deref())?, &partials, options)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { templates } => check(&templates, options),
        Commands::Segments { template } => {
            let source = read(&template)?;
            let segments = segment::parse(&source)
                .with_context(|| format!("failed to parse {}", template.display()))?;
            println!("{}", serde_json::to_string_pretty(&segments)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn render(template: &Path, data: Value, partials: &[PathBuf], options: Options) -> Result<()> {
    let mut env = Environment::with_options(options);
    for partial in partials {
        env.add_template(&template_name(partial)?, read(partial)?);
    }
    let name = template_name(template)?;
    env.add_template(&name, read(template)?);
    log::debug!("rendering {} with {} partial(s)", name, partials.len());
    env.render_to(&name, data, IoSink(io::stdout()))
        .with_context(|| format!("failed to render {}", template.display()))
}

fn check(templates: &[PathBuf], options: Options) -> Result<ExitCode> {
    let env = Environment::with_options(options);
    let mut failed = 0;
    for path in templates {
        let source = read(path)?;
        match env.compile(&source) {
            Ok(_) => println!("ok      {}", path.display()),
            Err(err) => {
                failed += 1;
                println!("invalid {}: {}", path.display(), err);
            }
        }
    }
    if failed > 0 {
        eprintln!("{} of {} template(s) failed", failed, templates.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn load_data(path: Option<&Path>, inline: Option<&str>) -> Result<Value> {
    let text = match (path, inline) {
        (_, Some(inline)) => inline.to_string(),
        (Some(path), None) if path == Path::new("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read data from stdin")?;
            buf
        }
        (Some(path), None) => read(path)?,
        (None, None) => return Ok(Value::Null),
    };
    let json: serde_json::Value =
        serde_json::from_str(&text).context("data is not valid JSON")?;
    Ok(Value::from(json))
}

fn template_name(path: &Path) -> Result<String> {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("{} has no usable file name", path.display()),
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
