// SPDX-License-Identifier: MPL-2.0
use lens_refine::config::{self, paths};
use lens_refine::domain::media::PixelBuffer;
use lens_refine::error::{Error, Result};
use lens_refine::media::save_image;
use lens_refine::worker::{Inbound, Outbound, ProcessOptions, ToolName, Worker};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
lens_refine - enhance images or remove their background

USAGE:
  lens_refine [OPTIONS] INPUT OUTPUT

OPTIONS:
  --tool NAME        enhancer (default) or bg-remover
  --scale N          Classical upscale factor (1-8)
  --amount A         Sharpening strength (0-5)
  --config FILE      Read settings from FILE
  --config-dir DIR   Directory holding settings.toml
  --data-dir DIR     Directory holding downloaded models
  --offline          Never download models
  --json             Print events as JSON lines
  -h, --help         Print this help
  -V, --version      Print version
";

struct Flags {
    tool: ToolName,
    options: ProcessOptions,
    config_file: Option<PathBuf>,
    config_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    offline: bool,
    json: bool,
    input: PathBuf,
    output: PathBuf,
}

fn parse_tool(value: &str) -> std::result::Result<ToolName, String> {
    match value {
        "enhancer" => Ok(ToolName::Enhancer),
        "bg-remover" => Ok(ToolName::BgRemover),
        other => Err(format!("unknown tool '{other}' (expected enhancer or bg-remover)")),
    }
}

fn parse_flags() -> std::result::Result<Option<Flags>, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(None);
    }
    if args.contains(["-V", "--version"]) {
        println!("lens_refine {}", env!("CARGO_PKG_VERSION"));
        return Ok(None);
    }

    let flags = Flags {
        tool: args
            .opt_value_from_fn("--tool", parse_tool)?
            .unwrap_or(ToolName::Enhancer),
        options: ProcessOptions {
            scale: args.opt_value_from_str("--scale")?,
            sharpen_amount: args.opt_value_from_str("--amount")?,
        },
        config_file: args.opt_value_from_str("--config")?,
        config_dir: args.opt_value_from_str("--config-dir")?,
        data_dir: args.opt_value_from_str("--data-dir")?,
        offline: args.contains("--offline"),
        json: args.contains("--json"),
        input: args.free_from_str()?,
        output: args.free_from_str()?,
    };

    let rest = args.finish();
    if !rest.is_empty() {
        eprintln!("warning: ignoring extra arguments: {rest:?}");
    }
    Ok(Some(flags))
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lens_refine=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_event(event: &Outbound, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(%err, "cannot serialize event"),
        }
        return;
    }
    match event {
        Outbound::Progress { percent, status } => println!("[{percent:>3}%] {status}"),
        Outbound::Initialized { backend } => println!("backend: {backend}"),
        Outbound::Complete { result, original } => println!(
            "done: {}x{} -> {}x{}",
            original.width, original.height, result.width, result.height
        ),
        // Reported by the exit path
        Outbound::Error { .. } | Outbound::Cancelled => {}
    }
}

fn run(flags: Flags) -> Result<()> {
    paths::init_cli_overrides(flags.data_dir.clone(), flags.config_dir.clone());

    let mut config = match &flags.config_file {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };
    if flags.offline {
        config.runtime.offline = true;
    }

    let file = std::fs::read(&flags.input)?;
    let models_dir = paths::get_models_dir_with_override(None);
    let mut worker = Worker::from_config(&config, models_dir)?;

    worker.send(Inbound::Init { tool: flags.tool })?;
    worker.process(file, flags.tool.into(), flags.options)?;

    let mut outcome = Err(Error::Worker("worker stopped before replying".to_string()));
    while let Some(event) = worker.blocking_recv() {
        print_event(&event, flags.json);
        match event {
            Outbound::Complete { result, .. } => {
                let image = PixelBuffer::try_from(result)?;
                save_image(&image, &flags.output)?;
                outcome = Ok(());
                break;
            }
            Outbound::Error { .. } | Outbound::Cancelled => {
                if let Some(err) = event.failure() {
                    outcome = Err(err);
                }
                break;
            }
            Outbound::Progress { .. } | Outbound::Initialized { .. } => {}
        }
    }

    worker.shutdown()?;
    outcome
}

fn main() -> ExitCode {
    let flags = match parse_flags() {
        Ok(Some(flags)) => flags,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            return ExitCode::from(2);
        }
    };

    init_logging();

    match run(flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
