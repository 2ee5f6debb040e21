mod commands;
mod config;
mod output;
mod watch;

use clap::{Parser, Subcommand, ValueEnum};
use eaconsole_core::controls::HistogramParam;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eaconsole", about = "Operator console for the FDD expert-system server")]
struct Cli {
    /// Server base URL (overrides the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Config file to use instead of ~/.config/eaconsole/console.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the server and print the console whenever it changes
    Watch {
        /// Subject to open as a tab, by key or by name (repeatable)
        #[arg(long = "open", value_name = "SUBJECT")]
        open: Vec<String>,

        /// Print each console view as one JSON line
        #[arg(long)]
        json: bool,

        /// Bootstrap, poll once, print the console and exit
        #[arg(long)]
        once: bool,
    },

    /// Check that the server answers
    Ping,

    /// Print the domain label and its subjects
    Domain,

    /// Set a knob value
    SetKnob {
        key: u64,
        #[arg(allow_negative_numbers = true)]
        value: f64,

        /// Subject carrying the knob; its range is used to clamp the value
        #[arg(long)]
        subject: Option<u64>,
    },

    /// Set a histogram's mode or span (zero-based option index)
    SetHistogram {
        #[arg(value_enum)]
        param: HistogramArg,
        key: u64,
        #[arg(allow_negative_numbers = true)]
        value: f64,
    },

    /// Answer a pending case with a zero-based option index
    AnswerCase {
        subject: u64,
        case: u64,
        answer: u64,
    },

    /// Set the server clock (seconds since the epoch, default now)
    SetTime { time: Option<f64> },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HistogramArg {
    Mode,
    Span,
}

impl From<HistogramArg> for HistogramParam {
    fn from(arg: HistogramArg) -> Self {
        match arg {
            HistogramArg::Mode => Self::Mode,
            HistogramArg::Span => Self::Span,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if matches!(cli.command, Commands::Watch { .. }) {
        for directive in ["eaconsole=info", "eaconsole_sync=info"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (path, cfg) = config::resolve(cli.config, cli.server)?;

    match cli.command {
        Commands::Watch { open, json, once } => {
            if once {
                watch::run_once(&cfg, &open, json).await
            } else {
                watch::run_watch(&cfg, &open, json).await
            }
        }
        Commands::Ping => commands::ping(&cfg).await,
        Commands::Domain => commands::domain(&cfg).await,
        Commands::SetKnob {
            key,
            value,
            subject,
        } => commands::set_knob(&cfg, key, value, subject).await,
        Commands::SetHistogram { param, key, value } => {
            commands::set_histogram(&cfg, param.into(), key, value).await
        }
        Commands::AnswerCase {
            subject,
            case,
            answer,
        } => commands::answer_case(&cfg, subject, case, answer).await,
        Commands::SetTime { time } => commands::set_time(&cfg, time).await,
        Commands::Config { save } => {
            if save {
                config::save_config(&path, &cfg)?;
                println!("Configuration written to {}", path.display());
            }
            config::show_config(&path, &cfg)
        }
    }
}
