//! muninn: operator CLI
//!
//! Offline tools for the gateway: compute request fingerprints, inspect the
//! effective configuration, list model profiles and replay captured
//! provider streams through the normalizer.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use muninn::normalize::wire::{SseDecoder, WireFormat};
use muninn::{Config, ModelProfiles, ResponseNormalizer, fingerprint};

/// Muninn gateway tools
#[derive(Parser)]
#[command(name = "muninn")]
#[command(version)]
#[command(about = "Muninn request gateway tools")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = "MUNINN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cache key of a request
    Fingerprint {
        /// Provider identifier
        #[arg(short, long)]
        provider: String,
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Provider options as JSON
        #[arg(short, long, default_value = "{}")]
        options: String,
    },

    /// Print the effective configuration (file plus environment overrides)
    Config,

    /// List model profiles
    Profiles,

    /// Normalize a captured provider response
    Normalize {
        /// Payload family
        #[arg(short, long, value_enum)]
        format: Format,
        /// Treat input as a server-sent-events stream
        #[arg(long)]
        sse: bool,
        /// Captured response (or omit to read from stdin)
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Anthropic,
    Openai,
    Gemini,
    Text,
}

impl From<Format> for WireFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Anthropic => WireFormat::Anthropic,
            Format::Openai => WireFormat::OpenAi,
            Format::Gemini => WireFormat::Gemini,
            Format::Text => WireFormat::PlainText,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Fingerprint {
            provider,
            prompt,
            options,
        } => {
            let prompt = match prompt {
                Some(p) => p,
                None => read_stdin()?.unwrap_or_default(),
            };
            let options: serde_json::Value = serde_json::from_str(&options)
                .map_err(|e| format!("--options is not valid JSON: {e}"))?;
            println!("{}", fingerprint(&provider, &prompt, &options)?);
        }

        Command::Config => {
            let config = load_config(args.config)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }

        Command::Profiles => {
            let config = load_config(args.config)?;
            let mut profiles = ModelProfiles::with_builtin();
            for (model, profile) in config.profiles {
                profiles.insert(model, profile);
            }

            println!(
                "{:<28} {:<7} {:>10} {:>10} {:>10}",
                "model", "latency", "tokens", "$/M in", "$/M out"
            );
            for (model, p) in profiles.iter_sorted() {
                println!(
                    "{:<28} {:<7} {:>10} {:>10.4} {:>10.4}",
                    model,
                    p.latency.as_str(),
                    p.token_limit,
                    p.cost_per_input_token * 1_000_000.0,
                    p.cost_per_output_token * 1_000_000.0,
                );
            }
        }

        Command::Normalize { format, sse, file } => {
            let input = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?,
                None => read_stdin()?.ok_or("normalize: no input provided")?,
            };
            let format = WireFormat::from(format);

            let fragments = if sse {
                let mut decoder = SseDecoder::new();
                let mut fragments = format.decode_sse(&mut decoder, &input)?;
                if let Some(tail) = decoder.finish() {
                    fragments.extend(format.decode(&tail)?);
                }
                fragments
            } else {
                format.decode(&input)?
            };

            let mut normalizer = ResponseNormalizer::new();
            for fragment in fragments {
                normalizer.apply(fragment);
            }
            let result = normalizer.into_outcome().into_result();
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// Load the config file (if any) and apply environment overrides.
fn load_config(path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load_or_default(path.as_deref())?;
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Read piped stdin, trimmed. `None` when stdin is a terminal or empty.
fn read_stdin() -> io::Result<Option<String>> {
    if io::stdin().is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    let trimmed = buf.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}
