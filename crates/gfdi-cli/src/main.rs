//! gfdi - inspect, frame and replay wearable protocol traffic.
//!
//! Frames are given as hex strings. Replay scripts are YAML:
//!
//! ```yaml
//! serve:
//!   5: "0102030405"
//! frames:
//!   - "0e00a213010005454e5f5553c3ae"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gfdi_protocol::{
    checksum, registry, ConfigError, Dispatcher, EncodeError, FrameCodec, FrameError, ProtocolConfig,
    Session,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gfdi")]
#[command(about = "Inspect, frame and replay wearable protocol traffic")]
#[command(version)]
struct Cli {
    /// Protocol configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode frames and show the automatic reply
    Decode {
        /// Frames as hex
        #[arg(required = true)]
        frames: Vec<String>,
    },

    /// Feed a scripted sequence of inbound frames through one session
    Replay {
        /// Replay script (YAML)
        script: PathBuf,
    },

    /// Frame a raw payload
    Frame {
        /// Type code
        type_code: u16,

        /// Payload as hex
        #[arg(default_value = "")]
        payload: String,
    },

    /// Compute the frame checksum of some bytes
    Crc {
        /// Bytes as hex
        data: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("cannot encode: {0}")]
    Encode(#[from] EncodeError),
}

/// A scripted exchange for `replay`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReplayScript {
    /// Files offered to download requests, by index, as hex.
    serve: BTreeMap<u16, String>,
    /// Inbound frames, as hex.
    frames: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Decode { frames } => decode(config, &frames),
        Commands::Replay { script } => replay(config, &script),
        Commands::Frame { type_code, payload } => {
            let codec = FrameCodec::new(config.max_packet_size);
            let frame = codec.encode(type_code, &parse_hex(&payload)?)?;
            println!("{}", hex::encode(frame));
            Ok(())
        }
        Commands::Crc { data } => {
            println!("0x{:04X}", checksum(&parse_hex(&data)?));
            Ok(())
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ProtocolConfig, CliError> {
    let Some(path) = path else {
        return Ok(ProtocolConfig::default());
    };
    let text = read(path)?;
    let config: ProtocolConfig =
        serde_yaml::from_str(&text).map_err(|source| CliError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    info!("loaded configuration from {}", path.display());
    Ok(config)
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse hex, ignoring whitespace and an optional `0x` prefix.
fn parse_hex(text: &str) -> Result<Vec<u8>, CliError> {
    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(compact)?)
}

fn decode(config: ProtocolConfig, frames: &[String]) -> Result<(), CliError> {
    config.validate()?;
    let dispatcher = Dispatcher::new(config);
    for text in frames {
        let dispatch = dispatcher.dispatch(&parse_hex(text)?)?;
        println!(
            "{} ({})",
            registry::name_of(dispatch.type_code),
            dispatch.type_code
        );
        match &dispatch.message {
            Ok(message) => println!("  message: {message:?}"),
            Err(e) => println!("  error:   {e}"),
        }
        if let Some(frame) = dispatch.reply_frame(dispatcher.codec())? {
            println!("  reply:   {}", hex::encode(frame));
        }
        for event in &dispatch.events {
            println!("  event:   {event:?}");
        }
    }
    Ok(())
}

fn replay(config: ProtocolConfig, path: &Path) -> Result<(), CliError> {
    let text = read(path)?;
    let script: ReplayScript = serde_yaml::from_str(&text).map_err(|source| CliError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;

    let mut session = Session::new(config)?;
    for (file_index, data) in &script.serve {
        session.serve_file(*file_index, parse_hex(data)?);
    }
    debug!("replaying {} frames", script.frames.len());

    for (number, text) in script.frames.iter().enumerate() {
        let bytes = parse_hex(text)?;
        match session.handle_frame(&bytes) {
            Ok(output) => {
                println!("#{} {}", number, registry::name_of(output.type_code));
                if let Err(e) = &output.message {
                    println!("  error: {e}");
                }
                for frame in &output.frames {
                    println!("  send:  {}", hex::encode(frame));
                }
                for event in &output.events {
                    println!("  event: {event:?}");
                }
            }
            // A bad frame is dropped; the session carries on.
            Err(e) => println!("#{number} dropped: {e}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex("0x0e00").unwrap(), vec![0x0e, 0x00]);
        assert_eq!(parse_hex(" a2 13 ").unwrap(), vec![0xa2, 0x13]);
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_replay_script_parses() {
        let script: ReplayScript = serde_yaml::from_str(
            "serve:\n  5: \"0102\"\nframes:\n  - \"0600b0130000\"\n",
        )
        .unwrap();
        assert_eq!(script.serve.get(&5).map(String::as_str), Some("0102"));
        assert_eq!(script.frames.len(), 1);
        assert!(serde_yaml::from_str::<ReplayScript>("bogus: 1\n").is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let text = serde_yaml::to_string(&ProtocolConfig::default()).unwrap();
        let config: ProtocolConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(config, ProtocolConfig::default());
    }
}
