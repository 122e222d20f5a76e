// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk command line.
//
// Entry point. Initialises logging, loads the client config, and runs one
// subcommand: scan, probe, print or list.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use scanwerk_core::human_errors::humanize_error;
use scanwerk_core::{
    ClientConfig, DeviceAddress, DiscoveredService, ScanFormat, ScanProtocol, ScanRequest,
    ScanSource, ScanwerkError,
};
use scanwerk_scan::passthrough::RAW_PORT;
use scanwerk_scan::retry::{RetryConfig, with_retries};
use scanwerk_scan::{ListingMode, ScanClient, listing_json};

/// Acquire images from network scanners over WSD or eSCL
#[derive(Parser, Debug)]
#[command(name = "scanwerk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// JSON client config; defaults apply to missing keys
    #[arg(short, long, global = true, env = "SCANWERK_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan one page and write it to a file
    Scan(ScanArgs),
    /// Detect which scan protocol a device speaks
    Probe(DeviceArgs),
    /// Send raw bytes to a print port and show the reply
    Print(PrintArgs),
    /// Filter resolved mDNS services into a printer or scanner listing
    List(ListArgs),
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// Device host name or IP address
    host: String,

    /// Device HTTP port
    #[arg(short, long, default_value_t = 80)]
    port: u16,
}

#[derive(Args, Debug)]
struct ScanArgs {
    #[command(flatten)]
    device: DeviceArgs,

    #[arg(long, value_enum, default_value = "escl")]
    protocol: ProtocolArg,

    #[arg(long, value_enum, default_value = "platen")]
    source: SourceArg,

    #[arg(long, value_enum, default_value = "jpeg")]
    format: FormatArg,

    /// Scan width (eSCL: hundredths of an inch)
    #[arg(long, default_value_t = 850)]
    width: u32,

    /// Scan height (eSCL: hundredths of an inch)
    #[arg(long, default_value_t = 1100)]
    height: u32,

    /// Output file; defaults to scan.<ext> in the current directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Retry transient failures this many times
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args, Debug)]
struct PrintArgs {
    /// Device host name or IP address
    host: String,

    #[arg(short, long, default_value_t = RAW_PORT)]
    port: u16,

    /// Send the contents of this file
    #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
    file: Option<PathBuf>,

    /// Send this text
    #[arg(short, long)]
    text: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(value_enum)]
    mode: ModeArg,

    /// JSON array of resolved services, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    services: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Wsd,
    Escl,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Platen,
    Feeder,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Jpeg,
    Pdf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Printers,
    Scanners,
}

impl From<ProtocolArg> for ScanProtocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Wsd => Self::Wsd,
            ProtocolArg::Escl => Self::Escl,
        }
    }
}

impl From<SourceArg> for ScanSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Platen => Self::Platen,
            SourceArg::Feeder => Self::Feeder,
        }
    }
}

impl From<FormatArg> for ScanFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Jpeg => Self::Jpeg,
            FormatArg::Pdf => Self::Pdf,
        }
    }
}

impl From<ModeArg> for ListingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Printers => Self::Printers,
            ModeArg::Scanners => Self::Scanners,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Scan(args) => run_scan(config, args),
        Command::Probe(args) => run_probe(config, args),
        Command::Print(args) => run_print(config, args),
        Command::List(args) => run_list(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("cannot load config from {}", path.display())),
        None => Ok(ClientConfig::default()),
    }
}

/// Attach the plain-English explanation to a client error.
fn explain(err: ScanwerkError) -> anyhow::Error {
    let human = humanize_error(&err);
    anyhow::Error::new(err).context(format!("{} {}", human.message, human.suggestion))
}

fn run_scan(config: ClientConfig, args: ScanArgs) -> Result<()> {
    let request = ScanRequest::new(
        args.height,
        args.width,
        args.source.into(),
        args.format.into(),
        args.protocol.into(),
    )
    .map_err(explain)?;
    let device = DeviceAddress::new(args.device.host, args.device.port);
    let mut client = ScanClient::new(config).map_err(explain)?;

    let retry = RetryConfig {
        max_retries: args.retries,
        ..RetryConfig::default()
    };
    let image = with_retries(&retry, |attempt| {
        if attempt > 0 {
            info!(attempt, "retrying scan");
        }
        client.scan(&device, &request).map(|_| ())?;
        client.take_image().ok_or_else(|| {
            ScanwerkError::IncompleteTransfer {
                expected: None,
                received: 0,
            }
        })
    })
    .map_err(explain)?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("scan.{}", request.format().extension())));
    fs::write(&output, image.as_slice())
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!(
        "{} bytes written to {} (sha256 {})",
        image.len(),
        output.display(),
        image.sha256_hex()
    );
    Ok(())
}

fn run_probe(config: ClientConfig, args: DeviceArgs) -> Result<()> {
    let device = DeviceAddress::new(args.host, args.port);
    let client = ScanClient::new(config).map_err(explain)?;
    let result = client.probe(&device);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_print(config: ClientConfig, args: PrintArgs) -> Result<()> {
    let payload = match (&args.file, args.text) {
        (Some(path), _) => fs::read(path).with_context(|| format!("cannot read {}", path.display()))?,
        (None, Some(text)) => text.into_bytes(),
        (None, None) => bail!("either --file or --text is required"),
    };
    let device = DeviceAddress::new(args.host, args.port);
    let client = ScanClient::new(config).map_err(explain)?;

    debug!(bytes = payload.len(), %device, "sending raw payload");
    let reply = client.print(&device, &payload).map_err(explain)?;
    println!("{reply}");
    Ok(())
}

fn run_list(args: ListArgs) -> Result<()> {
    let raw = if args.services == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("cannot read services from stdin")?;
        raw
    } else {
        fs::read_to_string(&args.services)
            .with_context(|| format!("cannot read {}", args.services.display()))?
    };
    let services: Vec<DiscoveredService> =
        serde_json::from_str(&raw).context("services must be a JSON array of resolved records")?;
    println!("{}", listing_json(&services, args.mode.into()));
    Ok(())
}
