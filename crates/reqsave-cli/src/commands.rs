use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use reqsave_archive::{ArchiveEntry, ArchiveReader, BODY_NAMESPACE};
use reqsave_server::{ReqSaveServer, ServerConfig};

use crate::cli::{Cli, Command, ConfigArgs, InspectArgs, OutputFormat, ServeArgs};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Inspect(args) => cmd_inspect(args, cli.format),
        Command::Config(args) => cmd_config(args, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let server = ReqSaveServer::new(config).context("building saver from configuration")?;
    info!(
        bind_addr = %server.config().bind_addr,
        sink = ?server.config().sink,
        limiter = server.config().limiter.is_some(),
        "starting reqsave"
    );
    server.serve().await?;
    Ok(())
}

fn cmd_config(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => {
            println!("bind_addr:          {}", config.bind_addr.to_string().bold());
            println!("body_limit:         {}", config.body_limit);
            println!("oversize:           {:?}", config.oversize);
            println!("write_error_policy: {:?}", config.write_error_policy);
            println!("serialize_saves:    {}", config.serialize_saves);
            println!("sink:               {}", format!("{:?}", config.sink).cyan());
            match config.limiter {
                Some(limiter) => println!("limiter:            {}", format!("{limiter:?}").yellow()),
                None => println!("limiter:            {}", "none".dimmed()),
            }
        }
    }
    Ok(())
}

/// One archive entry as printed by `inspect --format json`.
#[derive(Debug, PartialEq, Eq, Serialize)]
struct EntryView {
    path: String,
    mode: String,
    size: usize,
    /// UTF-8 content, or `None` when the bytes are not text.
    text: Option<String>,
    hex: String,
}

impl From<&ArchiveEntry> for EntryView {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            path: entry.path.clone(),
            mode: format!("{:o}", entry.mode),
            size: entry.content.len(),
            text: std::str::from_utf8(&entry.content).ok().map(str::to_owned),
            hex: hex::encode(&entry.content),
        }
    }
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
    let reader = ArchiveReader::from_bytes(&bytes).with_context(|| format!("decoding {}", args.file.display()))?;

    match format {
        OutputFormat::Json => {
            let views: Vec<EntryView> = reader.entries().iter().map(EntryView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        OutputFormat::Text => {
            println!("{} ({} entries, {} bytes)", args.file.display().to_string().bold(), reader.len(), bytes.len());
            for entry in reader.entries() {
                print_entry(entry, args.hex);
            }
        }
    }
    Ok(())
}

fn print_entry(entry: &ArchiveEntry, as_hex: bool) {
    if entry.namespace() == BODY_NAMESPACE {
        println!("{} {}", "body".cyan().bold(), format!("({} bytes)", entry.content.len()).dimmed());
        if as_hex {
            println!("{}", hex::encode(&entry.content));
        } else {
            println!("{}", String::from_utf8_lossy(&entry.content));
        }
    } else {
        println!("{}: {}", entry.name().yellow(), String::from_utf8_lossy(&entry.content));
    }
}
