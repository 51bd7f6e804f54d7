mod client;
mod output;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use telesink_core::config::Config;
use telesink_core::model::{Payload, StorageKind};
use telesink_ingest::pipeline::FlushLoop;
use telesink_ingest::{AppState, HttpSettings, server};
use telesink_store::Store;
use tokio::io::AsyncReadExt;

use crate::client::{ApiClient, drain_frames, resolve_addr};
use crate::output::{print_payload_human, print_record, print_send_result};
use crate::telemetry::{init_cli_tracing, init_run_tracing, shutdown_tracing};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "telesink")]
#[command(about = "Minimal HTTP telemetry sink")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Print raw JSON instead of formatted lines")]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the HTTP sink")]
    Run(RunArgs),
    #[command(about = "Follow new records as they arrive")]
    Tail {
        #[arg(long)]
        addr: Option<String>,
    },
    #[command(about = "Post a JSON payload; reads stdin when none is given")]
    Send {
        #[arg(long)]
        addr: Option<String>,
        #[arg(long, default_value = "/api/data")]
        path: String,
        payload: Option<String>,
    },
    #[command(about = "Show the newest record's data")]
    Latest {
        #[arg(long)]
        addr: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long)]
    http_addr: Option<String>,
    #[arg(long)]
    storage: Option<StorageKind>,
    #[arg(long)]
    data_file: Option<PathBuf>,
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    machine_id: Option<String>,
}

impl RunArgs {
    fn apply(self, cfg: &mut Config) {
        if let Some(v) = self.http_addr {
            cfg.http_addr = v;
        }
        if let Some(v) = self.storage {
            cfg.storage = v;
        }
        if let Some(v) = self.data_file {
            cfg.data_file = v;
        }
        if let Some(v) = self.database_url {
            cfg.database_url = v;
        }
        if let Some(v) = self.machine_id {
            cfg.machine_id = v;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Tail { addr } => {
            init_cli_tracing();
            let client = ApiClient::new(&resolve_addr(addr));
            tokio::select! {
                res = run_tail(&client, cli.json) => res,
                _ = tokio::signal::ctrl_c() => Ok(()),
            }
        }
        Commands::Send {
            addr,
            path,
            payload,
        } => {
            init_cli_tracing();
            let raw = match payload {
                Some(raw) => raw,
                None => read_stdin().await?,
            };
            let payload = parse_payload(&raw)?;
            let client = ApiClient::new(&resolve_addr(addr));
            let body = client.send(&path, &payload).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print_send_result(&body);
            }
            Ok(())
        }
        Commands::Latest { addr } => {
            init_cli_tracing();
            let client = ApiClient::new(&resolve_addr(addr));
            match client.latest().await? {
                Some(data) if cli.json => println!("{}", serde_json::to_string_pretty(&data)?),
                Some(data) => print_payload_human(&data),
                None => eprintln!("no data yet"),
            }
            Ok(())
        }
    }
}

async fn run_server(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    args.apply(&mut cfg);
    cfg.validate().context("invalid configuration")?;

    init_run_tracing();

    let addr: SocketAddr = cfg
        .http_addr
        .parse()
        .with_context(|| format!("invalid http address {}", cfg.http_addr))?;
    let store = Store::open(&cfg).context("open storage")?;

    eprintln!("telesink run");
    eprintln!("  http: {addr}");
    eprintln!("  storage: {}", cfg.storage);
    match cfg.storage {
        StorageKind::File => eprintln!("  data file: {}", cfg.data_file.display()),
        StorageKind::Database => eprintln!("  database: {}", cfg.database_url),
        StorageKind::Sheet => eprintln!(
            "  spreadsheet: {} (insert={}, buffered={})",
            cfg.sheet_id.as_deref().unwrap_or(&cfg.sheet_name),
            cfg.sheet_insert,
            cfg.sheet_buffered
        ),
        StorageKind::Memory => {}
    }
    eprintln!("  machine id: {}", cfg.machine_id);
    eprintln!("  dashboard: http://{addr}/dashboard");

    let listener = server::bind(addr).await?;
    let flush = FlushLoop::spawn(store.clone(), cfg.flush_interval);
    let state = AppState::new(store, HttpSettings::from_config(&cfg));
    let server_task = tokio::spawn(server::serve(listener, state));

    let outcome = tokio::select! {
        res = server_task => match res {
            Ok(inner) => inner.context("http server stopped"),
            Err(e) => Err(anyhow::anyhow!("http server task failed: {e}")),
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            Ok(())
        }
    };

    if let Some(flush) = flush {
        flush.shutdown().await;
    }
    shutdown_tracing();
    outcome
}

async fn run_tail(client: &ApiClient, json: bool) -> anyhow::Result<()> {
    let mut last_seen = None;
    let mut connected_once = false;
    loop {
        let mut response = match client.stream(last_seen).await {
            Ok(response) => response,
            Err(e) if connected_once => {
                tracing::warn!(error = %e, "stream unavailable, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
            Err(e) => return Err(e),
        };
        connected_once = true;

        let mut buffer = Vec::new();
        loop {
            let chunk = match response.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "stream interrupted");
                    break;
                }
            };
            buffer.extend_from_slice(&chunk);
            for event in drain_frames(&mut buffer) {
                last_seen = Some(event.seq);
                if json {
                    println!("{}", serde_json::to_string(&event.record)?);
                } else {
                    print_record(&event.record);
                }
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn read_stdin() -> anyhow::Result<String> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("read payload from stdin")?;
    Ok(raw)
}

fn parse_payload(raw: &str) -> anyhow::Result<Payload> {
    if raw.trim().is_empty() {
        return Ok(Payload::new());
    }
    match serde_json::from_str::<Value>(raw).context("payload is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("payload must be a JSON object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_must_be_an_object() {
        assert!(parse_payload("").unwrap().is_empty());
        assert_eq!(parse_payload(r#"{"temp": 3}"#).unwrap()["temp"], 3);
        assert!(parse_payload("[1]").is_err());
        assert!(parse_payload("{oops").is_err());
    }

    #[test]
    fn run_flags_override_config() {
        let mut cfg = Config::default();
        RunArgs {
            http_addr: Some("127.0.0.1:9999".into()),
            storage: Some(StorageKind::Memory),
            machine_id: Some("press-2".into()),
            ..RunArgs::default()
        }
        .apply(&mut cfg);
        assert_eq!(cfg.http_addr, "127.0.0.1:9999");
        assert_eq!(cfg.storage, StorageKind::Memory);
        assert_eq!(cfg.machine_id, "press-2");
        assert_eq!(cfg.data_file, PathBuf::from("data_store.jsonl"));
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["telesink", "send", "--path", "/process", "{}"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Send { path, payload: Some(_), .. } if path == "/process"
        ));

        let cli = Cli::try_parse_from(["telesink", "run", "--storage", "database"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run(RunArgs { storage: Some(StorageKind::Database), .. })
        ));
    }
}
