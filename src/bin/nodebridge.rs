use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use nodebridge_lib::{
    BridgeConfig, HostConfig, LocalEmitter, NodeBridge, StartOptions, StdioBridge, MESSAGE_EVENT,
};

enum Program {
    Entry(String),
    Script(String),
}

struct CliOptions {
    host: Option<HostConfig>,
    program: Option<Program>,
    listen: Vec<String>,
    posts: Vec<(String, Vec<Value>)>,
    listen_secs: u64,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    if let Err(error) = run().await {
        eprintln!("nodebridge failed: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let mut config = BridgeConfig::from_env().map_err(|e| e.to_string())?;
    let Some(options) = parse_args(config.host.clone())? else {
        return Ok(());
    };
    nodebridge_lib::init_tracing(&config.log_filter);

    config.host = options.host;
    let host = config
        .host
        .clone()
        .ok_or_else(|| "no bridge host configured; pass --host or set NODEBRIDGE_HOST_COMMAND".to_string())?;
    let program = options
        .program
        .ok_or_else(|| "either --entry or --script is required".to_string())?;

    let bridge = Arc::new(StdioBridge::spawn(&host).map_err(|e| e.to_string())?);
    let node = NodeBridge::new(bridge.clone(), &config).map_err(|e| e.to_string())?;

    let mut events = options.listen;
    if events.is_empty() {
        events.push(MESSAGE_EVENT.to_string());
    }
    for event in events {
        let name = event.clone();
        node.channel().subscribe(&event, move |args| {
            println!("{name} {}", Value::Array(args.to_vec()));
        });
    }

    let started = match program {
        Program::Entry(file) => node.engine().start_async(file, StartOptions::new()).await,
        Program::Script(script) => {
            node.engine()
                .start_with_script_async(script, StartOptions::new())
                .await
        }
    };
    started.map_err(|e| e.to_string())?;

    for (event, args) in &options.posts {
        node.channel().post(event, args).map_err(|e| e.to_string())?;
    }

    tokio::time::sleep(Duration::from_secs(options.listen_secs)).await;
    bridge.shutdown().await.map_err(|e| e.to_string())?;
    Ok(())
}

fn parse_args(default_host: Option<HostConfig>) -> Result<Option<CliOptions>, String> {
    let mut host_command: Option<String> = None;
    let mut host_args: Vec<String> = Vec::new();
    let mut options = CliOptions {
        host: None,
        program: None,
        listen: Vec::new(),
        posts: Vec::new(),
        listen_secs: 5,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--host" => host_command = Some(value_for("--host")?),
            "--host-arg" => host_args.push(value_for("--host-arg")?),
            "--entry" => options.program = Some(Program::Entry(value_for("--entry")?)),
            "--script" => options.program = Some(Program::Script(value_for("--script")?)),
            "--on" => options.listen.push(value_for("--on")?),
            "--post" => options.posts.push(parse_post(&value_for("--post")?)?),
            "--listen-secs" => {
                let raw = value_for("--listen-secs")?;
                options.listen_secs = raw
                    .parse()
                    .map_err(|_| format!("--listen-secs expects a number, got '{raw}'"))?;
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    options.host = match host_command {
        Some(command) => Some(HostConfig::new(command).with_args(host_args)),
        None => default_host,
    };
    Ok(Some(options))
}

fn parse_post(raw: &str) -> Result<(String, Vec<Value>), String> {
    let (event, args) = raw.split_once('=').unwrap_or((raw, "[]"));
    if event.is_empty() {
        return Err(format!("--post needs an event name: '{raw}'"));
    }
    match serde_json::from_str::<Value>(args) {
        Ok(Value::Array(items)) => Ok((event.to_string(), items)),
        Ok(_) => Err(format!("--post arguments for '{event}' must be a JSON array")),
        Err(e) => Err(format!("invalid JSON arguments for '{event}': {e}")),
    }
}

fn print_help() {
    println!(
        "nodebridge --host <cmd> [--host-arg <arg>]... (--entry <file> | --script <text>)\n\
         \x20          [--on <event>]... [--post <event>=<json-array>]... [--listen-secs <n>]\n\n\
         Starts the engine through a stdio bridge host, prints events received on the\n\
         default channel and posts the given events to it."
    );
}
