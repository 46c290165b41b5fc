mod cli;
mod config;
mod storage;

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::Result;
use stash_store::{BackendKind, Notification, OptionsPatch, ReactiveStore, RemovalMode, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let backend = cli.backend.map(BackendKind::from);

    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        command => {
            let store = storage::store_from_config(&config)?;
            run(&store, command, backend)?
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("stash {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn run(store: &ReactiveStore, command: Command, backend: Option<BackendKind>) -> Result<()> {
    match command {
        Command::Get { key } => println!("{}", render(store.get(&key, backend)?.as_ref())?),
        Command::Set { key, value, json } => {
            let value = parse_value(value, json)?;
            store.set(&key, value, backend)?;
            info!(%key, "stored");
        }
        Command::Has { key } => println!("{}", store.has(&key, backend)?),
        Command::Remove { key } => store.remove(&key, backend)?,
        Command::Clear => store.clear(backend)?,
        Command::Trigger { keys } => {
            for line in trigger(store, &keys, backend)? {
                println!("{line}");
            }
        }
        Command::Keys => {
            for key in store.keys(backend)? {
                println!("{key}");
            }
        }
        Command::Health => {
            run_store_health(store)?;
            println!("Storage: ok");
        }
        // handled in main before a store is opened
        Command::Version | Command::Config(_) => {}
    }
    Ok(())
}

/// Text for a `get` result: raw text as-is, structured values pretty-printed.
fn render(value: Option<&Value>) -> Result<String> {
    Ok(match value {
        None => "(none)".to_string(),
        Some(Value::Text(text)) => text.clone(),
        Some(Value::Json(json)) => serde_json::to_string_pretty(json)?,
    })
}

fn parse_value(raw: String, json: bool) -> Result<Value> {
    if json {
        return Ok(Value::Json(serde_json::from_str(&raw)?));
    }
    Ok(Value::Text(raw))
}

/// Re-emit `keys` and collect one line per notification observed.
fn trigger(
    store: &ReactiveStore,
    keys: &[String],
    backend: Option<BackendKind>,
) -> Result<Vec<String>> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut subscriptions = Vec::with_capacity(keys.len());
    for key in keys {
        let tx = tx.clone();
        let key = key.clone();
        subscriptions.push(store.get_observer(&key, backend).subscribe(
            move |notification: &Notification| {
                // rx outlives every subscription, so the send cannot fail
                tx.send((key.clone(), notification.clone())).ok();
            },
        ));
    }
    drop(tx);

    let outcome = store.trigger_many(keys, backend);
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    outcome?;

    rx.into_iter()
        .map(|(key, notification)| -> Result<String> {
            Ok(format!("{key}: {}", render(notification.as_ref())?))
        })
        .collect()
}

/// Round-trips a sample value through the store and removes it again.
fn run_store_health(store: &ReactiveStore) -> Result<()> {
    let health_key = "health/check";
    let payload = Value::Text("ok".into());

    // Drop the sample's physical entry even when obfuscation is on.
    let removal = store.options().removal;
    store.configure(OptionsPatch::default().removal(RemovalMode::Physical));
    let outcome = round_trip(store, health_key, &payload);
    store.configure(OptionsPatch::default().removal(removal));

    if outcome? != Some(payload) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    Ok(())
}

fn round_trip(store: &ReactiveStore, key: &str, payload: &Value) -> Result<Option<Value>> {
    store.set(key, payload.clone(), None)?;
    let value = store.get(key, None)?;
    store.remove(key, None)?;
    Ok(value)
}
