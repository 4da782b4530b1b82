//! sst: command-line front end for a file-backed settings store.
//!
//! # Usage
//!
//! ```text
//! sst get editor.theme
//! sst set editor.tab_size 4
//! sst import backup.json --strategy skip-conflicts
//! sst export --format yaml
//! sst dispatch toggle editor.wrap
//! ```

mod actions;
mod parse;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use settings_store::{
    Change, FileStore, Format, ImportOptions, Store, StoreConfig, Value,
};
use tracing_subscriber::EnvFilter;

use parse::{parse_args, Command, USAGE};


fn main() {
    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    let cmd = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("sst: {}", e);
            process::exit(1);
        }
    };

    if cmd == Command::Help {
        println!("{}", USAGE);
        return;
    }

    let config_dir = resolve_config_dir();
    let config = match StoreConfig::load_from_dir(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sst: {}", e);
            process::exit(1);
        }
    };
    init_logging(&config.log_level);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("sst: failed to start runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(run(&config_dir, &config, cmd));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(message) => {
            eprintln!("sst error: {}", message);
            process::exit(1);
        }
    }
}


fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SST_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("settings-store")
}

/// Log to stderr. `SST_LOG` overrides the configured level.
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env("SST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}


/// Build a store over the configured state file.
///
/// The file is read once up front so that a corrupt state file is
/// reported instead of being overwritten by the next write.
fn open_store(config_dir: &Path, config: &StoreConfig) -> Result<Store, String> {
    let state_file = config.resolve_state_file(config_dir);
    let persistence = FileStore::new(&state_file, config.format);
    persistence
        .read()
        .map_err(|e| format!("cannot read {}: {}", state_file.display(), e))?;
    tracing::debug!(state_file = %state_file.display(), format = %config.format, "opening store");

    let builder = Store::builder(config.initial_state()).persistence(Arc::new(persistence));
    Ok(actions::register(builder).build())
}


/// Open the store, run one command and wait for the state file write.
async fn run(config_dir: &Path, config: &StoreConfig, cmd: Command) -> Result<String, String> {
    let store = open_store(config_dir, config)?;
    let output = execute(&store, cmd).await;
    store.settled().await;
    output
}

async fn execute(store: &Store, cmd: Command) -> Result<String, String> {
    match cmd {
        Command::Get { path } => match store.get(&path) {
            Some(value) => render(&value),
            None => Err(format!("no value at '{}'", path)),
        },

        Command::Set { path, value } => {
            if path.trim().is_empty() {
                return Err("path must not be empty".into());
            }
            let value = parse_value(&value);
            let shown = value.to_string();
            if store.set(&path, value) {
                Ok(format!("{} = {}", path, shown))
            } else {
                Ok(format!("{} unchanged", path))
            }
        }

        Command::Remove { path } => {
            if store.remove(&path) {
                Ok(format!("removed {}", path))
            } else {
                Ok(format!("nothing at {}", path))
            }
        }

        Command::Reset => {
            if store.reset() {
                Ok("reset to initial state".into())
            } else {
                Ok("already at initial state".into())
            }
        }

        Command::Export { format } => store.export_with(&format).map_err(|e| e.to_string()),

        Command::Import { file, strategy } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;
            let codec = Format::from_extension(&file);
            let options = ImportOptions::new().strategy(strategy).codec(&codec);
            let outcome = store
                .import_settings(text, options)
                .map_err(|e| e.to_string())?;

            let mut out = if outcome.changed {
                format!("imported {} ({})", file.display(), outcome.strategy)
            } else {
                format!("no changes from {} ({})", file.display(), outcome.strategy)
            };
            for path in &outcome.conflicts {
                let _ = write!(out, "\n  kept local value at {}", path);
            }
            Ok(out)
        }

        Command::Diff { json } => {
            let diff = store.diff_from_initial();
            if json {
                return serde_json::to_string_pretty(&diff).map_err(|e| e.to_string());
            }
            let mut out = String::new();
            for change in &diff.changes {
                let _ = match change {
                    Change::Added { path, value } => writeln!(out, "+ {} = {}", path, value),
                    Change::Removed { path, value } => writeln!(out, "- {} (was {})", path, value),
                    Change::Changed { path, old, new } => {
                        writeln!(out, "~ {}: {} -> {}", path, old, new)
                    }
                };
            }
            out.push_str(&diff.summary());
            Ok(out)
        }

        Command::Dispatch { action, payload } => {
            if !store.has_action(&action) {
                return Err(format!(
                    "no such action: {} (available: {})",
                    action,
                    actions::NAMES.join(", ")
                ));
            }
            let payload = payload.as_deref().map(parse_value).unwrap_or(Value::Null);
            let result = store
                .dispatch(&action, payload)
                .await
                .map_err(|e| e.to_string())?;
            render(&result)
        }

        Command::Help => Ok(USAGE.into()),
    }
}

/// JSON text, or the text itself when it is not valid JSON.
fn parse_value(text: &str) -> Value {
    serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::from(text))
}

fn render(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => serde_json::to_string_pretty(other).map_err(|e| e.to_string()),
    }
}
