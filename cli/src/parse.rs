use std::path::PathBuf;

use settings_store::{Format, MergeStrategy};


/// A parsed `sst` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the value at a path, or the whole tree for an empty path.
    Get { path: String },
    /// Write a value. `value` is JSON text; anything that does not parse
    /// as JSON is stored as a plain string.
    Set { path: String, value: String },
    Remove { path: String },
    Reset,
    Export { format: Format },
    Import { file: PathBuf, strategy: MergeStrategy },
    /// Show what differs from the initial tree.
    Diff { json: bool },
    Dispatch { action: String, payload: Option<String> },
    Help,
}


/// Parse CLI arguments (without the program name) into a [`Command`].
pub fn parse_args(args: &[&str]) -> Result<Command, String> {
    if args.is_empty() {
        return Err("No command specified. Run 'sst help' for usage.".into());
    }

    match args[0] {
        "get" => parse_get(args),
        "set" => parse_set(args),
        "remove" | "rm" => parse_remove(args),
        "reset" => Ok(Command::Reset),
        "export" => parse_export(args),
        "import" => parse_import(args),
        "diff" => parse_diff(args),
        "dispatch" => parse_dispatch(args),
        "help" | "--help" | "-h" => Ok(Command::Help),
        _ => Err(format!("Unknown command: '{}'", args[0])),
    }
}

pub const USAGE: &str = "\
usage: sst <command> [args]

  get [path]                         print a value (whole tree if no path)
  set <path> <json>                  write a value
  remove <path>                      delete a key
  reset                              restore the initial tree
  export [--format json|yaml]        print the tree
  import <file> [--strategy replace|merge|skip-conflicts]
  diff [--json]                      changes since the initial tree
  dispatch <action> [json]           run a built-in action (toggle, increment)

environment:
  SST_CONFIG_DIR   config directory (default ~/.config/settings-store)
  SST_LOG          log filter (default from config, else warn)";


// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `sst get [path]`
fn parse_get(args: &[&str]) -> Result<Command, String> {
    let path = args.get(1).copied().unwrap_or_default();
    Ok(Command::Get { path: path.into() })
}

/// `sst set <path> <json>`
fn parse_set(args: &[&str]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("Usage: sst set <path> <json>".into());
    }
    Ok(Command::Set {
        path: args[1].into(),
        value: args[2..].join(" "),
    })
}

/// `sst remove <path>`
fn parse_remove(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: sst remove <path>".into());
    }
    Ok(Command::Remove {
        path: args[1].into(),
    })
}

/// `sst export [--format json|yaml]`
fn parse_export(args: &[&str]) -> Result<Command, String> {
    let mut format = Format::Json;
    let rest = &args[1..];
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--format" => {
                i += 1;
                format = take_arg(rest, i, "--format")?.parse()?;
            }
            "--yaml" => format = Format::Yaml,
            "--json" => format = Format::Json,
            other => return Err(format!("Unknown flag for export: '{}'", other)),
        }
        i += 1;
    }
    Ok(Command::Export { format })
}

/// `sst import <file> [--strategy <s>]`
fn parse_import(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: sst import <file> [--strategy replace|merge|skip-conflicts]".into());
    }
    let file = PathBuf::from(args[1]);
    let mut strategy = MergeStrategy::Replace;

    let rest = &args[2..];
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--strategy" => {
                i += 1;
                strategy = take_arg(rest, i, "--strategy")?.parse()?;
            }
            other => return Err(format!("Unknown flag for import: '{}'", other)),
        }
        i += 1;
    }
    Ok(Command::Import { file, strategy })
}

/// `sst diff [--json]`
fn parse_diff(args: &[&str]) -> Result<Command, String> {
    match args.get(1).copied() {
        None => Ok(Command::Diff { json: false }),
        Some("--json") => Ok(Command::Diff { json: true }),
        Some(other) => Err(format!("Unknown flag for diff: '{}'", other)),
    }
}

/// `sst dispatch <action> [json]`
fn parse_dispatch(args: &[&str]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("Usage: sst dispatch <action> [json]".into());
    }
    let payload = if args.len() > 2 {
        Some(args[2..].join(" "))
    } else {
        None
    };
    Ok(Command::Dispatch {
        action: args[1].into(),
        payload,
    })
}


fn take_arg(args: &[&str], index: usize, flag: &str) -> Result<String, String> {
    if index >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    Ok(args[index].into())
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_args() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn unknown_command() {
        assert!(parse_args(&["bogus"]).is_err());
    }

    #[test]
    fn get_with_and_without_path() {
        assert_eq!(
            parse_args(&["get", "editor.theme"]).unwrap(),
            Command::Get { path: "editor.theme".into() }
        );
        assert_eq!(parse_args(&["get"]).unwrap(), Command::Get { path: "".into() });
    }

    #[test]
    fn set_joins_value_words() {
        let cmd = parse_args(&["set", "greeting", "hello", "world"]).unwrap();
        assert_eq!(
            cmd,
            Command::Set {
                path: "greeting".into(),
                value: "hello world".into(),
            }
        );
    }

    #[test]
    fn set_missing_value() {
        assert!(parse_args(&["set", "a.b"]).is_err());
    }

    #[test]
    fn remove_and_alias() {
        let expected = Command::Remove { path: "a.b".into() };
        assert_eq!(parse_args(&["remove", "a.b"]).unwrap(), expected);
        assert_eq!(parse_args(&["rm", "a.b"]).unwrap(), expected);
        assert!(parse_args(&["remove"]).is_err());
    }

    #[test]
    fn export_formats() {
        assert_eq!(
            parse_args(&["export"]).unwrap(),
            Command::Export { format: Format::Json }
        );
        assert_eq!(
            parse_args(&["export", "--format", "yaml"]).unwrap(),
            Command::Export { format: Format::Yaml }
        );
        assert_eq!(
            parse_args(&["export", "--yaml"]).unwrap(),
            Command::Export { format: Format::Yaml }
        );
        assert!(parse_args(&["export", "--format"]).is_err());
        assert!(parse_args(&["export", "--format", "toml"]).is_err());
    }

    #[test]
    fn import_default_strategy() {
        let cmd = parse_args(&["import", "backup.json"]).unwrap();
        assert_eq!(
            cmd,
            Command::Import {
                file: PathBuf::from("backup.json"),
                strategy: MergeStrategy::Replace,
            }
        );
    }

    #[test]
    fn import_with_strategy() {
        let cmd = parse_args(&["import", "b.yaml", "--strategy", "skip-conflicts"]).unwrap();
        match cmd {
            Command::Import { strategy, .. } => assert_eq!(strategy, MergeStrategy::SkipConflicts),
            _ => panic!("Expected Import"),
        }
        assert!(parse_args(&["import", "b.yaml", "--strategy", "newest"]).is_err());
        assert!(parse_args(&["import"]).is_err());
    }

    #[test]
    fn diff_flags() {
        assert_eq!(parse_args(&["diff"]).unwrap(), Command::Diff { json: false });
        assert_eq!(parse_args(&["diff", "--json"]).unwrap(), Command::Diff { json: true });
        assert!(parse_args(&["diff", "--xml"]).is_err());
    }

    #[test]
    fn dispatch_with_payload() {
        let cmd = parse_args(&["dispatch", "increment", r#"{"path":"n","by":2}"#]).unwrap();
        assert_eq!(
            cmd,
            Command::Dispatch {
                action: "increment".into(),
                payload: Some(r#"{"path":"n","by":2}"#.into()),
            }
        );
        assert_eq!(
            parse_args(&["dispatch", "toggle"]).unwrap(),
            Command::Dispatch { action: "toggle".into(), payload: None }
        );
        assert!(parse_args(&["dispatch"]).is_err());
    }

    #[test]
    fn help() {
        assert_eq!(parse_args(&["help"]).unwrap(), Command::Help);
        assert_eq!(parse_args(&["-h"]).unwrap(), Command::Help);
    }
}
