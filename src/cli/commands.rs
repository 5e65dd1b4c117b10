//! CLI command implementations
//!
//! Every command follows the same sequence:
//! 1. Load and validate the configuration
//! 2. Open the configured store backend
//! 3. Run one operation
//! 4. Close the store, even when the operation failed
//!
//! The operation's result is printed as a single JSON envelope on stdout.

use std::io::{self, BufRead};
use std::path::Path;

use serde_json::{json, Value};

use crate::collection::{Collection, OpContext};
use crate::observability::Logger;
use crate::selector::{Expr, Fields};
use crate::store::{DataStore, StoreConfig, StoreRegistry};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_documents, write_error, write_response};

/// Parse arguments, run the command and print the outcome
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let registry = StoreRegistry::with_defaults();
    let stdin = io::stdin();

    match run_command(&registry, cli.command, &mut stdin.lock()) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run one command against the store named by its configuration
pub fn run_command(
    registry: &StoreRegistry,
    cmd: Command,
    input: &mut dyn BufRead,
) -> CliResult<Value> {
    let config = load_config(config_path(&cmd))?;
    let store = registry.open(&config)?;
    let ctx = OpContext::background();

    let result = execute(store.as_ref(), &ctx, cmd, input);
    let closed = store.close(&ctx);

    let data = result?;
    closed?;
    Ok(data)
}

/// Load configuration and apply its log level
pub fn load_config(path: &Path) -> CliResult<StoreConfig> {
    let config = StoreConfig::load(path)?;
    Logger::set_min_severity(config.severity()?);
    Ok(config)
}

fn config_path(cmd: &Command) -> &Path {
    match cmd {
        Command::Create { config, .. }
        | Command::Put { config, .. }
        | Command::Get { config, .. }
        | Command::Delete { config, .. }
        | Command::Scan { config, .. }
        | Command::Count { config, .. }
        | Command::Status { config } => config,
    }
}

/// Run one command against an open store
pub fn execute(
    store: &dyn DataStore,
    ctx: &OpContext,
    cmd: Command,
    input: &mut dyn BufRead,
) -> CliResult<Value> {
    match cmd {
        Command::Create { collection, .. } => {
            let coll = store.create_collection(ctx, &collection)?;
            Ok(json!({"created": coll.name(), "type": coll.type_name()}))
        }
        Command::Put { collection, .. } => {
            let coll = store.collection(ctx, &collection)?;
            put(&coll, ctx, read_documents(input)?)
        }
        Command::Get { collection, id, .. } => {
            let coll = store.collection(ctx, &collection)?;
            let doc: Value = coll.get(ctx, &id)?;
            Ok(doc)
        }
        Command::Delete { collection, id, .. } => {
            let coll = store.collection(ctx, &collection)?;
            coll.delete(ctx, &id)?;
            Ok(json!({"deleted": id}))
        }
        Command::Scan {
            collection,
            prefix,
            filter,
            ..
        } => {
            let coll = store.collection(ctx, &collection)?;
            let selector = scan_selector(prefix, filter)?;
            scan(&coll, ctx, selector.as_ref())
        }
        Command::Count { collection, .. } => {
            let coll = store.collection(ctx, &collection)?;
            Ok(json!({"count": coll.count(ctx)?}))
        }
        Command::Status { .. } => Ok(serde_json::to_value(store.status(ctx)?)?),
    }
}

/// One document is a plain create; several go through one atomic batch.
fn put(coll: &Collection, ctx: &OpContext, docs: Vec<Value>) -> CliResult<Value> {
    let ids: Vec<String> = match docs.as_slice() {
        [doc] => vec![coll.create(ctx, doc)?.id],
        _ => coll
            .create_many(ctx, &docs)?
            .into_iter()
            .map(|result| result.id)
            .collect(),
    };
    Ok(json!({"written": ids.len(), "ids": ids}))
}

fn scan_selector(prefix: Option<String>, filter: Option<String>) -> CliResult<Option<Expr>> {
    if let Some(prefix) = prefix {
        return Ok(Some(Expr::prefix(crate::document::ID_FIELD, prefix)));
    }
    match filter {
        Some(filter) => {
            let value: Value = serde_json::from_str(&filter)
                .map_err(|e| CliError::invalid_input(format!("invalid filter JSON: {}", e)))?;
            Ok(Some(Expr::from_json(&value)?))
        }
        None => Ok(None),
    }
}

fn scan(coll: &Collection, ctx: &OpContext, selector: Option<&Expr>) -> CliResult<Value> {
    let mut cursor = match selector {
        Some(selector) => coll.select(ctx, selector, &Fields::all())?,
        None => coll.all(ctx)?,
    };
    let docs = cursor.collect_all::<Value>();
    cursor.close()?;
    Ok(Value::Array(docs?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let data = temp_dir.path().join("data");
        fs::create_dir(&data).unwrap();
        let config = temp_dir.path().join("aerostore.json");
        fs::write(
            &config,
            json!({"path": data, "log_level": "error"}).to_string(),
        )
        .unwrap();
        (temp_dir, config)
    }

    fn exec(cmd: Command, input: &str) -> CliResult<Value> {
        run_command(
            &StoreRegistry::with_defaults(),
            cmd,
            &mut Cursor::new(input.as_bytes().to_vec()),
        )
    }

    #[test]
    fn test_create_put_scan_count() {
        let (_temp_dir, config) = setup();

        let created = exec(
            Command::Create {
                collection: "users".into(),
                config: config.clone(),
            },
            "",
        )
        .unwrap();
        assert_eq!(created["created"], "users");

        let input = "{\"_id\": \"user:2\"}\n{\"_id\": \"order:1\"}\n{\"_id\": \"user:1\"}\n";
        let written = exec(
            Command::Put {
                collection: "users".into(),
                config: config.clone(),
            },
            input,
        )
        .unwrap();
        assert_eq!(written["written"], 3);

        let scanned = exec(
            Command::Scan {
                collection: "users".into(),
                prefix: Some("user:".into()),
                filter: None,
                config: config.clone(),
            },
            "",
        )
        .unwrap();
        let ids: Vec<&str> = scanned
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["_id"].as_str())
            .collect();
        assert_eq!(ids, vec!["user:1", "user:2"]);

        let counted = exec(
            Command::Count {
                collection: "users".into(),
                config: config.clone(),
            },
            "",
        )
        .unwrap();
        assert_eq!(counted["count"], 3);
    }

    #[test]
    fn test_filter_with_combinator_is_rejected() {
        let (_temp_dir, config) = setup();
        exec(
            Command::Create {
                collection: "users".into(),
                config: config.clone(),
            },
            "",
        )
        .unwrap();

        let err = exec(
            Command::Scan {
                collection: "users".into(),
                prefix: None,
                filter: Some(r#"{"$or": [{"_id": {"$prefix": "a"}}]}"#.into()),
                config: config.clone(),
            },
            "",
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "AERO_UNSUPPORTED_SELECTOR");
    }

    #[test]
    fn test_get_missing_document() {
        let (_temp_dir, config) = setup();
        exec(
            Command::Create {
                collection: "users".into(),
                config: config.clone(),
            },
            "",
        )
        .unwrap();

        let err = exec(
            Command::Get {
                collection: "users".into(),
                id: "nobody".into(),
                config: config.clone(),
            },
            "",
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "AERO_DOCUMENT_NOT_FOUND");
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config = temp_dir.path().join("missing.json");
        let err = exec(
            Command::Status {
                config: config.clone(),
            },
            "",
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_CONFIG_ERROR");
    }
}
