//! CLI command implementations
//!
//! Boot sequence shared by `schema` and `exec`:
//! 1. Configuration load
//! 2. Catalog load from the schema directory
//! 3. Snapshot load and verification
//!
//! Any failure during boot ends the command. Once `exec` is serving,
//! a failing request produces an error response and the loop continues.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{course_platform_catalog, ddl, FieldType, SchemaCatalog, SchemaError};
use crate::store::{Database, Row, StoreError};

use super::args::Command;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{error_response, ok_response, parse_lines, write_line, write_response, write_text};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let name = match &cmd {
        Command::Init { .. } => "init",
        Command::Schema { .. } => "schema",
        Command::Ddl => "ddl",
        Command::Exec { .. } => "exec",
    };
    log_event_with_fields(Event::BootStart, &[("command", name)]);

    match cmd {
        Command::Init { config } => init(&config),
        Command::Schema { config } => schema(&config),
        Command::Ddl => ddl(),
        Command::Exec { config } => exec(&config),
    }
}

/// Initialize a new data directory
///
/// Creates:
/// - `<data_dir>/<schema_dir>/NN_<table>.json`, one per table
/// - `<data_dir>/<media_root>/<upload_to>` for every image column
/// - an empty snapshot
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;

    if is_initialized(&config) {
        return Err(CliError::already_initialized());
    }

    let catalog = course_platform_catalog()?;

    let dirs = std::iter::once(config.schema_path()).chain(media_dirs(&config, &catalog));
    for dir in dirs {
        fs::create_dir_all(&dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    catalog.save_to_dir(&config.schema_path())?;
    Database::new(catalog.clone()).save(&config.snapshot_path())?;

    log_event_with_fields(
        Event::Initialized,
        &[
            ("data_dir", &config.data_dir),
            ("tables", &catalog.table_count().to_string()),
        ],
    );

    write_response(json!({
        "initialized": true,
        "tables": catalog.tables().map(|t| t.name.as_str()).collect::<Vec<_>>()
    }))
}

/// Print the catalog stored in the data directory
pub fn schema(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let catalog = load_catalog(&config)?;

    let tables: Vec<_> = catalog.tables().collect();
    write_response(serde_json::to_value(tables)?)
}

/// Print SQL DDL for the built-in course platform catalog
pub fn ddl() -> CliResult<()> {
    let catalog = course_platform_catalog()?;
    write_text(&ddl::render_catalog(&catalog))
}

/// Serve JSON requests from stdin until EOF
pub fn exec(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let mut session = Session::open(&config)?;

    session.serve(io::stdin().lock(), &mut io::stdout())?;
    Ok(())
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("path", &config_path.display().to_string())],
    );
    Ok(config)
}

fn load_catalog(config: &Config) -> CliResult<SchemaCatalog> {
    if !is_initialized(config) {
        return Err(CliError::not_initialized());
    }

    let catalog = SchemaCatalog::load_from_dir(&config.schema_path())?;
    log_event_with_fields(
        Event::CatalogLoaded,
        &[("tables", &catalog.table_count().to_string())],
    );
    Ok(catalog)
}

fn is_initialized(config: &Config) -> bool {
    config.snapshot_path().exists()
}

fn media_dirs(config: &Config, catalog: &SchemaCatalog) -> Vec<PathBuf> {
    let root = config.media_path();
    catalog
        .tables()
        .flat_map(|t| t.fields.iter())
        .filter_map(|f| match &f.field_type {
            FieldType::Image { upload_to, .. } => Some(root.join(upload_to)),
            _ => None,
        })
        .collect()
}

/// One `exec` request, tagged by `op`
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Request {
    Insert { table: String, row: Value },
    Update { table: String, id: i64, patch: Value },
    Delete { table: String, id: i64 },
    Get { table: String, id: i64 },
    List { table: String },
    Related { table: String, id: i64, relation: String },
    DescribeSubscription { id: i64 },
    SubscriptionEmail { id: i64 },
}

impl Request {
    /// Whether a successful request changed the store
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::Insert { .. } | Request::Update { .. } | Request::Delete { .. }
        )
    }
}

/// A request failure reported back to the caller
#[derive(Debug)]
pub enum RequestError {
    Invalid(String),
    Store(StoreError),
}

impl RequestError {
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::Invalid(_) => CliErrorCode::InvalidRequest.code(),
            RequestError::Store(e) => e.code(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            RequestError::Invalid(msg) => msg.clone(),
            RequestError::Store(e) => e.to_string(),
        }
    }
}

impl From<StoreError> for RequestError {
    fn from(e: StoreError) -> Self {
        RequestError::Store(e)
    }
}

impl From<SchemaError> for RequestError {
    fn from(e: SchemaError) -> Self {
        RequestError::Store(e.into())
    }
}

/// A booted store plus where to persist it
pub struct Session {
    db: Database,
    snapshot_path: PathBuf,
    sync_on_write: bool,
    dirty: bool,
}

impl Session {
    /// Boots the store described by `config`
    pub fn open(config: &Config) -> CliResult<Self> {
        let catalog = load_catalog(config)?;
        let snapshot_path = config.snapshot_path();
        let db = Database::open(catalog, &snapshot_path)
            .map_err(|e| CliError::boot_failed(format!("Snapshot load failed: {}", e)))?;

        Ok(Self {
            db,
            snapshot_path,
            sync_on_write: config.sync_on_write,
            dirty: false,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Answers every request in `input`, one response line each.
    ///
    /// Returns the number of requests handled. Unsaved writes are flushed
    /// when the loop ends, whether input ran out or reading failed.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> CliResult<usize> {
        let served = self.answer_all(input, out);
        let flushed = self.flush();

        let handled = served?;
        flushed?;
        Ok(handled)
    }

    fn answer_all<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> CliResult<usize> {
        let mut handled = 0;

        for line in parse_lines(input) {
            let response = match line {
                Ok(value) => self.handle_value(value)?,
                Err(e) if e.code() == &CliErrorCode::InvalidRequest => {
                    error_response(e.code_str(), e.message())
                }
                Err(e) => return Err(e),
            };
            write_line(out, &response)?;
            handled += 1;
        }

        Ok(handled)
    }

    /// Handles one parsed request and returns the response body.
    ///
    /// Only persistence failures are returned as errors.
    pub fn handle_value(&mut self, value: Value) -> CliResult<Value> {
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                let err = RequestError::Invalid(format!("Invalid request: {}", e));
                return Ok(error_response(err.code(), &err.message()));
            }
        };

        let is_write = request.is_write();
        match execute(&mut self.db, request) {
            Ok(data) => {
                if is_write {
                    self.dirty = true;
                    if self.sync_on_write {
                        self.flush()?;
                    }
                }
                Ok(ok_response(data))
            }
            Err(e) => Ok(error_response(e.code(), &e.message())),
        }
    }

    /// Writes the snapshot if anything changed since the last save
    pub fn flush(&mut self) -> CliResult<()> {
        if self.dirty {
            self.db.save(&self.snapshot_path)?;
            self.dirty = false;
        }
        Ok(())
    }
}

/// Runs one request against the store
pub fn execute(db: &mut Database, request: Request) -> Result<Value, RequestError> {
    let data = match request {
        Request::Insert { table, row } => Value::Object(db.insert_row(&table, row)?),
        Request::Update { table, id, patch } => Value::Object(db.update_row(&table, id, patch)?),
        Request::Delete { table, id } => {
            let summary = db.delete(&table, id)?;
            serde_json::to_value(summary).map_err(|e| StoreError::Decode {
                table: table.clone(),
                reason: e.to_string(),
            })?
        }
        Request::Get { table, id } => Value::Object(db.get_row(&table, id)?),
        Request::List { table } => rows_value(db.list_rows(&table)?),
        Request::Related {
            table,
            id,
            relation,
        } => rows_value(db.related_rows(&table, id, &relation)?),
        Request::DescribeSubscription { id } => {
            let view = db.subscription_view(id)?;
            json!({ "id": id, "description": view.describe() })
        }
        Request::SubscriptionEmail { id } => {
            let view = db.subscription_view(id)?;
            json!({ "id": id, "email": view.get_user_email() })
        }
    };

    Ok(data)
}

fn rows_value(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_config(temp_dir: &TempDir) -> PathBuf {
        let config_path = temp_dir.path().join("coursebase.json");
        let data_dir = temp_dir.path().join("data");

        let config = json!({
            "data_dir": data_dir.to_string_lossy()
        });

        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_init_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        let data_dir = temp_dir.path().join("data");

        init(&config_path).unwrap();

        assert!(data_dir.join("coursebase.snapshot.json").exists());
        assert!(data_dir.join("schemas").join("00_user.json").exists());
        assert!(data_dir.join("schemas").join("04_payment.json").exists());
        assert!(data_dir.join("media").join("courses/photo").is_dir());
        assert!(data_dir.join("media").join("lessons/photo").is_dir());
    }

    #[test]
    fn test_init_refuses_reinit() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        init(&config_path).unwrap();

        let result = init(&config_path);
        assert_eq!(
            result.unwrap_err().code(),
            &CliErrorCode::AlreadyInitialized
        );
    }

    #[test]
    fn test_exec_requires_init() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);

        let config = Config::load(&config_path).unwrap();
        let result = Session::open(&config);
        assert_eq!(result.err().unwrap().code(), &CliErrorCode::NotInitialized);
    }

    fn session(temp_dir: &TempDir) -> Session {
        let config_path = create_config(temp_dir);
        init(&config_path).unwrap();
        Session::open(&Config::load(&config_path).unwrap()).unwrap()
    }

    #[test]
    fn test_serve_writes_one_response_per_request() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir);

        let input = [
            json!({"op": "insert", "table": "user", "row": {"email": "a@x.com"}}),
            json!({"op": "insert", "table": "course", "row": {"name": "Rust", "owner": 1}}),
            json!({"op": "list", "table": "course"}),
            json!({"op": "drop", "table": "course"}),
        ]
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n");

        let mut out = Vec::new();
        let handled = session.serve(input.as_bytes(), &mut out).unwrap();
        assert_eq!(handled, 4);

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["data"]["id"], 1);
        assert_eq!(lines[1]["data"]["owner"], 1);
        assert_eq!(lines[2]["data"].as_array().unwrap().len(), 1);
        assert_eq!(lines[3]["status"], "error");
        assert_eq!(lines[3]["code"], "COURSE_CLI_INVALID_REQUEST");
    }

    #[test]
    fn test_constraint_failure_is_a_response() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir);

        let response = session
            .handle_value(json!({"op": "insert", "table": "course", "row": {"name": "Rust", "owner": 7}}))
            .unwrap();
        assert_eq!(response["status"], "error");
        assert_eq!(response["code"], "COURSE_DANGLING_REFERENCE");
    }

    #[test]
    fn test_delete_response_lists_affected_rows() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = session(&temp_dir);

        session
            .handle_value(json!({"op": "insert", "table": "user", "row": {"email": "a@x.com"}}))
            .unwrap();
        session
            .handle_value(json!({"op": "insert", "table": "course", "row": {"name": "Rust", "owner": 1}}))
            .unwrap();

        let response = session
            .handle_value(json!({"op": "delete", "table": "user", "id": 1}))
            .unwrap();
        assert_eq!(response["status"], "ok");
        assert_eq!(response["data"]["deleted"], json!([{"table": "user", "id": 1}]));
        assert_eq!(
            response["data"]["nulled"],
            json!([{"table": "course", "id": 1, "field": "owner"}])
        );

        // An unencodable summary surfaces as a store failure, not a bad request.
        let err = RequestError::from(StoreError::Decode {
            table: "user".into(),
            reason: "unencodable".into(),
        });
        assert_eq!(err.code(), "COURSE_DECODE_FAILED");
    }

    #[test]
    fn test_writes_are_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config(&temp_dir);
        init(&config_path).unwrap();
        let config = Config::load(&config_path).unwrap();

        let mut session = Session::open(&config).unwrap();
        session
            .handle_value(json!({"op": "insert", "table": "user", "row": {"email": "a@x.com"}}))
            .unwrap();

        let reopened = Session::open(&config).unwrap();
        assert_eq!(reopened.database().row_count("user").unwrap(), 1);
    }

    fn deferred_config(temp_dir: &TempDir) -> Config {
        let config_path = temp_dir.path().join("coursebase.json");
        let config = json!({
            "data_dir": temp_dir.path().join("data").to_string_lossy(),
            "sync_on_write": false
        });
        fs::write(&config_path, config.to_string()).unwrap();

        init(&config_path).unwrap();
        Config::load(&config_path).unwrap()
    }

    fn insert_user_line(email: &str) -> Vec<u8> {
        let mut line = json!({"op": "insert", "table": "user", "row": {"email": email}})
            .to_string()
            .into_bytes();
        line.push(b'\n');
        line
    }

    #[test]
    fn test_deferred_writes_saved_at_end_of_input() {
        let temp_dir = TempDir::new().unwrap();
        let config = deferred_config(&temp_dir);

        let mut session = Session::open(&config).unwrap();
        let mut input = insert_user_line("a@x.com");
        input.extend(insert_user_line("b@x.com"));

        let mut out = Vec::new();
        assert_eq!(session.serve(input.as_slice(), &mut out).unwrap(), 2);

        let reopened = Session::open(&config).unwrap();
        assert_eq!(reopened.database().row_count("user").unwrap(), 2);
    }

    #[test]
    fn test_undecodable_line_is_a_response() {
        let temp_dir = TempDir::new().unwrap();
        let config = deferred_config(&temp_dir);

        let mut session = Session::open(&config).unwrap();
        let mut input = insert_user_line("a@x.com");
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend(insert_user_line("b@x.com"));

        let mut out = Vec::new();
        assert_eq!(session.serve(input.as_slice(), &mut out).unwrap(), 3);

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[1]["code"], "COURSE_CLI_INVALID_REQUEST");
        assert_eq!(lines[2]["status"], "ok");

        let reopened = Session::open(&config).unwrap();
        assert_eq!(reopened.database().row_count("user").unwrap(), 2);
    }

    struct BrokenPipe;

    impl io::Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed"))
        }
    }

    #[test]
    fn test_read_failure_still_saves_answered_writes() {
        let temp_dir = TempDir::new().unwrap();
        let config = deferred_config(&temp_dir);

        let mut session = Session::open(&config).unwrap();
        let input = io::BufReader::new(io::Read::chain(
            io::Cursor::new(insert_user_line("a@x.com")),
            BrokenPipe,
        ));

        let mut out = Vec::new();
        let err = session.serve(input, &mut out).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::IoError);

        let answered: Value = serde_json::from_slice(out.split(|b| *b == b'\n').next().unwrap()).unwrap();
        assert_eq!(answered["status"], "ok");

        let reopened = Session::open(&config).unwrap();
        assert_eq!(reopened.database().row_count("user").unwrap(), 1);
    }
}
