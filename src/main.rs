//! Purpose: `snmptable` CLI entry point and command dispatch bootstrap.
//! Role: Binary crate root; parses args, opens one session, emits JSON on stdout.
//! Invariants: Results are JSON on stdout (pretty on a TTY, compact otherwise).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use snmptable::api::{
    Client, Error, ErrorKind, Format, Schema, SessionConfig, SnapshotTransport, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `snmptable --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing(cli.debug);
    let color_mode = cli.color;
    let context = CommandContext {
        schema: cli.schema,
        snapshot: cli.snapshot,
        connection: cli.connection,
        format: cli.format,
        index_format: cli.index_format,
    };

    command_dispatch::dispatch_command(cli.command, &context)
        .map_err(add_transport_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter = if debug {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "snmptable",
    version,
    about = "Typed scalar and table reads over SNMP-style object trees",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Tables are rebuilt from one subtree walk per column; rows are keyed by their index.

Mental model:
  - `get` reads scalars or single column instances in one request
  - `table` walks the requested columns and merges them into rows
"#,
    after_help = r#"EXAMPLES
  $ snmptable --schema if-mib.json --snapshot router.json get sysDescr ifDescr.2
  $ snmptable --schema if-mib.json --snapshot router.json table ifTable --column ifDescr
  $ snmptable --schema if-mib.json --snapshot router.json table ifTable --index 2

LEARN MORE
  $ snmptable <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Schema file describing scalars and tables (JSON)",
        value_hint = ValueHint::FilePath
    )]
    schema: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Device snapshot to answer requests from (JSON)",
        value_hint = ValueHint::FilePath
    )]
    snapshot: Option<PathBuf>,
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(
        long,
        global = true,
        value_parser = parse_format,
        help = "Value formatting: none|raw|all|enum|enum-name|enum-value|bits|display|units (combine with ,)"
    )]
    format: Option<Format>,
    #[arg(
        long,
        global = true,
        value_parser = parse_format,
        help = "Formatting for decoded index values (default: none)"
    )]
    index_format: Option<Format>,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(long, global = true, help = "Log debug events to stderr")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct ConnectionArgs {
    #[arg(
        long,
        global = true,
        default_value = "127.0.0.1",
        help = "Agent address: host, host:port, or [v6]:port"
    )]
    target: String,
    #[arg(
        long = "version-proto",
        global = true,
        default_value = "v2c",
        value_enum,
        help = "Protocol version: v1|v2c|v3"
    )]
    proto: ProtoCli,
    #[arg(long, global = true, default_value = "public", help = "Community string (v1/v2c)")]
    community: String,
    #[arg(long, global = true, default_value = "", help = "Security name (v3)")]
    user: String,
    #[arg(
        long,
        global = true,
        default_value = "",
        help = "Authentication as <md5|sha>:<passphrase> (v3)"
    )]
    auth: String,
    #[arg(
        long = "priv",
        global = true,
        default_value = "",
        help = "Privacy as <des|aes>:<passphrase> (v3, requires --auth)"
    )]
    privacy: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ProtoCli {
    V1,
    V2c,
    V3,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Read scalars or single column instances in one request",
        long_about = r#"Read each named object with one batched request.

A name is either a scalar (`sysDescr`) or a column followed by its dotted
index (`ifDescr.2`). Any missing instance fails the whole request."#,
        after_help = r#"EXAMPLES
  $ snmptable --schema if-mib.json --snapshot router.json get sysDescr sysUpTime
  $ snmptable --schema if-mib.json --snapshot router.json --format none get ifOperStatus.1"#
    )]
    Get {
        #[arg(required = true, help = "Scalar names or column.index names")]
        names: Vec<String>,
    },
    #[command(
        about = "Walk a table and print its rows keyed by index",
        long_about = r#"Walk each requested column of a table and merge the leaves into rows.

Without --column every column the table declares is read. Each --index value
fixes the next index column; supplying all of them reads one row directly."#,
        after_help = r#"EXAMPLES
  $ snmptable --schema if-mib.json --snapshot router.json table ifTable
  $ snmptable --schema if-mib.json --snapshot router.json table ifTable --column ifDescr --column ifOperStatus
  $ snmptable --schema if-mib.json --snapshot router.json --index-format all table ifTable --index 2"#
    )]
    Table {
        #[arg(help = "Table name from the schema")]
        table: String,
        #[arg(long = "column", help = "Column to read (repeatable)")]
        columns: Vec<String>,
        #[arg(long = "index", help = "Leading index value (repeatable, in index order)")]
        index: Vec<String>,
    },
    #[command(
        about = "Print version info as JSON",
        after_help = r#"EXAMPLES
  $ snmptable version"#
    )]
    Version,
    #[command(
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ snmptable completion bash > ~/.local/share/bash-completion/completions/snmptable
  $ snmptable completion zsh > ~/.zfunc/_snmptable
  $ snmptable completion fish > ~/.config/fish/completions/snmptable.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

struct CommandContext {
    schema: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    connection: ConnectionArgs,
    format: Option<Format>,
    index_format: Option<Format>,
}

fn parse_format(text: &str) -> Result<Format, String> {
    Format::parse(text).ok_or_else(|| {
        format!("unknown format {text:?} (expected none, raw, all, enum, bits, display, units)")
    })
}

fn load_schema(path: Option<&Path>) -> Result<Schema, Error> {
    let Some(path) = path else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no schema given")
            .with_hint("Pass --schema <file> describing the objects to read."));
    };
    Schema::load(path)
}

fn session_config(args: &ConnectionArgs) -> Result<SessionConfig, Error> {
    match args.proto {
        ProtoCli::V1 => SessionConfig::v1(&args.target, &args.community),
        ProtoCli::V2c => SessionConfig::v2c(&args.target, &args.community),
        ProtoCli::V3 => SessionConfig::v3(&args.target, &args.user, &args.auth, &args.privacy),
    }
}

fn open_client(context: &CommandContext) -> Result<Client<SnapshotTransport>, Error> {
    let config = session_config(&context.connection)?;
    let Some(snapshot) = context.snapshot.as_deref() else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no agent to query")
            .with_hint("Pass --snapshot <file> with recorded agent leaves."));
    };
    let transport = SnapshotTransport::load(snapshot)?;
    let mut client = Client::new(config, transport);
    client.connect()?;
    Ok(client)
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("snmptable {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "snmptable",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Timeout => "request timed out".to_string(),
        ErrorKind::Auth => "authentication failed".to_string(),
        ErrorKind::Corrupt => "malformed response".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(oid) = err.oid() {
        inner.insert("oid".to_string(), json!(oid.to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(oid) = err.oid() {
        lines.push(format!(
            "{} {oid}",
            colorize_label("oid:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn add_transport_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Auth => err.with_hint("Check --community, or --user/--auth/--priv for v3."),
        ErrorKind::Corrupt => err.with_hint("The agent answered out of step; retry the request."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint("Re-run with --debug and report the output.")
}

#[cfg(test)]
mod tests {
    use super::{ColorMode, error_json, error_text, parse_format};
    use snmptable::api::{Error, ErrorKind, Format, Oid};

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::NotFound)
            .with_message("no such object")
            .with_hint("Check the schema.")
            .with_column("ifDescr");
        let plain = error_text(&err, false);
        assert_eq!(
            plain,
            "error: no such object\nhint: Check the schema.\ncolumn: ifDescr"
        );
        let colored = error_text(&err, true);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
        assert!(ColorMode::Always.use_color(false));
        assert!(!ColorMode::Never.use_color(true));
    }

    #[test]
    fn error_json_carries_column_and_oid() {
        let err = Error::new(ErrorKind::NotFound)
            .with_column("ifDescr")
            .with_oid(Oid::from_slice(&[1, 3, 6, 1]));
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "NotFound");
        assert_eq!(value["error"]["message"], "not found");
        assert_eq!(value["error"]["column"], "ifDescr");
        assert_eq!(value["error"]["oid"], "1.3.6.1");
    }

    #[test]
    fn format_flag_parses_names() {
        assert_eq!(parse_format("none"), Ok(Format::NONE));
        assert_eq!(parse_format("all"), Ok(Format::ALL));
        assert!(parse_format("bogus").is_err());
    }
}
