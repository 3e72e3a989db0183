//! Purpose: `jsonable` CLI entry point: load schema files, decode documents, report releases.
//! Role: Binary crate root; parses args, installs logging, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable JSON on stdout (pretty only when stdout is a TTY).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Log output goes to stderr and never mixes with command output.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;

use jsonable::api::{DecodeOptions, Error, ErrorKind, Schema, to_exit_code};

const LOG_ENV: &str = "JSONABLE_LOG";

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
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
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
                        .with_hint("Try `jsonable --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing(cli.verbose);

    let options = decode_options(&cli).map_err(|err| (err, color_mode))?;
    command_dispatch::dispatch_command(cli.command, &options)
        .map_err(add_decode_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

// Environment first, then flags on top.
fn decode_options(cli: &Cli) -> Result<DecodeOptions, Error> {
    let mut options = DecodeOptions::from_env()?;
    if let Some(max_depth) = cli.max_depth {
        options = options.with_max_depth(max_depth)?;
    }
    if cli.strict_enums {
        options = options.with_strict_enums(true);
    }
    Ok(options)
}

#[derive(Parser)]
#[command(
    name = "jsonable",
    version,
    about = "Decode JSON documents against record descriptor tables",
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
    before_help = r#"A schema file declares record types: fields with a name and a kind
(integer, enum, fixed_string, owned_string, record, embedded, array).

Mental model:
  - `describe` shows the resolved descriptor tables
  - `decode` decodes a document, re-encodes it, and releases it
  - `check` only validates a document against a type
"#,
    after_help = r#"EXAMPLES
  $ jsonable describe types.json
  $ jsonable decode types.json --type scalars '{"a": 500, "e": 1, "string": "hello"}'
  $ cat doc.json | jsonable check types.json --type nested_var_list -

ENVIRONMENT
  JSONABLE_LOG           log filter (default: warn)
  JSONABLE_MAX_DEPTH     nesting limit for decoding (default: 128)
  JSONABLE_STRICT_ENUMS  reject undeclared enum codes (1/true)"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(long, global = true, help = "Maximum record nesting depth while decoding")]
    max_depth: Option<usize>,
    #[arg(long, global = true, help = "Reject enum codes that are not declared members")]
    strict_enums: bool,
    #[arg(short, long, global = true, help = "Log engine activity to stderr")]
    verbose: bool,
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
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
        about = "Print the resolved descriptor tables of a schema file",
        after_help = r#"EXAMPLES
  $ jsonable describe types.json"#
    )]
    Describe {
        #[arg(help = "Schema file path", value_hint = ValueHint::FilePath)]
        schema: PathBuf,
        #[arg(long = "type", help = "Only describe this record type")]
        type_name: Option<String>,
    },
    #[command(
        about = "Decode a document, re-encode it, and release it",
        long_about = r#"Decode a JSON document into a record of the given type.

Prints the re-encoded value and the number of owned strings, records and
arrays the release walk freed."#,
        after_help = r#"EXAMPLES
  $ jsonable decode types.json --type scalars '{"a": 1}'
  $ jsonable decode types.json --type var_list doc.json"#
    )]
    Decode {
        #[arg(help = "Schema file path", value_hint = ValueHint::FilePath)]
        schema: PathBuf,
        #[arg(long = "type", help = "Record type to decode into")]
        type_name: String,
        #[arg(help = "Inline JSON, a file path, or - for stdin (default: stdin)")]
        input: Option<String>,
    },
    #[command(
        about = "Validate a document against a record type",
        after_help = r#"EXAMPLES
  $ jsonable check types.json --type scalars doc.json"#
    )]
    Check {
        #[arg(help = "Schema file path", value_hint = ValueHint::FilePath)]
        schema: PathBuf,
        #[arg(long = "type", help = "Record type to decode into")]
        type_name: String,
        #[arg(help = "Inline JSON, a file path, or - for stdin (default: stdin)")]
        input: Option<String>,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_schema(path: &Path) -> Result<Schema, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| io_error(err, path))?;
    Schema::from_str(&raw).map_err(|err| {
        let hint = err
            .hint()
            .map(|hint| format!("{hint} (schema: {})", path.display()))
            .unwrap_or_else(|| format!("Check schema file {}.", path.display()));
        err.with_hint(hint)
    })
}

// Inline JSON wins when the argument looks like a document; otherwise it is a path.
fn read_input(input: Option<&str>) -> Result<String, Error> {
    match input {
        None | Some("-") => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to read stdin")
                        .with_source(err)
                })?;
            Ok(raw)
        }
        Some(text) if looks_inline(text) => Ok(text.to_string()),
        Some(path) => {
            let path = Path::new(path);
            std::fs::read_to_string(path).map_err(|err| io_error(err, path))
        }
    }
}

fn looks_inline(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{' | b'['))
}

fn io_error(err: io::Error, path: &Path) -> Error {
    let kind = if err.kind() == io::ErrorKind::NotFound {
        ErrorKind::NotFound
    } else {
        ErrorKind::Io
    };
    Error::new(kind)
        .with_message(format!("cannot read {}", path.display()))
        .with_source(err)
}

fn add_decode_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    let hint = match err.kind() {
        ErrorKind::DepthLimit => "Raise --max-depth (or JSONABLE_MAX_DEPTH) if the nesting is expected.",
        ErrorKind::BufferOverflow => "Fixed strings hold capacity - 1 bytes; shorten the value or raise the capacity.",
        ErrorKind::MissingField => "Only owned_string and record fields may be omitted.",
        ErrorKind::TypeMismatch | ErrorKind::ShapeMismatch => {
            "Run `jsonable describe` to see the expected field kinds."
        }
        _ => return err,
    };
    err.with_hint(hint)
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
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Schema => "invalid schema".to_string(),
        ErrorKind::ShapeMismatch => "shape mismatch".to_string(),
        ErrorKind::TypeMismatch => "type mismatch".to_string(),
        ErrorKind::BufferOverflow => "buffer overflow".to_string(),
        ErrorKind::MissingField => "missing field".to_string(),
        ErrorKind::DepthLimit => "depth limit exceeded".to_string(),
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
    if let Some(record) = err.record() {
        inner.insert("record".to_string(), json!(record));
    }
    if let Some(field) = err.field() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path));
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
    if let Some(record) = err.record() {
        lines.push(format!(
            "{} {record}",
            colorize_label("record:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {path}",
            colorize_label("path:", use_color, AnsiColor::Yellow)
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

#[cfg(test)]
mod tests {
    use super::{Cli, ColorMode, add_decode_hint, error_json, error_text, looks_inline};
    use clap::{CommandFactory, Parser};
    use jsonable::api::{Error, ErrorKind};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "jsonable",
            "decode",
            "types.json",
            "--type",
            "scalars",
            "--max-depth",
            "4",
            "--strict-enums",
            "-",
        ])
        .expect("parse");
        assert_eq!(cli.max_depth, Some(4));
        assert!(cli.strict_enums);
        assert!(matches!(cli.color, ColorMode::Auto));
    }

    #[test]
    fn error_json_carries_location() {
        let err = Error::new(ErrorKind::BufferOverflow)
            .with_message("too long")
            .with_record("scalars")
            .with_field("string")
            .within("[1]")
            .within("items");
        let value = error_json(&err);
        let inner = &value["error"];
        assert_eq!(inner["kind"], "BufferOverflow");
        assert_eq!(inner["record"], "scalars");
        assert_eq!(inner["field"], "string");
        assert_eq!(inner["path"], "items[1].string");
        assert!(inner.get("hint").is_none());
    }

    #[test]
    fn error_text_without_color_is_plain() {
        let err = add_decode_hint(Error::new(ErrorKind::DepthLimit).with_message("too deep"));
        let text = error_text(&err, false);
        assert!(text.starts_with("error: too deep"));
        assert!(text.contains("hint: Raise --max-depth"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn inline_detection() {
        assert!(looks_inline("  {\"a\":1}"));
        assert!(looks_inline("[]"));
        assert!(!looks_inline("doc.json"));
    }
}
