//! Purpose: Hold top-level CLI command dispatch for `jsonable`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every decoded record is released before its command returns.
//! Invariants: Helpers in `main.rs` own input reading and output rendering.

use jsonable::api::{
    ReleaseStats, deserialize, describe_descriptor, release_record, serialize,
};
use jsonable::json::parse;

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    options: &DecodeOptions,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "jsonable", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Describe { schema, type_name } => {
            let schema = load_schema(&schema)?;
            let value = match type_name {
                Some(name) => describe_descriptor(schema.require(&name)?),
                None => schema.describe(),
            };
            emit_json(value);
            Ok(RunOutcome::ok())
        }
        Command::Decode {
            schema,
            type_name,
            input,
        } => {
            let schema = load_schema(&schema)?;
            let descriptor = schema.require(&type_name)?;
            let document = parse::from_str(&read_input(input.as_deref())?)?;

            let mut record = deserialize(&document, descriptor, options)?;
            let value = serialize(&record);
            let stats = release_record(&mut record);
            emit_json(json!({
                "type": descriptor.name(),
                "value": value,
                "released": stats_json(stats),
            }));
            Ok(RunOutcome::ok())
        }
        Command::Check {
            schema,
            type_name,
            input,
        } => {
            let schema = load_schema(&schema)?;
            let descriptor = schema.require(&type_name)?;
            let document = parse::from_str(&read_input(input.as_deref())?)?;

            let mut record = deserialize(&document, descriptor, options)?;
            release_record(&mut record);
            emit_json(json!({ "ok": true }));
            Ok(RunOutcome::ok())
        }
    }
}

fn stats_json(stats: ReleaseStats) -> Value {
    json!({
        "strings": stats.strings,
        "records": stats.records,
        "arrays": stats.arrays,
    })
}
