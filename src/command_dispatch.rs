//! Purpose: Hold top-level CLI command dispatch for `snmptable`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Name resolution and index parsing finish before the session is opened.
//! Invariants: Every command prints exactly one JSON document on success.

use super::*;
use snmptable::api::{IndexValue, Oid, Query, Rows, Table};

pub(super) fn dispatch_command(command: Command, context: &CommandContext) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "snmptable", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Get { names } => {
            let schema = load_schema(context.schema.as_deref())?;
            let query = build_get_query(&schema, &names, context.format)?;
            let mut client = open_client(context)?;
            let values = client.get_all(&query)?;
            client.close()?;

            let mut out = Map::new();
            for name in &names {
                if let Some(value) = values.get(name) {
                    out.insert(name.clone(), to_json(value)?);
                }
            }
            emit_json(Value::Object(out));
            Ok(RunOutcome::ok())
        }
        Command::Table {
            table,
            columns,
            index,
        } => {
            let schema = load_schema(context.schema.as_deref())?;
            let (table, index) = build_table(&schema, &table, &columns, &index, context)?;
            let mut client = open_client(context)?;
            let rows = client.table(&table, &index)?;
            client.close()?;

            emit_json(json!({
                "table": table.node.name(),
                "rows": rows_json(&rows)?,
            }));
            Ok(RunOutcome::ok())
        }
    }
}

fn build_get_query(schema: &Schema, names: &[String], format: Option<Format>) -> Result<Query, Error> {
    let mut query = Query::new();
    query.default_format = format;
    for name in names {
        if let Some(scalar) = schema.scalar(name) {
            query.named_scalar(name.clone(), scalar, None);
            continue;
        }
        let Some((column_name, suffix)) = name.split_once('.') else {
            return Err(unknown_object(name));
        };
        let Some((_, column)) = schema.column(column_name) else {
            return Err(unknown_object(name));
        };
        let index: Oid = suffix.parse()?;
        query.named_column(name.clone(), column, index.as_slice(), None);
    }
    Ok(query)
}

fn build_table(
    schema: &Schema,
    name: &str,
    columns: &[String],
    index: &[String],
    context: &CommandContext,
) -> Result<(Table, Vec<IndexValue>), Error> {
    let Some(node) = schema.table(name) else {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message(format!("unknown table {name}"))
            .with_hint(format!(
                "Known tables: {}.",
                schema.table_names().collect::<Vec<_>>().join(", ")
            )));
    };

    let mut table = Table::new(node.clone(), context.index_format);
    table.column_format = context.format;
    for column_name in columns {
        let column = node
            .column(column_name)
            .or_else(|| schema.column(column_name).map(|(_, column)| column))
            .ok_or_else(|| unknown_object(column_name))?;
        table.named_column(column_name.clone(), column.clone(), None);
    }

    if index.len() > node.index().len() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!(
                "table {name} has {} index columns but {} values were given",
                node.index().len(),
                index.len()
            ))
            .with_hint("Drop trailing --index values."));
    }
    let values = node
        .index()
        .iter()
        .zip(index)
        .map(|(column, text)| {
            IndexValue::parse(column.ty.base, text).map_err(|err| err.with_column(column.name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((table, values))
}

fn unknown_object(name: &str) -> Error {
    Error::new(ErrorKind::NotFound)
        .with_message(format!("unknown object {name}"))
        .with_hint("Use a scalar name or <column>.<index> from the schema.")
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode result")
            .with_source(err)
    })
}

fn rows_json(rows: &Rows) -> Result<Vec<Value>, Error> {
    rows.iter()
        .map(|(key, row)| -> Result<Value, Error> {
            let mut value = to_json(row)?;
            if let Value::Object(map) = &mut value {
                map.insert("key".to_string(), json!(key.to_string()));
            }
            Ok(value)
        })
        .collect()
}
