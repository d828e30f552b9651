//! tb field command implementations.

use serde::Serialize;

use crate::board::Board;
use crate::cli::FieldCommands;
use crate::error::{Error, Result};
use crate::model::{CustomField, FieldPatch, FieldType, FieldValue};
use crate::output::{emit, OutputOptions, Text};

#[derive(Serialize)]
struct FieldReport<'a> {
    field: &'a CustomField,
}

#[derive(Serialize)]
struct FieldListReport<'a> {
    fields: &'a [CustomField],
}

pub fn run(board: &mut Board, cmd: FieldCommands, output: OutputOptions) -> Result<()> {
    match cmd {
        FieldCommands::Add {
            name,
            field_type,
            default,
        } => {
            let field_type: FieldType = field_type.parse()?;
            let default = default
                .map(|raw| FieldValue::parse(field_type, &raw))
                .transpose()?;
            let id = board.add_field(&name, field_type, default)?;
            let field = lookup(board, &id)?;

            let text = field_text("tb field add", field).hint("tb task edit <id> --set NAME=VALUE");
            emit(output, "field add", &FieldReport { field }, text)
        }

        FieldCommands::Edit {
            field,
            name,
            field_type,
            default,
        } => {
            let current = lookup(board, &field)?.clone();
            let field_type = field_type
                .map(|raw| raw.parse::<FieldType>())
                .transpose()?;
            let default_type = field_type.unwrap_or(current.field_type);
            let patch = FieldPatch {
                name,
                field_type,
                default_value: default
                    .map(|raw| FieldValue::parse(default_type, &raw))
                    .transpose()?,
            };
            if patch.is_empty() {
                return Err(Error::InvalidArgument(
                    "nothing to change; pass --name, --type or --default".to_string(),
                ));
            }
            board.update_field(&current.id, patch)?;

            let field = lookup(board, &current.id)?;
            emit(output, "field edit", &FieldReport { field }, field_text("tb field edit", field))
        }

        FieldCommands::Rm { field } => {
            let current = lookup(board, &field)?.clone();
            board.remove_field(&current.id);

            let text = Text::new(format!("tb field rm: {}", current.name))
                .line("  values already stored on tasks are kept");
            emit(output, "field rm", &FieldReport { field: &current }, text)
        }

        FieldCommands::List => {
            let fields = board.fields();
            let mut text = Text::new(format!("tb field list: {} field(s)", fields.len()));
            for field in fields.iter() {
                text = text.line(format!(
                    "  {}  {} ({}, default {})",
                    field.id, field.name, field.field_type, field.default_value
                ));
            }
            if fields.is_empty() {
                text = text.hint("tb field add <name> --type text");
            }
            let report = FieldListReport {
                fields: fields.as_slice(),
            };
            emit(output, "field list", &report, text)
        }
    }
}

fn field_text(command: &str, field: &CustomField) -> Text {
    Text::new(format!("{command}: {}", field.name))
        .row("id", &field.id)
        .row("type", field.field_type)
        .row("default", &field.default_value)
}

fn lookup<'a>(board: &'a Board, id_or_name: &str) -> Result<&'a CustomField> {
    board
        .field_registry()
        .resolve(id_or_name)
        .ok_or_else(|| Error::FieldNotFound(id_or_name.to_string()))
}
