//! Custom field registry.
//!
//! Field definitions are kept in insertion order, which is also their
//! display order. Removing a field never touches task data; values already
//! stored on tasks stay behind as orphans.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{CustomField, FieldPatch, FieldType, FieldValue};

#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Arc<Vec<CustomField>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted definitions.
    pub fn from_fields(fields: Vec<CustomField>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    /// Shared read-only view of the current definitions
    pub fn fields(&self) -> Arc<Vec<CustomField>> {
        Arc::clone(&self.fields)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, id: &str) -> Option<&CustomField> {
        self.fields.iter().find(|field| field.id == id)
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<&CustomField> {
        let wanted = name.trim().to_lowercase();
        self.fields
            .iter()
            .find(|field| field.name.to_lowercase() == wanted)
    }

    /// Resolve either a field id or a field name
    pub fn resolve(&self, id_or_name: &str) -> Option<&CustomField> {
        self.field(id_or_name)
            .or_else(|| self.find_by_name(id_or_name))
    }

    /// Register a new field and return its id.
    pub fn add_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        default_value: Option<FieldValue>,
    ) -> Result<String> {
        let name = self.validate_name(name, None)?;
        let default_value = checked_default(&name, field_type, default_value)?;

        let field = CustomField {
            id: Uuid::new_v4().to_string(),
            name,
            field_type,
            default_value,
        };
        let id = field.id.clone();
        debug!(field_id = %id, name = %field.name, "custom field added");
        Arc::make_mut(&mut self.fields).push(field);
        Ok(id)
    }

    /// Remove a field definition. Returns false when the id is unknown.
    pub fn remove_field(&mut self, id: &str) -> bool {
        let Some(index) = self.fields.iter().position(|field| field.id == id) else {
            return false;
        };
        Arc::make_mut(&mut self.fields).remove(index);
        debug!(field_id = %id, "custom field removed");
        true
    }

    /// Merge a partial update into a field. Returns false when the id is
    /// unknown or the patch is empty.
    pub fn update_field(&mut self, id: &str, patch: FieldPatch) -> Result<bool> {
        let Some(index) = self.fields.iter().position(|field| field.id == id) else {
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(false);
        }

        let current = &self.fields[index];
        let name = match &patch.name {
            Some(name) => self.validate_name(name, Some(id))?,
            None => current.name.clone(),
        };
        let field_type = patch.field_type.unwrap_or(current.field_type);
        let default_value = match patch.default_value {
            Some(value) => checked_default(&name, field_type, Some(value))?,
            None if field_type != current.field_type => field_type.zero_value(),
            None => current.default_value.clone(),
        };

        let field = &mut Arc::make_mut(&mut self.fields)[index];
        field.name = name;
        field.field_type = field_type;
        field.default_value = default_value;
        debug!(field_id = %id, "custom field updated");
        Ok(true)
    }

    fn validate_name(&self, name: &str, except_id: Option<&str>) -> Result<String> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyFieldName);
        }
        let lowered = trimmed.to_lowercase();
        let duplicate = self.fields.iter().any(|field| {
            Some(field.id.as_str()) != except_id && field.name.to_lowercase() == lowered
        });
        if duplicate {
            return Err(Error::DuplicateFieldName(trimmed.to_string()));
        }
        Ok(trimmed.to_string())
    }
}

fn checked_default(
    name: &str,
    field_type: FieldType,
    default_value: Option<FieldValue>,
) -> Result<FieldValue> {
    match default_value {
        None => Ok(field_type.zero_value()),
        Some(value) if value.matches(field_type) => {
            value.check_storable(name)?;
            Ok(value)
        }
        Some(_) => Err(Error::FieldTypeMismatch {
            field: name.to_string(),
            expected: field_type.to_string(),
        }),
    }
}
