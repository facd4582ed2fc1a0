//! Builds one typed entity from one clause line.

use indexmap::IndexMap;

use super::patterns::Extractor;
use crate::error::{ClauseKind, SchemaError};
use crate::model::{Field, ForeignKey, Index, PrimaryKey};

pub fn build_field(ex: &Extractor, line: &str) -> Result<Field, SchemaError> {
    let parts = ex.field_parts(line).map_err(|_| SchemaError::FieldParse {
        line: line.to_string(),
    })?;

    let lower = parts.attributes.to_lowercase();
    let mut field = Field::new(parts.name, parts.datatype);
    field.signed = !lower.contains("unsigned");
    field.nullable = !lower.contains("not null");
    field.auto_increment = lower.contains("auto_increment");
    if lower.contains("default ") {
        field.default_value = parts.default.map(str::to_string);
    }
    field.attributes = parts.attributes;
    Ok(field)
}

pub fn build_index(
    ex: &Extractor,
    line: &str,
    fields: &IndexMap<String, Field>,
) -> Result<Index, SchemaError> {
    let idents = ex.identifiers(line);
    let Some((name, columns)) = idents.split_first() else {
        return Err(SchemaError::malformed(ClauseKind::Index, line));
    };
    if columns.is_empty() {
        return Err(SchemaError::malformed(ClauseKind::Index, line));
    }
    resolve_fields(&format!("Index `{name}`"), columns, fields)?;

    let unique = line.to_lowercase().contains("unique");
    Ok(Index::new(*name, unique, columns.iter().copied()))
}

pub fn build_primary_key(
    ex: &Extractor,
    line: &str,
    fields: &IndexMap<String, Field>,
) -> Result<PrimaryKey, SchemaError> {
    let idents = ex.identifiers(line);
    if idents.is_empty() {
        return Err(SchemaError::malformed(ClauseKind::PrimaryKey, line));
    }
    resolve_fields("PRIMARY KEY", &idents, fields)?;
    Ok(PrimaryKey::new(idents))
}

/// The returned key is unresolved; linking happens in the collection.
pub fn build_foreign_key_stub(ex: &Extractor, line: &str) -> Result<ForeignKey, SchemaError> {
    let parts = ex.foreign_key_parts(line)?;
    let (on_delete, on_update) = ex.referential_actions(line);

    let mut fk = ForeignKey::composite(
        parts.name,
        parts.key_fields,
        parts.reference_table,
        parts.reference_fields,
    );
    fk.on_delete = on_delete;
    fk.on_update = on_update;
    Ok(fk)
}

fn resolve_fields(
    clause: &str,
    names: &[&str],
    fields: &IndexMap<String, Field>,
) -> Result<(), SchemaError> {
    for name in names {
        if !fields.contains_key(*name) {
            return Err(SchemaError::UnknownFieldReference {
                clause: clause.to_string(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}
