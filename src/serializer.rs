//! Serializer for converting the schema model back to DDL.

use crate::error::SchemaError;
use crate::graph::TableCollection;
use crate::model::{Field, ForeignKey, Index, PrimaryKey, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Emit a `CREATE DATABASE` header before the tables.
    pub include_database: bool,
    /// Precede the header with `DROP SCHEMA IF EXISTS`.
    pub drop_existing: bool,
}

/// Serialize every table as a `CREATE TABLE` statement in creation order.
pub fn creation_script(
    collection: &TableCollection,
    options: &ScriptOptions,
) -> Result<String, SchemaError> {
    let order = collection.creation_order()?;
    let mut output = String::new();

    if options.include_database {
        match database_definition(collection, options.drop_existing) {
            Some(header) => {
                output.push_str(&header);
                output.push_str("\n\n");
            }
            None => tracing::debug!("unnamed collection, database header skipped"),
        }
    }

    for (i, table) in order.iter().enumerate() {
        if i > 0 {
            output.push_str("\n\n");
        }
        serialize_table(&mut output, table);
    }

    Ok(output)
}

/// `CREATE DATABASE` header for the collection; `None` when it has no name.
pub fn database_definition(collection: &TableCollection, drop_existing: bool) -> Option<String> {
    if collection.name().is_empty() {
        return None;
    }
    let mut output = String::new();
    if drop_existing {
        output.push_str(&format!("DROP SCHEMA IF EXISTS `{}`;\n", collection.name()));
    }
    output.push_str(&format!("CREATE DATABASE IF NOT EXISTS `{}`", collection.name()));
    if !collection.charset().is_empty() {
        output.push_str(&format!(" DEFAULT CHARACTER SET {}", collection.charset()));
    }
    output.push(';');
    Some(output)
}

pub fn table_definition(table: &Table) -> String {
    let mut output = String::new();
    serialize_table(&mut output, table);
    output
}

fn serialize_table(output: &mut String, table: &Table) {
    let mut clauses: Vec<String> = table.fields().values().map(field_definition).collect();
    if let Some(pk) = table.primary_key() {
        clauses.push(primary_key_definition(pk));
    }
    clauses.extend(table.indexes().values().map(index_definition));
    clauses.extend(table.foreign_keys().values().map(foreign_key_definition));

    output.push_str(&format!("CREATE TABLE `{}` (\n", table.name()));
    output.push_str(
        &clauses
            .iter()
            .map(|c| format!("  {c}"))
            .collect::<Vec<_>>()
            .join(",\n"),
    );
    output.push_str("\n)");
    if !table.options().is_empty() {
        output.push(' ');
        output.push_str(table.options());
    }
    output.push(';');
}

pub fn field_definition(field: &Field) -> String {
    let mut def = format!("`{}` {}", field.name, field.datatype);
    if !field.attributes.is_empty() {
        def.push(' ');
        def.push_str(&field.attributes);
    }
    def
}

pub fn primary_key_definition(pk: &PrimaryKey) -> String {
    format!("PRIMARY KEY ({})", quoted_list(&pk.fields))
}

pub fn index_definition(index: &Index) -> String {
    let kind = if index.unique { "UNIQUE KEY" } else { "KEY" };
    format!("{} `{}` ({})", kind, index.name, quoted_list(&index.fields))
}

pub fn foreign_key_definition(fk: &ForeignKey) -> String {
    let mut def = format!(
        "CONSTRAINT `{}` FOREIGN KEY ({}) REFERENCES `{}` ({})",
        fk.name,
        quoted_list(&fk.key_fields),
        fk.reference_table,
        quoted_list(&fk.reference_fields)
    );
    if let Some(action) = fk.on_delete {
        def.push_str(&format!(" ON DELETE {}", action.as_sql()));
    }
    if let Some(action) = fk.on_update {
        def.push_str(&format!(" ON UPDATE {}", action.as_sql()));
    }
    def
}

fn quoted_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{n}`"))
        .collect::<Vec<_>>()
        .join(",")
}
