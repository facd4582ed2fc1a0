pub mod compare;
pub mod ddl;
pub mod error;
pub mod graph;
pub mod model;
pub mod order;
pub mod serializer;

use wasm_bindgen::prelude::*;

pub use compare::{ChangeOptions, Definition};
pub use ddl::TableAssembler;
pub use error::{ClauseKind, SchemaError};
pub use graph::TableCollection;
pub use model::{Field, ForeignKey, Index, PrimaryKey, ReferentialAction, Table};
pub use order::{OrderConfig, OrderDiagnosis};
pub use serializer::ScriptOptions;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Resolve table names in creation order from an array of `CREATE TABLE` statements
#[wasm_bindgen(js_name = "creationOrder")]
pub fn creation_order(statements: js_sys::Array, database: Option<String>) -> Result<js_sys::Array, String> {
    let collection = load(&statements, database.as_deref())?;
    let names = collection.creation_order_names().map_err(|e| e.to_string())?;
    Ok(names.into_iter().map(JsValue::from_str).collect())
}

/// Re-serialize `CREATE TABLE` statements in creation order, preceded by the
/// database header when one is given
#[wasm_bindgen(js_name = "creationScript")]
pub fn creation_script(statements: js_sys::Array, database: Option<String>) -> Result<String, String> {
    let options = ScriptOptions {
        include_database: database.is_some(),
        drop_existing: false,
    };
    let collection = load(&statements, database.as_deref())?;
    serializer::creation_script(&collection, &options).map_err(|e| e.to_string())
}

fn load(statements: &js_sys::Array, database: Option<&str>) -> Result<TableCollection, String> {
    let statements = collect_statements(statements.iter().map(|v| v.as_string()))?;
    build_collection(&statements, database).map_err(|e| e.to_string())
}

fn collect_statements<I>(values: I) -> Result<Vec<String>, String>
where
    I: IntoIterator<Item = Option<String>>,
{
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| format!("Statement {i} is not a string")))
        .collect()
}

fn build_collection(statements: &[String], database: Option<&str>) -> Result<TableCollection, SchemaError> {
    let assembler = TableAssembler::new();
    let base = match database {
        Some(header) => assembler.assemble_collection(header)?,
        None => TableCollection::default(),
    };
    base.with_statements(&assembler, statements)
}
