//! DDL text to schema model extraction.

mod assembler;
mod builder;
mod patterns;

pub use assembler::TableAssembler;
pub use builder::{build_field, build_foreign_key_stub, build_index, build_primary_key};
pub use patterns::{Extractor, FieldParts, ForeignKeyParts};
