use std::fmt;

use thiserror::Error;

use crate::order::OrderDiagnosis;

/// Clause shape a line was expected to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    TableName,
    ClauseList,
    Field,
    PrimaryKey,
    Index,
    ForeignKey,
    Database,
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TableName => "table name",
            Self::ClauseList => "clause list",
            Self::Field => "field definition",
            Self::PrimaryKey => "primary key",
            Self::Index => "index",
            Self::ForeignKey => "foreign key constraint",
            Self::Database => "database header",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unable to parse {kind} from {line:?}")]
    MalformedClause { kind: ClauseKind, line: String },
    #[error("Unable to extract field name and type from {line:?}")]
    FieldParse { line: String },
    #[error("Table `{table}` declares {kind} `{name}` more than once")]
    DuplicateName {
        kind: ClauseKind,
        name: String,
        table: String,
    },
    #[error("{clause} uses non-existent field `{field}`")]
    UnknownFieldReference { clause: String, field: String },
    #[error("Table `{table}` already exists in `{collection}`")]
    DuplicateTable { table: String, collection: String },
    #[error("Unable to link `{table}`: constraint `{constraint}` references missing table `{referenced_table}`")]
    MissingReferencedTable {
        table: String,
        constraint: String,
        referenced_table: String,
    },
    #[error("FK `{constraint}` on `{table}` invalid: `{field}` does not exist in reference table `{referenced_table}`")]
    DanglingFieldReference {
        table: String,
        constraint: String,
        referenced_table: String,
        field: String,
    },
    #[error("Table `{table}` does not exist in `{collection}`")]
    UnknownTable { table: String, collection: String },
    #[error("Table sorting failed, possible circular references:\n{0}")]
    UnresolvableOrder(OrderDiagnosis),
    #[error("Creation order not resolved within {limit} sweeps")]
    SweepLimitExceeded { limit: usize },
}

impl SchemaError {
    pub(crate) fn malformed(kind: ClauseKind, line: &str) -> Self {
        Self::MalformedClause {
            kind,
            line: line.to_string(),
        }
    }

    pub(crate) fn duplicate(kind: ClauseKind, name: &str, table: &str) -> Self {
        Self::DuplicateName {
            kind,
            name: name.to_string(),
            table: table.to_string(),
        }
    }
}
