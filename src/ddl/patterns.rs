//! Line-level pattern extraction for backtick-quoted DDL.

use std::borrow::Cow;

use regex::Regex;

use crate::error::{ClauseKind, SchemaError};
use crate::model::ReferentialAction;

const QUOTED_IDENT: &str = r"`([^`]+)`";
const FIELD_DEF: &str =
    r"(?i)^`([^`]+)`\s+(\S+)\s*(.*?)\s*(NOT NULL)?\s*(DEFAULT\s+(.+?)|AUTO_INCREMENT)?$";
const FK_DEF: &str = r"(?i)CONSTRAINT\s+`([^`]+)`\s+FOREIGN\s+KEY\s*\(([^)]*)\)\s*REFERENCES\s+(?:`[^`]+`\.)?`([^`]+)`\s*\(([^)]*)\)";
const FK_ACTION: &str =
    r"(?i)\bON\s+(DELETE|UPDATE)\s+(RESTRICT|CASCADE|SET\s+NULL|SET\s+DEFAULT|NO\s+ACTION)";
const AUTO_INCREMENT_OPTION: &str = r"(?i)AUTO_INCREMENT=\d+\s?";
const CHARSET_OPTION: &str = r"(?i)(?:CHARACTER\s+SET|CHARSET)\s*=?\s*(\w+)";

/// Captured parts of a column definition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldParts<'a> {
    pub name: &'a str,
    pub datatype: &'a str,
    /// Attribute text after the datatype, including any NOT NULL / DEFAULT / AUTO_INCREMENT tail.
    pub attributes: String,
    pub default: Option<&'a str>,
}

/// Captured parts of a foreign key constraint line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyParts<'a> {
    pub name: &'a str,
    pub key_fields: Vec<&'a str>,
    pub reference_table: &'a str,
    pub reference_fields: Vec<&'a str>,
}

/// Compiled patterns. Build once and share; extraction never mutates.
#[derive(Debug, Clone)]
pub struct Extractor {
    ident: Regex,
    field_def: Regex,
    fk_def: Regex,
    fk_action: Regex,
    auto_increment: Regex,
    charset: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            ident: Regex::new(QUOTED_IDENT).expect("valid regex"),
            field_def: Regex::new(FIELD_DEF).expect("valid regex"),
            fk_def: Regex::new(FK_DEF).expect("valid regex"),
            fk_action: Regex::new(FK_ACTION).expect("valid regex"),
            auto_increment: Regex::new(AUTO_INCREMENT_OPTION).expect("valid regex"),
            charset: Regex::new(CHARSET_OPTION).expect("valid regex"),
        }
    }

    /// All backtick-quoted identifiers on the line, in order.
    pub fn identifiers<'a>(&self, line: &'a str) -> Vec<&'a str> {
        self.ident
            .captures_iter(line)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .collect()
    }

    pub fn field_parts<'a>(&self, line: &'a str) -> Result<FieldParts<'a>, SchemaError> {
        let body = line.trim();
        let body = body.strip_suffix(',').unwrap_or(body).trim_end();
        let caps = self
            .field_def
            .captures(body)
            .ok_or_else(|| SchemaError::malformed(ClauseKind::Field, line))?;

        let group = |i: usize| caps.get(i).map(|m| m.as_str()).filter(|s| !s.is_empty());
        let (Some(name), Some(datatype)) = (group(1), group(2)) else {
            return Err(SchemaError::malformed(ClauseKind::Field, line));
        };

        let attributes = [group(3), group(4), group(5)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        Ok(FieldParts {
            name,
            datatype,
            attributes,
            default: group(6),
        })
    }

    /// Splits a constraint line into its name, both column lists and the
    /// referenced table. The lists must be non-empty and of equal length.
    pub fn foreign_key_parts<'a>(&self, line: &'a str) -> Result<ForeignKeyParts<'a>, SchemaError> {
        let malformed = || SchemaError::malformed(ClauseKind::ForeignKey, line);
        let caps = self.fk_def.captures(line).ok_or_else(malformed)?;

        let (Some(name), Some(keys), Some(table), Some(refs)) =
            (caps.get(1), caps.get(2), caps.get(3), caps.get(4))
        else {
            return Err(malformed());
        };
        let key_fields = self.identifiers(keys.as_str());
        let reference_fields = self.identifiers(refs.as_str());
        if key_fields.is_empty() || key_fields.len() != reference_fields.len() {
            return Err(malformed());
        }

        Ok(ForeignKeyParts {
            name: name.as_str(),
            key_fields,
            reference_table: table.as_str(),
            reference_fields,
        })
    }

    /// `(on_delete, on_update)` actions named on a constraint line.
    pub fn referential_actions(
        &self,
        line: &str,
    ) -> (Option<ReferentialAction>, Option<ReferentialAction>) {
        let mut on_delete = None;
        let mut on_update = None;
        for caps in self.fk_action.captures_iter(line) {
            let action = ReferentialAction::from_sql(&caps[2]);
            if caps[1].eq_ignore_ascii_case("DELETE") {
                on_delete = action;
            } else {
                on_update = action;
            }
        }
        (on_delete, on_update)
    }

    /// Removes the `AUTO_INCREMENT=<n>` counter from a table options line.
    pub fn strip_auto_increment<'a>(&self, options: &'a str) -> Cow<'a, str> {
        self.auto_increment.replace_all(options, "")
    }

    pub fn charset<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.charset
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}
