//! Assembles a [`Table`] from one `CREATE TABLE` statement.

use super::builder::{build_field, build_foreign_key_stub, build_index, build_primary_key};
use super::patterns::Extractor;
use crate::error::{ClauseKind, SchemaError};
use crate::graph::TableCollection;
use crate::model::Table;

const QUOTE: char = '`';

#[derive(Debug, Clone, Default)]
pub struct TableAssembler {
    extractor: Extractor,
}

impl TableAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a statement laid out one clause per line:
    ///
    /// ```text
    /// CREATE TABLE `orders` (
    ///   `id` int(11) NOT NULL AUTO_INCREMENT,
    ///   `user_id` int(11) NOT NULL,
    ///   PRIMARY KEY (`id`),
    ///   KEY `idx_user` (`user_id`),
    ///   CONSTRAINT `fk_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)
    /// ) ENGINE=InnoDB DEFAULT CHARSET=utf8;
    /// ```
    ///
    /// The first line must open the clause list and the last must close it.
    /// The first malformed line, or a name declared twice, aborts the whole
    /// statement.
    pub fn assemble(&self, statement: &str) -> Result<Table, SchemaError> {
        let lines: Vec<&str> = statement
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let first: &str = lines
            .first()
            .copied()
            .ok_or_else(|| SchemaError::malformed(ClauseKind::TableName, statement))?;
        let head = first.split('(').next().unwrap_or(first);
        let name = self
            .extractor
            .identifiers(head)
            .last()
            .copied()
            .ok_or_else(|| SchemaError::malformed(ClauseKind::TableName, first))?;

        let [_, body @ .., last] = lines.as_slice() else {
            return Err(SchemaError::malformed(ClauseKind::ClauseList, statement));
        };
        if !first.ends_with('(') {
            return Err(SchemaError::malformed(ClauseKind::ClauseList, first));
        }
        if !last.starts_with(')') {
            return Err(SchemaError::malformed(ClauseKind::ClauseList, last));
        }

        let options = last.trim_start_matches(')').trim_end_matches(';');
        let options = self.extractor.strip_auto_increment(options);
        let mut table = Table::new(name)
            .with_statement(statement)
            .with_options(options.trim());

        for line in body {
            self.apply_line(&mut table, line)?;
        }

        tracing::debug!(
            table = %table.name(),
            fields = table.fields().len(),
            indexes = table.indexes().len(),
            foreign_keys = table.foreign_keys().len(),
            "assembled table"
        );
        Ok(table)
    }

    fn apply_line(&self, table: &mut Table, line: &str) -> Result<(), SchemaError> {
        let ex = &self.extractor;
        if line.starts_with(QUOTE) {
            let field = build_field(ex, line)?;
            if table.has_field(&field.name) {
                return Err(SchemaError::duplicate(ClauseKind::Field, &field.name, table.name()));
            }
            table.add_field(field);
        } else if line.contains("PRIMARY KEY") {
            if table.primary_key().is_some() {
                return Err(SchemaError::duplicate(ClauseKind::PrimaryKey, "PRIMARY", table.name()));
            }
            let pk = build_primary_key(ex, line, table.fields())?;
            table.set_primary_key(pk)?;
        } else if line.contains("CONSTRAINT") {
            let fk = build_foreign_key_stub(ex, line)?;
            if table.has_foreign_key(&fk.name) {
                return Err(SchemaError::duplicate(ClauseKind::ForeignKey, &fk.name, table.name()));
            }
            table.add_foreign_key(fk);
        } else {
            let index = build_index(ex, line, table.fields())?;
            if table.has_index(&index.name) {
                return Err(SchemaError::duplicate(ClauseKind::Index, &index.name, table.name()));
            }
            table.add_index(index)?;
        }
        Ok(())
    }

    /// Reads a `CREATE DATABASE` header into an empty collection.
    pub fn assemble_collection(&self, statement: &str) -> Result<TableCollection, SchemaError> {
        let upper = statement.to_uppercase();
        if !upper.contains("CREATE DATABASE") && !upper.contains("CREATE SCHEMA") {
            return Err(SchemaError::malformed(ClauseKind::Database, statement));
        }
        let name = self
            .extractor
            .identifiers(statement)
            .first()
            .copied()
            .ok_or_else(|| SchemaError::malformed(ClauseKind::Database, statement))?;
        let charset = self.extractor.charset(statement).unwrap_or_default();
        Ok(TableCollection::new(name, charset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ORDERS: &str = "CREATE TABLE `orders` (
  `id` int(11) unsigned NOT NULL AUTO_INCREMENT,
  `user_id` int(11) NOT NULL,
  `note` varchar(255) DEFAULT NULL,
  PRIMARY KEY (`id`),
  UNIQUE KEY `uk_note` (`note`),
  KEY `idx_user` (`user_id`),
  CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE
) ENGINE=InnoDB AUTO_INCREMENT=17 DEFAULT CHARSET=utf8;";

    #[test]
    fn test_assemble_table() {
        let table = TableAssembler::new().assemble(ORDERS).unwrap();
        assert_eq!(table.name(), "orders");
        assert_eq!(table.statement(), ORDERS);
        assert_eq!(table.options(), "ENGINE=InnoDB DEFAULT CHARSET=utf8");

        let names: Vec<&str> = table.fields().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "user_id", "note"]);

        let id = table.field("id").unwrap();
        assert!(id.is_pk);
        assert!(id.auto_increment);
        assert!(!id.signed);
        assert!(!id.nullable);
        assert!(!table.field("user_id").unwrap().is_pk);

        assert_eq!(table.primary_key().unwrap().fields, vec!["id"]);
        assert!(table.indexes()["uk_note"].unique);
        assert!(!table.indexes()["idx_user"].unique);

        let fk = &table.foreign_keys()["fk_orders_user"];
        assert_eq!(fk.reference_table, "users");
        assert!(!fk.is_linked());
        assert!(table.depends_on().is_empty());
    }

    #[test]
    fn test_assemble_deterministic() {
        let assembler = TableAssembler::new();
        assert_eq!(assembler.assemble(ORDERS).unwrap(), assembler.assemble(ORDERS).unwrap());
    }

    #[test]
    fn test_assemble_qualified_name() {
        let sql = "CREATE TABLE IF NOT EXISTS `shop`.`tags` (\n  `id` int,\n  PRIMARY KEY (`id`)\n);";
        let table = TableAssembler::new().assemble(sql).unwrap();
        assert_eq!(table.name(), "tags");
        assert_eq!(table.options(), "");
    }

    #[test]
    fn test_assemble_missing_name() {
        let err = TableAssembler::new()
            .assemble("CREATE TABLE tags (\n  `id` int\n);")
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedClause { kind: ClauseKind::TableName, .. }));

        let err = TableAssembler::new().assemble("   \n").unwrap_err();
        assert!(matches!(err, SchemaError::MalformedClause { kind: ClauseKind::TableName, .. }));
    }

    #[test]
    fn test_assemble_single_line() {
        let err = TableAssembler::new()
            .assemble("CREATE TABLE `tags` (`id` int);")
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedClause { kind: ClauseKind::ClauseList, .. }));
    }

    #[test]
    fn test_assemble_rejects_clause_on_opening_line() {
        let sql = "CREATE TABLE `t` (`id` int,\n  `name` varchar(10)\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MalformedClause { kind: ClauseKind::ClauseList, ref line } if line.starts_with("CREATE TABLE")
        ));
    }

    #[test]
    fn test_assemble_rejects_clause_on_closing_line() {
        let sql = "CREATE TABLE `t` (\n  `id` int,\n  `name` varchar(10));";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MalformedClause { kind: ClauseKind::ClauseList, ref line } if line == "`name` varchar(10));"
        ));
    }

    #[test]
    fn test_assemble_rejects_duplicate_column() {
        let sql = "CREATE TABLE `t` (\n  `id` int(11) NOT NULL,\n  `id` varchar(5),\n  PRIMARY KEY (`id`)\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateName { kind: ClauseKind::Field, ref name, ref table } if name == "id" && table == "t"
        ));
    }

    #[test]
    fn test_assemble_rejects_duplicate_constraint() {
        let sql = "CREATE TABLE `t` (
  `id` int,
  `a_id` int,
  `b_id` int,
  CONSTRAINT `fk` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`),
  CONSTRAINT `fk` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)
);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateName { kind: ClauseKind::ForeignKey, ref name, .. } if name == "fk"
        ));
    }

    #[test]
    fn test_assemble_rejects_duplicate_index_and_primary_key() {
        let sql = "CREATE TABLE `t` (\n  `id` int,\n  KEY `idx` (`id`),\n  UNIQUE KEY `idx` (`id`)\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { kind: ClauseKind::Index, .. }));

        let sql = "CREATE TABLE `t` (\n  `id` int,\n  PRIMARY KEY (`id`),\n  PRIMARY KEY (`id`)\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName { kind: ClauseKind::PrimaryKey, .. }));
    }

    #[test]
    fn test_assemble_composite_foreign_key() {
        let sql = "CREATE TABLE `items` (
  `id` int NOT NULL,
  `order_id` int NOT NULL,
  `shop_id` int NOT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `fk_items_order` FOREIGN KEY (`order_id`, `shop_id`) REFERENCES `orders` (`id`, `shop_id`)
) ENGINE=InnoDB;";
        let table = TableAssembler::new().assemble(sql).unwrap();
        let fk = &table.foreign_keys()["fk_items_order"];
        assert_eq!(fk.reference_table, "orders");
        assert_eq!(fk.key_fields, vec!["order_id", "shop_id"]);
        assert_eq!(fk.reference_fields, vec!["id", "shop_id"]);
    }

    #[test]
    fn test_assemble_aborts_on_bad_field() {
        let sql = "CREATE TABLE `broken` (\n  `id` int(11) NOT NULL,\n  `oops`,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB;";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(err, SchemaError::FieldParse { ref line } if line == "`oops`,"));
    }

    #[test]
    fn test_assemble_aborts_on_unknown_index_field() {
        let sql = "CREATE TABLE `t` (\n  `id` int(11) NOT NULL,\n  KEY `idx_ghost` (`ghost`)\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldReference { ref field, .. } if field == "ghost"));
    }

    #[test]
    fn test_assemble_aborts_on_pk_before_field() {
        let sql = "CREATE TABLE `t` (\n  PRIMARY KEY (`id`),\n  `id` int(11) NOT NULL\n);";
        let err = TableAssembler::new().assemble(sql).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldReference { .. }));
    }

    #[test]
    fn test_assemble_collection() {
        let assembler = TableAssembler::new();
        let db = assembler
            .assemble_collection("CREATE DATABASE /*!32312 IF NOT EXISTS*/ `shop` /*!40100 DEFAULT CHARACTER SET utf8mb4 */;")
            .unwrap();
        assert_eq!(db.name(), "shop");
        assert_eq!(db.charset(), "utf8mb4");
        assert!(db.is_empty());

        assert!(assembler.assemble_collection("CREATE TABLE `t` (").is_err());
    }
}
