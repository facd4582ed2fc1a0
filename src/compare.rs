//! Table comparison: equality by definition and `ALTER TABLE` change queries.
//!
//! A change query turns one table into another. Foreign key changes come
//! first as their own `ALTER TABLE` statements, followed by one statement
//! covering columns, the primary key and indexes. Renames are not detected;
//! a renamed column reads as a drop plus an add.

use indexmap::IndexMap;

use crate::model::{Field, ForeignKey, Index, PrimaryKey, Table};
use crate::serializer;

/// Entities compared by the DDL they serialize to.
pub trait Definition {
    fn definition(&self) -> String;

    fn same_definition(&self, other: &Self) -> bool {
        self.definition() == other.definition()
    }
}

impl Definition for Field {
    fn definition(&self) -> String {
        serializer::field_definition(self)
    }
}

impl Definition for PrimaryKey {
    fn definition(&self) -> String {
        serializer::primary_key_definition(self)
    }
}

impl Definition for Index {
    fn definition(&self) -> String {
        serializer::index_definition(self)
    }
}

impl Definition for ForeignKey {
    fn definition(&self) -> String {
        serializer::foreign_key_definition(self)
    }
}

impl Definition for Table {
    fn definition(&self) -> String {
        serializer::table_definition(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeOptions {
    /// Drop columns, indexes and (with `include_foreign_keys`) foreign keys
    /// the target does not have.
    pub purge: bool,
    /// Emit foreign key changes.
    pub include_foreign_keys: bool,
}

/// Working copy of the source table, updated as parts are emitted so later
/// comparisons see earlier changes.
struct Draft<'a> {
    fields: IndexMap<&'a str, &'a Field>,
    indexes: IndexMap<&'a str, &'a Index>,
}

impl<'a> Draft<'a> {
    fn of(table: &'a Table) -> Self {
        Self {
            fields: table.fields().iter().map(|(k, v)| (k.as_str(), v)).collect(),
            indexes: table.indexes().iter().map(|(k, v)| (k.as_str(), v)).collect(),
        }
    }
}

/// Statements turning `from` into `to`, empty when nothing differs.
pub fn change_statements(from: &Table, to: &Table, options: &ChangeOptions) -> Vec<String> {
    if from.same_definition(to) {
        return Vec::new();
    }

    let mut draft = Draft::of(from);
    let mut statements = Vec::new();
    if options.include_foreign_keys {
        compare_foreign_keys(from, to, options.purge, &mut draft, &mut statements);
    }

    let mut parts = Vec::new();
    compare_fields(to, &mut draft, &mut parts);
    if options.purge {
        purge_fields(to, &mut draft, &mut parts);
    }
    compare_primary_key(from.primary_key(), to.primary_key(), &mut parts);
    compare_indexes(to, options.purge, &mut draft, &mut parts);

    if !parts.is_empty() {
        statements.push(alter_table(from.name(), &parts));
    }
    tracing::debug!(table = %from.name(), statements = statements.len(), "compared table");
    statements
}

/// [`change_statements`] joined into one script, `None` when nothing differs.
pub fn change_query(from: &Table, to: &Table, options: &ChangeOptions) -> Option<String> {
    let statements = change_statements(from, to, options);
    (!statements.is_empty()).then(|| statements.join("\n"))
}

fn alter_table(name: &str, parts: &[String]) -> String {
    format!("ALTER TABLE `{}`\n{};", name, parts.join(",\n"))
}

fn compare_fields<'a>(to: &'a Table, draft: &mut Draft<'a>, parts: &mut Vec<String>) {
    for (name, field) in to.fields() {
        match draft.fields.get(name.as_str()) {
            None => parts.push(format!("ADD COLUMN {}", field.definition())),
            Some(current) if current.same_definition(field) => continue,
            Some(_) => parts.push(format!("CHANGE COLUMN `{}` {}", name, field.definition())),
        }
        draft.fields.insert(name.as_str(), field);
    }
}

/// Drops columns absent from `to`, along with every index using them.
fn purge_fields(to: &Table, draft: &mut Draft<'_>, parts: &mut Vec<String>) {
    let gone: Vec<&str> = draft
        .fields
        .keys()
        .copied()
        .filter(|name| !to.has_field(name))
        .collect();

    for name in gone {
        parts.push(format!("DROP COLUMN `{name}`"));
        draft.fields.shift_remove(name);
        let affected: Vec<&str> = draft
            .indexes
            .iter()
            .filter(|(_, idx)| idx.contains(name))
            .map(|(idx_name, _)| *idx_name)
            .collect();
        for idx_name in affected {
            draft.indexes.shift_remove(idx_name);
            parts.push(format!("DROP INDEX `{idx_name}`"));
        }
    }
}

fn compare_primary_key(current: Option<&PrimaryKey>, target: Option<&PrimaryKey>, parts: &mut Vec<String>) {
    match (current, target) {
        (Some(current), Some(target)) if current.same_definition(target) => {}
        (Some(_), target) => {
            parts.push("DROP PRIMARY KEY".to_string());
            if let Some(target) = target {
                parts.push(format!("ADD {}", target.definition()));
            }
        }
        (None, Some(target)) => parts.push(format!("ADD {}", target.definition())),
        (None, None) => {}
    }
}

fn compare_indexes<'a>(to: &'a Table, purge: bool, draft: &mut Draft<'a>, parts: &mut Vec<String>) {
    if purge {
        let gone: Vec<&str> = draft
            .indexes
            .keys()
            .copied()
            .filter(|name| !to.has_index(name))
            .collect();
        for name in gone {
            draft.indexes.shift_remove(name);
            parts.push(format!("DROP INDEX `{name}`"));
        }
    }

    for (name, index) in to.indexes() {
        match draft.indexes.get(name.as_str()) {
            None => {}
            Some(current) if current.same_definition(index) => continue,
            Some(_) => parts.push(format!("DROP INDEX `{name}`")),
        }
        parts.push(format!("ADD {}", index.definition()));
        draft.indexes.insert(name.as_str(), index);
    }
}

/// One `ALTER TABLE` per added or redefined foreign key. A key whose local
/// columns are missing brings them, and the target's indexes on them, along.
fn compare_foreign_keys<'a>(
    from: &Table,
    to: &'a Table,
    purge: bool,
    draft: &mut Draft<'a>,
    statements: &mut Vec<String>,
) {
    if purge {
        let drops: Vec<String> = from
            .foreign_keys()
            .keys()
            .filter(|name| !to.has_foreign_key(name))
            .map(|name| format!("DROP FOREIGN KEY `{name}`"))
            .collect();
        if !drops.is_empty() {
            statements.push(alter_table(from.name(), &drops));
        }
    }

    for (name, fk) in to.foreign_keys() {
        let current = from.foreign_keys().get(name);
        if current.is_some_and(|current| current.same_definition(fk)) {
            continue;
        }

        let mut parts = add_key_columns(to, fk, draft);
        if current.is_some() {
            parts.push(format!("DROP FOREIGN KEY `{name}`"));
        }
        parts.push(format!("ADD {}", fk.definition()));
        statements.push(alter_table(from.name(), &parts));
    }
}

fn add_key_columns<'a>(to: &'a Table, fk: &ForeignKey, draft: &mut Draft<'a>) -> Vec<String> {
    let mut parts = Vec::new();
    for key in &fk.key_fields {
        if draft.fields.contains_key(key.as_str()) {
            continue;
        }
        let Some((name, field)) = to.fields().get_key_value(key) else {
            continue;
        };
        parts.push(format!("ADD COLUMN {}", field.definition()));
        draft.fields.insert(name.as_str(), field);

        for (idx_name, index) in to.indexes() {
            if index.contains(key) && !draft.indexes.contains_key(idx_name.as_str()) {
                parts.push(format!("ADD {}", index.definition()));
                draft.indexes.insert(idx_name.as_str(), index);
            }
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::TableAssembler;
    use pretty_assertions::assert_eq;

    const ORDERS_V1: &str = "CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `note` varchar(64) DEFAULT NULL,
  `legacy` int(11),
  PRIMARY KEY (`id`),
  KEY `idx_legacy` (`legacy`),
  KEY `idx_note` (`note`)
) ENGINE=InnoDB;";

    const ORDERS_V2: &str = "CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `note` varchar(255) DEFAULT NULL,
  `user_id` int(11) NOT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_note` (`note`,`id`),
  KEY `idx_user` (`user_id`),
  CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE
) ENGINE=InnoDB;";

    fn assemble(sql: &str) -> Table {
        TableAssembler::new().assemble(sql).unwrap()
    }

    #[test]
    fn test_same_definition() {
        let a = assemble(ORDERS_V1);
        let b = assemble(ORDERS_V1);
        assert!(a.same_definition(&b));
        assert!(!a.same_definition(&assemble(ORDERS_V2)));

        let mut f = Field::new("note", "varchar(64)");
        assert!(f.same_definition(&Field::new("note", "varchar(64)")));
        f.attributes = "NOT NULL".to_string();
        assert!(!f.same_definition(&Field::new("note", "varchar(64)")));

        assert!(Index::new("k", false, ["a"]).same_definition(&Index::new("k", false, ["a"])));
        assert!(!Index::new("k", false, ["a"]).same_definition(&Index::new("k", true, ["a"])));
    }

    #[test]
    fn test_no_change_for_equal_tables() {
        let a = assemble(ORDERS_V1);
        let options = ChangeOptions {
            purge: true,
            include_foreign_keys: true,
        };
        assert!(change_statements(&a, &a.clone(), &options).is_empty());
        assert_eq!(change_query(&a, &a.clone(), &options), None);
    }

    #[test]
    fn test_change_without_purge_or_foreign_keys() {
        let from = assemble(ORDERS_V1);
        let to = assemble(ORDERS_V2);
        let query = change_query(&from, &to, &ChangeOptions::default()).unwrap();
        assert_eq!(
            query,
            "ALTER TABLE `orders`
CHANGE COLUMN `note` `note` varchar(255) DEFAULT NULL,
ADD COLUMN `user_id` int(11) NOT NULL,
DROP INDEX `idx_note`,
ADD KEY `idx_note` (`note`,`id`),
ADD KEY `idx_user` (`user_id`);"
        );
    }

    #[test]
    fn test_change_with_purge_and_foreign_keys() {
        let from = assemble(ORDERS_V1);
        let to = assemble(ORDERS_V2);
        let options = ChangeOptions {
            purge: true,
            include_foreign_keys: true,
        };
        let statements = change_statements(&from, &to, &options);
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE `orders`
ADD COLUMN `user_id` int(11) NOT NULL,
ADD KEY `idx_user` (`user_id`),
ADD CONSTRAINT `fk_orders_user` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE;"
                    .to_string(),
                "ALTER TABLE `orders`
CHANGE COLUMN `note` `note` varchar(255) DEFAULT NULL,
DROP COLUMN `legacy`,
DROP INDEX `idx_legacy`,
DROP INDEX `idx_note`,
ADD KEY `idx_note` (`note`,`id`);"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn test_redefined_and_purged_foreign_keys() {
        let mut from = Table::new("items");
        from.add_field(Field::new("order_id", "int"));
        from.add_foreign_key(ForeignKey::new("fk_order", "order_id", "orders", "id"));
        from.add_foreign_key(ForeignKey::new("fk_old", "order_id", "archive", "id"));

        let mut to = Table::new("items");
        to.add_field(Field::new("order_id", "int"));
        let mut fk = ForeignKey::new("fk_order", "order_id", "orders", "id");
        fk.on_delete = Some(crate::model::ReferentialAction::Cascade);
        to.add_foreign_key(fk);

        let options = ChangeOptions {
            purge: true,
            include_foreign_keys: true,
        };
        assert_eq!(
            change_statements(&from, &to, &options),
            vec![
                "ALTER TABLE `items`\nDROP FOREIGN KEY `fk_old`;".to_string(),
                "ALTER TABLE `items`\nDROP FOREIGN KEY `fk_order`,\nADD CONSTRAINT `fk_order` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`) ON DELETE CASCADE;".to_string(),
            ]
        );

        let without_fks = ChangeOptions {
            purge: true,
            include_foreign_keys: false,
        };
        assert!(change_statements(&from, &to, &without_fks).is_empty());
    }

    #[test]
    fn test_primary_key_changes() {
        let mut parts = Vec::new();
        let id = PrimaryKey::new(["id"]);
        let pair = PrimaryKey::new(["id", "shop_id"]);

        compare_primary_key(Some(&id), Some(&id), &mut parts);
        assert!(parts.is_empty());

        compare_primary_key(Some(&id), Some(&pair), &mut parts);
        assert_eq!(parts, vec!["DROP PRIMARY KEY", "ADD PRIMARY KEY (`id`,`shop_id`)"]);

        parts.clear();
        compare_primary_key(Some(&id), None, &mut parts);
        assert_eq!(parts, vec!["DROP PRIMARY KEY"]);

        parts.clear();
        compare_primary_key(None, Some(&id), &mut parts);
        assert_eq!(parts, vec!["ADD PRIMARY KEY (`id`)"]);
    }
}
