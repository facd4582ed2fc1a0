//! Table collection: owns every table and maintains the foreign-key graph.
//!
//! Tables are stored by name and every cross-table link (a foreign key's
//! resolved reference, `depends_on`, `dependants`) is a table name looked up
//! in the same collection. `depends_on` and `dependants` are kept as inverse
//! views of each other by every mutating method here.
//!
//! A foreign key that references its own table is resolved but adds no
//! dependency edge, so it never blocks creation order.

use indexmap::IndexMap;

use crate::ddl::TableAssembler;
use crate::error::SchemaError;
use crate::model::{ForeignKey, Table};

#[derive(Debug, Clone, Default)]
pub struct TableCollection {
    name: String,
    charset: String,
    tables: IndexMap<String, Table>,
}

impl TableCollection {
    pub fn new(name: impl Into<String>, charset: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            charset: charset.into(),
            tables: IndexMap::new(),
        }
    }

    /// Assembles, adds and links every statement into this collection.
    /// Duplicates, missing targets and dangling reference fields are errors.
    ///
    /// ```
    /// use tablegraph::{TableAssembler, TableCollection};
    ///
    /// let assembler = TableAssembler::new();
    /// let db = assembler
    ///     .assemble_collection("CREATE DATABASE `shop`;")?
    ///     .with_statements(&assembler, ["CREATE TABLE `tags` (\n  `id` int\n);"])?;
    /// assert_eq!(db.creation_order_names()?, vec!["tags"]);
    /// # Ok::<(), tablegraph::SchemaError>(())
    /// ```
    pub fn with_statements<I, S>(mut self, assembler: &TableAssembler, statements: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for statement in statements {
            self.add_table_from_statement(assembler, statement.as_ref(), true)?;
        }
        self.link_all_tables(true)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Tables in insertion order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn add_table(&mut self, table: Table, error_on_duplicate: bool) -> Result<(), SchemaError> {
        self.insert_table(table, error_on_duplicate).map(|_| ())
    }

    pub fn add_table_from_statement(
        &mut self,
        assembler: &TableAssembler,
        statement: &str,
        error_on_duplicate: bool,
    ) -> Result<&Table, SchemaError> {
        let table = assembler.assemble(statement)?;
        let idx = self.insert_table(table, error_on_duplicate)?;
        Ok(&self.tables[idx])
    }

    fn insert_table(&mut self, mut table: Table, error_on_duplicate: bool) -> Result<usize, SchemaError> {
        let name = table.name().to_string();
        if self.tables.contains_key(&name) {
            if error_on_duplicate {
                return Err(SchemaError::DuplicateTable {
                    table: name,
                    collection: self.name.clone(),
                });
            }
            tracing::debug!(table = %name, "replacing existing table");
            self.unlink_table(&name);
        }

        table.depends_on.clear();
        table.dependants.clear();

        let mut targets = Vec::new();
        for fk in table.foreign_keys_mut() {
            fk.reference = None;
            if fk.reference_table == name {
                fk.reference = Some(name.clone());
            } else if self.tables.contains_key(&fk.reference_table) {
                fk.reference = Some(fk.reference_table.clone());
                targets.push(fk.reference_table.clone());
            } else {
                tracing::trace!(
                    table = %name,
                    constraint = %fk.name,
                    referenced_table = %fk.reference_table,
                    "foreign key left unresolved"
                );
            }
        }

        for target in targets {
            if let Some(parent) = self.tables.get_mut(&target) {
                parent.dependants.insert(name.clone());
            }
            table.depends_on.insert(target);
        }

        let (idx, _) = self.tables.insert_full(name, table);
        Ok(idx)
    }

    /// Resolves every unresolved foreign key in the collection.
    ///
    /// With `with_integrity_check`, a missing target table or a target field
    /// absent from its table is an error, for new and existing links alike.
    /// Without it, keys whose target table is absent stay unresolved.
    /// All keys are validated before any link is made, so an error leaves
    /// the collection unchanged.
    pub fn link_all_tables(&mut self, with_integrity_check: bool) -> Result<(), SchemaError> {
        let mut pending: Vec<(String, String, String)> = Vec::new();

        for table in self.tables.values() {
            for fk in table.foreign_keys().values() {
                let target_name = fk.reference().unwrap_or(fk.reference_table.as_str());
                let Some(target) = self.tables.get(target_name) else {
                    if with_integrity_check {
                        return Err(SchemaError::MissingReferencedTable {
                            table: table.name().to_string(),
                            constraint: fk.name.clone(),
                            referenced_table: fk.reference_table.clone(),
                        });
                    }
                    continue;
                };
                if with_integrity_check {
                    check_reference_field(table, fk, target)?;
                }
                if !fk.is_linked() {
                    pending.push((
                        table.name().to_string(),
                        fk.name.clone(),
                        target.name().to_string(),
                    ));
                }
            }
        }

        let linked = pending.len();
        for (table, constraint, target) in pending {
            self.link(&table, &constraint, &target);
        }
        tracing::debug!(collection = %self.name, linked, "linked tables");
        Ok(())
    }

    fn link(&mut self, table: &str, constraint: &str, target: &str) {
        let Some(source) = self.tables.get_mut(table) else {
            return;
        };
        if let Some(fk) = source.foreign_keys_mut().find(|fk| fk.name == constraint) {
            fk.reference = Some(target.to_string());
        }
        if table == target {
            return;
        }
        source.depends_on.insert(target.to_string());
        if let Some(parent) = self.tables.get_mut(target) {
            parent.dependants.insert(table.to_string());
        }
        tracing::trace!(table, constraint, referenced_table = target, "linked foreign key");
    }

    /// Detaches a table from its neighbours, leaving it in the collection.
    ///
    /// Foreign keys of dependant tables that resolve to this table are
    /// dropped, this table's own foreign keys become unresolved, and both
    /// dependency sets are emptied on every side. Returns the number of
    /// dropped foreign keys.
    pub fn unlink_table(&mut self, name: &str) -> usize {
        let Some(table) = self.tables.get_mut(name) else {
            return 0;
        };
        let depends_on = std::mem::take(&mut table.depends_on);
        let dependants = std::mem::take(&mut table.dependants);
        for fk in table.foreign_keys_mut() {
            fk.reference = None;
        }

        let mut dropped = 0;
        for dependant in &dependants {
            if let Some(child) = self.tables.get_mut(dependant) {
                let constraints = child.drop_foreign_keys_to(name);
                child.depends_on.shift_remove(name);
                if !constraints.is_empty() {
                    tracing::warn!(
                        table = %dependant,
                        referenced_table = %name,
                        constraints = ?constraints,
                        "dropped foreign keys to unlinked table"
                    );
                }
                dropped += constraints.len();
            }
        }
        for parent in &depends_on {
            if let Some(parent) = self.tables.get_mut(parent) {
                parent.dependants.shift_remove(name);
            }
        }
        dropped
    }

    /// Copies in every table of `source` this collection lacks, then links.
    ///
    /// Each copied table starts unlinked. A foreign key of a copied table
    /// must target a table present here or in `source`; otherwise nothing is
    /// added and [`SchemaError::MissingReferencedTable`] is returned. Tables
    /// already present are left as they are. Returns the added names in
    /// `source` order.
    pub fn add_missing_tables(&mut self, source: &TableCollection) -> Result<Vec<String>, SchemaError> {
        let missing: Vec<&Table> = source.tables().filter(|t| !self.contains(t.name())).collect();

        for table in &missing {
            for fk in table.foreign_keys().values() {
                let target = fk.reference_table.as_str();
                if target != table.name() && !self.contains(target) && !source.contains(target) {
                    return Err(SchemaError::MissingReferencedTable {
                        table: table.name().to_string(),
                        constraint: fk.name.clone(),
                        referenced_table: fk.reference_table.clone(),
                    });
                }
            }
        }

        let mut added = Vec::with_capacity(missing.len());
        for table in missing {
            self.insert_table(table.clone(), true)?;
            added.push(table.name().to_string());
        }
        self.link_all_tables(false)?;
        tracing::debug!(collection = %self.name, added = added.len(), "added missing tables");
        Ok(added)
    }

    /// Removes a table if present, unlinking it first.
    pub fn remove_table(&mut self, name: &str) -> Option<Table> {
        if !self.tables.contains_key(name) {
            return None;
        }
        self.unlink_table(name);
        let removed = self.tables.shift_remove(name);
        tracing::debug!(table = %name, "removed table");
        removed
    }

    pub fn remove_table_by_name(&mut self, name: &str) -> Result<Table, SchemaError> {
        self.remove_table(name).ok_or_else(|| SchemaError::UnknownTable {
            table: name.to_string(),
            collection: self.name.clone(),
        })
    }

    /// Checks that every resolved reference names a table in the collection
    /// and that `depends_on` / `dependants` mirror each other.
    pub fn is_consistent(&self) -> bool {
        self.tables.values().all(|table| {
            let name = table.name();
            let references_ok = table
                .foreign_keys()
                .values()
                .filter_map(ForeignKey::reference)
                .all(|r| self.tables.contains_key(r));
            let parents_ok = table.depends_on().iter().all(|p| {
                self.tables
                    .get(p)
                    .is_some_and(|parent| parent.dependants().contains(name))
            });
            let children_ok = table.dependants().iter().all(|c| {
                self.tables
                    .get(c)
                    .is_some_and(|child| child.depends_on().contains(name))
            });
            references_ok && parents_ok && children_ok
        })
    }
}

fn check_reference_field(table: &Table, fk: &ForeignKey, target: &Table) -> Result<(), SchemaError> {
    match fk.reference_fields.iter().find(|f| !target.has_field(f)) {
        Some(missing) => Err(SchemaError::DanglingFieldReference {
            table: table.name().to_string(),
            constraint: fk.name.clone(),
            referenced_table: target.name().to_string(),
            field: missing.clone(),
        }),
        None => Ok(()),
    }
}
