//! Schema entities: tables and the columns, keys and constraints they own.

use indexmap::{IndexMap, IndexSet};

use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub datatype: String,
    pub default_value: Option<String>,
    /// Everything after the datatype, as written.
    pub attributes: String,
    pub nullable: bool,
    pub auto_increment: bool,
    pub is_pk: bool,
    pub signed: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
            default_value: None,
            attributes: String::new(),
            nullable: true,
            auto_increment: false,
            is_pk: false,
            signed: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrimaryKey {
    /// Names of the member fields, in declaration order.
    pub fields: Vec<String>,
}

impl PrimaryKey {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub fields: Vec<String>,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, unique: bool, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            unique,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }
}

/// Action taken on the referencing rows when the referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    pub fn from_sql(s: &str) -> Option<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_uppercase().as_str() {
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            "NO ACTION" => Some(Self::NoAction),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

/// A foreign key constraint. `key_fields[i]` references `reference_fields[i]`;
/// both lists hold one column unless the key is composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub key_fields: Vec<String>,
    pub reference_table: String,
    pub reference_fields: Vec<String>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    /// Resolved target table, set by the owning collection.
    pub(crate) reference: Option<String>,
}

impl ForeignKey {
    /// Creates an unresolved single-column foreign key.
    pub fn new(
        name: impl Into<String>,
        key_field: impl Into<String>,
        reference_table: impl Into<String>,
        reference_field: impl Into<String>,
    ) -> Self {
        Self::composite(name, [key_field], reference_table, [reference_field])
    }

    pub fn composite<K, R>(
        name: impl Into<String>,
        key_fields: K,
        reference_table: impl Into<String>,
        reference_fields: R,
    ) -> Self
    where
        K: IntoIterator,
        K::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            name: name.into(),
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            reference_table: reference_table.into(),
            reference_fields: reference_fields.into_iter().map(Into::into).collect(),
            on_delete: None,
            on_update: None,
            reference: None,
        }
    }

    /// Name of the table this key is linked to, if resolved.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn is_linked(&self) -> bool {
        self.reference.is_some()
    }
}

/// A table definition.
///
/// The entity maps are keyed by each entity's own name and are only
/// reachable for mutation through the `add_*` / `set_*` methods. The
/// `depends_on` and `dependants` sets hold table names and are maintained by
/// [`TableCollection`](crate::graph::TableCollection) once the table is
/// added to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    statement: String,
    options: String,
    fields: IndexMap<String, Field>,
    primary_key: Option<PrimaryKey>,
    indexes: IndexMap<String, Index>,
    foreign_keys: IndexMap<String, ForeignKey>,
    pub(crate) depends_on: IndexSet<String>,
    pub(crate) dependants: IndexSet<String>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statement: String::new(),
            options: String::new(),
            fields: IndexMap::new(),
            primary_key: None,
            indexes: IndexMap::new(),
            foreign_keys: IndexMap::new(),
            depends_on: IndexSet::new(),
            dependants: IndexSet::new(),
        }
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = statement.into();
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Statement text the table was assembled from (empty when built directly).
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Table options following the clause list, e.g. `ENGINE=InnoDB DEFAULT CHARSET=utf8`.
    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn has_foreign_key(&self, name: &str) -> bool {
        self.foreign_keys.contains_key(name)
    }

    pub fn primary_key(&self) -> Option<&PrimaryKey> {
        self.primary_key.as_ref()
    }

    pub fn indexes(&self) -> &IndexMap<String, Index> {
        &self.indexes
    }

    pub fn foreign_keys(&self) -> &IndexMap<String, ForeignKey> {
        &self.foreign_keys
    }

    /// Tables this table references.
    pub fn depends_on(&self) -> &IndexSet<String> {
        &self.depends_on
    }

    /// Tables referencing this table.
    pub fn dependants(&self) -> &IndexSet<String> {
        &self.dependants
    }

    /// Adds a field, returning any field previously stored under the same name.
    pub fn add_field(&mut self, field: Field) -> Option<Field> {
        self.fields.insert(field.name.clone(), field)
    }

    /// Sets the primary key, flagging its member fields.
    pub fn set_primary_key(&mut self, pk: PrimaryKey) -> Result<(), SchemaError> {
        self.check_fields("PRIMARY KEY", &pk.fields)?;
        for field in self.fields.values_mut() {
            field.is_pk = pk.contains(&field.name);
        }
        self.primary_key = Some(pk);
        Ok(())
    }

    pub fn add_index(&mut self, index: Index) -> Result<Option<Index>, SchemaError> {
        self.check_fields(&format!("Index `{}`", index.name), &index.fields)?;
        Ok(self.indexes.insert(index.name.clone(), index))
    }

    /// Adds a foreign key as an unresolved stub.
    pub fn add_foreign_key(&mut self, mut fk: ForeignKey) -> Option<ForeignKey> {
        fk.reference = None;
        self.foreign_keys.insert(fk.name.clone(), fk)
    }

    pub(crate) fn foreign_keys_mut(&mut self) -> impl Iterator<Item = &mut ForeignKey> {
        self.foreign_keys.values_mut()
    }

    /// Drops every foreign key resolved to `target`, returning their names.
    pub(crate) fn drop_foreign_keys_to(&mut self, target: &str) -> Vec<String> {
        let mut dropped = Vec::new();
        self.foreign_keys.retain(|name, fk| {
            if fk.reference.as_deref() == Some(target) {
                dropped.push(name.clone());
                false
            } else {
                true
            }
        });
        dropped
    }

    fn check_fields(&self, clause: &str, names: &[String]) -> Result<(), SchemaError> {
        match names.iter().find(|n| !self.fields.contains_key(n.as_str())) {
            Some(missing) => Err(SchemaError::UnknownFieldReference {
                clause: clause.to_string(),
                field: missing.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        let mut t = Table::new("users");
        t.add_field(Field::new("id", "int(11)"));
        t.add_field(Field::new("email", "varchar(255)"));
        t
    }

    #[test]
    fn test_field_defaults() {
        let f = Field::new("id", "int");
        assert!(f.nullable);
        assert!(f.signed);
        assert!(!f.auto_increment);
        assert!(!f.is_pk);
        assert_eq!(f.default_value, None);
    }

    #[test]
    fn test_primary_key_flags_fields() {
        let mut t = users();
        t.set_primary_key(PrimaryKey::new(["id"])).unwrap();
        assert!(t.field("id").unwrap().is_pk);
        assert!(!t.field("email").unwrap().is_pk);

        t.set_primary_key(PrimaryKey::new(["email"])).unwrap();
        assert!(!t.field("id").unwrap().is_pk);
        assert!(t.field("email").unwrap().is_pk);
    }

    #[test]
    fn test_primary_key_unknown_field() {
        let mut t = users();
        let err = t.set_primary_key(PrimaryKey::new(["uuid"])).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldReference { ref field, .. } if field == "uuid"));
        assert!(t.primary_key().is_none());
    }

    #[test]
    fn test_index_keyed_by_name() {
        let mut t = users();
        t.add_index(Index::new("uk_email", true, ["email"])).unwrap();
        let prev = t.add_index(Index::new("uk_email", false, ["id", "email"])).unwrap();
        assert!(prev.unwrap().unique);
        assert_eq!(t.indexes().len(), 1);
        assert!(t.indexes()["uk_email"].contains("id"));

        assert!(t.add_index(Index::new("idx_nope", false, ["nope"])).is_err());
    }

    #[test]
    fn test_add_foreign_key_resets_reference() {
        let mut t = users();
        let mut fk = ForeignKey::new("fk_org", "org_id", "orgs", "id");
        fk.reference = Some("orgs".to_string());
        t.add_foreign_key(fk);
        assert!(!t.foreign_keys()["fk_org"].is_linked());
        assert!(t.has_foreign_key("fk_org"));
    }

    #[test]
    fn test_composite_foreign_key_columns() {
        let fk = ForeignKey::composite("fk_item_order", ["order_id", "shop_id"], "orders", ["id", "shop_id"]);
        assert_eq!(fk.key_fields, vec!["order_id", "shop_id"]);
        assert_eq!(fk.reference_fields, vec!["id", "shop_id"]);

        let single = ForeignKey::new("fk_user", "user_id", "users", "id");
        assert_eq!(single.key_fields, vec!["user_id"]);
        assert_eq!(single.reference_fields, vec!["id"]);
    }

    #[test]
    fn test_referential_action_from_sql() {
        assert_eq!(ReferentialAction::from_sql("cascade"), Some(ReferentialAction::Cascade));
        assert_eq!(ReferentialAction::from_sql("SET  NULL"), Some(ReferentialAction::SetNull));
        assert_eq!(ReferentialAction::from_sql("no action"), Some(ReferentialAction::NoAction));
        assert_eq!(ReferentialAction::from_sql("explode"), None);
    }
}
