//! Creation order resolution over a [`TableCollection`].

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use unicode_width::UnicodeWidthStr;

use crate::error::SchemaError;
use crate::graph::TableCollection;
use crate::model::Table;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderConfig {
    /// Give up after this many sweeps. `None` runs until done or stuck.
    pub max_sweeps: Option<usize>,
}

impl OrderConfig {
    pub fn with_max_sweeps(mut self, limit: usize) -> Self {
        self.max_sweeps = Some(limit);
        self
    }
}

/// Tables left over when resolution got stuck, each with the dependencies it
/// is still waiting on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDiagnosis {
    blocked: BTreeMap<String, Vec<String>>,
}

impl OrderDiagnosis {
    pub fn blocked(&self) -> &BTreeMap<String, Vec<String>> {
        &self.blocked
    }

    pub fn waiting_on(&self, table: &str) -> Option<&[String]> {
        self.blocked.get(table).map(Vec::as_slice)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.blocked.keys().map(String::as_str)
    }

    /// Blocked tables with nothing left to wait on. Non-empty only if the
    /// dependency sets are out of sync with the collection.
    pub fn inconsistent(&self) -> impl Iterator<Item = &str> {
        self.blocked
            .iter()
            .filter(|(_, waiting)| waiting.is_empty())
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }
}

impl fmt::Display for OrderDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.tables().map(UnicodeWidthStr::width).max().unwrap_or(0);
        for (i, (name, waiting)) in self.blocked.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let pad = " ".repeat(width - name.width());
            if waiting.is_empty() {
                write!(f, "  {name}{pad}  unknown reason, no unresolved dependency")?;
            } else {
                write!(f, "  {name}{pad}  waiting on {}", waiting.join(", "))?;
            }
        }
        Ok(())
    }
}

impl TableCollection {
    pub fn creation_order(&self) -> Result<Vec<&Table>, SchemaError> {
        self.creation_order_with(&OrderConfig::default())
    }

    pub fn creation_order_names(&self) -> Result<Vec<&str>, SchemaError> {
        Ok(self
            .creation_order()?
            .into_iter()
            .map(Table::name)
            .collect())
    }

    /// Orders tables so each one follows every table it depends on.
    ///
    /// Each sweep walks all tables in insertion order and marks those whose
    /// dependencies are already marked. A sweep that marks nothing while
    /// tables remain ends in [`SchemaError::UnresolvableOrder`].
    pub fn creation_order_with(&self, config: &OrderConfig) -> Result<Vec<&Table>, SchemaError> {
        let mut created: HashSet<&str> = HashSet::with_capacity(self.len());
        let mut order: Vec<&Table> = Vec::with_capacity(self.len());
        let mut sweeps = 0;

        while order.len() < self.len() {
            if let Some(limit) = config.max_sweeps {
                if sweeps >= limit {
                    return Err(SchemaError::SweepLimitExceeded { limit });
                }
            }
            sweeps += 1;

            let before = order.len();
            for table in self.tables() {
                if created.contains(table.name()) {
                    continue;
                }
                if table.depends_on().iter().all(|d| created.contains(d.as_str())) {
                    created.insert(table.name());
                    order.push(table);
                }
            }

            if order.len() == before {
                let diagnosis = self.diagnose(&created);
                tracing::warn!(
                    collection = %self.name(),
                    blocked = diagnosis.len(),
                    sweeps,
                    "creation order unresolvable"
                );
                return Err(SchemaError::UnresolvableOrder(diagnosis));
            }
        }

        tracing::debug!(collection = %self.name(), tables = order.len(), sweeps, "resolved creation order");
        Ok(order)
    }

    fn diagnose(&self, created: &HashSet<&str>) -> OrderDiagnosis {
        let blocked = self
            .tables()
            .filter(|t| !created.contains(t.name()))
            .map(|t| {
                let mut waiting: Vec<String> = t
                    .depends_on()
                    .iter()
                    .filter(|d| !created.contains(d.as_str()))
                    .cloned()
                    .collect();
                waiting.sort();
                (t.name().to_string(), waiting)
            })
            .collect();
        OrderDiagnosis { blocked }
    }
}
