//! Result containers produced by analyses and aggregated across a study.
//!
//! A [`ResultSet`] is an ordered key -> element mapping with an explicit
//! display order. Elements are scalars with units, free text, tables, nested
//! sections (one per study instance in a combined set) or failure markers
//! recording a run that did not produce results.

use serde::{Deserialize, Serialize};

/// A named scalar result with unit and description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarResult {
    pub value: f64,
    pub unit: String,
    pub description: String,
}

/// A row-major numeric table, used for sweep summary projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub description: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl TabularResult {
    /// Extract one column by label.
    #[must_use]
    pub fn column(&self, label: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == label)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

/// One typed element of a result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultElement {
    Scalar(ScalarResult),
    Text(String),
    Table(TabularResult),
    /// Nested result set, e.g. one study instance inside the combined set
    Section(ResultSet),
    /// Marker for a run that failed; carries the error message
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub name: String,
    pub order: u32,
    pub element: ResultElement,
}

/// Ordered key -> element mapping with explicit display order.
///
/// Insertion assigns increasing order values; `iter` yields entries sorted
/// by order, so aggregation that inserts in any completion order still
/// displays deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    entries: Vec<ResultEntry>,
    next_order: u32,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element under a name, assigning the next display order.
    /// Re-inserting an existing name replaces the element but keeps its order.
    pub fn insert(&mut self, name: impl Into<String>, element: ResultElement) {
        let name = name.into();
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == name) {
            existing.element = element;
            return;
        }
        let order = self.next_order;
        self.next_order += 1;
        self.entries.push(ResultEntry {
            name,
            order,
            element,
        });
    }

    /// Insert with an explicit display order.
    pub fn insert_with_order(&mut self, name: impl Into<String>, order: u32, element: ResultElement) {
        let name = name.into();
        self.entries.retain(|e| e.name != name);
        self.next_order = self.next_order.max(order + 1);
        self.entries.push(ResultEntry {
            name,
            order,
            element,
        });
    }

    /// Convenience: insert a scalar result.
    pub fn insert_scalar(
        &mut self,
        name: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.insert(
            name,
            ResultElement::Scalar(ScalarResult {
                value,
                unit: unit.into(),
                description: description.into(),
            }),
        );
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResultElement> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.element)
    }

    /// Read a named scalar's value, if present and scalar-typed.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ResultElement::Scalar(s) => Some(s.value),
            _ => None,
        }
    }

    /// Iterate over entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        let mut sorted: Vec<&ResultEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        sorted.into_iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
