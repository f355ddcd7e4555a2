//! Source rows, column renames and the renamed records built from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// One row read from a legacy table, in declared column order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub values: Vec<SqlValue>,
}

impl SourceRow {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Source column name to destination field name renames.
///
/// Keys are either bare column names (`St`) or table-qualified names
/// (`ClientsData.St`). Columns without an entry keep their name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    renames: BTreeMap<String, String>,
}

impl FieldMapping {
    /// Identity mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename, replacing any earlier rename for the same key.
    pub fn rename(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.renames.insert(column.into(), field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    /// Iterate over `(column key, field)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.renames.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Destination field name for `column` of `table`.
    ///
    /// The qualified key wins over the bare key.
    pub fn field_for<'a>(&'a self, table: &str, column: &'a str) -> &'a str {
        let qualified = format!("{}.{}", table, column);
        self.renames
            .get(&qualified)
            .or_else(|| self.renames.get(column))
            .map(String::as_str)
            .unwrap_or(column)
    }

    /// Resolve every column of `table` to its destination field name.
    pub fn resolve(&self, table: &str, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .map(|c| self.field_for(table, c).to_string())
            .collect()
    }

    /// Zip resolved field names with one row's values.
    pub fn apply(&self, fields: &[String], row: SourceRow) -> Record {
        let mut record = Record::with_capacity(fields.len());
        for (field, value) in fields.iter().zip(row.values) {
            record.insert(field.clone(), value);
        }
        record
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            renames: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Field name to value map for one row, after renaming.
///
/// Keeps source column order; inserting an existing name replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    pub fn insert(&mut self, name: String, value: SqlValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove and return a field's value.
    pub fn take(&mut self, name: &str) -> Option<SqlValue> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }
}

impl<K: Into<String>> FromIterator<(K, SqlValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, SqlValue)>>(iter: I) -> Self {
        let mut record = Record::default();
        for (k, v) in iter {
            record.insert(k.into(), v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlNullType;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_mapping_is_identity() {
        let mapping = FieldMapping::new();
        let cols = columns(&["CLIENTNAME", "Type", "St"]);
        assert_eq!(mapping.resolve("ClientsData", &cols), cols);
    }

    #[test]
    fn test_qualified_key_renames_column() {
        let mapping = FieldMapping::new().rename("ClientsData.St", "status");
        let fields = mapping.resolve("ClientsData", &columns(&["CLIENTNAME", "St"]));
        assert_eq!(fields, vec!["CLIENTNAME", "status"]);

        let record = mapping.apply(
            &fields,
            SourceRow::new(vec![SqlValue::from("Acme"), SqlValue::from("A")]),
        );
        assert_eq!(record.get("status"), Some(&SqlValue::from("A")));
        assert!(!record.contains("St"));
    }

    #[test]
    fn test_qualified_key_only_applies_to_its_table() {
        let mapping = FieldMapping::new().rename("ClientsData.St", "status");
        assert_eq!(mapping.field_for("HistData", "St"), "St");
    }

    #[test]
    fn test_qualified_key_wins_over_bare_key() {
        let mapping = FieldMapping::new()
            .rename("St", "state")
            .rename("ClientsData.St", "status");
        assert_eq!(mapping.field_for("ClientsData", "St"), "status");
        assert_eq!(mapping.field_for("Other", "St"), "state");
    }

    #[test]
    fn test_later_column_wins_on_collision() {
        let mapping = FieldMapping::new().rename("Name2", "Name");
        let fields = mapping.resolve("T", &columns(&["Name", "Name2"]));
        let record = mapping.apply(
            &fields,
            SourceRow::new(vec![SqlValue::from("first"), SqlValue::from("second")]),
        );
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Name"), Some(&SqlValue::from("second")));
    }

    #[test]
    fn test_record_keeps_column_order() {
        let record: Record = vec![
            ("b", SqlValue::I64(1)),
            ("a", SqlValue::Null(SqlNullType::Untyped)),
        ]
        .into_iter()
        .collect();
        assert_eq!(record.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_mapping_deserializes_from_yaml_map() {
        let mapping: FieldMapping = serde_yaml::from_str("ClientsData.St: status\n").unwrap();
        assert_eq!(mapping.field_for("ClientsData", "St"), "status");
    }
}
