//! Destination entity schemas and the record builder.
//!
//! An [`EntitySchema`] describes one destination collection: its field names,
//! kinds, nullability and defaults. [`EntitySchema::build`] turns a renamed
//! [`Record`] into an [`EntityRow`] whose values are aligned with the schema's
//! fields, or fails with a [`ConstructionError`] naming the offending field.
//!
//! Every schema starts with an `id` field of kind [`FieldKind::AutoId`]: when
//! a record supplies an id it is written, otherwise the destination assigns
//! one.

mod models;

pub use models::{
    builtin, client, consultant_deal, consultant_vacation, hist_data, page_permissions,
    ENTITY_NAMES,
};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::core::{Record, SqlNullType, SqlValue};
use crate::error::ConstructionError;

/// Name of the implicit primary key field.
pub const ID_FIELD: &str = "id";

/// Storage kind of a destination field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Auto-assigned integer primary key.
    AutoId,
    /// 32-bit integer.
    Integer,
    /// Text, optionally length-limited (in characters).
    Text { max_length: Option<usize> },
    /// Fixed-point decimal.
    Decimal { max_digits: u32, decimal_places: u32 },
}

impl FieldKind {
    fn null_type(&self) -> SqlNullType {
        match self {
            FieldKind::AutoId => SqlNullType::I64,
            FieldKind::Integer => SqlNullType::I32,
            FieldKind::Text { .. } => SqlNullType::String,
            FieldKind::Decimal { .. } => SqlNullType::Decimal,
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldKind::AutoId | FieldKind::Integer => "integer".to_string(),
            FieldKind::Text { .. } => "text".to_string(),
            FieldKind::Decimal {
                max_digits,
                decimal_places,
            } => format!("decimal({},{})", max_digits, decimal_places),
        }
    }
}

/// One field of an entity schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: Option<SqlValue>,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: false,
            default: None,
        }
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn text(name: &str, max_length: usize) -> Self {
        Self::new(
            name,
            FieldKind::Text {
                max_length: Some(max_length),
            },
        )
    }

    /// Unbounded text.
    pub fn long_text(name: &str) -> Self {
        Self::new(name, FieldKind::Text { max_length: None })
    }

    pub fn decimal(name: &str, max_digits: u32, decimal_places: u32) -> Self {
        Self::new(
            name,
            FieldKind::Decimal {
                max_digits,
                decimal_places,
            },
        )
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<SqlValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn is_auto_id(&self) -> bool {
        self.kind == FieldKind::AutoId
    }
}

/// Shape of one destination collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    name: String,
    collection: String,
    fields: Vec<FieldSpec>,
}

impl EntitySchema {
    /// New schema with only the implicit `id` field.
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            fields: vec![FieldSpec::new(ID_FIELD, FieldKind::AutoId)],
        }
    }

    /// Append a field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Entity type name (e.g. `Client`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination table name (e.g. `myapp_client`).
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Build a destination row from a renamed record.
    ///
    /// Accepts any subset and order of the schema's fields. Missing fields
    /// take their default, or NULL when nullable; otherwise construction
    /// fails.
    pub fn build(&self, mut record: Record) -> Result<EntityRow, ConstructionError> {
        if let Some(unknown) = record.names().find(|n| self.field_index(n).is_none()) {
            return Err(ConstructionError::UnknownField {
                entity: self.name.clone(),
                field: unknown.to_string(),
            });
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let value = match record.take(&spec.name) {
                Some(v) => self.coerce(spec, v)?,
                None => self.missing(spec)?,
            };
            values.push(value);
        }

        Ok(EntityRow { values })
    }

    /// Split rows into consecutive runs that write the same columns.
    ///
    /// Rows carrying an explicit id write the `id` column, rows without one
    /// leave it to the destination. Order is preserved across runs.
    pub fn insert_runs<'r>(&self, rows: &'r [EntityRow]) -> Vec<InsertRun<'r>> {
        let mut runs = Vec::new();
        let mut start = 0;
        while start < rows.len() {
            let columns = self.written_columns(&rows[start]);
            let mut end = start + 1;
            while end < rows.len() && self.written_columns(&rows[end]) == columns {
                end += 1;
            }
            runs.push(InsertRun {
                columns,
                rows: &rows[start..end],
            });
            start = end;
        }
        runs
    }

    fn written_columns(&self, row: &EntityRow) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(i, f)| !f.is_auto_id() || !row.values[*i].is_null())
            .map(|(i, _)| i)
            .collect()
    }

    fn missing(&self, spec: &FieldSpec) -> Result<SqlValue, ConstructionError> {
        if let Some(default) = &spec.default {
            return Ok(default.clone());
        }
        if spec.nullable || spec.is_auto_id() {
            return Ok(SqlValue::Null(spec.kind.null_type()));
        }
        Err(ConstructionError::MissingField {
            entity: self.name.clone(),
            field: spec.name.clone(),
        })
    }

    fn coerce(&self, spec: &FieldSpec, value: SqlValue) -> Result<SqlValue, ConstructionError> {
        if value.is_null() {
            if spec.nullable || spec.is_auto_id() {
                return Ok(SqlValue::Null(spec.kind.null_type()));
            }
            return Err(ConstructionError::NullNotAllowed {
                entity: self.name.clone(),
                field: spec.name.clone(),
            });
        }

        let mismatch = |value: &SqlValue| ConstructionError::TypeMismatch {
            entity: self.name.clone(),
            field: spec.name.clone(),
            expected: spec.kind.describe(),
            found: format!("{} '{}'", value.type_name(), value),
        };

        match &spec.kind {
            FieldKind::AutoId => as_integer(&value)
                .map(SqlValue::I64)
                .ok_or_else(|| mismatch(&value)),
            FieldKind::Integer => as_integer(&value)
                .and_then(|v| i32::try_from(v).ok())
                .map(SqlValue::I32)
                .ok_or_else(|| mismatch(&value)),
            FieldKind::Text { max_length } => {
                let text = match &value {
                    SqlValue::Text(s) => s.clone(),
                    SqlValue::Bytes(_) => return Err(mismatch(&value)),
                    other => other.to_string(),
                };
                if let Some(max) = max_length {
                    let length = text.chars().count();
                    if length > *max {
                        return Err(ConstructionError::TooLong {
                            entity: self.name.clone(),
                            field: spec.name.clone(),
                            max_length: *max,
                            length,
                        });
                    }
                }
                Ok(SqlValue::Text(text))
            }
            FieldKind::Decimal {
                max_digits,
                decimal_places,
            } => {
                let decimal = as_decimal(&value).ok_or_else(|| mismatch(&value))?;
                let rounded = decimal.round_dp(*decimal_places);
                let integer_digits = max_digits.saturating_sub(*decimal_places);
                // No limit once 10^digits is beyond what a Decimal can hold.
                let fits = 10i128
                    .checked_pow(integer_digits)
                    .and_then(Decimal::from_i128)
                    .map_or(true, |limit| rounded.abs() < limit);
                if !fits {
                    return Err(ConstructionError::Overflow {
                        entity: self.name.clone(),
                        field: spec.name.clone(),
                        value: value.to_string(),
                        max_digits: *max_digits,
                        decimal_places: *decimal_places,
                    });
                }
                Ok(SqlValue::Decimal(rounded))
            }
        }
    }
}

/// Validated values of one destination record, aligned with the schema's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRow {
    values: Vec<SqlValue>,
}

impl EntityRow {
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Value of the named field.
    pub fn get<'a>(&'a self, schema: &EntitySchema, field: &str) -> Option<&'a SqlValue> {
        schema.field_index(field).and_then(|i| self.values.get(i))
    }

    /// Explicit id, if the record supplied one.
    pub fn id(&self) -> Option<i64> {
        match self.values.first() {
            Some(SqlValue::I64(id)) => Some(*id),
            _ => None,
        }
    }

    /// Set the id a destination assigned. The id is always the first field.
    pub(crate) fn assign_id(&mut self, id: i64) {
        if let Some(slot) = self.values.first_mut() {
            *slot = SqlValue::I64(id);
        }
    }
}

/// Consecutive rows that share one column list.
#[derive(Debug)]
pub struct InsertRun<'r> {
    /// Indexes into the schema's fields.
    pub columns: Vec<usize>,
    pub rows: &'r [EntityRow],
}

impl InsertRun<'_> {
    /// Column names of this run.
    pub fn column_names<'s>(&self, schema: &'s EntitySchema) -> Vec<&'s str> {
        self.columns
            .iter()
            .map(|&i| schema.fields[i].name.as_str())
            .collect()
    }
}

fn as_integer(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::I32(v) => Some(i64::from(*v)),
        SqlValue::I64(v) => Some(*v),
        SqlValue::F64(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.2e18 => {
            Some(*v as i64)
        }
        SqlValue::Text(s) => s.trim().parse().ok(),
        SqlValue::Decimal(d) if d.fract().is_zero() => i64::try_from(*d).ok(),
        _ => None,
    }
}

fn as_decimal(value: &SqlValue) -> Option<Decimal> {
    match value {
        SqlValue::I32(v) => Some(Decimal::from(*v)),
        SqlValue::I64(v) => Some(Decimal::from(*v)),
        // Shortest round-trip text avoids binary float artefacts (7.1 -> 7.0999...).
        SqlValue::F64(v) if v.is_finite() => v.to_string().parse().ok(),
        SqlValue::Text(s) => s.trim().parse().ok(),
        SqlValue::Decimal(d) => Some(*d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: Vec<(&str, SqlValue)>) -> Record {
        fields.into_iter().collect()
    }

    fn deal() -> EntitySchema {
        consultant_deal("myapp_")
    }

    #[test]
    fn test_build_accepts_any_order() {
        let row = deal()
            .build(record(vec![
                ("DealDays", SqlValue::I64(12)),
                ("Year", SqlValue::I64(2023)),
                ("Consultant", SqlValue::from("Dana")),
                ("Month", SqlValue::I64(4)),
                ("ConsultantID", SqlValue::I64(7)),
            ]))
            .unwrap();
        let schema = deal();
        assert_eq!(row.get(&schema, "Consultant"), Some(&SqlValue::from("Dana")));
        assert_eq!(row.get(&schema, "DealDays"), Some(&SqlValue::I32(12)));
        assert_eq!(row.get(&schema, "id"), Some(&SqlValue::Null(SqlNullType::I64)));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = deal()
            .build(record(vec![("Bonus", SqlValue::I64(1))]))
            .unwrap_err();
        assert_eq!(
            err,
            ConstructionError::UnknownField {
                entity: "ConsultantDeal".into(),
                field: "Bonus".into()
            }
        );
    }

    #[test]
    fn test_missing_required_field() {
        let err = deal()
            .build(record(vec![("Consultant", SqlValue::from("Dana"))]))
            .unwrap_err();
        assert!(matches!(err, ConstructionError::MissingField { ref field, .. } if field == "ConsultantID"));
    }

    #[test]
    fn test_defaults_and_nullable_fields() {
        let schema = hist_data("myapp_");
        let row = schema
            .build(record(vec![
                ("Year", SqlValue::I64(2022)),
                ("MonthNo", SqlValue::I64(3)),
                ("Day", SqlValue::I64(14)),
                ("Month", SqlValue::from("March")),
                ("ConsultantID", SqlValue::I64(2)),
                ("Consultant", SqlValue::from("Lee")),
                ("Client", SqlValue::from("Acme")),
                ("ActivityType", SqlValue::from("Client")),
                ("WorkingHours", SqlValue::F64(7.5)),
            ]))
            .unwrap();
        assert_eq!(row.get(&schema, "Source"), Some(&SqlValue::from("Client Plus")));
        assert_eq!(
            row.get(&schema, "NOTES"),
            Some(&SqlValue::Null(SqlNullType::String))
        );
        assert_eq!(
            row.get(&schema, "WorkingHours"),
            Some(&SqlValue::Decimal(Decimal::new(750, 2)))
        );
    }

    #[test]
    fn test_null_into_required_field() {
        let err = deal()
            .build(record(vec![(
                "Consultant",
                SqlValue::Null(SqlNullType::Untyped),
            )]))
            .unwrap_err();
        assert!(matches!(err, ConstructionError::NullNotAllowed { .. }));
    }

    #[test]
    fn test_integer_coercions() {
        let schema = EntitySchema::new("T", "t").field(FieldSpec::integer("n"));
        let ok = |v: SqlValue| schema.build(record(vec![("n", v)]));

        assert_eq!(ok(SqlValue::from(" 42 ")).unwrap().values()[1], SqlValue::I32(42));
        assert_eq!(ok(SqlValue::F64(3.0)).unwrap().values()[1], SqlValue::I32(3));
        assert!(matches!(
            ok(SqlValue::F64(3.5)),
            Err(ConstructionError::TypeMismatch { .. })
        ));
        assert!(matches!(
            ok(SqlValue::from("abc")),
            Err(ConstructionError::TypeMismatch { .. })
        ));
        assert!(matches!(
            ok(SqlValue::I64(i64::from(i32::MAX) + 1)),
            Err(ConstructionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_text_coercions_and_length() {
        let schema = EntitySchema::new("T", "t").field(FieldSpec::text("s", 3));
        let build = |v: SqlValue| schema.build(record(vec![("s", v)]));

        assert_eq!(build(SqlValue::I64(12)).unwrap().values()[1], SqlValue::from("12"));
        assert!(matches!(
            build(SqlValue::from("abcd")),
            Err(ConstructionError::TooLong { max_length: 3, length: 4, .. })
        ));
        assert!(matches!(
            build(SqlValue::Bytes(vec![1, 2])),
            Err(ConstructionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_decimal_rounding_and_overflow() {
        let schema = EntitySchema::new("T", "t").field(FieldSpec::decimal("h", 5, 2));
        let build = |v: SqlValue| schema.build(record(vec![("h", v)]));

        assert_eq!(
            build(SqlValue::from("1.005")).unwrap().values()[1],
            SqlValue::Decimal(Decimal::new(100, 2))
        );
        assert_eq!(
            build(SqlValue::F64(7.1)).unwrap().values()[1],
            SqlValue::Decimal(Decimal::new(71, 1))
        );
        assert!(build(SqlValue::I64(999)).is_ok());
        assert!(matches!(
            build(SqlValue::I64(1000)),
            Err(ConstructionError::Overflow { .. })
        ));
    }

    #[test]
    fn test_wide_decimal_fields_do_not_overflow_the_limit() {
        for max_digits in [19, 20, 28, 29, 40] {
            let schema = EntitySchema::new("T", "t").field(FieldSpec::decimal("h", max_digits, 0));
            let row = schema
                .build(record(vec![("h", SqlValue::I64(i64::MAX))]))
                .unwrap();
            assert_eq!(row.values()[1], SqlValue::Decimal(Decimal::from(i64::MAX)));
        }

        let narrow = EntitySchema::new("T", "t").field(FieldSpec::decimal("h", 18, 0));
        assert!(matches!(
            narrow.build(record(vec![("h", SqlValue::I64(i64::MAX))])),
            Err(ConstructionError::Overflow { .. })
        ));
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let schema = client("myapp_");
        let row = schema
            .build(record(vec![
                ("id", SqlValue::I64(9)),
                ("CLIENTNAME", SqlValue::from("Acme")),
                ("Type", SqlValue::from("RET")),
                ("St", SqlValue::from("A")),
                ("Activity", SqlValue::from("Client")),
            ]))
            .unwrap();
        assert_eq!(row.get(&schema, "id"), Some(&SqlValue::I64(9)));
    }

    #[test]
    fn test_insert_runs_split_on_id_presence() {
        let schema = EntitySchema::new("T", "t").field(FieldSpec::integer("n"));
        let rows: Vec<EntityRow> = [Some(1), Some(2), None, Some(4)]
            .into_iter()
            .enumerate()
            .map(|(n, id)| {
                let mut fields = vec![("n", SqlValue::I64(n as i64))];
                if let Some(id) = id {
                    fields.push(("id", SqlValue::I64(id)));
                }
                schema.build(record(fields)).unwrap()
            })
            .collect();

        let runs = schema.insert_runs(&rows);
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].rows.len(), 2);
        assert_eq!(runs[0].column_names(&schema), vec!["id", "n"]);
        assert_eq!(runs[1].column_names(&schema), vec!["n"]);
        assert_eq!(runs[2].rows.len(), 1);
    }
}
