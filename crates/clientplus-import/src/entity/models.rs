//! The ClientPlus entity types the legacy tables migrate into.

use super::{EntitySchema, FieldSpec};

/// Built-in entity type names, in default migration order.
pub const ENTITY_NAMES: [&str; 5] = [
    "Client",
    "HistData",
    "ConsultantDeal",
    "ConsultantVacation",
    "PagePermissions",
];

fn collection(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name.to_lowercase())
}

/// Look up a built-in entity by name (case-insensitive).
pub fn builtin(name: &str, table_prefix: &str) -> Option<EntitySchema> {
    let schema = match name.to_ascii_lowercase().as_str() {
        "client" => client(table_prefix),
        "histdata" => hist_data(table_prefix),
        "consultantdeal" => consultant_deal(table_prefix),
        "consultantvacation" => consultant_vacation(table_prefix),
        "pagepermissions" => page_permissions(table_prefix),
        _ => return None,
    };
    Some(schema)
}

pub fn client(table_prefix: &str) -> EntitySchema {
    EntitySchema::new("Client", collection(table_prefix, "Client"))
        .field(FieldSpec::text("CLIENTNAME", 200))
        // RET | PRJ | FFNT
        .field(FieldSpec::text("Type", 4))
        // A(ctive) | E(nded)
        .field(FieldSpec::text("St", 1))
        .field(FieldSpec::text("Activity", 10))
}

pub fn hist_data(table_prefix: &str) -> EntitySchema {
    EntitySchema::new("HistData", collection(table_prefix, "HistData"))
        .field(FieldSpec::text("Source", 50).with_default("Client Plus"))
        .field(FieldSpec::integer("Year"))
        .field(FieldSpec::integer("MonthNo"))
        .field(FieldSpec::integer("Day"))
        .field(FieldSpec::text("Month", 20))
        .field(FieldSpec::integer("ConsultantID"))
        .field(FieldSpec::text("Consultant", 100))
        .field(FieldSpec::text("Client", 200))
        .field(FieldSpec::text("ActivityType", 10))
        .field(FieldSpec::decimal("WorkingHours", 5, 2))
        .field(FieldSpec::long_text("NOTES").nullable())
}

pub fn consultant_deal(table_prefix: &str) -> EntitySchema {
    EntitySchema::new("ConsultantDeal", collection(table_prefix, "ConsultantDeal"))
        .field(FieldSpec::text("Consultant", 100))
        .field(FieldSpec::integer("ConsultantID"))
        .field(FieldSpec::integer("Year"))
        .field(FieldSpec::integer("Month"))
        .field(FieldSpec::integer("DealDays"))
}

pub fn consultant_vacation(table_prefix: &str) -> EntitySchema {
    EntitySchema::new(
        "ConsultantVacation",
        collection(table_prefix, "ConsultantVacation"),
    )
    .field(FieldSpec::text("Consultant", 100))
    .field(FieldSpec::integer("Days"))
    .field(FieldSpec::integer("Year"))
    .field(FieldSpec::integer("Month"))
}

pub fn page_permissions(table_prefix: &str) -> EntitySchema {
    EntitySchema::new("PagePermissions", collection(table_prefix, "PagePermissions"))
        .field(FieldSpec::text("User", 100))
        .field(FieldSpec::text("Page", 100))
        // Show | Hide
        .field(FieldSpec::text("Access", 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let schema = builtin("histdata", "myapp_").unwrap();
        assert_eq!(schema.name(), "HistData");
        assert_eq!(schema.collection(), "myapp_histdata");
        assert!(builtin("Invoice", "myapp_").is_none());
    }

    #[test]
    fn test_every_builtin_resolves() {
        for name in ENTITY_NAMES {
            let schema = builtin(name, "app_").unwrap();
            assert_eq!(schema.name(), name);
            assert_eq!(schema.collection(), format!("app_{}", name.to_lowercase()));
            assert_eq!(schema.fields()[0].name, "id");
        }
    }

    #[test]
    fn test_client_fields() {
        let names: Vec<_> = client("myapp_")
            .fields()
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["id", "CLIENTNAME", "Type", "St", "Activity"]);
    }
}
