//! 🗺️ Table mappings: the JSON document that tells DMS which tables get a ticket.
//!
//! We only ever write one rule: include every table matching a pattern in one
//! schema. The service wants it as a JSON string, hyphenated keys and all.

use serde::Serialize;

/// 🗺️ The `{"rules": [...]}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMappings {
    pub rules: Vec<SelectionRule>,
}

/// 🎯 One selection rule. Hyphenated on the wire, snake_cased in here.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectionRule {
    pub rule_type: String,
    pub rule_id: String,
    pub rule_name: String,
    pub object_locator: ObjectLocator,
    pub rule_action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ObjectLocator {
    pub schema_name: String,
    pub table_name: String,
}

impl TableMappings {
    /// 🎯 A single inclusion rule for every table in `schema_name` matching `table_pattern`
    /// (`%` is the DMS wildcard).
    pub fn include_schema(schema_name: &str, table_pattern: &str) -> Self {
        Self {
            rules: vec![SelectionRule {
                rule_type: "selection".to_string(),
                rule_id: "1".to_string(),
                rule_name: "select-all".to_string(),
                object_locator: ObjectLocator {
                    schema_name: schema_name.to_string(),
                    table_name: table_pattern.to_string(),
                },
                rule_action: "include".to_string(),
            }],
        }
    }

    /// 📦 Render the mappings the way the create call expects them.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_wire_format_is_hyphenated_like_dms_wants() {
        let json = TableMappings::include_schema("public", "%")
            .to_json()
            .expect("💀 Table mappings refused to serialize. Serde is having a day.");
        let value: serde_json::Value = serde_json::from_str(&json).expect("round trip json");

        let rule = &value["rules"][0];
        assert_eq!(rule["rule-type"], "selection");
        assert_eq!(rule["rule-id"], "1");
        assert_eq!(rule["rule-name"], "select-all");
        assert_eq!(rule["rule-action"], "include");
        assert_eq!(rule["object-locator"]["schema-name"], "public");
        assert_eq!(rule["object-locator"]["table-name"], "%");
        assert_eq!(value["rules"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn the_one_where_the_schema_is_a_parameter_not_a_prophecy() {
        let mappings = TableMappings::include_schema("sales", "orders%");
        let locator = &mappings.rules[0].object_locator;
        assert_eq!(locator.schema_name, "sales");
        assert_eq!(locator.table_name, "orders%");
    }
}
