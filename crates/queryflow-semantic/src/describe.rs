//! Deterministic description generation
//!
//! Every schema item is embedded through a generated sentence rather than
//! its bare name; templated phrases keyed off name tokens and declared
//! types give the embedding model more to work with. Identical input
//! always yields identical output.

use crate::catalog::{ItemKind, SchemaItem};

/// Generate the descriptive text for a schema item
pub fn describe(item: &SchemaItem) -> String {
    match item.kind {
        ItemKind::Table => describe_table(&item.name),
        ItemKind::Column => describe_column(
            &item.name,
            item.data_type.as_deref(),
            item.table.as_deref(),
        ),
    }
}

/// Description for a table, enriched from name-token patterns
pub fn describe_table(name: &str) -> String {
    let tokens = name_tokens(name);
    let mut desc = format!("Database table named {}", tokens.join(" "));

    if contains_any(&tokens, &["refresh", "update"]) {
        desc.push_str(" with refreshed updated data");
    }
    if contains_any(&tokens, &["prediction", "forecast"]) {
        desc.push_str(" containing predictive analytics and forecasts");
    }
    if contains_any(&tokens, &["feature", "features"]) {
        desc.push_str(" with feature engineering and data features");
    }
    if contains_any(&tokens, &["fact", "metric", "metrics"]) {
        desc.push_str(" holding measurable facts and metrics");
    }
    if contains_any(&tokens, &["dim", "dimension", "lookup", "ref"]) {
        desc.push_str(" serving as dimension or lookup reference data");
    }

    desc
}

/// Description for a column, enriched from name tokens and declared type
pub fn describe_column(name: &str, data_type: Option<&str>, table: Option<&str>) -> String {
    let tokens = name_tokens(name);
    let mut desc = format!("Database column {}", tokens.join(" "));

    if let Some(data_type) = data_type {
        if !data_type.is_empty() {
            desc.push_str(&format!(" of type {}", data_type));
        }
    }

    if contains_any(&tokens, &["id", "key"]) {
        desc.push_str(" serving as identifier or key");
    } else if contains_any(&tokens, &["date", "time"]) {
        desc.push_str(" containing date or time information");
    } else if contains_any(&tokens, &["name", "title"]) {
        desc.push_str(" containing name or title text");
    } else if contains_any(&tokens, &["count", "number", "amount"]) {
        desc.push_str(" containing numeric count or amount data");
    }

    if let Some(table) = table {
        desc.push_str(&format!(" from table {}", table));
    }

    desc
}

/// Split a schema name into lowercase word tokens
fn name_tokens(name: &str) -> Vec<String> {
    name.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

fn contains_any(tokens: &[String], needles: &[&str]) -> bool {
    tokens.iter().any(|t| needles.contains(&t.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SchemaItem;

    #[test]
    fn test_description_is_deterministic() {
        let item = SchemaItem::column("orders", "created_at", "timestamp");
        assert_eq!(describe(&item), describe(&item));
    }

    #[test]
    fn test_table_description_inserts_keyword_phrases() {
        let desc = describe_table("sales_forecast_refresh");
        assert!(desc.starts_with("Database table named sales forecast refresh"));
        assert!(desc.contains("refreshed updated data"));
        assert!(desc.contains("predictive analytics"));
    }

    #[test]
    fn test_column_description_mentions_type_table_and_role() {
        let desc = describe_column("created_at", Some("timestamp"), Some("orders"));
        assert!(desc.contains("created at"));
        assert!(desc.contains("of type timestamp"));
        assert!(desc.contains("date or time information"));
        assert!(desc.contains("from table orders"));
    }

    #[test]
    fn test_identifier_phrase_takes_precedence_over_date_phrase() {
        let desc = describe_column("order_id_date", Some("int"), None);
        assert!(desc.contains("identifier or key"));
        assert!(!desc.contains("date or time information"));
    }
}
