use serde::Deserialize;

use crate::graph::{ParamValue, Statement};

/// Typed extraction of an organization record from the knowledge API.
/// Nothing untyped survives past this module.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOrganization {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub nb_employees: Option<i64>,
    pub revenue: Option<RawAmount>,
    pub stock: Option<RawStock>,
    pub founding_date: Option<RawTimestamp>,
    pub wikipedia_uri: Option<String>,
    pub linked_in_uri: Option<String>,
    pub is_dissolved: Option<bool>,
    pub description: Option<String>,
    pub ceo: Option<RawRelated>,
    pub founders: Vec<RawRelated>,
    pub board_members: Vec<RawRelated>,
    pub competitors: Vec<RawRelated>,
    pub suppliers: Vec<RawRelated>,
    pub subsidiaries: Vec<RawRelated>,
    #[serde(rename = "diffbotClassification")]
    pub classification: Vec<RawClassification>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAmount {
    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStock {
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimestamp {
    /// Millisecond epoch.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRelated {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawClassification {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isPrimary", default)]
    pub is_primary: bool,
}

const RELATED_UPSERT: &str = "\
MATCH (t:Tag {name: $name})
MERGE (o:Tag {name: $other})
ON CREATE SET o.type = $kind";

const CLASSIFICATION_UPSERT: &str = "\
MATCH (t:Tag {name: $name})
MERGE (cl:Classification {name: $classification})
MERGE (t)-[r:HAS_CLASSIFICATION]->(cl)
SET r.isPrimary = $is_primary";

/// Mark an entity processed without attaching any facts; used when the
/// knowledge API returned nothing for it.
pub fn mark_processed_statement(name: &str) -> Statement {
    Statement::new("MATCH (t:Tag {name: $name}) SET t.processed = true").param("name", name)
}

/// Statements enriching one organization tag: a dynamic SET over the scalar
/// facts that are actually present, then one statement per related entity.
pub fn organization_statements(name: &str, org: &RawOrganization) -> Vec<Statement> {
    let mut statements = vec![scalar_statement(name, org)];

    if let Some(ceo) = &org.ceo {
        statements.push(related_statement(name, ceo, "HAS_CEO"));
    }
    for founder in &org.founders {
        statements.push(related_statement(name, founder, "HAS_FOUNDER"));
    }
    for member in &org.board_members {
        statements.push(related_statement(name, member, "BOARD_MEMBER"));
    }
    for competitor in &org.competitors {
        statements.push(related_statement(name, competitor, "HAS_COMPETITOR"));
    }
    for supplier in &org.suppliers {
        statements.push(related_statement(name, supplier, "HAS_SUPPLIER"));
    }
    for subsidiary in &org.subsidiaries {
        statements.push(related_statement(name, subsidiary, "HAS_SUBSIDIARY"));
    }
    for class in &org.classification {
        if class.name.is_empty() {
            continue;
        }
        statements.push(
            Statement::new(CLASSIFICATION_UPSERT)
                .param("name", name)
                .param("classification", class.name.as_str())
                .param("is_primary", class.is_primary),
        );
    }

    statements
}

fn scalar_statement(name: &str, org: &RawOrganization) -> Statement {
    let mut sets = vec!["t.processed = true".to_string()];
    let mut params: Vec<(&str, ParamValue)> = Vec::new();

    if let Some(employees) = org.nb_employees {
        sets.push("t.employees = $employees".into());
        params.push(("employees", ParamValue::Int(employees)));
    }
    if let Some(revenue) = &org.revenue {
        sets.push("t.revenue = $revenue".into());
        params.push(("revenue", ParamValue::Float(revenue.value)));
    }
    if let Some(stock) = &org.stock {
        if !stock.symbol.is_empty() {
            sets.push("t.stock = $stock".into());
            params.push(("stock", ParamValue::Str(stock.symbol.clone())));
        }
    }
    if let Some(founded) = &org.founding_date {
        sets.push("t.foundingDate = datetime({epochSeconds: $founding_date})".into());
        params.push(("founding_date", ParamValue::Int(founded.timestamp / 1000)));
    }
    if let Some(uri) = &org.wikipedia_uri {
        sets.push("t.wikipedia = $wikipedia".into());
        params.push(("wikipedia", ParamValue::Str(uri.clone())));
    }
    if let Some(uri) = &org.linked_in_uri {
        sets.push("t.linkedin = $linkedin".into());
        params.push(("linkedin", ParamValue::Str(uri.clone())));
    }
    if let Some(dissolved) = org.is_dissolved {
        sets.push("t.isDissolved = $is_dissolved".into());
        params.push(("is_dissolved", ParamValue::Bool(dissolved)));
    }
    if let Some(description) = &org.description {
        sets.push("t.description = $description".into());
        params.push(("description", ParamValue::Str(description.clone())));
    }

    let mut stmt = Statement::new(format!(
        "MATCH (t:Tag {{name: $name}})\nSET {}",
        sets.join(",\n    ")
    ))
    .param("name", name);
    for (key, value) in params {
        stmt = stmt.param(key, value);
    }
    stmt
}

fn related_statement(name: &str, related: &RawRelated, rel: &str) -> Statement {
    Statement::new(format!("{RELATED_UPSERT}\nMERGE (t)-[:{rel}]->(o)"))
        .param("name", name)
        .param("other", related.name.as_str())
        .param("kind", related.kind.clone().unwrap_or_else(|| "Node".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn org_fixture() -> RawOrganization {
        serde_json::from_value(json!({
            "type": "Organization",
            "nbEmployees": 29600,
            "revenue": {"value": 60922000000.0},
            "stock": {"symbol": "NVDA"},
            "foundingDate": {"timestamp": 735264000000i64},
            "description": "Designs GPUs.",
            "ceo": {"name": "Jensen Huang", "type": "Person"},
            "founders": [{"name": "Jensen Huang", "type": "Person"}],
            "competitors": [{"name": "AMD", "type": "Organization"}],
            "diffbotClassification": [{"name": "Semiconductors", "isPrimary": true}]
        }))
        .unwrap()
    }

    #[test]
    fn scalar_statement_sets_only_present_fields() {
        let stmt = scalar_statement("Nvidia", &org_fixture());
        assert!(stmt.text.contains("t.processed = true"));
        assert!(stmt.text.contains("t.employees = $employees"));
        assert!(stmt.text.contains("t.foundingDate = datetime"));
        assert!(!stmt.text.contains("t.linkedin"));
        assert_eq!(stmt.param_value("employees"), Some(&ParamValue::Int(29600)));
        // founding date converts ms → s like article timestamps
        assert_eq!(
            stmt.param_value("founding_date"),
            Some(&ParamValue::Int(735_264_000))
        );
    }

    #[test]
    fn relationships_become_one_statement_each() {
        let statements = organization_statements("Nvidia", &org_fixture());
        // scalar + ceo + founder + competitor + classification
        assert_eq!(statements.len(), 5);
        assert!(statements[1].text.contains("HAS_CEO"));
        assert!(statements[2].text.contains("HAS_FOUNDER"));
        assert!(statements[3].text.contains("HAS_COMPETITOR"));
        assert!(statements[4].text.contains("HAS_CLASSIFICATION"));
        assert_eq!(
            statements[1].param_value("other"),
            Some(&ParamValue::Str("Jensen Huang".into()))
        );
        assert_eq!(
            statements[1].param_value("kind"),
            Some(&ParamValue::Str("Person".into()))
        );
    }

    #[test]
    fn empty_record_still_marks_processed() {
        let statements = organization_statements("Ghost Corp", &RawOrganization::default());
        assert_eq!(statements.len(), 1);
        assert!(statements[0].text.contains("t.processed = true"));
        assert_eq!(statements[0].params.len(), 1);
    }
}
