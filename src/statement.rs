//! Graph operations and the Cypher statements they render to.
//!
//! Only labels, relation names and property names appear inline in statement
//! text, and all of them pass [`validate_identifier`] first. Property values
//! and lookup values are always carried as bound parameters.

use std::fmt;

use crate::{
    GraphLoadError,
    config::NumericLiteralMode,
    mapping::MappingConfig,
    property::{PropertySet, PropertyValue, Record, project},
};

pub const FROM_LOOKUP_PARAM: &str = "fromLookup";
pub const TO_LOOKUP_PARAM: &str = "toLookup";
const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq)]
pub enum GraphOperation {
    CreateNode {
        label: String,
        properties: PropertySet,
    },
    CreateRelation {
        from_label: String,
        from_lookup_property: String,
        from_lookup_value: PropertyValue,
        to_label: String,
        to_lookup_property: String,
        to_lookup_value: PropertyValue,
        relation_name: String,
        properties: PropertySet,
    },
    CreateIndex {
        label: String,
        property: String,
    },
    ClearAll,
}

impl GraphOperation {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphOperation::CreateNode { .. } => "create_node",
            GraphOperation::CreateRelation { .. } => "create_relation",
            GraphOperation::CreateIndex { .. } => "create_index",
            GraphOperation::ClearAll => "clear_all",
        }
    }

    /// Label for nodes and indexes, relation name for relations.
    pub fn target(&self) -> Option<&str> {
        match self {
            GraphOperation::CreateNode { label, .. } => Some(label),
            GraphOperation::CreateRelation { relation_name, .. } => Some(relation_name),
            GraphOperation::CreateIndex { label, .. } => Some(label),
            GraphOperation::ClearAll => None,
        }
    }

    pub fn statement(&self) -> Statement {
        match self {
            GraphOperation::CreateNode { label, properties } => {
                let text = if properties.is_empty() {
                    format!("CREATE (x:{label}) RETURN x")
                } else {
                    format!("CREATE (x:{label} {{{}}}) RETURN x", value_pairs(properties))
                };
                Statement::new(text, parameters(properties))
            }
            GraphOperation::CreateRelation {
                from_label,
                from_lookup_property,
                from_lookup_value,
                to_label,
                to_lookup_property,
                to_lookup_value,
                relation_name,
                properties,
            } => {
                let rel = if properties.is_empty() {
                    format!("[r:{relation_name}]")
                } else {
                    format!("[r:{relation_name} {{{}}}]", value_pairs(properties))
                };
                let text = format!(
                    "MATCH (f:{from_label}), (t:{to_label}) \
                     WHERE f.{from_lookup_property} = ${FROM_LOOKUP_PARAM} \
                     AND t.{to_lookup_property} = ${TO_LOOKUP_PARAM} \
                     CREATE (f)-{rel}->(t) RETURN r"
                );
                let mut params = vec![
                    (FROM_LOOKUP_PARAM.to_string(), from_lookup_value.clone()),
                    (TO_LOOKUP_PARAM.to_string(), to_lookup_value.clone()),
                ];
                params.extend(parameters(properties));
                Statement::new(text, params)
            }
            GraphOperation::CreateIndex { label, property } => {
                Statement::new(format!("CREATE INDEX ON :{label}({property})"), Vec::new())
            }
            GraphOperation::ClearAll => {
                Statement::new("MATCH (n) DETACH DELETE n".to_string(), Vec::new())
            }
        }
    }
}

fn value_pairs(properties: &PropertySet) -> String {
    properties
        .keys()
        .map(|key| format!("{key}: ${key}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parameters(properties: &PropertySet) -> Vec<(String, PropertyValue)> {
    properties
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// A query template plus its bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    text: String,
    parameters: Vec<(String, PropertyValue)>,
}

impl Statement {
    pub fn new(text: String, parameters: Vec<(String, PropertyValue)>) -> Self {
        Self { text, parameters }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[(String, PropertyValue)] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&PropertyValue> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Renders the statement with parameters substituted as literals. Meant for
    /// logs and transcripts; backends always receive the template and parameters.
    pub fn render_inline(&self, mode: NumericLiteralMode) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos + 1..];
            let end = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(tail.len());
            let name = &tail[..end];
            match self.parameter(name) {
                Some(value) if !name.is_empty() => out.push_str(&render_literal(value, mode)),
                _ => {
                    out.push('$');
                    out.push_str(name);
                }
            }
            rest = &tail[end..];
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Renders a value as a Cypher literal.
///
/// Under [`NumericLiteralMode::QuotedFloats`] floats are emitted as quoted
/// strings. That mode exists for backends whose float literal parsing cannot
/// be relied on; it is not a general numeric rule.
pub fn render_literal(value: &PropertyValue, mode: NumericLiteralMode) -> String {
    match value {
        PropertyValue::Text(text) => format!("'{}'", escape_text(text)),
        PropertyValue::Integer(int) => int.to_string(),
        PropertyValue::Boolean(flag) => flag.to_string(),
        PropertyValue::Float(float) => match mode {
            NumericLiteralMode::Native => format!("{float:?}"),
            NumericLiteralMode::QuotedFloats => format!("'{float:?}'"),
        },
    }
}

/// Escapes backslashes and single quotes for use inside a quoted literal.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    value.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fails with a validation error unless `value` is safe to place in statement text.
pub fn validate_identifier(what: &str, value: &str) -> Result<(), GraphLoadError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(GraphLoadError::validation(format!(
            "{what} {value:?} is not a valid identifier"
        )))
    }
}

fn validate_property_names(owner: &str, properties: &PropertySet) -> Result<(), GraphLoadError> {
    for key in properties.keys() {
        validate_identifier(&format!("property of {owner}"), key)?;
    }
    Ok(())
}

/// Builds validated [`GraphOperation`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatementBuilder;

impl StatementBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build_create_node(
        &self,
        label: &str,
        properties: PropertySet,
    ) -> Result<GraphOperation, GraphLoadError> {
        validate_identifier("label", label)?;
        validate_property_names(label, &properties)?;
        Ok(GraphOperation::CreateNode {
            label: label.to_string(),
            properties,
        })
    }

    /// Projects `record` and builds its create-node operation.
    pub fn build_node<R: Record + ?Sized>(
        &self,
        label: &str,
        record: &R,
    ) -> Result<GraphOperation, GraphLoadError> {
        self.build_create_node(label, project(record))
    }

    /// Builds a create-relation operation from a projected relation. The key
    /// fields named by `mapping` become the lookup values and are removed from
    /// the relation's own properties.
    pub fn build_create_relation(
        &self,
        mut relation: PropertySet,
        mapping: &MappingConfig,
    ) -> Result<GraphOperation, GraphLoadError> {
        validate_identifier("relation name", mapping.relation_name())?;
        validate_identifier("label", mapping.from_label())?;
        validate_identifier("label", mapping.to_label())?;
        validate_identifier("lookup property", mapping.from_lookup_property())?;
        validate_identifier("lookup property", mapping.to_lookup_property())?;

        let from_lookup_value = relation.remove(mapping.from_key_field()).ok_or_else(|| {
            GraphLoadError::mapping(format!(
                "{} relation has no {:?} field to resolve {}.{}",
                mapping.relation_name(),
                mapping.from_key_field(),
                mapping.from_label(),
                mapping.from_lookup_property()
            ))
        })?;
        let to_lookup_value = relation.remove(mapping.to_key_field()).ok_or_else(|| {
            GraphLoadError::mapping(format!(
                "{} relation has no {:?} field to resolve {}.{}",
                mapping.relation_name(),
                mapping.to_key_field(),
                mapping.to_label(),
                mapping.to_lookup_property()
            ))
        })?;

        validate_property_names(mapping.relation_name(), &relation)?;
        for reserved in [FROM_LOOKUP_PARAM, TO_LOOKUP_PARAM] {
            if relation.contains(reserved) {
                return Err(GraphLoadError::validation(format!(
                    "property {reserved:?} of {} collides with a lookup parameter",
                    mapping.relation_name()
                )));
            }
        }

        Ok(GraphOperation::CreateRelation {
            from_label: mapping.from_label().to_string(),
            from_lookup_property: mapping.from_lookup_property().to_string(),
            from_lookup_value,
            to_label: mapping.to_label().to_string(),
            to_lookup_property: mapping.to_lookup_property().to_string(),
            to_lookup_value,
            relation_name: mapping.relation_name().to_string(),
            properties: relation,
        })
    }

    /// Projects `record` and builds its create-relation operation.
    pub fn build_relation<R: Record + ?Sized>(
        &self,
        record: &R,
        mapping: &MappingConfig,
    ) -> Result<GraphOperation, GraphLoadError> {
        self.build_create_relation(project(record), mapping)
    }

    pub fn build_create_index(
        &self,
        label: &str,
        property: &str,
    ) -> Result<GraphOperation, GraphLoadError> {
        validate_identifier("label", label)?;
        validate_identifier("index property", property)?;
        Ok(GraphOperation::CreateIndex {
            label: label.to_string(),
            property: property.to_string(),
        })
    }

    pub fn build_clear_all(&self) -> GraphOperation {
        GraphOperation::ClearAll
    }
}
