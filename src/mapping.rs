use crate::property::normalize_field_name;

pub const DEFAULT_FROM_KEY_FIELD: &str = "fromKey";
pub const DEFAULT_TO_KEY_FIELD: &str = "toKey";

/// How a relation's endpoints are resolved against already loaded nodes.
///
/// Lookup property names are normalized on construction so they always agree
/// with the names produced by [`crate::property::project`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingConfig {
    relation_name: String,
    from_label: String,
    from_lookup_property: String,
    to_label: String,
    to_lookup_property: String,
    from_key_field: String,
    to_key_field: String,
}

impl MappingConfig {
    pub fn new(
        relation_name: impl Into<String>,
        from_label: impl Into<String>,
        from_lookup_property: &str,
        to_label: impl Into<String>,
        to_lookup_property: &str,
    ) -> Self {
        Self {
            relation_name: relation_name.into(),
            from_label: from_label.into(),
            from_lookup_property: normalize_field_name(from_lookup_property),
            to_label: to_label.into(),
            to_lookup_property: normalize_field_name(to_lookup_property),
            from_key_field: DEFAULT_FROM_KEY_FIELD.to_string(),
            to_key_field: DEFAULT_TO_KEY_FIELD.to_string(),
        }
    }

    /// Overrides the relation fields that carry the endpoint keys.
    pub fn with_key_fields(mut self, from_key_field: &str, to_key_field: &str) -> Self {
        self.from_key_field = normalize_field_name(from_key_field);
        self.to_key_field = normalize_field_name(to_key_field);
        self
    }

    pub fn relation_name(&self) -> &str {
        &self.relation_name
    }

    pub fn from_label(&self) -> &str {
        &self.from_label
    }

    pub fn from_lookup_property(&self) -> &str {
        &self.from_lookup_property
    }

    pub fn to_label(&self) -> &str {
        &self.to_label
    }

    pub fn to_lookup_property(&self) -> &str {
        &self.to_lookup_property
    }

    pub fn from_key_field(&self) -> &str {
        &self.from_key_field
    }

    pub fn to_key_field(&self) -> &str {
        &self.to_key_field
    }
}
