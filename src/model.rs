//! Result model handed to rendering and export

use serde::{Deserialize, Serialize};

/// How a result list is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    #[serde(alias = "ul")]
    Unordered,
    #[serde(alias = "ol")]
    Ordered,
}

impl ContainerKind {
    /// HTML list element name.
    pub fn tag(self) -> &'static str {
        match self {
            ContainerKind::Unordered => "ul",
            ContainerKind::Ordered => "ol",
        }
    }
}

/// One extracted value: a URL for link rules, a phrase for text rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultValue {
    pub value: String,
}

impl ResultValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Values starting with `http` are shown as links.
    pub fn is_link(&self) -> bool {
        self.value.starts_with("http")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSet {
    pub name: String,
    pub container_kind: ContainerKind,
    pub values: Vec<ResultValue>,
}

impl ResultSet {
    pub fn new<I, S>(name: impl Into<String>, container_kind: ContainerKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            container_kind,
            values: values.into_iter().map(ResultValue::new).collect(),
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.value.as_str())
    }
}

/// Everything one extraction run produced, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportDocument {
    sets: Vec<ResultSet>,
}

impl ExportDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, set: ResultSet) {
        self.sets.push(set);
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultSet> {
        self.sets.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ResultSet> {
        self.sets.iter().find(|set| set.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sets.iter().map(|set| set.name.as_str()).collect()
    }
}

impl From<Vec<ResultSet>> for ExportDocument {
    fn from(sets: Vec<ResultSet>) -> Self {
        Self { sets }
    }
}

impl<'a> IntoIterator for &'a ExportDocument {
    type Item = &'a ResultSet;
    type IntoIter = std::slice::Iter<'a, ResultSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.iter()
    }
}

impl IntoIterator for ExportDocument {
    type Item = ResultSet;
    type IntoIter = std::vec::IntoIter<ResultSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.sets.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_export_document_json_shape() {
        let doc = ExportDocument::from(vec![ResultSet::new(
            "Organic Results",
            ContainerKind::Ordered,
            ["https://a.example/"],
        )]);

        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!([{
                "name": "Organic Results",
                "container_kind": "ordered",
                "values": [{"value": "https://a.example/"}]
            }])
        );
    }

    #[test]
    fn test_container_kind_accepts_list_tags() {
        let kinds: Vec<ContainerKind> = serde_json::from_str(r#"["ul", "ol", "ordered"]"#).unwrap();
        assert_eq!(
            kinds,
            [ContainerKind::Unordered, ContainerKind::Ordered, ContainerKind::Ordered]
        );
    }

    #[test]
    fn test_link_detection_is_a_prefix_check() {
        assert!(ResultValue::new("https://a.example/").is_link());
        assert!(ResultValue::new("httpish text").is_link());
        assert!(!ResultValue::new(" https://a.example/").is_link());
    }
}
