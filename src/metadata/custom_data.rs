use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single named value inside a [`CustomData`] registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Metadata registry identified by a `(category, type)` pair.
///
/// Names are unique: adding a name that already exists replaces its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CustomDataRecord", into = "CustomDataRecord")]
pub struct CustomData {
    category: String,
    data_type: String,
    items: HashMap<String, Metadata>,
}

impl CustomData {
    pub fn new(category: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            data_type: data_type.into(),
            items: HashMap::new(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn add_metadata(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.items
            .insert(name.clone(), Metadata::new(name, value.into()));
    }

    /// Current entries, in no particular order
    pub fn items(&self) -> Vec<Metadata> {
        self.items.values().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(|m| m.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_keyed_by(&self, category: &str, data_type: &str) -> bool {
        self.category == category && self.data_type == data_type
    }
}

/// On-disk form of a registry inside `header.json`
#[derive(Serialize, Deserialize)]
struct CustomDataRecord {
    category: String,
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    metadata: Vec<Metadata>,
}

impl From<CustomDataRecord> for CustomData {
    fn from(record: CustomDataRecord) -> Self {
        let mut data = CustomData::new(record.category, record.data_type);
        for item in record.metadata {
            data.add_metadata(item.name, item.value);
        }
        data
    }
}

impl From<CustomData> for CustomDataRecord {
    fn from(data: CustomData) -> Self {
        let mut metadata: Vec<Metadata> = data.items.into_values().collect();
        // Sorted so that written headers are reproducible
        metadata.sort_by(|a, b| a.name.cmp(&b.name));

        CustomDataRecord {
            category: data.category,
            data_type: data.data_type,
            metadata,
        }
    }
}
