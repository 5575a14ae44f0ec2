use super::custom_data::CustomData;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Header format understood by this crate
pub const FORMAT_VERSION: u32 = 1;

const REFERENCE_CATEGORY: &str = "Reference";
const REFERENCE_TYPE: &str = "SqlSchema";
const SQLCMD_CATEGORY: &str = "SqlCmdVariables";
const SQLCMD_TYPE: &str = "SqlCmdVariable";

/// Descriptive header stored as `header.json` inside a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageHeader {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    custom_data: Vec<CustomData>,
}

/// A package this one depends on, read from `Reference`/`SqlSchema` custom data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub file_name: String,
    pub logical_name: Option<String>,
    pub external_parts: Option<String>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl PackageHeader {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            format_version: FORMAT_VERSION,
            custom_data: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn custom_data(&self, category: &str, data_type: &str) -> Option<&CustomData> {
        self.custom_data
            .iter()
            .find(|d| d.is_keyed_by(category, data_type))
    }

    /// Registry for `(category, type)`, created on first use
    pub fn custom_data_mut(&mut self, category: &str, data_type: &str) -> &mut CustomData {
        let index = match self
            .custom_data
            .iter()
            .position(|d| d.is_keyed_by(category, data_type))
        {
            Some(index) => index,
            None => {
                self.custom_data.push(CustomData::new(category, data_type));
                self.custom_data.len() - 1
            }
        };
        &mut self.custom_data[index]
    }

    pub fn all_custom_data(&self) -> &[CustomData] {
        &self.custom_data
    }

    pub fn add_reference(&mut self, file_name: &str, logical_name: Option<&str>) {
        let data = self.custom_data_mut(REFERENCE_CATEGORY, REFERENCE_TYPE);
        data.add_metadata("FileName", file_name);
        if let Some(logical_name) = logical_name {
            data.add_metadata("LogicalName", logical_name);
        }
    }

    pub fn references(&self) -> Vec<SchemaReference> {
        self.custom_data
            .iter()
            .filter(|d| d.is_keyed_by(REFERENCE_CATEGORY, REFERENCE_TYPE))
            .filter_map(|d| {
                d.get("FileName").map(|file_name| SchemaReference {
                    file_name: file_name.to_string(),
                    logical_name: d.get("LogicalName").map(str::to_string),
                    external_parts: d.get("ExternalParts").map(str::to_string),
                })
            })
            .collect()
    }

    pub fn declare_sqlcmd_variable(&mut self, name: &str, default_value: &str) {
        self.custom_data_mut(SQLCMD_CATEGORY, SQLCMD_TYPE)
            .add_metadata(name, default_value);
    }

    /// Declared sqlcmd variables with their default values (empty = no default)
    pub fn sqlcmd_variables(&self) -> Vec<(String, String)> {
        let mut variables: Vec<(String, String)> = self
            .custom_data(SQLCMD_CATEGORY, SQLCMD_TYPE)
            .map(|d| d.items().into_iter().map(|m| (m.name, m.value)).collect())
            .unwrap_or_default();
        variables.sort();
        variables
    }

    /// Check the header is something this crate can deploy
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("package name is empty".to_string());
        }

        if self.version.trim().is_empty() {
            return Err(format!("package '{}' has an empty version", self.name));
        }

        if self.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported header format version {} (expected {})",
                self.format_version, FORMAT_VERSION
            ));
        }

        let mut seen = HashSet::new();
        for data in &self.custom_data {
            if !seen.insert((data.category(), data.data_type())) {
                return Err(format!(
                    "duplicate custom data ({}, {})",
                    data.category(),
                    data.data_type()
                ));
            }

            if data.items().iter().any(|m| m.name.trim().is_empty()) {
                return Err(format!(
                    "custom data ({}, {}) contains an unnamed entry",
                    data.category(),
                    data.data_type()
                ));
            }
        }

        Ok(())
    }
}
