use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::package_ref::PackageRef;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOperation {
    #[default]
    Update,
    Install,
}

impl UpdateOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Install => "install",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawUpdateRecord {
    #[serde(rename = "ref")]
    bare_ref: String,
    origin: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    old_version: Option<String>,
    #[serde(default)]
    new_version: Option<String>,
    #[serde(default)]
    download_size: u64,
    #[serde(default)]
    installed_size: u64,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    operation: UpdateOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDescriptor {
    pub package_ref: PackageRef,
    pub display_name: String,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub download_size: u64,
    pub installed_size: u64,
    pub summary: Option<String>,
    pub operation: UpdateOperation,
}

impl UpdateDescriptor {
    pub fn from_json(value: serde_json::Value) -> anyhow::Result<Self> {
        let raw: RawUpdateRecord =
            serde_json::from_value(value).context("update record has an invalid shape")?;
        Self::try_from(raw)
    }

    pub fn format_ref(&self) -> String {
        self.package_ref.format_ref()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "ref": self.package_ref.bare_ref(),
            "origin": self.package_ref.origin,
            "name": self.display_name,
            "old_version": self.old_version,
            "new_version": self.new_version,
            "download_size": self.download_size,
            "installed_size": self.installed_size,
            "summary": self.summary,
            "operation": self.operation.as_str(),
        })
    }
}

impl TryFrom<RawUpdateRecord> for UpdateDescriptor {
    type Error = anyhow::Error;

    fn try_from(raw: RawUpdateRecord) -> anyhow::Result<Self> {
        let package_ref = PackageRef::from_parts(&raw.origin, &raw.bare_ref)
            .with_context(|| format!("invalid ref in update record: {}", raw.bare_ref))?;
        let display_name = raw
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| package_ref.name.clone());

        Ok(Self {
            package_ref,
            display_name,
            old_version: non_empty(raw.old_version),
            new_version: non_empty(raw.new_version),
            download_size: raw.download_size,
            installed_size: raw.installed_size,
            summary: non_empty(raw.summary),
            operation: raw.operation,
        })
    }
}

pub fn parse_update_list(input: &str) -> anyhow::Result<Vec<UpdateDescriptor>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: serde_json::Value =
        serde_json::from_str(input).context("failed to parse update list JSON")?;
    let serde_json::Value::Array(items) = value else {
        return Err(anyhow!("update list must be a JSON array"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            UpdateDescriptor::from_json(item)
                .with_context(|| format!("failed to translate update record #{index}"))
        })
        .collect()
}

pub fn total_download_size(updates: &[UpdateDescriptor]) -> u64 {
    updates
        .iter()
        .map(|update| update.download_size)
        .fold(0_u64, u64::saturating_add)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
