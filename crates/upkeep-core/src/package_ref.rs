use std::fmt;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    App,
    Runtime,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Runtime => "runtime",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "app" => Some(Self::App),
            "runtime" => Some(Self::Runtime),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageRef {
    pub origin: String,
    pub kind: RefKind,
    pub name: String,
    pub arch: String,
    pub branch: String,
}

impl PackageRef {
    pub fn new(
        origin: impl Into<String>,
        kind: RefKind,
        name: impl Into<String>,
        arch: impl Into<String>,
        branch: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let package_ref = Self {
            origin: origin.into(),
            kind,
            name: name.into(),
            arch: arch.into(),
            branch: branch.into(),
        };
        package_ref.validate()?;
        Ok(package_ref)
    }

    pub fn from_parts(origin: &str, bare_ref: &str) -> anyhow::Result<Self> {
        let components = bare_ref.split('/').collect::<Vec<_>>();
        let [kind, name, arch, branch] = components.as_slice() else {
            return Err(anyhow!(
                "package ref '{bare_ref}' must have exactly 4 components (kind/name/arch/branch)"
            ));
        };
        let kind = RefKind::parse(kind)
            .ok_or_else(|| anyhow!("unsupported ref kind '{kind}' in '{bare_ref}'"))?;
        Self::new(origin, kind, *name, *arch, *branch)
    }

    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let (origin, bare_ref) = input
            .split_once(':')
            .ok_or_else(|| anyhow!("package ref '{input}' is missing an origin prefix"))?;
        Self::from_parts(origin, bare_ref)
            .with_context(|| format!("invalid package ref '{input}'"))
    }

    pub fn bare_ref(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.kind.as_str(),
            self.name,
            self.arch,
            self.branch
        )
    }

    pub fn format_ref(&self) -> String {
        format!("{}:{}", self.origin, self.bare_ref())
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (field, value) in [
            ("origin", &self.origin),
            ("name", &self.name),
            ("arch", &self.arch),
            ("branch", &self.branch),
        ] {
            validate_component(field, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_ref())
    }
}

fn validate_component(field: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        return Err(anyhow!("package ref {field} must not be empty"));
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch.is_control()) {
        return Err(anyhow!(
            "package ref {field} contains whitespace or control characters: {value:?}"
        ));
    }
    if value.contains(':') || value.contains('/') {
        return Err(anyhow!(
            "package ref {field} contains a reserved separator: {value}"
        ));
    }
    Ok(())
}
