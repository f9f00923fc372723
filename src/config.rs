//! Manifest rendering options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CompilerError;

pub const DEFAULT_API_VERSION: &str = "argoproj.io/v1alpha1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestKind {
    #[default]
    WorkflowTemplate,
    Workflow,
}

impl ManifestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestKind::WorkflowTemplate => "WorkflowTemplate",
            ManifestKind::Workflow => "Workflow",
        }
    }
}

/// Document-level settings. Every field has a default, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub api_version: String,
    pub kind: ManifestKind,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// For `Workflow` manifests, emit `metadata.generateName: <name>-`
    /// instead of a fixed name.
    pub generate_name: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            api_version: DEFAULT_API_VERSION.to_string(),
            kind: ManifestKind::default(),
            namespace: None,
            labels: BTreeMap::new(),
            generate_name: false,
        }
    }
}

impl RenderOptions {
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(json).map_err(|e| {
            CompilerError::parse("P002", format!("Failed to parse render options: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(RenderOptions::from_json("{}").unwrap(), RenderOptions::default());
    }

    #[test]
    fn camel_case_fields() {
        let opts = RenderOptions::from_json(
            r#"{"kind": "Workflow", "generateName": true, "namespace": "argo", "labels": {"team": "data"}}"#,
        )
        .unwrap();
        assert_eq!(opts.kind, ManifestKind::Workflow);
        assert!(opts.generate_name);
        assert_eq!(opts.namespace.as_deref(), Some("argo"));
        assert_eq!(opts.labels["team"], "data");
        assert_eq!(opts.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn bad_options_are_parse_errors() {
        let err = RenderOptions::from_json(r#"{"kind": "CronWorkflow"}"#).unwrap_err();
        assert_eq!(err.code, "P002");
    }
}
