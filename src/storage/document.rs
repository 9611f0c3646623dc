//! Stack document loading
//!
//! A document is YAML with a top-level `resources` mapping. Each resource
//! names a template and optionally lists the parameters it accepts, the
//! outputs it publishes, the inputs it consumes and alias rules:
//!
//! ```yaml
//! resources:
//!   ParentStack:
//!     template: parent.yaml
//!     parameters: [param1, param2]
//!     outputs: [output]
//!   ChildStack:
//!     template: child.yaml
//!     inputs: [output]
//!     aliases:
//!       output: {aliases: [renamed_output], rename: true}
//! ```
//!
//! Resources keep their declaration order.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use super::environment::merge;
use crate::domain::{AliasRule, Environment, Stack};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Need a mapping with resources")]
    MissingResources,

    #[error("Invalid resource '{name}': {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("Failed to read template {path} for '{resource}': {source}")]
    TemplateRead {
        resource: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse template {path} for '{resource}': {reason}")]
    TemplateParse {
        resource: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Output '{output}' is declared by more than one stack: {}", .stacks.join(", "))]
    DuplicateOutput { output: String, stacks: Vec<String> },
}

/// One entry under `resources`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResourceSpec {
    /// Path to the stack template
    pub template: String,

    /// Explicit parameter allow-list
    #[serde(default)]
    pub parameters: Option<Vec<String>>,

    #[serde(default)]
    pub outputs: Option<Vec<String>>,

    #[serde(default)]
    pub inputs: Option<Vec<String>>,

    #[serde(default)]
    pub aliases: Option<BTreeMap<String, AliasRule>>,
}

/// A parsed stack document
#[derive(Debug, Clone, Default)]
pub struct StackDocument {
    /// Resources in declaration order
    resources: Vec<(String, ResourceSpec)>,
}

impl StackDocument {
    /// Parses a document from YAML (or JSON) text
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| DocumentError::Parse(e.to_string()))?;

        let resources = doc
            .get("resources")
            .and_then(|r| r.as_mapping())
            .ok_or(DocumentError::MissingResources)?;

        let mut parsed = Vec::with_capacity(resources.len());
        for (key, value) in resources {
            let name = key
                .as_str()
                .ok_or_else(|| DocumentError::InvalidResource {
                    name: format!("{:?}", key),
                    reason: "resource names must be strings".to_string(),
                })?
                .to_string();

            let spec: ResourceSpec = serde_yaml::from_value(value.clone()).map_err(|e| {
                DocumentError::InvalidResource {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;

            parsed.push((name, spec));
        }

        Ok(Self { resources: parsed })
    }

    /// Reads and parses a document file
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = fs::read_to_string(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn resources(&self) -> &[(String, ResourceSpec)] {
        &self.resources
    }

    /// Builds stacks in declaration order, each with its filtered environment
    pub fn build_stacks(&self, base: &Environment, prefix: &str) -> Result<Vec<Stack>, DocumentError> {
        self.resources
            .iter()
            .map(|(name, spec)| {
                let allowed = allow_list(name, spec)?;
                Ok(Stack::new(name, prefix, &spec.template, merge(base, &allowed))
                    .with_outputs(spec.outputs.clone().unwrap_or_default())
                    .with_inputs(spec.inputs.clone().unwrap_or_default())
                    .with_aliases(spec.aliases.clone().unwrap_or_default()))
            })
            .collect()
    }
}

/// Parameter names a resource accepts from the base environment.
///
/// An explicit, non-empty `parameters` list wins. Otherwise the names are
/// read from the template's `Parameters` (or `parameters`) section.
pub fn allow_list(name: &str, spec: &ResourceSpec) -> Result<Vec<String>, DocumentError> {
    match &spec.parameters {
        Some(params) if !params.is_empty() => Ok(params.clone()),
        _ => template_parameters(name, Path::new(&spec.template)),
    }
}

/// Reads parameter names declared by a template file
pub fn template_parameters(resource: &str, path: &Path) -> Result<Vec<String>, DocumentError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentError::TemplateRead {
        resource: resource.to_string(),
        path: path.to_path_buf(),
        source,
    })?;

    let doc: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| DocumentError::TemplateParse {
            resource: resource.to_string(),
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(parameter_names(&doc))
}

/// `Parameters` takes precedence over `parameters`
fn parameter_names(template: &serde_yaml::Value) -> Vec<String> {
    let section = template
        .get("Parameters")
        .or_else(|| template.get("parameters"));

    match section.and_then(|s| s.as_mapping()) {
        Some(mapping) => mapping
            .keys()
            .filter_map(|k| k.as_str().map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const PARENT_CHILD: &str = r#"
resources:
    ParentStack:
        template: parent.path
        parameters: ['param1', 'param2']
        outputs: ['output']
    ChildStack:
        template: child.path
        parameters: ['param1', 'param3']
        inputs: ['output']
"#;

    fn base() -> Environment {
        let mut env = Environment::new();
        env.insert("param1".into(), json!("one"));
        env.insert("param2".into(), json!("two"));
        env.insert("param3".into(), json!(3));
        env
    }

    #[test]
    fn parse_keeps_declaration_order() {
        let doc = StackDocument::parse(PARENT_CHILD).unwrap();
        let names: Vec<_> = doc.resources().iter().map(|(n, _)| n.as_str()).collect();

        assert_eq!(names, vec!["ParentStack", "ChildStack"]);
    }

    #[test]
    fn parse_reads_resource_fields() {
        let doc = StackDocument::parse(PARENT_CHILD).unwrap();
        let (_, parent) = &doc.resources()[0];

        assert_eq!(parent.template, "parent.path");
        assert_eq!(parent.parameters, Some(vec!["param1".into(), "param2".into()]));
        assert_eq!(parent.outputs, Some(vec!["output".into()]));
        assert!(parent.inputs.is_none());
    }

    #[test]
    fn parse_aliases() {
        let doc = StackDocument::parse(
            r#"
resources:
  ChildStack:
    template: child.path
    inputs: [output]
    aliases:
      output: {aliases: [renamed_output], rename: true}
"#,
        )
        .unwrap();
        let (_, child) = &doc.resources()[0];
        let rule = &child.aliases.as_ref().unwrap()["output"];

        assert_eq!(rule.aliases, vec!["renamed_output".to_string()]);
        assert!(rule.rename);
    }

    #[test]
    fn missing_resources_is_an_error() {
        let result = StackDocument::parse("stacks: {}");
        assert!(matches!(result, Err(DocumentError::MissingResources)));

        let result = StackDocument::parse("just a string");
        assert!(matches!(result, Err(DocumentError::MissingResources)));

        let result = StackDocument::parse("resources: [a, b]");
        assert!(matches!(result, Err(DocumentError::MissingResources)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let result = StackDocument::parse("resources: {a: [");
        assert!(matches!(result, Err(DocumentError::Parse(_))));
    }

    #[test]
    fn resource_without_template_is_invalid() {
        let result = StackDocument::parse("resources:\n  A:\n    outputs: [x]\n");
        assert!(matches!(
            result,
            Err(DocumentError::InvalidResource { ref name, .. }) if name == "A"
        ));
    }

    #[test]
    fn build_stacks_filters_environment() {
        let doc = StackDocument::parse(PARENT_CHILD).unwrap();
        let stacks = doc.build_stacks(&base(), "demo-").unwrap();

        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0].full_name(), "demo-ParentStack");
        assert_eq!(
            stacks[0].environment.keys().collect::<Vec<_>>(),
            vec!["param1", "param2"]
        );
        assert_eq!(
            stacks[1].environment.keys().collect::<Vec<_>>(),
            vec!["param1", "param3"]
        );
        assert_eq!(stacks[1].inputs, vec!["output".to_string()]);
    }

    #[test]
    fn build_stacks_with_empty_base() {
        let doc = StackDocument::parse(PARENT_CHILD).unwrap();
        let stacks = doc.build_stacks(&Environment::new(), "").unwrap();

        assert!(stacks.iter().all(|s| s.environment.is_empty()));
    }

    #[test]
    fn allow_list_from_template_parameters() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("net.yaml");
        fs::write(
            &template,
            "heat_template_version: 2013-05-23\nparameters:\n  cidr: {type: string}\n  name: {type: string}\n",
        )
        .unwrap();

        let spec = ResourceSpec {
            template: template.display().to_string(),
            ..Default::default()
        };
        let mut names = allow_list("Net", &spec).unwrap();
        names.sort();

        assert_eq!(names, vec!["cidr".to_string(), "name".to_string()]);
    }

    #[test]
    fn capitalised_parameters_section_wins() {
        let doc: serde_yaml::Value =
            serde_yaml::from_str("Parameters: {A: {}}\nparameters: {b: {}}\n").unwrap();
        assert_eq!(parameter_names(&doc), vec!["A".to_string()]);
    }

    #[test]
    fn template_without_parameters_section_gives_empty_allow_list() {
        let doc: serde_yaml::Value = serde_yaml::from_str("resources: {}\n").unwrap();
        assert!(parameter_names(&doc).is_empty());
    }

    #[test]
    fn template_without_parameters_section_receives_whole_base() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("plain.yaml");
        fs::write(&template, "heat_template_version: 2013-05-23\nresources: {}\n").unwrap();
        let doc = StackDocument::parse(&format!(
            "resources:\n  Plain:\n    template: {}\n",
            template.display()
        ))
        .unwrap();

        let mut base = Environment::new();
        base.insert("param1".into(), json!("one"));
        base.insert("secret".into(), json!("s"));

        let stacks = doc.build_stacks(&base, "").unwrap();

        assert_eq!(stacks[0].environment, base);
    }

    #[test]
    fn empty_parameter_list_reads_template() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("t.yaml");
        fs::write(&template, "parameters:\n  only: {type: string}\n").unwrap();

        let spec = ResourceSpec {
            template: template.display().to_string(),
            parameters: Some(vec![]),
            ..Default::default()
        };

        assert_eq!(allow_list("T", &spec).unwrap(), vec!["only".to_string()]);
    }

    #[test]
    fn unreadable_template_is_fatal() {
        let spec = ResourceSpec {
            template: "/nonexistent/chunk-stack/template.yaml".into(),
            ..Default::default()
        };

        assert!(matches!(
            allow_list("Missing", &spec),
            Err(DocumentError::TemplateRead { .. })
        ));
    }

    #[test]
    fn malformed_template_is_fatal() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("bad.yaml");
        fs::write(&template, "parameters: [unclosed").unwrap();

        let spec = ResourceSpec {
            template: template.display().to_string(),
            ..Default::default()
        };

        assert!(matches!(
            allow_list("Bad", &spec),
            Err(DocumentError::TemplateParse { .. })
        ));
    }

    #[test]
    fn load_missing_document() {
        let result = StackDocument::load(Path::new("/nonexistent/chunk-stack/doc.yaml"));
        assert!(matches!(result, Err(DocumentError::Read { .. })));
    }
}
