//! Run preparation
//!
//! Everything that can fail fatally happens here, before the backend is
//! contacted: reading the document, reading templates for implicit
//! allow-lists, reading the base environment and the duplicate output check.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Environment, GraphWarning, Stack, StackGraph};
use crate::storage::{load_base_environment, DocumentError, EnvironmentError, OutputCollision, StackDocument};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Stacks ready to run, plus what the ordering check found
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub prefix: String,

    #[serde(skip)]
    pub stacks: Vec<Stack>,

    pub warnings: Vec<GraphWarning>,

    /// Producer-first order, when the graph has no cycle
    pub suggested_order: Option<Vec<String>>,
}

impl RunPlan {
    /// Reads the document and base environment from disk
    pub fn load(
        document: &Path,
        environment: Option<&Path>,
        prefix: &str,
        collision: OutputCollision,
    ) -> Result<Self, PlanError> {
        let doc = StackDocument::load(document)?;
        let base = load_base_environment(environment)?;
        Ok(Self::from_document(&doc, &base, prefix, collision)?)
    }

    /// Builds stacks from an already parsed document
    pub fn from_document(
        doc: &StackDocument,
        base: &Environment,
        prefix: &str,
        collision: OutputCollision,
    ) -> Result<Self, DocumentError> {
        let stacks = doc.build_stacks(base, prefix)?;
        let graph = StackGraph::from_stacks(&stacks);

        if collision == OutputCollision::Fail {
            if let Some((output, stacks)) = graph.duplicate_outputs().into_iter().next() {
                return Err(DocumentError::DuplicateOutput { output, stacks });
            }
        }

        Ok(Self {
            prefix: prefix.to_string(),
            warnings: graph.warnings(),
            suggested_order: graph.suggested_order(),
            stacks,
        })
    }

    /// True when the declared order already puts producers first
    pub fn is_ordered(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, GraphWarning::ForwardReference { .. } | GraphWarning::Cycle { .. }))
    }
}
