//! `Workflow` Custom Resource Definition for DAG/Steps workflow execution

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Conventional name of the container that executes user code when a
/// template does not name its main containers explicitly.
pub const MAIN_CONTAINER_NAME: &str = "main";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(group = "argoproj.io", version = "v1alpha1", kind = "Workflow")]
#[kube(namespaced)]
#[kube(status = "WorkflowStatus")]
#[kube(printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#)]
#[kube(printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#)]
pub struct WorkflowSpec {
    /// Name of the template the workflow starts from
    pub entrypoint: String,

    #[serde(default)]
    pub templates: Vec<Template>,
}

impl WorkflowSpec {
    /// Resolve a template by name.
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|template| template.name == name)
    }
}

/// A single executable unit of a workflow. A node instantiates a template
/// as a pod.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,

    /// Containers in this template's pod that execute user code. Empty
    /// means the conventional `main` container.
    #[serde(default)]
    pub main_container_names: Vec<String>,
}

impl Template {
    /// Whether the named container executes user code for this template.
    pub fn is_main_container_name(&self, name: &str) -> bool {
        if self.main_container_names.is_empty() {
            name == MAIN_CONTAINER_NAME
        } else {
            self.main_container_names.iter().any(|main| main == name)
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    #[serde(default)]
    pub phase: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Per-task records keyed by node ID
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub nodes: HashMap<String, NodeStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

/// Status of a single task instance in the workflow's execution graph.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,

    pub phase: NodePhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Name of the pod currently executing this node, if one is bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    /// Number of times this node's pod was replaced after an
    /// infrastructure failure
    #[serde(default)]
    pub failed_pod_restarts: i32,

    /// Last time a replacement pod was requested for this node (RFC3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_restart_attempt_at: Option<String>,
}

/// Phase of a workflow node
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, JsonSchema, PartialEq, Eq)]
pub enum NodePhase {
    /// Node is waiting for a pod to be scheduled
    #[default]
    Pending,
    /// Node's pod is executing
    Running,
    /// Node's pod completed successfully
    Succeeded,
    /// Node failed
    Failed,
    /// Node errored outside of user code
    Error,
}
