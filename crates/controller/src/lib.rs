/*
 * Workflow Controller - Kubernetes-native Workflow Orchestrator
 * Copyright (C) 2025 Workflow Controller authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc, clippy::doc_markdown)]

//! Workflow controller core library
//!
//! This crate provides the core functionality for the workflow
//! orchestrator's controller: the `Workflow` CRD, the reconcile loop, and
//! the failed-pod restart subsystem that replaces pods lost to
//! infrastructure failures before any user code ran.

pub mod crds;
pub mod tasks;

// Re-export commonly used types
pub use crds::{NodePhase, NodeStatus, Template, Workflow, WorkflowSpec, WorkflowStatus};
pub use tasks::config::{ControllerConfig, FailedPodRestart};

// Re-export the restart subsystem for embedding and tests
pub use tasks::restart;
