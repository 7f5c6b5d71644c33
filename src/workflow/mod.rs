//! Argo workflow access
//!
//! Submitting workflows, waiting for them to finish, and reading back what
//! their steps did.

pub mod client;
pub mod logs;
pub mod resolver;
pub mod types;
pub mod watcher;

pub use client::{KubeClient, PodApi, PodContainers, WorkflowApi};
pub use logs::LogAggregator;
pub use resolver::{NodeTreeResolver, PodNameStrategy};
pub use types::{
    NodeKind, NodeStatus, NodeTree, ObjectMeta, Phase, Workflow, WorkflowManifest, WorkflowStatus,
};
pub use watcher::{PollingWatcher, WaitOutcome};
