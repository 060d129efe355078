//! Records shared by the simulator, the topology model and the live adapter.
//!
//! Renderers only ever see these types, whatever produced them.

pub mod cluster;
pub mod pipeline;

pub use cluster::{
    ClusterGraph, ClusterNode, EdgeKind, NodeId, NodeRole, PlacementPolicy, Pod, PodId,
    PodStatus, Resources, Service,
};
pub use pipeline::{LogLine, PipelineRun, RunSource, RunStatus, Severity, Stage, StageStatus};
