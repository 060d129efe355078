use std::collections::HashMap;
use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// CPU and memory amounts, in abstract units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    pub cpu: u64,
    pub memory: u64,
}

impl Resources {
    pub const ZERO: Self = Self { cpu: 0, memory: 0 };

    pub fn new(cpu: u64, memory: u64) -> Self {
        Self { cpu, memory }
    }

    /// True when every dimension of `self` is at most the one in `limit`.
    pub fn fits_within(self, limit: Self) -> bool {
        self.cpu <= limit.cpu && self.memory <= limit.memory
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            cpu: self.cpu.saturating_sub(other.cpu),
            memory: self.memory.saturating_sub(other.memory),
        }
    }
}

impl Add for Resources {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            cpu: self.cpu.saturating_add(rhs.cpu),
            memory: self.memory.saturating_add(rhs.memory),
        }
    }
}

impl std::iter::Sum for Resources {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu={} mem={}", self.cpu, self.memory)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeRole {
    ControlPlane,
    Worker,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ControlPlane => "control-plane",
            Self::Worker => "worker",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Running,
    Pending,
    Crashloop,
}

impl fmt::Display for PodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Pending => "pending",
            Self::Crashloop => "crashloop",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: NodeId,
    pub name: String,
    pub role: NodeRole,
    pub capacity: Resources,
    /// Sum of the requests of running pods placed on this node.
    pub allocated: Resources,
}

impl ClusterNode {
    pub fn headroom(&self) -> Resources {
        self.capacity.saturating_sub(self.allocated)
    }

    pub fn can_fit(&self, request: Resources) -> bool {
        request.fits_within(self.headroom())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub id: PodId,
    pub name: String,
    pub app: String,
    /// Node the pod is bound to. A lookup key into the owning graph.
    pub node: Option<NodeId>,
    pub request: Resources,
    /// Simulated live usage, never above `request`.
    pub usage: Resources,
    pub status: PodStatus,
    pub restarts: u32,
}

impl Pod {
    /// Whether the pod's request counts toward its node's allocation.
    pub fn consumes_capacity(&self) -> bool {
        self.status == PodStatus::Running && self.node.is_some()
    }
}

/// Selects pods by app label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub app: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Node to pod assignment.
    Hosts,
    /// Service to pod selection.
    Selects,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Scheduling knobs carried from one snapshot to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlacementPolicy {
    pub schedule_on_control_plane: bool,
    /// Upper bound of events one perturbation applies.
    pub max_events: u32,
}

impl PlacementPolicy {
    pub fn accepts(&self, node: &ClusterNode) -> bool {
        self.schedule_on_control_plane || node.role == NodeRole::Worker
    }
}

/// One snapshot of the simulated cluster.
///
/// Snapshots are rebuilt wholesale: the topology module never patches a
/// graph in place, it derives a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterGraph {
    pub generation: u64,
    pub seed: u64,
    pub policy: PlacementPolicy,
    pub nodes: Vec<ClusterNode>,
    pub pods: Vec<Pod>,
    pub services: Vec<Service>,
    pub edges: Vec<Edge>,
}

impl ClusterGraph {
    pub fn node(&self, id: NodeId) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn pods_on(&self, id: NodeId) -> impl Iterator<Item = &Pod> {
        self.pods.iter().filter(move |p| p.node == Some(id))
    }

    pub fn count_pods(&self, status: PodStatus) -> usize {
        self.pods.iter().filter(|p| p.status == status).count()
    }

    pub fn total_capacity(&self) -> Resources {
        self.nodes.iter().map(|n| n.capacity).sum()
    }

    pub fn total_allocated(&self) -> Resources {
        self.nodes.iter().map(|n| n.allocated).sum()
    }

    /// Recomputes every node's allocation from the running pods bound to it.
    pub(crate) fn recompute_allocations(&mut self) {
        let mut totals: HashMap<NodeId, Resources> = HashMap::new();
        for pod in self.pods.iter().filter(|p| p.consumes_capacity()) {
            if let Some(node) = pod.node {
                let entry = totals.entry(node).or_default();
                *entry = *entry + pod.request;
            }
        }
        for node in &mut self.nodes {
            node.allocated = totals.get(&node.id).copied().unwrap_or_default();
        }
    }

    /// Rebuilds the edge list from pod bindings and service selectors.
    pub(crate) fn rebuild_edges(&mut self) {
        let names: HashMap<NodeId, &str> = self
            .nodes
            .iter()
            .map(|n| (n.id, n.name.as_str()))
            .collect();

        let mut edges = Vec::new();
        for pod in &self.pods {
            if let Some(node_name) = pod.node.and_then(|id| names.get(&id)) {
                edges.push(Edge {
                    from: (*node_name).to_string(),
                    to: pod.name.clone(),
                    kind: EdgeKind::Hosts,
                });
            }
        }
        for service in &self.services {
            for pod in self.pods.iter().filter(|p| p.app == service.app) {
                edges.push(Edge {
                    from: service.name.clone(),
                    to: pod.name.clone(),
                    kind: EdgeKind::Selects,
                });
            }
        }
        self.edges = edges;
    }

    /// Lists every broken invariant. An empty list means the graph is consistent.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        let mut expected: HashMap<NodeId, Resources> = HashMap::new();
        for pod in &self.pods {
            match (pod.status, pod.node) {
                (PodStatus::Pending, Some(_)) => {
                    out.push(format!("pod {}: pending but bound to a node", pod.name));
                }
                (PodStatus::Running | PodStatus::Crashloop, None) => {
                    out.push(format!("pod {}: {} without a node", pod.name, pod.status));
                }
                (_, Some(id)) if self.node(id).is_none() => {
                    out.push(format!("pod {}: references missing node {}", pod.name, id.0));
                }
                _ => {}
            }
            if !pod.usage.fits_within(pod.request) {
                out.push(format!("pod {}: usage exceeds request", pod.name));
            }
            if pod.consumes_capacity() {
                if let Some(id) = pod.node {
                    let entry = expected.entry(id).or_default();
                    *entry = *entry + pod.request;
                }
            }
        }

        for node in &self.nodes {
            if !node.allocated.fits_within(node.capacity) {
                out.push(format!(
                    "node {}: over-committed ({} allocated, {} capacity)",
                    node.name, node.allocated, node.capacity
                ));
            }
            let want = expected.get(&node.id).copied().unwrap_or_default();
            if node.allocated != want {
                out.push(format!(
                    "node {}: allocation {} does not match pod requests {}",
                    node.name, node.allocated, want
                ));
            }
        }

        let hosted = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::Hosts)
            .count();
        let bound = self.pods.iter().filter(|p| p.node.is_some()).count();
        if hosted != bound {
            out.push(format!(
                "graph: {hosted} hosting edges for {bound} bound pods"
            ));
        }

        out
    }
}
