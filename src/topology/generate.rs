use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ClusterConfig, Range};
use crate::error::Result;
use crate::model::{
    ClusterGraph, ClusterNode, NodeId, NodeRole, PlacementPolicy, Pod, PodId, PodStatus,
    Resources, Service,
};

use super::{best_fit, sample_usage};

fn sample(rng: &mut ChaCha8Rng, range: Range) -> u64 {
    rng.random_range(range.min.unsigned_abs()..=range.max.unsigned_abs())
}

/// Builds a fresh cluster snapshot from `config`.
///
/// Nodes are created first (control plane, then workers) with sampled
/// capacities. Pods are then placed one at a time with best-fit; a pod that
/// fits on no node is left `pending` without an edge.
///
/// # Errors
///
/// Returns `InvalidConfig` for negative counts or bounds, inverted ranges,
/// or when strict placement is on and pods have no node to go to.
pub fn generate(config: &ClusterConfig) -> Result<ClusterGraph> {
    config.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let policy = PlacementPolicy {
        schedule_on_control_plane: config.schedule_on_control_plane,
        max_events: config.perturb_events,
    };

    let roles = std::iter::repeat(NodeRole::ControlPlane)
        .take(config.control_plane_nodes.unsigned_abs() as usize)
        .chain(std::iter::repeat(NodeRole::Worker).take(config.worker_nodes.unsigned_abs() as usize));

    let mut nodes = Vec::new();
    let (mut control_planes, mut workers) = (0, 0);
    for (index, role) in roles.enumerate() {
        let name = match role {
            NodeRole::ControlPlane => {
                control_planes += 1;
                format!("control-plane-{control_planes}")
            }
            NodeRole::Worker => {
                workers += 1;
                format!("node-{workers}")
            }
        };
        let capacity = Resources::new(
            sample(&mut rng, config.node_cpu),
            sample(&mut rng, config.node_memory),
        );
        debug!("Node {name} ({role}) capacity {capacity}");
        nodes.push(ClusterNode {
            id: NodeId(index as u32),
            name,
            role,
            capacity,
            allocated: Resources::ZERO,
        });
    }

    let mut apps: Vec<&str> = Vec::new();
    for app in config.apps.iter().map(|a| a.trim()).filter(|a| !a.is_empty()) {
        if !apps.contains(&app) {
            apps.push(app);
        }
    }

    let mut pods = Vec::new();
    for index in 0..config.pods.unsigned_abs() as usize {
        let app = apps[index % apps.len()];
        let request = Resources::new(
            sample(&mut rng, config.pod_cpu),
            sample(&mut rng, config.pod_memory),
        );
        let mut pod = Pod {
            id: PodId(index as u32),
            name: format!("pod-{app}-{}", index / apps.len() + 1),
            app: app.to_string(),
            node: None,
            request,
            usage: Resources::ZERO,
            status: PodStatus::Pending,
            restarts: 0,
        };

        match best_fit(&nodes, request, &policy) {
            Some(slot) => {
                let node = &mut nodes[slot];
                node.allocated = node.allocated + request;
                pod.node = Some(node.id);
                pod.status = PodStatus::Running;
                pod.usage = sample_usage(&mut rng, request);
                debug!("Placed {} on {}", pod.name, node.name);
            }
            None => {
                warn!("No node has room for {} ({request}), leaving it pending", pod.name);
            }
        }
        pods.push(pod);
    }

    let services = if pods.is_empty() {
        Vec::new()
    } else {
        apps.iter()
            .map(|app| Service {
                name: format!("svc-{app}"),
                app: (*app).to_string(),
            })
            .collect()
    };

    let mut graph = ClusterGraph {
        generation: 0,
        seed: config.seed,
        policy,
        nodes,
        pods,
        services,
        edges: Vec::new(),
    };
    graph.rebuild_edges();

    info!(
        "Generated cluster: {} nodes, {} pods running, {} pending",
        graph.nodes.len(),
        graph.count_pods(PodStatus::Running),
        graph.count_pods(PodStatus::Pending)
    );
    debug_assert!(graph.violations().is_empty(), "{:?}", graph.violations());

    Ok(graph)
}
