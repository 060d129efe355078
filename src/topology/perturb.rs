use std::fmt;

use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::{ClusterGraph, PodStatus, Resources};

use super::{best_fit, sample_usage};

/// A simulated change applied between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClusterEvent {
    PodCrashed { pod: String, node: String },
    PodRecovered { pod: String, node: String },
    PodScheduled { pod: String, node: String },
    UsageDrift { node: String },
}

impl fmt::Display for ClusterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PodCrashed { pod, node } => write!(f, "{pod} entered CrashLoopBackOff on {node}"),
            Self::PodRecovered { pod, node } => write!(f, "{pod} recovered on {node}"),
            Self::PodScheduled { pod, node } => write!(f, "{pod} scheduled onto {node}"),
            Self::UsageDrift { node } => write!(f, "resource usage shifted on {node}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Crash,
    Recover,
    Schedule,
    Drift,
}

/// Derives the next snapshot by applying a few simulated events.
///
/// Never touches `graph`. The result is reproducible from the graph's seed
/// and generation.
pub fn perturb(graph: &ClusterGraph) -> ClusterGraph {
    perturb_with_events(graph).0
}

/// Like [`perturb`], also returning the events that were applied.
pub fn perturb_with_events(graph: &ClusterGraph) -> (ClusterGraph, Vec<ClusterEvent>) {
    let mut next = graph.clone();
    next.generation = graph.generation + 1;

    let mut rng = ChaCha8Rng::seed_from_u64(
        graph
            .seed
            .wrapping_add(next.generation.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
    );

    let budget = if graph.policy.max_events == 0 {
        0
    } else {
        rng.random_range(1..=graph.policy.max_events)
    };

    let mut events = Vec::new();
    for _ in 0..budget {
        let candidates = applicable(&next);
        if candidates.is_empty() {
            break;
        }
        let kind = candidates[rng.random_range(0..candidates.len())];
        if let Some(event) = apply(&mut next, kind, &mut rng) {
            debug!("Generation {}: {event}", next.generation);
            events.push(event);
        }
        next.recompute_allocations();
    }
    next.rebuild_edges();

    let problems = next.violations();
    if !problems.is_empty() {
        warn!(
            "Discarding inconsistent generation {}: {}",
            next.generation,
            problems.join("; ")
        );
        let mut unchanged = graph.clone();
        unchanged.generation = next.generation;
        return (unchanged, Vec::new());
    }

    (next, events)
}

fn applicable(graph: &ClusterGraph) -> Vec<EventKind> {
    let mut kinds = Vec::new();
    if graph.pods.iter().any(|p| p.status == PodStatus::Running) {
        kinds.push(EventKind::Crash);
        kinds.push(EventKind::Drift);
    }
    if graph.pods.iter().any(|p| {
        p.status == PodStatus::Crashloop
            && p.node
                .and_then(|id| graph.node(id))
                .is_some_and(|n| n.can_fit(p.request))
    }) {
        kinds.push(EventKind::Recover);
    }
    if graph.pods.iter().any(|p| {
        p.status == PodStatus::Pending && best_fit(&graph.nodes, p.request, &graph.policy).is_some()
    }) {
        kinds.push(EventKind::Schedule);
    }
    kinds
}

fn node_name(graph: &ClusterGraph, index: usize) -> String {
    graph.pods[index]
        .node
        .and_then(|id| graph.node(id))
        .map(|n| n.name.clone())
        .unwrap_or_default()
}

fn apply(graph: &mut ClusterGraph, kind: EventKind, rng: &mut ChaCha8Rng) -> Option<ClusterEvent> {
    match kind {
        EventKind::Crash => {
            let running: Vec<usize> = (0..graph.pods.len())
                .filter(|&i| graph.pods[i].status == PodStatus::Running)
                .collect();
            let index = *running.get(rng.random_range(0..running.len().max(1)))?;
            let pod = &mut graph.pods[index];
            pod.status = PodStatus::Crashloop;
            pod.restarts += 1;
            pod.usage = Resources::ZERO;
            Some(ClusterEvent::PodCrashed {
                pod: graph.pods[index].name.clone(),
                node: node_name(graph, index),
            })
        }
        EventKind::Recover => {
            let index = (0..graph.pods.len()).find(|&i| {
                let pod = &graph.pods[i];
                pod.status == PodStatus::Crashloop
                    && pod
                        .node
                        .and_then(|id| graph.node(id))
                        .is_some_and(|n| n.can_fit(pod.request))
            })?;
            let usage = sample_usage(rng, graph.pods[index].request);
            let pod = &mut graph.pods[index];
            pod.status = PodStatus::Running;
            pod.usage = usage;
            Some(ClusterEvent::PodRecovered {
                pod: graph.pods[index].name.clone(),
                node: node_name(graph, index),
            })
        }
        EventKind::Schedule => {
            let (index, slot) = (0..graph.pods.len()).find_map(|i| {
                let pod = &graph.pods[i];
                if pod.status != PodStatus::Pending {
                    return None;
                }
                best_fit(&graph.nodes, pod.request, &graph.policy).map(|slot| (i, slot))
            })?;
            let node_id = graph.nodes[slot].id;
            let usage = sample_usage(rng, graph.pods[index].request);
            let pod = &mut graph.pods[index];
            pod.node = Some(node_id);
            pod.status = PodStatus::Running;
            pod.usage = usage;
            Some(ClusterEvent::PodScheduled {
                pod: graph.pods[index].name.clone(),
                node: graph.nodes[slot].name.clone(),
            })
        }
        EventKind::Drift => {
            let busy: Vec<usize> = (0..graph.nodes.len())
                .filter(|&n| {
                    let id = graph.nodes[n].id;
                    graph
                        .pods
                        .iter()
                        .any(|p| p.node == Some(id) && p.status == PodStatus::Running)
                })
                .collect();
            let slot = *busy.get(rng.random_range(0..busy.len().max(1)))?;
            let id = graph.nodes[slot].id;
            for pod in graph
                .pods
                .iter_mut()
                .filter(|p| p.node == Some(id) && p.status == PodStatus::Running)
            {
                pod.usage = sample_usage(rng, pod.request);
            }
            Some(ClusterEvent::UsageDrift {
                node: graph.nodes[slot].name.clone(),
            })
        }
    }
}
