//! Cluster topology model.
//!
//! Builds a toy Kubernetes cluster (nodes, pods, services) whose numbers add
//! up: no node is ever over-committed and every bound pod points at a node
//! that exists. Pods that fit nowhere stay `pending`.

mod generate;
mod perturb;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::model::{ClusterNode, PlacementPolicy, Resources};

pub use generate::generate;
pub use perturb::{perturb, perturb_with_events, ClusterEvent};

/// Best-fit placement: the accepting node with the most headroom that can
/// still hold `request`.
///
/// Headroom compares remaining CPU first, then remaining memory. Ties go to
/// the node listed first.
pub(crate) fn best_fit(
    nodes: &[ClusterNode],
    request: Resources,
    policy: &PlacementPolicy,
) -> Option<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| policy.accepts(node) && node.can_fit(request))
        .max_by(|(ia, a), (ib, b)| {
            let (ha, hb) = (a.headroom(), b.headroom());
            (ha.cpu, ha.memory)
                .cmp(&(hb.cpu, hb.memory))
                .then(ib.cmp(ia))
        })
        .map(|(index, _)| index)
}

/// Simulated usage somewhere between 30% and 100% of the request.
pub(crate) fn sample_usage(rng: &mut ChaCha8Rng, request: Resources) -> Resources {
    let pct = rng.random_range(30..=100u64);
    Resources::new(percent_of(request.cpu, pct), percent_of(request.memory, pct))
}

/// `pct` percent of `amount`, never above `amount` for `pct <= 100`.
fn percent_of(amount: u64, pct: u64) -> u64 {
    let scaled = u128::from(amount) * u128::from(pct) / 100;
    u64::try_from(scaled).unwrap_or(amount)
}
