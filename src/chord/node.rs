//! Core of the Chord ring: per-node routing state and the membership
//! protocol that keeps it correct as nodes join, leave, and fail.
//!
//! A `ChordNode` keeps every mutable pointer (successor, predecessor,
//! finger table, successor list) in one `RingState` behind a single lock.
//! Both the periodic stabilization task and concurrent inbound handlers
//! mutate it; no lock is ever held across a remote call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::ChordError;
use crate::ring::{Finger, NUM_FINGERS, finger_target, within_interval};

use super::remote::{NodeClient, RemoteNode};

/// Number of blob copies kept along the successor chain, counting the
/// owner. Also the length of the successor list and the number of lookup
/// failover attempts.
pub const REPLICATION_FACTOR: usize = 2;

/// Default stabilization tick.
pub const STABILIZE_INTERVAL: Duration = Duration::from_secs(1);

/// Routing walks give up after this many hops; a correct ring resolves any
/// identifier in O(log N) and this bound only catches corrupted topologies.
const MAX_ROUTING_HOPS: usize = 2 * NUM_FINGERS;

/// Upper bound on the join-time ring walk.
const MAX_RING_WALK: usize = 1024;

/// Upper bound on predecessor-ward propagation of a leave's finger
/// replacement.
const MAX_REMOVE_HOPS: u32 = 128;

/// Mutable ring pointers of one node.
///
/// Slot 0 of the finger table is the direct successor; the successor list
/// holds up to `REPLICATION_FACTOR` distinct downstream neighbors, padded
/// with `None` when the ring is smaller than that.
#[derive(Debug, Clone)]
pub struct RingState {
    pub predecessor: Option<Finger>,
    pub finger_table: Vec<Finger>,
    pub successor_list: Vec<Option<Finger>>,
    next_finger: usize,
}

/// Tuning knobs for one node; defaults match a production ring.
#[derive(Debug, Clone)]
pub struct ChordConfig {
    /// Pick the finger slot to refresh at random instead of round-robin.
    pub random_finger_update: bool,
    pub stabilize_interval: Duration,
}

impl Default for ChordConfig {
    fn default() -> Self {
        Self {
            random_finger_update: false,
            stabilize_interval: STABILIZE_INTERVAL,
        }
    }
}

pub struct ChordNode {
    local: Finger,
    state: Mutex<RingState>,
    client: NodeClient,
    config: ChordConfig,
}

impl ChordNode {
    pub fn new(local: Finger, client: NodeClient, config: ChordConfig) -> Arc<Self> {
        let mut successor_list = vec![None; REPLICATION_FACTOR];
        successor_list[0] = Some(local);
        Arc::new(Self {
            local,
            state: Mutex::new(RingState {
                predecessor: None,
                finger_table: vec![local; NUM_FINGERS],
                successor_list,
                next_finger: 0,
            }),
            client,
            config,
        })
    }

    pub fn local(&self) -> Finger {
        self.local
    }

    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    pub fn stabilize_interval(&self) -> Duration {
        self.config.stabilize_interval
    }

    fn remote(&self, peer: Finger) -> RemoteNode {
        self.client.open(peer)
    }

    pub async fn successor(&self) -> Finger {
        self.state.lock().await.finger_table[0]
    }

    pub async fn predecessor(&self) -> Option<Finger> {
        self.state.lock().await.predecessor
    }

    pub async fn finger_table(&self) -> Vec<Finger> {
        self.state.lock().await.finger_table.clone()
    }

    pub async fn successor_list(&self) -> Vec<Option<Finger>> {
        self.state.lock().await.successor_list.clone()
    }

    /// Overwrite the predecessor pointer. Remote operation, used by a
    /// leaving predecessor handing its own predecessor to us.
    pub async fn set_predecessor(&self, predecessor: Finger) {
        self.state.lock().await.predecessor = Some(predecessor);
    }

    /// Ownership test: this node owns exactly `(predecessor, self]`.
    ///
    /// With no predecessor the full ring is claimed only when the
    /// successor is also self (a true singleton). A freshly joined node
    /// has a real successor but no predecessor until the first notify
    /// lands; it owns nothing yet and must route instead of answering.
    pub async fn owns_identifier(&self, identifier: u32) -> bool {
        let (pred, successor) = {
            let state = self.state.lock().await;
            (state.predecessor, state.finger_table[0])
        };
        match pred {
            Some(pred) => within_interval(
                identifier,
                pred.id.wrapping_add(1),
                self.local.id.wrapping_add(1),
            ),
            None => successor == self.local,
        }
    }

    // --- Routing ---

    /// Node owning `identifier`: the successor of its predecessor.
    pub async fn find_successor(&self, identifier: u32) -> Result<Finger, ChordError> {
        let pred = self.find_predecessor(identifier).await?;
        if pred == self.local {
            Ok(self.successor().await)
        } else {
            self.remote(pred).get_successor().await
        }
    }

    /// Walk the ring until the current node's successor interval contains
    /// `identifier`. Each hop delegates to the current node's own
    /// closest-preceding-finger scan, which skips unreachable fingers, so a
    /// dead finger costs a probe rather than aborting the walk.
    pub async fn find_predecessor(&self, identifier: u32) -> Result<Finger, ChordError> {
        let mut current = self.local;
        let mut successor = self.successor().await;
        let mut hops = 0;
        while !within_interval(
            identifier,
            current.id.wrapping_add(1),
            successor.id.wrapping_add(1),
        ) {
            let next = if current == self.local {
                self.closest_preceding_finger(identifier).await
            } else {
                self.remote(current).closest_preceding_finger(identifier).await?
            };
            if next == current {
                // No finger makes progress; stabilization has to repair the
                // ring before this query can resolve further.
                break;
            }
            current = next;
            successor = if current == self.local {
                self.successor().await
            } else {
                self.remote(current).get_successor().await?
            };
            hops += 1;
            if hops > MAX_ROUTING_HOPS {
                error!("routing for {identifier:08x} exceeded {MAX_ROUTING_HOPS} hops");
                return Err(ChordError::RingInconsistency);
            }
        }
        Ok(current)
    }

    /// Scan the finger table from farthest to nearest for a live node
    /// strictly inside `(self, identifier)`. Falling through to self is the
    /// correct answer when no finger qualifies.
    pub async fn closest_preceding_finger(&self, identifier: u32) -> Finger {
        let fingers = self.finger_table().await;
        for finger in fingers.iter().rev() {
            if *finger == self.local {
                continue;
            }
            if within_interval(finger.id, self.local.id.wrapping_add(1), identifier) {
                match self.remote(*finger).get_location().await {
                    Ok(_) => return *finger,
                    Err(_) => {
                        debug!("skipping unreachable finger {finger}");
                        continue;
                    }
                }
            }
        }
        self.local
    }

    // --- Join ---

    /// Join the ring through `bootstrap`, or start a new singleton ring.
    ///
    /// Joining only sets this node's own successor; nobody else's finger
    /// table is rewritten here. Background stabilization folds the new node
    /// into everyone else's state, which keeps joins cheap and non-blocking
    /// for the rest of the ring.
    pub async fn join(&self, bootstrap: Finger, is_first: bool) -> Result<(), ChordError> {
        info!("joining via {bootstrap}; is_first={is_first}");
        if is_first {
            let mut state = self.state.lock().await;
            state.predecessor = None;
            for slot in state.finger_table.iter_mut() {
                *slot = self.local;
            }
            state.successor_list = vec![None; REPLICATION_FACTOR];
            state.successor_list[0] = Some(self.local);
            return Ok(());
        }

        let successor = self.remote(bootstrap).find_successor(self.local.id).await?;
        {
            let mut state = self.state.lock().await;
            state.predecessor = None;
            state.finger_table[0] = successor;
            state.successor_list[0] = Some(successor);
        }
        self.verify_ring(bootstrap, successor).await?;
        self.refresh_successors(0).await?;
        info!("joined ring with successor {successor}");
        Ok(())
    }

    /// Join-time integrity check: every node the successor routes to, plus
    /// the bootstrap node itself, must be reachable by walking successor
    /// pointers. A consistency check against a trusted bootstrap, not an
    /// adversarial defense.
    async fn verify_ring(&self, bootstrap: Finger, successor: Finger) -> Result<(), ChordError> {
        let table = self.remote(successor).get_finger_table().await?;
        let mut to_find: HashSet<u32> = table.iter().map(|f| f.id).collect();
        to_find.insert(bootstrap.id);
        to_find.remove(&successor.id);
        to_find.remove(&self.local.id);
        if to_find.is_empty() {
            return Ok(());
        }

        let mut current = self.remote(successor).get_successor().await?;
        let mut hops = 0;
        while current.id != self.local.id && current.id != successor.id {
            to_find.remove(&current.id);
            if to_find.is_empty() {
                break;
            }
            current = self.remote(current).get_successor().await?;
            hops += 1;
            if hops > MAX_RING_WALK {
                break;
            }
        }

        if to_find.is_empty() {
            Ok(())
        } else {
            error!("ring walk could not locate {} expected node(s)", to_find.len());
            Err(ChordError::RingInconsistency)
        }
    }

    // --- Stabilization ---

    /// One stabilization round: verify the successor pointer against the
    /// successor's predecessor, then offer ourselves as its predecessor.
    ///
    /// The only fatal outcome is `Isolated`; everything else is healed on a
    /// later tick.
    pub async fn stabilize(&self) -> Result<(), ChordError> {
        // Drop a dead predecessor so a live candidate can take its place on
        // the next notify.
        if let Some(pred) = self.predecessor().await
            && pred != self.local
            && self.remote(pred).get_location().await.is_err()
        {
            warn!("predecessor {pred} unreachable; clearing");
            self.state.lock().await.predecessor = None;
        }

        let mut successor = self.successor().await;

        let candidate = if successor == self.local {
            self.predecessor().await
        } else {
            match self.remote(successor).get_predecessor().await {
                Ok(pred) => pred,
                Err(_) => {
                    warn!("successor {successor} unreachable during stabilize");
                    self.update_successor().await?;
                    successor = self.successor().await;
                    None
                }
            }
        };

        if let Some(x) = candidate
            && x != successor
            && within_interval(x.id, self.local.id.wrapping_add(1), successor.id)
            && (x == self.local || self.remote(x).get_location().await.is_ok())
        {
            // A new node slipped in between us and our old successor.
            info!("updating successor from {successor} to {x}");
            {
                let mut state = self.state.lock().await;
                state.finger_table[0] = x;
                state.successor_list[0] = Some(x);
            }
            successor = x;
            if let Some(pred) = self.predecessor().await
                && pred != self.local
                && let Err(e) = self
                    .remote(pred)
                    .refresh_successors((REPLICATION_FACTOR - 1) as u32)
                    .await
            {
                warn!("failed to ask predecessor {pred} to refresh successors: {e}");
            }
        }

        if successor == self.local {
            // Singleton ring: claim ourselves so the singleton invariant
            // (successor = predecessor = self) holds after the first tick.
            self.notify_predecessor(self.local).await;
        } else if self.remote(successor).notify_predecessor(self.local).await.is_err() {
            self.update_successor().await?;
        }
        Ok(())
    }

    /// Adopt `candidate` as predecessor if we have none, or if it sits
    /// between the current predecessor and us.
    pub async fn notify_predecessor(&self, candidate: Finger) {
        let mut state = self.state.lock().await;
        let adopt = match state.predecessor {
            None => true,
            Some(pred) => {
                within_interval(candidate.id, pred.id.wrapping_add(1), self.local.id)
            }
        };
        if adopt && state.predecessor != Some(candidate) {
            match state.predecessor {
                Some(old) => info!("updating predecessor from {old} to {candidate}"),
                None => info!("adopting predecessor {candidate}"),
            }
            state.predecessor = Some(candidate);
        }
    }

    /// Refresh exactly one finger slot. Correctness never depends on the
    /// finger table being complete, so one slot per tick is enough.
    pub async fn fix_fingers(&self) {
        let index = {
            let mut state = self.state.lock().await;
            let index = if self.config.random_finger_update {
                rand::thread_rng().gen_range(1..NUM_FINGERS)
            } else if state.next_finger >= NUM_FINGERS - 1 {
                1
            } else {
                state.next_finger + 1
            };
            state.next_finger = index;
            index
        };

        let target = finger_target(self.local.id, index as u32);
        match self.find_successor(target).await {
            Ok(finger) => {
                let mut state = self.state.lock().await;
                if state.finger_table[index] != finger {
                    debug!(
                        "updating finger[{index}] from {} to {finger}",
                        state.finger_table[index]
                    );
                }
                state.finger_table[index] = finger;
            }
            Err(e) => warn!("failed to refresh finger[{index}]: {e}"),
        }
    }

    /// Rebuild the successor list by walking up to `REPLICATION_FACTOR`
    /// successor hops, stopping early when the walk cycles back (ring
    /// smaller than the list). While `nodes_left` is positive the request is
    /// propagated one predecessor further, so neighbors agree on the
    /// replica set.
    pub async fn refresh_successors(&self, nodes_left: u32) -> Result<(), ChordError> {
        let mut list = vec![None; REPLICATION_FACTOR];
        let mut seen = HashSet::new();
        let mut successor = self.successor().await;
        for slot in list.iter_mut() {
            if !seen.insert(successor.id) {
                break;
            }
            *slot = Some(successor);
            successor = if successor == self.local {
                self.successor().await
            } else {
                self.remote(successor).get_successor().await?
            };
        }
        self.state.lock().await.successor_list = list;

        if nodes_left > 0
            && let Some(pred) = self.predecessor().await
            && pred != self.local
        {
            self.remote(pred).refresh_successors(nodes_left - 1).await?;
        }
        Ok(())
    }

    /// Promote the next live successor-list entry after the direct
    /// successor failed. `Isolated` when nothing on the list responds; the
    /// node must leave the ring rather than keep serving.
    pub async fn update_successor(&self) -> Result<(), ChordError> {
        let candidates: Vec<Finger> = {
            let state = self.state.lock().await;
            state.successor_list.iter().skip(1).flatten().copied().collect()
        };

        for candidate in candidates {
            {
                let mut state = self.state.lock().await;
                state.finger_table[0] = candidate;
                state.successor_list[0] = Some(candidate);
            }
            match self.refresh_successors(0).await {
                Ok(()) => {
                    info!("recovered from successor failure; promoted {candidate}");
                    return Ok(());
                }
                Err(e) => warn!("successor-list entry {candidate} unusable: {e}"),
            }
        }

        error!("no successor-list entry is reachable; node is isolated");
        Err(ChordError::Isolated)
    }

    // --- Leave ---

    /// Best-effort graceful departure: hand our predecessor to the
    /// successor, then walk each finger index and ask the nodes pointing at
    /// us to point at our successor instead. Concurrent churn during a
    /// leave is not guaranteed to converge cleanly; stabilization mops up.
    pub async fn leave(&self) {
        let (pred, successor) = {
            let state = self.state.lock().await;
            (state.predecessor, state.finger_table[0])
        };
        let Some(pred) = pred else { return };
        if pred == self.local || successor == self.local {
            return;
        }

        if let Err(e) = self.remote(successor).set_predecessor(pred).await {
            warn!("failed to hand predecessor to successor: {e}");
        }

        for index in 0..NUM_FINGERS {
            // Nodes whose finger[index] can point at us own identifiers at
            // or below self.id - 2^index.
            let target = self
                .local
                .id
                .wrapping_sub(1u32 << index)
                .wrapping_add(1);
            match self.find_predecessor(target).await {
                Ok(p) if p == self.local => {
                    self.remove_node(self.local, index, successor, MAX_REMOVE_HOPS)
                        .await;
                }
                Ok(p) => {
                    if let Err(e) = self
                        .remote(p)
                        .remove_node(self.local, index, successor, MAX_REMOVE_HOPS)
                        .await
                    {
                        warn!("failed to notify {p} of departure: {e}");
                    }
                }
                Err(e) => warn!("failed to resolve finger[{index}] predecessor: {e}"),
            }
        }
        info!("left the ring");
    }

    /// Replace a departing node's entry at `index` with `replacement` and
    /// propagate predecessor-ward while the entry keeps matching.
    pub async fn remove_node(
        &self,
        node: Finger,
        index: usize,
        replacement: Finger,
        hops_remaining: u32,
    ) {
        let (matched, pred) = {
            let mut state = self.state.lock().await;
            if index < NUM_FINGERS && state.finger_table[index].id == node.id {
                state.finger_table[index] = replacement;
                if index == 0 {
                    state.successor_list[0] = Some(replacement);
                }
                (true, state.predecessor)
            } else {
                (false, None)
            }
        };
        if !matched || hops_remaining == 0 {
            return;
        }
        if let Some(pred) = pred
            && pred != self.local
            && pred.id != node.id
        {
            if let Err(e) = self
                .remote(pred)
                .remove_node(node, index, replacement, hops_remaining - 1)
                .await
            {
                warn!("failed to propagate finger removal to {pred}: {e}");
            }
        }
    }

    // --- Test support ---

    #[cfg(test)]
    pub(crate) async fn set_ring_state(
        &self,
        predecessor: Option<Finger>,
        finger_table: Vec<Finger>,
        successor_list: Vec<Option<Finger>>,
    ) {
        let mut state = self.state.lock().await;
        state.predecessor = predecessor;
        state.finger_table = finger_table;
        state.successor_list = successor_list;
    }

    #[cfg(test)]
    pub(crate) async fn ring_state(&self) -> RingState {
        self.state.lock().await.clone()
    }
}
