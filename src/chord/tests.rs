//! Ring Protocol Tests
//!
//! Multi-node scenarios run real HTTP servers on loopback with
//! caller-chosen ring ids, driving stabilization rounds by hand so every
//! assertion runs against a deterministic topology.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use crate::chord::{ChordConfig, ChordNode, NodeClient};
    use crate::ring::{Finger, NUM_FINGERS};
    use crate::server::node_router;
    use crate::storage::{IdentifierAlgorithm, MemoryStore, Shard};

    struct TestNode {
        node: Arc<ChordNode>,
        server: JoinHandle<()>,
    }

    impl Drop for TestNode {
        fn drop(&mut self) {
            self.server.abort();
        }
    }

    /// Bind a loopback server with a chosen ring id.
    async fn spawn_node(id: u32) -> TestNode {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let local = Finger::with_id(addr, id);
        let node = ChordNode::new(
            local,
            NodeClient::new(),
            ChordConfig {
                random_finger_update: false,
                stabilize_interval: Duration::from_millis(50),
            },
        );
        let shard = Shard::new(
            node.clone(),
            Arc::new(MemoryStore::new()),
            IdentifierAlgorithm::Sha256,
            Vec::new(),
        );
        let router = node_router(node.clone(), shard);
        let server = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        TestNode { node, server }
    }

    async fn stabilize_all(nodes: &[&TestNode], rounds: usize) {
        for _ in 0..rounds {
            for n in nodes {
                n.node.stabilize().await.unwrap();
            }
        }
    }

    // ============================================================
    // SINGLETON AND JOIN TESTS
    // ============================================================

    #[tokio::test]
    async fn test_singleton_ring_invariants() {
        let a = spawn_node(0x50).await;
        a.node.join(a.node.local(), true).await.unwrap();

        assert_eq!(a.node.successor().await, a.node.local());
        assert_eq!(a.node.predecessor().await, None);
        for id in [0u32, 0x50, 0x51, u32::MAX] {
            assert!(a.node.owns_identifier(id).await);
        }

        // First stabilization round closes the self-loop.
        a.node.stabilize().await.unwrap();
        assert_eq!(a.node.predecessor().await, Some(a.node.local()));
        assert!(a.node.owns_identifier(0xDEAD_BEEF).await);
    }

    #[tokio::test]
    async fn test_two_node_ring_converges() {
        let a = spawn_node(0x50).await;
        let b = spawn_node(0x90).await;
        a.node.join(a.node.local(), true).await.unwrap();
        b.node.join(a.node.local(), false).await.unwrap();

        assert_eq!(b.node.successor().await, a.node.local());

        stabilize_all(&[&b, &a, &b], 2).await;

        assert_eq!(a.node.successor().await, b.node.local());
        assert_eq!(b.node.successor().await, a.node.local());
        assert_eq!(a.node.predecessor().await, Some(b.node.local()));
        assert_eq!(b.node.predecessor().await, Some(a.node.local()));

        // Ownership splits the ring between them.
        assert!(a.node.owns_identifier(0x50).await);
        assert!(!a.node.owns_identifier(0x90).await);
        assert!(b.node.owns_identifier(0x90).await);
        assert!(b.node.owns_identifier(0xFFFF_FFFF).await);
        assert!(a.node.owns_identifier(0x10).await);
    }

    #[tokio::test]
    async fn test_fresh_joiner_does_not_claim_the_ring() {
        let a = spawn_node(0x50).await;
        let b = spawn_node(0x90).await;
        a.node.join(a.node.local(), true).await.unwrap();
        a.node.stabilize().await.unwrap();
        b.node.join(a.node.local(), false).await.unwrap();

        // No notify has reached b yet: it has a real successor but no
        // predecessor, and must not shadow a's identifiers.
        assert_eq!(b.node.predecessor().await, None);
        assert_eq!(b.node.successor().await, a.node.local());
        for id in [0u32, 0x30, 0x50, 0x91, u32::MAX] {
            assert!(
                !b.node.owns_identifier(id).await,
                "joiner without a predecessor claimed {id:#x}"
            );
        }

        // Once stabilization hands it a predecessor it owns its slice.
        stabilize_all(&[&b, &a, &b], 2).await;
        assert!(b.node.owns_identifier(0x90).await);
        assert!(!b.node.owns_identifier(0x50).await);
    }

    #[tokio::test]
    async fn test_join_rejects_inconsistent_ring() {
        let a = spawn_node(0x50).await;
        let b = spawn_node(0x90).await;
        a.node.join(a.node.local(), true).await.unwrap();
        a.node.stabilize().await.unwrap();

        // a advertises a finger no successor walk can account for.
        let phantom = Finger::with_id("127.0.0.1:9996".parse().unwrap(), 0x30);
        let mut fingers = vec![a.node.local(); NUM_FINGERS];
        fingers[5] = phantom;
        a.node
            .set_ring_state(
                Some(a.node.local()),
                fingers,
                vec![Some(a.node.local()), None],
            )
            .await;

        let err = b.node.join(a.node.local(), false).await.unwrap_err();
        assert!(matches!(err, crate::error::ChordError::RingInconsistency));
    }

    #[tokio::test]
    async fn test_three_node_ring_sorts_itself() {
        // Join out of id order; stabilization must still produce the sorted
        // circular successor relation.
        let mid = spawn_node(0x50).await;
        let high = spawn_node(0x90).await;
        let low = spawn_node(0x10).await;

        mid.node.join(mid.node.local(), true).await.unwrap();
        high.node.join(mid.node.local(), false).await.unwrap();
        stabilize_all(&[&high, &mid, &high], 2).await;
        low.node.join(mid.node.local(), false).await.unwrap();
        stabilize_all(&[&low, &mid, &high], 6).await;

        assert_eq!(low.node.successor().await, mid.node.local());
        assert_eq!(mid.node.successor().await, high.node.local());
        assert_eq!(high.node.successor().await, low.node.local());
        assert_eq!(low.node.predecessor().await, Some(high.node.local()));
        assert_eq!(mid.node.predecessor().await, Some(low.node.local()));
        assert_eq!(high.node.predecessor().await, Some(mid.node.local()));
    }

    #[tokio::test]
    async fn test_stabilization_is_idempotent_when_converged() {
        let a = spawn_node(0x50).await;
        let b = spawn_node(0x90).await;
        a.node.join(a.node.local(), true).await.unwrap();
        b.node.join(a.node.local(), false).await.unwrap();
        stabilize_all(&[&b, &a, &b], 3).await;

        let before_a = a.node.ring_state().await;
        let before_b = b.node.ring_state().await;
        stabilize_all(&[&a, &b], 3).await;

        assert_eq!(a.node.ring_state().await.finger_table[0], before_a.finger_table[0]);
        assert_eq!(a.node.ring_state().await.predecessor, before_a.predecessor);
        assert_eq!(b.node.ring_state().await.finger_table[0], before_b.finger_table[0]);
        assert_eq!(b.node.ring_state().await.predecessor, before_b.predecessor);
    }

    // ============================================================
    // ROUTING TESTS
    // ============================================================

    #[tokio::test]
    async fn test_find_successor_resolves_owners() {
        let low = spawn_node(0x10).await;
        let mid = spawn_node(0x50).await;
        let high = spawn_node(0x90).await;
        low.node.join(low.node.local(), true).await.unwrap();
        mid.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&mid, &low, &mid], 2).await;
        high.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&high, &low, &mid], 6).await;

        // Every node must agree on ownership, wrap included.
        for n in [&low, &mid, &high] {
            assert_eq!(n.node.find_successor(0x11).await.unwrap(), mid.node.local());
            assert_eq!(n.node.find_successor(0x50).await.unwrap(), mid.node.local());
            assert_eq!(n.node.find_successor(0x51).await.unwrap(), high.node.local());
            assert_eq!(n.node.find_successor(0x90).await.unwrap(), high.node.local());
            assert_eq!(n.node.find_successor(0x91).await.unwrap(), low.node.local());
            assert_eq!(n.node.find_successor(u32::MAX).await.unwrap(), low.node.local());
            assert_eq!(n.node.find_successor(0x10).await.unwrap(), low.node.local());
        }
    }

    #[tokio::test]
    async fn test_fix_fingers_fills_table_with_owners() {
        let low = spawn_node(0x10).await;
        let mid = spawn_node(0x50).await;
        let high = spawn_node(0x90).await;
        low.node.join(low.node.local(), true).await.unwrap();
        mid.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&mid, &low, &mid], 2).await;
        high.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&high, &low, &mid], 6).await;

        // Round-robin refresh touches every slot once per full pass.
        for _ in 1..NUM_FINGERS {
            low.node.fix_fingers().await;
        }

        let fingers = low.node.finger_table().await;
        // target 0x10 + 2^6 = 0x50: owned by mid, inclusive bound
        assert_eq!(fingers[7].id, 0x50);
        // target 0x10 + 2^7 = 0x90: owned by high
        assert_eq!(fingers[8].id, 0x90);
        // target 0x10 + 2^8 = 0x110: wraps home
        assert_eq!(fingers[9].id, 0x10);
        for finger in &fingers {
            assert!(
                [0x10, 0x50, 0x90].contains(&finger.id),
                "unexpected finger {finger}"
            );
        }

        // Farthest live finger strictly before the identifier.
        assert_eq!(
            low.node.closest_preceding_finger(0x90).await,
            mid.node.local()
        );
        assert_eq!(
            low.node.closest_preceding_finger(0x91).await,
            high.node.local()
        );
    }

    // ============================================================
    // OWNERSHIP TESTS (no network)
    // ============================================================

    #[tokio::test]
    async fn test_ownership_partition_without_network() {
        let addr = "127.0.0.1:9999".parse().unwrap();
        let make = |id: u32, pred: u32| {
            let node = ChordNode::new(
                Finger::with_id(addr, id),
                NodeClient::new(),
                ChordConfig::default(),
            );
            (node, pred)
        };
        let ring = [make(0x10, 0x90), make(0x50, 0x10), make(0x90, 0x50)];
        for (node, pred) in &ring {
            node.set_ring_state(
                Some(Finger::with_id(addr, *pred)),
                vec![node.local(); NUM_FINGERS],
                vec![Some(node.local()), None],
            )
            .await;
        }

        for id in [0u32, 0x10, 0x11, 0x50, 0x51, 0x90, 0x91, u32::MAX] {
            let owners = count_owners(&ring, id).await;
            assert_eq!(owners, 1, "id {id:#x} should have exactly one owner");
        }
    }

    async fn count_owners(ring: &[(Arc<ChordNode>, u32); 3], id: u32) -> usize {
        let mut owners = 0;
        for (node, _) in ring {
            if node.owns_identifier(id).await {
                owners += 1;
            }
        }
        owners
    }

    // ============================================================
    // DEPARTURE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_leave_rewires_neighbors() {
        let low = spawn_node(0x10).await;
        let mid = spawn_node(0x50).await;
        let high = spawn_node(0x90).await;
        low.node.join(low.node.local(), true).await.unwrap();
        mid.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&mid, &low, &mid], 2).await;
        high.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&high, &low, &mid], 6).await;

        mid.node.leave().await;

        assert_eq!(low.node.successor().await, high.node.local());
        assert_eq!(high.node.predecessor().await, Some(low.node.local()));

        // The shrunken ring still converges.
        stabilize_all(&[&low, &high], 3).await;
        assert_eq!(high.node.successor().await, low.node.local());
        assert_eq!(low.node.predecessor().await, Some(high.node.local()));
    }

    #[tokio::test]
    async fn test_remove_node_replaces_only_matching_entries() {
        let addr = "127.0.0.1:9998".parse().unwrap();
        let node = ChordNode::new(
            Finger::with_id(addr, 0x10),
            NodeClient::new(),
            ChordConfig::default(),
        );
        let departing = Finger::with_id(addr, 0x50);
        let replacement = Finger::with_id(addr, 0x90);
        let mut fingers = vec![node.local(); NUM_FINGERS];
        fingers[0] = departing;
        fingers[5] = departing;
        node.set_ring_state(None, fingers, vec![Some(departing), None])
            .await;

        node.remove_node(departing, 0, replacement, 0).await;
        node.remove_node(departing, 3, replacement, 0).await;

        let state = node.ring_state().await;
        assert_eq!(state.finger_table[0], replacement);
        assert_eq!(state.successor_list[0], Some(replacement));
        assert_eq!(state.finger_table[5], departing, "only the named index changes");
        assert_eq!(state.finger_table[3], node.local());
    }

    // ============================================================
    // FAILURE RECOVERY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_update_successor_promotes_from_list() {
        let low = spawn_node(0x10).await;
        let mid = spawn_node(0x50).await;
        let high = spawn_node(0x90).await;
        low.node.join(low.node.local(), true).await.unwrap();
        mid.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&mid, &low, &mid], 2).await;
        high.node.join(low.node.local(), false).await.unwrap();
        stabilize_all(&[&high, &low, &mid], 6).await;
        low.node.refresh_successors(0).await.unwrap();

        let list = low.node.successor_list().await;
        assert_eq!(list[0], Some(mid.node.local()));
        assert_eq!(list[1], Some(high.node.local()));

        // Crash the direct successor; the next list entry takes over.
        mid.server.abort();
        tokio::time::sleep(Duration::from_millis(20)).await;

        low.node.update_successor().await.unwrap();
        assert_eq!(low.node.successor().await, high.node.local());

        // Stabilization then repairs the predecessor link too.
        stabilize_all(&[&low, &high], 3).await;
        assert_eq!(high.node.predecessor().await, Some(low.node.local()));
    }

    #[tokio::test]
    async fn test_isolated_node_reports_fatal_error() {
        let a = spawn_node(0x10).await;
        let b = spawn_node(0x50).await;
        a.node.join(a.node.local(), true).await.unwrap();
        b.node.join(a.node.local(), false).await.unwrap();

        // b only knows a; killing a leaves b with no live successor.
        a.server.abort();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = b.node.update_successor().await.unwrap_err();
        assert!(matches!(err, crate::error::ChordError::Isolated));
    }
}
