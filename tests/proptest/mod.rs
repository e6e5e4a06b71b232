//! Property-based tests for the admission decision, drain filtering, and
//! state durability
//!
//! These tests generate random cluster snapshots and verify that:
//! 1. A grant is never issued while another replacement is in flight
//! 2. Not-Ready nodes and the capacity floor inhibit grants
//! 3. Forced replacements always outrank drift-announced ones
//! 4. Selection prefers masters and is otherwise first-wins
//! 5. A stamped node is never re-initialized (drift stays announced)
//! 6. DaemonSet pods never become drain candidates
//! 7. The state file round-trips exactly

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Node, NodeCondition, NodeStatus, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference, Time};
use proptest::prelude::*;

use node_rollover::agent::drain::drain_candidates;
use node_rollover::agent::{classify, AgentStatus, PollStep};
use node_rollover::annotations;
use node_rollover::operator::admission::{decide, in_flight, next_to_update, Decision};
use node_rollover::operator::{State, StateStore};

// =============================================================================
// Snapshot generators
// =============================================================================

#[derive(Debug, Clone)]
struct NodeSeed {
    ready: bool,
    drifted: bool,
    in_progress: bool,
    permission: bool,
    master: bool,
    created_secs: i64,
}

fn arb_seed() -> impl Strategy<Value = NodeSeed> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0i64..100_000,
    )
        .prop_map(
            |(ready, drifted, in_progress, permission, master, created_secs)| NodeSeed {
                ready,
                drifted,
                in_progress,
                permission,
                master,
                created_secs,
            },
        )
}

fn build_node(index: usize, seed: &NodeSeed) -> Node {
    let mut node_annotations = BTreeMap::new();
    if seed.drifted {
        node_annotations.insert(annotations::UPDATE_NEEDED.to_string(), "true".to_string());
    }
    if seed.in_progress {
        node_annotations.insert(
            annotations::UPDATE_IN_PROGRESS.to_string(),
            "true".to_string(),
        );
    }
    if seed.permission {
        node_annotations.insert(
            annotations::CAN_START_TERMINATION.to_string(),
            "true".to_string(),
        );
    }
    let mut labels = BTreeMap::new();
    if seed.master {
        labels.insert("role".to_string(), "master".to_string());
    }

    Node {
        metadata: ObjectMeta {
            name: Some(format!("node-{index}")),
            annotations: Some(node_annotations),
            labels: Some(labels),
            creation_timestamp: Some(Time(Utc.timestamp_opt(seed.created_secs, 0).unwrap())),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".to_string(),
                status: if seed.ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn snapshot(seeds: &[NodeSeed]) -> (Vec<Node>, Vec<Node>) {
    let all: Vec<Node> = seeds
        .iter()
        .enumerate()
        .map(|(i, seed)| build_node(i, seed))
        .collect();
    let ready: Vec<Node> = all
        .iter()
        .zip(seeds)
        .filter(|(_, seed)| seed.ready)
        .map(|(node, _)| node.clone())
        .collect();
    (all, ready)
}

fn build_pod(index: usize, owner_kind: Option<&str>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(format!("pod-{index}")),
            namespace: Some("default".to_string()),
            uid: Some(format!("uid-{index}")),
            owner_references: owner_kind.map(|kind| {
                vec![OwnerReference {
                    api_version: "apps/v1".to_string(),
                    kind: kind.to_string(),
                    name: "owner".to_string(),
                    uid: "owner-uid".to_string(),
                    ..Default::default()
                }]
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

// =============================================================================
// Admission properties
// =============================================================================

proptest! {
    #[test]
    fn grant_never_issued_while_in_flight(
        seeds in proptest::collection::vec(arb_seed(), 1..10),
        node_count in 0usize..12,
        watermark in 0i64..100_000,
    ) {
        let (all, ready) = snapshot(&seeds);
        let state = State {
            node_count,
            last_accepted_creation_time: Utc.timestamp_opt(watermark, 0).unwrap(),
        };
        if let Decision::Grant { .. } = decide(&all, &ready, &state) {
            prop_assert!(!in_flight(&ready));
            prop_assert_eq!(all.len(), ready.len());
            prop_assert!(ready.len() >= state.node_count);
        }
    }

    #[test]
    fn not_ready_nodes_inhibit_all_writes(
        mut seeds in proptest::collection::vec(arb_seed(), 1..10),
    ) {
        seeds[0].ready = false;
        let (all, ready) = snapshot(&seeds);
        let state = State {
            node_count: 0,
            last_accepted_creation_time: DateTime::UNIX_EPOCH,
        };
        prop_assert_eq!(
            decide(&all, &ready, &state),
            Decision::AwaitReady { total: all.len(), ready: ready.len() }
        );
    }

    #[test]
    fn capacity_floor_inhibits_grants(
        mut seeds in proptest::collection::vec(arb_seed(), 1..10),
        extra in 1usize..5,
    ) {
        for seed in &mut seeds {
            seed.ready = true;
            seed.in_progress = false;
            seed.permission = false;
        }
        seeds[0].drifted = true;
        let (all, ready) = snapshot(&seeds);
        let state = State {
            node_count: ready.len() + extra,
            last_accepted_creation_time: DateTime::UNIX_EPOCH,
        };
        prop_assert_eq!(
            decide(&all, &ready, &state),
            Decision::AwaitCapacity { ready: ready.len(), floor: ready.len() + extra }
        );
    }

    #[test]
    fn force_partition_always_outranks(
        mut seeds in proptest::collection::vec(arb_seed(), 2..10),
    ) {
        for seed in &mut seeds {
            seed.ready = true;
            seed.in_progress = false;
            seed.permission = false;
            seed.created_secs = seed.created_secs.max(1_000);
        }
        seeds[0].created_secs = 10;
        let last = seeds.len() - 1;
        seeds[last].drifted = true;
        let (all, ready) = snapshot(&seeds);
        let state = State {
            node_count: ready.len(),
            last_accepted_creation_time: Utc.timestamp_opt(500, 0).unwrap(),
        };

        match decide(&all, &ready, &state) {
            Decision::Grant { node, force } => {
                prop_assert!(force);
                let granted = ready
                    .iter()
                    .find(|n| n.metadata.name.as_deref() == Some(node.as_str()))
                    .unwrap();
                let created = granted.metadata.creation_timestamp.as_ref().unwrap();
                prop_assert!(created.0 < state.last_accepted_creation_time);
            }
            other => prop_assert!(false, "expected a forced grant, got {:?}", other),
        }
    }

    #[test]
    fn selection_prefers_masters(
        masters in proptest::collection::vec(any::<bool>(), 1..10),
    ) {
        let nodes: Vec<Node> = masters
            .iter()
            .enumerate()
            .map(|(i, master)| {
                build_node(
                    i,
                    &NodeSeed {
                        ready: true,
                        drifted: false,
                        in_progress: false,
                        permission: false,
                        master: *master,
                        created_secs: 0,
                    },
                )
            })
            .collect();
        let candidates: Vec<&Node> = nodes.iter().collect();
        let selected = next_to_update(&candidates).unwrap();
        let expected = masters.iter().position(|m| *m).unwrap_or(0);
        prop_assert_eq!(
            selected.metadata.name.as_deref(),
            nodes[expected].metadata.name.as_deref()
        );
    }
}

// =============================================================================
// Agent properties
// =============================================================================

proptest! {
    #[test]
    fn stamped_node_is_never_reinitialized(
        needs in any::<bool>(),
        shadow_drift in any::<bool>(),
        shadow_progress in any::<bool>(),
        permission in any::<bool>(),
        force in any::<bool>(),
    ) {
        let seed = NodeSeed {
            ready: true,
            drifted: true,
            in_progress: false,
            permission,
            master: false,
            created_secs: 0,
        };
        let mut node = build_node(0, &seed);
        if force {
            node.metadata
                .annotations
                .as_mut()
                .unwrap()
                .insert(annotations::FORCE_TERMINATION.to_string(), "true".to_string());
        }

        let mut status = AgentStatus::new(Utc::now());
        status.update_needed = shadow_drift;
        status.update_in_progress = shadow_progress;

        prop_assert_ne!(classify(&node, needs, &status), PollStep::Initialize);
    }
}

// =============================================================================
// Drain properties
// =============================================================================

proptest! {
    #[test]
    fn daemonset_pods_never_drain(
        kinds in proptest::collection::vec(
            prop_oneof![
                Just(Some("DaemonSet")),
                Just(Some("ReplicaSet")),
                Just(Some("StatefulSet")),
                Just(None),
            ],
            0..12,
        ),
    ) {
        let pods: Vec<Pod> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| build_pod(i, *kind))
            .collect();
        let candidates = drain_candidates(pods);

        for pod in &candidates {
            let daemon = pod
                .metadata
                .owner_references
                .as_ref()
                .is_some_and(|refs| refs.iter().any(|r| r.kind == "DaemonSet"));
            prop_assert!(!daemon);
        }
        let expected = kinds.iter().filter(|k| **k != Some("DaemonSet")).count();
        prop_assert_eq!(candidates.len(), expected);
    }
}

// =============================================================================
// State durability
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_round_trips(
        node_count in 0usize..1_000_000,
        secs in 0i64..2_000_000_000,
        nanos in 0u32..1_000_000_000,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = StateStore::new(dir.path().join("state.json"));
            let state = State {
                node_count,
                last_accepted_creation_time: Utc.timestamp_opt(secs, nanos).unwrap(),
            };
            store.save(&state).await.unwrap();
            assert_eq!(store.load().await.unwrap(), state);
        });
    }
}
