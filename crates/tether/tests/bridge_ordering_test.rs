//! # Bridge Ordering Tests
//!
//! Messages reach the connection in submission order, request ids count up
//! from zero, and inline and background delivery send the same thing.

use std::collections::HashMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tether::mock::{ConnectionCall, MockConnection, MockProbe};
use tether::{BridgeSettings, WorkerBridge};
use tether_protocol::{
    CommandRequest, CommandResponse, ComponentData, ComponentId, ComponentUpdate, EntityId,
    EntityQuery, InterestOverride, LogLevel, Metrics, OutgoingMessageKind, QueryConstraint,
    RequestId,
};

const WAIT: Duration = Duration::from_secs(10);

fn install(settings: BridgeSettings) -> (WorkerBridge, MockProbe) {
    let mut bridge = WorkerBridge::new(settings);
    let (connection, probe) = MockConnection::new("ordering-worker");
    bridge.install_connection(Box::new(connection)).unwrap();
    (bridge, probe)
}

/// Submits one message of a random kind and returns that kind.
fn submit_random(bridge: &WorkerBridge, rng: &mut StdRng, step: i64) -> OutgoingMessageKind {
    let entity = EntityId(step);
    let kind = OutgoingMessageKind::ALL[rng.gen_range(0..OutgoingMessageKind::ALL.len())];

    let submitted = match kind {
        OutgoingMessageKind::ReserveEntityIds => {
            bridge.send_reserve_entity_ids_request(rng.gen_range(1..100)).map(drop)
        }
        OutgoingMessageKind::CreateEntity => bridge
            .send_create_entity_request(vec![ComponentData::new(ComponentId(1), vec![1])], Some(entity))
            .map(drop),
        OutgoingMessageKind::DeleteEntity => bridge.send_delete_entity_request(entity).map(drop),
        OutgoingMessageKind::AddComponent => {
            bridge.send_add_component(entity, ComponentData::new(ComponentId(2), vec![2]))
        }
        OutgoingMessageKind::RemoveComponent => bridge.send_remove_component(entity, ComponentId(2)),
        OutgoingMessageKind::ComponentUpdate => {
            bridge.send_component_update(entity, ComponentUpdate::new(ComponentId(3), vec![3]))
        }
        OutgoingMessageKind::CommandRequest => bridge
            .send_command_request(
                entity,
                CommandRequest {
                    component_id: ComponentId(4),
                    command_index: 1,
                    payload: Vec::new(),
                },
            )
            .map(drop),
        OutgoingMessageKind::CommandResponse => bridge.send_command_response(
            RequestId(step),
            CommandResponse {
                component_id: ComponentId(4),
                command_index: 1,
                payload: Vec::new(),
            },
        ),
        OutgoingMessageKind::CommandFailure => bridge.send_command_failure(RequestId(step), "nope"),
        OutgoingMessageKind::LogMessage => bridge.send_log_message(LogLevel::Debug, "test", format!("{step}")),
        OutgoingMessageKind::ComponentInterest => bridge.send_component_interest(
            entity,
            vec![InterestOverride {
                component_id: ComponentId(5),
                is_interested: true,
            }],
        ),
        OutgoingMessageKind::EntityQuery => bridge
            .send_entity_query_request(EntityQuery::count(QueryConstraint::EntityId(entity)))
            .map(drop),
        OutgoingMessageKind::Metrics => bridge.send_metrics(Metrics::default().with_load(0.5)),
    };
    submitted.unwrap();

    kind
}

fn sent_kinds(probe: &MockProbe) -> Vec<OutgoingMessageKind> {
    probe.sent_calls().iter().filter_map(ConnectionCall::sent_kind).collect()
}

/// Test: N submissions on one thread produce N sends in the same order.
#[test]
fn test_fifo_inline() {
    let (bridge, probe) = install(BridgeSettings::inline());

    for id in 0..100 {
        bridge.send_delete_entity_request(EntityId(id)).unwrap();
    }

    let deleted: Vec<EntityId> = probe
        .sent_calls()
        .into_iter()
        .map(|call| match call {
            ConnectionCall::DeleteEntity { entity_id, .. } => entity_id,
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(deleted, (0..100).map(EntityId).collect::<Vec<_>>());
}

/// Test: a random mix of every message kind keeps its order in the
/// background worker.
#[test]
fn test_fifo_background_random_mix() {
    let (bridge, probe) = install(BridgeSettings::background());
    let mut rng = StdRng::seed_from_u64(0x7E7E);

    let expected: Vec<OutgoingMessageKind> = (0..2_000)
        .map(|step| submit_random(&bridge, &mut rng, step))
        .collect();

    assert!(probe.wait_for_sends(expected.len(), WAIT));
    assert_eq!(sent_kinds(&probe), expected);
}

/// Test: every send is preceded by its own poll and followed by a flush
/// when flushing after each op inline.
#[test]
fn test_inline_flush_after_each_op() {
    let (bridge, probe) = install(BridgeSettings::inline());

    bridge.send_remove_component(EntityId(1), ComponentId(9)).unwrap();
    bridge.send_remove_component(EntityId(2), ComponentId(9)).unwrap();

    let calls = probe.calls();
    assert_eq!(calls.len(), 6);
    assert!(matches!(calls[0], ConnectionCall::GetOpList { timeout_millis: 0 }));
    assert!(matches!(calls[2], ConnectionCall::Flush));
    assert!(matches!(calls[3], ConnectionCall::GetOpList { timeout_millis: 0 }));
    assert!(matches!(calls[5], ConnectionCall::Flush));
}

/// Test: CreateEntity then DeleteEntity get ids 0 and 1 and are sent in
/// that order.
#[test]
fn test_create_then_delete_example() {
    let (bridge, probe) = install(BridgeSettings::background());

    let create = bridge.send_create_entity_request(Vec::new(), None).unwrap();
    let delete = bridge.send_delete_entity_request(EntityId(7)).unwrap();

    assert_eq!(create, RequestId(0));
    assert_eq!(delete, RequestId(1));

    assert!(probe.wait_for_sends(2, WAIT));
    assert_eq!(
        probe.sent_calls(),
        vec![
            ConnectionCall::CreateEntity {
                components: Vec::new(),
                entity_id: None,
                timeout_millis: None,
            },
            ConnectionCall::DeleteEntity {
                entity_id: EntityId(7),
                timeout_millis: None,
            },
        ]
    );
}

/// Test: request ids increase strictly and only for request-shaped
/// messages.
#[test]
fn test_request_ids_strictly_increase() {
    let (bridge, _probe) = install(BridgeSettings::inline());

    let mut ids = Vec::new();
    for step in 0..50 {
        ids.push(bridge.send_reserve_entity_ids_request(1).unwrap());
        bridge.send_metrics(Metrics::default()).unwrap();
        ids.push(
            bridge
                .send_entity_query_request(EntityQuery::count(QueryConstraint::Component(ComponentId(step))))
                .unwrap(),
        );
    }

    assert_eq!(ids, (0..100).map(RequestId).collect::<Vec<_>>());
    assert_eq!(bridge.next_request_id(), RequestId(100));
}

/// Test: each destroy restarts request ids at zero.
#[test]
fn test_request_ids_reset_per_connection() {
    let mut bridge = WorkerBridge::new(BridgeSettings::inline());

    for round in 0..3 {
        let (connection, _probe) = MockConnection::new(format!("round-{round}"));
        bridge.install_connection(Box::new(connection)).unwrap();

        assert_eq!(bridge.send_delete_entity_request(EntityId(1)).unwrap(), RequestId(0));
        assert_eq!(bridge.send_delete_entity_request(EntityId(2)).unwrap(), RequestId(1));

        bridge.destroy_connection();
        assert_eq!(bridge.next_request_id(), RequestId(0));
    }
}

/// Test: inline with a flush after every submission sends exactly what
/// the background worker sends with wake-on-submit.
#[test]
fn test_flush_equivalence() {
    let mut inline_rng = StdRng::seed_from_u64(99);
    let mut background_rng = StdRng::seed_from_u64(99);

    let inline_settings = BridgeSettings::inline().with_flush_after_every_outgoing_op(false);
    let (inline, inline_probe) = install(inline_settings);
    for step in 0..500 {
        submit_random(&inline, &mut inline_rng, step);
        inline.flush();
    }

    let (background, background_probe) = install(BridgeSettings::background());
    for step in 0..500 {
        submit_random(&background, &mut background_rng, step);
    }
    assert!(background_probe.wait_for_sends(500, WAIT));

    assert_eq!(inline_probe.sent_calls(), background_probe.sent_calls());
}

/// Test: producers on several threads get unique ids, keep their own
/// order, and the k-th request on the wire carries id k.
#[test]
fn test_concurrent_producers() {
    const PRODUCERS: i64 = 4;
    const PER_PRODUCER: i64 = 500;

    for _ in 0..5 {
        let (bridge, probe) = install(BridgeSettings::background());

        let returned: HashMap<EntityId, RequestId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..PRODUCERS)
                .map(|producer| {
                    let bridge = &bridge;
                    scope.spawn(move || {
                        (0..PER_PRODUCER)
                            .map(|n| {
                                let entity_id = EntityId(producer * 1_000 + n);
                                (entity_id, bridge.send_delete_entity_request(entity_id).unwrap())
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let total = usize::try_from(PRODUCERS * PER_PRODUCER).unwrap();
        assert!(probe.wait_for_sends(total, WAIT));

        let mut ids: Vec<RequestId> = returned.values().copied().collect();
        ids.sort();
        assert_eq!(ids, (0..PRODUCERS * PER_PRODUCER).map(RequestId).collect::<Vec<_>>());

        let mut last_seen = vec![-1i64; usize::try_from(PRODUCERS).unwrap()];
        for (position, call) in (0i64..).zip(probe.sent_calls()) {
            let ConnectionCall::DeleteEntity { entity_id, .. } = call else {
                panic!("unexpected call {call:?}");
            };
            assert_eq!(returned[&entity_id], RequestId(position), "{entity_id:?} sent out of id order");

            let producer = usize::try_from(entity_id.0 / 1_000).unwrap();
            let n = entity_id.0 % 1_000;
            assert!(n > last_seen[producer], "producer {producer} reordered");
            last_seen[producer] = n;
        }
    }
}
