//! # Bridge Soak
//!
//! Drives a [`WorkerBridge`] against a mock connection the way a
//! simulation loop would, then reports what made it across.
//!
//! ## Usage
//!
//! ```bash
//! bridge_soak --ticks 600 --messages 200 --rate 1000 [--inline] [--config bridge.toml]
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tether::mock::MockConnection;
use tether::{BridgeSettings, WorkerBridge};
use tether_protocol::{ComponentId, ComponentUpdate, EntityId, LogLevel, Metrics, Op, OpList};

/// Simulation tick length (60 Hz).
const TICK: Duration = Duration::from_micros(16_667);

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TETHER BRIDGE SOAK                                       ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let mut ticks = 600u32;
    let mut messages_per_tick = 200u32;
    let mut settings = BridgeSettings::background();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" | "-t" => {
                if i + 1 < args.len() {
                    ticks = args[i + 1].parse().unwrap_or(600);
                    i += 1;
                }
            }
            "--messages" | "-m" => {
                if i + 1 < args.len() {
                    messages_per_tick = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--rate" | "-r" => {
                if i + 1 < args.len() {
                    let rate = args[i + 1].parse().unwrap_or(1000.0);
                    settings = settings.with_ops_poll_rate_hz(rate);
                    i += 1;
                }
            }
            "--inline" => {
                settings = settings.with_run_on_owner_thread(true);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    match BridgeSettings::load(&args[i + 1]) {
                        Ok(loaded) => settings = loaded,
                        Err(e) => {
                            eprintln!("{e}");
                            std::process::exit(1);
                        }
                    }
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: bridge_soak [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --ticks <NUM>        Simulation ticks to run (default: 600)");
                println!("  -m, --messages <NUM>     Component updates per tick (default: 200)");
                println!("  -r, --rate <HZ>          Ops poll rate (default: 1000)");
                println!("      --inline             Run the cycle on the simulation thread");
                println!("  -c, --config <PATH>      Load settings from a TOML file");
                println!("  -h, --help               Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let interval = settings.wait_interval();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Mode:               {}", if settings.run_on_owner_thread { "inline" } else { "background" });
    println!("│ Flush every op:     {}", settings.flush_after_every_outgoing_op);
    println!("│ Poll rate:          {} Hz ({:?} wait)", settings.ops_poll_rate_hz, interval.duration);
    println!("│ Ticks:              {}", ticks);
    println!("│ Updates per tick:   {}", messages_per_tick);
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let mut bridge = WorkerBridge::new(settings);
    let (connection, probe) = MockConnection::new("soak-worker");
    if let Err(e) = bridge.install_connection(Box::new(connection.with_attributes(["soak"]))) {
        eprintln!("install failed: {e}");
        std::process::exit(1);
    }

    // Order check on the sending side
    let next_expected = Arc::new(AtomicU64::new(0));
    let out_of_order = Arc::new(AtomicU64::new(0));
    {
        let next_expected = Arc::clone(&next_expected);
        let out_of_order = Arc::clone(&out_of_order);
        bridge.on_dequeue(move |message| {
            if let tether_protocol::OutgoingMessage::ComponentUpdate { update, .. } = message {
                let Some(sequence) = payload_sequence(&update.payload) else {
                    out_of_order.fetch_add(1, Ordering::Relaxed);
                    return;
                };
                if next_expected.swap(sequence + 1, Ordering::Relaxed) != sequence {
                    out_of_order.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }

    let start = Instant::now();
    let mut sequence = 0u64;
    let mut ops_received = 0usize;
    let mut worst_submit = Duration::ZERO;

    for tick in 0..ticks {
        let tick_start = Instant::now();

        probe.push_op_list(OpList::new(vec![Op::AddEntity {
            entity_id: EntityId(i64::from(tick)),
        }]));

        for entity in 0..messages_per_tick {
            let update = ComponentUpdate::new(ComponentId(54), sequence.to_le_bytes().to_vec());
            let submit_start = Instant::now();
            let _ = bridge.send_component_update(EntityId(i64::from(entity)), update);
            worst_submit = worst_submit.max(submit_start.elapsed());
            sequence += 1;
        }

        let _ = bridge.send_metrics(Metrics::default().with_gauge("tick", f64::from(tick)));
        if tick % 60 == 0 {
            let _ = bridge.send_log_message(LogLevel::Info, "soak", format!("tick {tick}"));
        }

        if !bridge.settings().flush_after_every_outgoing_op {
            bridge.flush();
        }

        ops_received += bridge.get_op_list().iter().map(OpList::len).sum::<usize>();

        if let Some(rest) = TICK.checked_sub(tick_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    let elapsed = start.elapsed();
    let before_destroy = bridge.stats();
    bridge.destroy_connection();
    bridge.wait_for_teardown();
    ops_received += bridge.get_op_list().iter().map(OpList::len).sum::<usize>();
    let stats = bridge.stats();

    println!("┌─ RESULTS ────────────────────────────────────────────────────────┐");
    println!("│ Elapsed:            {:.2?}", elapsed);
    println!("│ Enqueued:           {}", stats.messages_enqueued);
    println!("│ Sent:               {}", stats.messages_sent);
    println!("│ Discarded:          {}", stats.messages_discarded);
    println!("│ In flight at stop:  {}", before_destroy.in_flight());
    println!("│ Connection flushes: {}", stats.connection_flushes);
    println!("│ Cycles:             {}", stats.cycles);
    println!("│ Empty polls:        {}", stats.empty_polls);
    println!("│ Ops received:       {}", ops_received);
    println!("│ Worst submit:       {:?}", worst_submit);
    println!("│ Out of order:       {}", out_of_order.load(Ordering::Relaxed));
    println!("│ Teardown thread:    {}", probe.destroyed_on().unwrap_or_else(|| "-".to_string()));
    println!("└──────────────────────────────────────────────────────────────────┘");

    let delivered = stats.messages_sent + stats.messages_discarded == stats.messages_enqueued;
    if delivered && out_of_order.load(Ordering::Relaxed) == 0 {
        println!("PASS: every message sent in order or accounted for at shutdown");
    } else {
        println!("FAIL: messages lost or reordered");
        std::process::exit(1);
    }
}

/// Reads the sequence number stamped at the front of a soak payload.
fn payload_sequence(payload: &[u8]) -> Option<u64> {
    payload.get(..8)?.try_into().ok().map(u64::from_le_bytes)
}
