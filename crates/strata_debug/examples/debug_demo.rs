//! Debug Context Demo
//!
//! Demonstrates a strata context with debug hooks:
//! - Creating entities and adding components
//! - Reacting to group changes through a collector
//! - Running named systems with timing output
//! - Replaying changes made on a worker thread
//!
//! Run with: cargo run -p strata_debug --example debug_demo

use strata_core::prelude::*;
use strata_debug::{DebugConfig, DebugContext};

#[derive(Debug)]
struct Position(f32, f32);

#[derive(Debug)]
struct Velocity(f32, f32);

#[derive(Debug)]
struct Frame(u64);

impl Component for Position {}
impl Component for Velocity {}
impl Component for Frame {}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Frame counters change every tick; keep them out of the log
    let context = DebugContext::new(DebugConfig::new().with_ignored([Frame::id()]));

    let movers = context.entity_group(Matcher::all([Position::id(), Velocity::id()]));
    let started = Collector::new(&movers, CollectionPolicy::Added);

    // Setup happens outside any system and is reported as such
    for i in 0..3 {
        let e = context.create_entity();
        e.set(Position(i as f32, 0.0));
        if i % 2 == 0 {
            e.set(Velocity(1.0, 0.5));
        }
    }
    let clock = context.set_unique_component(Frame(0));

    for frame in 1..=3u64 {
        context.run_system("tick", || {
            clock.replace(Frame(frame));
        });

        context.run_system("announce", || {
            for entity in started.pull_all() {
                tracing::info!(entity = entity.creation_index(), "started moving");
            }
        });

        context.run_system("move", || {
            for entity in &movers {
                let (Some(p), Some(v)) = (entity.get::<Position>(), entity.get::<Velocity>())
                else {
                    continue;
                };
                entity.replace(Position(p.0 + v.0, p.1 + v.1));
            }
        });
    }

    // A worker thread edits a snapshot; the main thread replays it
    let queue = SyncQueue::new();
    if let Some(target) = context.entity(1) {
        let mut detached = target.detach();
        let sender = queue.clone();
        let worker = std::thread::spawn(move || {
            detached.set(Velocity(0.0, -1.0));
            detached.sync(&sender);
        });
        if worker.join().is_err() {
            tracing::error!("worker thread panicked");
        }
    }
    context.run_system("apply_sync", || {
        let applied = queue.run_pending(&context);
        tracing::info!(applied, "replayed detached changes");
    });

    tracing::info!(
        entities = context.entity_count(),
        moving = movers.len(),
        "demo finished"
    );
}
