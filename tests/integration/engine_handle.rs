//! The spawned engine: command round trips, subscribers and shutdown.

use crate::helpers::{Effect, World, at};
use circadian::{
    AttentionSource, CircadianConfig, CircadianError, ConfigPatch, Engine, EngineEvent,
    EngineHandle, ManualClock, NewAttentionItem, Priority,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn spawn(world: &Arc<World>, start: chrono::DateTime<chrono::Local>) -> EngineHandle {
    let config = CircadianConfig {
        heartbeat_secs: 1,
        ..CircadianConfig::default()
    };
    Engine::new(config, world.collaborators())
        .with_clock(Arc::new(ManualClock::new(start)))
        .start()
}

#[tokio::test]
async fn test_faulty_subscriber_does_not_break_delivery() {
    let world = World::new();
    let handle = spawn(&world, at(10, 0));
    handle.state().await.unwrap();

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let _faulty = handle.subscribe(|_| panic!("subscriber bug"));
    let _healthy = handle.subscribe(move |event| {
        if matches!(event, EngineEvent::Delivery { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    handle
        .push_item(NewAttentionItem::new(AttentionSource::System, Priority::Medium, "Update ready"))
        .await
        .unwrap();
    let outcome = handle.deliver_now().await.unwrap().expect("delivered");

    assert_eq!(outcome.synthesis, "Update ready");
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert!(
        world
            .take_effects()
            .iter()
            .any(|e| matches!(e, Effect::Nudged(n) if n.message == "Update ready"))
    );
    handle.stop();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribed_callback_sees_nothing_more() {
    let world = World::new();
    let handle = spawn(&world, at(10, 0));
    handle.state().await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = handle.subscribe(move |event| sink.lock().unwrap().push(event.kind()));

    handle
        .push_item(NewAttentionItem::new(AttentionSource::Clipboard, Priority::Low, "one"))
        .await
        .unwrap();
    handle.deliver_now().await.unwrap();
    sub.unsubscribe();
    handle
        .push_item(NewAttentionItem::new(AttentionSource::Clipboard, Priority::Low, "two"))
        .await
        .unwrap();
    handle.deliver_now().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), ["delivery"]);
    handle.stop();
}

#[tokio::test]
async fn test_heartbeat_drives_urgent_breakthrough() {
    let world = World::new();
    let handle = spawn(&world, at(2, 0));
    let mut events = handle.events();
    handle.state().await.unwrap();

    world.set_battery(3, false);
    let synthesis = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(EngineEvent::Delivery { synthesis, .. }) = events.recv().await {
                return synthesis;
            }
        }
    })
    .await
    .expect("urgent delivery within a few heartbeats");

    assert_eq!(synthesis, "Battery at 3%. Charge soon.");
    handle.stop();
}

#[tokio::test]
async fn test_config_patch_and_stop_semantics() {
    let world = World::new();
    // Focus phase: heartbeat ticks hold items, only deliver_now releases them.
    let handle = spawn(&world, at(10, 0));

    handle
        .set_config(ConfigPatch {
            whisper_batch_size: Some(1),
            ..ConfigPatch::default()
        })
        .await
        .unwrap();
    for n in 0..3 {
        handle
            .push_item(NewAttentionItem::new(AttentionSource::Pattern, Priority::Low, format!("p{n}")))
            .await
            .unwrap();
    }
    let outcome = handle.deliver_now().await.unwrap().expect("delivered");
    assert_eq!(outcome.items.len(), 1);

    let rejected = handle
        .set_config(ConfigPatch {
            whisper_batch_size: Some(0),
            ..ConfigPatch::default()
        })
        .await;
    assert!(matches!(rejected, Err(CircadianError::Config(_))));

    handle.stop();
    assert!(handle.is_stopped());
    assert!(matches!(
        handle.pending_items().await,
        Err(CircadianError::Engine(_))
    ));
    handle.join().await.unwrap();
}
