//! Session memory integration tests, including concurrent exchanges

use std::sync::Arc;
use std::time::{Duration, Instant};

use parley::{InvokeOptions, Role, SessionStore};

mod common;
use common::{RecordingGenerator, ScriptedTranscriber, ToneSynthesizer, coordinator};

#[test]
fn test_capacity_two_keeps_last_four() {
    let store = SessionStore::new(2, "sys");
    for (i, text) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        if i % 2 == 0 {
            store.append_user(*text);
        } else {
            store.append_assistant(*text);
        }
    }

    let history = store.history();
    let texts: Vec<&str> = history.iter().map(|m| m.content()).collect();
    assert_eq!(texts, vec!["b", "c", "d", "e"]);
}

#[test]
fn test_shared_store_across_threads_stays_bounded() {
    let store = Arc::new(SessionStore::new(3, "sys"));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50 {
                    store.append_user(format!("{t}-{i}"));
                    assert!(store.len() <= 6);
                    let _ = store.snapshot();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 6);
    assert_eq!(store.snapshot()[0].role(), Role::System);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchanges_with_capacity_one() {
    let generator = RecordingGenerator::slow_echo(Duration::from_millis(30));
    let coordinator = Arc::new(coordinator(
        1,
        ScriptedTranscriber::silent(),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    ));

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.reply("one", &InvokeOptions::default()).await })
    };
    let second = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.reply("two", &InvokeOptions::default()).await })
    };

    let first = first.await.unwrap().unwrap().unwrap();
    let second = second.await.unwrap().unwrap().unwrap();
    assert_eq!(first, "re: one");
    assert_eq!(second, "re: two");

    // Each generator call saw its own user turn as the newest message
    let snapshots = generator.snapshots();
    assert_eq!(snapshots.len(), 2);
    for snapshot in &snapshots {
        let last = snapshot.last().unwrap();
        assert_eq!(last.role(), Role::User);
        assert!(snapshot.len() <= 3);
    }

    // Bound holds and the survivors are the newest messages in append order
    let history = coordinator.session().history();
    assert_eq!(history.len(), 2);
    let inputs = ["one", "two", "re: one", "re: two"];
    for message in &history {
        assert_ne!(message.role(), Role::System);
        assert!(inputs.contains(&message.content()), "unexpected {message:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reset_and_snapshot_do_not_wait_for_generation() {
    let generator = RecordingGenerator::slow_echo(Duration::from_millis(500));
    let coordinator = Arc::new(coordinator(
        2,
        ScriptedTranscriber::silent(),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    ));

    let pending = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.reply("hello", &InvokeOptions::default()).await })
    };

    while generator.calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let started = Instant::now();
    assert_eq!(coordinator.session().len(), 1);
    coordinator.reset();
    assert_eq!(coordinator.session().snapshot().len(), 1);
    assert!(started.elapsed() < Duration::from_millis(250));
    assert!(!pending.is_finished());

    // The reply lands after the reset and is kept
    let reply = pending.await.unwrap().unwrap();
    assert_eq!(reply.as_deref(), Some("re: hello"));
    let history = coordinator.session().history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role(), Role::Assistant);
}
