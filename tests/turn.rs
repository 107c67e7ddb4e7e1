//! Turn coordinator integration tests

use std::sync::Arc;
use std::time::Duration;

use parley::{Capability, Error, InvokeOptions, Role, TurnCoordinator};
use tokio_util::sync::CancellationToken;

mod common;
use common::{RecordingGenerator, ScriptedTranscriber, ToneSynthesizer, coordinator, speech_wav};

fn roles_and_contents(coordinator: &TurnCoordinator) -> Vec<(Role, String)> {
    coordinator
        .session()
        .history()
        .iter()
        .map(|m| (m.role(), m.content().to_string()))
        .collect()
}

#[tokio::test]
async fn test_full_turn_produces_audio_and_memory() {
    let generator = RecordingGenerator::echo();
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::hearing("what's the weather"),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    );

    let result = coordinator
        .run_turn(speech_wav(), None, &InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(result.transcript, "what's the weather");
    assert_eq!(result.reply, "re: what's the weather");
    assert_eq!(&result.audio[0..4], b"RIFF");

    // Generator saw the directive first and the new user turn last
    let snapshot = &generator.snapshots()[0];
    assert_eq!(snapshot[0].role(), Role::System);
    assert_eq!(snapshot[0].content(), "You are helpful.");
    assert_eq!(snapshot.last().unwrap().content(), "what's the weather");

    assert_eq!(
        roles_and_contents(&coordinator),
        vec![
            (Role::User, "what's the weather".to_string()),
            (Role::Assistant, "re: what's the weather".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_silence_skips_generation_and_synthesis() {
    let transcriber = ScriptedTranscriber::silent();
    let generator = RecordingGenerator::echo();
    let synthesizer = ToneSynthesizer::new();
    let coordinator = coordinator(
        4,
        Arc::clone(&transcriber),
        Arc::clone(&generator),
        Arc::clone(&synthesizer),
    );

    let result = coordinator
        .run_turn(speech_wav(), None, &InvokeOptions::default())
        .await
        .unwrap();

    assert!(result.transcript.is_empty());
    assert!(result.confidence.abs() < f32::EPSILON);
    assert!(result.reply.is_empty());
    assert!(result.audio.is_empty());

    assert_eq!(transcriber.calls(), 1);
    assert_eq!(generator.calls(), 0);
    assert_eq!(synthesizer.calls(), 0);
    assert!(coordinator.session().is_empty());
}

#[tokio::test]
async fn test_transcribe_leaves_memory_untouched() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::hearing("hello"),
        RecordingGenerator::echo(),
        ToneSynthesizer::new(),
    );

    let transcription = coordinator
        .transcribe(speech_wav(), None, &InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(transcription.text, "hello");
    assert!(coordinator.session().is_empty());
}

#[tokio::test]
async fn test_unknown_transcriber_key_falls_back_to_default() {
    let transcriber = ScriptedTranscriber::hearing("hello");
    let coordinator = coordinator(
        4,
        Arc::clone(&transcriber),
        RecordingGenerator::echo(),
        ToneSynthesizer::new(),
    );

    let transcription = coordinator
        .transcribe(speech_wav(), Some("unknown-xyz"), &InvokeOptions::default())
        .await
        .unwrap();

    assert_eq!(transcription.text, "hello");
    assert_eq!(transcriber.calls(), 1);
}

#[tokio::test]
async fn test_generation_failure_keeps_user_turn() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::hearing("hi"),
        RecordingGenerator::failing(),
        ToneSynthesizer::new(),
    );

    let err = coordinator
        .reply("hi", &InvokeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Generation(_)));
    assert_eq!(err.capability(), Some(Capability::Generation));
    assert_eq!(
        roles_and_contents(&coordinator),
        vec![(Role::User, "hi".to_string())]
    );
}

#[tokio::test]
async fn test_synthesis_failure_keeps_completed_exchange() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::hearing("hi"),
        RecordingGenerator::echo(),
        ToneSynthesizer::failing(),
    );

    let err = coordinator
        .run_turn(speech_wav(), None, &InvokeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Synthesis(_)));
    assert_eq!(coordinator.session().len(), 2);
}

#[tokio::test]
async fn test_blank_reply_stores_nothing() {
    let generator = RecordingGenerator::echo();
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    );

    let reply = coordinator.reply("   ", &InvokeOptions::default()).await.unwrap();

    assert!(reply.is_none());
    assert_eq!(generator.calls(), 0);
    assert!(coordinator.session().is_empty());
}

#[tokio::test]
async fn test_empty_generated_reply_is_a_generation_failure() {
    let generator = RecordingGenerator::blank();
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    );

    let err = coordinator
        .reply("hello", &InvokeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Generation(_)));
    assert_eq!(err.capability(), Some(Capability::Generation));
    assert_eq!(generator.calls(), 1);
    assert_eq!(
        roles_and_contents(&coordinator),
        vec![(Role::User, "hello".to_string())]
    );
}

#[tokio::test]
async fn test_empty_text_still_synthesizes() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        RecordingGenerator::echo(),
        ToneSynthesizer::new(),
    );

    let audio = coordinator.speak("", &InvokeOptions::default()).await.unwrap();
    assert_eq!(&audio.wav[0..4], b"RIFF");
}

#[tokio::test]
async fn test_timeout_is_reported_per_capability() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        RecordingGenerator::stalled(),
        ToneSynthesizer::new(),
    );

    let opts = InvokeOptions::default().with_timeout(Duration::from_millis(50));
    let err = coordinator.reply("anyone there?", &opts).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Timeout {
            capability: Capability::Generation,
            ..
        }
    ));
    // The user turn was recorded before the engine was invoked
    assert_eq!(coordinator.session().len(), 1);
}

#[tokio::test]
async fn test_cancellation_interrupts_generation() {
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        RecordingGenerator::stalled(),
        ToneSynthesizer::new(),
    );

    let cancel = CancellationToken::new();
    let opts = InvokeOptions::default().with_cancel(cancel.clone());

    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    let err = coordinator.reply("hello?", &opts).await.unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(
        err,
        Error::Cancelled {
            capability: Capability::Generation
        }
    ));
}

#[tokio::test]
async fn test_reset_then_reply_starts_fresh() {
    let generator = RecordingGenerator::echo();
    let coordinator = coordinator(
        4,
        ScriptedTranscriber::silent(),
        Arc::clone(&generator),
        ToneSynthesizer::new(),
    );

    coordinator.reply("first", &InvokeOptions::default()).await.unwrap();
    coordinator.reset();
    coordinator.reply("second", &InvokeOptions::default()).await.unwrap();

    let snapshot = generator.snapshots().pop().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].role(), Role::System);
    assert_eq!(snapshot[1].content(), "second");
}
