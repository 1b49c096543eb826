mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{asha, eventually, harness, ScriptedText};
use sales_consult::app::{AppPhase, Screen, ScreenEvent};
use sales_consult::config::BrandingConfig;
use sales_consult::proposal::{DocumentOrigin, ProposalGenerator};
use sales_consult::voice::controller::{
    STATUS_CONNECTION_ERROR, STATUS_DISCONNECTED, STATUS_ENDED, STATUS_IDLE, STATUS_LISTENING,
    STATUS_TERMINATED,
};
use sales_consult::voice::{EndReason, VoiceEvent};

fn speech(samples: usize) -> VoiceEvent {
    VoiceEvent::Audio {
        data: vec![0u8; samples * 2],
    }
}

#[tokio::test]
async fn consultation_to_proposal_view_and_back() {
    let h = harness();
    let status = h.controller.subscribe();
    let mut screen = Screen::default();

    screen.apply(ScreenEvent::Submit(asha())).unwrap();
    let contact = screen.contact().cloned().unwrap();
    let call = h.controller.start_call(&contact).await.unwrap();
    assert_eq!(status.borrow().connection, STATUS_LISTENING);
    assert!(status.borrow().active);

    let opened = h.vendor.opened.lock()[0].clone();
    assert_eq!(opened.voice, "Kore");
    assert!(opened.system_instruction.contains("Asha"));
    assert!(opened.system_instruction.contains("Nimbus Retail"));

    assert!(h.audio.capture(vec![0.25; 4096]));
    eventually(|| h.vendor.sent_count() == 1).await;
    assert_eq!(h.vendor.sent.lock()[0].len(), 8192);

    h.vendor
        .emit(VoiceEvent::InputTranscript {
            text: "We need better uptime".into(),
        })
        .await;
    h.vendor.emit(speech(2400)).await;
    h.vendor
        .emit(VoiceEvent::OutputTranscript {
            text: "I understand...".into(),
        })
        .await;
    h.vendor.emit(VoiceEvent::TurnComplete).await;
    eventually(|| call.transcript().len() == 2).await;
    assert_eq!(h.audio.started.lock().len(), 1);
    assert!(!call.is_finished());

    let (outcome, transcript) = call.end().await;
    assert_eq!(outcome.reason, EndReason::UserEnded);
    assert_eq!(outcome.frames_sent, 1);
    assert_eq!(h.audio.released.load(Ordering::SeqCst), 1);
    assert!(h.vendor.closed.load(Ordering::SeqCst));
    assert_eq!(status.borrow().connection, STATUS_ENDED);
    assert!(!status.borrow().active);

    assert_eq!(
        screen.apply(ScreenEvent::Generate(transcript.clone())).unwrap(),
        AppPhase::ProposalGeneration
    );

    let text = ScriptedText::new("# Proposal for Nimbus Retail\n\nCloud plan.\n[CONSULTATION_COMPLETED]");
    let generator = ProposalGenerator::new(text.clone(), BrandingConfig::default(), Duration::from_secs(5));
    let document = generator.generate(&contact, &transcript).await;
    assert!(text.prompts.lock()[0].contains("USER: We need better uptime\nASSISTANT: I understand..."));
    assert_eq!(document.origin(), DocumentOrigin::Vendor);

    assert_eq!(
        screen.apply(ScreenEvent::GenerationFinished(document)).unwrap(),
        AppPhase::ProposalView
    );
    match &screen {
        Screen::ProposalView(view) => {
            assert_eq!(view.document().cleaned(), "# Proposal for Nimbus Retail\n\nCloud plan.");
        }
        other => panic!("unexpected {}", other.phase()),
    }

    assert_eq!(screen.apply(ScreenEvent::Reset).unwrap(), AppPhase::Form);
    assert!(screen.contact().is_none());
}

#[tokio::test]
async fn split_sentinel_terminates_and_silences_the_call() {
    let h = harness();
    let status = h.controller.subscribe();
    let mut screen = Screen::default();
    screen.apply(ScreenEvent::Submit(asha())).unwrap();

    let mut call = h.controller.start_call(&asha()).await.unwrap();
    h.audio.capture(vec![0.0; 4096]);
    eventually(|| h.vendor.sent_count() == 1).await;

    h.vendor.emit(speech(2400)).await;
    h.vendor
        .emit(VoiceEvent::OutputTranscript {
            text: "This conversation is over. [TERMINATE_".into(),
        })
        .await;
    h.vendor
        .emit(VoiceEvent::OutputTranscript {
            text: "SESSION]".into(),
        })
        .await;

    let outcome = call.wait().await;
    assert_eq!(outcome.reason, EndReason::Terminated);
    assert_eq!(status.borrow().connection, STATUS_TERMINATED);
    assert_eq!(h.audio.released.load(Ordering::SeqCst), 1);
    assert!(h.vendor.closed.load(Ordering::SeqCst));
    assert_eq!(h.audio.stopped.lock().len(), 1);

    let utterances = call.transcript().len();
    assert!(!h.audio.capture(vec![0.0; 4096]));
    assert!(
        !h.vendor
            .emit(VoiceEvent::InputTranscript {
                text: "still talking".into()
            })
            .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.vendor.sent_count(), 1);
    assert_eq!(call.transcript().len(), utterances);

    assert_eq!(
        screen.apply(ScreenEvent::AbuseDetected).unwrap(),
        AppPhase::Terminated
    );
    assert!(screen.apply(ScreenEvent::Reset).is_err());
    assert!(screen.apply(ScreenEvent::Submit(asha())).is_err());

    // Ending an already terminated call keeps the first reason.
    let (outcome, _) = call.end().await;
    assert_eq!(outcome.reason, EndReason::Terminated);
}

#[tokio::test]
async fn denied_microphone_reverts_to_form() {
    let h = harness();
    h.audio.deny.store(true, Ordering::SeqCst);
    let status = h.controller.subscribe();
    let mut screen = Screen::default();
    screen.apply(ScreenEvent::Submit(asha())).unwrap();

    let err = match h.controller.start_call(&asha()).await {
        Ok(_) => panic!("call should not start without a microphone"),
        Err(e) => e,
    };
    assert!(err.reverts_to_intake());
    assert!(err.to_string().starts_with("Audio device unavailable"));
    assert!(err.to_string().ends_with("Permission denied"));
    assert!(h.vendor.opened.lock().is_empty());
    assert_eq!(status.borrow().connection, STATUS_IDLE);

    assert_eq!(
        screen.apply(ScreenEvent::CallFailed(err.to_string())).unwrap(),
        AppPhase::Form
    );
}

#[tokio::test]
async fn refused_session_releases_audio() {
    let h = harness();
    h.vendor.refuse_open.store(true, Ordering::SeqCst);
    let status = h.controller.subscribe();

    let err = match h.controller.start_call(&asha()).await {
        Ok(_) => panic!("session should have been refused"),
        Err(e) => e,
    };
    assert!(err.reverts_to_intake());
    assert_eq!(h.audio.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(h.audio.released.load(Ordering::SeqCst), 1);
    assert_eq!(status.borrow().connection, STATUS_CONNECTION_ERROR);
}

#[tokio::test]
async fn failed_sends_are_counted_not_fatal() {
    let h = harness();
    let status = h.controller.subscribe();
    let call = h.controller.start_call(&asha()).await.unwrap();

    h.vendor.fail_sends.store(true, Ordering::SeqCst);
    for _ in 0..3 {
        h.audio.capture(vec![0.1; 4096]);
    }
    eventually(|| status.borrow().frames_dropped == 3).await;
    assert!(!call.is_finished());

    h.vendor.fail_sends.store(false, Ordering::SeqCst);
    h.audio.capture(vec![0.1; 4096]);
    eventually(|| status.borrow().frames_sent == 1).await;

    let (outcome, _) = call.end().await;
    assert_eq!(outcome.frames_dropped, 3);
    assert_eq!(outcome.frames_sent, 1);
}

#[tokio::test]
async fn vendor_hang_up_keeps_transcript_for_generation() {
    let h = harness();
    let status = h.controller.subscribe();
    let mut call = h.controller.start_call(&asha()).await.unwrap();

    h.vendor
        .emit(VoiceEvent::InputTranscript {
            text: "We run forty stores".into(),
        })
        .await;
    eventually(|| call.transcript().len() == 1).await;
    h.vendor.hang_up();

    let outcome = call.wait().await;
    assert_eq!(outcome.reason, EndReason::Disconnected);
    assert_eq!(status.borrow().connection, STATUS_DISCONNECTED);
    assert_eq!(h.audio.released.load(Ordering::SeqCst), 1);

    let (_, transcript) = call.end().await;
    assert_eq!(transcript.to_prompt_lines(), "USER: We run forty stores");
}

#[tokio::test]
async fn vendor_error_ends_call_with_transport_reason() {
    let h = harness();
    let status = h.controller.subscribe();
    let mut call = h.controller.start_call(&asha()).await.unwrap();

    h.vendor
        .emit(VoiceEvent::Error {
            message: "quota exceeded".into(),
        })
        .await;
    let outcome = call.wait().await;
    assert_eq!(outcome.reason, EndReason::TransportError("quota exceeded".into()));
    assert_eq!(status.borrow().connection, STATUS_CONNECTION_ERROR);
}

#[tokio::test]
async fn speech_is_queued_back_to_back_and_interruption_stops_it() {
    let h = harness();
    let status = h.controller.subscribe();
    let call = h.controller.start_call(&asha()).await.unwrap();

    h.vendor.emit(speech(2400)).await;
    h.vendor.emit(speech(4800)).await;
    eventually(|| h.audio.started.lock().len() == 2).await;
    {
        let started = h.audio.started.lock();
        assert_eq!(started[0].2, Duration::ZERO);
        assert_eq!(started[1].2, Duration::from_millis(100));
    }
    assert!(status.borrow().assistant_speaking);

    h.vendor.emit(VoiceEvent::Interrupted).await;
    eventually(|| h.audio.stopped.lock().len() == 2).await;
    eventually(|| !status.borrow().assistant_speaking).await;

    // A late completion for a stopped chunk is harmless.
    let first = h.audio.started_ids()[0];
    h.audio.finish(first);

    h.vendor.emit(speech(2400)).await;
    eventually(|| h.audio.started.lock().len() == 3).await;
    let third = h.audio.started_ids()[2];
    h.audio.finish(third);
    eventually(|| !status.borrow().assistant_speaking).await;

    call.end().await;
}

#[tokio::test]
async fn liveness_ticks_resume_devices() {
    let h = harness();
    let call = h.controller.start_call(&asha()).await.unwrap();
    eventually(|| h.audio.resumed.load(Ordering::SeqCst) >= 2).await;
    call.end().await;
}
