mod helpers;

use helpers::fixtures::{
    create_test_jpeg, create_test_pdf, create_test_png, create_test_wav, voice_note_ogg,
};
use helpers::{setup_failing_gateway, setup_gateway, StubDetector, MAX_UPLOAD_BYTES};
use mediagate_core::constants::*;
use mediagate_core::models::IngestState;
use mediagate_core::{IngestError, IngestOutcome, MediaCategory, MediaRequest};
use std::io::Cursor;

const USER: i64 = 424242;

#[tokio::test]
async fn test_photo_without_face_is_rejected() {
    let gateway = setup_gateway(StubDetector::without_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::photo(USER, create_test_jpeg(64, 64)))
        .await;

    assert!(matches!(outcome, IngestOutcome::Rejected));
    assert_eq!(outcome.final_state(), IngestState::Rejected);
    assert_eq!(outcome.reply_text(), "No face found in image.");
    assert!(gateway.photos().is_empty());
}

#[tokio::test]
async fn test_photo_with_face_takes_next_slot() {
    let gateway = setup_gateway(StubDetector::with_face()).await;
    std::fs::write(gateway.photo_dir.join("photo_message_424242_1.jpg"), b"one").unwrap();
    std::fs::write(gateway.photo_dir.join("photo_message_424242_2.jpg"), b"two").unwrap();
    let photo = create_test_jpeg(64, 64);

    let outcome = gateway
        .service
        .ingest(MediaRequest::photo(USER, photo.clone()))
        .await;

    match &outcome {
        IngestOutcome::Stored {
            category,
            path,
            sequence,
        } => {
            assert_eq!(*category, MediaCategory::Photo);
            assert_eq!(*sequence, 3);
            assert_eq!(*path, gateway.photo_dir.join("photo_message_424242_3.jpg"));
            // Original bytes, untouched
            assert_eq!(std::fs::read(path).unwrap(), photo);
        }
        other => panic!("expected Stored, got {:?}", other),
    }
    assert_eq!(outcome.reply_text(), "Image saved!");
    assert_eq!(
        std::fs::read(gateway.photo_dir.join("photo_message_424242_1.jpg")).unwrap(),
        b"one"
    );
}

#[tokio::test]
async fn test_voice_is_normalized_to_16k_wav() {
    let gateway = setup_gateway(StubDetector::without_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::audio(
            USER,
            create_test_wav(48_000, 1, 1.0),
            "wav",
        ))
        .await;

    assert!(outcome.is_stored());
    assert_eq!(outcome.reply_text(), "Audio saved!");
    assert_eq!(
        gateway.audio(),
        vec!["audio_message_424242_1.wav".to_string()]
    );

    let bytes = std::fs::read(gateway.audio_dir.join("audio_message_424242_1.wav")).unwrap();
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert!((15_800..=16_200).contains(&reader.duration()));
}

#[tokio::test]
async fn test_ogg_opus_voice_note_is_normalized_to_16k_wav() {
    let gateway = setup_gateway(StubDetector::without_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::audio(
            USER,
            voice_note_ogg(),
            VOICE_CONTAINER_HINT,
        ))
        .await;

    assert!(outcome.is_stored());
    assert_eq!(outcome.reply_text(), REPLY_AUDIO_SAVED);
    assert_eq!(
        gateway.audio(),
        vec!["audio_message_424242_1.wav".to_string()]
    );

    let bytes = std::fs::read(gateway.audio_dir.join("audio_message_424242_1.wav")).unwrap();
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
}

#[tokio::test]
async fn test_audio_slots_are_independent_of_photos() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    gateway
        .service
        .ingest(MediaRequest::photo(USER, create_test_png(32, 32)))
        .await;
    let outcome = gateway
        .service
        .ingest(MediaRequest::audio(
            USER,
            create_test_wav(8_000, 1, 0.5),
            "wav",
        ))
        .await;

    assert!(matches!(outcome, IngestOutcome::Stored { sequence: 1, .. }));
    assert_eq!(gateway.photos().len(), 1);
    assert_eq!(gateway.audio().len(), 1);
}

#[tokio::test]
async fn test_pdf_document_is_not_an_image() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::document(
            USER,
            create_test_pdf(),
            "application/pdf",
        ))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::UnsupportedMimeType(_))
    ));
    assert_eq!(outcome.reply_text(), "Sorry, it's not an image file.");
    assert!(gateway.photos().is_empty());
    assert!(gateway.audio().is_empty());
}

#[tokio::test]
async fn test_document_mime_type_is_checked_up_front() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    assert!(gateway.service.accepts_document(Some("image/jpeg")).is_ok());
    assert!(gateway
        .service
        .accepts_document(Some("image/png; charset=binary"))
        .is_ok());
    assert!(matches!(
        gateway.service.accepts_document(Some("application/pdf")),
        Err(IngestError::UnsupportedMimeType(_))
    ));
    assert!(matches!(
        gateway.service.accepts_document(None),
        Err(IngestError::UnsupportedMimeType(_))
    ));
}

#[tokio::test]
async fn test_image_document_goes_through_face_gate() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::document(
            USER,
            create_test_png(48, 48),
            "image/png",
        ))
        .await;

    assert!(outcome.is_stored());
    assert_eq!(
        gateway.photos(),
        vec!["photo_message_424242_1.jpg".to_string()]
    );
}

#[tokio::test]
async fn test_undecodable_photo_fails_without_writing() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::photo(USER, b"\xff\xd8\xff garbage".to_vec()))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::Decode(_))
    ));
    assert_eq!(outcome.reply_text(), REPLY_DECODE_FAILED);
    assert!(gateway.photos().is_empty());
}

#[tokio::test]
async fn test_undecodable_audio_fails_without_writing() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::audio(
            USER,
            vec![7u8; 2048],
            VOICE_CONTAINER_HINT,
        ))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::Decode(_))
    ));
    assert!(gateway.audio().is_empty());
}

#[tokio::test]
async fn test_audio_too_short_to_resample_is_not_stored() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    // Two frames at 48 kHz resample to nothing at 16 kHz
    let outcome = gateway
        .service
        .ingest(MediaRequest::audio(
            USER,
            create_test_wav(48_000, 1, 2.0 / 48_000.0),
            "wav",
        ))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::Decode(_))
    ));
    assert!(gateway.audio().is_empty());
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let gateway = setup_gateway(StubDetector::with_face()).await;

    let outcome = gateway
        .service
        .ingest(MediaRequest::photo(USER, vec![0u8; MAX_UPLOAD_BYTES + 1]))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::PayloadTooLarge { .. })
    ));
    assert!(gateway.photos().is_empty());
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let service = setup_failing_gateway(StubDetector::with_face());

    let outcome = service
        .ingest(MediaRequest::photo(USER, create_test_png(32, 32)))
        .await;

    assert!(matches!(
        outcome,
        IngestOutcome::Failed(IngestError::Storage(_))
    ));
    assert_eq!(outcome.reply_text(), REPLY_STORAGE_FAILED);
}

#[tokio::test]
async fn test_concurrent_photos_never_share_a_slot() {
    let gateway = setup_gateway(StubDetector::with_face()).await;
    let photo = create_test_png(32, 32);

    let requests = (0..6).map(|_| {
        let service = gateway.service.clone();
        let photo = photo.clone();
        tokio::spawn(async move { service.ingest(MediaRequest::photo(USER, photo)).await })
    });
    let outcomes = futures::future::join_all(requests).await;

    assert!(outcomes.into_iter().all(|o| o.unwrap().is_stored()));
    let expected: Vec<String> = (1..=6)
        .map(|n| format!("photo_message_424242_{}.jpg", n))
        .collect();
    assert_eq!(gateway.photos(), expected);
}
