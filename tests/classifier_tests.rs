//! Tests for tool result classification.

mod common;

use pretty_assertions::assert_eq;

use common::{png_bytes, PNG_BASE64};
use parley::classify::ToolResultClassifier;
use parley::types::{MediaKind, MediaOrigin, MessageContent, ToolResult, TOOLS_SOURCE};

fn media_count(message: &parley::types::Message) -> usize {
    message.media().len()
}

#[tokio::test]
async fn inline_png_becomes_a_multimodal_message() {
    let text = format!("Here is the chart: data:image/png;base64,{PNG_BASE64}");
    let message = ToolResultClassifier::new().classify(&text).await;

    assert!(message.is_multimodal());
    assert_eq!(message.source(), TOOLS_SOURCE);
    let media = message.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].kind, MediaKind::Image);
    assert_eq!(media[0].mime_type, "image/png");
    assert_eq!(media[0].data, png_bytes());
    assert_eq!(message.text_content(), text);
}

#[tokio::test]
async fn existing_image_paths_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.png");
    std::fs::write(&path, png_bytes()).unwrap();

    let message = ToolResultClassifier::new()
        .classify(&format!("Saved the chart to {}.", path.display()))
        .await;

    let media = message.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].origin, MediaOrigin::File(path));
}

#[tokio::test]
async fn relative_paths_resolve_against_the_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/plot.JPG"), [0xFF, 0xD8, 0xFF, 0xE0, 0x00]).unwrap();

    let message = ToolResultClassifier::new()
        .with_base_dir(dir.path())
        .classify("wrote out/plot.JPG")
        .await;

    let media = message.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].mime_type, "image/jpeg");
}

#[tokio::test]
async fn file_urls_resolve_to_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.png");
    std::fs::write(&path, png_bytes()).unwrap();
    let url = format!("file://{}", path.display());

    let message = ToolResultClassifier::new()
        .classify(&format!("screenshot at {url}"))
        .await;

    let media = message.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].origin, MediaOrigin::Url(url));
}

#[tokio::test]
async fn identical_payloads_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("same.png");
    std::fs::write(&path, png_bytes()).unwrap();
    let text = format!(
        "data:image/png;base64,{PNG_BASE64} and again data:image/png;base64,{PNG_BASE64} and {}",
        path.display()
    );

    let message = ToolResultClassifier::new().classify(&text).await;

    assert_eq!(media_count(&message), 1);
}

#[tokio::test]
async fn plain_text_is_left_untouched() {
    let text = "The build finished in 3.2s with 0 warnings.";
    let message = ToolResultClassifier::new().classify(text).await;

    assert_eq!(message.content(), &MessageContent::Text(text.to_string()));
    assert_eq!(message.source(), TOOLS_SOURCE);
}

#[tokio::test]
async fn missing_files_and_unsupported_extensions_stay_text() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    std::fs::create_dir(dir.path().join("pics.png")).unwrap();
    let classifier = ToolResultClassifier::new().with_base_dir(dir.path());

    for text in [
        "open /definitely/not/here.png",
        "see notes.txt",
        "pics.png is a directory",
    ] {
        let message = classifier.classify(text).await;
        assert!(!message.is_multimodal(), "{text} became multimodal");
        assert_eq!(message.text_content(), text);
    }
}

#[tokio::test]
async fn broken_candidates_are_skipped_but_good_ones_kept() {
    let text = format!("data:image/png;base64,A then data:image/png;base64,{PNG_BASE64}");
    let detection = ToolResultClassifier::new().detect(&text).await;

    assert_eq!(detection.media.len(), 1);
    assert_eq!(detection.warnings.len(), 1);
}

#[tokio::test]
async fn inline_audio_is_detected() {
    let message = ToolResultClassifier::new()
        .classify("recording: data:audio/wav;base64,UklGRiQAAABXQVZF")
        .await;

    let media = message.media();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].kind, MediaKind::Audio);
    assert_eq!(media[0].mime_type, "audio/wav");
}

#[tokio::test]
async fn media_results_produce_an_attachment() {
    let item = parley::types::MediaItem::image(png_bytes(), "image/png", MediaOrigin::Tool);
    let classified = ToolResultClassifier::new()
        .classify_result(&ToolResult::media("c1", "screenshot", item))
        .await;

    assert!(classified.message.is_multimodal());
    let attachment = classified.attachment.unwrap();
    assert_eq!(attachment.mime_type, "image/png");
    assert_eq!(attachment.data, PNG_BASE64);
}

#[tokio::test]
async fn paths_inside_markup_and_assignments_are_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chart.png");
    std::fs::write(&path, png_bytes()).unwrap();
    let shown = path.display();
    let classifier = ToolResultClassifier::new();

    for text in [
        format!("![chart]({shown})"),
        format!("path={shown}"),
        format!("Saved:{shown}"),
        format!("{{\"output\": [\"{shown}\"]}}"),
    ] {
        let message = classifier.classify(&text).await;
        let media = message.media();
        assert_eq!(media.len(), 1, "{text}");
        assert_eq!(media[0].origin, MediaOrigin::File(path.clone()));
    }
}

#[tokio::test]
async fn inline_payload_that_is_not_an_image_stays_text() {
    let text = "result data:image/png;base64,aGVsbG8gd29ybGQh";
    let classifier = ToolResultClassifier::new();

    let detection = classifier.detect(text).await;
    assert!(detection.media.is_empty());
    assert_eq!(detection.warnings.len(), 1);

    let message = classifier.classify(text).await;
    assert_eq!(message.content(), &MessageContent::Text(text.to_string()));
}

#[tokio::test]
async fn image_named_file_with_foreign_bytes_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fake.png"), "not really a png").unwrap();

    let detection = ToolResultClassifier::new()
        .with_base_dir(dir.path())
        .detect("rendered fake.png")
        .await;

    assert!(detection.media.is_empty());
    assert_eq!(detection.warnings.len(), 1);
}
