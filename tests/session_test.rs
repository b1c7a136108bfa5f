mod test_utils;

use std::io::{Cursor, Read};
use std::sync::Arc;

use serde_json::json;
use storybook_forge::error::AppError;
use storybook_forge::model::{AspectRatio, StoryConfig};
use storybook_forge::utils::archive::DownloadSelection;
use storybook_forge::utils::poller::CancelToken;
use storybook_forge::Session;
use test_utils::mock_gemini::{storybook_json, PNG_BYTES};
use test_utils::{engine, MockGemini, MockImage, MockText};

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[tokio::test]
async fn full_pipeline_produces_pages_and_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_story(json!({
        "story": "Once upon a time Mira found a puppy.",
        "character": [{"name": "Mira", "trait": "brave girl in a red cloak"}]
    })));
    let engine = engine(mock.clone(), dir.path());
    let mut session = Session::with_config(StoryConfig {
        title: "The Lost Puppy".into(),
        pages: 3,
        ratio: AspectRatio::Landscape,
        ..StoryConfig::default()
    });

    let draft = session.generate_story(&engine).await;
    assert_eq!(draft.story, "Once upon a time Mira found a puppy.");
    assert_eq!(session.characters.len(), 1);
    assert_eq!(session.characters[0].traits, "brave girl in a red cloak");

    // Incomplete characters block illustration before any batch is created.
    let err = session.illustrate(&engine, &CancelToken::never()).await.unwrap_err();
    assert!(matches!(err, AppError::IncompleteCharacters));
    assert_eq!(mock.call_count("create_batch"), 0);

    let outcome = session.generate_character_image(&engine, 0).await.unwrap();
    assert!(outcome.is_ok());
    assert!(session.characters[0].is_complete());

    // Page text now comes back for the storybook request.
    let mock_pages = Arc::new(
        MockGemini::new()
            .with_text(MockText::Json(storybook_json(3).to_string()))
            .with_batch_items(vec![
                MockImage::Image(PNG_BYTES.to_vec()),
                MockImage::Blocked("SAFETY".into()),
                MockImage::Image(PNG_BYTES.to_vec()),
            ]),
    );
    let engine = test_utils::engine(mock_pages.clone(), dir.path());
    let outcomes = session.illustrate(&engine, &CancelToken::never()).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(session.book_name.as_deref(), Some("The Lost Puppy"));
    assert_eq!(session.pages.len(), 3);
    assert_eq!(session.pages[1].image_prompt, "Scene 2");
    assert!(session.pages[0].image.is_some());
    assert!(session.pages[1].image.is_none());
    assert_eq!(outcomes[1].error, "SAFETY");
    assert_eq!(mock_pages.uploads().len(), 1);

    assert_eq!(
        entry_names(&session.archive(DownloadSelection::All).await.unwrap()),
        vec!["characters/1.png", "story_images/1.png", "story_images/3.png"]
    );
    assert_eq!(
        entry_names(&session.archive(DownloadSelection::Story).await.unwrap()),
        vec!["story_images/1.png", "story_images/3.png"]
    );
    assert_eq!(
        entry_names(&session.archive(DownloadSelection::Characters).await.unwrap()),
        vec!["characters/1.png"]
    );
}

#[tokio::test]
async fn uploaded_character_survives_archive_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(Arc::new(MockGemini::new()), dir.path());
    let mut session = Session::new();
    session.set_character(0, "Mira", "brave").unwrap();
    session
        .upload_character_image(engine.store(), 0, b"mira-portrait", "image/png")
        .await
        .unwrap();

    let bytes = session.archive(DownloadSelection::All).await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entry = archive.by_name("characters/1.png").unwrap();
    let mut content = Vec::new();
    entry.read_to_end(&mut content).unwrap();
    assert_eq!(content, b"mira-portrait");
}

#[tokio::test]
async fn page_edits_need_an_existing_picture() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_text(MockText::Json(storybook_json(2).to_string())));
    let engine = engine(mock.clone(), dir.path());
    let mut session = Session::with_config(StoryConfig { title: "T".into(), pages: 2, ..StoryConfig::default() });
    session.set_story("A short tale.");
    session.illustrate(&engine, &CancelToken::never()).await.unwrap();

    session.set_page_prompt(0, "A new dawn").unwrap();
    let outcome = session.regenerate_page(&engine, 0).await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(session.pages[0].image, outcome.path());
    let last = mock.requests().pop().unwrap();
    assert_eq!(last.contents[0].parts.last().unwrap().text.as_deref(), Some("A new dawnNo wording in the image. "));

    session.pages[1].image = None;
    let calls = mock.calls().len();
    assert!(matches!(session.edit_page(&engine, 1).await, Err(AppError::MissingSourceImage(_))));
    assert_eq!(mock.calls().len(), calls);
    assert!(matches!(session.regenerate_page(&engine, 9).await, Err(AppError::InvalidIndex { .. })));

    let edited = session.edit_page(&engine, 0).await.unwrap();
    assert!(edited.is_ok());
    assert_ne!(session.pages[0].image, outcome.path());
}
