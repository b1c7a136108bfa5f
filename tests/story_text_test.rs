mod test_utils;

use std::sync::Arc;

use serde_json::json;
use storybook_forge::model::{Character, StoryConfig, MAX_CHARACTERS};
use storybook_forge::story::{fallback_story_draft, fallback_storybook};
use test_utils::mock_gemini::storybook_json;
use test_utils::{engine, MockGemini, MockText};

fn config(pages: u32) -> StoryConfig {
    StoryConfig { title: "The Lost Puppy".into(), age: "5-7".into(), pages, ..StoryConfig::default() }
}

#[tokio::test]
async fn failed_story_call_returns_exact_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_text(MockText::Error));
    let engine = engine(mock.clone(), dir.path());

    let draft = engine.generate_story(&config(1)).await;
    assert_eq!(
        serde_json::to_value(&draft).unwrap(),
        json!({"story": "Once upon a time...", "character": [{"name": "Jane Doe", "trait": "A lion, brave, black color, tall"}]})
    );
    assert_eq!(mock.call_count("generate_content"), 1);
}

#[tokio::test]
async fn malformed_story_json_degrades_to_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_text(MockText::Json("{\"story\": 42".into())));
    let draft = engine(mock, dir.path()).generate_story(&config(3)).await;
    assert_eq!(draft, fallback_story_draft());
}

#[tokio::test]
async fn story_characters_are_capped() {
    let dir = tempfile::tempdir().unwrap();
    let characters: Vec<_> = (0..7).map(|i| json!({"name": format!("C{}", i), "trait": "kind"})).collect();
    let mock = Arc::new(MockGemini::new().with_story(json!({"story": "A tale.", "character": characters})));
    let draft = engine(mock, dir.path()).generate_story(&config(3)).await;
    assert_eq!(draft.story, "A tale.");
    assert_eq!(draft.character.len(), MAX_CHARACTERS);
    assert_eq!(draft.characters()[4].name, "C4");
}

#[tokio::test]
async fn page_generation_returns_requested_page_count() {
    for pages in [1u32, 2, 7, 50, 100] {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockGemini::new().with_story(storybook_json(pages as usize)));
        let book = engine(mock, dir.path()).generate_pages(&config(pages), &[], "story").await;
        assert_eq!(book.pages.len(), pages as usize);
        assert_eq!(book.pages[0].image_prompt, "Scene 1");
    }
}

#[tokio::test]
async fn extra_pages_are_trimmed() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_story(storybook_json(6)));
    let book = engine(mock, dir.path()).generate_pages(&config(4), &[], "story").await;
    assert_eq!(book.pages.len(), 4);
}

#[tokio::test]
async fn failed_or_empty_page_call_returns_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let failing = Arc::new(MockGemini::new().with_text(MockText::Error));
    let book = engine(failing, dir.path()).generate_pages(&config(1), &[], "story").await;
    assert_eq!(book, fallback_storybook());

    let empty = Arc::new(MockGemini::new().with_story(json!({"book_name": "x", "pages": []})));
    let book = engine(empty, dir.path()).generate_pages(&config(1), &[], "story").await;
    assert_eq!(book, fallback_storybook());
}

#[tokio::test]
async fn page_request_carries_characters_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockGemini::new().with_story(storybook_json(2)));
    let chars = vec![Character::new("Mira", "tall, brave, red cloak")];
    engine(mock.clone(), dir.path()).generate_pages(&config(2), &chars, "Mira walks.").await;

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let body = serde_json::to_value(&requests[0]).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("- Name: Mira"));
    assert!(prompt.contains("With story:Mira walks."));
    assert_eq!(body["generationConfig"]["responseSchema"]["required"], json!(["book_name", "pages"]));
}
