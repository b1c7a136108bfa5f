//! Prompt construction for the text and image models.
//!
//! Every method is plain string formatting over a [`StoryConfig`] and optional
//! characters. Character clauses are left out entirely when no character
//! contributes a name or traits.
use crate::model::{Character, StoryConfig};

/// Appended to every image prompt to keep lettering out of the illustration.
pub const NO_TEXT_SUFFIX: &str = "No wording in the image. ";
pub const CHARACTER_BLOCK_HEADER: &str = "Character descriptions to maintain consistency:\n";
pub const EDIT_PICTURE_INSTRUCTION: &str = "Edit the picture based on this picture";
pub const EDIT_CHARACTER_INSTRUCTION: &str = "Edit the character based on this picture";

#[derive(Debug, Default, Clone, Copy)]
pub struct PromptConstructor;

impl PromptConstructor {
    pub fn new() -> Self {
        PromptConstructor
    }

    /// Prompt for the full story text plus up to five character suggestions.
    pub fn story_prompt(&self, config: &StoryConfig) -> String {
        let pages = config.page_count();
        let tone = if config.tone.trim().is_empty() { "neutral".to_string() } else { config.tone.to_lowercase() };
        let age = or_default(&config.age, "children");
        let art_style = or_default(&config.art_style, "default style");
        format!(
            r#"Write a {pages}-page {genre} story titled '{title}'
with a {tone} tone
for {age}.
If age is very small, the story should be very short and easy.
Illustrate the story in {art_style}.
Write the full story in a complete narrative with a proper ending and natural flow.
Ensure the story is exactly for {pages} pages.

Additionally, suggest 1-5 main characters of the story. (Only include necessary characters that appear in the story and keep the number of characters small, maximum of 5 characters allowed)
The trait of the characters should be very detailed, in terms of clothing, the background, looking, characteristic.
Return the result in JSON format:
{{
  "story": "...",
  "character": [
    {{
      "name": "character name",
      "trait": "character's trait and characteristic"
    }}
  ]
}}

Example:
{{
  "story": "Once upon a time...",
  "character": [
    {{
      "name": "Jane Doe",
      "trait": "A lion, brave, black color, tall"
    }}
  ]
}}
"#,
            genre = config.genre,
            title = config.title,
        )
    }

    /// Prompt splitting `story` into pages with a matching image prompt each.
    pub fn page_prompt(&self, config: &StoryConfig, characters: &[Character], story: &str) -> String {
        let mut prompt = format!(
            "Generate image prompt for illustrated storybook titled \"{}\".\nWith story:{}\nGenre: {}. Tone: {}. Age:{}\n\n",
            config.title, story, config.genre, config.tone, config.age
        );
        let named: Vec<&Character> = characters.iter().filter(|c| c.has_details()).collect();
        if !named.is_empty() {
            prompt.push_str("Main Characters:\n");
            for c in &named {
                prompt.push_str(&format!("- Name: {}\n  Traits: {}\n", c.name, c.traits));
            }
            prompt.push_str("\nUse ONLY these characters in the story. Ensure they appear consistently across all pages.\n\n");
        }
        prompt.push_str("Each page prompt should contain:\n");
        prompt.push_str("- The story text (length appropriate for the audience's age; short and simple for younger readers).\n");
        prompt.push_str("- Details of the environment.\n");
        prompt.push_str("- Colour and shape for items to ensure consistency.\n");
        prompt.push_str(&format!(
            "- A matching image prompt describing the scene using this art style: {}.\n",
            config.art_style
        ));
        if !named.is_empty() {
            prompt.push_str(
                "- If characters appear in the scene, include them clearly in the image prompt, with specific attention to their pose, facial expression, and position.\n",
            );
        }
        prompt.push_str("- Make sure the prompt is very detailed, 5-6 sentences.\n");
        prompt.push_str(&format!("Generate exactly {} pages.\n\n", config.page_count()));
        prompt.push_str(
            r#"Return the result in JSON format:
{
  "book_name": "...",
  "pages": [
    {
      "text": "story text here",
      "image_prompt": "image description here"
    }
  ]
}
"#,
        );
        prompt
    }

    /// Prompt for a single character portrait.
    pub fn character_prompt(&self, description: &str, config: &StoryConfig) -> String {
        format!(
            "Generate a character based on the details below, ensure the quality of the character. (Don't include any words) \
Do not include additional characters in the picture unless stated. \
A {} illustration of the character.\nGenre: {}. Tone: {}.\nCharacter details: {}\n",
            config.art_style, config.genre, config.tone, description
        )
    }

    /// Prompt for redesigning a character from an existing picture.
    pub fn character_redesign_prompt(&self, description: &str, config: &StoryConfig) -> String {
        format!(
            "You are a professional character designer for a {} storybook.\n\
The tone of the story is {}.\n\
The art style is {}.\n\n\
Please redesign the character based on the provided image and the following description:\n{}\n\n\
Ensure the character design is consistent with the art style and tone.\n\
Ensure there is no extra character unless stated.\n",
            config.genre, config.tone, config.art_style, description
        )
    }

    /// Name and traits of every character with either field set, or `None`.
    pub fn character_block(&self, characters: &[Character]) -> Option<String> {
        let entries: Vec<String> = characters
            .iter()
            .filter(|c| c.has_details())
            .map(|c| format!("Character: {}\nTraits: {}\n\n", c.name, c.traits))
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(format!("{}{}", CHARACTER_BLOCK_HEADER, entries.concat()))
        }
    }

    /// Wraps a page prompt with the character block and the no-text suffix.
    pub fn decorate_image_prompt(&self, prompt: &str, characters: &[Character]) -> String {
        let mut out = match self.character_block(characters) {
            Some(block) => format!("Image Prompt :{} \n{}", prompt, block),
            None => prompt.to_string(),
        };
        out.push_str(NO_TEXT_SUFFIX);
        out
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StoryConfig {
        StoryConfig { title: "The Lost Puppy".into(), age: "5-7".into(), pages: 3, ..StoryConfig::default() }
    }

    #[test]
    fn page_prompt_without_characters_has_no_character_clause() {
        let p = PromptConstructor::new().page_prompt(&config(), &[], "A puppy gets lost.");
        assert!(!p.is_empty());
        assert!(!p.contains("Main Characters"));
        assert!(!p.contains("If characters appear"));
        assert!(p.contains("Generate exactly 3 pages."));
    }

    #[test]
    fn page_prompt_lists_characters() {
        let chars = vec![Character::new("Mira", "tall, brave, red cloak")];
        let p = PromptConstructor::new().page_prompt(&config(), &chars, "story");
        assert!(p.contains("- Name: Mira\n  Traits: tall, brave, red cloak"));
        assert!(p.contains("Use ONLY these characters"));
    }

    #[test]
    fn story_prompt_fills_blank_fields() {
        let cfg = StoryConfig { tone: String::new(), art_style: " ".into(), ..config() };
        let p = PromptConstructor::new().story_prompt(&cfg);
        assert!(p.contains("with a neutral tone"));
        assert!(p.contains("for 5-7."));
        assert!(p.contains("Illustrate the story in default style."));
        assert!(p.starts_with("Write a 3-page Children story titled 'The Lost Puppy'"));
    }

    #[test]
    fn decorate_skips_empty_characters() {
        let pc = PromptConstructor::new();
        assert_eq!(pc.decorate_image_prompt("a fox", &[]), "a foxNo wording in the image. ");
        assert_eq!(pc.decorate_image_prompt("a fox", &[Character::default()]), "a foxNo wording in the image. ");
    }

    #[test]
    fn decorate_embeds_character_block() {
        let chars = vec![Character::new("Mira", ""), Character::default(), Character::new("", "green scales")];
        let out = PromptConstructor::new().decorate_image_prompt("a fox", &chars);
        assert_eq!(
            out,
            "Image Prompt :a fox \nCharacter descriptions to maintain consistency:\n\
Character: Mira\nTraits: \n\nCharacter: \nTraits: green scales\n\nNo wording in the image. "
        );
    }
}
