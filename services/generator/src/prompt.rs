//! Instruction text and response schema for metadata generation

use common::GenerationSettings;
use serde_json::{Value, json};

/// Build the natural-language instruction for one item
pub fn build_instruction(settings: &GenerationSettings) -> String {
    format!(
        "Generate metadata for this image. The title should be a maximum of {} characters. \
         Generate a detailed description of 2-3 sentences. Generate exactly {} relevant keywords. \
         The overall style should be descriptive and optimized for search.",
        settings.title_length, settings.keyword_count
    )
}

/// Structured-output schema: title, description and a keyword list
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": "A compelling and descriptive title for the image."
            },
            "description": {
                "type": "STRING",
                "description": "A detailed description of the image, suitable for stock photo sites. Around 2-3 sentences."
            },
            "keywords": {
                "type": "ARRAY",
                "items": {
                    "type": "STRING",
                    "description": "A relevant keyword."
                },
                "description": "An array of relevant keywords for the image."
            }
        },
        "required": ["title", "description", "keywords"]
    })
}
