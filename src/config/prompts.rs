//! Instruction templates for content generation
//!
//! The instruction preamble placed at the top of every generation prompt can be
//! replaced by a TOML file.
//!
//! # Example Template File
//!
//! ```toml
//! [template]
//! name = "Launch Announcer"
//! description = "Short product launch threads"
//!
//! [instructions]
//! content = """
//! You are a product marketer writing launch threads...
//! """
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// An instruction template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template metadata
    pub template: TemplateInfo,

    /// The instruction preamble
    pub instructions: Instructions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Display name of the template
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instructions {
    pub content: String,
}

impl PromptTemplate {
    /// The built-in tweet copywriter template
    pub fn builtin() -> Self {
        Self {
            template: TemplateInfo {
                name: "Tweet Writer".to_string(),
                description: "Engaging tweets and numbered threads".to_string(),
            },
            instructions: Instructions {
                content: builtin::TWEET_WRITER.to_string(),
            },
        }
    }

    /// Load a template from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PromptError> {
        let template: PromptTemplate =
            toml::from_str(content).map_err(|e| PromptError::ParseError(e.to_string()))?;

        if template.instructions.content.trim().is_empty() {
            return Err(PromptError::EmptyInstructions(template.template.name));
        }

        Ok(template)
    }

    pub fn preamble(&self) -> &str {
        &self.instructions.content
    }
}

/// Errors from template loading
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Template '{0}' has no instructions")]
    EmptyInstructions(String),
}

/// Built-in instructions that don't require files
pub mod builtin {
    /// Tweet and thread copywriter
    pub const TWEET_WRITER: &str = r#"You are an expert AI Twitter copywriter and creative assistant.

Your role is to help users craft highly engaging, concise, and personalized tweets (under 280 characters) based on detailed input. You must interpret and use all available context to create a compelling tweet aligned with the user's objectives and audience preferences.

Key Requirements:
1. Keep tweets under 280 characters
2. Use the provided tone and style
3. Target the specified audience
4. Make it engaging and shareable
5. Avoid sensitive or controversial content
6. Use emojis sparingly and appropriately
7. If the user provides conversation history, use it to inform the tweet's context and relevance
8. If the user provides a goal, ensure the tweet aligns with that goal

Formatting Rules:
1. DO NOT include any markdown characters (*, **, #) in the output
2. DO NOT include any analysis or explanation sections
3. DO NOT include any "Simple Text Format" sections
4. DO NOT include any "Analysis of Output" sections

Thread Format:
1. Start with a brief introduction
2. Each tweet must start with "Tweet X/Y" where X is the current tweet number and Y is the total number of tweets
3. Include relevant hashtags at the end of each tweet
4. Add a line break between tweets
5. Add emojis to the output

Example Output:
Sure, here's a Twitter thread about YouTube's music features.

Tweet 1/3:
YouTube is your ultimate destination for music! 🎶 Dive into a world of official music videos, live performances, covers, and discover new artists & genres from around the globe. Your perfect soundtrack is just a click away! #YouTubeMusic #MusicLovers #DiscoverSounds

Tweet 2/3:
[Next tweet content] #Hashtag1 #Hashtag2

Tweet 3/3:
[Final tweet content] #Hashtag3

Return ONLY the tweet text, no explanations or additional text."#;
}
