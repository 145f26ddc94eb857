//! Prompt assembly
//!
//! Builds the single flat text prompt sent to the backend: instruction
//! preamble, optional modifiers, recent conversation context, then the request.

use std::fmt::Write;

use crate::conversation::{recent, Message};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Prompt is required")]
    PromptRequired,
}

/// One generation, valid for the duration of a single relay call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    tone: Option<String>,
    goal: Option<String>,
    audience: Option<String>,
    history: Vec<Message>,
}

impl GenerationRequest {
    /// Validate the user text and keep at most the last four history entries.
    ///
    /// Blank modifiers are treated as absent.
    pub fn new(
        prompt: Option<String>,
        tone: Option<String>,
        goal: Option<String>,
        audience: Option<String>,
        history: &[Message],
    ) -> Result<Self, ValidationError> {
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or(ValidationError::PromptRequired)?;

        Ok(Self {
            prompt,
            tone: non_blank(tone),
            goal: non_blank(goal),
            audience: non_blank(audience),
            history: recent(history).to_vec(),
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Render the full prompt text under `preamble`
    pub fn assemble(&self, preamble: &str) -> String {
        let mut text = String::with_capacity(preamble.len() + self.prompt.len() + 256);

        text.push_str(preamble);
        text.push_str("\n\nCreate a tweet with the following specifications:\n");

        // Writing into a String cannot fail.
        if let Some(tone) = &self.tone {
            let _ = writeln!(text, "Tone: {}", tone);
        }
        if let Some(goal) = &self.goal {
            let _ = writeln!(text, "Goal: {}", goal);
        }
        if let Some(audience) = &self.audience {
            let _ = writeln!(text, "Target Audience: {}", audience);
        }

        if !self.history.is_empty() {
            text.push_str("\nPrevious conversation context:\n");
            for message in &self.history {
                let _ = writeln!(text, "{}: {}", message.role.label(), message.content);
            }
        }

        let _ = writeln!(text, "\nUser's request: {}", self.prompt);
        text.push_str("\nGenerate a tweet that matches these specifications.");

        text
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompts::builtin as prompts_builtin;

    fn history(n: usize) -> Vec<Message> {
        (1..=n)
            .map(|i| {
                if i % 2 == 1 {
                    Message::user(format!("question {}", i))
                } else {
                    Message::assistant(format!("answer {}", i))
                }
            })
            .collect()
    }

    #[test]
    fn test_tone_only() {
        let request =
            GenerationRequest::new(Some("Hello".into()), Some("Funny".into()), None, None, &[])
                .unwrap();
        let text = request.assemble(prompts_builtin::TWEET_WRITER);

        assert!(text.starts_with(prompts_builtin::TWEET_WRITER));
        assert!(text.contains("\nTone: Funny\n"));
        assert!(!text.contains("Goal:"));
        assert!(!text.contains("Target Audience:"));
        assert!(!text.contains("Previous conversation context"));
        assert!(text.contains("User's request: Hello\n"));
        assert!(text.ends_with("Generate a tweet that matches these specifications."));
    }

    #[test]
    fn test_exact_layout() {
        let request = GenerationRequest::new(
            Some("Launch day".into()),
            Some("Witty".into()),
            Some("Promotion".into()),
            Some("Founders".into()),
            &[Message::user("hi"), Message::assistant("Tweet 1/1: hey")],
        )
        .unwrap();

        let expected = "PRE\n\nCreate a tweet with the following specifications:\n\
            Tone: Witty\n\
            Goal: Promotion\n\
            Target Audience: Founders\n\
            \nPrevious conversation context:\n\
            User: hi\n\
            Assistant: Tweet 1/1: hey\n\
            \nUser's request: Launch day\n\
            \nGenerate a tweet that matches these specifications.";

        assert_eq!(request.assemble("PRE"), expected);
    }

    #[test]
    fn test_history_capped_to_last_four() {
        let request =
            GenerationRequest::new(Some("next".into()), None, None, None, &history(5)).unwrap();
        let text = request.assemble("PRE");

        assert_eq!(request.history().len(), 4);
        assert!(!text.contains("question 1"));
        let positions: Vec<usize> = ["answer 2", "question 3", "answer 4", "question 5"]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_blank_modifiers_ignored() {
        let request = GenerationRequest::new(
            Some("Hello".into()),
            Some("".into()),
            Some("   ".into()),
            None,
            &[],
        )
        .unwrap();
        let text = request.assemble("PRE");
        assert!(!text.contains("Tone:"));
        assert!(!text.contains("Goal:"));
    }

    #[test]
    fn test_prompt_required() {
        assert_eq!(
            GenerationRequest::new(None, None, None, None, &[]),
            Err(ValidationError::PromptRequired)
        );
        assert_eq!(
            GenerationRequest::new(Some(" \n\t".into()), None, None, None, &[]),
            Err(ValidationError::PromptRequired)
        );
    }
}
