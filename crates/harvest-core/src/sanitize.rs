//! Post-processing of agent-written documents

/// Transforms a document read back from the workspace
pub trait PostProcessor: Send + Sync {
    /// Clean `raw`, returning the text to keep
    fn process(&self, raw: &str) -> String;
}

/// Keeps the document as written
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl PostProcessor for Passthrough {
    fn process(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Strips leaked transcript noise by keeping the first fenced block
///
/// Only applies when the text contains one of the marker words. Text without
/// markers, or without a fenced block of the expected language, is returned
/// unchanged.
#[derive(Debug, Clone)]
pub struct FencedBlockSanitizer {
    markers: Vec<String>,
    language: String,
}

impl FencedBlockSanitizer {
    /// Sanitizer with custom markers and fence language
    #[must_use]
    pub fn new<I, S>(markers: I, language: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
            language: language.into(),
        }
    }

    /// Check whether `raw` looks like a leaked transcript
    #[must_use]
    pub fn is_contaminated(&self, raw: &str) -> bool {
        self.markers.iter().any(|marker| raw.contains(marker.as_str()))
    }

    /// Contents of the first fenced block, trimmed
    #[must_use]
    pub fn extract_block<'a>(&self, raw: &'a str) -> Option<&'a str> {
        let open = format!("```{}", self.language);
        let start = raw.find(&open)? + open.len();
        let rest = &raw[start..];
        let end = rest.find("```")?;
        Some(rest[..end].trim())
    }
}

impl Default for FencedBlockSanitizer {
    fn default() -> Self {
        Self::new(["SystemMessage", "AssistantMessage", "ResultMessage"], "markdown")
    }
}

impl PostProcessor for FencedBlockSanitizer {
    fn process(&self, raw: &str) -> String {
        if !self.is_contaminated(raw) {
            return raw.to_string();
        }
        tracing::warn!("Document contains transcript markers, extracting fenced block");
        match self.extract_block(raw) {
            Some(block) => block.to_string(),
            None => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_untouched() {
        let text = "# Brand\n\n```markdown\nnot extracted\n```\n";
        assert_eq!(FencedBlockSanitizer::default().process(text), text);
    }

    #[test]
    fn contaminated_text_keeps_block() {
        let text = "SystemMessage(init)\nAssistantMessage: ok\n```markdown\n\n# Brand\n> summary\n\n```\nResultMessage(done)";
        assert_eq!(
            FencedBlockSanitizer::default().process(text),
            "# Brand\n> summary"
        );
    }

    #[test]
    fn contaminated_without_block_unchanged() {
        let text = "ResultMessage only, no fence";
        assert_eq!(FencedBlockSanitizer::default().process(text), text);

        let unterminated = "SystemMessage\n```markdown\n# open";
        assert_eq!(FencedBlockSanitizer::default().process(unterminated), unterminated);
    }

    #[test]
    fn first_block_wins() {
        let text = "AssistantMessage\n```markdown\none\n```\n```markdown\ntwo\n```";
        assert_eq!(FencedBlockSanitizer::default().process(text), "one");
    }

    #[test]
    fn passthrough_keeps_everything() {
        let text = "SystemMessage\n```markdown\nx\n```";
        assert_eq!(Passthrough.process(text), text);
    }
}
