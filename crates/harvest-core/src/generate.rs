//! Document generation from a store's contents
//!
//! Textual records of a previous capture run are quoted into a prompt; the
//! agent writes the document into the workspace, where the capture pipeline
//! picks it up like any other output.

use crate::config::GenerationSettings;
use harvest_store::{KeyValueStore, StoreError, INPUT_KEY};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::Write as _;

/// Textual store records in listing order
pub type SourceFiles = IndexMap<String, String>;

/// How the final document was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// Written by the agent
    Agent,
    /// Store held no textual records, agent never ran
    NoInputs,
    /// Agent finished without writing the document
    MissingOutput,
    /// Agent run failed
    AgentError,
}

/// Finished document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedDocument {
    /// Final text, footer included
    pub text: String,
    /// Number of textual records analysed
    pub files_analyzed: usize,
    /// Origin of the text
    pub source: DocumentSource,
}

/// Read every textual record of `store`
///
/// Binary records and the run input record are skipped. A record that fails to read is logged and
/// skipped; only a failing listing aborts.
///
/// # Errors
/// Returns error if the store's keys cannot be listed
pub async fn collect_source_files(store: &dyn KeyValueStore) -> Result<SourceFiles, StoreError> {
    tracing::info!("Listing store files...");
    let keys = store.list_keys().await?;
    tracing::info!("Found {} files in store {}", keys.len(), store.id());

    let mut files = SourceFiles::new();
    for meta in keys {
        if meta.key == INPUT_KEY {
            continue;
        }
        tracing::info!("Reading file: {}", meta.key);
        match store.get(&meta.key).await {
            Ok(Some(value)) => match value.as_text() {
                Some(text) => {
                    tracing::info!("Loaded {}", meta.key);
                    files.insert(meta.key, text);
                }
                None => tracing::info!("Skipped binary file {}", meta.key),
            },
            Ok(None) => tracing::debug!("Record {} disappeared", meta.key),
            Err(e) => tracing::warn!("Failed to read {}: {e}", meta.key),
        }
    }
    Ok(files)
}

fn excerpt(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Generation prompt quoting the first files of `files`
#[must_use]
pub fn build_prompt(domain: &str, files: &SourceFiles, settings: &GenerationSettings) -> String {
    let mut quoted = String::new();
    for (key, text) in files.iter().take(settings.max_prompt_files) {
        let _ = writeln!(quoted, "**{key}**:\n{}", excerpt(text, settings.excerpt_chars));
    }
    let output = settings.output_path.display();
    let total = files.len();

    format!(
        r#"SYSTEM CONTEXT: You are running in an automated VM environment. DO NOT ask questions or wait for user input. Work autonomously until the task is complete.

TASK: Generate an llms.txt file for {domain} following the official llms.txt specification from llmstxt.org.

**Files from key-value store ({total} total)**:
{quoted}

**OFFICIAL llms.txt FORMAT SPECIFICATION**:

The llms.txt file MUST follow this structure in exact order:

1. **H1 heading** (required): Brand/project name
2. **Blockquote** (required): Concise summary with key brand information
3. **Detailed content sections** (optional): Markdown sections explaining brand guidelines WITHOUT H2 headings initially
4. **H2 "Optional" section** (optional): Secondary information that can be omitted for shorter context

**REQUIRED OUTPUT FORMAT**:
```markdown
# {{Brand Name}}

> Concise one-line summary of the brand's design identity and purpose

This is the design system and brand guidelines for {{domain}}. [2-3 clear sentences about the brand, its visual identity, and design principles.]

**Brand Overview**: [Brief description of brand personality and positioning]

**Design Principles**: [Core design values and approach]

**Color Palette**:
- Primary: #XXXXXX (RGB: X, X, X) - [Usage and meaning]
- Secondary: #XXXXXX (RGB: X, X, X) - [Usage and meaning]
- Accent: #XXXXXX (RGB: X, X, X) - [Usage and meaning]
[List ALL colors found in files with actual hex values]

**Typography**:
- Primary: [Font Family], weights: [list]
- Secondary: [Font Family], weights: [list]
- Heading styles: [specifications]
- Body styles: [specifications]

**Spacing & Layout**: [Spacing tokens, grid system, breakpoints]

**Component Patterns**: [Button styles, cards, forms, navigation patterns]

**Design Tokens**: [CSS variables, border radius, shadows, animations]

## Optional

**Technical Implementation**: [Framework details, browser support, build tools]

**Additional Resources**: [Links to detailed documentation if available]
```

**CRITICAL INSTRUCTIONS**:
1. Follow the llms.txt specification EXACTLY - H1, blockquote, then content
2. Use concise, clear language throughout
3. Extract ACTUAL values from files - no placeholders like #XXXXXX
4. The blockquote MUST be a single-line summary
5. Main content should NOT use H2 headings except for "Optional" section
6. Use bold markdown (**text**) and lists for structure instead of headings
7. Include brief, informative descriptions with every resource
8. Test that an LLM could understand this without ambiguity
9. Use the Write tool to create {output}
10. DO NOT include meta-commentary, system messages, or tool outputs in the file

Start working now. Analyze the files and write llms.txt."#
    )
}

fn key_list(files: &SourceFiles) -> String {
    files
        .keys()
        .map(|key| format!("- {key}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template used when the store has nothing to analyse
#[must_use]
pub fn no_inputs_document(domain: &str, settings: &GenerationSettings) -> GeneratedDocument {
    let generator = &settings.generator_name;
    GeneratedDocument {
        text: format!(
            "# {domain} Design System\n\n\
             > Brand design guidelines and style tokens\n\n\
             ## Overview\n\n\
             This is the design system for {domain}.\n\n\
             Note: No design files were available for analysis.\n\n\
             ---\n\n\
             Generated by {generator}\n"
        ),
        files_analyzed: 0,
        source: DocumentSource::NoInputs,
    }
}

/// Template used when the agent ran but wrote no document
#[must_use]
pub fn missing_output_body(domain: &str, files: &SourceFiles) -> String {
    format!(
        "# {domain} Design System\n\n\
         > Brand design guidelines and style tokens\n\n\
         ## Overview\n\n\
         This is the design system for {domain}.\n\n\
         ## Files Analyzed\n\n\
         {}\n\n\
         Note: Automated analysis encountered an issue. Please review manually.\n",
        key_list(files)
    )
}

/// Template used when the agent run failed
#[must_use]
pub fn agent_error_document(
    domain: &str,
    files: &SourceFiles,
    error: &str,
    settings: &GenerationSettings,
) -> GeneratedDocument {
    let generator = &settings.generator_name;
    GeneratedDocument {
        text: format!(
            "# {domain} Design System\n\n\
             > Brand design guidelines and style tokens\n\n\
             ## Overview\n\n\
             This is the design system for {domain}.\n\n\
             ## Files Analyzed\n\n\
             {}\n\n\
             ---\n\n\
             Generated by {generator}\n\
             Files analyzed: {}\n\
             Note: Error occurred during AI analysis - {error}\n",
            key_list(files),
            files.len()
        ),
        files_analyzed: files.len(),
        source: DocumentSource::AgentError,
    }
}

/// Append the generation footer to `body`
#[must_use]
pub fn finish_document(
    body: String,
    domain: &str,
    files: &SourceFiles,
    source: DocumentSource,
    settings: &GenerationSettings,
) -> GeneratedDocument {
    let mut text = body;
    let _ = write!(
        text,
        "\n\n---\n\nGenerated by {}\nFiles analyzed: {}\nSource: {domain}\n",
        settings.generator_name,
        files.len()
    );
    GeneratedDocument {
        text,
        files_analyzed: files.len(),
        source,
    }
}
