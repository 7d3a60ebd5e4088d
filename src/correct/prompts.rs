//! Prompt templates for the correction and summary requests.

use anyhow::{bail, Result};
use std::path::Path;

/// Marker replaced with the raw transcript chunk in the correction prompt.
pub const TRANSCRIPT_PLACEHOLDER: &str = "<<TRANSCRIPT>>";

/// Marker replaced with the collected notes in the summary prompt.
pub const NOTES_PLACEHOLDER: &str = "<<NOTES>>";

const DEFAULT_CORRECTION_TEMPLATE: &str = "\
The following is a raw, machine-generated transcript of a spoken video. \
Rewrite it as clean prose: fix recognition mistakes, restore punctuation and \
capitalization, and break it into sentences. Do not invent content that is \
not in the transcript.

After the corrected text, add a line reading exactly \"NOTES:\" followed by \
a short list of names, terms, or passages you were unsure about, one per line.

Raw transcript:
<<TRANSCRIPT>>

Corrected transcript:
";

const DEFAULT_SUMMARY_TEMPLATE: &str = "\
The following notes were collected while correcting the transcript of a \
spoken video. Write a short paragraph summarizing what the notes suggest \
the video covers.

Notes:
<<NOTES>>

Summary:
";

/// The pair of templates a correction run works from. Both are validated to
/// contain their placeholder so a custom template cannot silently produce
/// prompts with no transcript in them.
#[derive(Debug, Clone)]
pub struct PromptSet {
    correction: String,
    summary: String,
}

impl PromptSet {
    pub fn from_templates(correction: &str, summary: &str) -> Result<Self> {
        if !correction.contains(TRANSCRIPT_PLACEHOLDER) {
            bail!(
                "correction prompt template is missing the {} placeholder",
                TRANSCRIPT_PLACEHOLDER
            );
        }
        if !summary.contains(NOTES_PLACEHOLDER) {
            bail!(
                "summary prompt template is missing the {} placeholder",
                NOTES_PLACEHOLDER
            );
        }

        Ok(Self {
            correction: correction.to_string(),
            summary: summary.to_string(),
        })
    }

    /// Load templates from the given files, falling back to the built-in
    /// templates for any file not provided.
    pub fn load(correction_file: Option<&Path>, summary_file: Option<&Path>) -> Result<Self> {
        let correction = match correction_file {
            Some(path) => fs_err::read_to_string(path)?,
            None => DEFAULT_CORRECTION_TEMPLATE.to_string(),
        };
        let summary = match summary_file {
            Some(path) => fs_err::read_to_string(path)?,
            None => DEFAULT_SUMMARY_TEMPLATE.to_string(),
        };

        Self::from_templates(&correction, &summary)
    }

    pub fn correction_prompt(&self, transcript: &str) -> String {
        self.correction.replace(TRANSCRIPT_PLACEHOLDER, transcript)
    }

    pub fn summary_prompt(&self, notes: &str) -> String {
        self.summary.replace(NOTES_PLACEHOLDER, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn built_in_templates_are_valid() {
        let prompts = PromptSet::load(None, None).unwrap();
        let prompt = prompts.correction_prompt("um so basically");
        assert!(prompt.contains("um so basically"));
        assert!(!prompt.contains(TRANSCRIPT_PLACEHOLDER));
    }

    #[test]
    fn placeholders_are_substituted() {
        let prompts =
            PromptSet::from_templates("Fix this: <<TRANSCRIPT>>", "Summarize: <<NOTES>>").unwrap();
        assert_eq!(prompts.correction_prompt("abc"), "Fix this: abc");
        assert_eq!(prompts.summary_prompt("- a note"), "Summarize: - a note");
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = PromptSet::from_templates("no marker here", "Summarize: <<NOTES>>").unwrap_err();
        assert!(err.to_string().contains("<<TRANSCRIPT>>"));

        let err = PromptSet::from_templates("Fix: <<TRANSCRIPT>>", "no marker").unwrap_err();
        assert!(err.to_string().contains("<<NOTES>>"));
    }

    #[test]
    fn templates_load_from_files() {
        let mut correction = tempfile::NamedTempFile::new().unwrap();
        write!(correction, "Custom: <<TRANSCRIPT>>").unwrap();

        let prompts = PromptSet::load(Some(correction.path()), None).unwrap();
        assert_eq!(prompts.correction_prompt("xyz"), "Custom: xyz");
        // The summary side fell back to the built-in template.
        assert!(prompts.summary_prompt("n").contains("Summary:"));
    }
}
