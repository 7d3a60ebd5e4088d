use anyhow::{Context, Result};
use futures_util::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub mod llm;
pub mod prompts;

use llm::CompletionApi;
use prompts::PromptSet;

/// Split `text` into chunks of roughly `budget` characters, breaking on
/// spaces and pulling each break back to the last sentence boundary so chunks
/// end on complete sentences where possible. A partial sentence carries over
/// into the next chunk; no words are lost or duplicated.
pub fn split_into_chunks(text: &str, budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for token in text.split(' ') {
        if current.len() + token.len() <= budget {
            current.push_str(token);
            current.push(' ');
            continue;
        }

        let (finished, carry) = match current.rfind('.') {
            Some(idx) => (
                current[..=idx].trim().to_string(),
                current[idx + 1..].trim().to_string(),
            ),
            // No sentence boundary to break at: emit the whole buffer.
            None => (current.trim().to_string(), String::new()),
        };

        if !finished.is_empty() {
            chunks.push(finished);
        }

        current = if carry.is_empty() {
            format!("{token} ")
        } else {
            format!("{carry} {token} ")
        };
    }

    let tail = current.trim();
    if !tail.is_empty() {
        chunks.push(tail.to_string());
    }

    chunks
}

/// The two sections a correction response is expected to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Transcript,
    Notes,
}

/// Extract one section from a correction response. The corrected transcript
/// is everything before the first line starting with `NOTES:`; the notes are
/// everything after it. Marker lines and empty lines are dropped.
pub fn extract_block(text: &str, block: Block) -> String {
    let mut collected = Vec::new();
    let mut in_block = block == Block::Transcript;

    for line in text.lines() {
        if line.starts_with("NOTES:") {
            match block {
                Block::Transcript => break,
                Block::Notes => {
                    in_block = true;
                    continue;
                }
            }
        }
        if in_block && !line.is_empty() {
            collected.push(line);
        }
    }

    collected.join("\n")
}

/// The assembled output: corrected transcript blocks, the notes collected
/// from every chunk, and a closing summary of those notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalDocument {
    pub transcripts: Vec<String>,
    pub notes: Vec<String>,
    pub summary: String,
}

impl FinalDocument {
    /// Render to the on-disk format: each transcript block, then the notes
    /// under a `NOTES:` heading, then the summary under `SUMMARY:`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.transcripts {
            out.push_str(block);
            out.push_str("\n\n");
        }
        out.push_str("NOTES:\n");
        out.push_str(&self.notes.join("\n"));
        out.push_str("\n\nSUMMARY:\n\n");
        out.push_str(&self.summary);
        out
    }
}

/// Correction pipeline: splits the combined transcript into sentence-aligned
/// chunks, sends each through the completion service concurrently, and
/// assembles the final document from the responses.
pub struct CorrectionPipeline {
    completion: Arc<dyn CompletionApi>,
    prompts: PromptSet,
    char_budget: usize,
    limiter: Arc<Semaphore>,
    quiet: bool,
}

impl CorrectionPipeline {
    pub fn new(
        completion: Arc<dyn CompletionApi>,
        prompts: PromptSet,
        char_budget: usize,
        limiter: Arc<Semaphore>,
        quiet: bool,
    ) -> Self {
        Self { completion, prompts, char_budget, limiter, quiet }
    }

    pub async fn run(&self, combined: &str) -> Result<FinalDocument> {
        let chunks = split_into_chunks(combined, self.char_budget);
        tracing::info!("Correcting transcript in {} chunks", chunks.len());

        let progress = if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(chunks.len() as u64)
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
        );
        progress.set_message("Correcting chunks...");

        let tasks = chunks
            .iter()
            .enumerate()
            .map(|(idx, chunk)| self.correct_chunk(idx + 1, chunk, &progress));
        let corrected = join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        progress.finish_with_message("Correction complete");

        let transcripts = corrected
            .iter()
            .map(|response| extract_block(response, Block::Transcript))
            .collect();
        let notes: Vec<String> = corrected
            .iter()
            .map(|response| extract_block(response, Block::Notes))
            .collect();

        tracing::info!("Summarizing correction notes");
        let summary = self
            .completion
            .complete(self.prompts.summary_prompt(&notes.join("\n")))
            .await
            .context("summary generation failed")?;

        Ok(FinalDocument { transcripts, notes, summary })
    }

    async fn correct_chunk(
        &self,
        index: usize,
        chunk: &str,
        progress: &ProgressBar,
    ) -> Result<String> {
        let _permit = self.limiter.acquire().await?;

        tracing::info!("Requesting correction for chunk {}", index);
        let corrected = self
            .completion
            .complete(self.prompts.correction_prompt(chunk))
            .await
            .with_context(|| format!("correction failed for chunk {index}"))?;

        progress.inc(1);

        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::MockCompletionApi;

    #[test]
    fn splits_on_sentence_boundaries() {
        let chunks = split_into_chunks("First sentence. Second sentence continues here.", 20);
        assert_eq!(
            chunks,
            vec!["First sentence.", "Second sentence", "continues here."]
        );
    }

    #[test]
    fn partial_sentence_carries_into_the_next_chunk() {
        let chunks = split_into_chunks("alpha beta. gamma delta. epsilon zeta.", 30);
        assert_eq!(chunks, vec!["alpha beta. gamma delta.", "epsilon zeta."]);
    }

    #[test]
    fn text_without_periods_still_splits_cleanly() {
        let chunks = split_into_chunks("one two three four five six", 10);
        assert_eq!(chunks, vec!["one two", "three four", "five six"]);
    }

    #[test]
    fn no_words_are_lost_or_duplicated() {
        for text in [
            "First sentence. Second sentence continues here.",
            "a stream of words with no punctuation at all going on and on",
            "short. tiny. mini. wee.",
        ] {
            let chunks = split_into_chunks(text, 15);
            let rejoined: Vec<&str> = chunks
                .iter()
                .flat_map(|chunk| chunk.split_whitespace())
                .collect();
            let original: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(rejoined, original, "token mismatch for {text:?}");
        }
    }

    #[test]
    fn oversized_token_becomes_its_own_chunk() {
        let chunks = split_into_chunks("supercalifragilistic", 5);
        assert_eq!(chunks, vec!["supercalifragilistic"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert_eq!(split_into_chunks("", 100), Vec::<String>::new());
    }

    #[test]
    fn extracts_transcript_and_notes_sections() {
        let response = "Line one.\nLine two.\n\nNOTES:\n- note a\n\n- note b";
        assert_eq!(
            extract_block(response, Block::Transcript),
            "Line one.\nLine two."
        );
        assert_eq!(extract_block(response, Block::Notes), "- note a\n- note b");
    }

    #[test]
    fn response_without_marker_is_all_transcript() {
        let response = "Just corrected text.\nNothing else.";
        assert_eq!(extract_block(response, Block::Transcript), response);
        assert_eq!(extract_block(response, Block::Notes), "");
    }

    #[test]
    fn repeated_marker_lines_are_dropped_from_notes() {
        let response = "text\nNOTES:\n- a\nNOTES: stray\n- b";
        assert_eq!(extract_block(response, Block::Transcript), "text");
        assert_eq!(extract_block(response, Block::Notes), "- a\n- b");
    }

    #[test]
    fn marker_on_first_line_means_empty_transcript() {
        let response = "NOTES:\n- only notes";
        assert_eq!(extract_block(response, Block::Transcript), "");
        assert_eq!(extract_block(response, Block::Notes), "- only notes");
    }

    #[test]
    fn renders_the_final_document_layout() {
        let document = FinalDocument {
            transcripts: vec!["A.".to_string(), "B.".to_string()],
            notes: vec!["- n1".to_string(), "- n2".to_string()],
            summary: "Sum.".to_string(),
        };
        assert_eq!(
            document.render(),
            "A.\n\nB.\n\nNOTES:\n- n1\n- n2\n\nSUMMARY:\n\nSum."
        );
    }

    fn scripted_api() -> MockCompletionApi {
        let mut api = MockCompletionApi::new();
        api.expect_complete().returning(|prompt| {
            if let Some(notes) = prompt.strip_prefix("SUM:") {
                Ok(format!("summary[{}]", notes.lines().count()))
            } else if let Some(chunk) = prompt.strip_prefix("FIX:") {
                Ok(format!(
                    "{}\nNOTES:\n- reviewed {} chars",
                    chunk.to_uppercase(),
                    chunk.len()
                ))
            } else {
                panic!("unexpected prompt: {prompt}");
            }
        });
        api
    }

    #[tokio::test]
    async fn corrects_chunks_and_assembles_the_document() {
        let prompts =
            PromptSet::from_templates("FIX:<<TRANSCRIPT>>", "SUM:<<NOTES>>").unwrap();
        let pipeline = CorrectionPipeline::new(
            Arc::new(scripted_api()),
            prompts,
            30,
            Arc::new(Semaphore::new(2)),
            true,
        );

        let document = pipeline
            .run("alpha beta. gamma delta. epsilon zeta.")
            .await
            .unwrap();

        assert_eq!(
            document.transcripts,
            vec![
                "ALPHA BETA. GAMMA DELTA.".to_string(),
                "EPSILON ZETA.".to_string()
            ]
        );
        assert_eq!(
            document.notes,
            vec![
                "- reviewed 24 chars".to_string(),
                "- reviewed 13 chars".to_string()
            ]
        );
        assert_eq!(document.summary, "summary[2]");
    }

    #[tokio::test]
    async fn failed_correction_surfaces_the_chunk() {
        let prompts =
            PromptSet::from_templates("FIX:<<TRANSCRIPT>>", "SUM:<<NOTES>>").unwrap();
        let mut api = MockCompletionApi::new();
        api.expect_complete()
            .returning(|_| Err(anyhow::anyhow!("service down")));

        let pipeline = CorrectionPipeline::new(
            Arc::new(api),
            prompts,
            100,
            Arc::new(Semaphore::new(2)),
            true,
        );

        let err = pipeline.run("some words to correct.").await.unwrap_err();
        assert!(err.to_string().contains("correction failed for chunk 1"));
    }
}
