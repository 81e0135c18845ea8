//! Prompt templates and prompt-size estimation.
//!
//! Prompts are sent whole. The combine and Q&A prompts grow with the document, so every prompt
//! is measured before it is sent and oversized ones are logged at `warn` level. Nothing is
//! truncated or split.

use std::sync::Arc;
use tiktoken_rs::cl100k_base;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const CHUNK_SUMMARY_PREAMBLE: &str = "You are a highly skilled AI model tasked with summarizing text. \
Please summarize the following chunk of text concisely, highlighting the most critical information:\n\n";

const COMBINE_PREAMBLE: &str = "You are an expert summarizer. \
Combine the key points from the provided summaries into a cohesive summary:\n\n";

const QUESTION_PREAMBLE: &str =
    "You are a knowledgeable AI assistant with access to the following document content:\n\n";

const QUESTION_INSTRUCTION: &str = "\n\nAnswer the following question based only on the document:\n";

/// Prompt asking for a concise summary of one chunk.
pub(crate) fn chunk_summary_prompt(chunk: &str) -> String {
    format!("{CHUNK_SUMMARY_PREAMBLE}{chunk}")
}

/// Prompt merging per-chunk summaries; summaries are joined with newlines.
pub(crate) fn combine_prompt(summaries: &[String]) -> String {
    format!("{COMBINE_PREAMBLE}{}", summaries.join("\n"))
}

/// Prompt answering `question` from the full document text.
pub(crate) fn question_prompt(document: &str, question: &str) -> String {
    format!("{QUESTION_PREAMBLE}{document}{QUESTION_INSTRUCTION}{question}")
}

/// Estimates prompt tokens and flags prompts larger than the model's context window.
#[derive(Clone)]
pub(crate) struct PromptBudget {
    context_window: usize,
    counter: TokenCounter,
}

impl PromptBudget {
    /// Use the `cl100k_base` encoding, falling back to whitespace counting when unavailable.
    pub(crate) fn new(context_window: usize) -> Self {
        let counter = match cl100k_base() {
            Ok(encoding) => {
                let encoding = Arc::new(encoding);
                Arc::new(move |text: &str| encoding.encode_ordinary(text).len()) as TokenCounter
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Tokenizer unavailable; falling back to whitespace counter"
                );
                whitespace_counter()
            }
        };
        Self {
            context_window,
            counter,
        }
    }

    #[cfg(test)]
    fn with_counter(context_window: usize, counter: TokenCounter) -> Self {
        Self {
            context_window,
            counter,
        }
    }

    /// Estimate the prompt's token count, warning when it exceeds the context window.
    pub(crate) fn check(&self, stage: &'static str, prompt: &str) -> usize {
        let tokens = self.counter.as_ref()(prompt);
        if tokens > self.context_window {
            tracing::warn!(
                stage,
                tokens,
                context_window = self.context_window,
                "Prompt exceeds the model context window; sending unmodified"
            );
        } else {
            tracing::trace!(stage, tokens, "Prompt size estimated");
        }
        tokens
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|text: &str| {
        let tokens = text.split_whitespace().count();
        if tokens == 0 && !text.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_prompt_embeds_text_after_instructions() {
        let prompt = chunk_summary_prompt("Quarterly revenue grew.");
        assert!(prompt.starts_with(
            "You are a highly skilled AI model tasked with summarizing text. Please summarize"
        ));
        assert!(prompt.ends_with("critical information:\n\nQuarterly revenue grew."));
    }

    #[test]
    fn combine_prompt_joins_summaries_with_newlines() {
        let prompt = combine_prompt(&["first".into(), "second".into()]);
        assert_eq!(
            prompt,
            "You are an expert summarizer. Combine the key points from the provided summaries into a cohesive summary:\n\nfirst\nsecond"
        );
    }

    #[test]
    fn question_prompt_places_document_before_question() {
        let prompt = question_prompt("DOC {question}", "What?");
        assert_eq!(
            prompt,
            "You are a knowledgeable AI assistant with access to the following document content:\n\nDOC {question}\n\nAnswer the following question based only on the document:\nWhat?"
        );
    }

    #[test]
    fn budget_counts_tokens() {
        let budget = PromptBudget::with_counter(3, whitespace_counter());
        assert_eq!(budget.check("test", "one two"), 2);
        assert_eq!(budget.check("test", "one two three four"), 4);
    }

    #[test]
    fn tiktoken_budget_counts_something() {
        let budget = PromptBudget::new(32_768);
        assert!(budget.check("test", "The quick brown fox jumps over the lazy dog.") > 0);
    }
}
