//! Text cleaning and passage extraction

use regex::Regex;
use std::sync::OnceLock;

const MIN_FRAGMENT_CHARS: usize = 50;
const MIN_PASSAGE_CHARS: usize = 200;
const SENTENCES_PER_PASSAGE: usize = 5;
const MAX_PASSAGES: usize = 20;

fn start_banner() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^.*?\*{3}\s*START OF[^\n]*?\*{3}").expect("start banner pattern"))
}

fn end_banner() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*{3}\s*END OF.*$").expect("end banner pattern"))
}

fn noise_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:\d+[ \t]*|[-=_]{3,}[ \t]*)$").expect("noise line pattern"))
}

fn horizontal_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("whitespace pattern"))
}

fn blank_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("newline pattern"))
}

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence pattern"))
}

/// Strip catalogue boilerplate and layout noise from a downloaded text.
///
/// Everything up to and including a `*** START OF ... ***` banner and
/// everything from an `*** END OF` banner on is dropped. Lines that are only
/// a page number or only a rule of `-`, `=` or `_` are removed, runs of
/// spaces and tabs become one space, and runs of three or more newlines
/// become a single blank line.
pub fn clean_text(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n");
    let text = start_banner().replace(&text, "");
    let text = end_banner().replace(&text, "");
    let text = noise_line().replace_all(&text, "");
    let text = horizontal_run().replace_all(&text, " ");
    let text = blank_run().replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Group the sentences of a cleaned text into reading passages.
///
/// Fragments are trimmed and those of 50 characters or fewer dropped. The
/// rest are joined five at a time. Passages of 200 characters or fewer
/// are dropped and at most 20 are returned.
pub fn extract_passages(content: &str) -> Vec<String> {
    let sentences: Vec<&str> = sentence_break()
        .split(content)
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_FRAGMENT_CHARS)
        .collect();

    sentences
        .chunks(SENTENCES_PER_PASSAGE)
        .map(|chunk| format!("{}.", chunk.join(". ")))
        .filter(|passage| passage.chars().count() > MIN_PASSAGE_CHARS)
        .take(MAX_PASSAGES)
        .collect()
}
