use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::IngestError;
use regex::Regex;

const ABBREVIATIONS: [&str; 30] = [
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "cf", "fig",
    "figs", "no", "nos", "vol", "pp", "ch", "sec", "approx", "dept", "inc", "ltd", "co", "corp",
    "al", "ca", "u.s",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule-based sentence boundary detection for English prose.
///
/// A candidate boundary is a run of `.`, `!` or `?` (plus any closing quotes
/// or brackets) followed by whitespace. It is rejected when the next word
/// starts lowercase, or when the token before it is an abbreviation or a
/// single-letter initial.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    terminator: Regex,
    abbreviations: Vec<String>,
}

impl SentenceSplitter {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_abbreviations(std::iter::empty::<String>())
    }

    pub fn with_abbreviations<I, S>(extra: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut abbreviations: Vec<String> = ABBREVIATIONS.iter().map(|a| a.to_string()).collect();
        abbreviations.extend(extra.into_iter().map(|abbreviation| {
            let abbreviation: String = abbreviation.into();
            abbreviation.trim_end_matches('.').to_lowercase()
        }));

        Ok(Self {
            terminator: Regex::new(r#"[.!?]+["'’”)\]]*\s+"#)?,
            abbreviations,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in self.terminator.find_iter(text) {
            let before = &text[start..boundary.start()];
            let after = &text[boundary.end()..];
            if !self.is_boundary(before, after) {
                continue;
            }

            let sentence = text[start..boundary.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = boundary.end();
        }

        let tail = text[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }

    fn is_boundary(&self, before: &str, after: &str) -> bool {
        if after.chars().next().is_some_and(char::is_lowercase) {
            return false;
        }

        let last_token = before
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .trim_start_matches(|ch: char| matches!(ch, '(' | '[' | '"' | '\'' | '“' | '‘'))
            .to_lowercase();

        if last_token.chars().count() == 1 && last_token.chars().all(char::is_alphabetic) {
            return false;
        }

        !self.abbreviations.iter().any(|abbr| *abbr == last_token)
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    splitter: SentenceSplitter,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        Self::with_splitter(config, SentenceSplitter::new()?)
    }

    pub fn with_splitter(
        config: ChunkingConfig,
        splitter: SentenceSplitter,
    ) -> Result<Self, IngestError> {
        if config.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { splitter, config })
    }

    pub fn chunk_size(&self) -> usize {
        self.config.chunk_size
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.splitter
            .split(text)
            .chunks(self.config.chunk_size)
            .map(|group| group.join(" "))
            .collect()
    }
}
