//! Format-aware content chunker
//!
//! Splits extracted document text into ordered [`Chunk`]s. Splitting is a
//! pure function of `(format, text)`:
//!
//! - prose (markdown, html, word, plaintext, api specs) splits on paragraph
//!   boundaries, with markdown headings always opening a new chunk; adjacent
//!   paragraphs are merged up to the configured size
//! - code splits on blank-line blocks, and indented blocks stay attached to
//!   the top-level construct above them
//! - pdf splits per page (pages are separated by form feed)
//!
//! Chunk boundaries never overlap, positions start at zero, and empty text
//! produces no chunks.

use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document, DocumentFormat};

/// Page separator in extracted pdf text
pub const PAGE_BREAK: char = '\u{000C}';

/// Separator between merged blocks inside one chunk
pub const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct Chunker {
    max_chunk_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(ChunkingConfig::default().max_chunk_chars)
    }
}

impl Chunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self {
            max_chunk_chars: max_chunk_chars.max(1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_chunk_chars)
    }

    /// Splits `text` into chunks owned by `document`
    pub fn chunk(&self, document: &Document, text: &str) -> Vec<Chunk> {
        self.split(document.format, text)
            .into_iter()
            .enumerate()
            .map(|(position, content)| {
                Chunk::new(document.id, document.format, position as u32, content)
            })
            .collect()
    }

    /// Splits `text` into chunk contents according to `format`
    pub fn split(&self, format: DocumentFormat, text: &str) -> Vec<String> {
        let text = text.replace("\r\n", "\n");
        match format {
            DocumentFormat::Pdf => split_pages(&text),
            DocumentFormat::Code => split_code(&text),
            DocumentFormat::Markdown | DocumentFormat::Html => {
                self.merge(prose_blocks(&text, true))
            }
            DocumentFormat::Word
            | DocumentFormat::Plaintext
            | DocumentFormat::StructuredApiSpec
            | DocumentFormat::Image => self.merge(prose_blocks(&text, false)),
        }
    }

    fn merge(&self, blocks: Vec<Block>) -> Vec<String> {
        let max = self.max_chunk_chars;
        let mut chunks = Vec::new();
        let mut current = String::new();

        for block in blocks {
            if block.heading && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }

            if block.text.len() > max {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(hard_split(&block.text, max));
                continue;
            }

            if !current.is_empty() && current.len() + BLOCK_SEPARATOR.len() + block.text.len() > max
            {
                chunks.push(std::mem::take(&mut current));
            }

            if !current.is_empty() {
                current.push_str(BLOCK_SEPARATOR);
            }
            current.push_str(&block.text);
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

#[derive(Debug)]
struct Block {
    text: String,
    heading: bool,
}

fn split_pages(text: &str) -> Vec<String> {
    text.split(PAGE_BREAK)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(str::to_string)
        .collect()
}

/// Blank-line separated blocks; when `markdown` is set, headings start a new
/// block and fenced code is kept intact
fn prose_blocks(text: &str, markdown: bool) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if markdown && (trimmed.starts_with("```") || trimmed.starts_with("~~~")) {
            in_fence = !in_fence;
            lines.push(line);
            continue;
        }
        if in_fence {
            lines.push(line);
            continue;
        }

        if line.trim().is_empty() {
            flush_block(&mut lines, &mut blocks, markdown);
            continue;
        }

        if markdown && is_heading(trimmed) {
            flush_block(&mut lines, &mut blocks, markdown);
        }
        lines.push(line);
    }
    flush_block(&mut lines, &mut blocks, markdown);

    blocks
}

fn flush_block(lines: &mut Vec<&str>, blocks: &mut Vec<Block>, markdown: bool) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n").trim_end().to_string();
    let heading = markdown && is_heading(text.trim_start());
    lines.clear();
    if !text.trim().is_empty() {
        blocks.push(Block { text, heading });
    }
}

/// ATX heading: one to six `#` followed by whitespace or end of line
fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace)
}

/// Blank-line blocks grouped into top-level constructs
fn split_code(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();

    for block in prose_blocks(text, false) {
        let continues_previous = block
            .text
            .lines()
            .next()
            .map(is_continuation_line)
            .unwrap_or(false);

        match chunks.last_mut() {
            Some(previous) if continues_previous => {
                previous.push_str(BLOCK_SEPARATOR);
                previous.push_str(&block.text);
            }
            _ => chunks.push(block.text),
        }
    }

    chunks
}

/// Indented lines and closing delimiters belong to the construct above
fn is_continuation_line(line: &str) -> bool {
    line.starts_with(' ')
        || line.starts_with('\t')
        || matches!(line.trim_start().chars().next(), Some('}' | ')' | ']'))
        || line.trim() == "end"
}

/// Splits an oversized block at whitespace so no piece exceeds `max` bytes
fn hard_split(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        if remaining.len() <= max {
            pieces.push(remaining.to_string());
            break;
        }

        let mut end = max;
        while !remaining.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = remaining.chars().next().map_or(1, char::len_utf8);
        }

        let split_at = remaining[..end]
            .rfind(char::is_whitespace)
            .filter(|pos| *pos > 0)
            .unwrap_or(end);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    pieces
}
