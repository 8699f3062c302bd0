//! Chunking strategies behind the paragraph, QA and parent-child
//! processors.
//!
//! Every produced chunk is a new [`Document`] with a fresh `doc_id` and the
//! hash of its own content; the source document's other metadata is copied.

use crate::document::{content_hash, Document, DOC_HASH, DOC_ID, SCORE};
use crate::error::IngestError;
use crate::gateway::LlmGateway;
use crate::prompts::QA_GENERATION_SYSTEM_PROMPT;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

/// Metadata key linking a child chunk to its parent's `doc_id`.
pub const PARENT_ID: &str = "parent_id";
/// Metadata key carrying the parent's text on a child chunk.
pub const PARENT_CONTENT: &str = "parent_content";
/// Metadata key carrying a generated answer on a QA document.
pub const ANSWER: &str = "answer";

const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", "。", ". ", " ", ""];

// ── Splitter ─────────────────────────────────────────────────────────────

/// Recursive separator splitter measured in characters.
///
/// Text is cut on the first separator that occurs in it; pieces still longer
/// than `chunk_size` are cut again with the next separator. Neighbouring
/// pieces are then packed into chunks of at most `chunk_size`, carrying up
/// to `chunk_overlap` characters of the previous chunk forward.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(500, 50)
    }
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(s.as_str()))
            .map(|(i, s)| (i, s.as_str()))
            .unwrap_or((separators.len(), ""));
        let rest = separators.get(index + 1..).unwrap_or(&[]);

        // Sentence terminators stay attached to the sentence they end.
        let keep = !separator.trim().is_empty();
        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else if keep {
            text.split_inclusive(separator).map(str::to_string).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };
        let separator = if keep { "" } else { separator };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            chunks.extend(self.merge(&pending, separator));
            pending.clear();
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, rest));
            }
        }
        chunks.extend(self.merge(&pending, separator));
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joined = if window.is_empty() { 0 } else { sep_len };
            if !window.is_empty() && total + joined + len > self.chunk_size {
                push_chunk(&mut chunks, &window, separator);
                while !window.is_empty()
                    && (total > self.chunk_overlap
                        || total + sep_len + len > self.chunk_size)
                {
                    if let Some(front) = window.pop_front() {
                        total -= char_len(front);
                        if !window.is_empty() {
                            total -= sep_len;
                        }
                    }
                }
            }
            if !window.is_empty() {
                total += sep_len;
            }
            total += len;
            window.push_back(piece);
        }
        push_chunk(&mut chunks, &window, separator);
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ── Cleaning ─────────────────────────────────────────────────────────────

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\r]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Collapse runs of inline whitespace and of blank lines.
pub fn clean_whitespace(text: &str) -> String {
    let s = RE_INLINE_WS.replace_all(text, " ");
    RE_BLANK_LINES.replace_all(&s, "\n\n").trim().to_string()
}

fn chunk_document(source: &Document, content: String) -> Document {
    let mut metadata = source.metadata.clone();
    metadata.remove(SCORE);
    metadata.insert(DOC_ID.to_string(), Value::String(Uuid::new_v4().to_string()));
    metadata.insert(DOC_HASH.to_string(), Value::String(content_hash(&content)));
    Document {
        page_content: content,
        metadata,
        children: Vec::new(),
    }
}

// ── Paragraph ────────────────────────────────────────────────────────────

/// Clean and split every document into chunks.
pub fn split_documents(documents: &[Document], splitter: &TextSplitter) -> Vec<Document> {
    let mut out = Vec::new();
    for doc in documents {
        for chunk in splitter.split(&clean_whitespace(&doc.page_content)) {
            out.push(chunk_document(doc, chunk));
        }
    }
    debug!("Split {} document(s) into {} chunk(s)", documents.len(), out.len());
    out
}

// ── Question / answer ────────────────────────────────────────────────────

static RE_QA_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([QA])\d+\s*[:：]\s*(.*)$").unwrap());

/// Parse `Q1: ... A1: ...` output into (question, answer) pairs. Lines
/// without a marker continue the current field; a question without an
/// answer is dropped.
pub fn parse_qa_pairs(output: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut question: Option<String> = None;
    let mut answer: Option<String> = None;

    let mut flush = |q: &mut Option<String>, a: &mut Option<String>| {
        if let (Some(q), Some(a)) = (q.take(), a.take()) {
            let (q, a) = (q.trim().to_string(), a.trim().to_string());
            if !q.is_empty() && !a.is_empty() {
                pairs.push((q, a));
            }
        }
    };

    for line in output.lines() {
        if let Some(caps) = RE_QA_LINE.captures(line) {
            let text = caps[2].to_string();
            if &caps[1] == "Q" {
                flush(&mut question, &mut answer);
                question = Some(text);
                answer = None;
            } else if question.is_some() {
                answer = Some(text);
            }
        } else if let Some(a) = answer.as_mut() {
            a.push('\n');
            a.push_str(line);
        } else if let Some(q) = question.as_mut() {
            q.push('\n');
            q.push_str(line);
        }
    }
    flush(&mut question, &mut answer);
    pairs
}

/// Split the documents, then ask the LLM for question/answer pairs per
/// chunk. Each pair becomes a document whose content is the question.
pub async fn qa_documents(
    llm: &dyn LlmGateway,
    documents: &[Document],
    splitter: &TextSplitter,
) -> Result<Vec<Document>, IngestError> {
    let mut out = Vec::new();
    for chunk in split_documents(documents, splitter) {
        let answer = llm
            .complete(QA_GENERATION_SYSTEM_PROMPT, &chunk.page_content)
            .await?;
        let pairs = parse_qa_pairs(&answer);
        if pairs.is_empty() {
            warn!("No question/answer pairs generated for a {} char chunk", chunk.page_content.len());
        }
        for (question, answer) in pairs {
            out.push(chunk_document(&chunk, question).with_metadata(ANSWER, answer));
        }
    }
    Ok(out)
}

// ── Parent / child ───────────────────────────────────────────────────────

/// Parents from `parent_splitter`, each carrying its `children` from
/// `child_splitter`. Children know their parent's id and text.
pub fn parent_child_documents(
    documents: &[Document],
    parent_splitter: &TextSplitter,
    child_splitter: &TextSplitter,
) -> Vec<Document> {
    let mut parents = split_documents(documents, parent_splitter);
    for parent in &mut parents {
        let parent_id = parent.doc_id().unwrap_or_default().to_string();
        parent.children = child_splitter
            .split(&parent.page_content)
            .into_iter()
            .map(|chunk| {
                chunk_document(parent, chunk)
                    .with_metadata(PARENT_ID, parent_id.clone())
                    .with_metadata(PARENT_CONTENT, parent.page_content.clone())
            })
            .collect();
    }
    parents
}

/// All children of `parents`, in order.
pub fn flatten_children(parents: &[Document]) -> Vec<Document> {
    parents.iter().flat_map(|p| p.children.iter().cloned()).collect()
}

/// Replace child hits by their parents, keeping the best score per parent
/// and the order of first appearance.
pub fn collapse_to_parents(hits: Vec<Document>) -> Vec<Document> {
    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, Document> = HashMap::new();

    for hit in hits {
        let Some(parent_id) = hit.metadata.get(PARENT_ID).and_then(Value::as_str).map(str::to_string)
        else {
            let id = hit.doc_id().unwrap_or_default().to_string();
            if !best.contains_key(&id) {
                order.push(id.clone());
                best.insert(id, hit);
            }
            continue;
        };
        let score = hit.score().unwrap_or(0.0);
        let better = best
            .get(&parent_id)
            .map_or(true, |current| score > current.score().unwrap_or(0.0));
        if !better {
            continue;
        }
        let content = hit
            .metadata
            .get(PARENT_CONTENT)
            .and_then(Value::as_str)
            .unwrap_or(hit.page_content.as_str())
            .to_string();
        let mut metadata = hit.metadata.clone();
        metadata.remove(PARENT_ID);
        metadata.remove(PARENT_CONTENT);
        metadata.insert(DOC_ID.to_string(), Value::String(parent_id.clone()));
        metadata.insert(DOC_HASH.to_string(), Value::String(content_hash(&content)));
        if !best.contains_key(&parent_id) {
            order.push(parent_id.clone());
        }
        best.insert(
            parent_id,
            Document {
                page_content: content,
                metadata,
                children: Vec::new(),
            },
        );
    }

    order.into_iter().filter_map(|id| best.remove(&id)).collect()
}
