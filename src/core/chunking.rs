use crate::domain::model::{ExtractedDocument, TextChunk};
use regex::Regex;
use std::sync::OnceLock;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// CRLF → LF、去行尾空白、連續空行壓成一行
pub fn normalize_text(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"));

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed_lines = unified
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    blank_runs
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

/// 切成不超過 max_chars 的段落；優先段落邊界，其次換行、空白，最後硬切
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    split_recursive(text, max_chars.max(1), &SEPARATORS, &mut out);
    out
}

fn split_recursive(text: &str, max_chars: usize, separators: &[&str], out: &mut Vec<String>) {
    if text.chars().count() <= max_chars {
        push_piece(text, out);
        return;
    }

    let Some((separator, finer)) = separators.split_first() else {
        hard_split(text, max_chars, out);
        return;
    };
    let separator_len = separator.chars().count();

    let mut current = String::new();
    let mut current_len = 0usize;

    for part in text.split(separator) {
        let part_len = part.chars().count();
        let joined_len = if current.is_empty() {
            part_len
        } else {
            current_len + separator_len + part_len
        };

        if joined_len <= max_chars {
            if !current.is_empty() {
                current.push_str(separator);
            }
            current.push_str(part);
            current_len = joined_len;
            continue;
        }

        push_piece(&current, out);
        current.clear();
        current_len = 0;

        if part_len <= max_chars {
            current.push_str(part);
            current_len = part_len;
        } else {
            split_recursive(part, max_chars, finer, out);
        }
    }

    push_piece(&current, out);
}

fn hard_split(text: &str, max_chars: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    for window in chars.chunks(max_chars) {
        push_piece(&window.iter().collect::<String>(), out);
    }
}

fn push_piece(piece: &str, out: &mut Vec<String>) {
    let trimmed = piece.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub chunks: Vec<TextChunk>,
    pub dropped: usize,
}

/// 依文件順序產生 chunk，總數超過上限的部分丟棄並回報數量
pub fn plan_chunks(
    documents: &[ExtractedDocument],
    chunk_chars: usize,
    max_chunks: usize,
) -> ChunkPlan {
    let mut chunks = Vec::new();
    let mut dropped = 0usize;

    for document in documents.iter().filter(|d| !d.is_placeholder()) {
        let pieces = split_text(&normalize_text(&document.text), chunk_chars);
        let total = pieces.len();

        for (index, text) in pieces.into_iter().enumerate() {
            if chunks.len() >= max_chunks {
                dropped += 1;
                continue;
            }
            chunks.push(TextChunk {
                source: document.name.clone(),
                index: index + 1,
                total,
                text,
            });
        }
    }

    ChunkPlan { chunks, dropped }
}
