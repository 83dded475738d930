//! Line-oriented formatter for message text.
//!
//! Turns the backend's markdown-ish response into block nodes. This is a
//! deliberately small dialect: fenced code, `-`/`N.` lists, inline base64
//! chart images, and `**strong**`, `*emphasis*`, `` `code` `` spans.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static IMAGE_ALT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[(.*?)\]").unwrap());
static IMAGE_SRC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\]\((.*?)\)").unwrap());
static BULLET_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^- (.*)$").unwrap());
static NUMBERED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\. (.*)$").unwrap());

const DEFAULT_IMAGE_ALT: &str = "Chart";
const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    /// Strong and emphasis spans may contain further spans; code spans never do.
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Code(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Paragraph(Vec<Inline>),
    List(Vec<Vec<Inline>>),
    /// Verbatim fenced content, one trailing newline per line.
    Code(String),
    Image { alt: String, src: String },
}

/// Convert message text into blocks, preserving line order.
///
/// An opening fence with no closing fence swallows the rest of the message:
/// its content is never emitted.
pub fn render_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut list: Vec<Vec<Inline>> = Vec::new();
    let mut in_code = false;
    let mut code = String::new();

    for line in text.split('\n') {
        let trimmed = line.trim();

        if in_code {
            if trimmed.starts_with(FENCE) {
                in_code = false;
                blocks.push(Block::Code(std::mem::take(&mut code)));
            } else {
                code.push_str(line);
                code.push('\n');
            }
            continue;
        }

        if trimmed.starts_with(FENCE) {
            flush_list(&mut list, &mut blocks);
            in_code = true;
            code.clear();
            continue;
        }

        if is_image_line(line) {
            flush_list(&mut list, &mut blocks);
            if let Some(image) = parse_image_line(line) {
                blocks.push(image);
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        if let Some(item) = list_item(line) {
            list.push(parse_inline(item));
            continue;
        }

        flush_list(&mut list, &mut blocks);
        blocks.push(Block::Paragraph(parse_inline(line)));
    }

    flush_list(&mut list, &mut blocks);
    blocks
}

fn flush_list(list: &mut Vec<Vec<Inline>>, blocks: &mut Vec<Block>) {
    if !list.is_empty() {
        blocks.push(Block::List(std::mem::take(list)));
    }
}

fn is_image_line(line: &str) -> bool {
    line.trim().starts_with("![") && line.contains("](data:image")
}

fn parse_image_line(line: &str) -> Option<Block> {
    let src = IMAGE_SRC.captures(line)?.get(1)?.as_str().to_string();
    let alt = IMAGE_ALT
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|alt| !alt.is_empty())
        .unwrap_or(DEFAULT_IMAGE_ALT)
        .to_string();
    Some(Block::Image { alt, src })
}

/// The item text when `line` starts with a `- ` or `N. ` marker.
fn list_item(line: &str) -> Option<&str> {
    BULLET_ITEM
        .captures(line)
        .or_else(|| NUMBERED_ITEM.captures(line))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Split a line into plain text and `**strong**` / `*emphasis*` / `` `code` `` spans.
/// Unclosed markers are kept as literal text.
pub fn parse_inline(text: &str) -> Vec<Inline> {
    let mut spans = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some((span, remaining)) = take_delimited(rest) {
            if !plain.is_empty() {
                spans.push(Inline::Text(std::mem::take(&mut plain)));
            }
            spans.push(span);
            rest = remaining;
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    if !plain.is_empty() {
        spans.push(Inline::Text(plain));
    }
    spans
}

fn take_delimited(rest: &str) -> Option<(Inline, &str)> {
    if let Some(after) = rest.strip_prefix("**") {
        if let Some(end) = after.find("**").filter(|&end| end > 0) {
            return Some((Inline::Strong(parse_inline(&after[..end])), &after[end + 2..]));
        }
    }
    if let Some(after) = rest.strip_prefix('*') {
        if let Some(end) = after.find('*').filter(|&end| end > 0) {
            return Some((Inline::Emphasis(parse_inline(&after[..end])), &after[end + 1..]));
        }
    }
    if let Some(after) = rest.strip_prefix('`') {
        if let Some(end) = after.find('`').filter(|&end| end > 0) {
            return Some((Inline::Code(after[..end].to_string()), &after[end + 1..]));
        }
    }
    None
}
