//! Content extraction: reads an input file and cuts the window described by a
//! [`ReadContentOption`] out of it.

use log::{error, warn};
use regex::Regex;
use std::path::Path;

use crate::config::{ExtractBound, Locator, ReadContentOption};
use crate::encoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

/// A resolved bound: byte position of the located match and its byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    pos: usize,
    match_len: usize,
}

impl Position {
    fn boundary(content: &str, edge: Edge) -> Self {
        let pos = match edge {
            Edge::Start => 0,
            Edge::End => content.len(),
        };
        Self { pos, match_len: 0 }
    }

    fn at(pos: usize) -> Self {
        Self { pos, match_len: 0 }
    }
}

/// Byte offset of the `n`-th character, clamped to the end of `content`.
fn char_offset(content: &str, n: usize) -> usize {
    content.char_indices().nth(n).map(|(i, _)| i).unwrap_or(content.len())
}

/// Byte offsets at which each line starts. Terminators (`\n`, `\r\n`, `\r`) belong
/// to the line they end.
fn line_starts(content: &str) -> Vec<usize> {
    let bytes = content.as_bytes();
    let mut starts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        starts.push(i);
        while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
            i += 1;
        }
        if i < bytes.len() {
            i += if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
        }
    }
    starts
}

fn locate(content: &str, locator: &Locator, edge: Edge) -> Position {
    let boundary = Position::boundary(content, edge);
    match locator {
        Locator::Auto => boundary,
        Locator::Index(idx) => match usize::try_from(*idx) {
            Ok(idx) => Position::at(char_offset(content, idx)),
            Err(_) => boundary,
        },
        Locator::Line(line) => {
            let starts = line_starts(content);
            match usize::try_from(*line) {
                Ok(line) if line >= 1 && line <= starts.len() => Position::at(starts[line - 1]),
                _ => boundary,
            }
        }
        Locator::Exact(needle) => match content.find(needle.as_str()) {
            Some(pos) => Position { pos, match_len: needle.len() },
            None => boundary,
        },
        Locator::Regex(pattern) => match Regex::new(pattern) {
            Ok(re) => match re.find(content) {
                Some(m) => Position { pos: m.start(), match_len: m.len() },
                None => boundary,
            },
            Err(e) => {
                error!("Invalid extract regex '{}': {}", pattern, e);
                boundary
            }
        },
    }
}

fn start_position(content: &str, bound: &ExtractBound) -> usize {
    let found = locate(content, &bound.locator, Edge::Start);
    if bound.include_match {
        found.pos
    } else {
        found.pos + found.match_len
    }
}

fn end_position(content: &str, start_pos: usize, bound: &ExtractBound) -> usize {
    let found = match &bound.locator {
        // Searches only look past the resolved start.
        Locator::Exact(_) | Locator::Regex(_) => {
            let tail = &content[start_pos..];
            let found = locate(tail, &bound.locator, Edge::End);
            Position { pos: start_pos + found.pos, match_len: found.match_len }
        }
        locator => locate(content, locator, Edge::End),
    };
    if bound.include_match {
        found.pos + found.match_len
    } else {
        found.pos
    }
}

/// Cuts the configured window out of already loaded `content`.
///
/// Returns an empty string when the start resolves past the end.
pub fn extract_window(content: &str, option: Option<&ReadContentOption>) -> String {
    let Some(option) = option else {
        return content.to_string();
    };
    if option.start.is_none() && option.end.is_none() {
        return content.to_string();
    }

    let start_pos = option.start.as_ref().map_or(0, |b| start_position(content, b));
    let end_pos = option
        .end
        .as_ref()
        .map_or(content.len(), |b| end_position(content, start_pos, b));

    if start_pos > end_pos {
        warn!("start_pos({}) > end_pos({}), returning empty string.", start_pos, end_pos);
        return String::new();
    }
    content[start_pos..end_pos].to_string()
}

/// Reads `file_path` with `encoding_label` and extracts the configured window.
///
/// Never fails: unreadable or undecodable files are logged and yield an empty string.
pub fn read_content<P: AsRef<Path>>(
    file_path: P,
    option: Option<&ReadContentOption>,
    encoding_label: &str,
) -> String {
    let file_path = file_path.as_ref();
    match encoding::read_to_string(file_path, encoding_label) {
        Ok(content) => extract_window(&content, option),
        Err(e) => {
            error!("Failed to read file {}: {}", file_path.display(), e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Option<ExtractBound>, end: Option<ExtractBound>) -> ReadContentOption {
        ReadContentOption { start, end, encoding: None }
    }

    fn bound(locator: Locator) -> ExtractBound {
        ExtractBound::new(locator, true)
    }

    #[test]
    fn test_no_bounds_returns_everything() {
        assert_eq!(extract_window("abc", None), "abc");
        assert_eq!(extract_window("abc", Some(&window(None, None))), "abc");
    }

    #[test]
    fn test_exact_start_include_match() {
        let text = "header\nBEGIN body END tail";
        let with = window(Some(bound(Locator::Exact("BEGIN".into()))), None);
        assert_eq!(extract_window(text, Some(&with)), "BEGIN body END tail");

        let without = window(
            Some(ExtractBound::new(Locator::Exact("BEGIN".into()), false)),
            None,
        );
        assert_eq!(extract_window(text, Some(&without)), " body END tail");
    }

    #[test]
    fn test_exact_end_include_match() {
        let text = "BEGIN body END tail";
        let with = window(None, Some(bound(Locator::Exact("END".into()))));
        assert_eq!(extract_window(text, Some(&with)), "BEGIN body END");

        let without = window(None, Some(ExtractBound::new(Locator::Exact("END".into()), false)));
        assert_eq!(extract_window(text, Some(&without)), "BEGIN body ");
    }

    #[test]
    fn test_end_is_searched_after_start() {
        let text = "x=1;BEGIN;x=2;";
        let option = window(
            Some(bound(Locator::Exact("BEGIN".into()))),
            Some(bound(Locator::Regex(r"x=\d;".into()))),
        );
        assert_eq!(extract_window(text, Some(&option)), "BEGIN;x=2;");
    }

    #[test]
    fn test_not_found_falls_back_to_boundaries() {
        let text = "abc";
        let option = window(
            Some(bound(Locator::Exact("zzz".into()))),
            Some(bound(Locator::Regex("q+".into()))),
        );
        assert_eq!(extract_window(text, Some(&option)), "abc");
    }

    #[test]
    fn test_index_bounds() {
        let text = "0123456789";
        let option = window(Some(bound(Locator::Index(2))), Some(bound(Locator::Index(5))));
        assert_eq!(extract_window(text, Some(&option)), "234");

        let negative = window(Some(bound(Locator::Index(-3))), Some(bound(Locator::Index(99))));
        assert_eq!(extract_window(text, Some(&negative)), "0123456789");
    }

    #[test]
    fn test_index_counts_characters() {
        let option = window(Some(bound(Locator::Index(1))), Some(bound(Locator::Index(3))));
        assert_eq!(extract_window("äöüß", Some(&option)), "öü");
    }

    #[test]
    fn test_line_bounds() {
        let text = "one\ntwo\r\nthree\nfour";
        let option = window(Some(bound(Locator::Line(2))), Some(bound(Locator::Line(4))));
        assert_eq!(extract_window(text, Some(&option)), "two\r\nthree\n");
    }

    #[test]
    fn test_line_out_of_range_falls_back() {
        let text = "one\ntwo\n";
        let zero = window(Some(bound(Locator::Line(0))), None);
        assert_eq!(extract_window(text, Some(&zero)), text);

        let beyond = window(Some(bound(Locator::Line(1))), Some(bound(Locator::Line(3))));
        assert_eq!(extract_window(text, Some(&beyond)), text);
    }

    #[test]
    fn test_start_line_beyond_count_falls_back() {
        let text = "one\ntwo\nthree";
        let option = window(Some(bound(Locator::Line(9))), Some(bound(Locator::Line(2))));
        assert_eq!(extract_window(text, Some(&option)), "one\n");
    }

    #[test]
    fn test_regex_start_excluding_match() {
        let text = "log\n[section 12]\nbody";
        let option = window(
            Some(ExtractBound::new(Locator::Regex(r"\[section \d+\]\n".into()), false)),
            None,
        );
        assert_eq!(extract_window(text, Some(&option)), "body");

        let including = window(Some(bound(Locator::Regex(r"\[section \d+\]".into()))), None);
        assert_eq!(extract_window(text, Some(&including)), "[section 12]\nbody");
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let text = "0123456789";
        let option = window(Some(bound(Locator::Index(7))), Some(bound(Locator::Index(3))));
        assert_eq!(extract_window(text, Some(&option)), "");

        let lines = window(Some(bound(Locator::Line(3))), Some(bound(Locator::Line(2))));
        assert_eq!(extract_window("a\nb\nc\n", Some(&lines)), "");
    }

    #[test]
    fn test_auto_bounds() {
        let option = window(Some(bound(Locator::Auto)), Some(bound(Locator::Auto)));
        assert_eq!(extract_window("abc", Some(&option)), "abc");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        assert_eq!(read_content("/definitely/not/here.txt", None, "utf-8"), "");
    }
}
