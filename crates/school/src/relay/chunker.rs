/// Content at or below this many characters is sent as-is.
const SHORT_CONTENT: usize = 10;
/// Longest chunk produced when no break character shows up.
const MAX_CHUNK: usize = 15;
/// How far back from a forced cut to look for a break character.
const LOOKBACK: usize = 5;

/// Clause-ending punctuation in both ASCII and full-width forms, plus newline.
pub fn is_break(c: char) -> bool {
    matches!(
        c,
        ',' | '，' | '.' | '。' | '!' | '！' | '?' | '？' | ';' | '；' | ':' | '：' | '\n'
    )
}

/// Split message content into small pieces for progressive rendering.
///
/// Works on chars so multi-byte text is never cut inside a code point.
/// Pieces end on a break character where possible and never exceed
/// fifteen characters. Concatenating the result yields `content` again.
pub fn split_content(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= SHORT_CONTENT {
        return vec![content.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if is_break(chars[i]) && i > start {
            chunks.push(chars[start..=i].iter().collect());
            start = i + 1;
        } else if i + 1 - start >= MAX_CHUNK {
            let window_floor = (i + 1).saturating_sub(LOOKBACK).max(start + 1);
            match (window_floor..=i).rev().find(|&j| is_break(chars[j])) {
                Some(j) => {
                    chunks.push(chars[start..=j].iter().collect());
                    start = j + 1;
                    i = j;
                }
                None => {
                    chunks.push(chars[start..=i].iter().collect());
                    start = i + 1;
                }
            }
        }
        i += 1;
    }

    if start < chars.len() {
        chunks.push(chars[start..].iter().collect());
    }

    if chunks.is_empty() {
        chunks = chars
            .chunks(MAX_CHUNK)
            .map(|piece| piece.iter().collect())
            .collect();
    }

    chunks
}
