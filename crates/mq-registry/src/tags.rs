// tags.rs — Parsing of raw tag strings.

use std::collections::HashSet;

/// A stretch of the raw string, either inside double quotes or not.
enum Piece<'a> {
    Quoted(&'a str),
    Loose(&'a str),
}

fn pieces(raw: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('"') else {
            break;
        };
        out.push(Piece::Loose(&rest[..open]));
        out.push(Piece::Quoted(&after[..close]));
        rest = &after[close + 1..];
    }
    // An unterminated quote is read as plain text.
    out.push(Piece::Loose(rest));
    out
}

/// Split a raw tag string into a clean list.
///
/// Double-quoted text is always one tag. Outside quotes the string is
/// comma-delimited when it contains a comma, otherwise whitespace-delimited.
/// Tags are trimmed, empty ones dropped, and duplicates removed
/// case-insensitively; the first spelling seen wins and first-seen order is
/// kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let pieces = pieces(raw);
    let comma_delimited = pieces
        .iter()
        .any(|p| matches!(p, Piece::Loose(text) if text.contains(',')));

    let mut tags: Vec<&str> = Vec::new();
    for piece in &pieces {
        match piece {
            Piece::Quoted(tag) => tags.push(tag),
            Piece::Loose(text) if comma_delimited => tags.extend(text.split(',')),
            Piece::Loose(text) => tags.extend(text.split_whitespace()),
        }
    }

    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().trim_matches('"'))
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Render a tag list back into its canonical raw form. Tags holding a comma
/// or whitespace are quoted so `parse_tags` reads them back whole.
pub fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| {
            if tag.contains(',') || tag.contains(char::is_whitespace) {
                format!("\"{}\"", tag)
            } else {
                tag.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
