use crate::error::NormalizationFailure;

const FENCE: &str = "```";

/// Isolates the JSON payload in a model reply.
///
/// Markdown fences (```` ```json ```` or bare ```` ``` ````) and any prose
/// around the payload are dropped. The payload is the balanced `{...}` (or
/// `[...]`) span starting at the first opening bracket.
pub fn normalize(text: &str) -> Result<&str, NormalizationFailure> {
    if let Some(inner) = fenced_block(text) {
        if let Some(json) = balanced_json(inner) {
            return Ok(json);
        }
    }
    balanced_json(text).ok_or(NormalizationFailure)
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];
    // Skip the language tag on the opening fence line.
    let body_start = match after_open.find('\n') {
        Some(newline) => newline + 1,
        None => 0,
    };
    let body = &after_open[body_start..];
    let close = body.find(FENCE).unwrap_or(body.len());
    Some(&body[..close])
}

// The earliest opener decides the payload kind. A truncated payload must not
// degrade into one of its inner fragments, so later openers are never tried.
fn balanced_json(text: &str) -> Option<&str> {
    let start = text.find(&['{', '['][..])?;
    let (open, close) = if text[start..].starts_with('{') {
        ('{', '}')
    } else {
        ('[', ']')
    };
    let end = matching_close(&text[start..], open, close)?;
    Some(text[start..start + end].trim())
}

// Byte length of the balanced span starting at `text[0] == open`.
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{"destination": "Kyoto", "itinerary": [{"day": 1}]}"#;

    #[test]
    fn test_fenced_and_bare_payloads_normalize_identically() {
        let fenced_json = format!("```json\n{}\n```", PAYLOAD);
        let fenced_bare = format!("```\n{}\n```", PAYLOAD);

        assert_eq!(normalize(PAYLOAD), Ok(PAYLOAD));
        assert_eq!(normalize(&fenced_json), normalize(PAYLOAD));
        assert_eq!(normalize(&fenced_bare), normalize(PAYLOAD));
    }

    #[test]
    fn test_surrounding_prose_is_dropped() {
        let text = format!(
            "Sure! Here is your itinerary:\n\n{}\n\nNote: prices may vary by season.",
            PAYLOAD
        );
        assert_eq!(normalize(&text), Ok(PAYLOAD));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_the_scan() {
        let payload = r#"{"title": "Dinner {chef's table}", "note": "quote \" and } inside"}"#;
        let text = format!("Result: {} -- end", payload);
        assert_eq!(normalize(&text), Ok(payload));
    }

    #[test]
    fn test_top_level_array_is_accepted() {
        assert_eq!(normalize("list: [1, 2, 3] done"), Ok("[1, 2, 3]"));
    }

    #[test]
    fn test_unbalanced_or_missing_json_fails() {
        assert_eq!(normalize("I cannot help with that."), Err(NormalizationFailure));
        assert_eq!(normalize(r#"{"itinerary": [{"day": 1}"#), Err(NormalizationFailure));
        assert_eq!(normalize(""), Err(NormalizationFailure));
    }
}
