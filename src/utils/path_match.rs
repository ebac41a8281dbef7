//! Ant-style path pattern matching used by the `match` condition operator.
//!
//! Supported wildcards: `?` (one character within a segment), `*` (any run of
//! characters within a segment) and `**` (zero or more whole segments).

/// Returns true when `path` satisfies the ant-style `pattern`.
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = split(pattern);
    let path_segments: Vec<&str> = split(path);
    match_segments(&pattern_segments, &path_segments)
}

fn split(value: &str) -> Vec<&str> {
    value.split('/').filter(|s| !s.is_empty()).collect()
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(&"**") => {
            // `**` may swallow zero or more segments.
            if match_segments(&pattern[1..], path) {
                return true;
            }
            !path.is_empty() && match_segments(pattern, &path[1..])
        }
        Some(segment) => match path.first() {
            Some(actual) if match_segment(segment, actual) => {
                match_segments(&pattern[1..], &path[1..])
            }
            _ => false,
        },
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let segment: Vec<char> = segment.chars().collect();
    match_chars(&pattern, &segment)
}

fn match_chars(pattern: &[char], segment: &[char]) -> bool {
    match pattern.first() {
        None => segment.is_empty(),
        Some('*') => {
            if match_chars(&pattern[1..], segment) {
                return true;
            }
            !segment.is_empty() && match_chars(pattern, &segment[1..])
        }
        Some('?') => !segment.is_empty() && match_chars(&pattern[1..], &segment[1..]),
        Some(c) => segment.first() == Some(c) && match_chars(&pattern[1..], &segment[1..]),
    }
}
