//! Path helpers shared by the tree store implementations.

/// Characters a Firebase key may not contain.
const FORBIDDEN_KEY_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// Join path segments with `/`, dropping empty segments and stray separators.
pub fn join(segments: &[&str]) -> String {
    segments
        .iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Check that `key` can be used as a single path segment.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.chars().any(|c| FORBIDDEN_KEY_CHARS.contains(&c) || c.is_control())
}
