//! Structured-document path addressing.
//!
//! Logical paths into a `JSON` column are written as `__`-separated
//! segments (`things__a__0___1`). [`walk`] turns them into the MySQL JSON
//! path syntax (`$.things.a[0]."1"`) used both by generated column
//! definitions and by predicates against un-extracted paths.

/// Separator between logical path segments, also used to name generated columns.
pub const SEPARATOR: &str = "__";

/// Marker that forces a segment to be treated as a quoted key.
pub const KEY_MARKER: char = '_';

/// Splits a logical path into its segments.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).collect()
}

/// Array index named by `segment`: an optional `-` followed by ASCII digits.
#[must_use]
pub fn index(segment: &str) -> Option<i64> {
    let digits = segment.strip_prefix('-').unwrap_or(segment);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Compiles a `__`-separated path into a JSON path address.
#[must_use]
pub fn walk(path: &str) -> String {
    walk_segments(&segments(path))
}

/// Compiles already split segments into a JSON path address.
#[must_use]
pub fn walk_segments<S: AsRef<str>>(segments: &[S]) -> String {
    let mut address = String::from("$");

    for segment in segments {
        let segment = segment.as_ref();
        if index(segment).is_some() {
            address.push_str(&format!("[{segment}]"));
        } else if let Some(key) = segment.strip_prefix(KEY_MARKER) {
            address.push_str(&format!(".\"{key}\""));
        } else {
            address.push('.');
            address.push_str(segment);
        }
    }

    address
}

/// Name of the generated column materializing `path` out of `store`.
#[must_use]
pub fn extract_store(store: &str, path: &str) -> String {
    format!("{store}{SEPARATOR}{path}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk() {
        assert_eq!(walk("a__b__0___1"), "$.a.b[0].\"1\"");
    }

    #[test]
    fn test_walk_negative_index() {
        assert_eq!(walk("stuff__-1__name"), "$.stuff[-1].name");
    }

    #[test]
    fn test_walk_signed_key_is_not_index() {
        assert_eq!(walk("a__+5"), "$.a.+5");
        assert_eq!(walk("a__-"), "$.a.-");
        assert_eq!(walk("a__1e3"), "$.a.1e3");
    }

    #[test]
    fn test_index() {
        assert_eq!(index("0"), Some(0));
        assert_eq!(index("-12"), Some(-12));
        assert_eq!(index("+5"), None);
        assert_eq!(index(""), None);
        assert_eq!(index(" 1"), None);
    }

    #[test]
    fn test_walk_single_segment() {
        assert_eq!(walk("address"), "$.address");
        assert_eq!(walk("_4"), "$.\"4\"");
    }

    #[test]
    fn test_walk_segments_matches_walk() {
        assert_eq!(walk_segments(&["for", "0", "_1"]), walk("for__0___1"));
    }

    #[test]
    fn test_extract_store() {
        assert_eq!(extract_store("ip", "address"), "ip__address");
    }
}
