use core::fmt::{self, Display};

/// An ordered sequence of path segments, rendered as a JSON Pointer.
///
/// Segments are stored unescaped; `~` and `/` are escaped as `~0`/`~1` only
/// at the pointer boundary, so a key like `a/b` round-trips through
/// [`JsonPath::to_pointer`] and [`JsonPath::parse_pointer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPath(pub Vec<String>);

impl JsonPath {
    /// The empty path addressing the document root.
    pub fn root() -> Self {
        JsonPath(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Render as a JSON Pointer. The root path renders as the empty string,
    /// matching RFC 6901's whole-document pointer.
    pub fn to_pointer(&self) -> String {
        render_pointer(&self.0)
    }

    /// Parse a JSON Pointer into segments, unescaping `~0`/`~1`.
    /// The pointer is normalized first: duplicate and trailing slashes are
    /// dropped and a missing leading slash is tolerated.
    pub fn parse_pointer(pointer: &str) -> Self {
        let normalized = normalize_pointer(pointer);
        if normalized == "/" || normalized.is_empty() {
            return JsonPath::root();
        }
        JsonPath(
            normalized
                .trim_start_matches('/')
                .split('/')
                .map(unescape_segment)
                .collect(),
        )
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pointer())
    }
}

impl From<Vec<String>> for JsonPath {
    fn from(segments: Vec<String>) -> Self {
        JsonPath(segments)
    }
}

impl FromIterator<String> for JsonPath {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        JsonPath(iter.into_iter().collect())
    }
}

/// Render unescaped segments as a pointer string.
pub fn render_pointer(segments: &[String]) -> String {
    if segments.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&escape_segment(segment));
    }
    out
}

/// Escape one segment for embedding in a pointer: `~` -> `~0`, `/` -> `~1`.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Unescape one pointer segment. `~1` must be replaced before `~0` so that
/// `~01` decodes to `~1` (the literal string), not `/`.
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Normalize a raw pointer: trim whitespace, ensure a leading slash,
/// collapse duplicate slashes, drop a trailing slash (unless root).
pub fn normalize_pointer(pointer: &str) -> String {
    let mut clean = pointer.trim().to_string();
    if !clean.starts_with('/') {
        clean.insert(0, '/');
    }
    while clean.contains("//") {
        clean = clean.replace("//", "/");
    }
    if clean.len() > 1 && clean.ends_with('/') {
        clean.pop();
    }
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_empty() {
        assert_eq!(JsonPath::root().to_pointer(), "");
        assert!(JsonPath::parse_pointer("/").is_root());
        assert!(JsonPath::parse_pointer("").is_root());
    }

    #[test]
    fn pointer_round_trip() {
        let path = JsonPath(vec!["a".into(), "b/c".into(), "0".into(), "d~e".into()]);
        let pointer = path.to_pointer();
        assert_eq!(pointer, "/a/b~1c/0/d~0e");
        assert_eq!(JsonPath::parse_pointer(&pointer), path);
    }

    #[test]
    fn unescape_order_matters() {
        // ~01 is the escaped form of the literal "~1".
        assert_eq!(unescape_segment("~01"), "~1");
        assert_eq!(unescape_segment("~1"), "/");
        assert_eq!(unescape_segment("~0"), "~");
    }

    #[test]
    fn normalization_tolerates_sloppy_pointers() {
        assert_eq!(normalize_pointer("a//b/"), "/a/b");
        assert_eq!(normalize_pointer("  /a/b  "), "/a/b");
        assert_eq!(normalize_pointer("/"), "/");
    }

    #[test]
    fn parse_splits_and_unescapes() {
        let path = JsonPath::parse_pointer("/properties/a~1b");
        assert_eq!(path.segments(), ["properties".to_string(), "a/b".to_string()]);
    }
}
