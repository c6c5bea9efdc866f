// Path and property-name helpers shared by the store and the fs adapter.

/// Normalize a request path into the key used by the property store.
///
/// Always absolute, `/` separated, no empty segments and no trailing
/// slash, except for the root itself which is `/`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Is `path` equal to `base`, or somewhere below it. Both normalized.
pub fn is_same_or_below(path: &str, base: &str) -> bool {
    if base == "/" {
        return true;
    }
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Property name in Clark notation: `{namespace}name`.
pub fn clark_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{{{}}}{}", ns, name),
        _ => name.to_string(),
    }
}

/// Split a Clark notation name back into (namespace, name).
pub fn parse_clark(clark: &str) -> (Option<String>, String) {
    if let Some(rest) = clark.strip_prefix('{') {
        if let Some((ns, name)) = rest.split_once('}') {
            return (Some(ns.to_string()), name.to_string());
        }
    }
    (None, clark.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/dir/"), "/dir");
        assert_eq!(normalize_path("dir//file.txt"), "/dir/file.txt");
    }

    #[test]
    fn test_same_or_below() {
        assert!(is_same_or_below("/a", "/a"));
        assert!(is_same_or_below("/a/b/c", "/a"));
        assert!(!is_same_or_below("/ab", "/a"));
        assert!(is_same_or_below("/anything", "/"));
    }

    #[test]
    fn test_clark() {
        let name = clark_name(Some("http://example.com/ns"), "color");
        assert_eq!(name, "{http://example.com/ns}color");
        assert_eq!(
            parse_clark(&name),
            (Some("http://example.com/ns".to_string()), "color".to_string())
        );
        assert_eq!(clark_name(None, "color"), "color");
        assert_eq!(parse_clark("color"), (None, "color".to_string()));
    }
}
