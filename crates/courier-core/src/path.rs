use crate::error::PathError;

// Hierarchical document keys: /a/b/c. Equality is byte-exact after
// canonicalisation; prefix tests are plain string prefix, callers append
// a trailing / where segment alignment matters.

/// Canonicalise a path: leading slash, collapse repeated slashes, strip the
/// trailing slash (except root). Rejects empty paths and `.`/`..` segments.
pub fn canonicalize(path: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(path.len() + 1);
    let mut any = false;
    for segment in path.split('/') {
        if segment.is_empty() {
            continue;
        }
        if segment == "." || segment == ".." {
            return Err(PathError::InvalidSegment(segment.to_string()));
        }
        out.push('/');
        out.push_str(segment);
        any = true;
    }
    if !any {
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        // Input was all slashes: root.
        return Ok("/".to_string());
    }
    Ok(out)
}

/// Join segments into a canonical path: `join(&["messages", name])`.
pub fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for part in parts {
        for segment in part.split('/') {
            if segment.is_empty() {
                continue;
            }
            out.push('/');
            out.push_str(segment);
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

pub fn first_segment(path: &str) -> Option<&str> {
    path.trim_start_matches('/').split('/').find(|s| !s.is_empty())
}

pub fn last_segment(path: &str) -> Option<&str> {
    path.rsplit('/').find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("/a/b/c").unwrap(), "/a/b/c");
        assert_eq!(canonicalize("a/b/c").unwrap(), "/a/b/c");
        assert_eq!(canonicalize("/a//b/").unwrap(), "/a/b");
        assert_eq!(canonicalize("/").unwrap(), "/");
        assert_eq!(canonicalize("///").unwrap(), "/");
    }

    #[test]
    fn test_canonicalize_rejects() {
        assert!(canonicalize("").is_err());
        assert!(canonicalize("/a/./b").is_err());
        assert!(canonicalize("/a/../b").is_err());
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["messages", "abc"]), "/messages/abc");
        assert_eq!(join(&["disco", "a", "b", "offer"]), "/disco/a/b/offer");
        assert_eq!(join(&["/sigchain/", "x"]), "/sigchain/x");
        assert_eq!(join(&[]), "/");
    }

    #[test]
    fn test_segments() {
        assert_eq!(first_segment("/messages/abc"), Some("messages"));
        assert_eq!(last_segment("/messages/abc"), Some("abc"));
        assert_eq!(first_segment("/"), None);
    }

    #[test]
    fn test_prefix_is_textual() {
        // /a/b is a string prefix of /a/bc; segment alignment is the
        // caller's concern.
        let a = canonicalize("/a/b").unwrap();
        let b = canonicalize("/a/bc").unwrap();
        assert!(b.starts_with(&a));
        assert!(!b.starts_with(&format!("{}/", a)));
    }
}
