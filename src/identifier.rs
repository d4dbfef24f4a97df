//! Encoding of project/group identifiers for use as a single URL path segment.

use once_cell::sync::Lazy;
use regex::Regex;

static NUMERIC_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("valid regex"));
static ENCODED_TRIPLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("valid regex"));
static PATH_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-_./]+$").expect("valid regex"));

/// Marks `urlencoding` escapes but a URI component keeps literal.
const COMPONENT_MARKS: &[(&str, &str)] = &[
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Encodes an identifier for a URL path segment.
///
/// Numeric IDs are returned trimmed, identifiers that already carry a `%XX`
/// escape are returned unchanged, everything else is percent-encoded
/// (`group/project` becomes `group%2Fproject`). Callers must not pass an
/// empty identifier.
pub fn normalize(id: &str) -> String {
    let trimmed = id.trim();
    if NUMERIC_ID.is_match(trimmed) {
        return trimmed.to_string();
    }
    if ENCODED_TRIPLET.is_match(id) {
        return id.to_string();
    }
    encode_component(trimmed)
}

/// Percent-encodes like a URI component: `A-Z a-z 0-9 - _ . ! ~ * ' ( )` stay literal.
fn encode_component(value: &str) -> String {
    COMPONENT_MARKS
        .iter()
        .fold(urlencoding::encode(value).into_owned(), |encoded, (escape, mark)| {
            encoded.replace(*escape, mark)
        })
}

/// Checks that an identifier is a numeric ID, an encoded path, or a plain path.
pub fn validate(id: &str) -> Result<(), String> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err("identifier must not be empty".to_string());
    }
    if NUMERIC_ID.is_match(trimmed) || ENCODED_TRIPLET.is_match(trimmed) {
        return Ok(());
    }
    let decoded = urlencoding::decode(trimmed)
        .map_err(|_| format!("'{}' is not valid UTF-8 once decoded", trimmed))?;
    if PATH_CHARS.is_match(&decoded) {
        Ok(())
    } else {
        Err(format!(
            "'{}' must be a numeric ID or a path of letters, digits, '-', '_', '.' and '/'",
            trimmed
        ))
    }
}

/// Decoded form of an identifier, used for heuristics that look at path structure.
pub fn decoded(id: &str) -> String {
    urlencoding::decode(id.trim())
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| id.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_ids_are_not_encoded() {
        assert_eq!(normalize("42"), "42");
        assert_eq!(normalize(" 1234 "), "1234");
    }

    #[test]
    fn test_paths_are_encoded() {
        assert_eq!(normalize("my-group/my-project"), "my-group%2Fmy-project");
        assert_eq!(normalize("a/b/c"), "a%2Fb%2Fc");
        assert_eq!(normalize("group"), "group");
    }

    #[test]
    fn test_already_encoded_is_untouched() {
        assert_eq!(normalize("group%2Fproject"), "group%2Fproject");
        assert_eq!(normalize("group%2fproject"), "group%2fproject");
        assert_eq!(normalize(&normalize("x/y")), "x%2Fy");
    }

    #[test]
    fn test_spaces_are_encoded() {
        assert_eq!(normalize("my group"), "my%20group");
    }

    #[test]
    fn test_component_marks_stay_literal() {
        assert_eq!(normalize("team/app(v2)!"), "team%2Fapp(v2)!");
        assert_eq!(normalize("it's*~"), "it's*~");
        assert_eq!(normalize("50%off"), "50%25off");
    }

    #[test]
    fn test_validate() {
        assert!(validate("17").is_ok());
        assert!(validate("group/sub.group/project_1").is_ok());
        assert!(validate("group%2Fproject").is_ok());
        assert!(validate("").is_err());
        assert!(validate("   ").is_err());
        assert!(validate("group/pro ject").is_err());
        assert!(validate("group?x=1").is_err());
    }

    #[test]
    fn test_decoded() {
        assert_eq!(decoded("g%2Fp"), "g/p");
        assert_eq!(decoded("g/p"), "g/p");
    }
}
