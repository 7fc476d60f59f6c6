use std::sync::OnceLock;
use regex::Regex;

/// Words the engine's parser treats as reserved; a bare token matching
/// one of them must be quoted even though it looks like an identifier.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "both",
    "case", "cast", "check", "collate", "column", "constraint", "create", "default",
    "deferrable", "desc", "describe", "distinct", "do", "else", "end", "except", "false",
    "fetch", "for", "foreign", "from", "grant", "group", "having", "in", "initially",
    "intersect", "into", "lateral", "leading", "limit", "not", "null", "offset", "on",
    "only", "or", "order", "pivot", "placing", "primary", "qualify", "references",
    "returning", "select", "show", "some", "summarize", "symmetric", "table", "then", "to",
    "trailing", "true", "union", "unique", "unpivot", "using", "variadic", "when", "where",
    "window", "with",
];

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

/// True for a bare alphanumeric-or-underscore token starting with a letter
/// or underscore.
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

pub fn is_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RESERVED.binary_search(&lower.as_str()).is_ok()
}

/// Engine type names accepted in batch declarations, e.g. `BIGINT`,
/// `DECIMAL(18, 4)`, `VARCHAR[]`, `DOUBLE PRECISION`.
pub fn is_type_name(name: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^[A-Za-z][A-Za-z0-9_]*( [A-Za-z][A-Za-z0-9_]*)*(\(\d+(, ?\d+)?\))?(\[\])?$")
                .expect("static pattern")
        })
        .is_match(name)
}

/// Quote an identifier unless it is a bare, non-reserved token. Embedded
/// double quotes are doubled.
pub fn quote_ident(name: &str) -> String {
    if is_identifier(name) && !is_reserved(name) {
        return name.to_string();
    }
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-separated quoted identifiers.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Default relation name for a dataset directory's base name.
pub fn sanitize_view_name(base: &str) -> String {
    let base = base.strip_suffix(".parquet").unwrap_or(base);
    if base.is_empty() {
        return "dataset".to_string();
    }
    if is_identifier(base) {
        return base.to_string();
    }
    static NON_IDENT: OnceLock<Regex> = OnceLock::new();
    let pattern = NON_IDENT.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]+").expect("static pattern"));
    format!("ds_{}", pattern.replace_all(base, "_"))
}
