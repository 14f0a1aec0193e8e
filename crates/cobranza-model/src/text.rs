//! Text normalization shared by block detection, alias lookup and file naming.

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization as _;

/// Strip diacritics, collapse internal whitespace and uppercase.
///
/// `"  Cañete -  (Manuel) "` becomes `"CANETE - (MANUEL)"`.
pub fn normalize(s: &str) -> String {
    let stripped: String = s.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Exact comparison of two already-normalized labels.
///
/// Vendor names come from a fixed set, so no substring or fuzzy matching is attempted.
pub fn labels_match(a_norm: &str, b_norm: &str) -> bool {
    a_norm == b_norm
}

/// Sheet names compare case-insensitively across Unicode.
///
/// Both inputs are normalized with Unicode NFKC and then uppercased.
pub fn sheet_name_eq(a: &str, b: &str) -> bool {
    a.trim()
        .nfkc()
        .flat_map(|c| c.to_uppercase())
        .eq(b.trim().nfkc().flat_map(|c| c.to_uppercase()))
}

fn leading_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\s+").expect("valid regex"))
}

/// Drop a leading numeric code token: `"000020 SURQUILLO"` -> `"SURQUILLO"`.
pub fn strip_leading_code(s: &str) -> &str {
    match leading_code_re().find(s) {
        Some(m) => s[m.end()..].trim(),
        None => s.trim(),
    }
}

/// Make `name` safe to use as a file name component.
///
/// Accents are folded to ASCII except `Ñ`/`ñ`, which are kept. Anything outside
/// `[A-Za-z0-9 _-()Ññ]` becomes `_`, and whitespace runs collapse to one space.
pub fn sanitize_file_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .flat_map(|c| match c {
            'Ñ' | 'ñ' => vec![c],
            _ => c
                .to_string()
                .nfkd()
                .filter(|d| d.is_ascii())
                .collect::<Vec<_>>(),
        })
        .collect();

    let mut replaced = String::with_capacity(folded.len());
    let mut in_run = false;
    for c in folded.chars() {
        if is_file_name_char(c) {
            replaced.push(c);
            in_run = false;
        } else if !in_run {
            replaced.push('_');
            in_run = true;
        }
    }

    let clean = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if !clean.is_empty() {
        return clean;
    }

    // Nothing survived folding; fall back to a plain underscore-joined rendering.
    let mut fallback = String::new();
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == 'Ñ' || c == 'ñ' {
            fallback.push(c);
            in_run = false;
        } else if !in_run {
            fallback.push('_');
            in_run = true;
        }
    }
    fallback.trim().to_string()
}

fn is_file_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '(' | ')' | 'Ñ' | 'ñ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_accents_and_collapses_whitespace() {
        assert_eq!(normalize("  Cañete -  (Manuel) "), "CANETE - (MANUEL)");
        assert_eq!(normalize("piter\thuayta"), "PITER HUAYTA");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn labels_match_is_exact() {
        assert!(labels_match("PITER", "PITER"));
        assert!(!labels_match("PITER", "PITER HUAYTA"));
    }

    #[test]
    fn sheet_names_compare_case_insensitively() {
        assert!(sheet_name_eq("Sur", " SUR "));
        assert!(sheet_name_eq("straße", "STRASSE"));
        assert!(!sheet_name_eq("SUR", "NORTE"));
    }

    #[test]
    fn strips_leading_numeric_code() {
        assert_eq!(strip_leading_code("000020 SURQUILLO"), "SURQUILLO");
        assert_eq!(strip_leading_code("  7   OFICINA (VES)"), "OFICINA (VES)");
        assert_eq!(strip_leading_code("SAN LUIS 2"), "SAN LUIS 2");
        assert_eq!(strip_leading_code("2024"), "2024");
    }

    #[test]
    fn sanitize_keeps_enye_and_folds_accents() {
        assert_eq!(sanitize_file_name("CAÑETE - (MANUEL)"), "CAÑETE - (MANUEL)");
        assert_eq!(sanitize_file_name("Lurín"), "Lurin");
        assert_eq!(sanitize_file_name("SURQ/SURCO - (OSCAR)"), "SURQ_SURCO - (OSCAR)");
        assert_eq!(sanitize_file_name("a   b"), "a b");
        assert_eq!(sanitize_file_name("a:*?b"), "a_b");
    }
}
