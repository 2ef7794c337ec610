//! Graph names → Rust identifiers.
//!
//! Plain names (`b`, `w_k`) pass through untouched. Everything else, most
//! notably scoped names like `layer/mul`, is encoded behind the reserved
//! `tj__` prefix as a sequence of length-prefixed segments, so two distinct
//! graph names can never produce the same identifier.

use std::fmt::Write;

use crate::ir::node_name;

/// Prefix reserved for encoded names and generator-internal items.
pub const RESERVED_PREFIX: &str = "tj__";

const SCOPE_SEPARATOR: char = '/';

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Prelude constructors the generated code calls by their bare names.
const PRELUDE_VALUES: &[&str] = &["Ok", "Err", "Some", "None"];

/// True if `name` can be used verbatim as a Rust identifier by the generator.
pub fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    name != "_"
        && !KEYWORDS.contains(&name)
        && !PRELUDE_VALUES.contains(&name)
        && !name.starts_with(RESERVED_PREFIX)
}

/// Map a graph-qualified tensor name to a unique Rust identifier.
pub fn sanitize(name: &str) -> String {
    let name = node_name(name);
    if is_plain_ident(name) {
        return name.to_string();
    }

    let mut out = String::from(RESERVED_PREFIX);
    for segment in name.split(SCOPE_SEPARATOR) {
        let escaped = escape_segment(segment);
        // write! into a String cannot fail
        let _ = write!(out, "{}_{}", escaped.len(), escaped);
    }
    out
}

fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            let _ = write!(out, "_{:x}_", c as u32);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(sanitize("b"), "b");
        assert_eq!(sanitize("w_k:0"), "w_k");
        assert_eq!(sanitize("X_nk"), "X_nk");
    }

    #[test]
    fn scoped_names_are_encoded() {
        assert_eq!(sanitize("layer/mul:0"), "tj__5_layer3_mul");
        assert_eq!(sanitize("a/b_c"), "tj__1_a6_b_5f_c");
    }

    #[test]
    fn keywords_and_reserved_prefix_are_encoded() {
        assert_eq!(sanitize("self"), "tj__4_self");
        assert_eq!(sanitize("tj__x"), "tj__11_tj_5f__5f_x");
        assert!(!is_plain_ident("fn"));
        assert!(!is_plain_ident("_"));
        assert!(!is_plain_ident("1x"));
    }

    #[test]
    fn prelude_constructors_are_encoded() {
        assert_eq!(sanitize("Ok"), "tj__2_Ok");
        assert_eq!(sanitize("None:0"), "tj__4_None");
        assert!(!is_plain_ident("Err"));
        assert!(!is_plain_ident("Some"));
        assert!(is_plain_ident("Okay"));
    }

    #[test]
    fn encoded_names_are_valid_identifiers() {
        for name in ["a-b", "9lives", "a/b/c", "truediv", "x y", "ü", ""] {
            let ident = sanitize(name);
            assert!(
                ident.starts_with(RESERVED_PREFIX) || is_plain_ident(&ident),
                "{name} -> {ident}"
            );
            assert!(syn::parse_str::<syn::Ident>(&ident).is_ok(), "{name} -> {ident}");
        }
    }

    #[test]
    fn distinct_names_never_collide() {
        // Pairs that collide under a naive "/" -> "___" substitution
        let names = [
            "a/b",
            "a___b",
            "a_b",
            "a/_b",
            "a_/b",
            "a//b",
            "a/b/c",
            "a/b_c",
            "a_b/c",
            "tj__1_a1_b",
            "1_a1_b",
            "a",
            "A",
            "self",
            "tj__4_self",
            "x-y",
            "x_2d_y",
            "",
            "/",
        ];
        let mut seen = HashSet::new();
        for name in names {
            assert!(seen.insert(sanitize(name)), "collision on {name}");
        }
    }
}
