//! Identifier naming.
//!
//! Message, field, oneof and package identifiers must match what `prost-build`
//! emits, so they go through the same `heck` conversions and keyword escaping.

use heck::{ToSnakeCase, ToUpperCamelCase};
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

/// Join `parents` and `field` with `.` (`req`, `req.data`, `req.data.tag`).
pub(crate) fn new_struct_accessor(parents: &[&str], field: &str) -> String {
    parents
        .iter()
        .copied()
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

/// Lower the first character.
pub(crate) fn unexport(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `snake_case`, as prost names modules and fields.
pub(crate) fn to_snake(s: &str) -> String {
    let mut ident = s.to_snake_case();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    sanitize(ident)
}

/// `UpperCamelCase`, as prost names types and oneof variants.
pub(crate) fn to_upper_camel(s: &str) -> String {
    let mut ident = s.to_upper_camel_case();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if ident == "Self" {
        ident.push('_');
    }
    ident
}

/// Escape identifiers that collide with Rust keywords.
fn sanitize(ident: String) -> String {
    match ident.as_str() {
        "self" | "super" | "extern" | "crate" => ident + "_",
        "as" | "break" | "const" | "continue" | "else" | "enum" | "false" | "fn" | "for"
        | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut" | "pub"
        | "ref" | "return" | "static" | "struct" | "trait" | "true" | "type" | "unsafe"
        | "use" | "where" | "while" | "dyn" | "abstract" | "become" | "box" | "do" | "final"
        | "macro" | "override" | "priv" | "typeof" | "unsized" | "virtual" | "yield"
        | "async" | "await" | "try" | "gen" => format!("r#{ident}"),
        _ => ident,
    }
}

/// Build an identifier, honoring a `r#` prefix.
pub(crate) fn ident(name: &str) -> Ident {
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => Ident::new(name, Span::call_site()),
    }
}

/// A Rust type path relative to a package module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RustPath {
    /// `()`, the mapping of `google.protobuf.Empty`.
    Unit,
    /// A primitive or fully spelled path such as `bool` or
    /// `::prost::alloc::string::String`.
    Verbatim(String),
    /// `super::`-relative or `::`-absolute segments.
    Segments { absolute: bool, segments: Vec<String> },
}

impl RustPath {
    /// Tokens for use one module below the package module.
    pub(crate) fn to_tokens_from_child(&self) -> TokenStream {
        match self {
            RustPath::Unit => quote! { () },
            RustPath::Verbatim(path) => path
                .parse()
                .unwrap_or_else(|_| quote! { () }),
            RustPath::Segments { absolute: true, segments } => {
                let segments = segments.iter().map(|s| ident(s));
                quote! { #(::#segments)* }
            }
            RustPath::Segments { absolute: false, segments } => {
                let segments = segments.iter().map(|s| ident(s));
                quote! { super #(::#segments)* }
            }
        }
    }

    /// Append a child segment (nested module item).
    pub(crate) fn join(&self, segment: String) -> RustPath {
        match self {
            RustPath::Segments { absolute, segments } => {
                let mut segments = segments.clone();
                segments.push(segment);
                RustPath::Segments {
                    absolute: *absolute,
                    segments,
                }
            }
            other => other.clone(),
        }
    }
}
