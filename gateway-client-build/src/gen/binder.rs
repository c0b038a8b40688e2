//! Field binding: splits request fields into path, query and body and emits
//! the code that attaches each one to a `GatewayRequest`.

use std::fmt;

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use super::naming::{ident, new_struct_accessor};
use crate::index::{FieldInfo, FieldKind, Presence, ProtoIndex, Scalar};
use crate::rule::{BindingRule, BodySelector};

/// A root binding plus field segments (`req.filter.tags`).
#[derive(Clone, Debug)]
pub(crate) struct FieldPath {
    root: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub(crate) fn root(name: impl Into<String>) -> Self {
        FieldPath {
            root: name.into(),
            segments: Vec::new(),
        }
    }

    pub(crate) fn child(&self, field: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(field.to_string());
        FieldPath {
            root: self.root.clone(),
            segments,
        }
    }

    fn to_tokens(&self) -> TokenStream {
        let root = ident(&self.root);
        let segments = self.segments.iter().map(|s| ident(s));
        quote! { #root #(.#segments)* }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segments.split_last() {
            Some((last, parents)) => {
                let parents: Vec<&str> = std::iter::once(self.root.as_str())
                    .chain(parents.iter().map(String::as_str))
                    .collect();
                f.write_str(&new_struct_accessor(&parents, last))
            }
            None => f.write_str(&self.root),
        }
    }
}

#[derive(Clone, Debug)]
enum KeyPart {
    Name(String),
    /// `[k]`, filled from a map key binding at runtime.
    MapKey(Ident),
}

/// A query parameter key (`filter.labels[k].name`).
#[derive(Clone, Debug, Default)]
pub(crate) struct QueryKey {
    parts: Vec<KeyPart>,
}

impl QueryKey {
    fn child(&self, json_name: &str) -> Self {
        let mut parts = self.parts.clone();
        parts.push(KeyPart::Name(json_name.to_string()));
        QueryKey { parts }
    }

    fn map_key(&self, binding: Ident) -> Self {
        let mut parts = self.parts.clone();
        parts.push(KeyPart::MapKey(binding));
        QueryKey { parts }
    }

    /// A string literal when static, else a `format!` call.
    fn to_tokens(&self) -> TokenStream {
        let mut template = String::new();
        let mut args = Vec::new();
        for part in &self.parts {
            match part {
                KeyPart::Name(name) => {
                    if !template.is_empty() {
                        template.push('.');
                    }
                    template.push_str(name);
                }
                KeyPart::MapKey(binding) => {
                    template.push_str("[{}]");
                    args.push(binding);
                }
            }
        }
        if args.is_empty() {
            return quote! { #template };
        }
        // JSON names never contain braces.
        quote! { ::std::format!(#template, #(#args),*) }
    }
}

/// How a value is reached: through a field path or a loop/guard binding.
enum ValueRef {
    Place(FieldPath),
    Binding(Ident),
}

impl ValueRef {
    /// An expression of type `&T`.
    fn to_tokens(&self) -> TokenStream {
        match self {
            ValueRef::Place(path) => {
                let path = path.to_tokens();
                quote! { &#path }
            }
            ValueRef::Binding(binding) => quote! { #binding },
        }
    }

    /// Root for the fields of a message value.
    fn into_path(self) -> FieldPath {
        match self {
            ValueRef::Place(path) => path,
            ValueRef::Binding(binding) => FieldPath::root(binding.to_string()),
        }
    }
}

/// Code attaching one request to a `request` builder.
#[derive(Default)]
pub(crate) struct MethodBindings {
    pub path: TokenStream,
    pub query: TokenStream,
    pub body: TokenStream,
}

pub(crate) struct Binder<'a> {
    index: &'a ProtoIndex,
    package: &'a str,
    next_binding: usize,
    stack: Vec<String>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(index: &'a ProtoIndex, package: &'a str) -> Self {
        Binder {
            index,
            package,
            next_binding: 0,
            stack: Vec::new(),
        }
    }

    fn fresh(&mut self, prefix: &str) -> Ident {
        let binding = format_ident!("{}{}", prefix, self.next_binding);
        self.next_binding += 1;
        binding
    }

    /// Bind the fields of `input` (a request message) under `rule`.
    ///
    /// The generated code expects `req: &Input`, `ctx` and a mutable
    /// `request` in scope.
    pub(crate) fn bind_method(&mut self, input: &str, rule: &BindingRule) -> MethodBindings {
        self.next_binding = 0;
        let fields = self.index.fields(input, self.package).unwrap_or_default();
        let req = FieldPath::root("req");

        let mut bindings = MethodBindings::default();
        let mut query = Vec::new();
        self.stack.push(input.to_string());
        for field in &fields {
            if rule.binds_path(&field.proto_name) {
                bindings.path.extend(self.bind_path_field(field, &req));
                continue;
            }
            let excluded = match &rule.body {
                BodySelector::Whole => true,
                BodySelector::Field(name) => *name == field.proto_name,
                BodySelector::None => false,
            };
            if !excluded {
                query.push(self.bind_query_field(field, &req, &QueryKey::default()));
            }
        }
        self.stack.pop();

        let query: Vec<_> = query.into_iter().filter(|q| !q.is_empty()).collect();
        if !query.is_empty() {
            bindings.query = quote! {
                let mut query = gateway_client::QueryValues::new();
                #(#query)*
                request.set_query(&query);
            };
        }

        let source = match &rule.body {
            BodySelector::None => None,
            BodySelector::Whole => Some(quote! { req }),
            BodySelector::Field(name) => Some(
                match fields.iter().find(|f| f.proto_name == *name) {
                    Some(field) => {
                        let path = req.child(&field.rust_name).to_tokens();
                        quote! { &#path }
                    }
                    None => quote! { req },
                },
            ),
        };
        if let Some(source) = source {
            bindings.body = quote! {
                let body = self.client.marshal(ctx, request.method(), request.path(), #source)?;
                request.set_body(body)?;
            };
        }

        bindings
    }

    fn bind_path_field(&mut self, field: &FieldInfo, parent: &FieldPath) -> TokenStream {
        if !matches!(field.kind, FieldKind::Scalar(_) | FieldKind::Enum(_)) {
            return TokenStream::new();
        }
        let name = &field.proto_name;
        let kind = field.kind.clone();
        self.guarded(field, parent, move |binder, value| {
            let formatted = binder.format_value(&kind, &value);
            quote! { request.set_path_param(#name, &#formatted); }
        })
    }

    fn bind_query_field(&mut self, field: &FieldInfo, parent: &FieldPath, key: &QueryKey) -> TokenStream {
        let key = key.child(&field.json_name);
        let kind = field.kind.clone();
        self.guarded(field, parent, move |binder, value| {
            binder.bind_value(&kind, value, &key)
        })
    }

    /// Reach a field through its presence guard and hand its value to `body`.
    fn guarded<F>(&mut self, field: &FieldInfo, parent: &FieldPath, body: F) -> TokenStream
    where
        F: FnOnce(&mut Self, ValueRef) -> TokenStream,
    {
        let place = parent.child(&field.rust_name);
        match &field.presence {
            Presence::Implicit => body(self, ValueRef::Place(place)),
            Presence::Optional => {
                let mark = self.next_binding;
                let binding = self.fresh("v");
                let inner = body(self, ValueRef::Binding(binding.clone()));
                if inner.is_empty() {
                    self.next_binding = mark;
                    return inner;
                }
                let place = place.to_tokens();
                quote! {
                    if let ::std::option::Option::Some(#binding) = &#place {
                        #inner
                    }
                }
            }
            Presence::Oneof { field: oneof, variant } => {
                let mark = self.next_binding;
                let binding = self.fresh("v");
                let inner = body(self, ValueRef::Binding(binding.clone()));
                if inner.is_empty() {
                    self.next_binding = mark;
                    return inner;
                }
                let place = parent.child(oneof).to_tokens();
                let variant = variant.to_tokens_from_child();
                quote! {
                    if let ::std::option::Option::Some(#variant(#binding)) = &#place {
                        #inner
                    }
                }
            }
        }
    }

    fn bind_value(&mut self, kind: &FieldKind, value: ValueRef, key: &QueryKey) -> TokenStream {
        match kind {
            FieldKind::Map { value: element, .. } => {
                let mark = self.next_binding;
                let k = self.fresh("k");
                let v = self.fresh("v");
                let inner = self.bind_value(element, ValueRef::Binding(v.clone()), &key.map_key(k.clone()));
                if inner.is_empty() {
                    self.next_binding = mark;
                    return inner;
                }
                let source = value.to_tokens();
                quote! {
                    for (#k, #v) in #source {
                        #inner
                    }
                }
            }
            FieldKind::Repeated(element) => {
                let mark = self.next_binding;
                let v = self.fresh("v");
                let inner = self.bind_value(element, ValueRef::Binding(v.clone()), key);
                if inner.is_empty() {
                    self.next_binding = mark;
                    return inner;
                }
                let source = value.to_tokens();
                quote! {
                    for #v in #source {
                        #inner
                    }
                }
            }
            FieldKind::Message(message) => {
                if self.stack.contains(message) {
                    return TokenStream::new();
                }
                let Some(fields) = self.index.fields(message, self.package) else {
                    return TokenStream::new();
                };
                let parent = value.into_path();
                self.stack.push(message.clone());
                let inner: Vec<_> = fields
                    .iter()
                    .map(|field| self.bind_query_field(field, &parent, key))
                    .collect();
                self.stack.pop();
                quote! { #(#inner)* }
            }
            FieldKind::Enum(_) | FieldKind::Scalar(_) => {
                let key = key.to_tokens();
                let formatted = self.format_value(kind, &value);
                quote! { query.append(#key, #formatted); }
            }
        }
    }

    /// A `String` expression for a scalar or enum value.
    fn format_value(&self, kind: &FieldKind, value: &ValueRef) -> TokenStream {
        let value = value.to_tokens();
        match kind {
            FieldKind::Enum(name) => {
                let path = self.index.resolve(name, self.package).to_tokens_from_child();
                quote! {
                    match #path::try_from(*#value) {
                        ::std::result::Result::Ok(e) => e.as_str_name().to_string(),
                        ::std::result::Result::Err(_) => ::std::string::ToString::to_string(#value),
                    }
                }
            }
            FieldKind::Scalar(Scalar::Bytes) => quote! { gateway_client::bytes_param(#value) },
            _ => quote! { ::std::string::ToString::to_string(#value) },
        }
    }
}
