//! Message, enum and method lookup over a decoded descriptor set.
//!
//! Field types are resolved to the Rust paths `prost-build` generates for
//! them, relative to the package module the client is emitted into.

use std::collections::{HashMap, HashSet};

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, FieldDescriptorProto};

use crate::descriptor::FileDescriptorSet;
use crate::r#gen::naming::{RustPath, to_snake, to_upper_camel, unexport};
use crate::rule::{BindingRule, extract_rule, is_binding_compatible};

/// Well-known types `prost-build` maps to Rust primitives when
/// `.google.protobuf` is not overridden.
const WELL_KNOWN_PRIMITIVES: &[(&str, &str, Scalar)] = &[
    (".google.protobuf.BoolValue", "bool", Scalar::Bool),
    (".google.protobuf.BytesValue", "::prost::alloc::vec::Vec<u8>", Scalar::Bytes),
    (".google.protobuf.DoubleValue", "f64", Scalar::Float),
    (".google.protobuf.FloatValue", "f32", Scalar::Float),
    (".google.protobuf.Int32Value", "i32", Scalar::Int),
    (".google.protobuf.Int64Value", "i64", Scalar::Int),
    (".google.protobuf.StringValue", "::prost::alloc::string::String", Scalar::String),
    (".google.protobuf.UInt32Value", "u32", Scalar::Int),
    (".google.protobuf.UInt64Value", "u64", Scalar::Int),
];

const EMPTY: &str = ".google.protobuf.Empty";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Scalar {
    Bool,
    Int,
    Float,
    String,
    Bytes,
}

/// Shape of a request field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Map { key: Scalar, value: Box<FieldKind> },
    Repeated(Box<FieldKind>),
    /// Fully qualified message name.
    Message(String),
    /// Fully qualified enum name.
    Enum(String),
    Scalar(Scalar),
}

/// How a singular field is held by its message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Presence {
    /// Plain value.
    Implicit,
    /// `Option<_>`.
    Optional,
    /// Member of a oneof: the message field holding the oneof and the path
    /// of this member's variant.
    Oneof { field: String, variant: RustPath },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FieldInfo {
    pub proto_name: String,
    pub json_name: String,
    /// Struct field identifier.
    pub rust_name: String,
    pub kind: FieldKind,
    pub presence: Presence,
}

#[derive(Clone, Debug)]
pub(crate) struct MethodEntry {
    pub input_type: String,
    pub output_type: String,
    /// Set only for methods eligible for a client binding.
    pub binding: Option<BindingRule>,
    pub server_streaming: bool,
}

#[derive(Debug)]
struct MessageEntry {
    proto3: bool,
    descriptor: DescriptorProto,
}

#[derive(Debug, Default)]
pub(crate) struct ProtoIndex {
    messages: HashMap<String, MessageEntry>,
    enums: HashSet<String>,
    methods: HashMap<String, MethodEntry>,
    extern_paths: Vec<(String, String)>,
    primitives: bool,
}

/// Key of a method: `.pkg.Service/Method`.
pub(crate) fn method_key(package: &str, service: &str, method: &str) -> String {
    match package {
        "" => format!(".{service}/{method}"),
        package => format!(".{package}.{service}/{method}"),
    }
}

fn qualify(scope: &str, name: &str) -> String {
    format!("{scope}.{name}")
}

impl ProtoIndex {
    /// Index every file in `set`.
    ///
    /// `extern_paths` are the `(proto path, rust path)` pairs also handed to
    /// `prost-build`; without a `.google.protobuf` entry the prost defaults
    /// for well-known types apply.
    pub(crate) fn new(set: FileDescriptorSet, extern_paths: Vec<(String, String)>) -> Self {
        let primitives = !extern_paths
            .iter()
            .any(|(proto, _)| proto.starts_with(".google.protobuf"));

        let mut index = ProtoIndex {
            extern_paths,
            primitives,
            ..Default::default()
        };
        if primitives {
            index
                .extern_paths
                .push((".google.protobuf".to_string(), "::prost_types".to_string()));
        }

        for file in set.file {
            let package = file.package.unwrap_or_default();
            let proto3 = file.syntax.as_deref() == Some("proto3");
            let scope = match package.as_str() {
                "" => String::new(),
                package => format!(".{package}"),
            };

            for message in file.message_type {
                index.add_message(proto3, &scope, message);
            }
            for en in file.enum_type {
                index
                    .enums
                    .insert(qualify(&scope, en.name.as_deref().unwrap_or_default()));
            }
            for service in file.service {
                let service_name = service.name.unwrap_or_default();
                for method in service.method {
                    let key = method_key(
                        &package,
                        &service_name,
                        method.name.as_deref().unwrap_or_default(),
                    );
                    let binding = match is_binding_compatible(&method) {
                        true => extract_rule(&method),
                        false => None,
                    };
                    let entry = MethodEntry {
                        binding,
                        input_type: method.input_type.unwrap_or_default(),
                        output_type: method.output_type.unwrap_or_default(),
                        server_streaming: method.server_streaming.unwrap_or(false),
                    };
                    index.methods.insert(key, entry);
                }
            }
        }
        index
    }

    fn add_message(&mut self, proto3: bool, scope: &str, mut message: DescriptorProto) {
        let full_name = qualify(scope, message.name.as_deref().unwrap_or_default());
        for en in &message.enum_type {
            self.enums
                .insert(qualify(&full_name, en.name.as_deref().unwrap_or_default()));
        }
        for nested in std::mem::take(&mut message.nested_type) {
            self.add_message(proto3, &full_name, nested);
        }
        self.messages.insert(
            full_name,
            MessageEntry {
                proto3,
                descriptor: message,
            },
        );
    }

    pub(crate) fn method(&self, key: &str) -> Option<&MethodEntry> {
        self.methods.get(key)
    }

    /// Whether `full_name` is mapped to `()`.
    pub(crate) fn is_empty_message(&self, full_name: &str) -> bool {
        self.primitives && full_name == EMPTY
    }

    fn primitive(&self, full_name: &str) -> Option<Scalar> {
        if !self.primitives {
            return None;
        }
        WELL_KNOWN_PRIMITIVES
            .iter()
            .find(|(name, _, _)| *name == full_name)
            .map(|(_, _, scalar)| *scalar)
    }

    /// Rust path of a message or enum, as seen from the `package` module.
    pub(crate) fn resolve(&self, full_name: &str, package: &str) -> RustPath {
        if self.is_empty_message(full_name) {
            return RustPath::Unit;
        }
        if self.primitives
            && let Some((_, rust, _)) = WELL_KNOWN_PRIMITIVES
                .iter()
                .find(|(name, _, _)| *name == full_name)
        {
            return RustPath::Verbatim(rust.to_string());
        }
        if let Some(path) = self.resolve_extern(full_name) {
            return path;
        }

        let mut local = package.split('.').filter(|s| !s.is_empty()).peekable();
        let mut segments = full_name.trim_start_matches('.').split('.');
        let ident = segments.next_back().unwrap_or_default();
        let mut segments = segments.peekable();
        while local.peek().is_some() && local.peek() == segments.peek() {
            local.next();
            segments.next();
        }

        let segments = local
            .map(|_| "super".to_string())
            .chain(segments.map(to_snake))
            .chain(std::iter::once(to_upper_camel(ident)))
            .collect();
        RustPath::Segments {
            absolute: false,
            segments,
        }
    }

    fn resolve_extern(&self, full_name: &str) -> Option<RustPath> {
        let (proto, rust) = self
            .extern_paths
            .iter()
            .filter(|(proto, _)| {
                full_name == proto
                    || full_name
                        .strip_prefix(proto.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|(proto, _)| proto.len())?;

        let (absolute, base) = match rust.strip_prefix("::") {
            Some(base) => (true, base),
            None => (false, rust.as_str()),
        };
        if base.contains(['<', '(']) || !base.contains("::") && full_name == proto {
            return Some(RustPath::Verbatim(rust.clone()));
        }

        let mut segments: Vec<String> = base.split("::").map(str::to_string).collect();
        let rest = full_name[proto.len()..].trim_start_matches('.');
        if !rest.is_empty() {
            let mut parts = rest.split('.');
            let ident = parts.next_back().unwrap_or_default();
            segments.extend(parts.map(to_snake));
            segments.push(to_upper_camel(ident));
        }
        Some(RustPath::Segments { absolute, segments })
    }

    /// Fields of a message, in declaration order.
    ///
    /// Returns `None` for messages not present in the set. Fields whose type
    /// cannot be bound (groups, `google.protobuf.Empty`) are left out.
    pub(crate) fn fields(&self, message: &str, package: &str) -> Option<Vec<FieldInfo>> {
        let entry = self.messages.get(message)?;
        let descriptor = &entry.descriptor;
        let fields = descriptor
            .field
            .iter()
            .filter_map(|field| self.field_info(message, entry, field, package))
            .collect();
        Some(fields)
    }

    fn field_info(
        &self,
        message: &str,
        entry: &MessageEntry,
        field: &FieldDescriptorProto,
        package: &str,
    ) -> Option<FieldInfo> {
        let name = field.name.clone().unwrap_or_default();
        let json_name = field
            .json_name
            .clone()
            .unwrap_or_else(|| unexport(&to_upper_camel(&name)));
        let type_name = field.type_name.as_deref().unwrap_or_default();
        let repeated = field.label() == Label::Repeated;

        let mut wrapped = false;
        let kind = match field.r#type() {
            Type::Message if repeated => match self.map_entry(type_name) {
                Some(map) => map,
                None => FieldKind::Repeated(Box::new(self.element_kind(type_name)?)),
            },
            Type::Message => {
                if let Some(scalar) = self.primitive(type_name) {
                    wrapped = true;
                    FieldKind::Scalar(scalar)
                } else {
                    self.element_kind(type_name)?
                }
            }
            Type::Group => return None,
            Type::Enum if repeated => FieldKind::Repeated(Box::new(FieldKind::Enum(type_name.to_string()))),
            Type::Enum => FieldKind::Enum(type_name.to_string()),
            ty if repeated => FieldKind::Repeated(Box::new(FieldKind::Scalar(scalar_of(ty)))),
            ty => FieldKind::Scalar(scalar_of(ty)),
        };

        let synthetic = field.proto3_optional.unwrap_or(false);
        let presence = match field.oneof_index {
            Some(idx) if !synthetic => {
                let oneof = entry
                    .descriptor
                    .oneof_decl
                    .get(usize::try_from(idx).ok()?)?
                    .name
                    .clone()
                    .unwrap_or_default();
                let variant = self
                    .message_module(message, package)
                    .join(to_upper_camel(&oneof))
                    .join(to_upper_camel(&name));
                Presence::Oneof {
                    field: to_snake(&oneof),
                    variant,
                }
            }
            _ if repeated => Presence::Implicit,
            _ if synthetic || wrapped => Presence::Optional,
            _ if matches!(kind, FieldKind::Message(_)) => Presence::Optional,
            _ if !entry.proto3 && field.label() == Label::Optional => Presence::Optional,
            _ => Presence::Implicit,
        };

        Some(FieldInfo {
            rust_name: to_snake(&name),
            proto_name: name,
            json_name,
            kind,
            presence,
        })
    }

    /// Kind of a singular message-typed value.
    fn element_kind(&self, type_name: &str) -> Option<FieldKind> {
        if self.is_empty_message(type_name) {
            return None;
        }
        Some(match self.primitive(type_name) {
            Some(scalar) => FieldKind::Scalar(scalar),
            None if self.enums.contains(type_name) => FieldKind::Enum(type_name.to_string()),
            None => FieldKind::Message(type_name.to_string()),
        })
    }

    fn map_entry(&self, type_name: &str) -> Option<FieldKind> {
        let entry = self.messages.get(type_name)?;
        let descriptor = &entry.descriptor;
        if !descriptor
            .options
            .as_ref()
            .is_some_and(|o| o.map_entry.unwrap_or(false))
        {
            return None;
        }
        let key = descriptor.field.iter().find(|f| f.number == Some(1))?;
        let value = descriptor.field.iter().find(|f| f.number == Some(2))?;
        let value_type = value.type_name.as_deref().unwrap_or_default();
        let value = match value.r#type() {
            Type::Message => self.element_kind(value_type)?,
            Type::Enum => FieldKind::Enum(value_type.to_string()),
            ty => FieldKind::Scalar(scalar_of(ty)),
        };
        Some(FieldKind::Map {
            key: scalar_of(key.r#type()),
            value: Box::new(value),
        })
    }

    /// Path of the module prost nests a message's oneofs and nested types in.
    fn message_module(&self, message: &str, package: &str) -> RustPath {
        match self.resolve(message, package) {
            RustPath::Segments {
                absolute,
                mut segments,
            } => {
                if let Some(last) = segments.pop() {
                    let module = self
                        .messages
                        .get(message)
                        .and_then(|m| m.descriptor.name.as_deref())
                        .map_or_else(|| to_snake(&last), to_snake);
                    segments.push(module);
                }
                RustPath::Segments { absolute, segments }
            }
            other => other,
        }
    }
}

fn scalar_of(ty: Type) -> Scalar {
    match ty {
        Type::Bool => Scalar::Bool,
        Type::Double | Type::Float => Scalar::Float,
        Type::String => Scalar::String,
        Type::Bytes => Scalar::Bytes,
        _ => Scalar::Int,
    }
}
