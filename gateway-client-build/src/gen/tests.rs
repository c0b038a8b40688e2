use super::GatewayServiceGenerator;
use crate::descriptor::{
    CustomHttpPattern, FileDescriptorProto, FileDescriptorSet, HttpRule, MethodDescriptorProto,
    MethodOptions, Pattern, ServiceDescriptorProto,
};
use crate::index::ProtoIndex;
use prost_build::{Comments, Method, Service, ServiceGenerator};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    MessageOptions, OneofDescriptorProto,
};

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, Type::Message)
    }
}

fn repeated(mut f: FieldDescriptorProto) -> FieldDescriptorProto {
    f.label = Some(Label::Repeated as i32);
    f
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn rpc(name: &str, input: &str, output: &str, pattern: Option<Pattern>, body: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".items.v1.{input}")),
        output_type: Some(output.to_string()),
        options: Some(MethodOptions {
            http: pattern.map(|pattern| HttpRule {
                pattern: Some(pattern),
                body: body.to_string(),
                ..Default::default()
            }),
        }),
        ..Default::default()
    }
}

/// `items.v1` with every field shape the binder handles.
fn item_messages() -> (Vec<DescriptorProto>, Vec<EnumDescriptorProto>) {
    let state = EnumDescriptorProto {
        name: Some("State".into()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("STATE_UNSPECIFIED".into()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("STATE_ACTIVE".into()),
                number: Some(1),
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    let item = message(
        "Item",
        vec![field("id", 1, Type::String), field("name", 2, Type::String)],
    );
    let get = message(
        "GetItemRequest",
        vec![
            field("id", 1, Type::String),
            FieldDescriptorProto {
                type_name: Some(".items.v1.State".into()),
                ..field("state", 2, Type::Enum)
            },
        ],
    );
    let filter = message(
        "Filter",
        vec![
            field("query", 1, Type::String),
            repeated(FieldDescriptorProto {
                type_name: Some(".items.v1.State".into()),
                ..field("states", 2, Type::Enum)
            }),
            message_field("parent", 3, ".items.v1.Filter"),
        ],
    );

    let labels_entry = DescriptorProto {
        name: Some("LabelsEntry".into()),
        field: vec![field("key", 1, Type::String), field("value", 2, Type::String)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let by_key_entry = DescriptorProto {
        name: Some("ByKeyEntry".into()),
        field: vec![field("key", 1, Type::String), message_field("value", 2, ".items.v1.Item")],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut token = field("page_token", 6, Type::String);
    token.proto3_optional = Some(true);
    token.oneof_index = Some(1);
    let mut by_name = field("by_name", 7, Type::String);
    by_name.oneof_index = Some(0);

    let mut list = message(
        "ListItemsRequest",
        vec![
            field("parent", 1, Type::String),
            field("page_size", 2, Type::Int32),
            message_field("filter", 3, ".items.v1.Filter"),
            repeated(field("tags", 4, Type::String)),
            repeated(message_field("labels", 5, ".items.v1.ListItemsRequest.LabelsEntry")),
            token,
            by_name,
            field("blob", 8, Type::Bytes),
            repeated(message_field("items", 9, ".items.v1.Item")),
            repeated(message_field("by_key", 10, ".items.v1.ListItemsRequest.ByKeyEntry")),
        ],
    );
    list.nested_type.push(labels_entry);
    list.nested_type.push(by_key_entry);
    list.oneof_decl = vec![
        OneofDescriptorProto {
            name: Some("selector".into()),
            ..Default::default()
        },
        OneofDescriptorProto {
            name: Some("_page_token".into()),
            ..Default::default()
        },
    ];

    let update = message(
        "UpdateItemRequest",
        vec![
            field("id", 1, Type::String),
            message_field("item", 2, ".items.v1.Item"),
            field("validate_only", 3, Type::Bool),
        ],
    );
    let create = message(
        "CreateItemRequest",
        vec![field("parent", 1, Type::String), message_field("item", 2, ".items.v1.Item")],
    );

    (vec![item, get, filter, list, update, create], vec![state])
}

fn item_service() -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some("ItemService".into()),
        method: vec![
            rpc("GetItem", "GetItemRequest", ".items.v1.Item", Some(Pattern::Get("/v1/items/{id}".into())), ""),
            rpc(
                "ListItems",
                "ListItemsRequest",
                ".items.v1.Item",
                Some(Pattern::Get("/v1/{parent}/items".into())),
                "",
            ),
            rpc(
                "UpdateItem",
                "UpdateItemRequest",
                ".items.v1.Item",
                Some(Pattern::Patch("/v1/items/{id}".into())),
                "item",
            ),
            rpc(
                "CreateItem",
                "CreateItemRequest",
                ".items.v1.Item",
                Some(Pattern::Post("/v1/{parent}/items".into())),
                "*",
            ),
            rpc(
                "DeleteItem",
                "GetItemRequest",
                ".google.protobuf.Empty",
                Some(Pattern::Delete("/v1/items/{id}".into())),
                "",
            ),
            MethodDescriptorProto {
                server_streaming: Some(true),
                ..rpc(
                    "WatchItems",
                    "ListItemsRequest",
                    ".items.v1.Item",
                    Some(Pattern::Get("/v1/{parent}/items:watch".into())),
                    "",
                )
            },
            MethodDescriptorProto {
                client_streaming: Some(true),
                ..rpc("UploadItems", "Item", ".items.v1.Item", Some(Pattern::Post("/v1/items:upload".into())), "*")
            },
            rpc(
                "HeadItem",
                "GetItemRequest",
                ".items.v1.Item",
                Some(Pattern::Custom(CustomHttpPattern {
                    kind: "HEAD".into(),
                    path: "/v1/items/{id}".into(),
                })),
                "",
            ),
            rpc("Internal", "GetItemRequest", ".items.v1.Item", None, ""),
        ],
    }
}

fn index() -> ProtoIndex {
    let (messages, enums) = item_messages();
    let set = FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("items/v1/items.proto".into()),
            package: Some("items.v1".into()),
            syntax: Some("proto3".into()),
            message_type: messages,
            enum_type: enums,
            service: vec![item_service()],
        }],
    };
    ProtoIndex::new(set, vec![])
}

/// Mirror what prost-build hands the generator for `ItemService`.
fn prost_service(methods: &[&str]) -> Service {
    Service {
        name: "ItemService".to_string(),
        proto_name: "ItemService".to_string(),
        package: "items.v1".to_string(),
        comments: Comments {
            leading: vec![" Manages items.".to_string()],
            ..Default::default()
        },
        methods: methods
            .iter()
            .map(|name| Method {
                name: crate::r#gen::naming::to_snake(name),
                proto_name: name.to_string(),
                comments: Comments {
                    leading: vec![format!(" {name} does things.")],
                    ..Default::default()
                },
                input_type: "Request".to_string(),
                output_type: "Item".to_string(),
                input_proto_type: ".items.v1.Request".to_string(),
                output_proto_type: ".items.v1.Item".to_string(),
                options: Default::default(),
                client_streaming: false,
                server_streaming: false,
            })
            .collect(),
        options: Default::default(),
    }
}

fn generate(methods: &[&str]) -> String {
    let mut generator = GatewayServiceGenerator::new(index());
    let mut buf = String::new();
    generator.generate(prost_service(methods), &mut buf);
    buf
}

/// Drop whitespace and trailing commas so assertions ignore formatting.
fn squash(buf: &str) -> String {
    let squashed: String = buf.split_whitespace().collect();
    squashed
        .replace(",)", ")")
        .replace(",}", "}")
        .replace(",>", ">")
}

#[test]
fn test_client_struct_and_modules() {
    let buf = generate(&["GetItem"]);
    let code = squash(&buf);

    assert!(code.contains("pubmoditem_service_gateway_client{"), "{buf}");
    assert!(code.contains("pubmoditem_service_gateway_procedures{"), "{buf}");
    assert!(code.contains("pubstructItemServiceGatewayClient{"), "{buf}");
    assert!(code.contains("client:gateway_client::GatewayClient"), "{buf}");
    assert!(code.contains("pubconstGET_ITEM:(&str,&str)=(\"GET\",\"/v1/items/{id}\");"), "{buf}");
    assert!(buf.contains("/// Manages items."), "{buf}");
    assert!(buf.contains("/// GetItem does things."), "{buf}");
}

#[test]
fn test_unary_method_signature() {
    let buf = generate(&["GetItem"]);
    let code = squash(&buf);

    assert!(
        code.contains(
            "pubasyncfnget_item(&self,ctx:&gateway_client::CallContext,req:&super::GetItemRequest)\
             ->::std::result::Result<super::Item,gateway_client::GatewayError>"
        ),
        "{buf}"
    );
    assert!(
        code.contains("self.client.new_request(gateway_client::http::Method::GET,\"/v1/items/{id}\")"),
        "{buf}"
    );
    assert!(code.contains("self.client.unary(ctx,request).await"), "{buf}");
}

#[test]
fn test_path_param_and_enum_query() {
    let buf = generate(&["GetItem"]);
    let code = squash(&buf);

    assert!(
        code.contains("request.set_path_param(\"id\",&::std::string::ToString::to_string(&req.id));"),
        "{buf}"
    );
    // The path-bound field never reappears as a query parameter.
    assert!(!code.contains("query.append(\"id\""), "{buf}");

    assert!(code.contains("query.append(\"state\",matchsuper::State::try_from(*&req.state)"), "{buf}");
    assert!(code.contains("e.as_str_name().to_string()"), "{buf}");
    assert!(code.contains("request.set_query(&query);"), "{buf}");
    assert!(!code.contains("set_body"), "{buf}");
}

#[test]
fn test_query_flattening() {
    let buf = generate(&["ListItems"]);
    let code = squash(&buf);

    assert!(
        code.contains("query.append(\"pageSize\",::std::string::ToString::to_string(&req.page_size));"),
        "{buf}"
    );

    // Singular message: guarded, then reached through the binding.
    assert!(code.contains("::std::option::Option::Some(v0)=&req.filter"), "{buf}");
    assert!(
        code.contains("query.append(\"filter.query\",::std::string::ToString::to_string(&v0.query));"),
        "{buf}"
    );
    assert!(code.contains("forv1in&v0.states{"), "{buf}");
    assert!(code.contains("query.append(\"filter.states\",matchsuper::State::try_from(*v1)"), "{buf}");
    // Self-referencing message fields are not expanded.
    assert!(!code.contains("filter.parent"), "{buf}");

    assert!(code.contains("forv2in&req.tags{"), "{buf}");
    assert!(
        code.contains("query.append(\"tags\",::std::string::ToString::to_string(v2));"),
        "{buf}"
    );

    assert!(code.contains("for(k3,v4)in&req.labels{"), "{buf}");
    assert!(
        code.contains(
            "query.append(::std::format!(\"labels[{}]\",k3),::std::string::ToString::to_string(v4));"
        ),
        "{buf}"
    );

    assert!(code.contains("::std::option::Option::Some(v5)=&req.page_token"), "{buf}");
    assert!(code.contains("query.append(\"pageToken\""), "{buf}");

    assert!(
        code.contains(
            "::std::option::Option::Some(super::list_items_request::Selector::ByName(v6))=&req.selector"
        ),
        "{buf}"
    );
    assert!(code.contains("query.append(\"byName\""), "{buf}");

    assert!(
        code.contains("query.append(\"blob\",gateway_client::bytes_param(&req.blob));"),
        "{buf}"
    );
}

#[test]
fn test_query_keys_never_reprefix_bindings() {
    let buf = generate(&["ListItems"]);
    let code = squash(&buf);

    assert!(!code.contains("v0.filter"), "{buf}");
    assert!(!code.contains("req.filter.query"), "{buf}");
    assert!(!code.contains("tags.tags"), "{buf}");
}

#[test]
fn test_message_elements_reached_through_loop_bindings() {
    let buf = generate(&["ListItems"]);
    let code = squash(&buf);

    assert!(code.contains("forv7in&req.items{"), "{buf}");
    assert!(
        code.contains("query.append(\"items.id\",::std::string::ToString::to_string(&v7.id));"),
        "{buf}"
    );
    assert!(
        code.contains("query.append(\"items.name\",::std::string::ToString::to_string(&v7.name));"),
        "{buf}"
    );

    assert!(code.contains("for(k8,v9)in&req.by_key{"), "{buf}");
    assert!(
        code.contains(
            "query.append(::std::format!(\"byKey[{}].name\",k8),::std::string::ToString::to_string(&v9.name));"
        ),
        "{buf}"
    );

    assert!(!code.contains("items.items"), "{buf}");
    assert!(!code.contains("v7.items"), "{buf}");
    assert!(!code.contains("v9.by_key"), "{buf}");
    assert!(!code.contains("req.items.name"), "{buf}");
}

#[test]
fn test_body_field_selector() {
    let buf = generate(&["UpdateItem"]);
    let code = squash(&buf);

    assert!(code.contains("gateway_client::http::Method::PATCH"), "{buf}");
    assert!(
        code.contains("self.client.marshal(ctx,request.method(),request.path(),&req.item)?;"),
        "{buf}"
    );
    assert!(code.contains("request.set_body(body)?;"), "{buf}");
    assert!(code.contains("query.append(\"validateOnly\""), "{buf}");
    assert!(!code.contains("query.append(\"item"), "{buf}");
}

#[test]
fn test_whole_body_has_no_query() {
    let buf = generate(&["CreateItem"]);
    let code = squash(&buf);

    assert!(
        code.contains("self.client.marshal(ctx,request.method(),request.path(),req)?;"),
        "{buf}"
    );
    assert!(code.contains("request.set_path_param(\"parent\""), "{buf}");
    assert!(!code.contains("QueryValues"), "{buf}");
}

#[test]
fn test_empty_response() {
    let buf = generate(&["DeleteItem"]);
    let code = squash(&buf);

    assert!(
        code.contains("->::std::result::Result<(),gateway_client::GatewayError>"),
        "{buf}"
    );
    assert!(code.contains(".unary::<::std::vec::Vec<u8>>(ctx,request)"), "{buf}");
    assert!(code.contains(".map(|_|())"), "{buf}");
    // DELETE without a body selector sends no body.
    assert!(!code.contains("set_body"), "{buf}");
}

#[test]
fn test_server_streaming_method() {
    let buf = generate(&["WatchItems"]);
    let code = squash(&buf);

    assert!(
        code.contains(
            "->::std::result::Result<gateway_client::EventStream<super::Item>,gateway_client::GatewayError>"
        ),
        "{buf}"
    );
    assert!(code.contains("self.client.server_stream(ctx,request).await"), "{buf}");
    assert!(code.contains("\"/v1/{parent}/items:watch\""), "{buf}");
}

#[test]
fn test_incompatible_methods_are_skipped() {
    let buf = generate(&["GetItem", "UploadItems", "HeadItem", "Internal"]);
    let code = squash(&buf);

    assert!(code.contains("pubasyncfnget_item("), "{buf}");
    assert!(!code.contains("upload_items"), "{buf}");
    assert!(!code.contains("head_item"), "{buf}");
    assert!(!code.contains("fninternal"), "{buf}");
    assert!(!code.contains("UPLOAD_ITEMS"), "{buf}");
}

#[test]
fn test_service_without_bindings_emits_nothing() {
    let buf = generate(&["UploadItems", "HeadItem", "Internal"]);
    assert!(buf.is_empty(), "{buf}");
}

#[test]
fn test_bindings_numbered_per_method() {
    let buf = generate(&["ListItems", "WatchItems"]);
    let code = squash(&buf);

    // Both methods bind the same request and restart numbering.
    assert_eq!(code.matches("Some(v0)=&req.filter").count(), 2, "{buf}");
}

#[test]
fn test_methods_in_descriptor_order() {
    let buf = generate(&["UpdateItem", "GetItem"]);
    let update = buf.find("fn update_item").unwrap();
    let get = buf.find("fn get_item").unwrap();
    assert!(update < get);
}
