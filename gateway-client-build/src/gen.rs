use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use prost_build::{Comments, Service, ServiceGenerator};
use quote::{format_ident, quote};

use crate::index::{MethodEntry, ProtoIndex, method_key};
use crate::rule::{BindingRule, Verb};

mod binder;
pub(crate) mod naming;

#[cfg(test)]
mod tests;

use binder::Binder;

/// Emits a `{Service}GatewayClient` for every service with at least one
/// HTTP-annotated method.
pub struct GatewayServiceGenerator {
    index: ProtoIndex,
}

impl GatewayServiceGenerator {
    pub(crate) fn new(index: ProtoIndex) -> Self {
        Self { index }
    }
}

/// One method that gets a client binding.
struct BoundMethod<'a> {
    name: &'a str,
    proto_name: &'a str,
    comments: &'a Comments,
    entry: &'a MethodEntry,
    rule: &'a BindingRule,
}

fn doc_attrs(comments: &Comments) -> TokenStream {
    let lines = comments.leading.iter().flat_map(|c| c.lines()).map(|line| {
        let line = format!(" {}", line.strip_prefix(' ').unwrap_or(line));
        quote! { #[doc = #line] }
    });
    quote! { #(#lines)* }
}

fn verb_tokens(verb: Verb) -> TokenStream {
    let verb = format_ident!("{}", verb.as_str());
    quote! { gateway_client::http::Method::#verb }
}

fn const_name(method_name: &str) -> proc_macro2::Ident {
    let name = method_name.trim_start_matches("r#").trim_end_matches('_');
    format_ident!("{}", name.to_uppercase())
}

impl GatewayServiceGenerator {
    fn bound_methods<'a>(&'a self, service: &'a Service) -> Vec<BoundMethod<'a>> {
        service
            .methods
            .iter()
            .filter_map(|method| {
                let key = method_key(&service.package, &service.proto_name, &method.proto_name);
                let entry = self.index.method(&key)?;
                let rule = entry.binding.as_ref()?;
                Some(BoundMethod {
                    name: &method.name,
                    proto_name: &method.proto_name,
                    comments: &method.comments,
                    entry,
                    rule,
                })
            })
            .collect()
    }

    fn warn_unbound_params(&self, service: &Service, method: &BoundMethod<'_>) {
        let fields = self
            .index
            .fields(&method.entry.input_type, &service.package)
            .unwrap_or_default();
        for param in method.rule.path_params() {
            let bound = method.rule.binds_path(param) && fields.iter().any(|f| f.proto_name == param);
            if !bound {
                println!(
                    "cargo:warning=path parameter '{}' of {}.{} is not bound to a request field",
                    param, service.proto_name, method.proto_name
                );
            }
        }
    }

    fn method_tokens(&self, service: &Service, method: &BoundMethod<'_>) -> TokenStream {
        let package = service.package.as_str();
        let method_name = naming::ident(method.name);
        let docs = doc_attrs(method.comments);
        let input = self
            .index
            .resolve(&method.entry.input_type, package)
            .to_tokens_from_child();
        let verb = verb_tokens(method.rule.verb);
        let pattern = &method.rule.path_pattern;

        let bindings = Binder::new(&self.index, package).bind_method(&method.entry.input_type, method.rule);
        let path = bindings.path;
        let query = bindings.query;
        let body = bindings.body;

        let empty_output = self.index.is_empty_message(&method.entry.output_type);
        let output = self
            .index
            .resolve(&method.entry.output_type, package)
            .to_tokens_from_child();

        let (output, call) = match (method.entry.server_streaming, empty_output) {
            (false, false) => (output, quote! { self.client.unary(ctx, request).await }),
            (false, true) => (
                quote! { () },
                quote! {
                    self.client
                        .unary::<::std::vec::Vec<u8>>(ctx, request)
                        .await
                        .map(|_| ())
                },
            ),
            (true, empty) => {
                let item = match empty {
                    true => quote! { gateway_client::serde_json::Value },
                    false => output,
                };
                (
                    quote! { gateway_client::EventStream<#item> },
                    quote! { self.client.server_stream(ctx, request).await },
                )
            }
        };

        quote! {
            #docs
            pub async fn #method_name(
                &self,
                ctx: &gateway_client::CallContext,
                req: &#input,
            ) -> ::std::result::Result<#output, gateway_client::GatewayError> {
                let mut request = self.client.new_request(#verb, #pattern);
                #path
                #query
                #body
                #call
            }
        }
    }
}

impl ServiceGenerator for GatewayServiceGenerator {
    fn generate(&mut self, service: Service, buf: &mut String) {
        let methods = self.bound_methods(&service);
        if methods.is_empty() {
            return;
        }

        let snake = service.proto_name.to_case(Case::Snake);
        let client_module_name = format_ident!("{}_gateway_client", snake);
        let procedures_module_name = format_ident!("{}_gateway_procedures", snake);
        let client_name = format_ident!("{}GatewayClient", service.proto_name);
        let service_docs = doc_attrs(&service.comments);

        for method in &methods {
            self.warn_unbound_params(&service, method);
        }
        let client_methods: Vec<_> = methods
            .iter()
            .map(|method| self.method_tokens(&service, method))
            .collect();

        let procedures: Vec<_> = methods
            .iter()
            .map(|method| {
                let const_name = const_name(method.name);
                let verb = method.rule.verb.as_str();
                let pattern = &method.rule.path_pattern;
                quote! {
                    pub const #const_name: (&str, &str) = (#verb, #pattern);
                }
            })
            .collect();

        let tokens = quote! {
            /// HTTP verb and path pattern of each bound method.
            pub mod #procedures_module_name {
                #(#procedures)*
            }

            pub mod #client_module_name {
                #service_docs
                #[derive(Debug, Clone)]
                pub struct #client_name {
                    client: gateway_client::GatewayClient,
                }

                #[allow(unused_mut, unused_variables)]
                impl #client_name {
                    pub fn new(client: gateway_client::GatewayClient) -> Self {
                        Self { client }
                    }

                    /// The underlying runtime client.
                    pub fn inner(&self) -> &gateway_client::GatewayClient {
                        &self.client
                    }

                    #(#client_methods)*
                }
            }
        };

        buf.push_str(&render(tokens));
    }
}

/// Format generated tokens, falling back to the raw token text.
fn render(tokens: TokenStream) -> String {
    match syn::parse2::<syn::File>(tokens.clone()) {
        Ok(file) => prettyplease::unparse(&file),
        Err(_) => tokens.to_string(),
    }
}
