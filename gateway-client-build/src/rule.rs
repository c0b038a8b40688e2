//! HTTP binding rule extraction.

use crate::descriptor::{HttpRule, MethodDescriptorProto, Pattern};

/// HTTP verb of a binding rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

/// Where the request body comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BodySelector {
    /// `body: "*"`, the whole request message.
    Whole,
    /// `body: ""` or absent.
    None,
    /// `body: "<field>"`, one top-level field.
    Field(String),
}

impl BodySelector {
    fn parse(body: &str) -> Self {
        match body {
            "" => BodySelector::None,
            "*" => BodySelector::Whole,
            field => BodySelector::Field(field.to_string()),
        }
    }
}

/// A method's normalized HTTP binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct BindingRule {
    pub verb: Verb,
    pub path_pattern: String,
    pub body: BodySelector,
}

impl BindingRule {
    fn from_http(http: &HttpRule) -> Option<Self> {
        let (verb, path) = match http.pattern.as_ref()? {
            Pattern::Get(path) => (Verb::Get, path),
            Pattern::Post(path) => (Verb::Post, path),
            Pattern::Put(path) => (Verb::Put, path),
            Pattern::Patch(path) => (Verb::Patch, path),
            Pattern::Delete(path) => (Verb::Delete, path),
            Pattern::Custom(_) => return None,
        };
        let body = match verb {
            Verb::Get => BodySelector::None,
            _ => BodySelector::parse(&http.body),
        };
        Some(BindingRule {
            verb,
            path_pattern: path.clone(),
            body,
        })
    }

    /// Path parameter names, in pattern order.
    ///
    /// `{name=pattern}` captures are reported by name.
    pub(crate) fn path_params(&self) -> Vec<&str> {
        let mut params = Vec::new();
        let mut rest = self.path_pattern.as_str();
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let inner = &rest[open + 1..open + close];
            let name = inner.split_once('=').map_or(inner, |(name, _)| name);
            params.push(name);
            rest = &rest[open + close + 1..];
        }
        params
    }

    /// Whether `{name}` appears literally in the pattern.
    pub(crate) fn binds_path(&self, name: &str) -> bool {
        self.path_pattern.contains(&format!("{{{name}}}"))
    }
}

/// Read the `google.api.http` annotation of a method.
///
/// Returns `None` for a missing annotation or a `custom` pattern.
pub(crate) fn extract_rule(method: &MethodDescriptorProto) -> Option<BindingRule> {
    let http = method.options.as_ref()?.http.as_ref()?;
    BindingRule::from_http(http)
}

/// A method gets a binding iff it has a rule and does not stream requests.
pub(crate) fn is_binding_compatible(method: &MethodDescriptorProto) -> bool {
    extract_rule(method).is_some() && !method.client_streaming.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{CustomHttpPattern, MethodOptions};

    fn method(pattern: Option<Pattern>, body: &str) -> MethodDescriptorProto {
        MethodDescriptorProto {
            name: Some("Call".into()),
            options: Some(MethodOptions {
                http: Some(HttpRule {
                    pattern,
                    body: body.into(),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_rule_verbs() {
        let cases = [
            (Pattern::Get("/v1/a".into()), Verb::Get),
            (Pattern::Post("/v1/a".into()), Verb::Post),
            (Pattern::Put("/v1/a".into()), Verb::Put),
            (Pattern::Patch("/v1/a".into()), Verb::Patch),
            (Pattern::Delete("/v1/a".into()), Verb::Delete),
        ];
        for (pattern, verb) in cases {
            let rule = extract_rule(&method(Some(pattern), "")).unwrap();
            assert_eq!(rule.verb, verb);
            assert_eq!(rule.path_pattern, "/v1/a");
        }
    }

    #[test]
    fn test_extract_rule_body_selector() {
        let rule = extract_rule(&method(Some(Pattern::Post("/v1/a".into())), "*")).unwrap();
        assert_eq!(rule.body, BodySelector::Whole);

        let rule = extract_rule(&method(Some(Pattern::Post("/v1/a".into())), "")).unwrap();
        assert_eq!(rule.body, BodySelector::None);

        let rule = extract_rule(&method(Some(Pattern::Patch("/v1/a".into())), "item")).unwrap();
        assert_eq!(rule.body, BodySelector::Field("item".into()));
    }

    #[test]
    fn test_get_never_has_body() {
        let rule = extract_rule(&method(Some(Pattern::Get("/v1/a".into())), "*")).unwrap();
        assert_eq!(rule.body, BodySelector::None);
    }

    #[test]
    fn test_unrecognized_rules() {
        let custom = Pattern::Custom(CustomHttpPattern {
            kind: "HEAD".into(),
            path: "/v1/a".into(),
        });
        assert!(extract_rule(&method(Some(custom), "")).is_none());
        assert!(extract_rule(&method(None, "")).is_none());
        assert!(extract_rule(&MethodDescriptorProto::default()).is_none());
    }

    #[test]
    fn test_client_streaming_is_incompatible() {
        let mut m = method(Some(Pattern::Post("/v1/upload".into())), "*");
        assert!(is_binding_compatible(&m));
        m.client_streaming = Some(true);
        assert!(!is_binding_compatible(&m));

        let mut server = method(Some(Pattern::Get("/v1/watch".into())), "");
        server.server_streaming = Some(true);
        assert!(is_binding_compatible(&server));
    }

    #[test]
    fn test_path_params() {
        let rule = extract_rule(&method(
            Some(Pattern::Get("/v1/shelves/{shelf}/books/{book=*}".into())),
            "",
        ))
        .unwrap();
        assert_eq!(rule.path_params(), ["shelf", "book"]);
        assert!(rule.binds_path("shelf"));
        assert!(!rule.binds_path("book"));
        assert!(!rule.binds_path("shelf_id"));
    }
}
