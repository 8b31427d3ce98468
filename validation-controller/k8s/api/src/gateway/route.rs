use super::options::{OptionsConfigRefs, RouteOptions};
use crate::ResourceRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: Option<String>,
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    pub options: Option<RouteOptions>,
    pub options_config_refs: Option<OptionsConfigRefs>,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub enum Action {
    #[serde(rename = "routeAction")]
    Route(RouteAction),
    #[serde(rename = "delegateAction")]
    Delegate(DelegateAction),
    #[serde(rename = "directResponseAction")]
    DirectResponse(DirectResponseAction),
    #[serde(rename = "redirectAction")]
    Redirect(RedirectAction),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum RouteAction {
    Single(Destination),
    Multi(MultiDestination),
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Destination {
    pub upstream: ResourceRef,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct MultiDestination {
    #[serde(default)]
    pub destinations: Vec<WeightedDestination>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct WeightedDestination {
    pub destination: Destination,
    #[serde(default)]
    pub weight: u32,
}

/// Delegates the route to one or more route tables.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DelegateAction {
    #[serde(rename = "ref")]
    pub reference: Option<ResourceRef>,
    pub selector: Option<RouteTableSelector>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct RouteTableSelector {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Namespaces to select from. Empty means the namespace of the
    /// delegating resource; `*` means all namespaces.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DirectResponseAction {
    pub status: u32,
    pub body: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedirectAction {
    pub host_redirect: Option<String>,
    pub path_redirect: Option<String>,
}

/// Matches requests by path. Only one of the path fields may be set; with
/// none set the matcher is a `/` prefix match.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Matcher {
    pub prefix: Option<String>,
    pub exact: Option<String>,
    pub regex: Option<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathMatch<'m> {
    Prefix(&'m str),
    Exact(&'m str),
    Regex(&'m str),
}

impl Matcher {
    pub fn prefix(prefix: impl ToString) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    pub fn path(&self) -> PathMatch<'_> {
        if let Some(exact) = self.exact.as_deref() {
            return PathMatch::Exact(exact);
        }
        if let Some(regex) = self.regex.as_deref() {
            return PathMatch::Regex(regex);
        }
        PathMatch::Prefix(self.prefix.as_deref().unwrap_or("/"))
    }

    /// Counts how many path specifiers are set.
    pub fn path_specifiers(&self) -> usize {
        [&self.prefix, &self.exact, &self.regex]
            .iter()
            .filter(|p| p.is_some())
            .count()
    }

    /// True when the matcher matches every request.
    pub fn is_catch_all(&self) -> bool {
        self.methods.is_empty() && self.path() == PathMatch::Prefix("/")
    }
}

impl PathMatch<'_> {
    /// The literal path of the match; regexes have none.
    pub fn literal(&self) -> Option<&str> {
        match self {
            PathMatch::Prefix(p) | PathMatch::Exact(p) => Some(p),
            PathMatch::Regex(_) => None,
        }
    }
}

impl Route {
    /// Matchers with the implicit `/` prefix made explicit.
    pub fn effective_matchers(&self) -> Vec<Matcher> {
        if self.matchers.is_empty() {
            return vec![Matcher::prefix("/")];
        }
        self.matchers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flattened_actions() {
        let route: Route = serde_json::from_value(serde_json::json!({
            "matchers": [{ "prefix": "/api" }],
            "routeAction": {
                "single": { "upstream": { "name": "petstore", "namespace": "gloo-system" } }
            }
        }))
        .expect("route must parse");
        assert_eq!(
            route.action,
            Action::Route(RouteAction::Single(Destination {
                upstream: ResourceRef::new("gloo-system", "petstore"),
            }))
        );

        let route: Route = serde_json::from_value(serde_json::json!({
            "delegateAction": { "ref": { "name": "rt" } }
        }))
        .expect("route must parse");
        assert_eq!(
            route.action,
            Action::Delegate(DelegateAction {
                reference: Some(ResourceRef::new("", "rt")),
                selector: None,
            })
        );
    }

    #[test]
    fn empty_matcher_is_catch_all() {
        assert!(Matcher::default().is_catch_all());
        assert!(Matcher::prefix("/").is_catch_all());
        assert!(!Matcher::prefix("/api").is_catch_all());
        let exact = Matcher {
            exact: Some("/".to_string()),
            ..Default::default()
        };
        assert!(!exact.is_catch_all());
    }
}
