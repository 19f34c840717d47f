// Definition-time endpoint configuration: shorthand expansion + validation.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attrs::Attrs;
use crate::error::ApiResult;
use crate::store::{ObjectStore, Selection};

/// The HTTP methods an endpoint config may bind. `HEAD` is not
/// configurable; requests using it are dispatched through the `get` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::Post,
        Method::Patch,
        Method::Put,
        Method::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Patch => "patch",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }

    /// Parse a config key; only the five configurable names are accepted.
    pub fn from_config_key(key: &str) -> Option<Method> {
        match key {
            "get" => Some(Method::Get),
            "post" => Some(Method::Post),
            "patch" => Some(Method::Patch),
            "put" => Some(Method::Put),
            "delete" => Some(Method::Delete),
            _ => None,
        }
    }

    /// Parse a request verb (case-insensitive); `HEAD` dispatches as `GET`.
    pub fn from_verb(verb: &str) -> Option<Method> {
        let lower = verb.to_ascii_lowercase();
        match lower.as_str() {
            "head" => Some(Method::Get),
            other => Method::from_config_key(other),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a filter function; the dispatcher converts it into a
/// validation failure keyed by the filter's query parameter.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FilterError {
    pub message: String,
}

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Resolves the request's target collection from the store.
pub type QueryFn = dyn Fn(&dyn ObjectStore, &str, &Attrs) -> ApiResult<Selection> + Send + Sync;

/// Narrows a collection given the raw query-string value that named it.
pub type FilterFn = dyn Fn(Selection, &str) -> Result<Selection, FilterError> + Send + Sync;

/// One raw per-method config fragment, before resolution.
///
/// Closures are reference-counted so a single fragment can back several
/// methods of a comma-shorthand key (`"get,delete"`).
#[derive(Clone, Default)]
pub struct MethodDraft {
    query: Option<Arc<QueryFn>>,
    filters: Option<Vec<(String, Arc<FilterFn>)>>,
    fields_from_url: Option<Vec<String>>,
    no_param_casting: Option<bool>,
    allow_many: Option<bool>,
}

impl MethodDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query<F>(mut self, query: F) -> Self
    where
        F: Fn(&dyn ObjectStore, &str, &Attrs) -> ApiResult<Selection> + Send + Sync + 'static,
    {
        self.query = Some(Arc::new(query));
        self
    }

    /// Register a filter keyed by a query-string parameter. Filters apply
    /// in declaration order.
    pub fn filter<F>(mut self, param: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Selection, &str) -> Result<Selection, FilterError> + Send + Sync + 'static,
    {
        self.filters
            .get_or_insert_with(Vec::new)
            .push((param.into(), Arc::new(filter)));
        self
    }

    /// Names of URL parameters to merge into the request payload.
    pub fn fields_from_url(mut self, fields: &[&str]) -> Self {
        self.fields_from_url = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Leave URL and query-string parameters as raw strings.
    pub fn no_param_casting(mut self) -> Self {
        self.no_param_casting = Some(true);
        self
    }

    pub fn allow_many(mut self, allow: bool) -> Self {
        self.allow_many = Some(allow);
        self
    }

    /// Key-wise merge: entries set on `other` override this draft's.
    fn merge_from(&mut self, other: &MethodDraft) {
        if let Some(query) = &other.query {
            self.query = Some(query.clone());
        }
        if let Some(filters) = &other.filters {
            self.filters = Some(filters.clone());
        }
        if let Some(fields) = &other.fields_from_url {
            self.fields_from_url = Some(fields.clone());
        }
        if let Some(flag) = other.no_param_casting {
            self.no_param_casting = Some(flag);
        }
        if let Some(flag) = other.allow_many {
            self.allow_many = Some(flag);
        }
    }
}

impl fmt::Debug for MethodDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDraft")
            .field("query", &self.query.is_some())
            .field(
                "filters",
                &self
                    .filters
                    .as_ref()
                    .map(|fs| fs.iter().map(|(name, _)| name.clone()).collect::<Vec<_>>()),
            )
            .field("fields_from_url", &self.fields_from_url)
            .field("no_param_casting", &self.no_param_casting)
            .field("allow_many", &self.allow_many)
            .finish()
    }
}

/// Normalized per-method configuration. Immutable after resolution.
#[derive(Clone)]
pub struct MethodConfig {
    pub query: Option<Arc<QueryFn>>,
    pub filters: Vec<(String, Arc<FilterFn>)>,
    pub fields_from_url: Vec<String>,
    pub no_param_casting: bool,
    pub allow_many: bool,
}

impl MethodConfig {
    pub fn has_query(&self) -> bool {
        self.query.is_some()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl fmt::Debug for MethodConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodConfig")
            .field("query", &self.has_query())
            .field("filters", &self.filter_names())
            .field("fields_from_url", &self.fields_from_url)
            .field("no_param_casting", &self.no_param_casting)
            .field("allow_many", &self.allow_many)
            .finish()
    }
}

/// The resolved method-to-config table of one endpoint.
#[derive(Clone, Debug, Default)]
pub struct EndpointConfig {
    methods: HashMap<Method, MethodConfig>,
}

impl EndpointConfig {
    pub fn get(&self, method: Method) -> Option<&MethodConfig> {
        self.methods.get(&method)
    }

    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<Method> = self.methods.keys().copied().collect();
        methods.sort();
        methods
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }
}

/// Definition-time configuration errors. These surface while an endpoint is
/// being built — never during a live request — and always name the
/// offending endpoint and rule.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "endpoint `{endpoint}`: unknown HTTP method `{method}` in config \
         (allowed: get, post, patch, put, delete)"
    )]
    UnknownMethod { endpoint: String, method: String },

    #[error("endpoint `{endpoint}`: `{method}` config requires `query`")]
    QueryRequired { endpoint: String, method: Method },

    #[error("endpoint `{endpoint}`: `filters` cannot be used without `query` on `{method}`")]
    FiltersWithoutQuery { endpoint: String, method: Method },

    #[error("endpoint `{endpoint}`: config is empty")]
    EmptyConfig { endpoint: String },

    #[error("endpoint `{endpoint}`: no model declared and the serializer does not provide one")]
    ModelUnresolved { endpoint: String },
}

/// Expand and validate a raw config into an immutable [`EndpointConfig`].
///
/// Keys may name several methods at once (`"get,post"`); each listed method
/// receives the fragment. Fragments for the same method merge key-wise with
/// later entries overriding earlier ones. Rules enforced here: method names
/// must be known, `patch` and `delete` require `query`, and `filters`
/// require `query`. `allow_many` defaults to true.
pub fn resolve_config(
    endpoint: &str,
    raw: &[(&str, MethodDraft)],
) -> Result<EndpointConfig, ConfigError> {
    let mut drafts: HashMap<Method, MethodDraft> = HashMap::new();

    for (key, draft) in raw {
        for part in key.split(',') {
            let name = part.trim();
            let method =
                Method::from_config_key(name).ok_or_else(|| ConfigError::UnknownMethod {
                    endpoint: endpoint.to_string(),
                    method: name.to_string(),
                })?;
            drafts.entry(method).or_default().merge_from(draft);
        }
    }

    let mut methods = HashMap::new();
    for (method, draft) in drafts {
        let has_query = draft.query.is_some();

        if matches!(method, Method::Patch | Method::Delete) && !has_query {
            return Err(ConfigError::QueryRequired {
                endpoint: endpoint.to_string(),
                method,
            });
        }
        if draft.filters.is_some() && !has_query {
            return Err(ConfigError::FiltersWithoutQuery {
                endpoint: endpoint.to_string(),
                method,
            });
        }

        methods.insert(
            method,
            MethodConfig {
                query: draft.query,
                filters: draft.filters.unwrap_or_default(),
                fields_from_url: draft.fields_from_url.unwrap_or_default(),
                no_param_casting: draft.no_param_casting.unwrap_or(false),
                allow_many: draft.allow_many.unwrap_or(true),
            },
        );
    }

    Ok(EndpointConfig { methods })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_query() -> MethodDraft {
        MethodDraft::new().query(|_, _, _| Ok(Selection::Empty))
    }

    #[test]
    fn shorthand_expands_to_every_listed_method() {
        let config = resolve_config("things", &[("get,post", noop_query())]).unwrap();
        assert_eq!(config.methods(), vec![Method::Get, Method::Post]);
        assert!(config.get(Method::Get).unwrap().has_query());
        assert!(config.get(Method::Post).unwrap().has_query());
    }

    #[test]
    fn later_fragments_override_earlier_keys() {
        let config = resolve_config(
            "things",
            &[
                ("get,delete", noop_query().allow_many(true)),
                ("delete", MethodDraft::new().allow_many(false)),
            ],
        )
        .unwrap();

        assert!(config.get(Method::Get).unwrap().allow_many);
        let delete = config.get(Method::Delete).unwrap();
        assert!(!delete.allow_many);
        // the query from the earlier fragment survives the merge
        assert!(delete.has_query());
    }

    #[test]
    fn resolution_is_idempotent() {
        let raw = |flag: bool| {
            vec![
                (
                    "get,post",
                    noop_query().filter("kind", |sel, _| Ok(sel)).allow_many(flag),
                ),
                ("delete", noop_query()),
            ]
        };
        let first = resolve_config("things", &raw(true)).unwrap();
        let second = resolve_config("things", &raw(true)).unwrap();

        assert_eq!(first.methods(), second.methods());
        for method in first.methods() {
            let (a, b) = (first.get(method).unwrap(), second.get(method).unwrap());
            assert_eq!(a.filter_names(), b.filter_names());
            assert_eq!(a.fields_from_url, b.fields_from_url);
            assert_eq!(a.allow_many, b.allow_many);
            assert_eq!(a.no_param_casting, b.no_param_casting);
            assert_eq!(a.has_query(), b.has_query());
        }
    }

    #[test]
    fn unknown_method_names_the_endpoint() {
        let err = resolve_config("things", &[("fetch", MethodDraft::new())]).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("things"));
        assert!(message.contains("fetch"));
    }

    #[test]
    fn delete_requires_query() {
        let err = resolve_config("things", &[("delete", MethodDraft::new())]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::QueryRequired {
                method: Method::Delete,
                ..
            }
        ));
    }

    #[test]
    fn patch_requires_query() {
        let err = resolve_config("things", &[("patch", MethodDraft::new())]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::QueryRequired {
                method: Method::Patch,
                ..
            }
        ));
    }

    #[test]
    fn filters_require_query() {
        let draft = MethodDraft::new().filter("kind", |sel, _| Ok(sel));
        let err = resolve_config("things", &[("get", draft)]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FiltersWithoutQuery {
                method: Method::Get,
                ..
            }
        ));
    }

    #[test]
    fn allow_many_defaults_to_true() {
        let config = resolve_config("things", &[("post", MethodDraft::new())]).unwrap();
        assert!(config.get(Method::Post).unwrap().allow_many);
    }

    #[test]
    fn head_is_dispatched_as_get() {
        assert_eq!(Method::from_verb("HEAD"), Some(Method::Get));
        assert_eq!(Method::from_verb("head"), Some(Method::Get));
        // but head is not a configurable key
        assert_eq!(Method::from_config_key("head"), None);
    }
}
