// Declarative endpoint: serializer + validator + per-method config + gates.
pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod request;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::attrs::Attrs;
use crate::error::{ApiError, ApiResult};
use crate::manager::ObjectManager;
use crate::store::{ObjectStore, Record, Selection};
use crate::validator::{Context, Lifecycle};

pub use config::{
    resolve_config, ConfigError, EndpointConfig, FilterError, Method, MethodConfig, MethodDraft,
};
pub use request::{ApiResponse, Caller, Reply, Request, RequestContext};

/// The structured-serializer collaborator: declares the validator type,
/// optionally the persisted model name, and how a stored record becomes a
/// representation bag. The engine never asks it to validate anything.
pub trait Serializer: Send + Sync + 'static {
    type Validator: Lifecycle;

    /// Model name this serializer persists to; an endpoint without an
    /// explicit model falls back to this.
    fn model(&self) -> Option<&str> {
        None
    }

    /// Convert a stored record into a representation bag. Read hooks run on
    /// the returned bag afterwards.
    fn represent(&self, record: &Record) -> Attrs {
        record.to_attrs()
    }
}

/// Pre-validation permission gate: checked with the request and normalized
/// URL parameters before the target collection is resolved.
#[derive(Clone)]
pub enum Gate {
    /// Always allow (the `true`/"no permission needed" cases).
    Allow,
    /// Always deny.
    Deny,
    /// Allow when the callable returns true.
    Check(Arc<dyn Fn(&Request, &Attrs) -> bool + Send + Sync>),
}

impl Gate {
    pub fn check<F>(gate: F) -> Self
    where
        F: Fn(&Request, &Attrs) -> bool + Send + Sync + 'static,
    {
        Gate::Check(Arc::new(gate))
    }

    fn allows(&self, request: &Request, url_params: &Attrs) -> bool {
        match self {
            Gate::Allow => true,
            Gate::Deny => false,
            Gate::Check(gate) => gate(request, url_params),
        }
    }
}

/// Post-validation permission gate: checked by handlers after first-stage
/// validation, with the resolved collection and the validated bag.
#[derive(Clone)]
pub enum PostGate {
    Allow,
    Deny,
    Check(Arc<dyn Fn(&Request, &Attrs, &Selection, &Attrs) -> bool + Send + Sync>),
}

impl PostGate {
    pub fn check<F>(gate: F) -> Self
    where
        F: Fn(&Request, &Attrs, &Selection, &Attrs) -> bool + Send + Sync + 'static,
    {
        PostGate::Check(Arc::new(gate))
    }

    fn allows(
        &self,
        request: &Request,
        url_params: &Attrs,
        selection: &Selection,
        validated: &Attrs,
    ) -> bool {
        match self {
            PostGate::Allow => true,
            PostGate::Deny => false,
            PostGate::Check(gate) => gate(request, url_params, selection, validated),
        }
    }
}

/// The pre/post gate pair guarding one method.
#[derive(Clone)]
pub struct GatePair {
    pub pre: Gate,
    pub post: PostGate,
}

impl Default for GatePair {
    fn default() -> Self {
        Self {
            pre: Gate::Allow,
            post: PostGate::Allow,
        }
    }
}

impl GatePair {
    pub fn new(pre: Gate, post: PostGate) -> Self {
        Self { pre, post }
    }

    /// Deny everything, pre and post.
    pub fn deny() -> Self {
        Self {
            pre: Gate::Deny,
            post: PostGate::Deny,
        }
    }
}

pub type HandlerFn<S> =
    Box<dyn Fn(&Endpoint<S>, &mut RequestContext) -> ApiResult<Reply> + Send + Sync>;

type TransformFn = dyn Fn(Value) -> Value + Send + Sync;

/// One resource endpoint: a store handle, a serializer/validator pair, the
/// resolved per-method config, permission gates and optional handler
/// overrides. Built once via [`Endpoint::builder`] and immutable afterwards.
pub struct Endpoint<S: Serializer> {
    name: String,
    store: Arc<dyn ObjectStore>,
    serializer: S,
    model: String,
    config: EndpointConfig,
    default_gates: GatePair,
    gates: HashMap<Method, GatePair>,
    overrides: HashMap<Method, HandlerFn<S>>,
    transform_in: Option<Arc<TransformFn>>,
    transform_out: Option<Arc<TransformFn>>,
}

impl<S: Serializer> std::fmt::Debug for Endpoint<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl<S: Serializer> Endpoint<S> {
    pub fn builder(
        name: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        serializer: S,
    ) -> EndpointBuilder<S> {
        EndpointBuilder {
            name: name.into(),
            store,
            serializer,
            model: None,
            raw: Vec::new(),
            default_gates: GatePair::default(),
            gates: HashMap::new(),
            overrides: HashMap::new(),
            transform_in: None,
            transform_out: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// A manager bound to this endpoint's store and model, carrying the
    /// request into the validator context.
    pub fn manager(&self, context: Context) -> ObjectManager<S::Validator> {
        ObjectManager::new(self.store.clone(), self.model.clone(), context)
    }

    pub(crate) fn gate_pair(&self, method: Method) -> &GatePair {
        self.gates.get(&method).unwrap_or(&self.default_gates)
    }

    pub(crate) fn check_pre_gate(
        &self,
        method: Method,
        request: &Request,
        url_params: &Attrs,
    ) -> ApiResult<()> {
        if self.gate_pair(method).pre.allows(request, url_params) {
            Ok(())
        } else {
            tracing::warn!(endpoint = %self.name, method = %method, "pre-gate denied request");
            Err(ApiError::PermissionDenied)
        }
    }

    pub(crate) fn check_post_gate(
        &self,
        method: Method,
        cx: &RequestContext,
        validated: &Attrs,
    ) -> ApiResult<()> {
        let pair = self.gate_pair(method);
        if pair
            .post
            .allows(&cx.request, &cx.url_params, &cx.selection, validated)
        {
            Ok(())
        } else {
            tracing::warn!(endpoint = %self.name, method = %method, "post-gate denied request");
            Err(ApiError::PermissionDenied)
        }
    }
}

/// Assembles an [`Endpoint`], resolving the raw config and the model at
/// build time so misconfigured endpoints fail before they serve a request.
pub struct EndpointBuilder<S: Serializer> {
    name: String,
    store: Arc<dyn ObjectStore>,
    serializer: S,
    model: Option<String>,
    raw: Vec<(String, MethodDraft)>,
    default_gates: GatePair,
    gates: HashMap<Method, GatePair>,
    overrides: HashMap<Method, HandlerFn<S>>,
    transform_in: Option<Arc<TransformFn>>,
    transform_out: Option<Arc<TransformFn>>,
}

impl<S: Serializer> EndpointBuilder<S> {
    /// Explicit model name, overriding the serializer's.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a raw config entry. The key may name several methods at once
    /// (`"get,post"`).
    pub fn config(mut self, key: &str, draft: MethodDraft) -> Self {
        self.raw.push((key.to_string(), draft));
        self
    }

    /// Gate pair applied to methods without their own.
    pub fn can_default(mut self, gates: GatePair) -> Self {
        self.default_gates = gates;
        self
    }

    /// Gate pair for one method.
    pub fn can(mut self, method: Method, gates: GatePair) -> Self {
        self.gates.insert(method, gates);
        self
    }

    /// Replace the default handler for one method.
    pub fn on<F>(mut self, method: Method, handler: F) -> Self
    where
        F: Fn(&Endpoint<S>, &mut RequestContext) -> ApiResult<Reply> + Send + Sync + 'static,
    {
        self.overrides.insert(method, Box::new(handler));
        self
    }

    /// Rewrite incoming payloads before they reach handlers.
    pub fn transform_input<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform_in = Some(Arc::new(transform));
        self
    }

    /// Rewrite outgoing bodies after handlers return.
    pub fn transform_output<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.transform_out = Some(Arc::new(transform));
        self
    }

    pub fn build(self) -> Result<Endpoint<S>, ConfigError> {
        let raw: Vec<(&str, MethodDraft)> = self
            .raw
            .iter()
            .map(|(key, draft)| (key.as_str(), draft.clone()))
            .collect();
        let config = resolve_config(&self.name, &raw)?;
        if config.is_empty() {
            return Err(ConfigError::EmptyConfig {
                endpoint: self.name,
            });
        }

        let model = match self.model.or_else(|| self.serializer.model().map(String::from)) {
            Some(model) => model,
            None => {
                return Err(ConfigError::ModelUnresolved {
                    endpoint: self.name,
                })
            }
        };

        Ok(Endpoint {
            name: self.name,
            store: self.store,
            serializer: self.serializer,
            model,
            config,
            default_gates: self.default_gates,
            gates: self.gates,
            overrides: self.overrides,
            transform_in: self.transform_in,
            transform_out: self.transform_out,
        })
    }
}
