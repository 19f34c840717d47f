// Request values crossing the HTTP boundary, framework-neutral.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attrs::Attrs;
use crate::store::Selection;

/// Who is making the request, as established by the host framework's
/// authentication layer. Distinguishes the 401/403 permission responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Caller {
    #[default]
    Anonymous,
    User {
        id: String,
    },
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Caller::User { id: id.into() }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

/// An incoming request as the engine sees it: verb, payload and raw
/// parameters. The HTTP adapter builds one of these per call; tests build
/// them directly.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub data: Option<Value>,
    pub path_params: Vec<(String, String)>,
    pub query_params: Vec<(String, String)>,
    pub caller: Caller,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: None,
            path_params: Vec::new(),
            query_params: Vec::new(),
            caller: Caller::Anonymous,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((name.into(), value.into()));
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Everything a handler needs: the request, the (possibly transformed)
/// payload, the resolved collection and the normalized parameters.
#[derive(Debug)]
pub struct RequestContext {
    pub request: Request,
    pub data: Option<Value>,
    pub selection: Selection,
    pub url_params: Attrs,
    pub query_params: Attrs,
}

impl RequestContext {
    /// Is the payload a list of objects?
    pub fn data_has_many(&self) -> bool {
        matches!(self.data, Some(Value::Array(_)))
    }
}

/// The return shapes a handler may produce.
#[derive(Debug)]
pub enum Reply {
    /// Bare status code, empty body.
    Status(u16),
    /// Body with the default 200 status.
    Body(Value),
    /// Body plus explicit status code.
    BodyStatus(Value, u16),
    /// A fully built response, passed through untouched except for the
    /// output transform.
    Response(ApiResponse),
}

/// What the dispatcher hands back to the HTTP adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A response with an empty body.
    pub fn no_content(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }
}
