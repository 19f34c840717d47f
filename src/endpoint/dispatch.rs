// Request dispatch: the single boundary where errors become responses.
use serde_json::Value;

use crate::attrs::Attrs;
use crate::endpoint::{
    ApiResponse, Endpoint, Method, MethodConfig, Reply, Request, RequestContext, Serializer,
};
use crate::error::{fail, ApiError, ApiResult};
use crate::store::Selection;

/// Cast a raw parameter string into a typed scalar: integer first, then
/// float, then the boolean literals, otherwise the string itself.
pub(crate) fn normalize_scalar(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn params_to_attrs(params: &[(String, String)], cast: bool) -> Attrs {
    params
        .iter()
        .map(|(name, value)| {
            let value = if cast {
                normalize_scalar(value)
            } else {
                Value::String(value.clone())
            };
            (name.clone(), value)
        })
        .collect()
}

impl<S: Serializer> Endpoint<S> {
    /// Dispatch one request.
    ///
    /// Validation, permission and not-found errors raised anywhere in the
    /// pipeline are mapped to responses here and nowhere else. Contract
    /// violations are programmer errors and come back as `Err` so the host
    /// can surface them loudly instead of masking them as a user-facing
    /// response.
    pub fn respond(&self, request: Request) -> Result<ApiResponse, ApiError> {
        let Some(method) = Method::from_verb(&request.method) else {
            return Ok(ApiResponse::no_content(405));
        };
        let Some(config) = self.config().get(method).cloned() else {
            return Ok(ApiResponse::no_content(405));
        };

        tracing::debug!(endpoint = %self.name(), method = %method, "dispatching request");
        match self.run_pipeline(method, &config, &request) {
            Ok(response) => Ok(response),
            Err(err @ ApiError::Contract(_)) => Err(err),
            Err(err) => {
                let authenticated = !request.caller.is_anonymous();
                Ok(ApiResponse::new(err.status_code(authenticated), err.body()))
            }
        }
    }

    fn run_pipeline(
        &self,
        method: Method,
        config: &MethodConfig,
        request: &Request,
    ) -> ApiResult<ApiResponse> {
        let cast = !config.no_param_casting;
        let url_params = params_to_attrs(&request.path_params, cast);
        let query_params = params_to_attrs(&request.query_params, cast);

        self.check_pre_gate(method, request, &url_params)?;

        let mut data = request.data.clone();
        if !config.fields_from_url.is_empty() {
            data = Some(self.merge_url_fields(config, &url_params, data)?);
        }
        if let Some(transform) = &self.transform_in {
            data = data.map(|value| transform(value));
        }

        let selection = self.resolve_selection(method, config, request, &url_params)?;

        let mut cx = RequestContext {
            request: request.clone(),
            data,
            selection,
            url_params,
            query_params,
        };
        let reply = self.handle(method, &mut cx)?;
        self.finish(method, reply)
    }

    /// Copy the configured URL parameters into the payload; list payloads
    /// receive the fragment on every element.
    fn merge_url_fields(
        &self,
        config: &MethodConfig,
        url_params: &Attrs,
        data: Option<Value>,
    ) -> ApiResult<Value> {
        let mut fragment = Attrs::new();
        for field in &config.fields_from_url {
            let value = url_params.get(field).ok_or_else(|| {
                ApiError::Contract(format!(
                    "`fields_from_url` key `{field}` is not a URL parameter of endpoint `{}`",
                    self.name()
                ))
            })?;
            fragment.insert(field.clone(), value.clone());
        }

        match data {
            None => Ok(fragment.into_value()),
            Some(Value::Object(map)) => Ok((&Attrs::from(map) + &fragment).into_value()),
            Some(Value::Array(items)) => {
                let mut merged = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(map) => {
                            merged.push((&Attrs::from(map) + &fragment).into_value());
                        }
                        _ => {
                            return Err(ApiError::Contract(format!(
                                "endpoint `{}` accepts a list payload, so `fields_from_url` \
                                 requires every element to be an object",
                                self.name()
                            )))
                        }
                    }
                }
                Ok(Value::Array(merged))
            }
            Some(other) => Ok(other),
        }
    }

    /// Resolve the target collection and narrow it through the configured
    /// filters, in declaration order, for each filter whose query-string
    /// parameter is present.
    fn resolve_selection(
        &self,
        method: Method,
        config: &MethodConfig,
        request: &Request,
        url_params: &Attrs,
    ) -> ApiResult<Selection> {
        let Some(query) = &config.query else {
            return Ok(Selection::Empty);
        };

        let mut selection = match query(self.store().as_ref(), self.model(), url_params) {
            Ok(selection) => selection,
            // PUT is allowed to miss: an object is created instead.
            Err(ApiError::NotFound(_)) if method == Method::Put => return Ok(Selection::Empty),
            Err(err) => return Err(err),
        };

        for (param, filter) in &config.filters {
            let Some(raw) = request.query_param(param) else {
                continue;
            };
            selection =
                filter(selection, raw).map_err(|err| fail(param.clone(), err.message))?;
        }
        Ok(selection)
    }

    /// Convert a handler reply into the final response, applying the output
    /// transform to mapping/list bodies.
    fn finish(&self, method: Method, reply: Reply) -> ApiResult<ApiResponse> {
        let (body, status) = match reply {
            Reply::Status(status) => return Ok(ApiResponse::no_content(status)),
            Reply::Response(response) => {
                let body = self.transform_body(response.body);
                return Ok(ApiResponse::new(response.status, body));
            }
            Reply::Body(body) => (body, 200),
            Reply::BodyStatus(body, status) => (body, status),
        };

        if !matches!(body, Value::Object(_) | Value::Array(_)) {
            return Err(ApiError::Contract(format!(
                "handler `on_{method}` of endpoint `{}` returned a body that is neither an \
                 object nor a list",
                self.name()
            )));
        }
        Ok(ApiResponse::new(status, self.transform_body(body)))
    }

    fn transform_body(&self, body: Value) -> Value {
        match (&self.transform_out, &body) {
            (Some(transform), Value::Object(_) | Value::Array(_)) => transform(body),
            _ => body,
        }
    }
}
