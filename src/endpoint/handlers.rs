// Default per-method handlers. Any of these can be replaced via
// `EndpointBuilder::on`.
use serde_json::Value;

use crate::attrs::Attrs;
use crate::endpoint::{Endpoint, Method, Reply, RequestContext, Serializer};
use crate::error::{fail_non_field, ApiError, ApiResult};
use crate::manager::ObjectManager;
use crate::store::{Record, Selection};
use crate::validator::{Context, Op};

impl<S: Serializer> Endpoint<S> {
    pub(crate) fn handle(&self, method: Method, cx: &mut RequestContext) -> ApiResult<Reply> {
        if let Some(handler) = self.overrides.get(&method) {
            return handler(self, cx);
        }
        match method {
            Method::Get => self.on_get(cx),
            Method::Post => self.on_post(cx),
            Method::Put => self.on_put(cx),
            Method::Patch => self.on_patch(cx),
            Method::Delete => self.on_delete(cx),
        }
    }

    fn request_context(&self, cx: &RequestContext) -> Context {
        Context::new().with(cx.request.clone())
    }

    /// Payload as a single attribute bag; anything else is a 400.
    fn data_attrs(cx: &RequestContext) -> ApiResult<Attrs> {
        match &cx.data {
            Some(Value::Object(map)) => Ok(Attrs::from(map.clone())),
            Some(_) => Err(fail_non_field("Expected a JSON object")),
            None => Err(fail_non_field("A request body is required")),
        }
    }

    /// Serialize a record and run the representation hooks over it.
    fn represent_record(
        &self,
        manager: &mut ObjectManager<S::Validator>,
        record: &Record,
    ) -> ApiResult<Value> {
        let attrs = self.serializer.represent(record);
        Ok(manager.read(attrs, record)?.into_value())
    }

    /// Represent a whole selection: one record becomes an object, many
    /// become an array. The selection must not be empty.
    fn represent_selection(&self, cx: &RequestContext, selection: &Selection) -> ApiResult<Value> {
        let mut manager = self.manager(self.request_context(cx));
        match selection {
            Selection::Empty => Err(ApiError::Contract(format!(
                "endpoint `{}` tried to represent an empty selection",
                self.name()
            ))),
            Selection::One(record) => self.represent_record(&mut manager, record),
            Selection::Many(records) => {
                let mut bodies = Vec::with_capacity(records.len());
                for record in records {
                    bodies.push(self.represent_record(&mut manager, record)?);
                }
                Ok(Value::Array(bodies))
            }
        }
    }

    /// Validate, gate, create and represent a single object.
    fn create_one(&self, method: Method, cx: &RequestContext) -> ApiResult<Value> {
        let attrs = Self::data_attrs(cx)?;
        let mut manager = self.manager(self.request_context(cx));
        manager.make_validator(attrs, Some(Op::Create));
        let validated = manager.validate_only(None)?;
        self.check_post_gate(method, cx, &validated)?;
        let record = manager.do_create(None)?;
        self.represent_record(&mut manager, &record)
    }

    /// Validate every element of a list payload and bulk-create.
    fn create_many(&self, cx: &RequestContext, items: &[Value]) -> ApiResult<Value> {
        let mut batch = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Object(map) => batch.push(Attrs::from(map.clone())),
                _ => return Err(fail_non_field("Expected a list of JSON objects")),
            }
        }
        self.check_post_gate(Method::Post, cx, &Attrs::new())?;

        let mut manager = self.manager(self.request_context(cx));
        let records = manager.do_create_many(batch)?;

        let mut read_manager = self.manager(self.request_context(cx));
        let mut bodies = Vec::with_capacity(records.len());
        for record in &records {
            bodies.push(self.represent_record(&mut read_manager, record)?);
        }
        Ok(Value::Array(bodies))
    }

    /// Validate, gate, update and represent the single selected record.
    fn update_one(&self, method: Method, cx: &RequestContext) -> ApiResult<Value> {
        let instance = match &cx.selection {
            Selection::One(record) => record.clone(),
            Selection::Many(_) => {
                return Err(ApiError::Contract(format!(
                    "handler `on_{method}` of endpoint `{}` cannot update multiple records; \
                     override the handler to support that",
                    self.name()
                )))
            }
            Selection::Empty => {
                return Err(ApiError::NotFound("Nothing matches the request".into()))
            }
        };

        let attrs = Self::data_attrs(cx)?;
        let mut manager = self.manager(self.request_context(cx));
        manager.make_validator(attrs, Some(Op::Update));
        let validated = manager.validate_only(None)?;
        self.check_post_gate(method, cx, &validated)?;
        let record = manager.do_update(&instance, None)?;
        self.represent_record(&mut manager, &record)
    }

    fn on_get(&self, cx: &mut RequestContext) -> ApiResult<Reply> {
        self.check_post_gate(Method::Get, cx, &Attrs::new())?;
        match &cx.selection {
            Selection::Empty => Err(ApiError::NotFound("Nothing matches the request".into())),
            selection => Ok(Reply::Body(self.represent_selection(cx, selection)?)),
        }
    }

    fn on_post(&self, cx: &mut RequestContext) -> ApiResult<Reply> {
        let allow_many = self
            .config()
            .get(Method::Post)
            .map_or(true, |config| config.allow_many);

        let body = match &cx.data {
            Some(Value::Array(items)) => {
                if !allow_many {
                    return Err(fail_non_field("Multiple objects are not allowed"));
                }
                let items = items.clone();
                self.create_many(cx, &items)?
            }
            _ => self.create_one(Method::Post, cx)?,
        };
        Ok(Reply::BodyStatus(body, 201))
    }

    fn on_put(&self, cx: &mut RequestContext) -> ApiResult<Reply> {
        // No matching object: PUT creates one instead.
        if cx.selection.is_empty() {
            let body = self.create_one(Method::Put, cx)?;
            return Ok(Reply::BodyStatus(body, 201));
        }
        let body = self.update_one(Method::Put, cx)?;
        Ok(Reply::BodyStatus(body, 200))
    }

    fn on_patch(&self, cx: &mut RequestContext) -> ApiResult<Reply> {
        if cx.selection.is_empty() {
            return Err(ApiError::NotFound("Nothing matches the request".into()));
        }
        let body = self.update_one(Method::Patch, cx)?;
        Ok(Reply::BodyStatus(body, 200))
    }

    fn on_delete(&self, cx: &mut RequestContext) -> ApiResult<Reply> {
        let attrs = match &cx.data {
            Some(Value::Object(map)) => Attrs::from(map.clone()),
            _ => Attrs::new(),
        };
        self.check_post_gate(Method::Delete, cx, &attrs)?;

        // Capture the representation while the records are still loaded.
        let body = if cx.selection.is_empty() {
            Value::Array(Vec::new())
        } else {
            self.represent_selection(cx, &cx.selection)?
        };

        let mut manager = self.manager(self.request_context(cx));
        manager.do_delete(cx.selection.clone(), attrs)?;
        Ok(Reply::BodyStatus(body, 200))
    }
}
