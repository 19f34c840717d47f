// Demo server: a `todos` resource over the in-memory store.
use std::sync::Arc;

use axum::Router;
use serde_json::Value;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use vetkit::endpoint::{Endpoint, FilterError, MethodDraft, Serializer};
use vetkit::error::{fail_if, ApiResult};
use vetkit::store::{MemStore, ObjectStore, Selection};
use vetkit::validator::{HookRegistry, Lifecycle, ValidatorState};

struct TodoValidator {
    state: ValidatorState,
}

impl Lifecycle for TodoValidator {
    fn from_state(state: ValidatorState) -> Self {
        Self { state }
    }

    fn state(&self) -> &ValidatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ValidatorState {
        &mut self.state
    }

    fn hooks() -> HookRegistry<Self> {
        HookRegistry::new()
            .clean("title", |_, value| {
                Ok(match value.as_str() {
                    Some(title) => Value::from(title.trim()),
                    None => value,
                })
            })
            .default("done", |_| Value::from(false))
            .field("title", |_, value| {
                fail_if(
                    value.as_str().map_or(true, str::is_empty),
                    "title",
                    "A todo needs a title",
                )
            })
            .check("done_is_boolean", |validator| {
                let done_is_bool = validator
                    .attrs()
                    .get("done")
                    .map_or(true, Value::is_boolean);
                fail_if(!done_is_bool, "done", "`done` must be a boolean")
            })
    }

    fn base(&mut self) -> ApiResult<()> {
        fail_if(
            self.attrs().is_empty(),
            "non_field_errors",
            "At least one field is required",
        )
    }
}

struct TodoSerializer;

impl Serializer for TodoSerializer {
    type Validator = TodoValidator;

    fn model(&self) -> Option<&str> {
        Some("todos")
    }
}

fn done_filter(selection: Selection, raw: &str) -> Result<Selection, FilterError> {
    let wanted: bool = raw
        .parse()
        .map_err(|_| FilterError::new(format!("`{raw}` is not a boolean")))?;
    let records = selection
        .into_records()
        .into_iter()
        .filter(|record| record.get("done") == Some(&Value::Bool(wanted)))
        .collect();
    Ok(Selection::many(records))
}

fn app(store: Arc<dyn ObjectStore>) -> anyhow::Result<Router> {
    let list = Endpoint::builder("todo-list", store.clone(), TodoSerializer)
        .config(
            "get",
            MethodDraft::new()
                .query(|store, model, _| Ok(Selection::many(store.all(model)?)))
                .filter("done", done_filter),
        )
        .config("post", MethodDraft::new())
        .build()?;

    let detail = Endpoint::builder("todo-detail", store, TodoSerializer)
        .config(
            "get,patch,delete",
            MethodDraft::new().query(|store, model, url| {
                let id = url.require("id")?;
                Ok(Selection::one(store.get(model, "id", id)?))
            }),
        )
        .build()?;

    Ok(Router::new()
        .merge(list.into_router("/todos"))
        .merge(detail.into_router("/todos/:id"))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let store: Arc<dyn ObjectStore> = Arc::new(MemStore::new());
    let router = app(store)?;

    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(3000);
    vetkit::http::serve(router, port).await
}
