#![allow(dead_code)]
// Shared fixtures: a phase-recording validator for lifecycle tests and a
// small `articles` resource for endpoint tests.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use vetkit::attrs::Attrs;
use vetkit::endpoint::{Endpoint, FilterError, MethodDraft, Serializer};
use vetkit::error::{fail_if, ApiResult};
use vetkit::store::{MemStore, ObjectStore, Record, Selection};
use vetkit::validator::{HookRegistry, Lifecycle, ValidatorState};

/// Phase log shared between a test and its validators via the context.
#[derive(Clone, Default)]
pub struct Trace(pub Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }
}

fn uppercased(value: &Value) -> Value {
    match value.as_str() {
        Some(s) => Value::from(s.to_uppercase()),
        None => value.clone(),
    }
}

/// Validator that records every phase it passes through. Failure points are
/// armed through attribute flags (`fail_check`, `fail_base_db`).
pub struct RecordingValidator {
    state: ValidatorState,
}

impl RecordingValidator {
    fn trace(&self) -> Trace {
        self.context()
            .get::<Trace>()
            .map(|t| Trace(t.0.clone()))
            .unwrap_or_default()
    }

    fn flagged(&self, flag: &str) -> bool {
        self.attrs().contains(flag)
    }
}

impl Lifecycle for RecordingValidator {
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
            .clean("a", |v: &mut Self, value| {
                v.trace().push("clean_a");
                Ok(value)
            })
            .clean("b", |v, value| {
                v.trace().push("clean_b");
                Ok(uppercased(&value))
            })
            .default("z", |v| {
                v.trace().push("default_z");
                json!("zed")
            })
            .field("a", |v, _value| {
                v.trace().push("field_a");
                Ok(())
            })
            .field_with_attrs("b", |v, value, attrs| {
                v.trace().push("field_b");
                assert_eq!(attrs.get("b"), Some(value));
                Ok(())
            })
            .check("check_one", |v| {
                v.trace().push("check_one");
                fail_if(v.flagged("fail_check"), "fail_check", "Check failed")
            })
            .check("check_two", |v| {
                v.trace().push("check_two");
                Ok(())
            })
            .read("title", |v, value, _instance| {
                v.trace().push("read_title");
                uppercased(value)
            })
    }

    fn pre(&mut self) -> ApiResult<()> {
        self.trace().push("pre");
        Ok(())
    }

    fn clean(&mut self) -> ApiResult<()> {
        self.trace().push("clean");
        Ok(())
    }

    fn base(&mut self) -> ApiResult<()> {
        self.trace().push("base");
        Ok(())
    }

    fn base_db(&mut self) -> ApiResult<()> {
        self.trace().push("base_db");
        fail_if(self.flagged("fail_base_db"), "fail_base_db", "Stored state rejected the change")
    }

    fn will_create(&mut self) -> ApiResult<()> {
        self.trace().push("will_create");
        Ok(())
    }

    fn will_update(&mut self, _instance: &Record) -> ApiResult<()> {
        self.trace().push("will_update");
        Ok(())
    }

    fn will_create_or_update(&mut self) -> ApiResult<()> {
        self.trace().push("will_create_or_update");
        Ok(())
    }

    fn will_delete(&mut self, _selection: &Selection) -> ApiResult<()> {
        self.trace().push("will_delete");
        Ok(())
    }

    fn did_create(&mut self, _instance: &Record) -> ApiResult<()> {
        self.trace().push("did_create");
        Ok(())
    }

    fn did_update(&mut self, _instance: &Record) -> ApiResult<()> {
        self.trace().push("did_update");
        Ok(())
    }

    fn did_create_or_update(&mut self, _instance: &Record) -> ApiResult<()> {
        self.trace().push("did_create_or_update");
        Ok(())
    }

    fn did_delete(&mut self, _selection: &Selection) -> ApiResult<()> {
        self.trace().push("did_delete");
        Ok(())
    }

    fn will_read(&mut self, _instance: &Record) -> ApiResult<()> {
        self.trace().push("will_read");
        Ok(())
    }

    fn post(&mut self) -> ApiResult<()> {
        self.trace().push("post");
        Ok(())
    }
}

/// Validator of the `articles` resource used by the endpoint tests.
pub struct ArticleValidator {
    state: ValidatorState,
}

impl Lifecycle for ArticleValidator {
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
            .field("title", |_, value| {
                fail_if(
                    value.as_str().map_or(true, str::is_empty),
                    "title",
                    "A title is required",
                )
            })
            .field("slug", |_, value| {
                fail_if(
                    value.as_str().map_or(false, |slug| slug.contains(' ')),
                    "slug",
                    "Boom",
                )
            })
            .check("rating_in_range", |v| {
                let in_range = match v.attrs().get("rating") {
                    None => true,
                    Some(rating) => rating.as_i64().map_or(false, |r| (0..=10).contains(&r)),
                };
                fail_if(!in_range, "rating", "Rating must be between 0 and 10")
            })
    }
}

pub struct ArticleSerializer;

impl Serializer for ArticleSerializer {
    type Validator = ArticleValidator;

    fn model(&self) -> Option<&str> {
        Some("articles")
    }
}

pub fn all_query(store: &dyn ObjectStore, model: &str, _url: &Attrs) -> ApiResult<Selection> {
    Ok(Selection::many(store.all(model)?))
}

pub fn by_id_query(store: &dyn ObjectStore, model: &str, url: &Attrs) -> ApiResult<Selection> {
    let id = url.get("id").cloned().unwrap_or(Value::Null);
    Ok(Selection::one(store.get(model, "id", &id)?))
}

pub fn title_filter(selection: Selection, raw: &str) -> Result<Selection, FilterError> {
    let raw = raw.to_string();
    let records = selection
        .into_records()
        .into_iter()
        .filter(|record| {
            record
                .get("title")
                .and_then(Value::as_str)
                .map_or(false, |title| title.contains(&raw))
        })
        .collect();
    Ok(Selection::many(records))
}

pub fn min_rating_filter(selection: Selection, raw: &str) -> Result<Selection, FilterError> {
    let min: i64 = raw
        .parse()
        .map_err(|_| FilterError::new(format!("`{raw}` is not an integer")))?;
    let records = selection
        .into_records()
        .into_iter()
        .filter(|record| record.get("rating").and_then(Value::as_i64).map_or(false, |r| r >= min))
        .collect();
    Ok(Selection::many(records))
}

pub fn article_store() -> Arc<MemStore> {
    Arc::new(MemStore::new())
}

/// One endpoint covering every verb; respond-level tests supply path
/// parameters directly.
pub fn article_endpoint(store: &Arc<MemStore>) -> Endpoint<ArticleSerializer> {
    let handle: Arc<dyn ObjectStore> = store.clone();
    Endpoint::builder("articles", handle, ArticleSerializer)
        .config(
            "get",
            MethodDraft::new()
                .query(all_query)
                .filter("title", title_filter)
                .filter("min_rating", min_rating_filter),
        )
        .config("post", MethodDraft::new())
        .config("patch,put,delete", MethodDraft::new().query(by_id_query))
        .build()
        .expect("article endpoint config")
}
