// Explicit hook registration tables and their sequencing rules.
use std::collections::BTreeMap;

use serde_json::Value;

use crate::attrs::Attrs;
use crate::error::ApiResult;
use crate::store::Record;
use crate::validator::Lifecycle;

/// Cleans one field: the returned value replaces the stored one.
pub type CleanFn<V> = fn(&mut V, Value) -> ApiResult<Value>;
/// Computes a default for an absent field during creation.
pub type DefaultFn<V> = fn(&mut V) -> Value;
/// Per-field check over the field's value.
pub type FieldFn<V> = fn(&V, &Value) -> ApiResult<()>;
/// Per-field check that also receives the whole bag.
pub type FieldAttrsFn<V> = fn(&V, &Value, &Attrs) -> ApiResult<()>;
/// Cross-field check over the whole bag (reached through the validator).
pub type CheckFn<V> = fn(&mut V) -> ApiResult<()>;
/// Representation-time rewrite of one field's display value.
pub type ReadFn<V> = fn(&V, &Value, &Record) -> Value;

enum FieldHook<V> {
    Plain(FieldFn<V>),
    WithAttrs(FieldAttrsFn<V>),
}

/// The hook table a validator declares once, replacing name-prefix scanning
/// with explicit registration.
///
/// Ordering is deterministic: field-scoped hooks run in alphabetical order
/// of the field name, cross-field checks in alphabetical order of their
/// registered name. Field-scoped hooks only fire for fields present in the
/// bag; `default` hooks are the one exception and fire for *absent* fields,
/// and only while creating.
pub struct HookRegistry<V> {
    cleaners: BTreeMap<&'static str, CleanFn<V>>,
    defaults: BTreeMap<&'static str, DefaultFn<V>>,
    fields: BTreeMap<&'static str, FieldHook<V>>,
    checks: BTreeMap<&'static str, CheckFn<V>>,
    readers: BTreeMap<&'static str, ReadFn<V>>,
}

impl<V: Lifecycle> HookRegistry<V> {
    pub fn new() -> Self {
        Self {
            cleaners: BTreeMap::new(),
            defaults: BTreeMap::new(),
            fields: BTreeMap::new(),
            checks: BTreeMap::new(),
            readers: BTreeMap::new(),
        }
    }

    pub fn clean(mut self, field: &'static str, hook: CleanFn<V>) -> Self {
        self.cleaners.insert(field, hook);
        self
    }

    pub fn default(mut self, field: &'static str, hook: DefaultFn<V>) -> Self {
        self.defaults.insert(field, hook);
        self
    }

    pub fn field(mut self, field: &'static str, hook: FieldFn<V>) -> Self {
        self.fields.insert(field, FieldHook::Plain(hook));
        self
    }

    /// Variant of [`HookRegistry::field`] for hooks that need the whole bag.
    pub fn field_with_attrs(mut self, field: &'static str, hook: FieldAttrsFn<V>) -> Self {
        self.fields.insert(field, FieldHook::WithAttrs(hook));
        self
    }

    pub fn check(mut self, name: &'static str, hook: CheckFn<V>) -> Self {
        self.checks.insert(name, hook);
        self
    }

    pub fn read(mut self, field: &'static str, hook: ReadFn<V>) -> Self {
        self.readers.insert(field, hook);
        self
    }

    pub(crate) fn run_cleaners(&self, validator: &mut V) -> ApiResult<()> {
        for field in validator.attrs().sorted_keys() {
            let Some(hook) = self.cleaners.get(field.as_str()) else {
                continue;
            };
            let Some(value) = validator.attrs().get(&field).cloned() else {
                continue;
            };
            tracing::trace!(field = %field, "running clean hook");
            let cleaned = hook(validator, value)?;
            validator.attrs_mut().insert(field, cleaned);
        }
        Ok(())
    }

    pub(crate) fn run_defaults(&self, validator: &mut V) -> ApiResult<()> {
        if !validator.is_create() {
            return Ok(());
        }
        for (&field, hook) in &self.defaults {
            if validator.attrs().contains(field) {
                continue;
            }
            tracing::trace!(field, "supplying default");
            let value = hook(validator);
            validator.attrs_mut().insert(field, value);
        }
        Ok(())
    }

    pub(crate) fn run_field_checks(&self, validator: &V) -> ApiResult<()> {
        for field in validator.attrs().sorted_keys() {
            let Some(hook) = self.fields.get(field.as_str()) else {
                continue;
            };
            let Some(value) = validator.attrs().get(&field) else {
                continue;
            };
            tracing::trace!(field = %field, "running field check");
            match hook {
                FieldHook::Plain(check) => check(validator, value)?,
                FieldHook::WithAttrs(check) => check(validator, value, validator.attrs())?,
            }
        }
        Ok(())
    }

    pub(crate) fn run_checks(&self, validator: &mut V) -> ApiResult<()> {
        for (&name, hook) in &self.checks {
            tracing::trace!(check = name, "running cross-field check");
            hook(validator)?;
        }
        Ok(())
    }

    pub(crate) fn run_readers(&self, validator: &mut V, instance: &Record) -> ApiResult<()> {
        for field in validator.attrs().sorted_keys() {
            let Some(hook) = self.readers.get(field.as_str()) else {
                continue;
            };
            let prepared = match validator.attrs().get(&field) {
                Some(value) => hook(validator, value, instance),
                None => continue,
            };
            validator.attrs_mut().insert(field, prepared);
        }
        Ok(())
    }
}
