// Lifecycle validator: the phase surface every resource implements.
pub mod context;
pub mod hooks;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attrs::Attrs;
use crate::error::ApiResult;
use crate::store::{ObjectStore, Record, Selection};

pub use context::Context;
pub use hooks::HookRegistry;

/// Whether the validated operation creates a new record or updates one.
/// Read and delete flows carry no operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Create,
    Update,
}

/// Per-operation state owned by a validator.
///
/// One state (and one validator) exists per validated operation; the
/// operation kind is fixed at construction and never changes afterwards.
pub struct ValidatorState {
    pub attrs: Attrs,
    op: Option<Op>,
    pub model: String,
    pub store: Arc<dyn ObjectStore>,
    pub context: Context,
}

impl ValidatorState {
    pub fn new(
        attrs: Attrs,
        op: Option<Op>,
        model: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        context: Context,
    ) -> Self {
        Self {
            attrs,
            op,
            model: model.into(),
            store,
            context,
        }
    }

    pub fn op(&self) -> Option<Op> {
        self.op
    }

    pub fn is_create(&self) -> bool {
        self.op == Some(Op::Create)
    }

    pub fn is_update(&self) -> bool {
        self.op == Some(Op::Update)
    }
}

/// The hook surface of the validation/lifecycle machine.
///
/// Implementors supply storage for a [`ValidatorState`] and override only
/// the phases they care about; every phase defaults to a no-op. The manager
/// drives the phases in a fixed order and stops at the first error, so a
/// failing hook is guaranteed to prevent every later phase, the store
/// commit included.
///
/// Phase order for a create:
/// `pre` → clean hooks → `clean` → default hooks → `base` → field hooks →
/// cross-field checks → `will_create` → `will_create_or_update` → `base_db`
/// → commit → `did_create` → `did_create_or_update` → `post`.
/// Updates swap the `will_update`/`did_update` pair in and skip defaults;
/// deletes run only `pre` → `will_delete` → commit → `did_delete` → `post`.
pub trait Lifecycle: Sized {
    fn from_state(state: ValidatorState) -> Self;

    fn state(&self) -> &ValidatorState;

    fn state_mut(&mut self) -> &mut ValidatorState;

    /// The hook table for this validator. Defaults to an empty table.
    fn hooks() -> HookRegistry<Self> {
        HookRegistry::new()
    }

    fn attrs(&self) -> &Attrs {
        &self.state().attrs
    }

    fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.state_mut().attrs
    }

    fn is_create(&self) -> bool {
        self.state().is_create()
    }

    fn is_update(&self) -> bool {
        self.state().is_update()
    }

    fn context(&self) -> &Context {
        &self.state().context
    }

    /// Runs before anything else in a validation sequence. Use for
    /// preconditions such as required-field checks.
    fn pre(&mut self) -> ApiResult<()> {
        Ok(())
    }

    /// Value normalization and derived values. Runs after per-field clean
    /// hooks and before defaulting.
    fn clean(&mut self) -> ApiResult<()> {
        Ok(())
    }

    /// Cross-field checks shared by create and update.
    fn base(&mut self) -> ApiResult<()> {
        Ok(())
    }

    /// The only phase expected to read the persistent store (reachable via
    /// `self.state().store`). Always the last check before the commit so
    /// expensive work is deferred as long as possible.
    fn base_db(&mut self) -> ApiResult<()> {
        Ok(())
    }

    fn will_create(&mut self) -> ApiResult<()> {
        Ok(())
    }

    fn will_update(&mut self, _instance: &Record) -> ApiResult<()> {
        Ok(())
    }

    /// Runs after `will_create`/`will_update` on either path.
    fn will_create_or_update(&mut self) -> ApiResult<()> {
        Ok(())
    }

    fn will_delete(&mut self, _selection: &Selection) -> ApiResult<()> {
        Ok(())
    }

    fn did_create(&mut self, _instance: &Record) -> ApiResult<()> {
        Ok(())
    }

    fn did_update(&mut self, _instance: &Record) -> ApiResult<()> {
        Ok(())
    }

    fn did_create_or_update(&mut self, _instance: &Record) -> ApiResult<()> {
        Ok(())
    }

    fn did_delete(&mut self, _selection: &Selection) -> ApiResult<()> {
        Ok(())
    }

    /// Representation-time hook, invoked after per-field read hooks.
    fn will_read(&mut self, _instance: &Record) -> ApiResult<()> {
        Ok(())
    }

    /// Runs last after a fully successful sequence, whatever the operation.
    fn post(&mut self) -> ApiResult<()> {
        Ok(())
    }
}

/// A validator with no hooks and no overridden phases, for resources that
/// need lifecycle plumbing but no validation of their own.
pub struct DefaultValidator {
    state: ValidatorState,
}

impl Lifecycle for DefaultValidator {
    fn from_state(state: ValidatorState) -> Self {
        Self { state }
    }

    fn state(&self) -> &ValidatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ValidatorState {
        &mut self.state
    }
}
