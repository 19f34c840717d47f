// Orchestrates validator phases around store mutations.
use std::sync::Arc;

use crate::attrs::Attrs;
use crate::error::{ApiError, ApiResult};
use crate::store::{ObjectStore, Record, Selection};
use crate::validator::{Context, HookRegistry, Lifecycle, Op, ValidatorState};

/// Binds a validator type to a store and drives the lifecycle sequence.
///
/// One manager handles one operation (or one validate-then-finish pair):
/// the first `make_validator`/`validate_only` call fixes the attribute bag
/// and operation kind, and the `do_*` methods continue from the lifecycle
/// phase. Supplying fresh attributes after a validator exists is a contract
/// violation, which is what makes the two-step "validate in the request
/// handler, commit elsewhere" protocol safe.
pub struct ObjectManager<V: Lifecycle> {
    store: Arc<dyn ObjectStore>,
    model: String,
    context: Context,
    hooks: HookRegistry<V>,
    validator: Option<V>,
}

impl<V: Lifecycle> ObjectManager<V> {
    pub fn new(store: Arc<dyn ObjectStore>, model: impl Into<String>, context: Context) -> Self {
        Self {
            store,
            model: model.into(),
            context,
            hooks: V::hooks(),
            validator: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn validator(&self) -> Option<&V> {
        self.validator.as_ref()
    }

    /// Build the validator for this operation. Exactly one validator exists
    /// per manager; calling this twice replaces the first one.
    pub fn make_validator(&mut self, attrs: Attrs, op: Option<Op>) -> &mut V {
        let state = ValidatorState::new(
            attrs,
            op,
            self.model.clone(),
            self.store.clone(),
            self.context.clone(),
        );
        self.validator = Some(V::from_state(state));
        self.validator.as_mut().expect("validator just set")
    }

    fn validator_mut(&mut self) -> ApiResult<&mut V> {
        self.validator.as_mut().ok_or_else(|| {
            ApiError::Contract("call make_validator before continuing an operation".into())
        })
    }

    /// First-stage phases, shared by every write path:
    /// `pre` → clean hooks → `clean` → defaults → `base` → field hooks →
    /// cross-field checks.
    fn first_stage(hooks: &HookRegistry<V>, validator: &mut V) -> ApiResult<()> {
        validator.pre()?;
        hooks.run_cleaners(validator)?;
        validator.clean()?;
        hooks.run_defaults(validator)?;
        validator.base()?;
        hooks.run_field_checks(validator)?;
        hooks.run_checks(validator)?;
        Ok(())
    }

    /// Run the validation phases without touching the lifecycle or store.
    ///
    /// With `Some(attrs)` a fresh validator is built carrying no operation;
    /// with `None` the previously built validator is validated in place.
    /// Returns the validated bag.
    pub fn validate_only(&mut self, attrs: Option<Attrs>) -> ApiResult<Attrs> {
        if let Some(attrs) = attrs {
            if self.validator.is_some() {
                return Err(ApiError::Contract(
                    "attributes were already validated; build a new manager to validate again"
                        .into(),
                ));
            }
            self.make_validator(attrs, None);
        }
        let hooks = &self.hooks;
        let validator = self.validator.as_mut().ok_or_else(|| {
            ApiError::Contract("call make_validator before validate_only".into())
        })?;
        Self::first_stage(hooks, validator)?;
        Ok(validator.attrs().clone())
    }

    /// Validate `attrs` and create a record from the validated bag.
    ///
    /// Pass `None` to continue from an earlier `validate_only` pass; the
    /// lifecycle phases then run against the already-validated bag.
    pub fn do_create(&mut self, attrs: Option<Attrs>) -> ApiResult<Record> {
        match (&self.validator, attrs) {
            (None, Some(attrs)) => {
                self.make_validator(attrs, Some(Op::Create));
                self.validate_only(None)?;
            }
            (None, None) => {
                return Err(ApiError::Contract(
                    "do_create needs attributes or a prior validation pass".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ApiError::Contract(
                    "attributes were already validated; do_create cannot take new ones".into(),
                ));
            }
            (Some(_), None) => {}
        }

        tracing::debug!(model = %self.model, "creating record");
        let (store, model) = (self.store.clone(), self.model.clone());
        let validator = self.validator_mut()?;

        validator.will_create()?;
        validator.will_create_or_update()?;
        validator.base_db()?;

        let record = store.create(&model, validator.attrs())?;

        validator.did_create(&record)?;
        validator.did_create_or_update(&record)?;
        validator.post()?;
        Ok(record)
    }

    /// Validate `attrs` and copy the validated bag onto an existing record.
    pub fn do_update(&mut self, instance: &Record, attrs: Option<Attrs>) -> ApiResult<Record> {
        match (&self.validator, attrs) {
            (None, Some(attrs)) => {
                self.make_validator(attrs, Some(Op::Update));
                self.validate_only(None)?;
            }
            (None, None) => {
                return Err(ApiError::Contract(
                    "do_update needs attributes or a prior validation pass".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ApiError::Contract(
                    "attributes were already validated; do_update cannot take new ones".into(),
                ));
            }
            (Some(_), None) => {}
        }

        tracing::debug!(model = %self.model, id = ?instance.id(), "updating record");
        let (store, model) = (self.store.clone(), self.model.clone());
        let validator = self.validator_mut()?;

        validator.will_update(instance)?;
        validator.will_create_or_update()?;
        validator.base_db()?;

        let record = store.update(&model, instance, validator.attrs())?;

        validator.did_update(&record)?;
        validator.did_create_or_update(&record)?;
        validator.post()?;
        Ok(record)
    }

    /// Delete a selection. Only the delete-specific hooks run; the
    /// clean/base/field/check phases are skipped entirely.
    pub fn do_delete(&mut self, selection: Selection, attrs: Attrs) -> ApiResult<Selection> {
        if self.validator.is_none() {
            self.make_validator(attrs, None);
            self.validator_mut()?.pre()?;
        }

        tracing::debug!(model = %self.model, count = selection.len(), "deleting records");
        let (store, model) = (self.store.clone(), self.model.clone());
        let validator = self.validator_mut()?;

        validator.will_delete(&selection)?;
        let deleted = store.delete(&model, selection)?;
        validator.did_delete(&deleted)?;
        validator.post()?;
        Ok(deleted)
    }

    /// Validate every bag fully, then run the pre-commit lifecycle phases
    /// for all items, then perform a single bulk insert, then run the
    /// post-commit phases in input order.
    ///
    /// Any failure before the bulk insert — first-stage or pre-commit, on
    /// any item — prevents every insert. Failures in post-commit hooks
    /// propagate but do not undo the insert.
    pub fn do_create_many(&mut self, batch: Vec<Attrs>) -> ApiResult<Vec<Record>> {
        let mut validators: Vec<V> = Vec::with_capacity(batch.len());
        for attrs in batch {
            let state = ValidatorState::new(
                attrs,
                Some(Op::Create),
                self.model.clone(),
                self.store.clone(),
                self.context.clone(),
            );
            let mut validator = V::from_state(state);
            Self::first_stage(&self.hooks, &mut validator)?;
            validators.push(validator);
        }

        for validator in &mut validators {
            validator.will_create()?;
            validator.will_create_or_update()?;
            validator.base_db()?;
        }

        let payloads: Vec<Attrs> = validators
            .iter()
            .map(|validator| validator.attrs().clone())
            .collect();
        tracing::debug!(model = %self.model, count = payloads.len(), "bulk-creating records");
        let records = self.store.create_many(&self.model, &payloads)?;

        for (validator, record) in validators.iter_mut().zip(&records) {
            validator.did_create(record)?;
            validator.did_create_or_update(record)?;
            validator.post()?;
        }
        Ok(records)
    }

    /// Representation phase: run read hooks and `will_read` over a
    /// serialized bag. Reuses the operation's validator when one exists
    /// (re-seeding its bag), so read hooks can see state collected during
    /// validation.
    pub fn read(&mut self, attrs: Attrs, instance: &Record) -> ApiResult<Attrs> {
        match self.validator.as_mut() {
            Some(validator) => validator.state_mut().attrs = attrs,
            None => {
                self.make_validator(attrs, None);
            }
        }
        let hooks = &self.hooks;
        let validator = self.validator.as_mut().expect("validator just ensured");
        hooks.run_readers(validator, instance)?;
        validator.will_read(instance)?;
        Ok(validator.attrs().clone())
    }
}
