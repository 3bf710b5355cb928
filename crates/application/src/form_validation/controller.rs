use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, error, trace};

use examgate_core::{AppError, AppResult, NonEmptyString};
use examgate_domain::{FormField, Validator};

use super::ports::{DebounceScheduler, DeferredTask, ScheduledTask, SubmitEvent};

/// Default quiet period before a changed field is validated.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Current field values keyed by field name.
pub type FormData = BTreeMap<String, String>;

/// Validation timing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormOptions {
    /// Quiet period before a changed field is validated.
    pub debounce: Duration,
    /// Debounce validation on change. When disabled, changes validate immediately.
    pub validate_on_change: bool,
    /// Validate immediately when a field loses focus.
    pub validate_on_blur: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            validate_on_change: true,
            validate_on_blur: true,
        }
    }
}

/// Result of a submit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// At least one field failed validation; the callback was not invoked.
    Invalid,
    /// The callback completed successfully.
    Submitted,
    /// The callback returned an error, which was logged.
    Failed,
    /// Another submission was still in flight; nothing was done.
    InProgress,
}

struct FieldSlot {
    field: FormField,
    initial: FormField,
    validator: Option<Arc<dyn Validator>>,
    generation: u64,
    pending: Option<Box<dyn ScheduledTask>>,
}

impl FieldSlot {
    fn validate(&mut self) {
        if let Some(validator) = &self.validator {
            let result = validator.validate(self.field.value());
            self.field.apply(result);
        }
    }

    /// Invalidates any outstanding deferred validation for this field.
    fn supersede_pending(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }
}

struct FormState {
    fields: BTreeMap<String, FieldSlot>,
    submit_attempted: bool,
    is_submitting: bool,
}

impl FormState {
    fn slot_mut(&mut self, field_name: &str) -> AppResult<&mut FieldSlot> {
        self.fields
            .get_mut(field_name)
            .ok_or_else(|| AppError::NotFound(format!("form field '{field_name}'")))
    }

    fn form_data(&self) -> FormData {
        self.fields
            .iter()
            .map(|(name, slot)| (name.clone(), slot.field.value().to_owned()))
            .collect()
    }

    fn is_form_valid(&self) -> bool {
        self.fields.values().all(|slot| slot.field.is_valid())
    }

    fn cancel_all(&mut self) {
        for slot in self.fields.values_mut() {
            slot.supersede_pending();
        }
    }
}

fn lock_state(state: &Mutex<FormState>) -> MutexGuard<'_, FormState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resets `is_submitting` however the submission ends, including when the
/// submit future is dropped mid-flight.
struct SubmittingGuard {
    state: Arc<Mutex<FormState>>,
}

impl Drop for SubmittingGuard {
    fn drop(&mut self) {
        lock_state(&self.state).is_submitting = false;
    }
}

/// Tracks a fixed set of string fields and validates them on change, blur
/// and submit.
///
/// At most one debounced validation is outstanding per field. Every path
/// that supersedes it (a newer change, blur, submit, reset, drop) cancels it
/// and bumps the field generation, so a task that fires late is ignored.
pub struct FormValidationController {
    state: Arc<Mutex<FormState>>,
    options: FormOptions,
    scheduler: Arc<dyn DebounceScheduler>,
}

impl FormValidationController {
    /// Creates a controller for the fields named in `initial_values`.
    ///
    /// Fields start untouched and are validated once so the form validity is
    /// known immediately. Fields without a validator are always valid.
    pub fn new<I, K, V>(
        initial_values: I,
        mut validators: HashMap<String, Arc<dyn Validator>>,
        options: FormOptions,
        scheduler: Arc<dyn DebounceScheduler>,
    ) -> AppResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut fields = BTreeMap::new();

        for (name, value) in initial_values {
            let name = String::from(NonEmptyString::new(name)?);
            let validator = validators.remove(&name);
            let mut field = FormField::new(value);
            if let Some(validator) = &validator {
                field.apply(validator.validate(field.value()));
            }

            fields.insert(
                name,
                FieldSlot {
                    initial: field.clone(),
                    field,
                    validator,
                    generation: 0,
                    pending: None,
                },
            );
        }

        if let Some(unknown) = validators.keys().next() {
            return Err(AppError::Validation(format!(
                "validator registered for unknown form field '{unknown}'"
            )));
        }

        Ok(Self {
            state: Arc::new(Mutex::new(FormState {
                fields,
                submit_attempted: false,
                is_submitting: false,
            })),
            options,
            scheduler,
        })
    }

    /// Stores a new value and schedules its validation.
    ///
    /// After a submit attempt, an existing error is hidden right away while
    /// the user corrects the field.
    pub fn handle_change(&self, field_name: &str, value: impl Into<String>) -> AppResult<()> {
        let mut state = lock_state(&self.state);
        let submit_attempted = state.submit_attempted;
        let slot = state.slot_mut(field_name)?;

        slot.field.set_value(value);
        if submit_attempted && slot.field.error().is_some() {
            slot.field.clear_error();
        }

        slot.supersede_pending();
        if self.options.validate_on_change {
            let task = deferred_validation(
                Arc::downgrade(&self.state),
                field_name.to_owned(),
                slot.generation,
            );
            slot.pending = Some(self.scheduler.schedule(self.options.debounce, task));
        } else {
            slot.validate();
        }

        Ok(())
    }

    /// Marks the field touched and validates `value` immediately.
    pub fn handle_blur(&self, field_name: &str, value: impl Into<String>) -> AppResult<()> {
        let mut state = lock_state(&self.state);
        let slot = state.slot_mut(field_name)?;

        slot.field.mark_touched();
        if self.options.validate_on_blur {
            slot.supersede_pending();
            slot.field.set_value(value);
            slot.validate();
        }

        Ok(())
    }

    /// Hides the field error while it has focus, until the first submit attempt.
    pub fn handle_focus(&self, field_name: &str) -> AppResult<()> {
        let mut state = lock_state(&self.state);
        let submit_attempted = state.submit_attempted;
        let slot = state.slot_mut(field_name)?;

        if !submit_attempted {
            slot.field.clear_error();
        }

        Ok(())
    }

    /// Validates every field and, when all pass, hands the form data to
    /// `on_submit`.
    ///
    /// Errors from `on_submit` are logged and reported as
    /// [`SubmitOutcome::Failed`]; they never reach the field state. While a
    /// submission is in flight, further calls return
    /// [`SubmitOutcome::InProgress`] without touching the form.
    pub async fn handle_submit<F, Fut>(
        &self,
        on_submit: F,
        event: Option<&mut dyn SubmitEvent>,
    ) -> SubmitOutcome
    where
        F: FnOnce(FormData) -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        if let Some(event) = event {
            event.prevent_default();
        }

        let form_data = {
            let mut state = lock_state(&self.state);
            if state.is_submitting {
                debug!("form submission ignored while another is in flight");
                return SubmitOutcome::InProgress;
            }

            state.submit_attempted = true;
            state.is_submitting = true;
            state.cancel_all();
            for slot in state.fields.values_mut() {
                slot.validate();
            }

            state.is_form_valid().then(|| state.form_data())
        };

        let _submitting = SubmittingGuard {
            state: Arc::clone(&self.state),
        };

        let Some(form_data) = form_data else {
            debug!("form submission rejected by field validation");
            return SubmitOutcome::Invalid;
        };

        match on_submit(form_data).await {
            Ok(()) => SubmitOutcome::Submitted,
            Err(submit_error) => {
                error!(error = %submit_error, "form submission failed");
                SubmitOutcome::Failed
            }
        }
    }

    /// Restores every field to its state right after construction.
    pub fn reset_form(&self) {
        let mut state = lock_state(&self.state);
        state.cancel_all();
        for slot in state.fields.values_mut() {
            slot.field = slot.initial.clone();
        }
        state.submit_attempted = false;
        state.is_submitting = false;
    }

    /// Marks a field invalid with an externally supplied error, such as one
    /// returned by the server.
    pub fn set_field_error(&self, field_name: &str, message: impl Into<String>) -> AppResult<()> {
        let mut state = lock_state(&self.state);
        state.slot_mut(field_name)?.field.set_error(message);
        Ok(())
    }

    /// Returns the current field values.
    #[must_use]
    pub fn form_data(&self) -> FormData {
        lock_state(&self.state).form_data()
    }

    /// Returns a snapshot of every field.
    #[must_use]
    pub fn fields(&self) -> BTreeMap<String, FormField> {
        lock_state(&self.state)
            .fields
            .iter()
            .map(|(name, slot)| (name.clone(), slot.field.clone()))
            .collect()
    }

    /// Returns a snapshot of one field.
    #[must_use]
    pub fn field(&self, field_name: &str) -> Option<FormField> {
        lock_state(&self.state)
            .fields
            .get(field_name)
            .map(|slot| slot.field.clone())
    }

    /// Returns whether a submit callback is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        lock_state(&self.state).is_submitting
    }

    /// Returns whether a submit has been attempted since construction or reset.
    #[must_use]
    pub fn submit_attempted(&self) -> bool {
        lock_state(&self.state).submit_attempted
    }

    /// Returns whether every field passed its last validation.
    #[must_use]
    pub fn is_form_valid(&self) -> bool {
        lock_state(&self.state).is_form_valid()
    }

    /// Returns whether any value differs from its initial value.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock_state(&self.state)
            .fields
            .values()
            .any(|slot| slot.field.value() != slot.initial.value())
    }
}

impl Drop for FormValidationController {
    fn drop(&mut self) {
        lock_state(&self.state).cancel_all();
    }
}

fn deferred_validation(
    state: Weak<Mutex<FormState>>,
    field_name: String,
    generation: u64,
) -> DeferredTask {
    Box::new(move || {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = lock_state(&state);
        let Some(slot) = state.fields.get_mut(&field_name) else {
            return;
        };

        if slot.generation != generation {
            trace!(field = %field_name, "discarding superseded validation");
            return;
        }

        slot.pending = None;
        slot.validate();
    })
}
