#![forbid(unsafe_code)]

//! Built-in validators.
//!
//! Error payloads use the conventional keys: `required: true`,
//! `min: {min, actual}`, `max: {max, actual}`,
//! `minlength: {requiredLength, actualLength}` and
//! `maxlength: {requiredLength, actualLength}`.

use std::cell::RefCell;
use std::rc::Rc;

use formwatch_runtime::Subscription;
use serde_json::{Value, json};

use crate::control::{Control, ValidationErrors, ValidatorFn};

fn single(name: &str, payload: Value) -> Option<ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.insert(name.to_owned(), payload);
    Some(errors)
}

fn is_empty_input(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Fails with `required` on null, empty strings and empty arrays.
pub fn required() -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    |control| {
        if is_empty_input(&control.value()) {
            single("required", json!(true))
        } else {
            None
        }
    }
}

/// Fails with `min` when the numeric value is below `min`. Empty input passes.
pub fn min(min: f64) -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    move |control| {
        let value = control.value();
        if is_empty_input(&value) {
            return None;
        }
        match as_number(&value) {
            Some(actual) if actual < min => single("min", json!({ "min": min, "actual": value })),
            _ => None,
        }
    }
}

/// Fails with `max` when the numeric value is above `max`. Empty input passes.
pub fn max(max: f64) -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    move |control| {
        let value = control.value();
        if is_empty_input(&value) {
            return None;
        }
        match as_number(&value) {
            Some(actual) if actual > max => single("max", json!({ "max": max, "actual": value })),
            _ => None,
        }
    }
}

/// Fails with `minlength` when a non-empty string or array is too short.
pub fn min_length(required: usize) -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    move |control| {
        let value = control.value();
        if is_empty_input(&value) {
            return None;
        }
        match length_of(&value) {
            Some(actual) if actual < required => single(
                "minlength",
                json!({ "requiredLength": required, "actualLength": actual }),
            ),
            _ => None,
        }
    }
}

/// Fails with `maxlength` when a string or array is too long.
pub fn max_length(required: usize) -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    move |control| match length_of(&control.value()) {
        Some(actual) if actual > required => single(
            "maxlength",
            json!({ "requiredLength": required, "actualLength": actual }),
        ),
        _ => None,
    }
}

/// Options for [`dependent_validator`].
#[derive(Clone)]
pub struct DependentValidatorOptions {
    /// Finds the watched control, given the root of the validated control.
    pub watch_control: Rc<dyn Fn(&Control) -> Option<Control>>,
    /// Builds the validator to apply from the watched control's value.
    pub validator: Rc<dyn Fn(&Value) -> ValidatorFn>,
    /// Applies the validator only while this holds. Absent means always.
    pub condition: Option<Rc<dyn Fn(&Value) -> bool>>,
}

impl DependentValidatorOptions {
    /// Watch the control at `path` from the root.
    pub fn watching(
        path: impl Into<String>,
        validator: impl Fn(&Value) -> ValidatorFn + 'static,
    ) -> Self {
        let path = path.into();
        Self {
            watch_control: Rc::new(move |root| root.get(&path)),
            validator: Rc::new(validator),
            condition: None,
        }
    }

    /// Only validate while `condition` holds for the watched value.
    #[must_use]
    pub fn when(mut self, condition: impl Fn(&Value) -> bool + 'static) -> Self {
        self.condition = Some(Rc::new(condition));
        self
    }
}

impl std::fmt::Debug for DependentValidatorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependentValidatorOptions")
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

/// Validate a control against a rule derived from another control's value.
///
/// On its first run the validator subscribes to the watched control's value
/// stream and revalidates the validated control on every change, so a
/// password confirmation re-checks when the password changes.
///
/// # Failure Modes
///
/// - Watched control not found: passes, logs a warning, and retries the
///   lookup on the next run.
pub fn dependent_validator(
    options: DependentValidatorOptions,
) -> impl Fn(&Control) -> Option<ValidationErrors> + 'static {
    let watching: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
    move |control| {
        let Some(watched) = (options.watch_control)(&control.root()) else {
            tracing::warn!(
                control = control.id().id(),
                "dependent validator: watched control not found"
            );
            return None;
        };

        if watching.borrow().is_none() {
            let target = control.downgrade();
            let sub = watched.value_changes().subscribe(move |_| {
                if let Some(control) = target.upgrade() {
                    control.update_value_and_validity();
                }
            });
            *watching.borrow_mut() = Some(sub);
        }

        let value = watched.value();
        let applies = options.condition.as_ref().is_none_or(|cond| cond(&value));
        if applies {
            (options.validator)(&value)(control)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_empty_values() {
        let check = required();
        assert!(check(&Control::leaf("")).is_some());
        assert!(check(&Control::leaf(Value::Null)).is_some());
        assert!(check(&Control::leaf(json!([]))).is_some());
        assert!(check(&Control::leaf("x")).is_none());
        assert!(check(&Control::leaf(0)).is_none());
    }

    #[test]
    fn min_and_max_report_bounds() {
        let control = Control::leaf(3).with_validator(min(10.0));
        let payload = control.get_error("min").unwrap_or_default();
        assert_eq!(payload["min"].as_f64(), Some(10.0));
        assert_eq!(payload["actual"], json!(3));

        let control = Control::leaf("42").with_validator(max(40.0));
        assert!(control.has_error("max"));

        let control = Control::leaf("").with_validator(min(10.0));
        assert!(control.valid());
    }

    #[test]
    fn length_validators() {
        let short = Control::leaf("ab").with_validator(min_length(3));
        assert_eq!(
            short.get_error("minlength"),
            Some(json!({"requiredLength": 3, "actualLength": 2}))
        );

        let long = Control::leaf("abcdef").with_validator(max_length(5));
        assert_eq!(
            long.get_error("maxlength"),
            Some(json!({"requiredLength": 5, "actualLength": 6}))
        );

        let empty = Control::leaf("").with_validator(min_length(3));
        assert!(empty.valid());
    }

    #[test]
    fn dependent_validator_revalidates_on_watched_change() {
        let password = Control::leaf("secret");
        let confirm = Control::leaf("secret");
        let form = Control::group([("password", password.clone()), ("confirm", confirm.clone())]);

        let options = DependentValidatorOptions::watching("password", |expected| {
            let expected = expected.clone();
            Rc::new(move |c: &Control| {
                if c.value() == expected {
                    None
                } else {
                    single("passwordsDoNotMatch", json!(true))
                }
            })
        });
        let confirm = confirm.with_validator(dependent_validator(options));
        assert!(confirm.valid());

        password.set_value("changed");
        assert!(confirm.has_error("passwordsDoNotMatch"));
        assert!(form.invalid());

        confirm.set_value("changed");
        assert!(confirm.valid());
    }

    #[test]
    fn dependent_validator_respects_condition() {
        let country = Control::leaf("US");
        let zip = Control::leaf("");
        let _form = Control::group([("country", country.clone()), ("zip", zip.clone())]);

        let options = DependentValidatorOptions::watching("country", |_| Rc::new(required()))
            .when(|value| value == "US");
        let zip = zip.with_validator(dependent_validator(options));
        assert!(zip.has_error("required"));

        country.set_value("FR");
        assert!(zip.valid());
    }

    #[test]
    fn dependent_validator_without_target_passes() {
        let lonely = Control::leaf("").with_validator(dependent_validator(
            DependentValidatorOptions::watching("missing", |_| Rc::new(required())),
        ));
        assert!(lonely.valid());
    }
}
