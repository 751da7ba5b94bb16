#![forbid(unsafe_code)]

//! Integration tests: error > group > global policy precedence.

use formwatch::prelude::*;
use formwatch::PolicySource;

fn root_with(show_when: ShowWhen) -> Formwatch {
    Formwatch::builder()
        .config(ErrorsConfig::new().show_when(show_when))
        .build()
        .expect("root")
}

#[test]
fn error_beats_group_beats_global() {
    let root = root_with(ShowWhen::TOUCHED);
    let control = Control::leaf("").with_validator(validators::required());

    let plain = root.group(&control).attach().expect("group");
    let overridden = root
        .group(&control)
        .show_when(ShowWhen::DIRTY)
        .attach()
        .expect("group");

    let mut global = plain.error("required");
    let mut from_group = overridden.error("required");
    let mut from_error = overridden
        .error("required")
        .show_when(ShowWhen::TOUCHED_AND_DIRTY);
    for block in [&mut global, &mut from_group, &mut from_error] {
        block.attach().expect("attach");
    }

    assert_eq!(global.resolved_show_when(), Some(&ShowWhen::TOUCHED));
    assert_eq!(from_group.resolved_show_when(), Some(&ShowWhen::DIRTY));
    assert_eq!(from_error.resolved_show_when(), Some(&ShowWhen::TOUCHED_AND_DIRTY));

    control.mark_as_touched();
    root.scheduler().run_microtasks();
    assert!(global.is_visible());
    assert!(!from_group.is_visible());
    assert!(!from_error.is_visible());

    control.input("");
    root.scheduler().run_microtasks();
    assert!(from_group.is_visible());
    assert!(from_error.is_visible());
}

#[test]
fn same_error_under_two_policies_gets_two_keys() {
    let root = root_with(ShowWhen::TOUCHED);
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");

    let mut touched = group.error("required");
    let mut dirty = group.error("required").show_when(ShowWhen::DIRTY);
    touched.attach().expect("attach");
    dirty.attach().expect("attach");

    assert_eq!(group.aggregator().keys(), ["required-touched", "required-dirty"]);
}

#[test]
fn form_is_submitted_default_without_form_is_touched_every_time() {
    let root = root_with(ShowWhen::FORM_IS_SUBMITTED);
    let control = Control::leaf("").with_validator(validators::required());

    for _ in 0..5 {
        let group = root.group(&control).attach().expect("group");
        let mut block = group.error("required");
        block.attach().expect("attach");
        assert_eq!(block.resolved_show_when(), Some(&ShowWhen::TOUCHED));
    }

    let resolved = formwatch::resolve_show_when(None, None, &ShowWhen::FORM_IS_SUBMITTED, false);
    assert_eq!(resolved.source, PolicySource::GlobalFallback);
}

#[test]
fn form_is_submitted_default_with_form_is_kept() {
    let root = root_with(ShowWhen::FORM_IS_SUBMITTED);
    let control = Control::leaf("").with_validator(validators::required());
    let form = ParentForm::new(Control::group([("name", control.clone())]));
    let group = root
        .group("name")
        .scope(&FormScope::root(&form))
        .attach()
        .expect("group");
    let mut block = group.error("required");
    block.attach().expect("attach");
    assert_eq!(block.resolved_show_when(), Some(&ShowWhen::FORM_IS_SUBMITTED));

    control.mark_as_touched();
    root.scheduler().run_microtasks();
    assert!(!block.is_visible());

    form.submit();
    root.scheduler().run_microtasks();
    assert!(block.is_visible());
}

#[test]
fn explicit_form_is_submitted_without_form_never_shows() {
    let root = root_with(ShowWhen::TOUCHED);
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    let mut block = group.error("required").show_when(ShowWhen::FORM_IS_SUBMITTED);
    block.attach().expect("attach");
    assert_eq!(block.resolved_show_when(), Some(&ShowWhen::FORM_IS_SUBMITTED));

    control.mark_as_touched();
    control.input("");
    root.scheduler().run_microtasks();
    assert!(!block.is_visible());
}

#[test]
fn resolved_policy_is_fixed_for_the_attachment() {
    let root = root_with(ShowWhen::TOUCHED);
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    let mut block = group.error("required");
    block.attach().expect("attach");

    control.input("");
    control.mark_as_touched();
    control.mark_as_untouched();
    root.scheduler().run_microtasks();
    assert_eq!(block.resolved_show_when(), Some(&ShowWhen::TOUCHED));
    assert_eq!(block.key(), Some("required-touched"));
}
