#![forbid(unsafe_code)]

//! Integration tests: attach, detach and control resolution.

use std::cell::RefCell;
use std::rc::Rc;

use formwatch::BindingState;
use formwatch::forms::{DependentValidatorOptions, ValidatorFn, dependent_validator};
use formwatch::prelude::*;
use serde_json::{Value, json};

fn record(block: &ErrorBlock) -> (Rc<RefCell<Vec<bool>>>, formwatch::runtime::Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let sub = block
        .hidden()
        .expect("attached")
        .subscribe(move |hidden| s.borrow_mut().push(*hidden));
    (seen, sub)
}

#[test]
fn identical_inputs_emit_nothing_new() {
    let root = Formwatch::builder().build().expect("root");
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    let mut block = group.error("required");
    block.attach().expect("attach");
    let (seen, _sub) = record(&block);

    control.mark_as_touched();
    root.scheduler().run_microtasks();
    for _ in 0..5 {
        control.mark_as_touched();
        control.set_value("");
        root.scheduler().run_microtasks();
    }
    assert_eq!(*seen.borrow(), vec![false]);
    assert!(block.evaluations() >= 6);
}

#[test]
fn detached_blocks_stay_silent() {
    let root = Formwatch::builder().build().expect("root");
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    let mut block = group.error("required");
    block.attach().expect("attach");
    let hidden = block.hidden().expect("attached");
    let (seen, _sub) = record(&block);

    control.mark_as_touched();
    block.detach();
    root.scheduler().run_microtasks();
    control.set_value("x");
    control.set_value("");
    control.mark_as_touched();
    root.scheduler().run_microtasks();

    assert!(seen.borrow().is_empty());
    assert!(hidden.get());
    assert_eq!(block.state(), BindingState::TornDown);
    assert!(group.aggregator().keys().is_empty());
}

#[test]
fn dropping_a_block_detaches_it() {
    let root = Formwatch::builder().build().expect("root");
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    {
        let mut block = group.error("required");
        block.attach().expect("attach");
        assert_eq!(control.touched_changes().subscriber_count(), 1);
    }
    assert_eq!(control.touched_changes().subscriber_count(), 0);
    assert!(group.aggregator().keys().is_empty());
}

#[test]
fn attach_twice_is_a_no_op() {
    let root = Formwatch::builder().build().expect("root");
    let control = Control::leaf("").with_validator(validators::required());
    let group = root.group(&control).attach().expect("group");
    let mut block = group.error("required");
    block.attach().expect("attach");
    block.attach().expect("attach again");
    assert_eq!(block.evaluations(), 1);
    assert_eq!(control.value_changes().subscriber_count(), 1);
}

#[test]
fn name_two_levels_deep_resolves_to_the_same_instance() {
    let lat = Control::leaf("").with_validator(validators::required());
    let form = ParentForm::new(Control::group([
        ("name", Control::leaf("")),
        (
            "address",
            Control::group([
                ("street", Control::leaf("")),
                ("geo", Control::group([("lat", lat.clone()), ("lng", Control::leaf(""))])),
            ]),
        ),
    ]));
    let scope = FormScope::root(&form)
        .nested("address")
        .and_then(|address| address.nested("geo"))
        .expect("nested groups");

    let root = Formwatch::builder().build().expect("root");
    let group = root.group("lat").scope(&scope).attach().expect("group");
    assert_eq!(group.control(), &lat);
    assert_eq!(group.control().id(), lat.id());
    assert!(group.parent_form().is_some_and(|f| f.ptr_eq(&form)));

    let mut block = group.error("required");
    block.attach().expect("attach");
    form.submit();
    root.scheduler().run_microtasks();
    assert!(block.is_visible());
}

#[test]
fn unknown_names_fail_at_group_attach() {
    let form = ParentForm::new(Control::group([("name", Control::leaf(""))]));
    let root = Formwatch::builder().build().expect("root");
    let err = root
        .group("nmae")
        .scope(&FormScope::root(&form))
        .attach()
        .err();
    assert_eq!(err, Some(FormwatchError::ControlNotFound { name: "nmae".into() }));
}

#[test]
fn dependent_validator_drives_visibility() {
    let password = Control::leaf("secret");
    let confirm = Control::leaf("secret");
    let form = ParentForm::new(Control::group([
        ("password", password.clone()),
        ("confirm", confirm.clone()),
    ]));
    let confirm = confirm.with_validator(dependent_validator(DependentValidatorOptions::watching(
        "password",
        |expected: &Value| -> ValidatorFn {
            let expected = expected.clone();
            Rc::new(move |c: &Control| {
                (c.value() != expected).then(|| {
                    [("passwordsDoNotMatch".to_owned(), json!(true))]
                        .into_iter()
                        .collect()
                })
            })
        },
    )));

    let root = Formwatch::builder().build().expect("root");
    let group = root
        .group("confirm")
        .scope(&FormScope::root(&form))
        .attach()
        .expect("group");
    let mut block = group.error("passwordsDoNotMatch");
    block.attach().expect("attach");
    confirm.mark_as_touched();

    password.input("changed");
    root.scheduler().run_microtasks();
    assert!(block.is_visible());

    confirm.input("changed");
    root.scheduler().run_microtasks();
    assert!(!block.is_visible());
}
