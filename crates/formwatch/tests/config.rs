#![forbid(unsafe_code)]
#![cfg(feature = "policy-config")]

//! Integration tests: configuration files feeding the root.

use formwatch::prelude::*;

#[test]
fn toml_config_drives_policy_and_cap() {
    let config = ErrorsConfig::from_toml_str(
        r#"
showErrorsWhenInput = "dirty"
showMaxErrors = 1
"#,
    )
    .expect("config");
    let root = Formwatch::builder().config(config).build().expect("root");
    let control = Control::leaf("")
        .with_validator(validators::required())
        .with_validator(validators::min_length(3));
    let group = root.group(&control).attach().expect("group");
    assert_eq!(group.aggregator().max_visible().map(|n| n.get()), Some(1));

    let mut required = group.error("required");
    let mut minlength = group.error("minlength");
    required.attach().expect("attach");
    minlength.attach().expect("attach");
    assert_eq!(required.key(), Some("required-dirty"));

    control.mark_as_touched();
    root.scheduler().run_microtasks();
    assert!(!required.is_visible());

    control.input("");
    root.scheduler().run_microtasks();
    assert!(required.is_visible());
}

#[test]
fn unknown_policy_in_config_fails_the_build() {
    let config = ErrorsConfig::from_json_str(r#"{"showErrorsWhenInput":"blurred"}"#)
        .expect("any name parses");
    let err = Formwatch::builder().config(config).build().err();
    match err {
        Some(FormwatchError::UnknownShowPolicy { name, valid }) => {
            assert_eq!(name, "blurred");
            assert!(valid.iter().any(|v| v == "touched"));
        }
        other => panic!("expected UnknownShowPolicy, got {other:?}"),
    }
}
