#![forbid(unsafe_code)]

//! Error taxonomy.
//!
//! Every variant is a usage error raised while wiring error blocks up. None
//! of them is retried or swallowed: they surface from `attach` / `build`
//! calls as `Err`.

/// Errors raised while attaching error groups and blocks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormwatchError {
    /// An error block was attached without an enclosing errors group.
    #[error("error block must be placed inside an errors group")]
    MissingParentGroup,

    /// An error block's name is empty or whitespace.
    #[error("error name must be a non-empty string")]
    InvalidErrorName,

    /// An errors group was attached without a control declaration.
    #[error("errors group requires a control declaration")]
    MissingControl,

    /// The declared control is not a leaf, group or array control.
    #[error("control must be a leaf, group or array control, found `{found}`")]
    InvalidControlType { found: String },

    /// A named control does not exist under the resolved form or group.
    #[error("control \"{name}\" could not be found")]
    ControlNotFound { name: String },

    /// A control was declared by name outside any form.
    #[error("control \"{name}\" is declared by name but has no ancestor form or group")]
    MissingAncestorForm { name: String },

    /// A resolved show policy name has no evaluator.
    #[error("invalid showWhen value: {name}. Valid values are: {}", .valid.join(", "))]
    UnknownShowPolicy { name: String, valid: Vec<String> },

    /// Configuration could not be parsed or is out of range.
    #[error("invalid errors configuration: {0}")]
    Config(String),
}

/// Result alias used across formwatch.
pub type Result<T> = std::result::Result<T, FormwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_policy_lists_valid_names() {
        let err = FormwatchError::UnknownShowPolicy {
            name: "sometimes".into(),
            valid: vec!["dirty".into(), "touched".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid showWhen value: sometimes. Valid values are: dirty, touched"
        );
    }

    #[test]
    fn lookup_errors_name_the_control() {
        let err = FormwatchError::ControlNotFound {
            name: "address.street".into(),
        };
        assert_eq!(err.to_string(), "control \"address.street\" could not be found");
    }
}
