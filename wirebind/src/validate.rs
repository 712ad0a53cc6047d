//! Constraint validation with localized (Chinese) error messages
//!
//! Wraps the `validator` crate's derive-based constraints. All violations
//! are translated and concatenated into one aggregated message; callers get
//! a single pass/fail [`Error::Validation`], never a partial result.

use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{Error, Result};

/// Validate a bound parameter object against its declared constraints
pub fn validate<T: Validate>(instance: &T) -> Result<()> {
    instance
        .validate()
        .map_err(|errors| Error::Validation(translate_errors(&errors)))
}

/// One combined message for all violated fields, in declaration-stable order
fn translate_errors(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut names: Vec<_> = field_errors.keys().cloned().collect();
    names.sort();

    let mut message = String::new();
    for name in names {
        if let Some(list) = field_errors.get(&name) {
            for e in list.iter() {
                message.push_str(&translate(name.as_ref(), e));
            }
        }
    }
    message
}

/// Translate one violation; an explicit `message` override wins
fn translate(field: &str, e: &ValidationError) -> String {
    if let Some(msg) = &e.message {
        return format!("{field}{msg}");
    }
    match e.code.as_ref() {
        "required" => format!("{field}为必填字段"),
        "length" => format!("{field}长度不符合要求"),
        "range" => format!("{field}超出允许范围"),
        "email" => format!("{field}必须是合法的邮箱"),
        "url" => format!("{field}必须是合法的链接"),
        _ => format!("{field}校验失败"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Validate)]
    struct Registration {
        #[validate(length(min = 1))]
        name: String,
        #[validate(range(min = 1, max = 150))]
        age: i64,
        #[validate(required)]
        token: Option<String>,
    }

    #[test]
    fn valid_instance_passes() {
        let ok = Registration {
            name: "李雷".to_string(),
            age: 30,
            token: Some("t".to_string()),
        };
        assert!(validate(&ok).is_ok());
    }

    #[test]
    fn missing_required_field_yields_translated_message() {
        let bad = Registration {
            name: "李雷".to_string(),
            age: 30,
            token: None,
        };
        let err = validate(&bad).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("token"), "message was: {msg}");
        assert!(msg.contains("必填"), "message was: {msg}");
    }

    #[test]
    fn all_violations_are_aggregated_into_one_message() {
        let bad = Registration {
            name: String::new(),
            age: 0,
            token: None,
        };
        let msg = validate(&bad).unwrap_err().to_string();
        assert!(msg.contains("name"), "message was: {msg}");
        assert!(msg.contains("age"), "message was: {msg}");
        assert!(msg.contains("token"), "message was: {msg}");
    }

    #[test]
    fn explicit_message_override_wins() {
        #[derive(Debug, Default, Validate)]
        struct Named {
            #[validate(length(min = 1, message = "不能为空"))]
            title: String,
        }
        let msg = validate(&Named::default()).unwrap_err().to_string();
        assert_eq!(msg, "title不能为空");
    }
}
