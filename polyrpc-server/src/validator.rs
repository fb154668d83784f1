//! Parameter validation against a declared signature
//!
//! Runs only for procedures registered with `validate(true)`, before the
//! parameters are decoded. It looks at `params` exactly as received:
//!
//! - **object**: the keys must be exactly the declared names, and each value
//!   must match its declared type. Missing names are reported first, then
//!   unexpected ones, then type mismatches in declaration order.
//! - **array**: elements are compared with the declarations by index. An
//!   element past the last declaration is "too many"; a type mismatch is
//!   reported as soon as it is met; a short array is "not enough", checked
//!   last so type errors in the prefix win.
//!
//! Any other `params` value is left for the codec to reject.

use crate::procedure::Procedure;
use polyrpc_core::{Error, Result, Signature, TypeTag};
use serde_json::{Map, Value};

/// Validate `params` against a procedure's declared signature
pub fn validate_params(procedure: &Procedure, params: &Value) -> Result<()> {
    let signature = procedure.declared();
    let rendered = procedure.signature_string();
    match params {
        Value::Object(named) => validate_named(signature, &rendered, named),
        Value::Array(positional) => validate_positional(signature, &rendered, positional),
        _ => Ok(()),
    }
}

fn validate_named(signature: &Signature, rendered: &str, named: &Map<String, Value>) -> Result<()> {
    if let Some((missing, _)) = signature
        .params()
        .iter()
        .find(|(name, _)| !named.contains_key(name))
    {
        return Err(Error::InvalidParams(format!(
            "{} is a required parameter for {}",
            missing, rendered
        )));
    }

    if let Some(extra) = named.keys().find(|key| signature.tag_of(key).is_none()) {
        return Err(Error::InvalidParams(format!(
            "{} is not a valid parameter for {}",
            extra, rendered
        )));
    }

    for (name, expected) in signature.params() {
        if let Some(value) = named.get(name) {
            check_type(name, *expected, value, rendered)?;
        }
    }
    Ok(())
}

fn validate_positional(signature: &Signature, rendered: &str, positional: &[Value]) -> Result<()> {
    for (index, value) in positional.iter().enumerate() {
        let expected = signature.tag_at(index).ok_or_else(|| {
            Error::InvalidParams(format!("Too many params provided for {}", rendered))
        })?;
        check_type(&index.to_string(), expected, value, rendered)?;
    }

    if positional.len() != signature.arity() {
        return Err(Error::InvalidParams(format!(
            "Not enough params provided for {}",
            rendered
        )));
    }
    Ok(())
}

fn check_type(label: &str, expected: TypeTag, value: &Value, rendered: &str) -> Result<()> {
    if expected.accepts(value) {
        Ok(())
    } else {
        Err(Error::InvalidParams(format!(
            "Param {}: {} is not the correct type {} for {}",
            label,
            TypeTag::of(value),
            expected,
            rendered
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::from_fn;
    use serde_json::json;

    fn concat() -> Procedure {
        Procedure::new("concat", from_fn(|_, _| async { Ok(json!(null)) }))
            .param("a", TypeTag::Number)
            .param("b", TypeTag::String)
            .validate(true)
    }

    fn message(err: Error) -> String {
        err.to_error_data(false).message
    }

    #[test]
    fn test_positional_ok() {
        assert!(validate_params(&concat(), &json!([1, "x"])).is_ok());
    }

    #[test]
    fn test_positional_not_enough() {
        let err = validate_params(&concat(), &json!([1])).unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
        assert_eq!(
            message(err),
            "Not enough params provided for concat(a=Number, b=String) -> Any"
        );
    }

    #[test]
    fn test_positional_type_mismatch_names_index() {
        let err = validate_params(&concat(), &json!(["x", "y"])).unwrap_err();
        let msg = message(err);
        assert!(msg.starts_with("Param 0:"), "{}", msg);
        assert!(msg.contains("Number"));
    }

    #[test]
    fn test_type_mismatch_reported_before_short_array() {
        let err = validate_params(&concat(), &json!(["x"])).unwrap_err();
        assert!(message(err).contains("not the correct type"));
    }

    #[test]
    fn test_positional_too_many() {
        let err = validate_params(&concat(), &json!([1, "x", true])).unwrap_err();
        assert!(message(err).starts_with("Too many params"));
    }

    #[test]
    fn test_named_ok_in_any_order() {
        assert!(validate_params(&concat(), &json!({"b": "x", "a": 2})).is_ok());
    }

    #[test]
    fn test_named_missing_and_extra() {
        let err = validate_params(&concat(), &json!({"a": 1})).unwrap_err();
        assert!(message(err).starts_with("b is a required parameter"));

        let err = validate_params(&concat(), &json!({"a": 1, "b": "x", "c": 3})).unwrap_err();
        assert!(message(err).starts_with("c is not a valid parameter"));
    }

    #[test]
    fn test_named_type_mismatch_names_key() {
        let err = validate_params(&concat(), &json!({"a": 1, "b": 2})).unwrap_err();
        assert!(message(err).starts_with("Param b: Number is not the correct type String"));
    }

    #[test]
    fn test_any_and_empty_signature() {
        let any = Procedure::new("any", from_fn(|_, _| async { Ok(json!(null)) }))
            .param("x", TypeTag::Any);
        assert!(validate_params(&any, &json!([null])).is_ok());
        assert!(validate_params(&any, &json!([{"deep": [1]}])).is_ok());

        let nullary = Procedure::new("ping", from_fn(|_, _| async { Ok(json!(null)) }));
        assert!(validate_params(&nullary, &json!([])).is_ok());
        assert!(validate_params(&nullary, &json!({})).is_ok());
        assert!(validate_params(&nullary, &json!([1])).is_err());
    }

    #[test]
    fn test_scalar_params_skip_validation() {
        assert!(validate_params(&concat(), &json!("scalar")).is_ok());
    }
}
