//! Schema validation for credit payloads.
//!
//! Bodies are checked field by field against the raw JSON object so that a
//! single response can report every missing or mistyped field. Keys that are
//! not part of the schema (including `id` and `createdAt`) are ignored.

use serde_json::{Map, Value};
use validator::Validate;

use super::error::{FieldError, ValidationError};
use super::types::{CreditPatch, InsertCreditRecord};

/// Validates a creation payload and returns the typed record input.
///
/// # Errors
///
/// Returns `ValidationError::InvalidFormat` when the body is not a JSON
/// object and `ValidationError::Fields` listing every offending field
/// otherwise.
pub fn parse_insert(body: &Value) -> Result<InsertCreditRecord, ValidationError> {
    let mut fields = FieldReader::new(body)?;

    let token_id = fields.required_string("tokenId");
    let owner = fields.required_string("owner");
    let amount = fields.required_integer("amount");
    let price = fields.nullable_integer("price");
    let listed = fields.nullable_bool("listed");
    let description = fields.required_string("description");

    // Creation applies the patch rules to whichever fields parsed.
    fields.check(
        CreditPatch {
            owner: owner.clone(),
            ..CreditPatch::default()
        }
        .validate(),
    );
    fields.finish()?;

    let (Some(token_id), Some(owner), Some(amount), Some(description)) =
        (token_id, owner, amount, description)
    else {
        return Err(ValidationError::InvalidFormat(
            "incomplete credit payload".to_string(),
        ));
    };

    Ok(InsertCreditRecord {
        token_id,
        owner,
        amount,
        price: price.flatten(),
        listed: listed.flatten().unwrap_or(false),
        description,
    })
}

/// Validates a partial update against the same field rules, all optional.
///
/// `null` clears `price` but leaves `listed` unchanged.
///
/// # Errors
///
/// Same as [`parse_insert`].
pub fn parse_patch(body: &Value) -> Result<CreditPatch, ValidationError> {
    let mut fields = FieldReader::new(body)?;

    let patch = CreditPatch {
        token_id: fields.optional_string("tokenId"),
        owner: fields.optional_string("owner"),
        amount: fields.optional_integer("amount"),
        price: fields.nullable_integer("price"),
        listed: fields.nullable_bool("listed").flatten(),
        description: fields.optional_string("description"),
    };

    fields.check(patch.validate());
    fields.finish()?;
    Ok(patch)
}

struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> FieldReader<'a> {
    fn new(body: &'a Value) -> Result<Self, ValidationError> {
        let object = body.as_object().ok_or_else(|| {
            ValidationError::InvalidFormat(format!(
                "Expected object, received {}",
                type_name(body)
            ))
        })?;
        Ok(Self {
            object,
            errors: Vec::new(),
        })
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(self.errors))
        }
    }

    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    fn check(&mut self, rules: Result<(), validator::ValidationErrors>) {
        if let Err(errors) = rules {
            self.errors.extend(ValidationError::from(errors).details());
        }
    }

    fn required_string(&mut self, field: &str) -> Option<String> {
        match self.object.get(field) {
            None => {
                self.reject(field, "Required");
                None
            }
            Some(_) => self.optional_string(field),
        }
    }

    fn optional_string(&mut self, field: &str) -> Option<String> {
        match self.object.get(field)? {
            Value::String(s) => Some(s.clone()),
            other => {
                let message = format!("Expected string, received {}", type_name(other));
                self.reject(field, message);
                None
            }
        }
    }

    fn required_integer(&mut self, field: &str) -> Option<i64> {
        match self.object.get(field) {
            None => {
                self.reject(field, "Required");
                None
            }
            Some(_) => self.optional_integer(field),
        }
    }

    fn optional_integer(&mut self, field: &str) -> Option<i64> {
        let value = self.object.get(field)?;
        match integer(value) {
            Ok(n) => Some(n),
            Err(message) => {
                self.reject(field, message);
                None
            }
        }
    }

    /// Absent yields `None`, `null` yields `Some(None)`.
    fn nullable_integer(&mut self, field: &str) -> Option<Option<i64>> {
        match self.object.get(field)? {
            Value::Null => Some(None),
            _ => self.optional_integer(field).map(Some),
        }
    }

    fn optional_bool(&mut self, field: &str) -> Option<bool> {
        match self.object.get(field)? {
            Value::Bool(b) => Some(*b),
            other => {
                let message = format!("Expected boolean, received {}", type_name(other));
                self.reject(field, message);
                None
            }
        }
    }

    fn nullable_bool(&mut self, field: &str) -> Option<Option<bool>> {
        match self.object.get(field)? {
            Value::Null => Some(None),
            _ => self.optional_bool(field).map(Some),
        }
    }
}

fn integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| {
            if n.is_f64() {
                "Expected integer, received float".to_string()
            } else {
                "Number must fit in a signed 64-bit integer".to_string()
            }
        }),
        other => Err(format!("Expected number, received {}", type_name(other))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
