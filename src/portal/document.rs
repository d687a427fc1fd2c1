use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PortalError, Result};

pub fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value
        .as_object()
        .ok_or_else(|| PortalError::data_shape(format!("expected an object holding `{key}`")))?
        .get(key)
        .ok_or_else(|| PortalError::data_shape(format!("missing field `{key}`")))
}

pub fn object_or_empty<'a>(value: &'a Value, key: &str) -> Result<Option<&'a Map<String, Value>>> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(PortalError::data_shape(format!("`{key}` is not an object"))),
    }
}

pub fn array_or_empty<'a>(value: &'a Value, key: &str) -> Result<&'a [Value]> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(&[][..]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(PortalError::data_shape(format!("`{key}` is not an array"))),
    }
}

pub fn string_field(value: &Value, key: &str) -> Result<String> {
    scalar_to_string(field(value, key)?)
        .ok_or_else(|| PortalError::data_shape(format!("`{key}` is not a string or number")))
}

pub fn optional_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semester {
    pub id: String,
    pub title: String,
}

pub fn latest_semester(initial: &Value) -> Result<Option<Semester>> {
    let Some(latest) = array_or_empty(initial, "semestres")?.last() else {
        return Ok(None);
    };
    Ok(Some(Semester {
        id: string_field(latest, "formsemestre_id")?,
        title: optional_string(latest, "titre").unwrap_or_default(),
    }))
}
