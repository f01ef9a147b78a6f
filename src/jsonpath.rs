//! Dot-path access into JSON documents.
//!
//! `get_str(doc, "mqtt.url")` walks nested objects one key per dot
//! segment. Setters create missing intermediate objects; traversing
//! through a non-object value is an error either way.

use anyhow::{Result, bail};
use serde_json::Value;

fn lookup<'a>(doc: &'a Value, path: &str) -> Result<&'a Value> {
    let mut node = doc;
    for key in path.split('.') {
        match node {
            Value::Object(map) => match map.get(key) {
                Some(next) => node = next,
                None => bail!("key '{key}' not found in path '{path}'"),
            },
            _ => bail!("'{key}' in path '{path}' is not an object"),
        }
    }
    Ok(node)
}

fn lookup_or_create<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value> {
    let mut node = doc;
    for key in path.split('.') {
        match node {
            Value::Object(map) => {
                node = map
                    .entry(key.to_owned())
                    .or_insert_with(|| Value::Object(Default::default()));
            }
            _ => bail!("'{key}' in path '{path}' is not an object"),
        }
    }
    Ok(node)
}

pub fn get_str<'a>(doc: &'a Value, path: &str) -> Result<&'a str> {
    match lookup(doc, path)? {
        Value::String(s) => Ok(s),
        other => bail!("'{path}' is {other:?}, expected string"),
    }
}

pub fn get_i64(doc: &Value, path: &str) -> Result<i64> {
    match lookup(doc, path)?.as_i64() {
        Some(n) => Ok(n),
        None => bail!("'{path}' is not an integer"),
    }
}

pub fn get_bool(doc: &Value, path: &str) -> Result<bool> {
    match lookup(doc, path)? {
        Value::Bool(b) => Ok(*b),
        other => bail!("'{path}' is {other:?}, expected bool"),
    }
}

pub fn set_str(doc: &mut Value, path: &str, value: &str) -> Result<()> {
    *lookup_or_create(doc, path)? = Value::String(value.to_owned());
    Ok(())
}

pub fn set_i64(doc: &mut Value, path: &str, value: i64) -> Result<()> {
    *lookup_or_create(doc, path)? = Value::from(value);
    Ok(())
}

pub fn set_bool(doc: &mut Value, path: &str, value: bool) -> Result<()> {
    *lookup_or_create(doc, path)? = Value::Bool(value);
    Ok(())
}
