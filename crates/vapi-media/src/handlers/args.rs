//! Typed access to a task's argument bag.
//!
//! `null` is treated the same as an absent key. Numbers may also arrive as
//! numeric strings.

use serde_json::Value;
use vapi_models::TaskArguments;

use crate::error::{MediaError, MediaResult};

fn present<'a>(args: &'a TaskArguments, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

pub fn required_str<'a>(args: &'a TaskArguments, key: &str) -> MediaResult<&'a str> {
    match present(args, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(_) => Err(MediaError::invalid_argument(format!("{key} must be a non-empty string"))),
        None => Err(MediaError::invalid_argument(format!("missing required argument: {key}"))),
    }
}

/// First non-null key among `keys`, for arguments with legacy aliases.
pub fn required_str_any<'a>(args: &'a TaskArguments, keys: &[&str]) -> MediaResult<&'a str> {
    let key = keys
        .iter()
        .find(|k| present(args, k).is_some())
        .ok_or_else(|| {
            MediaError::invalid_argument(format!("missing required argument: {}", keys.join(" or ")))
        })?;
    required_str(args, key)
}

pub fn optional_str<'a>(args: &'a TaskArguments, key: &str, default: &'a str) -> MediaResult<&'a str> {
    match present(args, key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(MediaError::invalid_argument(format!("{key} must be a string"))),
        None => Ok(default),
    }
}

pub fn optional_f64(args: &TaskArguments, key: &str, default: f64) -> MediaResult<f64> {
    let value = match present(args, key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Ok(default),
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| MediaError::invalid_argument(format!("{key} must be a number")))
}

pub fn optional_u32(args: &TaskArguments, key: &str, default: u32) -> MediaResult<u32> {
    let value = match present(args, key) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
        None => return Ok(default),
    };
    value
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| MediaError::invalid_argument(format!("{key} must be a non-negative integer")))
}

pub fn optional_bool(args: &TaskArguments, key: &str, default: bool) -> MediaResult<bool> {
    match present(args, key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(MediaError::invalid_argument(format!("{key} must be a boolean"))),
        },
        Some(_) => Err(MediaError::invalid_argument(format!("{key} must be a boolean"))),
        None => Ok(default),
    }
}

pub fn required_str_list<'a>(args: &'a TaskArguments, key: &str) -> MediaResult<Vec<&'a str>> {
    let Some(Value::Array(items)) = present(args, key) else {
        return Err(MediaError::invalid_argument(format!("{key} must be a list of strings")));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Ok(s.as_str()),
            _ => Err(MediaError::invalid_argument(format!("{key} must be a list of strings"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> TaskArguments {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_required_str() {
        let a = args(json!({"video_url": "http://x/a.mp4", "empty": "", "null": null}));
        assert_eq!(required_str(&a, "video_url").unwrap(), "http://x/a.mp4");
        assert!(required_str(&a, "empty").is_err());
        assert!(required_str(&a, "null").unwrap_err().to_string().contains("missing"));
        assert!(required_str(&a, "absent").is_err());
    }

    #[test]
    fn test_alias_lookup() {
        let a = args(json!({"meme_url": "http://x/m.png"}));
        assert_eq!(required_str_any(&a, &["image_url", "meme_url"]).unwrap(), "http://x/m.png");
        let err = required_str_any(&TaskArguments::new(), &["image_url", "meme_url"]).unwrap_err();
        assert!(err.to_string().contains("image_url or meme_url"));
    }

    #[test]
    fn test_numbers_accept_numeric_strings() {
        let a = args(json!({"scale": "0.5", "width": 320, "time": "abc", "neg": -1}));
        assert_eq!(optional_f64(&a, "scale", 0.3).unwrap(), 0.5);
        assert_eq!(optional_f64(&a, "absent", 0.3).unwrap(), 0.3);
        assert!(optional_f64(&a, "time", 0.0).is_err());
        assert_eq!(optional_u32(&a, "width", 640).unwrap(), 320);
        assert!(optional_u32(&a, "neg", 0).is_err());
    }

    #[test]
    fn test_bools_and_lists() {
        let a = args(json!({"background": "false", "urls": ["a", "b"], "bad": ["a", 1]}));
        assert!(!optional_bool(&a, "background", true).unwrap());
        assert!(optional_bool(&a, "absent", true).unwrap());
        assert_eq!(required_str_list(&a, "urls").unwrap(), vec!["a", "b"]);
        assert!(required_str_list(&a, "bad").is_err());
        assert!(required_str_list(&a, "absent").is_err());
    }
}
