//! Wire encoding of calls and batches.
//!
//! A call is one line `method=<m>&key=<v>&list[]=<v>&map[sub]=<v>`, values percent encoded.
//! A batch is every call line joined by `\n`, framed by a leading and a trailing `\n`.

use crate::{
    error::{EncodeError, Error},
    result::Result,
    value::{ParamMap, ParamValue},
};
use indexmap::IndexMap;
use std::borrow::Cow;

pub const LINE_SEPARATOR: char = '\n';
pub const PAIR_SEPARATOR: char = '&';
pub const METHOD_KEY: &str = "method";

fn encode_scalar(key: &str, value: &ParamValue) -> std::result::Result<Cow<'static, str>, EncodeError> {
    let text = match value {
        ParamValue::Null => return Ok(Cow::Borrowed("")),
        ParamValue::Bool(b) => b.to_string(),
        ParamValue::Int(i) => i.to_string(),
        ParamValue::Float(f) if f.is_finite() => f.to_string(),
        ParamValue::Float(_) => return Err(EncodeError::new(key, "non-finite number")),
        ParamValue::String(s) => return Ok(Cow::Owned(urlencoding::encode(s).into_owned())),
        ParamValue::Array(_) | ParamValue::Map(_) => return Err(EncodeError::new(key, value.kind())),
    };
    Ok(Cow::Owned(text))
}

/// Appends the `key=value` pairs of a single named value to `out`.
pub fn encode_value(key: &str, value: &ParamValue, out: &mut Vec<String>) -> std::result::Result<(), EncodeError> {
    match value {
        ParamValue::Array(items) => {
            let item_key = format!("{key}[]");
            for item in items {
                match item {
                    ParamValue::Array(_) => return Err(EncodeError::new(item_key, "array nested in array")),
                    ParamValue::Map(_) => return Err(EncodeError::new(item_key, "mapping nested in array")),
                    _ => out.push(format!("{item_key}={}", encode_scalar(&item_key, item)?)),
                }
            }
        }
        ParamValue::Map(entries) => {
            for (sub_key, sub_value) in entries {
                encode_value(&format!("{key}[{sub_key}]"), sub_value, out)?;
            }
        }
        _ => out.push(format!("{key}={}", encode_scalar(key, value)?)),
    }
    Ok(())
}

/// Encodes one call as a wire line.
pub fn encode_call(method: &str, params: &ParamMap) -> std::result::Result<String, EncodeError> {
    let mut pairs = Vec::with_capacity(params.len() + 1);
    pairs.push(format!("{METHOD_KEY}={}", urlencoding::encode(method)));
    for (key, value) in params {
        encode_value(key, value, &mut pairs)?;
    }
    Ok(pairs.join("&"))
}

/// Frames already encoded call lines into a request body.
pub fn encode_batch<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut body = String::from(LINE_SEPARATOR);
    for line in lines {
        body.push_str(line.as_ref());
        body.push(LINE_SEPARATOR);
    }
    body
}

/// Builds the query string of the endpoint. Values are expected to be transport safe already
/// and are written as given.
pub fn encode_query(query: &IndexMap<String, String>) -> String {
    query.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join("&")
}

/// A decoded wire line: the method and the remaining `key=value` pairs, values decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireCall {
    pub method: String,
    pub pairs: Vec<(String, String)>,
}

impl WireCall {
    /// Value of the first pair named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Encodes the call back into its wire line.
    pub fn encode(&self) -> String {
        let mut line = format!("{METHOD_KEY}={}", urlencoding::encode(&self.method));
        for (key, value) in &self.pairs {
            line.push(PAIR_SEPARATOR);
            line.push_str(key);
            line.push('=');
            line.push_str(&urlencoding::encode(value));
        }
        line
    }
}

fn decode_component(text: &str) -> Result<String> {
    urlencoding::decode(text)
        .map(Cow::into_owned)
        .map_err(|err| Error::Protocol(format!("invalid percent encoding in `{text}`: {err}")))
}

/// Decodes a single wire line.
pub fn decode_call(line: &str) -> Result<WireCall> {
    let mut method = None;
    let mut pairs = Vec::new();
    for pair in line.split(PAIR_SEPARATOR) {
        let (key, value) = pair.split_once('=').ok_or_else(|| Error::Protocol(format!("pair without `=`: `{pair}`")))?;
        if method.is_none() && key == METHOD_KEY {
            method = Some(decode_component(value)?);
        } else {
            pairs.push((key.to_string(), decode_component(value)?));
        }
    }
    let method = method.ok_or_else(|| Error::Protocol(format!("line without method: `{line}`")))?;
    Ok(WireCall { method, pairs })
}

/// Decodes a request body into its calls, checking the framing separators.
pub fn decode_batch(body: &str) -> Result<Vec<WireCall>> {
    let framing = || Error::Protocol("batch body is not framed by line separators".to_string());
    let inner = body.strip_prefix(LINE_SEPARATOR).ok_or_else(framing)?;
    if inner.is_empty() {
        return Ok(vec![]);
    }
    inner.strip_suffix(LINE_SEPARATOR).ok_or_else(framing)?.split(LINE_SEPARATOR).map(decode_call).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_encode_call() {
        let params = params! {
            "text" => "a b&c=d/é",
            "page" => 2,
            "ratio" => 0.25,
            "safe" => false,
            "nothing" => ParamValue::Null,
            "tags" => vec!["x", "y z"],
            "filter" => params! { "kind" => "photo", "size" => params! { "min" => 10 } },
        };
        let line = encode_call("photos.search", &params).unwrap();
        assert_eq!(
            line,
            "method=photos.search&text=a%20b%26c%3Dd%2F%C3%A9&page=2&ratio=0.25&safe=false&nothing=\
             &tags[]=x&tags[]=y%20z&filter[kind]=photo&filter[size][min]=10"
        );
    }

    #[test]
    fn test_null_and_empty_collections() {
        let params = params! {
            "a" => ParamValue::Null,
            "b" => Vec::<i32>::new(),
            "c" => ParamMap::new(),
            "d" => vec![ParamValue::Null],
        };
        // empty collections contribute no pair, null elements encode as empty values
        assert_eq!(encode_call("m", &params).unwrap(), "method=m&a=&d[]=");
        assert_eq!(encode_call("m", &ParamMap::new()).unwrap(), "method=m");
    }

    #[test]
    fn test_unsupported_kinds() {
        let nested = params! { "grid" => ParamValue::Array(vec![ParamValue::from(vec![1, 2])]) };
        assert_eq!(encode_call("m", &nested), Err(EncodeError::new("grid[]", "array nested in array")));

        let objects = params! { "items" => ParamValue::Array(vec![ParamValue::Map(params! { "id" => 1 })]) };
        assert_eq!(encode_call("m", &objects), Err(EncodeError::new("items[]", "mapping nested in array")));

        let nan = params! { "opts" => params! { "weight" => f64::NAN } };
        assert_eq!(encode_call("m", &nan), Err(EncodeError::new("opts[weight]", "non-finite number")));
    }

    #[test]
    fn test_encode_batch_framing() {
        assert_eq!(encode_batch(["method=a", "method=b&x=1"]), "\nmethod=a\nmethod=b&x=1\n");
        assert_eq!(encode_batch(Vec::<String>::new()), "\n");
    }

    #[test]
    fn test_encode_query_is_verbatim() {
        let mut query = IndexMap::new();
        query.insert("api_key".to_string(), "k%20y".to_string());
        query.insert("format".to_string(), "json".to_string());
        assert_eq!(encode_query(&query), "api_key=k%20y&format=json");
        assert_eq!(encode_query(&IndexMap::new()), "");
    }

    #[test]
    fn test_decode_then_encode_round_trip() {
        let lines = [
            encode_call("users.get", &params! { "ids" => vec![1, 2, 3], "fields" => "name,photo" }).unwrap(),
            encode_call("wall.post", &params! { "message" => "hi there & bye", "opts" => params! { "pin" => true } }).unwrap(),
            encode_call("status", &ParamMap::new()).unwrap(),
        ];
        let body = encode_batch(&lines);
        let calls = decode_batch(&body).unwrap();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].method, "users.get");
        assert_eq!(calls[1].get("message"), Some("hi there & bye"));
        assert_eq!(calls[1].get("opts[pin]"), Some("true"));
        assert!(calls[2].pairs.is_empty());
        assert_eq!(encode_batch(calls.iter().map(WireCall::encode)), body);
    }

    #[test]
    fn test_decode_rejects_bad_framing() {
        assert!(decode_batch("method=a\n").is_err());
        assert!(decode_batch("\nnot-a-pair\n").is_err());
        assert!(decode_batch("\nx=1\n").is_err());
        assert!(decode_batch("\n").unwrap().is_empty());
    }
}
