//! Bencode value tree: a strict decoder and the canonical encoder used for
//! info-hash computation.
//!
//! Dictionaries keep their entries in decoded order so that re-encoding a
//! decoded `info` dictionary reproduces the same bytes any other conforming
//! decoder/encoder pair would.

use crate::error::{Error, Result};

/// A decoded bencode value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Entries in the order they appeared on the wire.
    Dict(Vec<(Vec<u8>, Value)>),
}

/// Guards on hostile input.
#[derive(Clone, Copy, Debug)]
pub struct DecodeLimits {
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self { max_depth: 64 }
    }
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Bytes(_) => "byte string",
            Value::List(_) => "list",
            Value::Dict(_) => "dictionary",
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(Error::decode(format!("expected integer, found {}", other.kind()))),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(v) => Ok(v),
            other => Err(Error::decode(format!("expected byte string, found {}", other.kind()))),
        }
    }

    /// Byte string that must be valid UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes()?)
            .map_err(|e| Error::decode(format!("byte string is not utf-8: {e}")))
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(v) => Ok(v),
            other => Err(Error::decode(format!("expected list, found {}", other.kind()))),
        }
    }

    pub fn as_dict(&self) -> Result<&[(Vec<u8>, Value)]> {
        match self {
            Value::Dict(v) => Ok(v),
            other => Err(Error::decode(format!("expected dictionary, found {}", other.kind()))),
        }
    }

    /// Look up `key` in a dictionary. `None` when the key is absent;
    /// an error when `self` is not a dictionary.
    pub fn get(&self, key: &str) -> Result<Option<&Value>> {
        Ok(self.as_dict()?.iter().find(|(k, _)| k == key.as_bytes()).map(|(_, v)| v))
    }

    /// Like [`Value::get`] but a missing key is a decode error.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)?.ok_or_else(|| Error::decode(format!("missing key {key:?}")))
    }
}

/// Decode a complete bencoded document. Trailing bytes are rejected.
pub fn decode(data: &[u8]) -> Result<Value> {
    decode_with_limits(data, &DecodeLimits::default())
}

pub fn decode_with_limits(data: &[u8], limits: &DecodeLimits) -> Result<Value> {
    let mut p = Parser { data, pos: 0, limits };
    let v = p.value(0)?;
    if p.pos != data.len() {
        return Err(Error::decode(format!("{} trailing bytes after value", data.len() - p.pos)));
    }
    Ok(v)
}

/// Encode a value; dictionary entries are written in stored order.
pub fn encode(v: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(v, &mut out);
    out
}

fn encode_into(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Int(i) => {
            out.push(b'i');
            out.extend_from_slice(i.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(b) => encode_bytes(b, out),
        Value::List(items) => {
            out.push(b'l');
            for it in items {
                encode_into(it, out);
            }
            out.push(b'e');
        }
        Value::Dict(entries) => {
            out.push(b'd');
            for (k, v) in entries {
                encode_bytes(k, out);
                encode_into(v, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_bytes(b: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(b.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(b);
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    limits: &'a DecodeLimits,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::decode(format!("unexpected end of input at offset {}", self.pos)))
    }

    fn value(&mut self, depth: usize) -> Result<Value> {
        if depth > self.limits.max_depth {
            return Err(Error::decode(format!("nesting deeper than {}", self.limits.max_depth)));
        }
        match self.peek()? {
            b'i' => {
                self.pos += 1;
                let n = self.integer(b'e')?;
                Ok(Value::Int(n))
            }
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut entries = Vec::new();
                while self.peek()? != b'e' {
                    if !self.peek()?.is_ascii_digit() {
                        return Err(Error::decode(format!(
                            "dictionary key must be a byte string (offset {})",
                            self.pos
                        )));
                    }
                    let k = self.bytes()?;
                    let v = self.value(depth + 1)?;
                    entries.push((k, v));
                }
                self.pos += 1;
                Ok(Value::Dict(entries))
            }
            b'0'..=b'9' => Ok(Value::Bytes(self.bytes()?)),
            c => Err(Error::decode(format!("unexpected byte {:#04x} at offset {}", c, self.pos))),
        }
    }

    /// Parse a decimal integer terminated by `end`, consuming the terminator.
    fn integer(&mut self, end: u8) -> Result<i64> {
        let start = self.pos;
        let rel = self.data[start..]
            .iter()
            .position(|&b| b == end)
            .ok_or_else(|| Error::decode(format!("unterminated integer at offset {start}")))?;
        let digits = &self.data[start..start + rel];
        let (neg, body) = match digits.split_first() {
            Some((b'-', rest)) => (true, rest),
            _ => (false, digits),
        };
        if body.is_empty() || !body.iter().all(u8::is_ascii_digit) {
            return Err(Error::decode(format!("malformed integer at offset {start}")));
        }
        if body.len() > 1 && body[0] == b'0' {
            return Err(Error::decode(format!("leading zero in integer at offset {start}")));
        }
        if neg && body == b"0" {
            return Err(Error::decode(format!("negative zero at offset {start}")));
        }
        let mut n: i64 = 0;
        for &d in body {
            n = n
                .checked_mul(10)
                .and_then(|n| {
                    let d = i64::from(d - b'0');
                    if neg {
                        n.checked_sub(d)
                    } else {
                        n.checked_add(d)
                    }
                })
                .ok_or_else(|| Error::decode(format!("integer overflow at offset {start}")))?;
        }
        self.pos = start + rel + 1;
        Ok(n)
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let at = self.pos;
        let len = self.integer(b':')?;
        if len < 0 {
            return Err(Error::decode(format!("negative string length at offset {at}")));
        }
        let len = len as usize;
        if self.data.len() - self.pos < len {
            return Err(Error::decode(format!(
                "string of {len} bytes at offset {at} runs past end of input"
            )));
        }
        let out = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_structure_in_order() {
        let v = decode(b"d4:spaml1:a1:be3:cowi-3ee").unwrap();
        let d = v.as_dict().unwrap();
        assert_eq!(d[0].0, b"spam");
        assert_eq!(d[1].0, b"cow");
        assert_eq!(v.require("cow").unwrap().as_int().unwrap(), -3);
        assert_eq!(v.require("spam").unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn reencode_preserves_unsorted_key_order() {
        let raw = b"d1:zi1e1:ai2ee";
        assert_eq!(encode(&decode(raw).unwrap()), raw.to_vec());
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            &b"i03e"[..],
            b"i-0e",
            b"ie",
            b"i12",
            b"5:abc",
            b"l1:a",
            b"di1ei2ee",
            b"i1ei2e",
            b"x",
            b"",
            b"03:abc",
        ] {
            assert!(matches!(decode(bad), Err(Error::Decode(_))), "{:?}", bad);
        }
    }

    #[test]
    fn depth_limit_applies() {
        let mut deep = vec![b'l'; 10];
        deep.extend_from_slice(&[b'e'; 10]);
        assert!(decode_with_limits(&deep, &DecodeLimits { max_depth: 4 }).is_err());
        assert!(decode(&deep).is_ok());
    }

    #[test]
    fn typed_accessors_report_kind_mismatch() {
        let v = decode(b"d1:ai1ee").unwrap();
        let err = v.require("a").unwrap().as_bytes().unwrap_err();
        assert!(err.to_string().contains("found integer"));
        assert!(v.require("b").is_err());
        assert!(v.require("a").unwrap().get("x").is_err());
    }
}
