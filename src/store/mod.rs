/// Store abstractions for the dual-store router
///
/// A `StoreBackend` is an opaque handle over one key-value backend with a
/// fixed command surface. The router never owns backend lifecycle; it only
/// holds two such handles ("primary" and "secondary") and forwards
/// `Command` values to them. Commands are plain data rather than generated
/// per-name methods, so unlisted command names flow through the same path
/// as listed ones.
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::StoreError;

/// A single command invocation: name plus ordered arguments.
///
/// Created per call and discarded after dispatch. Argument bytes are
/// cheaply cloneable so the same invocation can be replayed against both
/// stores during a dual write.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub args: Vec<Bytes>,
}

impl Command {
    pub fn new<S: Into<String>>(name: S, args: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn get(key: &str) -> Self {
        Self::new("get", vec![Bytes::copy_from_slice(key.as_bytes())])
    }

    pub fn mget(keys: &[&str]) -> Self {
        Self::new(
            "mget",
            keys.iter()
                .map(|k| Bytes::copy_from_slice(k.as_bytes()))
                .collect(),
        )
    }

    pub fn set(key: &str, value: impl Into<Bytes>) -> Self {
        Self::new(
            "set",
            vec![Bytes::copy_from_slice(key.as_bytes()), value.into()],
        )
    }

    /// Set only if the key is absent
    pub fn setnx(key: &str, value: impl Into<Bytes>) -> Self {
        Self::new(
            "setnx",
            vec![Bytes::copy_from_slice(key.as_bytes()), value.into()],
        )
    }

    /// Set with a time-to-live in seconds
    pub fn setex(key: &str, ttl_sec: u64, value: impl Into<Bytes>) -> Self {
        Self::new(
            "setex",
            vec![
                Bytes::copy_from_slice(key.as_bytes()),
                Bytes::from(ttl_sec.to_string()),
                value.into(),
            ],
        )
    }

    pub fn sadd(key: &str, member: impl Into<Bytes>) -> Self {
        Self::new(
            "sadd",
            vec![Bytes::copy_from_slice(key.as_bytes()), member.into()],
        )
    }

    pub fn srem(key: &str, member: impl Into<Bytes>) -> Self {
        Self::new(
            "srem",
            vec![Bytes::copy_from_slice(key.as_bytes()), member.into()],
        )
    }

    pub fn smembers(key: &str) -> Self {
        Self::new("smembers", vec![Bytes::copy_from_slice(key.as_bytes())])
    }

    pub fn scard(key: &str) -> Self {
        Self::new("scard", vec![Bytes::copy_from_slice(key.as_bytes())])
    }

    pub fn del(key: &str) -> Self {
        Self::new("del", vec![Bytes::copy_from_slice(key.as_bytes())])
    }

    pub fn flushdb() -> Self {
        Self::new("flushdb", vec![])
    }

    /// Argument at `index` as UTF-8, for commands that treat it as text
    pub fn arg_str(&self, index: usize) -> Result<&str, StoreError> {
        let arg = self.args.get(index).ok_or_else(|| {
            StoreError::protocol(format!(
                "{}: missing argument at position {}",
                self.name, index
            ))
        })?;
        std::str::from_utf8(arg)
            .map_err(|_| StoreError::protocol(format!("{}: argument is not UTF-8", self.name)))
    }

    /// Argument at `index` parsed as an integer
    pub fn arg_int(&self, index: usize) -> Result<i64, StoreError> {
        self.arg_str(index)?.parse().map_err(|_| {
            StoreError::protocol(format!(
                "{}: argument at position {} is not an integer",
                self.name, index
            ))
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.args.len())
    }
}

/// Reply values produced by a store backend
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value (missing key, deleted key)
    Nil,
    /// Simple status reply ("OK")
    Status(String),
    /// Integer reply (counters, cardinality, 0/1 booleans)
    Int(i64),
    /// Bulk value
    Bulk(Bytes),
    /// Array reply (mget, smembers)
    Array(Vec<Value>),
}

impl Value {
    pub fn ok() -> Self {
        Value::Status("OK".to_string())
    }

    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Value::Bulk(data.into())
    }

    /// Whether this reply counts as "no answer" for fallback purposes.
    ///
    /// Nil is always missing. An array reply is missing when it is empty
    /// or every element is nil, which covers `mget` against absent keys
    /// and `smembers` against an absent set. An empty bulk string is a
    /// real (empty) value, not a miss.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Nil => true,
            Value::Array(items) => items.iter().all(|v| matches!(v, Value::Nil)),
            _ => false,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bulk(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// One key-value backend as seen by the router.
///
/// Implementations interpret the fixed command surface (get, mget, set,
/// setnx, setex, sadd, srem, smembers, scard, del, flushdb) and reject
/// anything else with `StoreError::UnknownCommand`. Handles must be
/// individually thread-safe; the router adds no pooling or retries.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Stable name for logs and error context ("primary", "secondary")
    fn name(&self) -> &str;

    /// Execute a single command and return its reply
    async fn call(&self, command: &Command) -> Result<Value, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_constructors() {
        let cmd = Command::get("k1");
        assert_eq!(cmd.name, "get");
        assert_eq!(cmd.args.len(), 1);
        assert_eq!(cmd.arg_str(0).unwrap(), "k1");

        let cmd = Command::setex("k1", 10, "v1");
        assert_eq!(cmd.name, "setex");
        assert_eq!(cmd.arg_int(1).unwrap(), 10);
        assert_eq!(cmd.arg_str(2).unwrap(), "v1");

        let cmd = Command::flushdb();
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_command_arg_errors() {
        let cmd = Command::get("k1");
        assert!(matches!(
            cmd.arg_str(1),
            Err(StoreError::Protocol(_))
        ));
        assert!(matches!(cmd.arg_int(0), Err(StoreError::Protocol(_))));
    }

    #[test]
    fn test_value_missing_semantics() {
        assert!(Value::Nil.is_missing());
        assert!(Value::Array(vec![]).is_missing());
        assert!(Value::Array(vec![Value::Nil, Value::Nil]).is_missing());

        assert!(!Value::bulk("v").is_missing());
        assert!(!Value::bulk("").is_missing());
        assert!(!Value::Int(0).is_missing());
        assert!(!Value::Array(vec![Value::Nil, Value::bulk("v")]).is_missing());
        assert!(!Value::ok().is_missing());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(3).as_int(), Some(3));
        assert_eq!(Value::Nil.as_int(), None);
        assert_eq!(
            Value::bulk("v").as_bytes(),
            Some(&Bytes::from_static(b"v"))
        );
        assert_eq!(
            Value::Array(vec![Value::Nil]).into_array(),
            Some(vec![Value::Nil])
        );
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::set("k", "v").to_string(), "set/2");
    }
}
