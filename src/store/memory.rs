/// In-memory store backend
///
/// Implements the fixed command surface against process-local state. Used
/// by the test suite, the `check` subcommand, and the benches; production
/// deployments wire real key-value clients behind `StoreBackend` instead.
/// Expiry from `setex` is enforced lazily on access.
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{Command, StoreBackend, Value};

/// Stored datum: plain value or unordered set
#[derive(Debug, Clone)]
enum Datum {
    Text(Bytes),
    Set(HashSet<Bytes>),
}

#[derive(Debug, Clone)]
struct Entry {
    datum: Datum,
    expires_at: Option<Instant>,
}

impl Entry {
    fn text(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            datum: Datum::Text(value),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Process-local key-value store
pub struct MemoryStore {
    name: String,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live (non-expired) keys
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn get_one(&self, key: &str) -> Value {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => match &entry.datum {
                Datum::Text(b) => Value::Bulk(b.clone()),
                // GET against a set has no text reply
                Datum::Set(_) => Value::Nil,
            },
            _ => Value::Nil,
        }
    }

    async fn set_value(&self, command: &Command, ttl: Option<Duration>) -> Result<Value, StoreError> {
        let key = command.arg_str(0)?.to_string();
        let value_index = if ttl.is_some() { 2 } else { 1 };
        let value = command
            .args
            .get(value_index)
            .cloned()
            .ok_or_else(|| StoreError::protocol(format!("{}: missing value", command.name)))?;

        let mut entries = self.entries.write().await;
        entries.insert(key, Entry::text(value, ttl));
        Ok(Value::ok())
    }

    async fn set_if_absent(&self, command: &Command) -> Result<Value, StoreError> {
        let key = command.arg_str(0)?.to_string();
        let value = command
            .args
            .get(1)
            .cloned()
            .ok_or_else(|| StoreError::protocol("setnx: missing value"))?;

        let mut entries = self.entries.write().await;
        let live = entries.get(&key).is_some_and(|e| !e.is_expired());
        if live {
            return Ok(Value::Int(0));
        }
        entries.insert(key, Entry::text(value, None));
        Ok(Value::Int(1))
    }

    async fn set_op(
        &self,
        command: &Command,
        apply: impl FnOnce(&mut HashSet<Bytes>, Bytes) -> i64,
    ) -> Result<Value, StoreError> {
        let key = command.arg_str(0)?.to_string();
        let member = command
            .args
            .get(1)
            .cloned()
            .ok_or_else(|| StoreError::protocol(format!("{}: missing member", command.name)))?;

        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_insert_with(|| Entry {
            datum: Datum::Set(HashSet::new()),
            expires_at: None,
        });
        if entry.is_expired() {
            entry.datum = Datum::Set(HashSet::new());
            entry.expires_at = None;
        }
        match &mut entry.datum {
            Datum::Set(members) => Ok(Value::Int(apply(members, member))),
            Datum::Text(_) => Err(StoreError::wrong_type(
                command.name.clone(),
                "key holds a plain value".to_string(),
            )),
        }
    }

    async fn read_set<T>(
        &self,
        command: &Command,
        read: impl FnOnce(&HashSet<Bytes>) -> T,
        empty: impl FnOnce() -> T,
    ) -> Result<T, StoreError> {
        let key = command.arg_str(0)?;
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => match &entry.datum {
                Datum::Set(members) => Ok(read(members)),
                Datum::Text(_) => Err(StoreError::wrong_type(
                    command.name.clone(),
                    "key holds a plain value".to_string(),
                )),
            },
            _ => Ok(empty()),
        }
    }

    async fn delete(&self, command: &Command) -> Result<Value, StoreError> {
        let mut entries = self.entries.write().await;
        let mut removed = 0;
        for arg in &command.args {
            let key = std::str::from_utf8(arg)
                .map_err(|_| StoreError::protocol("del: key is not UTF-8"))?;
            if let Some(entry) = entries.remove(key) {
                if !entry.is_expired() {
                    removed += 1;
                }
            }
        }
        Ok(Value::Int(removed))
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, command: &Command) -> Result<Value, StoreError> {
        match command.name.to_lowercase().as_str() {
            "get" => Ok(self.get_one(command.arg_str(0)?).await),
            "mget" => {
                if command.args.is_empty() {
                    return Err(StoreError::protocol("mget: at least one key required"));
                }
                let mut values = Vec::with_capacity(command.args.len());
                for index in 0..command.args.len() {
                    values.push(self.get_one(command.arg_str(index)?).await);
                }
                Ok(Value::Array(values))
            }
            "set" => self.set_value(command, None).await,
            "setnx" => self.set_if_absent(command).await,
            "setex" => {
                let ttl_sec = command.arg_int(1)?;
                if ttl_sec <= 0 {
                    return Err(StoreError::protocol("setex: ttl must be positive"));
                }
                self.set_value(command, Some(Duration::from_secs(ttl_sec as u64)))
                    .await
            }
            "sadd" => {
                self.set_op(command, |members, m| i64::from(members.insert(m)))
                    .await
            }
            "srem" => {
                self.set_op(command, |members, m| i64::from(members.remove(&m)))
                    .await
            }
            "smembers" => {
                self.read_set(
                    command,
                    |members| {
                        Value::Array(members.iter().cloned().map(Value::Bulk).collect())
                    },
                    || Value::Array(vec![]),
                )
                .await
            }
            "scard" => {
                self.read_set(
                    command,
                    |members| Value::Int(members.len() as i64),
                    || Value::Int(0),
                )
                .await
            }
            "del" => self.delete(command).await,
            "flushdb" => {
                let mut entries = self.entries.write().await;
                entries.clear();
                Ok(Value::ok())
            }
            // verification helper, deliberately outside the classified sets
            "dbsize" => Ok(Value::Int(self.len().await as i64)),
            other => Err(StoreError::unknown_command(other)),
        }
    }
}
