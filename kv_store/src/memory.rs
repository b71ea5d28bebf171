//! In-memory implementation of [`KeyValueStore`].

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{Error, KeyValueStore, Result};

#[derive(Debug)]
enum Value {
    Set(HashSet<String>),
    List(VecDeque<String>),
}

/// A store holding all keys in process memory, used by tests and by
/// single-machine deployments.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str, operation: &'static str) -> Error {
    Error::WrongType {
        key: key.to_string(),
        operation,
    }
}

/// Translate a possibly-negative range index into a list offset.
fn resolve_index(index: i64, len: usize) -> i64 {
    if index < 0 {
        index + len as i64
    } else {
        index
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(HashSet::new()))
        {
            Value::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            Value::List(_) => Err(wrong_type(key, "set_add")),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(Value::Set(set)) => {
                set.remove(member);
                Ok(())
            }
            Some(Value::List(_)) => Err(wrong_type(key, "set_remove")),
            None => Ok(()),
        }
    }

    async fn set_cardinality(&self, key: &str) -> Result<u64> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(Value::Set(set)) => Ok(set.len() as u64),
            Some(Value::List(_)) => Err(wrong_type(key, "set_cardinality")),
            None => Ok(0),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(Value::List(_)) => Err(wrong_type(key, "set_members")),
            None => Ok(vec![]),
        }
    }

    async fn list_left_push(&self, key: &str, values: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock();
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Value::List(VecDeque::new()))
        {
            Value::List(list) => {
                for value in values {
                    list.push_front(value);
                }
                Ok(())
            }
            Value::Set(_) => Err(wrong_type(key, "list_left_push")),
        }
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let entries = self.entries.lock();
        let list = match entries.get(key) {
            Some(Value::List(list)) => list,
            Some(Value::Set(_)) => return Err(wrong_type(key, "list_range")),
            None => return Ok(vec![]),
        };

        let len = list.len();
        let start = resolve_index(start, len).max(0) as usize;
        let stop = resolve_index(stop, len);
        if stop < 0 || start >= len {
            return Ok(vec![]);
        }
        let stop = (stop as usize).min(len - 1);
        if start > stop {
            return Ok(vec![]);
        }
        Ok(list.iter().skip(start).take(stop - start + 1).cloned().collect())
    }

    async fn scan_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn flush_all(&self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "memory"
    }
}
