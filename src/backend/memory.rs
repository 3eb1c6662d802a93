//! In-memory backend gateway for tests

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Backend, BackendError, Filter, Query, Rows, UserIdentity};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<Value>>,
    next_id: i64,
    user: Option<UserIdentity>,
    failures: HashSet<(String, Op)>,
    objects: BTreeMap<String, Vec<u8>>,
    calls: Vec<(String, Op)>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    gate: Arc<tokio::sync::RwLock<()>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().next_id = 1000;
        backend
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Insert `count` songs with ids 1..=count and distinct counters
    pub fn seed_songs(&self, count: i64) {
        let songs = (1..=count)
            .map(|id| {
                json!({
                    "id": id,
                    "title": format!("Song {}", id),
                    "artist": format!("Artist {}", id % 4),
                    "genre": if id % 2 == 0 { json!("rock") } else { json!("pop") },
                    "file_url": format!("https://cdn.test/{}.mp3", id),
                    "image_url": null,
                    "play_count": id * 10,
                    "likes_count": count - id,
                })
            })
            .collect();
        self.seed("songs", songs);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: i64) -> Option<Value> {
        self.rows(table).into_iter().find(|r| r["id"] == json!(id))
    }

    /// Stall every table and storage operation until the guard is dropped
    pub async fn hold(&self) -> tokio::sync::OwnedRwLockWriteGuard<()> {
        self.gate.clone().write_owned().await
    }

    /// Who `current_user` reports; `None` acts like an expired session
    pub fn set_user(&self, user: Option<UserIdentity>) {
        self.state.lock().unwrap().user = user;
    }

    /// Make every following `op` on `table` fail until cleared
    pub fn fail(&self, table: &str, op: Op) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((table.to_string(), op));
    }

    pub fn calls(&self, table: &str, op: Op) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(t, o)| t == table && *o == op)
            .count()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    fn begin(&self, table: &str, op: Op) -> Result<std::sync::MutexGuard<'_, State>, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((table.to_string(), op));
        if state.failures.contains(&(table.to_string(), op)) {
            return Err(BackendError::Http {
                status: 500,
                message: format!("injected {:?} failure on {}", op, table),
            });
        }
        Ok(state)
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&y.as_f64().unwrap_or_default()),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
        (Value::Null, _) => std::cmp::Ordering::Greater,
        (_, Value::Null) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = serde_json::Map::new();
    for column in columns.split(',').map(str::trim) {
        out.insert(column.to_string(), row.get(column).cloned().unwrap_or(Value::Null));
    }
    Value::Object(out)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn current_user(&self) -> Result<Option<UserIdentity>, BackendError> {
        Ok(self.state.lock().unwrap().user.clone())
    }

    async fn select(&self, table: &str, query: &Query) -> Result<Rows, BackendError> {
        let _open = self.gate.read().await;
        let state = self.begin(table, Op::Select)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| matches_all(r, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(&a[order.column.as_str()], &b[order.column.as_str()]);
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        let total = query.count_exact.then_some(rows.len() as u64);
        if let Some(range) = query.range {
            rows = rows
                .into_iter()
                .skip(range.from as usize)
                .take(range.len() as usize)
                .collect();
        }

        Ok(Rows {
            rows: rows.iter().map(|r| project(r, &query.columns)).collect(),
            total,
        })
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let _open = self.gate.read().await;
        let mut state = self.begin(table, Op::Insert)?;
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            if row.get("id").is_none() {
                state.next_id += 1;
                row["id"] = json!(state.next_id);
            }
            inserted.push(row);
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(
        &self,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, BackendError> {
        let _open = self.gate.read().await;
        let mut state = self.begin(table, Op::Update)?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_all(r, filters)) {
                if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                    for (k, v) in fields {
                        target.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, BackendError> {
        let _open = self.gate.read().await;
        let mut state = self.begin(table, Op::Delete)?;
        let mut deleted = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|r| {
                if matches_all(r, filters) {
                    deleted.push(r.clone());
                    false
                } else {
                    true
                }
            });
        }
        Ok(deleted)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BackendError> {
        let _open = self.gate.read().await;
        let mut state = self.begin(bucket, Op::Upload)?;
        state.objects.insert(format!("{}/{}", bucket, path), bytes);
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://public/{}/{}", bucket, path)
    }
}
