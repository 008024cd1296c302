use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use courier_core::path;

use crate::document::{Collection, Document};
use crate::error::StoreError;
use crate::store::{DocumentStore, DocumentsOpts, NowFn};

#[derive(Clone)]
struct StoredDoc {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// In-memory document store. A BTreeMap keyed by canonical path gives
/// ordered prefix scans for free.
pub struct Mem {
    docs: Mutex<BTreeMap<String, StoredDoc>>,
    now_fn: StdMutex<NowFn>,
}

impl Mem {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(BTreeMap::new()),
            now_fn: StdMutex::new(Arc::new(Utc::now)),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let now_fn = self.now_fn.lock().expect("clock lock");
        now_fn()
    }

    fn child_prefix(parent: &str) -> Result<String, StoreError> {
        let parent = path::canonicalize(parent)?;
        if parent == "/" {
            Ok("/".to_string())
        } else {
            Ok(format!("{}/", parent))
        }
    }
}

impl Default for Mem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for Mem {
    async fn create(&self, doc_path: &str, data: &[u8]) -> Result<(), StoreError> {
        let key = path::canonicalize(doc_path)?;
        let now = self.now();
        let mut docs = self.docs.lock().await;
        if docs.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key));
        }
        docs.insert(
            key,
            StoredDoc {
                data: data.to_vec(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn set(&self, doc_path: &str, data: &[u8]) -> Result<(), StoreError> {
        let key = path::canonicalize(doc_path)?;
        let now = self.now();
        let mut docs = self.docs.lock().await;
        match docs.get_mut(&key) {
            Some(doc) => {
                doc.data = data.to_vec();
                doc.updated_at = now;
            }
            None => {
                docs.insert(
                    key,
                    StoredDoc {
                        data: data.to_vec(),
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get(&self, doc_path: &str) -> Result<Option<Document>, StoreError> {
        let key = path::canonicalize(doc_path)?;
        let docs = self.docs.lock().await;
        Ok(docs.get(&key).map(|doc| Document {
            path: key.clone(),
            data: doc.data.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }))
    }

    async fn delete(&self, doc_path: &str) -> Result<bool, StoreError> {
        let key = path::canonicalize(doc_path)?;
        let mut docs = self.docs.lock().await;
        Ok(docs.remove(&key).is_some())
    }

    async fn documents(
        &self,
        parent: &str,
        opts: &DocumentsOpts,
    ) -> Result<Vec<Document>, StoreError> {
        let child_prefix = Self::child_prefix(parent)?;
        let docs = self.docs.lock().await;

        let mut out = Vec::new();
        let mut skipped = 0;
        for (key, doc) in docs.range(child_prefix.clone()..) {
            if !key.starts_with(&child_prefix) {
                break;
            }
            let name = &key[child_prefix.len()..];
            if let Some(prefix) = &opts.prefix {
                if !name.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            if skipped < opts.index {
                skipped += 1;
                continue;
            }
            out.push(Document {
                path: key.clone(),
                data: if opts.path_only {
                    Vec::new()
                } else {
                    doc.data.clone()
                },
                created_at: doc.created_at,
                updated_at: doc.updated_at,
            });
            if opts.limit > 0 && out.len() >= opts.limit {
                break;
            }
        }
        Ok(out)
    }

    async fn collections(&self, parent: &str) -> Result<Vec<Collection>, StoreError> {
        let child_prefix = Self::child_prefix(parent)?;
        let docs = self.docs.lock().await;

        let mut names: Vec<String> = Vec::new();
        for key in docs.keys() {
            if !key.starts_with(&child_prefix) {
                continue;
            }
            let rest = &key[child_prefix.len()..];
            if let Some((name, _)) = rest.split_once('/') {
                let name = name.to_string();
                if names.last() != Some(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names
            .into_iter()
            .map(|name| Collection {
                path: path::join(&[child_prefix.as_str(), &name]),
            })
            .collect())
    }

    fn set_time_now(&self, now_fn: NowFn) {
        let mut guard = self.now_fn.lock().expect("clock lock");
        *guard = now_fn;
    }
}
