//! A storage backend that keeps everything in a single json file
use crate::{
    error::Result,
    pupo::{Pupo, PupoData, PupoInput},
    store::Store,
    vote::Vote,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs, sync::RwLock};
use tracing::{debug, trace};

/// The contents of the storage file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct Document {
    #[serde(default)]
    next_id: i64,
    #[serde(default)]
    pupi: Vec<Pupo>,
    #[serde(default)]
    votes: Vec<Vote>,
}

/// Older data files are just a bare array of pupi
#[derive(Deserialize)]
#[serde(untagged)]
enum FileFormat {
    Document(Document),
    Bare(Vec<Pupo>),
}

impl Document {
    fn parse(contents: &str) -> Result<Self> {
        let mut doc = match serde_json::from_str(contents)? {
            FileFormat::Document(doc) => doc,
            FileFormat::Bare(pupi) => Document {
                pupi,
                ..Default::default()
            },
        };
        let max_id = doc.pupi.iter().map(|p| p.id).max().unwrap_or(0);
        doc.next_id = doc.next_id.max(max_id + 1);
        Ok(doc)
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.pupi.iter().position(|p| p.id == id)
    }
}

/// A [Store] that keeps all records in memory and rewrites the whole file
/// after every change. Writers are serialized by a lock, and the file is
/// replaced atomically by writing a temporary file and renaming it.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: Arc<PathBuf>,
    doc: Arc<RwLock<Document>>,
}

impl JsonFileStore {
    /// Open the json file at `path`, creating it (and its parent directory)
    /// if it does not exist yet
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = match fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Document::default(),
            Ok(contents) => Document::parse(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "Creating new json storage file");
                let doc = Document::default();
                write_document(&path, &doc).await?;
                doc
            }
            Err(e) => return Err(e.into()),
        };
        trace!(npupi = doc.pupi.len(), nvotes = doc.votes.len(), "Loaded json storage file");
        Ok(Self {
            path: Arc::new(path),
            doc: Arc::new(RwLock::new(doc)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on a copy of the document and only replace the in-memory state
    /// once the modified copy has been written to disk
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Document) -> Result<T> + Send,
        T: Send,
    {
        let mut guard = self.doc.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_document(&self.path, &next).await?;
        *guard = next;
        Ok(out)
    }
}

async fn write_document(path: &Path, doc: &Document) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl Store for JsonFileStore {
    async fn list_pupi(&self) -> Result<Vec<Pupo>> {
        let mut pupi = self.doc.read().await.pupi.clone();
        pupi.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(pupi)
    }

    async fn get_pupo(&self, id: i64) -> Result<Option<Pupo>> {
        Ok(self
            .doc
            .read()
            .await
            .pupi
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn count_pupi(&self) -> Result<i64> {
        Ok(self.doc.read().await.pupi.len() as i64)
    }

    async fn create_pupo(&self, data: PupoData) -> Result<Pupo> {
        self.mutate(|doc| {
            let pupo = data.with_id(doc.allocate_id());
            doc.pupi.push(pupo.clone());
            Ok(pupo)
        })
        .await
    }

    async fn update_pupo(&self, id: i64, patch: PupoInput) -> Result<Option<Pupo>> {
        self.mutate(|doc| {
            let Some(pos) = doc.position(id) else {
                return Ok(None);
            };
            let updated = doc.pupi[pos].apply(patch)?;
            doc.pupi[pos] = updated.clone();
            Ok(Some(updated))
        })
        .await
    }

    async fn delete_pupo(&self, id: i64) -> Result<bool> {
        if self.get_pupo(id).await?.is_none() {
            return Ok(false);
        }
        self.mutate(|doc| {
            let before = doc.pupi.len();
            doc.pupi.retain(|p| p.id != id);
            doc.votes.retain(|v| v.pupo_id != id);
            Ok(doc.pupi.len() != before)
        })
        .await
    }

    async fn insert_bulk(&self, pupi: Vec<PupoData>) -> Result<usize> {
        if pupi.is_empty() {
            return Ok(0);
        }
        self.mutate(|doc| {
            let n = pupi.len();
            for data in pupi {
                let id = doc.allocate_id();
                doc.pupi.push(data.with_id(id));
            }
            Ok(n)
        })
        .await
    }

    async fn has_vote(&self, user_id: &str, pupo_id: i64) -> Result<bool> {
        Ok(self
            .doc
            .read()
            .await
            .votes
            .iter()
            .any(|v| v.user_id == user_id && v.pupo_id == pupo_id))
    }

    async fn add_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        if self.has_vote(user_id, pupo_id).await? {
            return Ok(());
        }
        let vote = Vote::new(user_id.to_string(), pupo_id);
        self.mutate(|doc| {
            // re-check under the write lock
            if !doc
                .votes
                .iter()
                .any(|v| v.user_id == vote.user_id && v.pupo_id == vote.pupo_id)
            {
                doc.votes.push(vote);
            }
            Ok(())
        })
        .await
    }

    async fn remove_vote(&self, user_id: &str, pupo_id: i64) -> Result<()> {
        if !self.has_vote(user_id, pupo_id).await? {
            return Ok(());
        }
        self.mutate(|doc| {
            doc.votes
                .retain(|v| !(v.user_id == user_id && v.pupo_id == pupo_id));
            Ok(())
        })
        .await
    }

    async fn user_votes(&self, user_id: &str) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .doc
            .read()
            .await
            .votes
            .iter()
            .filter(|v| v.user_id == user_id)
            .map(|v| v.pupo_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn vote_counts(&self) -> Result<BTreeMap<i64, i64>> {
        let mut counts = BTreeMap::new();
        for vote in self.doc.read().await.votes.iter() {
            *counts.entry(vote.pupo_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn close(&self) {}
}
