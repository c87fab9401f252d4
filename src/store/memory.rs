//! In-memory `MetadataStore` reference implementation.
//!
//! The teacher keeps equivalent state in `IndexManifest` (a `HashMap<PathBuf, FileState>`
//! behind `Arc<RwLock<_>>`, serialized to a JSON file). This promotes that shape to the
//! full metadata contract: projects, files, chunks, embeddings, checkpoints, and state.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{FileStat, MetadataStore};
use crate::model::{Chunk, File, IndexCheckpoint, Project};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Data {
    projects: HashMap<String, Project>,
    files: HashMap<String, File>,
    /// file_id -> chunk ids, kept alongside `chunks` so cascading deletes don't need a scan.
    file_chunk_ids: HashMap<String, Vec<String>>,
    chunks: HashMap<String, Chunk>,
    /// (chunk_id, model) -> vector
    embeddings: HashMap<(String, String), Vec<f32>>,
    checkpoints: HashMap<String, IndexCheckpoint>,
    state: HashMap<String, String>,
}

// `HashMap` with a tuple key doesn't derive `Serialize`/`Deserialize` directly through
// `serde_json` (object keys must be strings), so embeddings are (de)serialized through a
// flat Vec representation instead.
#[derive(Serialize, Deserialize)]
struct SerializableData {
    projects: HashMap<String, Project>,
    files: HashMap<String, File>,
    file_chunk_ids: HashMap<String, Vec<String>>,
    chunks: HashMap<String, Chunk>,
    embeddings: Vec<(String, String, Vec<f32>)>,
    checkpoints: HashMap<String, IndexCheckpoint>,
    state: HashMap<String, String>,
}

impl From<&Data> for SerializableData {
    fn from(d: &Data) -> Self {
        SerializableData {
            projects: d.projects.clone(),
            files: d.files.clone(),
            file_chunk_ids: d.file_chunk_ids.clone(),
            chunks: d.chunks.clone(),
            embeddings: d
                .embeddings
                .iter()
                .map(|((id, model), v)| (id.clone(), model.clone(), v.clone()))
                .collect(),
            checkpoints: d.checkpoints.clone(),
            state: d.state.clone(),
        }
    }
}

impl From<SerializableData> for Data {
    fn from(s: SerializableData) -> Self {
        Data {
            projects: s.projects,
            files: s.files,
            file_chunk_ids: s.file_chunk_ids,
            chunks: s.chunks,
            embeddings: s
                .embeddings
                .into_iter()
                .map(|(id, model, v)| ((id, model), v))
                .collect(),
            checkpoints: s.checkpoints,
            state: s.state,
        }
    }
}

pub struct InMemoryMetadataStore {
    data: RwLock<Data>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Data::default()),
        }
    }

    pub fn save_to_disk(&self, path: &Path) -> anyhow::Result<()> {
        let data = self.data.read().unwrap();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serializable: SerializableData = (&*data).into();
        let json = serde_json::to_string_pretty(&serializable)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_disk(&self, path: &Path) -> anyhow::Result<()> {
        let json = fs::read_to_string(path)?;
        let serializable: SerializableData = serde_json::from_str(&json)?;
        let mut data = self.data.write().unwrap();
        *data = serializable.into();
        Ok(())
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn save_project(&self, project: &Project) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> anyhow::Result<Option<Project>> {
        let data = self.data.read().unwrap();
        Ok(data.projects.get(id).cloned())
    }

    async fn refresh_project_stats(&self, project_id: &str) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        let file_count = data.files.values().filter(|f| f.project_id == project_id).count();
        let chunk_count = data
            .files
            .values()
            .filter(|f| f.project_id == project_id)
            .map(|f| data.file_chunk_ids.get(&f.id).map(|v| v.len()).unwrap_or(0))
            .sum();
        if let Some(project) = data.projects.get_mut(project_id) {
            project.file_count = file_count;
            project.chunk_count = chunk_count;
        }
        Ok(())
    }

    async fn save_file(&self, file: &File) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn get_file(&self, id: &str) -> anyhow::Result<Option<File>> {
        let data = self.data.read().unwrap();
        Ok(data.files.get(id).cloned())
    }

    async fn get_file_by_path(&self, project_id: &str, path: &str) -> anyhow::Result<Option<File>> {
        let data = self.data.read().unwrap();
        Ok(data
            .files
            .values()
            .find(|f| f.project_id == project_id && f.path == path)
            .cloned())
    }

    async fn list_files(&self, project_id: &str) -> anyhow::Result<Vec<File>> {
        let data = self.data.read().unwrap();
        Ok(data
            .files
            .values()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, id: &str) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.files.remove(id);
        if let Some(chunk_ids) = data.file_chunk_ids.remove(id) {
            for chunk_id in chunk_ids {
                data.chunks.remove(&chunk_id);
            }
        }
        Ok(())
    }

    async fn save_chunks(&self, chunks: &[Chunk]) -> anyhow::Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut data = self.data.write().unwrap();
        for chunk in chunks {
            data.file_chunk_ids
                .entry(chunk.file_id.clone())
                .or_default()
                .retain(|id| id != &chunk.id);
            data.file_chunk_ids
                .entry(chunk.file_id.clone())
                .or_default()
                .push(chunk.id.clone());
            data.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn get_chunks_for_file(&self, file_id: &str) -> anyhow::Result<Vec<Chunk>> {
        let data = self.data.read().unwrap();
        let ids = data.file_chunk_ids.get(file_id).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| data.chunks.get(id).cloned()).collect())
    }

    async fn get_chunk(&self, id: &str) -> anyhow::Result<Option<Chunk>> {
        let data = self.data.read().unwrap();
        Ok(data.chunks.get(id).cloned())
    }

    async fn delete_chunks(&self, ids: &[String]) -> anyhow::Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut data = self.data.write().unwrap();
        for id in ids {
            data.chunks.remove(id);
            data.embeddings.retain(|(chunk_id, _), _| chunk_id != id);
        }
        for chunk_ids in data.file_chunk_ids.values_mut() {
            chunk_ids.retain(|id| !ids.contains(id));
        }
        Ok(())
    }

    async fn all_chunk_ids(&self) -> anyhow::Result<Vec<String>> {
        let data = self.data.read().unwrap();
        Ok(data.chunks.keys().cloned().collect())
    }

    async fn save_embedding(&self, chunk_id: &str, model: &str, vector: Vec<f32>) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.embeddings.insert((chunk_id.to_string(), model.to_string()), vector);
        Ok(())
    }

    async fn get_embedding(&self, chunk_id: &str, model: &str) -> anyhow::Result<Option<Vec<f32>>> {
        let data = self.data.read().unwrap();
        Ok(data.embeddings.get(&(chunk_id.to_string(), model.to_string())).cloned())
    }

    async fn all_embedded_chunk_ids(&self) -> anyhow::Result<Vec<String>> {
        let data = self.data.read().unwrap();
        Ok(data.embeddings.keys().map(|(id, _)| id.clone()).collect())
    }

    async fn save_checkpoint(&self, project_id: &str, checkpoint: &IndexCheckpoint) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.checkpoints.insert(project_id.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn load_checkpoint(&self, project_id: &str) -> anyhow::Result<Option<IndexCheckpoint>> {
        let data = self.data.read().unwrap();
        Ok(data.checkpoints.get(project_id).cloned())
    }

    async fn clear_checkpoint(&self, project_id: &str) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.checkpoints.remove(project_id);
        Ok(())
    }

    async fn get_state(&self, key: &str) -> anyhow::Result<Option<String>> {
        let data = self.data.read().unwrap();
        Ok(data.state.get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut data = self.data.write().unwrap();
        data.state.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_files_for_reconciliation(&self, project_id: &str) -> anyhow::Result<HashMap<String, FileStat>> {
        let data = self.data.read().unwrap();
        Ok(data
            .files
            .values()
            .filter(|f| f.project_id == project_id)
            .map(|f| {
                (
                    f.path.clone(),
                    FileStat {
                        path: f.path.clone(),
                        modified_at: f.modified_at,
                        size_bytes: f.size_bytes,
                    },
                )
            })
            .collect())
    }

    async fn list_file_paths_under(&self, project_id: &str, dir_prefix: &str) -> anyhow::Result<Vec<String>> {
        let data = self.data.read().unwrap();
        Ok(data
            .files
            .values()
            .filter(|f| f.project_id == project_id && f.path.starts_with(dir_prefix))
            .map(|f| f.path.clone())
            .collect())
    }

    async fn get_file_paths_by_project(&self, project_id: &str) -> anyhow::Result<Vec<String>> {
        let data = self.data.read().unwrap();
        Ok(data
            .files
            .values()
            .filter(|f| f.project_id == project_id)
            .map(|f| f.path.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;
    use std::time::SystemTime;

    fn sample_file(project_id: &str, path: &str) -> File {
        File {
            id: File::compute_id(project_id, path),
            project_id: project_id.to_string(),
            path: path.to_string(),
            size_bytes: 10,
            modified_at: SystemTime::now(),
            content_hash: "hash".to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
        }
    }

    fn sample_chunk(file_id: &str, path: &str) -> Chunk {
        Chunk {
            id: Chunk::compute_id("fn a() {}", path, (1, 1)),
            file_id: file_id.to_string(),
            file_path: path.to_string(),
            language: "rust".to_string(),
            content_type: ContentType::Code,
            line_range: (1, 1),
            raw_content: "fn a() {}".to_string(),
            enriched_content: "fn a() {}".to_string(),
            file_context: None,
            symbols: vec![],
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn delete_file_cascades_to_chunks() {
        let store = InMemoryMetadataStore::new();
        let file = sample_file("p1", "a.rs");
        store.save_file(&file).await.unwrap();
        let chunk = sample_chunk(&file.id, "a.rs");
        store.save_chunks(&[chunk.clone()]).await.unwrap();

        assert_eq!(store.get_chunks_for_file(&file.id).await.unwrap().len(), 1);
        store.delete_file(&file.id).await.unwrap();
        assert!(store.get_file(&file.id).await.unwrap().is_none());
        assert_eq!(store.get_chunks_for_file(&file.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn embeddings_are_keyed_by_chunk_and_model() {
        let store = InMemoryMetadataStore::new();
        store.save_embedding("c1", "model-a", vec![1.0]).await.unwrap();
        store.save_embedding("c1", "model-b", vec![2.0]).await.unwrap();

        assert_eq!(store.get_embedding("c1", "model-a").await.unwrap(), Some(vec![1.0]));
        assert_eq!(store.get_embedding("c1", "model-b").await.unwrap(), Some(vec![2.0]));
    }

    #[tokio::test]
    async fn checkpoint_round_trip() {
        let store = InMemoryMetadataStore::new();
        assert!(store.load_checkpoint("p1").await.unwrap().is_none());

        let checkpoint = IndexCheckpoint {
            stage: crate::model::CheckpointStage::Embedding,
            total_chunks: 10,
            embedded_count: 5,
            embedder_model: "m1".to_string(),
        };
        store.save_checkpoint("p1", &checkpoint).await.unwrap();
        assert_eq!(store.load_checkpoint("p1").await.unwrap().unwrap().embedded_count, 5);

        store.clear_checkpoint("p1").await.unwrap();
        assert!(store.load_checkpoint("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_and_load_from_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let store = InMemoryMetadataStore::new();
        let file = sample_file("p1", "a.rs");
        store.save_file(&file).await.unwrap();
        store.set_state("gitignore_hash", "abc").await.unwrap();
        store.save_to_disk(&path).unwrap();

        let loaded = InMemoryMetadataStore::new();
        loaded.load_from_disk(&path).unwrap();
        assert!(loaded.get_file(&file.id).await.unwrap().is_some());
        assert_eq!(loaded.get_state("gitignore_hash").await.unwrap(), Some("abc".to_string()));
    }
}
