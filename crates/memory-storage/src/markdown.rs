//! Markdown+frontmatter memory files: the source of truth (spec §3, §4.A).
//!
//! One file per memory at `<memory_dir>/<id>.md`. Writes are atomic
//! (temp file + fsync + rename). Listing parses only the YAML frontmatter
//! of each file (bounded read up to the closing `---`), so enumeration is
//! O(N) in file count, not body size, per spec §4.A.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memory_core::error::{MemoryError, MemoryResult};
use memory_core::types::{Memory, Scope};

use crate::locks::LockTable;

/// YAML frontmatter shape (spec §6 "Markdown memory file").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Frontmatter {
    id: String,
    scope: String,
    project: String,
    tags: Vec<String>,
    importance: f64,
    created: DateTime<Utc>,
    last_reinforced: DateTime<Utc>,
    reinforcement_count: u32,
    source_session: String,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    archive_reason: Option<String>,
    #[serde(default)]
    promoted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    superseded_by: Option<String>,
}

impl Frontmatter {
    fn from_memory(m: &Memory) -> Self {
        Self {
            id: m.id.clone(),
            scope: m.scope.as_str().to_string(),
            project: m.project_id.clone(),
            tags: m.tags.clone(),
            importance: m.importance,
            created: m.created,
            last_reinforced: m.last_reinforced,
            reinforcement_count: m.reinforcement_count,
            source_session: m.source_session.clone().unwrap_or_else(|| "unknown".to_string()),
            archived: m.archived,
            archive_reason: m.archive_reason.clone(),
            promoted_at: m.promoted_at,
            superseded_by: m.superseded_by.clone(),
        }
    }

    fn into_memory(self, content: String) -> MemoryResult<Memory> {
        let scope: Scope = self.scope.parse()?;
        Ok(Memory {
            id: self.id,
            content,
            scope,
            project_id: self.project,
            tags: self.tags,
            importance: self.importance.clamp(0.0, 1.0),
            created: self.created,
            last_reinforced: self.last_reinforced,
            reinforcement_count: self.reinforcement_count,
            source_session: if self.source_session == "unknown" {
                None
            } else {
                Some(self.source_session)
            },
            archived: self.archived,
            archive_reason: self.archive_reason,
            superseded_by: self.superseded_by,
            promoted_at: self.promoted_at,
        })
    }
}

/// Filters accepted by `MarkdownStore::list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub project_id: Option<String>,
    pub scope: Option<Scope>,
    pub tag: Option<String>,
    pub min_importance: Option<f64>,
    pub include_archived: bool,
}

/// Markdown file CRUD (spec §4.A).
pub struct MarkdownStore {
    root: PathBuf,
    locks: LockTable,
    on_mutate: Mutex<Vec<Arc<dyn Fn(&str) + Send + Sync>>>,
}

impl MarkdownStore {
    pub fn open(memory_dir: impl AsRef<Path>) -> MemoryResult<Self> {
        let root = memory_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        fs::create_dir_all(root.join(".versions"))?;
        fs::create_dir_all(root.join(".quarantine"))?;
        Ok(Self { root, locks: LockTable::new(), on_mutate: Mutex::new(Vec::new()) })
    }

    /// Registers a callback invoked after any create/update/archive/restore
    /// for `id` — the embedding and retrieval cache layers use this to
    /// invalidate their own state (spec §4.A's "observable side effect").
    pub fn on_mutate(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.on_mutate.lock().unwrap().push(Arc::new(f));
    }

    fn notify(&self, id: &str) {
        for f in self.on_mutate.lock().unwrap().iter() {
            f(id);
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.md"))
    }

    fn versions_dir(&self, id: &str) -> PathBuf {
        self.root.join(".versions").join(id)
    }

    /// Atomic write: temp file in the same directory, fsync, rename.
    fn write_atomic(&self, path: &Path, contents: &str) -> MemoryResult<()> {
        let dir = path.parent().unwrap_or(&self.root);
        let tmp_path = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        {
            let mut f = fs::File::create(&tmp_path)?;
            f.write_all(contents.as_bytes())?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn serialize(memory: &Memory) -> MemoryResult<String> {
        let fm = Frontmatter::from_memory(memory);
        let yaml = serde_yaml::to_string(&fm).map_err(|e| MemoryError::dependency_failed(e.to_string()))?;
        Ok(format!("---\n{yaml}---\n\n{}\n", memory.content))
    }

    /// Parses frontmatter + body from a full file's contents.
    fn parse(id: &str, contents: &str) -> MemoryResult<Memory> {
        let rest = contents.strip_prefix("---\n").ok_or_else(|| {
            MemoryError::corruption(id.to_string(), "missing frontmatter delimiter")
        })?;
        let end = rest.find("\n---\n").ok_or_else(|| {
            MemoryError::corruption(id.to_string(), "missing closing frontmatter delimiter")
        })?;
        let yaml = &rest[..end];
        let body = rest[end + 5..].trim_start_matches('\n').to_string();
        let fm: Frontmatter =
            serde_yaml::from_str(yaml).map_err(|e| MemoryError::corruption(id.to_string(), e.to_string()))?;
        fm.into_memory(body)
    }

    /// Reads only the frontmatter block, stopping at the closing `---`
    /// without reading the (possibly large) body — keeps listing O(N) in
    /// file count rather than total byte size.
    fn read_frontmatter_only(path: &Path) -> MemoryResult<Option<Frontmatter>> {
        let file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut reader = BufReader::new(file);
        let mut first = String::new();
        reader.read_line(&mut first)?;
        if first.trim_end() != "---" {
            return Ok(None);
        }
        let mut yaml = String::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(None);
            }
            if line.trim_end() == "---" {
                break;
            }
            yaml.push_str(&line);
        }
        let fm: Frontmatter = serde_yaml::from_str(&yaml)
            .map_err(|e| MemoryError::corruption(path.display().to_string(), e.to_string()))?;
        Ok(Some(fm))
    }

    pub fn create(&self, memory: &Memory) -> MemoryResult<()> {
        if !(0.0..=1.0).contains(&memory.importance) {
            return Err(MemoryError::InvalidInput(format!(
                "importance must be within [0,1], got {}",
                memory.importance
            )));
        }
        self.locks.with_lock(&memory.id, || -> MemoryResult<()> {
            let path = self.path_for(&memory.id);
            let serialized = Self::serialize(memory)?;
            self.write_atomic(&path, &serialized)?;
            self.write_version(&memory.id, &serialized)?;
            Ok(())
        })?;
        self.notify(&memory.id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> MemoryResult<Option<Memory>> {
        let path = self.path_for(id);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(Self::parse(id, &contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn update(&self, memory: &Memory) -> MemoryResult<()> {
        self.locks.with_lock(&memory.id, || -> MemoryResult<()> {
            let path = self.path_for(&memory.id);
            if !path.exists() {
                return Err(MemoryError::not_found("memory", memory.id.clone()));
            }
            let serialized = Self::serialize(memory)?;
            self.write_atomic(&path, &serialized)?;
            self.write_version(&memory.id, &serialized)?;
            Ok(())
        })?;
        self.notify(&memory.id);
        Ok(())
    }

    fn write_version(&self, id: &str, serialized: &str) -> MemoryResult<()> {
        let dir = self.versions_dir(id);
        fs::create_dir_all(&dir)?;
        let next = fs::read_dir(&dir)?.count() + 1;
        self.write_atomic(&dir.join(format!("{next:04}.md")), serialized)
    }

    pub fn versions(&self, id: &str) -> MemoryResult<Vec<Memory>> {
        let dir = self.versions_dir(id);
        let mut entries: Vec<_> = match fs::read_dir(&dir) {
            Ok(rd) => rd.collect::<Result<Vec<_>, _>>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        entries.sort_by_key(|e| e.file_name());
        entries
            .into_iter()
            .map(|e| {
                let contents = fs::read_to_string(e.path())?;
                Self::parse(id, &contents)
            })
            .collect()
    }

    /// Idempotent: archiving an already-archived memory is a no-op success.
    pub fn archive(&self, id: &str, reason: &str) -> MemoryResult<()> {
        let mut memory = self.get(id)?.ok_or_else(|| MemoryError::not_found("memory", id.to_string()))?;
        if memory.archived {
            return Ok(());
        }
        memory.archived = true;
        memory.archive_reason = Some(reason.to_string());
        self.update(&memory)
    }

    pub fn restore(&self, id: &str) -> MemoryResult<()> {
        let mut memory = self.get(id)?.ok_or_else(|| MemoryError::not_found("memory", id.to_string()))?;
        memory.archived = false;
        memory.archive_reason = None;
        self.update(&memory)
    }

    /// Enumerates memories, reading only frontmatter then lazily loading
    /// bodies only for entries that survive `filters`.
    pub fn list(&self, filters: &ListFilters) -> MemoryResult<Vec<Memory>> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            let fm = match Self::read_frontmatter_only(&path) {
                Ok(Some(fm)) => fm,
                Ok(None) => continue,
                Err(_) => {
                    self.quarantine(&path, &id)?;
                    continue;
                }
            };
            if !filters.include_archived && fm.archived {
                continue;
            }
            if let Some(p) = &filters.project_id {
                if &fm.project != p {
                    continue;
                }
            }
            if let Some(scope) = filters.scope {
                if fm.scope != scope.as_str() {
                    continue;
                }
            }
            if let Some(tag) = &filters.tag {
                if !fm.tags.iter().any(|t| t == tag) {
                    continue;
                }
            }
            if let Some(min) = filters.min_importance {
                if fm.importance < min {
                    continue;
                }
            }
            match self.get(&id)? {
                Some(m) => out.push(m),
                None => continue,
            }
        }
        Ok(out)
    }

    pub fn search_by_substring(&self, q: &str, filters: &ListFilters) -> MemoryResult<Vec<Memory>> {
        let needle = q.to_lowercase();
        Ok(self
            .list(filters)?
            .into_iter()
            .filter(|m| m.content.to_lowercase().contains(&needle))
            .collect())
    }

    /// Moves an unparsable file aside instead of silently dropping it
    /// (spec §7 Corruption: "file is quarantined ... never silently dropped").
    fn quarantine(&self, path: &Path, id: &str) -> MemoryResult<()> {
        let dest = self.root.join(".quarantine").join(format!("{id}.md"));
        fs::rename(path, dest).map_err(MemoryError::from)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_count(&self) -> MemoryResult<usize> {
        match fs::read_dir(self.root.join(".quarantine")) {
            Ok(rd) => Ok(rd.count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl memory_core::traits::MemoryStore for MarkdownStore {
    fn create(&self, memory: &Memory) -> MemoryResult<()> {
        MarkdownStore::create(self, memory)
    }

    fn get(&self, id: &str) -> MemoryResult<Option<Memory>> {
        MarkdownStore::get(self, id)
    }

    fn update(&self, memory: &Memory) -> MemoryResult<()> {
        MarkdownStore::update(self, memory)
    }

    fn list(&self, include_archived: bool) -> MemoryResult<Vec<Memory>> {
        MarkdownStore::list(
            self,
            &ListFilters { include_archived, ..Default::default() },
        )
    }
}
