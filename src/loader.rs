//! Directory loader.
//!
//! Walks a directory, parses and embeds every matching file, and returns
//! the embedded structures sorted by path. Files whose content hash matches
//! an entry of the previous corpus are restored from it instead of being
//! parsed and embedded again.
//!
//! Include and exclude patterns are matched against the path relative to
//! the walk root. `.git`, `target` and `node_modules` are always excluded.
//!
//! [`load_files`] prepares a store for a handful of named files (the
//! `map` command): the persisted corpus is restored, except for entries of
//! those files whose content changed, which are parsed and embedded afresh.

use anyhow::{bail, Context, Result};
use fieldmap_core::models::EmbeddedStructure;
use fieldmap_core::store::VectorIndex;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::corpus::{content_hash, rebuild_store, Corpus};
use crate::mapper::{insert_embedded, Mapper};
use crate::parser::StructureParser;

/// Counts reported after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub scanned: usize,
    pub embedded: usize,
    pub reused: usize,
    pub skipped: usize,
}

/// List the files under `root` accepted by the configured globs, sorted.
pub fn scan_directory(root: &Path, config: &CorpusConfig) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Load root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy();

        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Parse, embed and insert every file under `root` into `store`.
pub async fn load_directory<S>(
    root: &Path,
    config: &CorpusConfig,
    parser: &StructureParser<'_>,
    mapper: &Mapper<'_>,
    store: &mut S,
    previous: Option<&Corpus>,
) -> Result<(Vec<EmbeddedStructure>, LoadSummary)>
where
    S: VectorIndex + ?Sized,
{
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve load root: {}", root.display()))?;
    let files = scan_directory(&root, config)?;

    let mut summary = LoadSummary {
        scanned: files.len(),
        ..Default::default()
    };
    let mut structures = Vec::with_capacity(files.len());

    for file in files {
        let bytes = tokio::fs::read(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        if content.trim().is_empty() {
            warn!(path = %file.display(), "skipping empty file");
            summary.skipped += 1;
            continue;
        }

        let path = file.to_string_lossy().into_owned();
        let hash = content_hash(&content);

        if let Some(entry) = previous.and_then(|c| c.unchanged(&path, &hash)) {
            let embedded = entry.clone().into_embedded();
            insert_embedded(store, &embedded)
                .with_context(|| format!("Failed to restore {}", path))?;
            debug!(path = %path, "content unchanged, reusing embeddings");
            summary.reused += 1;
            structures.push(embedded);
            continue;
        }

        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let structure = parser.parse(&filename, &path, &content).await;
        let embedded = mapper
            .embed_structure(store, structure)
            .await
            .with_context(|| format!("Failed to embed {}", path))?;
        summary.embedded += 1;
        structures.push(embedded);
    }

    info!(
        scanned = summary.scanned,
        embedded = summary.embedded,
        reused = summary.reused,
        skipped = summary.skipped,
        "directory loaded"
    );
    Ok((structures, summary))
}

/// Restore `previous` into `store` and return one embedded structure per
/// entry of `files`, in order.
///
/// A file whose persisted entry is missing or out of date is parsed and
/// embedded again, and its stale entry is not restored, so the store never
/// holds two versions of the same path.
pub async fn load_files<S>(
    files: &[PathBuf],
    previous: Option<Corpus>,
    parser: &StructureParser<'_>,
    mapper: &Mapper<'_>,
    store: &mut S,
) -> Result<Vec<EmbeddedStructure>>
where
    S: VectorIndex + ?Sized,
{
    let mut wanted = Vec::with_capacity(files.len());
    for file in files {
        let path = file
            .canonicalize()
            .with_context(|| format!("File not found: {}", file.display()))?;
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        wanted.push((path, String::from_utf8_lossy(&bytes).into_owned()));
    }

    let mut corpus = previous.unwrap_or_else(|| Corpus::from_structures(&[]));
    let stale: Vec<String> = wanted
        .iter()
        .map(|(path, content)| (path.to_string_lossy().into_owned(), content_hash(content)))
        .filter(|(key, hash)| corpus.unchanged(key, hash).is_none())
        .map(|(key, _)| key)
        .collect();
    corpus.structures.retain(|e| !stale.contains(&e.path));
    let restored = rebuild_store(corpus, store)?;

    let mut resolved: Vec<EmbeddedStructure> = Vec::with_capacity(wanted.len());
    for (path, content) in wanted {
        let key = path.to_string_lossy().into_owned();
        let known = restored
            .iter()
            .chain(resolved.iter())
            .find(|e| e.structure.path() == key)
            .cloned();
        if let Some(embedded) = known {
            debug!(path = %key, "reusing embedded structure");
            resolved.push(embedded);
            continue;
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.clone());
        let structure = parser.parse(&filename, &key, &content).await;
        let embedded = mapper
            .embed_structure(store, structure)
            .await
            .with_context(|| format!("Failed to embed {}", key))?;
        resolved.push(embedded);
    }
    Ok(resolved)
}
