//! End-to-end: load a directory, persist the corpus, reload it, and
//! retrieve knowledge from files on disk.

mod common;

use common::{assert_close, ScriptedGenerator, TableEmbedder};
use fieldmap::config::CorpusConfig;
use fieldmap::corpus::{load_corpus, rebuild_store, save_corpus, Corpus};
use fieldmap::loader::{load_directory, load_files, LoadSummary};
use fieldmap::mapper::{Mapper, MapperSettings};
use fieldmap::parser::{StructureParser, FIELD_EXTRACTION_PROMPT};
use fieldmap::MapError;
use fieldmap_core::store::{InMemoryVectorStore, VectorIndex};
use std::path::Path;
use tempfile::TempDir;

const SYNTHESIS: &str = "Customers are reached by email.\n```json\n{\"fields\": [{\"name\": \"email\", \"type\": \"string\", \"description\": \"contact email\"}]}\n```";

fn embedder() -> TableEmbedder {
    TableEmbedder::new(
        vec![
            ("contact email", vec![0.0, 0.0, 1.0, 0.0]),
            ("Email", vec![0.0, 0.0, 1.0, 0.0]),
            ("CustomerID", vec![1.0, 0.0, 0.0, 0.0]),
            ("orderId", vec![0.0, 1.0, 0.0, 0.0]),
            ("total", vec![0.0, 0.0, 0.0, 1.0]),
        ],
        vec![0.5, 0.5, 0.5, 0.5],
    )
}

fn generator() -> ScriptedGenerator {
    ScriptedGenerator::new(|prompt| {
        if prompt.starts_with(FIELD_EXTRACTION_PROMPT) {
            Ok("i am not sure".to_string())
        } else {
            Ok(SYNTHESIS.to_string())
        }
    })
}

fn write_fixture(root: &Path) {
    std::fs::write(
        root.join("customer.md"),
        "# Customer\nCustomerID: unique identifier\nEmail: contact email\n",
    )
    .unwrap();
    std::fs::write(root.join("order.json"), r#"{"orderId": 1, "total": 9.5}"#).unwrap();
    std::fs::write(root.join("empty.txt"), "").unwrap();
    std::fs::create_dir_all(root.join("node_modules")).unwrap();
    std::fs::write(root.join("node_modules/ignored.json"), "{}").unwrap();
}

#[tokio::test]
async fn test_load_and_extract_knowledge() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());

    let embedder = embedder();
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let mut store = InMemoryVectorStore::new();

    let (structures, summary) = load_directory(
        tmp.path(),
        &CorpusConfig::default(),
        &parser,
        &mapper,
        &mut store,
        None,
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        LoadSummary {
            scanned: 3,
            embedded: 2,
            reused: 0,
            skipped: 1,
        }
    );
    assert_eq!(structures.len(), 2);
    assert_eq!(structures[0].structure.filename(), "customer.md");
    assert_eq!(store.len(), 6);

    let result = mapper
        .extract_knowledge(&store, "contact email", 1)
        .await
        .unwrap();

    assert_eq!(result.relevant_documents.len(), 1);
    let doc = &result.relevant_documents[0];
    assert_eq!(doc.filename, "customer.md");
    assert_close(doc.similarity, 1.0);
    assert!(doc.excerpt.contains("CustomerID: unique identifier"));

    assert_eq!(result.relevant_fields.len(), 2);
    let email = &result.relevant_fields[0];
    assert_eq!(email.field, "Email");
    assert_eq!(email.source_document, "customer.md");
    assert_eq!(email.description.as_deref(), Some("contact email"));
    assert_eq!(
        result.relevant_fields[1].description.as_deref(),
        Some("unique identifier")
    );

    assert_eq!(result.synthesized_knowledge, SYNTHESIS);
    assert_eq!(result.re_extracted_structure.fields()[0].name, "email");

    let prompts = generator.prompts();
    let synthesis_prompt = prompts.last().unwrap();
    assert!(synthesis_prompt.contains("contact email"));
    assert!(synthesis_prompt.contains("customer.md"));
}

#[tokio::test]
async fn test_unreadable_documents_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());

    let embedder = embedder();
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let mut store = InMemoryVectorStore::new();
    load_directory(
        tmp.path(),
        &CorpusConfig::default(),
        &parser,
        &mapper,
        &mut store,
        None,
    )
    .await
    .unwrap();

    std::fs::remove_file(tmp.path().join("customer.md")).unwrap();
    let result = mapper
        .extract_knowledge(&store, "contact email", 1)
        .await
        .unwrap();
    assert_eq!(result.relevant_documents[0].excerpt, "");
    assert_eq!(result.relevant_fields[0].description, None);
}

#[tokio::test]
async fn test_reload_reuses_unchanged_files() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("docs");
    std::fs::create_dir_all(&data).unwrap();
    write_fixture(&data);
    let corpus_path = tmp.path().join("data/corpus.json");

    let embedder = embedder();
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let config = CorpusConfig::default();

    let mut store = InMemoryVectorStore::new();
    let (structures, _) = load_directory(&data, &config, &parser, &mapper, &mut store, None)
        .await
        .unwrap();
    save_corpus(&corpus_path, &Corpus::from_structures(&structures)).unwrap();
    let calls_after_first_load = embedder.calls();

    let previous = load_corpus(&corpus_path).unwrap().unwrap();
    let mut store = InMemoryVectorStore::new();
    let (_, summary) = load_directory(
        &data,
        &config,
        &parser,
        &mapper,
        &mut store,
        Some(&previous),
    )
    .await
    .unwrap();
    assert_eq!(summary.reused, 2);
    assert_eq!(summary.embedded, 0);
    assert_eq!(embedder.calls(), calls_after_first_load);
    assert_eq!(store.len(), 6);

    std::fs::write(data.join("order.json"), r#"{"orderId": 2}"#).unwrap();
    let mut store = InMemoryVectorStore::new();
    let (_, summary) = load_directory(
        &data,
        &config,
        &parser,
        &mapper,
        &mut store,
        Some(&previous),
    )
    .await
    .unwrap();
    assert_eq!(summary.reused, 1);
    assert_eq!(summary.embedded, 1);
    assert_eq!(store.len(), 5);
}

#[tokio::test]
async fn test_rebuilt_store_answers_queries() {
    let tmp = TempDir::new().unwrap();
    write_fixture(tmp.path());
    let corpus_path = tmp.path().join("corpus.json");

    let embedder = embedder();
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());

    let mut store = InMemoryVectorStore::new();
    let (structures, _) = load_directory(
        tmp.path(),
        &CorpusConfig::default(),
        &parser,
        &mapper,
        &mut store,
        None,
    )
    .await
    .unwrap();
    save_corpus(&corpus_path, &Corpus::from_structures(&structures)).unwrap();

    let corpus = load_corpus(&corpus_path).unwrap().unwrap();
    let mut rebuilt = InMemoryVectorStore::new();
    let restored = rebuild_store(corpus, &mut rebuilt).unwrap();

    assert_eq!(rebuilt.len(), store.len());
    assert_eq!(restored, structures);

    let result = mapper
        .extract_knowledge(&rebuilt, "contact email", 1)
        .await
        .unwrap();
    assert_eq!(result.relevant_documents[0].filename, "customer.md");
}

#[tokio::test]
async fn test_knowledge_requires_populated_store() {
    let embedder = embedder();
    let generator = generator();
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let store = InMemoryVectorStore::new();

    let err = mapper
        .extract_knowledge(&store, "contact email", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, MapError::NotInitialized { .. }));
}

#[tokio::test]
async fn test_knowledge_rejects_bad_arguments() {
    let embedder = embedder();
    let generator = generator();
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let mut store = InMemoryVectorStore::new();
    store
        .insert(fieldmap_core::models::VectorRecord::document(
            vec![0.0, 0.0, 1.0, 0.0],
            "a.md",
            "/a.md",
        ))
        .unwrap();

    let err = mapper.extract_knowledge(&store, "   ", 3).await.unwrap_err();
    assert!(matches!(err, MapError::InvalidInput { .. }));
    let err = mapper
        .extract_knowledge(&store, "contact email", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, MapError::InvalidInput { .. }));
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_changed_target_replaces_its_persisted_fields() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source.json");
    let target = tmp.path().join("target.json");
    std::fs::write(&source, r#"{"fields": [{"name": "Email"}]}"#).unwrap();
    std::fs::write(&target, r#"{"fields": [{"name": "oldEmail"}]}"#).unwrap();

    let embedder = TableEmbedder::new(
        vec![
            ("oldEmail", vec![0.0, 0.0, 1.0, 0.0]),
            ("emailAddress", vec![0.0, 0.1, 0.9, 0.0]),
            ("Email", vec![0.0, 0.0, 1.0, 0.0]),
        ],
        vec![0.5, 0.5, 0.5, 0.5],
    );
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());

    let mut store = InMemoryVectorStore::new();
    let (structures, _) = load_directory(
        tmp.path(),
        &CorpusConfig::default(),
        &parser,
        &mapper,
        &mut store,
        None,
    )
    .await
    .unwrap();
    let previous = Corpus::from_structures(&structures);
    let calls_after_load = embedder.calls();

    std::fs::write(&target, r#"{"fields": [{"name": "emailAddress"}]}"#).unwrap();

    let mut store = InMemoryVectorStore::new();
    let resolved = load_files(
        &[source.clone(), target.clone()],
        Some(previous),
        &parser,
        &mapper,
        &mut store,
    )
    .await
    .unwrap();

    // source reused, target re-embedded: one field plus its document
    assert_eq!(embedder.calls(), calls_after_load + 2);
    assert_eq!(store.len(), 4);

    let mappings = mapper
        .map_structures(&store, &resolved[0], &resolved[1])
        .unwrap();
    let candidates: Vec<&str> = mappings[0]
        .target_candidates
        .iter()
        .map(|c| c.target_field.as_str())
        .collect();
    assert_eq!(candidates, vec!["emailAddress"]);
}

#[tokio::test]
async fn test_load_files_without_corpus_embeds_each_path_once() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("customer.md");
    std::fs::write(&file, "CustomerID: unique identifier\nEmail: contact email\n").unwrap();

    let embedder = embedder();
    let generator = generator();
    let parser = StructureParser::new(&generator);
    let mapper = Mapper::new(&embedder, &generator, MapperSettings::default());
    let mut store = InMemoryVectorStore::new();

    let resolved = load_files(&[file.clone(), file], None, &parser, &mapper, &mut store)
        .await
        .unwrap();

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0], resolved[1]);
    assert_eq!(store.len(), 3);
}
