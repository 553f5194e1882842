use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::value::{Embedding, Metadata};

/// One record to be upserted: the chunk text, its embedding and the flattened
/// chunk metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreEntry {
    pub document: String,
    pub embedding: Embedding,
    pub metadata: Metadata,
}

/// A stored record returned from a similarity query, already converted to a
/// higher-is-better score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// The contract every vector store backend satisfies.
///
/// Implementations generate record ids, batch inserts as they see fit, and
/// return query results ranked by descending score with sub-threshold records
/// dropped.
#[async_trait]
pub trait VectorStoreBehavior: Send + Sync {
    async fn add_documents(&mut self, entries: Vec<StoreEntry>) -> anyhow::Result<Vec<String>>;

    async fn query(
        &self,
        embedding: Embedding,
        top_k: usize,
        min_score: f32,
        filter: Option<&Metadata>,
    ) -> anyhow::Result<Vec<ScoredRecord>>;

    /// Delete every record whose metadata matches all `filter` keys exactly.
    /// Returns the number of records known to be removed (0 when the backend
    /// cannot tell).
    async fn delete_by_metadata(&mut self, filter: &Metadata) -> anyhow::Result<usize>;

    async fn delete_by_ids(&mut self, ids: &[&str]) -> anyhow::Result<()>;

    /// Metadata of every stored record, for document-level summaries.
    async fn all_metadata(&self) -> anyhow::Result<Vec<Metadata>>;

    async fn count(&self) -> anyhow::Result<usize>;

    /// Cheap reachability check.
    async fn heartbeat(&self) -> anyhow::Result<()>;

    async fn clear(&mut self) -> anyhow::Result<()>;
}

/// Builds the `where` clause Chroma expects from an equality metadata filter:
/// a single `{key: value}` object, or `$and` over them when there are several.
pub(crate) fn filter_to_where_clause(filter: &Metadata) -> Option<serde_json::Value> {
    let mut clauses: Vec<serde_json::Value> = filter
        .iter()
        .map(|(k, v)| serde_json::json!({ k.clone(): v.clone() }))
        .collect();
    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(serde_json::json!({ "$and": clauses })),
    }
}

/// Equality match of `filter` against a record's metadata.
pub(crate) fn metadata_matches(metadata: &Metadata, filter: &Metadata) -> bool {
    filter
        .iter()
        .all(|(k, v)| metadata.get(k).is_some_and(|actual| actual == v))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn where_clause_shapes() {
        assert_eq!(filter_to_where_clause(&Metadata::new()), None);
        assert_eq!(
            filter_to_where_clause(&meta(&[("filename", json!("a.txt"))])),
            Some(json!({"filename": "a.txt"}))
        );
        let two = filter_to_where_clause(&meta(&[
            ("filename", json!("a.txt")),
            ("file_type", json!("txt")),
        ]))
        .unwrap();
        assert!(two.get("$and").is_some());
    }

    #[test]
    fn equality_matching() {
        let record = meta(&[("filename", json!("a.txt")), ("chunk_index", json!(0))]);
        assert!(metadata_matches(&record, &meta(&[("filename", json!("a.txt"))])));
        assert!(!metadata_matches(
            &record,
            &meta(&[("filename", json!("b.txt"))])
        ));
        assert!(!metadata_matches(&record, &meta(&[("missing", json!(1))])));
        assert!(metadata_matches(&record, &Metadata::new()));
    }
}
