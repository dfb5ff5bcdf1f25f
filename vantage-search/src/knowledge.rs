//! Local knowledge collaborator.
//!
//! The engine consults a [`KnowledgeStore`] for three things: related
//! concepts that seed tier-3 query variants, offline answers when the
//! provider cannot be used, and (on request) persisting final results.
//! [`InMemoryKnowledge`] is a process-local implementation based on keyword
//! overlap.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;
use crate::expander::QueryAnalysis;
use crate::ranking::url_normalize::normalize_url;
use crate::types::{clamp_unit, EnrichedResult, EntityKind, RankedResult};

/// Knowledge base interface.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persist the final results of a search.
    ///
    /// # Errors
    ///
    /// Returns a [`KnowledgeError`] if the results could not be stored.
    async fn store_search(&self, query: &str, results: &[RankedResult])
        -> Result<(), KnowledgeError>;

    /// Find stored results matching `query`, best first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`KnowledgeError`] if the store cannot be queried.
    async fn lookup_offline(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EnrichedResult>, KnowledgeError>;

    /// Concepts related to `query`, most relevant first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`KnowledgeError`] if the store cannot be queried.
    async fn related_concepts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, KnowledgeError>;
}

#[derive(Debug, Default)]
struct KnowledgeState {
    /// Documents keyed by canonical link, in insertion order.
    documents: Vec<EnrichedResult>,
    by_link: HashMap<String, usize>,
    /// Keyword → concepts seen alongside it, with counts.
    concepts: HashMap<String, Vec<(String, u32)>>,
}

impl KnowledgeState {
    fn upsert(&mut self, doc: EnrichedResult) {
        let key = normalize_url(&doc.link);
        match self.by_link.get(&key) {
            Some(&idx) => self.documents[idx] = doc,
            None => {
                self.by_link.insert(key, self.documents.len());
                self.documents.push(doc);
            }
        }
    }

    fn learn(&mut self, keyword: &str, concept: &str) {
        let known = self.concepts.entry(keyword.to_owned()).or_default();
        match known.iter_mut().find(|(c, _)| c.eq_ignore_ascii_case(concept)) {
            Some((_, count)) => *count += 1,
            None => known.push((concept.to_owned(), 1)),
        }
    }
}

/// Serializable contents of an [`InMemoryKnowledge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeSnapshot {
    /// Stored documents in insertion order.
    pub documents: Vec<EnrichedResult>,
    /// Keyword → related concepts with occurrence counts.
    pub concepts: BTreeMap<String, Vec<(String, u32)>>,
}

/// In-process knowledge store.
///
/// Lookups score documents by the fraction of query keywords that appear
/// in their title, snippet or summary. Related concepts are learned from
/// the name entities of stored results and from explicit seeding.
#[derive(Debug, Default)]
pub struct InMemoryKnowledge {
    state: RwLock<KnowledgeState>,
}

impl InMemoryKnowledge {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn insert_document(&self, doc: EnrichedResult) {
        self.write().upsert(doc);
    }

    /// Record concepts related to every keyword of `topic`.
    pub fn add_concepts<S: AsRef<str>>(&self, topic: &str, concepts: &[S]) {
        let keywords = QueryAnalysis::of(topic).keywords;
        let mut state = self.write();
        for keyword in &keywords {
            for concept in concepts {
                state.learn(keyword, concept.as_ref());
            }
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: KnowledgeSnapshot) -> Self {
        let mut state = KnowledgeState {
            concepts: snapshot.concepts.into_iter().collect(),
            ..KnowledgeState::default()
        };
        for doc in snapshot.documents {
            state.upsert(doc);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy out everything stored.
    pub fn snapshot(&self) -> KnowledgeSnapshot {
        let state = self.read();
        KnowledgeSnapshot {
            documents: state.documents.clone(),
            concepts: state
                .concepts
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    /// Whether no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, KnowledgeState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, KnowledgeState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledge {
    async fn store_search(
        &self,
        query: &str,
        results: &[RankedResult],
    ) -> Result<(), KnowledgeError> {
        let keywords = QueryAnalysis::of(query).keywords;
        let mut state = self.write();
        for ranked in results {
            for entity in ranked
                .result
                .entities
                .iter()
                .filter(|e| e.kind == EntityKind::Name)
            {
                for keyword in &keywords {
                    state.learn(keyword, &entity.text);
                }
            }
            state.upsert(ranked.result.clone());
        }
        tracing::debug!(stored = results.len(), total = state.documents.len(), "knowledge stored");
        Ok(())
    }

    async fn lookup_offline(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EnrichedResult>, KnowledgeError> {
        let keywords = QueryAnalysis::of(query).keywords;
        if keywords.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let state = self.read();
        let mut scored: Vec<(f64, &EnrichedResult)> = state
            .documents
            .iter()
            .filter_map(|doc| {
                let text = format!("{} {} {}", doc.title, doc.snippet, doc.summary);
                let tokens: HashSet<String> = QueryAnalysis::of(&text).tokens.into_iter().collect();
                let matched = keywords.iter().filter(|k| tokens.contains(*k)).count();
                (matched > 0).then(|| (matched as f64 / keywords.len() as f64, doc))
            })
            .collect();
        // Stable: equally good documents keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(overlap, doc)| {
                let mut doc = doc.clone();
                doc.relevance = clamp_unit(overlap * doc.relevance.max(0.5));
                doc
            })
            .collect())
    }

    async fn related_concepts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, KnowledgeError> {
        let analysis = QueryAnalysis::of(query);
        let lowered = query.to_lowercase();
        let state = self.read();

        let mut totals: Vec<(String, u32)> = Vec::new();
        for keyword in &analysis.keywords {
            let Some(known) = state.concepts.get(keyword) else {
                continue;
            };
            for (concept, count) in known {
                if lowered.contains(&concept.to_lowercase()) {
                    continue;
                }
                match totals.iter_mut().find(|(c, _)| c == concept) {
                    Some((_, total)) => *total += count,
                    None => totals.push((concept.clone(), *count)),
                }
            }
        }
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(totals.into_iter().take(limit).map(|(c, _)| c).collect())
    }
}
