use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use super::rules::{SQL_MODULE, SQL_TEXT};
use super::series::{assemble, assemble_table, ChartDataset};
use super::types::{Fact, FactQuery, FactValue, DB_NAME, HOST_NAME, INSTANCE};
use crate::core::types::Result;
use crate::storage::FactStore;

const MAX_SQL_HITS: usize = 10;
const SNIPPET_CHARS: usize = 200;
/// Characters of context kept in front of a match that had to be scrolled into view.
const SNIPPET_LEAD: usize = 10;
const ELLIPSIS: &str = "...";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqlSearch {
    /// Case-insensitive SQL id prefix.
    IdPrefix(String),
    /// Case-insensitive fragment of the statement text.
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SqlSearchHit {
    pub sql_id: String,
    /// Statement text, shortened to about 200 characters.
    pub text: String,
    /// Character range of the matched fragment within `text`.
    pub highlight: Option<(usize, usize)>,
}

/// Case-insensitive char position of `needle` in `haystack`.
fn find_ignore_case(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let fold = |c: &char| c.to_lowercase().collect::<String>();
    (0..=haystack.len() - needle.len()).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| fold(a) == fold(b))
    })
}

/// Shortens `text` to the snippet length, scrolling so a match at `pos`
/// stays visible. Returns the snippet and the match position inside it.
fn snippet(text: &str, pos: Option<usize>, needle_len: usize) -> (String, Option<usize>) {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= SNIPPET_CHARS + ELLIPSIS.len() {
        return (text.to_string(), pos);
    }

    match pos {
        Some(p) if p + needle_len > SNIPPET_CHARS => {
            let from = p.saturating_sub(SNIPPET_LEAD);
            let to = (from + SNIPPET_CHARS).min(chars.len());
            let body: String = chars[from..to].iter().collect();
            (format!("{}{}{}", ELLIPSIS, body, ELLIPSIS), Some(p - from + ELLIPSIS.len()))
        }
        _ => {
            let body: String = chars[..SNIPPET_CHARS].iter().collect();
            (format!("{}{}", body, ELLIPSIS), pos)
        }
    }
}

/// Read side over stored facts.
#[derive(Clone)]
pub struct FactService {
    facts: Arc<dyn FactStore>,
}

impl FactService {
    pub fn new(facts: Arc<dyn FactStore>) -> Self {
        Self { facts }
    }

    /// Facts matching `query`, ordered by start, with `limit` applied.
    pub async fn find(&self, query: &FactQuery) -> Result<Vec<Fact>> {
        let facts = self.facts.find_facts(query).await?;
        Ok(query.apply_limit(facts))
    }

    pub async fn graph(&self, query: &FactQuery) -> Result<ChartDataset> {
        Ok(assemble(&self.find(query).await?))
    }

    pub async fn table(&self, query: &FactQuery) -> Result<Vec<(String, FactValue)>> {
        Ok(assemble_table(&self.find(query).await?))
    }

    /// Hosts that reported CPU figures, sorted.
    pub async fn hosts(&self, dataset_id: Uuid) -> Result<Vec<String>> {
        let facts = self
            .facts
            .find_facts(&FactQuery::new(dataset_id).category("Host CPU"))
            .await?;
        let hosts: BTreeSet<String> = facts
            .iter()
            .filter_map(|f| f.dimension(HOST_NAME))
            .map(String::from)
            .collect();
        Ok(hosts.into_iter().collect())
    }

    /// Database name to its instances, both sorted.
    pub async fn databases(&self, dataset_id: Uuid) -> Result<BTreeMap<String, Vec<String>>> {
        let facts = self
            .facts
            .find_facts(&FactQuery::new(dataset_id).category("Sessions"))
            .await?;
        let mut databases: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for fact in &facts {
            if let (Some(db), Some(instance)) = (fact.dimension(DB_NAME), fact.dimension(INSTANCE)) {
                databases
                    .entry(db.to_string())
                    .or_default()
                    .insert(instance.to_string());
            }
        }
        Ok(databases
            .into_iter()
            .map(|(db, instances)| (db, instances.into_iter().collect()))
            .collect())
    }

    fn sql_query(dataset_id: Uuid, db_name: &str, instance: &str, category: &str) -> FactQuery {
        FactQuery::new(dataset_id)
            .category(category)
            .dimension(DB_NAME, db_name)
            .dimension(INSTANCE, instance)
    }

    pub async fn sql_text(
        &self,
        dataset_id: Uuid,
        db_name: &str,
        instance: &str,
        sql_id: &str,
    ) -> Result<Option<String>> {
        let query = Self::sql_query(dataset_id, db_name, instance, SQL_TEXT);
        let facts = self.facts.find_facts(&query).await?;
        Ok(facts
            .into_iter()
            .filter(|f| f.name == sql_id)
            .find_map(|f| f.value.as_text().map(String::from)))
    }

    /// Distinct module names recorded for `sql_id`.
    pub async fn sql_module(
        &self,
        dataset_id: Uuid,
        db_name: &str,
        instance: &str,
        sql_id: &str,
    ) -> Result<Vec<String>> {
        let query = Self::sql_query(dataset_id, db_name, instance, SQL_MODULE);
        let modules: BTreeSet<String> = self
            .facts
            .find_facts(&query)
            .await?
            .iter()
            .filter(|f| f.name == sql_id)
            .filter_map(|f| f.value.as_text().map(String::from))
            .collect();
        Ok(modules.into_iter().collect())
    }

    /// Up to ten distinct statements matching `search`.
    pub async fn search_sql(
        &self,
        dataset_id: Uuid,
        db_name: &str,
        instance: &str,
        search: &SqlSearch,
    ) -> Result<Vec<SqlSearchHit>> {
        let query = Self::sql_query(dataset_id, db_name, instance, SQL_TEXT);
        let facts = self.facts.find_facts(&query).await?;

        let mut seen = BTreeSet::new();
        let mut hits = Vec::new();
        for fact in &facts {
            if hits.len() == MAX_SQL_HITS {
                break;
            }
            let Some(text) = fact.value.as_text() else {
                continue;
            };
            if !seen.insert((fact.name.as_str(), text)) {
                continue;
            }

            let hit = match search {
                SqlSearch::IdPrefix(prefix) => {
                    if !fact.name.to_lowercase().starts_with(&prefix.to_lowercase()) {
                        continue;
                    }
                    let (text, _) = snippet(text, None, 0);
                    SqlSearchHit {
                        sql_id: fact.name.clone(),
                        text,
                        highlight: None,
                    }
                }
                SqlSearch::Text(fragment) => {
                    let chars: Vec<char> = text.chars().collect();
                    let needle: Vec<char> = fragment.chars().collect();
                    let Some(pos) = find_ignore_case(&chars, &needle) else {
                        continue;
                    };
                    let (text, pos) = snippet(text, Some(pos), needle.len());
                    // A fragment longer than the snippet is cut at its end.
                    let len = text.chars().count();
                    SqlSearchHit {
                        sql_id: fact.name.clone(),
                        highlight: pos.map(|p| (p.min(len), (p + needle.len()).min(len))),
                        text,
                    }
                }
            };
            hits.push(hit);
        }
        Ok(hits)
    }
}
