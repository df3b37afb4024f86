use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HOST_NAME: &str = "Host Name";
pub const DB_NAME: &str = "DB Name";
pub const INSTANCE: &str = "Instance";
pub const SQL_ID: &str = "SQL Id";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Number(f64),
    Text(String),
}

impl FactValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FactValue::Number(n) => Some(*n),
            FactValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FactValue::Number(_) => None,
            FactValue::Text(s) => Some(s),
        }
    }
}

/// One dimensioned observation over a report's snapshot window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub dataset_id: Uuid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub dimensions: Vec<Dimension>,
    pub category: String,
    pub name: String,
    pub value: FactValue,
}

impl Fact {
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }
}

/// Fact store filter. Facts are selected by `category` when one is given,
/// otherwise by `names`; an empty `names` list does not restrict.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FactQuery {
    pub dataset_id: Uuid,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub skip: Vec<String>,
    /// Keep only the N names with the largest summed value.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FactQuery {
    pub fn new(dataset_id: Uuid) -> Self {
        Self {
            dataset_id,
            ..Default::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }

    pub fn skip<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skip = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every filter except `limit`, which needs the whole matching set.
    pub fn matches(&self, fact: &Fact) -> bool {
        fact.dataset_id == self.dataset_id
            && self.selects(fact)
            && !self.skip.contains(&fact.name)
            && self
                .dimensions
                .iter()
                .all(|d| fact.dimensions.contains(d))
    }

    fn selects(&self, fact: &Fact) -> bool {
        match &self.category {
            Some(category) => &fact.category == category,
            None => self.names.is_empty() || self.names.contains(&fact.name),
        }
    }

    /// Applies `limit` to facts already filtered by `matches`.
    pub fn apply_limit(&self, facts: Vec<Fact>) -> Vec<Fact> {
        let Some(limit) = self.limit else {
            return facts;
        };

        let mut totals: IndexMap<&str, f64> = IndexMap::new();
        for fact in &facts {
            *totals.entry(fact.name.as_str()).or_default() += fact.value.as_number().unwrap_or(0.0);
        }
        let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let keep: Vec<String> = ranked
            .into_iter()
            .take(limit)
            .map(|(name, _)| name.to_string())
            .collect();

        facts
            .into_iter()
            .filter(|f| keep.contains(&f.name))
            .collect()
    }
}
