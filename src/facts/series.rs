use chrono::{Duration, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;

use super::color::series_color;
use super::types::{Fact, FactValue};

pub const X_AXIS: &str = "x";
pub const X_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const CHART_TYPE: &str = "area-step";

/// Upper bound on inserted gap ticks; a wildly sparse dataset stops here.
const MAX_GAP_REPAIRS: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
}

/// Step-area chart data: one tick per snapshot window, one aligned value
/// vector per fact name.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChartDataset {
    pub ticks: Vec<NaiveDateTime>,
    /// Sorted by name.
    pub series: Vec<Series>,
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(t)
}

/// Nominal snapshot length: `end - start` rounded up to whole minutes.
fn snapshot_interval(fact: &Fact) -> Duration {
    let millis = (fact.end - fact.start).num_milliseconds();
    let minutes = (millis - 1).div_euclid(60_000) + 1;
    Duration::minutes(minutes)
}

/// Builds the chart for `facts`, which must be sorted by start. Text facts
/// are ignored; repeated names within one window are summed.
pub fn assemble(facts: &[Fact]) -> ChartDataset {
    let interval = facts
        .iter()
        .find(|f| f.value.as_number().is_some())
        .map(snapshot_interval)
        .unwrap_or_else(Duration::zero);

    let mut ticks: Vec<NaiveDateTime> = Vec::new();
    let mut current: Option<NaiveDateTime> = None;
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();

    for fact in facts {
        let Some(value) = fact.value.as_number() else {
            continue;
        };
        if current.map_or(true, |c| fact.start > c) {
            current = Some(fact.start);
            ticks.push(truncate_to_minute(fact.start));
        }

        let values = columns.entry(fact.name.clone()).or_default();
        if values.len() == ticks.len() {
            if let Some(last) = values.last_mut() {
                *last += value;
            }
        } else {
            values.resize(ticks.len() - 1, 0.0);
            values.push(value);
        }
    }

    for values in columns.values_mut() {
        values.resize(ticks.len(), 0.0);
    }

    if interval > Duration::zero() {
        fill_gaps(&mut ticks, &mut columns, interval);
    }

    ChartDataset {
        ticks,
        series: columns
            .into_iter()
            .map(|(name, values)| Series {
                color: series_color(&name),
                name,
                values,
            })
            .collect(),
    }
}

/// Inserts zero-valued ticks wherever consecutive ticks sit more than one and
/// a half intervals apart.
fn fill_gaps(ticks: &mut Vec<NaiveDateTime>, columns: &mut BTreeMap<String, Vec<f64>>, interval: Duration) {
    let limit = interval.num_milliseconds() * 3;
    for _ in 0..MAX_GAP_REPAIRS {
        let Some(i) = ticks
            .windows(2)
            .position(|w| (w[1] - w[0]).num_milliseconds() * 2 > limit)
        else {
            return;
        };
        ticks.insert(i + 1, ticks[i] + interval);
        for values in columns.values_mut() {
            values.insert(i + 1, 0.0);
        }
    }
    log::warn!("Gap repair stopped after {} inserted ticks", MAX_GAP_REPAIRS);
}

impl ChartDataset {
    pub fn tick_labels(&self) -> Vec<String> {
        self.ticks
            .iter()
            .map(|t| t.format(X_FORMAT).to_string())
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.name.as_str()).collect()
    }

    /// Column-oriented chart document: `x` column first, then one column per
    /// series, stacked as a single group.
    pub fn to_chart_json(&self) -> Value {
        let mut columns: Vec<Value> = Vec::with_capacity(self.series.len() + 1);
        let mut x = vec![json!(X_AXIS)];
        x.extend(self.tick_labels().into_iter().map(Value::from));
        columns.push(Value::Array(x));
        for s in &self.series {
            let mut column = vec![json!(s.name)];
            column.extend(s.values.iter().map(|v| json!(v)));
            columns.push(Value::Array(column));
        }

        let colors: serde_json::Map<String, Value> = self
            .series
            .iter()
            .map(|s| (s.name.clone(), json!(s.color)))
            .collect();

        json!({
            "x": X_AXIS,
            "xFormat": X_FORMAT,
            "columns": columns,
            "type": CHART_TYPE,
            "groups": [self.names()],
            "colors": colors,
        })
    }

    /// One CSV record per tick.
    pub fn write_csv<W: Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header = vec![X_AXIS];
        header.extend(self.names());
        out.write_record(&header)?;

        for (i, label) in self.tick_labels().into_iter().enumerate() {
            let mut record = vec![label];
            record.extend(self.series.iter().map(|s| s.values[i].to_string()));
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Latest value per name, in order of first appearance.
pub fn assemble_table(facts: &[Fact]) -> Vec<(String, FactValue)> {
    let mut latest: IndexMap<String, FactValue> = IndexMap::new();
    for fact in facts {
        latest.insert(fact.name.clone(), fact.value.clone());
    }
    latest.into_iter().collect()
}
