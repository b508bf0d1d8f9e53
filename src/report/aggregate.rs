use crate::error::SchemaViolation;
use crate::normalize::Properties;
use crate::report::kinds::{DatasetSpec, ReportDescriptor};
use std::collections::BTreeMap;

/// How a metric is summed and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Areas, lengths: rounded to three decimals on output.
    Amount,
    /// Plot and feature counts: rendered as integers.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
}

/// Fixed, ordered list of metrics shared by every node of one report's tree.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub metrics: &'static [Metric],
}

impl Schema {
    pub fn index_of(&self, metric: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m.name == metric)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    fn check(&self, other: &Schema) -> Result<(), SchemaViolation> {
        if self == other {
            Ok(())
        } else {
            Err(SchemaViolation {
                expected: self.name,
                found: other.name,
            })
        }
    }
}

/// Running totals for every metric of a [`Schema`]. Never sparse.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    schema: &'static Schema,
    values: Vec<f64>,
}

impl Accumulator {
    pub fn zeroed(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: vec![0.0; schema.len()],
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Adds `amount` to `metric`.
    ///
    /// # Panics
    ///
    /// If `metric` is not part of the schema. Descriptors only name their own
    /// metrics, so this is a programming error.
    pub fn add(&mut self, metric: &str, amount: f64) {
        match self.schema.index_of(metric) {
            Some(i) => self.values[i] += amount,
            None => panic!("metric `{metric}` is not in schema `{}`", self.schema.name),
        }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.schema.index_of(metric).map(|i| self.values[i])
    }

    /// `(metric, total)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static Metric, f64)> + '_ {
        self.schema.metrics.iter().zip(self.values.iter().copied())
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn merge(&mut self, other: &Accumulator) -> Result<(), SchemaViolation> {
        self.schema.check(other.schema)?;
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            *mine += *theirs;
        }
        Ok(())
    }
}

/// What one feature adds to the tree: a set of metric increments plus one
/// grouping key per grouping level of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub values: Accumulator,
    pub keys: Vec<String>,
}

impl Contribution {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            values: Accumulator::zeroed(schema),
            keys: Vec::new(),
        }
    }

    pub fn add(mut self, metric: &str, amount: f64) -> Self {
        self.values.add(metric, amount);
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }
}

/// Station-level totals plus one keyed map per grouping level.
#[derive(Debug, Clone, PartialEq)]
pub struct StationAggregate {
    pub totals: Accumulator,
    pub groups: Vec<BTreeMap<String, Accumulator>>,
    pub feature_count: usize,
}

impl StationAggregate {
    pub fn new(descriptor: &ReportDescriptor) -> Self {
        Self {
            totals: Accumulator::zeroed(descriptor.schema),
            groups: vec![BTreeMap::new(); descriptor.groupings.len()],
            feature_count: 0,
        }
    }

    /// Folds one normalized contribution into the totals and into every
    /// grouping level, creating zeroed groups on first sight.
    pub fn fold(&mut self, contribution: &Contribution) -> Result<(), SchemaViolation> {
        self.totals.merge(&contribution.values)?;
        for (level, key) in self.groups.iter_mut().zip(&contribution.keys) {
            level
                .entry(key.clone())
                .or_insert_with(|| Accumulator::zeroed(contribution.values.schema()))
                .merge(&contribution.values)?;
        }
        self.feature_count += 1;
        Ok(())
    }

    /// Runs the descriptor's derivation over every feature of one dataset.
    /// Features the derivation rejects (unmatched category) are skipped.
    pub fn fold_features(
        &mut self,
        descriptor: &ReportDescriptor,
        dataset: &DatasetSpec,
        features: &[Properties],
    ) -> Result<usize, SchemaViolation> {
        let mut skipped = 0;
        for props in features {
            match (descriptor.derive)(dataset, props) {
                Some(contribution) => self.fold(&contribution)?,
                None => skipped += 1,
            }
        }
        Ok(skipped)
    }

    /// Combines two partial aggregates of the same report kind.
    pub fn merge(&mut self, other: &StationAggregate) -> Result<(), SchemaViolation> {
        self.totals.merge(&other.totals)?;
        for (mine, theirs) in self.groups.iter_mut().zip(&other.groups) {
            for (key, acc) in theirs {
                match mine.get_mut(key) {
                    Some(existing) => existing.merge(acc)?,
                    None => {
                        mine.insert(key.clone(), acc.clone());
                    }
                }
            }
        }
        self.feature_count += other.feature_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::kinds::ReportKind;
    use serde_json::json;

    static TEST_SCHEMA: Schema = Schema {
        name: "test",
        metrics: &[
            Metric { name: "a", kind: MetricKind::Amount },
            Metric { name: "n", kind: MetricKind::Count },
        ],
    };

    static OTHER_SCHEMA: Schema = Schema {
        name: "other",
        metrics: &[Metric { name: "a", kind: MetricKind::Amount }],
    };

    fn features(values: Vec<serde_json::Value>) -> Vec<Properties> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_zeroed_has_every_metric() {
        let acc = Accumulator::zeroed(&TEST_SCHEMA);
        assert_eq!(acc.get("a"), Some(0.0));
        assert_eq!(acc.get("n"), Some(0.0));
        assert_eq!(acc.get("missing"), None);
        assert!(acc.is_zero());
    }

    #[test]
    fn test_merge_sums() {
        let mut left = Accumulator::zeroed(&TEST_SCHEMA);
        left.add("a", 1.5);
        let mut right = Accumulator::zeroed(&TEST_SCHEMA);
        right.add("a", 2.0);
        right.add("n", 3.0);

        left.merge(&right).unwrap();
        assert_eq!(left.get("a"), Some(3.5));
        assert_eq!(left.get("n"), Some(3.0));
    }

    #[test]
    fn test_merge_schema_mismatch() {
        let mut left = Accumulator::zeroed(&TEST_SCHEMA);
        let right = Accumulator::zeroed(&OTHER_SCHEMA);
        let err = left.merge(&right).unwrap_err();
        assert_eq!(err.expected, "test");
        assert_eq!(err.found, "other");
    }

    #[test]
    #[should_panic(expected = "not in schema")]
    fn test_add_unknown_metric_panics() {
        Accumulator::zeroed(&TEST_SCHEMA).add("bogus", 1.0);
    }

    #[test]
    fn test_fold_initializes_groups() {
        let descriptor = ReportKind::Land.descriptor();
        let mut agg = StationAggregate::new(descriptor);
        let contribution = Contribution::new(descriptor.schema)
            .add("purchased", 10.0)
            .key("phase 1")
            .key("unknown");

        agg.fold(&contribution).unwrap();
        agg.fold(&contribution).unwrap();

        assert_eq!(agg.totals.get("purchased"), Some(20.0));
        assert_eq!(agg.groups[0].len(), 1);
        let phase = &agg.groups[0]["phase 1"];
        assert_eq!(phase.get("purchased"), Some(20.0));
        assert_eq!(phase.get("litigation"), Some(0.0));
        assert_eq!(agg.groups[1]["unknown"].get("purchased"), Some(20.0));
        assert_eq!(agg.feature_count, 2);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let descriptor = ReportKind::Land.descriptor();
        let dataset = &descriptor.datasets[0];
        let rows = features(vec![
            json!({ "phase": "Phase 1", "purchasedarea": 100, "totalarea": 200 }),
            json!({ "phase": "phase 2", "purchasedarea": "50", "totalarea": 100 }),
            json!({ "phase": "PHASE 1", "totalholdland": 3.25 }),
        ]);
        let mut reversed = rows.clone();
        reversed.reverse();

        let mut forward = StationAggregate::new(descriptor);
        forward.fold_features(descriptor, dataset, &rows).unwrap();
        let mut backward = StationAggregate::new(descriptor);
        backward.fold_features(descriptor, dataset, &reversed).unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn test_partial_merge_matches_single_fold() {
        let descriptor = ReportKind::Land.descriptor();
        let dataset = &descriptor.datasets[0];
        let rows = features(vec![
            json!({ "phase": "a", "purchasedarea": 1, "totalarea": 4 }),
            json!({ "phase": "b", "purchasedarea": 2, "totalarea": 4 }),
            json!({ "phase": "a", "purchasedarea": 3, "totalarea": 4 }),
        ]);

        let mut whole = StationAggregate::new(descriptor);
        whole.fold_features(descriptor, dataset, &rows).unwrap();

        let mut left = StationAggregate::new(descriptor);
        left.fold_features(descriptor, dataset, &rows[..1]).unwrap();
        let mut right = StationAggregate::new(descriptor);
        right.fold_features(descriptor, dataset, &rows[1..]).unwrap();
        left.merge(&right).unwrap();

        assert_eq!(whole, left);
    }
}
