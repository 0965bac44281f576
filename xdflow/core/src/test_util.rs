// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Utility functions to make testing the translation layer easier.
//!
//! [`MemoryEngine`] is an [`XdfEngine`] over an in-memory table store
//! with real join semantics, so tests can observe both the lifecycle
//! behavior (which locations still exist) and the row-level contract of
//! translated verbs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use semver::Version;
use xdflow_common::{
    internal_err, merge_err, DataLocation, JoinType, RecordSet, Result, ScalarValue,
};
use xdflow_execution::engine::{MergeOutput, MergeRequest, MergeTarget, XdfEngine};

/// Build a [`RecordSet`] from column names and rows
pub fn table(columns: &[&str], rows: Vec<Vec<ScalarValue>>) -> RecordSet {
    let mut rs = RecordSet::new(columns.iter().map(|c| c.to_string()).collect());
    for row in rows {
        rs.push_row(row).expect("row arity matches columns");
    }
    rs
}

/// An in-memory engine with real merge semantics
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: Mutex<HashMap<DataLocation, RecordSet>>,
    fail_next_merge: AtomicBool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset at `location`
    pub fn insert(&self, location: &DataLocation, table: RecordSet) {
        self.tables.lock().insert(location.clone(), table);
    }

    pub fn get(&self, location: &DataLocation) -> Option<RecordSet> {
        self.tables.lock().get(location).cloned()
    }

    pub fn contains(&self, location: &DataLocation) -> bool {
        self.tables.lock().contains_key(location)
    }

    /// Every location currently backed by data
    pub fn locations(&self) -> Vec<DataLocation> {
        self.tables.lock().keys().cloned().collect()
    }

    /// Make the next merge call fail with an engine-reported error
    pub fn fail_next_merge(&self) {
        self.fail_next_merge.store(true, Ordering::SeqCst);
    }

    fn fetch(&self, location: &DataLocation) -> Result<RecordSet> {
        self.tables
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| {
                xdflow_common::XdfError::Merge(format!("no dataset at {location}"))
            })
    }

    fn emit(&self, result: RecordSet, target: &MergeTarget) -> Result<MergeOutput> {
        match target {
            MergeTarget::WriteTo(loc) => {
                self.tables.lock().insert(loc.clone(), result);
                Ok(MergeOutput::Written(loc.clone()))
            }
            MergeTarget::Collect => Ok(MergeOutput::Records(result)),
        }
    }
}

impl XdfEngine for MemoryEngine {
    fn engine_version(&self) -> Version {
        Version::new(9, 3, 0)
    }

    fn column_names(&self, location: &DataLocation) -> Result<Vec<String>> {
        Ok(self.fetch(location)?.columns().to_vec())
    }

    fn merge(&self, request: &MergeRequest) -> Result<MergeOutput> {
        if self.fail_next_merge.swap(false, Ordering::SeqCst) {
            return merge_err!("simulated engine failure");
        }
        if !request.join_type.is_native() {
            return internal_err!(
                "{} joins must be lowered before reaching the engine",
                request.join_type
            );
        }
        if let MergeTarget::WriteTo(loc) = &request.output {
            if !request.overwrite && self.contains(loc) {
                return merge_err!("output {loc} already exists");
            }
        }
        let left = self.fetch(&request.left)?;
        let right = self.fetch(&request.right)?;
        for key in &request.on {
            if left.column_index(key).is_none() || right.column_index(key).is_none() {
                return merge_err!("join key `{key}` missing from an input schema");
            }
        }
        let result = hash_join(&left, &right, &request.on, request.join_type)?;
        self.emit(result, &request.output)
    }

    fn distinct_projection(
        &self,
        input: &DataLocation,
        keys: &[String],
        marker: Option<&str>,
        output: &DataLocation,
    ) -> Result<()> {
        let table = self.fetch(input)?;
        let key_idx = keys
            .iter()
            .map(|k| {
                table.column_index(k).ok_or_else(|| {
                    xdflow_common::XdfError::Merge(format!(
                        "projection key `{k}` missing from {input}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut columns: Vec<String> = keys.to_vec();
        if let Some(marker) = marker {
            columns.push(marker.to_string());
        }
        let mut out = RecordSet::new(columns);
        let mut seen = HashSet::new();
        for row in table.rows() {
            let key: Vec<ScalarValue> =
                key_idx.iter().map(|&i| row[i].clone()).collect();
            if seen.insert(key.clone()) {
                let mut projected = key;
                if marker.is_some() {
                    projected.push(ScalarValue::Int64(1));
                }
                out.push_row(projected)?;
            }
        }
        self.tables.lock().insert(output.clone(), out);
        Ok(())
    }

    fn filter_unmatched(
        &self,
        input: &DataLocation,
        marker: &str,
        output: &MergeTarget,
    ) -> Result<MergeOutput> {
        let table = self.fetch(input)?;
        let marker_idx = table.column_index(marker).ok_or_else(|| {
            xdflow_common::XdfError::Merge(format!(
                "marker column `{marker}` missing from {input}"
            ))
        })?;
        let columns: Vec<String> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != marker_idx)
            .map(|(_, c)| c.clone())
            .collect();
        let mut out = RecordSet::new(columns);
        for row in table.rows() {
            if row[marker_idx].is_null() {
                let kept: Vec<ScalarValue> = row
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != marker_idx)
                    .map(|(_, v)| v.clone())
                    .collect();
                out.push_row(kept)?;
            }
        }
        self.emit(out, output)
    }

    fn delete(&self, location: &DataLocation) -> Result<()> {
        // removing an absent dataset is not an error, matching the
        // semantics of a recursive force-remove
        self.tables.lock().remove(location);
        Ok(())
    }
}

fn hash_join(
    left: &RecordSet,
    right: &RecordSet,
    on: &[String],
    join_type: JoinType,
) -> Result<RecordSet> {
    let left_keys: Vec<usize> = on
        .iter()
        .map(|k| left.column_index(k).expect("key checked above"))
        .collect();
    let right_keys: Vec<usize> = on
        .iter()
        .map(|k| right.column_index(k).expect("key checked above"))
        .collect();
    // the right side's key columns are merged into the left side's
    let right_value_cols: Vec<usize> = (0..right.columns().len())
        .filter(|i| !right_keys.contains(i))
        .collect();

    let mut columns: Vec<String> = left.columns().to_vec();
    columns.extend(right_value_cols.iter().map(|&i| right.columns()[i].clone()));
    let mut out = RecordSet::new(columns);

    let mut index: HashMap<Vec<ScalarValue>, Vec<usize>> = HashMap::new();
    for (i, row) in right.rows().iter().enumerate() {
        let key: Vec<ScalarValue> =
            right_keys.iter().map(|&k| row[k].clone()).collect();
        index.entry(key).or_default().push(i);
    }

    let mut matched_right: HashSet<usize> = HashSet::new();
    for left_row in left.rows() {
        let key: Vec<ScalarValue> =
            left_keys.iter().map(|&k| left_row[k].clone()).collect();
        match index.get(&key) {
            Some(right_rows) => {
                for &ri in right_rows {
                    matched_right.insert(ri);
                    let mut row = left_row.clone();
                    row.extend(
                        right_value_cols
                            .iter()
                            .map(|&c| right.rows()[ri][c].clone()),
                    );
                    out.push_row(row)?;
                }
            }
            None => {
                if matches!(join_type, JoinType::Left | JoinType::Full) {
                    let mut row = left_row.clone();
                    row.extend(right_value_cols.iter().map(|_| ScalarValue::Null));
                    out.push_row(row)?;
                }
            }
        }
    }

    if matches!(join_type, JoinType::Right | JoinType::Full) {
        for (ri, right_row) in right.rows().iter().enumerate() {
            if matched_right.contains(&ri) {
                continue;
            }
            let mut row: Vec<ScalarValue> =
                vec![ScalarValue::Null; left.columns().len()];
            for (pos, &lk) in left_keys.iter().enumerate() {
                row[lk] = right_row[right_keys[pos]].clone();
            }
            row.extend(right_value_cols.iter().map(|&c| right_row[c].clone()));
            out.push_row(row)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RecordSet {
        table(
            &["id", "name"],
            vec![
                vec![1i64.into(), "ada".into()],
                vec![2i64.into(), "grace".into()],
                vec![3i64.into(), "edsger".into()],
            ],
        )
    }

    fn scores() -> RecordSet {
        table(
            &["id", "score"],
            vec![
                vec![1i64.into(), 95.0.into()],
                vec![1i64.into(), 82.0.into()],
                vec![3i64.into(), 71.0.into()],
            ],
        )
    }

    fn run(join_type: JoinType) -> RecordSet {
        let engine = MemoryEngine::new();
        let left = DataLocation::local("/t/people.xdf");
        let right = DataLocation::local("/t/scores.xdf");
        engine.insert(&left, people());
        engine.insert(&right, scores());
        engine
            .merge(&MergeRequest {
                left,
                right,
                on: vec!["id".to_string()],
                join_type,
                output: MergeTarget::Collect,
                overwrite: true,
            })
            .unwrap()
            .into_records()
            .unwrap()
    }

    #[test]
    fn inner_join_multiplies_matches() {
        let rs = run(JoinType::Inner);
        assert_eq!(rs.columns(), &["id", "name", "score"]);
        assert_eq!(rs.num_rows(), 3);
    }

    #[test]
    fn left_join_keeps_unmatched_left_rows() {
        let rs = run(JoinType::Left);
        assert_eq!(rs.num_rows(), 4);
        let grace = rs
            .rows()
            .iter()
            .find(|r| r[1] == ScalarValue::from("grace"))
            .unwrap();
        assert!(grace[2].is_null());
    }

    #[test]
    fn full_join_keeps_both_sides() {
        let engine = MemoryEngine::new();
        let left = DataLocation::local("/t/people.xdf");
        let right = DataLocation::local("/t/extra.xdf");
        engine.insert(&left, people());
        engine.insert(
            &right,
            table(
                &["id", "score"],
                vec![vec![9i64.into(), 12.5.into()], vec![1i64.into(), 3.5.into()]],
            ),
        );
        let rs = engine
            .merge(&MergeRequest {
                left,
                right,
                on: vec!["id".to_string()],
                join_type: JoinType::Full,
                output: MergeTarget::Collect,
                overwrite: true,
            })
            .unwrap()
            .into_records()
            .unwrap();
        // ada matched, grace+edsger unmatched left, id 9 unmatched right
        assert_eq!(rs.num_rows(), 4);
        let nine = rs
            .rows()
            .iter()
            .find(|r| r[0] == ScalarValue::Int64(9))
            .unwrap();
        assert!(nine[1].is_null());
        assert_eq!(nine[2], ScalarValue::Float64(12.5));
    }

    #[test]
    fn distinct_projection_dedups_and_marks() {
        let engine = MemoryEngine::new();
        let input = DataLocation::local("/t/scores.xdf");
        let output = DataLocation::local("/t/keys.xdf");
        engine.insert(&input, scores());
        engine
            .distinct_projection(&input, &["id".to_string()], Some(".m"), &output)
            .unwrap();
        let rs = engine.get(&output).unwrap();
        assert_eq!(rs.columns(), &["id", ".m"]);
        assert_eq!(rs.num_rows(), 2); // ids 1 and 3, deduped
        assert!(rs.rows().iter().all(|r| r[1] == ScalarValue::Int64(1)));
    }
}
