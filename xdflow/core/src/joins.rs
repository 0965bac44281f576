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

//! Join verbs: translation of the grammar's join kinds onto the engine's
//! merge capability.
//!
//! `Inner`, `Left`, `Right` and `Full` map directly onto one engine
//! merge. `Semi` and `Anti` have no native engine support and are lowered
//! here: the right side is reduced to the distinct projection of its join
//! keys (a pipeline-owned intermediate), a native join runs against that
//! projection, and for `Anti` an indicator column separates the matched
//! rows out afterwards. The lowering adopts the right side first so that
//! a pipeline-owned `y` is never orphaned by the projection's cleanup.

use std::sync::Arc;

use log::debug;
use xdflow_common::{
    internal_err, topology_err, DataLocation, JoinType, RecordSet, Result, XdfError,
};
use xdflow_execution::artifact::ArtifactHandle;
use xdflow_execution::artifact_manager::DeleteWarning;
use xdflow_execution::engine::{MergeOutput, MergeRequest, MergeTarget, XdfEngine};
use xdflow_execution::runtime_env::RuntimeEnv;

use crate::dataset::Dataset;

/// Indicator column appended to the key projection when an anti join is
/// lowered. Dot-prefixed to keep it clear of user columns.
const MATCH_MARKER_COLUMN: &str = ".match_marker";

/// Where a join's result goes
///
/// An explicit destination policy: the default is a tracked intermediate,
/// `Collect` brings the result into memory, and `WriteTo` writes a
/// user-visible artifact that the pipeline never deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutput {
    /// A pipeline-owned intermediate in the configured work directory
    Intermediate,
    /// An in-memory [`RecordSet`] instead of an on-disk artifact
    Collect,
    /// A user-requested artifact at the given location
    WriteTo(DataLocation),
}

/// A join's result value
#[derive(Debug)]
pub enum JoinValue {
    /// An on-disk result
    Dataset(Dataset),
    /// A collected in-memory result
    Records(RecordSet),
}

impl JoinValue {
    pub fn into_dataset(self) -> Option<Dataset> {
        match self {
            JoinValue::Dataset(d) => Some(d),
            JoinValue::Records(_) => None,
        }
    }

    pub fn into_records(self) -> Option<RecordSet> {
        match self {
            JoinValue::Records(rs) => Some(rs),
            JoinValue::Dataset(_) => None,
        }
    }
}

/// Result of a join, carrying any non-fatal cleanup warnings that
/// accumulated while the operation ran
#[derive(Debug)]
pub struct JoinResult {
    /// The join's output
    pub output: JoinValue,
    /// Deletion failures for intermediates consumed by this operation.
    /// A leaked temporary is reported, not fatal.
    pub warnings: Vec<DeleteWarning>,
}

impl Dataset {
    /// Join this `Dataset` with another one
    ///
    /// When `keys` is `None` the join keys are inferred as the columns
    /// the two inputs share, in left-input order; if they share none the
    /// join fails with [`XdfError::NoCommonKeys`]. Explicitly given keys
    /// must be columns of both inputs.
    ///
    /// Pipeline-owned inputs are consumed: once the join has succeeded
    /// their backing storage is deleted, unless the declared output
    /// location coincides with an input (in-place) or the input was
    /// promoted with [`Dataset::persist`]. On failure the inputs are left
    /// untouched and only intermediates created for this join are cleaned
    /// up.
    pub fn join(
        self,
        right: Dataset,
        join_type: JoinType,
        keys: Option<&[&str]>,
        output: JoinOutput,
    ) -> Result<JoinResult> {
        if !Arc::ptr_eq(self.env(), right.env()) {
            return internal_err!("join inputs belong to different runtime environments");
        }
        let env = Arc::clone(self.env());
        let x = self.handle().clone();
        let y = right.handle().clone();
        if x.is_released() || y.is_released() {
            return internal_err!("join input handle has already been released");
        }
        if x.location().storage() != y.location().storage() {
            return topology_err!(
                "cannot merge {} with {}: the inputs live on different filesystems \
                 and must be copied to a common one first",
                x.location(),
                y.location()
            );
        }

        let on = resolve_join_keys(env.engine.as_ref(), x.location(), y.location(), keys)?;
        debug!(
            "translating {join_type} join of {} and {} on {on:?}",
            x.location(),
            y.location()
        );
        let (target, out_handle) = resolve_output(&env, &output, &x)?;

        let merged = match join_type {
            JoinType::Inner | JoinType::Left | JoinType::Right | JoinType::Full => {
                native_join(&env, &x, &y, &on, join_type, &target)?
            }
            JoinType::Semi => semi_join_lowered(&env, &x, &y, &on, &target)?,
            JoinType::Anti => anti_join_lowered(&env, &x, &y, &on, &target)?,
        };

        // the inputs are consumed only once the operation has succeeded;
        // for semi/anti, `y` was adopted by the lowering and stays
        env.artifacts
            .release_consumed(&[x, y], declared_location(&target));

        let warnings = env.artifacts.take_warnings();
        let value = match merged {
            MergeOutput::Records(rs) => JoinValue::Records(rs),
            MergeOutput::Written(loc) => {
                let Some(handle) = out_handle else {
                    return internal_err!("engine wrote {loc} for a collected output");
                };
                JoinValue::Dataset(Dataset::new(Arc::clone(&env), handle))
            }
        };
        Ok(JoinResult {
            output: value,
            warnings,
        })
    }

    /// Inner join on the shared columns, into a tracked intermediate
    pub fn inner_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Inner)
    }

    /// Left join on the shared columns, into a tracked intermediate
    pub fn left_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Left)
    }

    /// Right join on the shared columns, into a tracked intermediate
    pub fn right_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Right)
    }

    /// Full join on the shared columns, into a tracked intermediate
    pub fn full_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Full)
    }

    /// Rows of `self` with at least one key match in `right`
    pub fn semi_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Semi)
    }

    /// Rows of `self` with no key match in `right`
    pub fn anti_join(self, right: Dataset) -> Result<Dataset> {
        self.named_join(right, JoinType::Anti)
    }

    fn named_join(self, right: Dataset, join_type: JoinType) -> Result<Dataset> {
        let result = self.join(right, join_type, None, JoinOutput::Intermediate)?;
        match result.output {
            JoinValue::Dataset(d) => Ok(d),
            JoinValue::Records(_) => {
                internal_err!("an intermediate join output cannot be a record set")
            }
        }
    }
}

fn resolve_join_keys(
    engine: &dyn XdfEngine,
    left: &DataLocation,
    right: &DataLocation,
    keys: Option<&[&str]>,
) -> Result<Vec<String>> {
    let left_cols = engine.column_names(left)?;
    let right_cols = engine.column_names(right)?;
    match keys {
        Some(keys) if !keys.is_empty() => {
            for key in keys {
                if !left_cols.iter().any(|c| c == key)
                    || !right_cols.iter().any(|c| c == key)
                {
                    return Err(XdfError::NoCommonKeys(format!(
                        "join key `{key}` is not a column of both inputs"
                    )));
                }
            }
            Ok(keys.iter().map(|k| k.to_string()).collect())
        }
        _ => {
            let on: Vec<String> = left_cols
                .into_iter()
                .filter(|c| right_cols.contains(c))
                .collect();
            if on.is_empty() {
                return Err(XdfError::NoCommonKeys(
                    "the inputs share no columns; specify join keys explicitly"
                        .to_string(),
                ));
            }
            debug!("joining by inferred keys {on:?}");
            Ok(on)
        }
    }
}

fn resolve_output(
    env: &Arc<RuntimeEnv>,
    output: &JoinOutput,
    like: &ArtifactHandle,
) -> Result<(MergeTarget, Option<ArtifactHandle>)> {
    match output {
        JoinOutput::Intermediate => {
            let handle = env.artifacts.intermediate_like("merge", like);
            Ok((MergeTarget::WriteTo(handle.location().clone()), Some(handle)))
        }
        JoinOutput::Collect => Ok((MergeTarget::Collect, None)),
        JoinOutput::WriteTo(loc) => {
            if loc.storage() != like.location().storage() {
                return topology_err!(
                    "cannot write the result of a join on {} data to {loc}",
                    like.location().storage()
                );
            }
            let handle = ArtifactHandle::external(loc.clone());
            Ok((MergeTarget::WriteTo(loc.clone()), Some(handle)))
        }
    }
}

fn declared_location(target: &MergeTarget) -> Option<&DataLocation> {
    match target {
        MergeTarget::WriteTo(loc) => Some(loc),
        MergeTarget::Collect => None,
    }
}

fn native_join(
    env: &Arc<RuntimeEnv>,
    x: &ArtifactHandle,
    y: &ArtifactHandle,
    on: &[String],
    join_type: JoinType,
    target: &MergeTarget,
) -> Result<MergeOutput> {
    env.engine.merge(&MergeRequest {
        left: x.location().clone(),
        right: y.location().clone(),
        on: on.to_vec(),
        join_type,
        output: target.clone(),
        overwrite: true,
    })
}

fn semi_join_lowered(
    env: &Arc<RuntimeEnv>,
    x: &ArtifactHandle,
    y: &ArtifactHandle,
    on: &[String],
    target: &MergeTarget,
) -> Result<MergeOutput> {
    // the projection below is derived from `y`, so `y` must survive this
    // operation's cleanup even when the pipeline owns it
    env.artifacts.adopt(y);
    let keys = env.artifacts.intermediate_like("jnkeys", y);
    env.artifacts
        .scoped_consume(&[keys.clone()], declared_location(target), || {
            env.engine
                .distinct_projection(y.location(), on, None, keys.location())?;
            env.engine.merge(&MergeRequest {
                left: x.location().clone(),
                right: keys.location().clone(),
                on: on.to_vec(),
                join_type: JoinType::Inner,
                output: target.clone(),
                overwrite: true,
            })
        })
}

fn anti_join_lowered(
    env: &Arc<RuntimeEnv>,
    x: &ArtifactHandle,
    y: &ArtifactHandle,
    on: &[String],
    target: &MergeTarget,
) -> Result<MergeOutput> {
    env.artifacts.adopt(y);
    let keys = env.artifacts.intermediate_like("jnkeys", y);
    let marked = env.artifacts.intermediate_like("jnmark", x);
    env.artifacts.scoped_consume(
        &[keys.clone(), marked.clone()],
        declared_location(target),
        || {
            env.engine.distinct_projection(
                y.location(),
                on,
                Some(MATCH_MARKER_COLUMN),
                keys.location(),
            )?;
            env.engine.merge(&MergeRequest {
                left: x.location().clone(),
                right: keys.location().clone(),
                on: on.to_vec(),
                join_type: JoinType::Left,
                output: MergeTarget::WriteTo(marked.location().clone()),
                overwrite: true,
            })?;
            env.engine
                .filter_unmatched(marked.location(), MATCH_MARKER_COLUMN, target)
        },
    )
}
