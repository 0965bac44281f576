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

//! [`XdfEngine`]: the narrow capability interface to the external engine.
//!
//! Everything the translation layer cannot do itself (merging, schema
//! inspection, storage deletion) goes through this trait. Bindings to a
//! real out-of-process engine live outside this repository; the tests use
//! in-memory implementations.

use std::fmt::Debug;

use semver::Version;
use xdflow_common::{DataLocation, JoinType, RecordSet, Result};

/// A merge (join) request handed to the engine
///
/// The translator is responsible for key reconciliation and for lowering
/// join kinds the engine does not support natively: `join_type` here is
/// always one of `Inner`, `Left`, `Right`, `Full`.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    /// Left input
    pub left: DataLocation,
    /// Right input
    pub right: DataLocation,
    /// Names of the join key columns, present in both inputs
    pub on: Vec<String>,
    /// Join kind (native kinds only)
    pub join_type: JoinType,
    /// Where the result goes
    pub output: MergeTarget,
    /// Whether an existing dataset at the output location may be replaced
    pub overwrite: bool,
}

/// Destination of an engine operation
#[derive(Debug, Clone, PartialEq)]
pub enum MergeTarget {
    /// Write an artifact at the given location
    WriteTo(DataLocation),
    /// Return the result as an in-memory [`RecordSet`]
    Collect,
}

/// Result of an engine operation
#[derive(Debug, Clone)]
pub enum MergeOutput {
    /// An artifact was written at the given location
    Written(DataLocation),
    /// The result was collected into memory
    Records(RecordSet),
}

impl MergeOutput {
    /// The collected record set, if this output was collected
    pub fn into_records(self) -> Option<RecordSet> {
        match self {
            MergeOutput::Records(rs) => Some(rs),
            MergeOutput::Written(_) => None,
        }
    }

    /// The written location, if this output was written
    pub fn written(&self) -> Option<&DataLocation> {
        match self {
            MergeOutput::Written(loc) => Some(loc),
            MergeOutput::Records(_) => None,
        }
    }
}

/// Capability interface to the external big-data engine
///
/// Calls are synchronous and blocking: each one returns only when the
/// external operation has completed, and there is no cancellation. All
/// storage mutation, including deletion of pipeline intermediates,
/// happens on the engine side of this boundary.
pub trait XdfEngine: Send + Sync + Debug {
    /// Version of the installed engine, used for feature gating
    fn engine_version(&self) -> Version;

    /// Column names of the dataset at `location`
    fn column_names(&self, location: &DataLocation) -> Result<Vec<String>>;

    /// Perform a merge
    ///
    /// Fails with [`XdfError::Merge`] on schema or type mismatches the
    /// engine cannot coerce, and with [`XdfError::UnsupportedTopology`]
    /// when the inputs' filesystem/compute-context pairing is not
    /// supported.
    ///
    /// [`XdfError::Merge`]: xdflow_common::XdfError::Merge
    /// [`XdfError::UnsupportedTopology`]: xdflow_common::XdfError::UnsupportedTopology
    fn merge(&self, request: &MergeRequest) -> Result<MergeOutput>;

    /// Write the distinct projection of `keys` from `input` to `output`
    ///
    /// When `marker` is given, a constant non-null indicator column of
    /// that name is appended to the projection; lowered anti joins use it
    /// to tell matched rows from unmatched ones.
    fn distinct_projection(
        &self,
        input: &DataLocation,
        keys: &[String],
        marker: Option<&str>,
        output: &DataLocation,
    ) -> Result<()>;

    /// Keep only the rows of `input` whose `marker` column is null, and
    /// drop the marker column from the result
    fn filter_unmatched(
        &self,
        input: &DataLocation,
        marker: &str,
        output: &MergeTarget,
    ) -> Result<MergeOutput>;

    /// Delete the dataset at `location`
    fn delete(&self, location: &DataLocation) -> Result<()>;
}
