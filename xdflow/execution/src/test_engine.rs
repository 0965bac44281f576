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

//! A do-nothing [`XdfEngine`] for examples and tests that only need an
//! engine to be present.

use semver::Version;
use xdflow_common::{not_impl_err, DataLocation, Result};

use crate::engine::{MergeOutput, MergeRequest, MergeTarget, XdfEngine};

/// Engine stub whose data-plane operations are unimplemented
///
/// Deletion succeeds silently, so artifact lifecycle code can run against
/// it; everything else returns `NotImplemented`.
#[derive(Debug, Default)]
pub struct NullEngine;

impl XdfEngine for NullEngine {
    fn engine_version(&self) -> Version {
        Version::new(9, 3, 0)
    }

    fn column_names(&self, location: &DataLocation) -> Result<Vec<String>> {
        not_impl_err!("NullEngine has no schema for {location}")
    }

    fn merge(&self, request: &MergeRequest) -> Result<MergeOutput> {
        not_impl_err!("NullEngine cannot merge {}", request.left)
    }

    fn distinct_projection(
        &self,
        input: &DataLocation,
        _keys: &[String],
        _marker: Option<&str>,
        _output: &DataLocation,
    ) -> Result<()> {
        not_impl_err!("NullEngine cannot project {input}")
    }

    fn filter_unmatched(
        &self,
        input: &DataLocation,
        _marker: &str,
        _output: &MergeTarget,
    ) -> Result<MergeOutput> {
        not_impl_err!("NullEngine cannot filter {input}")
    }

    fn delete(&self, _location: &DataLocation) -> Result<()> {
        Ok(())
    }
}
