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

//! [`Dataset`]: a dataset handle bound to a runtime environment.

use std::sync::Arc;

use xdflow_common::{DataLocation, Result};
use xdflow_execution::artifact::ArtifactHandle;
use xdflow_execution::runtime_env::RuntimeEnv;

/// A dataset known to the external engine, bound to the runtime
/// environment its operations run in
///
/// A `Dataset` pairs an [`ArtifactHandle`], the tracked reference to the
/// on-disk data, with the [`RuntimeEnv`] holding the engine binding and
/// the artifact tracker. Verbs consume their receiver and hand back a new
/// `Dataset` over the result, so a chain of verbs reads left to right
/// while the tracker deletes each intermediate after its last consumer.
#[derive(Debug, Clone)]
pub struct Dataset {
    env: Arc<RuntimeEnv>,
    handle: ArtifactHandle,
}

impl Dataset {
    /// Wrap an existing artifact handle
    pub fn new(env: Arc<RuntimeEnv>, handle: ArtifactHandle) -> Self {
        Self { env, handle }
    }

    /// A dataset over a user-supplied file on the local filesystem. Its
    /// storage is never deleted by the pipeline.
    pub fn from_path(env: Arc<RuntimeEnv>, path: impl Into<String>) -> Self {
        Self::from_location(env, DataLocation::local(path))
    }

    /// A dataset over user-supplied data at an arbitrary location. Its
    /// storage is never deleted by the pipeline.
    pub fn from_location(env: Arc<RuntimeEnv>, location: DataLocation) -> Self {
        Self::new(env, ArtifactHandle::external(location))
    }

    pub fn env(&self) -> &Arc<RuntimeEnv> {
        &self.env
    }

    pub fn handle(&self) -> &ArtifactHandle {
        &self.handle
    }

    pub fn location(&self) -> &DataLocation {
        self.handle.location()
    }

    /// Column names of this dataset, read from the engine
    pub fn column_names(&self) -> Result<Vec<String>> {
        self.env.engine.column_names(self.location())
    }

    /// Promote this dataset to a user-visible result
    ///
    /// An owned intermediate stops being pipeline-owned: no later
    /// operation will delete it, and the caller takes responsibility for
    /// its storage. Idempotent, and a no-op for data the pipeline never
    /// owned. Returns the location for the caller to hold on to.
    pub fn persist(&self) -> &DataLocation {
        self.env.artifacts.adopt(&self.handle);
        self.handle.location()
    }

    /// Explicitly delete this dataset's storage
    ///
    /// The disposal path for callers done with a result they own, e.g.
    /// an intermediate that survived a semi-join lowering as adopted
    /// data. Never call it on somebody else's input file. A failed
    /// deletion is recorded as a warning, not an error.
    pub fn delete(self) {
        self.env.artifacts.discard(&self.handle);
    }
}
