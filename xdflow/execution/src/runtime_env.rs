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

//! Execution [`RuntimeEnv`] environment that manages access to the
//! external engine, the option store and the artifact tracker.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;
use xdflow_common::config::XdfOptions;
use xdflow_common::{internal_err, Result};

use crate::artifact_manager::ArtifactManager;
use crate::engine::XdfEngine;

/// Execution runtime environment
///
/// Ties together the three process-wide collaborators of a pipeline:
///
/// * [`XdfOptions`]: process-wide configuration
/// * [`XdfEngine`]: the external engine binding
/// * [`ArtifactManager`]: lifecycle tracking of pipeline intermediates
///
/// A [`RuntimeEnv`] is created using [`RuntimeEnvBuilder`]:
///
/// ```
/// # use std::sync::Arc;
/// # use xdflow_execution::runtime_env::RuntimeEnvBuilder;
/// # use xdflow_execution::test_engine::NullEngine;
/// let runtime_env = RuntimeEnvBuilder::new()
///     .with_engine(Arc::new(NullEngine::default()))
///     .build()
///     .unwrap();
/// ```
pub struct RuntimeEnv {
    /// Process-wide configuration
    pub options: Arc<RwLock<XdfOptions>>,
    /// The external engine binding
    pub engine: Arc<dyn XdfEngine>,
    /// Lifecycle tracking of pipeline intermediates
    pub artifacts: Arc<ArtifactManager>,
}

impl Debug for RuntimeEnv {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "RuntimeEnv")
    }
}

impl RuntimeEnv {
    /// A copy of the current options
    pub fn options_snapshot(&self) -> XdfOptions {
        self.options.read().clone()
    }

    /// Apply option changes all-or-nothing, returning the pre-change
    /// snapshot. See [`XdfOptions::apply`].
    pub fn set_options(&self, changes: &HashMap<String, String>) -> Result<XdfOptions> {
        self.options.write().apply(changes)
    }

    /// Run the one-time setup of the remote work directory
    ///
    /// `materialize` is invoked with the configured directory only if it
    /// has not been marked ready yet; on success the readiness flag is
    /// set, so later calls are no-ops until the work directory option
    /// changes again.
    pub fn ensure_remote_work_dir_ready(
        &self,
        materialize: impl FnOnce(&str) -> Result<()>,
    ) -> Result<()> {
        let mut options = self.options.write();
        if options.remote.work_dir_ready {
            return Ok(());
        }
        materialize(&options.remote.work_dir)?;
        options.mark_remote_work_dir_ready();
        Ok(())
    }
}

/// Execution runtime configuration builder
#[derive(Default)]
pub struct RuntimeEnvBuilder {
    options: XdfOptions,
    engine: Option<Arc<dyn XdfEngine>>,
}

impl RuntimeEnvBuilder {
    /// New with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the given options instead of the defaults
    pub fn with_options(mut self, options: XdfOptions) -> Self {
        self.options = options;
        self
    }

    /// The engine binding to execute against (required)
    pub fn with_engine(mut self, engine: Arc<dyn XdfEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Build a RuntimeEnv
    ///
    /// Captures the installed engine version into the read-only
    /// `xdflow.engine.version` option, which feature gating consults.
    pub fn build(self) -> Result<RuntimeEnv> {
        let Self {
            mut options,
            engine,
        } = self;
        let Some(engine) = engine else {
            return internal_err!("RuntimeEnvBuilder requires an engine binding");
        };
        options.set_engine_version(&engine.engine_version());
        let options = Arc::new(RwLock::new(options));
        let artifacts = Arc::new(ArtifactManager::new(
            Arc::clone(&options),
            Arc::clone(&engine),
        ));
        Ok(RuntimeEnv {
            options,
            engine,
            artifacts,
        })
    }

    /// Convenience method to create a new `Arc<RuntimeEnv>`
    pub fn build_arc(self) -> Result<Arc<RuntimeEnv>> {
        self.build().map(Arc::new)
    }
}
