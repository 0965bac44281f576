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

//! [`ArtifactManager`]: decides whether and when the backing storage of
//! each pipeline intermediate is deleted.
//!
//! Every operation that produces an on-disk result without an explicit
//! user destination allocates its output handle here. The manager deletes
//! an intermediate exactly once, after its last consumer, and never
//! touches anything a live handle still depends on. Deletion failures are
//! accumulated as warnings rather than aborting the pipeline: a leaked
//! temporary is lower severity than losing an already-computed result.

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use rand::distr::Alphanumeric;
use rand::Rng;
use xdflow_common::config::XdfOptions;
use xdflow_common::{DataLocation, Result, StorageKind};

use crate::artifact::{ArtifactHandle, OwnershipState};
use crate::engine::XdfEngine;

/// Length of the random suffix appended to intermediate artifact names
const INTERMEDIATE_SUFFIX_LEN: usize = 8;

/// A non-fatal deletion failure, surfaced once the enclosing pipeline
/// operation returns
#[derive(Debug, Clone)]
pub struct DeleteWarning {
    /// The location whose deletion failed
    pub location: DataLocation,
    /// The engine-reported failure
    pub message: String,
}

/// Tracks the lifecycle of pipeline-intermediate artifacts
#[derive(Debug)]
pub struct ArtifactManager {
    options: Arc<RwLock<XdfOptions>>,
    engine: Arc<dyn XdfEngine>,
    warnings: Mutex<Vec<DeleteWarning>>,
}

impl ArtifactManager {
    pub fn new(options: Arc<RwLock<XdfOptions>>, engine: Arc<dyn XdfEngine>) -> Self {
        Self {
            options,
            engine,
            warnings: Mutex::new(vec![]),
        }
    }

    /// Allocate a handle for a not-yet-materialized intermediate output
    ///
    /// The location is the work directory configured for `storage` at the
    /// time of this call (changing the work directory later never
    /// relocates artifacts that already exist), plus `prefix` and a random
    /// alphanumeric suffix. Intermediates on distributed filesystems are
    /// composite datasets.
    pub fn create_intermediate(
        &self,
        prefix: &str,
        storage: StorageKind,
    ) -> ArtifactHandle {
        let work_dir = self.work_dir(storage);
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(INTERMEDIATE_SUFFIX_LEN)
            .map(char::from)
            .collect();
        let location = match storage {
            StorageKind::Local => DataLocation::local(format!(
                "{}/{prefix}_{suffix}.xdf",
                work_dir.trim_end_matches('/')
            )),
            // composite datasets are directories and carry no extension
            StorageKind::Distributed => DataLocation::distributed(format!(
                "{}/{prefix}_{suffix}",
                work_dir.trim_end_matches('/')
            )),
        };
        debug!("allocated pipeline intermediate {location}");
        ArtifactHandle::owned(location)
    }

    /// Allocate an intermediate on the same filesystem as `input`
    pub fn intermediate_like(
        &self,
        prefix: &str,
        input: &ArtifactHandle,
    ) -> ArtifactHandle {
        self.create_intermediate(prefix, input.location().storage())
    }

    /// Mark a handle as no longer pipeline-owned
    ///
    /// Used when a result is about to be returned to the caller as a
    /// final, user-visible artifact, or when it must survive the cleanup
    /// of an operation that will keep reading it. Idempotent; a released
    /// handle stays released.
    pub fn adopt(&self, handle: &ArtifactHandle) {
        if handle.transition_from_owned(OwnershipState::Adopted) {
            debug!("adopted {}", handle.location());
        }
    }

    /// Delete the backing storage if (and only if) the handle is still
    /// pipeline-owned
    ///
    /// The handle moves to `Released` whether or not the engine delete
    /// succeeds: the deletion has been attempted, and a failure is
    /// recorded as a [`DeleteWarning`] instead of aborting the pipeline.
    /// Safe to call repeatedly; storage is deleted at most once.
    pub fn release_if_owned(&self, handle: &ArtifactHandle) {
        if !handle.transition_from_owned(OwnershipState::Released) {
            return;
        }
        self.delete_with_warning(handle.location());
    }

    /// Delete the backing storage regardless of adoption, unless the
    /// handle was already released
    ///
    /// The explicit disposal path for a caller discarding a result it
    /// owns, e.g. an intermediate adopted across a semi-join lowering.
    /// Normal pipeline cleanup never calls this; it goes through
    /// [`Self::release_if_owned`], which leaves adopted data alone.
    pub fn discard(&self, handle: &ArtifactHandle) {
        if !handle.transition_to_released() {
            return;
        }
        self.delete_with_warning(handle.location());
    }

    fn delete_with_warning(&self, location: &DataLocation) {
        match self.engine.delete(location) {
            Ok(()) => debug!("deleted pipeline intermediate {location}"),
            Err(e) => {
                warn!("failed to delete pipeline intermediate {location}: {e}");
                self.warnings.lock().push(DeleteWarning {
                    location: location.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Run `body`, then release every pipeline-owned input on all exit
    /// paths
    ///
    /// `body` runs to completion first, so its result has captured
    /// whatever it needed from the inputs before anything is deleted. An
    /// input whose location coincides with `declared_output` is never
    /// released: deleting it would delete the operation's own output
    /// (in-place operation).
    pub fn scoped_consume<T>(
        &self,
        inputs: &[ArtifactHandle],
        declared_output: Option<&DataLocation>,
        body: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = body();
        self.release_consumed(inputs, declared_output);
        result
    }

    /// Release every pipeline-owned handle in `inputs`, except any whose
    /// location coincides with `declared_output`
    ///
    /// This is the consumption step of an operation that has already
    /// finished with its inputs. [`Self::scoped_consume`] is the scoped
    /// form; use this directly when consumption must only happen on the
    /// success path (a failed operation leaves prior pipeline state
    /// untouched).
    pub fn release_consumed(
        &self,
        inputs: &[ArtifactHandle],
        declared_output: Option<&DataLocation>,
    ) {
        for handle in inputs {
            if let Some(out) = declared_output {
                let loc = handle.location();
                if loc.path() == out.path() && loc.storage() == out.storage() {
                    debug!("keeping in-place input {loc}");
                    continue;
                }
            }
            self.release_if_owned(handle);
        }
    }

    /// Drain the deletion warnings accumulated since the last call
    pub fn take_warnings(&self) -> Vec<DeleteWarning> {
        std::mem::take(&mut *self.warnings.lock())
    }

    fn work_dir(&self, storage: StorageKind) -> String {
        let options = self.options.read();
        match storage {
            StorageKind::Local => options
                .storage
                .local_work_dir
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().to_string_lossy().into_owned()),
            StorageKind::Distributed => options.remote.work_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MergeOutput, MergeRequest, MergeTarget};
    use semver::Version;
    use xdflow_common::{internal_err, not_impl_err, XdfError};

    /// Engine stub that records deletions and can be told to fail them
    #[derive(Debug, Default)]
    struct RecordingEngine {
        deleted: Mutex<Vec<DataLocation>>,
        fail_deletes: bool,
    }

    impl RecordingEngine {
        fn failing() -> Self {
            Self {
                fail_deletes: true,
                ..Default::default()
            }
        }

        fn deleted(&self) -> Vec<DataLocation> {
            self.deleted.lock().clone()
        }
    }

    impl XdfEngine for RecordingEngine {
        fn engine_version(&self) -> Version {
            Version::new(9, 3, 0)
        }

        fn column_names(&self, _location: &DataLocation) -> Result<Vec<String>> {
            not_impl_err!("RecordingEngine has no schemas")
        }

        fn merge(&self, _request: &MergeRequest) -> Result<MergeOutput> {
            not_impl_err!("RecordingEngine cannot merge")
        }

        fn distinct_projection(
            &self,
            _input: &DataLocation,
            _keys: &[String],
            _marker: Option<&str>,
            _output: &DataLocation,
        ) -> Result<()> {
            not_impl_err!("RecordingEngine cannot project")
        }

        fn filter_unmatched(
            &self,
            _input: &DataLocation,
            _marker: &str,
            _output: &MergeTarget,
        ) -> Result<MergeOutput> {
            not_impl_err!("RecordingEngine cannot filter")
        }

        fn delete(&self, location: &DataLocation) -> Result<()> {
            if self.fail_deletes {
                return Err(XdfError::DeleteFailed(format!(
                    "permission denied: {location}"
                )));
            }
            self.deleted.lock().push(location.clone());
            Ok(())
        }
    }

    fn manager_with(engine: Arc<RecordingEngine>) -> ArtifactManager {
        let engine: Arc<dyn XdfEngine> = engine;
        ArtifactManager::new(Arc::new(RwLock::new(XdfOptions::default())), engine)
    }

    #[test]
    fn release_deletes_at_most_once() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let handle = manager.create_intermediate("merge", StorageKind::Local);
        let location = handle.location().clone();

        manager.release_if_owned(&handle);
        manager.release_if_owned(&handle);

        assert_eq!(engine.deleted(), vec![location]);
        assert!(handle.is_released());
    }

    #[test]
    fn adopt_is_idempotent_and_prevents_deletion() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let handle = manager.create_intermediate("merge", StorageKind::Local);
        manager.adopt(&handle);
        manager.adopt(&handle);
        assert_eq!(handle.state(), OwnershipState::Adopted);

        manager.release_if_owned(&handle);
        assert!(engine.deleted().is_empty());
        // an adopted handle is never invalidated by release
        assert_eq!(handle.state(), OwnershipState::Adopted);
    }

    #[test]
    fn discard_deletes_adopted_data_once() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let handle = manager.create_intermediate("merge", StorageKind::Local);
        manager.adopt(&handle);
        manager.release_if_owned(&handle);
        assert!(engine.deleted().is_empty());

        manager.discard(&handle);
        manager.discard(&handle);
        assert_eq!(engine.deleted(), vec![handle.location().clone()]);
        assert!(handle.is_released());
    }

    #[test]
    fn external_data_is_never_deleted() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let handle = ArtifactHandle::external(DataLocation::local("/data/user.xdf"));
        manager.release_if_owned(&handle);
        manager.adopt(&handle); // no-op
        assert!(engine.deleted().is_empty());
    }

    #[test]
    fn scoped_consume_releases_on_success_and_failure() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let a = manager.create_intermediate("a", StorageKind::Local);
        let b = manager.create_intermediate("b", StorageKind::Local);
        let out: Result<u32> =
            manager.scoped_consume(&[a.clone(), b.clone()], None, || Ok(42));
        assert_eq!(out.unwrap(), 42);
        assert!(a.is_released());
        assert!(b.is_released());
        assert_eq!(engine.deleted().len(), 2);

        let c = manager.create_intermediate("c", StorageKind::Local);
        let out: Result<u32> = manager.scoped_consume(&[c.clone()], None, || {
            internal_err!("merge blew up")
        });
        assert!(out.is_err());
        assert!(c.is_released());
        assert_eq!(engine.deleted().len(), 3);
    }

    #[test]
    fn in_place_output_suppresses_input_deletion() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(Arc::clone(&engine));

        let input = manager.create_intermediate("sort", StorageKind::Local);
        let output = input.location().clone();
        let result: Result<()> =
            manager.scoped_consume(&[input.clone()], Some(&output), || Ok(()));
        result.unwrap();

        assert!(engine.deleted().is_empty());
        // the handle was not consumed; a later consumer may still release it
        assert!(input.is_owned());
    }

    #[test]
    fn failed_deletion_becomes_a_warning() {
        let engine = Arc::new(RecordingEngine::failing());
        let manager = manager_with(Arc::clone(&engine));

        let handle = manager.create_intermediate("merge", StorageKind::Local);
        let location = handle.location().clone();
        manager.release_if_owned(&handle);

        // the handle is spent even though the delete failed
        assert!(handle.is_released());

        let warnings = manager.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].location, location);
        assert!(warnings[0].message.contains("permission denied"));

        // drained
        assert!(manager.take_warnings().is_empty());
    }

    #[test]
    fn intermediate_location_follows_options_at_call_time() {
        let engine: Arc<dyn XdfEngine> = Arc::new(RecordingEngine::default());
        let options = Arc::new(RwLock::new(XdfOptions::default()));
        let manager = ArtifactManager::new(Arc::clone(&options), engine);

        options.write().storage.local_work_dir = Some("/scratch/xdf".to_string());
        let local = manager.create_intermediate("merge", StorageKind::Local);
        assert!(local.location().path().starts_with("/scratch/xdf/merge_"));
        assert!(local.location().path().ends_with(".xdf"));
        assert!(!local.location().is_composite());

        let remote = manager.create_intermediate("merge", StorageKind::Distributed);
        assert!(remote.location().path().starts_with("/tmp/xdflow/merge_"));
        assert!(remote.location().is_composite());

        // a later option change affects later artifacts only
        options.write().remote.work_dir = "/user/xdf".to_string();
        let remote2 = manager.create_intermediate("merge", StorageKind::Distributed);
        assert!(remote2.location().path().starts_with("/user/xdf/merge_"));
        assert!(remote.location().path().starts_with("/tmp/xdflow/merge_"));
    }

    #[test]
    fn intermediate_like_inherits_storage_kind() {
        let engine = Arc::new(RecordingEngine::default());
        let manager = manager_with(engine);

        let input = ArtifactHandle::external(DataLocation::distributed("/data/in"));
        let out = manager.intermediate_like("keys", &input);
        assert_eq!(out.location().storage(), StorageKind::Distributed);
        assert!(out.is_owned());
    }

    /// Engine stub that deletes real files, for exercising the manager
    /// against an actual filesystem
    #[derive(Debug, Default)]
    struct FsEngine;

    impl XdfEngine for FsEngine {
        fn engine_version(&self) -> Version {
            Version::new(9, 3, 0)
        }

        fn column_names(&self, _location: &DataLocation) -> Result<Vec<String>> {
            not_impl_err!("FsEngine has no schemas")
        }

        fn merge(&self, _request: &MergeRequest) -> Result<MergeOutput> {
            not_impl_err!("FsEngine cannot merge")
        }

        fn distinct_projection(
            &self,
            _input: &DataLocation,
            _keys: &[String],
            _marker: Option<&str>,
            _output: &DataLocation,
        ) -> Result<()> {
            not_impl_err!("FsEngine cannot project")
        }

        fn filter_unmatched(
            &self,
            _input: &DataLocation,
            _marker: &str,
            _output: &MergeTarget,
        ) -> Result<MergeOutput> {
            not_impl_err!("FsEngine cannot filter")
        }

        fn delete(&self, location: &DataLocation) -> Result<()> {
            std::fs::remove_file(location.path())?;
            Ok(())
        }
    }

    #[test]
    fn release_removes_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = XdfOptions::default();
        options.storage.local_work_dir =
            Some(dir.path().to_string_lossy().into_owned());
        let manager =
            ArtifactManager::new(Arc::new(RwLock::new(options)), Arc::new(FsEngine));

        let handle = manager.create_intermediate("merge", StorageKind::Local);
        std::fs::write(handle.location().path(), b"xdf").unwrap();
        assert!(std::path::Path::new(handle.location().path()).exists());

        manager.release_if_owned(&handle);
        assert!(!std::path::Path::new(handle.location().path()).exists());
        assert!(manager.take_warnings().is_empty());
    }
}
