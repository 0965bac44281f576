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

//! [`ArtifactHandle`]: a tracked reference to one on-disk pipeline result.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use parking_lot::Mutex;
use xdflow_common::DataLocation;

/// Ownership state of an artifact handle
///
/// Transitions only move forward (`Owned → Adopted`, `Owned → Released`)
/// and are performed by the
/// [`ArtifactManager`](crate::artifact_manager::ArtifactManager), never by
/// flipping a flag at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    /// Created as an unnamed intermediate by the current pipeline; the
    /// tracker deletes its storage after its last consumer
    Owned,
    /// User-supplied, or promoted to a user-visible result; the tracker
    /// never deletes it
    Adopted,
    /// The backing storage has been deleted (or its deletion attempted);
    /// the handle is no longer usable as an input
    Released,
}

/// A reference to a file or composite-directory dataset, tagged with who
/// is responsible for deleting it
///
/// Handles are cheap to clone; clones share one ownership state, so at
/// most one live owner can ever claim the same underlying location.
#[derive(Debug, Clone)]
pub struct ArtifactHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    location: DataLocation,
    state: Mutex<OwnershipState>,
}

impl ArtifactHandle {
    pub(crate) fn owned(location: DataLocation) -> Self {
        Self::with_state(location, OwnershipState::Owned)
    }

    /// A handle over data the pipeline does not own, e.g. a user's input
    /// file. Its storage is never deleted by the tracker.
    pub fn external(location: DataLocation) -> Self {
        Self::with_state(location, OwnershipState::Adopted)
    }

    fn with_state(location: DataLocation, state: OwnershipState) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                location,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn location(&self) -> &DataLocation {
        &self.inner.location
    }

    pub fn state(&self) -> OwnershipState {
        *self.inner.state.lock()
    }

    pub fn is_owned(&self) -> bool {
        self.state() == OwnershipState::Owned
    }

    pub fn is_released(&self) -> bool {
        self.state() == OwnershipState::Released
    }

    /// If currently `Owned`, move to `to` and return `true`. Used by the
    /// tracker to make check-and-transition atomic.
    pub(crate) fn transition_from_owned(&self, to: OwnershipState) -> bool {
        let mut state = self.inner.state.lock();
        if *state == OwnershipState::Owned {
            *state = to;
            true
        } else {
            false
        }
    }

    /// If not yet `Released`, move to `Released` and return `true`.
    pub(crate) fn transition_to_released(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state == OwnershipState::Released {
            false
        } else {
            *state = OwnershipState::Released;
            true
        }
    }
}

impl Display for ArtifactHandle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{} ({:?})", self.inner.location, self.state())
    }
}
