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

//! xdflow translates fluent data-manipulation verbs onto calls against an
//! external big-data engine operating on the Xdf format.
//!
//! The engine owns the hard parts: storage, compute contexts, merge
//! algorithms. This crate owns the glue: the [`Dataset`] verb surface,
//! join-key reconciliation, the lowering of semi/anti joins the engine
//! lacks natively, and (through [`xdflow_execution`]) the lifecycle
//! tracking that deletes every pipeline intermediate exactly once, after
//! its last consumer.
//!
//! ```
//! use std::sync::Arc;
//! use xdflow::prelude::*;
//! use xdflow::test_util::{table, MemoryEngine};
//!
//! # fn main() -> xdflow::common::Result<()> {
//! let engine = Arc::new(MemoryEngine::new());
//! let flights = DataLocation::local("/data/flights.xdf");
//! let planes = DataLocation::local("/data/planes.xdf");
//! engine.insert(
//!     &flights,
//!     table(
//!         &["tailnum", "dest"],
//!         vec![
//!             vec!["N1".into(), "SEA".into()],
//!             vec!["N2".into(), "PDX".into()],
//!         ],
//!     ),
//! );
//! engine.insert(
//!     &planes,
//!     table(&["tailnum", "year"], vec![vec!["N1".into(), 2004i64.into()]]),
//! );
//!
//! let env = RuntimeEnvBuilder::new().with_engine(engine).build_arc()?;
//!
//! // rows of `flights` with no matching tail number in `planes`
//! let orphans = Dataset::from_location(Arc::clone(&env), flights)
//!     .anti_join(Dataset::from_location(Arc::clone(&env), planes))?;
//! assert_eq!(orphans.column_names()?, vec!["tailnum", "dest"]);
//! # Ok(())
//! # }
//! ```

pub mod dataset;
pub mod joins;
pub mod test_util;

pub use dataset::Dataset;
pub use joins::{JoinOutput, JoinResult, JoinValue};

// Re-export the member crates
pub use xdflow_common as common;
pub use xdflow_execution as execution;

/// A "prelude" for users of the xdflow crate
pub mod prelude {
    pub use crate::dataset::Dataset;
    pub use crate::joins::{JoinOutput, JoinResult, JoinValue};
    pub use xdflow_common::{
        DataLocation, JoinType, RecordSet, Result, ScalarValue, StorageKind, XdfError,
    };
    pub use xdflow_execution::artifact::{ArtifactHandle, OwnershipState};
    pub use xdflow_execution::engine::XdfEngine;
    pub use xdflow_execution::runtime_env::{RuntimeEnv, RuntimeEnvBuilder};
}
