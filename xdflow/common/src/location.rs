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

//! [`DataLocation`]: where a dataset lives, and on which filesystem.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::Result;
use crate::not_impl_err;

/// The kind of filesystem a dataset lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// The local filesystem
    Local,
    /// A distributed filesystem (e.g. HDFS), reached through the engine's
    /// compute context
    Distributed,
}

impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StorageKind::Local => write!(f, "local"),
            StorageKind::Distributed => write!(f, "distributed"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = crate::error::XdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "file" => Ok(StorageKind::Local),
            "distributed" | "hdfs" => Ok(StorageKind::Distributed),
            other => not_impl_err!("unknown storage kind \"{other}\""),
        }
    }
}

/// An opaque reference to a dataset on some filesystem
///
/// A location is either a single file or a composite dataset: a directory
/// of data files treated as one logical dataset. Composite is mandatory on
/// distributed filesystems, so constructors force the flag there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataLocation {
    path: String,
    storage: StorageKind,
    composite: bool,
}

impl DataLocation {
    /// Create a location, forcing `composite` on distributed storage
    pub fn new(path: impl Into<String>, storage: StorageKind, composite: bool) -> Self {
        Self {
            path: path.into(),
            storage,
            composite: composite || storage == StorageKind::Distributed,
        }
    }

    /// A single-file dataset on the local filesystem
    pub fn local(path: impl Into<String>) -> Self {
        Self::new(path, StorageKind::Local, false)
    }

    /// A composite dataset on the local filesystem
    pub fn local_composite(path: impl Into<String>) -> Self {
        Self::new(path, StorageKind::Local, true)
    }

    /// A dataset on the distributed filesystem (always composite)
    pub fn distributed(path: impl Into<String>) -> Self {
        Self::new(path, StorageKind::Distributed, true)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }
}

impl Display for DataLocation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let scheme = match self.storage {
            StorageKind::Local => "file",
            StorageKind::Distributed => "dfs",
        };
        write!(f, "{scheme}://{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributed_is_always_composite() {
        let loc = DataLocation::new("/data/flights", StorageKind::Distributed, false);
        assert!(loc.is_composite());
        assert!(DataLocation::distributed("/data/flights").is_composite());
        assert!(!DataLocation::local("/tmp/a.xdf").is_composite());
    }

    #[test]
    fn display_includes_scheme() {
        assert_eq!(
            DataLocation::local("/tmp/a.xdf").to_string(),
            "file:///tmp/a.xdf"
        );
        assert_eq!(
            DataLocation::distributed("/data/flights").to_string(),
            "dfs:///data/flights"
        );
    }
}
