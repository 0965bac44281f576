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

//! xdflow error types

use std::error;
use std::fmt::{Display, Formatter};
use std::io;
use std::result;

/// Result type for operations that could result in an [XdfError]
pub type Result<T> = result::Result<T, XdfError>;

/// Error type for generic operations that could result in XdfError::External
pub type GenericError = Box<dyn error::Error + Send + Sync>;

/// xdflow error
#[derive(Debug)]
pub enum XdfError {
    /// One or more option keys do not exist in the option set. The
    /// message names every unrecognized key, not just the first.
    InvalidOption(String),
    /// An option in the change set is read-only. Raised before any
    /// option is mutated.
    ReadOnlyOption(String),
    /// A feature toggle requires a capability the installed external
    /// engine does not have (usually a newer engine version).
    UnsupportedFeature(String),
    /// Join key reconciliation found no shared column between the two
    /// inputs and no keys were given explicitly.
    NoCommonKeys(String),
    /// Error reported by the external engine while merging, e.g. a
    /// schema or type mismatch it cannot coerce.
    Merge(String),
    /// The filesystem/compute-context combination of the inputs is not
    /// a supported pairing.
    UnsupportedTopology(String),
    /// Deleting the backing storage of a pipeline intermediate failed.
    /// Warning severity: a leaked temporary never aborts a pipeline.
    DeleteFailed(String),
    /// Error associated to I/O operations and associated traits.
    IoError(io::Error),
    /// Error returned on a branch that we know is possible but to which
    /// we still have no implementation for.
    NotImplemented(String),
    /// Error raised when one of xdflow's internal invariants does not
    /// hold. This error should not happen in normal usage.
    Internal(String),
    /// Errors originating from outside xdflow's codebase, e.g. an
    /// engine binding's own error type.
    External(GenericError),
}

impl From<io::Error> for XdfError {
    fn from(e: io::Error) -> Self {
        XdfError::IoError(e)
    }
}

impl From<GenericError> for XdfError {
    fn from(err: GenericError) -> Self {
        XdfError::External(err)
    }
}

impl Display for XdfError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            XdfError::InvalidOption(ref desc) => {
                write!(f, "Invalid option: {desc}")
            }
            XdfError::ReadOnlyOption(ref desc) => {
                write!(f, "Read-only option: {desc}")
            }
            XdfError::UnsupportedFeature(ref desc) => {
                write!(f, "Unsupported feature: {desc}")
            }
            XdfError::NoCommonKeys(ref desc) => {
                write!(f, "No common join keys: {desc}")
            }
            XdfError::Merge(ref desc) => write!(f, "Merge error: {desc}"),
            XdfError::UnsupportedTopology(ref desc) => {
                write!(f, "Unsupported topology: {desc}")
            }
            XdfError::DeleteFailed(ref desc) => {
                write!(f, "Delete failed: {desc}")
            }
            XdfError::IoError(ref desc) => write!(f, "IO error: {desc}"),
            XdfError::NotImplemented(ref desc) => {
                write!(f, "This feature is not implemented: {desc}")
            }
            XdfError::Internal(ref desc) => {
                write!(
                    f,
                    "Internal error: {desc}. This was likely caused by a bug in \
                     xdflow's code and we would welcome that you file a bug report \
                     in our issue tracker"
                )
            }
            XdfError::External(ref desc) => write!(f, "External error: {desc}"),
        }
    }
}

impl error::Error for XdfError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            XdfError::IoError(e) => Some(e),
            XdfError::External(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Construct an [`XdfError::Internal`] wrapped in an `Err`, with a
/// `format!` style message
#[macro_export]
macro_rules! internal_err {
    ($($arg:tt)*) => {
        Err($crate::error::XdfError::Internal(format!($($arg)*)))
    };
}

/// Construct an [`XdfError::Merge`] wrapped in an `Err`
#[macro_export]
macro_rules! merge_err {
    ($($arg:tt)*) => {
        Err($crate::error::XdfError::Merge(format!($($arg)*)))
    };
}

/// Construct an [`XdfError::UnsupportedTopology`] wrapped in an `Err`
#[macro_export]
macro_rules! topology_err {
    ($($arg:tt)*) => {
        Err($crate::error::XdfError::UnsupportedTopology(format!($($arg)*)))
    };
}

/// Construct an [`XdfError::UnsupportedFeature`] wrapped in an `Err`
#[macro_export]
macro_rules! feature_err {
    ($($arg:tt)*) => {
        Err($crate::error::XdfError::UnsupportedFeature(format!($($arg)*)))
    };
}

/// Construct an [`XdfError::NotImplemented`] wrapped in an `Err`
#[macro_export]
macro_rules! not_impl_err {
    ($($arg:tt)*) => {
        Err($crate::error::XdfError::NotImplemented(format!($($arg)*)))
    };
}
