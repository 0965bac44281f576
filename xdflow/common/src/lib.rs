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

//! Common error, configuration and data types shared by the xdflow
//! crates.

mod join_type;
mod location;

pub mod config;
pub mod error;
pub mod record_set;
pub mod scalar;

pub use error::{GenericError, Result, XdfError};
pub use join_type::JoinType;
pub use location::{DataLocation, StorageKind};
pub use record_set::RecordSet;
pub use scalar::ScalarValue;
