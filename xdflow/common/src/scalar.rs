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

//! [`ScalarValue`]: a single value of one of the types the engine can
//! hand back in an in-memory record set.

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A single scalar value
///
/// The engine's column types are richer than this; only the types that
/// cross the in-memory result boundary are represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// A missing value
    Null,
    /// A boolean value
    Boolean(bool),
    /// A 64-bit integer
    Int64(i64),
    /// A 64-bit float
    Float64(f64),
    /// A UTF-8 string
    Utf8(String),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

impl Eq for ScalarValue {}

// Hash floats by bit pattern so key columns containing floats can still
// participate in hashed join-key comparison.
impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ScalarValue::Null => 0u8.hash(state),
            ScalarValue::Boolean(v) => v.hash(state),
            ScalarValue::Int64(v) => v.hash(state),
            ScalarValue::Float64(v) => v.to_bits().hash(state),
            ScalarValue::Utf8(v) => v.hash(state),
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v}"),
            ScalarValue::Utf8(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}
