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

//! [`RecordSet`]: an in-memory result handed back by the engine when a
//! caller asks for a collected output instead of an on-disk artifact.

use crate::error::Result;
use crate::internal_err;
use crate::scalar::ScalarValue;

/// A small row-major table
///
/// This is the return shape of operations that collect their result into
/// memory rather than writing an artifact. It is intentionally minimal:
/// anything large stays on disk in the engine's own format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<ScalarValue>>,
}

impl RecordSet {
    /// An empty record set with the given column names
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: vec![],
        }
    }

    /// Append a row. Fails if the row arity does not match the columns.
    pub fn push_row(&mut self, row: Vec<ScalarValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return internal_err!(
                "row arity {} does not match {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Index of a named column, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn rows(&self) -> &[Vec<ScalarValue>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_row_checks_arity() {
        let mut rs = RecordSet::new(vec!["k".to_string(), "v".to_string()]);
        rs.push_row(vec![ScalarValue::Int64(1), ScalarValue::from("a")])
            .unwrap();
        assert!(rs.push_row(vec![ScalarValue::Int64(2)]).is_err());
        assert_eq!(rs.num_rows(), 1);
        assert_eq!(rs.column_index("v"), Some(1));
        assert_eq!(rs.column_index("w"), None);
    }
}
