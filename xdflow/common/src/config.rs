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

//! Process-wide configuration, via [`XdfOptions`]

use std::collections::{HashMap, HashSet};
use std::fmt::Display;

use log::debug;

use crate::error::{Result, XdfError};

/// Minimum external engine version able to run group-wise processing in
/// parallel. Older engines fall back to sequential group processing and
/// reject the toggle.
pub const MIN_GROUP_PARALLEL_ENGINE_VERSION: &str = "9.1.0";

/// Keys that can never be the target of a user-initiated set. The engine
/// version is derived from the installed engine; the readiness flag is
/// bookkeeping owned by the runtime environment.
pub const READ_ONLY_OPTION_KEYS: &[&str] =
    &["xdflow.engine.version", "xdflow.remote.work_dir_ready"];

const REMOTE_WORK_DIR_KEY: &str = "xdflow.remote.work_dir";
const GROUP_PARALLEL_KEY: &str = "xdflow.execution.group_parallel";

/// A macro that wraps a configuration struct and automatically derives
/// [`Default`] and [`ConfigField`] for it, allowing it to be used
/// in the [`XdfOptions`] configuration tree
macro_rules! config_namespace {
    (
     $(#[doc = $struct_d:tt])*
     $vis:vis struct $struct_name:ident {
        $(
        $(#[doc = $d:tt])*
        $field_vis:vis $field_name:ident : $field_type:ty, default = $default:expr
        )*$(,)*
    }
    ) => {

        $(#[doc = $struct_d])*
        #[derive(Debug, Clone, PartialEq)]
        #[non_exhaustive]
        $vis struct $struct_name{
            $(
            $(#[doc = $d])*
            $field_vis $field_name : $field_type,
            )*
        }

        impl ConfigField for $struct_name {
            fn set(&mut self, key: &str, value: &str) -> Result<()> {
                let (key, rem) = key.split_once('.').unwrap_or((key, ""));
                match key {
                    $(
                       stringify!($field_name) => self.$field_name.set(rem, value),
                    )*
                    _ => Err(XdfError::InvalidOption(format!(
                        "config value \"{}\" not found on {}", key, stringify!($struct_name)
                    )))
                }
            }

            fn visit<V: Visit>(&self, v: &mut V, key_prefix: &str, _description: &'static str) {
                $(
                let key = format!(concat!("{}.", stringify!($field_name)), key_prefix);
                let desc = concat!($($d),*).trim();
                self.$field_name.visit(v, key.as_str(), desc);
                )*
            }
        }

        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field_name: $default),*
                }
            }
        }
    }
}

config_namespace! {
    /// Options governing intermediates on the local filesystem
    pub struct StorageOptions {
        /// Directory in which pipeline intermediates are created on the
        /// local filesystem. When unset, the operating system temporary
        /// directory is used
        pub local_work_dir: Option<String>, default = None
    }
}

config_namespace! {
    /// Options governing the distributed filesystem
    pub struct RemoteOptions {
        /// Work directory for pipeline intermediates on the distributed
        /// filesystem. Setting it resets `work_dir_ready`, since the new
        /// directory has not been materialized yet
        pub work_dir: String, default = "/tmp/xdflow".to_string()

        /// Hostname of the distributed filesystem namenode
        pub host: String, default = "localhost".to_string()

        /// Whether the remote work directory has been created. One-time
        /// setup bookkeeping owned by the runtime environment; read-only
        pub work_dir_ready: bool, default = false
    }
}

config_namespace! {
    /// Options governing how operations are handed to the engine
    pub struct ExecutionOptions {
        /// When set to true, group-wise processing is delegated to the
        /// engine's parallel mode. Requires engine version 9.1.0 or newer
        pub group_parallel: bool, default = false
    }
}

config_namespace! {
    /// Read-only facts about the installed external engine
    pub struct EngineOptions {
        /// Version of the installed external engine, captured when a
        /// runtime environment is built; read-only
        pub version: String, default = String::new()
    }
}

/// A field within the configuration tree that knows how to parse itself
/// from a string and report itself to a [`Visit`]or
pub trait ConfigField {
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str);
}

impl ConfigField for String {
    fn set(&mut self, _: &str, value: &str) -> Result<()> {
        *self = value.to_string();
        Ok(())
    }

    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self, description)
    }
}

impl ConfigField for bool {
    fn set(&mut self, _: &str, value: &str) -> Result<()> {
        *self = value.parse().map_err(|_| {
            XdfError::InvalidOption(format!("could not parse \"{value}\" as bool"))
        })?;
        Ok(())
    }

    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        v.some(key, self, description)
    }
}

impl<F: ConfigField + Default> ConfigField for Option<F> {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.get_or_insert_with(Default::default).set(key, value)
    }

    fn visit<V: Visit>(&self, v: &mut V, key: &str, description: &'static str) {
        match self {
            Some(s) => s.visit(v, key, description),
            None => v.none(key, description),
        }
    }
}

/// An implementation trait used to recursively walk the configuration tree
pub trait Visit {
    fn some<V: Display>(&mut self, key: &str, value: V, description: &'static str);

    fn none(&mut self, key: &str, description: &'static str);
}

/// A key value pair, with a corresponding description
#[derive(Debug)]
pub struct ConfigEntry {
    /// A unique string to identify this config value
    pub key: String,

    /// The value if any
    pub value: Option<String>,

    /// A description of this configuration entry
    pub description: &'static str,
}

/// Process-wide option store
///
/// Holds every option the translation layer consults: work directories per
/// filesystem, the namenode host, feature toggles, and read-only facts
/// derived from the installed engine. A `clone` is a full snapshot;
/// [`XdfOptions::apply`] returns the pre-change snapshot so callers can
/// restore it later.
#[derive(Debug, Clone, Default, PartialEq)]
#[non_exhaustive]
pub struct XdfOptions {
    /// Local filesystem options
    pub storage: StorageOptions,
    /// Distributed filesystem options
    pub remote: RemoteOptions,
    /// Execution options
    pub execution: ExecutionOptions,
    /// Engine facts (read-only)
    pub engine: EngineOptions,
}

impl ConfigField for XdfOptions {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (key, rem) = key.split_once('.').unwrap_or((key, ""));
        match key {
            "storage" => self.storage.set(rem, value),
            "remote" => self.remote.set(rem, value),
            "execution" => self.execution.set(rem, value),
            "engine" => self.engine.set(rem, value),
            _ => Err(XdfError::InvalidOption(format!(
                "config value \"{key}\" not found on XdfOptions"
            ))),
        }
    }

    fn visit<V: Visit>(&self, v: &mut V, _key_prefix: &str, _description: &'static str) {
        self.storage.visit(v, "xdflow.storage", "");
        self.remote.visit(v, "xdflow.remote", "");
        self.execution.visit(v, "xdflow.execution", "");
        self.engine.visit(v, "xdflow.engine", "");
    }
}

impl XdfOptions {
    /// Creates a new [`XdfOptions`] with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single configuration option
    ///
    /// Read-only keys are rejected before any mutation. Setting the remote
    /// work directory resets the readiness flag, since the new directory
    /// has not been materialized yet.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if READ_ONLY_OPTION_KEYS.contains(&key) {
            return Err(XdfError::ReadOnlyOption(key.to_string()));
        }
        let rem = key.strip_prefix("xdflow.").ok_or_else(|| {
            XdfError::InvalidOption(format!(
                "could not find config namespace for key \"{key}\""
            ))
        })?;
        if key == GROUP_PARALLEL_KEY && value == "true" {
            self.check_group_parallel_supported()?;
        }
        ConfigField::set(self, rem, value)?;
        if key == REMOTE_WORK_DIR_KEY {
            debug!("remote work dir set to {value:?}, resetting readiness flag");
            self.remote.work_dir_ready = false;
        }
        Ok(())
    }

    /// Apply a set of changes all-or-nothing
    ///
    /// Every key is validated before any option is mutated: unknown keys
    /// fail with [`XdfError::InvalidOption`] naming all of them at once,
    /// and read-only keys fail with [`XdfError::ReadOnlyOption`]. Partial
    /// application never occurs. On success the pre-change snapshot is
    /// returned so the caller can restore it later.
    pub fn apply(&mut self, changes: &HashMap<String, String>) -> Result<XdfOptions> {
        let known: HashSet<String> =
            self.entries().into_iter().map(|e| e.key).collect();

        let mut keys: Vec<&String> = changes.keys().collect();
        keys.sort();

        let unknown: Vec<&str> = keys
            .iter()
            .filter(|k| !known.contains(k.as_str()))
            .map(|k| k.as_str())
            .collect();
        if !unknown.is_empty() {
            return Err(XdfError::InvalidOption(unknown.join(", ")));
        }

        let read_only: Vec<&str> = keys
            .iter()
            .filter(|k| READ_ONLY_OPTION_KEYS.contains(&k.as_str()))
            .map(|k| k.as_str())
            .collect();
        if !read_only.is_empty() {
            return Err(XdfError::ReadOnlyOption(read_only.join(", ")));
        }

        let snapshot = self.clone();
        let mut scratch = self.clone();
        for key in keys {
            scratch.set(key, &changes[key])?;
        }
        *self = scratch;
        Ok(snapshot)
    }

    /// Create new XdfOptions struct, taking values from environment
    /// variables where possible
    ///
    /// For example, setting `XDFLOW_REMOTE_WORK_DIR` will control
    /// `xdflow.remote.work_dir`. Read-only keys are never read from the
    /// environment.
    pub fn from_env() -> Result<Self> {
        struct Visitor(Vec<String>);

        impl Visit for Visitor {
            fn some<V: Display>(&mut self, key: &str, _: V, _: &'static str) {
                self.0.push(key.to_string())
            }

            fn none(&mut self, key: &str, _: &'static str) {
                self.0.push(key.to_string())
            }
        }

        let mut keys = Visitor(vec![]);
        let mut ret = Self::default();
        ret.visit(&mut keys, "xdflow", "");

        for key in keys.0 {
            if READ_ONLY_OPTION_KEYS.contains(&key.as_str()) {
                continue;
            }
            let env = key.to_uppercase().replace('.', "_");
            if let Some(var) = std::env::var_os(env) {
                ret.set(&key, var.to_string_lossy().as_ref())?;
            }
        }

        Ok(ret)
    }

    /// Returns the [`ConfigEntry`] stored within this [`XdfOptions`]
    pub fn entries(&self) -> Vec<ConfigEntry> {
        struct Visitor(Vec<ConfigEntry>);

        impl Visit for Visitor {
            fn some<V: Display>(
                &mut self,
                key: &str,
                value: V,
                description: &'static str,
            ) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: Some(value.to_string()),
                    description,
                })
            }

            fn none(&mut self, key: &str, description: &'static str) {
                self.0.push(ConfigEntry {
                    key: key.to_string(),
                    value: None,
                    description,
                })
            }
        }

        let mut v = Visitor(vec![]);
        self.visit(&mut v, "xdflow", "");
        v.0
    }

    /// Record the installed engine version. Not part of the user-facing
    /// set path; called when a runtime environment is built.
    pub fn set_engine_version(&mut self, version: &semver::Version) {
        self.engine.version = version.to_string();
    }

    /// Record that the remote work directory has been materialized. Not
    /// part of the user-facing set path.
    pub fn mark_remote_work_dir_ready(&mut self) {
        self.remote.work_dir_ready = true;
    }

    fn check_group_parallel_supported(&self) -> Result<()> {
        let min = semver::Version::parse(MIN_GROUP_PARALLEL_ENGINE_VERSION)
            .expect("minimum version constant is valid semver");
        let installed = semver::Version::parse(&self.engine.version).map_err(|_| {
            XdfError::UnsupportedFeature(format!(
                "group-parallel execution requires engine version \
                 {MIN_GROUP_PARALLEL_ENGINE_VERSION} or newer, and the installed \
                 version is unknown"
            ))
        })?;
        if installed < min {
            return Err(XdfError::UnsupportedFeature(format!(
                "group-parallel execution requires engine version \
                 {MIN_GROUP_PARALLEL_ENGINE_VERSION} or newer, found {installed}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = XdfOptions::new();
        assert_eq!(options.remote.work_dir, "/tmp/xdflow");
        assert_eq!(options.remote.host, "localhost");
        assert!(!options.remote.work_dir_ready);
        assert!(!options.execution.group_parallel);
        assert_eq!(options.storage.local_work_dir, None);
        assert_eq!(options.engine.version, "");
    }

    #[test]
    fn entries_cover_every_key() {
        let keys: Vec<String> = XdfOptions::new()
            .entries()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert!(keys.contains(&"xdflow.storage.local_work_dir".to_string()));
        assert!(keys.contains(&"xdflow.remote.work_dir".to_string()));
        assert!(keys.contains(&"xdflow.remote.host".to_string()));
        assert!(keys.contains(&"xdflow.remote.work_dir_ready".to_string()));
        assert!(keys.contains(&"xdflow.execution.group_parallel".to_string()));
        assert!(keys.contains(&"xdflow.engine.version".to_string()));
    }

    #[test]
    fn set_unknown_key_fails() {
        let mut options = XdfOptions::new();
        let err = options.set("xdflow.bogus.key", "1").unwrap_err();
        assert!(matches!(err, XdfError::InvalidOption(_)));
        let err = options.set("nonsense", "1").unwrap_err();
        assert!(matches!(err, XdfError::InvalidOption(_)));
    }

    #[test]
    fn set_read_only_key_fails() {
        let mut options = XdfOptions::new();
        let err = options.set("xdflow.engine.version", "10.0.0").unwrap_err();
        assert!(matches!(err, XdfError::ReadOnlyOption(_)));
        assert_eq!(options.engine.version, "");
    }

    #[test]
    fn apply_names_all_unknown_keys() {
        let mut options = XdfOptions::new();
        let before = options.clone();
        let changes = HashMap::from([
            ("bogusKey".to_string(), "1".to_string()),
            ("xdflow.remote.host".to_string(), "nn1".to_string()),
            ("xdflow.zzz".to_string(), "2".to_string()),
        ]);
        let err = options.apply(&changes).unwrap_err();
        match err {
            XdfError::InvalidOption(msg) => {
                assert_eq!(msg, "bogusKey, xdflow.zzz");
            }
            other => panic!("expected InvalidOption, got {other:?}"),
        }
        // nothing was applied, including the valid entry
        assert_eq!(options, before);
    }

    #[test]
    fn apply_rejects_read_only_before_mutating() {
        let mut options = XdfOptions::new();
        let before = options.clone();
        let changes = HashMap::from([
            ("xdflow.engine.version".to_string(), "99.0.0".to_string()),
            ("xdflow.remote.host".to_string(), "nn1".to_string()),
        ]);
        let err = options.apply(&changes).unwrap_err();
        assert!(matches!(err, XdfError::ReadOnlyOption(_)));
        assert_eq!(options, before);
    }

    #[test]
    fn apply_returns_pre_change_snapshot() {
        let mut options = XdfOptions::new();
        options.mark_remote_work_dir_ready();
        let changes = HashMap::from([(
            "xdflow.remote.work_dir".to_string(),
            "/new/path".to_string(),
        )]);
        let snapshot = options.apply(&changes).unwrap();

        assert_eq!(options.remote.work_dir, "/new/path");
        // the new directory has not been created yet
        assert!(!options.remote.work_dir_ready);

        assert_eq!(snapshot.remote.work_dir, "/tmp/xdflow");
        assert!(snapshot.remote.work_dir_ready);
    }

    #[test]
    fn group_parallel_requires_engine_version() {
        let mut options = XdfOptions::new();
        let err = options
            .set("xdflow.execution.group_parallel", "true")
            .unwrap_err();
        assert!(matches!(err, XdfError::UnsupportedFeature(_)));

        options.set_engine_version(&semver::Version::new(9, 0, 1));
        let err = options
            .set("xdflow.execution.group_parallel", "true")
            .unwrap_err();
        assert!(matches!(err, XdfError::UnsupportedFeature(_)));
        assert!(!options.execution.group_parallel);

        options.set_engine_version(&semver::Version::new(9, 1, 0));
        options
            .set("xdflow.execution.group_parallel", "true")
            .unwrap();
        assert!(options.execution.group_parallel);

        // turning the feature off never needs the engine
        let mut options = XdfOptions::new();
        options
            .set("xdflow.execution.group_parallel", "false")
            .unwrap();
    }

    #[test]
    fn from_env() {
        let env_key = "XDFLOW_REMOTE_HOST";
        std::env::set_var(env_key, "namenode.example");
        let options = XdfOptions::from_env().unwrap();
        std::env::remove_var(env_key);
        assert_eq!(options.remote.host, "namenode.example");
    }
}
