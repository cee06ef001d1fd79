// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! yangcat library - storage core of a YANG module catalog
//!
//! This crate keeps YANG module records and vendor implementation trees in a
//! key-value store, merges incoming metadata into them, and deletes modules or
//! vendor branches without breaking the dependency references between modules.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod commands;
pub mod config;
pub mod deletion;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod merge;
pub mod notify;
pub mod store;
pub mod vendor;

pub use error::{CatalogError, Result};

/// Core data types for module records and vendor trees
pub mod types {
    use crate::error::CatalogError;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;

    // =========================================================================
    // Module Identity
    // =========================================================================

    /// Identity of a module record: `name@revision/organization`
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ModuleKey {
        /// Module name
        pub name: String,
        /// Revision date (YYYY-MM-DD)
        pub revision: String,
        /// Owning organization
        pub organization: String,
    }

    impl ModuleKey {
        /// Build a key from its three parts
        #[must_use]
        pub fn new(name: &str, revision: &str, organization: &str) -> Self {
            Self {
                name: name.into(),
                revision: revision.into(),
                organization: organization.into(),
            }
        }

        /// The `(name, revision)` pair that dependency references point at
        #[must_use]
        pub fn identity(&self) -> Identity {
            Identity {
                name: self.name.clone(),
                revision: Some(self.revision.clone()),
            }
        }
    }

    impl fmt::Display for ModuleKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}@{}/{}", self.name, self.revision, self.organization)
        }
    }

    impl FromStr for ModuleKey {
        type Err = CatalogError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let invalid = || CatalogError::InvalidKey(s.to_string());
            let (name, rest) = s.split_once('@').ok_or_else(invalid)?;
            let (revision, organization) = rest.split_once('/').ok_or_else(invalid)?;
            if name.is_empty() || revision.is_empty() || organization.is_empty() {
                return Err(invalid());
            }
            Ok(Self::new(name, revision, organization))
        }
    }

    /// A `(name, revision)` pair; references may omit the revision
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Identity {
        /// Module name
        pub name: String,
        /// Revision, if the reference carries one
        pub revision: Option<String>,
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Weak reference from one module to another (dependency, dependent, submodule)
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Reference {
        /// Referenced module name
        pub name: String,
        /// Referenced revision
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub revision: Option<String>,
        /// Schema location
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub schema: Option<String>,
    }

    impl Reference {
        /// Reference to a module name without revision or schema
        #[must_use]
        pub fn named(name: &str) -> Self {
            Self {
                name: name.into(),
                revision: None,
                schema: None,
            }
        }

        /// Reference pinned to a revision
        #[must_use]
        pub fn pinned(name: &str, revision: &str) -> Self {
            Self {
                name: name.into(),
                revision: Some(revision.into()),
                schema: None,
            }
        }
    }

    /// Kind of reference edge that can keep a module alive
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Relation {
        /// Listed in the referencer's `dependencies`
        Dependencies,
        /// Listed in the referencer's `submodule`
        Submodule,
    }

    impl fmt::Display for Relation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Dependencies => f.write_str("dependencies"),
                Self::Submodule => f.write_str("submodule"),
            }
        }
    }

    // =========================================================================
    // Implementations
    // =========================================================================

    /// One vendor deployment of a module
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub struct Implementation {
        /// Vendor name
        pub vendor: String,
        /// Platform name
        pub platform: String,
        /// Software version
        pub software_version: String,
        /// Software flavor
        pub software_flavor: String,
        /// Conformance metadata (conformance-type, feature, deviation, ...)
        #[serde(flatten)]
        pub conformance: BTreeMap<String, Value>,
    }

    impl Implementation {
        /// Build an implementation with no conformance metadata
        #[must_use]
        pub fn new(vendor: &str, platform: &str, software_version: &str, software_flavor: &str) -> Self {
            Self {
                vendor: vendor.into(),
                platform: platform.into(),
                software_version: software_version.into(),
                software_flavor: software_flavor.into(),
                conformance: BTreeMap::new(),
            }
        }

        /// Lookup identity: the raw 4-tuple joined with `,`
        #[must_use]
        pub fn identity_key(&self) -> String {
            format!(
                "{},{},{},{}",
                self.vendor, self.platform, self.software_version, self.software_flavor
            )
        }

        /// Storage path: the percent-encoded 4-tuple joined with `/`
        #[must_use]
        pub fn storage_path(&self) -> String {
            crate::vendor::branch_key(&[
                &self.vendor,
                &self.platform,
                &self.software_version,
                &self.software_flavor,
            ])
        }
    }

    /// Wrapper matching the `implementations.implementation` nesting
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Implementations {
        /// Implementation list
        #[serde(default)]
        pub implementation: Vec<Implementation>,
    }

    // =========================================================================
    // Module Record
    // =========================================================================

    /// A YANG module record as stored under its `name@revision/organization` key
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Module {
        /// Module name
        #[serde(default)]
        pub name: String,
        /// Revision date
        #[serde(default)]
        pub revision: String,
        /// Owning organization
        #[serde(default)]
        pub organization: String,
        /// XML namespace
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub namespace: Option<String>,
        /// Free-form description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        /// Modules this one imports
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub dependencies: Vec<Reference>,
        /// Modules importing this one
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub dependents: Vec<Reference>,
        /// Submodules included by this module
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub submodule: Vec<Reference>,
        /// Vendor implementations
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub implementations: Option<Implementations>,
        /// Remaining scalar metadata (compilation-status, maturity-level, ...)
        #[serde(flatten)]
        pub metadata: BTreeMap<String, Value>,
    }

    impl Module {
        /// Build a bare module record
        #[must_use]
        pub fn new(name: &str, revision: &str, organization: &str) -> Self {
            Self {
                name: name.into(),
                revision: revision.into(),
                organization: organization.into(),
                ..Self::default()
            }
        }

        /// Storage key of this record
        #[must_use]
        pub fn key(&self) -> ModuleKey {
            ModuleKey::new(&self.name, &self.revision, &self.organization)
        }

        /// Whether all three identity fields are present
        #[must_use]
        pub fn has_identity(&self) -> bool {
            !self.name.is_empty() && !self.revision.is_empty() && !self.organization.is_empty()
        }

        /// Implementation list, empty when the record has none
        #[must_use]
        pub fn implementation_list(&self) -> &[Implementation] {
            self.implementations
                .as_ref()
                .map_or(&[], |i| i.implementation.as_slice())
        }

        /// References of the given relation kind
        #[must_use]
        pub fn references(&self, relation: Relation) -> &[Reference] {
            match relation {
                Relation::Dependencies => &self.dependencies,
                Relation::Submodule => &self.submodule,
            }
        }
    }

    /// Payload shape used by population requests: `{"modules": {"module": [...]}}`
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ModulesPayload {
        /// Wrapped module list
        pub modules: ModuleList,
    }

    /// Inner `module` list of a [`ModulesPayload`]
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct ModuleList {
        /// Modules
        #[serde(default)]
        pub module: Vec<Module>,
    }

    // =========================================================================
    // Vendor Tree
    // =========================================================================

    /// Module stub listed under a software flavor
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ModuleStub {
        /// Module name
        pub name: String,
        /// Revision date
        pub revision: String,
        /// Owning organization
        pub organization: String,
        /// Any other per-leaf metadata
        #[serde(flatten)]
        pub extra: BTreeMap<String, Value>,
    }

    impl ModuleStub {
        /// Stub with only the identity triple
        #[must_use]
        pub fn new(name: &str, revision: &str, organization: &str) -> Self {
            Self {
                name: name.into(),
                revision: revision.into(),
                organization: organization.into(),
                extra: BTreeMap::new(),
            }
        }

        /// Key of the module this stub points at
        #[must_use]
        pub fn key(&self) -> ModuleKey {
            ModuleKey::new(&self.name, &self.revision, &self.organization)
        }
    }

    /// `modules.module` wrapper under a software flavor
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ModuleStubs {
        /// Module stubs
        #[serde(default)]
        pub module: Vec<ModuleStub>,
    }

    /// Data stored under one vendor key (`vendor/platform/version/flavor`)
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct VendorBranch {
        /// Protocol capabilities of the flavor
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub protocols: Option<Value>,
        /// Modules implemented by the flavor
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub modules: Option<ModuleStubs>,
    }

    /// Leaf of the vendor tree
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SoftwareFlavor {
        /// Flavor name
        pub name: String,
        /// Protocol capabilities
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub protocols: Option<Value>,
        /// Implemented modules
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub modules: Option<ModuleStubs>,
    }

    /// `software-flavors` wrapper
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SoftwareFlavors {
        /// Flavors
        #[serde(rename = "software-flavor", default)]
        pub software_flavor: Vec<SoftwareFlavor>,
    }

    /// Software version node
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SoftwareVersion {
        /// Version name
        pub name: String,
        /// Flavors of this version
        #[serde(rename = "software-flavors", default)]
        pub software_flavors: SoftwareFlavors,
    }

    /// `software-versions` wrapper
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct SoftwareVersions {
        /// Versions
        #[serde(rename = "software-version", default)]
        pub software_version: Vec<SoftwareVersion>,
    }

    /// Platform node
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Platform {
        /// Platform name
        pub name: String,
        /// Software versions running on the platform
        #[serde(rename = "software-versions", default)]
        pub software_versions: SoftwareVersions,
    }

    /// `platforms` wrapper
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Platforms {
        /// Platforms
        #[serde(default)]
        pub platform: Vec<Platform>,
    }

    /// Vendor node
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Vendor {
        /// Vendor name
        pub name: String,
        /// Platforms of the vendor
        #[serde(default)]
        pub platforms: Platforms,
    }

    /// Whole vendor tree, as in `{"yang-catalog:vendor": [...]}`
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct VendorTree {
        /// Vendors
        #[serde(rename = "yang-catalog:vendor", alias = "vendor", default)]
        pub vendors: Vec<Vendor>,
    }

    /// Wrapper accepted by vendor population: `{"vendors": {"vendor": [...]}}`
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct VendorsPayload {
        /// Vendors
        pub vendors: VendorList,
    }

    /// Inner `vendor` list of a [`VendorsPayload`]
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct VendorList {
        /// Vendors
        #[serde(default)]
        pub vendor: Vec<Vendor>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::catalog::Catalog;
    pub use crate::error::{CatalogError, Result};
    pub use crate::types::*;
}
