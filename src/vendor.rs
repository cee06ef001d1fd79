// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Vendor tree navigation
//!
//! The vendor store keeps one entry per software flavor under the key
//! `vendor/platform/software-version/software-flavor`, each segment
//! percent-encoded with no safe characters. This module converts between that
//! flat layout and the nested [`VendorTree`], and resolves partial branch
//! selectors.

use crate::error::{CatalogError, Result};
use crate::types::{
    Implementation, ModuleKey, Platform, Platforms, SoftwareFlavor, SoftwareFlavors,
    SoftwareVersion, SoftwareVersions, Vendor, VendorBranch, VendorTree,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Join percent-encoded segments with `/`
#[must_use]
pub fn branch_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Decoded segments of a full vendor key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorPath {
    /// Vendor name
    pub vendor: String,
    /// Platform name
    pub platform: String,
    /// Software version
    pub software_version: String,
    /// Software flavor
    pub software_flavor: String,
}

impl VendorPath {
    /// Decode a `vendor/platform/version/flavor` key
    pub fn parse(key: &str) -> Result<Self> {
        let segments = key
            .split('/')
            .map(|s| {
                urlencoding::decode(s)
                    .map(std::borrow::Cow::into_owned)
                    .map_err(|_| CatalogError::InvalidVendorKey(key.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let [vendor, platform, software_version, software_flavor]: [String; 4] = segments
            .try_into()
            .map_err(|_| CatalogError::InvalidVendorKey(key.to_string()))?;
        Ok(Self {
            vendor,
            platform,
            software_version,
            software_flavor,
        })
    }

    /// Encoded store key
    #[must_use]
    pub fn key(&self) -> String {
        branch_key(&[
            &self.vendor,
            &self.platform,
            &self.software_version,
            &self.software_flavor,
        ])
    }

    /// Single-path tree holding `branch` at this leaf
    #[must_use]
    pub fn to_tree(&self, branch: VendorBranch) -> VendorTree {
        let flavor = SoftwareFlavor {
            name: self.software_flavor.clone(),
            protocols: branch.protocols,
            modules: branch.modules,
        };
        let version = SoftwareVersion {
            name: self.software_version.clone(),
            software_flavors: SoftwareFlavors {
                software_flavor: vec![flavor],
            },
        };
        let platform = Platform {
            name: self.platform.clone(),
            software_versions: SoftwareVersions {
                software_version: vec![version],
            },
        };
        VendorTree {
            vendors: vec![Vendor {
                name: self.vendor.clone(),
                platforms: Platforms {
                    platform: vec![platform],
                },
            }],
        }
    }
}

/// Flatten a nested tree into per-leaf branch data keyed by vendor key
///
/// Module stubs are de-duplicated within a leaf; the first protocols seen for
/// a leaf win.
#[must_use]
pub fn flatten_tree(tree: &VendorTree) -> BTreeMap<String, VendorBranch> {
    let mut leaves: BTreeMap<String, VendorBranch> = BTreeMap::new();
    for vendor in &tree.vendors {
        for platform in &vendor.platforms.platform {
            for version in &platform.software_versions.software_version {
                for flavor in &version.software_flavors.software_flavor {
                    let key = branch_key(&[&vendor.name, &platform.name, &version.name, &flavor.name]);
                    let leaf = leaves.entry(key).or_insert_with(|| VendorBranch {
                        protocols: flavor.protocols.clone(),
                        modules: None,
                    });
                    if let Some(modules) = &flavor.modules {
                        let target = leaf.modules.get_or_insert_with(Default::default);
                        for stub in &modules.module {
                            if !target.module.contains(stub) {
                                target.module.push(stub.clone());
                            }
                        }
                    }
                }
            }
        }
    }
    leaves
}

/// Every module key reachable under `tree`, depth first
///
/// Protocol subtrees carry no modules and are not visited.
#[must_use]
pub fn collect_module_keys(tree: &VendorTree) -> BTreeSet<ModuleKey> {
    let mut keys = BTreeSet::new();
    for vendor in &tree.vendors {
        for platform in &vendor.platforms.platform {
            for version in &platform.software_versions.software_version {
                for flavor in &version.software_flavors.software_flavor {
                    if let Some(modules) = &flavor.modules {
                        keys.extend(modules.module.iter().map(crate::types::ModuleStub::key));
                    }
                }
            }
        }
    }
    keys
}

// =============================================================================
// Selector
// =============================================================================

/// Partial vendor branch: a vendor plus optional trailing components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VendorSelector {
    /// Vendor name (required)
    pub vendor: String,
    /// Platform
    #[serde(default)]
    pub platform: Option<String>,
    /// Software version
    #[serde(default)]
    pub software_version: Option<String>,
    /// Software flavor
    #[serde(default)]
    pub software_flavor: Option<String>,
}

impl VendorSelector {
    /// Selector for a whole vendor
    #[must_use]
    pub fn vendor(vendor: &str) -> Self {
        Self {
            vendor: vendor.into(),
            platform: None,
            software_version: None,
            software_flavor: None,
        }
    }

    /// Narrow to a platform
    #[must_use]
    pub fn platform(mut self, platform: &str) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Narrow to a software version
    #[must_use]
    pub fn software_version(mut self, version: &str) -> Self {
        self.software_version = Some(version.into());
        self
    }

    /// Narrow to a software flavor
    #[must_use]
    pub fn software_flavor(mut self, flavor: &str) -> Self {
        self.software_flavor = Some(flavor.into());
        self
    }

    /// Reject empty vendors and components set after an unset one
    pub fn validate(&self) -> Result<()> {
        if self.vendor.is_empty() {
            return Err(CatalogError::InvalidSelector("vendor is required".into()));
        }
        let components = [
            ("platform", &self.platform),
            ("software-version", &self.software_version),
            ("software-flavor", &self.software_flavor),
        ];
        let mut gap: Option<&str> = None;
        for (label, value) in components {
            match (value, gap) {
                (None, None) => gap = Some(label),
                (Some(_), Some(missing)) => {
                    return Err(CatalogError::InvalidSelector(format!(
                        "{label} is set but {missing} is not"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn components(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.vendor.as_str()).chain(
            [&self.platform, &self.software_version, &self.software_flavor]
                .into_iter()
                .map_while(|c| c.as_deref()),
        )
    }

    /// Encoded key prefix of the selected branch
    #[must_use]
    pub fn branch_key(&self) -> String {
        branch_key(&self.components().collect::<Vec<_>>())
    }

    /// Whether an implementation lies under this branch; unset components match all
    #[must_use]
    pub fn matches(&self, implementation: &Implementation) -> bool {
        fn component(selector: Option<&String>, value: &str) -> bool {
            selector.map_or(true, |s| s == value)
        }
        self.vendor == implementation.vendor
            && component(self.platform.as_ref(), &implementation.platform)
            && component(self.software_version.as_ref(), &implementation.software_version)
            && component(self.software_flavor.as_ref(), &implementation.software_flavor)
    }
}
