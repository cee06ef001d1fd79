// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deep merge of module records and vendor trees
//!
//! Module merge applies a per-field policy: scalars are overwritten unless the
//! incoming value is absent or a placeholder, reference lists are merged by
//! `name`, and implementations by their vendor 4-tuple. Vendor trees merge by
//! `name` at every level down to the module stubs, which merge by module key.
//! Both merges are idempotent: merging the same input twice changes nothing.

use crate::types::{
    Implementation, Module, ModuleStub, ModuleStubs, Platform, Reference, SoftwareFlavor,
    SoftwareVersion, Vendor, VendorBranch, VendorTree,
};
use serde_json::Value;

/// Scalar values that never replace a real prior value
const PLACEHOLDERS: &[(&str, &str)] = &[("compilation-status", "unknown")];

/// Merge `new` into `existing`, returning the merged record
///
/// The identity triple of `existing` is kept; it is only filled in from `new`
/// where it is empty (overlay records may omit it).
#[must_use]
pub fn merge_module(mut existing: Module, new: &Module) -> Module {
    fill_identity(&mut existing.name, &new.name);
    fill_identity(&mut existing.revision, &new.revision);
    fill_identity(&mut existing.organization, &new.organization);

    merge_optional(&mut existing.namespace, new.namespace.as_ref());
    merge_optional(&mut existing.description, new.description.as_ref());

    merge_references(&mut existing.dependencies, &new.dependencies);
    merge_references(&mut existing.dependents, &new.dependents);
    merge_references(&mut existing.submodule, &new.submodule);

    if let Some(new_impls) = &new.implementations {
        let target = existing.implementations.get_or_insert_with(Default::default);
        merge_implementations(&mut target.implementation, &new_impls.implementation);
    }

    for (key, new_value) in &new.metadata {
        let current = existing.metadata.get(key);
        if should_overwrite(key, current, new_value) {
            existing.metadata.insert(key.clone(), new_value.clone());
        }
    }

    existing
}

fn fill_identity(existing: &mut String, new: &str) {
    if existing.is_empty() && !new.is_empty() {
        *existing = new.to_string();
    }
}

fn merge_optional(existing: &mut Option<String>, new: Option<&String>) {
    if let Some(new) = new {
        if existing.as_ref() != Some(new) {
            *existing = Some(new.clone());
        }
    }
}

/// Scalar overwrite policy for a metadata field
fn should_overwrite(key: &str, existing: Option<&Value>, new: &Value) -> bool {
    if new.is_null() {
        return false;
    }
    let Some(existing) = existing else {
        return true;
    };
    if is_falsy(existing) {
        return true;
    }
    if existing == new {
        return false;
    }
    !is_placeholder(key, new)
}

fn is_placeholder(key: &str, value: &Value) -> bool {
    PLACEHOLDERS
        .iter()
        .any(|(k, v)| *k == key && value.as_str() == Some(*v))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Merge reference lists by `name`: matching entries are replaced in place,
/// new names are appended
pub fn merge_references(existing: &mut Vec<Reference>, new: &[Reference]) {
    merge_keyed(existing, new, |r| r.name.clone());
}

/// Merge implementation lists by their `,`-joined 4-tuple
pub fn merge_implementations(existing: &mut Vec<Implementation>, new: &[Implementation]) {
    merge_keyed(existing, new, Implementation::identity_key);
}

fn merge_keyed<T: Clone, K: PartialEq>(existing: &mut Vec<T>, new: &[T], key: impl Fn(&T) -> K) {
    for item in new {
        let id = key(item);
        match existing.iter().position(|e| key(e) == id) {
            Some(index) => existing[index] = item.clone(),
            None => existing.push(item.clone()),
        }
    }
}

// =============================================================================
// Vendor Tree Merge
// =============================================================================

/// A vendor tree level that merges by `name`
trait TreeNode: Clone {
    fn name(&self) -> &str;
    fn absorb(&mut self, other: &Self);
}

fn merge_named<T: TreeNode>(existing: &mut Vec<T>, new: &[T]) {
    for item in new {
        match existing.iter_mut().find(|e| e.name() == item.name()) {
            Some(node) => node.absorb(item),
            None => existing.push(item.clone()),
        }
    }
}

/// Merge module stubs by `name@revision/organization`, replacing on match
pub fn merge_module_stubs(existing: &mut Vec<ModuleStub>, new: &[ModuleStub]) {
    merge_keyed(existing, new, ModuleStub::key);
}

fn merge_leaf(
    protocols: &mut Option<Value>,
    modules: &mut Option<ModuleStubs>,
    new_protocols: Option<&Value>,
    new_modules: Option<&ModuleStubs>,
) {
    if let Some(p) = new_protocols {
        *protocols = Some(p.clone());
    }
    if let Some(m) = new_modules {
        let target = modules.get_or_insert_with(Default::default);
        merge_module_stubs(&mut target.module, &m.module);
    }
}

impl TreeNode for SoftwareFlavor {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, other: &Self) {
        merge_leaf(
            &mut self.protocols,
            &mut self.modules,
            other.protocols.as_ref(),
            other.modules.as_ref(),
        );
    }
}

impl TreeNode for SoftwareVersion {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, other: &Self) {
        merge_named(
            &mut self.software_flavors.software_flavor,
            &other.software_flavors.software_flavor,
        );
    }
}

impl TreeNode for Platform {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, other: &Self) {
        merge_named(
            &mut self.software_versions.software_version,
            &other.software_versions.software_version,
        );
    }
}

impl TreeNode for Vendor {
    fn name(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, other: &Self) {
        merge_named(&mut self.platforms.platform, &other.platforms.platform);
    }
}

/// Merge `new` into `existing` vendor tree
pub fn merge_vendor_tree(existing: &mut VendorTree, new: &VendorTree) {
    merge_named(&mut existing.vendors, &new.vendors);
}

/// Merge the data of one vendor leaf into what is already stored there
pub fn merge_vendor_branch(existing: &mut VendorBranch, new: &VendorBranch) {
    merge_leaf(
        &mut existing.protocols,
        &mut existing.modules,
        new.protocols.as_ref(),
        new.modules.as_ref(),
    );
}
