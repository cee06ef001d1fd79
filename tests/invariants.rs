// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the catalog deletion and merge engine
//!
//! These tests verify critical invariants:
//! 1. No dangling references - a batch never deletes a module a survivor needs
//! 2. Merge idempotence - applying the same payload twice changes nothing
//! 3. Vendor consistency - implementation lists and vendor keys agree after deletion

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use yangcat::catalog::{Catalog, CatalogSettings};
use yangcat::config::VendorDeletionPolicy;
use yangcat::deletion::{delete_modules, delete_vendor_branch, BatchState, BatchStatus};
use yangcat::merge::merge_module;
use yangcat::notify::{EventKind, RecordingSink};
use yangcat::types::{
    Implementation, Implementations, Module, ModuleKey, Reference, Relation, VendorTree,
};
use yangcat::vendor::VendorSelector;

// =============================================================================
// Test Helpers
// =============================================================================

fn module(name: &str, revision: &str, organization: &str) -> Module {
    Module::new(name, revision, organization)
}

fn store(catalog: &Catalog, modules: &[Module]) {
    for m in modules {
        catalog.set_module(m, &m.key()).unwrap();
    }
}

fn with_implementations(mut m: Module, implementations: &[Implementation]) -> Module {
    m.implementations = Some(Implementations {
        implementation: implementations.to_vec(),
    });
    m
}

fn stored(catalog: &Catalog, key: &ModuleKey) -> Option<Module> {
    catalog.get_module(key).unwrap()
}

// =============================================================================
// Module Deletion Invariants
// =============================================================================

#[test]
fn test_unreferenced_modules_are_all_deleted() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    let b = module("b", "2020-01-01", "ietf");
    store(&catalog, &[a.clone(), b.clone()]);

    let outcome = delete_modules(&catalog, &[a.key(), b.key()]);

    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!(outcome.state, BatchState::Success);
    assert_eq!(outcome.deleted.len(), 2);
    assert!(outcome.not_deleted.is_empty());
    assert!(stored(&catalog, &a.key()).is_none());
    assert!(stored(&catalog, &b.key()).is_none());
}

#[test]
fn test_referenced_module_is_kept_and_reported() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    let mut b = module("b", "2021-01-01", "ietf");
    b.dependencies = vec![Reference::pinned("a", "2020-01-01")];
    store(&catalog, &[a.clone(), b.clone()]);

    let outcome = delete_modules(&catalog, &[a.key()]);

    assert_eq!(outcome.status, BatchStatus::InProgress);
    assert_eq!(outcome.state, BatchState::Partial);
    assert!(outcome.deleted.is_empty());
    assert_eq!(outcome.not_deleted.len(), 1);
    assert_eq!(outcome.not_deleted[0].key, "a@2020-01-01/ietf");
    assert_eq!(outcome.not_deleted[0].referenced_by, "b@2021-01-01/ietf");
    assert_eq!(outcome.not_deleted[0].relation, Relation::Dependencies);
    assert_eq!(outcome.message(), "modules-not-deleted:a@2020-01-01/ietf");
    assert!(stored(&catalog, &a.key()).is_some());
}

#[test]
fn test_submodule_reference_blocks_deletion() {
    let catalog = Catalog::in_memory();
    let sub = module("sub", "2020-01-01", "ietf");
    let mut parent = module("parent", "2020-01-01", "ietf");
    parent.submodule = vec![Reference::pinned("sub", "2020-01-01")];
    store(&catalog, &[sub.clone(), parent]);

    let outcome = delete_modules(&catalog, &[sub.key()]);

    assert_eq!(outcome.not_deleted[0].relation, Relation::Submodule);
    assert!(stored(&catalog, &sub.key()).is_some());
}

#[test]
fn test_referencer_deleted_in_same_batch_unblocks() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    let mut b = module("b", "2021-01-01", "ietf");
    b.dependencies = vec![Reference::pinned("a", "2020-01-01")];
    store(&catalog, &[a.clone(), b.clone()]);

    let outcome = delete_modules(&catalog, &[a.key(), b.key()]);

    assert_eq!(outcome.status, BatchStatus::Success);
    assert!(stored(&catalog, &a.key()).is_none());
    assert!(stored(&catalog, &b.key()).is_none());
}

#[test]
fn test_mutual_references_deleted_together() {
    let catalog = Catalog::in_memory();
    let mut a = module("a", "2020-01-01", "ietf");
    let mut b = module("b", "2020-01-01", "ietf");
    a.dependencies = vec![Reference::pinned("b", "2020-01-01")];
    b.dependencies = vec![Reference::pinned("a", "2020-01-01")];
    store(&catalog, &[a.clone(), b.clone()]);

    let outcome = delete_modules(&catalog, &[a.key(), b.key()]);

    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!(outcome.deleted.len(), 2);
}

#[test]
fn test_no_survivor_references_a_deleted_module() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    let mut b = module("b", "2020-01-01", "ietf");
    b.dependencies = vec![Reference::pinned("a", "2020-01-01")];
    let mut c = module("c", "2020-01-01", "ietf");
    c.dependencies = vec![Reference::pinned("b", "2020-01-01")];
    let d = module("d", "2020-01-01", "ietf");
    store(&catalog, &[a.clone(), b.clone(), c.clone(), d.clone()]);

    // c keeps b alive, and b keeps a alive
    let outcome = delete_modules(&catalog, &[a.key(), b.key(), d.key()]);

    assert_eq!(outcome.deleted, vec![d.key().to_string()]);
    let snapshot = catalog.load_snapshot().unwrap();
    for survivor in snapshot.modules().values() {
        for reference in survivor.dependencies.iter().chain(&survivor.submodule) {
            let revision = reference.revision.as_deref().unwrap_or_default();
            assert!(
                snapshot
                    .modules()
                    .keys()
                    .any(|k| k.name == reference.name && k.revision == revision),
                "{} references missing {}",
                survivor.key(),
                reference.name
            );
        }
    }
}

#[test]
fn test_dependents_cascade_after_deletion() {
    let catalog = Catalog::in_memory();
    let mut x = module("x", "2020-01-01", "ietf");
    x.dependents = vec![Reference::named("y"), Reference::named("z")];
    let y = module("y", "2020-01-01", "ietf");
    store(&catalog, &[x.clone(), y.clone()]);

    let outcome = delete_modules(&catalog, &[y.key()]);

    assert_eq!(outcome.dependents_updated, vec![x.key().to_string()]);
    let x_after = stored(&catalog, &x.key()).unwrap();
    assert_eq!(x_after.dependents, vec![Reference::named("z")]);
}

#[test]
fn test_deletion_refreshes_modules_cache() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    let b = module("b", "2020-01-01", "ietf");
    store(&catalog, &[a.clone(), b.clone()]);
    catalog.reload_modules_cache().unwrap();

    delete_modules(&catalog, &[a.key()]);

    let cache = catalog.get_all_modules().unwrap();
    assert!(!cache.contains_key(&a.key().to_string()));
    assert!(cache.contains_key(&b.key().to_string()));
}

#[test]
fn test_unreadable_corpus_fails_without_writes() {
    let catalog = Catalog::in_memory();
    let a = module("a", "2020-01-01", "ietf");
    store(&catalog, &[a.clone()]);
    catalog
        .modules_store()
        .set("broken@2020-01-01/ietf", &json!("not a module"))
        .unwrap();

    let outcome = delete_modules(&catalog, &[a.key()]);

    assert_eq!(outcome.status, BatchStatus::Fail);
    assert_eq!(outcome.state, BatchState::Fail);
    assert!(outcome.reason.is_some());
    assert!(stored(&catalog, &a.key()).is_some());
}

#[test]
fn test_deletion_notifies_sink() {
    let sink = Arc::new(RecordingSink::new());
    let catalog = Catalog::in_memory().with_sink(sink.clone());
    let a = module("a", "2020-01-01", "ietf");
    store(&catalog, &[a.clone()]);

    delete_modules(&catalog, &[a.key()]);

    let kinds = sink.kinds();
    assert!(kinds.iter().any(|k| matches!(
        k,
        EventKind::ModulesDeleted { keys } if keys == &vec![a.key().to_string()]
    )));
    assert!(kinds.iter().any(|k| matches!(
        k,
        EventKind::IndexingRequired { request } if request.modules_to_delete == vec![a.key().to_string()]
    )));
}

// =============================================================================
// Merge Invariants
// =============================================================================

fn metadata_value() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::Value::Null),
        Just(json!("")),
        Just(json!("unknown")),
        Just(json!("passed")),
        Just(json!("failed")),
        (0u32..5).prop_map(|n| json!(n)),
    ]
}

fn arb_module() -> impl Strategy<Value = Module> {
    (
        prop::collection::btree_map(
            prop::sample::select(vec!["compilation-status", "maturity-level", "author-email"]),
            metadata_value(),
            0..3,
        ),
        prop::collection::btree_set(prop::sample::select(vec!["p", "q", "r", "s"]), 0..4),
        prop::option::of(prop::sample::select(vec!["urn:a", "urn:b"])),
    )
        .prop_map(|(metadata, dependents, namespace)| {
            let mut m = module("m", "2020-01-01", "ietf");
            m.metadata = metadata
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            m.dependents = dependents.into_iter().map(Reference::named).collect();
            m.namespace = namespace.map(String::from);
            m
        })
}

proptest! {
    #[test]
    fn prop_merge_is_idempotent(existing in arb_module(), new in arb_module()) {
        let once = merge_module(existing, &new);
        let twice = merge_module(once.clone(), &new);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_null_never_overwrites(existing in arb_module()) {
        let mut new = module("m", "2020-01-01", "ietf");
        for key in existing.metadata.keys() {
            new.metadata.insert(key.clone(), serde_json::Value::Null);
        }
        let merged = merge_module(existing.clone(), &new);
        prop_assert_eq!(merged.metadata, existing.metadata);
    }
}

#[test]
fn test_overlay_takes_precedence_and_is_consumed() {
    let catalog = Catalog::in_memory();
    let mut original = module("a", "2020-01-01", "ietf");
    original.metadata.insert("maturity-level".into(), json!("adopted"));
    catalog.populate_modules(&[original.clone()]).unwrap();

    catalog
        .set_temp_module(&original.key(), &json!({"maturity-level": "ratified"}))
        .unwrap();
    catalog.populate_modules(&[original.clone()]).unwrap();

    let after = stored(&catalog, &original.key()).unwrap();
    assert_eq!(after.metadata["maturity-level"], json!("ratified"));

    // overlay consumed: the next populate restores the incoming value
    catalog.populate_modules(&[original.clone()]).unwrap();
    let again = stored(&catalog, &original.key()).unwrap();
    assert_eq!(again.metadata["maturity-level"], json!("adopted"));
}

#[test]
fn test_populate_twice_is_stable() {
    let catalog = Catalog::in_memory();
    let mut m = with_implementations(
        module("a", "2020-01-01", "ietf"),
        &[Implementation::new("cisco", "ASR9K", "7.0.1", "ASR9K")],
    );
    m.dependents = vec![Reference::named("b")];
    m.metadata.insert("compilation-status".into(), json!("passed"));

    let first = catalog.populate_modules(&[m.clone()]).unwrap();
    let second = catalog.populate_modules(&[m]).unwrap();

    assert_eq!(first, second);
}

// =============================================================================
// Vendor Deletion Invariants
// =============================================================================

fn fujitsu_tree() -> VendorTree {
    serde_json::from_value(json!({
        "yang-catalog:vendor": [{"name": "fujitsu", "platforms": {"platform": [
            {"name": "T100", "software-versions": {"software-version": [
                {"name": "1.0", "software-flavors": {"software-flavor": [
                    {"name": "base", "protocols": {"protocol": [{"name": "netconf"}]}, "modules": {"module": [
                        {"name": "fujitsu-a", "revision": "2020-01-01", "organization": "fujitsu"},
                        {"name": "ietf-x", "revision": "2019-01-01", "organization": "ietf"},
                        {"name": "fujitsu-b", "revision": "2020-01-01", "organization": "fujitsu"}
                    ]}}
                ]}},
                {"name": "2.0", "software-flavors": {"software-flavor": [
                    {"name": "lite", "protocols": {"protocol": [{"name": "restconf"}]}, "modules": {"module": [
                        {"name": "fujitsu-a", "revision": "2020-01-01", "organization": "fujitsu"},
                        {"name": "ietf-z", "revision": "2018-01-01", "organization": "ietf"}
                    ]}}
                ]}}
            ]}},
            {"name": "T200", "software-versions": {"software-version": [
                {"name": "1.0", "software-flavors": {"software-flavor": [
                    {"name": "base", "protocols": {"protocol": [{"name": "netconf"}]}, "modules": {"module": [
                        {"name": "fujitsu-b", "revision": "2020-01-01", "organization": "fujitsu"}
                    ]}}
                ]}}
            ]}}
        ]}}]
    }))
    .unwrap()
}

struct FujitsuCorpus {
    /// fujitsu-owned, only on T100 (two versions)
    a: Module,
    /// ietf-owned, on T100 and a cisco box
    x: Module,
    /// fujitsu-owned, on T100 and T200
    b: Module,
    /// ietf-owned, only on T100
    z: Module,
}

fn fujitsu_corpus(catalog: &Catalog) -> FujitsuCorpus {
    let t100 = Implementation::new("fujitsu", "T100", "1.0", "base");
    let t100_lite = Implementation::new("fujitsu", "T100", "2.0", "lite");
    let t200 = Implementation::new("fujitsu", "T200", "1.0", "base");
    let cisco = Implementation::new("cisco", "ASR9K", "7.0.1", "ASR9K");

    let a = with_implementations(
        module("fujitsu-a", "2020-01-01", "fujitsu"),
        &[t100.clone(), t100_lite.clone()],
    );
    let mut x = with_implementations(module("ietf-x", "2019-01-01", "ietf"), &[t100.clone(), cisco]);
    x.dependents = vec![Reference::named("fujitsu-a")];
    let b = with_implementations(module("fujitsu-b", "2020-01-01", "fujitsu"), &[t100, t200]);
    let z = with_implementations(module("ietf-z", "2018-01-01", "ietf"), &[t100_lite]);

    store(catalog, &[a.clone(), x.clone(), b.clone(), z.clone()]);
    catalog.populate_vendors(&fujitsu_tree()).unwrap();
    FujitsuCorpus { a, x, b, z }
}

#[test]
fn test_vendor_platform_deletion() {
    let catalog = Catalog::in_memory();
    let FujitsuCorpus { a, x, b, z } = fujitsu_corpus(&catalog);

    let outcome = delete_vendor_branch(&catalog, &VendorSelector::vendor("fujitsu").platform("T100"));

    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!(outcome.deleted, vec![a.key().to_string()]);
    assert_eq!(outcome.implementations_removed, 5);
    assert_eq!(outcome.vendor_keys_removed, 2);

    // vendor-owned and fully stripped: gone
    assert!(stored(&catalog, &a.key()).is_none());

    // other organization: stripped but kept, and its dependents cascaded
    let x_after = stored(&catalog, &x.key()).unwrap();
    assert_eq!(x_after.implementation_list().len(), 1);
    assert_eq!(x_after.implementation_list()[0].vendor, "cisco");
    assert!(x_after.dependents.is_empty());

    // still deployed on T200: kept
    let b_after = stored(&catalog, &b.key()).unwrap();
    assert_eq!(b_after.implementation_list().len(), 1);
    assert_eq!(b_after.implementation_list()[0].platform, "T200");

    // fully stripped but owned by another organization: kept, empty
    let z_after = stored(&catalog, &z.key()).unwrap();
    assert!(z_after.implementation_list().is_empty());

    // every version and flavor under the platform is gone
    for key in ["fujitsu/T100/1.0/base", "fujitsu/T100/2.0/lite"] {
        assert!(catalog.get_implementation_branch(key).unwrap().is_none(), "{key} survived");
    }
    assert!(catalog
        .get_implementation_branch("fujitsu/T200/1.0/base")
        .unwrap()
        .is_some());

    let vendors = catalog.get_all_vendors().unwrap();
    assert_eq!(vendors.vendors.len(), 1);
    assert_eq!(vendors.vendors[0].platforms.platform.len(), 1);
    assert_eq!(vendors.vendors[0].platforms.platform[0].name, "T200");
}

#[test]
fn test_no_implementation_left_for_deleted_branch() {
    let catalog = Catalog::in_memory();
    fujitsu_corpus(&catalog);
    let selector = VendorSelector::vendor("fujitsu").platform("T100");

    delete_vendor_branch(&catalog, &selector);

    let snapshot = catalog.load_snapshot().unwrap();
    for m in snapshot.modules().values() {
        assert!(
            !m.implementation_list().iter().any(|i| selector.matches(i)),
            "{} still lists a T100 implementation",
            m.key()
        );
    }
}

#[test]
fn test_respect_references_policy_keeps_referenced_modules() {
    let catalog = Catalog::in_memory().with_settings(CatalogSettings {
        vendor_policy: VendorDeletionPolicy::RespectReferences,
        ..CatalogSettings::default()
    });
    let FujitsuCorpus { a, .. } = fujitsu_corpus(&catalog);
    let mut user = module("ietf-y", "2019-01-01", "ietf");
    user.dependencies = vec![Reference::pinned("fujitsu-a", "2020-01-01")];
    store(&catalog, &[user.clone()]);

    let outcome = delete_vendor_branch(&catalog, &VendorSelector::vendor("fujitsu").platform("T100"));

    assert_eq!(outcome.status, BatchStatus::InProgress);
    assert_eq!(outcome.not_deleted[0].key, a.key().to_string());
    assert_eq!(outcome.not_deleted[0].referenced_by, user.key().to_string());
    let a_after = stored(&catalog, &a.key()).unwrap();
    assert!(a_after.implementation_list().is_empty());
}

#[test]
fn test_authoritative_policy_ignores_references() {
    let catalog = Catalog::in_memory();
    let FujitsuCorpus { a, .. } = fujitsu_corpus(&catalog);
    let mut user = module("ietf-y", "2019-01-01", "ietf");
    user.dependencies = vec![Reference::pinned("fujitsu-a", "2020-01-01")];
    store(&catalog, &[user]);

    let outcome = delete_vendor_branch(&catalog, &VendorSelector::vendor("fujitsu").platform("T100"));

    assert_eq!(outcome.status, BatchStatus::Success);
    assert!(stored(&catalog, &a.key()).is_none());
}
