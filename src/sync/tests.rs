// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_matches::assert_matches;

use crate::access::{AccessGrant, Capability, Principal};
use crate::context::TransactionContext;
use crate::model::{ASPECT_READ_ACCESS_GRANTED, PROP_READ_ACCESS_GRANTED_TO};
use crate::node::{ChildAssoc, PropertyMap, PropertyValue, StoreId};
use crate::test_utils::{MemoryRepo, setup_logging};
use crate::traits::{AccessControl, NodeStore};

use super::AccessSync;

fn workspace() -> StoreId {
    StoreId::new("workspace")
}

fn archive_store() -> StoreId {
    StoreId::new("archive")
}

fn fixture() -> (MemoryRepo, AccessSync<MemoryRepo, MemoryRepo, MemoryRepo>) {
    setup_logging();
    let repo = MemoryRepo::new();
    repo.register_archive(&workspace(), &archive_store());
    let behaviour = AccessSync::new(repo.clone(), repo.clone(), repo.clone());
    (repo, behaviour)
}

#[tokio::test]
async fn archiving_grants_read_and_records_marker() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let docs = repo.add_child(&root, "Documents");
    let item = repo.add_child(&docs, "report.pdf");

    for (assoc, archived) in repo.archive(&item, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    let archived_item = item.in_store(archive_store());
    assert_eq!(
        repo.grants(&archived_item),
        vec![AccessGrant::allowed(Principal::new("alice"), Capability::Read)]
    );
    assert!(
        repo.aspects(&archived_item)
            .contains(&ASPECT_READ_ACCESS_GRANTED.to_owned())
    );

    // The marker must round-trip the granted principal exactly.
    let properties = repo.properties(&archived_item).await.unwrap().unwrap();
    assert_matches!(
        properties.get(PROP_READ_ACCESS_GRANTED_TO),
        Some(PropertyValue::Text(user)) if user == "alice"
    );
}

#[tokio::test]
async fn redelivered_delete_event_grants_once() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let item = repo.add_child(&root, "report.pdf");

    let events = repo.archive(&item, "alice", 1_000);
    let (assoc, archived) = events[0].clone();

    behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    behaviour.on_node_deleted(&assoc, archived).await.unwrap();

    assert_eq!(repo.grants(&item.in_store(archive_store())).len(), 1);
}

#[tokio::test]
async fn existing_explicit_read_grant_is_left_alone() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let item = repo.add_child(&root, "report.pdf");

    // Direct ownership often means an explicit grant already exists; the
    // behaviour must not stack a second one or record a marker.
    repo.grant(&item, &Principal::new("alice"), Capability::Read, true)
        .await
        .unwrap();

    for (assoc, archived) in repo.archive(&item, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    let archived_item = item.in_store(archive_store());
    assert_eq!(repo.grants(&archived_item).len(), 1);
    assert!(
        !repo
            .aspects(&archived_item)
            .contains(&ASPECT_READ_ACCESS_GRANTED.to_owned())
    );
}

#[tokio::test]
async fn cascade_deleted_children_get_no_grant() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let folder = repo.add_child(&root, "Projects");
    let child = repo.add_child(&folder, "notes.txt");

    for (assoc, archived) in repo.archive(&folder, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    let archived_child = child.in_store(archive_store());
    assert!(repo.grants(&archived_child).is_empty());
    assert!(repo.aspects(&archived_child).is_empty());
}

#[tokio::test]
async fn unraised_flag_is_ignored() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let item = repo.add_child(&root, "report.pdf");

    let events = repo.archive(&item, "alice", 1_000);
    let (assoc, _) = events[0].clone();

    behaviour.on_node_deleted(&assoc, false).await.unwrap();

    let archived_item = item.in_store(archive_store());
    assert!(repo.grants(&archived_item).is_empty());
}

#[tokio::test]
async fn permanent_delete_from_store_without_archive_is_ignored() {
    let (repo, behaviour) = fixture();
    let other = StoreId::new("system");
    let root = repo.add_root(&other, "system");
    let item = repo.add_child(&root, "descriptor");

    let assoc = ChildAssoc::new(root, item, "descriptor");
    behaviour.on_node_deleted(&assoc, true).await.unwrap();
}

#[tokio::test]
async fn delete_event_before_archive_move_is_visible_is_skipped() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let item = repo.add_child(&root, "report.pdf");

    // Event fired but the move has not committed: the archived equivalent
    // resolves to an address that does not exist yet.
    let assoc = ChildAssoc::new(root, item.clone(), "report.pdf");
    behaviour.on_node_deleted(&assoc, true).await.unwrap();

    assert!(repo.grants(&item.in_store(archive_store())).is_empty());
}

#[tokio::test]
async fn restore_round_trips_grants_and_aspects() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let item = repo.add_child(&root, "report.pdf");

    let grants_before = repo.grants(&item);
    let aspects_before = repo.aspects(&item);

    for (assoc, archived) in repo.archive(&item, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    let mut txn = TransactionContext::new();
    for assoc in repo.restore(&item.in_store(archive_store())) {
        behaviour.on_node_restored(&mut txn, &assoc).await.unwrap();
    }

    assert_eq!(repo.grants(&item), grants_before);
    assert_eq!(repo.aspects(&item), aspects_before);
    let properties = repo.properties(&item).await.unwrap().unwrap();
    assert_eq!(properties.text(PROP_READ_ACCESS_GRANTED_TO), None);
}

#[tokio::test]
async fn cascade_restore_cleans_up_only_the_root() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let folder = repo.add_child(&root, "Projects");
    let child = repo.add_child(&folder, "notes.txt");

    for (assoc, archived) in repo.archive(&folder, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    // A marker left over on the descendant from an earlier, separate archive
    // operation; only the restore root may be cleaned up in this txn.
    let archived_child = child.in_store(archive_store());
    let bob = Principal::new("bob");
    repo.grant(&archived_child, &bob, Capability::Read, true)
        .await
        .unwrap();
    let mut marker = PropertyMap::new();
    marker.insert(
        PROP_READ_ACCESS_GRANTED_TO,
        PropertyValue::Text("bob".into()),
    );
    repo.add_aspect(&archived_child, ASPECT_READ_ACCESS_GRANTED, marker)
        .await
        .unwrap();

    let mut txn = TransactionContext::new();
    for assoc in repo.restore(&folder.in_store(archive_store())) {
        behaviour.on_node_restored(&mut txn, &assoc).await.unwrap();
    }

    // Root cleaned up.
    assert!(repo.grants(&folder).is_empty());
    assert!(repo.aspects(&folder).is_empty());

    // Descendant skipped as cascade: grant and marker untouched.
    assert_eq!(
        repo.grants(&child),
        vec![AccessGrant::allowed(bob, Capability::Read)]
    );
    assert!(
        repo.aspects(&child)
            .contains(&ASPECT_READ_ACCESS_GRANTED.to_owned())
    );
}

#[tokio::test]
async fn restore_without_marker_is_tracked_but_changes_nothing() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let folder = repo.add_child(&root, "Projects");
    let child = repo.add_child(&folder, "notes.txt");

    repo.archive(&folder, "alice", 1_000);

    // No delete handling happened, so no marker exists anywhere. Restore
    // events must still be tolerated and recorded for cascade recognition.
    let mut txn = TransactionContext::new();
    let events = repo.restore(&folder.in_store(archive_store()));
    for assoc in &events {
        behaviour.on_node_restored(&mut txn, assoc).await.unwrap();
    }

    assert!(repo.grants(&folder).is_empty());
    assert!(repo.grants(&child).is_empty());
}

#[tokio::test]
async fn restore_into_store_without_archive_is_ignored() {
    let (repo, behaviour) = fixture();
    let other = StoreId::new("system");
    let root = repo.add_root(&other, "system");
    let item = repo.add_child(&root, "descriptor");

    let mut marker = PropertyMap::new();
    marker.insert(
        PROP_READ_ACCESS_GRANTED_TO,
        PropertyValue::Text("alice".into()),
    );
    repo.add_aspect(&item, ASPECT_READ_ACCESS_GRANTED, marker)
        .await
        .unwrap();

    let assoc = ChildAssoc::new(root, item.clone(), "descriptor");
    let mut txn = TransactionContext::new();
    behaviour.on_node_restored(&mut txn, &assoc).await.unwrap();

    // Not a restore from archive, nothing to clean up.
    assert!(
        repo.aspects(&item)
            .contains(&ASPECT_READ_ACCESS_GRANTED.to_owned())
    );
}

/// End-to-end scenario: alice archives `A` with child `B`, later restores it.
#[tokio::test]
async fn archive_then_restore_scenario() {
    let (repo, behaviour) = fixture();
    let root = repo.add_root(&workspace(), "Company Home");
    let a = repo.add_child(&root, "A");
    let b = repo.add_child(&a, "B");

    for (assoc, archived) in repo.archive(&a, "alice", 1_000) {
        behaviour.on_node_deleted(&assoc, archived).await.unwrap();
    }

    let archived_a = a.in_store(archive_store());
    let archived_b = b.in_store(archive_store());
    let alice = Principal::new("alice");

    // Provenance written on A only; grant and marker on A only.
    let properties = repo.properties(&archived_a).await.unwrap().unwrap();
    assert_eq!(
        properties.text(crate::model::PROP_ARCHIVED_BY),
        Some("alice")
    );
    assert_eq!(
        properties.timestamp(crate::model::PROP_ARCHIVED_DATE),
        Some(1_000)
    );
    assert_eq!(
        repo.grants(&archived_a),
        vec![AccessGrant::allowed(alice, Capability::Read)]
    );
    assert!(repo.grants(&archived_b).is_empty());
    assert!(repo.aspects(&archived_b).is_empty());

    let mut txn = TransactionContext::new();
    for assoc in repo.restore(&archived_a) {
        behaviour.on_node_restored(&mut txn, &assoc).await.unwrap();
    }

    assert!(repo.grants(&a).is_empty());
    assert!(repo.aspects(&a).is_empty());
    assert!(repo.grants(&b).is_empty());
}
