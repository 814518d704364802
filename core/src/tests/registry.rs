use super::{harness, party};
use crate::error::PsiError;
use crate::ledger::Ledger;
use crate::protocol::records::{SET_INDEX, owner_key, set_key};

#[test]
fn submit_set_is_listed_and_becomes_current() {
    let h = harness();
    let owner = party("A");

    let id = h
        .node
        .submit_set(owner, h.handles(&["x", "y", "z"]))
        .unwrap();

    let sets = h.node.list_sets().unwrap();
    assert_eq!(sets.iter().filter(|s| s.id == id).count(), 1);
    assert_eq!(sets[0].size, 3);
    assert_eq!(sets[0].owner, owner);
    assert_eq!(h.node.current_set_id(&owner).unwrap(), Some(id));
}

#[test]
fn newer_set_supersedes_pointer_but_old_stays_readable() {
    let h = harness();
    let owner = party("A");

    let first = h.node.submit_set(owner, h.handles(&["x"])).unwrap();
    let second = h.node.submit_set(owner, h.handles(&["y", "z"])).unwrap();

    assert_ne!(first, second);
    assert_eq!(h.node.current_set_id(&owner).unwrap(), Some(second));
    assert_eq!(h.node.get_set(&first).unwrap().size, 1);
    assert_eq!(h.node.list_sets().unwrap().len(), 2);
}

#[test]
fn empty_set_is_rejected_without_side_effects() {
    let h = harness();

    let err = h.node.submit_set(party("A"), Vec::new()).unwrap_err();
    assert!(err.is_validation());
    assert!(h.ledger.is_empty());
}

#[test]
fn unknown_owner_has_no_current_set() {
    let h = harness();
    assert_eq!(h.node.current_set_id(&party("nobody")).unwrap(), None);
    assert!(matches!(
        h.node.get_set("deadbeef"),
        Err(PsiError::NotFound { kind: "set", .. })
    ));
}

#[test]
fn listing_skips_corrupt_and_missing_records() {
    let h = harness();
    let good = h.node.submit_set(party("A"), h.handles(&["x"])).unwrap();
    let bad = h.node.submit_set(party("B"), h.handles(&["y"])).unwrap();

    h.ledger
        .put(&set_key(&bad), party("B"), b"not json".to_vec())
        .unwrap();
    h.ledger
        .append_to_index(SET_INDEX, party("B"), "ghost")
        .unwrap();

    let sets = h.node.list_sets().unwrap();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].id, good);
}

#[test]
fn backing_store_failure_propagates() {
    let h = harness();
    h.node.submit_set(party("A"), h.handles(&["x"])).unwrap();
    h.ledger.set_unavailable(true);

    assert!(matches!(
        h.node.list_sets(),
        Err(PsiError::BackingStore(_))
    ));
    assert!(matches!(
        h.node.submit_set(party("A"), h.handles(&["y"])),
        Err(PsiError::BackingStore(_))
    ));
}

#[test]
fn set_entries_are_attributed_to_owner() {
    let h = harness();
    let owner = party("A");
    let id = h.node.submit_set(owner, h.handles(&["x"])).unwrap();

    assert_eq!(h.node.writer_of(&set_key(&id)).unwrap(), Some(owner));
    assert_eq!(h.node.writer_of(&owner_key(&owner)).unwrap(), Some(owner));
    assert_eq!(h.node.writer_of(SET_INDEX).unwrap(), Some(owner));
}

#[test]
fn corrupt_set_is_reported_as_corrupt_not_store_failure() {
    let h = harness();
    let id = h.node.submit_set(party("A"), h.handles(&["x"])).unwrap();
    h.ledger
        .put(&set_key(&id), party("A"), b"garbage".to_vec())
        .unwrap();

    let err = h.node.get_set(&id).unwrap_err();
    assert!(matches!(err, PsiError::CorruptRecord { ref key, .. } if *key == set_key(&id)));
}
