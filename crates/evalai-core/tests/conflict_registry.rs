//! Properties of the closed instruction conflict table.

use evalai_core::ifeval::{
    conflict_registry, conflicts, find_conflict, is_known, symmetrize, INSTRUCTION_IDS,
};

#[test]
fn every_known_id_has_an_entry() {
    let table = conflict_registry();
    for (id, _) in INSTRUCTION_IDS.iter() {
        assert!(table.contains_key(id), "{id} missing from the conflict table");
        assert!(is_known(id));
    }
}

#[test]
fn conflicts_is_symmetric_for_every_pair() {
    for (a, _) in INSTRUCTION_IDS.iter() {
        for (b, _) in INSTRUCTION_IDS.iter() {
            assert_eq!(conflicts(a, b), conflicts(b, a), "{a} vs {b}");
        }
    }
}

#[test]
fn closing_the_closed_table_changes_nothing() {
    let closed = conflict_registry();
    assert_eq!(&symmetrize(closed), closed);
}

#[test]
fn constrained_response_excludes_everything() {
    for (id, _) in INSTRUCTION_IDS.iter() {
        assert!(conflicts("detectable_format:constrained_response", id));
    }
}

#[test]
fn order_of_ids_does_not_hide_a_conflict() {
    let forward = ["startend:quotation", "detectable_format:title"];
    let backward = ["detectable_format:title", "startend:quotation"];
    assert!(find_conflict(&forward).is_some());
    assert!(find_conflict(&backward).is_some());
}

#[test]
fn unknown_ids_do_not_conflict() {
    assert!(!conflicts("keywords:made_up", "punctuation:no_comma"));
    assert_eq!(find_conflict(&["keywords:made_up", "punctuation:no_comma"]), None);
}
