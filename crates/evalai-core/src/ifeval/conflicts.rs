//! Instruction conflict registry.
//!
//! The declared table lists conflicts in one direction only. [`symmetrize`]
//! closes it: every listed pair is mirrored and every id conflicts with
//! itself (an instruction may not appear twice in one instance). The closed
//! table is built once per process and consulted when definitions are
//! validated, never while scoring.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use super::registry::INSTRUCTION_IDS;

pub type ConflictTable = BTreeMap<&'static str, BTreeSet<&'static str>>;

fn all_ids() -> BTreeSet<&'static str> {
    INSTRUCTION_IDS.iter().map(|(id, _)| *id).collect()
}

fn all_except(excluded: &[&str]) -> BTreeSet<&'static str> {
    all_ids()
        .into_iter()
        .filter(|id| !excluded.contains(id))
        .collect()
}

fn with_self(id: &'static str, others: &[&'static str]) -> BTreeSet<&'static str> {
    std::iter::once(id).chain(others.iter().copied()).collect()
}

/// The one-directional table as declared.
pub fn declared_conflicts() -> ConflictTable {
    let mut table: ConflictTable = INSTRUCTION_IDS
        .iter()
        .map(|(id, _)| (*id, with_self(*id, &[])))
        .collect();

    let mut declare = |id: &'static str, set: BTreeSet<&'static str>| {
        table.insert(id, set);
    };

    declare(
        "language:response_language",
        with_self(
            "language:response_language",
            &[
                "detectable_format:multiple_sections",
                "keywords:existence",
                "keywords:frequency",
                "keywords:forbidden_words",
                "startend:end_checker",
                "change_case:english_capital",
                "change_case:english_lowercase",
            ],
        ),
    );
    declare(
        "length_constraints:number_paragraphs",
        with_self(
            "length_constraints:number_paragraphs",
            &[
                "length_constraints:nth_paragraph_first_word",
                "length_constraints:number_sentences",
            ],
        ),
    );
    declare(
        "length_constraints:nth_paragraph_first_word",
        with_self(
            "length_constraints:nth_paragraph_first_word",
            &["length_constraints:number_paragraphs"],
        ),
    );
    declare("detectable_format:constrained_response", all_ids());
    declare(
        "detectable_format:multiple_sections",
        with_self(
            "detectable_format:multiple_sections",
            &[
                "language:response_language",
                "detectable_format:number_highlighted_sections",
            ],
        ),
    );
    declare(
        "detectable_format:json_format",
        all_except(&["keywords:forbidden_words", "keywords:existence"]),
    );
    declare(
        "combination:two_responses",
        all_except(&[
            "keywords:forbidden_words",
            "keywords:existence",
            "language:response_language",
            "detectable_format:title",
            "punctuation:no_comma",
        ]),
    );
    declare(
        "combination:repeat_prompt",
        all_except(&[
            "keywords:existence",
            "detectable_format:title",
            "punctuation:no_comma",
        ]),
    );
    declare(
        "change_case:capital_word_frequency",
        with_self(
            "change_case:capital_word_frequency",
            &["change_case:english_lowercase", "change_case:english_capital"],
        ),
    );
    declare(
        "change_case:english_lowercase",
        with_self("change_case:english_lowercase", &["change_case:english_capital"]),
    );
    declare(
        "startend:quotation",
        with_self("startend:quotation", &["detectable_format:title"]),
    );

    table
}

/// Mirror every declared pair and add each id to its own set.
pub fn symmetrize(table: &ConflictTable) -> ConflictTable {
    let mut closed = table.clone();
    for (id, set) in table {
        for other in set {
            closed.entry(*other).or_default().insert(*id);
        }
        closed.entry(*id).or_default().insert(*id);
    }
    closed
}

/// The closed conflict table, built on first use.
pub fn conflict_registry() -> &'static ConflictTable {
    static REGISTRY: OnceLock<ConflictTable> = OnceLock::new();
    REGISTRY.get_or_init(|| symmetrize(&declared_conflicts()))
}

pub fn conflicts(a: &str, b: &str) -> bool {
    conflict_registry()
        .get(a)
        .is_some_and(|set| set.contains(b))
}

/// First pair of ids in `ids` that may not appear together, including a
/// repeated id. Unknown ids are ignored here.
pub fn find_conflict<S: AsRef<str>>(ids: &[S]) -> Option<(String, String)> {
    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            if conflicts(a.as_ref(), b.as_ref()) {
                return Some((a.as_ref().to_string(), b.as_ref().to_string()));
            }
        }
    }
    None
}
