//! Slug allocation for task records.
//!
//! Every task is addressed by a URL-safe slug derived from its title. The
//! first task for a base gets the bare normalized form; later tasks whose
//! titles normalize to the same base get `-2`, `-3`, ... suffixes. Suffix
//! numbers are derived from the slugs currently in the store, never from a
//! stored counter, so deleting a task cannot cause a number to be issued
//! twice.

use crate::error::{Error, Result};

/// Allocation attempts before a contended base is reported as a conflict.
pub const ALLOCATE_RETRY_BUDGET: usize = 3;

/// Normalize a title into a slug base.
///
/// ASCII letters are lowercased, every run of characters outside `[a-z0-9]`
/// collapses into a single hyphen, and leading/trailing hyphens are
/// stripped. Titles that differ only in casing or punctuation share a base
/// and compete for the same suffix numbers.
pub fn normalize(title: &str) -> String {
    let mut base = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            base.push(ch.to_ascii_lowercase());
        } else if !base.is_empty() && !base.ends_with('-') {
            base.push('-');
        }
    }
    if base.ends_with('-') {
        base.pop();
    }
    base
}

/// Suffix slot occupied by `slug` for `base`.
///
/// The match is anchored to the entire slug: the bare base occupies slot 1
/// and `base-N` occupies slot N. Slugs that merely start with the base
/// (`buy-milk-and-apple` against `buy-milk`) and slugs whose digits belong
/// to another word (`buy-2-apples` against `buy`) do not match at all.
fn suffix_slot(base: &str, slug: &str) -> Option<u64> {
    if slug == base {
        return Some(1);
    }
    let digits = slug.strip_prefix(base)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Whether `slug` competes with `base` for suffix numbers.
pub fn matches_base(base: &str, slug: &str) -> bool {
    suffix_slot(base, slug).is_some()
}

/// Pick the next slug for `base` given the currently assigned matches.
///
/// An empty set yields the bare base; otherwise the result is `base-(M+1)`
/// where M is the highest occupied slot. Gaps left by deleted tasks are
/// never refilled.
pub fn resolve(base: &str, existing: &[String]) -> String {
    let max_slot = existing
        .iter()
        .filter_map(|slug| suffix_slot(base, slug))
        .max();
    match max_slot {
        None => base.to_string(),
        Some(slot) => format!("{base}-{}", slot + 1),
    }
}

/// Source of the slugs currently assigned in a store, scoped to one base.
///
/// Implementations must return exactly the anchored matches for `base`
/// (see [`matches_base`]), case-sensitively, with no substring false
/// positives. Lookup failures propagate to the caller unchanged.
pub trait SlugLookup {
    fn matching_slugs(&self, base: &str) -> Result<Vec<String>>;
}

/// Computes unique slugs against a [`SlugLookup`].
///
/// The allocator only reads; persisting the record with the returned slug
/// is the caller's job. Callers that hold a per-base lock across read and
/// write can use [`SlugAllocator::allocate`] directly; everyone else goes
/// through [`SlugAllocator::allocate_with`], which re-resolves when the
/// commit loses a race.
pub struct SlugAllocator<'a, L: SlugLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: SlugLookup + ?Sized> SlugAllocator<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Compute the next slug for `title` without persisting anything.
    ///
    /// An aborted caller consumes nothing: the matching set is unchanged
    /// and a later allocation recomputes the same answer.
    pub fn allocate(&self, title: &str) -> Result<String> {
        let base = normalize(title);
        let existing = self.lookup.matching_slugs(&base)?;
        let slug = resolve(&base, &existing);
        tracing::debug!(%base, candidates = existing.len(), %slug, "resolved slug");
        Ok(slug)
    }

    /// Allocate a slug and hand it to `commit`.
    ///
    /// `commit` returns `Ok(true)` once the record is persisted under the
    /// slug, or `Ok(false)` when a concurrent writer claimed it first. On a
    /// lost race the matching set is re-read and resolution re-runs; the
    /// set strictly grows between attempts, so the loop terminates as soon
    /// as no concurrent writer is racing on the same base. After
    /// [`ALLOCATE_RETRY_BUDGET`] lost races the conflict surfaces as
    /// [`Error::SlugConflict`].
    pub fn allocate_with<F>(&self, title: &str, mut commit: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for _ in 0..ALLOCATE_RETRY_BUDGET {
            let slug = self.allocate(title)?;
            if commit(&slug)? {
                return Ok(slug);
            }
            tracing::debug!(%slug, "slug claimed by concurrent writer, re-resolving");
        }
        Err(Error::SlugConflict(normalize(title)))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Lookup over a plain slug list, pre-filtered with the anchored rule.
    struct FixedLookup(Vec<String>);

    impl SlugLookup for FixedLookup {
        fn matching_slugs(&self, base: &str) -> Result<Vec<String>> {
            Ok(self
                .0
                .iter()
                .filter(|slug| matches_base(base, slug))
                .cloned()
                .collect())
        }
    }

    fn slugs(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn normalize_lowercases_and_hyphenates() {
        assert_eq!(normalize("Buy milk"), "buy-milk");
        assert_eq!(normalize("Hello, World! (2024)"), "hello-world-2024");
        assert_eq!(normalize("  --spaced--  "), "spaced");
        assert_eq!(normalize("a---b"), "a-b");
    }

    #[test]
    fn normalize_is_idempotent() {
        for title in ["Buy milk", "launch!", "A  B  C", "-title-", "_title_", "***"] {
            let base = normalize(title);
            assert_eq!(normalize(&base), base);
        }
    }

    #[test]
    fn normalize_maps_equivalent_titles_to_one_base() {
        assert_eq!(normalize("Buy Milk"), normalize("buy milk"));
        assert_eq!(normalize("buy, milk!"), normalize("buy milk"));
    }

    #[test]
    fn normalize_symbol_only_titles_yield_empty_base() {
        assert_eq!(normalize("***"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn resolve_returns_bare_base_for_empty_set() {
        assert_eq!(resolve("launch", &[]), "launch");
    }

    #[test]
    fn resolve_is_deterministic() {
        let existing = slugs(&["launch", "launch-2"]);
        assert_eq!(resolve("launch", &existing), resolve("launch", &existing));
    }

    #[test]
    fn resolve_counts_bare_base_as_slot_one() {
        assert_eq!(resolve("launch", &slugs(&["launch"])), "launch-2");
    }

    #[test]
    fn resolve_takes_max_plus_one() {
        let existing = slugs(&["launch", "launch-2", "launch-3"]);
        assert_eq!(resolve("launch", &existing), "launch-4");
    }

    #[test]
    fn resolve_never_refills_gaps() {
        // launch-3 was deleted; the next allocation still follows the max.
        let existing = slugs(&["launch", "launch-2", "launch-4"]);
        assert_eq!(resolve("launch", &existing), "launch-5");
    }

    #[test]
    fn longer_slug_sharing_a_prefix_is_not_a_match() {
        assert!(!matches_base("buy-milk", "buy-milk-and-apple"));
        let existing = slugs(&["buy-milk-and-apple"]);
        assert_eq!(resolve("buy-milk", &existing), "buy-milk");
    }

    #[test]
    fn numbered_substring_in_unrelated_slug_is_not_a_match() {
        assert!(!matches_base("buy", "buy-2-apples"));
        let existing = slugs(&["buy-2-apples"]);
        assert_eq!(resolve("buy", &existing), "buy");
    }

    #[test]
    fn trailing_text_after_digits_is_not_a_match() {
        assert!(!matches_base("task", "task-2b"));
        assert!(!matches_base("task", "task-"));
        assert!(matches_base("task", "task-2"));
    }

    #[test]
    fn imported_suffix_one_still_advances_the_max() {
        // slate never issues base-1 itself, but an imported one must count.
        assert_eq!(resolve("task", &slugs(&["task-1"])), "task-2");
    }

    #[test]
    fn sequential_allocations_yield_the_expected_sequence() {
        let mut existing = Vec::new();
        let mut issued = Vec::new();
        for _ in 0..5 {
            let slug = resolve("launch", &existing);
            existing.push(slug.clone());
            issued.push(slug);
        }
        assert_eq!(
            issued,
            slugs(&["launch", "launch-2", "launch-3", "launch-4", "launch-5"])
        );
    }

    #[test]
    fn allocate_normalizes_before_lookup() {
        let lookup = FixedLookup(slugs(&["buy-milk"]));
        let allocator = SlugAllocator::new(&lookup);
        assert_eq!(allocator.allocate("Buy Milk!").unwrap(), "buy-milk-2");
    }

    #[test]
    fn allocate_with_commits_on_first_attempt() {
        let lookup = FixedLookup(slugs(&[]));
        let allocator = SlugAllocator::new(&lookup);
        let slug = allocator
            .allocate_with("Launch", |candidate| {
                assert_eq!(candidate, "launch");
                Ok(true)
            })
            .unwrap();
        assert_eq!(slug, "launch");
    }

    #[test]
    fn allocate_with_re_resolves_after_lost_race() {
        // The store grows underneath the allocator, as if another writer
        // claimed the first candidate between read and commit.
        let store = RefCell::new(slugs(&[]));

        struct LiveLookup<'a>(&'a RefCell<Vec<String>>);
        impl SlugLookup for LiveLookup<'_> {
            fn matching_slugs(&self, base: &str) -> Result<Vec<String>> {
                Ok(self
                    .0
                    .borrow()
                    .iter()
                    .filter(|slug| matches_base(base, slug))
                    .cloned()
                    .collect())
            }
        }

        let lookup = LiveLookup(&store);
        let allocator = SlugAllocator::new(&lookup);
        let mut attempts = 0;
        let slug = allocator
            .allocate_with("Launch", |candidate| {
                attempts += 1;
                if attempts == 1 {
                    // Concurrent writer wins the first round.
                    store.borrow_mut().push(candidate.to_string());
                    return Ok(false);
                }
                Ok(true)
            })
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(slug, "launch-2");
    }

    #[test]
    fn allocate_with_surfaces_conflict_after_budget() {
        let lookup = FixedLookup(slugs(&[]));
        let allocator = SlugAllocator::new(&lookup);
        let mut attempts = 0;
        let err = allocator
            .allocate_with("Launch", |_| {
                attempts += 1;
                Ok(false)
            })
            .unwrap_err();
        assert_eq!(attempts, ALLOCATE_RETRY_BUDGET);
        assert!(matches!(err, Error::SlugConflict(base) if base == "launch"));
    }

    #[test]
    fn allocate_with_propagates_commit_errors() {
        let lookup = FixedLookup(slugs(&[]));
        let allocator = SlugAllocator::new(&lookup);
        let err = allocator
            .allocate_with("Launch", |_| {
                Err(Error::InvalidArgument("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
