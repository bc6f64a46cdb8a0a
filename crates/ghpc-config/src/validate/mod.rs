//! Blueprint validation.
//!
//! - **Structure**: names, uniqueness, kinds, relocated modules, settings
//!   and outputs against the module interfaces.
//! - **References**: existence and ordering of module references, with
//!   suggestions for misspelled names.

pub mod references;
pub mod structure;

pub use references::{
    validate_module_reference, validate_module_references, validate_module_setting_reference,
    validate_module_use_references,
};
pub use structure::validate_structure;

use ghpc_common::constants::HINT_MAX_DISTANCE;

/// The candidate closest to `name`, if within the hint distance.
pub(crate) fn closest_match<'a>(
    name: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    candidates
        .into_iter()
        .map(|c| (levenshtein(name, c), c))
        .filter(|(d, _)| *d <= HINT_MAX_DISTANCE)
        .min_by_key(|(d, _)| *d)
        .map(|(_, c)| c.to_owned())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut cur = Vec::with_capacity(b.len() + 1);
        cur.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != *cb);
            cur.push(substitute.min(prev[j + 1] + 1).min(cur[j] + 1));
        }
        prev = cur;
    }
    prev[b.len()]
}
