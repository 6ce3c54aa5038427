//! Name-based sibling ordering
//!
//! Sorting takes a caller-supplied key function that turns a display name into
//! a sequence of comparable units (for example transliterated initials). Only
//! the first few units of each key take part in the comparison.

use crate::core::entry::Nid;
use crate::core::tree::Forest;
use crate::error::Result;
use std::cmp::Ordering;

/// Number of key units compared by default
pub const DEFAULT_SORT_PREFIX: usize = 9;

/// Key made of the raw bytes of the name
pub fn byte_key(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}

/// Key made of the lower-cased characters of the name
pub fn case_folded_key(name: &str) -> Vec<char> {
    name.chars().flat_map(char::to_lowercase).collect()
}

struct Keyed<'a, U> {
    key: Vec<U>,
    name: &'a str,
    id: Nid,
}

/// Sibling comparison
///
/// Identical names are equal. Otherwise the truncated keys decide, and names
/// that tie on the key fall back to byte order of the name itself.
fn compare<U: Ord>(a: &Keyed<'_, U>, b: &Keyed<'_, U>) -> Ordering {
    if a.name == b.name {
        return Ordering::Equal;
    }
    a.key.cmp(&b.key).then_with(|| a.name.cmp(b.name))
}

impl Forest {
    /// Reorder the children of every node in the subtree rooted at `id`
    ///
    /// The sort is stable, so siblings that compare equal keep their original
    /// relative order. Returns the ids whose child order changed.
    pub(crate) fn sort_subtree<K, U>(&mut self, id: Nid, key: K, prefix: usize) -> Result<Vec<Nid>>
    where
        K: Fn(&str) -> Vec<U>,
        U: Ord,
    {
        let mut parents: Vec<Nid> = Vec::new();
        if id.is_forest() {
            parents.push(Nid::FOREST);
        }
        parents.extend(self.breadth_first_from(id)?.into_iter().map(|(nid, _)| nid));

        let mut reordered = Vec::new();
        for parent in parents {
            let children = self.children(parent)?;
            if children.len() < 2 {
                continue;
            }

            let mut keyed = Vec::with_capacity(children.len());
            for &child in children {
                let name = self.get(child)?.name();
                let mut units = key(name);
                units.truncate(prefix);
                keyed.push(Keyed {
                    key: units,
                    name,
                    id: child,
                });
            }
            keyed.sort_by(compare);

            let sorted: Vec<Nid> = keyed.iter().map(|k| k.id).collect();
            if sorted.as_slice() != children {
                reordered.push(parent);
                *self.children_mut(parent)? = sorted;
            }
        }
        Ok(reordered)
    }
}
