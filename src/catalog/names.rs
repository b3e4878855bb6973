//! Name resolution with shortened aliases.
//!
//! A fully-qualified name `a.b.c` is also reachable as `b.c` and `c`, as long
//! as no other entry shares that suffix. Shared suffixes are remembered so a
//! lookup can report them as ambiguous instead of picking one entry.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Lookup {
    Found(usize),
    Ambiguous,
    Missing,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct NameIndex {
    full: BTreeMap<String, usize>,
    aliases: BTreeMap<String, usize>,
    ambiguous: BTreeSet<String>,
}

impl NameIndex {
    /// Build from `(full_name, slot)` pairs. Full names must already be unique.
    pub(crate) fn build<'a>(names: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
        let mut index = NameIndex::default();
        let names: Vec<(&str, usize)> = names.into_iter().collect();
        for (name, slot) in &names {
            index.full.insert((*name).to_string(), *slot);
        }
        for (name, slot) in &names {
            for suffix in suffixes(name) {
                if index.full.contains_key(suffix) || index.ambiguous.contains(suffix) {
                    continue;
                }
                match index.aliases.get(suffix).copied() {
                    Some(existing) if existing != *slot => {
                        index.aliases.remove(suffix);
                        index.ambiguous.insert(suffix.to_string());
                    }
                    Some(_) => {}
                    None => {
                        index.aliases.insert(suffix.to_string(), *slot);
                    }
                }
            }
        }
        index
    }

    pub(crate) fn resolve(&self, name: &str) -> Lookup {
        if let Some(slot) = self.full.get(name).or_else(|| self.aliases.get(name)) {
            return Lookup::Found(*slot);
        }
        if self.ambiguous.contains(name) {
            Lookup::Ambiguous
        } else {
            Lookup::Missing
        }
    }

    /// Aliases that resolve to `slot`.
    pub(crate) fn aliases_of(&self, slot: usize) -> BTreeSet<String> {
        self.aliases
            .iter()
            .filter(|(_, s)| **s == slot)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Proper dot-suffixes of `name`, longest first.
fn suffixes(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('.')
        .map(move |(pos, _)| &name[pos + 1..])
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_suffixes_resolve() {
        let index = NameIndex::build([("pipe.SwitchIngress.forward", 0), ("pipe.SwitchEgress.acl", 1)]);
        assert_eq!(index.resolve("pipe.SwitchIngress.forward"), Lookup::Found(0));
        assert_eq!(index.resolve("SwitchIngress.forward"), Lookup::Found(0));
        assert_eq!(index.resolve("forward"), Lookup::Found(0));
        assert_eq!(index.resolve("acl"), Lookup::Found(1));
        assert_eq!(index.resolve("missing"), Lookup::Missing);
        assert_eq!(
            index.aliases_of(0),
            ["SwitchIngress.forward", "forward"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<String>>()
        );
    }

    #[test]
    fn shared_suffix_is_ambiguous_in_any_order() {
        for names in [
            [("pipe.SwitchIngress.acl", 0), ("pipe.SwitchEgress.acl", 1)],
            [("pipe.SwitchEgress.acl", 1), ("pipe.SwitchIngress.acl", 0)],
        ] {
            let index = NameIndex::build(names);
            assert_eq!(index.resolve("acl"), Lookup::Ambiguous);
            assert_eq!(index.resolve("SwitchIngress.acl"), Lookup::Found(0));
            assert_eq!(index.resolve("SwitchEgress.acl"), Lookup::Found(1));
        }
    }

    #[test]
    fn ambiguity_survives_a_third_entry() {
        let index = NameIndex::build([("a.x", 0), ("b.x", 1), ("c.x", 2)]);
        assert_eq!(index.resolve("x"), Lookup::Ambiguous);
    }

    #[test]
    fn full_name_wins_over_another_entrys_suffix() {
        let index = NameIndex::build([("fwd", 0), ("pipe.fwd", 1)]);
        assert_eq!(index.resolve("fwd"), Lookup::Found(0));
        assert_eq!(index.resolve("pipe.fwd"), Lookup::Found(1));
        assert!(index.aliases_of(1).is_empty());
    }
}
