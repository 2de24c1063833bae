use std::collections::HashSet;

/// The first name of `base`, `base0`, `base1`, ... that is not in `used`. The returned name is
/// added to `used`.
pub fn uniquify(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut suffix = 0usize;
    loop {
        let candidate = format!("{base}{suffix}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use proptest::collection;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn numbers_count_up() {
        let mut used = HashSet::new();
        assert_eq!(uniquify("foo", &mut used), "foo");
        assert_eq!(uniquify("foo", &mut used), "foo0");
        assert_eq!(uniquify("foo", &mut used), "foo1");
        assert_eq!(uniquify("bar", &mut used), "bar");
    }

    #[test]
    fn taken_suffixes_are_skipped() {
        let mut used = HashSet::from(["foo".to_string(), "foo0".to_string()]);
        assert_eq!(uniquify("foo", &mut used), "foo1");
    }

    #[proptest]
    fn names_stay_unique(
        #[strategy(collection::vec("[a-c][a-c0-9_]{0,2}", 1..=20))] names: Vec<String>,
    ) {
        let mut used = HashSet::new();
        let mut given = HashSet::new();
        for name in &names {
            let unique = uniquify(name, &mut used);
            assert!(unique.starts_with(name.as_str()));
            assert!(given.insert(unique));
        }
    }
}
