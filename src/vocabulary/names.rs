use std::cmp::Ordering;

/// Facet assigned to tag names that carry no `facet::` prefix
pub const LEGACY_FACET: &str = "legacy";

const SEPARATOR: &str = "::";

/// Order tag full names facet first.
///
/// Facets compare as strings, so a facet that is a prefix of another sorts
/// first. Short names only break ties between identical facets. Names
/// without `::` are ordered as if they were `legacy::name`.
pub fn tag_compare(a: &str, b: &str) -> Ordering {
    let (fa, ta) = split_tag(a);
    let (fb, tb) = split_tag(b);
    fa.cmp(fb).then_with(|| ta.cmp(tb))
}

/// Split `facet::tag`, putting names without a facet under `legacy`
pub fn split_tag(fullname: &str) -> (&str, &str) {
    match fullname.split_once(SEPARATOR) {
        Some((facet, tag)) => (facet, tag),
        None => (LEGACY_FACET, fullname),
    }
}

pub fn facet_of(fullname: &str) -> &str {
    split_tag(fullname).0
}

pub fn short_name(fullname: &str) -> &str {
    split_tag(fullname).1
}

pub fn join_tag(facet: &str, tag: &str) -> String {
    format!("{}{}{}", facet, SEPARATOR, tag)
}
