mod pii;
pub(crate) use pii::Pii;

/// Lowercase ascii comparison of a prefix, used for product names and
/// encoding names which peers send in any case.
pub(crate) fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
