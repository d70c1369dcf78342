/// Checks whether all bytes in the given slice are lowercase hexadecimal ASCII characters.
///
/// This function returns `true` if every byte in the input slice is either an ASCII
/// digit (`'0'..='9'`) or a lowercase ASCII letter in `'a'..='f'`. It returns `false`
/// if any byte falls outside of these ranges, including uppercase letters, symbols,
/// or non-ASCII characters.
pub(super) fn is_lowercase_hex(src: &[u8]) -> bool {
    src.iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
}

/// Strips the leading `/` the Docker Engine API puts in front of container names.
pub(super) fn trim_runtime_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}
