//! `key=value` token parsing for device configuration strings.
//!
//! A configuration string is a whitespace-separated list of tokens such as
//! `i8042=on vesa.base=0xd0000000 loglevel=debug`. Tokens without `=` are
//! yielded with an empty value.

/// Iterate `(key, value)` pairs of a configuration string.
pub fn tokens(cmdline: &str) -> impl Iterator<Item = (&str, &str)> {
    cmdline
        .split_whitespace()
        .map(|token| token.split_once('=').unwrap_or((token, "")))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("on")
        || value.eq_ignore_ascii_case("true")
        || value.eq_ignore_ascii_case("yes")
        || value.eq_ignore_ascii_case("enabled")
        || value == "1"
    {
        Some(true)
    } else if value.eq_ignore_ascii_case("off")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no")
        || value.eq_ignore_ascii_case("disabled")
        || value == "0"
    {
        Some(false)
    } else {
        None
    }
}

/// Decimal, or hexadecimal with a `0x`/`0X` prefix. `_` separators are not accepted.
pub fn parse_u64(value: &str) -> Option<u64> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse::<u64>().ok(),
    }
}
