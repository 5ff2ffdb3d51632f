/// Parses an `"a.b.c"` version string into a single comparable integer.
/// Mirrors the original's quirky base choice exactly (major*10000 +
/// minor*100 + patch) so contemporary rank/os-gating data keeps meaning
/// the same thing it always has (spec §9 open question, pinned here).
pub fn version_to_int(version: &str) -> i64 {
    let safe_convert = |s: &str| -> i64 { s.parse::<i64>().unwrap_or(0) };
    let parts: Vec<&str> = version.split('.').collect();
    match parts.len() {
        0 => 0,
        1 => 10000 * safe_convert(parts[0]),
        2 => 10000 * safe_convert(parts[0]) + 100 * safe_convert(parts[1]),
        _ => 10000 * safe_convert(parts[0]) + 100 * safe_convert(parts[1]) + safe_convert(parts[2]),
    }
}

/// Accumulates `h = (h*31 + codepoint) & 0x7FFFFFFF` over Unicode
/// scalar values — code points, not bytes (§4.7).
pub fn hive_hash(content: &str) -> i64 {
    let mut hash: i64 = 0;
    for ch in content.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as i64);
        hash &= 0x7FFF_FFFF;
    }
    hash
}

/// Empty strings render as `"NAN"` in event records (§4.7).
pub fn nan_if_empty(value: &str) -> String {
    if value.is_empty() {
        "NAN".to_string()
    } else {
        value.to_string()
    }
}

/// Splits a compound tracker token `"<request_id>-<index>"` into its
/// parts. A malformed param is logged and the caller returns early (§7).
pub fn split_tracker_id(param: &str) -> Option<(String, usize)> {
    let (id, index) = param.rsplit_once('-')?;
    let index = index.parse::<usize>().ok()?;
    Some((id.to_string(), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_to_int_matches_pinned_mapping() {
        assert_eq!(version_to_int("4.3"), 40300);
        assert_eq!(version_to_int(""), 0);
        assert_eq!(version_to_int("9.10.1"), 90000 + 1000 + 1);
    }

    #[test]
    fn hive_hash_matches_fixtures() {
        assert_eq!(hive_hash(""), 0);
        assert_eq!(hive_hash("A"), 65);
        assert_eq!(hive_hash("AB"), 65 * 31 + 66);
        assert!(hive_hash("AB") >= 0 && hive_hash("AB") < (1 << 31));
    }

    #[test]
    fn hive_hash_iterates_by_code_point_not_byte() {
        // multi-byte UTF-8 char counted once, not once per byte
        let single = hive_hash("é");
        assert_eq!(single, 233);
    }

    #[test]
    fn nan_if_empty_substitutes_only_empty_strings() {
        assert_eq!(nan_if_empty(""), "NAN");
        assert_eq!(nan_if_empty("US"), "US");
    }

    #[test]
    fn split_tracker_id_parses_compound_token() {
        assert_eq!(
            split_tracker_id("abcd1234-2"),
            Some(("abcd1234".to_string(), 2))
        );
        assert_eq!(split_tracker_id("no-index-here-x"), None);
        assert_eq!(split_tracker_id("noindex"), None);
    }
}
