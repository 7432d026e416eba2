//! Cache key derivation.

/// Prefix shared by every rate snapshot key.
pub const CACHE_KEY_PREFIX: &str = "exchange_rates_";

/// Derive the cache key for a base and a set of targets.
///
/// All inputs are lower-cased and targets are sorted, so permutations and case
/// variants map to the same key: `exchange_rates_<base>_<t1>_<t2>...`.
/// Duplicate targets are kept and produce duplicate segments. An empty target
/// list yields `exchange_rates_<base>_`.
pub fn derive_cache_key<S: AsRef<str>>(base: &str, targets: &[S]) -> String {
    let mut segments: Vec<String> = targets
        .iter()
        .map(|target| target.as_ref().to_lowercase())
        .collect();
    segments.sort();

    format!(
        "{}{}_{}",
        CACHE_KEY_PREFIX,
        base.to_lowercase(),
        segments.join("_")
    )
}
