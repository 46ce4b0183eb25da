//! Slug generation
//!
//! Slugs are lowercase, keep ASCII alphanumerics and non-ASCII letters, and
//! turn every run of anything else into a single `-`.

/// Cap on generated suffixes before falling back to a random one
const MAX_NUMERIC_SUFFIX: u32 = 200;

/// Generate a URL slug from a title or name.
///
/// `"Élections 2024: Results!"` becomes `"élections-2024-results"`. The
/// result may be empty when the input has nothing sluggable.
pub fn generate_slug(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_hyphen = false;

    for c in text.to_lowercase().chars() {
        let keep = c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphanumeric());
        if keep {
            result.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !result.is_empty() {
            result.push('-');
            prev_hyphen = true;
        }
    }

    result.trim_end_matches('-').to_string()
}

/// `base-n` for the n-th candidate of a colliding slug; `n = 1` is `base`
pub fn suffixed_slug(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, n)
    }
}

/// Find the first free candidate of `base`, `base-2`, `base-3`, ...
///
/// `taken` reports whether a candidate is already used. After
/// `MAX_NUMERIC_SUFFIX` attempts a short random suffix is used.
pub async fn unique_slug<F, Fut>(base: &str, mut taken: F) -> anyhow::Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<bool>>,
{
    for n in 1..=MAX_NUMERIC_SUFFIX {
        let candidate = suffixed_slug(base, n);
        if !taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }
    let random = uuid::Uuid::new_v4().simple().to_string();
    Ok(format!("{}-{}", base, &random[..8]))
}
