//! URL helpers shared by navigation inference and the CLI.

use url::Url;

/// Resolve `target` (absolute or relative) against an absolute `base`.
pub fn resolve_url(base: &str, target: &str) -> Result<String, url::ParseError> {
    let base = Url::parse(base)?;
    Ok(base.join(target)?.to_string())
}

/// Strip scheme and authority, keeping path, query and fragment.
///
/// `https://example.com/foo/bar?x=1#sec` becomes `/foo/bar?x=1#sec`.
/// Input that does not parse as an absolute URL is returned unchanged.
pub fn relativize_url(absolute: &str) -> String {
    let Ok(url) = Url::parse(absolute) else {
        return absolute.to_string();
    };
    let mut relative = url.path().to_string();
    if let Some(query) = url.query() {
        relative.push('?');
        relative.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        relative.push('#');
        relative.push_str(fragment);
    }
    relative
}

/// True when `target`, resolved against `base`, points at another page of
/// the same host. Same-document anchors and cross-site links are false.
pub fn is_same_site_different_page(base: &str, target: &str) -> bool {
    let Ok(base) = Url::parse(base) else {
        return false;
    };
    let Ok(resolved) = base.join(target) else {
        return false;
    };
    resolved.host_str().is_some()
        && resolved.host_str() == base.host_str()
        && resolved.port_or_known_default() == base.port_or_known_default()
        && resolved.path() != base.path()
}
