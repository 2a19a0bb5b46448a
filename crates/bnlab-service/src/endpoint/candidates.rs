pub fn normalize_base_url(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Ordered, deduplicated candidate list. Later duplicates and blank entries are dropped.
pub fn build_candidates(
    override_base: Option<&str>,
    deploy_base: &str,
    fallbacks: &[String],
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let ordered = override_base
        .into_iter()
        .chain(std::iter::once(deploy_base))
        .chain(fallbacks.iter().map(String::as_str));
    for raw in ordered {
        let normalized = normalize_base_url(raw);
        if normalized.is_empty() {
            continue;
        }
        if out
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(&normalized))
        {
            continue;
        }
        out.push(normalized);
    }
    out
}

/// Host part of a candidate, shown in resolution diagnostics.
pub fn candidate_host(base: &str) -> String {
    url::Url::parse(base)
        .ok()
        .and_then(|url| {
            url.host_str().map(|host| match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            })
        })
        .unwrap_or_else(|| base.to_string())
}
