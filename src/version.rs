//! Build identity reported by `/health` and `shelfd --version`.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");
const GIT_DIRTY: Option<&str> = option_env!("VERGEN_GIT_DIRTY");

/// `{version}+g{short sha}`, with `.dirty` appended for a modified tree.
/// Builds outside a git checkout report the bare package version.
pub fn version_string() -> String {
    match commit() {
        Some(sha) => {
            let dirty = if GIT_DIRTY == Some("true") { ".dirty" } else { "" };
            format!("{PKG_VERSION}+g{sha}{dirty}")
        }
        None => PKG_VERSION.to_string(),
    }
}

fn commit() -> Option<&'static str> {
    let sha = GIT_SHA?;
    if sha.is_empty() || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(sha.get(..7).unwrap_or(sha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_package_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }

    #[test]
    fn build_metadata_is_a_short_commit() {
        let version = version_string();
        match version.split_once('+') {
            Some((pkg, build)) => {
                assert_eq!(pkg, PKG_VERSION);
                let sha = build.trim_start_matches('g').trim_end_matches(".dirty");
                assert!(sha.len() <= 7);
                assert!(sha.bytes().all(|b| b.is_ascii_hexdigit()), "{build}");
            }
            None => assert_eq!(version, PKG_VERSION),
        }
    }
}
