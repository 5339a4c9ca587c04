//! Filename derivation, sanitization, and unique path resolution for downloads.
//!
//! Destination names follow `{id}_{title-or-description}{.ext}`. Collisions
//! with files already on disk, or with paths claimed earlier in the same run,
//! get a numeric suffix before the extension: `name.jpg`, `name_1.jpg`,
//! `name_2.jpg`, ...

use std::path::{Path, PathBuf};

use dashmap::DashSet;
use tracing::debug;
use url::Url;

use crate::catalog::ItemDescriptor;

/// Maximum length of a sanitized base name, in characters.
pub const MAX_BASE_NAME_CHARS: usize = 120;

/// Extension used when the asset URL carries none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Base name used when an item has neither identifier nor text.
const PLACEHOLDER_NAME: &str = "untitled";

/// Suffix of the in-progress file written next to the destination.
const PARTIAL_SUFFIX: &str = ".part";

/// Sanitizes a name for filesystem safety.
///
/// - `<>:"/\|?*` and control characters `0x00..=0x1F` become `_`
/// - whitespace runs collapse into a single `_`
/// - the result is truncated to [`MAX_BASE_NAME_CHARS`] characters
/// - leading and trailing `_` are stripped
///
/// Applying it twice gives the same result as applying it once.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            // Tabs and newlines are whitespace first; they collapse below.
            c if c <= '\u{1f}' && !c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let joined = replaced.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().take(MAX_BASE_NAME_CHARS).collect();
    truncated.trim_matches('_').to_string()
}

/// Builds the sanitized base name (no extension) for an item.
#[must_use]
pub fn base_name(item: &ItemDescriptor) -> String {
    let id = item.id();
    let text = item.title().or_else(|| item.description()).unwrap_or("");

    let name = sanitize_filename(&format!("{id}_{text}"));
    if !name.is_empty() {
        return name;
    }
    let name = sanitize_filename(&id);
    if name.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        name
    }
}

/// Extension (with leading dot) from the last URL path segment, kept as-is,
/// defaulting to [`DEFAULT_EXTENSION`].
///
/// Suffixes longer than 12 characters or with non-alphanumeric characters are
/// not treated as extensions.
#[must_use]
pub fn extension_from_url(url: &str) -> String {
    extract_extension(url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn extract_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last_segment = parsed.path_segments()?.next_back()?;
    let dot_index = last_segment.rfind('.')?;
    let ext = &last_segment[dot_index..];
    if ext.len() <= 1 || ext.len() > 12 || !ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_string())
}

/// Path of the temporary file a download streams into before being renamed.
#[must_use]
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Resolves collision-free destination paths for a whole run.
///
/// Every returned path is recorded in a registry shared by all workers. A
/// candidate is only handed out when neither it nor its [`partial_path`]
/// exists on disk and its registry insertion succeeds, so two jobs can never
/// receive the same path even when their base names are identical, and a
/// download never touches a file it did not create.
///
/// Resolution checks the filesystem synchronously; async callers should run it
/// on the blocking pool.
#[derive(Debug, Default)]
pub struct FilenameResolver {
    claimed: DashSet<PathBuf>,
}

impl FilenameResolver {
    /// Creates a resolver with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a destination path for `item`'s asset at `asset_url` under `base_dir`.
    #[must_use]
    pub fn resolve(&self, base_dir: &Path, item: &ItemDescriptor, asset_url: &str) -> PathBuf {
        let base = base_name(item);
        let ext = extension_from_url(asset_url);

        let first = base_dir.join(format!("{base}{ext}"));
        if self.try_claim(&first) {
            return first;
        }

        let mut suffix = 1usize;
        loop {
            let candidate = base_dir.join(format!("{base}_{suffix}{ext}"));
            if self.try_claim(&candidate) {
                debug!(path = %candidate.display(), suffix, "resolved name collision");
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Gives a claimed path back, e.g. after its download failed.
    pub fn release(&self, path: &Path) {
        self.claimed.remove(path);
    }

    /// Number of paths currently claimed.
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    fn try_claim(&self, candidate: &Path) -> bool {
        !candidate.exists()
            && !partial_path(candidate).exists()
            && self.claimed.insert(candidate.to_path_buf())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn item(value: serde_json::Value) -> ItemDescriptor {
        ItemDescriptor::from_value(value).unwrap()
    }

    #[test]
    fn test_sanitize_filename_replaces_invalid_chars() {
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("bell\u{7}tab"), "bell_tab");
        assert_eq!(sanitize_filename("nul\u{0}esc\u{1b}"), "nul_esc");
    }

    #[test]
    fn test_sanitize_filename_keeps_chars_above_ascii_controls() {
        assert_eq!(sanitize_filename("del\u{7f}x"), "del\u{7f}x");
        assert_eq!(sanitize_filename("c1\u{90}x"), "c1\u{90}x");
    }

    #[test]
    fn test_sanitize_filename_collapses_whitespace() {
        assert_eq!(sanitize_filename("  a   lazy \t cat  "), "a_lazy_cat");
        assert_eq!(sanitize_filename("line\nbreak"), "line_break");
    }

    #[test]
    fn test_sanitize_filename_truncates_and_strips() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_filename(&long).chars().count(), MAX_BASE_NAME_CHARS);

        let mut trailing = "y".repeat(MAX_BASE_NAME_CHARS - 1);
        trailing.push_str(" tail");
        assert_eq!(sanitize_filename(&trailing), "y".repeat(MAX_BASE_NAME_CHARS - 1));

        assert_eq!(sanitize_filename("__name__"), "name");
        assert_eq!(sanitize_filename("???"), "");
    }

    #[test]
    fn test_sanitize_filename_counts_chars_not_bytes() {
        let korean = "고양이".repeat(50);
        let sanitized = sanitize_filename(&korean);
        assert_eq!(sanitized.chars().count(), MAX_BASE_NAME_CHARS);
    }

    #[test]
    fn test_sanitize_filename_is_idempotent() {
        let repeated = "z ".repeat(100);
        for input in [
            "plain",
            "  spaced   out  ",
            "a/b\\c:d",
            "__x__y__",
            "tab\tand\nnewline",
            repeated.as_str(),
            "",
        ] {
            let once = sanitize_filename(input);
            assert_eq!(sanitize_filename(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_base_name_uses_title_then_description() {
        let entry = item(json!({"id": "7", "title": "Sunset at sea", "description": "ignored"}));
        assert_eq!(base_name(&entry), "7_Sunset_at_sea");

        let entry = item(json!({"id": "7", "title": "", "description": "A dog"}));
        assert_eq!(base_name(&entry), "7_A_dog");
    }

    #[test]
    fn test_base_name_falls_back_to_id_then_placeholder() {
        assert_eq!(base_name(&item(json!({"id": "99"}))), "99");
        assert_eq!(base_name(&item(json!({}))), "untitled");
        assert_eq!(base_name(&item(json!({"id": "///"}))), "untitled");
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(extension_from_url("https://i.example.com/a/b/c.png"), ".png");
        assert_eq!(extension_from_url("https://i.example.com/c.JPEG?x=1"), ".JPEG");
        assert_eq!(extension_from_url("https://i.example.com/noext"), ".jpg");
        assert_eq!(extension_from_url("https://i.example.com/dir/"), ".jpg");
        assert_eq!(extension_from_url("not a url"), ".jpg");
    }

    #[test]
    fn test_partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/out/a.jpg")),
            PathBuf::from("/out/a.jpg.part")
        );
    }

    #[test]
    fn test_resolve_no_conflict() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = FilenameResolver::new();
        let path = resolver.resolve(
            temp_dir.path(),
            &item(json!({"id": "1", "title": "cat"})),
            "https://i/x.png",
        );
        assert_eq!(path, temp_dir.path().join("1_cat.png"));
    }

    #[test]
    fn test_resolve_skips_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("1_cat.jpg"), b"1").unwrap();
        std::fs::write(temp_dir.path().join("1_cat_1.jpg"), b"2").unwrap();

        let resolver = FilenameResolver::new();
        let path = resolver.resolve(
            temp_dir.path(),
            &item(json!({"id": "1", "title": "cat"})),
            "https://i/x",
        );
        assert_eq!(path, temp_dir.path().join("1_cat_2.jpg"));
    }

    #[test]
    fn test_resolve_skips_names_with_existing_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("1_cat.jpg.part"), b"user data").unwrap();

        let resolver = FilenameResolver::new();
        let path = resolver.resolve(
            temp_dir.path(),
            &item(json!({"id": "1", "title": "cat"})),
            "https://i/x.jpg",
        );
        assert_eq!(path, temp_dir.path().join("1_cat_1.jpg"));
    }

    #[test]
    fn test_resolve_same_base_name_yields_sequential_suffixes() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = FilenameResolver::new();
        let entry = item(json!({"id": "5", "title": "same"}));

        let paths: Vec<PathBuf> = (0..4)
            .map(|_| {
                let path = resolver.resolve(temp_dir.path(), &entry, "https://i/a.jpg");
                std::fs::write(&path, b"x").unwrap();
                path
            })
            .collect();

        assert_eq!(
            paths,
            vec![
                temp_dir.path().join("5_same.jpg"),
                temp_dir.path().join("5_same_1.jpg"),
                temp_dir.path().join("5_same_2.jpg"),
                temp_dir.path().join("5_same_3.jpg"),
            ]
        );
    }

    #[test]
    fn test_resolve_registry_prevents_duplicates_before_files_exist() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = FilenameResolver::new();
        let entry = item(json!({"id": "5", "title": "same"}));

        let first = resolver.resolve(temp_dir.path(), &entry, "https://i/a.jpg");
        let second = resolver.resolve(temp_dir.path(), &entry, "https://i/a.jpg");
        assert_ne!(first, second);
        assert_eq!(resolver.claimed_count(), 2);

        resolver.release(&first);
        let third = resolver.resolve(temp_dir.path(), &entry, "https://i/a.jpg");
        assert_eq!(third, first);
    }

    #[test]
    fn test_resolve_concurrent_claims_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let resolver = Arc::new(FilenameResolver::new());
        let dir = temp_dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let entry = item(json!({"id": "1", "title": "dup"}));
                    resolver.resolve(&dir, &entry, "https://i/a.jpg")
                })
            })
            .collect();

        let paths: HashSet<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(paths.len(), 8);
    }
}
