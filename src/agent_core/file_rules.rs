//! Workspace file rules.
//!
//! Two files in the workspace root, both in gitignore syntax:
//!
//! - `.codeloopignore`: paths hidden from the agent. Ignored entries are left
//!   out of listings and cannot be read.
//! - `.codeloopprotected`: paths the agent may read but never modify.
//!
//! Syntax:
//!
//! - blank lines and lines starting with `#` are skipped
//! - `!pattern` re-includes what an earlier rule matched; the last matching
//!   rule wins
//! - a trailing `/` makes a rule match directories only
//! - a pattern without `/` is matched against the basename, anything else
//!   against the whole workspace-relative path
//! - `*` and `?` stop at `/`, `**` crosses directories, `[...]` is a class

use std::path::Path;

use globset::{GlobBuilder, GlobMatcher};

use super::tools::FileSystem;

pub const IGNORE_FILE_NAME: &str = ".codeloopignore";
pub const PROTECT_FILE_NAME: &str = ".codeloopprotected";

// ─── Rules ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Rule {
    matcher: GlobMatcher,
    negated: bool,
    directory_only: bool,
    basename_only: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let (directory_only, pattern) = match pattern.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        if pattern.is_empty() {
            return None;
        }

        let glob = match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => glob,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "skipping invalid file rule");
                return None;
            }
        };

        Some(Self {
            matcher: glob.compile_matcher(),
            negated,
            directory_only,
            basename_only: !pattern.contains('/'),
        })
    }

    fn matches(&self, path: &str) -> bool {
        if self.basename_only {
            let basename = path.rsplit('/').next().unwrap_or(path);
            self.matcher.is_match(basename)
        } else {
            self.matcher.is_match(path)
        }
    }
}

/// Parsed `.codeloopignore` rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Parse rule file content, one rule per line.
    pub fn parse(content: &str) -> Self {
        Self {
            rules: content.lines().filter_map(Rule::parse).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` itself matches the rules. Backslashes count as `/` and
    /// a leading `/` is dropped.
    pub fn is_ignored(&self, path: &str, is_directory: bool) -> bool {
        let path = normalize(path);
        self.matches_normalized(&path, is_directory)
    }

    /// Like [`is_ignored`](Self::is_ignored), but also true when any parent
    /// directory of `path` is ignored.
    pub fn excludes(&self, path: &str, is_directory: bool) -> bool {
        let path = normalize(path);
        path.match_indices('/')
            .any(|(end, _)| self.matches_normalized(&path[..end], true))
            || self.matches_normalized(&path, is_directory)
    }

    fn matches_normalized(&self, path: &str, is_directory: bool) -> bool {
        let mut ignored = false;
        for rule in &self.rules {
            if rule.directory_only && !is_directory {
                continue;
            }
            if rule.matches(path) {
                ignored = !rule.negated;
            }
        }
        ignored
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    match path.strip_prefix('/') {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Parsed `.codeloopprotected` rules. Same syntax as [`IgnoreRules`];
/// everything inside a protected directory is protected too.
#[derive(Debug, Clone, Default)]
pub struct ProtectRules(IgnoreRules);

impl ProtectRules {
    pub fn parse(content: &str) -> Self {
        Self(IgnoreRules::parse(content))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.0.excludes(path, false)
    }
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// Both rule sets of one workspace.
#[derive(Debug, Clone, Default)]
pub struct FileRules {
    pub ignore: IgnoreRules,
    pub protect: ProtectRules,
}

impl FileRules {
    /// Read the rule files from `root`. A missing or unreadable file means no
    /// rules of that kind.
    pub async fn load<F: FileSystem + ?Sized>(fs: &F, root: &Path) -> Self {
        let ignore = read_rules(fs, &root.join(IGNORE_FILE_NAME)).await;
        let protect = read_rules(fs, &root.join(PROTECT_FILE_NAME)).await;
        let rules = Self {
            ignore: IgnoreRules::parse(&ignore),
            protect: ProtectRules::parse(&protect),
        };
        tracing::info!(
            root = %root.display(),
            ignore_rules = rules.ignore.rules.len(),
            protect_rules = rules.protect.0.rules.len(),
            "file rules loaded"
        );
        rules
    }
}

async fn read_rules<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> String {
    match fs.read_file(path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no rule file");
            String::new()
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::tools::LocalFileSystem;

    #[test]
    fn test_simple_patterns() {
        let ignore = IgnoreRules::parse("*.log\n*.tmp");
        assert!(ignore.is_ignored("debug.log", false));
        assert!(ignore.is_ignored("temp.tmp", false));
        assert!(!ignore.is_ignored("index.ts", false));
    }

    #[test]
    fn test_directory_only_patterns() {
        let ignore = IgnoreRules::parse("node_modules/\nbuild/");
        assert!(ignore.is_ignored("node_modules", true));
        assert!(!ignore.is_ignored("node_modules", false));
        assert!(ignore.is_ignored("build", true));
    }

    #[test]
    fn test_negation_last_match_wins() {
        let ignore = IgnoreRules::parse("*.log\n!important.log");
        assert!(ignore.is_ignored("debug.log", false));
        assert!(!ignore.is_ignored("important.log", false));
    }

    #[test]
    fn test_double_star_crosses_directories() {
        let ignore = IgnoreRules::parse("**/test/**");
        assert!(ignore.is_ignored("test/file.ts", false));
        assert!(ignore.is_ignored("src/test/file.ts", false));
        assert!(!ignore.is_ignored("src/testing/file.ts", false));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let ignore = IgnoreRules::parse("# This is a comment\n\n*.log\n  # Another comment");
        assert!(ignore.is_ignored("debug.log", false));
        assert!(!ignore.is_ignored("# This is a comment", false));
    }

    #[test]
    fn test_windows_separators() {
        let ignore = IgnoreRules::parse("*.log");
        assert!(ignore.is_ignored("path\\to\\debug.log", false));
    }

    #[test]
    fn test_path_patterns_match_whole_path() {
        let ignore = IgnoreRules::parse("src/*.test.ts");
        assert!(ignore.is_ignored("src/app.test.ts", false));
        assert!(ignore.is_ignored("/src/app.test.ts", false));
        assert!(!ignore.is_ignored("lib/app.test.ts", false));
        assert!(!ignore.is_ignored("src/nested/app.test.ts", false));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let ignore = IgnoreRules::parse("log?.txt\ncache[0-9]");
        assert!(ignore.is_ignored("log1.txt", false));
        assert!(!ignore.is_ignored("log12.txt", false));
        assert!(ignore.is_ignored("cache7", true));
        assert!(!ignore.is_ignored("cachex", true));
    }

    #[test]
    fn test_excludes_checks_parent_directories() {
        let ignore = IgnoreRules::parse("target/");
        assert!(!ignore.is_ignored("target/debug/app", false));
        assert!(ignore.excludes("target/debug/app", false));
        assert!(!ignore.excludes("src/target.rs", false));
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let ignore = IgnoreRules::parse("[unclosed\n*.log");
        assert!(ignore.is_ignored("a.log", false));
        assert_eq!(ignore.rules.len(), 1);
    }

    #[test]
    fn test_protect_patterns() {
        let protect = ProtectRules::parse("*.env\nsecrets/");
        assert!(protect.is_protected(".env"));
        assert!(protect.is_protected("production.env"));
        assert!(protect.is_protected("secrets/api.txt"));
        assert!(!protect.is_protected("index.ts"));
    }

    #[test]
    fn test_protect_lock_files_and_keys() {
        let protect = ProtectRules::parse("package-lock.json\nyarn.lock\n*.key\n*.pem");
        assert!(protect.is_protected("package-lock.json"));
        assert!(protect.is_protected("yarn.lock"));
        assert!(protect.is_protected("server.key"));
        assert!(protect.is_protected("cert.pem"));
        assert!(!protect.is_protected("index.js"));
    }

    #[tokio::test]
    async fn test_load_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IGNORE_FILE_NAME), "dist/\n").unwrap();

        let rules = FileRules::load(&LocalFileSystem, dir.path()).await;
        assert!(rules.ignore.is_ignored("dist", true));
        assert!(rules.protect.is_empty());
    }
}
