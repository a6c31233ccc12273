use super::errors::RewriteError;
use super::matcher::{self, LocatorAssignment};
use super::strategy::Strategy;
use crate::report::{NullReporter, Reporter, StatusEvent};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Namespace token used by Selenium's Python bindings (`By.XPATH`).
pub const DEFAULT_NAMESPACE: &str = "By";

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Replacement value for a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocator {
    pub strategy: Strategy,
    pub selector: String,
}

impl NewLocator {
    pub fn new(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self {
            strategy,
            selector: selector.into(),
        }
    }

    /// Build from a free-form strategy name such as `"xpath"` or `"css selector"`.
    pub fn parse(strategy: &str, selector: impl Into<String>) -> Result<Self, RewriteError> {
        let strategy = strategy
            .parse::<Strategy>()
            .map_err(|e| RewriteError::UnknownStrategy(e.0))?;
        Ok(Self::new(strategy, selector))
    }
}

/// Result of a single locator update.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "UpdateOutcome reports whether the locator was found"]
pub enum UpdateOutcome {
    /// The matching line was replaced and the file rewritten.
    Updated {
        file: PathBuf,
        line_number: usize,
        previous: String,
        new_line: String,
    },
    /// The matching line already had the requested value; file untouched.
    AlreadyCurrent { file: PathBuf, line_number: usize },
    /// No matching line; file untouched.
    NotFound {
        file: PathBuf,
        suggestion: Option<String>,
    },
}

impl UpdateOutcome {
    /// Whether a matching line was found and now holds the requested value.
    pub fn updated(&self) -> bool {
        !matches!(self, UpdateOutcome::NotFound { .. })
    }

    pub fn file(&self) -> &Path {
        match self {
            UpdateOutcome::Updated { file, .. }
            | UpdateOutcome::AlreadyCurrent { file, .. }
            | UpdateOutcome::NotFound { file, .. } => file,
        }
    }
}

/// Outcome plus before/after text, computed without touching the file.
#[derive(Debug, Clone)]
pub struct Preview {
    pub outcome: UpdateOutcome,
    pub original: String,
    pub modified: String,
}

/// The line replaced by [`rewrite_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    /// 1-based.
    pub line_number: usize,
    /// Previous line, without its terminator.
    pub previous: String,
    /// Replacement line, without its terminator.
    pub replacement: String,
}

/// Render the canonical assignment line, including the trailing newline.
pub fn render_line(name: &str, locator: &NewLocator, namespace: &str) -> String {
    let mut escaped = String::with_capacity(locator.selector.len());
    for c in locator.selector.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!(
        "{name} = ({namespace}.{}, \"{escaped}\")\n",
        locator.strategy.token()
    )
}

/// Replace the first line assigning `name` within `content`.
///
/// Returns the new content and the change made, or `None` (with the content
/// unchanged) when no line matches.
pub fn rewrite_content(
    content: &str,
    name: &str,
    locator: &NewLocator,
    namespace: &str,
) -> (String, Option<LineChange>) {
    let replacement = render_line(name, locator, namespace);
    let mut output = String::with_capacity(content.len() + replacement.len());
    let mut change = None;

    for (idx, line) in content.split_inclusive('\n').enumerate() {
        if change.is_none() && matcher::matches_name(line, name, namespace) {
            output.push_str(&replacement);
            change = Some(LineChange {
                line_number: idx + 1,
                previous: matcher::line_body(line).to_string(),
                replacement: matcher::line_body(&replacement).to_string(),
            });
        } else {
            output.push_str(line);
        }
    }

    (output, change)
}

/// Every recognized assignment in `content`, in file order.
pub fn list_assignments(content: &str, namespace: &str) -> Vec<LocatorAssignment> {
    content
        .split_inclusive('\n')
        .filter_map(|line| matcher::parse_assignment(line, namespace))
        .collect()
}

fn validate_request(name: &str, locator: &NewLocator) -> Result<(), RewriteError> {
    let invalid = |reason| RewriteError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("must start with a letter or underscore"))
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ASCII letters, digits and underscores are allowed"));
    }

    if locator.selector.contains(['\n', '\r']) {
        return Err(RewriteError::InvalidSelector(locator.selector.clone()));
    }
    Ok(())
}

fn read_text(path: &Path) -> Result<String, RewriteError> {
    let bytes = fs::read(path).map_err(|source| RewriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| RewriteError::Utf8 {
        path: path.to_path_buf(),
    })
}

/// Atomic file write: tempfile in the same directory, fsync, rename.
///
/// The original file's permissions are carried over to the replacement.
fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Rewrites locator assignments in files on disk.
pub struct LocatorRewriter<'r> {
    namespace: String,
    reporter: &'r dyn Reporter,
}

impl Default for LocatorRewriter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorRewriter<'static> {
    /// Rewriter for `By.*` locators that reports nothing.
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            reporter: &NullReporter,
        }
    }
}

impl<'r> LocatorRewriter<'r> {
    pub fn with_reporter<'n>(self, reporter: &'n dyn Reporter) -> LocatorRewriter<'n> {
        LocatorRewriter {
            namespace: self.namespace,
            reporter,
        }
    }

    /// Use a namespace other than `By` (e.g. `AppiumBy`).
    ///
    /// Only the namespace changes. Replacement strategies are still the eight
    /// [`Strategy`] values, so a line such as `AppiumBy.ACCESSIBILITY_ID` can
    /// be found and rewritten to `AppiumBy.XPATH` but never written back with
    /// an Appium-only strategy.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Apply the update to in-memory `content` that was read from `file`.
    pub fn rewrite_text(
        &self,
        file: &Path,
        content: &str,
        name: &str,
        locator: &NewLocator,
    ) -> Result<(String, UpdateOutcome), RewriteError> {
        validate_request(name, locator)?;
        let (modified, change) = rewrite_content(content, name, locator, &self.namespace);

        let outcome = match change {
            None => UpdateOutcome::NotFound {
                file: file.to_path_buf(),
                suggestion: self.suggest(content, name),
            },
            Some(change) if modified == content => UpdateOutcome::AlreadyCurrent {
                file: file.to_path_buf(),
                line_number: change.line_number,
            },
            Some(change) => UpdateOutcome::Updated {
                file: file.to_path_buf(),
                line_number: change.line_number,
                previous: change.previous,
                new_line: change.replacement,
            },
        };
        Ok((modified, outcome))
    }

    /// Compute the update for `name` without writing anything.
    pub fn preview(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        locator: &NewLocator,
    ) -> Result<Preview, RewriteError> {
        let path = path.as_ref();
        let original = read_text(path)?;
        let (modified, outcome) = self.rewrite_text(path, &original, name, locator)?;

        Ok(Preview {
            outcome,
            original,
            modified,
        })
    }

    /// Rewrite the first line assigning `name` in the file at `path`.
    ///
    /// A missing name is not an error: the file is left untouched and the
    /// outcome is [`UpdateOutcome::NotFound`].
    pub fn update(
        &self,
        path: impl AsRef<Path>,
        name: &str,
        locator: &NewLocator,
    ) -> Result<UpdateOutcome, RewriteError> {
        let path = path.as_ref();
        let preview = self.preview(path, name, locator)?;

        if let UpdateOutcome::Updated { .. } = preview.outcome {
            atomic_write(path, preview.modified.as_bytes()).map_err(|source| {
                RewriteError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }

        self.report(name, &preview.outcome);
        Ok(preview.outcome)
    }

    /// All recognized assignments in the file at `path`.
    pub fn list(&self, path: impl AsRef<Path>) -> Result<Vec<LocatorAssignment>, RewriteError> {
        let content = read_text(path.as_ref())?;
        Ok(list_assignments(&content, &self.namespace))
    }

    fn suggest(&self, content: &str, name: &str) -> Option<String> {
        list_assignments(content, &self.namespace)
            .into_iter()
            .map(|a| (strsim::jaro_winkler(name, &a.name), a.name))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate)
    }

    /// Emit tracing and status output for an outcome.
    fn report(&self, name: &str, outcome: &UpdateOutcome) {
        let event = match outcome {
            UpdateOutcome::Updated {
                file,
                line_number,
                new_line,
                ..
            } => {
                info!(file = %file.display(), name, line_number, "locator updated");
                StatusEvent::LocatorUpdated {
                    file: file.clone(),
                    name: name.to_string(),
                    line_number: *line_number,
                    new_line: new_line.clone(),
                }
            }
            UpdateOutcome::AlreadyCurrent { file, line_number } => {
                debug!(file = %file.display(), name, line_number, "locator already current");
                StatusEvent::LocatorUnchanged {
                    file: file.clone(),
                    name: name.to_string(),
                }
            }
            UpdateOutcome::NotFound { file, suggestion } => {
                warn!(file = %file.display(), name, ?suggestion, "locator variable not found");
                StatusEvent::LocatorNotFound {
                    file: file.clone(),
                    name: name.to_string(),
                    suggestion: suggestion.clone(),
                }
            }
        };
        self.reporter.report(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingReporter;

    const LOCATORS: &str = "from selenium.webdriver.common.by import By\n\
\n\
EMAILBOX_LOCATOR = (By.ID, \"email\")\n\
LOGIN_BUTTON2 = (By.ID, 'login2')\n\
LOGIN_BUTTON = (By.CSS_SELECTOR, \"#login\")\n";

    fn xpath(selector: &str) -> NewLocator {
        NewLocator::new(Strategy::Xpath, selector)
    }

    #[test]
    fn test_render_line_canonical() {
        assert_eq!(
            render_line("EMAILBOX_LOCATOR", &xpath("//input[@id='email']"), "By"),
            "EMAILBOX_LOCATOR = (By.XPATH, \"//input[@id='email']\")\n"
        );
    }

    #[test]
    fn test_render_line_escapes_double_quotes() {
        assert_eq!(
            render_line("A", &xpath("//input[@id=\"email\"]"), "By"),
            "A = (By.XPATH, \"//input[@id=\\\"email\\\"]\")\n"
        );
    }

    #[test]
    fn test_rewrite_content_replaces_only_target() {
        let (out, change) =
            rewrite_content(LOCATORS, "LOGIN_BUTTON", &xpath("//button"), "By");
        let change = change.unwrap();
        assert_eq!(change.line_number, 5);
        assert_eq!(change.previous, "LOGIN_BUTTON = (By.CSS_SELECTOR, \"#login\")");
        assert!(out.contains("LOGIN_BUTTON2 = (By.ID, 'login2')\n"));
        assert!(out.ends_with("LOGIN_BUTTON = (By.XPATH, \"//button\")\n"));
    }

    #[test]
    fn test_rewrite_content_first_match_only() {
        let content = "A = (By.ID, 'one')\nA = (By.ID, 'two')\n";
        let (out, _) = rewrite_content(content, "A", &xpath("//x"), "By");
        assert_eq!(out, "A = (By.XPATH, \"//x\")\nA = (By.ID, 'two')\n");
    }

    #[test]
    fn test_rewrite_content_preserves_crlf_elsewhere() {
        let content = "# header\r\nA = (By.ID, 'one')\r\nB = (By.ID, 'two')\r\n";
        let (out, _) = rewrite_content(content, "A", &xpath("//x"), "By");
        assert_eq!(
            out,
            "# header\r\nA = (By.XPATH, \"//x\")\nB = (By.ID, 'two')\r\n"
        );
    }

    #[test]
    fn test_rewrite_content_last_line_without_newline() {
        let (out, change) = rewrite_content("A = (By.ID, 'one')", "A", &xpath("//x"), "By");
        assert!(change.is_some());
        assert_eq!(out, "A = (By.XPATH, \"//x\")\n");
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let loc = xpath("//x");
        assert!(matches!(
            validate_request("", &loc),
            Err(RewriteError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_request("1ABC", &loc),
            Err(RewriteError::InvalidName { .. })
        ));
        assert!(matches!(
            validate_request("A.B", &loc),
            Err(RewriteError::InvalidName { .. })
        ));
        assert!(validate_request("_PRIVATE_1", &loc).is_ok());
    }

    #[test]
    fn test_validate_rejects_multiline_selector() {
        assert!(matches!(
            validate_request("A", &xpath("//a\n//b")),
            Err(RewriteError::InvalidSelector(_))
        ));
    }

    #[test]
    fn test_new_locator_parse_unknown() {
        assert!(matches!(
            NewLocator::parse("shadow-root", "x"),
            Err(RewriteError::UnknownStrategy(s)) if s == "shadow-root"
        ));
    }

    #[test]
    fn test_update_writes_file_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.py");
        fs::write(&path, LOCATORS).unwrap();

        let reporter = RecordingReporter::new();
        let rewriter = LocatorRewriter::new().with_reporter(&reporter);
        let outcome = rewriter
            .update(&path, "EMAILBOX_LOCATOR", &xpath("//input[@id='email']"))
            .unwrap();

        assert!(outcome.updated());
        assert!(matches!(outcome, UpdateOutcome::Updated { line_number: 3, .. }));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("EMAILBOX_LOCATOR = (By.XPATH, \"//input[@id='email']\")\n"));
        assert!(matches!(
            reporter.events().as_slice(),
            [StatusEvent::LocatorUpdated { line_number: 3, .. }]
        ));
    }

    #[test]
    fn test_update_twice_is_already_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.py");
        fs::write(&path, LOCATORS).unwrap();

        let rewriter = LocatorRewriter::new();
        let loc = xpath("//input");
        let first = rewriter.update(&path, "LOGIN_BUTTON", &loc).unwrap();
        let after_first = fs::read(&path).unwrap();
        let second = rewriter.update(&path, "LOGIN_BUTTON", &loc).unwrap();

        assert!(matches!(first, UpdateOutcome::Updated { .. }));
        assert!(matches!(second, UpdateOutcome::AlreadyCurrent { line_number: 5, .. }));
        assert!(second.updated());
        assert_eq!(fs::read(&path).unwrap(), after_first);
    }

    #[test]
    fn test_update_not_found_suggests_close_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.py");
        fs::write(&path, LOCATORS).unwrap();

        let reporter = RecordingReporter::new();
        let rewriter = LocatorRewriter::new().with_reporter(&reporter);
        let outcome = rewriter
            .update(&path, "EMAILBOX_LOCATR", &xpath("//x"))
            .unwrap();

        assert!(!outcome.updated());
        assert_eq!(
            outcome,
            UpdateOutcome::NotFound {
                file: path.clone(),
                suggestion: Some("EMAILBOX_LOCATOR".to_string()),
            }
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), LOCATORS);
        assert!(matches!(
            reporter.events().as_slice(),
            [StatusEvent::LocatorNotFound { .. }]
        ));
    }

    #[test]
    fn test_update_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocatorRewriter::new().update(
            dir.path().join("missing.py"),
            "A",
            &xpath("//x"),
        );
        assert!(matches!(result, Err(RewriteError::Io { .. })));
    }

    #[test]
    fn test_update_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.py");
        fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();
        let result = LocatorRewriter::new().update(&path, "A", &xpath("//x"));
        assert!(matches!(result, Err(RewriteError::Utf8 { .. })));
    }

    #[test]
    fn test_custom_namespace_rewrites_foreign_strategy_to_known_one() {
        let content = "MENU = (AppiumBy.ACCESSIBILITY_ID, \"menu\")\n";
        let rewriter = LocatorRewriter::new().with_namespace("AppiumBy");

        let listed = list_assignments(content, rewriter.namespace());
        assert_eq!(listed[0].strategy_token, "ACCESSIBILITY_ID");
        assert_eq!(listed[0].strategy(), None);
        assert!(NewLocator::parse("accessibility id", "menu").is_err());

        let (out, outcome) = rewriter
            .rewrite_text(Path::new("menu.py"), content, "MENU", &xpath("//menu"))
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated { line_number: 1, .. }));
        assert_eq!(out, "MENU = (AppiumBy.XPATH, \"//menu\")\n");
    }

    #[test]
    fn test_io_error_message_leaves_cause_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.py");
        let err = LocatorRewriter::new()
            .update(&path, "A", &xpath("//x"))
            .unwrap_err();

        assert_eq!(err.to_string(), format!("I/O error on {}", path.display()));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_list_assignments() {
        let names: Vec<_> = list_assignments(LOCATORS, "By")
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["EMAILBOX_LOCATOR", "LOGIN_BUTTON2", "LOGIN_BUTTON"]);
    }

    #[test]
    #[cfg(unix)]
    fn test_update_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.py");
        fs::write(&path, LOCATORS).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let _ = LocatorRewriter::new()
            .update(&path, "LOGIN_BUTTON", &xpath("//x"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
