use crate::core::error::Result;
use std::path::{Path, PathBuf};

/// Expand glob `patterns` relative to `dir` into existing files.
///
/// Results keep pattern order, are relative to `dir`, and contain no
/// duplicates.
pub fn find_test_files(dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut found: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        for path in glob_files(dir, pattern)? {
            if !found.contains(&path) {
                found.push(path);
            }
        }
    }
    Ok(found)
}

/// Candidate subject filenames, relative to `dir`.
///
/// - one argument naming an existing file: just that file
/// - one argument that is not a file: every file matching `*<arg>*`
/// - several arguments: taken verbatim
/// - no argument: every non-hidden file in `dir`
pub fn discover_subjects(dir: &Path, args: &[String]) -> Result<Vec<String>> {
    let mut subjects = match args {
        [] => glob_names(dir, "*")?,
        [one] if dir.join(one).is_file() => vec![one.clone()],
        [one] => glob_names(dir, &format!("*{}*", glob::Pattern::escape(one)))?,
        many => many.to_vec(),
    };
    subjects.sort();
    subjects.dedup();
    Ok(subjects)
}

/// Drop subjects matching an `ignore` pattern or naming a test file.
pub fn filter_subjects(subjects: Vec<String>, ignore: &[String], test_files: &[PathBuf]) -> Result<Vec<String>> {
    let patterns = ignore
        .iter()
        .map(|p| glob::Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(subjects
        .into_iter()
        .filter(|subject| {
            let ignored = patterns.iter().any(|p| p.matches(subject));
            let is_test_file = test_files.iter().any(|t| Path::new(subject) == t);
            if ignored || is_test_file {
                tracing::debug!(subject = %subject, ignored, is_test_file, "not a subject");
            }
            !ignored && !is_test_file
        })
        .collect())
}

fn glob_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let full = Path::new(&base).join(pattern);
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let mut files = Vec::new();
    for entry in glob::glob_with(&full.to_string_lossy(), options)? {
        let Ok(path) = entry else { continue };
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(dir).map(Path::to_path_buf).unwrap_or(path);
        files.push(relative);
    }
    Ok(files)
}

fn glob_names(dir: &Path, pattern: &str) -> Result<Vec<String>> {
    Ok(glob_files(dir, pattern)?
        .into_iter()
        .map(|p| p.display().to_string())
        .collect())
}
