//! Discovery of project folders and the spreadsheets inside them.
//!
//! The root folder holds one directory per construction project; each project
//! directory holds spreadsheet files directly. Missing or unreadable folders
//! read as empty.

use glob::MatchOptions;
use glob::Pattern;
use std::collections::BTreeSet;
use std::path::Path;

/// File name patterns of the spreadsheets a project folder is scanned for.
pub const SPREADSHEET_PATTERNS: [&str; 7] = ["*.xlsx", "*.xlsm", "*.xltx", "*.xltm", "*.xlam", "*.ods", "*.csv"];

/// Office writes `~$name.xlsx` lock files next to open workbooks.
const LOCK_FILE_PREFIX: char = '~';

/// Names of the directories directly under `root`, sorted.
pub fn project_folders(root: impl AsRef<Path>) -> Vec<String> {
    let root = root.as_ref();
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(error) => {
            log::debug!("Cannot list '{}': {error}", root.display());
            return Vec::new();
        }
    };

    let mut folders: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    folders.sort();
    folders
}

/// Names of the spreadsheet files directly inside `project`, sorted and
/// de-duplicated. Extensions match case-insensitively; lock files are skipped.
pub fn spreadsheet_files(project: impl AsRef<Path>) -> Vec<String> {
    let project = project.as_ref();
    if !project.is_dir() {
        log::debug!("'{}' is not a folder", project.display());
        return Vec::new();
    }

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let folder = Pattern::escape(&project.to_string_lossy());
    let mut files = BTreeSet::new();
    for pattern in SPREADSHEET_PATTERNS {
        let paths = match glob::glob_with(&format!("{folder}/{pattern}"), options) {
            Ok(paths) => paths,
            Err(error) => {
                log::warn!("Invalid file pattern under '{}': {error}", project.display());
                continue;
            }
        };
        for path in paths {
            match path {
                Ok(path) if path.is_file() => {
                    if let Some(name) = path.file_name().map(|name| name.to_string_lossy().into_owned()) {
                        if !name.starts_with(LOCK_FILE_PREFIX) {
                            files.insert(name);
                        }
                    }
                }
                Ok(_) => (),
                Err(error) => log::warn!("Skipping unreadable entry: {error}"),
            }
        }
    }
    files.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_project_folders() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Tower B")).unwrap();
        fs::create_dir(root.path().join("Bridge")).unwrap();
        fs::write(root.path().join("notes.txt"), "").unwrap();

        assert_eq!(project_folders(root.path()), vec!["Bridge", "Tower B"]);
        assert!(project_folders(root.path().join("missing")).is_empty());
    }

    #[test]
    fn test_spreadsheet_files() {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("Site [2024]");
        fs::create_dir(&project).unwrap();
        for name in [
            "budget.xlsx",
            "Schedule.ODS",
            "crew.csv",
            "~$budget.xlsx",
            "notes.txt",
            "macros.xlsm",
            "legacy.xls",
            "Template.XLTX",
            "forms.xltm",
        ] {
            fs::write(project.join(name), "").unwrap();
        }
        fs::create_dir(project.join("archive.xlsx")).unwrap();

        assert_eq!(
            spreadsheet_files(&project),
            vec!["Schedule.ODS", "Template.XLTX", "budget.xlsx", "crew.csv", "forms.xltm", "macros.xlsm"]
        );
        assert!(spreadsheet_files(root.path().join("missing")).is_empty());
    }
}
