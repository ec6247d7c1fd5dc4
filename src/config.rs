use crate::table::NormalizeOptions;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable naming the folder that holds the project folders.
pub const ROOT_FOLDER_ENV: &str = "CONSTRUCTION_FOLDER_PATH";

pub const DEFAULT_ROOT_FOLDER: &str = "./Construction";

/// Settings shared by the pipeline and the command line.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub root: PathBuf,
    pub normalize: NormalizeOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT_FOLDER),
            normalize: NormalizeOptions::default(),
        }
    }
}

impl Config {
    /// Root folder from [`ROOT_FOLDER_ENV`], falling back to the default.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var_os(ROOT_FOLDER_ENV))
    }

    fn from_env_value(value: Option<OsString>) -> Self {
        Config::default().with_root(value.map(PathBuf::from))
    }

    /// Replaces the root folder when `root` is given and not empty.
    pub fn with_root(mut self, root: Option<PathBuf>) -> Self {
        if let Some(root) = root.filter(|root| !root.as_os_str().is_empty()) {
            self.root = root;
        }
        self
    }

    pub fn with_normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }
}
