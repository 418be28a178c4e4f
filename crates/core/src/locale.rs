use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Display language offered by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Th,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::Th];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Th => "th",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::UnsupportedLanguage(s.to_string()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default)]
    language: Option<Language>,
}

/// The single locally persisted preference: the chosen display language.
///
/// Stored as a small JSON document under one `language` key. A missing or
/// unreadable file means the default language.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
}

impl Preferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current language, falling back to [`Language::default`].
    pub fn language(&self) -> Language {
        std::fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<PreferenceFile>(&bytes).ok())
            .and_then(|file| file.language)
            .unwrap_or_default()
    }

    pub fn set_language(&self, language: Language) -> Result<(), AppError> {
        let file = PreferenceFile {
            language: Some(language),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        std::fs::write(&self.path, bytes).map_err(|source| AppError::PreferencesWrite {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!(
            language = %language,
            path = %self.path.display(),
            "Language preference saved"
        );
        Ok(())
    }
}
