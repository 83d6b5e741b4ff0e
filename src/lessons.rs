//! Lesson library
//!
//! Lessons are JSON files in a data directory. The menu is built once at
//! startup; lesson bodies are re-read on every request so edits show up
//! without a restart.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Menu entry for one lesson file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub slug: String,
    pub title: String,
}

/// A parsed lesson table
#[derive(Debug, Clone)]
pub struct Lesson {
    pub title: String,
    pub columns: Vec<String>,
    /// Column whose cells get a pronunciation link
    pub speak: Option<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LessonFile {
    title: String,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    speak: Option<String>,
    #[serde(default)]
    entries: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct TitleOnly {
    title: String,
}

impl Lesson {
    fn from_file(file: LessonFile) -> Self {
        let columns = file.columns.unwrap_or_else(|| {
            file.entries
                .first()
                .map(|entry| entry.keys().cloned().collect())
                .unwrap_or_default()
        });

        let speak = file
            .speak
            .filter(|c| columns.contains(c))
            .or_else(|| columns.first().cloned());

        let rows = file
            .entries
            .iter()
            .map(|entry| {
                columns
                    .iter()
                    .map(|col| match entry.get(col) {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    })
                    .collect()
            })
            .collect();

        Self {
            title: file.title,
            columns,
            speak,
            rows,
        }
    }

    /// Index of the speakable column, if any
    pub fn speak_index(&self) -> Option<usize> {
        let speak = self.speak.as_ref()?;
        self.columns.iter().position(|c| c == speak)
    }
}

pub struct Library {
    data_dir: PathBuf,
    sections: Vec<Section>,
}

impl Library {
    /// Scan `data_dir` for `*.json` lessons and build the menu
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&data_dir)
            .with_context(|| format!("Failed to read lesson directory {}", data_dir.display()))?;

        let mut sections = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(slug) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match read_title(&path) {
                Ok(title) => sections.push(Section {
                    slug: slug.to_string(),
                    title,
                }),
                Err(e) => warn!("Skipping lesson {}: {:#}", path.display(), e),
            }
        }
        sections.sort_by(|a, b| a.slug.cmp(&b.slug));

        info!("Loaded {} lessons from {}", sections.len(), data_dir.display());
        Ok(Self { data_dir, sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Read a lesson fresh from disk. `None` for slugs not in the menu or
    /// files that have since disappeared.
    pub fn lesson(&self, slug: &str) -> Result<Option<Lesson>> {
        if !self.sections.iter().any(|s| s.slug == slug) {
            return Ok(None);
        }

        let path = self.data_dir.join(format!("{}.json", slug));
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Lesson file vanished: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        let file: LessonFile = serde_json::from_str(&text)
            .with_context(|| format!("Invalid lesson file {}", path.display()))?;
        Ok(Some(Lesson::from_file(file)))
    }
}

fn read_title(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)?;
    let parsed: TitleOnly = serde_json::from_str(&text)?;
    Ok(parsed.title)
}


#[cfg(test)]
mod tests {
    use super::testing::{TempLessons, NOUNS, VERBS};
    use super::*;

    #[test]
    fn menu_lists_json_files_sorted_by_slug() {
        let tmp = TempLessons::new(&[
            ("verbs.json", VERBS),
            ("nouns.json", NOUNS),
            ("readme.txt", "not a lesson"),
            ("broken.json", "{ nope"),
        ]);
        let library = Library::load(&tmp.dir).unwrap();

        assert_eq!(
            library.sections(),
            &[
                Section { slug: "nouns".into(), title: "Nouns".into() },
                Section { slug: "verbs".into(), title: "Verbs".into() },
            ]
        );
    }

    #[test]
    fn columns_default_to_first_entry_key_order() {
        let tmp = TempLessons::new(&[("nouns.json", NOUNS)]);
        let library = Library::load(&tmp.dir).unwrap();
        let lesson = library.lesson("nouns").unwrap().unwrap();

        assert_eq!(lesson.columns, vec!["greek", "english"]);
        assert_eq!(lesson.speak.as_deref(), Some("greek"));
        assert_eq!(lesson.speak_index(), Some(0));
        assert_eq!(lesson.rows[1], vec!["νερό", "water"]);
    }

    #[test]
    fn explicit_columns_and_speak_column() {
        let tmp = TempLessons::new(&[("verbs.json", VERBS)]);
        let library = Library::load(&tmp.dir).unwrap();
        let lesson = library.lesson("verbs").unwrap().unwrap();

        assert_eq!(lesson.speak_index(), Some(1));
        assert_eq!(lesson.rows[0], vec!["to eat", "τρώω", "1"]);
    }

    #[test]
    fn unknown_slug_is_none() {
        let tmp = TempLessons::new(&[("nouns.json", NOUNS)]);
        let library = Library::load(&tmp.dir).unwrap();

        assert!(library.lesson("adjectives").unwrap().is_none());
        assert!(library.lesson("../nouns").unwrap().is_none());
    }

    #[test]
    fn lesson_is_reread_from_disk() {
        let tmp = TempLessons::new(&[("nouns.json", NOUNS)]);
        let library = Library::load(&tmp.dir).unwrap();

        std::fs::write(
            tmp.dir.join("nouns.json"),
            r#"{"title": "Nouns (revised)", "entries": []}"#,
        )
        .unwrap();
        let lesson = library.lesson("nouns").unwrap().unwrap();
        assert_eq!(lesson.title, "Nouns (revised)");
        assert!(lesson.rows.is_empty());

        std::fs::remove_file(tmp.dir.join("nouns.json")).unwrap();
        assert!(library.lesson("nouns").unwrap().is_none());
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(Library::load("/nonexistent/glossa/lessons").is_err());
    }
}
