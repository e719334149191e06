//! Side-files holding the names behind integer labels and vocabulary
//! indices.

use std::fs;
use std::path::Path;

use crate::error::{MailclassError, Result};

/// Check that every label name survives a [`write_label_names`] round trip.
pub fn check_label_names(names: &[String]) -> Result<()> {
    for name in names {
        if name.is_empty() || name.contains([',', '\n', '\r']) {
            return Err(MailclassError::invalid_argument(format!(
                "label name {name:?} cannot be stored in a comma-separated list"
            )));
        }
    }
    Ok(())
}

/// Check that every word survives a [`write_words`] round trip.
pub fn check_words(words: &[String]) -> Result<()> {
    for word in words {
        if word.is_empty() || word.contains(['\n', '\r']) {
            return Err(MailclassError::invalid_argument(format!(
                "vocabulary word {word:?} cannot be stored one per line"
            )));
        }
    }
    Ok(())
}

/// Write label names as one comma-joined line.
pub fn write_label_names(path: &Path, names: &[String]) -> Result<()> {
    check_label_names(names)?;
    fs::write(path, names.join(","))?;
    Ok(())
}

/// Read label names written by [`write_label_names`].
///
/// Only the first line is significant. An empty file means no labels.
pub fn read_label_names(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let line = content.lines().next().unwrap_or("").trim_end();
    if line.is_empty() {
        return Ok(Vec::new());
    }
    Ok(line.split(',').map(str::to_string).collect())
}

/// Write vocabulary words, one per line, in index order.
pub fn write_words(path: &Path, words: &[String]) -> Result<()> {
    check_words(words)?;
    let mut content = String::new();
    for word in words {
        content.push_str(word);
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Read vocabulary words written by [`write_words`].
pub fn read_words(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_names_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.txt");

        write_label_names(&path, &strings(&["work", "family", "Cool Stuff"])).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "work,family,Cool Stuff");
        assert_eq!(
            read_label_names(&path).unwrap(),
            strings(&["work", "family", "Cool Stuff"])
        );
    }

    #[test]
    fn test_empty_label_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.txt");

        write_label_names(&path, &[]).unwrap();
        assert!(read_label_names(&path).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unstorable_label() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info.txt");

        for bad in ["a,b", "two\nlines", ""] {
            let result = write_label_names(&path, &strings(&["ok", bad]));
            assert!(matches!(result, Err(MailclassError::InvalidArgument(_))));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_check_words() {
        assert!(check_words(&strings(&["a", "b c"])).is_ok());
        assert!(check_words(&strings(&["a", "b\r"])).is_err());
        assert!(check_words(&strings(&[""])).is_err());
    }

    #[test]
    fn test_words_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vocab.txt");
        let words = strings(&["the", "don't", "label", "naïve"]);

        write_words(&path, &words).unwrap();
        assert_eq!(read_words(&path).unwrap(), words);
    }
}
