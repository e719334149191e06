//! Parsed email records and the collaborators that produce them.
//!
//! Mailbox parsing itself lives outside this crate. What comes in is a list of
//! [`EmailRecord`]s, obtained through an [`EmailSource`]. The bundled
//! [`JsonlEmailSource`] reads records exported as JSON lines, and
//! [`load_or_parse_emails`] keeps a JSON snapshot of the parsed collection so
//! repeated runs skip the parse.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::Analyzer;
use crate::error::{MailclassError, Result};

/// A single parsed email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Sender address or display name.
    pub sender: String,
    /// Subject line, absent for some messages.
    #[serde(default)]
    pub subject: Option<String>,
    /// Domain part of the sender address.
    pub from_domain: String,
    /// Body text.
    pub content: String,
    /// Category to predict.
    pub label: String,
}

impl EmailRecord {
    /// Create a new email record.
    pub fn new(
        sender: impl Into<String>,
        subject: Option<&str>,
        from_domain: impl Into<String>,
        content: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        EmailRecord {
            sender: sender.into(),
            subject: subject.map(str::to_string),
            from_domain: from_domain.into(),
            content: content.into(),
            label: label.into(),
        }
    }

    /// The text fed to vocabulary construction and encoding.
    ///
    /// Layout is `sender + " " + subject + from_domain + content` with line
    /// breaks removed. A missing subject renders as `None`.
    pub fn feature_text(&self) -> String {
        let subject = self.subject.as_deref().unwrap_or("None");
        let mut text = String::with_capacity(
            self.sender.len() + subject.len() + self.from_domain.len() + self.content.len() + 1,
        );
        text.push_str(&self.sender);
        text.push(' ');
        text.push_str(subject);
        text.push_str(&self.from_domain);
        text.push_str(&self.content);
        text.retain(|c| c != '\n' && c != '\r');
        text
    }
}

/// Aggregate statistics over an email collection.
#[derive(Debug, Clone, Default)]
pub struct EmailStats {
    /// Per label, how often each word occurs across that label's emails.
    pub word_counts_by_label: AHashMap<String, AHashMap<String, usize>>,
    /// Emails per sender.
    pub sender_counts: AHashMap<String, usize>,
    /// Emails per sender domain.
    pub domain_counts: AHashMap<String, usize>,
    /// Distinct labels in first-appearance order.
    pub labels: Vec<String>,
}

impl EmailStats {
    /// Compute statistics for the given emails.
    pub fn from_emails(emails: &[EmailRecord], analyzer: &dyn Analyzer) -> Result<Self> {
        let mut stats = EmailStats::default();

        for email in emails {
            if !stats.word_counts_by_label.contains_key(&email.label) {
                stats.labels.push(email.label.clone());
            }
            let word_counts = stats
                .word_counts_by_label
                .entry(email.label.clone())
                .or_default();
            for word in analyzer.words(&email.feature_text())? {
                *word_counts.entry(word).or_insert(0) += 1;
            }

            *stats.sender_counts.entry(email.sender.clone()).or_insert(0) += 1;
            *stats
                .domain_counts
                .entry(email.from_domain.clone())
                .or_insert(0) += 1;
        }

        Ok(stats)
    }

    /// Total number of words counted for a label.
    pub fn word_total(&self, label: &str) -> usize {
        self.word_counts_by_label
            .get(label)
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    /// Log the per-label word breakdown.
    pub fn log_word_breakdown(&self) {
        info!("Creating email dataset with labels {:?}", self.labels);
        info!("Label word breakdown:");
        let mut total = 0;
        for label in &self.labels {
            let count = self.word_total(label);
            total += count;
            info!("\t{label}:{count}");
        }
        info!("Total word count: {total}");
    }
}

/// A provider of parsed emails.
pub trait EmailSource {
    /// Parse and return every email the source knows about.
    fn parse_emails(&self) -> Result<Vec<EmailRecord>>;

    /// Short description for logs.
    fn describe(&self) -> String;

    /// Checksum identifying the source's current contents, so artifacts
    /// built from different inputs are kept apart.
    fn fingerprint(&self) -> Result<u32>;
}

/// Writes a pre-featurized CSV export of a mailbox, in the tabular cache
/// layout, one row per email.
pub trait BinaryCsvExporter {
    /// Export to `output`. With `per_label`, features are computed per label.
    fn export(&self, output: &Path, per_label: bool) -> Result<()>;
}

/// Reads emails stored as JSON lines: one [`EmailRecord`] object per line.
///
/// The path may be a single file or a directory, in which case every
/// `*.jsonl` file inside it is read in file-name order.
#[derive(Debug, Clone)]
pub struct JsonlEmailSource {
    path: PathBuf,
}

impl JsonlEmailSource {
    /// Create a source reading from the given file or directory.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        JsonlEmailSource { path: path.into() }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.path.is_dir() {
            return Ok(vec![self.path.clone()]);
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn read_file(path: &Path, emails: &mut Vec<EmailRecord>) -> Result<()> {
        let reader = BufReader::new(File::open(path)?);
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let email: EmailRecord = serde_json::from_str(&line).map_err(|e| {
                MailclassError::invalid_argument(format!(
                    "{}:{}: malformed email record: {e}",
                    path.display(),
                    line_num + 1
                ))
            })?;
            emails.push(email);
        }
        Ok(())
    }
}

impl EmailSource for JsonlEmailSource {
    fn parse_emails(&self) -> Result<Vec<EmailRecord>> {
        let mut emails = Vec::new();
        for file in self.files()? {
            debug!("Reading emails from {}", file.display());
            Self::read_file(&file, &mut emails)?;
        }
        Ok(emails)
    }

    fn describe(&self) -> String {
        format!("jsonl:{}", self.path.display())
    }

    /// CRC32 over the name and contents of every input file, in read order.
    fn fingerprint(&self) -> Result<u32> {
        let mut hasher = crc32fast::Hasher::new();
        for file in self.files()? {
            let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            let mut reader = BufReader::new(File::open(&file)?);
            std::io::copy(&mut reader, &mut HashWriter(&mut hasher))?;
            hasher.update(&[0]);
        }
        Ok(hasher.finalize())
    }
}

/// Adapter feeding written bytes into a CRC32 hasher.
struct HashWriter<'a>(&'a mut crc32fast::Hasher);

impl Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Return the emails from `snapshot` if it exists, otherwise parse them from
/// `source` and write the snapshot.
pub fn load_or_parse_emails(source: &dyn EmailSource, snapshot: &Path) -> Result<Vec<EmailRecord>> {
    if snapshot.is_file() {
        let reader = BufReader::new(File::open(snapshot)?);
        let emails: Vec<EmailRecord> = serde_json::from_reader(reader)?;
        info!(
            "Loaded {} emails from snapshot {}",
            emails.len(),
            snapshot.display()
        );
        return Ok(emails);
    }

    let emails = source.parse_emails()?;
    info!("Parsed {} emails from {}", emails.len(), source.describe());

    if let Some(parent) = snapshot.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(snapshot)?);
    serde_json::to_writer(&mut writer, &emails)?;
    writer.flush()?;

    Ok(emails)
}
