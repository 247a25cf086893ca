//! Dataset and lexicon loading.
//!
//! The dataset is a tab-separated file where field 0 is the audio path and
//! field 4 the reference transcript; other fields belong to the recording
//! tool and are ignored here.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Column index of the audio path in a dataset row.
const FIELD_AUDIO: usize = 0;
/// Column index of the reference transcript in a dataset row.
const FIELD_TEXT: usize = 4;

/// One (audio, reference transcript) pair to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub audio_path: PathBuf,
    pub reference: String,
}

/// Read a TSV dataset file. Rows too short to carry both fields are
/// skipped with a warning rather than failing the run.
pub fn read_dataset(path: &Path) -> Result<Vec<DatasetRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match (fields.get(FIELD_AUDIO), fields.get(FIELD_TEXT)) {
            (Some(audio), Some(text)) => records.push(DatasetRecord {
                audio_path: PathBuf::from(audio),
                reference: text.to_string(),
            }),
            _ => {
                tracing::warn!(
                    "skipping dataset line {}: expected at least {} tab-separated fields",
                    lineno + 1,
                    FIELD_TEXT + 1
                );
            }
        }
    }
    Ok(records)
}

/// Read a lexicon file: one entry per line, word in the first
/// whitespace-separated field (pronunciation columns are ignored).
pub fn read_lexicon(path: &Path) -> Result<HashSet<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read lexicon {}", path.display()))?;
    Ok(contents
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect())
}

/// Drop records whose audio file is missing and, when a lexicon is given,
/// records whose reference contains any out-of-vocabulary word. Skips are
/// logged as they occur; they are data issues, not failures.
pub fn filter_records(
    records: Vec<DatasetRecord>,
    lexicon: Option<&HashSet<String>>,
) -> Vec<DatasetRecord> {
    records
        .into_iter()
        .filter(|record| {
            if !record.audio_path.exists() {
                tracing::warn!("{} does not exist", record.audio_path.display());
                return false;
            }
            if let Some(lexicon) = lexicon {
                let oov = record
                    .reference
                    .split_whitespace()
                    .any(|word| !lexicon.contains(word));
                if oov {
                    tracing::warn!(
                        "{} is out of vocabulary: {}",
                        record.audio_path.display(),
                        record.reference
                    );
                    return false;
                }
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_fields_zero_and_four() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = write_file(
            dir.path(),
            "recorder.tsv",
            "a.wav\t1\t2\t3\thold the door\nb.wav\t1\t2\t3\tfall back\n",
        );
        let records = read_dataset(&tsv).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].audio_path, PathBuf::from("a.wav"));
        assert_eq!(records[0].reference, "hold the door");
        assert_eq!(records[1].reference, "fall back");
    }

    #[test]
    fn short_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tsv = write_file(
            dir.path(),
            "recorder.tsv",
            "only_three\tfields\there\na.wav\tx\ty\tz\tgood row\n\n",
        );
        let records = read_dataset(&tsv).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference, "good row");
    }

    #[test]
    fn lexicon_takes_first_field() {
        let dir = tempfile::tempdir().unwrap();
        let lex = write_file(dir.path(), "lexicon.txt", "hold HH OW L D\ndoor D AO R\n");
        let words = read_lexicon(&lex).unwrap();
        assert!(words.contains("hold"));
        assert!(words.contains("door"));
        assert!(!words.contains("HH"));
    }

    #[test]
    fn filter_drops_missing_audio_and_oov() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_file(dir.path(), "present.wav", "");
        let records = vec![
            DatasetRecord {
                audio_path: present.clone(),
                reference: "hold door".to_string(),
            },
            DatasetRecord {
                audio_path: dir.path().join("missing.wav"),
                reference: "hold door".to_string(),
            },
            DatasetRecord {
                audio_path: present.clone(),
                reference: "hold banana".to_string(),
            },
        ];
        let lexicon: HashSet<String> =
            ["hold", "door"].into_iter().map(str::to_string).collect();
        let kept = filter_records(records, Some(&lexicon));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].reference, "hold door");
    }

    #[test]
    fn filter_without_lexicon_only_checks_paths() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_file(dir.path(), "present.wav", "");
        let records = vec![DatasetRecord {
            audio_path: present,
            reference: "anything at all".to_string(),
        }];
        assert_eq!(filter_records(records, None).len(), 1);
    }
}
