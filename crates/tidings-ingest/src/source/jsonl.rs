//! JSONL replay source.
//!
//! Reads feed records from JSON Lines files, one record per line - the same
//! shape as a staging batch. Used to replay exports produced elsewhere (for
//! example on another host, filtered by the `/data/ids` endpoint) into this
//! machine's pipeline.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::iter;
use std::path::PathBuf;

use tidings_core::FeedItem;

use super::{FeedSource, RecordIter};
use crate::error::{Error, Result};

/// Replays records from a JSONL file or a directory of them.
pub struct JsonlSource {
    name: String,
    input: PathBuf,
}

impl JsonlSource {
    /// `name` is the source's label for filtering and logs; `input` is a
    /// `.json`/`.jsonl`/`.ndjson` file or a directory containing them.
    pub fn new(name: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
        }
    }

    /// Files to replay, in deterministic (sorted) order.
    fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let input = &self.input;
        if input.is_file() {
            return Ok(vec![input.clone()]);
        }
        if input.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| {
                    path.is_file()
                        && path.extension().is_some_and(|ext| {
                            ext == "jsonl" || ext == "json" || ext == "ndjson"
                        })
                })
                .collect();
            files.sort();
            return Ok(files);
        }
        Err(Error::Source {
            name: self.name.clone(),
            message: format!("input path does not exist: {}", input.display()),
        })
    }
}

impl FeedSource for JsonlSource {
    fn name(&self) -> String {
        format!("jsonl.{}", self.name)
    }

    fn produce(&mut self) -> Result<RecordIter<'_>> {
        let files = self.collect_files()?;
        tracing::debug!("{}: replaying {} files", self.name(), files.len());

        let name = self.name();
        let iter = files
            .into_iter()
            .flat_map(move |path| replay_file(path, name.clone()));
        Ok(Box::new(iter))
    }
}

/// Lazily iterate one file's records. Open and read failures surface as a
/// single `Err` element.
fn replay_file(path: PathBuf, source: String) -> RecordIter<'static> {
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            let err = Error::Source {
                name: source,
                message: format!("{}: {e}", path.display()),
            };
            return Box::new(iter::once(Err(err)));
        }
    };

    let reader = BufReader::new(file);
    Box::new(
        reader
            .lines()
            .enumerate()
            .filter_map(move |(idx, line)| match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(FeedItem::from_json_line(&line).map_err(|e| Error::Source {
                    name: source.clone(),
                    message: format!("{}: line {}: {e}", path.display(), idx + 1),
                })),
                Err(e) => Some(Err(Error::Source {
                    name: source.clone(),
                    message: format!("{}: line {}: {e}", path.display(), idx + 1),
                })),
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const LINE: &str =
        r#"{"id":"trakt_1","title":"Up","ftype":"movie","when":"2021-01-01T10:00:00+00:00"}"#;

    #[test]
    fn test_replays_single_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("export.jsonl");
        writeln!(File::create(&path).unwrap(), "{LINE}").unwrap();

        let mut source = JsonlSource::new("trakt", &path);
        let items: Result<Vec<_>> = source.produce().unwrap().collect();
        let items = items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "trakt_1");
    }

    #[test]
    fn test_replays_directory_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        for (file, id) in [("b.jsonl", "x_2"), ("a.jsonl", "x_1"), ("skip.txt", "x_9")] {
            let line = LINE.replace("trakt_1", id);
            writeln!(File::create(tmp.path().join(file)).unwrap(), "{line}").unwrap();
        }

        let mut source = JsonlSource::new("mixed", tmp.path());
        let items: Result<Vec<_>> = source.produce().unwrap().collect();
        let ids: Vec<String> = items.unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["x_1", "x_2"]);
    }

    #[test]
    fn test_missing_input_is_a_source_error() {
        let mut source = JsonlSource::new("gone", "/definitely/not/here.jsonl");
        let err = source.produce().err().expect("expected a source error");
        assert!(matches!(err, Error::Source { .. }));
    }

    #[test]
    fn test_bad_line_yields_error_element() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("export.jsonl");
        writeln!(File::create(&path).unwrap(), "{LINE}\nnot-json").unwrap();

        let mut source = JsonlSource::new("trakt", &path);
        let results: Vec<_> = source.produce().unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_name_is_namespaced() {
        let source = JsonlSource::new("trakt_history", "/tmp/x");
        assert_eq!(source.name(), "jsonl.trakt_history");
    }
}
