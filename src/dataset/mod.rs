//! Record sources feeding the pipeline
//!
//! The pipeline only needs an in-memory `Vec<RawRecord>`. Sources hide where
//! those records come from: an export file on disk, or records already held
//! by the caller.

use crate::error::{Result, TracelensError};
use crate::record::RawRecord;
use crate::repair;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Anything that can hand over a full record set
pub trait RecordSource {
    fn fetch(&self) -> Result<Vec<RawRecord>>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Records already in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<RawRecord>,
}

impl InMemorySource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for InMemorySource {
    fn fetch(&self) -> Result<Vec<RawRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory ({} records)", self.records.len())
    }
}

/// Export file on disk
///
/// Accepted layouts:
/// - a JSON array of records
/// - a search response object with a `results` array
/// - newline-delimited records
/// - records concatenated without separators (`}{`)
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for FileSource {
    fn fetch(&self) -> Result<Vec<RawRecord>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| TracelensError::Io {
            source: e,
            context: format!("Failed to read dataset: {:?}", self.path),
        })?;

        let records = parse_records(&content)?;
        tracing::info!("Loaded {} record(s) from {}", records.len(), self.describe());
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse export text in any accepted layout into records
///
/// Entries without an object `result` are dropped. Fails only when the text
/// is non-blank and nothing at all could be recovered from it.
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values = match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(mut obj)) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(obj)],
        },
        Ok(_) => Vec::new(),
        Err(_) => recover_stream(content),
    };

    if values.is_empty() {
        return Err(TracelensError::Dataset(
            "No JSON records could be recovered".to_string(),
        ));
    }

    let total = values.len();
    let records: Vec<RawRecord> = values
        .into_iter()
        .filter(|value| value.get("result").is_some_and(Value::is_object))
        .map(RawRecord::from_value)
        .collect();

    if records.len() < total {
        tracing::warn!(
            "Dropped {} entr(ies) without a result object",
            total - records.len()
        );
    }

    Ok(records)
}

/// Recover records from text that is not a single JSON document
///
/// Line-delimited text (every non-blank line an object) is parsed line by
/// line so `}{` inside a string value cannot split a record; only lines that
/// do not parse alone go through the concatenated-object split. Anything
/// else, such as pretty-printed objects back to back, is split as a whole.
fn recover_stream(content: &str) -> Vec<Value> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let line_delimited = lines
        .iter()
        .all(|line| line.starts_with('{') && line.ends_with('}'));
    if !line_delimited {
        return repair::split_concatenated(content);
    }

    lines
        .into_iter()
        .flat_map(|line| match repair::fix(line) {
            Some(value) => vec![value],
            None => repair::split_concatenated(line),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_array() {
        let records =
            parse_records(r#"[{"result":{"_time":"t1"}},{"result":{"_time":"t2"}}]"#).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].time(), Some("t2"));
    }

    #[test]
    fn test_parse_results_envelope() {
        let records = parse_records(r#"{"results":[{"result":{"_time":"t1"}}]}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_concatenated_and_ndjson() {
        let text = concat!(
            "{\"result\":{\"_time\":\"a\"}}{\"result\":{\"_time\":\"b\"}}\n",
            "{\"result\":{\"_time\":\"c\"}}\n",
        );
        let records = parse_records(text).unwrap();
        let times: Vec<&str> = records.iter().filter_map(|r| r.time()).collect();
        assert_eq!(times, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ndjson_keeps_glued_objects_inside_raw() {
        let text = concat!(
            r#"{"result":{"fields.x-b3-traceid":["T1"],"_raw":"{\"event\":\"a\"}{\"event\":\"b\"}"}}"#,
            "\n",
            r#"{"result":{"fields.x-b3-traceid":["T2"]}}"#,
        );
        let records = parse_records(text).unwrap();
        let ids: Vec<&str> = records
            .iter()
            .filter_map(|r| r.column("fields.x-b3-traceid"))
            .collect();
        assert_eq!(ids, vec!["T1", "T2"]);
        assert_eq!(
            records[0].result["_raw"],
            serde_json::json!(r#"{"event":"a"}{"event":"b"}"#)
        );
    }

    #[test]
    fn test_pretty_printed_concatenation() {
        let text = "{\n  \"result\": {\"_time\": \"a\"}\n}\n{\n  \"result\": {\"_time\": \"b\"}\n}\n";
        let records = parse_records(text).unwrap();
        let times: Vec<&str> = records.iter().filter_map(|r| r.time()).collect();
        assert_eq!(times, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_drops_entries_without_result() {
        let records = parse_records(r#"[{"preview":true},{"result":{}}]"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_blank_and_garbage() {
        assert!(parse_records("  \n").unwrap().is_empty());
        assert!(matches!(
            parse_records("not json"),
            Err(TracelensError::Dataset(_))
        ));
    }

    #[test]
    fn test_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"result":{{"fields.x-b3-traceid":["T1"]}}}}"#).unwrap();
        writeln!(file, r#"{{"result":{{"fields.x-b3-traceid":["T2"]}}}}"#).unwrap();

        let source = FileSource::new(file.path());
        let records = source.fetch().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].column("fields.x-b3-traceid"), Some("T1"));
    }

    #[test]
    fn test_missing_file() {
        let source = FileSource::new("/nonexistent/records.json");
        assert!(matches!(source.fetch(), Err(TracelensError::Io { .. })));
    }

    #[test]
    fn test_in_memory_source() {
        let source = InMemorySource::new(vec![RawRecord::default()]);
        assert_eq!(source.fetch().unwrap().len(), 1);
        assert!(source.describe().contains("1 records"));
    }
}
