//! Transfer runner driving label extraction over a stream of documents

use crate::config::Config;
use crate::errors::{Result, TransferError};
use crate::labels::{LabelMap, extract_labels};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::ExitCode;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, error, info, instrument, warn};

/// Capability a transfer needs from its label source
pub trait TransferBase: Send + Sync {
    fn extract_doc_labels(&self, source: &Value) -> Option<LabelMap>;
}

/// Labels Kubernetes, host and agent metadata from Filebeat-style documents
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelTransfer;

impl TransferBase for LabelTransfer {
    fn extract_doc_labels(&self, source: &Value) -> Option<LabelMap> {
        extract_labels(source)
    }
}

/// One labeled log line as written to the output
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferRecord {
    /// Unix epoch nanoseconds, as a string
    pub timestamp: String,
    pub labels: Option<LabelMap>,
    pub line: String,
}

impl TransferRecord {
    pub fn from_source(source: &Value, labels: Option<LabelMap>) -> Result<Self> {
        Ok(Self {
            timestamp: document_timestamp(source).to_string(),
            labels,
            line: serde_json::to_string(source)?,
        })
    }
}

/// Counters for a single transfer run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub read: u64,
    pub labeled: u64,
    pub unlabeled: u64,
    pub skipped: u64,
    pub malformed: u64,
}

impl TransferStats {
    /// Records written to the output
    pub fn written(&self) -> u64 {
        self.read - self.skipped
    }
}

/// Run a transfer and turn its outcome into a process exit code
pub async fn run_transfer<T: TransferBase>(transfer: &T, config: &Config) -> ExitCode {
    match transfer_documents(transfer, config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Transfer failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Open the configured input and output and transfer every document
pub async fn transfer_documents<T: TransferBase>(
    transfer: &T,
    config: &Config,
) -> Result<TransferStats> {
    config.validate().map_err(TransferError::Config)?;

    info!(
        "Starting transfer from {} to {}",
        config.input_name(),
        config.output_name()
    );

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &config.input {
        Some(path) => Box::new(BufReader::new(File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let writer: Box<dyn AsyncWrite + Unpin + Send> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).await?)),
        None => Box::new(BufWriter::new(tokio::io::stdout())),
    };

    let stats = transfer_stream(transfer, reader, writer, config).await?;

    info!(
        "Transfer complete - Read: {}, Written: {}, Labeled: {}, Unlabeled: {}, Skipped: {}, Malformed: {}",
        stats.read,
        stats.written(),
        stats.labeled,
        stats.unlabeled,
        stats.skipped,
        stats.malformed
    );

    Ok(stats)
}

/// Transfer newline-delimited JSON documents from `reader` to `writer`
#[instrument(skip_all)]
pub async fn transfer_stream<T, R, W>(
    transfer: &T,
    mut reader: R,
    mut writer: W,
    config: &Config,
) -> Result<TransferStats>
where
    T: TransferBase,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = TransferStats::default();
    let mut buf = Vec::new();
    let mut line_number: u64 = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        line_number += 1;

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        let document = match decode_document(line) {
            Ok(document) => document,
            Err(reason) => {
                stats.malformed += 1;
                warn!("Skipping undecodable line {}: {}", line_number, reason);

                if let Some(limit) = config.max_bad_lines
                    && stats.malformed > limit
                {
                    return Err(TransferError::MalformedInput {
                        malformed: stats.malformed,
                        limit,
                    });
                }
                continue;
            }
        };

        stats.read += 1;
        let source = source_document(&document, &config.source_field);
        let labels = transfer.extract_doc_labels(source);

        if labels.is_some() {
            stats.labeled += 1;
        } else {
            stats.unlabeled += 1;
            if config.skip_unlabeled {
                stats.skipped += 1;
                debug!("Skipping unlabeled document on line {}", line_number);
                continue;
            }
        }

        let record = TransferRecord::from_source(source, labels)?;
        let mut encoded = serde_json::to_vec(&record)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
    }

    writer.flush().await?;
    Ok(stats)
}

/// Parse one input line, which must hold a JSON object
fn decode_document(line: &[u8]) -> std::result::Result<Value, String> {
    match serde_json::from_slice::<Value>(line) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// The document inside an Elasticsearch hit, or the line itself
fn source_document<'a>(document: &'a Value, source_field: &str) -> &'a Value {
    match document.get(source_field) {
        Some(inner @ Value::Object(_)) => inner,
        _ => document,
    }
}

/// Event time in Unix nanoseconds from `@timestamp`, else the current time
fn document_timestamp(source: &Value) -> i64 {
    source
        .get("@timestamp")
        .and_then(Value::as_str)
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .and_then(|dt| dt.with_timezone(&Utc).timestamp_nanos_opt())
        .unwrap_or_else(current_timestamp_nanos)
}

fn current_timestamp_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    async fn run(input: &str, config: &Config) -> (Result<TransferStats>, Vec<TransferRecord>) {
        let mut out = Vec::new();
        let result = transfer_stream(&LabelTransfer, input.as_bytes(), &mut out, config).await;
        let records = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (result, records)
    }

    #[tokio::test]
    async fn test_hits_are_unwrapped_and_labeled() {
        let input = concat!(
            r#"{"_index":"logs","_id":"1","_source":{"@timestamp":"2024-01-15T10:00:00Z","kubernetes":{"namespace":"prod"},"message":"hi"}}"#,
            "\n",
            r#"{"stream":"stdout","message":"bare"}"#,
            "\n"
        );

        let (result, records) = run(input, &Config::default()).await;
        let stats = result.unwrap();

        assert_eq!(stats.read, 2);
        assert_eq!(stats.labeled, 2);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].labels.as_ref().unwrap()["namespace"], "prod");
        assert_eq!(records[0].timestamp, "1705312800000000000");
        let line: Value = serde_json::from_str(&records[0].line).unwrap();
        assert_eq!(line["message"], "hi");
        assert!(line.get("_index").is_none());

        assert_eq!(records[1].labels.as_ref().unwrap()["stream"], "stdout");
    }

    #[tokio::test]
    async fn test_unlabeled_documents_forwarded_with_null_labels() {
        let (result, records) = run("{\"message\":\"plain\"}\n", &Config::default()).await;
        let stats = result.unwrap();

        assert_eq!(stats.unlabeled, 1);
        assert_eq!(stats.written(), 1);
        assert_eq!(records[0].labels, None);
    }

    #[tokio::test]
    async fn test_skip_unlabeled() {
        let config = Config {
            skip_unlabeled: true,
            ..Config::default()
        };
        let input = "{\"message\":\"plain\"}\n{\"stream\":\"stderr\"}\n";

        let (result, records) = run(input, &config).await;
        let stats = result.unwrap();

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.written(), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].labels.as_ref().unwrap()["stream"], "stderr");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_lines_are_skipped() {
        let input = "not json\n\n[1,2]\n{\"stream\":\"stdout\"}";

        let (result, records) = run(input, &Config::default()).await;
        let stats = result.unwrap();

        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.read, 1);
        assert_eq!(records.len(), 1);
        assert!(logs_contain("Skipping undecodable line 1"));
        assert!(logs_contain("expected a JSON object"));
    }

    #[tokio::test]
    async fn test_malformed_limit_aborts() {
        let config = Config {
            max_bad_lines: Some(1),
            ..Config::default()
        };
        let input = "{\"stream\":\"stdout\"}\nbad\nworse\n{\"stream\":\"stderr\"}\n";

        let (result, records) = run(input, &config).await;

        assert!(matches!(
            result,
            Err(TransferError::MalformedInput { malformed: 2, limit: 1 })
        ));
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed() {
        let mut input = b"{\"stream\":\"\xff\"}\n".to_vec();
        input.extend_from_slice(b"{\"stream\":\"stdout\"}\n");
        let mut out = Vec::new();

        let stats = transfer_stream(&LabelTransfer, input.as_slice(), &mut out, &Config::default())
            .await
            .unwrap();

        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.read, 1);
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"kubernetes\":{\"pod\":")
            .read(b"{\"name\":\"web-1\"}}}\n{\"agent\"")
            .read(b":{\"version\":\"8.5\"}}\n")
            .build();
        let mut out = Vec::new();

        let stats = transfer_stream(&LabelTransfer, BufReader::new(mock), &mut out, &Config::default())
            .await
            .unwrap();

        assert_eq!(stats.labeled, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"pod_name\":\"web-1\""));
        assert!(text.contains("\"agent_version\":\"8.5\""));
    }

    #[tokio::test]
    async fn test_custom_extractor() {
        struct Fixed;
        impl TransferBase for Fixed {
            fn extract_doc_labels(&self, _source: &Value) -> Option<LabelMap> {
                Some(LabelMap::from([("job".to_string(), "import".to_string())]))
            }
        }

        let mut out = Vec::new();
        let stats = transfer_stream(&Fixed, "{}\n".as_bytes(), &mut out, &Config::default())
            .await
            .unwrap();

        assert_eq!(stats.labeled, 1);
        let record: TransferRecord = serde_json::from_slice(&out).unwrap();
        assert_eq!(record.labels.unwrap()["job"], "import");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_summary_reports_written_records() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("in.ndjson");
        std::fs::write(&input, "{\"stream\":\"stdout\"}\n{\"message\":\"plain\"}\n").unwrap();

        let config = Config {
            input: Some(input),
            output: Some(dir.path().join("out.ndjson")),
            skip_unlabeled: true,
            ..Config::default()
        };

        let stats = transfer_documents(&LabelTransfer, &config).await.unwrap();
        assert_eq!(stats.written(), 1);
        assert!(logs_contain("Read: 2, Written: 1"));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_io() {
        let config = Config {
            source_field: String::new(),
            input: Some("does-not-exist.ndjson".into()),
            ..Config::default()
        };

        let result = transfer_documents(&LabelTransfer, &config).await;
        assert!(matches!(result, Err(TransferError::Config(_))));
    }

    #[test]
    fn test_source_document() {
        let hit = json!({"_source": {"stream": "stdout"}});
        assert_eq!(source_document(&hit, "_source"), &json!({"stream": "stdout"}));

        let scalar_source = json!({"_source": "raw text", "stream": "stdout"});
        assert_eq!(source_document(&scalar_source, "_source"), &scalar_source);
    }

    #[test]
    fn test_document_timestamp() {
        let doc = json!({"@timestamp": "2024-01-15T10:00:00.5+01:00"});
        assert_eq!(document_timestamp(&doc), 1_705_309_200_500_000_000);

        let before = current_timestamp_nanos();
        let fallback = document_timestamp(&json!({"@timestamp": "yesterday"}));
        assert!(fallback >= before);
    }
}
