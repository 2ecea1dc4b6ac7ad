//! On-disk record format.
//!
//! Every record is one JSON object terminated by a newline, so a data file
//! can be replayed front to back without length prefixes. Field names match
//! the files written by earlier versions of the store (`Key`, `URL`).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{Result, StoreError};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "URL")]
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encodes the record as a single newline-terminated JSON line.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoded = serde_json::to_vec(self).map_err(StoreError::Encode)?;
        encoded.push(b'\n');
        Ok(encoded)
    }
}

/// Sequential decoder over a stream of encoded records.
pub struct RecordReader<R> {
    reader: R,
    line: String,
    line_number: usize,
}

impl<R> RecordReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Returns the next record, or `Ok(None)` once the stream is exhausted.
    ///
    /// A line that is not a complete record, including one cut short by a
    /// truncated write, is reported as [`StoreError::Decode`].
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.line.clear();
            let bytes = self.reader.read_line(&mut self.line).await?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim_end_matches(LINE_ENDINGS);
            if trimmed.trim().is_empty() {
                continue;
            }

            let record = serde_json::from_str(trimmed).map_err(|source| StoreError::Decode {
                line: self.line_number,
                source,
            })?;
            return Ok(Some(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode_all(bytes: &[u8]) -> Result<Vec<Record>> {
        let mut reader = RecordReader::new(bytes);
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    #[test]
    fn encodes_one_line_with_legacy_field_names() {
        let encoded = Record::new("0", "http://a").encode().expect("encode");
        assert_eq!(encoded, b"{\"Key\":\"0\",\"URL\":\"http://a\"}\n");
    }

    #[tokio::test]
    async fn decodes_records_in_order() {
        let records = vec![
            Record::new("0", "http://a"),
            Record::new("1", "http://b\nwith newline"),
            Record::new("2", ""),
        ];
        let mut stream = Vec::new();
        for record in &records {
            stream.extend(record.encode().expect("encode"));
        }

        let decoded = decode_all(&stream).await.expect("decode");
        assert_eq!(decoded, records);
    }

    #[tokio::test]
    async fn empty_stream_is_not_an_error() {
        assert!(decode_all(b"").await.expect("decode").is_empty());
        assert!(decode_all(b"\n\r\n").await.expect("decode").is_empty());
    }

    #[tokio::test]
    async fn last_line_without_newline_still_decodes() {
        let decoded = decode_all(b"{\"Key\":\"a\",\"URL\":\"x\"}").await.expect("decode");
        assert_eq!(decoded, vec![Record::new("a", "x")]);
    }

    #[tokio::test]
    async fn truncated_record_reports_its_line() {
        let stream = b"{\"Key\":\"0\",\"URL\":\"http://a\"}\n{\"Key\":\"1\",\"UR";
        match decode_all(stream).await {
            Err(StoreError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
