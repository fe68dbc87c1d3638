//! 报告读取：分隔符探测、表头读取、按行数分块（流式），以及整读回退
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use tracing::warn;

use crate::chunk::RawChunk;
use crate::error::{ChunkError, FileError};

/// 可探测的分隔符（并列时按此顺序优先）
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
/// 探测时最多读取的表头字节数
const SNIFF_LIMIT: u64 = 64 * 1024;

/// 根据表头行探测分隔符：统计引号外各候选字符出现次数，取最多者；都没有则为逗号
pub fn sniff_delimiter(line: &[u8]) -> u8 {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    for &b in line {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = DELIMITER_CANDIDATES.iter().position(|&d| d == b) {
            counts[i] += 1;
        }
    }
    let mut best = 0;
    for i in 1..counts.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    DELIMITER_CANDIDATES[best]
}

fn read_first_line(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file).take(SNIFF_LIMIT);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    Ok(line)
}

/// 已打开的报告：表头 + 剩余数据行的读取器
pub struct ReportSource {
    pub headers: StringRecord,
    /// 是否经由整读回退打开
    pub fallback: bool,
    reader: csv::Reader<Box<dyn Read>>,
}

fn builder(delimiter: u8) -> ReaderBuilder {
    let mut b = ReaderBuilder::new();
    b.delimiter(delimiter).has_headers(true).flexible(true);
    b
}

/// 打开报告并读取表头
/// - 先走流式读取；表头无法解码时，整读文件并做有损 UTF-8 转换后重试
/// - 两者都失败时返回文件级错误
pub fn open_report(path: &Path, delimiter: Option<u8>) -> Result<ReportSource, FileError> {
    let delimiter = match delimiter {
        Some(d) => d,
        None => sniff_delimiter(&read_first_line(path).map_err(FileError::Open)?),
    };

    let file = File::open(path).map_err(FileError::Open)?;
    let mut reader = builder(delimiter).from_reader(Box::new(file) as Box<dyn Read>);
    match reader.headers() {
        Ok(h) => {
            let headers = h.clone();
            return Ok(ReportSource { headers, fallback: false, reader });
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read header; trying full read fallback");
        }
    }

    let bytes = std::fs::read(path).map_err(FileError::Open)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let mut reader = builder(delimiter).from_reader(Box::new(Cursor::new(text.into_bytes())) as Box<dyn Read>);
    let headers = reader.headers().map_err(|e| FileError::Unparsable(e.to_string()))?.clone();
    Ok(ReportSource { headers, fallback: true, reader })
}

impl ReportSource {
    /// 按固定行数切分数据行
    pub fn chunks(self, chunk_size: usize) -> ChunkStream {
        ChunkStream {
            reader: self.reader,
            chunk_size: chunk_size.max(1),
            next_index: 0,
            rows_read: 0,
            done: false,
        }
    }
}

/// 分块迭代器：读取失败时产出一个失败分块并结束
pub struct ChunkStream {
    reader: csv::Reader<Box<dyn Read>>,
    chunk_size: usize,
    next_index: usize,
    rows_read: u64,
    done: bool,
}

impl Iterator for ChunkStream {
    type Item = Result<RawChunk, (usize, ChunkError)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let index = self.next_index;
        let first_row = self.rows_read + 1;
        let mut rows = Vec::with_capacity(self.chunk_size.min(1024));
        while rows.len() < self.chunk_size {
            let mut record = ByteRecord::new();
            match self.reader.read_byte_record(&mut record) {
                Ok(true) => {
                    rows.push(record);
                    self.rows_read += 1;
                }
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    // 已读入本块的行随失败分块一起丢弃
                    self.done = true;
                    self.next_index += 1;
                    return Some(Err((index, ChunkError::Read(e.to_string()))));
                }
            }
        }
        if rows.is_empty() {
            return None;
        }
        self.next_index += 1;
        Some(Ok(RawChunk { index, first_row, rows }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn sniffs_common_delimiters() {
        assert_eq!(sniff_delimiter(b"cves,severity,cwe\n"), b',');
        assert_eq!(sniff_delimiter(b"cves;severity;cwe\n"), b';');
        assert_eq!(sniff_delimiter(b"cves\tseverity\n"), b'\t');
        assert_eq!(sniff_delimiter(b"cves|severity\n"), b'|');
        assert_eq!(sniff_delimiter(b"cves\n"), b',');
    }

    #[test]
    fn sniff_ignores_quoted_text() {
        assert_eq!(sniff_delimiter(b"\"a;b;c\",severity\n"), b',');
    }

    #[test]
    fn splits_rows_into_fixed_size_chunks() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("r.csv");
        fs::write(&p, "cves,severity\nCVE-1,High\nCVE-2,Low\nCVE-3,Medium\n").unwrap();
        let src = open_report(&p, None).unwrap();
        assert_eq!(src.headers.iter().collect::<Vec<_>>(), vec!["cves", "severity"]);
        assert!(!src.fallback);

        let chunks: Vec<_> = src.chunks(2).map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].index, chunks[0].first_row, chunks[0].rows.len()), (0, 1, 2));
        assert_eq!((chunks[1].index, chunks[1].first_row, chunks[1].rows.len()), (1, 3, 1));
    }

    #[test]
    fn semicolon_report_keeps_quoted_identifier_lists() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("r.csv");
        fs::write(&p, "cves;severity\n\"CVE-1;CVE-2\";High\n").unwrap();
        let src = open_report(&p, None).unwrap();
        let chunks: Vec<_> = src.chunks(10).map(|c| c.unwrap()).collect();
        assert_eq!(&chunks[0].rows[0][0], b"CVE-1;CVE-2");
    }

    #[test]
    fn empty_file_has_no_headers_and_no_chunks() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("empty.csv");
        fs::write(&p, "").unwrap();
        let src = open_report(&p, None).unwrap();
        assert!(src.headers.is_empty());
        assert_eq!(src.chunks(10).count(), 0);
    }

    #[test]
    fn non_utf8_header_uses_full_read_fallback() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("latin1.csv");
        fs::write(&p, b"cves,s\xe9verity\nCVE-1,High\n").unwrap();
        let src = open_report(&p, None).unwrap();
        assert!(src.fallback);
        assert_eq!(&src.headers[0], "cves");
        assert_eq!(src.chunks(10).count(), 1);
    }

    #[test]
    fn unreadable_file_is_a_file_error() {
        let dir = TempDir::new().unwrap();
        let err = open_report(&dir.path().join("gone.csv"), Some(b',')).err().unwrap();
        assert!(matches!(err, FileError::Open(_)));
    }
}
