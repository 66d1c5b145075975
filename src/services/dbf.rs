//! Streaming reader for dBase III/IV attribute tables (`.dbf`).
//!
//! Only the attribute side of a shapefile is decoded here. Records are pulled
//! one at a time from any `Read`, so a table can be validated straight out of
//! a ZIP entry without buffering it whole.

use chrono::NaiveDate;
use std::io::{self, Read};
use std::sync::Arc;
use thiserror::Error;

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

#[derive(Debug, Error)]
pub enum DbfError {
    #[error("attribute table header is malformed: {0}")]
    MalformedHeader(String),

    #[error("attribute table ends after {read} of {declared} records")]
    Truncated { read: u32, declared: u32 },

    #[error("failed to read attribute table: {0}")]
    Io(#[from] io::Error),
}

pub type DbfResult<T> = std::result::Result<T, DbfError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Other(u8),
}

impl From<u8> for FieldType {
    fn from(code: u8) -> Self {
        match code {
            b'C' => FieldType::Character,
            b'N' => FieldType::Numeric,
            b'F' => FieldType::Float,
            b'D' => FieldType::Date,
            b'L' => FieldType::Logical,
            other => FieldType::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl FieldValue {
    /// Null, or text that is empty once padding is stripped.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the value. Text is parsed; NaN and infinities do not count.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(text) => text.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    fn decode(field: &FieldDescriptor, raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_end_matches([' ', '\0']);

        match field.field_type {
            FieldType::Character => FieldValue::Text(text.to_string()),
            FieldType::Numeric | FieldType::Float => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    FieldValue::Null
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(n) if n.is_finite() => FieldValue::Number(n),
                        _ => FieldValue::Text(trimmed.to_string()),
                    }
                }
            }
            FieldType::Date => {
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed == "00000000" {
                    FieldValue::Null
                } else {
                    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
                        .map(FieldValue::Date)
                        .unwrap_or_else(|_| FieldValue::Text(trimmed.to_string()))
                }
            }
            FieldType::Logical => match text.trim() {
                "T" | "t" | "Y" | "y" => FieldValue::Bool(true),
                "F" | "f" | "N" | "n" => FieldValue::Bool(false),
                _ => FieldValue::Null,
            },
            FieldType::Other(_) => FieldValue::Text(text.trim().to_string()),
        }
    }
}

/// One row of an attribute table.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Arc<[FieldDescriptor]>,
    values: Vec<FieldValue>,
}

impl Record {
    /// `None` when the table has no such column; `Some(FieldValue::Null)` when
    /// the column exists but this row holds nothing.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .map(|index| &self.values[index])
    }
}

pub struct DbfReader<R> {
    reader: R,
    fields: Arc<[FieldDescriptor]>,
    declared: u32,
    consumed: u32,
    buf: Vec<u8>,
    failed: bool,
}

impl<R: Read> DbfReader<R> {
    /// Reads the header and field descriptors, leaving the reader positioned
    /// at the first record.
    pub fn new(mut reader: R) -> DbfResult<Self> {
        let mut header = [0u8; HEADER_LEN];
        read_header_bytes(&mut reader, &mut header)?;

        let declared = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let header_len = u16::from_le_bytes([header[8], header[9]]) as usize;
        let record_len = u16::from_le_bytes([header[10], header[11]]) as usize;

        if header_len < HEADER_LEN + 1 {
            return Err(DbfError::MalformedHeader(format!(
                "header length {} is too short",
                header_len
            )));
        }

        let mut fields = Vec::new();
        let mut consumed = HEADER_LEN;
        loop {
            let mut first = [0u8; 1];
            read_header_bytes(&mut reader, &mut first)?;
            consumed += 1;
            if first[0] == HEADER_TERMINATOR {
                break;
            }

            if consumed + DESCRIPTOR_LEN - 1 > header_len {
                return Err(DbfError::MalformedHeader(
                    "field descriptors run past the declared header length".to_string(),
                ));
            }

            let mut descriptor = [0u8; DESCRIPTOR_LEN];
            descriptor[0] = first[0];
            read_header_bytes(&mut reader, &mut descriptor[1..])?;
            consumed += DESCRIPTOR_LEN - 1;
            fields.push(parse_descriptor(&descriptor));
        }

        if consumed > header_len {
            return Err(DbfError::MalformedHeader(format!(
                "header length {} is shorter than its {} field descriptors",
                header_len,
                fields.len()
            )));
        }

        // FoxPro and friends pad the header (e.g. a 263-byte backlink).
        let padding = (header_len - consumed) as u64;
        if padding > 0 {
            let skipped = io::copy(&mut (&mut reader).take(padding), &mut io::sink())?;
            if skipped < padding {
                return Err(DbfError::MalformedHeader(
                    "header ends before its declared length".to_string(),
                ));
            }
        }

        let data_len: usize = fields.iter().map(|field| field.length).sum();
        if record_len < data_len + 1 {
            return Err(DbfError::MalformedHeader(format!(
                "record length {} cannot hold {} bytes of fields",
                record_len, data_len
            )));
        }

        Ok(Self {
            reader,
            fields: fields.into(),
            declared,
            consumed: 0,
            buf: vec![0u8; record_len],
            failed: false,
        })
    }

    fn read_record(&mut self) -> DbfResult<Option<Record>> {
        while self.consumed < self.declared {
            match self.reader.read_exact(&mut self.buf) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(DbfError::Truncated {
                        read: self.consumed,
                        declared: self.declared,
                    });
                }
                Err(err) => return Err(err.into()),
            }
            self.consumed += 1;

            if self.buf[0] == DELETED_FLAG {
                continue;
            }

            let mut offset = 1;
            let mut values = Vec::with_capacity(self.fields.len());
            for field in self.fields.iter() {
                let raw = &self.buf[offset..offset + field.length];
                values.push(FieldValue::decode(field, raw));
                offset += field.length;
            }

            return Ok(Some(Record {
                fields: Arc::clone(&self.fields),
                values,
            }));
        }
        Ok(None)
    }
}

impl<R: Read> Iterator for DbfReader<R> {
    type Item = DbfResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn read_header_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> DbfResult<()> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DbfError::MalformedHeader("unexpected end of header".to_string())
        } else {
            DbfError::Io(err)
        }
    })
}

fn parse_descriptor(raw: &[u8; DESCRIPTOR_LEN]) -> FieldDescriptor {
    let name_end = raw[..11].iter().position(|b| *b == 0).unwrap_or(11);
    let name = String::from_utf8_lossy(&raw[..name_end]).trim().to_string();

    FieldDescriptor {
        name,
        field_type: FieldType::from(raw[11]),
        length: raw[16] as usize,
    }
}
