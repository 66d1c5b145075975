//! In-memory builders for attribute tables and shapefile archives used by unit tests.

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub struct Column {
    name: &'static str,
    kind: u8,
    length: u8,
    decimals: u8,
}

impl Column {
    pub fn text(name: &'static str, length: u8) -> Self {
        Self { name, kind: b'C', length, decimals: 0 }
    }

    pub fn numeric(name: &'static str, length: u8, decimals: u8) -> Self {
        Self { name, kind: b'N', length, decimals }
    }

    pub fn date(name: &'static str) -> Self {
        Self { name, kind: b'D', length: 8, decimals: 0 }
    }

    pub fn logical(name: &'static str) -> Self {
        Self { name, kind: b'L', length: 1, decimals: 0 }
    }
}

pub struct DbfBuilder {
    columns: Vec<Column>,
    rows: Vec<(bool, Vec<String>)>,
    padding: usize,
}

impl DbfBuilder {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new(), padding: 0 }
    }

    pub fn row(mut self, values: &[&str]) -> Self {
        self.rows.push((false, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn deleted_row(mut self, values: &[&str]) -> Self {
        self.rows.push((true, values.iter().map(|v| v.to_string()).collect()));
        self
    }

    pub fn header_padding(mut self, bytes: usize) -> Self {
        self.padding = bytes;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header_len = 32 + 32 * self.columns.len() + 1 + self.padding;
        let record_len = 1 + self.columns.iter().map(|c| c.length as usize).sum::<usize>();

        let mut out = Vec::new();
        out.push(0x03);
        out.extend_from_slice(&[124, 1, 1]);
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(record_len as u16).to_le_bytes());
        out.extend_from_slice(&[0u8; 20]);

        for column in &self.columns {
            let mut descriptor = [0u8; 32];
            descriptor[..column.name.len()].copy_from_slice(column.name.as_bytes());
            descriptor[11] = column.kind;
            descriptor[16] = column.length;
            descriptor[17] = column.decimals;
            out.extend_from_slice(&descriptor);
        }
        out.push(0x0D);
        out.extend(std::iter::repeat(0u8).take(self.padding));

        for (deleted, values) in &self.rows {
            out.push(if *deleted { b'*' } else { b' ' });
            for (column, value) in self.columns.iter().zip(values) {
                let width = column.length as usize;
                let mut value = value.clone();
                value.truncate(width);
                let cell = if column.kind == b'N' {
                    format!("{:>width$}", value, width = width)
                } else {
                    format!("{:<width$}", value, width = width)
                };
                out.extend_from_slice(cell.as_bytes());
            }
        }
        out.push(0x1A);
        out
    }
}

/// Entries for one complete `.shp`/`.shx`/`.dbf` triple with placeholder geometry.
pub fn unit_entries(base: &str, dbf: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    vec![
        (format!("{}.shp", base), vec![0u8; 100]),
        (format!("{}.shx", base), vec![0u8; 100]),
        (format!("{}.dbf", base), dbf),
    ]
}

pub fn zip_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .expect("Failed to create zip entry");
        zip.write_all(bytes).expect("Failed to write zip entry");
    }

    zip.finish().expect("Failed to finish zip").into_inner()
}

/// Attribute table carrying every column `activity` requires. Each row starts
/// from compliant defaults and applies its `(column, value)` overrides.
pub fn compliant_table(
    activity: crate::services::schema::Activity,
    rows: &[&[(&str, &str)]],
) -> Vec<u8> {
    let columns = activity
        .required_fields()
        .iter()
        .map(|&name| match name {
            "LUAS_HA" | "BTG_HA" | "JML_UNIT" => Column::numeric(name, 12, 2),
            "TGL_KNTRK" => Column::date(name),
            _ => Column::text(name, 20),
        })
        .collect();

    let mut builder = DbfBuilder::new(columns);
    for overrides in rows {
        let values: Vec<String> = activity
            .required_fields()
            .iter()
            .map(|name| {
                let default = match *name {
                    "LUAS_HA" => "12.40",
                    "BTG_HA" | "JML_UNIT" => "400",
                    "TGL_KNTRK" => "20240105",
                    _ => "X",
                };
                overrides
                    .iter()
                    .find(|(column, _)| column == name)
                    .map(|(_, value)| *value)
                    .unwrap_or(default)
                    .to_string()
            })
            .collect();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        builder = builder.row(&refs);
    }
    builder.build()
}
