//! # Import Module
//!
//! Bulk loading of members from registration exports.
//!
//! CSV headers are matched case-insensitively against both the Vietnamese
//! column names of the sign-up forms and plain English names.
//!
//! Imports accept rows without an MSSV: anniversary sheets list alumni and
//! guests who never had one. Those members can only check in by card.

use crate::error::{Error, Result};
use crate::member::MemberDraft;
use std::io::Read;

/// Supported import formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ImportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ImportFormat::Csv),
            "json" => Ok(ImportFormat::Json),
            other => Err(Error::Validation(format!(
                "unknown import format '{other}' (expected csv or json)"
            ))),
        }
    }
}

/// Parse drafts in the given format.
pub fn read_members(reader: impl Read, format: ImportFormat) -> Result<Vec<MemberDraft>> {
    match format {
        ImportFormat::Csv => read_members_csv(reader),
        ImportFormat::Json => read_members_json(reader),
    }
}

/// Parse a JSON array of drafts.
pub fn read_members_json(reader: impl Read) -> Result<Vec<MemberDraft>> {
    let drafts: Vec<MemberDraft> = serde_json::from_reader(reader)?;
    drafts
        .into_iter()
        .enumerate()
        .map(|(i, d)| {
            d.validate_import().map_err(|e| Error::InvalidRecord {
                line: i as u64 + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}

// =============================================================================
// CSV
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Mssv,
    Name,
    Specialist,
    Note,
    IdCard,
    Organization,
    Role,
    JoinYear,
}

const HEADERS: &[(&str, Column)] = &[
    ("mssv", Column::Mssv),
    ("họ và tên", Column::Name),
    ("name", Column::Name),
    ("mảng hoạt động", Column::Specialist),
    ("khóa", Column::Specialist),
    ("specialist", Column::Specialist),
    ("ghi chú", Column::Note),
    ("note", Column::Note),
    ("idcard", Column::IdCard),
    ("id_card", Column::IdCard),
    ("tổ chức/nguồn gốc", Column::Organization),
    ("organization", Column::Organization),
    ("cựu vai trò ở clb", Column::Role),
    ("role", Column::Role),
    ("năm tham gia", Column::JoinYear),
    ("join_year", Column::JoinYear),
];

fn column_for(header: &str) -> Option<Column> {
    let header = header.trim_start_matches('\u{feff}').trim().to_lowercase();
    HEADERS
        .iter()
        .find(|(name, _)| *name == header)
        .map(|(_, col)| *col)
}

/// Parse a CSV export with a header row.
pub fn read_members_csv(reader: impl Read) -> Result<Vec<MemberDraft>> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    // First matching header wins when a sheet carries two aliases.
    let mut columns: Vec<(usize, Column)> = Vec::new();
    for (idx, header) in csv.headers()?.iter().enumerate() {
        if let Some(col) = column_for(header) {
            if !columns.iter().any(|(_, c)| *c == col) {
                columns.push((idx, col));
            }
        }
    }
    if !columns.iter().any(|(_, c)| *c == Column::Name) {
        return Err(Error::InvalidRecord {
            line: 1,
            reason: "missing Name column".to_string(),
        });
    }

    let mut drafts = Vec::new();
    for record in csv.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut draft = MemberDraft::default();
        for (idx, col) in &columns {
            let value = record.get(*idx).unwrap_or_default().to_string();
            match col {
                Column::Mssv => draft.mssv = Some(value),
                Column::Name => draft.name = value,
                Column::Specialist => draft.specialist = Some(value),
                Column::Note => draft.note = Some(value),
                Column::IdCard => draft.id_card = Some(value),
                Column::Organization => draft.organization = Some(value),
                Column::Role => draft.role = Some(value),
                Column::JoinYear => draft.join_year = Some(value),
            }
        }

        let draft = draft.validate_import().map_err(|e| Error::InvalidRecord {
            line,
            reason: e.to_string(),
        })?;
        drafts.push(draft);
    }
    Ok(drafts)
}
