//! Sheet loader: turns spreadsheet files into [`RawGrid`]s.
//!
//! Supported formats are the Office Open XML workbook family (`.xlsx`,
//! `.xlsm`, `.xltx`, `.xltm`, `.xlam`), OpenDocument spreadsheets (`.ods`) and
//! delimited text (`.csv`, read as a single sheet named after the file stem).
//! Every failure is reported as [`Error::UnreadableFile`].

mod cell;
mod csv;
mod ods;
mod reference;
mod sheet;
mod xlsx;

use crate::error::ReadError;
use crate::error::ReadResult;
use crate::error::Result;
use crate::helpers::reader::SourceReader;
use crate::table::RawGrid;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use thiserror::Error;

pub(crate) use cell::CellType;
pub(crate) use sheet::SheetCells;

#[derive(Error, Debug)]
pub(crate) enum SpreadsheetError {
    #[error("Unsupported file format '{0}'")]
    UnsupportedFormat(String),

    #[error("Legacy binary or password-protected workbooks are not supported")]
    CompoundDocument,

    #[error("Unexpected MIME type '{0}'")]
    MimeType(String),

    #[error("Document is password protected")]
    PasswordProtected,

    #[error("Workbook contains no sheets")]
    EmptyWorkbook,

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Archive member '{0}' is missing")]
    MissingPart(String),

    #[error("Shared string index {0} is out of range")]
    SharedStringIndex(usize),

    #[error("Sheet '{0}' is too large to load")]
    SheetTooLarge(String),
}

/// An opened spreadsheet file.
pub trait Spreadsheet {
    /// Path or upload name the spreadsheet was opened from.
    fn name(&self) -> &str;

    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    /// Decodes one sheet into a grid tagged with its provenance.
    fn read_sheet(&mut self, sheet_name: &str) -> Result<RawGrid>;
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Format {
    Xlsx,
    Ods,
    Csv,
}

impl Format {
    fn detect(name: &str) -> std::result::Result<Format, SpreadsheetError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xltx" | "xltm" | "xlam" => Ok(Format::Xlsx),
            "ods" => Ok(Format::Ods),
            "csv" => Ok(Format::Csv),
            _ => Err(SpreadsheetError::UnsupportedFormat(name.to_owned())),
        }
    }
}

/// Opens a spreadsheet file from disk, choosing the reader by extension.
pub fn open_spreadsheet(path: impl AsRef<Path>) -> Result<Box<dyn Spreadsheet>> {
    let path = path.as_ref();
    let name = path.to_string_lossy().into_owned();
    let opened = Format::detect(&name)
        .map_err(ReadError::from)
        .and_then(|format| Ok((format, SourceReader::open(path)?)))
        .and_then(|(format, reader)| open_reader(&name, format, reader));
    let spreadsheet = opened.or_unreadable(&name)?;
    log::debug!("Opened '{}' with sheets {:?}", name, spreadsheet.sheet_names());
    Ok(spreadsheet)
}

/// Opens an in-memory spreadsheet, such as an upload, identified by `name`.
pub fn open_spreadsheet_bytes(name: &str, bytes: Vec<u8>) -> Result<Box<dyn Spreadsheet>> {
    let opened = Format::detect(name)
        .map_err(ReadError::from)
        .and_then(|format| open_reader(name, format, SourceReader::from_bytes(bytes)));
    let spreadsheet = opened.or_unreadable(name)?;
    log::debug!("Opened upload '{}' with sheets {:?}", name, spreadsheet.sheet_names());
    Ok(spreadsheet)
}

fn open_reader(name: &str, format: Format, mut reader: SourceReader) -> std::result::Result<Box<dyn Spreadsheet>, ReadError> {
    match format {
        Format::Xlsx | Format::Ods => {
            if is_compound_document(&mut reader)? {
                Err(SpreadsheetError::CompoundDocument)?;
            }
            if format == Format::Xlsx {
                Ok(Box::new(xlsx::XlsxSpreadsheet::open(name, reader)?))
            } else {
                Ok(Box::new(ods::OdsSpreadsheet::open(name, reader)?))
            }
        }
        Format::Csv => Ok(Box::new(csv::CsvSpreadsheet::open(name, reader)?)),
    }
}

/// Encrypted OOXML packages and legacy `.xls` files are OLE compound
/// documents rather than zip archives.
fn is_compound_document(reader: &mut SourceReader) -> std::result::Result<bool, ReadError> {
    const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
    let mut header = [0u8; 8];
    let mut filled = 0;
    while filled < header.len() {
        let read = reader.read(&mut header[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    reader.seek(SeekFrom::Start(0))?;
    Ok(filled == header.len() && header == SIGNATURE)
}
