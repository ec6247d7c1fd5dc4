use crate::error::ReadError;
use crate::error::ReadResult;
use crate::error::Result;
use crate::helpers::reader::SourceReader;
use crate::spreadsheet::SheetCells;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::RawCell;
use crate::table::RawGrid;
use csv::ByteRecord;
use csv::ReaderBuilder;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A delimited text file, exposed as one sheet named after the file stem.
pub(crate) struct CsvSpreadsheet {
    name: String,
    sheet_name: String,
    bytes: Vec<u8>,
}

impl CsvSpreadsheet {
    pub(crate) fn open(name: &str, reader: SourceReader) -> Result<CsvSpreadsheet, ReadError> {
        let mut bytes = reader.into_bytes()?;
        if bytes.starts_with(UTF8_BOM) {
            bytes.drain(..UTF8_BOM.len());
        }
        let sheet_name = Path::new(name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_owned());
        Ok(CsvSpreadsheet {
            name: name.to_owned(),
            sheet_name,
            bytes,
        })
    }

    fn load_sheet(&self, sheet_name: &str) -> Result<RawGrid, ReadError> {
        if sheet_name != self.sheet_name {
            Err(SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(detect_delimiter(&self.bytes))
            .from_reader(self.bytes.as_slice());

        let mut sheet = SheetCells::new(&self.name, sheet_name);
        let mut record = ByteRecord::new();
        let mut row = 0usize;
        while reader.read_byte_record(&mut record)? {
            for (col, field) in record.iter().enumerate() {
                if !field.is_empty() {
                    let text = String::from_utf8_lossy(field).into_owned();
                    sheet.push(row, col, RawCell::Text(text));
                }
            }
            row += 1;
        }
        Ok(sheet.into_grid()?)
    }
}

impl Spreadsheet for CsvSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        vec![self.sheet_name.clone()]
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<RawGrid> {
        let grid = self.load_sheet(sheet_name).or_unreadable(&self.name)?;
        log::debug!("Read {} rows from '{}'", grid.height(), self.name);
        Ok(grid)
    }
}

/// Picks the most frequent of comma, semicolon and tab on the first line,
/// preferring comma on ties.
fn detect_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    let count = |delimiter: u8| first_line.iter().filter(|&&b| b == delimiter).count();
    [b';', b'\t']
        .into_iter()
        .fold((b',', count(b',')), |best, candidate| {
            let candidate_count = count(candidate);
            if candidate_count > best.1 {
                (candidate, candidate_count)
            } else {
                best
            }
        })
        .0
}
