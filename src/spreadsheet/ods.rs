use crate::error::ReadError;
use crate::error::ReadResult;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::for_each_xml_event;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::StartTagExt;
use crate::helpers::xml::TextBuffer;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::CellType;
use crate::spreadsheet::SheetCells;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::RawGrid;
use quick_xml::events::Event;
use quick_xml::name::QName;
use zip::ZipArchive;

const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";
const PART_MIME_TYPE: &str = "mimetype";
const PART_MANIFEST: &str = "META-INF/manifest.xml";
const PART_CONTENT: &str = "content.xml";

const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
const SPACES: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

/// An OpenDocument spreadsheet. Sheets are the `table:table` elements of
/// `content.xml`.
pub(crate) struct OdsSpreadsheet {
    name: String,
    zip: ZipArchive<SourceReader>,
    sheets: Vec<String>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(name: &str, reader: SourceReader) -> Result<OdsSpreadsheet, ReadError> {
        let mut zip = ZipArchive::new(reader)?;
        check_mime_type(&mut zip)?;
        if is_password_protected(&mut zip).with_prefix(PART_MANIFEST)? {
            Err(SpreadsheetError::PasswordProtected)?;
        }
        let sheets = load_sheet_names(&mut zip).with_prefix(PART_CONTENT)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook)?;
        }
        Ok(OdsSpreadsheet {
            name: name.to_owned(),
            zip,
            sheets,
        })
    }

    fn load_sheet(&mut self, sheet_name: &str) -> Result<RawGrid, ReadError> {
        if !self.sheets.iter().any(|name| name == sheet_name) {
            Err(SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;
        }
        let mut reader = self
            .zip
            .xml_reader(PART_CONTENT)?
            .ok_or_else(|| SpreadsheetError::MissingPart(PART_CONTENT.to_owned()))?;

        let mut sheet = SheetCells::new(&self.name, sheet_name);
        let mut in_table = false;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut rows_repeated = 1usize;
        let mut cols_repeated = 1usize;
        let mut kind = CellType::Empty;
        let mut value = String::new();
        let mut in_text = false;
        let mut in_paragraph = false;
        let mut in_annotation = false;
        for_each_xml_event!(reader => {
            Event::Start(tag) if !in_table && tag.name() == TABLE => {
                in_table = tag.attribute("table:name")?.is_some_and(|name| name == sheet_name);
            }
            Event::End(tag) if in_table && tag.name() == TABLE => break,
            Event::Start(tag) if in_table && tag.name() == TABLE_ROW => {
                rows_repeated = tag.parse_attribute("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(tag) if in_table && tag.name() == TABLE_ROW => row = row.saturating_add(rows_repeated),
            Event::Start(tag) if in_table && (tag.name() == TABLE_CELL || tag.name() == TABLE_COVERED_CELL) => {
                value.clear();
                cols_repeated = tag.parse_attribute("table:number-columns-repeated")?.unwrap_or(1);
                let is_error = tag.attribute("calcext:value-type")?.is_some_and(|kind| kind == "error");
                kind = CellType::Empty;
                in_text = false;
                match tag.attribute("office:value-type")?.as_deref() {
                    Some("boolean") => {
                        kind = CellType::Boolean;
                        let truth = tag
                            .attribute("office:boolean-value")?
                            .is_some_and(|value| value != "false" && value != "0");
                        value.push(if truth { '1' } else { '0' });
                    }
                    Some("date") => {
                        kind = CellType::IsoDateTime;
                        value.push_str(&tag.attribute("office:date-value")?.unwrap_or_default());
                    }
                    Some("time") => {
                        kind = CellType::IsoDuration;
                        value.push_str(&tag.attribute("office:time-value")?.unwrap_or_default());
                    }
                    Some("string") => {
                        kind = if is_error { CellType::Error } else { CellType::InlineString };
                        in_text = true;
                    }
                    Some(_) => {
                        kind = CellType::Number;
                        value.push_str(&tag.attribute("office:value")?.unwrap_or_default());
                    }
                    None if is_error => {
                        kind = CellType::Error;
                        in_text = true;
                    }
                    None => (),
                }
            }
            Event::End(tag) if in_table && (tag.name() == TABLE_CELL || tag.name() == TABLE_COVERED_CELL) => {
                if kind != CellType::Empty && !value.is_empty() {
                    let cell = kind.to_raw_cell(&value, &[])?;
                    sheet.push_repeated(row, col, rows_repeated, cols_repeated, cell)?;
                }
                col = col.saturating_add(cols_repeated);
                kind = CellType::Empty;
                in_text = false;
                in_paragraph = false;
                in_annotation = false;
            }
            Event::Start(tag) if in_text && tag.name() == ANNOTATION => in_annotation = true,
            Event::End(tag) if in_text && tag.name() == ANNOTATION => in_annotation = false,
            Event::Start(tag) if in_text && !in_annotation && tag.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
                in_paragraph = true;
            }
            Event::End(tag) if tag.name() == PARAGRAPH => in_paragraph = false,
            Event::Start(tag) if in_paragraph && !in_annotation && tag.name() == SPACES => {
                let count = tag.parse_attribute::<usize>("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Start(tag) if in_paragraph && !in_annotation && tag.name() == TAB => value.push('\t'),
            Event::Start(tag) if in_paragraph && !in_annotation && tag.name() == LINE_BREAK => value.push('\n'),
            Event::Text(content) if in_paragraph && !in_annotation => value.push_text(&content)?,
            Event::GeneralRef(reference) if in_paragraph && !in_annotation => value.push_reference(&reference)?,
        });
        Ok(sheet.into_grid()?)
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.clone()
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<RawGrid> {
        let grid = self.load_sheet(sheet_name).with_prefix(sheet_name);
        let grid = grid.or_unreadable(&self.name)?;
        log::debug!("Read {} rows from '{}' in '{}'", grid.height(), sheet_name, self.name);
        Ok(grid)
    }
}

fn check_mime_type(zip: &mut ZipArchive<SourceReader>) -> Result<(), ReadError> {
    if let Some(mime_type) = zip.read_to_string(PART_MIME_TYPE)? {
        if mime_type.trim() != MIME_TYPE {
            Err(SpreadsheetError::MimeType(mime_type.trim().to_owned()))?;
        }
    }
    Ok(())
}

fn is_password_protected(zip: &mut ZipArchive<SourceReader>) -> Result<bool, ReadError> {
    let Some(mut reader) = zip.xml_reader(PART_MANIFEST)? else {
        return Ok(false);
    };
    let mut in_file_entry = false;
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(tag) if tag.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(tag) if in_file_entry && tag.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}

fn load_sheet_names(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<String>, ReadError> {
    let mut reader = zip
        .xml_reader(PART_CONTENT)?
        .ok_or_else(|| SpreadsheetError::MissingPart(PART_CONTENT.to_owned()))?;
    let mut names = Vec::new();
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.name() == TABLE => {
            if let Some(name) = tag.attribute("table:name")? {
                names.push(name.into_owned());
            }
        }
    });
    Ok(names)
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::spreadsheet::open_spreadsheet_bytes;
    use crate::spreadsheet::tests::zip_bytes;
    use crate::table::RawCell;
    use chrono::NaiveDate;

    const CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0"
    xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0"
    xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0"
    xmlns:calcext="urn:org:documentfoundation:names:experimental:calc:xmlns:calcext:1.0">
  <office:body>
    <office:spreadsheet>
      <table:table table:name="Schedule">
        <table:table-row>
          <table:table-cell office:value-type="string"><text:p>Task</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Start</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Hours</text:p></table:table-cell>
          <table:table-cell office:value-type="string"><text:p>Done</text:p></table:table-cell>
        </table:table-row>
        <table:table-row table:number-rows-repeated="2">
          <table:table-cell office:value-type="string"><text:p>Pour<text:s text:c="2"/>slab</text:p><office:annotation><text:p>note</text:p></office:annotation></table:table-cell>
          <table:table-cell office:value-type="date" office:date-value="2024-03-05"><text:p>03/05/24</text:p></table:table-cell>
          <table:table-cell office:value-type="float" office:value="7.5"><text:p>7.5</text:p></table:table-cell>
          <table:table-cell office:value-type="boolean" office:boolean-value="true"><text:p>TRUE</text:p></table:table-cell>
        </table:table-row>
        <table:table-row table:number-rows-repeated="1048570">
          <table:table-cell table:number-columns-repeated="1024"/>
        </table:table-row>
      </table:table>
      <table:table table:name="Crew">
        <table:table-row>
          <table:table-cell table:number-columns-repeated="2"/>
          <table:table-cell office:value-type="time" office:time-value="PT07H30M00S"><text:p>07:30</text:p></table:table-cell>
          <table:table-cell office:value-type="string" calcext:value-type="error"><text:p>#DIV/0!</text:p></table:table-cell>
          <table:table-cell office:value-type="percentage" office:value="0.25" table:number-columns-repeated="2"><text:p>25%</text:p></table:table-cell>
        </table:table-row>
      </table:table>
    </office:spreadsheet>
  </office:body>
</office:document-content>"#;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <manifest:file-entry manifest:full-path="/" manifest:media-type="application/vnd.oasis.opendocument.spreadsheet"/>
  <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>"#;

    const ENCRYPTED_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0">
  <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml">
    <manifest:encryption-data manifest:checksum-type="SHA1/1K"/>
  </manifest:file-entry>
</manifest:manifest>"#;

    fn document(manifest: &str) -> Vec<u8> {
        zip_bytes(&[
            ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
            ("META-INF/manifest.xml", manifest),
            ("content.xml", CONTENT),
        ])
    }

    fn text(value: &str) -> RawCell {
        RawCell::Text(value.to_owned())
    }

    #[test]
    fn test_sheet_names() {
        let spreadsheet = open_spreadsheet_bytes("site.ods", document(MANIFEST)).unwrap();
        assert_eq!(spreadsheet.sheet_names(), vec!["Schedule".to_owned(), "Crew".to_owned()]);
    }

    #[test]
    fn test_repeated_rows() {
        let mut spreadsheet = open_spreadsheet_bytes("site.ods", document(MANIFEST)).unwrap();
        let grid = spreadsheet.read_sheet("Schedule").unwrap();
        let start = RawCell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0).unwrap());
        let data = vec![text("Pour  slab"), start, RawCell::Number(7.5), RawCell::Boolean(true)];
        assert_eq!(
            grid.rows(),
            &[vec![text("Task"), text("Start"), text("Hours"), text("Done")], data.clone(), data]
        );
    }

    #[test]
    fn test_repeated_columns_and_special_values() {
        let mut spreadsheet = open_spreadsheet_bytes("site.ods", document(MANIFEST)).unwrap();
        let grid = spreadsheet.read_sheet("Crew").unwrap();
        assert_eq!(
            grid.rows(),
            &[vec![text("07:30:00"), text("#DIV/0!"), RawCell::Number(0.25), RawCell::Number(0.25)]]
        );
    }

    #[test]
    fn test_password_protected() {
        let error = open_spreadsheet_bytes("site.ods", document(ENCRYPTED_MANIFEST)).err().unwrap();
        match error {
            Error::UnreadableFile { reason, .. } => assert!(reason.contains("password")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_wrong_mime_type() {
        let bytes = zip_bytes(&[("mimetype", "application/vnd.oasis.opendocument.text"), ("content.xml", CONTENT)]);
        assert!(matches!(open_spreadsheet_bytes("letter.ods", bytes), Err(Error::UnreadableFile { .. })));
    }

    fn single_table(rows: &str) -> Vec<u8> {
        let content = format!(
            r#"<office:document-content xmlns:office="o" xmlns:table="t" xmlns:text="x">
  <office:body><office:spreadsheet><table:table table:name="Log">{rows}</table:table></office:spreadsheet></office:body>
</office:document-content>"#
        );
        zip_bytes(&[("mimetype", "application/vnd.oasis.opendocument.spreadsheet"), ("content.xml", content.as_str())])
    }

    #[test]
    fn test_repeats_clipped_to_sheet_limits() {
        let bytes = single_table(
            r#"<table:table-row><table:table-cell office:value-type="string"><text:p>Day</text:p></table:table-cell></table:table-row>
            <table:table-row table:number-rows-repeated="1048574"><table:table-cell/></table:table-row>
            <table:table-row table:number-rows-repeated="9">
              <table:table-cell office:value-type="float" office:value="3"/>
            </table:table-row>"#,
        );
        let mut spreadsheet = open_spreadsheet_bytes("log.ods", bytes).unwrap();
        let grid = spreadsheet.read_sheet("Log").unwrap();
        assert_eq!(grid.rows(), &[vec![text("Day")], vec![RawCell::Number(3.0)]]);
    }

    #[test]
    fn test_huge_repeated_block_is_unreadable() {
        let bytes = single_table(
            r#"<table:table-row table:number-rows-repeated="1048576">
              <table:table-cell office:value-type="float" office:value="1" table:number-columns-repeated="16384"/>
            </table:table-row>"#,
        );
        let mut spreadsheet = open_spreadsheet_bytes("log.ods", bytes).unwrap();
        match spreadsheet.read_sheet("Log") {
            Err(Error::UnreadableFile { reason, .. }) => assert!(reason.contains("too large")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_missing_sheet() {
        let mut spreadsheet = open_spreadsheet_bytes("site.ods", document(MANIFEST)).unwrap();
        assert!(matches!(spreadsheet.read_sheet("Budget"), Err(Error::UnreadableFile { .. })));
    }
}
