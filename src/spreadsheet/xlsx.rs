use crate::error::ReadError;
use crate::error::ReadResult;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::for_each_xml_event;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::StartTagExt;
use crate::helpers::xml::TextBuffer;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::CellType;
use crate::spreadsheet::SheetCells;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use crate::table::RawGrid;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use zip::ZipArchive;

const TAG_RELATIONSHIP: &[u8] = b"Relationship";
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_CELL_FORMATS: QName = QName(b"cellXfs");
const TAG_CELL_FORMAT: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_RUN: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

const PART_WORKBOOK: &str = "xl/workbook.xml";
const PART_WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
const PART_STYLES: &str = "xl/styles.xml";
const PART_SHARED_STRINGS: &str = "xl/sharedStrings.xml";

/// An Office Open XML workbook.
pub(crate) struct XlsxSpreadsheet {
    name: String,
    zip: ZipArchive<SourceReader>,
    /// Cell kind per style index (`s` attribute of a cell).
    number_formats: Vec<CellType>,
    /// Loaded on first sheet read.
    shared_strings: Option<Vec<String>>,
    /// `(sheet name, archive path)` in workbook order.
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(name: &str, reader: SourceReader) -> Result<XlsxSpreadsheet, ReadError> {
        let mut zip = ZipArchive::new(reader)?;
        let (sheets, is_1904) = load_workbook(&mut zip).with_prefix(PART_WORKBOOK)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::EmptyWorkbook)?;
        }
        let number_formats = load_number_formats(&mut zip, is_1904).with_prefix(PART_STYLES)?;
        Ok(XlsxSpreadsheet {
            name: name.to_owned(),
            zip,
            number_formats,
            shared_strings: None,
            sheets,
        })
    }

    fn load_sheet(&mut self, sheet_name: &str) -> Result<RawGrid, ReadError> {
        let path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;

        if self.shared_strings.is_none() {
            let strings = load_shared_strings(&mut self.zip).with_prefix(PART_SHARED_STRINGS)?;
            self.shared_strings = Some(strings);
        }
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();
        let number_formats = &self.number_formats;

        let mut reader = self
            .zip
            .xml_reader(&path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(path.clone()))?;
        let mut sheet = SheetCells::new(&self.name, sheet_name);
        let mut next_row = 0usize;
        let mut next_col = 0usize;
        let mut position = (0usize, 0usize);
        let mut kind = CellType::Empty;
        let mut value = String::new();
        for_each_xml_event!(reader => {
            Event::Start(tag) if tag.name() == TAG_ROW => {
                if let Some(r) = tag.parse_attribute::<usize>("r")? {
                    next_row = r.saturating_sub(1);
                }
                next_col = 0;
            }
            Event::End(tag) if tag.name() == TAG_ROW => next_row = next_row.saturating_add(1),
            Event::Start(tag) if tag.name() == TAG_CELL => {
                position = tag
                    .attribute("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((next_row, next_col));
                next_col = position.1.saturating_add(1);
                value.clear();
                kind = match tag.attribute("t")?.as_deref() {
                    Some("s") => CellType::SharedString,
                    Some("inlineStr") | Some("str") => CellType::InlineString,
                    Some("b") => CellType::Boolean,
                    Some("d") => CellType::IsoDateTime,
                    Some("e") => CellType::Error,
                    _ => CellType::Number,
                };
                if kind == CellType::Number {
                    if let Some(style) = tag.parse_attribute::<usize>("s")? {
                        kind = number_formats.get(style).copied().unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(tag) if tag.name() == TAG_INLINE_STRING => {
                value = read_text(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(tag) if tag.name() == TAG_VALUE => {
                value = read_text(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(tag) if tag.name() == TAG_CELL => {
                if !value.is_empty() {
                    let (row, col) = position;
                    sheet.push(row, col, kind.to_raw_cell(&value, shared_strings)?);
                }
            }
        });
        Ok(sheet.into_grid()?)
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<RawGrid> {
        let grid = self.load_sheet(sheet_name).with_prefix(sheet_name);
        let grid = grid.or_unreadable(&self.name)?;
        log::debug!("Read {} rows from '{}' in '{}'", grid.height(), sheet_name, self.name);
        Ok(grid)
    }
}

/// Sheet names with their archive paths, and whether the 1904 date system is used.
fn load_workbook(zip: &mut ZipArchive<SourceReader>) -> Result<(Vec<(String, String)>, bool), ReadError> {
    let relationships = load_relationships(zip)?;
    let mut reader = zip
        .xml_reader(PART_WORKBOOK)?
        .ok_or_else(|| SpreadsheetError::MissingPart(PART_WORKBOOK.to_owned()))?;
    let mut sheets = Vec::new();
    let mut is_1904 = false;
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.name() == TAG_SHEET => {
            let mut name = None;
            let mut id = None;
            for attribute in tag.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.unescape_value()?.into_owned()),
                    b"id" => id = Some(attribute.unescape_value()?.into_owned()),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id) {
                    sheets.push((name, path.clone()));
                }
            }
        }
        Event::Start(tag) if tag.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = tag
                .attribute("date1904")?
                .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
        }
    });
    Ok((sheets, is_1904))
}

/// Worksheet relationship ids mapped to archive paths.
fn load_relationships(zip: &mut ZipArchive<SourceReader>) -> Result<HashMap<String, String>, ReadError> {
    let mut reader = zip
        .xml_reader(PART_WORKBOOK_RELS)?
        .ok_or_else(|| SpreadsheetError::MissingPart(PART_WORKBOOK_RELS.to_owned()))?;
    let mut relationships = HashMap::new();
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.local_name().as_ref() == TAG_RELATIONSHIP => {
            let is_worksheet = tag
                .attribute("Type")?
                .map_or(true, |kind| kind.ends_with("/worksheet"));
            let id = tag.attribute("Id")?.map(|id| id.into_owned());
            let target = tag.attribute("Target")?.map(|target| to_zip_path(&target));
            if let (true, Some(id), Some(target)) = (is_worksheet, id, target) {
                relationships.insert(id, target);
            }
        }
    });
    Ok(relationships)
}

/// Resolves a relationship target against the `xl/` folder.
fn to_zip_path(target: &str) -> String {
    let target = target.replace('\\', "/");
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target
    } else {
        format!("xl/{target}")
    }
}

/// Cell kind for every entry of `cellXfs`, derived from its number format.
fn load_number_formats(zip: &mut ZipArchive<SourceReader>, is_1904: bool) -> Result<Vec<CellType>, ReadError> {
    let Some(mut reader) = zip.xml_reader(PART_STYLES)? else {
        return Ok(Vec::new());
    };

    let mut in_custom_formats = false;
    let mut in_cell_formats = false;
    let mut custom_formats = HashMap::<u32, CellType>::new();
    let mut format_ids = Vec::<u32>::new();
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(tag) if tag.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(tag) if in_custom_formats && tag.name() == TAG_CUSTOM_FORMAT => {
            let id = tag.parse_attribute::<u32>("numFmtId")?;
            let code = tag.attribute("formatCode")?;
            if let (Some(id), Some(code)) = (id, code) {
                custom_formats.insert(id, CellType::from_custom_format(&code, is_1904));
            }
        }
        Event::Start(tag) if tag.name() == TAG_CELL_FORMATS => in_cell_formats = true,
        Event::End(tag) if tag.name() == TAG_CELL_FORMATS => in_cell_formats = false,
        Event::Start(tag) if in_cell_formats && tag.name() == TAG_CELL_FORMAT => {
            format_ids.push(tag.parse_attribute::<u32>("numFmtId")?.unwrap_or(0));
        }
    });

    Ok(format_ids
        .into_iter()
        .map(|id| {
            custom_formats
                .get(&id)
                .copied()
                .or_else(|| CellType::from_builtin_format(id, is_1904))
                .unwrap_or(CellType::Number)
        })
        .collect())
}

fn load_shared_strings(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<String>, ReadError> {
    let Some(mut reader) = zip.xml_reader(PART_SHARED_STRINGS)? else {
        return Ok(Vec::new());
    };
    let mut strings = Vec::new();
    for_each_xml_event!(reader => {
        Event::Start(tag) if tag.name() == TAG_SHARED_STRING_ITEM => {
            strings.push(read_text(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(strings)
}

/// Collects character data up to `end_tag`. Rich-text runs are concatenated
/// and phonetic runs are skipped. With `is_text_content` the element itself
/// holds the text; otherwise only `<t>` children do.
fn read_text<R: BufRead>(reader: &mut XmlReader<R>, end_tag: QName, is_text_content: bool) -> Result<String, ReadError> {
    let mut in_phonetic = false;
    let mut in_text = is_text_content;
    let mut text = String::new();
    while let Some(event) = reader.next()? {
        match event {
            Event::End(tag) if tag.name() == end_tag => break,
            Event::Start(tag) if tag.name() == TAG_PHONETIC_RUN => in_phonetic = true,
            Event::End(tag) if tag.name() == TAG_PHONETIC_RUN => in_phonetic = false,
            Event::Start(tag) if !in_phonetic && tag.name() == TAG_TEXT => in_text = true,
            Event::End(tag) if tag.name() == TAG_TEXT => in_text = is_text_content,
            Event::Text(content) if in_text => text.push_text(&content)?,
            Event::CData(content) if in_text => text.push_str(&content.xml_content()?),
            Event::GeneralRef(reference) if in_text => text.push_reference(&reference)?,
            _ => (),
        }
    }
    Ok(text)
}
