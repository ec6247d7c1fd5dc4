use crate::error::ReadError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Lookup of archive members for the zip-based spreadsheet formats.
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a member by name, ignoring ASCII case and accepting `\` as separator.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ReadError>;

    /// Opens a member as an XML stream.
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ReadError>;

    /// Reads a small member fully as UTF-8 text.
    fn read_to_string(&mut self, name: &str) -> Result<Option<String>, ReadError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ReadError> {
        let wanted = name.replace('\\', "/");
        let Some(member) = self
            .file_names()
            .find(|candidate| wanted.eq_ignore_ascii_case(candidate.trim_start_matches('/')))
            .map(str::to_owned)
        else {
            return Ok(None);
        };
        match self.by_name(&member) {
            Ok(file) => Ok(Some(file)),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ReadError> {
        Ok(self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file))))
    }

    fn read_to_string(&mut self, name: &str) -> Result<Option<String>, ReadError> {
        let Some(mut file) = self.file(name)? else {
            return Ok(None);
        };
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(Some(content))
    }
}
