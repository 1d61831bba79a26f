use std::error;
use std::fmt;
use std::io;
use std::str;

use crate::{
    BoxReader, BoxType, BoxWriter, JBox, JP2Error, BOX_TYPE_DATA_ENTRY_URL, BOX_TYPE_FREE,
    BOX_TYPE_INTELLECTUAL_PROPERTY, BOX_TYPE_UUID, BOX_TYPE_UUID_LIST, BOX_TYPE_XML,
};

// Count of NUL bytes at the end of a payload.
pub(crate) fn trailing_nuls(data: &[u8]) -> usize {
    data.iter().rev().take_while(|byte| **byte == 0).count()
}

/// Intellectual Property box.
///
/// In ISO/IEC 15444-1 / T.800, the definition of the format of the contents of
/// this box is reserved for ISO.
///
/// In ISO/IEC 15444-2 / T.801, the definition of the format of the contents of
/// this box is given as XML. See ISO/IEC 15444-2 / T.801 Annex N.
#[derive(Debug, Default)]
pub struct IntellectualPropertyBox {
    data: Vec<u8>,
}

impl IntellectualPropertyBox {
    pub fn new(data: Vec<u8>) -> IntellectualPropertyBox {
        IntellectualPropertyBox { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn format(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl JBox for IntellectualPropertyBox {
    // The type of the Intellectual Property Box shall be ‘jp2i’ (0x6A70 3269).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_INTELLECTUAL_PROPERTY
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.data = reader.read_to_end()?;
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.data)?;
        Ok(())
    }
}

impl fmt::Display for IntellectualPropertyBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// Whether every element opened in the document is closed in order. A '>'
// inside an attribute value ends the tag early.
fn tags_balanced(document: &str) -> bool {
    let mut open: Vec<&str> = vec![];
    let mut rest = document;
    while let Some(start) = rest.find('<') {
        rest = &rest[start..];
        let (terminator, markup) = if rest.starts_with("<!--") {
            ("-->", true)
        } else if rest.starts_with("<![CDATA[") {
            ("]]>", true)
        } else {
            (">", false)
        };
        let end = match rest.find(terminator) {
            Some(end) => end,
            None => return false,
        };
        let tag = &rest[1..end];
        rest = &rest[end + terminator.len()..];

        if markup || tag.starts_with('?') || tag.starts_with('!') || tag.ends_with('/') {
            continue;
        }
        if let Some(name) = tag.strip_prefix('/') {
            if open.pop() != Some(name.trim_end()) {
                return false;
            }
        } else {
            open.push(tag.split_whitespace().next().unwrap_or(""));
        }
    }
    open.is_empty()
}

/// XML box
///
/// An XML box contains vendor specific information (in XML format) other than
/// the information contained within boxes defined.
///
/// There may be multiple XML boxes within the file, and those boxes may be found
/// anywhere in the file except before the File Type box.
///
/// See ISO/IEC 15444-1:2024 Section I.7.1 for more details on this box.
///
/// Decoding only checks that the payload starts with markup and that its tags
/// nest; it is not validated as XML.
#[derive(Debug, Default)]
pub struct XMLBox {
    xml: String,

    // NUL bytes that followed the document.
    padding: usize,
}

impl XMLBox {
    pub fn new(xml: &str) -> XMLBox {
        XMLBox {
            xml: xml.to_owned(),
            padding: 0,
        }
    }

    /// Get the XML body as a UTF-8 string.
    pub fn format(&self) -> &str {
        &self.xml
    }
}

impl JBox for XMLBox {
    // The type of an XML box is ‘xml\040’ (0x786D 6C20).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_XML
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        let mut data = reader.read_to_end()?;
        self.padding = trailing_nuls(&data);
        data.truncate(data.len() - self.padding);

        self.xml = match String::from_utf8(data) {
            Ok(xml) => xml,
            Err(_) => {
                return Err(JP2Error::BoxMalformed {
                    box_type: BOX_TYPE_XML,
                    offset,
                    reason: "XML is not valid UTF-8",
                }
                .into())
            }
        };

        let document = self.xml.trim_start_matches('\u{feff}').trim_start();
        if !document.starts_with('<') {
            reader.warn(
                offset,
                Some(BOX_TYPE_XML),
                "payload does not look like an XML document".to_string(),
            );
        } else if !tags_balanced(document) {
            reader.warn(
                offset,
                Some(BOX_TYPE_XML),
                "XML document has unclosed or mismatched tags".to_string(),
            );
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(self.xml.as_bytes())?;
        writer.write_bytes(&vec![0; self.padding])?;
        Ok(())
    }
}

impl fmt::Display for XMLBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.xml)
    }
}

/// UUID box.
///
/// A UUID box contains vendor specific information other than the information
/// contained within boxes defined.
///
/// See ISO/IEC 15444-1:2024 Section I.7.2 for more details on this box.
#[derive(Debug, Default)]
pub struct UUIDBox {
    uuid: [u8; 16],
    data: Vec<u8>,
}

impl UUIDBox {
    pub fn new(uuid: [u8; 16], data: Vec<u8>) -> UUIDBox {
        UUIDBox { uuid, data }
    }

    /// Get the UUID for the box.
    ///
    /// This field contains a 16-byte UUID as specified by ISO/IEC 11578. The
    /// value of this UUID specifies the format of the vendor-specific information
    /// stored in the DATA field and the interpretation of that information.
    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    /// Get the vendor-specific information.
    pub fn data(&self) -> &Vec<u8> {
        &self.data
    }
}

impl JBox for UUIDBox {
    // The type of a UUID box shall be ‘uuid’ (0x7575 6964).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_UUID
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.uuid = reader.read_array()?;
        self.data = reader.read_to_end()?;

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.uuid)?;
        writer.write_bytes(&self.data)?;
        Ok(())
    }
}

/// UUID in its canonical hyphenated form.
pub(crate) fn format_uuid(uuid: &[u8; 16]) -> String {
    let hex: Vec<String> = uuid.iter().map(|byte| format!("{:02x}", byte)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex[0..4].concat(),
        hex[4..6].concat(),
        hex[6..8].concat(),
        hex[8..10].concat(),
        hex[10..16].concat()
    )
}

impl fmt::Display for UUIDBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "UUID:  {}", format_uuid(&self.uuid))?;
        write!(f, "UUID Data:  {} bytes", self.data.len())
    }
}

// I.7.3.1
//
// UUID List box
//
// This box contains a list of UUIDs to be associated with the URL contained in
// the Data Entry URL box within the same UUID Info box.
#[derive(Debug, Default)]
pub struct UUIDListBox {
    ids: Vec<[u8; 16]>,
}

impl UUIDListBox {
    pub fn new(ids: Vec<[u8; 16]>) -> UUIDListBox {
        UUIDListBox { ids }
    }

    pub fn ids(&self) -> &Vec<[u8; 16]> {
        &self.ids
    }
}

impl JBox for UUIDListBox {
    // The type of a UUID List box shall be ‘ulst’ (0x756C 7374)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_UUID_LIST
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        // NU: Number of UUIDs, a 2-byte big-endian unsigned integer.
        let size = reader.read_u16()?;

        self.ids = Vec::with_capacity(size as usize);
        for _ in 0..size {
            self.ids.push(reader.read_array()?);
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        if self.ids.len() > u16::MAX as usize {
            return Err(JP2Error::ValueTooLarge {
                field: "UUID count",
                value: self.ids.len() as u64,
            }
            .into());
        }
        writer.write_u16(self.ids.len() as u16)?;
        for id in &self.ids {
            writer.write_bytes(id)?;
        }
        Ok(())
    }
}

impl fmt::Display for UUIDListBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self
            .ids
            .iter()
            .enumerate()
            .map(|(index, id)| format!("UUID[{}]:  {}", index, format_uuid(id)))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

// I.7.3.2
//
// Data Entry URL box
//
// This box contains a URL which can be used by an application to acquire more
// information about the associated vendor-specific extensions. Inside a Data
// Reference box the same box names the file holding codestream fragments.
//
// Relative URLs are permissible and are relative to the file containing this
// Data Entry URL box.
#[derive(Debug, Default)]
pub struct DataEntryURLBox {
    // VERS: Version number, shall be 0.
    version: u8,

    // FLAG: Flags, shall be 0.
    flags: [u8; 3],

    // LOC: Location, a null terminated string of UTF-8 characters.
    location: String,

    // NUL bytes that ended the location.
    padding: usize,
}

impl DataEntryURLBox {
    pub fn new(location: &str) -> DataEntryURLBox {
        DataEntryURLBox {
            version: 0,
            flags: [0; 3],
            location: location.to_owned(),
            padding: 1,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn flags(&self) -> [u8; 3] {
        self.flags
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl JBox for DataEntryURLBox {
    // The type of a Data Entry URL box shall be 'url\040' (0x7572 6C20).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_DATA_ENTRY_URL
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.version = reader.read_u8()?;
        self.flags = reader.read_array()?;

        let mut location = reader.read_to_end()?;
        self.padding = trailing_nuls(&location);
        location.truncate(location.len() - self.padding);
        self.location = match str::from_utf8(&location) {
            Ok(location) => location.to_owned(),
            Err(_) => {
                return Err(JP2Error::BoxMalformed {
                    box_type: BOX_TYPE_DATA_ENTRY_URL,
                    offset,
                    reason: "location is not valid UTF-8",
                }
                .into())
            }
        };

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_u8(self.version)?;
        writer.write_bytes(&self.flags)?;
        writer.write_bytes(self.location.as_bytes())?;
        writer.write_bytes(&vec![0; self.padding])?;
        Ok(())
    }
}

impl fmt::Display for DataEntryURLBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Version:  {}", self.version)?;
        writeln!(f, "Flag:  {:02x?}", self.flags)?;
        write!(f, "URL:  \"{}\"", self.location)
    }
}

/// Free box.
///
/// Space reserved for later edits; readers skip its contents.
#[derive(Debug, Default)]
pub struct FreeBox {
    data: Vec<u8>,
}

impl FreeBox {
    pub fn new(data: Vec<u8>) -> FreeBox {
        FreeBox { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl JBox for FreeBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FREE
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.data = reader.read_to_end()?;
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.data)?;
        Ok(())
    }
}

impl fmt::Display for FreeBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.data.is_empty() {
            Ok(())
        } else {
            write!(f, "Free space:  {} bytes", self.data.len())
        }
    }
}
