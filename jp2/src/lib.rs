use log::{debug, info, warn};
use std::error;
use std::fmt;
use std::io;

mod codestream;
mod header;
mod jpx;
mod metadata;
mod reader;
mod warning;
mod wrap;

pub use codestream::ContiguousCodestreamBox;
pub use header::{
    BitDepth, BitsPerComponentBox, Channel, ChannelDefinitionBox, ChannelTypes,
    ColourSpecificationBox, ColourSpecificationMethods, ComponentMap, ComponentMapType,
    ComponentMappingBox, EnumeratedColourSpaces, FileTypeBox, GeneratedComponent, ImageHeaderBox,
    PaletteBox, ResolutionBox, SignatureBox, BRAND_JP2, BRAND_JPX, BRAND_JPXB, SIGNATURE_MAGIC,
};
pub use jpx::{
    Association, DataReferenceBox, FragmentListBox, FragmentTableBox, LabelBox, NumberListBox,
    ReaderRequirementsBox, StandardFeature, VendorFeature,
};
pub use metadata::{
    DataEntryURLBox, FreeBox, IntellectualPropertyBox, UUIDBox, UUIDListBox, XMLBox,
};
pub use reader::{BoxReader, BoxWriter, ReaderError};
pub use warning::DecodeWarning;
pub use wrap::{validate, wrap, ValidationError};

#[derive(Debug)]
pub enum JP2Error {
    InvalidSignature {
        signature: [u8; 4],
        offset: u64,
    },
    BoxUnexpected {
        box_type: BoxType,
        offset: u64,
    },
    BoxMalformed {
        box_type: BoxType,
        offset: u64,
        reason: &'static str,
    },
    BoxMissing {
        box_type: BoxType,
    },
    BoxHeaderTruncated {
        offset: u64,
        remaining: u64,
    },
    BoxLengthInvalid {
        box_type: BoxType,
        offset: u64,
        length: u64,
    },
    BoxLengthExceedsContainer {
        box_type: BoxType,
        offset: u64,
        length: u64,
        remaining: u64,
    },
    ZeroLengthBoxNotLast {
        box_type: BoxType,
        offset: u64,
    },
    FragmentListEmpty,
    FragmentListLengthsMismatch {
        offsets: usize,
        lengths: usize,
        data_references: usize,
    },
    FragmentOffsetNotPositive {
        index: usize,
    },
    FragmentLengthNotPositive {
        index: usize,
    },
    FragmentTableChildCount {
        count: usize,
    },
    FragmentTableChildNotFragmentList {
        box_type: BoxType,
    },
    ReaderRequirementsMaskLength {
        mask_length: u8,
    },
    ValueTooLarge {
        field: &'static str,
        value: u64,
    },
}

impl error::Error for JP2Error {}
impl fmt::Display for JP2Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidSignature { signature, offset } => {
                write!(
                    f,
                    "invalid signature {:02x?} at offset {}",
                    signature, offset
                )
            }
            Self::BoxUnexpected { box_type, offset } => {
                write!(
                    f,
                    "unexpected box type {} at offset {}",
                    format_box_type(box_type),
                    offset
                )
            }
            Self::BoxMalformed {
                box_type,
                offset,
                reason,
            } => {
                write!(
                    f,
                    "malformed box type {} at offset {}: {}",
                    format_box_type(box_type),
                    offset,
                    reason
                )
            }
            Self::BoxMissing { box_type } => {
                write!(f, "box type {} missing", format_box_type(box_type))
            }
            Self::BoxHeaderTruncated { offset, remaining } => {
                write!(
                    f,
                    "box header at offset {} truncated, only {} bytes remaining",
                    offset, remaining
                )
            }
            Self::BoxLengthInvalid {
                box_type,
                offset,
                length,
            } => {
                write!(
                    f,
                    "invalid length {} for box type {} at offset {}",
                    length,
                    format_box_type(box_type),
                    offset
                )
            }
            Self::BoxLengthExceedsContainer {
                box_type,
                offset,
                length,
                remaining,
            } => {
                write!(
                    f,
                    "box type {} at offset {} has length {} but only {} bytes remain in its container",
                    format_box_type(box_type),
                    offset,
                    length,
                    remaining
                )
            }
            Self::ZeroLengthBoxNotLast { box_type, offset } => {
                write!(
                    f,
                    "box type {} at offset {} has length 0 but is not the last box in the file",
                    format_box_type(box_type),
                    offset
                )
            }
            Self::FragmentListEmpty => {
                write!(f, "fragment list has no fragments")
            }
            Self::FragmentListLengthsMismatch {
                offsets,
                lengths,
                data_references,
            } => {
                write!(
                    f,
                    "fragment list has {} offsets, {} lengths and {} data references",
                    offsets, lengths, data_references
                )
            }
            Self::FragmentOffsetNotPositive { index } => {
                write!(f, "fragment {} offset must be positive", index)
            }
            Self::FragmentLengthNotPositive { index } => {
                write!(f, "fragment {} length must be positive", index)
            }
            Self::FragmentTableChildCount { count } => {
                write!(
                    f,
                    "fragment table must contain exactly one box, found {}",
                    count
                )
            }
            Self::FragmentTableChildNotFragmentList { box_type } => {
                write!(
                    f,
                    "fragment table may only contain a fragment list, found {}",
                    format_box_type(box_type)
                )
            }
            Self::ReaderRequirementsMaskLength { mask_length } => {
                write!(
                    f,
                    "reader requirements mask length {} not in 1 to 8",
                    mask_length
                )
            }
            Self::ValueTooLarge { field, value } => {
                write!(f, "{} value {} too large to encode", field, value)
            }
        }
    }
}

// Errors that make the box structure itself unreadable. Anything else that
// goes wrong inside a payload only affects that one box.
fn is_structural(error: &(dyn error::Error + 'static)) -> bool {
    if let Some(error) = error.downcast_ref::<JP2Error>() {
        matches!(
            error,
            JP2Error::BoxHeaderTruncated { .. }
                | JP2Error::BoxLengthInvalid { .. }
                | JP2Error::BoxLengthExceedsContainer { .. }
                | JP2Error::ZeroLengthBoxNotLast { .. }
        )
    } else if let Some(error) = error.downcast_ref::<ReaderError>() {
        matches!(
            error,
            ReaderError::TruncatedStream { .. } | ReaderError::Io(_)
        )
    } else {
        false
    }
}

pub type BoxType = [u8; 4];

// jP\040\040 (0x6A50 2020)
pub const BOX_TYPE_SIGNATURE: BoxType = *b"jP  ";
pub const BOX_TYPE_FILE_TYPE: BoxType = *b"ftyp";
pub const BOX_TYPE_HEADER: BoxType = *b"jp2h";
pub const BOX_TYPE_IMAGE_HEADER: BoxType = *b"ihdr";
pub const BOX_TYPE_BITS_PER_COMPONENT: BoxType = *b"bpcc";
pub const BOX_TYPE_COLOUR_SPECIFICATION: BoxType = *b"colr";
pub const BOX_TYPE_PALETTE: BoxType = *b"pclr";
pub const BOX_TYPE_COMPONENT_MAPPING: BoxType = *b"cmap";
pub const BOX_TYPE_CHANNEL_DEFINITION: BoxType = *b"cdef";
// res\040 (0x7265 7320)
pub const BOX_TYPE_RESOLUTION: BoxType = *b"res ";
pub const BOX_TYPE_CAPTURE_RESOLUTION: BoxType = *b"resc";
pub const BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION: BoxType = *b"resd";
pub const BOX_TYPE_CONTIGUOUS_CODESTREAM: BoxType = *b"jp2c";
pub const BOX_TYPE_INTELLECTUAL_PROPERTY: BoxType = *b"jp2i";
// xml\040 (0x786D 6C20)
pub const BOX_TYPE_XML: BoxType = *b"xml ";
pub const BOX_TYPE_UUID: BoxType = *b"uuid";
pub const BOX_TYPE_UUID_INFO: BoxType = *b"uinf";
pub const BOX_TYPE_UUID_LIST: BoxType = *b"ulst";
// url\040 (0x7572 6C20)
pub const BOX_TYPE_DATA_ENTRY_URL: BoxType = *b"url ";
pub const BOX_TYPE_ASSOCIATION: BoxType = *b"asoc";
// lbl\040 (0x6C62 6C20)
pub const BOX_TYPE_LABEL: BoxType = *b"lbl ";
pub const BOX_TYPE_NUMBER_LIST: BoxType = *b"nlst";
pub const BOX_TYPE_DATA_REFERENCE: BoxType = *b"dtbl";
pub const BOX_TYPE_FRAGMENT_TABLE: BoxType = *b"ftbl";
pub const BOX_TYPE_FRAGMENT_LIST: BoxType = *b"flst";
pub const BOX_TYPE_READER_REQUIREMENTS: BoxType = *b"rreq";
pub const BOX_TYPE_CODESTREAM_HEADER: BoxType = *b"jpch";
pub const BOX_TYPE_COMPOSITING_LAYER_HEADER: BoxType = *b"jplh";
pub const BOX_TYPE_FREE: BoxType = *b"free";

/// Four character code as text, escaping anything that is not printable.
pub fn format_box_type(box_type: &BoxType) -> String {
    let mut text = String::with_capacity(box_type.len());
    for byte in box_type {
        if (0x20..=0x7E).contains(byte) {
            text.push(*byte as char);
        } else {
            text.push_str(&format!("\\x{:02x}", byte));
        }
    }
    format!("'{}'", text)
}

/// Box registry.
///
/// Maps a box type to the kind of box that decodes it. Unrecognised types map
/// to `Unknown` and are kept as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxTypes {
    Signature,
    FileType,
    Header,
    ImageHeader,
    BitsPerComponent,
    ColourSpecification,
    Palette,
    ComponentMapping,
    ChannelDefinition,
    Resolution,
    CaptureResolution,
    DefaultDisplayResolution,
    ContiguousCodestream,
    IntellectualProperty,
    Xml,
    Uuid,
    UUIDInfo,
    UUIDList,
    DataEntryURL,
    Association,
    Label,
    NumberList,
    DataReference,
    FragmentTable,
    FragmentList,
    ReaderRequirements,
    CodestreamHeader,
    CompositingLayerHeader,
    Free,
    Unknown,
}

impl BoxTypes {
    pub fn new(value: BoxType) -> BoxTypes {
        match value {
            BOX_TYPE_SIGNATURE => BoxTypes::Signature,
            BOX_TYPE_FILE_TYPE => BoxTypes::FileType,
            BOX_TYPE_HEADER => BoxTypes::Header,
            BOX_TYPE_IMAGE_HEADER => BoxTypes::ImageHeader,
            BOX_TYPE_BITS_PER_COMPONENT => BoxTypes::BitsPerComponent,
            BOX_TYPE_COLOUR_SPECIFICATION => BoxTypes::ColourSpecification,
            BOX_TYPE_PALETTE => BoxTypes::Palette,
            BOX_TYPE_COMPONENT_MAPPING => BoxTypes::ComponentMapping,
            BOX_TYPE_CHANNEL_DEFINITION => BoxTypes::ChannelDefinition,
            BOX_TYPE_RESOLUTION => BoxTypes::Resolution,
            BOX_TYPE_CAPTURE_RESOLUTION => BoxTypes::CaptureResolution,
            BOX_TYPE_DEFAULT_DISPLAY_RESOLUTION => BoxTypes::DefaultDisplayResolution,
            BOX_TYPE_CONTIGUOUS_CODESTREAM => BoxTypes::ContiguousCodestream,
            BOX_TYPE_INTELLECTUAL_PROPERTY => BoxTypes::IntellectualProperty,
            BOX_TYPE_XML => BoxTypes::Xml,
            BOX_TYPE_UUID => BoxTypes::Uuid,
            BOX_TYPE_UUID_INFO => BoxTypes::UUIDInfo,
            BOX_TYPE_UUID_LIST => BoxTypes::UUIDList,
            BOX_TYPE_DATA_ENTRY_URL => BoxTypes::DataEntryURL,
            BOX_TYPE_ASSOCIATION => BoxTypes::Association,
            BOX_TYPE_LABEL => BoxTypes::Label,
            BOX_TYPE_NUMBER_LIST => BoxTypes::NumberList,
            BOX_TYPE_DATA_REFERENCE => BoxTypes::DataReference,
            BOX_TYPE_FRAGMENT_TABLE => BoxTypes::FragmentTable,
            BOX_TYPE_FRAGMENT_LIST => BoxTypes::FragmentList,
            BOX_TYPE_READER_REQUIREMENTS => BoxTypes::ReaderRequirements,
            BOX_TYPE_CODESTREAM_HEADER => BoxTypes::CodestreamHeader,
            BOX_TYPE_COMPOSITING_LAYER_HEADER => BoxTypes::CompositingLayerHeader,
            BOX_TYPE_FREE => BoxTypes::Free,
            _ => BoxTypes::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BoxTypes::Signature => "JPEG 2000 Signature",
            BoxTypes::FileType => "File Type",
            BoxTypes::Header => "JP2 Header",
            BoxTypes::ImageHeader => "Image Header",
            BoxTypes::BitsPerComponent => "Bits Per Component",
            BoxTypes::ColourSpecification => "Colour Specification",
            BoxTypes::Palette => "Palette",
            BoxTypes::ComponentMapping => "Component Mapping",
            BoxTypes::ChannelDefinition => "Channel Definition",
            BoxTypes::Resolution => "Resolution",
            BoxTypes::CaptureResolution => "Capture Resolution",
            BoxTypes::DefaultDisplayResolution => "Default Display Resolution",
            BoxTypes::ContiguousCodestream => "Contiguous Codestream",
            BoxTypes::IntellectualProperty => "Intellectual Property",
            BoxTypes::Xml => "XML",
            BoxTypes::Uuid => "UUID",
            BoxTypes::UUIDInfo => "UUID Info",
            BoxTypes::UUIDList => "UUID List",
            BoxTypes::DataEntryURL => "Data Entry URL",
            BoxTypes::Association => "Association",
            BoxTypes::Label => "Label",
            BoxTypes::NumberList => "Number List",
            BoxTypes::DataReference => "Data Reference",
            BoxTypes::FragmentTable => "Fragment Table",
            BoxTypes::FragmentList => "Fragment List",
            BoxTypes::ReaderRequirements => "Reader Requirements",
            BoxTypes::CodestreamHeader => "Codestream Header",
            BoxTypes::CompositingLayerHeader => "Compositing Layer Header",
            BoxTypes::Free => "Free",
            BoxTypes::Unknown => "Unknown",
        }
    }

    /// Boxes defined by ISO/IEC 15444-2 that a plain JP2 file cannot carry.
    pub fn is_jpx(&self) -> bool {
        matches!(
            self,
            BoxTypes::Association
                | BoxTypes::Label
                | BoxTypes::NumberList
                | BoxTypes::DataReference
                | BoxTypes::FragmentTable
                | BoxTypes::FragmentList
                | BoxTypes::ReaderRequirements
                | BoxTypes::CodestreamHeader
                | BoxTypes::CompositingLayerHeader
        )
    }
}

pub trait JBox {
    fn identifier(&self) -> BoxType;

    /// Decode the payload. The reader is bounded to the payload of the box.
    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>>;

    /// Encode the payload, without the box header.
    fn encode<W: io::Write>(&self, writer: &mut BoxWriter<W>)
        -> Result<(), Box<dyn error::Error>>;
}

/// How the length of a box was (or will be) written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthForm {
    /// 4-byte LBox.
    Compact,

    /// LBox of 1 followed by an 8-byte XLBox.
    Extended,

    /// LBox of 0, the box runs to the end of the file.
    ToEnd,
}

struct BoxHeader {
    // Payload length, excluding the header.
    box_length: u64,

    // Box Type
    //
    // This field specifies the type of information found in the DBox field.
    //
    // The value of this field is encoded as a 4-byte big endian unsigned
    // integer. However, boxes are generally referred to by an ISO 646
    // character string translation of the integer value.
    box_type: BoxType,

    header_length: u64,
    form: LengthForm,
}

fn decode_box_header<R: io::Read + io::Seek>(
    reader: &mut BoxReader<R>,
) -> Result<BoxHeader, Box<dyn error::Error>> {
    let offset = reader.position();
    if reader.remaining() < 8 {
        return Err(JP2Error::BoxHeaderTruncated {
            offset,
            remaining: reader.remaining(),
        }
        .into());
    }

    let box_length = reader.read_u32()? as u64;
    let box_type: BoxType = reader.read_array()?;

    let (form, header_length, declared_length) = match box_length {
        // If the value of this field is 0, then the length of the box was not
        // known when the LBox field was written. In this case, this box
        // contains all bytes up to the end of the file.
        0 => (LengthForm::ToEnd, 8, None),

        // If the value of this field is 1, then the XLBox field shall exist
        // and the value of that field shall be the actual length of the box.
        1 => {
            if reader.remaining() < 8 {
                return Err(JP2Error::BoxHeaderTruncated {
                    offset,
                    remaining: reader.remaining() + 8,
                }
                .into());
            }
            (LengthForm::Extended, 16, Some(reader.read_u64()?))
        }
        length => (LengthForm::Compact, 8, Some(length)),
    };

    let box_length = match declared_length {
        None => {
            // If a box of length 0 is contained within another box, then the
            // length of that superbox shall also be 0.
            if !reader.is_open_ended() {
                return Err(JP2Error::ZeroLengthBoxNotLast { box_type, offset }.into());
            }
            reader.remaining()
        }
        Some(length) => {
            // The values 2-7 are reserved for ISO use, and an XLBox cannot be
            // shorter than its own header.
            if length < header_length {
                return Err(JP2Error::BoxLengthInvalid {
                    box_type,
                    offset,
                    length,
                }
                .into());
            }
            let payload_length = length - header_length;
            if payload_length > reader.remaining() {
                return Err(JP2Error::BoxLengthExceedsContainer {
                    box_type,
                    offset,
                    length,
                    remaining: reader.remaining() + header_length,
                }
                .into());
            }
            payload_length
        }
    };

    Ok(BoxHeader {
        box_length,
        box_type,
        header_length,
        form,
    })
}

/// Decode one box, and any boxes nested in it, from the current position.
pub fn decode_box<R: io::Read + io::Seek>(
    reader: &mut BoxReader<R>,
) -> Result<Jp2Box, Box<dyn error::Error>> {
    let offset = reader.position();
    let BoxHeader {
        box_length,
        box_type,
        header_length,
        form,
    } = decode_box_header(reader)?;
    let payload_offset = reader.position();

    info!(
        "{} box start at byte offset {}",
        format_box_type(&box_type),
        offset
    );
    let contents = {
        let mut payload = match form {
            LengthForm::ToEnd => reader.rest(),
            _ => reader.bounded(box_length)?,
        };
        decode_contents(box_type, &mut payload)?
    };
    reader.seek_to(payload_offset + box_length)?;
    info!(
        "{} box end at byte offset {}",
        format_box_type(&box_type),
        reader.position()
    );

    Ok(Jp2Box {
        offset,
        length: header_length + box_length,
        form,
        contents,
    })
}

/// Decode boxes until the region is exhausted.
pub fn decode_boxes<R: io::Read + io::Seek>(
    reader: &mut BoxReader<R>,
) -> Result<Vec<Jp2Box>, Box<dyn error::Error>> {
    let mut boxes = vec![];
    while reader.remaining() > 0 {
        boxes.push(decode_box(reader)?);
    }
    Ok(boxes)
}

fn decode_contents<R: io::Read + io::Seek>(
    box_type: BoxType,
    reader: &mut BoxReader<R>,
) -> Result<BoxContents, Box<dyn error::Error>> {
    let start = reader.position();
    let mut contents = BoxContents::new(box_type);
    if let BoxContents::Unknown(_) = contents {
        return decode_unknown(box_type, reader);
    }

    let mut result = contents.decode(reader);
    if result.is_ok() && !contents.is_superbox() && reader.remaining() > 0 {
        result = Err(JP2Error::BoxMalformed {
            box_type,
            offset: start,
            reason: "unexpected bytes after the last field",
        }
        .into());
    }

    match result {
        Ok(()) => Ok(contents),
        Err(error) if is_structural(error.as_ref()) => Err(error),
        Err(error) => {
            reader.warn(
                start,
                Some(box_type),
                format!("could not be decoded, keeping raw bytes: {}", error),
            );
            reader.seek_to(start)?;
            let data = reader.read_to_end()?;
            Ok(BoxContents::Unknown(UnknownBox::new(box_type, data)))
        }
    }
}

fn decode_unknown<R: io::Read + io::Seek>(
    box_type: BoxType,
    reader: &mut BoxReader<R>,
) -> Result<BoxContents, Box<dyn error::Error>> {
    let start = reader.position();
    let data = reader.read_to_end()?;

    if looks_like_boxes(&data) {
        reader.seek_to(start)?;
        let warning_count = reader.warning_count();
        match decode_boxes(reader) {
            Ok(children) => {
                reader.warn(
                    start,
                    Some(box_type),
                    "unrecognised box type holding other boxes, decoded as a superbox"
                        .to_string(),
                );
                return Ok(BoxContents::UnknownSuperBox(SuperBox::new(
                    box_type, children,
                )));
            }
            Err(error) => {
                debug!("Payload of {} is not a box sequence: {}", format_box_type(&box_type), error);
                reader.truncate_warnings(warning_count);
                reader.seek_to(reader.end())?;
            }
        }
    }

    reader.warn(
        start,
        Some(box_type),
        "unrecognised box type, keeping raw bytes".to_string(),
    );
    Ok(BoxContents::Unknown(UnknownBox::new(box_type, data)))
}

// Whether a payload parses exactly as a sequence of boxes with printable
// type codes.
fn looks_like_boxes(data: &[u8]) -> bool {
    let mut position = 0;
    while position < data.len() {
        let rest = &data[position..];
        if rest.len() < 8 {
            return false;
        }
        if !rest[4..8].iter().all(|byte| (0x20..=0x7E).contains(byte)) {
            return false;
        }

        let length = match u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) {
            0 => rest.len() as u64,
            1 => {
                if rest.len() < 16 {
                    return false;
                }
                let mut xl_length = [0u8; 8];
                xl_length.copy_from_slice(&rest[8..16]);
                u64::from_be_bytes(xl_length)
            }
            length => length as u64,
        };
        if length < 8 || length > rest.len() as u64 {
            return false;
        }
        position += length as usize;
    }

    !data.is_empty()
}

/// Encode boxes one after the other.
pub fn encode_boxes<W: io::Write>(
    writer: &mut BoxWriter<W>,
    boxes: &[Jp2Box],
) -> Result<(), Box<dyn error::Error>> {
    let open_end = writer.is_open_ended();
    for (index, jp2_box) in boxes.iter().enumerate() {
        jp2_box.encode(writer, open_end && index + 1 == boxes.len())?;
    }
    Ok(())
}

/// A box of any kind together with where it was found.
#[derive(Debug)]
pub struct Jp2Box {
    offset: u64,
    length: u64,
    form: LengthForm,
    contents: BoxContents,
}

impl Jp2Box {
    pub fn new(contents: BoxContents) -> Jp2Box {
        Jp2Box {
            offset: 0,
            length: 0,
            form: LengthForm::Compact,
            contents,
        }
    }

    pub fn identifier(&self) -> BoxType {
        self.contents.identifier()
    }

    /// Byte offset of the box header, for decoded boxes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the box including its header, for decoded boxes.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn length_form(&self) -> LengthForm {
        self.form
    }

    pub fn set_length_form(&mut self, form: LengthForm) {
        self.form = form;
    }

    pub fn contents(&self) -> &BoxContents {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut BoxContents {
        &mut self.contents
    }

    pub fn into_contents(self) -> BoxContents {
        self.contents
    }

    pub fn children(&self) -> &[Jp2Box] {
        self.contents.children()
    }

    /// Write the box. `last` is set when nothing follows it in the file, which
    /// is the only place a length 0 box is written.
    pub fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
        last: bool,
    ) -> Result<(), Box<dyn error::Error>> {
        let box_type = self.identifier();
        let to_end = self.form == LengthForm::ToEnd && last;

        let mut payload = BoxWriter::payload(vec![], to_end);
        self.contents.encode(&mut payload)?;
        let payload = payload.into_inner();

        info!(
            "{} box write at byte offset {}",
            format_box_type(&box_type),
            writer.position()
        );
        let compact_length = payload.len() as u64 + 8;
        if to_end {
            writer.write_u32(0)?;
            writer.write_bytes(&box_type)?;
        } else if self.form == LengthForm::Extended || compact_length > u32::MAX as u64 {
            writer.write_u32(1)?;
            writer.write_bytes(&box_type)?;
            writer.write_u64(compact_length + 8)?;
        } else {
            writer.write_u32(compact_length as u32)?;
            writer.write_bytes(&box_type)?;
        }
        writer.write_bytes(&payload)?;

        Ok(())
    }

    /// The box on its own, as it would be written at the end of a file.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn error::Error>> {
        let mut writer = BoxWriter::new(vec![]);
        self.encode(&mut writer, true)?;
        Ok(writer.into_inner())
    }
}

impl fmt::Display for Jp2Box {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let box_type = self.identifier();
        write!(
            f,
            "{} Box ({}) @ ({}, {})",
            BoxTypes::new(box_type).name(),
            format_box_type(&box_type),
            self.offset,
            self.length
        )?;
        let body = self.contents.to_string();
        for line in body.lines() {
            write!(f, "\n    {}", line)?;
        }
        Ok(())
    }
}

/// A box whose payload is a sequence of boxes.
#[derive(Debug)]
pub struct SuperBox {
    identifier: BoxType,
    children: Vec<Jp2Box>,
}

impl SuperBox {
    pub fn new(identifier: BoxType, children: Vec<Jp2Box>) -> SuperBox {
        SuperBox {
            identifier,
            children,
        }
    }

    pub fn children(&self) -> &Vec<Jp2Box> {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Jp2Box> {
        &mut self.children
    }

    pub fn push(&mut self, child: Jp2Box) {
        self.children.push(child);
    }
}

impl JBox for SuperBox {
    fn identifier(&self) -> BoxType {
        self.identifier
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.children = decode_boxes(reader)?;
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        encode_boxes(writer, &self.children)
    }
}

impl fmt::Display for SuperBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let children: Vec<String> = self.children.iter().map(|child| child.to_string()).collect();
        write!(f, "{}", children.join("\n"))
    }
}

/// Box of a type this crate does not decode, or one that failed to decode.
/// The payload is written back unchanged.
#[derive(Debug)]
pub struct UnknownBox {
    identifier: BoxType,
    data: Vec<u8>,
}

impl UnknownBox {
    pub fn new(identifier: BoxType, data: Vec<u8>) -> UnknownBox {
        UnknownBox { identifier, data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl JBox for UnknownBox {
    fn identifier(&self) -> BoxType {
        self.identifier
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

impl fmt::Display for UnknownBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Raw payload: {} bytes", self.data.len())
    }
}

/// Payload of a box, one variant per recognised box type.
#[derive(Debug)]
pub enum BoxContents {
    Signature(SignatureBox),
    FileType(FileTypeBox),
    Header(SuperBox),
    ImageHeader(ImageHeaderBox),
    BitsPerComponent(BitsPerComponentBox),
    ColourSpecification(ColourSpecificationBox),
    Palette(PaletteBox),
    ComponentMapping(ComponentMappingBox),
    ChannelDefinition(ChannelDefinitionBox),
    Resolution(SuperBox),
    CaptureResolution(ResolutionBox),
    DefaultDisplayResolution(ResolutionBox),
    ContiguousCodestream(ContiguousCodestreamBox),
    IntellectualProperty(IntellectualPropertyBox),
    Xml(XMLBox),
    Uuid(UUIDBox),
    UUIDInfo(SuperBox),
    UUIDList(UUIDListBox),
    DataEntryURL(DataEntryURLBox),
    Association(SuperBox),
    Label(LabelBox),
    NumberList(NumberListBox),
    DataReference(DataReferenceBox),
    FragmentTable(FragmentTableBox),
    FragmentList(FragmentListBox),
    ReaderRequirements(ReaderRequirementsBox),
    CodestreamHeader(SuperBox),
    CompositingLayerHeader(SuperBox),
    Free(FreeBox),
    UnknownSuperBox(SuperBox),
    Unknown(UnknownBox),
}

macro_rules! dispatch {
    ($contents:expr, $inner:ident => $body:expr) => {
        match $contents {
            BoxContents::Signature($inner) => $body,
            BoxContents::FileType($inner) => $body,
            BoxContents::Header($inner) => $body,
            BoxContents::ImageHeader($inner) => $body,
            BoxContents::BitsPerComponent($inner) => $body,
            BoxContents::ColourSpecification($inner) => $body,
            BoxContents::Palette($inner) => $body,
            BoxContents::ComponentMapping($inner) => $body,
            BoxContents::ChannelDefinition($inner) => $body,
            BoxContents::Resolution($inner) => $body,
            BoxContents::CaptureResolution($inner) => $body,
            BoxContents::DefaultDisplayResolution($inner) => $body,
            BoxContents::ContiguousCodestream($inner) => $body,
            BoxContents::IntellectualProperty($inner) => $body,
            BoxContents::Xml($inner) => $body,
            BoxContents::Uuid($inner) => $body,
            BoxContents::UUIDInfo($inner) => $body,
            BoxContents::UUIDList($inner) => $body,
            BoxContents::DataEntryURL($inner) => $body,
            BoxContents::Association($inner) => $body,
            BoxContents::Label($inner) => $body,
            BoxContents::NumberList($inner) => $body,
            BoxContents::DataReference($inner) => $body,
            BoxContents::FragmentTable($inner) => $body,
            BoxContents::FragmentList($inner) => $body,
            BoxContents::ReaderRequirements($inner) => $body,
            BoxContents::CodestreamHeader($inner) => $body,
            BoxContents::CompositingLayerHeader($inner) => $body,
            BoxContents::Free($inner) => $body,
            BoxContents::UnknownSuperBox($inner) => $body,
            BoxContents::Unknown($inner) => $body,
        }
    };
}

impl BoxContents {
    /// Empty contents for a box type, ready to be decoded into.
    pub fn new(box_type: BoxType) -> BoxContents {
        match BoxTypes::new(box_type) {
            BoxTypes::Signature => BoxContents::Signature(SignatureBox::default()),
            BoxTypes::FileType => BoxContents::FileType(FileTypeBox::default()),
            BoxTypes::Header => BoxContents::Header(SuperBox::new(box_type, vec![])),
            BoxTypes::ImageHeader => BoxContents::ImageHeader(ImageHeaderBox::default()),
            BoxTypes::BitsPerComponent => {
                BoxContents::BitsPerComponent(BitsPerComponentBox::default())
            }
            BoxTypes::ColourSpecification => {
                BoxContents::ColourSpecification(ColourSpecificationBox::default())
            }
            BoxTypes::Palette => BoxContents::Palette(PaletteBox::default()),
            BoxTypes::ComponentMapping => {
                BoxContents::ComponentMapping(ComponentMappingBox::default())
            }
            BoxTypes::ChannelDefinition => {
                BoxContents::ChannelDefinition(ChannelDefinitionBox::default())
            }
            BoxTypes::Resolution => BoxContents::Resolution(SuperBox::new(box_type, vec![])),
            BoxTypes::CaptureResolution => {
                BoxContents::CaptureResolution(ResolutionBox::empty(box_type))
            }
            BoxTypes::DefaultDisplayResolution => {
                BoxContents::DefaultDisplayResolution(ResolutionBox::empty(box_type))
            }
            BoxTypes::ContiguousCodestream => {
                BoxContents::ContiguousCodestream(ContiguousCodestreamBox::default())
            }
            BoxTypes::IntellectualProperty => {
                BoxContents::IntellectualProperty(IntellectualPropertyBox::default())
            }
            BoxTypes::Xml => BoxContents::Xml(XMLBox::default()),
            BoxTypes::Uuid => BoxContents::Uuid(UUIDBox::default()),
            BoxTypes::UUIDInfo => BoxContents::UUIDInfo(SuperBox::new(box_type, vec![])),
            BoxTypes::UUIDList => BoxContents::UUIDList(UUIDListBox::default()),
            BoxTypes::DataEntryURL => BoxContents::DataEntryURL(DataEntryURLBox::default()),
            BoxTypes::Association => BoxContents::Association(SuperBox::new(box_type, vec![])),
            BoxTypes::Label => BoxContents::Label(LabelBox::default()),
            BoxTypes::NumberList => BoxContents::NumberList(NumberListBox::default()),
            BoxTypes::DataReference => BoxContents::DataReference(DataReferenceBox::default()),
            BoxTypes::FragmentTable => BoxContents::FragmentTable(FragmentTableBox::default()),
            BoxTypes::FragmentList => BoxContents::FragmentList(FragmentListBox::default()),
            BoxTypes::ReaderRequirements => {
                BoxContents::ReaderRequirements(ReaderRequirementsBox::default())
            }
            BoxTypes::CodestreamHeader => {
                BoxContents::CodestreamHeader(SuperBox::new(box_type, vec![]))
            }
            BoxTypes::CompositingLayerHeader => {
                BoxContents::CompositingLayerHeader(SuperBox::new(box_type, vec![]))
            }
            BoxTypes::Free => BoxContents::Free(FreeBox::default()),
            BoxTypes::Unknown => BoxContents::Unknown(UnknownBox::new(box_type, vec![])),
        }
    }

    /// Whether the payload is exactly a sequence of boxes.
    pub fn is_superbox(&self) -> bool {
        matches!(
            self,
            BoxContents::Header(_)
                | BoxContents::Resolution(_)
                | BoxContents::UUIDInfo(_)
                | BoxContents::Association(_)
                | BoxContents::FragmentTable(_)
                | BoxContents::CodestreamHeader(_)
                | BoxContents::CompositingLayerHeader(_)
                | BoxContents::UnknownSuperBox(_)
        )
    }

    /// Nested boxes, including the entries of a data reference box.
    pub fn children(&self) -> &[Jp2Box] {
        match self {
            BoxContents::Header(superbox)
            | BoxContents::Resolution(superbox)
            | BoxContents::UUIDInfo(superbox)
            | BoxContents::Association(superbox)
            | BoxContents::CodestreamHeader(superbox)
            | BoxContents::CompositingLayerHeader(superbox)
            | BoxContents::UnknownSuperBox(superbox) => superbox.children(),
            BoxContents::FragmentTable(fragment_table) => fragment_table.children(),
            BoxContents::DataReference(data_reference) => data_reference.entries(),
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Jp2Box>> {
        match self {
            BoxContents::Header(superbox)
            | BoxContents::Resolution(superbox)
            | BoxContents::UUIDInfo(superbox)
            | BoxContents::Association(superbox)
            | BoxContents::CodestreamHeader(superbox)
            | BoxContents::CompositingLayerHeader(superbox)
            | BoxContents::UnknownSuperBox(superbox) => Some(superbox.children_mut()),
            BoxContents::FragmentTable(fragment_table) => Some(fragment_table.children_mut()),
            BoxContents::DataReference(data_reference) => Some(data_reference.entries_mut()),
            _ => None,
        }
    }
}

impl JBox for BoxContents {
    fn identifier(&self) -> BoxType {
        dispatch!(self, contents => contents.identifier())
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        dispatch!(self, contents => contents.decode(reader))
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        dispatch!(self, contents => contents.encode(writer))
    }
}

impl fmt::Display for BoxContents {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        dispatch!(self, contents => write!(f, "{}", contents))
    }
}

/// A decoded file: its top level boxes and everything noticed on the way.
#[derive(Debug)]
pub struct JP2File {
    length: u64,
    boxes: Vec<Jp2Box>,
    warnings: Vec<DecodeWarning>,
}

impl JP2File {
    pub fn new(boxes: Vec<Jp2Box>) -> JP2File {
        JP2File {
            length: 0,
            boxes,
            warnings: vec![],
        }
    }

    /// Number of bytes decoded.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn boxes(&self) -> &Vec<Jp2Box> {
        &self.boxes
    }

    pub fn boxes_mut(&mut self) -> &mut Vec<Jp2Box> {
        &mut self.boxes
    }

    pub fn into_boxes(self) -> Vec<Jp2Box> {
        self.boxes
    }

    pub fn warnings(&self) -> &Vec<DecodeWarning> {
        &self.warnings
    }

    pub fn signature_box(&self) -> Option<&SignatureBox> {
        self.boxes.iter().find_map(|jp2_box| match jp2_box.contents() {
            BoxContents::Signature(signature) => Some(signature),
            _ => None,
        })
    }

    pub fn file_type_box(&self) -> Option<&FileTypeBox> {
        self.boxes.iter().find_map(|jp2_box| match jp2_box.contents() {
            BoxContents::FileType(file_type) => Some(file_type),
            _ => None,
        })
    }

    pub fn file_type_box_mut(&mut self) -> Option<&mut FileTypeBox> {
        self.boxes
            .iter_mut()
            .find_map(|jp2_box| match jp2_box.contents_mut() {
                BoxContents::FileType(file_type) => Some(file_type),
                _ => None,
            })
    }

    pub fn header_box(&self) -> Option<&SuperBox> {
        self.boxes.iter().find_map(|jp2_box| match jp2_box.contents() {
            BoxContents::Header(header) => Some(header),
            _ => None,
        })
    }

    /// Image Header box of the JP2 Header box.
    pub fn image_header_box(&self) -> Option<&ImageHeaderBox> {
        self.header_box()?
            .children()
            .iter()
            .find_map(|jp2_box| match jp2_box.contents() {
                BoxContents::ImageHeader(image_header) => Some(image_header),
                _ => None,
            })
    }

    pub fn colour_specification_boxes(&self) -> Vec<&ColourSpecificationBox> {
        match self.header_box() {
            Some(header) => header
                .children()
                .iter()
                .filter_map(|jp2_box| match jp2_box.contents() {
                    BoxContents::ColourSpecification(colour) => Some(colour),
                    _ => None,
                })
                .collect(),
            None => vec![],
        }
    }

    pub fn contiguous_codestream_boxes(&self) -> Vec<&ContiguousCodestreamBox> {
        self.boxes
            .iter()
            .filter_map(|jp2_box| match jp2_box.contents() {
                BoxContents::ContiguousCodestream(codestream) => Some(codestream),
                _ => None,
            })
            .collect()
    }

    pub fn xml_boxes(&self) -> Vec<&XMLBox> {
        self.boxes
            .iter()
            .filter_map(|jp2_box| match jp2_box.contents() {
                BoxContents::Xml(xml) => Some(xml),
                _ => None,
            })
            .collect()
    }

    pub fn uuid_boxes(&self) -> Vec<&UUIDBox> {
        self.boxes
            .iter()
            .filter_map(|jp2_box| match jp2_box.contents() {
                BoxContents::Uuid(uuid) => Some(uuid),
                _ => None,
            })
            .collect()
    }

    /// Every box of the given type, at any depth, in file order.
    pub fn find(&self, box_type: BoxType) -> Vec<&Jp2Box> {
        fn walk<'a>(boxes: &'a [Jp2Box], box_type: BoxType, found: &mut Vec<&'a Jp2Box>) {
            for jp2_box in boxes {
                if jp2_box.identifier() == box_type {
                    found.push(jp2_box);
                }
                walk(jp2_box.children(), box_type, found);
            }
        }

        let mut found = vec![];
        walk(&self.boxes, box_type, &mut found);
        found
    }

    /// Validate and write all boxes.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> Result<(), Box<dyn error::Error>> {
        wrap(writer, &self.boxes)
    }

    fn warn(&mut self, offset: u64, box_type: Option<BoxType>, message: String) {
        let warning = DecodeWarning::new(offset, box_type, message);
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    // Reading rules of ISO/IEC 15444-1 Annex I beyond the box structure.
    fn check_jp2(&mut self) -> Result<(), Box<dyn error::Error>> {
        let first = self.boxes.first().ok_or(JP2Error::BoxMissing {
            box_type: BOX_TYPE_SIGNATURE,
        })?;

        // The Signature box shall be the first box
        match first.contents() {
            BoxContents::Signature(_) => {}
            BoxContents::Unknown(raw) if first.identifier() == BOX_TYPE_SIGNATURE => {
                let mut signature = [0u8; 4];
                for (target, byte) in signature.iter_mut().zip(raw.data()) {
                    *target = *byte;
                }
                return Err(JP2Error::InvalidSignature {
                    signature,
                    offset: first.offset(),
                }
                .into());
            }
            _ => {
                return Err(JP2Error::BoxUnexpected {
                    box_type: first.identifier(),
                    offset: first.offset(),
                }
                .into());
            }
        }

        // The File Type box shall immediately follow the Signature box
        match self.boxes.get(1) {
            Some(second) => {
                if !matches!(second.contents(), BoxContents::FileType(_)) {
                    return Err(JP2Error::BoxUnexpected {
                        box_type: second.identifier(),
                        offset: second.offset(),
                    }
                    .into());
                }
            }
            None => {
                return Err(JP2Error::BoxMissing {
                    box_type: BOX_TYPE_FILE_TYPE,
                }
                .into())
            }
        }

        let mut problems = vec![];
        let mut header_seen = false;
        for jp2_box in &self.boxes {
            match jp2_box.contents() {
                BoxContents::Header(header) => {
                    header_seen = true;
                    // The contents of the JP2 Header box shall start with an
                    // Image Header box.
                    match header.children().first() {
                        Some(child) if child.identifier() == BOX_TYPE_IMAGE_HEADER => {}
                        _ => problems.push((
                            jp2_box.offset(),
                            BOX_TYPE_HEADER,
                            "does not start with an Image Header box",
                        )),
                    }
                    // There shall be at least one Colour Specification box
                    // within the JP2 Header box.
                    if !header
                        .children()
                        .iter()
                        .any(|child| child.identifier() == BOX_TYPE_COLOUR_SPECIFICATION)
                    {
                        problems.push((
                            jp2_box.offset(),
                            BOX_TYPE_HEADER,
                            "has no Colour Specification box",
                        ));
                    }
                }
                BoxContents::ContiguousCodestream(_) if !header_seen => {
                    problems.push((
                        jp2_box.offset(),
                        BOX_TYPE_CONTIGUOUS_CODESTREAM,
                        "found before the JP2 Header box",
                    ));
                }
                _ => {}
            }
        }

        if !header_seen {
            problems.push((0, BOX_TYPE_HEADER, "no JP2 Header box in file"));
        }
        for (offset, box_type, problem) in problems {
            self.warn(offset, Some(box_type), problem.to_string());
        }

        Ok(())
    }
}

impl fmt::Display for JP2File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let boxes: Vec<String> = self.boxes.iter().map(|jp2_box| jp2_box.to_string()).collect();
        write!(f, "{}", boxes.join("\n"))
    }
}

/// Decode every box from the current position to the end of the stream.
///
/// No file level rules are applied; use `decode_jp2` for a JP2 or JPX file.
pub fn decode_tree<R: io::Read + io::Seek>(
    reader: &mut R,
) -> Result<JP2File, Box<dyn error::Error>> {
    let mut warnings = vec![];
    let (boxes, length) = {
        let mut box_reader = BoxReader::new(reader, &mut warnings)?;
        let start = box_reader.position();
        let boxes = decode_boxes(&mut box_reader)?;
        (boxes, box_reader.position() - start)
    };

    Ok(JP2File {
        length,
        boxes,
        warnings,
    })
}

/// Decode a JP2 or JPX file.
///
/// The Signature box must come first and the File Type box second. Other
/// departures from the file format are reported as warnings.
pub fn decode_jp2<R: io::Read + io::Seek>(
    reader: &mut R,
) -> Result<JP2File, Box<dyn error::Error>> {
    let mut file = decode_tree(reader)?;
    file.check_jp2()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn decode(bytes: Vec<u8>) -> Result<JP2File, Box<dyn error::Error>> {
        decode_tree(&mut Cursor::new(bytes))
    }

    #[test]
    fn registry() {
        assert_eq!(BoxTypes::new(*b"jp2h"), BoxTypes::Header);
        assert_eq!(BoxTypes::new(*b"flst"), BoxTypes::FragmentList);
        assert_eq!(BoxTypes::new(*b"zzzz"), BoxTypes::Unknown);
        assert!(BoxTypes::Association.is_jpx());
        assert!(!BoxTypes::Xml.is_jpx());
        assert_eq!(BoxTypes::FragmentTable.name(), "Fragment Table");
    }

    #[test]
    fn box_type_formatting() {
        assert_eq!(format_box_type(b"xml "), "'xml '");
        assert_eq!(format_box_type(&[0, b'a', b'b', 0xFF]), "'\\x00ab\\xff'");
    }

    #[test]
    fn reserved_length() {
        let result = decode(vec![0, 0, 0, 5, b'f', b'r', b'e', b'e', 0]);
        let error = result.unwrap_err();
        match error.downcast_ref::<JP2Error>() {
            Some(JP2Error::BoxLengthInvalid { length, .. }) => assert_eq!(*length, 5),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn length_exceeds_container() {
        let result = decode(vec![0, 0, 0, 20, b'f', b'r', b'e', b'e', 0, 0]);
        let error = result.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<JP2Error>(),
            Some(JP2Error::BoxLengthExceedsContainer { .. })
        ));
    }

    #[test]
    fn child_exceeds_superbox() {
        let mut bytes = vec![0, 0, 0, 20];
        bytes.extend_from_slice(b"asoc");
        bytes.extend_from_slice(&[0, 0, 0, 16]);
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&[0; 8]);

        let error = decode(bytes).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<JP2Error>(),
            Some(JP2Error::BoxLengthExceedsContainer { .. })
        ));
    }

    #[test]
    fn zero_length_inside_sized_superbox() {
        let mut bytes = vec![0, 0, 0, 20];
        bytes.extend_from_slice(b"asoc");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        let error = decode(bytes).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<JP2Error>(),
            Some(JP2Error::ZeroLengthBoxNotLast { .. })
        ));
    }

    #[test]
    fn zero_length_box_runs_to_end() {
        let mut bytes = vec![0, 0, 0, 12];
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[1, 2, 3, 4]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[5, 6, 7]);

        let file = decode(bytes.clone()).unwrap();
        assert_eq!(file.boxes().len(), 2);
        assert_eq!(file.boxes()[1].length(), 11);
        assert_eq!(file.boxes()[1].length_form(), LengthForm::ToEnd);

        let mut writer = BoxWriter::new(vec![]);
        encode_boxes(&mut writer, file.boxes()).unwrap();
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn extended_length_round_trip() {
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&20u64.to_be_bytes());
        bytes.extend_from_slice(&[9, 9, 9, 9]);

        let file = decode(bytes.clone()).unwrap();
        let free = &file.boxes()[0];
        assert_eq!(free.length(), 20);
        assert_eq!(free.length_form(), LengthForm::Extended);
        assert_eq!(free.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn unknown_box_preserved() {
        let mut bytes = vec![0, 0, 0, 13];
        bytes.extend_from_slice(b"zq\x01z");
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00]);

        let file = decode(bytes.clone()).unwrap();
        assert_eq!(file.warnings().len(), 1);
        match file.boxes()[0].contents() {
            BoxContents::Unknown(unknown) => {
                assert_eq!(unknown.data(), &[0xDE, 0xAD, 0xBE, 0xEF, 0x00])
            }
            other => panic!("unexpected contents {:?}", other),
        }
        assert_eq!(file.boxes()[0].to_bytes().unwrap(), bytes);
    }

    #[test]
    fn malformed_known_box_kept_raw() {
        // An Image Header box must be 14 bytes
        let mut bytes = vec![0, 0, 0, 14];
        bytes.extend_from_slice(b"ihdr");
        bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0]);
        bytes.extend_from_slice(&[0, 0, 0, 12]);
        bytes.extend_from_slice(b"free");
        bytes.extend_from_slice(&[0, 0, 0, 0]);

        let file = decode(bytes.clone()).unwrap();
        assert_eq!(file.boxes().len(), 2);
        assert!(matches!(
            file.boxes()[0].contents(),
            BoxContents::Unknown(_)
        ));
        assert_eq!(file.boxes()[0].identifier(), BOX_TYPE_IMAGE_HEADER);
        assert!(matches!(file.boxes()[1].contents(), BoxContents::Free(_)));
        assert_eq!(file.warnings().len(), 1);
        assert_eq!(file.warnings()[0].offset(), 8);

        let mut writer = BoxWriter::new(vec![]);
        encode_boxes(&mut writer, file.boxes()).unwrap();
        assert_eq!(writer.into_inner(), bytes);
    }

    #[test]
    fn failed_superbox_attempt_leaves_no_warnings() {
        // A zero length box is only allowed last in an open ended container
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"grp ");
        bytes.extend_from_slice(&[0, 0, 0, 8]);
        bytes.extend_from_slice(b"zzzz");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"free");

        let file = decode(bytes.clone()).unwrap();
        assert_eq!(file.boxes().len(), 1);
        match file.boxes()[0].contents() {
            BoxContents::Unknown(unknown) => assert_eq!(unknown.data(), &bytes[8..]),
            other => panic!("unexpected contents {:?}", other),
        }
        assert_eq!(file.warnings().len(), 1);
        assert_eq!(file.warnings()[0].box_type(), Some(*b"grp "));
        assert_eq!(file.boxes()[0].to_bytes().unwrap(), bytes);
    }

    #[test]
    fn looks_like_boxes_requires_exact_fit() {
        let mut payload = vec![0, 0, 0, 12];
        payload.extend_from_slice(b"free");
        payload.extend_from_slice(&[0, 0, 0, 0]);
        assert!(looks_like_boxes(&payload));

        payload.push(0);
        assert!(!looks_like_boxes(&payload));
        assert!(!looks_like_boxes(&[]));
        assert!(!looks_like_boxes(&[0, 0, 0, 8, 0, 1, 2, 3]));
    }
}
