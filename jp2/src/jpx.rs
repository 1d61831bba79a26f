use log::debug;
use std::error;
use std::fmt;
use std::io;

use crate::metadata::{format_uuid, trailing_nuls};
use crate::{
    decode_box, decode_boxes, encode_boxes, BoxContents, BoxReader, BoxType, BoxWriter,
    DataEntryURLBox, JBox, JP2Error, Jp2Box, BOX_TYPE_DATA_ENTRY_URL, BOX_TYPE_DATA_REFERENCE,
    BOX_TYPE_FRAGMENT_LIST, BOX_TYPE_FRAGMENT_TABLE, BOX_TYPE_LABEL, BOX_TYPE_NUMBER_LIST,
    BOX_TYPE_READER_REQUIREMENTS,
};

/// Label box.
///
/// A human readable text label, usually inside an Association box.
///
/// See ISO/IEC 15444-2 Section M.11.13.
#[derive(Debug, Default)]
pub struct LabelBox {
    label: String,
    padding: usize,
}

impl LabelBox {
    pub fn new(label: &str) -> LabelBox {
        LabelBox {
            label: label.to_owned(),
            padding: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl JBox for LabelBox {
    // 'lbl\040' (0x6C62 6C20)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_LABEL
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        let mut data = reader.read_to_end()?;
        self.padding = trailing_nuls(&data);
        data.truncate(data.len() - self.padding);
        self.label = String::from_utf8(data).map_err(|_| JP2Error::BoxMalformed {
            box_type: BOX_TYPE_LABEL,
            offset,
            reason: "label is not valid UTF-8",
        })?;
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(self.label.as_bytes())?;
        writer.write_bytes(&vec![0; self.padding])?;
        Ok(())
    }
}

impl fmt::Display for LabelBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Label:  {}", self.label)
    }
}

const ASSOCIATION_CODESTREAM: u32 = 0x0100_0000;
const ASSOCIATION_COMPOSITING_LAYER: u32 = 0x0200_0000;
const ASSOCIATION_INDEX_MASK: u32 = 0x00FF_FFFF;

/// Entity named by a Number List entry. The high byte selects the kind of
/// entity and the low 24 bits its index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Association {
    RenderedResult,
    Codestream { index: u32 },
    CompositingLayer { index: u32 },
    Reserved { value: u32 },
}

impl Association {
    pub fn new(value: u32) -> Association {
        match value & !ASSOCIATION_INDEX_MASK {
            0 if value == 0 => Association::RenderedResult,
            ASSOCIATION_CODESTREAM => Association::Codestream {
                index: value & ASSOCIATION_INDEX_MASK,
            },
            ASSOCIATION_COMPOSITING_LAYER => Association::CompositingLayer {
                index: value & ASSOCIATION_INDEX_MASK,
            },
            _ => Association::Reserved { value },
        }
    }

    pub fn value(&self) -> u32 {
        match self {
            Association::RenderedResult => 0,
            Association::Codestream { index } => {
                ASSOCIATION_CODESTREAM | (index & ASSOCIATION_INDEX_MASK)
            }
            Association::CompositingLayer { index } => {
                ASSOCIATION_COMPOSITING_LAYER | (index & ASSOCIATION_INDEX_MASK)
            }
            Association::Reserved { value } => *value,
        }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Association::RenderedResult => write!(f, "the rendered result"),
            Association::Codestream { index } => write!(f, "codestream {}", index),
            Association::CompositingLayer { index } => write!(f, "compositing layer {}", index),
            Association::Reserved { value } => write!(f, "{:#010x} (reserved)", value),
        }
    }
}

/// Number List box.
///
/// Names the entities that the other boxes of the enclosing Association box
/// are associated with. The number of entries is determined by the length of
/// the box.
#[derive(Debug, Default)]
pub struct NumberListBox {
    associations: Vec<u32>,
}

impl NumberListBox {
    pub fn new(associations: &[Association]) -> NumberListBox {
        NumberListBox {
            associations: associations.iter().map(Association::value).collect(),
        }
    }

    pub fn associations(&self) -> Vec<Association> {
        self.associations
            .iter()
            .map(|value| Association::new(*value))
            .collect()
    }

    pub fn values(&self) -> &Vec<u32> {
        &self.associations
    }
}

impl JBox for NumberListBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_NUMBER_LIST
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        while reader.remaining() > 0 {
            self.associations.push(reader.read_u32()?);
        }
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        for value in &self.associations {
            writer.write_u32(*value)?;
        }
        Ok(())
    }
}

impl fmt::Display for NumberListBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self
            .associations()
            .iter()
            .enumerate()
            .map(|(index, association)| format!("Association[{}]:  {}", index, association))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

/// Data Reference box.
///
/// A count followed by Data Entry URL boxes. Fragment List entries refer to
/// them by their 1-based position; 0 means the file itself.
#[derive(Debug, Default)]
pub struct DataReferenceBox {
    entries: Vec<Jp2Box>,
}

impl DataReferenceBox {
    pub fn new(entries: Vec<Jp2Box>) -> DataReferenceBox {
        DataReferenceBox { entries }
    }

    pub fn from_locations(locations: &[&str]) -> DataReferenceBox {
        DataReferenceBox::new(
            locations
                .iter()
                .map(|location| {
                    Jp2Box::new(BoxContents::DataEntryURL(DataEntryURLBox::new(location)))
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[Jp2Box] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Vec<Jp2Box> {
        &mut self.entries
    }

    /// Locations of the Data Entry URL entries, in order.
    pub fn locations(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.contents() {
                BoxContents::DataEntryURL(url) => Some(url.location()),
                _ => None,
            })
            .collect()
    }
}

impl JBox for DataReferenceBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_DATA_REFERENCE
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let count = reader.read_u16()?;
        debug!("Data reference with {} entries", count);

        self.entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let offset = reader.position();
            if reader.remaining() < 8 {
                return Err(JP2Error::BoxMalformed {
                    box_type: BOX_TYPE_DATA_REFERENCE,
                    offset,
                    reason: "fewer entries than the declared count",
                }
                .into());
            }
            let entry = decode_box(reader)?;
            if entry.identifier() != BOX_TYPE_DATA_ENTRY_URL {
                reader.warn(
                    offset,
                    Some(BOX_TYPE_DATA_REFERENCE),
                    "entry is not a Data Entry URL box".to_string(),
                );
            }
            self.entries.push(entry);
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        if self.entries.len() > u16::MAX as usize {
            return Err(JP2Error::ValueTooLarge {
                field: "data reference count",
                value: self.entries.len() as u64,
            }
            .into());
        }
        writer.write_u16(self.entries.len() as u16)?;
        for entry in &self.entries {
            entry.encode(writer, false)?;
        }
        Ok(())
    }
}

impl fmt::Display for DataReferenceBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let entries: Vec<String> = self.entries.iter().map(|entry| entry.to_string()).collect();
        write!(f, "{}", entries.join("\n"))
    }
}

/// Fragment Table box.
///
/// A superbox holding exactly one Fragment List box, which together locate a
/// codestream that is split into pieces.
#[derive(Debug, Default)]
pub struct FragmentTableBox {
    children: Vec<Jp2Box>,
}

impl FragmentTableBox {
    pub fn new(fragment_list: FragmentListBox) -> FragmentTableBox {
        FragmentTableBox {
            children: vec![Jp2Box::new(BoxContents::FragmentList(fragment_list))],
        }
    }

    /// Fragment table with arbitrary children. Writing it fails unless there
    /// is exactly one child and that child is a Fragment List box.
    pub fn with_children(children: Vec<Jp2Box>) -> FragmentTableBox {
        FragmentTableBox { children }
    }

    pub fn children(&self) -> &[Jp2Box] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Jp2Box> {
        &mut self.children
    }

    pub fn fragment_list(&self) -> Option<&FragmentListBox> {
        self.children
            .iter()
            .find_map(|child| match child.contents() {
                BoxContents::FragmentList(fragment_list) => Some(fragment_list),
                _ => None,
            })
    }

    fn check_children(&self) -> Result<(), JP2Error> {
        if self.children.len() != 1 {
            return Err(JP2Error::FragmentTableChildCount {
                count: self.children.len(),
            });
        }
        for child in &self.children {
            if !matches!(child.contents(), BoxContents::FragmentList(_)) {
                return Err(JP2Error::FragmentTableChildNotFragmentList {
                    box_type: child.identifier(),
                });
            }
        }
        Ok(())
    }
}

impl JBox for FragmentTableBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FRAGMENT_TABLE
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.children = decode_boxes(reader)?;
        if let Err(error) = self.check_children() {
            reader.warn(offset, Some(BOX_TYPE_FRAGMENT_TABLE), error.to_string());
        }
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.check_children()?;
        encode_boxes(writer, &self.children)
    }
}

impl fmt::Display for FragmentTableBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let children: Vec<String> = self.children.iter().map(|child| child.to_string()).collect();
        write!(f, "{}", children.join("\n"))
    }
}

/// Fragment List box.
///
/// Each fragment is an (offset, length, data reference) triple. The data
/// reference is 0 for the file itself, otherwise the 1-based index of an entry
/// of the Data Reference box.
#[derive(Debug, Default)]
pub struct FragmentListBox {
    offsets: Vec<u64>,
    lengths: Vec<u32>,
    data_references: Vec<u16>,
}

impl FragmentListBox {
    pub fn new(offsets: Vec<u64>, lengths: Vec<u32>, data_references: Vec<u16>) -> FragmentListBox {
        FragmentListBox {
            offsets,
            lengths,
            data_references,
        }
    }

    pub fn offsets(&self) -> &Vec<u64> {
        &self.offsets
    }

    pub fn lengths(&self) -> &Vec<u32> {
        &self.lengths
    }

    pub fn data_references(&self) -> &Vec<u16> {
        &self.data_references
    }

    /// Check the fragments can be written.
    pub fn validate(&self) -> Result<(), JP2Error> {
        if self.offsets.len() != self.lengths.len()
            || self.offsets.len() != self.data_references.len()
        {
            return Err(JP2Error::FragmentListLengthsMismatch {
                offsets: self.offsets.len(),
                lengths: self.lengths.len(),
                data_references: self.data_references.len(),
            });
        }
        if self.offsets.is_empty() {
            return Err(JP2Error::FragmentListEmpty);
        }
        if self.offsets.len() > u16::MAX as usize {
            return Err(JP2Error::ValueTooLarge {
                field: "fragment count",
                value: self.offsets.len() as u64,
            });
        }
        if let Some(index) = self.offsets.iter().position(|offset| *offset == 0) {
            return Err(JP2Error::FragmentOffsetNotPositive { index });
        }
        if let Some(index) = self.lengths.iter().position(|length| *length == 0) {
            return Err(JP2Error::FragmentLengthNotPositive { index });
        }
        Ok(())
    }
}

impl JBox for FragmentListBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FRAGMENT_LIST
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        let count = reader.read_u16()? as usize;

        self.offsets = Vec::with_capacity(count);
        self.lengths = Vec::with_capacity(count);
        self.data_references = Vec::with_capacity(count);
        for _ in 0..count {
            self.offsets.push(reader.read_u64()?);
            self.lengths.push(reader.read_u32()?);
            self.data_references.push(reader.read_u16()?);
        }

        if let Err(error) = self.validate() {
            reader.warn(offset, Some(BOX_TYPE_FRAGMENT_LIST), error.to_string());
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.validate()?;
        writer.write_u16(self.offsets.len() as u16)?;
        for index in 0..self.offsets.len() {
            writer.write_u64(self.offsets[index])?;
            writer.write_u32(self.lengths[index])?;
            writer.write_u16(self.data_references[index])?;
        }
        Ok(())
    }
}

impl fmt::Display for FragmentListBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self
            .offsets
            .iter()
            .zip(&self.lengths)
            .zip(&self.data_references)
            .enumerate()
            .map(|(index, ((offset, length), data_reference))| {
                format!(
                    "Fragment[{}]:  offset {}, length {}, data reference {}",
                    index, offset, length, data_reference
                )
            })
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StandardFeature {
    flag: u16,
    mask: u64,
}

impl StandardFeature {
    pub fn new(flag: u16, mask: u64) -> StandardFeature {
        StandardFeature { flag, mask }
    }

    pub fn flag(&self) -> u16 {
        self.flag
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorFeature {
    uuid: [u8; 16],
    mask: u64,
}

impl VendorFeature {
    pub fn new(uuid: [u8; 16], mask: u64) -> VendorFeature {
        VendorFeature { uuid, mask }
    }

    pub fn uuid(&self) -> &[u8; 16] {
        &self.uuid
    }

    pub fn mask(&self) -> u64 {
        self.mask
    }
}

/// Reader Requirements box.
///
/// Lists the features a reader needs to fully use, or merely display, the
/// file. Every mask is ML bytes wide; ML is usually 1, 2, 4 or 8 but other
/// widths are found in real files.
///
/// See ISO/IEC 15444-2 Section M.11.1.
#[derive(Debug)]
pub struct ReaderRequirementsBox {
    mask_length: u8,
    fully_understand_aspects_mask: u64,
    decode_completely_mask: u64,
    standard_features: Vec<StandardFeature>,
    vendor_features: Vec<VendorFeature>,
}

impl Default for ReaderRequirementsBox {
    fn default() -> ReaderRequirementsBox {
        ReaderRequirementsBox {
            mask_length: 1,
            fully_understand_aspects_mask: 0,
            decode_completely_mask: 0,
            standard_features: vec![],
            vendor_features: vec![],
        }
    }
}

const MASK_LENGTH_MAX: u8 = 8;

impl ReaderRequirementsBox {
    pub fn new(
        mask_length: u8,
        fully_understand_aspects_mask: u64,
        decode_completely_mask: u64,
        standard_features: Vec<StandardFeature>,
        vendor_features: Vec<VendorFeature>,
    ) -> ReaderRequirementsBox {
        ReaderRequirementsBox {
            mask_length,
            fully_understand_aspects_mask,
            decode_completely_mask,
            standard_features,
            vendor_features,
        }
    }

    pub fn mask_length(&self) -> u8 {
        self.mask_length
    }

    pub fn fully_understand_aspects_mask(&self) -> u64 {
        self.fully_understand_aspects_mask
    }

    pub fn decode_completely_mask(&self) -> u64 {
        self.decode_completely_mask
    }

    pub fn standard_features(&self) -> &Vec<StandardFeature> {
        &self.standard_features
    }

    /// Standard feature flags in file order.
    pub fn standard_flags(&self) -> Vec<u16> {
        self.standard_features
            .iter()
            .map(|feature| feature.flag)
            .collect()
    }

    pub fn vendor_features(&self) -> &Vec<VendorFeature> {
        &self.vendor_features
    }

    fn check_mask_length(&self) -> Result<(), JP2Error> {
        if self.mask_length == 0 || self.mask_length > MASK_LENGTH_MAX {
            return Err(JP2Error::ReaderRequirementsMaskLength {
                mask_length: self.mask_length,
            });
        }
        Ok(())
    }
}

impl JBox for ReaderRequirementsBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_READER_REQUIREMENTS
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.mask_length = reader.read_u8()?;
        self.check_mask_length()?;
        let width = self.mask_length as usize;

        self.fully_understand_aspects_mask = reader.read_uint(width)?;
        self.decode_completely_mask = reader.read_uint(width)?;

        let count = reader.read_u16()?;
        self.standard_features = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let flag = reader.read_u16()?;
            let mask = reader.read_uint(width)?;
            self.standard_features.push(StandardFeature { flag, mask });
        }

        let count = reader.read_u16()?;
        self.vendor_features = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let uuid = reader.read_array()?;
            let mask = reader.read_uint(width)?;
            self.vendor_features.push(VendorFeature { uuid, mask });
        }

        debug!(
            "Reader requirements mask length {}, standard flags {:?}",
            self.mask_length,
            self.standard_flags()
        );

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.check_mask_length()?;
        let width = self.mask_length as usize;
        for &(field, count) in &[
            ("standard feature count", self.standard_features.len()),
            ("vendor feature count", self.vendor_features.len()),
        ] {
            if count > u16::MAX as usize {
                return Err(JP2Error::ValueTooLarge {
                    field,
                    value: count as u64,
                }
                .into());
            }
        }

        writer.write_u8(self.mask_length)?;
        writer.write_uint(self.fully_understand_aspects_mask, width)?;
        writer.write_uint(self.decode_completely_mask, width)?;
        writer.write_u16(self.standard_features.len() as u16)?;
        for feature in &self.standard_features {
            writer.write_u16(feature.flag)?;
            writer.write_uint(feature.mask, width)?;
        }
        writer.write_u16(self.vendor_features.len() as u16)?;
        for feature in &self.vendor_features {
            writer.write_bytes(&feature.uuid)?;
            writer.write_uint(feature.mask, width)?;
        }
        Ok(())
    }
}

impl fmt::Display for ReaderRequirementsBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Fully Understands Aspect Mask:  {:#x}",
            self.fully_understand_aspects_mask
        )?;
        write!(
            f,
            "Display Completely Mask:  {:#x}",
            self.decode_completely_mask
        )?;
        write!(f, "\nStandard Features and Masks:")?;
        for feature in &self.standard_features {
            write!(f, "\n    Feature {:03}:  {:#x}", feature.flag, feature.mask)?;
        }
        write!(f, "\nVendor Features:")?;
        for feature in &self.vendor_features {
            write!(
                f,
                "\n    UUID {}:  {:#x}",
                format_uuid(&feature.uuid),
                feature.mask
            )?;
        }
        Ok(())
    }
}
