use log::debug;
use std::convert::TryFrom;
use std::error;
use std::fmt;
use std::io;

use crate::{
    BoxReader, BoxType, BoxWriter, JBox, JP2Error, BOX_TYPE_BITS_PER_COMPONENT,
    BOX_TYPE_CHANNEL_DEFINITION, BOX_TYPE_COLOUR_SPECIFICATION, BOX_TYPE_COMPONENT_MAPPING,
    BOX_TYPE_FILE_TYPE, BOX_TYPE_IMAGE_HEADER, BOX_TYPE_PALETTE, BOX_TYPE_SIGNATURE,
};

pub const SIGNATURE_MAGIC: [u8; 4] = [13, 10, 135, 10];

pub const BRAND_JP2: [u8; 4] = *b"jp2 ";
pub const BRAND_JPX: [u8; 4] = *b"jpx ";
pub const BRAND_JPXB: [u8; 4] = *b"jpxb";

fn four_cc(value: &[u8; 4]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

/// JPEG 2000 Signature box.
///
/// This box uniquely identifies the file as being part of the JPEG 2000 family
/// of files.
///
/// 12-byte string which shall have the value: 0x0000 000C 6A50 2020 0D0A 870A.
///
/// The combination of the particular type and contents for this box enable an
/// application to detect a common set of file transmission errors.
///
/// - The CR-LF sequence in the contents catches bad file transfers that alter
///   newline sequences.
/// - The final linefeed checks for the inverse of the CR-LF translation problem.
/// - The third character of the box contents has its high-bit set to catch bad
///   file transfers that clear bit 7.
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.5.1.
#[derive(Debug)]
pub struct SignatureBox {
    signature: [u8; 4],
}

impl Default for SignatureBox {
    fn default() -> SignatureBox {
        SignatureBox {
            signature: SIGNATURE_MAGIC,
        }
    }
}

impl SignatureBox {
    pub fn signature(&self) -> [u8; 4] {
        self.signature
    }
}

impl JBox for SignatureBox {
    // The type of the JPEG 2000 Signature box shall be ‘jP\040\040’ (0x6A50 2020)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_SIGNATURE
    }

    // The contents of this box shall be the 4-byte character string ‘<CR><LF><0x87><LF>’ (0x0D0A 870A).
    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        let signature = reader.read_array()?;
        if signature != SIGNATURE_MAGIC {
            return Err(JP2Error::InvalidSignature { signature, offset }.into());
        }
        self.signature = signature;

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.signature)?;
        Ok(())
    }
}

impl fmt::Display for SignatureBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signature:  {:02x?}", self.signature)
    }
}

/// File Type box.
///
/// The File Type box completely defines all of the contents of this file, as
/// well as a separate list of readers with which this file is compatible, and
/// thus the file can be properly interpreted within the scope of that other
/// standard.
///
/// This box shall immediately follow the Signature box.
///
/// For more information, see ISO/IEC 15444-1 / ITU T-800 Appendix I.5.2.
#[derive(Debug, Default)]
pub struct FileTypeBox {
    brand: [u8; 4],
    min_version: u32,
    compatibility_list: Vec<[u8; 4]>,
}

impl FileTypeBox {
    pub fn new(brand: [u8; 4], min_version: u32, compatibility_list: Vec<[u8; 4]>) -> FileTypeBox {
        FileTypeBox {
            brand,
            min_version,
            compatibility_list,
        }
    }

    /// Brand.
    ///
    /// This field specifies the Recommendation | International Standard which
    /// completely defines this file.
    //
    // If the value of the Brand field is not ‘jp2\040’, then a value of
    // ‘jp2\040’ in the Compatibility list indicates that a JP2 reader can
    // interpret the file in some manner as intended by the creator of the
    // file.
    pub fn brand(&self) -> String {
        four_cc(&self.brand)
    }

    pub fn brand_code(&self) -> [u8; 4] {
        self.brand
    }

    pub fn set_brand(&mut self, brand: [u8; 4]) {
        self.brand = brand;
    }

    /// Minor version.
    ///
    /// The value of this field shall be zero. However, readers shall continue
    /// to parse and interpret this file even if the value of this field is not
    /// zero.
    pub fn min_version(&self) -> u32 {
        self.min_version
    }

    /// Compatibility list.
    ///
    /// Codes of the standards, or profiles of a standard, to which the file
    /// conforms.
    pub fn compatibility_list(&self) -> Vec<String> {
        self.compatibility_list.iter().map(four_cc).collect()
    }

    pub fn compatibility_codes(&self) -> &Vec<[u8; 4]> {
        &self.compatibility_list
    }

    pub fn set_compatibility_list(&mut self, compatibility_list: Vec<[u8; 4]>) {
        self.compatibility_list = compatibility_list;
    }

    pub fn is_compatible(&self, code: [u8; 4]) -> bool {
        self.compatibility_list.contains(&code)
    }

    /// Whether the brand names the JPX family.
    pub fn is_jpx_brand(&self) -> bool {
        self.brand == BRAND_JPX || self.brand == BRAND_JPXB
    }
}

impl JBox for FileTypeBox {
    // The type of the File Type Box shall be ‘ftyp’ (0x6674 7970).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_FILE_TYPE
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.brand = reader.read_array()?;
        self.min_version = reader.read_u32()?;

        // The number of CL fields is determined by the length of this box
        if reader.remaining() % 4 != 0 {
            return Err(JP2Error::BoxMalformed {
                box_type: BOX_TYPE_FILE_TYPE,
                offset,
                reason: "compatibility list is not a whole number of 4-byte codes",
            }
            .into());
        }
        self.compatibility_list = Vec::with_capacity((reader.remaining() / 4) as usize);
        while reader.remaining() > 0 {
            self.compatibility_list.push(reader.read_array()?);
        }

        debug!(
            "Brand {:?}, minor version {}, compatibility {:?}",
            self.brand(),
            self.min_version,
            self.compatibility_list()
        );

        // A JP2 file shall contain the value ‘jp2\040’ in one of the CL fields.
        if self.brand == BRAND_JP2 && !self.is_compatible(BRAND_JP2) {
            reader.warn(
                offset,
                Some(BOX_TYPE_FILE_TYPE),
                "compatibility list does not include 'jp2 '".to_string(),
            );
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.brand)?;
        writer.write_u32(self.min_version)?;
        for code in &self.compatibility_list {
            writer.write_bytes(code)?;
        }
        Ok(())
    }
}

impl fmt::Display for FileTypeBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Brand:  {}", self.brand())?;
        writeln!(f, "Compatibility:  {:?}", self.compatibility_list())?;
        write!(f, "Minor Version:  {}", self.min_version)
    }
}

// I.5.3.1
//
// Image Header box
//
// This box contains fixed length generic information about the image, such as
// the image size and number of components. The contents of the JP2 Header box
// shall start with an Image Header box.
#[derive(Debug, Default)]
pub struct ImageHeaderBox {
    height: u32,
    width: u32,
    components_num: u16,
    components_bits: u8,
    compression_type: u8,
    colourspace_unknown: u8,
    intellectual_property: u8,
}

const COMPONENTS_BITS_VARY: u8 = 255;
const COMPRESSION_TYPE_JPEG2000: u8 = 7;

impl ImageHeaderBox {
    pub fn new(height: u32, width: u32, components_num: u16, bit_depth: BitDepth) -> ImageHeaderBox {
        ImageHeaderBox {
            height,
            width,
            components_num,
            components_bits: bit_depth.encode(),
            compression_type: COMPRESSION_TYPE_JPEG2000,
            colourspace_unknown: 0,
            intellectual_property: 0,
        }
    }

    // Image area height, Ysiz – YOsiz from the SIZ marker in the codestream.
    pub fn height(&self) -> u32 {
        self.height
    }

    // Image area width, Xsiz – XOsiz from the SIZ marker in the codestream.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn components_num(&self) -> u16 {
        self.components_num
    }

    /// Bits per component, as stored.
    ///
    /// If the components vary in bit depth, then the value of this field shall
    /// be 255 and the JP2 Header box shall also contain a Bits Per Component
    /// box defining the bit depth of each component.
    pub fn components_bits(&self) -> u8 {
        self.components_bits
    }

    /// Bit depth shared by all components, `None` when it varies.
    pub fn bit_depth(&self) -> Option<BitDepth> {
        if self.components_bits == COMPONENTS_BITS_VARY {
            None
        } else {
            Some(BitDepth::new(self.components_bits))
        }
    }

    // Compression type.
    //
    // The value of this field shall be 7. Other values are reserved for ISO
    // use.
    pub fn compression_type(&self) -> u8 {
        self.compression_type
    }

    // Colourspace Unknown.
    //
    // 0 if the colourspace of the image is known and correctly specified in
    // the Colourspace Specification boxes within the file, 1 if it is not.
    pub fn colourspace_unknown(&self) -> u8 {
        self.colourspace_unknown
    }

    pub fn set_colourspace_unknown(&mut self, value: u8) {
        self.colourspace_unknown = value;
    }

    // Intellectual Property.
    //
    // 1 when the file contains an Intellectual Property box.
    pub fn intellectual_property(&self) -> u8 {
        self.intellectual_property
    }

    pub fn set_intellectual_property(&mut self, value: u8) {
        self.intellectual_property = value;
    }
}

impl JBox for ImageHeaderBox {
    // The type of the Image Header box shall be ‘ihdr’ (0x6968 6472)
    fn identifier(&self) -> BoxType {
        BOX_TYPE_IMAGE_HEADER
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.height = reader.read_u32()?;
        self.width = reader.read_u32()?;
        self.components_num = reader.read_u16()?;
        self.components_bits = reader.read_u8()?;
        self.compression_type = reader.read_u8()?;
        self.colourspace_unknown = reader.read_u8()?;
        self.intellectual_property = reader.read_u8()?;

        debug!(
            "Image {}x{} with {} components",
            self.width, self.height, self.components_num
        );

        if self.compression_type != COMPRESSION_TYPE_JPEG2000 {
            reader.warn(
                offset,
                Some(BOX_TYPE_IMAGE_HEADER),
                format!("unexpected compression type {}", self.compression_type),
            );
        }
        if self.components_bits != COMPONENTS_BITS_VARY && self.components_bits & 0x7F > 37 {
            reader.warn(
                offset,
                Some(BOX_TYPE_IMAGE_HEADER),
                format!("reserved bits per component value {}", self.components_bits),
            );
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_u32(self.height)?;
        writer.write_u32(self.width)?;
        writer.write_u16(self.components_num)?;
        writer.write_u8(self.components_bits)?;
        writer.write_u8(self.compression_type)?;
        writer.write_u8(self.colourspace_unknown)?;
        writer.write_u8(self.intellectual_property)?;
        Ok(())
    }
}

impl fmt::Display for ImageHeaderBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bit_depth = match self.bit_depth() {
            Some(bit_depth) => bit_depth.to_string(),
            None => "varies".to_owned(),
        };
        writeln!(f, "Size:  [{} {} {}]", self.height, self.width, self.components_num)?;
        writeln!(f, "Bitdepth:  {}", bit_depth)?;
        writeln!(f, "Compression:  {}", self.compression_type)?;
        writeln!(f, "Colorspace Unknown:  {}", self.colourspace_unknown == 1)?;
        write!(f, "Intellectual Property:  {}", self.intellectual_property == 1)
    }
}

/// Bit depth of a component.
///
/// The low 7-bits of the value indicate the bit depth minus one. The high-bit
/// indicates whether the component is signed or unsigned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BitDepth {
    Signed { value: u8 },
    Unsigned { value: u8 },
}

impl BitDepth {
    pub fn new(byte: u8) -> BitDepth {
        let value = (byte & 0x7F) + 1;
        if byte & 0x80 == 0x80 {
            BitDepth::Signed { value }
        } else {
            BitDepth::Unsigned { value }
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            Self::Signed { value } => *value,
            Self::Unsigned { value } => *value,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed { .. })
    }

    /// The 1-byte form stored in the file.
    pub fn encode(&self) -> u8 {
        match self {
            Self::Signed { value } => 0x80 | (value.saturating_sub(1) & 0x7F),
            Self::Unsigned { value } => value.saturating_sub(1) & 0x7F,
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Signed { value } => write!(f, "{}, signed", value),
            Self::Unsigned { value } => write!(f, "{}, unsigned", value),
        }
    }
}

// I.5.3.2
//
// The Bits Per Component box specifies the bit depth of each component.
//
// If the bit depth of all components in the codestream is the same (in both
// sign and precision), then this box shall not be found. The order of bit
// depth values in this box is the actual order in which those components are
// enumerated within the codestream.
#[derive(Debug, Default)]
pub struct BitsPerComponentBox {
    bits_per_component: Vec<u8>,
}

impl BitsPerComponentBox {
    pub fn new(bit_depths: &[BitDepth]) -> BitsPerComponentBox {
        BitsPerComponentBox {
            bits_per_component: bit_depths.iter().map(BitDepth::encode).collect(),
        }
    }

    pub fn bits_per_component(&self) -> Vec<BitDepth> {
        self.bits_per_component
            .iter()
            .map(|byte| BitDepth::new(*byte))
            .collect()
    }
}

impl JBox for BitsPerComponentBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_BITS_PER_COMPONENT
    }

    // The number of BPC fields is the length of the box.
    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.bits_per_component = reader.read_to_end()?;
        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_bytes(&self.bits_per_component)?;
        Ok(())
    }
}

impl fmt::Display for BitsPerComponentBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bit_depths: Vec<String> = self
            .bits_per_component()
            .iter()
            .map(|bit_depth| format!("({})", bit_depth))
            .collect();
        write!(f, "Bits per component:  {}", bit_depths.join(" "))
    }
}

const METHOD_ENUMERATED_COLOUR_SPACE: u8 = 1;
const METHOD_RESTRICTED_ICC_PROFILE: u8 = 2;
const METHOD_ANY_ICC_PROFILE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColourSpecificationMethods {
    EnumeratedColourSpace,
    RestrictedICCProfile,
    AnyICCProfile,
    Reserved { value: u8 },
}

impl ColourSpecificationMethods {
    pub fn new(value: u8) -> ColourSpecificationMethods {
        match value {
            METHOD_ENUMERATED_COLOUR_SPACE => ColourSpecificationMethods::EnumeratedColourSpace,
            METHOD_RESTRICTED_ICC_PROFILE => ColourSpecificationMethods::RestrictedICCProfile,
            METHOD_ANY_ICC_PROFILE => ColourSpecificationMethods::AnyICCProfile,
            value => ColourSpecificationMethods::Reserved { value },
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace => METHOD_ENUMERATED_COLOUR_SPACE,
            ColourSpecificationMethods::RestrictedICCProfile => METHOD_RESTRICTED_ICC_PROFILE,
            ColourSpecificationMethods::AnyICCProfile => METHOD_ANY_ICC_PROFILE,
            ColourSpecificationMethods::Reserved { value } => *value,
        }
    }

    fn is_icc(&self) -> bool {
        matches!(
            self,
            ColourSpecificationMethods::RestrictedICCProfile
                | ColourSpecificationMethods::AnyICCProfile
        )
    }
}

impl fmt::Display for ColourSpecificationMethods {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColourSpecificationMethods::EnumeratedColourSpace => write!(f, "enumerated colorspace"),
            ColourSpecificationMethods::RestrictedICCProfile => write!(f, "restricted ICC profile"),
            ColourSpecificationMethods::AnyICCProfile => write!(f, "any ICC profile"),
            ColourSpecificationMethods::Reserved { value } => write!(f, "{} (reserved)", value),
        }
    }
}

/// Enumerated colourspaces of ISO/IEC 15444-1 and 15444-2.
#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum EnumeratedColourSpaces {
    BiLevel,
    YCbCr1,
    YCbCr2,
    YCbCr3,
    PhotoYCC,
    CMY,
    CMYK,
    YCCK,
    CIELab,
    BiLevel2,
    sRGB,
    Greyscale,
    sYCC,
    CIEJab,
    esRGB,
    ROMMRGB,
    YPbPr112560,
    YPbPr125050,
    esYCC,
    Reserved { value: u32 },
}

impl EnumeratedColourSpaces {
    pub fn new(value: u32) -> EnumeratedColourSpaces {
        match value {
            0 => EnumeratedColourSpaces::BiLevel,
            1 => EnumeratedColourSpaces::YCbCr1,
            3 => EnumeratedColourSpaces::YCbCr2,
            4 => EnumeratedColourSpaces::YCbCr3,
            9 => EnumeratedColourSpaces::PhotoYCC,
            11 => EnumeratedColourSpaces::CMY,
            12 => EnumeratedColourSpaces::CMYK,
            13 => EnumeratedColourSpaces::YCCK,
            14 => EnumeratedColourSpaces::CIELab,
            15 => EnumeratedColourSpaces::BiLevel2,
            16 => EnumeratedColourSpaces::sRGB,
            17 => EnumeratedColourSpaces::Greyscale,
            18 => EnumeratedColourSpaces::sYCC,
            19 => EnumeratedColourSpaces::CIEJab,
            20 => EnumeratedColourSpaces::esRGB,
            21 => EnumeratedColourSpaces::ROMMRGB,
            22 => EnumeratedColourSpaces::YPbPr112560,
            23 => EnumeratedColourSpaces::YPbPr125050,
            24 => EnumeratedColourSpaces::esYCC,
            value => EnumeratedColourSpaces::Reserved { value },
        }
    }
}

impl fmt::Display for EnumeratedColourSpaces {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EnumeratedColourSpaces::BiLevel => "bi-level",
            EnumeratedColourSpaces::YCbCr1 => "YCbCr(1)",
            EnumeratedColourSpaces::YCbCr2 => "YCbCr(2)",
            EnumeratedColourSpaces::YCbCr3 => "YCbCr(3)",
            EnumeratedColourSpaces::PhotoYCC => "PhotoYCC",
            EnumeratedColourSpaces::CMY => "CMY",
            EnumeratedColourSpaces::CMYK => "CMYK",
            EnumeratedColourSpaces::YCCK => "YCCK",
            EnumeratedColourSpaces::CIELab => "CIELab",
            EnumeratedColourSpaces::BiLevel2 => "bi-level(2)",
            EnumeratedColourSpaces::sRGB => "sRGB",
            EnumeratedColourSpaces::Greyscale => "greyscale",
            EnumeratedColourSpaces::sYCC => "sYCC",
            EnumeratedColourSpaces::CIEJab => "CIEJab",
            EnumeratedColourSpaces::esRGB => "e-sRGB",
            EnumeratedColourSpaces::ROMMRGB => "ROMM-RGB",
            EnumeratedColourSpaces::YPbPr112560 => "YPbPr(1125/60)",
            EnumeratedColourSpaces::YPbPr125050 => "YPbPr(1250/50)",
            EnumeratedColourSpaces::esYCC => "e-sYCC",
            EnumeratedColourSpaces::Reserved { value } => {
                return write!(f, "{} (unrecognized)", value)
            }
        };
        write!(f, "{}", name)
    }
}

// I.5.3.3
//
// Colour Specification box
//
// Each Colour Specification box defines one method by which an application can
// interpret the colourspace of the decompressed image data.
//
// A JP2 file may contain multiple Colour Specification boxes, but must contain
// at least one, specifying different methods for achieving “equivalent” results.
// A conforming JP2 reader shall ignore all Colour Specification boxes after the
// first.
#[derive(Debug, Default)]
pub struct ColourSpecificationBox {
    method: u8,
    precedence: i8,
    colourspace_approximation: u8,
    enumerated_colour_space: Option<u32>,

    // Parameters following EnumCS, e.g. the CIELab range and offset fields.
    enumerated_parameters: Vec<u8>,

    icc_profile: Option<icc::ICCProfile>,

    // ICC profile bytes, or the body of a reserved method.
    data: Vec<u8>,
}

impl ColourSpecificationBox {
    pub fn enumerated(colour_space: u32) -> ColourSpecificationBox {
        ColourSpecificationBox {
            method: METHOD_ENUMERATED_COLOUR_SPACE,
            enumerated_colour_space: Some(colour_space),
            ..ColourSpecificationBox::default()
        }
    }

    /// Box carrying a restricted ICC profile. The profile is kept as given;
    /// it is decoded when read back.
    pub fn icc(profile: Vec<u8>) -> ColourSpecificationBox {
        ColourSpecificationBox {
            method: METHOD_RESTRICTED_ICC_PROFILE,
            data: profile,
            ..ColourSpecificationBox::default()
        }
    }

    // Specification method.
    pub fn method(&self) -> ColourSpecificationMethods {
        ColourSpecificationMethods::new(self.method)
    }

    // Precedence. Reserved for ISO use, conforming readers shall ignore it.
    pub fn precedence(&self) -> i8 {
        self.precedence
    }

    // Colourspace approximation. Readers shall ignore the value.
    pub fn colourspace_approximation(&self) -> u8 {
        self.colourspace_approximation
    }

    // Enumerated colourspace.
    //
    // If the value of the METH field is not 1, then the EnumCS field shall not
    // exist.
    pub fn enumerated_colour_space(&self) -> Option<EnumeratedColourSpaces> {
        self.enumerated_colour_space.map(EnumeratedColourSpaces::new)
    }

    pub fn enumerated_parameters(&self) -> &[u8] {
        &self.enumerated_parameters
    }

    /// Decoded ICC profile, when the box holds one that could be parsed.
    pub fn icc_profile(&self) -> Option<&icc::ICCProfile> {
        self.icc_profile.as_ref()
    }

    /// Raw ICC profile bytes, or everything after APPROX for reserved methods.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl JBox for ColourSpecificationBox {
    // The type of a Colour Specification box shall be ‘colr’ (0x636F 6C72).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COLOUR_SPECIFICATION
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.method = reader.read_u8()?;
        self.precedence = reader.read_u8()? as i8;
        self.colourspace_approximation = reader.read_u8()?;

        debug!("Method {:?}", self.method());
        debug!("Precedence {:?}", self.precedence);
        debug!(
            "ColourSpace Approximation {:?}",
            self.colourspace_approximation
        );

        match self.method() {
            // If the value of the METH field is 1, then the EnumCS shall exist
            // in this box immediately following the APPROX field.
            ColourSpecificationMethods::EnumeratedColourSpace => {
                let colour_space = reader.read_u32()?;
                self.enumerated_colour_space = Some(colour_space);
                self.enumerated_parameters = reader.read_to_end()?;
                debug!("Enumerated Colour Space {:?}", self.enumerated_colour_space());
            }

            // If the value of METH is 2, then the PROFILE field shall
            // immediately follow the APPROX field and the PROFILE field shall
            // be the last field in the box.
            ColourSpecificationMethods::RestrictedICCProfile
            | ColourSpecificationMethods::AnyICCProfile => {
                self.data = reader.read_to_end()?;
                match icc::decode_icc_bytes(&self.data) {
                    Ok(profile) => {
                        for warning in profile.warnings() {
                            reader.warn(
                                offset,
                                Some(BOX_TYPE_COLOUR_SPECIFICATION),
                                format!("ICC profile: {}", warning),
                            );
                        }
                        self.icc_profile = Some(profile);
                    }
                    Err(error) => {
                        reader.warn(
                            offset,
                            Some(BOX_TYPE_COLOUR_SPECIFICATION),
                            format!("ICC profile could not be decoded: {}", error),
                        );
                    }
                }
            }

            // If the value of METH is not 1 or 2, there may be fields in this
            // box following the APPROX field.
            ColourSpecificationMethods::Reserved { value } => {
                debug!("Reserved method {}", value);
                self.data = reader.read_to_end()?;
            }
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_u8(self.method)?;
        writer.write_u8(self.precedence as u8)?;
        writer.write_u8(self.colourspace_approximation)?;
        if let Some(colour_space) = self.enumerated_colour_space {
            writer.write_u32(colour_space)?;
            writer.write_bytes(&self.enumerated_parameters)?;
        }
        writer.write_bytes(&self.data)?;
        Ok(())
    }
}

impl fmt::Display for ColourSpecificationBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Method:  {}", self.method())?;
        writeln!(f, "Precedence:  {}", self.precedence)?;
        write!(f, "Approximation:  {}", self.colourspace_approximation)?;
        if let Some(colour_space) = self.enumerated_colour_space() {
            write!(f, "\nColorspace:  {}", colour_space)?;
        }
        if self.method().is_icc() {
            match &self.icc_profile {
                Some(profile) => {
                    write!(f, "\nICC Profile:")?;
                    for line in profile.header().to_string().lines() {
                        write!(f, "\n    {}", line)?;
                    }
                }
                None => write!(f, "\nICC Profile:  {} bytes, not decoded", self.data.len())?,
            }
        }
        Ok(())
    }
}

/// Palette box.
///
/// The palette specified in this box is applied to a single component to
/// convert it into multiple components.
///
/// If the JP2 Header box contains a Palette box, then it shall also contain a
/// Component Mapping box.
///
/// See Part 1 Section I.5.3.4 for more information.
#[derive(Debug, Default)]
pub struct PaletteBox {
    // Number of entries in the table, 1 to 1024.
    num_entries: u16,
    generated_components: Vec<GeneratedComponent>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedComponent {
    // B^i, bit depth of the generated component.
    bit_depth: u8,

    // C^ji for every entry j. Values narrower than a multiple of 8 bits are
    // stored in the low-order bits of the padded value.
    values: Vec<u64>,
}

impl GeneratedComponent {
    pub fn new(bit_depth: BitDepth, values: Vec<u64>) -> GeneratedComponent {
        GeneratedComponent {
            bit_depth: bit_depth.encode(),
            values,
        }
    }

    pub fn bit_depth(&self) -> BitDepth {
        BitDepth::new(self.bit_depth)
    }

    pub fn values(&self) -> &Vec<u64> {
        &self.values
    }

    // Bytes per stored value.
    fn width(&self) -> usize {
        (self.bit_depth().value() as usize + 7) / 8
    }
}

const MAX_PALETTE_ENTRIES: u16 = 1024;

impl PaletteBox {
    /// Palette from its columns; every column must have the same number of
    /// entries.
    pub fn new(generated_components: Vec<GeneratedComponent>) -> PaletteBox {
        let num_entries = generated_components
            .first()
            .map(|component| u16::try_from(component.values.len()).unwrap_or(u16::MAX))
            .unwrap_or(0);
        PaletteBox {
            num_entries,
            generated_components,
        }
    }

    pub fn num_entries(&self) -> u16 {
        self.num_entries
    }

    pub fn num_components(&self) -> u8 {
        u8::try_from(self.generated_components.len()).unwrap_or(u8::MAX)
    }

    pub fn generated_components(&self) -> &Vec<GeneratedComponent> {
        &self.generated_components
    }
}

impl JBox for PaletteBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_PALETTE
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        self.num_entries = reader.read_u16()?;
        let num_components = reader.read_u8()?;

        self.generated_components = Vec::with_capacity(num_components as usize);
        for _ in 0..num_components {
            self.generated_components.push(GeneratedComponent {
                bit_depth: reader.read_u8()?,
                values: Vec::with_capacity(self.num_entries as usize),
            });
        }

        // The values for entry j of every component are grouped together.
        for _ in 0..self.num_entries {
            for component in &mut self.generated_components {
                let value = reader.read_uint(component.width())?;
                component.values.push(value);
            }
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        if self.num_entries > MAX_PALETTE_ENTRIES {
            return Err(JP2Error::ValueTooLarge {
                field: "palette entry count",
                value: self.num_entries as u64,
            }
            .into());
        }
        if self.generated_components.len() > u8::MAX as usize {
            return Err(JP2Error::ValueTooLarge {
                field: "palette column count",
                value: self.generated_components.len() as u64,
            }
            .into());
        }
        writer.write_u16(self.num_entries)?;
        writer.write_u8(self.num_components())?;
        for component in &self.generated_components {
            writer.write_u8(component.bit_depth)?;
        }
        for entry in 0..self.num_entries as usize {
            for component in &self.generated_components {
                let value = component.values.get(entry).copied().unwrap_or(0);
                writer.write_uint(value, component.width())?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for PaletteBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Size:  ({} x {})",
            self.num_entries,
            self.generated_components.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentMapType {
    // Direct use.
    //
    // This channel is created directly from an actual component in the
    // codestream.
    Direct,

    // Palette mapping.
    //
    // This channel is created by applying the palette to an actual component
    // in the codestream. The column from the palette to use is specified in
    // the PCOL^i field for this channel.
    Palette,

    // Reserved for ISO use
    Reserved { value: u8 },
}

impl ComponentMapType {
    pub fn new(value: u8) -> ComponentMapType {
        match value {
            0 => ComponentMapType::Direct,
            1 => ComponentMapType::Palette,
            value => ComponentMapType::Reserved { value },
        }
    }

    pub fn value(&self) -> u8 {
        match self {
            ComponentMapType::Direct => 0,
            ComponentMapType::Palette => 1,
            ComponentMapType::Reserved { value } => *value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMap {
    // CMP^i, index of the codestream component mapped to this channel.
    component: u16,

    // MTYP^i
    mapping_type: ComponentMapType,

    // PCOL^i, palette column, 0 for direct use.
    palette: u8,
}

impl ComponentMap {
    pub fn new(component: u16, mapping_type: ComponentMapType, palette: u8) -> ComponentMap {
        ComponentMap {
            component,
            mapping_type,
            palette,
        }
    }

    pub fn component(&self) -> u16 {
        self.component
    }

    pub fn mapping_type(&self) -> ComponentMapType {
        self.mapping_type
    }

    pub fn palette(&self) -> u8 {
        self.palette
    }
}

/// Component Mapping Box.
///
/// The Component Mapping box defines how image channels are identified from the
/// actual components decoded from the codestream.
///
/// The channels are numbered in order starting with zero, and the number of
/// channels specified in the Component Mapping box is determined by the length
/// of the box.
///
/// See ISO/IEC 15444-1:2024 Section I.5.3.5.
#[derive(Debug, Default)]
pub struct ComponentMappingBox {
    mapping: Vec<ComponentMap>,
}

impl ComponentMappingBox {
    pub fn new(mapping: Vec<ComponentMap>) -> ComponentMappingBox {
        ComponentMappingBox { mapping }
    }

    pub fn component_map(&self) -> &Vec<ComponentMap> {
        &self.mapping
    }
}

impl JBox for ComponentMappingBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_COMPONENT_MAPPING
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        while reader.remaining() > 0 {
            let component = reader.read_u16()?;
            let mapping_type = ComponentMapType::new(reader.read_u8()?);
            let palette = reader.read_u8()?;
            self.mapping
                .push(ComponentMap::new(component, mapping_type, palette));
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        for map in &self.mapping {
            writer.write_u16(map.component)?;
            writer.write_u8(map.mapping_type.value())?;
            writer.write_u8(map.palette)?;
        }
        Ok(())
    }
}

impl fmt::Display for ComponentMappingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self
            .mapping
            .iter()
            .map(|map| match map.mapping_type {
                ComponentMapType::Palette => format!(
                    "Component {} ==> palette column {}",
                    map.component, map.palette
                ),
                ComponentMapType::Direct => format!("Component {} ==> {}", map.component, map.component),
                ComponentMapType::Reserved { value } => {
                    format!("Component {} ==> reserved mapping {}", map.component, value)
                }
            })
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

const CHANNEL_TYPE_UNSPECIFIED: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelTypes {
    ColourImageData,
    Opacity,
    PremultipliedOpacity,
    Reserved { value: u16 },
    Unspecified,
}

impl ChannelTypes {
    pub fn new(value: u16) -> ChannelTypes {
        match value {
            0 => ChannelTypes::ColourImageData,
            1 => ChannelTypes::Opacity,
            2 => ChannelTypes::PremultipliedOpacity,
            CHANNEL_TYPE_UNSPECIFIED => ChannelTypes::Unspecified,
            value => ChannelTypes::Reserved { value },
        }
    }

    pub fn value(&self) -> u16 {
        match self {
            ChannelTypes::ColourImageData => 0,
            ChannelTypes::Opacity => 1,
            ChannelTypes::PremultipliedOpacity => 2,
            ChannelTypes::Reserved { value } => *value,
            ChannelTypes::Unspecified => CHANNEL_TYPE_UNSPECIFIED,
        }
    }
}

impl fmt::Display for ChannelTypes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChannelTypes::ColourImageData => write!(f, "color"),
            ChannelTypes::Opacity => write!(f, "opacity"),
            ChannelTypes::PremultipliedOpacity => write!(f, "pre-multiplied opacity"),
            ChannelTypes::Reserved { value } => write!(f, "{} (reserved)", value),
            ChannelTypes::Unspecified => write!(f, "unspecified"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    // Channel index, as defined within the Component Mapping box (or the
    // actual component from the codestream if the file does not contain a
    // Component Mapping box).
    channel_index: u16,

    channel_type: ChannelTypes,

    // Channel association. The index of the colour for which this channel is
    // directly associated, 0 for the whole image, 2^16 – 1 for none.
    channel_association: u16,
}

impl Channel {
    pub fn new(channel_index: u16, channel_type: ChannelTypes, channel_association: u16) -> Channel {
        Channel {
            channel_index,
            channel_type,
            channel_association,
        }
    }

    pub fn channel_index(&self) -> u16 {
        self.channel_index
    }

    pub fn channel_type(&self) -> ChannelTypes {
        self.channel_type
    }

    pub fn channel_association(&self) -> u16 {
        self.channel_association
    }
}

// I.5.3.6
//
// Channel Definition Box
//
// The Channel Definition box specifies the meaning of the samples in each
// channel in the image. For each description three values are specified: the
// index of the channel, the type of that channel and the association of that
// channel with particular colours.
#[derive(Debug, Default)]
pub struct ChannelDefinitionBox {
    channels: Vec<Channel>,
}

impl ChannelDefinitionBox {
    pub fn new(channels: Vec<Channel>) -> ChannelDefinitionBox {
        ChannelDefinitionBox { channels }
    }

    pub fn channels(&self) -> &Vec<Channel> {
        &self.channels
    }
}

impl JBox for ChannelDefinitionBox {
    fn identifier(&self) -> BoxType {
        BOX_TYPE_CHANNEL_DEFINITION
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        // Number of channel descriptions, a 2-byte big endian unsigned integer.
        let size = reader.read_u16()?;

        self.channels = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let channel = Channel {
                channel_index: reader.read_u16()?,
                channel_type: ChannelTypes::new(reader.read_u16()?),
                channel_association: reader.read_u16()?,
            };

            debug!(
                "Found channel at index {:?} of type {:?} and association {:?}",
                channel.channel_index, channel.channel_type, channel.channel_association,
            );

            self.channels.push(channel);
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        if self.channels.len() > u16::MAX as usize {
            return Err(JP2Error::ValueTooLarge {
                field: "channel description count",
                value: self.channels.len() as u64,
            }
            .into());
        }
        writer.write_u16(self.channels.len() as u16)?;
        for channel in &self.channels {
            writer.write_u16(channel.channel_index)?;
            writer.write_u16(channel.channel_type.value())?;
            writer.write_u16(channel.channel_association)?;
        }
        Ok(())
    }
}

impl fmt::Display for ChannelDefinitionBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let lines: Vec<String> = self
            .channels
            .iter()
            .map(|channel| {
                format!(
                    "Channel {} ({}) ==> ({})",
                    channel.channel_index, channel.channel_type, channel.channel_association
                )
            })
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

// I.5.3.7.1 and I.5.3.7.2
//
// Capture Resolution and Default Display Resolution boxes share a layout.
// The values VR and HR are always in reference grid points per meter:
//
// VR = VRN / VRD * 10^VRE
// HR = HRN / HRD * 10^HRE
#[derive(Debug)]
pub struct ResolutionBox {
    identifier: BoxType,
    vertical_numerator: u16,
    vertical_denominator: u16,
    horizontal_numerator: u16,
    horizontal_denominator: u16,
    vertical_exponent: i8,
    horizontal_exponent: i8,
}

impl ResolutionBox {
    /// `vertical` and `horizontal` are (numerator, denominator, exponent).
    pub fn new(
        identifier: BoxType,
        vertical: (u16, u16, i8),
        horizontal: (u16, u16, i8),
    ) -> ResolutionBox {
        ResolutionBox {
            identifier,
            vertical_numerator: vertical.0,
            vertical_denominator: vertical.1,
            horizontal_numerator: horizontal.0,
            horizontal_denominator: horizontal.1,
            vertical_exponent: vertical.2,
            horizontal_exponent: horizontal.2,
        }
    }

    pub(crate) fn empty(identifier: BoxType) -> ResolutionBox {
        ResolutionBox::new(identifier, (0, 0, 0), (0, 0, 0))
    }

    pub fn vertical_numerator(&self) -> u16 {
        self.vertical_numerator
    }
    pub fn vertical_denominator(&self) -> u16 {
        self.vertical_denominator
    }
    pub fn horizontal_numerator(&self) -> u16 {
        self.horizontal_numerator
    }
    pub fn horizontal_denominator(&self) -> u16 {
        self.horizontal_denominator
    }
    pub fn vertical_exponent(&self) -> i8 {
        self.vertical_exponent
    }
    pub fn horizontal_exponent(&self) -> i8 {
        self.horizontal_exponent
    }

    pub fn vertical_resolution(&self) -> f64 {
        self.vertical_numerator as f64 / self.vertical_denominator as f64
            * 10_f64.powi(self.vertical_exponent as i32)
    }

    pub fn horizontal_resolution(&self) -> f64 {
        self.horizontal_numerator as f64 / self.horizontal_denominator as f64
            * 10_f64.powi(self.horizontal_exponent as i32)
    }
}

impl JBox for ResolutionBox {
    // ‘resc’ (0x7265 7363) or ‘resd’ (0x7265 7364).
    fn identifier(&self) -> BoxType {
        self.identifier
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();
        self.vertical_numerator = reader.read_u16()?;
        self.vertical_denominator = reader.read_u16()?;
        self.horizontal_numerator = reader.read_u16()?;
        self.horizontal_denominator = reader.read_u16()?;
        self.vertical_exponent = reader.read_u8()? as i8;
        self.horizontal_exponent = reader.read_u8()? as i8;

        if self.vertical_denominator == 0 || self.horizontal_denominator == 0 {
            reader.warn(
                offset,
                Some(self.identifier),
                "resolution denominator is zero".to_string(),
            );
        }

        Ok(())
    }

    fn encode<W: io::Write>(
        &self,
        writer: &mut BoxWriter<W>,
    ) -> Result<(), Box<dyn error::Error>> {
        writer.write_u16(self.vertical_numerator)?;
        writer.write_u16(self.vertical_denominator)?;
        writer.write_u16(self.horizontal_numerator)?;
        writer.write_u16(self.horizontal_denominator)?;
        writer.write_u8(self.vertical_exponent as u8)?;
        writer.write_u8(self.horizontal_exponent as u8)?;
        Ok(())
    }
}

impl fmt::Display for ResolutionBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "VRes:  {}", self.vertical_resolution())?;
        write!(f, "HRes:  {}", self.horizontal_resolution())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_depth() {
        assert_eq!(BitDepth::new(7), BitDepth::Unsigned { value: 8 });
        assert_eq!(BitDepth::new(0x8F), BitDepth::Signed { value: 16 });
        assert_eq!(BitDepth::Signed { value: 16 }.encode(), 0x8F);
        assert!(BitDepth::new(0x80).is_signed());
    }

    #[test]
    fn channel_types() {
        assert_eq!(ChannelTypes::new(2), ChannelTypes::PremultipliedOpacity);
        assert_eq!(ChannelTypes::new(65535), ChannelTypes::Unspecified);
        assert_eq!(ChannelTypes::new(7), ChannelTypes::Reserved { value: 7 });
        assert_eq!(ChannelTypes::Unspecified.value(), 65535);
    }

    #[test]
    fn component_map_types() {
        assert_eq!(ComponentMapType::new(0), ComponentMapType::Direct);
        assert_eq!(ComponentMapType::new(1), ComponentMapType::Palette);
        assert_eq!(
            ComponentMapType::new(4),
            ComponentMapType::Reserved { value: 4 }
        );
    }

    #[test]
    fn enumerated_colour_spaces() {
        assert_eq!(EnumeratedColourSpaces::new(16), EnumeratedColourSpaces::sRGB);
        assert_eq!(EnumeratedColourSpaces::new(18).to_string(), "sYCC");
        assert_eq!(
            EnumeratedColourSpaces::new(99).to_string(),
            "99 (unrecognized)"
        );
    }

    #[test]
    fn resolution() {
        let resolution = ResolutionBox::new(
            crate::BOX_TYPE_CAPTURE_RESOLUTION,
            (1, 2, 3),
            (30, 1, -1),
        );
        assert!((resolution.vertical_resolution() - 500.0).abs() < 1e-9);
        assert!((resolution.horizontal_resolution() - 3.0).abs() < 1e-9);
    }
}
