//! ICC profile header and tag table parsing.
//!
//! Only the parts of ISO 15076-1 / ICC.1 needed to describe an embedded
//! profile are decoded: the fixed 128-byte header and the tag table. Tag
//! payloads are sliced out of the profile but are not interpreted.

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use std::error;
use std::fmt;
use std::io;
use std::str;

const HEADER_LENGTH: usize = 128;
const TAG_ENTRY_LENGTH: usize = 12;

// 'acsp' (0x6163 7370)
const PROFILE_FILE_SIGNATURE: [u8; 4] = [97, 99, 115, 112];

#[derive(Debug)]
pub enum ICCError {
    ProfileTooShort { length: usize },
}

impl error::Error for ICCError {}
impl fmt::Display for ICCError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ProfileTooShort { length } => {
                write!(
                    f,
                    "ICC profile of {} bytes is shorter than the {} byte header",
                    length, HEADER_LENGTH
                )
            }
        }
    }
}

fn fourcc(value: &[u8; 4]) -> String {
    value
        .iter()
        .map(|byte| *byte as char)
        .collect::<String>()
        .trim_end_matches(|c| c == ' ' || c == '\0')
        .to_owned()
}

/// Profile version, encoded as a major byte and a minor/bug-fix nibble pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub bugfix: u8,
}

impl Version {
    fn new(value: [u8; 4]) -> Version {
        Version {
            major: value[0],
            minor: value[1] >> 4,
            bugfix: value[1] & 0b0000_1111,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.bugfix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceClass {
    // 'scnr'
    Input,
    // 'mntr'
    Display,
    // 'prtr'
    Output,
    // 'link'
    DeviceLink,
    // 'spac'
    ColourSpaceConversion,
    // 'abst'
    Abstract,
    // 'nmcl'
    NamedColour,
    Unrecognized { value: [u8; 4] },
}

impl DeviceClass {
    fn new(value: [u8; 4]) -> DeviceClass {
        match &value {
            b"scnr" => DeviceClass::Input,
            b"mntr" => DeviceClass::Display,
            b"prtr" => DeviceClass::Output,
            b"link" => DeviceClass::DeviceLink,
            b"spac" => DeviceClass::ColourSpaceConversion,
            b"abst" => DeviceClass::Abstract,
            b"nmcl" => DeviceClass::NamedColour,
            _ => DeviceClass::Unrecognized { value },
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input device profile"),
            Self::Display => write!(f, "display device profile"),
            Self::Output => write!(f, "output device profile"),
            Self::DeviceLink => write!(f, "devicelink profile"),
            Self::ColourSpaceConversion => write!(f, "colorspace conversion profile"),
            Self::Abstract => write!(f, "abstract profile"),
            Self::NamedColour => write!(f, "name colour profile"),
            Self::Unrecognized { value } => write!(f, "unrecognized ({})", fourcc(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    // 'APPL'
    Apple,
    // 'MSFT'
    Microsoft,
    // 'SGI '
    SiliconGraphics,
    // 'SUNW'
    SunMicrosystems,
    Unrecognized { value: [u8; 4] },
}

impl Platform {
    fn new(value: [u8; 4]) -> Platform {
        match &value {
            b"APPL" => Platform::Apple,
            b"MSFT" => Platform::Microsoft,
            b"SGI " => Platform::SiliconGraphics,
            b"SUNW" => Platform::SunMicrosystems,
            _ => Platform::Unrecognized { value },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Apple => write!(f, "Apple Computer"),
            Self::Microsoft => write!(f, "Microsoft Corporation"),
            Self::SiliconGraphics => write!(f, "Silicon Graphics"),
            Self::SunMicrosystems => write!(f, "Sun Microsystems"),
            Self::Unrecognized { value: _ } => write!(f, "unrecognized"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFlag {
    // xxxx xxx0
    NotEmbedded,
    // xxxx xxx1
    Embedded,
    // xxxx xx0x
    Independent,
    // xxxx xx1x
    Dependent,
}

impl ProfileFlag {
    fn new(value: u32) -> Vec<ProfileFlag> {
        let mut flags = Vec::with_capacity(2);

        if value & 0b0000_0001 != 0 {
            flags.push(ProfileFlag::Embedded);
        } else {
            flags.push(ProfileFlag::NotEmbedded);
        }

        if value & 0b0000_0010 != 0 {
            flags.push(ProfileFlag::Dependent);
        } else {
            flags.push(ProfileFlag::Independent);
        }

        flags
    }
}

impl fmt::Display for ProfileFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NotEmbedded => write!(f, "not embedded"),
            Self::Embedded => write!(f, "embedded"),
            Self::Independent => write!(f, "can be used independently"),
            Self::Dependent => write!(f, "cannot be used independently"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAttribute {
    Reflective,
    Transparency,
    Glossy,
    Matte,
    PositivePolarity,
    NegativePolarity,
    Colour,
    BlackAndWhite,
}

impl DeviceAttribute {
    fn new(value: u64) -> Vec<DeviceAttribute> {
        let mut attributes = Vec::with_capacity(4);

        if value & 0b0001 != 0 {
            attributes.push(DeviceAttribute::Transparency);
        } else {
            attributes.push(DeviceAttribute::Reflective);
        }

        if value & 0b0010 != 0 {
            attributes.push(DeviceAttribute::Matte);
        } else {
            attributes.push(DeviceAttribute::Glossy);
        }

        if value & 0b0100 != 0 {
            attributes.push(DeviceAttribute::NegativePolarity);
        } else {
            attributes.push(DeviceAttribute::PositivePolarity);
        }

        if value & 0b1000 != 0 {
            attributes.push(DeviceAttribute::BlackAndWhite);
        } else {
            attributes.push(DeviceAttribute::Colour);
        }

        attributes
    }
}

impl fmt::Display for DeviceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Reflective => write!(f, "reflective"),
            Self::Transparency => write!(f, "transparency"),
            Self::Glossy => write!(f, "glossy"),
            Self::Matte => write!(f, "matte"),
            Self::PositivePolarity => write!(f, "positive media polarity"),
            Self::NegativePolarity => write!(f, "negative media polarity"),
            Self::Colour => write!(f, "color media"),
            Self::BlackAndWhite => write!(f, "black & white media"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingIntent {
    Perceptual,
    MediaRelativeColorimetric,
    Saturation,
    AbsoluteColorimetric,
    Reserved { value: u32 },
}

impl RenderingIntent {
    fn new(value: u32) -> RenderingIntent {
        match value {
            0 => RenderingIntent::Perceptual,
            1 => RenderingIntent::MediaRelativeColorimetric,
            2 => RenderingIntent::Saturation,
            3 => RenderingIntent::AbsoluteColorimetric,
            value => RenderingIntent::Reserved { value },
        }
    }
}

impl fmt::Display for RenderingIntent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Perceptual => write!(f, "perceptual"),
            Self::MediaRelativeColorimetric => write!(f, "media-relative colorimetric"),
            Self::Saturation => write!(f, "saturation"),
            Self::AbsoluteColorimetric => write!(f, "ICC-absolute colorimetric"),
            Self::Reserved { value } => write!(f, "{} (reserved)", value),
        }
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

// s15Fixed16Number
fn s15_fixed16(value: [u8; 4]) -> f64 {
    i32::from_be_bytes(value) as f64 / 65536.0
}

/// The fixed 128-byte profile header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    size: [u8; 4],
    preferred_cmm_type: [u8; 4],
    version: [u8; 4],
    device_class: [u8; 4],
    colour_space: [u8; 4],
    connection_space: [u8; 4],
    // year, month, day, hours, minutes, seconds
    date_time: [u16; 6],
    file_signature: [u8; 4],
    platform: [u8; 4],
    flags: [u8; 4],
    device_manufacturer: [u8; 4],
    device_model: [u8; 4],
    device_attributes: [u8; 8],
    rendering_intent: [u8; 4],
    illuminant: [[u8; 4]; 3],
    creator: [u8; 4],
    profile_id: [u8; 16],
}

impl Header {
    fn decode(bytes: &[u8; HEADER_LENGTH]) -> Header {
        let field = |start: usize| -> [u8; 4] {
            [
                bytes[start],
                bytes[start + 1],
                bytes[start + 2],
                bytes[start + 3],
            ]
        };

        let mut date_time = [0u16; 6];
        for (i, value) in date_time.iter_mut().enumerate() {
            *value = u16::from_be_bytes([bytes[24 + i * 2], bytes[25 + i * 2]]);
        }

        let mut device_attributes = [0u8; 8];
        device_attributes.copy_from_slice(&bytes[56..64]);

        let mut profile_id = [0u8; 16];
        profile_id.copy_from_slice(&bytes[84..100]);

        Header {
            size: field(0),
            preferred_cmm_type: field(4),
            version: field(8),
            device_class: field(12),
            colour_space: field(16),
            connection_space: field(20),
            date_time,
            file_signature: field(36),
            platform: field(40),
            flags: field(44),
            device_manufacturer: field(48),
            device_model: field(52),
            device_attributes,
            rendering_intent: field(64),
            illuminant: [field(68), field(72), field(76)],
            creator: field(80),
            profile_id,
        }
    }

    /// Profile size as declared in the header.
    pub fn size(&self) -> u32 {
        u32::from_be_bytes(self.size)
    }

    pub fn preferred_cmm_type(&self) -> u32 {
        u32::from_be_bytes(self.preferred_cmm_type)
    }

    pub fn version(&self) -> Version {
        Version::new(self.version)
    }

    pub fn device_class(&self) -> DeviceClass {
        DeviceClass::new(self.device_class)
    }

    /// Colour space of the data, e.g. "RGB" or "GRAY".
    pub fn colour_space(&self) -> String {
        fourcc(&self.colour_space)
    }

    /// Profile connection space, e.g. "XYZ" or "Lab".
    pub fn connection_space(&self) -> String {
        fourcc(&self.connection_space)
    }

    /// Creation date and time, `None` if the fields do not form a valid date.
    pub fn date_time(&self) -> Option<NaiveDateTime> {
        let [year, month, day, hour, minute, second] = self.date_time;
        NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?.and_hms_opt(
            hour as u32,
            minute as u32,
            second as u32,
        )
    }

    pub fn file_signature(&self) -> String {
        fourcc(&self.file_signature)
    }

    /// True if the file signature field holds 'acsp'.
    pub fn has_valid_signature(&self) -> bool {
        self.file_signature == PROFILE_FILE_SIGNATURE
    }

    pub fn platform(&self) -> Platform {
        Platform::new(self.platform)
    }

    pub fn flags(&self) -> Vec<ProfileFlag> {
        ProfileFlag::new(u32::from_be_bytes(self.flags))
    }

    pub fn device_manufacturer(&self) -> String {
        fourcc(&self.device_manufacturer)
    }

    pub fn device_model(&self) -> String {
        fourcc(&self.device_model)
    }

    pub fn device_attributes(&self) -> Vec<DeviceAttribute> {
        DeviceAttribute::new(u64::from_be_bytes(self.device_attributes))
    }

    pub fn rendering_intent(&self) -> RenderingIntent {
        RenderingIntent::new(u32::from_be_bytes(self.rendering_intent))
    }

    /// XYZ values of the illuminant of the profile connection space.
    pub fn illuminant(&self) -> (f64, f64, f64) {
        (
            s15_fixed16(self.illuminant[0]),
            s15_fixed16(self.illuminant[1]),
            s15_fixed16(self.illuminant[2]),
        )
    }

    pub fn creator(&self) -> String {
        fourcc(&self.creator)
    }

    pub fn profile_id(&self) -> &[u8; 16] {
        &self.profile_id
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let date_time = match self.date_time() {
            Some(value) => value.to_string(),
            None => "invalid".to_owned(),
        };
        let (x, y, z) = self.illuminant();

        writeln!(f, "Size:  {}", self.size())?;
        writeln!(f, "Preferred CMM Type:  {}", self.preferred_cmm_type())?;
        writeln!(f, "Version:  {}", self.version())?;
        writeln!(f, "Device Class:  {}", self.device_class())?;
        writeln!(f, "Color Space:  {}", self.colour_space())?;
        writeln!(f, "Connection Space:  {}", self.connection_space())?;
        writeln!(f, "Datetime:  {}", date_time)?;
        writeln!(f, "File Signature:  {}", self.file_signature())?;
        writeln!(f, "Platform:  {}", self.platform())?;
        writeln!(f, "Flags:  {}", join(&self.flags()))?;
        writeln!(f, "Device Manufacturer:  {}", self.device_manufacturer())?;
        writeln!(f, "Device Model:  {}", self.device_model())?;
        writeln!(f, "Device Attributes:  {}", join(&self.device_attributes()))?;
        writeln!(f, "Rendering Intent:  {}", self.rendering_intent())?;
        writeln!(f, "Illuminant:  ({:.6}, {:.6}, {:.6})", x, y, z)?;
        write!(f, "Creator:  {}", self.creator())
    }
}

// Each tag signature in the tag table must be unique;
// a profile cannot contain more than one tag with the same signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    signature: [u8; 4],
    offset: [u8; 4], // uInt32Number
    size: [u8; 4],   // uInt32Number
    data: Vec<u8>,
}

impl Tag {
    // A four byte value registered with the ICC
    pub fn signature(&self) -> String {
        fourcc(&self.signature)
    }

    // An address within an ICC profile, relative to byte zero of the file.
    pub fn offset(&self) -> u32 {
        u32::from_be_bytes(self.offset)
    }

    // The number of bytes in the tag data element.
    pub fn size(&self) -> u32 {
        u32::from_be_bytes(self.size)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ICCProfile {
    header: Header,
    tags: Vec<Tag>,
    warnings: Vec<String>,
}

impl ICCProfile {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tags(&self) -> &Vec<Tag> {
        &self.tags
    }

    pub fn tag(&self, signature: &str) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.signature() == signature)
    }

    /// Problems found while decoding that did not prevent the profile from
    /// being returned.
    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Decodes a profile from its raw bytes.
pub fn decode_icc_bytes(data: &[u8]) -> Result<ICCProfile, Box<dyn error::Error>> {
    if data.len() < HEADER_LENGTH {
        return Err(ICCError::ProfileTooShort { length: data.len() }.into());
    }

    let mut header_bytes = [0u8; HEADER_LENGTH];
    header_bytes.copy_from_slice(&data[..HEADER_LENGTH]);

    let mut profile = ICCProfile {
        header: Header::decode(&header_bytes),
        tags: vec![],
        warnings: vec![],
    };

    debug!("ICC header {:?}", profile.header);

    if !profile.header.has_valid_signature() {
        profile.warn(format!(
            "ICC profile header is corrupt, file signature {:?} is not 'acsp'",
            profile.header.file_signature
        ));
    }

    if profile.header.date_time().is_none() {
        profile.warn(format!(
            "ICC profile creation date {:?} is not a valid date",
            profile.header.date_time
        ));
    }

    if profile.header.size() as usize != data.len() {
        profile.warn(format!(
            "ICC profile declares {} bytes but {} are available",
            profile.header.size(),
            data.len()
        ));
    }

    if data.len() < HEADER_LENGTH + 4 {
        profile.warn("ICC profile has no tag table".to_owned());
        return Ok(profile);
    }

    let mut tag_count: [u8; 4] = [0; 4];
    tag_count.copy_from_slice(&data[HEADER_LENGTH..HEADER_LENGTH + 4]);
    let tag_count = u32::from_be_bytes(tag_count) as usize;

    let table_start = HEADER_LENGTH + 4;
    let available = (data.len() - table_start) / TAG_ENTRY_LENGTH;
    if tag_count > available {
        profile.warn(format!(
            "ICC tag table declares {} tags but only {} fit in the profile",
            tag_count, available
        ));
    }

    for index in 0..tag_count.min(available) {
        let entry = &data[table_start + index * TAG_ENTRY_LENGTH..][..TAG_ENTRY_LENGTH];

        let mut tag = Tag {
            signature: [entry[0], entry[1], entry[2], entry[3]],
            offset: [entry[4], entry[5], entry[6], entry[7]],
            size: [entry[8], entry[9], entry[10], entry[11]],
            data: vec![],
        };

        let start = tag.offset() as usize;
        let end = start.saturating_add(tag.size() as usize);
        if end <= data.len() {
            tag.data = data[start..end].to_vec();
        } else {
            profile.warn(format!(
                "ICC tag {:?} at offset {} with size {} lies outside the profile",
                tag.signature(),
                tag.offset(),
                tag.size()
            ));
        }

        debug!(
            "ICC tag {:?} offset {} size {}",
            tag.signature(),
            tag.offset(),
            tag.size()
        );
        profile.tags.push(tag);
    }

    Ok(profile)
}

/// Decodes a profile starting at the current position of `reader`.
///
/// The profile length is taken from the size field of the header; if the
/// stream ends before that, whatever is available is decoded.
pub fn decode_icc<R: io::Read + io::Seek>(
    reader: &mut R,
) -> Result<ICCProfile, Box<dyn error::Error>> {
    let icc_start_position = reader.stream_position()?;
    info!("ICC profile start at {:?}", icc_start_position);

    let mut data: Vec<u8> = vec![0; HEADER_LENGTH];
    reader.read_exact(&mut data)?;

    let size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as u64;
    let remaining = size.saturating_sub(HEADER_LENGTH as u64);
    let mut rest = io::Read::take(reader.by_ref(), remaining);
    io::Read::read_to_end(&mut rest, &mut data)?;

    let profile = decode_icc_bytes(&data)?;
    info!("ICC profile finish at {:?}", reader.stream_position()?);

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_nibbles() {
        assert_eq!(Version::new([4, 0x30, 0, 0]).to_string(), "4.3.0");
        assert_eq!(Version::new([2, 0x21, 0, 0]).to_string(), "2.2.1");
    }

    #[test]
    fn flags_and_attributes() {
        assert_eq!(
            ProfileFlag::new(0b11),
            vec![ProfileFlag::Embedded, ProfileFlag::Dependent]
        );
        assert_eq!(
            join(&DeviceAttribute::new(0b1111)),
            "transparency, matte, negative media polarity, black & white media"
        );
    }

    #[test]
    fn fourcc_trims_padding() {
        assert_eq!(fourcc(b"RGB "), "RGB");
        assert_eq!(fourcc(b"GRAY"), "GRAY");
    }

    #[test]
    fn too_short() {
        assert!(decode_icc_bytes(&[0u8; 64]).is_err());
    }
}
