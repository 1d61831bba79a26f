use log::info;
use std::error;
use std::fmt;
use std::io;

use crate::{
    encode_boxes, format_box_type, BoxContents, BoxType, BoxTypes, BoxWriter, FileTypeBox, Jp2Box,
    BOX_TYPE_ASSOCIATION, BRAND_JP2, BRAND_JPX, BRAND_JPXB,
};

/// A box list that must not be written as a file.
#[derive(Debug, PartialEq)]
pub enum ValidationError {
    DuplicateDataReference,
    NestedDataReference {
        parent: BoxType,
    },
    LabelOutsideAssociation {
        parent: Option<BoxType>,
    },
    JpxBrandWithoutJp2Compatibility,
    JpxBrandWithoutJpxCompatibility,
    JpxBoxesWithoutJpxBrand {
        box_type: BoxType,
    },
    MissingFileType,
    DataReferenceOutOfRange {
        index: u16,
        entries: usize,
    },
}

impl error::Error for ValidationError {}
impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DuplicateDataReference => {
                write!(f, "there can only be one data reference box")
            }
            Self::NestedDataReference { parent } => {
                write!(
                    f,
                    "a data reference box must be at the top level, found inside {}",
                    format_box_type(parent)
                )
            }
            Self::LabelOutsideAssociation { parent: Some(parent) } => {
                write!(
                    f,
                    "a label box must be inside an association box, found inside {}",
                    format_box_type(parent)
                )
            }
            Self::LabelOutsideAssociation { parent: None } => {
                write!(
                    f,
                    "a label box must be inside an association box, found at the top level"
                )
            }
            Self::JpxBrandWithoutJp2Compatibility => {
                write!(
                    f,
                    "a 'jpx ' or 'jpxb' brand requires 'jp2 ' in the compatibility list"
                )
            }
            Self::JpxBrandWithoutJpxCompatibility => {
                write!(
                    f,
                    "a 'jpx ' or 'jpxb' brand requires 'jpx ' or 'jpxb' in the compatibility list"
                )
            }
            Self::JpxBoxesWithoutJpxBrand { box_type } => {
                write!(
                    f,
                    "box type {} requires a 'jpx ' or 'jpxb' brand",
                    format_box_type(box_type)
                )
            }
            Self::MissingFileType => {
                write!(f, "a file type box is required at the top level")
            }
            Self::DataReferenceOutOfRange { index, entries } => {
                write!(
                    f,
                    "fragment refers to data reference {} but only {} are defined",
                    index, entries
                )
            }
        }
    }
}

#[derive(Default)]
struct Census<'a> {
    data_references: usize,
    data_reference_entries: usize,
    first_jpx_box: Option<BoxType>,
    fragment_references: Vec<u16>,
    file_type: Option<&'a FileTypeBox>,
}

// Placement rules are checked on the way down; everything needed by the
// whole-document rules is collected into `census`.
fn walk<'a>(
    boxes: &'a [Jp2Box],
    parent: Option<BoxType>,
    census: &mut Census<'a>,
) -> Result<(), ValidationError> {
    for jp2_box in boxes {
        let box_type = jp2_box.identifier();
        if census.first_jpx_box.is_none() && BoxTypes::new(box_type).is_jpx() {
            census.first_jpx_box = Some(box_type);
        }

        match jp2_box.contents() {
            BoxContents::DataReference(data_reference) => {
                if let Some(parent) = parent {
                    return Err(ValidationError::NestedDataReference { parent });
                }
                census.data_references += 1;
                if census.data_references > 1 {
                    return Err(ValidationError::DuplicateDataReference);
                }
                census.data_reference_entries = data_reference.entries().len();
            }
            BoxContents::Label(_) if parent != Some(BOX_TYPE_ASSOCIATION) => {
                return Err(ValidationError::LabelOutsideAssociation { parent });
            }
            BoxContents::FragmentList(fragment_list) => {
                census
                    .fragment_references
                    .extend_from_slice(fragment_list.data_references());
            }
            BoxContents::FileType(file_type) if parent.is_none() => {
                if census.file_type.is_none() {
                    census.file_type = Some(file_type);
                }
            }
            _ => {}
        }

        walk(jp2_box.children(), Some(box_type), census)?;
    }
    Ok(())
}

/// Check a box list against the rules a JP2 or JPX file must satisfy before
/// it is written.
///
/// Placement is checked first: at most one Data Reference box, only at the
/// top level, and Label boxes only directly inside Association boxes. Then
/// the File Type box must be present and its brand must agree with both its
/// compatibility list and the kinds of boxes in the list.
pub fn validate(boxes: &[Jp2Box]) -> Result<(), ValidationError> {
    let mut census = Census::default();
    walk(boxes, None, &mut census)?;

    let file_type = census.file_type.ok_or(ValidationError::MissingFileType)?;

    if file_type.is_jpx_brand() {
        if !file_type.is_compatible(BRAND_JP2) {
            return Err(ValidationError::JpxBrandWithoutJp2Compatibility);
        }
        if !file_type.is_compatible(BRAND_JPX) && !file_type.is_compatible(BRAND_JPXB) {
            return Err(ValidationError::JpxBrandWithoutJpxCompatibility);
        }
    }

    if let Some(box_type) = census.first_jpx_box {
        if !file_type.is_jpx_brand() {
            return Err(ValidationError::JpxBoxesWithoutJpxBrand { box_type });
        }
    }

    for index in census.fragment_references {
        if index as usize > census.data_reference_entries {
            return Err(ValidationError::DataReferenceOutOfRange {
                index,
                entries: census.data_reference_entries,
            });
        }
    }

    Ok(())
}

/// Validate a box list and write it out as a file.
///
/// Nothing is written when validation or encoding fails.
pub fn wrap<W: io::Write>(writer: &mut W, boxes: &[Jp2Box]) -> Result<(), Box<dyn error::Error>> {
    validate(boxes)?;

    let mut box_writer = BoxWriter::new(vec![]);
    encode_boxes(&mut box_writer, boxes)?;
    let bytes = box_writer.into_inner();

    writer.write_all(&bytes)?;
    writer.flush()?;
    info!("Wrote {} boxes, {} bytes", boxes.len(), bytes.len());

    Ok(())
}
