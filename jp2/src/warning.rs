use std::fmt;

use crate::{format_box_type, BoxType};

/// A recoverable problem found while decoding.
///
/// Warnings never abort a decode. The box that raised it is kept, either with
/// best-effort fields or as raw bytes, and the warning is returned alongside
/// the decoded tree.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodeWarning {
    offset: u64,
    box_type: Option<BoxType>,
    message: String,
}

impl DecodeWarning {
    pub fn new(offset: u64, box_type: Option<BoxType>, message: String) -> DecodeWarning {
        DecodeWarning {
            offset,
            box_type,
            message,
        }
    }

    /// Byte offset of the box (or field) the warning refers to.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn box_type(&self) -> Option<BoxType> {
        self.box_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.box_type {
            Some(box_type) => write!(
                f,
                "{} box at byte offset {}: {}",
                format_box_type(box_type),
                self.offset,
                self.message
            ),
            None => write!(f, "byte offset {}: {}", self.offset, self.message),
        }
    }
}
