use log::debug;
use std::error;
use std::fmt;
use std::io;

use crate::{BoxReader, BoxType, BoxWriter, JBox, BOX_TYPE_CONTIGUOUS_CODESTREAM};

/// Contiguous Codestream box.
///
/// Contains a valid and complete JPEG 2000 codestream. The codestream bytes are
/// kept as they are; the main header is decoded alongside them when possible.
///
/// See ISO/IEC 15444-1:2024 Section I.5.4.
#[derive(Debug, Default)]
pub struct ContiguousCodestreamBox {
    data: Vec<u8>,
    codestream: Option<jpc::ContiguousCodestream>,
}

impl ContiguousCodestreamBox {
    pub fn new(data: Vec<u8>) -> ContiguousCodestreamBox {
        ContiguousCodestreamBox {
            data,
            codestream: None,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Main header of the codestream, when it could be decoded.
    pub fn codestream(&self) -> Option<&jpc::ContiguousCodestream> {
        self.codestream.as_ref()
    }
}

impl JBox for ContiguousCodestreamBox {
    // The type of a Contiguous Codestream box shall be ‘jp2c’ (0x6A70 3263).
    fn identifier(&self) -> BoxType {
        BOX_TYPE_CONTIGUOUS_CODESTREAM
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut BoxReader<R>,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.position();

        match jpc::decode_jpc(&mut *reader, true) {
            Ok(codestream) => {
                for warning in codestream.warnings() {
                    reader.warn(
                        offset,
                        Some(BOX_TYPE_CONTIGUOUS_CODESTREAM),
                        format!("codestream: {}", warning),
                    );
                }
                debug!(
                    "Codestream main header ends at byte offset {}",
                    codestream.offset() + codestream.length()
                );
                self.codestream = Some(codestream);
            }
            Err(error) => {
                reader.warn(
                    offset,
                    Some(BOX_TYPE_CONTIGUOUS_CODESTREAM),
                    format!("codestream header could not be decoded: {}", error),
                );
            }
        }

        reader.seek_to(offset)?;
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

impl fmt::Display for ContiguousCodestreamBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.codestream {
            Some(codestream) => write!(f, "Main header:\n{}", codestream.header()),
            None => write!(f, "Codestream:  {} bytes, header not decoded", self.data.len()),
        }
    }
}
