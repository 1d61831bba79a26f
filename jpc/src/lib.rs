//! JPEG 2000 codestream marker segment parser.
//!
//! Parses the main header of a codestream (ITU-T T.800 | ISO/IEC 15444-1
//! Annex A) and, optionally, indexes every tile-part up to the end of
//! codestream marker. Entropy coded data is never decoded, only located.

use log::{debug, info, warn};
use std::error;
use std::fmt;
use std::io;
use std::str;

#[derive(Debug)]
pub enum CodestreamError {
    MarkerError {
        marker: MarkerSymbol,
        error: String,
    },
    MarkerMissing {
        marker: MarkerSymbol,
    },
    MarkerUnexpected {
        marker: MarkerSymbol,
        offset: u64,
    },
    TileSizeOverflow {
        image_horizontal_offset: u32,
        image_vertical_offset: u32,
        tile_horizontal_offset: u32,
        tile_vertical_offset: u32,
        reference_tile_width: u32,
        reference_tile_height: u32,
    },
    TileGridOffsetOverflow {
        tile_horizontal_offset: u32,
        tile_vertical_offset: u32,
        image_horizontal_offset: u32,
        image_vertical_offset: u32,
    },
}

impl error::Error for CodestreamError {}
impl fmt::Display for CodestreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MarkerError { marker, error } => {
                write!(
                    f,
                    "marker 0x{:02X}{:02X} error {:?}",
                    marker[0], marker[1], error
                )
            }
            Self::MarkerMissing { marker } => {
                write!(f, "missing marker 0x{:02X}{:02X}", marker[0], marker[1])
            }
            Self::MarkerUnexpected { marker, offset } => {
                write!(
                    f,
                    "unexpected marker 0x{:02X}{:02X} at byte offset {}",
                    marker[0], marker[1], offset
                )
            }
            Self::TileGridOffsetOverflow {
                image_horizontal_offset,
                image_vertical_offset,
                tile_horizontal_offset,
                tile_vertical_offset,
            } => {
                write!(
                    f,
                    "tile grid offset overflow: XOsiz = {}, YOsiz = {}, XTOsiz = {}, YTOsiz = {}",
                    image_horizontal_offset,
                    image_vertical_offset,
                    tile_horizontal_offset,
                    tile_vertical_offset,
                )
            }
            // XTsiz + XTOsiz > XOsiz
            // YTsiz + YTOsiz > YOsiz
            Self::TileSizeOverflow {
                image_horizontal_offset,
                image_vertical_offset,
                tile_horizontal_offset,
                tile_vertical_offset,
                reference_tile_width,
                reference_tile_height,
            } => {
                write!(
                    f,
                    "tile size overflow: XOsiz = {}, YOsiz = {}, XTOsiz = {}, YTOsiz = {}, XTsiz = {}, YTsiz = {}",
                    image_horizontal_offset,
                    image_vertical_offset,
                    tile_horizontal_offset,
                    tile_vertical_offset,
                    reference_tile_width,
                    reference_tile_height,
                )
            }
        }
    }
}

pub type MarkerSymbol = [u8; 2];

// Delimiting markers and marker segments
pub const MARKER_SYMBOL_SOC: MarkerSymbol = [255, 79]; // Start of code stream
pub const MARKER_SYMBOL_SOT: MarkerSymbol = [255, 144]; // Start of tile-part
pub const MARKER_SYMBOL_SOD: MarkerSymbol = [255, 147]; // Start of data
pub const MARKER_SYMBOL_EOC: MarkerSymbol = [255, 217]; // End of codestream

// Fixed information marker segments
pub const MARKER_SYMBOL_SIZ: MarkerSymbol = [255, 81]; // Image and tile size

// Functional marker segments
pub const MARKER_SYMBOL_COD: MarkerSymbol = [255, 82]; // Coding style default
pub const MARKER_SYMBOL_COC: MarkerSymbol = [255, 83]; // Coding style component
pub const MARKER_SYMBOL_RGN: MarkerSymbol = [255, 94]; // Region-of-interest
pub const MARKER_SYMBOL_QCD: MarkerSymbol = [255, 92]; // Quantization default
pub const MARKER_SYMBOL_QCC: MarkerSymbol = [255, 93]; // Quantization component
pub const MARKER_SYMBOL_POC: MarkerSymbol = [255, 95]; // Progression order change

// Pointer marker segments
pub const MARKER_SYMBOL_TLM: MarkerSymbol = [255, 85]; // Tile-part lengths
pub const MARKER_SYMBOL_PLM: MarkerSymbol = [255, 87]; // Packet length, main header
pub const MARKER_SYMBOL_PLT: MarkerSymbol = [255, 88]; // Packet length, tile-part header
pub const MARKER_SYMBOL_PPM: MarkerSymbol = [255, 96]; // Packed packet headers, main header
pub const MARKER_SYMBOL_PPT: MarkerSymbol = [255, 97]; // Packed packet headers, tile-part header

// Informational marker segments
pub const MARKER_SYMBOL_CRG: MarkerSymbol = [255, 99]; // Component registration
pub const MARKER_SYMBOL_COM: MarkerSymbol = [255, 100]; // Comment

// 0xFF30 to 0xFF3F are reserved markers without a marker segment.
fn is_marker_only(marker: MarkerSymbol) -> bool {
    marker[0] == 0xFF && (0x30..=0x3F).contains(&marker[1])
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProgressionOrder {
    // 0000 0000 Layer-resolution level-component-position progression
    LRCP,

    // 0000 0001 Resolution level-layer-component-position progression
    RLCP,

    // 0000 0010 Resolution level-position-component-layer progression
    RPCL,

    // 0000 0011 Position-component-resolution level-layer progression
    PCRL,

    // 0000 0100 Component-position-resolution level-layer progression
    CPRL,

    // All other values reserved
    Reserved { value: u8 },
}

impl ProgressionOrder {
    fn new(value: u8) -> ProgressionOrder {
        match value {
            0b0000_0000 => ProgressionOrder::LRCP,
            0b0000_0001 => ProgressionOrder::RLCP,
            0b0000_0010 => ProgressionOrder::RPCL,
            0b0000_0011 => ProgressionOrder::PCRL,
            0b0000_0100 => ProgressionOrder::CPRL,
            _ => ProgressionOrder::Reserved { value },
        }
    }
}

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LRCP => write!(f, "LRCP"),
            Self::RLCP => write!(f, "RLCP"),
            Self::RPCL => write!(f, "RPCL"),
            Self::PCRL => write!(f, "PCRL"),
            Self::CPRL => write!(f, "CPRL"),
            Self::Reserved { value } => write!(f, "{} (invalid)", value),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CodingBlockStyle {
    // xxxx xxx0 No selective arithmetic coding bypass
    NoSelectiveArithmeticCodingBypass,

    // xxxx xxx1 - Selective arithmetic coding bypass
    SelectiveArithmeticCodingBypass,

    // xxxx xx0x - No reset of context probabilities on coding pass boundaries
    NoResetOfContextProbabilities,

    // xxxx xx1x - Reset context probabilities on coding pass boundaries
    ResetContextProbabilities,

    // xxxx x0xx - No termination on each coding pass
    NoTerminationOnEachCodingPass,

    // xxxx x1xx - Termination on each coding pass
    TerminationOnEachCodingPass,

    // xxxx 0xxx - No vertically causal context
    NoVerticallyCausalContext,

    // xxxx 1xxx - Vertically causal context
    VerticallyCausalContext,

    // xxx0 xxxx - No predictable termination
    NoPredictableTermination,

    // xxx1 xxxx - Predictable termination
    PredictableTermination,

    // xx0x xxxx - No segmentation symbols are used
    NoSegmentationSymbolsAreUsed,

    // xx1x xxxx - Segmentation symbols are used
    SegmentationSymbolsAreUsed,
}

impl CodingBlockStyle {
    fn new(value: u8) -> Vec<CodingBlockStyle> {
        let flags = [
            (
                0b_0000_0001,
                CodingBlockStyle::SelectiveArithmeticCodingBypass,
                CodingBlockStyle::NoSelectiveArithmeticCodingBypass,
            ),
            (
                0b_0000_0010,
                CodingBlockStyle::ResetContextProbabilities,
                CodingBlockStyle::NoResetOfContextProbabilities,
            ),
            (
                0b_0000_0100,
                CodingBlockStyle::TerminationOnEachCodingPass,
                CodingBlockStyle::NoTerminationOnEachCodingPass,
            ),
            (
                0b_0000_1000,
                CodingBlockStyle::VerticallyCausalContext,
                CodingBlockStyle::NoVerticallyCausalContext,
            ),
            (
                0b_0001_0000,
                CodingBlockStyle::PredictableTermination,
                CodingBlockStyle::NoPredictableTermination,
            ),
            (
                0b_0010_0000,
                CodingBlockStyle::SegmentationSymbolsAreUsed,
                CodingBlockStyle::NoSegmentationSymbolsAreUsed,
            ),
        ];

        flags
            .iter()
            .map(|(mask, set, unset)| if value & mask != 0 { *set } else { *unset })
            .collect()
    }

    fn is_set(&self) -> bool {
        matches!(
            self,
            Self::SelectiveArithmeticCodingBypass
                | Self::ResetContextProbabilities
                | Self::TerminationOnEachCodingPass
                | Self::VerticallyCausalContext
                | Self::PredictableTermination
                | Self::SegmentationSymbolsAreUsed
        )
    }

    fn name(&self) -> &'static str {
        match self {
            Self::NoSelectiveArithmeticCodingBypass | Self::SelectiveArithmeticCodingBypass => {
                "Selective arithmetic coding bypass"
            }
            Self::NoResetOfContextProbabilities | Self::ResetContextProbabilities => {
                "Reset context probabilities on coding pass boundaries"
            }
            Self::NoTerminationOnEachCodingPass | Self::TerminationOnEachCodingPass => {
                "Termination on each coding pass"
            }
            Self::NoVerticallyCausalContext | Self::VerticallyCausalContext => {
                "Vertically stripe causal context"
            }
            Self::NoPredictableTermination | Self::PredictableTermination => {
                "Predictable termination"
            }
            Self::NoSegmentationSymbolsAreUsed | Self::SegmentationSymbolsAreUsed => {
                "Segmentation symbols"
            }
        }
    }
}

impl fmt::Display for CodingBlockStyle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:  {}", self.name(), self.is_set())
    }
}

// A.13 – Coding style parameter values for the Scod parameter
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CodingStyleDefault {
    // xxxx xxx0 Entropy coder, precincts with PPx = 15 and PPy = 15
    EntropyCoderWithPrecincts,

    // xxxx xxx1 Entropy coder with precincts defined below
    EntropyCoderWithPrecinctsDefined,

    // xxxx xx0x No SOP marker segments used
    NoSOP,

    // xxxx xx1x SOP marker segments may be used
    SOP,

    // xxxx x0xx No EPH marker used
    NoEPH,

    // xxxx x1xx EPH marker may be used
    EPH,
}

impl CodingStyleDefault {
    fn new(value: u8) -> Vec<CodingStyleDefault> {
        let mut coding_styles: Vec<CodingStyleDefault> = Vec::with_capacity(3);

        if value & 0b0001 != 0 {
            coding_styles.push(CodingStyleDefault::EntropyCoderWithPrecinctsDefined);
        } else {
            coding_styles.push(CodingStyleDefault::EntropyCoderWithPrecincts);
        }

        if value & 0b0010 != 0 {
            coding_styles.push(CodingStyleDefault::SOP);
        } else {
            coding_styles.push(CodingStyleDefault::NoSOP);
        }

        if value & 0b0100 != 0 {
            coding_styles.push(CodingStyleDefault::EPH);
        } else {
            coding_styles.push(CodingStyleDefault::NoEPH);
        }

        coding_styles
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MultipleComponentTransformation {
    // No multiple component transformation specified.
    None,

    // Component transformation used on components 0, 1, 2 for coding efficiency.
    // Irreversible component transformation used with the 9-7 irreversible filter.
    // Reversible component transformation used with the 5-3 reversible filter.
    Multiple,

    // All other values reserved
    Reserved { value: u8 },
}

impl MultipleComponentTransformation {
    fn new(value: u8) -> MultipleComponentTransformation {
        match value {
            0 => MultipleComponentTransformation::None,
            1 => MultipleComponentTransformation::Multiple,
            _ => MultipleComponentTransformation::Reserved { value },
        }
    }
}

impl fmt::Display for MultipleComponentTransformation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "no"),
            Self::Multiple => write!(f, "yes"),
            Self::Reserved { value } => write!(f, "{} (invalid)", value),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TransformationFilter {
    // 9-7 irreversible filter
    Irreversible,
    // 5-3 reversible filter
    Reversible,

    // All other values reserved
    Reserved { value: u8 },
}

impl TransformationFilter {
    fn new(value: u8) -> TransformationFilter {
        match value {
            0 => TransformationFilter::Irreversible,
            1 => TransformationFilter::Reversible,
            _ => TransformationFilter::Reserved { value },
        }
    }
}

impl fmt::Display for TransformationFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Irreversible => write!(f, "9-7 irreversible"),
            Self::Reversible => write!(f, "5-3 reversible"),
            Self::Reserved { value } => write!(f, "{} (invalid)", value),
        }
    }
}

// A.5.1
//
// Image and tile size (SIZ)
//
// Function: Provides information about the uncompressed image such as the
// width and height of the reference grid, the width and height of the tiles,
// the number of components, component bit depth, and the separation of
// component samples with respect to the reference grid.
#[derive(Debug, Default)]
pub struct ImageAndTileSizeMarkerSegment {
    offset: u64,
    length: u16,

    // Rsiz: Denotes capabilities that a decoder needs to properly decode the
    // codestream.
    decoder_capabilities: [u8; 2],

    // XSiz: Width of the reference grid.
    reference_grid_width: [u8; 4],

    // YSiz: Height of the reference grid.
    reference_grid_height: [u8; 4],

    // XOsiz: Horizontal offset from the origin of the reference grid to the
    // left side of the image area.
    image_horizontal_offset: [u8; 4],

    // YOsiz: Vertical offset from the origin of the reference grid to the top
    // side of the image area.
    image_vertical_offset: [u8; 4],

    // XTsiz: Width of one reference tile with respect to the reference grid
    reference_tile_width: [u8; 4],

    // YTsiz: Height of one reference tile with respect to the reference grid.
    reference_tile_height: [u8; 4],

    // XTOsiz: Horizontal offset from the origin of the reference grid to the
    // left side of the first tile.
    tile_horizontal_offset: [u8; 4],

    // YTOsiz: Vertical offset from the origin of the reference grid to the
    // top side of the first tile.
    tile_vertical_offset: [u8; 4],

    // Csiz: Number of components in the image.
    no_components: [u8; 2],

    // Ssiz: Precision (depth) in bits and sign of the ith component samples,
    // one per component.
    precision: Vec<u8>,

    // XRsiz: Horizontal separation of a sample of ith component
    // with respect to the reference grid.
    horizontal_separation: Vec<u8>,

    // YRsiz: Vertical separation of a sample of ith component
    // with respect to the reference grid.
    vertical_separation: Vec<u8>,
}

impl ImageAndTileSizeMarkerSegment {
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn decoder_capabilities(&self) -> u16 {
        u16::from_be_bytes(self.decoder_capabilities)
    }

    pub fn reference_grid_width(&self) -> u32 {
        u32::from_be_bytes(self.reference_grid_width)
    }
    pub fn reference_grid_height(&self) -> u32 {
        u32::from_be_bytes(self.reference_grid_height)
    }

    pub fn image_horizontal_offset(&self) -> u32 {
        u32::from_be_bytes(self.image_horizontal_offset)
    }
    pub fn image_vertical_offset(&self) -> u32 {
        u32::from_be_bytes(self.image_vertical_offset)
    }

    pub fn reference_tile_width(&self) -> u32 {
        u32::from_be_bytes(self.reference_tile_width)
    }
    pub fn reference_tile_height(&self) -> u32 {
        u32::from_be_bytes(self.reference_tile_height)
    }

    pub fn tile_horizontal_offset(&self) -> u32 {
        u32::from_be_bytes(self.tile_horizontal_offset)
    }
    pub fn tile_vertical_offset(&self) -> u32 {
        u32::from_be_bytes(self.tile_vertical_offset)
    }

    pub fn no_components(&self) -> u16 {
        u16::from_be_bytes(self.no_components)
    }

    /// Bit depth of component `i`. ISO/IEC 15444-1:2019 Table A.11 stores
    /// the depth minus one in the low seven bits.
    pub fn precision(&self, i: usize) -> Option<u8> {
        self.precision.get(i).map(|ssiz| (ssiz & 0x7f) + 1)
    }

    pub fn values_are_signed(&self, i: usize) -> Option<bool> {
        self.precision.get(i).map(|ssiz| ssiz & 0x80 == 0x80)
    }

    pub fn horizontal_separation(&self, i: usize) -> Option<u8> {
        self.horizontal_separation.get(i).copied()
    }
    pub fn vertical_separation(&self, i: usize) -> Option<u8> {
        self.vertical_separation.get(i).copied()
    }

    // numXtiles = ceil((Xsiz - XTOsiz) / XTsiz)
    pub fn num_x_tiles(&self) -> u32 {
        let width = self
            .reference_grid_width()
            .saturating_sub(self.tile_horizontal_offset());
        match self.reference_tile_width() {
            0 => 0,
            tile_width => (width + tile_width - 1) / tile_width,
        }
    }

    // numYtiles = ceil((Ysiz - YTOsiz) / YTsiz)
    pub fn num_y_tiles(&self) -> u32 {
        let height = self
            .reference_grid_height()
            .saturating_sub(self.tile_vertical_offset());
        match self.reference_tile_height() {
            0 => 0,
            tile_height => (height + tile_height - 1) / tile_height,
        }
    }
}

impl fmt::Display for ImageAndTileSizeMarkerSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "SIZ marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Profile:  {}", self.decoder_capabilities())?;
        writeln!(
            f,
            "    Reference Grid Height, Width:  ({} x {})",
            self.reference_grid_height(),
            self.reference_grid_width()
        )?;
        writeln!(
            f,
            "    Vertical, Horizontal Reference Grid Offset:  ({}, {})",
            self.image_vertical_offset(),
            self.image_horizontal_offset()
        )?;
        writeln!(
            f,
            "    Reference Tile Height, Width:  ({} x {})",
            self.reference_tile_height(),
            self.reference_tile_width()
        )?;
        writeln!(
            f,
            "    Vertical, Horizontal Reference Tile Offset:  ({}, {})",
            self.tile_vertical_offset(),
            self.tile_horizontal_offset()
        )?;

        let no_components = self.no_components() as usize;
        let bitdepths: Vec<String> = (0..no_components)
            .map(|i| self.precision(i).unwrap_or_default().to_string())
            .collect();
        let signed: Vec<String> = (0..no_components)
            .map(|i| self.values_are_signed(i).unwrap_or_default().to_string())
            .collect();
        let subsampling: Vec<String> = (0..no_components)
            .map(|i| {
                format!(
                    "({}, {})",
                    self.vertical_separation(i).unwrap_or_default(),
                    self.horizontal_separation(i).unwrap_or_default()
                )
            })
            .collect();

        writeln!(f, "    Bitdepth:  ({})", bitdepths.join(", "))?;
        writeln!(f, "    Signed:  ({})", signed.join(", "))?;
        write!(
            f,
            "    Vertical, Horizontal Subsampling:  ({})",
            subsampling.join(", ")
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CodingStyleParametersPrecinctSize {
    value: u8,
}

impl CodingStyleParametersPrecinctSize {
    // 4 MSBs are the precinct height exponent, PPy
    pub fn height_exponent(&self) -> u8 {
        self.value >> 4
    }

    // 4 LSBs are the precinct width exponent, PPx
    pub fn width_exponent(&self) -> u8 {
        self.value & 0b0000_1111
    }
}

// A.12 – Coding style default parameter values
#[derive(Debug, Default)]
pub struct CodingStyleParameters {
    // Coding style
    coding_style: u8,

    // Number of decomposition levels, N_L, Zero implies no transformation
    no_decomposition_levels: [u8; 1],

    // Code-block width exponent offset value, xcb
    code_block_width: [u8; 1],

    // Code-block height exponent offset value, ycb
    code_block_height: [u8; 1],

    // Style of the code-block coding passes
    code_block_style: [u8; 1],

    // Wavelet transformation used.
    transformation: [u8; 1],

    // If Scod or Scoc = xxxx xxx0, this parameter is not present; otherwise
    // this indicates precinct width and height.
    precinct_size: Vec<u8>,
}

impl CodingStyleParameters {
    pub fn no_decomposition_levels(&self) -> u8 {
        self.no_decomposition_levels[0]
    }

    pub fn no_resolutions(&self) -> u16 {
        self.no_decomposition_levels[0] as u16 + 1
    }

    // A.18
    //
    // Code-block width and height exponent offset value xcb = value + 2 or
    // ycb = value + 2. Only 0 to 8 are valid, the 4 bits allow up to 2^17.
    pub fn code_block_width(&self) -> u32 {
        1u32 << ((self.code_block_width[0] & 0b00001111) + 2)
    }

    pub fn code_block_height(&self) -> u32 {
        1u32 << ((self.code_block_height[0] & 0b00001111) + 2)
    }

    pub fn code_block_style(&self) -> u8 {
        self.code_block_style[0]
    }

    pub fn coding_block_styles(&self) -> Vec<CodingBlockStyle> {
        CodingBlockStyle::new(self.code_block_style[0])
    }

    pub fn transformation(&self) -> TransformationFilter {
        TransformationFilter::new(self.transformation[0])
    }

    pub fn has_defined_precinct_size(&self) -> bool {
        self.coding_style & 0b0001 == 1
    }

    /// One precinct size per resolution level, lowest resolution first.
    /// Without defined precincts every level uses PPx = PPy = 15.
    pub fn precinct_sizes(&self) -> Vec<CodingStyleParametersPrecinctSize> {
        if !self.has_defined_precinct_size() {
            return vec![
                CodingStyleParametersPrecinctSize { value: 0xFF };
                self.no_resolutions() as usize
            ];
        }

        self.precinct_size
            .iter()
            .map(|value| CodingStyleParametersPrecinctSize { value: *value })
            .collect()
    }
}

impl fmt::Display for CodingStyleParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "    Number of decomposition levels:  {}",
            self.no_decomposition_levels()
        )?;
        writeln!(
            f,
            "    Code block height, width:  ({} x {})",
            self.code_block_height(),
            self.code_block_width()
        )?;
        writeln!(f, "    Wavelet transform:  {}", self.transformation())?;
        writeln!(
            f,
            "    Precinct size:  ({})",
            self.precinct_sizes()
                .iter()
                .map(|size| format!(
                    "({}, {})",
                    1u32 << size.height_exponent(),
                    1u32 << size.width_exponent()
                ))
                .collect::<Vec<String>>()
                .join(", ")
        )?;
        write!(f, "    Code block context:")?;
        for style in self.coding_block_styles() {
            write!(f, "\n        {}", style)?;
        }
        Ok(())
    }
}

// A.6.1
//
// Coding style default (COD)
//
// Function: Describes the coding style, number of decomposition levels,
// and layering that is the default used for compressing all components of
// an image (if in the main header) or a tile (if in the tile-part header).
//
// The parameter values can be overridden for an individual component by a
// COC marker segment in either the main or tile-part header.
#[derive(Debug, Default)]
pub struct CodingStyleMarkerSegment {
    offset: u64,

    length: u16,

    coding_style: [u8; 1],

    // Progression order
    progression_order: [u8; 1],

    // Number of layers
    no_layers: [u8; 2],

    // Multiple component transformation
    multiple_component_transformation: [u8; 1],

    coding_style_parameters: CodingStyleParameters,
}

impl CodingStyleMarkerSegment {
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn coding_style(&self) -> u8 {
        self.coding_style[0]
    }

    pub fn coding_styles(&self) -> Vec<CodingStyleDefault> {
        CodingStyleDefault::new(self.coding_style[0])
    }

    pub fn progression_order(&self) -> ProgressionOrder {
        ProgressionOrder::new(self.progression_order[0])
    }

    pub fn no_layers(&self) -> u16 {
        u16::from_be_bytes(self.no_layers)
    }

    pub fn multiple_component_transformation(&self) -> MultipleComponentTransformation {
        MultipleComponentTransformation::new(self.multiple_component_transformation[0])
    }

    pub fn coding_style_parameters(&self) -> &CodingStyleParameters {
        &self.coding_style_parameters
    }
}

impl fmt::Display for CodingStyleMarkerSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let coding_styles = self.coding_styles();
        writeln!(f, "COD marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Coding style:")?;
        writeln!(
            f,
            "        Entropy coder, {} precincts",
            if coding_styles.contains(&CodingStyleDefault::EntropyCoderWithPrecinctsDefined) {
                "with"
            } else {
                "without"
            }
        )?;
        writeln!(
            f,
            "        SOP marker segments:  {}",
            coding_styles.contains(&CodingStyleDefault::SOP)
        )?;
        writeln!(
            f,
            "        EPH marker segments:  {}",
            coding_styles.contains(&CodingStyleDefault::EPH)
        )?;
        writeln!(
            f,
            "    Coding style parameters:\n        Progression order:  {}",
            self.progression_order()
        )?;
        writeln!(f, "        Number of layers:  {}", self.no_layers())?;
        writeln!(
            f,
            "        Multiple component transformation usage:  {}",
            self.multiple_component_transformation()
        )?;
        write!(f, "{}", self.coding_style_parameters)
    }
}

// A.6.2
//
// Coding style component (COC)
//
// Function: Describes the coding style, number of decomposition levels, and
// layering used for compressing a particular component.
#[derive(Debug, Default)]
pub struct CodingStyleComponentSegment {
    offset: u64,

    length: u16,

    // Ccoc: The index of the component to which this marker segment relates.
    index: u16,

    // Scoc: Coding style for this component
    coding_style: [u8; 1],

    // SPcoc: Parameters for coding style designated in Scoc.
    coding_style_parameters: CodingStyleParameters,
}

impl CodingStyleComponentSegment {
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn component_index(&self) -> u16 {
        self.index
    }

    pub fn coding_style(&self) -> u8 {
        self.coding_style[0]
    }

    pub fn coding_style_parameters(&self) -> &CodingStyleParameters {
        &self.coding_style_parameters
    }
}

impl fmt::Display for CodingStyleComponentSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "COC marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Associated component:  {}", self.index)?;
        writeln!(
            f,
            "    Coding style for this component:  Entropy coder, PARTITION = {}",
            self.coding_style[0] & 1
        )?;
        write!(f, "{}", self.coding_style_parameters)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RegionOfInterestStyle {
    ImplicitRegionOfInterest,
    Reserved { value: u8 },
}

impl RegionOfInterestStyle {
    fn new(value: u8) -> RegionOfInterestStyle {
        match value {
            0 => RegionOfInterestStyle::ImplicitRegionOfInterest,
            _ => RegionOfInterestStyle::Reserved { value },
        }
    }
}

impl fmt::Display for RegionOfInterestStyle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ImplicitRegionOfInterest => write!(f, "implicit"),
            Self::Reserved { value } => write!(f, "{} (invalid)", value),
        }
    }
}

// A.6.3
//
// Region of interest (RGN)
//
// Function: Signals the presence of an ROI in the codestream.
#[derive(Debug, Default)]
pub struct RegionOfInterestSegment {
    offset: u64,

    // Lrgn: Length of marker segment in bytes (not including the marker)
    length: u16,

    // Crgn: The index of the component to which this marker segment relates.
    component_index: u16,

    // Srgn: ROI style for the current ROI.
    region_of_interest_style: [u8; 1],

    // SPrgn: Implicit ROI shift
    region_of_interest_style_parameter: [u8; 1],
}

impl RegionOfInterestSegment {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn component_index(&self) -> u16 {
        self.component_index
    }

    pub fn region_of_interest_style(&self) -> RegionOfInterestStyle {
        RegionOfInterestStyle::new(self.region_of_interest_style[0])
    }

    pub fn implicit_shift(&self) -> u8 {
        self.region_of_interest_style_parameter[0]
    }
}

impl fmt::Display for RegionOfInterestSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "RGN marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Associated component:  {}", self.component_index)?;
        writeln!(f, "    ROI style:  {}", self.region_of_interest_style())?;
        write!(f, "    Parameter:  {}", self.implicit_shift())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QuantizationStyle {
    No { guard: u8 },
    ScalarDerived { guard: u8 },
    ScalarExpounded { guard: u8 },
    Reserved { value: u8 },
}

impl QuantizationStyle {
    fn new(byte: u8) -> QuantizationStyle {
        // 000x xxxx to 111x xxxx, Number of guard bits: 0 to 7
        let guard = byte >> 5;

        match byte & 0b0001_1111 {
            0b0000_0000 => QuantizationStyle::No { guard },
            // Values signalled for NLLL subband only
            0b0000_0001 => QuantizationStyle::ScalarDerived { guard },
            // Values signalled for each subband
            0b0000_0010 => QuantizationStyle::ScalarExpounded { guard },
            _ => QuantizationStyle::Reserved { value: byte },
        }
    }

    fn value_size(&self) -> Option<u16> {
        match self {
            QuantizationStyle::No { .. } => Some(1),
            QuantizationStyle::ScalarDerived { .. } | QuantizationStyle::ScalarExpounded { .. } => {
                Some(2)
            }
            QuantizationStyle::Reserved { .. } => None,
        }
    }
}

impl fmt::Display for QuantizationStyle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::No { guard } => write!(f, "no quantization, {} guard bits", guard),
            Self::ScalarDerived { guard } => {
                write!(f, "scalar implicit, {} guard bits", guard)
            }
            Self::ScalarExpounded { guard } => {
                write!(f, "scalar explicit, {} guard bits", guard)
            }
            Self::Reserved { value } => write!(f, "{} (invalid)", value),
        }
    }
}

#[derive(Debug)]
enum QuantizationValue {
    Reversible { value: u8 },
    Irreversible { value: [u8; 2] },
}

impl QuantizationValue {
    fn exponent(&self) -> u8 {
        match &self {
            QuantizationValue::Reversible { value } => value >> 3,
            QuantizationValue::Irreversible { value } => value[0] >> 3,
        }
    }

    // Irreversible values only; the 5 most significant bits are the exponent.
    fn mantissa(&self) -> Option<u16> {
        match &self {
            QuantizationValue::Reversible { .. } => None,
            QuantizationValue::Irreversible { value } => {
                Some(u16::from_be_bytes([value[0] & 0b0000_0111, value[1]]))
            }
        }
    }
}

// A.6.4
//
// Quantization default (QCD)
//
// Function: Describes the quantization default used for compressing all
// components not defined by a QCC marker segment.
#[derive(Debug, Default)]
pub struct QuantizationDefaultMarkerSegment {
    offset: u64,

    // Length of marker segment in bytes (not including the marker).
    length: u16,

    // Sqcd: Quantization style for all components
    quantization_style: [u8; 1],

    // SPqcd^i: Quantization step size value for the ith subband in the defined
    // order.
    values: Vec<QuantizationValue>,
}

impl QuantizationDefaultMarkerSegment {
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn quantization_style(&self) -> QuantizationStyle {
        QuantizationStyle::new(self.quantization_style[0])
    }

    pub fn quantization_exponents(&self) -> Vec<u8> {
        self.values.iter().map(|e| e.exponent()).collect()
    }

    pub fn quantization_mantissas(&self) -> Vec<u16> {
        self.values.iter().filter_map(|e| e.mantissa()).collect()
    }
}

impl fmt::Display for QuantizationDefaultMarkerSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "QCD marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Quantization style:  {}", self.quantization_style())?;
        write!(
            f,
            "    Step size:  {:?}",
            self.quantization_exponents()
        )
    }
}

// A.6.5
//
// Quantization component (QCC)
#[derive(Debug, Default)]
pub struct QuantizationComponentSegment {
    offset: u64,

    // Lqcc
    length: u16,

    // Cqcc
    component_index: u16,

    // Sqcc
    quantization_style: [u8; 1],

    // SPqcc^i
    values: Vec<QuantizationValue>,
}

impl QuantizationComponentSegment {
    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn component_index(&self) -> u16 {
        self.component_index
    }

    pub fn quantization_style(&self) -> QuantizationStyle {
        QuantizationStyle::new(self.quantization_style[0])
    }

    pub fn quantization_exponents(&self) -> Vec<u8> {
        self.values.iter().map(|e| e.exponent()).collect()
    }
}

impl fmt::Display for QuantizationComponentSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "QCC marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Associated Component:  {}", self.component_index)?;
        write!(f, "    Quantization style:  {}", self.quantization_style())
    }
}

// A.6.6
//
// Progression order change (POC)
#[derive(Debug, Default)]
pub struct ProgressionOrderChangeSegment {
    offset: u64,
    length: u16,

    progressions: Vec<ProgressionOrderChange>,
}

impl ProgressionOrderChangeSegment {
    pub fn progressions(&self) -> &Vec<ProgressionOrderChange> {
        &self.progressions
    }
}

#[derive(Debug, Default)]
pub struct ProgressionOrderChange {
    // RSpoc: Resolution level index (inclusive) for the start of a progression.
    resolution_level_index_start: u8,

    // CSpoc: Component index (inclusive) for the start of a progression.
    component_index_start: u16,

    // LYEpoc: Layer index (exclusive) for the end of a progression.
    layer_index_end: u16,

    // REpoc: Resolution Level index (exclusive) for the end of a progression.
    resolution_level_index_end: u8,

    // CEpoc: Component index (exclusive) for the end of a progression.
    component_index_end: u16,

    // Ppoc: Progression order.
    progression_order: u8,
}

impl ProgressionOrderChange {
    pub fn resolution_level_index_start(&self) -> u8 {
        self.resolution_level_index_start
    }

    pub fn component_index_start(&self) -> u16 {
        self.component_index_start
    }

    pub fn layer_index_end(&self) -> u16 {
        self.layer_index_end
    }

    pub fn resolution_level_index_end(&self) -> u8 {
        self.resolution_level_index_end
    }

    pub fn component_index_end(&self) -> u16 {
        self.component_index_end
    }

    pub fn progression_order(&self) -> ProgressionOrder {
        ProgressionOrder::new(self.progression_order)
    }
}

// A.7.1
//
// Tile-part lengths (TLM)
//
// Function: Describes the length of every tile-part in the codestream, measured
// from the first byte of the SOT marker segment to the end of the tile-part.
#[derive(Debug, Default)]
pub struct TilePartLengthsSegment {
    offset: u64,
    length: u16,

    // Ztlm
    index: u8,

    // Ttlm^i, absent when Stlm signals no tile indices
    tile_indices: Vec<u16>,

    // Ptlm^i
    tile_part_lengths: Vec<u32>,
}

impl TilePartLengthsSegment {
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn tile_indices(&self) -> &Vec<u16> {
        &self.tile_indices
    }

    pub fn tile_part_lengths(&self) -> &Vec<u32> {
        &self.tile_part_lengths
    }
}

// A.7.2 and A.7.3
//
// Packet length, main header (PLM) and tile-part header (PLT).
//
// Packet lengths are coded as 7 bit groups, most significant group first,
// with the high bit set on every byte except the last of each length.
#[derive(Debug, Default)]
pub struct PacketLengthSegment {
    offset: u64,
    length: u16,

    // Zplm / Zplt
    index: u8,

    // One list per tile-part for PLM, a single list for PLT.
    packet_lengths: Vec<Vec<u32>>,
}

impl PacketLengthSegment {
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn packet_lengths(&self) -> &Vec<Vec<u32>> {
        &self.packet_lengths
    }
}

fn decode_packet_lengths(data: &[u8]) -> Vec<u32> {
    let mut lengths = vec![];
    let mut value: u32 = 0;
    for byte in data {
        value = (value << 7) | (byte & 0b0111_1111) as u32;
        if byte & 0b1000_0000 == 0 {
            lengths.push(value);
            value = 0;
        }
    }
    lengths
}

// A.7.4 and A.7.5
//
// Packed packet headers, main header (PPM) and tile-part header (PPT). The
// packet headers themselves are kept as raw bytes.
#[derive(Debug, Default)]
pub struct PackedPacketHeaderSegment {
    offset: u64,
    length: u16,

    // Zppm / Zppt
    index: u8,

    data: Vec<u8>,
}

impl PackedPacketHeaderSegment {
    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

// A.9.1
//
// Component registration (CRG)
//
// Offsets are in units of 1/65536 of the component separation.
#[derive(Debug, Default)]
pub struct ComponentRegistrationSegment {
    offset: u64,
    length: u16,

    // (Xcrg^i, Ycrg^i)
    offsets: Vec<(u16, u16)>,
}

impl ComponentRegistrationSegment {
    pub fn offsets(&self) -> &Vec<(u16, u16)> {
        &self.offsets
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommentRegistrationValue {
    // General use (binary values)
    Binary,

    // General use (ISO 8859-15:1999 (Latin) values)
    Latin,

    // All other values reserved
    Reserved { value: u16 },
}

impl CommentRegistrationValue {
    fn new(value: [u8; 2]) -> CommentRegistrationValue {
        match u16::from_be_bytes(value) {
            // See ISO/IEC 15444-1:2019 Table A.44
            0 => CommentRegistrationValue::Binary,
            1 => CommentRegistrationValue::Latin,
            value => CommentRegistrationValue::Reserved { value },
        }
    }
}

// A.9.2
//
// Comment (COM)
//
// Allows unstructured data in the main and tile-part header.
#[derive(Debug, Default)]
pub struct CommentMarkerSegment {
    offset: u64,
    length: u16,

    // Rcom: Registration value of the marker segment
    registration_value: [u8; 2],

    // Ccom^i: Byte of unstructured data
    comment: Vec<u8>,
}

impl CommentMarkerSegment {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn registration_value(&self) -> CommentRegistrationValue {
        CommentRegistrationValue::new(self.registration_value)
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn comment_utf8(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.comment)
    }

    /// Latin-1 comment text, `None` for binary comments.
    pub fn comment_latin(&self) -> Option<String> {
        match self.registration_value() {
            CommentRegistrationValue::Latin => {
                Some(self.comment.iter().map(|byte| *byte as char).collect())
            }
            _ => None,
        }
    }
}

impl fmt::Display for CommentMarkerSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "CME marker segment @ ({}, {})", self.offset, self.length)?;
        match self.comment_latin() {
            Some(text) => write!(f, "    \"{}\"", text),
            None => write!(
                f,
                "    binary data (rcme = {:?}): {} bytes",
                self.registration_value(),
                self.comment.len()
            ),
        }
    }
}

// A.4.2
//
// Start of tile-part (SOT)
//
// Function: Marks the beginning of a tile-part, the index of its tile, and the
// index of its tile-part. Tile-parts of a given tile appear in TPsot order but
// may be interleaved with tile-parts of other tiles.
#[derive(Debug, Default)]
pub struct StartOfTileSegment {
    offset: u64,
    length: u16,

    // Isot: Tile index, raster order from 0.
    tile_index: [u8; 2],

    // Psot: Length, in bytes, from the beginning of the first byte of this SOT
    // marker segment of the tile-part to the end of the data of that tile-part.
    //
    // Only the last tile-part in the codestream may contain a 0 for Psot, in
    // which case it runs to the EOC marker.
    tile_length: [u8; 4],

    // TPsot: Tile-part index.
    tile_part_index: [u8; 1],

    // TNsot: Number of tile-parts of a tile in the codestream, 0 if not
    // specified in this tile-part.
    no_tile_parts: [u8; 1],
}

impl StartOfTileSegment {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u16 {
        self.length
    }

    pub fn tile_index(&self) -> u16 {
        u16::from_be_bytes(self.tile_index)
    }

    pub fn tile_length(&self) -> u32 {
        u32::from_be_bytes(self.tile_length)
    }

    pub fn tile_part_index(&self) -> u8 {
        self.tile_part_index[0]
    }

    pub fn no_tile_parts(&self) -> u8 {
        self.no_tile_parts[0]
    }
}

impl fmt::Display for StartOfTileSegment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "SOT marker segment @ ({}, {})", self.offset, self.length)?;
        writeln!(f, "    Tile part index:  {}", self.tile_index())?;
        writeln!(f, "    Tile part length:  {}", self.tile_length())?;
        writeln!(f, "    Tile part instance:  {}", self.tile_part_index())?;
        write!(
            f,
            "    Number of tile parts:  {}",
            self.no_tile_parts()
        )
    }
}

#[derive(Debug, Default)]
pub struct Header {
    // SIZ (Required)
    image_and_tile_size_marker_segment: ImageAndTileSizeMarkerSegment,

    // COD (Required)
    coding_style_marker_segment: Option<CodingStyleMarkerSegment>,

    // COC (Optional)
    coding_style_component_segment: Vec<CodingStyleComponentSegment>,

    // QCD (Required)
    quantization_default_marker_segment: Option<QuantizationDefaultMarkerSegment>,

    // QCC (Optional)
    quantization_component_segments: Vec<QuantizationComponentSegment>,

    // RGN (Optional)
    regions: Vec<RegionOfInterestSegment>,

    // POC (Optional)
    progression_order_change: Option<ProgressionOrderChangeSegment>,

    // PPM (Optional)
    packed_packet_headers: Vec<PackedPacketHeaderSegment>,

    // TLM (Optional)
    tile_part_lengths: Vec<TilePartLengthsSegment>,

    // PLM (Optional)
    packet_lengths: Vec<PacketLengthSegment>,

    // CRG (Optional)
    component_registration: Option<ComponentRegistrationSegment>,

    // COM (Optional, repeatable)
    comment_marker_segments: Vec<CommentMarkerSegment>,
}

impl Header {
    pub fn image_and_tile_size_marker_segment(&self) -> &ImageAndTileSizeMarkerSegment {
        &self.image_and_tile_size_marker_segment
    }

    pub fn coding_style_marker_segment(&self) -> Option<&CodingStyleMarkerSegment> {
        self.coding_style_marker_segment.as_ref()
    }

    /// Coding style component (COC) segments
    ///
    /// If present, the values in these segments override the COD coding style
    /// for a specific component.
    pub fn coding_style_component_segment(&self) -> &Vec<CodingStyleComponentSegment> {
        &self.coding_style_component_segment
    }

    pub fn quantization_default_marker_segment(&self) -> Option<&QuantizationDefaultMarkerSegment> {
        self.quantization_default_marker_segment.as_ref()
    }

    pub fn quantization_component_segments(&self) -> &Vec<QuantizationComponentSegment> {
        &self.quantization_component_segments
    }

    /// Region of interest (RGN) segments
    pub fn region_of_interest_segments(&self) -> &Vec<RegionOfInterestSegment> {
        &self.regions
    }

    pub fn progression_order_change_segment(&self) -> Option<&ProgressionOrderChangeSegment> {
        self.progression_order_change.as_ref()
    }

    pub fn tile_part_lengths_segments(&self) -> &Vec<TilePartLengthsSegment> {
        &self.tile_part_lengths
    }

    pub fn packet_lengths_segments(&self) -> &Vec<PacketLengthSegment> {
        &self.packet_lengths
    }

    pub fn packed_packet_headers_segments(&self) -> &Vec<PackedPacketHeaderSegment> {
        &self.packed_packet_headers
    }

    pub fn component_registration_segment(&self) -> Option<&ComponentRegistrationSegment> {
        self.component_registration.as_ref()
    }

    pub fn comment_marker_segments(&self) -> &Vec<CommentMarkerSegment> {
        &self.comment_marker_segments
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.image_and_tile_size_marker_segment)?;
        if let Some(cod) = &self.coding_style_marker_segment {
            write!(f, "\n{}", cod)?;
        }
        for coc in &self.coding_style_component_segment {
            write!(f, "\n{}", coc)?;
        }
        if let Some(qcd) = &self.quantization_default_marker_segment {
            write!(f, "\n{}", qcd)?;
        }
        for qcc in &self.quantization_component_segments {
            write!(f, "\n{}", qcc)?;
        }
        for rgn in &self.regions {
            write!(f, "\n{}", rgn)?;
        }
        for com in &self.comment_marker_segments {
            write!(f, "\n{}", com)?;
        }
        Ok(())
    }
}

// A.4 – Tile-part header, the markers allowed between SOT and SOD.
#[derive(Debug, Default)]
pub struct TilePartHeader {
    coding_style_marker_segment: Option<CodingStyleMarkerSegment>,
    coding_style_component_segment: Vec<CodingStyleComponentSegment>,
    quantization_default_marker_segment: Option<QuantizationDefaultMarkerSegment>,
    quantization_component_segments: Vec<QuantizationComponentSegment>,
    regions: Vec<RegionOfInterestSegment>,
    progression_order_change: Option<ProgressionOrderChangeSegment>,
    packed_packet_headers: Vec<PackedPacketHeaderSegment>,
    packet_lengths: Vec<PacketLengthSegment>,
    comment_marker_segments: Vec<CommentMarkerSegment>,
}

impl TilePartHeader {
    pub fn coding_style_marker_segment(&self) -> Option<&CodingStyleMarkerSegment> {
        self.coding_style_marker_segment.as_ref()
    }

    pub fn coding_style_component_segment(&self) -> &Vec<CodingStyleComponentSegment> {
        &self.coding_style_component_segment
    }

    pub fn quantization_default_marker_segment(&self) -> Option<&QuantizationDefaultMarkerSegment> {
        self.quantization_default_marker_segment.as_ref()
    }

    pub fn quantization_component_segments(&self) -> &Vec<QuantizationComponentSegment> {
        &self.quantization_component_segments
    }

    pub fn region_of_interest_segments(&self) -> &Vec<RegionOfInterestSegment> {
        &self.regions
    }

    pub fn progression_order_change_segment(&self) -> Option<&ProgressionOrderChangeSegment> {
        self.progression_order_change.as_ref()
    }

    pub fn packed_packet_headers_segments(&self) -> &Vec<PackedPacketHeaderSegment> {
        &self.packed_packet_headers
    }

    pub fn packet_lengths_segments(&self) -> &Vec<PacketLengthSegment> {
        &self.packet_lengths
    }

    pub fn comment_marker_segments(&self) -> &Vec<CommentMarkerSegment> {
        &self.comment_marker_segments
    }
}

/// A located tile-part: its SOT segment, its header and where its
/// compressed data lies in the stream.
#[derive(Debug, Default)]
pub struct TilePart {
    start_of_tile_segment: StartOfTileSegment,
    header: TilePartHeader,
    data_offset: u64,
    data_length: u64,
}

impl TilePart {
    pub fn start_of_tile_segment(&self) -> &StartOfTileSegment {
        &self.start_of_tile_segment
    }

    pub fn header(&self) -> &TilePartHeader {
        &self.header
    }

    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    pub fn data_length(&self) -> u64 {
        self.data_length
    }
}

// Contiguous Codestream
//
// The codestream is a linear stream of bytes: a main header, one or more
// tile-parts each made of a tile-part header and its data, then EOC.
#[derive(Debug, Default)]
pub struct ContiguousCodestream {
    offset: u64,
    length: u64,
    header: Header,
    tile_parts: Vec<TilePart>,
    warnings: Vec<String>,
}

// Where a marker segment found in the header loop belongs.
enum HeaderKind {
    Main,
    TilePart,
}

impl ContiguousCodestream {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tile_parts(&self) -> &Vec<TilePart> {
        &self.tile_parts
    }

    /// Byte offset of the SOC marker.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of bytes consumed, up to the first SOT when only the main
    /// header was decoded, up to and including EOC otherwise.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Unrecognized or out of place markers that were skipped while decoding.
    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn decode_marker<R: io::Read>(&mut self, reader: &mut R) -> Result<MarkerSymbol, io::Error> {
        let mut marker: MarkerSymbol = [0; 2];
        reader.read_exact(&mut marker)?;
        Ok(marker)
    }

    // Length of marker segment in bytes (not including the marker).
    fn decode_length<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
    ) -> Result<u16, Box<dyn error::Error>> {
        let mut length: [u8; 2] = [0; 2];
        reader.read_exact(&mut length)?;
        let length = u16::from_be_bytes(length);
        if length < 2 {
            return Err(CodestreamError::MarkerError {
                marker,
                error: format!("segment length {} is smaller than its length field", length),
            }
            .into());
        }
        Ok(length)
    }

    // Moves to the end of a segment whose declared length is longer than its
    // decoded fields.
    fn finish_segment<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
        offset: u64,
        length: u16,
    ) -> Result<(), Box<dyn error::Error>> {
        let end = offset + 2 + length as u64;
        let position = reader.stream_position()?;
        if position > end {
            return Err(CodestreamError::MarkerError {
                marker,
                error: format!(
                    "segment at byte offset {} overruns its length {}",
                    offset, length
                ),
            }
            .into());
        }
        if position < end {
            reader.seek(io::SeekFrom::Start(end))?;
        }
        Ok(())
    }

    // Either 8 or 16 bits depending on Csiz value.
    fn decode_component_index<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<u16, Box<dyn error::Error>> {
        if self.header.image_and_tile_size_marker_segment.no_components() < 257 {
            let mut buffer: [u8; 1] = [0; 1];
            reader.read_exact(&mut buffer)?;
            Ok(buffer[0] as u16)
        } else {
            let mut buffer: [u8; 2] = [0; 2];
            reader.read_exact(&mut buffer)?;
            Ok(u16::from_be_bytes(buffer))
        }
    }

    fn component_index_size(&self) -> u16 {
        if self.header.image_and_tile_size_marker_segment.no_components() < 257 {
            1
        } else {
            2
        }
    }

    fn decode_siz<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<ImageAndTileSizeMarkerSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("SIZ start at byte offset {}", offset);
        let mut segment = ImageAndTileSizeMarkerSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_SIZ)?,
            ..Default::default()
        };

        reader.read_exact(&mut segment.decoder_capabilities)?;
        reader.read_exact(&mut segment.reference_grid_width)?;
        reader.read_exact(&mut segment.reference_grid_height)?;
        reader.read_exact(&mut segment.image_horizontal_offset)?;
        reader.read_exact(&mut segment.image_vertical_offset)?;
        reader.read_exact(&mut segment.reference_tile_width)?;
        reader.read_exact(&mut segment.reference_tile_height)?;
        reader.read_exact(&mut segment.tile_horizontal_offset)?;
        reader.read_exact(&mut segment.tile_vertical_offset)?;
        reader.read_exact(&mut segment.no_components)?;

        let no_components = segment.no_components() as usize;
        if segment.length as usize != 38 + 3 * no_components {
            return Err(CodestreamError::MarkerError {
                marker: MARKER_SYMBOL_SIZ,
                error: format!(
                    "length {} does not match {} components",
                    segment.length, no_components
                ),
            }
            .into());
        }

        let mut components = vec![0u8; 3 * no_components];
        reader.read_exact(&mut components)?;
        for component in components.chunks_exact(3) {
            segment.precision.push(component[0]);
            segment.horizontal_separation.push(component[1]);
            segment.vertical_separation.push(component[2]);
        }

        // The tile grid offsets (XTOsiz, YTOsiz) are constrained to be no
        // greater than the image area offsets.
        // 0 ≤ XTOsiz ≤ XOsiz
        // 0 ≤ YTOsiz ≤ YOsiz
        if segment.tile_horizontal_offset() > segment.image_horizontal_offset()
            || segment.tile_vertical_offset() > segment.image_vertical_offset()
        {
            return Err(CodestreamError::TileGridOffsetOverflow {
                tile_horizontal_offset: segment.tile_horizontal_offset(),
                image_horizontal_offset: segment.image_horizontal_offset(),
                tile_vertical_offset: segment.tile_vertical_offset(),
                image_vertical_offset: segment.image_vertical_offset(),
            }
            .into());
        }

        // The first tile must contain at least one reference grid point from
        // the image area.
        // XTsiz + XTOsiz > XOsiz
        // YTsiz + YTOsiz > YOsiz
        if (segment.reference_tile_width() as u64 + segment.tile_horizontal_offset() as u64)
            <= segment.image_horizontal_offset() as u64
            || (segment.reference_tile_height() as u64 + segment.tile_vertical_offset() as u64)
                <= segment.image_vertical_offset() as u64
        {
            return Err(CodestreamError::TileSizeOverflow {
                reference_tile_width: segment.reference_tile_width(),
                tile_horizontal_offset: segment.tile_horizontal_offset(),
                image_horizontal_offset: segment.image_horizontal_offset(),
                reference_tile_height: segment.reference_tile_height(),
                tile_vertical_offset: segment.tile_vertical_offset(),
                image_vertical_offset: segment.image_vertical_offset(),
            }
            .into());
        }
        debug!("SIZ {:?}", segment);
        info!("SIZ end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_coding_style_parameters<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        coding_style: u8,
        coding_style_parameters: &mut CodingStyleParameters,
    ) -> Result<(), Box<dyn error::Error>> {
        coding_style_parameters.coding_style = coding_style;

        reader.read_exact(&mut coding_style_parameters.no_decomposition_levels)?;
        reader.read_exact(&mut coding_style_parameters.code_block_width)?;
        reader.read_exact(&mut coding_style_parameters.code_block_height)?;
        reader.read_exact(&mut coding_style_parameters.code_block_style)?;
        reader.read_exact(&mut coding_style_parameters.transformation)?;

        if coding_style_parameters.has_defined_precinct_size() {
            // The first parameter corresponds to the N_L LL sub-band, each
            // successive parameter to the next resolution level.
            coding_style_parameters.precinct_size =
                vec![0; coding_style_parameters.no_resolutions() as usize];
            reader.read_exact(&mut coding_style_parameters.precinct_size)?;
        }

        Ok(())
    }

    // A.6.1 - Coding style default (COD)
    fn decode_cod<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<CodingStyleMarkerSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("COD start at byte offset {}", offset);
        let mut segment = CodingStyleMarkerSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_COD)?,
            ..Default::default()
        };

        reader.read_exact(&mut segment.coding_style)?;
        reader.read_exact(&mut segment.progression_order)?;
        reader.read_exact(&mut segment.no_layers)?;
        reader.read_exact(&mut segment.multiple_component_transformation)?;

        self.decode_coding_style_parameters(
            reader,
            segment.coding_style[0],
            &mut segment.coding_style_parameters,
        )?;
        self.finish_segment(reader, MARKER_SYMBOL_COD, offset, segment.length)?;
        debug!("COD {:?}", segment);
        info!("COD end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_coc<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<CodingStyleComponentSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("COC start at byte offset {}", offset);
        let mut segment = CodingStyleComponentSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_COC)?,
            ..Default::default()
        };

        segment.index = self.decode_component_index(reader)?;
        reader.read_exact(&mut segment.coding_style)?;

        self.decode_coding_style_parameters(
            reader,
            segment.coding_style[0],
            &mut segment.coding_style_parameters,
        )?;
        self.finish_segment(reader, MARKER_SYMBOL_COC, offset, segment.length)?;
        info!("COC end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_rgn<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<RegionOfInterestSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("RGN start at byte offset {}", offset);
        let mut segment = RegionOfInterestSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_RGN)?,
            ..Default::default()
        };

        segment.component_index = self.decode_component_index(reader)?;
        reader.read_exact(&mut segment.region_of_interest_style)?;
        reader.read_exact(&mut segment.region_of_interest_style_parameter)?;
        self.finish_segment(reader, MARKER_SYMBOL_RGN, offset, segment.length)?;
        info!("RGN end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    // Step sizes fill the rest of the segment, one or two bytes each.
    fn decode_quantization_values<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        quantization_style: QuantizationStyle,
        remaining: u16,
    ) -> Result<Vec<QuantizationValue>, Box<dyn error::Error>> {
        let value_size = match quantization_style.value_size() {
            Some(value_size) => value_size,
            None => {
                self.warn(format!(
                    "quantization style {} is reserved, step sizes skipped",
                    quantization_style
                ));
                return Ok(vec![]);
            }
        };

        let no_values = remaining / value_size;
        let mut quantization_values = Vec::with_capacity(no_values as usize);
        for _ in 0..no_values {
            if value_size == 1 {
                let mut value: [u8; 1] = [0; 1];
                reader.read_exact(&mut value)?;
                quantization_values.push(QuantizationValue::Reversible { value: value[0] });
            } else {
                let mut value: [u8; 2] = [0; 2];
                reader.read_exact(&mut value)?;
                quantization_values.push(QuantizationValue::Irreversible { value });
            }
        }

        Ok(quantization_values)
    }

    fn decode_qcd<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<QuantizationDefaultMarkerSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("QCD start at byte offset {}", offset);
        let mut segment = QuantizationDefaultMarkerSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_QCD)?,
            ..Default::default()
        };

        reader.read_exact(&mut segment.quantization_style)?;

        // Lqcd and Sqcd
        let remaining = segment.length.saturating_sub(3);
        segment.values =
            self.decode_quantization_values(reader, segment.quantization_style(), remaining)?;
        self.finish_segment(reader, MARKER_SYMBOL_QCD, offset, segment.length)?;
        info!("QCD end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_qcc<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<QuantizationComponentSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("QCC start at byte offset {}", offset);
        let mut segment = QuantizationComponentSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_QCC)?,
            ..Default::default()
        };

        segment.component_index = self.decode_component_index(reader)?;
        reader.read_exact(&mut segment.quantization_style)?;

        // Lqcc, Cqcc and Sqcc
        let remaining = segment
            .length
            .saturating_sub(3 + self.component_index_size());
        segment.values =
            self.decode_quantization_values(reader, segment.quantization_style(), remaining)?;
        self.finish_segment(reader, MARKER_SYMBOL_QCC, offset, segment.length)?;
        info!("QCC end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_poc<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<ProgressionOrderChangeSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("POC start at byte offset {}", offset);
        let mut segment = ProgressionOrderChangeSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_POC)?,
            ..Default::default()
        };

        // The number of progression changes is derived from the segment length.
        let entry_size = 5 + 2 * self.component_index_size();
        let no_progression_order_change = (segment.length - 2) / entry_size;

        for _ in 0..no_progression_order_change {
            let mut byte: [u8; 1] = [0; 1];
            let mut word: [u8; 2] = [0; 2];
            let mut progression = ProgressionOrderChange::default();

            reader.read_exact(&mut byte)?;
            progression.resolution_level_index_start = byte[0];
            progression.component_index_start = self.decode_component_index(reader)?;
            reader.read_exact(&mut word)?;
            progression.layer_index_end = u16::from_be_bytes(word);
            reader.read_exact(&mut byte)?;
            progression.resolution_level_index_end = byte[0];
            progression.component_index_end = self.decode_component_index(reader)?;
            reader.read_exact(&mut byte)?;
            progression.progression_order = byte[0];

            segment.progressions.push(progression);
        }
        self.finish_segment(reader, MARKER_SYMBOL_POC, offset, segment.length)?;
        info!("POC end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_tlm<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<TilePartLengthsSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("TLM start at byte offset {}", offset);
        let mut segment = TilePartLengthsSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_TLM)?,
            ..Default::default()
        };

        let mut buffer: [u8; 2] = [0; 2];
        reader.read_exact(&mut buffer)?;
        segment.index = buffer[0];

        // Stlm: ST in bits 4 and 5, SP in bit 6
        let tile_index_size: u16 = match (buffer[1] >> 4) & 0b11 {
            0 => 0,
            1 => 1,
            2 => 2,
            value => {
                return Err(CodestreamError::MarkerError {
                    marker: MARKER_SYMBOL_TLM,
                    error: format!("reserved tile index size {}", value),
                }
                .into())
            }
        };
        let tile_length_size: u16 = if (buffer[1] >> 6) & 1 == 1 { 4 } else { 2 };

        let no_tile_part_lengths =
            segment.length.saturating_sub(4) / (tile_index_size + tile_length_size);
        for _ in 0..no_tile_part_lengths {
            match tile_index_size {
                1 => {
                    let mut value: [u8; 1] = [0; 1];
                    reader.read_exact(&mut value)?;
                    segment.tile_indices.push(value[0] as u16);
                }
                2 => {
                    let mut value: [u8; 2] = [0; 2];
                    reader.read_exact(&mut value)?;
                    segment.tile_indices.push(u16::from_be_bytes(value));
                }
                _ => {}
            }

            if tile_length_size == 4 {
                let mut value: [u8; 4] = [0; 4];
                reader.read_exact(&mut value)?;
                segment.tile_part_lengths.push(u32::from_be_bytes(value));
            } else {
                let mut value: [u8; 2] = [0; 2];
                reader.read_exact(&mut value)?;
                segment
                    .tile_part_lengths
                    .push(u16::from_be_bytes(value) as u32);
            }
        }

        self.finish_segment(reader, MARKER_SYMBOL_TLM, offset, segment.length)?;
        info!("TLM end at byte offset {}", reader.stream_position()?);
        Ok(segment)
    }

    // PLM carries (Nplm, Iplm) pairs per tile-part, PLT a single Iplt run.
    fn decode_packet_length_segment<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
    ) -> Result<PacketLengthSegment, Box<dyn error::Error>> {
        let name = if marker == MARKER_SYMBOL_PLM { "PLM" } else { "PLT" };
        let offset = reader.stream_position()? - 2;
        info!("{} start at byte offset {}", name, offset);
        let mut segment = PacketLengthSegment {
            offset,
            length: self.decode_length(reader, marker)?,
            ..Default::default()
        };

        let mut data = vec![0u8; segment.length.saturating_sub(2) as usize];
        reader.read_exact(&mut data)?;

        if let Some((index, rest)) = data.split_first() {
            segment.index = *index;

            if marker == MARKER_SYMBOL_PLM {
                let mut rest = rest;
                while let Some((no_bytes, tail)) = rest.split_first() {
                    let no_bytes = (*no_bytes as usize).min(tail.len());
                    segment
                        .packet_lengths
                        .push(decode_packet_lengths(&tail[..no_bytes]));
                    rest = &tail[no_bytes..];
                }
            } else {
                segment.packet_lengths.push(decode_packet_lengths(rest));
            }
        }

        info!("{} end at byte offset {}", name, reader.stream_position()?);
        Ok(segment)
    }

    fn decode_packed_packet_header_segment<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
    ) -> Result<PackedPacketHeaderSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("packed packet headers start at byte offset {}", offset);
        let length = self.decode_length(reader, marker)?;
        let mut data = vec![0u8; length.saturating_sub(2) as usize];
        reader.read_exact(&mut data)?;

        let (index, data) = match data.split_first() {
            Some((index, rest)) => (*index, rest.to_vec()),
            None => (0, vec![]),
        };
        info!(
            "packed packet headers end at byte offset {}",
            reader.stream_position()?
        );

        Ok(PackedPacketHeaderSegment {
            offset,
            length,
            index,
            data,
        })
    }

    fn decode_crg<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<ComponentRegistrationSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("CRG start at byte offset {}", offset);
        let mut segment = ComponentRegistrationSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_CRG)?,
            ..Default::default()
        };

        let no_components = self.header.image_and_tile_size_marker_segment.no_components();
        for _ in 0..no_components {
            let mut value: [u8; 4] = [0; 4];
            reader.read_exact(&mut value)?;
            segment.offsets.push((
                u16::from_be_bytes([value[0], value[1]]),
                u16::from_be_bytes([value[2], value[3]]),
            ));
        }
        self.finish_segment(reader, MARKER_SYMBOL_CRG, offset, segment.length)?;
        info!("CRG end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_com<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<CommentMarkerSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("COM start at byte offset {}", offset);
        let mut segment = CommentMarkerSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_COM)?,
            ..Default::default()
        };

        // Lcme counts itself and Rcme
        if segment.length < 4 {
            return Err(CodestreamError::MarkerError {
                marker: MARKER_SYMBOL_COM,
                error: format!("segment length {} leaves no room for Rcme", segment.length),
            }
            .into());
        }

        reader.read_exact(&mut segment.registration_value)?;
        segment.comment = vec![0; segment.length as usize - 4];
        reader.read_exact(&mut segment.comment)?;
        self.finish_segment(reader, MARKER_SYMBOL_COM, offset, segment.length)?;
        info!("COM end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn decode_sot<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<StartOfTileSegment, Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        info!("SOT start at byte offset {}", offset);
        let mut segment = StartOfTileSegment {
            offset,
            length: self.decode_length(reader, MARKER_SYMBOL_SOT)?,
            ..Default::default()
        };

        reader.read_exact(&mut segment.tile_index)?;
        reader.read_exact(&mut segment.tile_length)?;
        reader.read_exact(&mut segment.tile_part_index)?;
        reader.read_exact(&mut segment.no_tile_parts)?;
        self.finish_segment(reader, MARKER_SYMBOL_SOT, offset, segment.length)?;
        info!("SOT end at byte offset {}", reader.stream_position()?);

        Ok(segment)
    }

    fn skip_segment<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
    ) -> Result<(), Box<dyn error::Error>> {
        let offset = reader.stream_position()? - 2;
        if marker[0] != 0xFF {
            return Err(CodestreamError::MarkerUnexpected { marker, offset }.into());
        }

        if is_marker_only(marker) {
            self.warn(format!(
                "unrecognized marker 0x{:02X}{:02X} at byte offset {} skipped",
                marker[0], marker[1], offset
            ));
            return Ok(());
        }

        let length = self.decode_length(reader, marker)?;
        reader.seek(io::SeekFrom::Start(offset + 2 + length as u64))?;
        self.warn(format!(
            "unrecognized marker segment 0x{:02X}{:02X} at byte offset {} with length {} skipped",
            marker[0], marker[1], offset, length
        ));
        Ok(())
    }

    // A.3 - Construction of the main header
    fn decode_main_header<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<(), Box<dyn error::Error>> {
        // SOC (Required as the first marker)
        let marker = self.decode_marker(reader)?;
        if marker != MARKER_SYMBOL_SOC {
            return Err(CodestreamError::MarkerUnexpected {
                marker,
                offset: reader.stream_position()? - 2,
            }
            .into());
        }
        info!("SOC start at byte offset {}", reader.stream_position()? - 2);

        // SIZ (Required as the second marker segment)
        let marker = self.decode_marker(reader)?;
        if marker != MARKER_SYMBOL_SIZ {
            return Err(CodestreamError::MarkerUnexpected {
                marker,
                offset: reader.stream_position()? - 2,
            }
            .into());
        }
        self.header.image_and_tile_size_marker_segment = self.decode_siz(reader)?;

        loop {
            let marker = self.decode_marker(reader)?;
            match marker {
                // Start of the first tile-part or an empty codestream
                MARKER_SYMBOL_SOT | MARKER_SYMBOL_EOC => {
                    reader.seek(io::SeekFrom::Current(-2))?;
                    break;
                }
                MARKER_SYMBOL_PPM => {
                    let segment = self.decode_packed_packet_header_segment(reader, marker)?;
                    self.header.packed_packet_headers.push(segment);
                }
                MARKER_SYMBOL_TLM => {
                    let segment = self.decode_tlm(reader)?;
                    self.header.tile_part_lengths.push(segment);
                }
                MARKER_SYMBOL_PLM => {
                    let segment = self.decode_packet_length_segment(reader, marker)?;
                    self.header.packet_lengths.push(segment);
                }
                MARKER_SYMBOL_CRG => {
                    self.header.component_registration = Some(self.decode_crg(reader)?);
                }
                MARKER_SYMBOL_SOD | MARKER_SYMBOL_PPT | MARKER_SYMBOL_PLT | MARKER_SYMBOL_SIZ
                | MARKER_SYMBOL_SOC => {
                    return Err(CodestreamError::MarkerUnexpected {
                        marker,
                        offset: reader.stream_position()? - 2,
                    }
                    .into());
                }
                _ => {
                    self.decode_functional_segment(reader, marker, HeaderKind::Main)?;
                }
            }
        }

        // Required
        if self.header.coding_style_marker_segment.is_none() {
            return Err(CodestreamError::MarkerMissing {
                marker: MARKER_SYMBOL_COD,
            }
            .into());
        }
        if self.header.quantization_default_marker_segment.is_none() {
            return Err(CodestreamError::MarkerMissing {
                marker: MARKER_SYMBOL_QCD,
            }
            .into());
        }

        // A.6.2, A.6.3 and A.6.5: at most one COC, RGN and QCC per component
        let no_components = self.header.image_and_tile_size_marker_segment.no_components() as usize;
        for (marker, count) in [
            (MARKER_SYMBOL_COC, self.header.coding_style_component_segment.len()),
            (MARKER_SYMBOL_RGN, self.header.regions.len()),
            (MARKER_SYMBOL_QCC, self.header.quantization_component_segments.len()),
        ] {
            if count > no_components {
                return Err(CodestreamError::MarkerError {
                    marker,
                    error: format!(
                        "{} segments exceed the number of components {}",
                        count, no_components
                    ),
                }
                .into());
            }
        }

        Ok(())
    }

    // Segments shared by the main and tile-part headers. Anything else is
    // skipped by its declared length.
    fn decode_functional_segment<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        marker: MarkerSymbol,
        kind: HeaderKind,
    ) -> Result<Option<TilePartHeader>, Box<dyn error::Error>> {
        let mut tile_part_header = TilePartHeader::default();

        match marker {
            MARKER_SYMBOL_COD => {
                let segment = self.decode_cod(reader)?;
                match kind {
                    HeaderKind::Main => self.header.coding_style_marker_segment = Some(segment),
                    HeaderKind::TilePart => {
                        tile_part_header.coding_style_marker_segment = Some(segment)
                    }
                }
            }
            MARKER_SYMBOL_COC => {
                let segment = self.decode_coc(reader)?;
                match kind {
                    HeaderKind::Main => self.header.coding_style_component_segment.push(segment),
                    HeaderKind::TilePart => {
                        tile_part_header.coding_style_component_segment.push(segment)
                    }
                }
            }
            MARKER_SYMBOL_QCD => {
                let segment = self.decode_qcd(reader)?;
                match kind {
                    HeaderKind::Main => {
                        self.header.quantization_default_marker_segment = Some(segment)
                    }
                    HeaderKind::TilePart => {
                        tile_part_header.quantization_default_marker_segment = Some(segment)
                    }
                }
            }
            MARKER_SYMBOL_QCC => {
                let segment = self.decode_qcc(reader)?;
                match kind {
                    HeaderKind::Main => self.header.quantization_component_segments.push(segment),
                    HeaderKind::TilePart => {
                        tile_part_header.quantization_component_segments.push(segment)
                    }
                }
            }
            MARKER_SYMBOL_RGN => {
                let segment = self.decode_rgn(reader)?;
                match kind {
                    HeaderKind::Main => self.header.regions.push(segment),
                    HeaderKind::TilePart => tile_part_header.regions.push(segment),
                }
            }
            MARKER_SYMBOL_POC => {
                let segment = self.decode_poc(reader)?;
                match kind {
                    HeaderKind::Main => self.header.progression_order_change = Some(segment),
                    HeaderKind::TilePart => {
                        tile_part_header.progression_order_change = Some(segment)
                    }
                }
            }
            MARKER_SYMBOL_COM => {
                let segment = self.decode_com(reader)?;
                match kind {
                    HeaderKind::Main => self.header.comment_marker_segments.push(segment),
                    HeaderKind::TilePart => tile_part_header.comment_marker_segments.push(segment),
                }
            }
            _ => {
                self.skip_segment(reader, marker)?;
                return Ok(None);
            }
        }

        Ok(Some(tile_part_header))
    }

    // A.4 – Tile-part header, from the SOT marker up to and including SOD.
    fn decode_tile_part<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        end_of_stream: u64,
    ) -> Result<Option<TilePart>, Box<dyn error::Error>> {
        let mut tile_part = TilePart {
            start_of_tile_segment: self.decode_sot(reader)?,
            ..Default::default()
        };

        loop {
            let marker = self.decode_marker(reader)?;
            match marker {
                MARKER_SYMBOL_SOD => break,
                MARKER_SYMBOL_PPT => {
                    // PPT is disallowed when the main header carries PPM.
                    if !self.header.packed_packet_headers.is_empty() {
                        return Err(CodestreamError::MarkerUnexpected {
                            marker,
                            offset: reader.stream_position()? - 2,
                        }
                        .into());
                    }
                    let segment = self.decode_packed_packet_header_segment(reader, marker)?;
                    tile_part.header.packed_packet_headers.push(segment);
                }
                MARKER_SYMBOL_PLT => {
                    let segment = self.decode_packet_length_segment(reader, marker)?;
                    tile_part.header.packet_lengths.push(segment);
                }
                _ => {
                    if let Some(segment) =
                        self.decode_functional_segment(reader, marker, HeaderKind::TilePart)?
                    {
                        merge_tile_part_header(&mut tile_part.header, segment);
                    }
                }
            }
        }

        tile_part.data_offset = reader.stream_position()?;
        info!("SOD start at byte offset {}", tile_part.data_offset - 2);

        let sot = &tile_part.start_of_tile_segment;
        let end_of_tile_part = match sot.tile_length() {
            // Runs up to EOC
            0 => end_of_stream,
            tile_length => sot.offset() + tile_length as u64,
        };

        if end_of_tile_part < tile_part.data_offset {
            return Err(CodestreamError::MarkerError {
                marker: MARKER_SYMBOL_SOT,
                error: format!(
                    "tile-part length {} ends inside its own header",
                    sot.tile_length()
                ),
            }
            .into());
        }
        if end_of_tile_part > end_of_stream {
            self.warn(format!(
                "tile-part at byte offset {} runs past the end of the codestream",
                sot.offset()
            ));
            return Ok(None);
        }

        tile_part.data_length = end_of_tile_part - tile_part.data_offset;
        reader.seek(io::SeekFrom::Start(end_of_tile_part))?;
        info!("SOD end at byte offset {}", end_of_tile_part);

        Ok(Some(tile_part))
    }

    // Position of the EOC marker, or the end of the stream when it is missing.
    fn find_end_of_stream<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
    ) -> Result<u64, Box<dyn error::Error>> {
        let position = reader.stream_position()?;
        let end = reader.seek(io::SeekFrom::End(0))?;

        let mut end_of_stream = end;
        if end >= position + 2 {
            reader.seek(io::SeekFrom::Start(end - 2))?;
            if self.decode_marker(reader)? == MARKER_SYMBOL_EOC {
                end_of_stream = end - 2;
            }
        }

        reader.seek(io::SeekFrom::Start(position))?;
        Ok(end_of_stream)
    }

    fn decode<R: io::Read + io::Seek>(
        &mut self,
        reader: &mut R,
        header_only: bool,
    ) -> Result<(), Box<dyn error::Error>> {
        self.offset = reader.stream_position()?;

        // The main header is found at the beginning of the codestream
        self.decode_main_header(reader)?;

        if header_only {
            self.length = reader.stream_position()? - self.offset;
            return Ok(());
        }

        let end_of_stream = self.find_end_of_stream(reader)?;

        // The tile-part headers are found at the beginning of each tile-part
        loop {
            let marker = match self.decode_marker(reader) {
                Ok(marker) => marker,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    self.warn("codestream ends without an EOC marker".to_owned());
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            match marker {
                MARKER_SYMBOL_SOT => match self.decode_tile_part(reader, end_of_stream)? {
                    Some(tile_part) => self.tile_parts.push(tile_part),
                    None => break,
                },
                MARKER_SYMBOL_EOC => {
                    info!("EOC at byte offset {}", reader.stream_position()? - 2);
                    break;
                }
                _ => {
                    return Err(CodestreamError::MarkerUnexpected {
                        marker,
                        offset: reader.stream_position()? - 2,
                    }
                    .into());
                }
            }
        }

        self.length = reader.stream_position()? - self.offset;
        Ok(())
    }
}

fn merge_tile_part_header(header: &mut TilePartHeader, segment: TilePartHeader) {
    if segment.coding_style_marker_segment.is_some() {
        header.coding_style_marker_segment = segment.coding_style_marker_segment;
    }
    if segment.quantization_default_marker_segment.is_some() {
        header.quantization_default_marker_segment = segment.quantization_default_marker_segment;
    }
    if segment.progression_order_change.is_some() {
        header.progression_order_change = segment.progression_order_change;
    }
    header
        .coding_style_component_segment
        .extend(segment.coding_style_component_segment);
    header
        .quantization_component_segments
        .extend(segment.quantization_component_segments);
    header.regions.extend(segment.regions);
    header
        .comment_marker_segments
        .extend(segment.comment_marker_segments);
}

/// Decodes a codestream starting at the current position of `reader`.
///
/// With `header_only` decoding stops in front of the first SOT marker;
/// otherwise every tile-part is located up to the EOC marker.
pub fn decode_jpc<R: io::Read + io::Seek>(
    reader: &mut R,
    header_only: bool,
) -> Result<ContiguousCodestream, Box<dyn error::Error>> {
    let mut contiguous_codestream = ContiguousCodestream::default();
    contiguous_codestream.decode(reader, header_only)?;

    Ok(contiguous_codestream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progression_order_display() {
        assert_eq!(ProgressionOrder::new(2).to_string(), "RPCL");
        assert_eq!(ProgressionOrder::new(7).to_string(), "7 (invalid)");
    }

    #[test]
    fn coding_block_styles() {
        let styles = CodingBlockStyle::new(0b0010_0101);
        assert_eq!(styles.len(), 6);
        assert_eq!(styles[0], CodingBlockStyle::SelectiveArithmeticCodingBypass);
        assert_eq!(styles[1], CodingBlockStyle::NoResetOfContextProbabilities);
        assert_eq!(styles[2], CodingBlockStyle::TerminationOnEachCodingPass);
        assert_eq!(styles[5], CodingBlockStyle::SegmentationSymbolsAreUsed);
    }

    #[test]
    fn packet_lengths() {
        // 0x81 0x00 is 128, 0x05 is 5
        assert_eq!(decode_packet_lengths(&[0x81, 0x00, 0x05]), vec![128, 5]);
    }

    #[test]
    fn quantization_style_guard_bits() {
        assert_eq!(
            QuantizationStyle::new(0b0100_0010),
            QuantizationStyle::ScalarExpounded { guard: 2 }
        );
        assert_eq!(
            QuantizationStyle::new(0b0000_0011),
            QuantizationStyle::Reserved { value: 3 }
        );
    }
}
