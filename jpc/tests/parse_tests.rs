use std::io::Cursor;

use jpc::{
    decode_jpc, CodingBlockStyle, CommentRegistrationValue, MultipleComponentTransformation,
    ProgressionOrder, QuantizationStyle, RegionOfInterestStyle, TransformationFilter,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn segment(data: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    data.extend_from_slice(&[0xFF, marker]);
    data.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    data.extend_from_slice(payload);
}

// 128 x 64, three 8 bit components, a single tile. Returns the codestream and
// the byte offset of its first SOT marker.
fn codestream(progression_order: u8, tile_length: Option<u32>) -> (Vec<u8>, usize) {
    let mut data = vec![0xFF, 0x4F];

    let mut siz = vec![0, 0];
    for value in [128u32, 64, 0, 0, 128, 64, 0, 0].iter() {
        siz.extend_from_slice(&value.to_be_bytes());
    }
    siz.extend_from_slice(&3u16.to_be_bytes());
    for _ in 0..3 {
        siz.extend_from_slice(&[7, 1, 1]);
    }
    segment(&mut data, 0x51, &siz);

    // Scod, SGcod (order, layers, MCT), SPcod (levels, xcb, ycb, style, filter)
    segment(
        &mut data,
        0x52,
        &[0, progression_order, 0, 1, 1, 5, 4, 4, 0, 1],
    );

    // Component 1 with precincts defined for 2 decomposition levels
    segment(&mut data, 0x53, &[1, 1, 2, 3, 3, 0b0000_0101, 0, 0x77, 0x88, 0x88]);

    // No quantization, 2 guard bits, one exponent per subband
    let mut qcd = vec![0b0100_0000];
    qcd.extend((0..16).map(|i| (8 + i / 3) << 3));
    segment(&mut data, 0x5C, &qcd);

    segment(&mut data, 0x5E, &[0, 0, 3]);

    let mut com = vec![0, 1];
    com.extend_from_slice(b"Kakadu-v5.2.1");
    segment(&mut data, 0x64, &com);

    // CAP, a marker segment this parser does not know
    segment(&mut data, 0x50, &[0, 0, 0, 0, 0, 0]);

    let start_of_tile = data.len();
    let psot = tile_length.unwrap_or(12 + 2 + 4);
    let mut sot = vec![0, 0];
    sot.extend_from_slice(&psot.to_be_bytes());
    sot.extend_from_slice(&[0, 1]);
    segment(&mut data, 0x90, &sot);
    data.extend_from_slice(&[0xFF, 0x93]);
    data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    data.extend_from_slice(&[0xFF, 0xD9]);

    (data, start_of_tile)
}

#[test]
fn test_main_header() {
    init();
    let (data, start_of_tile) = codestream(0, None);
    let codestream = decode_jpc(&mut Cursor::new(&data), true).unwrap();

    assert_eq!(codestream.offset(), 0);
    assert_eq!(codestream.length(), start_of_tile as u64);
    assert!(codestream.tile_parts().is_empty());

    let header = codestream.header();

    let siz = header.image_and_tile_size_marker_segment();
    assert_eq!(siz.offset(), 2);
    assert_eq!(siz.length(), 47);
    assert_eq!(siz.decoder_capabilities(), 0);
    assert_eq!(siz.reference_grid_width(), 128);
    assert_eq!(siz.reference_grid_height(), 64);
    assert_eq!(siz.reference_tile_width(), 128);
    assert_eq!(siz.reference_tile_height(), 64);
    assert_eq!(siz.num_x_tiles(), 1);
    assert_eq!(siz.num_y_tiles(), 1);
    assert_eq!(siz.no_components(), 3);
    for i in 0..3 {
        assert_eq!(siz.precision(i), Some(8));
        assert_eq!(siz.values_are_signed(i), Some(false));
        assert_eq!(siz.horizontal_separation(i), Some(1));
        assert_eq!(siz.vertical_separation(i), Some(1));
    }
    assert_eq!(siz.precision(3), None);

    let cod = header.coding_style_marker_segment().unwrap();
    assert_eq!(cod.coding_style(), 0);
    assert_eq!(cod.progression_order(), ProgressionOrder::LRCP);
    assert_eq!(cod.no_layers(), 1);
    assert_eq!(
        cod.multiple_component_transformation(),
        MultipleComponentTransformation::Multiple
    );
    let parameters = cod.coding_style_parameters();
    assert_eq!(parameters.no_decomposition_levels(), 5);
    assert_eq!(parameters.no_resolutions(), 6);
    assert_eq!(parameters.code_block_width(), 64);
    assert_eq!(parameters.code_block_height(), 64);
    assert_eq!(
        parameters.coding_block_styles(),
        vec![
            CodingBlockStyle::NoSelectiveArithmeticCodingBypass,
            CodingBlockStyle::NoResetOfContextProbabilities,
            CodingBlockStyle::NoTerminationOnEachCodingPass,
            CodingBlockStyle::NoVerticallyCausalContext,
            CodingBlockStyle::NoPredictableTermination,
            CodingBlockStyle::NoSegmentationSymbolsAreUsed
        ]
    );
    assert_eq!(parameters.transformation(), TransformationFilter::Reversible);
    assert_eq!(parameters.precinct_sizes().len(), 6);
    assert_eq!(parameters.precinct_sizes()[0].width_exponent(), 15);

    let coc = &header.coding_style_component_segment()[0];
    assert_eq!(coc.component_index(), 1);
    let parameters = coc.coding_style_parameters();
    assert_eq!(parameters.no_decomposition_levels(), 2);
    assert_eq!(parameters.code_block_width(), 32);
    assert_eq!(parameters.transformation(), TransformationFilter::Irreversible);
    let precincts = parameters.precinct_sizes();
    assert_eq!(precincts.len(), 3);
    assert_eq!(precincts[0].width_exponent(), 7);
    assert_eq!(precincts[0].height_exponent(), 7);
    assert_eq!(precincts[2].width_exponent(), 8);
    assert_eq!(
        parameters.coding_block_styles()[0],
        CodingBlockStyle::SelectiveArithmeticCodingBypass
    );

    let qcd = header.quantization_default_marker_segment().unwrap();
    assert_eq!(qcd.quantization_style(), QuantizationStyle::No { guard: 2 });
    let exponents = qcd.quantization_exponents();
    assert_eq!(exponents.len(), 16);
    assert_eq!(exponents[0], 8);
    assert_eq!(exponents[15], 13);

    let rgn = &header.region_of_interest_segments()[0];
    assert_eq!(rgn.component_index(), 0);
    assert_eq!(
        rgn.region_of_interest_style(),
        RegionOfInterestStyle::ImplicitRegionOfInterest
    );
    assert_eq!(rgn.implicit_shift(), 3);

    let com = &header.comment_marker_segments()[0];
    assert_eq!(com.registration_value(), CommentRegistrationValue::Latin);
    assert_eq!(com.comment_latin().unwrap(), "Kakadu-v5.2.1");

    // CAP is skipped by its length
    assert_eq!(codestream.warnings().len(), 1);
}

#[test]
fn test_tile_parts() {
    init();
    let (data, start_of_tile) = codestream(1, None);
    let codestream = decode_jpc(&mut Cursor::new(&data), false).unwrap();

    assert_eq!(codestream.length(), data.len() as u64);
    assert_eq!(codestream.tile_parts().len(), 1);

    let tile_part = &codestream.tile_parts()[0];
    let sot = tile_part.start_of_tile_segment();
    assert_eq!(sot.offset(), start_of_tile as u64);
    assert_eq!(sot.length(), 10);
    assert_eq!(sot.tile_index(), 0);
    assert_eq!(sot.tile_length(), 18);
    assert_eq!(sot.tile_part_index(), 0);
    assert_eq!(sot.no_tile_parts(), 1);
    assert_eq!(tile_part.data_offset(), start_of_tile as u64 + 14);
    assert_eq!(tile_part.data_length(), 4);
}

#[test]
fn test_tile_part_to_end_of_codestream() {
    init();
    let (data, _) = codestream(0, Some(0));
    let codestream = decode_jpc(&mut Cursor::new(&data), false).unwrap();

    assert_eq!(codestream.tile_parts()[0].data_length(), 4);
    assert_eq!(codestream.length(), data.len() as u64);
}

#[test]
fn test_invalid_progression_order() {
    init();
    let (data, _) = codestream(9, None);
    let codestream = decode_jpc(&mut Cursor::new(&data), true).unwrap();

    let cod = codestream.header().coding_style_marker_segment().unwrap();
    assert_eq!(
        cod.progression_order(),
        ProgressionOrder::Reserved { value: 9 }
    );
    assert_eq!(cod.progression_order().to_string(), "9 (invalid)");
    assert!(codestream.header().to_string().contains("9 (invalid)"));
}

#[test]
fn test_missing_soc() {
    init();
    let (data, _) = codestream(0, None);
    assert!(decode_jpc(&mut Cursor::new(&data[2..]), true).is_err());
}

#[test]
fn test_truncated_main_header() {
    init();
    let (data, _) = codestream(0, None);
    assert!(decode_jpc(&mut Cursor::new(&data[..40]), true).is_err());
}

#[test]
fn test_largest_code_block_exponents() {
    init();
    let (mut data, _) = codestream(0, None);
    // xcb and ycb of the COD segment
    assert_eq!(&data[51..53], &[0xFF, 0x52]);
    data[61] = 0x0F;
    data[62] = 0x0F;

    let codestream = decode_jpc(&mut Cursor::new(&data), true).unwrap();
    let parameters = codestream
        .header()
        .coding_style_marker_segment()
        .unwrap()
        .coding_style_parameters();
    assert_eq!(parameters.code_block_width(), 1 << 17);
    assert_eq!(parameters.code_block_height(), 1 << 17);
    assert!(codestream
        .header()
        .to_string()
        .contains("(131072 x 131072)"));
}

#[test]
fn test_comment_too_short() {
    init();
    let (mut data, _) = codestream(0, None);
    let com = data
        .windows(2)
        .position(|marker| marker == [0xFF, 0x64])
        .unwrap();
    data[com + 2..com + 4].copy_from_slice(&3u16.to_be_bytes());

    assert!(decode_jpc(&mut Cursor::new(&data), true).is_err());
}
