use std::io::Cursor;

use jp2::{
    decode_jp2, decode_tree, BitDepth, BoxContents, ChannelTypes, ColourSpecificationMethods,
    ComponentMapType, EnumeratedColourSpaces, GeneratedComponent, JP2Error, Jp2Box, PaletteBox,
    BOX_TYPE_CONTIGUOUS_CODESTREAM, BOX_TYPE_FRAGMENT_LIST, BOX_TYPE_HEADER, BOX_TYPE_XML,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn jp2_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = (payload.len() as u32 + 8).to_be_bytes().to_vec();
    data.extend_from_slice(box_type);
    data.extend_from_slice(payload);
    data
}

fn segment(data: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    data.extend_from_slice(&[0xFF, marker]);
    data.extend_from_slice(&(payload.len() as u16 + 2).to_be_bytes());
    data.extend_from_slice(payload);
}

// 128 x 64, three 8 bit components in a single tile.
fn codestream() -> Vec<u8> {
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
    segment(&mut data, 0x52, &[0, 0, 0, 1, 1, 5, 4, 4, 0, 1]);

    let mut qcd = vec![0b0100_0000];
    qcd.extend((0..16).map(|i| (8 + i / 3) << 3));
    segment(&mut data, 0x5C, &qcd);

    let mut sot = vec![0, 0];
    sot.extend_from_slice(&18u32.to_be_bytes());
    sot.extend_from_slice(&[0, 1]);
    segment(&mut data, 0x90, &sot);
    data.extend_from_slice(&[0xFF, 0x93, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xD9]);

    data
}

fn image_header() -> Vec<u8> {
    let mut payload = vec![];
    payload.extend_from_slice(&64u32.to_be_bytes());
    payload.extend_from_slice(&128u32.to_be_bytes());
    payload.extend_from_slice(&3u16.to_be_bytes());
    payload.extend_from_slice(&[7, 7, 0, 0]);
    jp2_box(b"ihdr", &payload)
}

fn srgb() -> Vec<u8> {
    let mut payload = vec![1, 0, 0];
    payload.extend_from_slice(&16u32.to_be_bytes());
    jp2_box(b"colr", &payload)
}

fn file_type(brand: &[u8; 4], compatibility: &[&[u8; 4]]) -> Vec<u8> {
    let mut payload = brand.to_vec();
    payload.extend_from_slice(&0u32.to_be_bytes());
    for code in compatibility {
        payload.extend_from_slice(*code);
    }
    jp2_box(b"ftyp", &payload)
}

// Signature, File Type, JP2 Header and Contiguous Codestream boxes.
fn jp2_file(header: &[u8], codestream: &[u8]) -> Vec<u8> {
    let mut data = jp2_box(b"jP  ", &[13, 10, 135, 10]);
    data.extend(file_type(b"jp2 ", &[b"jp2 "]));
    data.extend(jp2_box(b"jp2h", header));
    data.extend(jp2_box(b"jp2c", codestream));
    data
}

fn minimal_file() -> Vec<u8> {
    let mut header = image_header();
    header.extend(srgb());
    jp2_file(&header, &codestream())
}

// A version 2.2.0 input device profile of the kind Kodak ROMM writers embed.
fn romm_profile() -> Vec<u8> {
    let mut data = vec![0u8; 546];

    data[0..4].copy_from_slice(&546u32.to_be_bytes());
    data[4..8].copy_from_slice(b"KCMS");
    data[8..12].copy_from_slice(&[2, 0x20, 0, 0]);
    data[12..16].copy_from_slice(b"scnr");
    data[16..20].copy_from_slice(b"RGB ");
    data[20..24].copy_from_slice(b"XYZ ");
    for (i, value) in [2001u16, 8, 30, 13, 32, 37].iter().enumerate() {
        data[24 + i * 2..26 + i * 2].copy_from_slice(&value.to_be_bytes());
    }
    data[36..40].copy_from_slice(b"acsp");
    data[40..44].copy_from_slice(b"APPL");
    data[48..52].copy_from_slice(b"KODA");
    data[52..56].copy_from_slice(b"ROMM");
    data[68..72].copy_from_slice(&0x0000_F6D6u32.to_be_bytes());
    data[72..76].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    data[76..80].copy_from_slice(&0x0000_D32Du32.to_be_bytes());
    data[80..84].copy_from_slice(b"JPEG");

    data[128..132].copy_from_slice(&1u32.to_be_bytes());
    data[132..136].copy_from_slice(b"wtpt");
    data[136..140].copy_from_slice(&144u32.to_be_bytes());
    data[140..144].copy_from_slice(&20u32.to_be_bytes());
    data[144..148].copy_from_slice(b"XYZ ");

    data
}

#[test]
fn test_minimal_file() {
    init();
    let data = minimal_file();
    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();

    assert_eq!(file.length(), data.len() as u64);
    assert_eq!(file.boxes().len(), 4);
    assert!(file.warnings().is_empty(), "{:?}", file.warnings());

    assert_eq!(file.signature_box().unwrap().signature(), [13, 10, 135, 10]);

    let file_type = file.file_type_box().unwrap();
    assert_eq!(file_type.brand(), "jp2 ");
    assert_eq!(file_type.min_version(), 0);
    assert_eq!(file_type.compatibility_list(), vec!["jp2 ".to_string()]);

    let header = &file.boxes()[2];
    assert_eq!(header.identifier(), BOX_TYPE_HEADER);
    assert_eq!(header.offset(), 32);
    assert_eq!(header.length(), 8 + 22 + 15);
    assert_eq!(header.children().len(), 2);

    let image_header = file.image_header_box().unwrap();
    assert_eq!(image_header.height(), 64);
    assert_eq!(image_header.width(), 128);
    assert_eq!(image_header.components_num(), 3);
    assert_eq!(
        image_header.bit_depth(),
        Some(BitDepth::Unsigned { value: 8 })
    );
    assert_eq!(image_header.compression_type(), 7);

    let colours = file.colour_specification_boxes();
    assert_eq!(colours.len(), 1);
    assert_eq!(
        colours[0].method(),
        ColourSpecificationMethods::EnumeratedColourSpace
    );
    assert_eq!(
        colours[0].enumerated_colour_space(),
        Some(EnumeratedColourSpaces::sRGB)
    );

    let codestreams = file.contiguous_codestream_boxes();
    assert_eq!(codestreams.len(), 1);
    assert_eq!(codestreams[0].data(), &codestream()[..]);
    let siz = codestreams[0]
        .codestream()
        .unwrap()
        .header()
        .image_and_tile_size_marker_segment();
    assert_eq!(siz.reference_grid_width(), 128);
    assert_eq!(siz.reference_grid_height(), 64);
    assert_eq!(siz.no_components(), 3);
}

#[test]
fn test_round_trip() {
    init();
    let data = minimal_file();
    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();

    let mut written = vec![];
    file.write(&mut written).unwrap();
    assert_eq!(written, data);
}

#[test]
fn test_display() {
    init();
    let data = minimal_file();
    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();

    let text = file.boxes()[1].to_string();
    assert!(text.starts_with("File Type Box ('ftyp') @ (12, 20)"));
    assert!(text.contains("\n    Brand:  jp2 "));
}

#[test]
fn test_unknown_box_preserved() {
    init();
    let mut data = minimal_file();
    data.extend(jp2_box(b"abcd", &[1, 2, 3]));

    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();
    let unknown = file.boxes().last().unwrap();
    assert_eq!(unknown.identifier(), *b"abcd");
    match unknown.contents() {
        BoxContents::Unknown(raw) => assert_eq!(raw.data(), &[1, 2, 3]),
        other => panic!("expected a raw box, got {:?}", other),
    }

    assert_eq!(file.warnings().len(), 1);
    assert_eq!(file.warnings()[0].box_type(), Some(*b"abcd"));
    assert_eq!(
        file.warnings()[0].message(),
        "unrecognised box type, keeping raw bytes"
    );

    let mut written = vec![];
    file.write(&mut written).unwrap();
    assert_eq!(written, data);
}

#[test]
fn test_unknown_superbox() {
    init();
    let data = jp2_box(b"grp ", &jp2_box(b"free", &[0, 0, 0, 0]));
    assert_eq!(data.len(), 20);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    let group = &tree.boxes()[0];
    assert!(matches!(group.contents(), BoxContents::UnknownSuperBox(_)));
    assert_eq!(group.children().len(), 1);

    let free = &group.children()[0];
    assert_eq!(free.offset(), 8);
    assert_eq!(free.length(), 12);
    match free.contents() {
        BoxContents::Free(free) => assert_eq!(free.data(), &[0, 0, 0, 0]),
        other => panic!("expected a free box, got {:?}", other),
    }

    assert_eq!(tree.warnings().len(), 1);
    assert!(tree.warnings()[0].message().contains("superbox"));
    assert_eq!(group.to_bytes().unwrap(), data);
}

#[test]
fn test_reader_requirements() {
    init();
    let flags = [5u16, 42, 45, 2, 18, 19, 1, 8, 12, 31, 20];
    let mut payload = vec![3, 0xFF, 0xFF, 0xFF, 0xF0, 0x00, 0x00];
    payload.extend_from_slice(&(flags.len() as u16).to_be_bytes());
    for (i, flag) in flags.iter().enumerate() {
        payload.extend_from_slice(&flag.to_be_bytes());
        payload.extend_from_slice(&(1u32 << (23 - i)).to_be_bytes()[1..]);
    }
    payload.extend_from_slice(&0u16.to_be_bytes());
    let data = jp2_box(b"rreq", &payload);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    match tree.boxes()[0].contents() {
        BoxContents::ReaderRequirements(requirements) => {
            assert_eq!(requirements.mask_length(), 3);
            assert_eq!(requirements.fully_understand_aspects_mask(), 0xFF_FFFF);
            assert_eq!(requirements.decode_completely_mask(), 0xF0_0000);
            assert_eq!(requirements.standard_flags(), flags.to_vec());
            assert_eq!(requirements.standard_features()[1].mask(), 0x40_0000);
            assert!(requirements.vendor_features().is_empty());
        }
        other => panic!("expected reader requirements, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_data_reference() {
    init();
    let mut url = vec![0, 0, 0, 0];
    url.extend_from_slice(b"file:///tmp/image.j2k\0");
    let mut payload = 1u16.to_be_bytes().to_vec();
    payload.extend(jp2_box(b"url ", &url));
    let data = jp2_box(b"dtbl", &payload);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    match tree.boxes()[0].contents() {
        BoxContents::DataReference(data_reference) => {
            assert_eq!(data_reference.entries().len(), 1);
            assert_eq!(data_reference.locations(), vec!["file:///tmp/image.j2k"]);
            match data_reference.entries()[0].contents() {
                BoxContents::DataEntryURL(entry) => {
                    assert_eq!(entry.version(), 0);
                    assert_eq!(entry.flags(), [0, 0, 0]);
                }
                other => panic!("expected a url box, got {:?}", other),
            }
        }
        other => panic!("expected a data reference, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_label_and_xml() {
    init();
    let mut payload = jp2_box(b"lbl ", b"this is a test");
    payload.extend(jp2_box(b"xml ", b"<?xml version=\"1.0\"?><data>0</data>"));
    let data = jp2_box(b"asoc", &payload);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());

    let children = tree.boxes()[0].children();
    match children[0].contents() {
        BoxContents::Label(label) => assert_eq!(label.label(), "this is a test"),
        other => panic!("expected a label, got {:?}", other),
    }
    assert_eq!(tree.xml_boxes().len(), 0);
    assert_eq!(tree.find(*b"xml ").len(), 1);
    match children[1].contents() {
        BoxContents::Xml(xml) => {
            assert_eq!(xml.format(), "<?xml version=\"1.0\"?><data>0</data>")
        }
        other => panic!("expected xml, got {:?}", other),
    }
}

#[test]
fn test_icc_colour_specification() {
    init();
    let mut payload = vec![2, 0, 0];
    payload.extend(romm_profile());
    let mut header = image_header();
    header.extend(jp2_box(b"colr", &payload));
    let data = jp2_file(&header, &codestream());

    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();
    assert!(file.warnings().is_empty(), "{:?}", file.warnings());

    let colour = file.colour_specification_boxes()[0];
    assert_eq!(colour.method(), ColourSpecificationMethods::RestrictedICCProfile);
    assert_eq!(colour.enumerated_colour_space(), None);
    assert_eq!(colour.data().len(), 546);

    let profile = colour.icc_profile().unwrap();
    assert_eq!(profile.header().size(), 546);
    assert_eq!(profile.header().device_model(), "ROMM");
    assert_eq!(profile.tags().len(), 1);
}

#[test]
fn test_corrupt_icc_profile_warns() {
    init();
    let mut profile = romm_profile();
    profile[36..40].copy_from_slice(b"xxxx");
    let mut payload = vec![2, 0, 0];
    payload.extend(profile);
    let mut header = image_header();
    header.extend(jp2_box(b"colr", &payload));
    let data = jp2_file(&header, &codestream());

    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();
    assert_eq!(file.warnings().len(), 1);
    assert!(file.warnings()[0].message().starts_with("ICC profile: "));
    assert!(file.colour_specification_boxes()[0].icc_profile().is_some());
}

#[test]
fn test_header_without_colour_warns() {
    init();
    let data = jp2_file(&image_header(), &codestream());

    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();
    assert_eq!(file.warnings().len(), 1);
    assert_eq!(file.warnings()[0].offset(), 32);
    assert_eq!(file.warnings()[0].box_type(), Some(BOX_TYPE_HEADER));
}

#[test]
fn test_undecodable_codestream_warns() {
    init();
    let mut header = image_header();
    header.extend(srgb());
    let data = jp2_file(&header, &[0, 1, 2, 3]);

    let file = decode_jp2(&mut Cursor::new(&data)).unwrap();
    let codestream = file.contiguous_codestream_boxes()[0];
    assert!(codestream.codestream().is_none());
    assert_eq!(codestream.data(), &[0, 1, 2, 3]);

    assert_eq!(file.warnings().len(), 1);
    assert_eq!(
        file.warnings()[0].box_type(),
        Some(BOX_TYPE_CONTIGUOUS_CODESTREAM)
    );

    let mut written = vec![];
    file.write(&mut written).unwrap();
    assert_eq!(written, data);
}

#[test]
fn test_invalid_signature() {
    init();
    let mut data = minimal_file();
    data[8..12].copy_from_slice(&[0, 0, 0, 0]);

    let error = decode_jp2(&mut Cursor::new(&data)).unwrap_err();
    match error.downcast_ref::<JP2Error>() {
        Some(JP2Error::InvalidSignature { signature, offset }) => {
            assert_eq!(*signature, [0, 0, 0, 0]);
            assert_eq!(*offset, 0);
        }
        other => panic!("expected an invalid signature, got {:?}", other),
    }
}

#[test]
fn test_file_type_not_second() {
    init();
    let mut data = jp2_box(b"jP  ", &[13, 10, 135, 10]);
    data.extend(jp2_box(b"jp2h", &image_header()));
    data.extend(file_type(b"jp2 ", &[b"jp2 "]));

    let error = decode_jp2(&mut Cursor::new(&data)).unwrap_err();
    match error.downcast_ref::<JP2Error>() {
        Some(JP2Error::BoxUnexpected { box_type, offset }) => {
            assert_eq!(*box_type, BOX_TYPE_HEADER);
            assert_eq!(*offset, 12);
        }
        other => panic!("expected an unexpected box, got {:?}", other),
    }

    // Without the file level rules the same boxes decode
    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert_eq!(tree.boxes().len(), 3);
}

#[test]
fn test_truncated_file() {
    init();
    let mut data = minimal_file();
    data.truncate(data.len() - 1);

    let error = decode_jp2(&mut Cursor::new(&data)).unwrap_err();
    match error.downcast_ref::<JP2Error>() {
        Some(JP2Error::BoxLengthExceedsContainer { box_type, .. }) => {
            assert_eq!(*box_type, BOX_TYPE_CONTIGUOUS_CODESTREAM);
        }
        other => panic!("expected a box past the end of the file, got {:?}", other),
    }
}

#[test]
fn test_palette_mapping_and_channels() {
    init();
    // Two entries of an 8 bit and a 12 bit column
    let mut pclr = vec![0, 2, 2, 7, 11];
    pclr.extend_from_slice(&[0x10, 0x0A, 0xBC]);
    pclr.extend_from_slice(&[0x20, 0x0F, 0xFF]);
    let mut data = jp2_box(b"pclr", &pclr);
    data.extend(jp2_box(b"cmap", &[0, 0, 1, 0, 0, 0, 1, 1]));
    let mut cdef = vec![0, 2];
    cdef.extend_from_slice(&[0, 0, 0, 0, 0, 1]);
    cdef.extend_from_slice(&[0, 1, 0, 1, 0, 0]);
    data.extend(jp2_box(b"cdef", &cdef));

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    assert_eq!(tree.boxes().len(), 3);

    match tree.boxes()[0].contents() {
        BoxContents::Palette(palette) => {
            assert_eq!(palette.num_entries(), 2);
            assert_eq!(palette.num_components(), 2);
            let columns = palette.generated_components();
            assert_eq!(columns[0].bit_depth().value(), 8);
            assert_eq!(columns[0].values(), &vec![0x10, 0x20]);
            assert_eq!(columns[1].bit_depth().value(), 12);
            assert_eq!(columns[1].values(), &vec![0x0ABC, 0x0FFF]);
        }
        other => panic!("expected a palette, got {:?}", other),
    }
    match tree.boxes()[1].contents() {
        BoxContents::ComponentMapping(mapping) => {
            let maps = mapping.component_map();
            assert_eq!(maps.len(), 2);
            assert_eq!(maps[0].mapping_type(), ComponentMapType::Palette);
            assert_eq!(maps[1].palette(), 1);
        }
        other => panic!("expected a component mapping, got {:?}", other),
    }
    match tree.boxes()[2].contents() {
        BoxContents::ChannelDefinition(definition) => {
            let channels = definition.channels();
            assert_eq!(channels[0].channel_type(), ChannelTypes::ColourImageData);
            assert_eq!(channels[0].channel_association(), 1);
            assert_eq!(channels[1].channel_type(), ChannelTypes::Opacity);
            assert_eq!(channels[1].channel_association(), 0);
        }
        other => panic!("expected a channel definition, got {:?}", other),
    }

    let mut written = vec![];
    tree.write(&mut written).unwrap();
    assert_eq!(written, data);
}

#[test]
fn test_resolution() {
    init();
    let mut resc = vec![];
    for value in [3780u16, 100, 3780, 100].iter() {
        resc.extend_from_slice(&value.to_be_bytes());
    }
    resc.extend_from_slice(&[2, 2]);
    let mut resd = vec![];
    for value in [72u16, 1, 96, 1].iter() {
        resd.extend_from_slice(&value.to_be_bytes());
    }
    resd.extend_from_slice(&[0xFE, 0]);
    let mut payload = jp2_box(b"resc", &resc);
    payload.extend(jp2_box(b"resd", &resd));
    let data = jp2_box(b"res ", &payload);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    let children = tree.boxes()[0].children();
    assert_eq!(children.len(), 2);
    match children[0].contents() {
        BoxContents::CaptureResolution(capture) => {
            assert_eq!(capture.vertical_exponent(), 2);
            assert!((capture.vertical_resolution() - 3780.0).abs() < 1e-9);
        }
        other => panic!("expected a capture resolution, got {:?}", other),
    }
    match children[1].contents() {
        BoxContents::DefaultDisplayResolution(display) => {
            assert_eq!(display.vertical_exponent(), -2);
            assert_eq!(display.horizontal_numerator(), 96);
            assert!((display.vertical_resolution() - 0.72).abs() < 1e-9);
        }
        other => panic!("expected a default display resolution, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_uuid_info() {
    init();
    let uuid: Vec<u8> = (0u8..16).collect();
    let mut ulst = 1u16.to_be_bytes().to_vec();
    ulst.extend_from_slice(&uuid);
    let mut url = vec![0, 0, 0, 0];
    url.extend_from_slice(b"http://example.com/extensions\0");
    let mut payload = jp2_box(b"ulst", &ulst);
    payload.extend(jp2_box(b"url ", &url));
    let data = jp2_box(b"uinf", &payload);

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    let children = tree.boxes()[0].children();
    match children[0].contents() {
        BoxContents::UUIDList(list) => {
            assert_eq!(list.ids().len(), 1);
            assert_eq!(&list.ids()[0][..], &uuid[..]);
        }
        other => panic!("expected a uuid list, got {:?}", other),
    }
    match children[1].contents() {
        BoxContents::DataEntryURL(entry) => {
            assert_eq!(entry.location(), "http://example.com/extensions")
        }
        other => panic!("expected a url box, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_intellectual_property_and_uuid() {
    init();
    let mut data = jp2_box(b"jp2i", b"<rights>none</rights>");
    let mut uuid = vec![0xBE, 0x7A, 0xCF, 0xCB, 0x97, 0xA9, 0x42, 0xE8];
    uuid.extend_from_slice(&[0x9C, 0x71, 0x99, 0x94, 0x91, 0xE3, 0xAF, 0xAC]);
    uuid.extend_from_slice(&[1, 2, 3]);
    data.extend(jp2_box(b"uuid", &uuid));

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    match tree.boxes()[0].contents() {
        BoxContents::IntellectualProperty(rights) => {
            assert_eq!(rights.format(), "<rights>none</rights>")
        }
        other => panic!("expected intellectual property, got {:?}", other),
    }
    match tree.boxes()[1].contents() {
        BoxContents::Uuid(vendor) => {
            assert_eq!(&vendor.uuid()[..], &uuid[..16]);
            assert_eq!(vendor.data(), &vec![1, 2, 3]);
        }
        other => panic!("expected a uuid box, got {:?}", other),
    }

    let mut written = vec![];
    tree.write(&mut written).unwrap();
    assert_eq!(written, data);
}

fn fragment_list(offset: u64, length: u32, data_reference: u16) -> Vec<u8> {
    let mut payload = 1u16.to_be_bytes().to_vec();
    payload.extend_from_slice(&offset.to_be_bytes());
    payload.extend_from_slice(&length.to_be_bytes());
    payload.extend_from_slice(&data_reference.to_be_bytes());
    jp2_box(b"flst", &payload)
}

#[test]
fn test_fragment_table() {
    init();
    let data = jp2_box(b"ftbl", &fragment_list(89, 1_132_288, 0));

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert!(tree.warnings().is_empty());
    match tree.boxes()[0].contents() {
        BoxContents::FragmentTable(table) => {
            let fragment_list = table.fragment_list().unwrap();
            assert_eq!(fragment_list.offsets(), &vec![89]);
            assert_eq!(fragment_list.lengths(), &vec![1_132_288]);
            assert_eq!(fragment_list.data_references(), &vec![0]);
        }
        other => panic!("expected a fragment table, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_fragment_at_offset_zero_warns() {
    init();
    let data = jp2_box(b"ftbl", &fragment_list(0, 16, 0));

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert_eq!(tree.warnings().len(), 1);
    assert_eq!(tree.warnings()[0].box_type(), Some(BOX_TYPE_FRAGMENT_LIST));
    assert_eq!(tree.warnings()[0].offset(), 16);

    let children = tree.boxes()[0].children();
    assert_eq!(children.len(), 1);
    match children[0].contents() {
        BoxContents::FragmentList(fragment_list) => {
            assert_eq!(fragment_list.offsets(), &vec![0]);
            assert_eq!(fragment_list.lengths(), &vec![16]);
        }
        other => panic!("expected a fragment list, got {:?}", other),
    }
}

#[test]
fn test_unclosed_xml_warns() {
    init();
    let data = jp2_box(b"xml ", b"<data><value>0</value>");

    let tree = decode_tree(&mut Cursor::new(&data)).unwrap();
    assert_eq!(tree.warnings().len(), 1);
    assert_eq!(tree.warnings()[0].box_type(), Some(BOX_TYPE_XML));
    match tree.boxes()[0].contents() {
        BoxContents::Xml(xml) => assert_eq!(xml.format(), "<data><value>0</value>"),
        other => panic!("expected xml, got {:?}", other),
    }
    assert_eq!(tree.boxes()[0].to_bytes().unwrap(), data);
}

#[test]
fn test_oversized_palette_not_written() {
    init();
    let values = vec![0; 1025];
    let palette = PaletteBox::new(vec![GeneratedComponent::new(BitDepth::new(7), values)]);
    assert_eq!(palette.num_entries(), 1025);
    let error = Jp2Box::new(BoxContents::Palette(palette))
        .to_bytes()
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<JP2Error>(),
        Some(JP2Error::ValueTooLarge { .. })
    ));

    let columns = (0..256)
        .map(|_| GeneratedComponent::new(BitDepth::new(7), vec![0]))
        .collect();
    let error = Jp2Box::new(BoxContents::Palette(PaletteBox::new(columns)))
        .to_bytes()
        .unwrap_err();
    assert!(matches!(
        error.downcast_ref::<JP2Error>(),
        Some(JP2Error::ValueTooLarge { .. })
    ));

    let columns = (0..255)
        .map(|_| GeneratedComponent::new(BitDepth::new(7), vec![0; 1024]))
        .collect();
    let palette = Jp2Box::new(BoxContents::Palette(PaletteBox::new(columns)));
    assert_eq!(palette.to_bytes().unwrap().len(), 8 + 3 + 255 + 255 * 1024);
}
