use std::io::Cursor;

use jp2::{
    decode_jp2, validate, wrap, Association, BitDepth, BoxContents, ColourSpecificationBox,
    ContiguousCodestreamBox, DataReferenceBox, FileTypeBox, FragmentListBox, FragmentTableBox,
    ImageHeaderBox, JP2Error, Jp2Box, LabelBox, LengthForm, NumberListBox, SignatureBox,
    SuperBox, ValidationError, XMLBox, BOX_TYPE_ASSOCIATION, BOX_TYPE_DATA_REFERENCE,
    BOX_TYPE_FREE, BOX_TYPE_HEADER, BOX_TYPE_LABEL, BRAND_JP2, BRAND_JPX, BRAND_JPXB,
};

fn signature() -> Jp2Box {
    Jp2Box::new(BoxContents::Signature(SignatureBox::default()))
}

fn file_type(brand: [u8; 4], compatibility: Vec<[u8; 4]>) -> Jp2Box {
    Jp2Box::new(BoxContents::FileType(FileTypeBox::new(
        brand,
        0,
        compatibility,
    )))
}

fn header(extra: Vec<Jp2Box>) -> Jp2Box {
    let mut children = vec![
        Jp2Box::new(BoxContents::ImageHeader(ImageHeaderBox::new(
            64,
            128,
            3,
            BitDepth::new(7),
        ))),
        Jp2Box::new(BoxContents::ColourSpecification(
            ColourSpecificationBox::enumerated(16),
        )),
    ];
    children.extend(extra);
    Jp2Box::new(BoxContents::Header(SuperBox::new(BOX_TYPE_HEADER, children)))
}

fn codestream() -> Jp2Box {
    Jp2Box::new(BoxContents::ContiguousCodestream(
        ContiguousCodestreamBox::new(vec![0xFF, 0x4F, 0xFF, 0xD9]),
    ))
}

fn label(text: &str) -> Jp2Box {
    Jp2Box::new(BoxContents::Label(LabelBox::new(text)))
}

fn association(children: Vec<Jp2Box>) -> Jp2Box {
    Jp2Box::new(BoxContents::Association(SuperBox::new(
        BOX_TYPE_ASSOCIATION,
        children,
    )))
}

fn data_reference(locations: &[&str]) -> Jp2Box {
    Jp2Box::new(BoxContents::DataReference(
        DataReferenceBox::from_locations(locations),
    ))
}

fn fragment_table(fragment_list: FragmentListBox) -> Jp2Box {
    Jp2Box::new(BoxContents::FragmentTable(FragmentTableBox::new(
        fragment_list,
    )))
}

fn jp2_boxes(extra: Vec<Jp2Box>) -> Vec<Jp2Box> {
    let mut boxes = vec![
        signature(),
        file_type(BRAND_JP2, vec![BRAND_JP2]),
        header(vec![]),
        codestream(),
    ];
    boxes.extend(extra);
    boxes
}

fn jpx_boxes(extra: Vec<Jp2Box>) -> Vec<Jp2Box> {
    let mut boxes = vec![
        signature(),
        file_type(BRAND_JPX, vec![BRAND_JP2, BRAND_JPXB]),
        header(vec![]),
        codestream(),
    ];
    boxes.extend(extra);
    boxes
}

fn validation_error(boxes: &[Jp2Box]) -> ValidationError {
    let mut written = vec![];
    let error = wrap(&mut written, boxes).unwrap_err();
    assert!(written.is_empty());
    match error.downcast::<ValidationError>() {
        Ok(error) => *error,
        Err(error) => panic!("expected a validation error, got {}", error),
    }
}

#[test]
fn test_wrap_jp2() {
    let boxes = jp2_boxes(vec![Jp2Box::new(BoxContents::Xml(XMLBox::new(
        "<?xml version=\"1.0\"?><data>0</data>",
    )))]);
    assert_eq!(validate(&boxes), Ok(()));

    let mut written = vec![];
    wrap(&mut written, &boxes).unwrap();
    assert_eq!(&written[..12], &[0, 0, 0, 12, b'j', b'P', b' ', b' ', 13, 10, 135, 10]);

    let file = decode_jp2(&mut Cursor::new(&written)).unwrap();
    assert_eq!(file.length(), written.len() as u64);
    assert_eq!(file.boxes().len(), 5);
    assert_eq!(file.image_header_box().unwrap().width(), 128);
    assert_eq!(
        file.xml_boxes()[0].format(),
        "<?xml version=\"1.0\"?><data>0</data>"
    );
}

#[test]
fn test_wrap_jpx() {
    let boxes = jpx_boxes(vec![
        data_reference(&["file:///tmp/image.j2k"]),
        fragment_table(FragmentListBox::new(vec![89], vec![1_132_288], vec![1])),
        association(vec![
            Jp2Box::new(BoxContents::NumberList(NumberListBox::new(&[
                Association::Codestream { index: 0 },
            ]))),
            label("this is a test"),
        ]),
    ]);

    let mut written = vec![];
    wrap(&mut written, &boxes).unwrap();

    let file = decode_jp2(&mut Cursor::new(&written)).unwrap();
    assert_eq!(file.file_type_box().unwrap().brand(), "jpx ");
    assert_eq!(file.boxes().len(), 7);

    match file.boxes()[5].contents() {
        BoxContents::FragmentTable(table) => {
            let fragment_list = table.fragment_list().unwrap();
            assert_eq!(fragment_list.offsets(), &vec![89]);
            assert_eq!(fragment_list.lengths(), &vec![1_132_288]);
            assert_eq!(fragment_list.data_references(), &vec![1]);
        }
        other => panic!("expected a fragment table, got {:?}", other),
    }

    let labels = file.find(BOX_TYPE_LABEL);
    assert_eq!(labels.len(), 1);
    match labels[0].contents() {
        BoxContents::Label(label) => assert_eq!(label.label(), "this is a test"),
        other => panic!("expected a label, got {:?}", other),
    }

    let mut rewritten = vec![];
    file.write(&mut rewritten).unwrap();
    assert_eq!(rewritten, written);
}

#[test]
fn test_label_outside_association() {
    let mut boxes = jpx_boxes(vec![]);
    boxes[2] = header(vec![label("misplaced")]);

    assert_eq!(
        validation_error(&boxes),
        ValidationError::LabelOutsideAssociation {
            parent: Some(BOX_TYPE_HEADER)
        }
    );

    let boxes = jpx_boxes(vec![label("top level")]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::LabelOutsideAssociation { parent: None }
    );
}

#[test]
fn test_duplicate_data_reference() {
    let boxes = jpx_boxes(vec![
        data_reference(&["file:///a.j2k"]),
        data_reference(&["file:///b.j2k"]),
    ]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::DuplicateDataReference
    );
}

#[test]
fn test_nested_data_reference() {
    let boxes = jpx_boxes(vec![association(vec![data_reference(&[
        "file:///a.j2k",
    ])])]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::NestedDataReference {
            parent: BOX_TYPE_ASSOCIATION
        }
    );
}

#[test]
fn test_jpx_brand_compatibility() {
    let mut boxes = jpx_boxes(vec![]);
    boxes[1] = file_type(BRAND_JPX, vec![BRAND_JPX]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::JpxBrandWithoutJp2Compatibility
    );

    boxes[1] = file_type(BRAND_JPX, vec![BRAND_JP2]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::JpxBrandWithoutJpxCompatibility
    );

    boxes[1] = file_type(BRAND_JPX, vec![BRAND_JP2, BRAND_JPX]);
    assert_eq!(validate(&boxes), Ok(()));
}

#[test]
fn test_jpxb_brand_compatibility() {
    let mut boxes = jpx_boxes(vec![association(vec![label("jpxb")])]);
    boxes[1] = file_type(BRAND_JPXB, vec![BRAND_JPXB]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::JpxBrandWithoutJp2Compatibility
    );

    boxes[1] = file_type(BRAND_JPXB, vec![BRAND_JP2]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::JpxBrandWithoutJpxCompatibility
    );

    boxes[1] = file_type(BRAND_JPXB, vec![BRAND_JP2, BRAND_JPXB]);
    assert_eq!(validate(&boxes), Ok(()));
}

#[test]
fn test_jpx_boxes_without_jpx_brand() {
    let boxes = jp2_boxes(vec![association(vec![label("needs jpx")])]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::JpxBoxesWithoutJpxBrand {
            box_type: BOX_TYPE_ASSOCIATION
        }
    );

    // A jpxb brand allows them too
    let mut boxes = boxes;
    boxes[1] = file_type(BRAND_JPXB, vec![BRAND_JP2, BRAND_JPXB]);
    assert_eq!(validate(&boxes), Ok(()));
}

#[test]
fn test_missing_file_type() {
    let boxes = vec![signature(), header(vec![]), codestream()];
    assert_eq!(validation_error(&boxes), ValidationError::MissingFileType);
}

#[test]
fn test_data_reference_out_of_range() {
    let boxes = jpx_boxes(vec![
        data_reference(&["file:///a.j2k"]),
        fragment_table(FragmentListBox::new(vec![89], vec![100], vec![2])),
    ]);
    assert_eq!(
        validation_error(&boxes),
        ValidationError::DataReferenceOutOfRange {
            index: 2,
            entries: 1
        }
    );

    // 0 is the file itself and needs no Data Reference box
    let boxes = jpx_boxes(vec![fragment_table(FragmentListBox::new(
        vec![89],
        vec![100],
        vec![0],
    ))]);
    assert_eq!(validate(&boxes), Ok(()));
}

#[test]
fn test_invalid_fragment_list_not_written() {
    let cases = vec![
        FragmentListBox::new(vec![0], vec![100], vec![0]),
        FragmentListBox::new(vec![89], vec![0], vec![0]),
        FragmentListBox::new(vec![89, 200], vec![100], vec![0]),
        FragmentListBox::new(vec![], vec![], vec![]),
    ];

    for fragment_list in cases {
        let boxes = jpx_boxes(vec![fragment_table(fragment_list)]);
        let mut written = vec![];
        let error = wrap(&mut written, &boxes).unwrap_err();
        assert!(written.is_empty());
        assert!(error.downcast_ref::<JP2Error>().is_some(), "{}", error);
    }
}

#[test]
fn test_invalid_fragment_table_not_written() {
    let empty = Jp2Box::new(BoxContents::FragmentTable(FragmentTableBox::with_children(
        vec![],
    )));
    let wrong_child = Jp2Box::new(BoxContents::FragmentTable(FragmentTableBox::with_children(
        vec![Jp2Box::new(BoxContents::new(BOX_TYPE_FREE))],
    )));

    for table in vec![empty, wrong_child] {
        let boxes = jpx_boxes(vec![table]);
        let mut written = vec![];
        let error = wrap(&mut written, &boxes).unwrap_err();
        assert!(written.is_empty());
        match error.downcast_ref::<JP2Error>() {
            Some(JP2Error::FragmentTableChildCount { count }) => assert_eq!(*count, 0),
            Some(JP2Error::FragmentTableChildNotFragmentList { box_type }) => {
                assert_eq!(*box_type, BOX_TYPE_FREE)
            }
            other => panic!("expected a fragment table error, got {:?}", other),
        }
    }
}

#[test]
fn test_length_forms() {
    let mut boxes = jp2_boxes(vec![]);
    boxes[3].set_length_form(LengthForm::ToEnd);
    boxes[2].set_length_form(LengthForm::Extended);

    let mut written = vec![];
    wrap(&mut written, &boxes).unwrap();

    // jp2h is written with a 16 byte header, jp2c with a length of 0
    assert_eq!(&written[32..40], &[0, 0, 0, 1, b'j', b'p', b'2', b'h']);
    let codestream_offset = written.len() - 12;
    assert_eq!(
        &written[codestream_offset..codestream_offset + 8],
        &[0, 0, 0, 0, b'j', b'p', b'2', b'c']
    );

    let file = decode_jp2(&mut Cursor::new(&written)).unwrap();
    assert_eq!(file.boxes()[2].length_form(), LengthForm::Extended);
    assert_eq!(file.boxes()[3].length_form(), LengthForm::ToEnd);
    assert_eq!(file.boxes()[3].length(), 12);

    let mut rewritten = vec![];
    file.write(&mut rewritten).unwrap();
    assert_eq!(rewritten, written);
}

#[test]
fn test_data_reference_at_top_level_only() {
    let boxes = jpx_boxes(vec![data_reference(&["file:///a.j2k"])]);
    assert_eq!(validate(&boxes), Ok(()));

    let mut written = vec![];
    wrap(&mut written, &boxes).unwrap();
    let file = decode_jp2(&mut Cursor::new(&written)).unwrap();
    let found = file.find(BOX_TYPE_DATA_REFERENCE);
    assert_eq!(found.len(), 1);
    match found[0].contents() {
        BoxContents::DataReference(data_reference) => {
            assert_eq!(data_reference.locations(), vec!["file:///a.j2k"]);
        }
        other => panic!("expected a data reference, got {:?}", other),
    }
}
