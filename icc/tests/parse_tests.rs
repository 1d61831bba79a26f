use chrono::NaiveDate;
use icc::{decode_icc, DeviceClass, Platform, RenderingIntent};
use std::io::Cursor;

// A version 2.2.0 input device profile as embedded by Kodak ROMM writers,
// with two tags pointing at a 402 byte tag data area.
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
    data[44..48].copy_from_slice(&1u32.to_be_bytes());
    data[48..52].copy_from_slice(b"KODA");
    data[52..56].copy_from_slice(b"ROMM");
    data[64..68].copy_from_slice(&0u32.to_be_bytes());
    data[68..72].copy_from_slice(&0x0000_F6D6u32.to_be_bytes());
    data[72..76].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    data[76..80].copy_from_slice(&0x0000_D32Du32.to_be_bytes());
    data[80..84].copy_from_slice(b"JPEG");

    data[128..132].copy_from_slice(&2u32.to_be_bytes());
    data[132..136].copy_from_slice(b"wtpt");
    data[136..140].copy_from_slice(&156u32.to_be_bytes());
    data[140..144].copy_from_slice(&20u32.to_be_bytes());
    data[144..148].copy_from_slice(b"desc");
    data[148..152].copy_from_slice(&176u32.to_be_bytes());
    data[152..156].copy_from_slice(&370u32.to_be_bytes());

    data[156..160].copy_from_slice(b"XYZ ");
    data[176..180].copy_from_slice(b"desc");

    data
}

#[test]
fn test_header() {
    let data = romm_profile();
    let mut reader = Cursor::new(&data);
    let profile = decode_icc(&mut reader).unwrap();
    let header = profile.header();

    assert_eq!(header.size(), 546);
    assert_eq!(header.version().to_string(), "2.2.0");
    assert_eq!(header.device_class(), DeviceClass::Input);
    assert_eq!(header.device_class().to_string(), "input device profile");
    assert_eq!(header.colour_space(), "RGB");
    assert_eq!(header.connection_space(), "XYZ");
    assert_eq!(
        header.date_time(),
        NaiveDate::from_ymd_opt(2001, 8, 30).and_then(|d| d.and_hms_opt(13, 32, 37))
    );
    assert!(header.has_valid_signature());
    assert_eq!(header.platform(), Platform::Apple);
    assert_eq!(header.device_manufacturer(), "KODA");
    assert_eq!(header.device_model(), "ROMM");
    assert_eq!(header.creator(), "JPEG");
    assert_eq!(header.rendering_intent(), RenderingIntent::Perceptual);

    let (x, y, z) = header.illuminant();
    assert!((x - 0.964203).abs() < 1e-6);
    assert!((y - 1.0).abs() < 1e-6);
    assert!((z - 0.824905).abs() < 1e-6);

    assert!(profile.warnings().is_empty());
    assert_eq!(reader.position(), 546);
}

#[test]
fn test_tags() {
    let data = romm_profile();
    let profile = decode_icc(&mut Cursor::new(&data)).unwrap();

    assert_eq!(profile.tags().len(), 2);

    let white_point = profile.tag("wtpt").unwrap();
    assert_eq!(white_point.offset(), 156);
    assert_eq!(white_point.size(), 20);
    assert_eq!(&white_point.data()[..4], b"XYZ ");

    let description = profile.tag("desc").unwrap();
    assert_eq!(description.data().len(), 370);
    assert!(profile.tag("rXYZ").is_none());
}

#[test]
fn test_corrupt_signature_warns() {
    let mut data = romm_profile();
    data[36..40].copy_from_slice(b"ascp");

    let profile = decode_icc(&mut Cursor::new(&data)).unwrap();

    assert!(!profile.header().has_valid_signature());
    assert_eq!(profile.warnings().len(), 1);
    assert_eq!(profile.header().colour_space(), "RGB");
}

#[test]
fn test_invalid_date_warns() {
    let mut data = romm_profile();
    data[26..28].copy_from_slice(&13u16.to_be_bytes());

    let profile = decode_icc(&mut Cursor::new(&data)).unwrap();

    assert_eq!(profile.header().date_time(), None);
    assert_eq!(profile.warnings().len(), 1);
}

#[test]
fn test_tag_outside_profile_warns() {
    let mut data = romm_profile();
    data[152..156].copy_from_slice(&1000u32.to_be_bytes());

    let profile = decode_icc(&mut Cursor::new(&data)).unwrap();

    assert!(profile.tag("desc").unwrap().data().is_empty());
    assert_eq!(profile.warnings().len(), 1);
}
