use clap::Parser;
use log::{info, warn};
use std::error;
use std::error::Error;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek};
use std::path::Path;

use jp2::{
    decode_jp2, validate, wrap, Association, BoxContents, FileTypeBox, Jp2Box, LabelBox,
    NumberListBox, SuperBox, XMLBox, BOX_TYPE_ASSOCIATION, BRAND_JP2, BRAND_JPX, BRAND_JPXB,
};
use jpc::decode_jpc;

const MARKER_SOC: [u8; 2] = [0xFF, 0x4F];

#[derive(Debug)]
enum JP2000Error {
    DecodingContainer { error: String },
    DecodingCodestream { error: String },
    MissingFileType { path: String },
}

impl error::Error for JP2000Error {}
impl fmt::Display for JP2000Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DecodingContainer { error } => {
                write!(f, "error decoding jp2 container {}", error)
            }
            Self::DecodingCodestream { error } => {
                write!(f, "error decoding jpc codestream {}", error)
            }
            Self::MissingFileType { path } => {
                write!(f, "{} has no file type box to rebrand", path)
            }
        }
    }
}

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Print the boxes of a .jp2/.jpx file, or the main header of a raw
    /// codestream, followed by any decode warnings
    Info(Info),

    /// Re-wrap the boxes of a .jp2 file into a new file
    Wrap(Wrap),
}

#[derive(Parser)]
struct Info {
    /// Path to .jp2, .jpx or .j2k file
    path: String,
}

#[derive(Parser)]
struct Wrap {
    /// Path to the .jp2 file to read
    input: String,

    /// Path to the file to write
    output: String,

    /// Brand the output 'jpx ' with 'jp2 ' and 'jpxb' compatibility
    #[clap(long)]
    jpx: bool,

    /// XML document to add in an association with the first codestream
    #[clap(long)]
    xml: Option<String>,

    /// Label to add in an association with the first codestream
    #[clap(long)]
    label: Option<String>,
}

// A raw codestream starts with SOC, anything else is read as a box file.
fn is_codestream<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let found = match reader.read_exact(&mut magic) {
        Ok(()) => magic == MARKER_SOC,
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(error) => return Err(error),
    };
    reader.seek(io::SeekFrom::Start(0))?;
    Ok(found)
}

fn info(c: Info) -> Result<(), Box<dyn Error>> {
    let file = File::open(Path::new(&c.path))?;
    let mut reader = BufReader::new(file);

    if is_codestream(&mut reader)? {
        let codestream = decode_jpc(&mut reader, true).map_err(|error| {
            JP2000Error::DecodingCodestream {
                error: error.to_string(),
            }
        })?;
        println!("Main header:\n{}", codestream.header());
        for warning in codestream.warnings() {
            println!("warning: {}", warning);
        }
        return Ok(());
    }

    let jp2 = decode_jp2(&mut reader).map_err(|error| JP2000Error::DecodingContainer {
        error: error.to_string(),
    })?;
    println!("{}", jp2);
    for warning in jp2.warnings() {
        println!("warning: {}", warning);
    }

    Ok(())
}

fn association(xml: Option<String>, label: Option<String>) -> Jp2Box {
    let mut children = vec![Jp2Box::new(BoxContents::NumberList(NumberListBox::new(&[
        Association::Codestream { index: 0 },
    ])))];
    if let Some(label) = label {
        children.push(Jp2Box::new(BoxContents::Label(LabelBox::new(&label))));
    }
    if let Some(xml) = xml {
        children.push(Jp2Box::new(BoxContents::Xml(XMLBox::new(&xml))));
    }
    Jp2Box::new(BoxContents::Association(SuperBox::new(
        BOX_TYPE_ASSOCIATION,
        children,
    )))
}

fn rebrand(file_type: &mut FileTypeBox) {
    file_type.set_brand(BRAND_JPX);
    file_type.set_compatibility_list(vec![BRAND_JP2, BRAND_JPXB]);
}

fn wrap_file(c: Wrap) -> Result<(), Box<dyn Error>> {
    let file = File::open(Path::new(&c.input))?;
    let mut jp2 = decode_jp2(&mut BufReader::new(file)).map_err(|error| {
        JP2000Error::DecodingContainer {
            error: error.to_string(),
        }
    })?;
    if !jp2.warnings().is_empty() {
        warn!("{} decoded with {} warnings", c.input, jp2.warnings().len());
    }

    if c.jpx {
        let file_type = jp2
            .file_type_box_mut()
            .ok_or_else(|| JP2000Error::MissingFileType {
                path: c.input.clone(),
            })?;
        rebrand(file_type);
    }

    let xml = match &c.xml {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    let mut boxes = jp2.into_boxes();
    if xml.is_some() || c.label.is_some() {
        boxes.push(association(xml, c.label));
    }

    // Validate before the output file is created
    validate(&boxes)?;

    let mut writer = BufWriter::new(File::create(Path::new(&c.output))?);
    wrap(&mut writer, &boxes)?;
    info!("Wrapped {} into {}", c.input, c.output);

    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Info(c) => info(c),
        SubCommand::Wrap(c) => wrap_file(c),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
