use encoding_rs::Encoding;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{BufRead, BufReader, Read};

use crate::core::ParseError;

/// Elements HTML never closes; they are dropped before reaching the tag stack.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "param", "source", "wbr",
];

#[derive(Clone, Debug, PartialEq)]
pub enum TagEvent {
    Open {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Close {
        name: String,
    },
}

pub type DecodedInput<R> = BufReader<DecodeReaderBytes<R, Vec<u8>>>;

/// Transcodes arbitrary report bytes to UTF-8. Without an explicit encoding a
/// BOM decides, otherwise the input is read as UTF-8 with lossy replacement.
pub fn decode_input<R: Read>(input: R, encoding: Option<&'static Encoding>) -> DecodedInput<R> {
    BufReader::new(DecodeReaderBytesBuilder::new().encoding(encoding).build(input))
}

/// Pull tokenizer producing open/text/close events in document order.
pub struct Tokenizer<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.expand_empty_elements = true;
        // Tag balance is the parser's job, it reports mismatches itself.
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    pub fn next_event(&mut self) -> Result<Option<TagEvent>, ParseError> {
        if self.done {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => {
                    let name = lowercase(e.name().as_ref());
                    if is_void(&name) {
                        continue;
                    }
                    TagEvent::Open {
                        attributes: attributes(e),
                        name,
                    }
                }
                Event::End(ref e) => {
                    let name = lowercase(e.name().as_ref());
                    if is_void(&name) {
                        continue;
                    }
                    TagEvent::Close { name }
                }
                Event::Text(ref e) => TagEvent::Text(String::from_utf8_lossy(e).into_owned()),
                Event::CData(ref e) => TagEvent::Text(String::from_utf8_lossy(e).into_owned()),
                Event::Eof => {
                    self.done = true;
                    return Ok(None);
                }
                _ => continue,
            };
            return Ok(Some(event));
        }
    }
}

impl<R: Read> Tokenizer<DecodedInput<R>> {
    pub fn from_bytes(input: R, encoding: Option<&'static Encoding>) -> Self {
        Self::new(decode_input(input, encoding))
    }
}

impl<R: BufRead> Iterator for Tokenizer<R> {
    type Item = Result<TagEvent, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn lowercase(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn attributes(e: &BytesStart) -> Vec<(String, String)> {
    e.html_attributes()
        .flatten()
        .map(|attr| {
            let value = String::from_utf8_lossy(&attr.value);
            (
                lowercase(attr.key.as_ref()),
                decode_html_entities(&value).into_owned(),
            )
        })
        .collect()
}
