//! Hierarchical markup reader

use std::io::BufReader;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::error::ParseError;
use super::{RecordReader, open};
use crate::table::{RecordSet, Value};

/// Reader for XML documents shaped as `<root><record><field>..</field></record></root>`
///
/// Every element directly under the root is one record. Each child of a
/// record becomes a column named by its tag, holding the child's own text
/// (trimmed; `Null` when there is none). Records do not need to share the
/// same child tags. Deeper descendants are ignored, and a repeated tag within
/// one record keeps the last value.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlReader;

/// Depth at which record elements sit (root is depth 1)
const RECORD_DEPTH: usize = 1;
/// Depth at which field elements sit
const FIELD_DEPTH: usize = 2;

struct OpenField {
    tag: String,
    text: Option<String>,
    // Text after the first nested element is not the field's own text.
    closed_text: bool,
}

impl RecordReader for XmlReader {
    fn read(&self, path: &Path) -> Result<RecordSet, ParseError> {
        let mut reader = Reader::from_reader(BufReader::new(open(path)?));
        reader.config_mut().trim_text(true);

        let xml_error = |position: u64, e: &dyn std::fmt::Display| ParseError::Xml {
            path: path.to_path_buf(),
            error: format!("at position {}: {}", position, e),
        };

        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut records: Vec<Vec<(String, Value)>> = Vec::new();
        let mut record: Option<Vec<(String, Value)>> = None;
        let mut field: Option<OpenField> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(reader.error_position() as u64, &e))?;

            match event {
                Event::Start(e) => {
                    match depth {
                        0 if seen_root => {
                            return Err(xml_error(
                                reader.buffer_position() as u64,
                                &"multiple root elements",
                            ));
                        }
                        0 => seen_root = true,
                        RECORD_DEPTH => record = Some(Vec::new()),
                        FIELD_DEPTH => {
                            field = Some(OpenField {
                                tag: tag_name(e.name().as_ref()),
                                text: None,
                                closed_text: false,
                            });
                        }
                        _ => {
                            if let Some(open_field) = field.as_mut() {
                                open_field.closed_text = true;
                            }
                        }
                    }
                    depth += 1;
                }
                Event::Empty(e) => match depth {
                    0 if seen_root => {
                        return Err(xml_error(
                            reader.buffer_position() as u64,
                            &"multiple root elements",
                        ));
                    }
                    0 => seen_root = true,
                    RECORD_DEPTH => records.push(Vec::new()),
                    FIELD_DEPTH => {
                        if let Some(fields) = record.as_mut() {
                            fields.push((tag_name(e.name().as_ref()), Value::Null));
                        }
                    }
                    _ => {
                        if let Some(open_field) = field.as_mut() {
                            open_field.closed_text = true;
                        }
                    }
                },
                Event::Text(e) => {
                    if let Some(open_field) = own_text_target(&mut field, depth) {
                        let text = e
                            .unescape()
                            .map_err(|err| xml_error(reader.buffer_position() as u64, &err))?;
                        open_field
                            .text
                            .get_or_insert_with(String::new)
                            .push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some(open_field) = own_text_target(&mut field, depth) {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        open_field
                            .text
                            .get_or_insert_with(String::new)
                            .push_str(&text);
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    match depth {
                        FIELD_DEPTH => {
                            if let (Some(done), Some(fields)) = (field.take(), record.as_mut()) {
                                fields.push((done.tag, field_value(done.text)));
                            }
                        }
                        RECORD_DEPTH => {
                            if let Some(done) = record.take() {
                                records.push(done);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }

            buf.clear();
        }

        if !seen_root {
            return Err(ParseError::Xml {
                path: path.to_path_buf(),
                error: "no root element found".to_string(),
            });
        }
        if depth != 0 {
            return Err(ParseError::Xml {
                path: path.to_path_buf(),
                error: "unexpected end of document".to_string(),
            });
        }

        let set = RecordSet::from_records(records);
        tracing::debug!(
            path = %path.display(),
            rows = set.row_count(),
            columns = set.column_count(),
            "Read XML file"
        );
        Ok(set)
    }
}

/// The open field, if text at `depth` belongs to it
fn own_text_target(field: &mut Option<OpenField>, depth: usize) -> Option<&mut OpenField> {
    field
        .as_mut()
        .filter(|f| depth == FIELD_DEPTH + 1 && !f.closed_text)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn field_value(text: Option<String>) -> Value {
    match text {
        Some(t) if !t.trim().is_empty() => Value::Text(t.trim().to_string()),
        _ => Value::Null,
    }
}
