use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::domain::{CellValue, Record};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("payload is empty")]
    Empty,

    #[error("not a spreadsheet archive: {0}")]
    Archive(String),

    #[error("workbook part missing: {0}")]
    MissingPart(String),

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("invalid cell {reference}: {message}")]
    InvalidCell { reference: String, message: String },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetParser;

impl SpreadsheetParser {
    pub fn parse(payload: &[u8]) -> Result<Vec<Record>, ParseError> {
        if payload.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut archive = ZipArchive::new(Cursor::new(payload))
            .map_err(|err| ParseError::Archive(err.to_string()))?;

        let sheet_part = resolve_first_sheet(&mut archive)?;
        let shared = match read_part(&mut archive, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };
        let sheet_xml = read_part(&mut archive, &sheet_part)?
            .ok_or_else(|| ParseError::MissingPart(sheet_part.clone()))?;

        let rows = parse_rows(&sheet_xml, &sheet_part, &shared)?;
        Ok(build_records(rows))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RawCell {
    Number(String),
    Text(String),
    Bool(bool),
}

impl RawCell {
    fn is_blank(&self) -> bool {
        matches!(self, RawCell::Text(text) if text.is_empty())
    }
}

type Row = Vec<(usize, RawCell)>;

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, ParseError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(ParseError::Archive(err.to_string())),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|err| ParseError::Archive(format!("{name}: {err}")))?;
    Ok(Some(content))
}

fn xml_error(part: &str, err: impl std::fmt::Display) -> ParseError {
    ParseError::Xml {
        part: part.to_string(),
        message: err.to_string(),
    }
}

fn attribute(start: &BytesStart<'_>, part: &str, name: &[u8]) -> Result<Option<String>, ParseError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|err| xml_error(part, err))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(|err| xml_error(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn resolve_first_sheet(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String, ParseError> {
    let workbook = read_part(archive, WORKBOOK_PART)?
        .ok_or_else(|| ParseError::MissingPart(WORKBOOK_PART.to_string()))?;

    let mut relation_id = None;
    let mut reader = Reader::from_str(&workbook);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                relation_id = attribute(&e, WORKBOOK_PART, b"id")?;
                break;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(WORKBOOK_PART, err)),
        }
    }

    let Some(relation_id) = relation_id else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };
    let Some(rels) = read_part(archive, WORKBOOK_RELS_PART)? else {
        return Ok(FALLBACK_SHEET_PART.to_string());
    };

    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attribute(&e, WORKBOOK_RELS_PART, b"Id")?.as_deref() == Some(&relation_id) {
                    if let Some(target) = attribute(&e, WORKBOOK_RELS_PART, b"Target")? {
                        return Ok(normalize_target(&target));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(WORKBOOK_RELS_PART, err)),
        }
    }
    Ok(FALLBACK_SHEET_PART.to_string())
}

fn normalize_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ParseError> {
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|err| xml_error(SHARED_STRINGS_PART, err))?;
                if let Some(current) = current.as_mut() {
                    current.push_str(&text);
                }
            }
            Ok(Event::CData(t)) if in_text => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(SHARED_STRINGS_PART, err)),
        }
    }
    Ok(strings)
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    reference: String,
    kind: Option<String>,
    value: String,
    inline: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Value,
    Inline,
}

fn parse_rows(xml: &str, part: &str, shared: &[String]) -> Result<Vec<Row>, ParseError> {
    let mut rows = Vec::new();
    let mut row: Option<Row> = None;
    let mut next_column = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut capture = Capture::None;
    let mut phonetic_depth = 0usize;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Vec::new());
                    next_column = 0;
                }
                b"c" => {
                    let pending = start_cell(&e, part, next_column)?;
                    next_column = pending.column + 1;
                    cell = Some(pending);
                }
                b"v" if cell.is_some() => capture = Capture::Value,
                b"t" if cell.is_some() && phonetic_depth == 0 => capture = Capture::Inline,
                b"rPh" => {
                    phonetic_depth += 1;
                    capture = Capture::None;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" => {
                    let pending = start_cell(&e, part, next_column)?;
                    next_column = pending.column + 1;
                }
                _ => {}
            },
            Ok(Event::Text(t)) if capture != Capture::None => {
                let text = t.unescape().map_err(|err| xml_error(part, err))?;
                if let Some(pending) = cell.as_mut() {
                    match capture {
                        Capture::Value => pending.value.push_str(&text),
                        Capture::Inline => pending.inline.push_str(&text),
                        Capture::None => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = Capture::None,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"c" => {
                    phonetic_depth = 0;
                    if let Some(pending) = cell.take() {
                        if let Some(value) = finish_cell(&pending, shared)? {
                            if let Some(row) = row.as_mut() {
                                row.push((pending.column, value));
                            }
                        }
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(part, err)),
        }
    }
    Ok(rows)
}

fn start_cell(e: &BytesStart<'_>, part: &str, next_column: usize) -> Result<PendingCell, ParseError> {
    let reference = attribute(e, part, b"r")?.unwrap_or_default();
    let column = if reference.is_empty() {
        next_column
    } else {
        column_index(&reference).ok_or_else(|| ParseError::InvalidCell {
            reference: reference.clone(),
            message: "bad cell reference".to_string(),
        })?
    };
    Ok(PendingCell {
        column,
        reference,
        kind: attribute(e, part, b"t")?,
        ..PendingCell::default()
    })
}

fn finish_cell(cell: &PendingCell, shared: &[String]) -> Result<Option<RawCell>, ParseError> {
    let invalid = |message: String| ParseError::InvalidCell {
        reference: cell.reference.clone(),
        message,
    };
    let value = cell.value.trim();
    let raw = match cell.kind.as_deref() {
        Some("s") => {
            if value.is_empty() {
                return Ok(None);
            }
            let index: usize = value
                .parse()
                .map_err(|_| invalid(format!("shared string index `{value}`")))?;
            let text = shared
                .get(index)
                .ok_or_else(|| invalid(format!("shared string {index} out of range")))?;
            RawCell::Text(text.clone())
        }
        Some("inlineStr") => RawCell::Text(cell.inline.clone()),
        Some("str") | Some("e") | Some("d") => RawCell::Text(cell.value.clone()),
        Some("b") => RawCell::Bool(value == "1"),
        _ => {
            if value.is_empty() {
                return Ok(None);
            }
            if value.parse::<f64>().is_err() {
                return Err(invalid(format!("non-numeric value `{value}`")));
            }
            RawCell::Number(value.to_string())
        }
    };
    Ok(Some(raw))
}

fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|byte| byte.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut index = 0usize;
    for letter in letters {
        index = index * 26 + usize::from(letter.to_ascii_uppercase() - b'A' + 1);
    }
    Some(index - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

fn is_integer_literal(value: &str) -> bool {
    !value.contains(['.', 'e', 'E']) && value.parse::<i64>().is_ok()
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a RawCell>) -> ColumnKind {
    let mut kind = ColumnKind::Integer;
    let mut seen = false;
    for cell in cells {
        match cell {
            RawCell::Bool(_) => {}
            RawCell::Number(value) if is_integer_literal(value) => {}
            RawCell::Number(_) => kind = ColumnKind::Float,
            RawCell::Text(text) if text.is_empty() => continue,
            RawCell::Text(_) => return ColumnKind::Text,
        }
        seen = true;
    }
    if seen { kind } else { ColumnKind::Text }
}

fn coerce(cell: Option<&RawCell>, kind: ColumnKind) -> CellValue {
    let Some(cell) = cell.filter(|cell| !cell.is_blank()) else {
        return CellValue::Empty;
    };
    match (cell, kind) {
        (RawCell::Bool(flag), ColumnKind::Integer) => CellValue::Integer(i64::from(*flag)),
        (RawCell::Bool(flag), ColumnKind::Float) => CellValue::Float(f64::from(u8::from(*flag))),
        (RawCell::Bool(flag), ColumnKind::Text) => {
            CellValue::Text(if *flag { "TRUE" } else { "FALSE" }.to_string())
        }
        (RawCell::Number(value), ColumnKind::Integer) => value
            .parse::<i64>()
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::Text(value.clone())),
        (RawCell::Number(value), ColumnKind::Float) => value
            .parse::<f64>()
            .map(CellValue::Float)
            .unwrap_or_else(|_| CellValue::Text(value.clone())),
        (RawCell::Number(value), ColumnKind::Text) => CellValue::Text(value.clone()),
        (RawCell::Text(text), _) => CellValue::Text(text.clone()),
    }
}

fn header_name(cell: Option<&RawCell>, index: usize) -> String {
    match cell {
        Some(RawCell::Text(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Some(RawCell::Number(value)) => value.clone(),
        Some(RawCell::Bool(flag)) => if *flag { "TRUE" } else { "FALSE" }.to_string(),
        _ => format!("Unnamed: {index}"),
    }
}

fn dedupe_headers(names: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        while used.contains(&candidate) {
            let count = counts.entry(name.clone()).or_insert(0);
            *count += 1;
            candidate = format!("{name}.{count}");
        }
        used.insert(candidate.clone());
        result.push(candidate);
    }
    result
}

fn build_records(rows: Vec<Row>) -> Vec<Record> {
    let mut rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|(_, cell)| !cell.is_blank()));
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let body: Vec<Row> = rows.collect();

    let width = header
        .iter()
        .chain(body.iter().flatten())
        .map(|(column, _)| column + 1)
        .max()
        .unwrap_or(0);

    let dense = |row: &Row| {
        let mut cells: Vec<Option<RawCell>> = vec![None; width];
        for (column, cell) in row {
            cells[*column] = Some(cell.clone());
        }
        cells
    };

    let header = dense(&header);
    let names = dedupe_headers(
        (0..width)
            .map(|index| header_name(header[index].as_ref(), index))
            .collect(),
    );

    let body: Vec<Vec<Option<RawCell>>> = body.iter().map(dense).collect();
    let kinds: Vec<ColumnKind> = (0..width)
        .map(|index| infer_kind(body.iter().filter_map(|row| row[index].as_ref())))
        .collect();

    body.iter()
        .map(|row| {
            names
                .iter()
                .zip(&kinds)
                .enumerate()
                .map(|(index, (name, kind))| (name.clone(), coerce(row[index].as_ref(), *kind)))
                .collect::<Record>()
        })
        .collect()
}
