#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use niche_harvest::client::{NichesClient, TransportError};
use niche_harvest::domain::FetchRequest;

pub enum Cell<'a> {
    Text(&'a str),
    Inline(&'a str),
    Number(&'a str),
    Bool(bool),
    Blank,
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap()
}

/// Builds a minimal single-sheet `.xlsx` workbook.
pub fn workbook(rows: &[Vec<Cell<'_>>]) -> Vec<u8> {
    let mut shared: Vec<String> = Vec::new();
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row_index, row) in rows.iter().enumerate() {
        let row_number = row_index + 1;
        sheet.push_str(&format!(r#"<row r="{row_number}">"#));
        for (col_index, cell) in row.iter().enumerate() {
            let reference = format!("{}{row_number}", column_name(col_index));
            match cell {
                Cell::Text(value) => {
                    shared.push(value.to_string());
                    sheet.push_str(&format!(
                        r#"<c r="{reference}" t="s"><v>{}</v></c>"#,
                        shared.len() - 1
                    ));
                }
                Cell::Inline(value) => sheet.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape(value)
                )),
                Cell::Number(value) => {
                    sheet.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#))
                }
                Cell::Bool(value) => sheet.push_str(&format!(
                    r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                    u8::from(*value)
                )),
                Cell::Blank => {}
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        shared.len()
    );
    for value in &shared {
        strings.push_str(&format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape(value)));
    }
    strings.push_str("</sst>");

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Niches" sheetId="1" r:id="rId7"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/data.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/data.xml", sheet),
        ("xl/sharedStrings.xml", strings),
    ];
    zip_parts(&parts)
}

pub fn zip_parts(parts: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Workbook with a `name`/`qty` header and `rows` data rows.
pub fn sample_page(prefix: &str, rows: usize) -> Vec<u8> {
    let names: Vec<String> = (0..rows).map(|i| format!("{prefix}-{i}")).collect();
    let qty: Vec<String> = (0..rows).map(|i| i.to_string()).collect();
    let mut sheet = vec![vec![Cell::Text("name"), Cell::Text("qty")]];
    for i in 0..rows {
        sheet.push(vec![Cell::Text(&names[i]), Cell::Number(&qty[i])]);
    }
    workbook(&sheet)
}

pub type Page = Result<Vec<u8>, TransportError>;

/// Scripted endpoint: pages per category, keyed by offset. Unknown offsets
/// return an empty body. Records every call and the peak number of
/// categories downloading at once.
#[derive(Default)]
pub struct MockNiches {
    pages: HashMap<(u32, u64), Page>,
    failing: Vec<u32>,
    delay: Duration,
    calls: Mutex<Vec<(u32, u64)>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockNiches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, category: u32, offset: u64, page: Page) -> Self {
        self.pages.insert((category, offset), page);
        self
    }

    pub fn always_failing(mut self, category: u32) -> Self {
        self.failing.push(category);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(u32, u64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, category: u32) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter(|(cat, _)| *cat == category)
            .map(|(_, offset)| offset)
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl NichesClient for MockNiches {
    fn download(&self, request: &FetchRequest) -> Result<Vec<u8>, TransportError> {
        let category = request.category().get();
        self.calls
            .lock()
            .unwrap()
            .push((category, request.offset()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&category) {
            return Err(TransportError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        self.pages
            .get(&(category, request.offset()))
            .cloned()
            .unwrap_or(Ok(Vec::new()))
    }
}
