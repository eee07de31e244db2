mod common;

use assert_matches::assert_matches;

use common::{Cell, workbook, zip_parts};
use niche_harvest::domain::CellValue;
use niche_harvest::sheet::{ParseError, SpreadsheetParser};

#[test]
fn first_row_is_header_and_values_are_typed() {
    let payload = workbook(&[
        vec![Cell::Text("Название"), Cell::Text("Цена"), Cell::Text("Рейтинг")],
        vec![Cell::Text("Кружка"), Cell::Number("450"), Cell::Number("4.5")],
        vec![Cell::Inline("Чайник & Co"), Cell::Number("1200"), Cell::Number("5")],
    ]);

    let records = SpreadsheetParser::parse(&payload).unwrap();
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.get("Название"), Some(&CellValue::Text("Кружка".to_string())));
    assert_eq!(first.get("Цена"), Some(&CellValue::Integer(450)));
    assert_eq!(first.get("Рейтинг"), Some(&CellValue::Float(4.5)));

    let second = &records[1];
    assert_eq!(
        second.get("Название"),
        Some(&CellValue::Text("Чайник & Co".to_string()))
    );
    assert_eq!(second.get("Рейтинг"), Some(&CellValue::Float(5.0)));
}

#[test]
fn mixed_column_falls_back_to_text() {
    let payload = workbook(&[
        vec![Cell::Text("SKU")],
        vec![Cell::Number("123456")],
        vec![Cell::Text("A-77")],
    ]);
    let records = SpreadsheetParser::parse(&payload).unwrap();
    assert_eq!(records[0].get("SKU"), Some(&CellValue::Text("123456".to_string())));
    assert_eq!(records[1].get("SKU"), Some(&CellValue::Text("A-77".to_string())));
}

#[test]
fn blank_cells_and_headers() {
    let payload = workbook(&[
        vec![Cell::Text("a"), Cell::Blank, Cell::Text("a")],
        vec![Cell::Number("1"), Cell::Bool(true), Cell::Blank],
        vec![Cell::Blank, Cell::Blank, Cell::Blank],
        vec![Cell::Number("2"), Cell::Bool(false), Cell::Number("9")],
    ]);
    let records = SpreadsheetParser::parse(&payload).unwrap();

    assert_eq!(records.len(), 2);
    let columns: Vec<&str> = records[0].columns().collect();
    assert_eq!(columns, vec!["Unnamed: 1", "a", "a.1"]);
    assert_eq!(records[0].get("a.1"), Some(&CellValue::Empty));
    assert_eq!(records[0].get("Unnamed: 1"), Some(&CellValue::Integer(1)));
    assert_eq!(records[1].get("a.1"), Some(&CellValue::Integer(9)));
}

#[test]
fn header_only_sheet_has_no_records() {
    let payload = workbook(&[vec![Cell::Text("only"), Cell::Text("header")]]);
    assert!(SpreadsheetParser::parse(&payload).unwrap().is_empty());
}

#[test]
fn parsing_is_idempotent() {
    let payload = common::sample_page("x", 25);
    let first = SpreadsheetParser::parse(&payload).unwrap();
    let second = SpreadsheetParser::parse(&payload).unwrap();
    assert_eq!(first.len(), 25);
    assert_eq!(first, second);
}

#[test]
fn rich_text_shared_strings_and_sparse_cells() {
    let sheet = r#"<worksheet><sheetData>
        <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
        <row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>7</v></c></row>
    </sheetData></worksheet>"#;
    let strings = r#"<sst>
        <si><t>Бренд</t></si>
        <si><r><t>Отзы</t></r><r><t>вов</t></r></si>
        <si><t>Acme</t><rPh><t>ignored</t></rPh></si>
    </sst>"#;
    let payload = zip_parts(&[
        ("xl/worksheets/sheet1.xml", sheet.to_string()),
        ("xl/sharedStrings.xml", strings.to_string()),
        ("xl/workbook.xml", "<workbook><sheets/></workbook>".to_string()),
    ]);

    let records = SpreadsheetParser::parse(&payload).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("Бренд"), Some(&CellValue::Text("Acme".to_string())));
    assert_eq!(records[0].get("Отзывов"), Some(&CellValue::Integer(7)));
    assert_eq!(records[0].get("Unnamed: 1"), Some(&CellValue::Empty));
}

#[test]
fn archive_without_workbook_is_rejected() {
    let payload = zip_parts(&[("readme.txt", "hello".to_string())]);
    assert_matches!(
        SpreadsheetParser::parse(&payload),
        Err(ParseError::MissingPart(_))
    );
}

#[test]
fn out_of_range_shared_string_is_an_error() {
    let payload = zip_parts(&[
        ("xl/workbook.xml", "<workbook/>".to_string()),
        (
            "xl/worksheets/sheet1.xml",
            r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>4</v></c></row></sheetData></worksheet>"#
                .to_string(),
        ),
    ]);
    assert_matches!(
        SpreadsheetParser::parse(&payload),
        Err(ParseError::InvalidCell { .. })
    );
}

#[test]
fn inline_string_phonetic_runs_are_ignored() {
    let sheet = r#"<worksheet><sheetData>
        <row r="1"><c r="A1" t="inlineStr"><is><t>name</t><rPh sb="0" eb="4"><t>X</t></rPh></is></c></row>
        <row r="2"><c r="A2" t="inlineStr"><is><t>a</t><rPh sb="0" eb="1"><t>junk</t></rPh></is></c></row>
    </sheetData></worksheet>"#;
    let payload = zip_parts(&[
        ("xl/workbook.xml", "<workbook/>".to_string()),
        ("xl/worksheets/sheet1.xml", sheet.to_string()),
    ]);

    let records = SpreadsheetParser::parse(&payload).unwrap();
    assert_eq!(records.len(), 1);
    let columns: Vec<&str> = records[0].columns().collect();
    assert_eq!(columns, vec!["name"]);
    assert_eq!(records[0].get("name"), Some(&CellValue::Text("a".to_string())));
}
