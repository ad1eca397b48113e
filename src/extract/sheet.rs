//! Shared worksheet streaming used by the XLSX and XLS extractors.
//!
//! Spreadsheets routinely carry huge formatted-but-empty regions, so the
//! engine gives up on a row after a run of blank cells and on a sheet
//! after a run of blank rows. If the interesting data sits beyond those
//! limits it is almost certainly not the only instance on the filesystem.

use log::debug;

use crate::extract::TextEvent;

/// Consecutive blank cells tolerated before skipping to the next row.
pub const BLANK_COL_LIMIT: usize = 100;

/// Consecutive blank rows tolerated before skipping to the next sheet.
pub const BLANK_ROW_LIMIT: usize = 100;

/// One spreadsheet cell, already resolved to a displayable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    /// Placeholder inside a merged region; skipped without counting as blank.
    Merged,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Render the cell the way it reads in the sheet; integer-valued
    /// floats lose their trailing `.0`.
    fn render(&self) -> Option<String> {
        match self {
            Self::Blank | Self::Merged => None,
            Self::Text(s) if s.is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9e15 {
                    Some(format!("{}", *n as i64))
                } else {
                    Some(n.to_string())
                }
            }
        }
    }
}

/// An in-memory worksheet.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// Stream every sheet as row-line events, applying the blank limits, with
/// a buffer flush between sheets.
pub fn sheet_events(filename: String, sheets: Vec<Sheet>) -> impl Iterator<Item = TextEvent> {
    sheets
        .into_iter()
        .flat_map(move |sheet| sheet_to_events(&filename, sheet))
}

fn sheet_to_events(filename: &str, sheet: Sheet) -> Vec<TextEvent> {
    let mut events = Vec::new();
    let mut blank_rows = 0usize;

    for (row_index, row) in sheet.rows.into_iter().enumerate() {
        let mut line = String::new();
        let mut blank_cols = 0usize;
        let mut row_has_data = false;

        for cell in row {
            if cell == Cell::Merged {
                continue;
            }
            match cell.render() {
                None => {
                    blank_cols += 1;
                    if blank_cols > BLANK_COL_LIMIT {
                        break;
                    }
                }
                Some(value) => {
                    line.push_str(&value);
                    line.push(' ');
                    row_has_data = true;
                }
            }
        }
        events.push(TextEvent::Line(line));

        if row_has_data {
            blank_rows = 0;
        } else {
            blank_rows += 1;
            if blank_rows > BLANK_ROW_LIMIT {
                debug!(
                    target: "sheet",
                    "{filename}[Sheet {}]: blank row count exceeded at row {}",
                    sheet.name,
                    row_index + 1,
                );
                break;
            }
        }
    }

    events.push(TextEvent::Flush);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::chunk_events;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_owned())
    }

    fn chunks(sheets: Vec<Sheet>) -> Vec<String> {
        chunk_events(
            Box::new(sheet_events("test.xlsx".to_owned(), sheets)),
            650,
        )
        .collect()
    }

    #[test]
    fn rows_become_space_joined_lines() {
        let sheet = Sheet {
            name: "Sheet1".to_owned(),
            rows: vec![
                vec![text("name"), text("card")],
                vec![text("amy"), text("4111")],
            ],
        };
        assert_eq!(chunks(vec![sheet]), vec!["name card amy 4111"]);
    }

    #[test]
    fn integer_valued_floats_lose_the_decimal_point() {
        let sheet = Sheet {
            name: "Sheet1".to_owned(),
            rows: vec![vec![Cell::Number(371449635398431.0), Cell::Number(2.5)]],
        };
        assert_eq!(chunks(vec![sheet]), vec!["371449635398431 2.5"]);
    }

    #[test]
    fn merged_placeholders_do_not_count_as_blanks() {
        let mut row = vec![text("head")];
        row.extend(std::iter::repeat_n(Cell::Merged, BLANK_COL_LIMIT + 10));
        row.push(text("tail"));
        let sheet = Sheet {
            name: "Sheet1".to_owned(),
            rows: vec![row],
        };
        assert_eq!(chunks(vec![sheet]), vec!["head tail"]);
    }

    #[test]
    fn blank_cell_run_skips_the_rest_of_the_row() {
        let mut row = vec![text("head")];
        row.extend(std::iter::repeat_n(Cell::Blank, BLANK_COL_LIMIT + 1));
        row.push(text("unreachable"));
        let sheet = Sheet {
            name: "Sheet1".to_owned(),
            rows: vec![row, vec![text("next")]],
        };
        assert_eq!(chunks(vec![sheet]), vec!["head next"]);
    }

    #[test]
    fn blank_row_run_skips_the_rest_of_the_sheet() {
        let mut rows = vec![vec![text("first")]];
        for _ in 0..=BLANK_ROW_LIMIT {
            rows.push(vec![Cell::Blank]);
        }
        rows.push(vec![text("unreachable")]);
        let sheet = Sheet {
            name: "Sheet1".to_owned(),
            rows,
        };
        assert_eq!(chunks(vec![sheet]), vec!["first"]);
    }

    #[test]
    fn sheets_flush_independently() {
        let one = Sheet {
            name: "one".to_owned(),
            rows: vec![vec![text("alpha")]],
        };
        let two = Sheet {
            name: "two".to_owned(),
            rows: vec![vec![text("beta")]],
        };
        assert_eq!(chunks(vec![one, two]), vec!["alpha", "beta"]);
    }
}
