//! Row classification and the activity data model.
//!
//! A day sheet interleaves three kinds of rows: an optional column-header
//! row (first cell literally `Date`), day-divider rows (date in the first
//! cell, `Day N` in the second), and the activity rows themselves. Raw
//! cells are classified once at read time into a tagged [`Row`] so that
//! the positioning engine never re-derives row kind from cell patterns.
//!
//! Sheet column layout, A through H: date (dividers only), time, activity,
//! notes, cost, link, visible, image URL.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use crate::sheets::COLUMN_SPAN;

/// Number of trip days; day sheets are named `Day 1` through `Day 10`.
pub const DAY_COUNT: u8 = 10;

const TIME_COL: usize = 1;
const ACTIVITY_COL: usize = 2;
const NOTES_COL: usize = 3;
const COST_COL: usize = 4;
const LINK_COL: usize = 5;
const VISIBLE_COL: usize = 6;
const IMAGE_COL: usize = 7;

/// One trip event. `visible` is a real boolean in the model; the sheet's
/// literal `"true"`/`"false"` strings exist only at the cell boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub time: String,
    pub activity: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub link: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub image_url: String,
}

fn default_visible() -> bool {
    true
}

impl Activity {
    /// Marshals into the sheet's column layout. The date column stays empty:
    /// only divider rows carry a date.
    pub fn to_cells(&self) -> Vec<String> {
        vec![
            String::new(),
            self.time.clone(),
            self.activity.clone(),
            self.notes.clone(),
            self.cost.clone(),
            self.link.clone(),
            self.visible.to_string(),
            self.image_url.clone(),
        ]
    }

    /// Reads an activity from a (possibly ragged) cell row. A missing or
    /// non-`"false"` visible cell means visible.
    pub fn from_cells(cells: &[String]) -> Self {
        Self {
            time: cell(cells, TIME_COL),
            activity: cell(cells, ACTIVITY_COL),
            notes: cell(cells, NOTES_COL),
            cost: cell(cells, COST_COL),
            link: cell(cells, LINK_COL),
            visible: cells
                .get(VISIBLE_COL)
                .map(|v| v.trim() != "false")
                .unwrap_or(true),
            image_url: cell(cells, IMAGE_COL),
        }
    }
}

fn cell(cells: &[String], idx: usize) -> String {
    cells.get(idx).cloned().unwrap_or_default()
}

/// A day-sheet row, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Column-header sentinel: first cell literally `Date`.
    ColumnHeader,
    /// Day boundary. Never reordered and never a target for insertion math.
    Divider {
        date: String,
        label: String,
        title: String,
    },
    Activity(Activity),
    /// Leftover of a fallback clear; skipped everywhere.
    Blank,
}

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Numeric (5/12, 05-12-2026) or written (June 5, Jun 5, 2026) dates.
        Regex::new(r"(?i)^(\d{1,2}[/.-]\d{1,2}([/.-]\d{2,4})?|[a-z]{3,9}\.?\s+\d{1,2}(,\s*\d{4})?)$")
            .expect("date pattern must compile")
    })
}

fn day_label_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^day\s+\d+$").expect("day label pattern must compile"))
}

/// Classifies one raw cell row.
pub fn classify_row(cells: &[String]) -> Row {
    if cells.iter().all(|c| c.trim().is_empty()) {
        return Row::Blank;
    }
    let first = cells.first().map(|c| c.trim()).unwrap_or("");
    if first == "Date" {
        return Row::ColumnHeader;
    }
    let second = cells.get(1).map(|c| c.trim()).unwrap_or("");
    if date_pattern().is_match(first) && day_label_pattern().is_match(second) {
        return Row::Divider {
            date: first.to_string(),
            label: second.to_string(),
            title: cell(cells, 2).trim().to_string(),
        };
    }
    Row::Activity(Activity::from_cells(cells))
}

pub fn classify_rows(rows: &[Vec<String>]) -> Vec<Row> {
    rows.iter().map(|cells| classify_row(cells)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_column_header_sentinel() {
        let row = cells(&["Date", "Time", "Activity", "Notes"]);
        assert_eq!(classify_row(&row), Row::ColumnHeader);
    }

    #[test]
    fn test_divider_numeric_date() {
        let row = cells(&["6/5", "Day 2", "Old Town"]);
        assert_eq!(
            classify_row(&row),
            Row::Divider {
                date: "6/5".to_string(),
                label: "Day 2".to_string(),
                title: "Old Town".to_string(),
            }
        );
    }

    #[test]
    fn test_divider_written_date() {
        let row = cells(&["June 5, 2026", "Day 10", ""]);
        assert!(matches!(classify_row(&row), Row::Divider { .. }));
    }

    #[test]
    fn test_date_without_day_label_is_activity() {
        // The divider sentinel needs both cells; a bare date in the first
        // cell is still an activity row.
        let row = cells(&["6/5", "9:00am", "Breakfast"]);
        assert!(matches!(classify_row(&row), Row::Activity(_)));
    }

    #[test]
    fn test_blank_row() {
        assert_eq!(classify_row(&cells(&["", "  ", ""])), Row::Blank);
        assert_eq!(classify_row(&[]), Row::Blank);
    }

    #[test]
    fn test_activity_from_ragged_row() {
        let row = cells(&["", "9:30am", "Souk visit"]);
        match classify_row(&row) {
            Row::Activity(a) => {
                assert_eq!(a.time, "9:30am");
                assert_eq!(a.activity, "Souk visit");
                assert_eq!(a.notes, "");
                assert!(a.visible, "missing visible cell defaults to true");
            }
            other => panic!("expected activity, got {other:?}"),
        }
    }

    #[test]
    fn test_visible_false_cell() {
        let row = cells(&["", "9:30am", "Hidden stop", "", "", "", "false"]);
        match classify_row(&row) {
            Row::Activity(a) => assert!(!a.visible),
            other => panic!("expected activity, got {other:?}"),
        }
    }

    #[test]
    fn test_cells_round_trip_visibility_literal() {
        let activity = Activity {
            time: "8:00pm".to_string(),
            activity: "Dinner".to_string(),
            notes: "book ahead".to_string(),
            cost: "200".to_string(),
            link: String::new(),
            visible: false,
            image_url: String::new(),
        };
        let cells = activity.to_cells();
        assert_eq!(cells.len(), COLUMN_SPAN);
        assert_eq!(cells[6], "false");
        assert_eq!(Activity::from_cells(&cells), activity);
    }
}
