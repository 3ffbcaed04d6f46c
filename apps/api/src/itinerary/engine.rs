//! Activity positioning engine.
//!
//! All itinerary mutations flow through here: inserting a new activity at
//! its time-sorted position, updating/deleting by `(time, activity)` match,
//! and moving rows between day sheets. The engine owns the ordering of
//! cache invalidation around each remote mutation and the degraded paths
//! (append on failed insert, in-place clear on failed delete, distinct
//! partial-move surfacing).
//!
//! Mutations on the same day are serialized by a per-day async lock. The
//! remote store offers no transactions, so this is the only thing keeping
//! concurrent read-modify-write sequences from interleaving.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::warn;

use crate::cache::{Cache, SheetRows, HEADERS_KEY};
use crate::errors::AppError;
use crate::itinerary::rows::{classify_rows, Activity, Row, COLUMN_SPAN, DAY_COUNT};
use crate::itinerary::timecmp;
use crate::sheets::{row_range, RowStore, SheetsError};

/// How the insertion index passed to the remote store is computed.
///
/// The position scan tracks how many divider rows it skipped; whether that
/// count is subtracted from the final index is selectable until resolved
/// against the live sheet (see DESIGN.md). `Physical` is the default: the
/// store's insert API addresses physical rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Physical,
    DividerAdjusted,
}

pub fn day_sheet(day: u8) -> String {
    format!("Day {day}")
}

/// One async lock per trip day, serializing read-modify-write per day key.
#[derive(Clone)]
struct DayLocks {
    inner: Arc<[Mutex<()>; DAY_COUNT as usize]>,
}

impl DayLocks {
    fn new() -> Self {
        Self {
            inner: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        }
    }

    async fn acquire(&self, day: u8) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner[(day - 1) as usize].lock().await
    }
}

/// Locates a row by its natural identity: no surrogate row id survives the
/// round-trip to the browser, so `(time, activity)` is the key.
#[derive(Debug, Clone)]
pub struct MatchKey {
    pub time: String,
    pub activity: String,
}

impl MatchKey {
    fn matches(&self, activity: &Activity) -> bool {
        activity.time.trim() == self.time.trim()
            && activity.activity.trim() == self.activity.trim()
    }
}

/// Partial update over an existing activity; unset fields carry over from
/// the matched row (notably visibility and the image URL).
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub time: Option<String>,
    pub activity: Option<String>,
    pub notes: Option<String>,
    pub cost: Option<String>,
    pub link: Option<String>,
    pub visible: Option<bool>,
    pub image_url: Option<String>,
}

impl ActivityPatch {
    fn apply(self, existing: Activity) -> Activity {
        Activity {
            time: self.time.unwrap_or(existing.time),
            activity: self.activity.unwrap_or(existing.activity),
            notes: self.notes.unwrap_or(existing.notes),
            cost: self.cost.unwrap_or(existing.cost),
            link: self.link.unwrap_or(existing.link),
            visible: self.visible.unwrap_or(existing.visible),
            image_url: self.image_url.unwrap_or(existing.image_url),
        }
    }
}

#[derive(Debug)]
pub struct InsertOutcome {
    pub row: usize,
    pub range: String,
    /// True when the sorted insert failed and the row was appended past the
    /// end instead, ignoring time order.
    pub appended: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row was removed and subsequent rows shifted up.
    Removed,
    /// Hard delete failed; the row's cells were blanked in place to avoid
    /// corrupting indices mid-failure. Reported as success with a note.
    Cleared,
}

#[derive(Debug)]
pub struct MoveOutcome {
    pub row: usize,
    pub range: String,
}

/// One day of the merged listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayListing {
    pub day: u8,
    pub date: String,
    pub title: String,
    pub activities: Vec<Activity>,
}

#[derive(Clone)]
pub struct PositioningEngine {
    store: Arc<dyn RowStore>,
    cache: Arc<Cache>,
    headers_sheet: String,
    index_mode: IndexMode,
    locks: DayLocks,
}

impl PositioningEngine {
    pub fn new(
        store: Arc<dyn RowStore>,
        cache: Arc<Cache>,
        headers_sheet: String,
        index_mode: IndexMode,
    ) -> Self {
        Self {
            store,
            cache,
            headers_sheet,
            index_mode,
            locks: DayLocks::new(),
        }
    }

    async fn day_rows(&self, day: u8) -> Result<SheetRows, SheetsError> {
        let key = Cache::day_key(day);
        if let Some(rows) = self.cache.get(&key) {
            return Ok(rows);
        }
        let rows = self.store.read_rows(&day_sheet(day)).await?;
        self.cache.set(&key, rows.clone());
        Ok(rows)
    }

    async fn headers_rows(&self) -> Result<SheetRows, SheetsError> {
        if let Some(rows) = self.cache.get(HEADERS_KEY) {
            return Ok(rows);
        }
        let rows = self.store.read_rows(&self.headers_sheet).await?;
        self.cache.set(HEADERS_KEY, rows.clone());
        Ok(rows)
    }

    /// Physical insertion index keeping activity rows ascending by parsed
    /// time. Divider and header rows are skipped by the scan; whether the
    /// divider count is subtracted from the final index depends on
    /// [`IndexMode`].
    fn insertion_index(&self, raw: &SheetRows, new_time: &str) -> usize {
        let rows = classify_rows(raw);
        let offset = usize::from(matches!(rows.first(), Some(Row::ColumnHeader)));
        let mut divider_count = 0usize;
        for (idx, row) in rows.iter().enumerate().skip(offset) {
            match row {
                Row::Divider { .. } => divider_count += 1,
                Row::Activity(existing) => {
                    // First row the new activity sorts at-or-before.
                    if timecmp::compare(new_time, &existing.time) != Ordering::Greater {
                        return match self.index_mode {
                            IndexMode::Physical => idx,
                            IndexMode::DividerAdjusted => idx - divider_count,
                        };
                    }
                }
                Row::ColumnHeader | Row::Blank => {}
            }
        }
        raw.len()
    }

    async fn insert_sorted(
        &self,
        sheet: &str,
        row: usize,
        activity: &Activity,
    ) -> Result<(), SheetsError> {
        let gid = self.store.sheet_gid(sheet).await?;
        self.store.insert_row_at(sheet, gid, row).await?;
        self.store.write_range(sheet, row, &activity.to_cells()).await
    }

    pub async fn insert(&self, day: u8, activity: Activity) -> Result<InsertOutcome, AppError> {
        let _guard = self.locks.acquire(day).await;
        let sheet = day_sheet(day);
        let raw = self.day_rows(day).await.map_err(AppError::from)?;
        let insert_at = self.insertion_index(&raw, &activity.time);

        let outcome = match self.insert_sorted(&sheet, insert_at, &activity).await {
            Ok(()) => Ok(InsertOutcome {
                row: insert_at,
                range: row_range(&sheet, insert_at),
                appended: false,
            }),
            Err(err) => {
                warn!("sorted insert at row {insert_at} in '{sheet}' failed ({err}), appending instead");
                self.store
                    .append_row(&sheet, &activity.to_cells())
                    .await
                    .map(|()| InsertOutcome {
                        row: raw.len(),
                        range: row_range(&sheet, raw.len()),
                        appended: true,
                    })
                    .map_err(AppError::from)
            }
        };
        self.cache.invalidate_prefix(&Cache::day_key(day));
        outcome
    }

    pub async fn update(
        &self,
        day: u8,
        key: &MatchKey,
        patch: ActivityPatch,
    ) -> Result<Activity, AppError> {
        let _guard = self.locks.acquire(day).await;
        let sheet = day_sheet(day);

        // Stale cached rows could point at a row since shifted by another
        // mutation; drop the entry so the match scan reads fresh data.
        self.cache.invalidate_prefix(&Cache::day_key(day));
        let raw = self.day_rows(day).await.map_err(AppError::from)?;
        let (idx, existing) = find_match(&raw, key).ok_or_else(|| no_match(day, key))?;

        let updated = patch.apply(existing);
        let written = self.store.write_range(&sheet, idx, &updated.to_cells()).await;
        self.cache.invalidate_prefix(&Cache::day_key(day));
        written.map_err(AppError::from)?;
        Ok(updated)
    }

    pub async fn delete(&self, day: u8, key: &MatchKey) -> Result<DeleteOutcome, AppError> {
        let _guard = self.locks.acquire(day).await;
        let sheet = day_sheet(day);
        let gid = self.store.sheet_gid(&sheet).await.map_err(AppError::from)?;
        let raw = self.day_rows(day).await.map_err(AppError::from)?;
        let (idx, _) = find_match(&raw, key).ok_or_else(|| no_match(day, key))?;

        let outcome = match self.store.delete_row_at(&sheet, gid, idx).await {
            Ok(()) => Ok(DeleteOutcome::Removed),
            Err(err) => {
                warn!("hard delete of row {idx} in '{sheet}' failed ({err}), clearing in place");
                self.store
                    .write_range(&sheet, idx, &vec![String::new(); COLUMN_SPAN])
                    .await
                    .map(|()| DeleteOutcome::Cleared)
                    .map_err(AppError::from)
            }
        };
        self.cache.invalidate_prefix(&Cache::day_key(day));
        outcome
    }

    /// Moves a row to the end of the target day sheet: appended, not
    /// time-sorted, a looser guarantee than `insert`. If the source delete
    /// fails after the target write, the row exists in both sheets; that
    /// state is surfaced as [`AppError::PartialMove`], never collapsed into
    /// a generic failure.
    pub async fn move_activity(
        &self,
        source_day: u8,
        target_day: u8,
        key: &MatchKey,
        patch: ActivityPatch,
    ) -> Result<MoveOutcome, AppError> {
        // Fixed lock order prevents deadlock between concurrent moves.
        let (lo, hi) = if source_day <= target_day {
            (source_day, target_day)
        } else {
            (target_day, source_day)
        };
        let _lo = self.locks.acquire(lo).await;
        let _hi = if hi != lo {
            Some(self.locks.acquire(hi).await)
        } else {
            None
        };

        self.cache.invalidate_prefix(&Cache::day_key(source_day));
        self.cache.invalidate_prefix(&Cache::day_key(target_day));

        let source_sheet = day_sheet(source_day);
        let target_sheet = day_sheet(target_day);

        let source_raw = self.day_rows(source_day).await.map_err(AppError::from)?;
        let (src_idx, existing) =
            find_match(&source_raw, key).ok_or_else(|| no_match(source_day, key))?;
        let moved = patch.apply(existing);

        let target_raw = self.day_rows(target_day).await.map_err(AppError::from)?;
        let append_at = target_raw.len();

        let result = match self
            .store
            .write_range(&target_sheet, append_at, &moved.to_cells())
            .await
        {
            Err(err) => Err(AppError::from(err)),
            Ok(()) => match self.delete_source(&source_sheet, src_idx).await {
                Ok(()) => Ok(MoveOutcome {
                    row: append_at,
                    range: row_range(&target_sheet, append_at),
                }),
                Err(err) => Err(AppError::PartialMove(format!(
                    "activity now exists on day {target_day} but the source row on day {source_day} could not be deleted: {err}"
                ))),
            },
        };

        self.cache.invalidate_prefix(&Cache::day_key(source_day));
        self.cache.invalidate_prefix(&Cache::day_key(target_day));
        result
    }

    async fn delete_source(&self, sheet: &str, row: usize) -> Result<(), SheetsError> {
        let gid = self.store.sheet_gid(sheet).await?;
        self.store.delete_row_at(sheet, gid, row).await
    }

    /// Merged listing across all days, dividers injected from the headers
    /// sheet. Day fetches run concurrently; a failed day contributes zero
    /// rows rather than aborting the whole response.
    pub async fn full_listing(&self, include_hidden: bool) -> Result<Vec<DayListing>, AppError> {
        let headers = self.headers_rows().await.map_err(AppError::from)?;

        let mut fetches = JoinSet::new();
        for day in 1..=DAY_COUNT {
            let engine = self.clone();
            fetches.spawn(async move { (day, engine.day_rows(day).await) });
        }

        let mut per_day: Vec<Vec<Activity>> = vec![Vec::new(); DAY_COUNT as usize];
        while let Some(joined) = fetches.join_next().await {
            let (day, fetched) = joined.map_err(anyhow::Error::from)?;
            per_day[(day - 1) as usize] = match fetched {
                Ok(raw) => day_activities(&raw),
                Err(err) => {
                    warn!("fetch for day {day} failed, returning no rows: {err}");
                    Vec::new()
                }
            };
        }

        let listings = (1..=DAY_COUNT)
            .map(|day| {
                let (date, title) = divider_meta(&headers, day);
                let activities = std::mem::take(&mut per_day[(day - 1) as usize])
                    .into_iter()
                    .filter(|a| include_hidden || a.visible)
                    .collect();
                DayListing {
                    day,
                    date,
                    title,
                    activities,
                }
            })
            .collect();
        Ok(listings)
    }
}

fn day_activities(raw: &SheetRows) -> Vec<Activity> {
    classify_rows(raw)
        .into_iter()
        .filter_map(|row| match row {
            Row::Activity(a) => Some(a),
            _ => None,
        })
        .collect()
}

fn find_match(raw: &SheetRows, key: &MatchKey) -> Option<(usize, Activity)> {
    classify_rows(raw)
        .into_iter()
        .enumerate()
        .find_map(|(idx, row)| match row {
            Row::Activity(a) if key.matches(&a) => Some((idx, a)),
            _ => None,
        })
}

fn divider_meta(headers: &SheetRows, day: u8) -> (String, String) {
    let label = format!("day {day}");
    headers
        .iter()
        .find(|row| {
            row.get(1)
                .map(|c| c.trim().eq_ignore_ascii_case(&label))
                .unwrap_or(false)
        })
        .map(|row| {
            (
                row.first().cloned().unwrap_or_default(),
                row.get(2).cloned().unwrap_or_default(),
            )
        })
        .unwrap_or_default()
}

fn no_match(day: u8, key: &MatchKey) -> AppError {
    AppError::NotFound(format!(
        "no activity matching time '{}' and activity '{}' on day {day}",
        key.time, key.activity
    ))
}
