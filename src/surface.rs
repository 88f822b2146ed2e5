use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Enabled flag and label of an interactive control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlState {
    pub enabled: bool,
    pub label: String,
}

impl ControlState {
    pub fn new(enabled: bool, label: impl Into<String>) -> Self {
        Self {
            enabled,
            label: label.into(),
        }
    }
}

/// Write-only set of named display regions.
///
/// Projectors only ever write through this trait; they never read back what
/// they rendered.
pub trait DisplaySurface: Send + Sync {
    fn write(&self, region: &str, value: &str);
    fn clear_rows(&self, table: &str);
    fn push_row(&self, table: &str, cells: Vec<String>);
    fn set_control_state(&self, control: &str, state: ControlState);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SurfaceView {
    pub regions: BTreeMap<String, String>,
    pub tables: BTreeMap<String, Vec<Vec<String>>>,
    pub controls: BTreeMap<String, ControlState>,
}

/// Display surface kept in memory, served over HTTP and printed by `--once`.
#[derive(Debug, Default)]
pub struct MemorySurface {
    inner: RwLock<SurfaceView>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SurfaceView {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SurfaceView> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, SurfaceView> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
impl MemorySurface {
    pub fn region(&self, region: &str) -> Option<String> {
        self.read().regions.get(region).cloned()
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.read().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn control(&self, control: &str) -> Option<ControlState> {
        self.read().controls.get(control).cloned()
    }
}

impl DisplaySurface for MemorySurface {
    fn write(&self, region: &str, value: &str) {
        self.write_guard()
            .regions
            .insert(region.to_string(), value.to_string());
    }

    fn clear_rows(&self, table: &str) {
        self.write_guard()
            .tables
            .insert(table.to_string(), Vec::new());
    }

    fn push_row(&self, table: &str, cells: Vec<String>) {
        self.write_guard()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(cells);
    }

    fn set_control_state(&self, control: &str, state: ControlState) {
        self.write_guard()
            .controls
            .insert(control.to_string(), state);
    }
}

impl SurfaceView {
    /// Plain-text dump, one region per line followed by the tables.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let width = self.regions.keys().map(String::len).max().unwrap_or(0);
        for (name, value) in &self.regions {
            let _ = writeln!(out, "{name:<width$}  {value}");
        }
        for (name, state) in &self.controls {
            let flag = if state.enabled { "enabled" } else { "disabled" };
            let _ = writeln!(out, "{name:<width$}  [{}] ({flag})", state.label);
        }
        for (name, rows) in &self.tables {
            let _ = writeln!(out, "\n{name} ({} rows)", rows.len());
            for row in rows {
                let _ = writeln!(out, "  {}", row.join(" | "));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_rows_discards_previous_rows() {
        let surface = MemorySurface::new();
        surface.push_row("t", vec!["a".to_string()]);
        surface.push_row("t", vec!["b".to_string()]);
        assert_eq!(surface.rows("t").len(), 2);

        surface.clear_rows("t");
        assert!(surface.rows("t").is_empty());
        surface.push_row("t", vec!["c".to_string()]);
        assert_eq!(surface.rows("t"), vec![vec!["c".to_string()]]);
    }

    #[test]
    fn text_dump_lists_regions_controls_and_tables() {
        let surface = MemorySurface::new();
        surface.write("cpu-usage", "12.5%");
        surface.set_control_state("btn", ControlState::new(false, "Running..."));
        surface.push_row("procs", vec!["1".to_string(), "init".to_string()]);

        let text = surface.view().to_text();
        assert!(text.contains("cpu-usage  12.5%"));
        assert!(text.contains("[Running...] (disabled)"));
        assert!(text.contains("procs (1 rows)"));
        assert!(text.contains("  1 | init"));
    }
}
