//! The widget set under test.
//!
//! Benchmarks talk to a [`Toolkit`] only. The worker builds its own toolkit
//! on its own thread through a [`ToolkitFactory`], so nothing the steps create
//! is ever shared with the foreground.

use std::sync::Arc;

pub type WindowId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Label,
    Button,
    Entry,
    Checkbox,
}

/// Size and position of a top-level window, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
}

impl Geometry {
    pub fn new(width: u32, height: u32, x: i32, y: i32) -> Self {
        Self {
            width,
            height,
            x,
            y,
        }
    }
}

pub trait Toolkit {
    /// Shown in reports and saved with the results.
    fn name(&self) -> &str;

    fn clear_rows(&mut self);
    fn insert_row(&mut self, item: &str, value: &str);
    fn row_count(&self) -> usize;

    fn set_label(&mut self, text: &str);
    fn set_progress(&mut self, value: f32, maximum: f32);

    fn open_window(&mut self, title: &str, geometry: Geometry) -> WindowId;
    /// Add a widget to `row` of a window's content, creating the row if needed.
    fn add_widget(&mut self, window: WindowId, row: usize, kind: WidgetKind, text: &str);
    fn close_window(&mut self, window: WindowId);
    fn open_window_count(&self) -> usize;

    /// Bring pending layout and rendering work up to date.
    fn flush(&mut self);
}

/// Builds a toolkit on the thread that will use it.
pub type ToolkitFactory = Arc<dyn Fn() -> Box<dyn Toolkit> + Send + Sync>;

pub fn headless_factory() -> ToolkitFactory {
    Arc::new(|| Box::new(HeadlessToolkit::new()) as Box<dyn Toolkit>)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessWidget {
    pub kind: WidgetKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    pub title: String,
    pub geometry: Geometry,
    pub rows: Vec<Vec<HeadlessWidget>>,
}

/// Retained in-memory widget tree. Used by the command line front end and
/// the tests; every operation does the bookkeeping a real toolkit would.
#[derive(Debug, Default)]
pub struct HeadlessToolkit {
    rows: Vec<(String, String)>,
    label: String,
    progress: (f32, f32),
    windows: Vec<Option<HeadlessWindow>>,
    open: usize,
    flushes: usize,
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self {
            label: "Dynamic Label: Idle".to_string(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn progress(&self) -> (f32, f32) {
        self.progress
    }

    pub fn window(&self, id: WindowId) -> Option<&HeadlessWindow> {
        self.windows.get(id).and_then(Option::as_ref)
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Toolkit for HeadlessToolkit {
    fn name(&self) -> &str {
        "headless"
    }

    fn clear_rows(&mut self) {
        self.rows.clear();
    }

    fn insert_row(&mut self, item: &str, value: &str) {
        self.rows.push((item.to_string(), value.to_string()));
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn set_label(&mut self, text: &str) {
        self.label.clear();
        self.label.push_str(text);
    }

    fn set_progress(&mut self, value: f32, maximum: f32) {
        self.progress = (value.min(maximum), maximum);
    }

    fn open_window(&mut self, title: &str, geometry: Geometry) -> WindowId {
        self.windows.push(Some(HeadlessWindow {
            title: title.to_string(),
            geometry,
            rows: Vec::new(),
        }));
        self.open += 1;
        self.windows.len() - 1
    }

    fn add_widget(&mut self, window: WindowId, row: usize, kind: WidgetKind, text: &str) {
        let Some(Some(win)) = self.windows.get_mut(window) else {
            return;
        };
        if win.rows.len() <= row {
            win.rows.resize_with(row + 1, Vec::new);
        }
        win.rows[row].push(HeadlessWidget {
            kind,
            text: text.to_string(),
        });
    }

    fn close_window(&mut self, window: WindowId) {
        if let Some(slot) = self.windows.get_mut(window) {
            if slot.take().is_some() {
                self.open -= 1;
            }
        }
    }

    fn open_window_count(&self) -> usize {
        self.open
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
