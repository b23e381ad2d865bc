/**
 * Widget Bench GUI - iced toolkit
 * iced_toolkit.rs
 * Implements the engine's Toolkit trait with real iced widgets. The widgets are
 * built and dropped on the benchmark worker's thread; they never reach the
 * window the user is looking at.
 */
use bench_engine::{Geometry, Toolkit, ToolkitFactory, WidgetKind, WindowId};
use iced::widget::{Button, Checkbox, Column, Container, ProgressBar, Row, Text, TextInput};
use iced::window;
use iced::Element;
use std::sync::Arc;

type Widget = Element<'static, ()>;

// An offscreen top-level window: its settings plus rows of content widgets.
struct OffscreenWindow {
    settings: window::Settings,
    title: String,
    rows: Vec<Vec<Widget>>,
}

pub struct IcedToolkit {
    pending_rows: Vec<Widget>, // Rows inserted since the last flush.
    chunks: Vec<Widget>,       // Flushed rows, grouped into columns.
    row_count: usize,
    #[allow(dead_code)]
    label: Widget,
    #[allow(dead_code)]
    progress: Widget,
    windows: Vec<Option<OffscreenWindow>>,
    open: usize,
    frames: usize,
}

impl IcedToolkit {
    pub fn new() -> Self {
        IcedToolkit {
            pending_rows: Vec::new(),
            chunks: Vec::new(),
            row_count: 0,
            label: Text::new("Dynamic Label: Idle").into(),
            progress: ProgressBar::new(0.0..=1.0, 0.0).into(),
            windows: Vec::new(),
            open: 0,
            frames: 0,
        }
    }

    /// Number of flushes so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Row columns composed by flushes since the last clear.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl Default for IcedToolkit {
    fn default() -> Self {
        Self::new()
    }
}

/*
 * Factory handed to the RunController. The closure runs on the worker thread,
 * so the widgets it builds stay there.
 */
pub fn iced_factory() -> ToolkitFactory {
    Arc::new(|| Box::new(IcedToolkit::new()) as Box<dyn Toolkit>)
}

fn build_widget(kind: WidgetKind, text: &str) -> Widget {
    match kind {
        WidgetKind::Label => Text::new(text.to_string()).into(),
        WidgetKind::Button => Button::new(Text::new(text.to_string())).padding(1).into(),
        WidgetKind::Entry => TextInput::new("", text).width(50).into(),
        WidgetKind::Checkbox => Checkbox::new(text.to_string(), false, |_| ()).into(),
    }
}

impl Toolkit for IcedToolkit {
    fn name(&self) -> &str {
        "iced"
    }

    fn clear_rows(&mut self) {
        self.pending_rows.clear();
        self.chunks.clear();
        self.row_count = 0;
    }

    fn insert_row(&mut self, item: &str, value: &str) {
        let row = Row::new()
            .push(Text::new(item.to_string()).width(150))
            .push(Text::new(value.to_string()).width(150));
        self.pending_rows.push(row.into());
        self.row_count += 1;
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn set_label(&mut self, text: &str) {
        self.label = Text::new(text.to_string()).into();
    }

    fn set_progress(&mut self, value: f32, maximum: f32) {
        let maximum = maximum.max(f32::EPSILON);
        self.progress = ProgressBar::new(0.0..=maximum, value.min(maximum))
            .width(300)
            .into();
    }

    fn open_window(&mut self, title: &str, geometry: Geometry) -> WindowId {
        let settings = window::Settings {
            size: (geometry.width, geometry.height),
            position: window::Position::Specific(geometry.x, geometry.y),
            ..window::Settings::default()
        };
        self.windows.push(Some(OffscreenWindow {
            settings,
            title: title.to_string(),
            rows: Vec::new(),
        }));
        self.open += 1;
        self.windows.len() - 1
    }

    fn add_widget(&mut self, window: WindowId, row: usize, kind: WidgetKind, text: &str) {
        if let Some(Some(win)) = self.windows.get_mut(window) {
            if win.rows.len() <= row {
                win.rows.resize_with(row + 1, Vec::new);
            }
            win.rows[row].push(build_widget(kind, text));
        }
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

    /*
     * Compose everything built since the last flush into containers, the way a
     * frame would before layout: pending list rows become one column, and each
     * open window's rows become that window's content.
     */
    fn flush(&mut self) {
        if !self.pending_rows.is_empty() {
            let rows = std::mem::take(&mut self.pending_rows);
            self.chunks.push(Column::with_children(rows).spacing(2).into());
        }
        for win in self.windows.iter_mut().flatten() {
            if win.rows.is_empty() {
                continue;
            }
            let rows: Vec<Widget> = std::mem::take(&mut win.rows)
                .into_iter()
                .map(|widgets| Row::with_children(widgets).spacing(1).into())
                .collect();
            let content: Widget = Container::new(Column::with_children(rows))
                .width(win.settings.size.0 as f32)
                .into();
            // Composed content is kept as the window's single row.
            win.rows.push(vec![content]);
            tracing::trace!("flushed window {}", win.title);
        }
        self.frames += 1;
    }
}
