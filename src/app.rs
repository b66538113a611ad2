// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Application state and orchestration.
//!
//! `App` owns:
//! - the catalog and the list cursor
//! - the random selector (file index + recency state)
//! - the background decode loader and the terminal graphics picker
//!
//! Methods are non-blocking; decode work is pushed to the loader and polled
//! back on the UI thread, where the protocol upload happens.

use std::path::PathBuf;

use image::imageops::FilterType;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui_image::picker::Picker;
use ratatui_image::protocol::StatefulProtocol;
use ratatui_image::{Resize, StatefulImage};

use crate::catalog::Catalog;
use crate::fit::FitMode;
use crate::library::FileType;
use crate::select::{ImageInfo, ImageQuery, RandomSelector};
use crate::worker::{ImageLoader, LoadRequest};

/// Width of the title list pane in cells.
const LIST_WIDTH: u16 = 34;

pub struct App {
    catalog: Catalog,
    selector: RandomSelector,
    loader: ImageLoader,
    picker: Picker,
    resize_filter: FilterType,
    pub should_quit: bool,
    cursor: usize,
    current: Option<ImageInfo>,
    protocol: Option<StatefulProtocol>,
    pending: Option<PathBuf>,
    type_filter: Option<FileType>,
    edited_only: bool,
    random_fit: bool,
    fit_override: Option<FitMode>,
}

impl App {
    pub fn new(catalog: Catalog, selector: RandomSelector, resize_filter: FilterType) -> Self {
        let picker = Picker::from_query_stdio().unwrap_or_else(|_| Picker::from_fontsize((8, 16)));
        App {
            catalog,
            selector,
            loader: ImageLoader::new(),
            picker,
            resize_filter,
            should_quit: false,
            cursor: 0,
            current: None,
            protocol: None,
            pending: None,
            type_filter: None,
            edited_only: false,
            random_fit: false,
            fit_override: None,
        }
    }

    pub fn move_by(&mut self, delta: i32) {
        if delta == 0 || self.catalog.is_empty() {
            return;
        }
        let len = self.catalog.len() as i32;
        self.cursor = (self.cursor as i32 + delta).rem_euclid(len) as usize;
    }

    pub fn go_first(&mut self) {
        self.cursor = 0;
    }

    pub fn go_last(&mut self) {
        self.cursor = self.catalog.len().saturating_sub(1);
    }

    pub fn go_to_1based(&mut self, n: usize) {
        if self.catalog.is_empty() {
            return;
        }
        self.cursor = n.saturating_sub(1).min(self.catalog.len() - 1);
    }

    /// Current constraints from the UI toggles.
    fn query(&self) -> ImageQuery {
        ImageQuery {
            file_types: match self.type_filter {
                Some(file_type) => vec![file_type],
                None => FileType::ALL.to_vec(),
            },
            edited_only: self.edited_only,
            random_fit: self.random_fit,
        }
    }

    /// Random image across the whole catalog.
    pub fn show_random(&mut self, terminal: Rect) {
        let query = self.query();
        match self.selector.pick(self.catalog.titles(), &query) {
            Ok(info) => self.show(info, terminal),
            Err(err) => log::error!("random pick failed: {err:#}"),
        }
    }

    /// Random image for the highlighted title.
    pub fn show_highlighted_title(&mut self, terminal: Rect) {
        let Some(title) = self.catalog.titles().get(self.cursor) else {
            return;
        };
        let id = title.id.clone();
        let query = self.query();
        match self.selector.pick_for_title(&id, &query) {
            Ok(path) => {
                let info = ImageInfo {
                    filename: path,
                    from_title: Some(id),
                    fit_mode: FitMode::Cover,
                };
                self.show(info, terminal);
            }
            Err(err) => log::error!("pick for {id} failed: {err:#}"),
        }
    }

    /// Search-demo image from the fixed allow-list.
    pub fn show_search_image(&mut self, terminal: Rect) {
        match self.selector.pick_search_image(&self.catalog) {
            Ok(info) => self.show(info, terminal),
            Err(err) => log::error!("search pick failed: {err:#}"),
        }
    }

    /// Display a fresh selection. Any manual fit override applies only to
    /// the image it was toggled on, so the new image keeps its assigned fit.
    fn show(&mut self, info: ImageInfo, terminal: Rect) {
        self.fit_override = None;
        self.current = Some(info);
        self.request_load(terminal);
    }

    /// Cycle the file-type filter through all roles and back to "any".
    pub fn cycle_type_filter(&mut self) {
        self.type_filter = match self.type_filter {
            None => Some(FileType::ALL[0]),
            Some(current) => FileType::ALL
                .iter()
                .position(|&ft| ft == current)
                .and_then(|idx| FileType::ALL.get(idx + 1))
                .copied(),
        };
    }

    pub fn toggle_edited_only(&mut self) {
        self.edited_only = !self.edited_only;
    }

    pub fn toggle_random_fit(&mut self) {
        self.random_fit = !self.random_fit;
    }

    /// Flip the displayed fit mode and re-request the current image at the
    /// new scaling.
    pub fn toggle_fit(&mut self, terminal: Rect) {
        let Some(info) = &self.current else {
            return;
        };
        let effective = self.fit_override.unwrap_or(info.fit_mode);
        self.fit_override = Some(effective.next());
        self.request_load(terminal);
    }

    /// Hand the current image to the decode worker, sized for the pane.
    fn request_load(&mut self, terminal: Rect) {
        let Some(info) = &self.current else {
            return;
        };
        let path = info.filename.clone();
        let fit_mode = self.fit_override.unwrap_or(info.fit_mode);

        let area = Self::image_area(terminal);
        let (cell_w, cell_h) = self.picker.font_size();
        if cell_w == 0 || cell_h == 0 || area.width == 0 || area.height == 0 {
            return;
        }
        let target = (
            u32::from(area.width) * u32::from(cell_w),
            u32::from(area.height) * u32::from(cell_h),
        );

        self.loader.load(LoadRequest {
            path: path.clone(),
            target,
            fit_mode,
            resize_filter: self.resize_filter,
        });
        self.pending = Some(path);
    }

    /// Drain completed decodes. The protocol upload must happen here, on the
    /// UI thread; the picker is never shared with the worker.
    pub fn poll_loader(&mut self) {
        while let Some(loaded) = self.loader.try_recv() {
            if self.pending.as_ref() == Some(&loaded.path) {
                self.pending = None;
            }
            self.protocol = Some(self.picker.new_resizable_protocol(loaded.image));
        }
    }

    /// Image pane within the terminal: everything right of the title list,
    /// above the status line.
    fn image_area(terminal: Rect) -> Rect {
        let cols = Layout::horizontal([Constraint::Length(LIST_WIDTH), Constraint::Min(1)])
            .split(terminal);
        let rows = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(cols[1]);
        rows[0]
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let cols = Layout::horizontal([Constraint::Length(LIST_WIDTH), Constraint::Min(1)])
            .split(frame.area());
        let rows = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(cols[1]);

        let items: Vec<ListItem> = self
            .catalog
            .titles()
            .iter()
            .map(|t| ListItem::new(t.title.clone()))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::RIGHT))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default();
        if !self.catalog.is_empty() {
            state.select(Some(self.cursor.min(self.catalog.len() - 1)));
        }
        frame.render_stateful_widget(list, cols[0], &mut state);

        if let Some(protocol) = &mut self.protocol {
            frame.render_stateful_widget(
                StatefulImage::default().resize(Resize::Fit(None)),
                rows[0],
                protocol,
            );
        }

        let status = self.status_text();
        frame.render_widget(Paragraph::new(status), rows[1]);
    }

    pub fn status_text(&self) -> String {
        let mut status = if self.catalog.is_empty() {
            "[0/0]".to_string()
        } else {
            let title = &self.catalog.titles()[self.cursor.min(self.catalog.len() - 1)];
            format!("[{}/{}] {}", self.cursor + 1, self.catalog.len(), title.title)
        };

        if let Some(info) = &self.current {
            let name = info
                .filename
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");
            let from = info
                .from_title
                .as_deref()
                .map(|id| self.catalog.display_name(id))
                .unwrap_or("?");
            status.push_str(&format!(" | {name} ({from})"));
            if self.pending.is_some() {
                status.push_str(" ...");
            }
        }

        if let Some(file_type) = self.type_filter {
            status.push_str(&format!(" [{}]", file_type.label()));
        }
        if self.edited_only {
            status.push_str(" [edited]");
        }
        if self.random_fit {
            status.push_str(" [random-fit]");
        }
        if let Some(fit) = self.fit_override {
            status.push_str(match fit {
                FitMode::Contain => " fit:contain",
                FitMode::Cover => " fit:cover",
            });
        }

        status
    }
}
