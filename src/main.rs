// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Application entry point and event loop.
//!
//! This module:
//! - parses CLI args (library root, catalog override)
//! - wires the catalog, file index and selector together
//! - runs the main input loop (vim-like navigation + counts)
//!
//! Image decode runs on the loader thread (see `src/worker.rs`); everything
//! else happens here on the UI thread.

mod app;
mod catalog;
mod config;
mod fit;
mod library;
mod select;
mod worker;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal,
};
use ratatui::layout::Rect;
use simplelog::WriteLogger;

use crate::app::App;
use crate::catalog::Catalog;
use crate::config::{Config, parse_filter_type};
use crate::library::TitleFileIndex;
use crate::select::RandomSelector;

#[derive(Parser, Debug)]
#[command(
    name = "barks",
    about = "Barks Reader - terminal browser for a digitized comic-book library"
)]
struct Cli {
    /// Library root directory
    library: PathBuf,
    /// Catalog file (defaults to <library>/catalog.json)
    #[arg(long)]
    catalog: Option<PathBuf>,
}

/// Logging goes to a file so it cannot tear the TUI. Off unless asked for.
fn init_logging(config: &Config) -> Result<()> {
    let path = match &config.log_file {
        Some(path) => path.clone(),
        None if config.debug => PathBuf::from("/tmp/barks.log"),
        None => return Ok(()),
    };
    let level = if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let file = std::fs::File::create(&path)
        .with_context(|| format!("failed to create log file {path:?}"))?;
    WriteLogger::init(level, simplelog::Config::default(), file)?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();
    init_logging(&config)?;

    let catalog_path = cli
        .catalog
        .clone()
        .or_else(|| config.catalog_path.clone())
        .unwrap_or_else(|| cli.library.join("catalog.json"));
    let catalog = Catalog::load(&catalog_path)?;

    let fallback_image = config
        .fallback_image
        .clone()
        .unwrap_or_else(|| cli.library.join("fallback.png"));
    let index = TitleFileIndex::for_library(&cli.library);
    let selector = RandomSelector::new(
        index,
        fallback_image,
        config.fallback_title.clone(),
        config.recent_capacity,
    );

    init_terminal()?;
    let result = run(catalog, selector, &config);
    restore_terminal();

    result
}

fn run(catalog: Catalog, selector: RandomSelector, config: &Config) -> Result<()> {
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut app = App::new(catalog, selector, parse_filter_type(&config.resize_filter));
    let mut count: u32 = 0;

    // Open on a random image.
    app.show_random(terminal_rect()?);

    loop {
        app.poll_loader();

        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                if let KeyCode::Char(c) = key.code
                    && c.is_ascii_digit()
                {
                    // Vim-like count prefix: `1..9` start, `0` continues.
                    if c != '0' || count != 0 {
                        count = count
                            .saturating_mul(10)
                            .saturating_add((c as u8 - b'0') as u32);
                        continue;
                    }
                }

                let n = count.max(1) as i32;
                let rect = terminal_rect()?;
                match key.code {
                    KeyCode::Char('q') => app.should_quit = true,
                    KeyCode::Char('j') => app.move_by(n),
                    KeyCode::Char('k') => app.move_by(-n),
                    KeyCode::Char('g') => {
                        if count > 0 {
                            app.go_to_1based(count as usize);
                        } else {
                            app.go_first();
                        }
                    }
                    KeyCode::Char('G') => {
                        if count > 0 {
                            app.go_to_1based(count as usize);
                        } else {
                            app.go_last();
                        }
                    }
                    KeyCode::Char('r') => app.show_random(rect),
                    KeyCode::Enter => app.show_highlighted_title(rect),
                    KeyCode::Char('s') => app.show_search_image(rect),
                    KeyCode::Char('t') => app.cycle_type_filter(),
                    KeyCode::Char('e') => app.toggle_edited_only(),
                    KeyCode::Char('x') => app.toggle_random_fit(),
                    KeyCode::Char('f') => app.toggle_fit(rect),
                    _ => {}
                }
                count = 0;
            }
        }

        if app.should_quit {
            break;
        }

        terminal.draw(|frame| app.render(frame))?;

        // Wait for next event or decode result.
        let _ = event::poll(Duration::from_millis(16));
    }

    Ok(())
}

fn terminal_rect() -> Result<Rect> {
    let (w, h) = terminal::size()?;
    Ok(Rect::new(0, 0, w, h))
}

fn init_terminal() -> std::io::Result<()> {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::Hide,
        execute,
        terminal::{EnterAlternateScreen, enable_raw_mode},
    };

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen, Hide)?;
    Ok(())
}

fn restore_terminal() {
    use std::io::stdout;

    use ratatui::crossterm::{
        cursor::Show,
        execute,
        terminal::{LeaveAlternateScreen, disable_raw_mode},
    };

    let _ = disable_raw_mode();
    let _ = execute!(stdout(), LeaveAlternateScreen, Show);
}
