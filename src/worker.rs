// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Background image decode.
//!
//! The expensive work (decode from disk, resize for the pane) runs on a
//! worker thread; the terminal protocol upload stays on the UI thread, which
//! polls [`ImageLoader::try_recv`]. One load is in flight at a time: a new
//! request signals the previous worker to cancel and joins it before
//! spawning the next, so a superseded result is never delivered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use image::DynamicImage;
use image::imageops::FilterType;

use crate::fit::{FitMode, compute_target};

pub struct LoadRequest {
    pub path: PathBuf,
    /// Pane size in pixels.
    pub target: (u32, u32),
    pub fit_mode: FitMode,
    pub resize_filter: FilterType,
}

pub struct LoadedImage {
    pub path: PathBuf,
    pub fit_mode: FitMode,
    pub original_size: (u32, u32),
    pub image: DynamicImage,
}

pub struct ImageLoader {
    result_tx: Sender<LoadedImage>,
    result_rx: Receiver<LoadedImage>,
    cancel: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl ImageLoader {
    pub fn new() -> Self {
        let (result_tx, result_rx) = mpsc::channel::<LoadedImage>();
        Self {
            result_tx,
            result_rx,
            cancel: None,
            handle: None,
        }
    }

    /// Start a load, superseding any in-flight one. Blocks until the
    /// previous worker has observed the cancellation flag and exited, then
    /// discards anything it managed to deliver.
    pub fn load(&mut self, req: LoadRequest) {
        self.cancel_and_join();
        while self.result_rx.try_recv().is_ok() {}

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        let result_tx = self.result_tx.clone();
        let handle = thread::spawn(move || Self::run(req, &flag, &result_tx));
        self.cancel = Some(cancel);
        self.handle = Some(handle);
    }

    pub fn try_recv(&self) -> Option<LoadedImage> {
        self.result_rx.try_recv().ok()
    }

    fn cancel_and_join(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn run(req: LoadRequest, cancel: &AtomicBool, result_tx: &Sender<LoadedImage>) {
        let Some(decoded) = Self::decode_image(&req.path) else {
            log::warn!("decode failed: {:?}", req.path);
            return;
        };
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        let original_size = (decoded.width(), decoded.height());
        let resized = Self::scale(decoded, req.target, req.fit_mode, req.resize_filter);
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        let _ = result_tx.send(LoadedImage {
            path: req.path,
            fit_mode: req.fit_mode,
            original_size,
            image: resized,
        });
    }

    pub fn decode_image(path: &Path) -> Option<DynamicImage> {
        image::ImageReader::open(path).ok()?.decode().ok()
    }

    fn scale(img: DynamicImage, max: (u32, u32), fit: FitMode, filter: FilterType) -> DynamicImage {
        let (max_w, max_h) = max;
        if max_w == 0 || max_h == 0 {
            return img;
        }
        match fit {
            FitMode::Contain => {
                let (w, h) = compute_target((img.width(), img.height()), max, fit);
                if (w, h) == (img.width(), img.height()) {
                    img
                } else {
                    img.resize(w, h, filter)
                }
            }
            FitMode::Cover => img.resize_to_fill(max_w, max_h, filter),
        }
    }
}

impl Drop for ImageLoader {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}
