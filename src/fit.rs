// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Fit mode selection and scaling math.

use rand::Rng;

use crate::library::FileType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitMode {
    /// Whole image visible inside the pane, may letterbox.
    Contain,
    /// Fill the pane, may crop.
    #[default]
    Cover,
}

impl FitMode {
    /// Toggle between `Contain` and `Cover`.
    pub fn next(self) -> Self {
        match self {
            FitMode::Contain => FitMode::Cover,
            FitMode::Cover => FitMode::Contain,
        }
    }

    /// Fit mode for a chosen file. Covers read best letterboxed; everything
    /// else fills the pane. `random_fit` replaces the rule with a coin flip.
    pub fn for_file(file_type: FileType, random_fit: bool, rng: &mut impl Rng) -> Self {
        if random_fit {
            if rng.random_bool(0.5) {
                FitMode::Contain
            } else {
                FitMode::Cover
            }
        } else if file_type == FileType::Cover {
            FitMode::Contain
        } else {
            FitMode::Cover
        }
    }
}

/// Target pixel size for scaling `orig` into `max` under `fit`.
///
/// `Contain` preserves aspect ratio and fits inside the box (upscaling small
/// images to use the pane). `Cover` returns the box itself; the decode worker
/// crops to it via `resize_to_fill`.
pub fn compute_target(orig: (u32, u32), max: (u32, u32), fit: FitMode) -> (u32, u32) {
    let (orig_w, orig_h) = orig;
    let (max_w, max_h) = max;
    if orig_w == 0 || orig_h == 0 || max_w == 0 || max_h == 0 {
        return (orig_w.max(1), orig_h.max(1));
    }

    match fit {
        FitMode::Contain => {
            let scale_w = max_w as f64 / orig_w as f64;
            let scale_h = max_h as f64 / orig_h as f64;
            let scale = scale_w.min(scale_h);
            (
                (orig_w as f64 * scale).floor().max(1.0) as u32,
                (orig_h as f64 * scale).floor().max(1.0) as u32,
            )
        }
        FitMode::Cover => (max_w, max_h),
    }
}
