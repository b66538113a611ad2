// Copyright 2025 Tomoki Hayashi
// MIT License (https://opensource.org/licenses/MIT)

//! Random image selection with recency avoidance.
//!
//! Two independent layers keep picks from repeating: a global ring of the
//! most recently shown files and a per-title memory of the last file shown
//! for that title. Narrowing relaxes in tiers, so a pick always succeeds
//! once a sampled title has any matching file; when nothing matches after a
//! bounded number of attempts the selector degrades to a fixed fallback
//! image instead of failing the caller.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::catalog::{Catalog, TitleRecord};
use crate::fit::FitMode;
use crate::library::{FileType, TitleFileIndex};

/// Capacity of the global recency ring.
pub const RECENT_CAPACITY: usize = 100;

/// Title samples per pick before giving up and serving the fallback.
const MAX_ATTEMPTS: usize = 10;

/// Titles eligible for the search-demo image.
pub const SEARCH_DEMO_TITLES: &[&str] = &[
    "lost-in-the-andes",
    "the-golden-helmet",
    "a-christmas-for-shacktown",
    "trail-of-the-unicorn",
    "luck-of-the-north",
    "in-old-california",
];

/// One selection result, passed by value to the UI layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageInfo {
    pub filename: PathBuf,
    pub from_title: Option<String>,
    pub fit_mode: FitMode,
}

/// Constraints for one pick. `Default` means: any file type, non-edited
/// variants, deterministic fit.
#[derive(Clone, Debug)]
pub struct ImageQuery {
    pub file_types: Vec<FileType>,
    pub edited_only: bool,
    pub random_fit: bool,
}

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            file_types: FileType::ALL.to_vec(),
            edited_only: false,
            random_fit: false,
        }
    }
}

/// Bounded FIFO of recently shown paths plus a per-title last-shown map.
struct RecencyTracker {
    recent: VecDeque<PathBuf>,
    capacity: usize,
    last_shown: HashMap<String, PathBuf>,
}

impl RecencyTracker {
    fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            last_shown: HashMap::new(),
        }
    }

    fn seen_recently(&self, path: &Path) -> bool {
        self.recent.iter().any(|p| p == path)
    }

    fn last_shown(&self, title_id: &str) -> Option<&PathBuf> {
        self.last_shown.get(title_id)
    }

    fn note_last_shown(&mut self, title_id: &str, path: &Path) {
        self.last_shown.insert(title_id.to_string(), path.to_path_buf());
    }

    /// Record a catalog-wide pick: enters the ring (evicting the oldest at
    /// capacity) and becomes the title's last-shown file.
    fn note_shown(&mut self, title_id: &str, path: &Path) {
        if self.capacity > 0 {
            if self.recent.len() == self.capacity {
                self.recent.pop_front();
            }
            self.recent.push_back(path.to_path_buf());
        }
        self.note_last_shown(title_id, path);
    }
}

/// Attempt loop states for a catalog-wide pick.
enum PickState {
    Sampling,
    Filtering {
        title_id: String,
        candidates: Vec<(PathBuf, FileType)>,
    },
    Succeeded(ImageInfo),
    Exhausted,
}

/// Chooses images for display. Owns the file index, both recency structures
/// and the RNG; accessed only from the UI thread.
pub struct RandomSelector {
    index: TitleFileIndex,
    recency: RecencyTracker,
    fallback_image: PathBuf,
    fallback_title: String,
    rng: StdRng,
}

impl RandomSelector {
    pub fn new(
        index: TitleFileIndex,
        fallback_image: PathBuf,
        fallback_title: impl Into<String>,
        recent_capacity: usize,
    ) -> Self {
        Self::with_rng(index, fallback_image, fallback_title, recent_capacity, StdRng::from_os_rng())
    }

    /// Deterministic selector for tests.
    pub fn with_seed(
        index: TitleFileIndex,
        fallback_image: PathBuf,
        fallback_title: impl Into<String>,
        recent_capacity: usize,
        seed: [u8; 32],
    ) -> Self {
        Self::with_rng(index, fallback_image, fallback_title, recent_capacity, StdRng::from_seed(seed))
    }

    fn with_rng(
        index: TitleFileIndex,
        fallback_image: PathBuf,
        fallback_title: impl Into<String>,
        recent_capacity: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            index,
            recency: RecencyTracker::new(recent_capacity),
            fallback_image,
            fallback_title: fallback_title.into(),
            rng,
        }
    }

    /// The image served when selection cannot succeed. Identical on every
    /// call.
    pub fn fallback(&self) -> ImageInfo {
        ImageInfo {
            filename: self.fallback_image.clone(),
            from_title: Some(self.fallback_title.clone()),
            fit_mode: FitMode::Cover,
        }
    }

    /// Pick one image across `titles`.
    ///
    /// Samples a title uniformly, narrows its matching files through the
    /// recency tiers and records the choice. Titles with no matching files
    /// cost one attempt each; after [`MAX_ATTEMPTS`] misses (or on an empty
    /// `titles` slice) the fallback is returned. Resolver failures from
    /// first-touch discovery propagate.
    pub fn pick(&mut self, titles: &[TitleRecord], query: &ImageQuery) -> Result<ImageInfo> {
        if titles.is_empty() {
            return Ok(self.fallback());
        }

        let mut attempts = 0;
        let mut state = PickState::Sampling;
        loop {
            state = match state {
                PickState::Sampling => {
                    if attempts == MAX_ATTEMPTS {
                        PickState::Exhausted
                    } else {
                        attempts += 1;
                        let title = &titles[self.rng.random_range(0..titles.len())];
                        let candidates = self.candidates_for(&title.id, query)?;
                        if candidates.is_empty() {
                            PickState::Sampling
                        } else {
                            PickState::Filtering {
                                title_id: title.id.clone(),
                                candidates,
                            }
                        }
                    }
                }
                PickState::Filtering {
                    title_id,
                    candidates,
                } => {
                    let (path, file_type) = self.narrow_and_choose(&title_id, candidates);
                    let fit_mode = FitMode::for_file(file_type, query.random_fit, &mut self.rng);
                    self.recency.note_shown(&title_id, &path);
                    PickState::Succeeded(ImageInfo {
                        filename: path,
                        from_title: Some(title_id),
                        fit_mode,
                    })
                }
                PickState::Succeeded(info) => return Ok(info),
                PickState::Exhausted => {
                    log::debug!("selection exhausted after {MAX_ATTEMPTS} attempts, serving fallback");
                    return Ok(self.fallback());
                }
            };
        }
    }

    /// Pick one image for a single fixed title, avoiding only that title's
    /// previous pick. The global ring is neither consulted nor updated.
    /// Serves the fallback path when the title has nothing matching.
    pub fn pick_for_title(&mut self, title_id: &str, query: &ImageQuery) -> Result<PathBuf> {
        let candidates = self.candidates_for(title_id, query)?;
        if candidates.is_empty() {
            return Ok(self.fallback_image.clone());
        }
        let (path, _) = self.choose_avoiding_last(title_id, &candidates);
        self.recency.note_last_shown(title_id, &path);
        Ok(path)
    }

    /// Pick the search-demo image from the fixed allow-list. Per-title
    /// avoidance applies; the global ring does not.
    pub fn pick_search_image(&mut self, catalog: &Catalog) -> Result<ImageInfo> {
        let demo: Vec<&TitleRecord> = SEARCH_DEMO_TITLES
            .iter()
            .filter_map(|id| catalog.get(id))
            .collect();
        if demo.is_empty() {
            return Ok(self.fallback());
        }

        let query = ImageQuery::default();
        for _ in 0..MAX_ATTEMPTS {
            let title = demo[self.rng.random_range(0..demo.len())];
            let candidates = self.candidates_for(&title.id, &query)?;
            if candidates.is_empty() {
                continue;
            }
            let (path, file_type) = self.choose_avoiding_last(&title.id, &candidates);
            let fit_mode = FitMode::for_file(file_type, false, &mut self.rng);
            self.recency.note_last_shown(&title.id, &path);
            return Ok(ImageInfo {
                filename: path,
                from_title: Some(title.id.clone()),
                fit_mode,
            });
        }
        Ok(self.fallback())
    }

    /// `(path, role)` pairs for one title matching the query's file types
    /// and edited flag. First access populates the file index.
    fn candidates_for(
        &mut self,
        title_id: &str,
        query: &ImageQuery,
    ) -> Result<Vec<(PathBuf, FileType)>> {
        let by_type = self.index.files(title_id)?;
        let mut out = Vec::new();
        for file_type in &query.file_types {
            if let Some(files) = by_type.get(file_type) {
                out.extend(
                    files
                        .iter()
                        .filter(|c| c.is_edited == query.edited_only)
                        .map(|c| (c.path.clone(), c.file_type)),
                );
            }
        }
        Ok(out)
    }

    /// Three-tier narrowing: unseen globally and not this title's last pick,
    /// then unseen globally, then anything. First non-empty tier wins, so
    /// this never fails on a non-empty candidate list.
    fn narrow_and_choose(
        &mut self,
        title_id: &str,
        candidates: Vec<(PathBuf, FileType)>,
    ) -> (PathBuf, FileType) {
        let last = self.recency.last_shown(title_id).cloned();
        let tier_a: Vec<(PathBuf, FileType)> = candidates
            .iter()
            .filter(|(path, _)| {
                !self.recency.seen_recently(path) && last.as_deref() != Some(path.as_path())
            })
            .cloned()
            .collect();
        let pool = if !tier_a.is_empty() {
            tier_a
        } else {
            let tier_b: Vec<(PathBuf, FileType)> = candidates
                .iter()
                .filter(|(path, _)| !self.recency.seen_recently(path))
                .cloned()
                .collect();
            if !tier_b.is_empty() { tier_b } else { candidates }
        };
        pool[self.rng.random_range(0..pool.len())].clone()
    }

    /// Uniform choice avoiding the title's last-shown file when possible.
    fn choose_avoiding_last(
        &mut self,
        title_id: &str,
        candidates: &[(PathBuf, FileType)],
    ) -> (PathBuf, FileType) {
        let last = self.recency.last_shown(title_id).cloned();
        let pool: Vec<&(PathBuf, FileType)> = candidates
            .iter()
            .filter(|(path, _)| last.as_deref() != Some(path.as_path()))
            .collect();
        if pool.is_empty() {
            candidates[self.rng.random_range(0..candidates.len())].clone()
        } else {
            pool[self.rng.random_range(0..pool.len())].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::FileResolver;

    #[derive(Default)]
    struct MapResolver {
        files: HashMap<String, Vec<PathBuf>>,
        edited: HashMap<String, Vec<PathBuf>>,
    }

    impl FileResolver for MapResolver {
        fn resolve(&self, title_id: &str, edited_only: bool) -> Result<Vec<PathBuf>> {
            let map = if edited_only { &self.edited } else { &self.files };
            Ok(map.get(title_id).cloned().unwrap_or_default())
        }
    }

    struct FailingResolver;

    impl FileResolver for FailingResolver {
        fn resolve(&self, _title_id: &str, _edited_only: bool) -> Result<Vec<PathBuf>> {
            anyhow::bail!("storage offline")
        }
    }

    const FALLBACK: &str = "/library/fallback.png";
    const FALLBACK_TITLE: &str = "lost-in-the-andes";

    /// Selector over a synthetic library described as
    /// `(title_id, file_type, path, is_edited)` rows.
    fn make_selector(rows: &[(&str, FileType, &str, bool)]) -> RandomSelector {
        make_selector_with_capacity(rows, RECENT_CAPACITY)
    }

    fn make_selector_with_capacity(
        rows: &[(&str, FileType, &str, bool)],
        capacity: usize,
    ) -> RandomSelector {
        let mut per_type: HashMap<FileType, MapResolver> = HashMap::new();
        for (title_id, file_type, path, edited) in rows {
            let resolver = per_type.entry(*file_type).or_default();
            resolver
                .files
                .entry(title_id.to_string())
                .or_default()
                .push(PathBuf::from(path));
            if *edited {
                resolver
                    .edited
                    .entry(title_id.to_string())
                    .or_default()
                    .push(PathBuf::from(path));
            }
        }
        let mut resolvers: HashMap<FileType, Box<dyn FileResolver>> = HashMap::new();
        for (file_type, resolver) in per_type {
            resolvers.insert(file_type, Box::new(resolver));
        }
        RandomSelector::with_seed(
            TitleFileIndex::new(resolvers),
            PathBuf::from(FALLBACK),
            FALLBACK_TITLE,
            capacity,
            [9u8; 32],
        )
    }

    fn record(id: &str) -> TitleRecord {
        TitleRecord {
            id: id.to_string(),
            title: id.to_string(),
            series: String::new(),
            year: None,
        }
    }

    #[test]
    fn test_empty_title_list_returns_exact_fallback() {
        let mut selector = make_selector(&[]);
        let info = selector.pick(&[], &ImageQuery::default()).unwrap();
        assert_eq!(info.filename, PathBuf::from(FALLBACK));
        assert_eq!(info.from_title.as_deref(), Some(FALLBACK_TITLE));
        assert_eq!(info.fit_mode, FitMode::Cover);
        // Bit-identical across calls.
        let again = selector.pick(&[], &ImageQuery::default()).unwrap();
        assert_eq!(info, again);
    }

    #[test]
    fn test_pick_returns_a_valid_candidate() {
        let mut selector = make_selector(&[
            ("t1", FileType::Splash, "/lib/t1-s1.png", false),
            ("t1", FileType::Inset, "/lib/t1-i1.png", false),
            ("t2", FileType::Splash, "/lib/t2-s1.png", false),
        ]);
        let titles = vec![record("t1"), record("t2")];
        let valid = [
            PathBuf::from("/lib/t1-s1.png"),
            PathBuf::from("/lib/t1-i1.png"),
            PathBuf::from("/lib/t2-s1.png"),
        ];
        for _ in 0..50 {
            let info = selector.pick(&titles, &ImageQuery::default()).unwrap();
            assert!(valid.contains(&info.filename));
            assert!(info.from_title.is_some());
        }
    }

    #[test]
    fn test_titles_without_files_fall_back() {
        let mut selector = make_selector(&[]);
        let titles = vec![record("t1"), record("t2")];
        let info = selector.pick(&titles, &ImageQuery::default()).unwrap();
        assert_eq!(info, selector.fallback());
    }

    #[test]
    fn test_first_pick_enters_the_ring() {
        let mut selector = make_selector(&[("t1", FileType::Splash, "/lib/a.png", false)]);
        let titles = vec![record("t1")];
        let query = ImageQuery {
            file_types: vec![FileType::Splash],
            ..Default::default()
        };
        let info = selector.pick(&titles, &query).unwrap();
        assert_eq!(info.filename, PathBuf::from("/lib/a.png"));
        assert!(selector.recency.seen_recently(Path::new("/lib/a.png")));
        assert_eq!(selector.recency.recent.len(), 1);
    }

    #[test]
    fn test_single_candidate_keeps_being_served() {
        // Tier c guarantees progress even when the only file is both in the
        // ring and the title's last pick.
        let mut selector = make_selector(&[("t1", FileType::Splash, "/lib/a.png", false)]);
        let titles = vec![record("t1")];
        for _ in 0..5 {
            let info = selector.pick(&titles, &ImageQuery::default()).unwrap();
            assert_eq!(info.filename, PathBuf::from("/lib/a.png"));
        }
    }

    #[test]
    fn test_edited_filter_is_exact() {
        let mut selector = make_selector(&[
            ("t1", FileType::Splash, "/lib/plain.png", false),
            ("t1", FileType::Splash, "/lib/edited.png", true),
        ]);
        let titles = vec![record("t1")];

        let edited_query = ImageQuery {
            edited_only: true,
            ..Default::default()
        };
        for _ in 0..10 {
            let info = selector.pick(&titles, &edited_query).unwrap();
            assert_eq!(info.filename, PathBuf::from("/lib/edited.png"));
        }

        let plain_query = ImageQuery::default();
        for _ in 0..10 {
            let info = selector.pick(&titles, &plain_query).unwrap();
            assert_eq!(info.filename, PathBuf::from("/lib/plain.png"));
        }
    }

    #[test]
    fn test_file_type_filter() {
        let mut selector = make_selector(&[
            ("t1", FileType::Splash, "/lib/s.png", false),
            ("t1", FileType::Inset, "/lib/i.png", false),
        ]);
        let titles = vec![record("t1")];
        let query = ImageQuery {
            file_types: vec![FileType::Inset],
            ..Default::default()
        };
        for _ in 0..10 {
            let info = selector.pick(&titles, &query).unwrap();
            assert_eq!(info.filename, PathBuf::from("/lib/i.png"));
        }
    }

    #[test]
    fn test_cover_pick_gets_contain_fit() {
        let mut selector = make_selector(&[("t1", FileType::Cover, "/lib/c.png", false)]);
        let titles = vec![record("t1")];
        let query = ImageQuery {
            file_types: vec![FileType::Cover],
            ..Default::default()
        };
        let info = selector.pick(&titles, &query).unwrap();
        assert_eq!(info.fit_mode, FitMode::Contain);

        let mut selector = make_selector(&[("t1", FileType::Splash, "/lib/s.png", false)]);
        let info = selector.pick(&titles, &ImageQuery::default()).unwrap();
        assert_eq!(info.fit_mode, FitMode::Cover);
    }

    #[test]
    fn test_ring_is_bounded_and_oldest_becomes_eligible() {
        let rows: Vec<(String, FileType, String, bool)> = (0..160)
            .map(|i| {
                (
                    format!("t{i}"),
                    FileType::Splash,
                    format!("/lib/f{i:03}.png"),
                    false,
                )
            })
            .collect();
        let borrowed: Vec<(&str, FileType, &str, bool)> = rows
            .iter()
            .map(|(t, ft, p, e)| (t.as_str(), *ft, p.as_str(), *e))
            .collect();
        let mut selector = make_selector(&borrowed);
        let titles: Vec<TitleRecord> = (0..160).map(|i| record(&format!("t{i}"))).collect();

        for _ in 0..150 {
            selector.pick(&titles, &ImageQuery::default()).unwrap();
            assert!(selector.recency.recent.len() <= RECENT_CAPACITY);
        }
        assert_eq!(selector.recency.recent.len(), RECENT_CAPACITY);

        // The oldest entry has been evicted and is eligible again.
        let mut selector = make_selector_with_capacity(&borrowed, 2);
        selector.recency.note_shown("t0", Path::new("/lib/f000.png"));
        selector.recency.note_shown("t1", Path::new("/lib/f001.png"));
        selector.recency.note_shown("t2", Path::new("/lib/f002.png"));
        assert!(!selector.recency.seen_recently(Path::new("/lib/f000.png")));
        assert!(selector.recency.seen_recently(Path::new("/lib/f002.png")));
    }

    #[test]
    fn test_pick_for_title_never_repeats_with_two_candidates() {
        let mut selector = make_selector(&[
            ("t1", FileType::Splash, "/lib/a.png", false),
            ("t1", FileType::Splash, "/lib/b.png", false),
        ]);
        let query = ImageQuery::default();
        let mut previous = selector.pick_for_title("t1", &query).unwrap();
        for _ in 0..100 {
            let next = selector.pick_for_title("t1", &query).unwrap();
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn test_pick_for_title_without_candidates_serves_fallback_path() {
        let mut selector = make_selector(&[]);
        let path = selector.pick_for_title("t1", &ImageQuery::default()).unwrap();
        assert_eq!(path, PathBuf::from(FALLBACK));
    }

    #[test]
    fn test_pick_for_title_skips_the_global_ring() {
        let mut selector = make_selector(&[("t1", FileType::Splash, "/lib/a.png", false)]);
        selector.pick_for_title("t1", &ImageQuery::default()).unwrap();
        assert_eq!(selector.recency.recent.len(), 0);
        assert!(selector.recency.last_shown("t1").is_some());
    }

    #[test]
    fn test_search_image_comes_from_the_allow_list() {
        let mut selector = make_selector(&[
            ("the-golden-helmet", FileType::Splash, "/lib/helmet.png", false),
            ("not-a-demo-title", FileType::Splash, "/lib/other.png", false),
        ]);
        let catalog = Catalog::from_records(vec![
            crate::catalog::TitleRecord {
                id: "the-golden-helmet".to_string(),
                title: "The Golden Helmet".to_string(),
                series: String::new(),
                year: None,
            },
            crate::catalog::TitleRecord {
                id: "not-a-demo-title".to_string(),
                title: "Not a Demo".to_string(),
                series: String::new(),
                year: None,
            },
        ])
        .unwrap();

        for _ in 0..10 {
            let info = selector.pick_search_image(&catalog).unwrap();
            assert_eq!(info.filename, PathBuf::from("/lib/helmet.png"));
            assert_eq!(info.from_title.as_deref(), Some("the-golden-helmet"));
        }
        // Global ring untouched by search picks.
        assert_eq!(selector.recency.recent.len(), 0);
    }

    #[test]
    fn test_search_image_without_demo_titles_falls_back() {
        let mut selector = make_selector(&[]);
        let catalog = Catalog::from_records(vec![]).unwrap();
        let info = selector.pick_search_image(&catalog).unwrap();
        assert_eq!(info, selector.fallback());
    }

    #[test]
    fn test_resolver_error_propagates_from_pick() {
        let mut resolvers: HashMap<FileType, Box<dyn FileResolver>> = HashMap::new();
        resolvers.insert(FileType::Splash, Box::new(FailingResolver));
        let mut selector = RandomSelector::with_seed(
            TitleFileIndex::new(resolvers),
            PathBuf::from(FALLBACK),
            FALLBACK_TITLE,
            RECENT_CAPACITY,
            [9u8; 32],
        );
        let titles = vec![record("t1")];
        assert!(selector.pick(&titles, &ImageQuery::default()).is_err());
        assert!(selector.pick_for_title("t1", &ImageQuery::default()).is_err());
    }
}
