//! Chart rendering for analysed columns.
//!
//! Charts are drawn with [`plotters`] into an in-memory RGB buffer, encoded
//! as PNG with [`image`] and published through a temp file + rename, so a
//! reader of the output path never sees a half-written image.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use thiserror::Error;

use crate::color::{generate_palette, HISTOGRAM_FILL};
use crate::data::describe::value_counts;
use crate::data::model::ColumnRef;
use crate::storage::secure_filename;

/// Number of equal-width bins for numeric histograms.
pub const DEFAULT_BINS: usize = 10;

/// Most frequent values drawn for a categorical column.
pub const MAX_CATEGORIES: usize = 20;

/// Errors that can occur during plot generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to draw chart: {0}")]
    Drawing(String),

    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to save plot to {path}: {source}")]
    FileSave {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type Result<T> = core::result::Result<T, PlotError>;

// ---------------------------------------------------------------------------
// Chart data
// ---------------------------------------------------------------------------

/// One histogram bucket, `[start, end)` except for the last which is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// What gets drawn for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Histogram(Vec<Bin>),
    Categories(Vec<(String, usize)>),
}

impl ChartData {
    /// Histogram for numeric columns, value frequencies for everything else.
    pub fn for_column(column: &ColumnRef<'_>) -> Self {
        if column.kind.is_numeric() {
            ChartData::Histogram(histogram_bins(&column.numbers(), DEFAULT_BINS))
        } else {
            ChartData::Categories(
                value_counts(column.values())
                    .into_iter()
                    .take(MAX_CATEGORIES)
                    .map(|(value, n)| (value.to_string(), n))
                    .collect(),
            )
        }
    }
}

/// Split finite values into `bins` equal-width buckets over `[min, max]`.
///
/// Follows numpy: an empty input spans `[0, 1]`, a single distinct value
/// spans `[v - 0.5, v + 0.5]`, and the maximum lands in the last bucket.
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

    let (mut lo, mut hi) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if finite.is_empty() {
        (lo, hi) = (0.0, 1.0);
    } else if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    // A span wider than f64::MAX is binned at half scale, which is exact.
    let scale = if (hi - lo).is_finite() { 1.0 } else { 0.5 };
    let scaled_lo = lo * scale;
    let width = (hi * scale - scaled_lo) / bins as f64;
    let edge = |i: usize| (scaled_lo + width * i as f64) / scale;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: edge(i),
            end: if i + 1 == bins { hi } else { edge(i + 1) },
            count: 0,
        })
        .collect();

    for v in finite {
        let idx = (((v * scale - scaled_lo) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

// ---------------------------------------------------------------------------
// Output location
// ---------------------------------------------------------------------------

/// Where a rendered chart lives on disk and how clients fetch it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotTarget {
    pub path: PathBuf,
    pub url: String,
}

/// Directory of generated charts, served under `static/plots/`.
#[derive(Debug, Clone)]
pub struct PlotStore {
    dir: PathBuf,
}

impl PlotStore {
    pub const URL_PREFIX: &'static str = "static/plots";

    /// Create `<static_dir>/plots` if missing.
    pub fn open(static_dir: &Path) -> std::io::Result<Self> {
        let dir = static_dir.join("plots");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Stable per-(file, column) location. Repeating an analysis overwrites
    /// the same image; different columns never share one.
    pub fn target_for(&self, filename: &str, column: &str) -> PlotTarget {
        let stem = filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(filename);
        let mut slug: String = secure_filename(column).chars().take(40).collect();
        if slug.is_empty() {
            slug.push_str("column");
        }
        let name = format!("{stem}__{slug}-{:08x}.png", fnv1a(column.as_bytes()));
        PlotTarget {
            path: self.dir.join(&name),
            url: format!("{}/{name}", Self::URL_PREFIX),
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811c_9dc5_u32, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(0x0100_0193)
    })
}

// ---------------------------------------------------------------------------
// Fonts
// ---------------------------------------------------------------------------

/// System locations probed for a TrueType font to label charts with.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static FONT_READY: OnceLock<bool> = OnceLock::new();

/// Register a sans-serif font with plotters once per process. Returns
/// whether text can be drawn; without a font charts are rendered unlabelled.
fn fonts_ready() -> bool {
    *FONT_READY.get_or_init(|| {
        for candidate in FONT_CANDIDATES {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font("sans-serif", FontStyle::Normal, bytes).is_ok() {
                log::debug!("chart labels use font {candidate}");
                return true;
            }
        }
        log::warn!("no usable system font found, charts will be drawn without labels");
        false
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Chart canvas size in pixels.
#[derive(Debug, Clone, Copy)]
pub struct PlotSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PlotSize {
    fn default() -> Self {
        // matplotlib's default figure at 100 dpi
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// Render `data` as a PNG at `path`, replacing any existing file.
pub fn render_chart(data: &ChartData, title: &str, path: &Path, size: PlotSize) -> Result<()> {
    let png = render_png(data, title, size)?;
    write_atomically(path, &png)
}

fn render_png(data: &ChartData, title: &str, size: PlotSize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; size.width as usize * size.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (size.width, size.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let labelled = fonts_ready();
        match data {
            ChartData::Histogram(bins) => draw_histogram(&root, bins, title, labelled)?,
            ChartData::Categories(counts) => draw_categories(&root, counts, title, labelled)?,
        }

        root.present().map_err(draw_err)?;
    }

    let img = image::RgbImage::from_raw(size.width, size.height, buffer)
        .ok_or_else(|| PlotError::Drawing("pixel buffer has the wrong size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, image::ImageFormat::Png)?;
    Ok(png.into_inner())
}

fn draw_err<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Drawing(e.to_string())
}

fn draw_histogram<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    bins: &[Bin],
    title: &str,
    labelled: bool,
) -> Result<()> {
    let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
    let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64 * 1.05;

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if labelled {
        builder
            .caption(title, ("sans-serif", 24))
            .x_label_area_size(40)
            .y_label_area_size(50);
    }
    let mut chart = builder
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(draw_err)?;

    if labelled {
        chart
            .configure_mesh()
            .x_labels(8)
            .y_labels(6)
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(draw_err)?;
    }

    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new(
                [(b.start, 0.0), (b.end, b.count as f64)],
                HISTOGRAM_FILL.filled(),
            )
        }))
        .map_err(draw_err)?;
    chart
        .draw_series(bins.iter().filter(|b| b.count > 0).map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], WHITE.stroke_width(1))
        }))
        .map_err(draw_err)?;

    Ok(())
}

fn draw_categories<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    counts: &[(String, usize)],
    title: &str,
    labelled: bool,
) -> Result<()> {
    let n = counts.len().max(1);
    let y_max = counts.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64 * 1.05;
    let colours = generate_palette(counts.len());

    let mut builder = ChartBuilder::on(root);
    builder.margin(20);
    if labelled {
        builder
            .caption(title, ("sans-serif", 24))
            .x_label_area_size(40)
            .y_label_area_size(50);
    }
    let mut chart = builder
        .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max)
        .map_err(draw_err)?;

    if labelled {
        let label = |v: &SegmentValue<usize>| match v {
            SegmentValue::CenterOf(i) => counts
                .get(*i)
                .map(|(name, _)| name.chars().take(12).collect::<String>())
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&label)
            .label_style(("sans-serif", 14))
            .draw()
            .map_err(draw_err)?;
    }

    chart
        .draw_series(counts.iter().zip(&colours).enumerate().map(|(i, ((_, c), colour))| {
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), *c as f64),
                ],
                colour.filled(),
            );
            bar.set_margin(0, 0, 4, 4);
            bar
        }))
        .map_err(draw_err)?;

    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let io_err = |source| PlotError::FileSave {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
