use crate::aggregate::ScoreMatrix;
use crate::error::{PipelineError, PipelineResult};
use crate::hmmer::HitRecord;
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{info, warn};
use which::which;

// YlGnBu anchor colours, light to dark
const GRADIENT: [(u8, u8, u8); 5] = [
    (255, 255, 217),
    (199, 233, 180),
    (65, 182, 196),
    (34, 94, 168),
    (8, 29, 88),
];

/// Maps `t` in `[0, 1]` onto the yellow-green-blue gradient.
pub fn gradient_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (GRADIENT.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(GRADIENT.len() - 2);
    let f = scaled - i as f64;
    let (a, b) = (GRADIENT[i], GRADIENT[i + 1]);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
    RGBColor(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
}

fn chart_err(path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Chart {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn segment_label(names: &[String], value: &SegmentValue<i32>) -> String {
    match value {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| names.get(i))
            .cloned()
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    }
}

/// Targets on the y axis (first target at the top), queries on the x axis.
pub fn render_heatmap(path: &Path, matrix: &ScoreMatrix) -> PipelineResult<()> {
    let err = |e: &dyn std::fmt::Display| chart_err(path, e);
    let rows = matrix.targets.len() as i32;
    let cols = matrix.queries.len() as i32;
    if rows == 0 || cols == 0 {
        return Err(err(&"no hits to plot"));
    }
    let lo = matrix.min_score().unwrap_or(0.0);
    let hi = matrix.max_score().unwrap_or(0.0);
    let span = if hi > lo { hi - lo } else { 1.0 };

    // Row labels shift the plot right; give long target lists room to breathe.
    let height = (rows as u32 * 14 + 200).max(800);
    let root = BitMapBackend::new(path, (1200, height)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;
    let (plot_area, colorbar_area) = root.split_horizontally(1100);

    let reversed: Vec<String> = matrix.targets.iter().rev().cloned().collect();
    let mut chart = ChartBuilder::on(&plot_area)
        .caption("HMMer Output Heatmap", ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(140)
        .y_label_area_size(180)
        .build_cartesian_2d((0..cols).into_segmented(), (0..rows).into_segmented())
        .map_err(|e| err(&e))?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(cols as usize)
        .y_labels(rows as usize)
        .x_label_formatter(&|v| segment_label(&matrix.queries, v))
        .y_label_formatter(&|v| segment_label(&reversed, v))
        .x_label_style(
            ("sans-serif", 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_label_style(("sans-serif", 10))
        .x_desc("Query Name")
        .y_desc("Target Name")
        .draw()
        .map_err(|e| err(&e))?;

    chart
        .draw_series(matrix.cells.iter().enumerate().flat_map(|(r, row)| {
            let y = rows - 1 - r as i32;
            row.iter().enumerate().filter_map(move |(c, cell)| {
                cell.map(|score| {
                    let c = c as i32;
                    Rectangle::new(
                        [
                            (SegmentValue::Exact(c), SegmentValue::Exact(y)),
                            (SegmentValue::Exact(c + 1), SegmentValue::Exact(y + 1)),
                        ],
                        gradient_color((score - lo) / span).filled(),
                    )
                })
            })
        }))
        .map_err(|e| err(&e))?;

    // Colour bar: 100 steps from `lo` (bottom) to `hi` (top).
    let (_, bar_h) = colorbar_area.dim_in_pixel();
    let top = 60i32;
    let bottom = bar_h as i32 - 160;
    let step = (bottom - top) as f64 / 100.0;
    for i in 0..100 {
        let y0 = top + (i as f64 * step) as i32;
        let y1 = top + ((i + 1) as f64 * step) as i32;
        colorbar_area
            .draw(&Rectangle::new(
                [(10, y0), (35, y1)],
                gradient_color(1.0 - i as f64 / 100.0).filled(),
            ))
            .map_err(|e| err(&e))?;
    }
    let label_style = ("sans-serif", 12).into_font().color(&BLACK);
    colorbar_area
        .draw(&Text::new(format!("{:.1}", hi), (40, top), label_style.clone()))
        .map_err(|e| err(&e))?;
    colorbar_area
        .draw(&Text::new(format!("{:.1}", lo), (40, bottom - 12), label_style))
        .map_err(|e| err(&e))?;

    root.present().map_err(|e| err(&e))?;
    info!("🖼️  Heatmap saved: {}", path.display());
    Ok(())
}

/// Horizontal bars, best hit at the top.
pub fn render_top_hits(path: &Path, hits: &[HitRecord]) -> PipelineResult<()> {
    let err = |e: &dyn std::fmt::Display| chart_err(path, e);
    if hits.is_empty() {
        return Err(err(&"no hits to plot"));
    }
    let n = hits.len() as i32;
    let max = hits.iter().map(|h| h.score).fold(0.0_f64, f64::max);
    let x_max = if max > 0.0 { max * 1.1 } else { 1.0 };
    let labels: Vec<String> = hits.iter().rev().map(|h| h.target_name.clone()).collect();

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Top {} Hits by Score", hits.len()), ("sans-serif", 26))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(200)
        .build_cartesian_2d(0.0..x_max, (0..n).into_segmented())
        .map_err(|e| err(&e))?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n as usize)
        .y_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Score")
        .y_desc("Target Name")
        .draw()
        .map_err(|e| err(&e))?;

    chart
        .draw_series(hits.iter().enumerate().map(|(rank, hit)| {
            let y = n - 1 - rank as i32;
            let shade = if n > 1 { rank as f64 / (n - 1) as f64 } else { 0.0 };
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(y)),
                    (hit.score.max(0.0), SegmentValue::Exact(y + 1)),
                ],
                gradient_color(1.0 - shade * 0.8).filled(),
            );
            bar.set_margin(4, 4, 0, 0);
            bar
        }))
        .map_err(|e| err(&e))?;

    root.present().map_err(|e| err(&e))?;
    info!("🖼️  Bar chart saved: {}", path.display());
    Ok(())
}

/// Opens `path` with the desktop image viewer, if there is one on PATH.
pub fn display_image(path: &Path) {
    let Some(opener) = ["xdg-open", "open"].iter().find_map(|cmd| which(cmd).ok()) else {
        warn!("⚠️  No image viewer found (xdg-open/open); see {}", path.display());
        return;
    };
    let spawned = Command::new(&opener)
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = spawned {
        warn!("⚠️  Could not open {} with {}: {}", path.display(), opener.display(), e);
    }
}
