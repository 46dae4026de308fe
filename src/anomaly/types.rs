use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (1000, 800);

/// One row of the per-cycle training history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleDiagnostic {
    pub cycle: u64,
    pub anomalies: usize,
    /// Mean decision score of the long-lived model, present only on retrain cycles.
    pub mean_score: Option<f64>,
}

/// Append-only history of cycle diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<CycleDiagnostic>,
}

impl Diagnostics {
    pub fn push(&mut self, record: CycleDiagnostic) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[CycleDiagnostic] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Render the history as a PNG at `path` and write the raw rows next to
    /// it with a `.csv` extension. Returns false when there is nothing to write.
    ///
    /// The top panel plots anomalies per cycle. A second panel with the mean
    /// retrain score is added once any retrain has happened.
    pub fn save(&self, path: &Path) -> eyre::Result<bool> {
        if self.records.is_empty() {
            return Ok(false);
        }

        self.render(path)?;
        self.write_csv(&path.with_extension("csv"))?;
        Ok(true)
    }

    fn render(&self, path: &Path) -> eyre::Result<()> {
        let counts: Vec<(f64, f64)> = self
            .records
            .iter()
            .map(|r| (r.cycle as f64, r.anomalies as f64))
            .collect();
        let scores: Vec<(f64, f64)> = self
            .records
            .iter()
            .filter_map(|r| r.mean_score.map(|s| (r.cycle as f64, s)))
            .collect();

        let plot_error =
            |e: String| eyre::eyre!("Failed to render diagnostics plot {}: {}", path.display(), e);

        let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(|e| plot_error(e.to_string()))?;
        if scores.is_empty() {
            draw_panel(&root, &counts, RED).map_err(|e| plot_error(e.to_string()))?;
        } else {
            let panels = root.split_evenly((2, 1));
            draw_panel(&panels[0], &counts, RED).map_err(|e| plot_error(e.to_string()))?;
            draw_panel(&panels[1], &scores, BLUE).map_err(|e| plot_error(e.to_string()))?;
        }
        root.present().map_err(|e| plot_error(e.to_string()))
    }

    fn write_csv(&self, path: &Path) -> eyre::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| eyre::eyre!("Failed to open diagnostics file {}: {}", path.display(), e))?;
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    points: &[(f64, f64)],
    color: RGBColor,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let mut chart = ChartBuilder::on(area).margin(20).build_cartesian_2d(
        padded(points.iter().map(|p| p.0)),
        padded(points.iter().map(|p| p.1)),
    )?;
    chart.draw_series(LineSeries::new(points.iter().copied(), &color))?;
    chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))?;
    Ok(())
}

/// Value range with a small margin; a flat series still gets a non-empty range.
fn padded(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = if hi > lo {
        (hi - lo) * 0.05
    } else {
        lo.abs().max(1.0) * 0.05
    };
    (lo - pad)..(hi + pad)
}
