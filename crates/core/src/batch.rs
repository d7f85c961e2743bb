//! Subsetting one or many font files, one rayon task per font.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use fontflat_subsetter::Subsetter;
use log::{error, info};
use rayon::prelude::*;

use crate::io::{read_font, write_font};

/// Input and output byte counts of one subset font.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubsetStats {
    pub input_bytes: usize,
    pub output_bytes: usize,
}

impl SubsetStats {
    pub fn reduction(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.output_bytes as f64 / self.input_bytes as f64) * 100.0
    }
}

impl fmt::Display for SubsetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mb = |bytes: usize| bytes as f64 / 1024.0 / 1024.0;
        write!(
            f,
            "{:.2} MB -> {:.2} MB, {:.1}% reduction",
            mb(self.input_bytes),
            mb(self.output_bytes),
            self.reduction()
        )
    }
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    /// Summed over the fonts that succeeded.
    pub stats: SubsetStats,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    pub fn ok_or_bail(&self, operation: &str) -> Result<()> {
        if self.failed > 0 {
            bail!("{operation} failed: {} succeeded, {} failed", self.succeeded, self.failed);
        }
        Ok(())
    }

    fn record(mut self, outcome: Result<SubsetStats>) -> Self {
        match outcome {
            Ok(stats) => {
                self.succeeded += 1;
                self.stats.input_bytes += stats.input_bytes;
                self.stats.output_bytes += stats.output_bytes;
            }
            Err(e) => {
                error!("{e:?}");
                self.failed += 1;
            }
        }
        self
    }
}

/// Run `op` over `items` in parallel, logging each failure.
pub fn process_parallel_iter<T, F>(
    label: &str,
    items: impl IntoIterator<Item = T>,
    op: F,
) -> BatchResult
where
    T: Send,
    F: Fn(T) -> Result<SubsetStats> + Sync,
{
    let items: Vec<T> = items.into_iter().collect();
    let outcomes: Vec<_> = items.into_par_iter().map(&op).collect();
    let result = outcomes.into_iter().fold(BatchResult::default(), BatchResult::record);

    info!("{label}: {} succeeded, {} failed ({})", result.succeeded, result.failed, result.stats);
    result
}

/// Subset a font file to an output path using the given subsetter.
pub fn subset_file(subsetter: &Subsetter, input: &Path, output: &Path) -> Result<SubsetStats> {
    let data = read_font(input)?;
    let subset_data = subsetter
        .subset(&data)
        .with_context(|| format!("Failed to subset {}", input.display()))?;
    write_font(output, &subset_data)?;

    let stats = SubsetStats { input_bytes: data.len(), output_bytes: subset_data.len() };
    info!(
        "Subset {} -> {} ({stats})",
        input.file_name().unwrap_or_default().to_string_lossy(),
        output.file_name().unwrap_or_default().to_string_lossy(),
    );
    Ok(stats)
}

/// Where `input` lands in `output_dir`: same file name with `suffix` added
/// to the stem.
pub fn output_path(input: &Path, output_dir: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    output_dir.join(name)
}

/// Subset every input into `output_dir` in parallel.
pub fn subset_batch(
    subsetter: &Subsetter,
    inputs: &[PathBuf],
    output_dir: &Path,
    suffix: &str,
) -> BatchResult {
    process_parallel_iter("Subset", inputs, |input| {
        subset_file(subsetter, input, &output_path(input, output_dir, suffix))
    })
}
