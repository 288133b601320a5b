//! Parameter sweeps over (concurrency, max_tokens) cells.

use tracing::info;

use crate::config::LoadTestConfig;
use crate::error::{LoadTestError, LoadTestResult};
use crate::report::{OutputFormat, ResultsReport};
use crate::runner::PhaseRunner;
use crate::sink::ResultSink;

/// One measurement cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepCell {
    pub concurrency: u32,
    pub max_tokens: u32,
}

/// Ordered list of cells: token level is the outer loop, concurrency the inner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepGrid {
    cells: Vec<SweepCell>,
}

impl SweepGrid {
    /// Cartesian product of `token_levels` (outer) and `concurrency_levels` (inner).
    pub fn new(concurrency_levels: &[u32], token_levels: &[u32]) -> LoadTestResult<Self> {
        if concurrency_levels.is_empty() {
            return Err(LoadTestError::config("sweep needs at least one concurrency level"));
        }
        if token_levels.is_empty() {
            return Err(LoadTestError::config("sweep needs at least one token level"));
        }

        let cells = token_levels
            .iter()
            .flat_map(|&max_tokens| {
                concurrency_levels.iter().map(move |&concurrency| SweepCell {
                    concurrency,
                    max_tokens,
                })
            })
            .collect();
        Ok(Self { cells })
    }

    /// The one-cell grid of a non-sweep run.
    pub fn single(concurrency: u32, max_tokens: u32) -> Self {
        Self {
            cells: vec![SweepCell {
                concurrency,
                max_tokens,
            }],
        }
    }

    pub fn cells(&self) -> &[SweepCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Totals over a finished sweep. Individual results are not retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub cells: usize,
    pub successes: u64,
    pub errors: u64,
}

/// Walks a [`SweepGrid`], persisting each cell's result before starting the next.
pub struct SweepOrchestrator {
    base: LoadTestConfig,
    grid: SweepGrid,
    output: OutputFormat,
    show_progress: bool,
}

impl SweepOrchestrator {
    pub fn new(base: LoadTestConfig, grid: SweepGrid) -> Self {
        Self {
            base,
            grid,
            output: OutputFormat::Line,
            show_progress: false,
        }
    }

    /// Extra per-cell report printed after the summary line.
    pub fn with_output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn grid(&self) -> &SweepGrid {
        &self.grid
    }

    /// Run every cell in grid order. Only config and sink failures abort the sweep.
    pub async fn run<S: ResultSink + ?Sized>(&self, sink: &mut S) -> LoadTestResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        for (index, cell) in self.grid.cells().iter().enumerate() {
            info!(
                cell = index + 1,
                of = self.grid.len(),
                concurrency = cell.concurrency,
                max_tokens = cell.max_tokens,
                "Running sweep cell"
            );

            let config = self.base.for_cell(cell.concurrency, cell.max_tokens);
            let runner = PhaseRunner::new(config)?.with_progress(self.show_progress);
            let output = runner.run().await;
            let result = output.aggregate(cell.concurrency, cell.max_tokens);

            println!("{}", ResultsReport::summary_line(&result));
            match self.output {
                OutputFormat::Line => {}
                OutputFormat::Table => println!("{}", ResultsReport::format_table(&result)),
                OutputFormat::Json => println!("{}", ResultsReport::format_json(&result)?),
            }

            sink.append(&result)?;

            summary.cells += 1;
            summary.successes += result.n;
            summary.errors += result.errors;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_order_tokens_outer() {
        let grid = SweepGrid::new(&[1, 2], &[16, 64]).unwrap();
        let cells: Vec<(u32, u32)> = grid
            .cells()
            .iter()
            .map(|c| (c.max_tokens, c.concurrency))
            .collect();
        assert_eq!(cells, vec![(16, 1), (16, 2), (64, 1), (64, 2)]);
    }

    #[test]
    fn test_grid_preserves_given_order() {
        let grid = SweepGrid::new(&[8, 1, 4], &[256, 16]).unwrap();
        assert_eq!(grid.len(), 6);
        assert_eq!(
            grid.cells()[0],
            SweepCell {
                concurrency: 8,
                max_tokens: 256
            }
        );
        assert_eq!(
            grid.cells()[5],
            SweepCell {
                concurrency: 4,
                max_tokens: 16
            }
        );
    }

    #[test]
    fn test_grid_rejects_empty_levels() {
        assert!(SweepGrid::new(&[], &[16]).is_err());
        assert!(SweepGrid::new(&[1], &[]).is_err());
    }

    #[test]
    fn test_single_grid() {
        let grid = SweepGrid::single(4, 16);
        assert_eq!(grid.len(), 1);
        assert!(!grid.is_empty());
        assert_eq!(grid.cells()[0].concurrency, 4);
    }
}
