//! Dense rational tableau and the primal simplex iteration over it.
//!
//! The last row is the objective row and the last column is the right-hand
//! side. Ties are always broken towards the lowest index so a solve is
//! reproducible.

use std::fmt;

use tracing::trace;

use crate::error::RationalError;
use crate::rational::Rational;

#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    rows: usize,
    cols: usize,
    cells: Vec<Rational>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexStatus {
    /// No negative entry is left in the objective row.
    Optimal,
    /// The pivot cap was reached; the tableau holds the last state.
    IterationLimit,
    /// A cell left the representable range; the tableau is unusable.
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplexOutcome {
    pub status: SimplexStatus,
    pub iterations: usize,
    /// Columns that had a negative objective entry but no row to pivot on.
    pub skipped: Vec<usize>,
}

impl Tableau {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Rational::ZERO; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn objective_row(&self) -> usize {
        self.rows.saturating_sub(1)
    }

    pub fn rhs_column(&self) -> usize {
        self.cols.saturating_sub(1)
    }

    pub fn get(&self, row: usize, col: usize) -> Rational {
        self.cells[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Rational) {
        self.cells[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[Rational] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn clear_row(&mut self, row: usize) {
        let cols = self.cols;
        self.cells[row * cols..(row + 1) * cols].fill(Rational::ZERO);
    }

    pub fn clear_column(&mut self, col: usize) {
        for row in 0..self.rows {
            self.set(row, col, Rational::ZERO);
        }
    }

    /// Most negative objective entry outside the right-hand side.
    pub fn entering_column(&self, skipped: &[bool]) -> Option<usize> {
        let objective = self.objective_row();
        let mut best: Option<(usize, Rational)> = None;
        for col in 0..self.rhs_column() {
            if skipped.get(col).copied().unwrap_or(false) {
                continue;
            }
            let value = self.get(objective, col);
            if !value.is_negative() {
                continue;
            }
            match best {
                Some((_, current)) if value >= current => {}
                _ => best = Some((col, value)),
            }
        }
        best.map(|(col, _)| col)
    }

    /// Minimum ratio test over rows with a strictly positive coefficient.
    pub fn leaving_row(&self, col: usize) -> Result<Option<usize>, RationalError> {
        let rhs = self.rhs_column();
        let mut best: Option<(usize, Rational)> = None;
        for row in 0..self.objective_row() {
            let coefficient = self.get(row, col);
            if !coefficient.is_positive() {
                continue;
            }
            let ratio = self.get(row, rhs).checked_div(coefficient)?;
            match best {
                Some((_, current)) if ratio >= current => {}
                _ => best = Some((row, ratio)),
            }
        }
        Ok(best.map(|(row, _)| row))
    }

    pub fn pivot(&mut self, pivot_row: usize, pivot_col: usize) -> Result<(), RationalError> {
        let pivot = self.get(pivot_row, pivot_col);
        for col in 0..self.cols {
            let value = self.get(pivot_row, col).checked_div(pivot)?;
            self.set(pivot_row, col, value);
        }

        for row in 0..self.rows {
            if row == pivot_row {
                continue;
            }
            let factor = self.get(row, pivot_col);
            if factor.is_zero() {
                continue;
            }
            for col in 0..self.cols {
                let delta = factor.checked_mul(self.get(pivot_row, col))?;
                let value = self.get(row, col).checked_sub(delta)?;
                self.set(row, col, value);
            }
        }
        trace!(row = pivot_row, col = pivot_col, "pivot");
        Ok(())
    }

    /// Pivots until optimal, the cap is hit, or arithmetic overflows.
    pub fn run(&mut self, iteration_limit: usize) -> SimplexOutcome {
        let mut skipped = vec![false; self.cols];
        let mut iterations = 0;

        let status = loop {
            let Some(col) = self.entering_column(&skipped) else {
                break SimplexStatus::Optimal;
            };
            if iterations >= iteration_limit {
                break SimplexStatus::IterationLimit;
            }
            match self.leaving_row(col) {
                Ok(Some(row)) => {
                    if self.pivot(row, col).is_err() {
                        break SimplexStatus::Overflow;
                    }
                    iterations += 1;
                }
                // Nothing bounds this direction; leave it alone.
                Ok(None) => skipped[col] = true,
                Err(_) => break SimplexStatus::Overflow,
            }
        };

        SimplexOutcome {
            status,
            iterations,
            skipped: skipped
                .iter()
                .enumerate()
                .filter_map(|(col, &skip)| skip.then_some(col))
                .collect(),
        }
    }
}

impl fmt::Display for Tableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            let cells: Vec<String> = self.row(row).iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: i64) -> Rational {
        Rational::from(n)
    }

    fn tableau(rows: &[&[i64]]) -> Tableau {
        let mut t = Tableau::new(rows.len(), rows[0].len());
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                t.set(i, j, r(*value));
            }
        }
        t
    }

    #[test]
    fn test_entering_column_prefers_lowest_index_on_tie() {
        let t = tableau(&[&[1, 1, 1, 4], &[-3, -3, -1, 0]]);
        assert_eq!(t.entering_column(&[false; 4]), Some(0));
        assert_eq!(t.entering_column(&[true, false, false, false]), Some(1));
    }

    #[test]
    fn test_leaving_row_uses_min_ratio() {
        let t = tableau(&[&[2, 1, 8], &[1, 0, 3], &[-1, 0, 8], &[-1, -1, 0]]);
        // 8/2 = 4, 3/1 = 3, row 2 is not positive
        assert_eq!(t.leaving_row(0).unwrap(), Some(1));
        assert_eq!(t.leaving_row(1).unwrap(), Some(0));
    }

    #[test]
    fn test_run_textbook_problem() {
        // max 3x + 2y; x + y <= 4; x + 3y <= 6
        let mut t = tableau(&[
            &[1, 1, 1, 0, 4],
            &[1, 3, 0, 1, 6],
            &[-3, -2, 0, 0, 0],
        ]);
        let outcome = t.run(50);
        assert_eq!(outcome.status, SimplexStatus::Optimal);
        assert_eq!(t.get(2, 4), r(12));
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_unbounded_column_is_skipped() {
        let mut t = tableau(&[&[-1, 1, 0], &[-2, 0, 0]]);
        let outcome = t.run(10);
        assert_eq!(outcome.status, SimplexStatus::Optimal);
        assert_eq!(outcome.skipped, vec![0]);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_iteration_cap() {
        let mut t = tableau(&[
            &[1, 1, 1, 0, 4],
            &[1, 3, 0, 1, 6],
            &[-3, -2, 0, 0, 0],
        ]);
        let outcome = t.run(0);
        assert_eq!(outcome.status, SimplexStatus::IterationLimit);
    }

    #[test]
    fn test_clear_row_and_column() {
        let mut t = tableau(&[&[1, 2, 3], &[4, 5, 6]]);
        t.clear_row(0);
        t.clear_column(2);
        assert_eq!(t.row(0), &[Rational::ZERO; 3]);
        assert_eq!(t.row(1), &[r(4), r(5), Rational::ZERO]);
        assert_eq!(t.to_string(), "0\t0\t0\n4\t5\t0\n");
    }
}
