//! # Magic Squares
//!
//! An `n`x`n` grid of distinct values `1..=n²` where every row, column and both diagonals sum
//! to `n(n²+1)/2`. The sums are either hard or soft with a common weight, the distinctness is
//! always hard.

use anyhow::Context;
use coptool::model::{
    AllDifferentConstraint, Comparator, Domain, LinearConstraint, Model, Variable,
};

/// The name of the cell variable in row `row` and column `col`
#[must_use]
pub fn cell_name(row: usize, col: usize) -> String {
    format!("m_r{row}_c{col}")
}

/// The common line sum of an `n`x`n` magic square
#[must_use]
pub fn magic_constant(n: usize) -> i64 {
    let n = n as i64;
    n * (n * n + 1) / 2
}

/// Builds the magic square model. With `weight` set, the line sums are soft constraints of
/// that weight, otherwise hard.
///
/// # Errors
///
/// If `n` is zero or the model cannot be built.
pub fn magic_square(n: usize, weight: Option<i64>) -> anyhow::Result<Model> {
    anyhow::ensure!(n > 0, "a magic square needs at least one cell");
    let mut model = Model::new();
    let n_cells = i64::try_from(n * n).context("square too large")?;
    let mut grid: Vec<Vec<Variable>> = Vec::with_capacity(n);
    for row in 0..n {
        let mut cells = Vec::with_capacity(n);
        for col in 0..n {
            cells.push(model.new_variable(cell_name(row, col), Domain::range(1..=n_cells)?)?);
        }
        grid.push(cells);
    }
    model.add_constraint(
        AllDifferentConstraint::builder("distinct")
            .variables(grid.iter().flatten())
            .build()?,
    )?;

    let mut lines: Vec<(String, Vec<&Variable>)> = vec![];
    for (row, cells) in grid.iter().enumerate() {
        lines.push((format!("row{row}"), cells.iter().collect()));
    }
    for col in 0..n {
        lines.push((format!("col{col}"), grid.iter().map(|cells| &cells[col]).collect()));
    }
    lines.push(("diag".to_string(), (0..n).map(|i| &grid[i][i]).collect()));
    lines.push(("anti".to_string(), (0..n).map(|i| &grid[i][n - 1 - i]).collect()));

    let sum = magic_constant(n);
    for (name, cells) in lines {
        let mut builder = LinearConstraint::builder(name)
            .comparator(Comparator::Eq)
            .rhs(sum);
        if let Some(weight) = weight {
            builder = builder.weight(weight);
        }
        for cell in cells {
            builder.add_term(1, cell);
        }
        model.add_constraint(builder.build()?)?;
    }
    Ok(model)
}
