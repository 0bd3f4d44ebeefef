//! Terrain slope from an elevation band.
//!
//! Horn (1981) 3x3 finite differences:
//!
//! ```text
//! a b c
//! d e f
//! g h i
//! ```
//!
//! dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * dx)
//! dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * dy)
//! slope = atan(sqrt(dz/dx^2 + dz/dy^2))
//!
//! Cells outside the grid or masked are replaced by the centre elevation so
//! border pixels get a slope instead of being dropped.
use ndarray::{Array2, Zip};

use crate::raster::{Band, Grid};

/// Slope in degrees; output is valid wherever the elevation is valid.
pub fn slope_degrees(elevation: &Band, grid: &Grid) -> Band {
    let (rows, cols) = grid.shape();
    let mut out = Array2::<f64>::zeros((rows, cols));
    let values = &elevation.values;
    let mask = &elevation.mask;

    Zip::indexed(&mut out)
        .and(mask)
        .par_for_each(|(row, col), slope, &valid| {
            if !valid {
                return;
            }
            let e = values[[row, col]];
            let z = |dr: isize, dc: isize| -> f64 {
                let r = row.checked_add_signed(dr).filter(|&r| r < rows);
                let c = col.checked_add_signed(dc).filter(|&c| c < cols);
                match (r, c) {
                    (Some(r), Some(c)) if mask[[r, c]] => values[[r, c]],
                    _ => e,
                }
            };
            let (a, b, c) = (z(-1, -1), z(-1, 0), z(-1, 1));
            let (d, f) = (z(0, -1), z(0, 1));
            let (g, h, i) = (z(1, -1), z(1, 0), z(1, 1));

            let (dx, dy) = grid.cell_size_m(row);
            let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
            let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);
            *slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
        });

    Band {
        name: "slope".to_string(),
        values: out,
        mask: mask.clone(),
    }
}
