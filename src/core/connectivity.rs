//! Connected pixel counts for isolating small patches.
use std::collections::VecDeque;

use ndarray::Array2;

use crate::raster::Band;
use crate::types::Connectivity;

/// Size of the connected component of equal-valued valid pixels each pixel
/// belongs to, capped at `max_size`. Masked pixels break connectivity and
/// stay masked in the output.
pub fn connected_pixel_count(band: &Band, max_size: usize, connectivity: Connectivity) -> Band {
    let (rows, cols) = band.values.dim();
    let mut label = Array2::<usize>::from_elem((rows, cols), usize::MAX);
    let mut counts = Array2::<f64>::zeros((rows, cols));
    let mut queue = VecDeque::new();
    let mut members = Vec::new();
    let mut next_label = 0;

    for start_row in 0..rows {
        for start_col in 0..cols {
            if !band.mask[[start_row, start_col]] || label[[start_row, start_col]] != usize::MAX {
                continue;
            }
            let value = band.values[[start_row, start_col]];
            label[[start_row, start_col]] = next_label;
            queue.push_back((start_row, start_col));
            members.clear();

            while let Some((row, col)) = queue.pop_front() {
                members.push((row, col));
                for &(dr, dc) in connectivity.offsets() {
                    let (Some(r), Some(c)) =
                        (row.checked_add_signed(dr), col.checked_add_signed(dc))
                    else {
                        continue;
                    };
                    if r >= rows || c >= cols {
                        continue;
                    }
                    if band.mask[[r, c]]
                        && label[[r, c]] == usize::MAX
                        && band.values[[r, c]] == value
                    {
                        label[[r, c]] = next_label;
                        queue.push_back((r, c));
                    }
                }
            }

            let size = members.len().min(max_size) as f64;
            for &(r, c) in &members {
                counts[[r, c]] = size;
            }
            next_label += 1;
        }
    }

    Band {
        name: band.name.clone(),
        values: counts,
        mask: band.mask.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_band(pattern: &[&str]) -> Band {
        let rows = pattern.len();
        let cols = pattern[0].len();
        let mask = Array2::from_shape_fn((rows, cols), |(r, c)| pattern[r].as_bytes()[c] == b'#');
        Band::new("floodwater", Array2::from_elem((rows, cols), 1.0), mask).unwrap()
    }

    #[test]
    fn counts_component_sizes() {
        let band = mask_band(&[
            "##....", //
            "##...#", //
            "......", //
            "..###.", //
        ]);
        let counts = connected_pixel_count(&band, 25, Connectivity::Eight);
        assert_eq!(counts.values[[0, 0]], 4.0);
        assert_eq!(counts.values[[1, 5]], 1.0);
        assert_eq!(counts.values[[3, 3]], 3.0);
        assert!(!counts.mask[[2, 2]]);
    }

    #[test]
    fn diagonal_neighbours_depend_on_connectivity() {
        let band = mask_band(&[
            "#..", //
            ".#.", //
            "..#", //
        ]);
        let eight = connected_pixel_count(&band, 25, Connectivity::Eight);
        let four = connected_pixel_count(&band, 25, Connectivity::Four);
        assert_eq!(eight.values[[1, 1]], 3.0);
        assert_eq!(four.values[[1, 1]], 1.0);
    }

    #[test]
    fn counts_are_capped() {
        let band = mask_band(&["##########", "##########", "##########"]);
        let counts = connected_pixel_count(&band, 25, Connectivity::Eight);
        assert!(counts.values.iter().all(|&v| v == 25.0));
    }

    #[test]
    fn different_values_are_separate_components() {
        let values = Array2::from_shape_vec((1, 4), vec![1.0, 1.0, 2.0, 2.0]).unwrap();
        let band = Band::from_values("class", values);
        let counts = connected_pixel_count(&band, 25, Connectivity::Four);
        assert_eq!(counts.values.as_slice().unwrap(), &[2.0, 2.0, 2.0, 2.0]);
        let values = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 1.0]).unwrap();
        let counts = connected_pixel_count(&Band::from_values("class", values), 25, Connectivity::Four);
        assert_eq!(counts.values.as_slice().unwrap(), &[1.0, 1.0, 1.0]);
    }
}
