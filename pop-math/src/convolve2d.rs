//! 2D convolution of spatial maps with a smoothing kernel.
//!
//! This is a true convolution (the kernel is flipped), with the output window
//! of `scipy.signal.convolve(..., mode="same")`: the input shape, centred on
//! the full convolution and zero-padded at the borders.

use ndarray::{Array2, ArrayView2, Zip};

/// Perform 2D convolution of a map with a kernel
///
/// # Arguments
/// * `image` - Input map as a 2D array
/// * `kernel` - Convolution kernel
///
/// # Returns
/// * Result of the convolution, same shape as `image`. Empty if either input
///   is empty.
pub fn convolve2d(image: &ArrayView2<f64>, kernel: &ArrayView2<f64>) -> Array2<f64> {
    let (img_rows, img_cols) = image.dim();
    let (ker_rows, ker_cols) = kernel.dim();

    if img_rows == 0 || img_cols == 0 || ker_rows == 0 || ker_cols == 0 {
        return Array2::zeros((0, 0));
    }

    // Offset of the centred window into the full convolution
    let (off_rows, off_cols) = ((ker_rows - 1) / 2, (ker_cols - 1) / 2);

    let mut output = Array2::zeros((img_rows, img_cols));

    Zip::indexed(&mut output).par_for_each(|(i, j), out| {
        let mut sum = 0.0;

        for ki in 0..ker_rows {
            let img_row = (i + off_rows) as isize - ki as isize;
            if img_row < 0 || img_row >= img_rows as isize {
                continue;
            }
            for kj in 0..ker_cols {
                let img_col = (j + off_cols) as isize - kj as isize;
                if img_col < 0 || img_col >= img_cols as isize {
                    continue;
                }
                sum += image[[img_row as usize, img_col as usize]] * kernel[[ki, kj]];
            }
        }

        *out = sum;
    });

    output
}

/// Create a normalized Gaussian kernel with specified size and sigma
///
/// # Arguments
/// * `size` - Size of the kernel in bins (must be odd)
/// * `sigma` - Standard deviation of the Gaussian in bins
///
/// # Returns
/// * Gaussian kernel as a 2D array summing to 1
pub fn gaussian_kernel(size: usize, sigma: f64) -> Array2<f64> {
    assert!(size % 2 == 1, "Kernel size must be odd");

    let mut kernel = Array2::zeros((size, size));
    let center = size as isize / 2;

    let mut sum = 0.0;

    for i in 0..size {
        for j in 0..size {
            let x = j as isize - center;
            let y = i as isize - center;

            let value = (-((x * x + y * y) as f64) / (2.0 * sigma * sigma)).exp();
            kernel[[i, j]] = value;
            sum += value;
        }
    }

    if sum > 0.0 {
        kernel.mapv_inplace(|x| x / sum);
    }

    kernel
}
