//! Bilinear upsampling kernels used to seed transposed convolutions.
//!
//! Kernels are stored in `(kernel_h, kernel_w, in_channels, out_channels)`
//! order. Only the channel diagonal carries the interpolation pattern, so each
//! channel is upsampled independently of the others.

use burn::tensor::TensorData;

/// A fixed-value upsampling kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearKernel {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl BilinearKernel {
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Weight at spatial position `(x, y)` connecting `in_ch` to `out_ch`.
    pub fn get(&self, x: usize, y: usize, in_ch: usize, out_ch: usize) -> f32 {
        let [_, kw, cin, cout] = self.shape;
        self.data[((x * kw + y) * cin + in_ch) * cout + out_ch]
    }

    /// The 2-D `[kernel_h][kernel_w]` slice for a channel pair.
    pub fn slice(&self, in_ch: usize, out_ch: usize) -> Vec<Vec<f32>> {
        let [kh, kw, _, _] = self.shape;
        (0..kh)
            .map(|x| (0..kw).map(|y| self.get(x, y, in_ch, out_ch)).collect())
            .collect()
    }

    /// Raw values in `(kernel_h, kernel_w, in, out)` order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Re-lays the kernel as `[in, out, kernel_h, kernel_w]`, the weight
    /// layout of `burn::nn::conv::ConvTranspose2d`.
    pub fn to_conv_transpose_data(&self) -> TensorData {
        let [kh, kw, cin, cout] = self.shape;
        let mut out = Vec::with_capacity(self.data.len());
        for i in 0..cin {
            for o in 0..cout {
                for x in 0..kh {
                    for y in 0..kw {
                        out.push(self.get(x, y, i, o));
                    }
                }
            }
        }
        TensorData::new(out, [cin, cout, kh, kw])
    }
}

/// Centre of the interpolation tent for a kernel of `kernel_size` taps.
pub fn bilinear_centre(kernel_size: usize, upscale_factor: usize) -> f32 {
    if kernel_size % 2 == 1 {
        upscale_factor as f32 - 1.0
    } else {
        upscale_factor as f32 - 0.5
    }
}

/// Builds a bilinear upsampling kernel of `filter_shape`
/// `(kernel_h, kernel_w, in_channels, out_channels)`.
///
/// Each tap is the product of two 1-D tent functions centred on
/// [`bilinear_centre`]. Taps falling outside the tent (kernels wider than
/// `2 * upscale_factor`) are clamped to zero instead of going negative.
pub fn bilinear_weights(filter_shape: [usize; 4], upscale_factor: usize) -> BilinearKernel {
    let [kh, kw, cin, cout] = filter_shape;
    let factor = upscale_factor.max(1) as f32;
    let centre = bilinear_centre(kw, upscale_factor.max(1));

    let tent = |pos: usize| (1.0 - (pos as f32 - centre).abs() / factor).max(0.0);

    let mut data = vec![0.0f32; kh * kw * cin * cout];
    for x in 0..kh {
        for y in 0..kw {
            let value = tent(x) * tent(y);
            for c in 0..cin.min(cout) {
                data[((x * kw + y) * cin + c) * cout + c] = value;
            }
        }
    }

    BilinearKernel {
        shape: filter_shape,
        data,
    }
}
