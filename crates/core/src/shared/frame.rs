use ndarray::{ArrayView3, ArrayViewMut3};

/// An owned pixel buffer: tightly packed, interleaved channels, row-major.
///
/// Working bitmaps (sensor copy, crop, portrait, face) are all `Frame`s and
/// are reused between cycles; [`Frame::reshape`] only reallocates when the
/// byte length changes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    /// A black frame of the given size.
    pub fn zeroed(width: u32, height: u32, channels: u8) -> Self {
        Self::new(
            vec![0u8; (width as usize) * (height as usize) * (channels as usize)],
            width,
            height,
            channels,
        )
    }

    /// Changes the dimensions, keeping the allocation when possible.
    /// Pixel contents are unspecified afterwards.
    pub fn reshape(&mut self, width: u32, height: u32, channels: u8) {
        let len = (width as usize) * (height as usize) * (channels as usize);
        self.data.resize(len, 0);
        self.width = width;
        self.height = height;
        self.channels = channels;
    }

    /// Copies `height` rows of `width * channels` bytes out of a strided
    /// source buffer, reshaping `self` to match.
    ///
    /// Returns `false` and leaves `self` untouched when `src` is too short
    /// for the declared geometry.
    pub fn copy_from_strided(
        &mut self,
        src: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        row_stride: usize,
    ) -> bool {
        let row_len = (width as usize) * (channels as usize);
        let rows = height as usize;
        if row_stride < row_len || (rows > 0 && src.len() < row_stride * (rows - 1) + row_len) {
            return false;
        }

        self.reshape(width, height, channels);
        if row_len == 0 {
            return true;
        }
        if row_stride == row_len {
            self.data.copy_from_slice(&src[..row_len * rows]);
        } else {
            for (row, dst) in self.data.chunks_exact_mut(row_len).enumerate() {
                let start = row * row_stride;
                dst.copy_from_slice(&src[start..start + row_len]);
            }
        }
        true
    }

    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
