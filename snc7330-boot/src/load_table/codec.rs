//! Little-endian field access over fixed-size images.
//!
//! [`Writer`] is usable in `const` context so images can be produced at compile time.

/// Zero-initialised image under construction.
pub(crate) struct Writer<const N: usize> {
    buf: [u8; N],
}

impl<const N: usize> Writer<N> {
    pub(crate) const fn new() -> Self {
        Self { buf: [0; N] }
    }

    pub(crate) const fn bytes(&mut self, offset: usize, src: &[u8]) {
        let mut i = 0;
        while i < src.len() {
            self.buf[offset + i] = src[i];
            i += 1;
        }
    }

    pub(crate) const fn u16(&mut self, offset: usize, value: u16) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) const fn u32(&mut self, offset: usize, value: u32) {
        self.bytes(offset, &value.to_le_bytes());
    }

    pub(crate) const fn u32s(&mut self, offset: usize, values: &[u32]) {
        let mut i = 0;
        while i < values.len() {
            self.u32(offset + 4 * i, values[i]);
            i += 1;
        }
    }

    pub(crate) const fn finish(self) -> [u8; N] {
        self.buf
    }
}

/// Read-only view over an image. Callers check the length up front.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn array<const M: usize>(&self, offset: usize) -> [u8; M] {
        let mut out = [0u8; M];
        out.copy_from_slice(&self.buf[offset..offset + M]);
        out
    }

    pub(crate) fn u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.array(offset))
    }

    pub(crate) fn u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.array(offset))
    }

    pub(crate) fn u32s<const M: usize>(&self, offset: usize) -> [u32; M] {
        core::array::from_fn(|i| self.u32(offset + 4 * i))
    }

    /// Whether `buf[start..end]` is all zero.
    pub(crate) fn is_zero(&self, start: usize, end: usize) -> bool {
        self.buf[start..end].iter().all(|&b| b == 0)
    }
}

/// Copy a string into a zero-padded fixed-size field.
///
/// Panics (a compile error in `const` context) if `s` does not fit.
pub(crate) const fn str_field<const N: usize>(s: &str) -> [u8; N] {
    match try_str_field(s) {
        Some(field) => field,
        None => panic!("string does not fit its load table field"),
    }
}

/// Copy a string into a zero-padded fixed-size field, `None` if it does not fit.
pub(crate) const fn try_str_field<const N: usize>(s: &str) -> Option<[u8; N]> {
    let src = s.as_bytes();
    if src.len() > N {
        return None;
    }
    let mut out = [0u8; N];
    let mut i = 0;
    while i < src.len() {
        out[i] = src[i];
        i += 1;
    }
    Some(out)
}

/// Text of a zero-padded field up to the first NUL, if it is valid UTF-8.
pub(crate) fn field_str(field: &[u8]) -> Option<&str> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    core::str::from_utf8(&field[..end]).ok()
}
