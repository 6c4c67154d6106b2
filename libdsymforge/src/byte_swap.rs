use std::marker::PhantomData;
use std::{mem, ptr};

// Thank you, Hagen von Eitzen: https://math.stackexchange.com/a/291494
macro_rules! nearest_multiple_of {
    (@unsafe $val:expr, $factor:expr) => {
        (((($val) as u64).wrapping_sub(1)) | ((($factor) as u64).wrapping_sub(1))).wrapping_add(1)
    };

    ($val:expr, $factor:expr) => {{
        const _: () = assert!(is_power_of_2($factor));
        nearest_multiple_of!(@unsafe $val, $factor)
    }};
}

pub const fn is_power_of_2(num: u64) -> bool {
    if num == 0 { return false; }
    let mut i = 0u64;
    while i < 64 {
        if (1 << i) & num == num {
            return true;
        }
        i += 1;
    }
    false
}

pub trait ByteSwap {
    fn byte_swap(&mut self);
}

macro_rules! byte_swap_impl {
    (@noop: $ty:ty) => {
        impl ByteSwap for $ty {
            fn byte_swap(&mut self) {}
        }
    };
    (@num: $ty:ty) => {
        impl ByteSwap for $ty {
            fn byte_swap(&mut self) {
                *self = <$ty>::from_be_bytes(self.to_le_bytes());
            }
        }
    };
    (noops: $($noop_ty:ty),*;
     nums: $($num_ty:ty),* $(;)?) => {
        $(byte_swap_impl!(@noop: $noop_ty);)*
        $(byte_swap_impl!(@num: $num_ty);)*
    };
}

impl<T: ByteSwap, const N: usize> ByteSwap for [T; N] {
    fn byte_swap(&mut self) {
        for value in self {
            value.byte_swap();
        }
    }
}

byte_swap_impl!(noops: u8, i8; nums: u16, u32, u64, i16, i32, i64);

/// A typed handle to a struct-sized range of a `Buffer`, for filling in
/// values after the space for them has been reserved.
pub struct Ref<T: ByteSwap> {
    pub addr: usize,
    pub _phantom: PhantomData<T>,
}

pub struct ResolvedRefMut<'a, T: ByteSwap> {
    bytes: &'a mut [u8],
    _phantom: PhantomData<T>,
}

impl<'a, T: ByteSwap> ResolvedRefMut<'a, T> {
    pub fn set(&mut self, mut new_value: T) {
        if cfg!(target_endian = "big") {
            new_value.byte_swap();
        }
        // Offsets into the buffer carry no alignment guarantee, hence the
        // unaligned write through a raw pointer.
        unsafe {
            ptr::write_unaligned(self.bytes.as_mut_ptr() as *mut T, new_value);
        }
    }
}

impl<T: ByteSwap> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            addr: self.addr,
            _phantom: PhantomData,
        }
    }
}
impl<T: ByteSwap> Copy for Ref<T> {}

impl<T: ByteSwap> Ref<T> {
    pub fn new(addr: usize) -> Self {
        Self {
            addr,
            _phantom: PhantomData,
        }
    }

    pub fn size(self) -> usize { mem::size_of::<T>() }
    pub fn end(self) -> usize { self.addr + self.size() }
}

/// Little-endian output accumulator for on-disk structures.
#[derive(Default)]
pub struct Buffer {
    pub data: Vec<u8>,
}

impl Buffer {
    pub fn pos(&self) -> usize { self.data.len() }

    pub fn alloc<T: ByteSwap>(&mut self) -> Ref<T> {
        let reff = Ref::new(self.data.len());
        self.pad_with_zeroes(mem::size_of::<T>());
        reff
    }

    pub fn push<T: ByteSwap>(&mut self, value: T) -> Ref<T> {
        let addr = self.alloc();
        self.get_mut(addr).set(value);
        addr
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn pad_with_zeroes(&mut self, size: usize) {
        self.data.extend(std::iter::repeat(0).take(size));
    }

    pub fn push_uleb128(&mut self, mut value: u32) {
        loop {
            let mut next_byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                next_byte |= 0x80;
            }
            self.push(next_byte);

            if value == 0 { break; }
        }
    }

    pub fn push_null_terminated_string(&mut self, val: &str) -> usize {
        let pos = self.pos();
        self.data.extend(val.as_bytes());
        self.data.push(0);
        pos
    }

    pub fn get_mut<'a, T: ByteSwap>(&'a mut self, addr: Ref<T>) -> ResolvedRefMut<'a, T> {
        let bytes = &mut self.data[addr.addr..addr.addr + mem::size_of::<T>()];
        ResolvedRefMut { bytes, _phantom: PhantomData }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_multiple_of() {
        assert_eq!(nearest_multiple_of!(0u64, 0x1000u64), 0);
        assert_eq!(nearest_multiple_of!(1u64, 0x1000u64), 0x1000);
        assert_eq!(nearest_multiple_of!(0x1000u64, 0x1000u64), 0x1000);
        assert_eq!(nearest_multiple_of!(0x1001u64, 0x1000u64), 0x2000);
    }

    #[test]
    fn test_push_uleb128() {
        let cases: [(u32, &[u8]); 4] = [
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (300, &[0xAC, 0x02]),
        ];
        for (value, expected) in cases {
            let mut buf = Buffer::default();
            buf.push_uleb128(value);
            assert_eq!(buf.data, expected);
        }
    }

    #[test]
    fn test_patch_at_unaligned_offset() {
        let mut buf = Buffer::default();
        buf.push(0xABu8);
        let patch = buf.alloc::<u32>();
        buf.push(0xCDu8);
        buf.get_mut(patch).set(0x1122_3344);
        assert_eq!(buf.data, [0xAB, 0x44, 0x33, 0x22, 0x11, 0xCD]);
    }

    #[test]
    fn test_push_null_terminated_string() {
        let mut buf = Buffer::default();
        let first = buf.push_null_terminated_string("foo");
        let second = buf.push_null_terminated_string("bar");
        assert_eq!(first, 0);
        assert_eq!(second, 4);
        assert_eq!(buf.data, b"foo\0bar\0");
    }
}
