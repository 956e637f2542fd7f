// SPDX-FileCopyrightText: 2025 ruzu contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// Virtual address in guest CPU memory (64-bit).
pub type VAddr = u64;

/// Physical address in guest memory (64-bit).
pub type PAddr = u64;

/// Virtual address in the GPU's own address space (40-bit in practice).
pub type GPUVAddr = u64;

/// Host-side location backing a guest address. Used as the key for every
/// GPU cache index, so that GPU VAs aliasing the same memory collide.
pub type CacheAddr = u64;

/// Page size (4 KiB, matching ARM64 / Switch).
pub const PAGE_SIZE: usize = 0x1000;

/// Page size as u64 for address math.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// Page shift (log2 of PAGE_SIZE).
pub const PAGE_SHIFT: u32 = 12;

/// Page mask for alignment checks.
pub const PAGE_MASK: u64 = PAGE_SIZE_U64 - 1;

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Align a value down to the given alignment.
#[inline]
pub const fn align_down(value: u64, alignment: u64) -> u64 {
    value & !(alignment - 1)
}

/// Align a value up to `1 << bits`.
#[inline]
pub const fn align_bits(value: u64, bits: u32) -> u64 {
    align_up(value, 1 << bits)
}

/// Check if a value is page-aligned.
#[inline]
pub const fn is_page_aligned(value: u64) -> bool {
    value & PAGE_MASK == 0
}

/// Smallest `n` such that `1 << n >= value`. Returns 0 for 0 and 1.
#[inline]
pub const fn log2_ceil(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        32 - (value - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, PAGE_SIZE_U64), 0);
        assert_eq!(align_up(1, PAGE_SIZE_U64), PAGE_SIZE_U64);
        assert_eq!(align_up(PAGE_SIZE_U64, PAGE_SIZE_U64), PAGE_SIZE_U64);
        assert_eq!(
            align_up(PAGE_SIZE_U64 + 1, PAGE_SIZE_U64),
            PAGE_SIZE_U64 * 2
        );
    }

    #[test]
    fn test_align_down() {
        assert_eq!(align_down(0, PAGE_SIZE_U64), 0);
        assert_eq!(align_down(1, PAGE_SIZE_U64), 0);
        assert_eq!(align_down(PAGE_SIZE_U64, PAGE_SIZE_U64), PAGE_SIZE_U64);
        assert_eq!(
            align_down(PAGE_SIZE_U64 + 1, PAGE_SIZE_U64),
            PAGE_SIZE_U64
        );
    }

    #[test]
    fn test_align_bits() {
        assert_eq!(align_bits(1, 9), 512);
        assert_eq!(align_bits(512, 9), 512);
        assert_eq!(align_bits(513, 9), 1024);
    }

    #[test]
    fn test_is_page_aligned() {
        assert!(is_page_aligned(0));
        assert!(is_page_aligned(PAGE_SIZE_U64));
        assert!(is_page_aligned(PAGE_SIZE_U64 * 100));
        assert!(!is_page_aligned(1));
        assert!(!is_page_aligned(PAGE_SIZE_U64 + 1));
    }

    #[test]
    fn test_log2_ceil() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(8), 3);
        assert_eq!(log2_ceil(9), 4);
        assert_eq!(log2_ceil(256), 8);
    }
}
