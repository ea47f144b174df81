//! In-band allocation headers shared by the free-list and scratch strategies
//!
//! A live allocation is preceded by one word recording the full span of the
//! carved range (header + padding + payload). Padding words between the
//! header and the aligned payload are filled with [`PAD_SENTINEL`], so the
//! header is recovered from a payload pointer by walking back one word at a
//! time until the first non-sentinel word.
//!
//! Both strategies keep headers and payloads word-aligned, so every word
//! access here is aligned.

use crate::utils::WORD_SIZE;

/// Size of the header word
pub(crate) const HEADER_SIZE: usize = WORD_SIZE;

/// Fill value for padding words between header and payload
pub(crate) const PAD_SENTINEL: usize = usize::MAX;

/// High bit of the header word; the scratch strategy sets it to mark a
/// span as freed or as wrapped filler. Span values never reach this bit.
pub(crate) const FREE_BIT: usize = 1 << (usize::BITS - 1);

/// Locate the header word for `payload`
///
/// # Safety
/// `payload` must be a word-aligned pointer previously returned alongside
/// a header written with [`write_header`], still live in its buffer.
#[inline]
pub(crate) unsafe fn find_header(payload: *mut u8) -> *mut usize {
    let mut word = payload.cast::<usize>();
    unsafe {
        while *word.sub(1) == PAD_SENTINEL {
            word = word.sub(1);
        }
        word.sub(1)
    }
}

/// Write `value` into the header word and sentinel-fill up to `payload`
///
/// # Safety
/// `header` must be word-aligned, `payload` must be word-aligned and at
/// least one word past `header`, and the whole range must be writable.
#[inline]
pub(crate) unsafe fn write_header(header: *mut usize, payload: *mut u8, value: usize) {
    unsafe {
        *header = value;
        let mut word = header.add(1);
        while (word as usize) < payload as usize {
            *word = PAD_SENTINEL;
            word = word.add(1);
        }
    }
}
