use wide::f32x4;

#[inline(always)]
pub(crate) fn load4(slice: &[f32], offset: usize) -> f32x4 {
    debug_assert!(offset + 4 <= slice.len());
    f32x4::from([
        slice[offset],
        slice[offset + 1],
        slice[offset + 2],
        slice[offset + 3],
    ])
}

#[inline(always)]
pub(crate) fn store4(slice: &mut [f32], offset: usize, value: f32x4) {
    debug_assert!(offset + 4 <= slice.len());
    slice[offset..offset + 4].copy_from_slice(&value.to_array());
}

/// Loads one lane per position, each offset by `delta` source samples.
#[inline(always)]
pub(crate) fn gather4(slice: &[f32], positions: &[usize; 4], delta: usize) -> f32x4 {
    f32x4::from([
        slice[positions[0] + delta],
        slice[positions[1] + delta],
        slice[positions[2] + delta],
        slice[positions[3] + delta],
    ])
}

/// Horizontal sum with a fixed association order.
#[inline(always)]
pub(crate) fn hsum(value: f32x4) -> f32 {
    let v = value.to_array();
    (v[0] + v[1]) + (v[2] + v[3])
}
