// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Constant tables from ISO/IEC 13818-2.

/// Zig-zag scan: maps a coefficient's scan index to its raster position (figure 7-2).
pub const ZIGZAG_SCAN: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Alternate scan, used when `alternate_scan` is set (figure 7-3).
pub const ALTERNATE_SCAN: [u8; 64] = [
    0, 8, 16, 24, 1, 9, 2, 10, 17, 25, 32, 40, 48, 56, 57, 49, 41, 33, 26, 18, 3, 11, 4, 12, 19,
    27, 34, 42, 50, 58, 35, 43, 51, 59, 20, 28, 5, 13, 6, 14, 21, 29, 36, 44, 52, 60, 37, 45, 53,
    61, 22, 30, 7, 15, 23, 31, 38, 46, 54, 62, 39, 47, 55, 63,
];

/// Default intra quantiser matrix in raster order (6.3.11).
pub const DEFAULT_INTRA_QUANTISER_MATRIX: [u8; 64] = [
    8, 16, 19, 22, 26, 27, 29, 34, //
    16, 16, 22, 24, 27, 29, 34, 37, //
    19, 22, 26, 27, 29, 34, 34, 38, //
    22, 22, 26, 27, 29, 34, 37, 40, //
    22, 26, 27, 29, 32, 35, 40, 48, //
    26, 27, 29, 32, 35, 40, 48, 58, //
    26, 27, 29, 34, 38, 46, 56, 69, //
    27, 29, 35, 38, 46, 56, 69, 83, //
];

/// Every entry of the default non-intra matrix.
pub const DEFAULT_NON_INTRA_QUANTISER_VALUE: u8 = 16;

/// `frame_rate_value` numerators, indexed by `frame_rate_code` (table 6-4).
pub const FRAME_RATE_NUMERATOR: [u32; 9] = [0, 24000, 24, 25, 30000, 30, 50, 60000, 60];

/// `frame_rate_value` denominators, indexed by `frame_rate_code` (table 6-4).
pub const FRAME_RATE_DENOMINATOR: [u32; 9] = [0, 1001, 1, 1, 1001, 1, 1, 1001, 1];

/// `quantiser_scale` for `q_scale_type == 1`, indexed by `quantiser_scale_code` (table 7-6).
pub const NON_LINEAR_QUANTISER_SCALE: [u16; 32] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 18, 20, 22, 24, 28, 32, 36, 40, 44, 48, 52, 56, 64,
    72, 80, 88, 96, 104, 112,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(scan: &[u8; 64]) -> bool {
        let mut seen = [false; 64];
        for &pos in scan {
            if seen[pos as usize] {
                return false;
            }
            seen[pos as usize] = true;
        }
        true
    }

    #[test]
    fn scans_are_permutations() {
        assert!(is_permutation(&ZIGZAG_SCAN));
        assert!(is_permutation(&ALTERNATE_SCAN));
    }

    #[test]
    fn default_intra_matrix_corners() {
        assert_eq!(DEFAULT_INTRA_QUANTISER_MATRIX[0], 8);
        assert_eq!(DEFAULT_INTRA_QUANTISER_MATRIX[ZIGZAG_SCAN[63] as usize], 83);
    }
}
