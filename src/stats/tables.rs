//! Student's t critical values (two-sided).
//!
//! Degrees of freedom that are not tabulated resolve to the nearest row, not
//! an interpolated value. At df = 11 the error against the exact 0.95 value
//! (2.201) is about 1.2%; the table stops at 29 because the normal
//! approximation takes over from n = 30.

/// Confidence levels with a column in [`T_TABLE`].
pub const T_CONFIDENCE_LEVELS: [f64; 3] = [0.90, 0.95, 0.99];

/// `(df, [t_0.90, t_0.95, t_0.99])`, ascending by df.
pub const T_TABLE: [(u32, [f64; 3]); 15] = [
    (1, [6.314, 12.706, 63.657]),
    (2, [2.920, 4.303, 9.925]),
    (3, [2.353, 3.182, 5.841]),
    (4, [2.132, 2.776, 4.604]),
    (5, [2.015, 2.571, 4.032]),
    (6, [1.943, 2.447, 3.707]),
    (7, [1.895, 2.365, 3.499]),
    (8, [1.860, 2.306, 3.355]),
    (9, [1.833, 2.262, 3.250]),
    (10, [1.812, 2.228, 3.169]),
    (12, [1.782, 2.179, 3.055]),
    (15, [1.753, 2.131, 2.947]),
    (20, [1.725, 2.086, 2.845]),
    (25, [1.708, 2.060, 2.787]),
    (29, [1.699, 2.045, 2.756]),
];

/// Look up a t critical value by nearest tabulated df.
///
/// Ties go to the smaller df (the wider interval). Returns `None` for
/// `df == 0` or a confidence level without a column.
#[must_use]
pub fn t_critical_value(df: u32, confidence: f64) -> Option<f64> {
    if df == 0 {
        return None;
    }
    let column = T_CONFIDENCE_LEVELS
        .iter()
        .position(|&c| (c - confidence).abs() < 1e-9)?;
    T_TABLE
        .iter()
        .min_by_key(|(row_df, _)| (row_df.abs_diff(df), *row_df))
        .map(|(_, values)| values[column])
}
