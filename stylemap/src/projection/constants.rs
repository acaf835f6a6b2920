pub const SMOOTH_K_TOLERANCE: f32 = 1e-5;
pub const MIN_K_DIST_SCALE: f32 = 1e-3;

/// Marks a neighbour slot dropped for being at or past the disconnection
/// distance.
pub const DISCONNECTED: u32 = u32::MAX;

/// Fewest rows a projection accepts.
pub const MIN_SAMPLES: usize = 3;

/// Above this row count the default epoch count drops from 500 to 200.
pub const SMALL_DATASET: usize = 10_000;
