/// Sentinel stored in the fourth face slot to mark a triangle.
pub const TRI_INDEX: u32 = u32::MAX;

/// Default vertex color (linear RGB).
pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Default roughness written into new vertices.
pub const DEFAULT_ROUGHNESS: f32 = 0.18;

/// Default metalness written into new vertices.
pub const DEFAULT_METALNESS: f32 = 0.08;

/// Epsilon for floating point comparisons in ray intersection.
pub const RAY_EPSILON: f32 = 1e-6;
