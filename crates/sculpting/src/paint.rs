//! Color, material and mask painting.
//!
//! The mask lives in [`Material::selection`]. Batch operations (`mask_*`,
//! [`paint_all`]) touch every vertex and mark the whole mesh dirty; sampled
//! operations leave dirty marking to the caller.

use glam::Vec3;
use relief_mesh::{Material, Mesh};
use serde::{Deserialize, Serialize};

/// Values written by the paint tool. Fields are private; setters clamp to
/// valid ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintSettings {
    color: Vec3,
    roughness: f32,
    metalness: f32,
    write_color: bool,
    write_roughness: bool,
    write_metalness: bool,
    pick_color: bool,
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self {
            color: Vec3::new(1.0, 0.25, 0.25),
            roughness: 0.18,
            metalness: 0.08,
            write_color: true,
            write_roughness: true,
            write_metalness: true,
            pick_color: false,
        }
    }
}

impl PaintSettings {
    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color.clamp(Vec3::ZERO, Vec3::ONE);
    }

    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
    }

    pub fn metalness(&self) -> f32 {
        self.metalness
    }

    pub fn set_metalness(&mut self, metalness: f32) {
        self.metalness = metalness.clamp(0.0, 1.0);
    }

    pub fn write_color(&self) -> bool {
        self.write_color
    }

    pub fn set_write_color(&mut self, enabled: bool) {
        self.write_color = enabled;
    }

    pub fn write_roughness(&self) -> bool {
        self.write_roughness
    }

    pub fn set_write_roughness(&mut self, enabled: bool) {
        self.write_roughness = enabled;
    }

    pub fn write_metalness(&self) -> bool {
        self.write_metalness
    }

    pub fn set_write_metalness(&mut self, enabled: bool) {
        self.write_metalness = enabled;
    }

    /// Whether the paint tool samples the surface into these settings
    /// instead of painting.
    pub fn pick_color(&self) -> bool {
        self.pick_color
    }

    pub fn set_pick_color(&mut self, enabled: bool) {
        self.pick_color = enabled;
    }

    /// Adopt a sampled color and material.
    pub fn pick(&mut self, color: Vec3, material: Material) {
        self.set_color(color);
        self.set_roughness(material.roughness);
        self.set_metalness(material.metalness);
    }
}

/// Blend the weighted vertices toward the paint settings.
pub fn apply_paint(mesh: &mut Mesh, weights: &[(u32, f32)], settings: &PaintSettings) {
    if settings.write_color {
        let colors = mesh.colors_mut();
        for &(v, w) in weights {
            let c = colors[v as usize];
            colors[v as usize] = c.lerp(settings.color, w.min(1.0));
        }
    }
    if settings.write_roughness || settings.write_metalness {
        let materials = mesh.materials_mut();
        for &(v, w) in weights {
            let m = &mut materials[v as usize];
            let w = w.min(1.0);
            if settings.write_roughness {
                m.roughness += (settings.roughness - m.roughness) * w;
            }
            if settings.write_metalness {
                m.metalness += (settings.metalness - m.metalness) * w;
            }
        }
    }
}

/// Paint every vertex, scaled by `intensity × (1 - selection)`.
pub fn paint_all(mesh: &mut Mesh, settings: &PaintSettings, intensity: f32) {
    let weights: Vec<(u32, f32)> = mesh
        .materials()
        .iter()
        .enumerate()
        .map(|(v, m)| (v as u32, intensity * (1.0 - m.selection)))
        .filter(|&(_, w)| w > 0.0)
        .collect();
    apply_paint(mesh, &weights, settings);
    mark_all(mesh);
}

/// Raise the mask toward 1, or lower it toward 0 when `negative`.
pub fn apply_mask(mesh: &mut Mesh, weights: &[(u32, f32)], negative: bool) {
    let target = if negative { 0.0 } else { 1.0 };
    let materials = mesh.materials_mut();
    for &(v, w) in weights {
        let m = &mut materials[v as usize];
        m.selection = (m.selection + (target - m.selection) * w.min(1.0)).clamp(0.0, 1.0);
    }
}

pub fn mask_clear(mesh: &mut Mesh) {
    for m in mesh.materials_mut() {
        m.selection = 0.0;
    }
    mark_all(mesh);
}

/// Numeric inversion `w → 1 - w`.
pub fn mask_invert(mesh: &mut Mesh) {
    for m in mesh.materials_mut() {
        m.selection = 1.0 - m.selection;
    }
    mark_all(mesh);
}

/// Replace every mask value by the average of itself and its neighbors.
pub fn mask_blur(mesh: &mut Mesh) {
    let blurred = neighborhood_average(mesh);
    for (m, value) in mesh.materials_mut().iter_mut().zip(blurred) {
        m.selection = value;
    }
    mark_all(mesh);
}

/// Push every mask value away from its neighborhood average.
pub fn mask_sharpen(mesh: &mut Mesh) {
    let averages = neighborhood_average(mesh);
    for (m, average) in mesh.materials_mut().iter_mut().zip(averages) {
        m.selection = (m.selection + (m.selection - average)).clamp(0.0, 1.0);
    }
    mark_all(mesh);
}

fn neighborhood_average(mesh: &Mesh) -> Vec<f32> {
    let materials = mesh.materials();
    (0..mesh.vertex_count() as u32)
        .map(|v| {
            let neighbors = mesh.vertex_neighbors(v);
            let sum: f32 = neighbors
                .iter()
                .map(|&n| materials[n as usize].selection)
                .sum::<f32>()
                + materials[v as usize].selection;
            sum / (neighbors.len() + 1) as f32
        })
        .collect()
}

fn mark_all(mesh: &mut Mesh) {
    let all: Vec<u32> = (0..mesh.vertex_count() as u32).collect();
    mesh.mark_colors_dirty(&all);
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_mesh::primitives;

    #[test]
    fn test_paint_respects_write_flags() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        let mut settings = PaintSettings::default();
        settings.set_color(Vec3::new(1.0, 0.0, 0.0));
        settings.set_roughness(1.0);
        settings.set_write_metalness(false);

        apply_paint(&mut mesh, &[(4, 1.0), (0, 0.5)], &settings);
        assert_eq!(mesh.colors()[4], Vec3::new(1.0, 0.0, 0.0));
        assert!((mesh.colors()[0] - Vec3::new(1.0, 0.5, 0.5)).length() < 1e-6);
        assert_eq!(mesh.materials()[4].roughness, 1.0);
        assert_eq!(mesh.materials()[4].metalness, Material::default().metalness);
        assert_eq!(mesh.colors()[8], Vec3::ONE);
    }

    #[test]
    fn test_color_write_disabled_keeps_colors() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        let mut settings = PaintSettings::default();
        settings.set_color(Vec3::ZERO);
        settings.set_write_color(false);
        settings.set_write_roughness(false);
        assert!(!settings.write_color());
        assert!(!settings.write_roughness());
        assert!(settings.write_metalness());

        settings.set_metalness(1.0);
        apply_paint(&mut mesh, &[(4, 1.0)], &settings);
        assert_eq!(mesh.colors()[4], Vec3::ONE);
        assert_eq!(mesh.materials()[4].roughness, Material::default().roughness);
        assert_eq!(mesh.materials()[4].metalness, 1.0);
    }

    #[test]
    fn test_paint_all_skips_masked() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        mesh.materials_mut()[3].selection = 1.0;
        let mut settings = PaintSettings::default();
        settings.set_color(Vec3::ZERO);
        paint_all(&mut mesh, &settings, 1.0);
        assert_eq!(mesh.colors()[0], Vec3::ZERO);
        assert_eq!(mesh.colors()[3], Vec3::ONE);
        assert_eq!(mesh.dirty().len(), 9);
    }

    #[test]
    fn test_mask_raise_and_lower() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        apply_mask(&mut mesh, &[(4, 0.5)], false);
        assert!((mesh.materials()[4].selection - 0.5).abs() < 1e-6);
        apply_mask(&mut mesh, &[(4, 1.0)], true);
        assert_eq!(mesh.materials()[4].selection, 0.0);
    }

    #[test]
    fn test_double_invert_restores_mask() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        mesh.materials_mut()[2].selection = 1.0;
        mask_invert(&mut mesh);
        assert_eq!(mesh.materials()[2].selection, 0.0);
        assert_eq!(mesh.materials()[0].selection, 1.0);
        mask_invert(&mut mesh);
        assert_eq!(mesh.materials()[2].selection, 1.0);
        assert_eq!(mesh.materials()[0].selection, 0.0);
    }

    #[test]
    fn test_blur_spreads_and_sharpen_restores_contrast() {
        let mut mesh = primitives::plane(2, 2.0).unwrap();
        for v in 0..3 {
            mesh.materials_mut()[v].selection = 1.0;
        }
        mask_blur(&mut mesh);
        let edge = mesh.materials()[1].selection;
        let inner = mesh.materials()[4].selection;
        assert!((edge - 0.75).abs() < 1e-6);
        assert!((inner - 0.2).abs() < 1e-6);

        mask_sharpen(&mut mesh);
        assert!(mesh.materials()[1].selection > edge);
        assert!(mesh.materials()[4].selection < inner);

        mask_clear(&mut mesh);
        assert!(mesh.materials().iter().all(|m| m.selection == 0.0));
    }

    #[test]
    fn test_pick_clamps() {
        let mut settings = PaintSettings::default();
        settings.pick(Vec3::new(2.0, 0.5, -1.0), Material::new(0.3, 1.5, 0.0));
        assert_eq!(settings.color(), Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(settings.metalness(), 1.0);
        assert_eq!(settings.roughness(), 0.3);
    }
}
