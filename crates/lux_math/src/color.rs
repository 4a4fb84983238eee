use glam::Vec3;

/// Convert an HSV triple (all components in [0, 1]) to linear RGB.
///
/// Hue wraps, so 1.0 is the same as 0.0 (red).
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let s = s.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let h = h.rem_euclid(1.0) * 6.0;

    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match sector as u32 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}
