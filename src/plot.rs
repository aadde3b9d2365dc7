use crate::sector::RoseData;
use anyhow::{Result, anyhow};
use plotters::prelude::*;
use std::path::Path;

const SIZE: u32 = 800;
const MARGIN: i32 = 40;
const ARC_STEPS: usize = 12;
// Fraction of the sector arc actually filled, leaving a gap between wedges.
const WEDGE_FILL: f64 = 0.9;

/// Render a wind-rose diagram as a PNG.
///
/// Wedge length is proportional to sector frequency, wedge shade to the
/// sector mean speed. Compass convention: 0 degrees points up (north) and
/// angles grow clockwise. Pure drawing; all numbers come in via `rose`.
pub fn render_rose(rose: &RoseData, file: &Path) -> Result<()> {
    let root = BitMapBackend::new(file, (SIZE, SIZE)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|err| anyhow!("failed to fill canvas: {err}"))?;

    let center = (SIZE as i32 / 2, SIZE as i32 / 2);
    let max_radius = (SIZE as i32 / 2 - MARGIN) as f64;

    let max_frequency = rose.frequencies.iter().copied().fold(0.0, f64::max);
    let max_speed = rose.mean_speeds.iter().copied().fold(0.0, f64::max);

    draw_grid(&root, center, max_radius)?;

    if max_frequency > 0.0 {
        let half_arc = WEDGE_FILL * 180.0 / rose.centers_deg.len() as f64;
        for ((&angle, &frequency), &speed) in rose
            .centers_deg
            .iter()
            .zip(&rose.frequencies)
            .zip(&rose.mean_speeds)
        {
            if frequency <= 0.0 {
                continue;
            }
            let radius = max_radius * frequency / max_frequency;
            let shade = if max_speed > 0.0 { speed / max_speed } else { 0.0 };
            draw_wedge(&root, center, radius, angle, half_arc, speed_color(shade))?;
        }
    }

    root.present()
        .map_err(|err| anyhow!("failed to write {file:?}: {err}"))?;
    Ok(())
}

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn draw_grid(root: &Canvas<'_>, center: (i32, i32), max_radius: f64) -> Result<()> {
    let grid = RGBColor(190, 190, 190);

    // Concentric frequency rings at quarter steps.
    for step in 1..=4 {
        let radius = max_radius * step as f64 / 4.0;
        root.draw(&Circle::new(center, radius as i32, grid.stroke_width(1)))
            .map_err(|err| anyhow!("failed to draw ring: {err}"))?;
    }

    // Spokes every 45 degrees, slightly past the outer ring.
    for spoke in 0..8 {
        let angle = 45.0 * spoke as f64;
        let tip = polar_point(center, max_radius * 1.03, angle);
        root.draw(&PathElement::new(vec![center, tip], grid.stroke_width(1)))
            .map_err(|err| anyhow!("failed to draw spoke: {err}"))?;
    }

    Ok(())
}

fn draw_wedge(
    root: &Canvas<'_>,
    center: (i32, i32),
    radius: f64,
    angle_deg: f64,
    half_arc_deg: f64,
    color: RGBColor,
) -> Result<()> {
    let mut points = vec![center];
    for step in 0..=ARC_STEPS {
        let angle =
            angle_deg - half_arc_deg + 2.0 * half_arc_deg * step as f64 / ARC_STEPS as f64;
        points.push(polar_point(center, radius, angle));
    }

    root.draw(&Polygon::new(points.clone(), color.mix(0.85).filled()))
        .map_err(|err| anyhow!("failed to draw wedge: {err}"))?;
    points.push(center);
    root.draw(&PathElement::new(points, color.stroke_width(1)))
        .map_err(|err| anyhow!("failed to outline wedge: {err}"))?;
    Ok(())
}

/// Compass angle to screen coordinates: 0 degrees up, clockwise positive.
fn polar_point(center: (i32, i32), radius: f64, angle_deg: f64) -> (i32, i32) {
    let rad = angle_deg.to_radians();
    (
        center.0 + (radius * rad.sin()).round() as i32,
        center.1 - (radius * rad.cos()).round() as i32,
    )
}

/// Light-to-dark blue ramp over the normalized mean speed.
fn speed_color(shade: f64) -> RGBColor {
    let shade = shade.clamp(0.0, 1.0);
    let lerp = |lo: u8, hi: u8| (lo as f64 + shade * (hi as f64 - lo as f64)).round() as u8;
    RGBColor(lerp(173, 8), lerp(216, 69), lerp(230, 148))
}
