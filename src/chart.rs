//! Daily revenue bar chart rendered to PNG for Telegram photos.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};

use crate::models::DailyRevenue;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN: u32 = 40;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const BAR: Rgb<u8> = Rgb([46, 125, 50]);
const BAR_PEAK: Rgb<u8> = Rgb([255, 143, 0]);

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    for x in x0.min(WIDTH)..x1.min(WIDTH) {
        for y in y0.min(HEIGHT)..y1.min(HEIGHT) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Bar heights in pixels for the plot area, tallest bar filling `max_height`
pub fn bar_heights(days: &[DailyRevenue], max_height: u32) -> Vec<u32> {
    let peak = days.iter().map(|d| d.revenue).fold(0.0_f64, f64::max);
    days.iter()
        .map(|d| {
            if peak <= 0.0 {
                0
            } else {
                ((d.revenue.max(0.0) / peak) * f64::from(max_height)).round() as u32
            }
        })
        .collect()
}

/// Render the chart, or `None` when there are fewer than two days to compare
pub fn sales_chart_png(days: &[DailyRevenue]) -> Result<Option<Vec<u8>>> {
    if days.len() < 2 {
        return Ok(None);
    }

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot_height = HEIGHT - 2 * MARGIN;
    let plot_width = WIDTH - 2 * MARGIN;
    let baseline = HEIGHT - MARGIN;

    for step in 1..=4 {
        let y = baseline - plot_height * step / 4;
        fill_rect(&mut img, MARGIN, y, WIDTH - MARGIN, y + 1, GRID);
    }

    let slot = (plot_width / days.len() as u32).max(1);
    let bar_width = (slot * 2 / 3).max(1);
    let heights = bar_heights(days, plot_height);
    let tallest = heights.iter().copied().max().unwrap_or(0);

    for (i, height) in heights.iter().enumerate() {
        let x0 = MARGIN + slot * i as u32 + slot.saturating_sub(bar_width) / 2;
        let color = if *height == tallest && tallest > 0 { BAR_PEAK } else { BAR };
        fill_rect(&mut img, x0, baseline - height, x0 + bar_width, baseline, color);
    }

    fill_rect(&mut img, MARGIN, baseline, WIDTH - MARGIN, baseline + 2, AXIS);
    fill_rect(&mut img, MARGIN - 2, MARGIN, MARGIN, baseline + 2, AXIS);

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .context("Failed to encode sales chart")?;
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32, revenue: f64) -> DailyRevenue {
        DailyRevenue {
            day: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            orders: 1,
            revenue,
        }
    }

    #[test]
    fn test_needs_two_points() {
        assert!(sales_chart_png(&[]).unwrap().is_none());
        assert!(sales_chart_png(&[day(1, 100.0)]).unwrap().is_none());
    }

    #[test]
    fn test_renders_png() {
        let png = sales_chart_png(&[day(1, 100.0), day(2, 300.0), day(3, 0.0)])
            .unwrap()
            .unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(image::guess_format(&png).unwrap(), image::ImageFormat::Png);
    }

    #[test]
    fn test_bar_heights_scale_to_peak() {
        assert_eq!(bar_heights(&[day(1, 50.0), day(2, 200.0)], 100), vec![25, 100]);
        assert_eq!(bar_heights(&[day(1, 0.0), day(2, 0.0)], 100), vec![0, 0]);
    }
}
