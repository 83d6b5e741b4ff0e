//! Stats presenter
//!
//! Shapes aggregator output for display: zero-point fallback for an empty
//! store, newest-first table order, and the PNG time-series chart.

use chrono::NaiveDate;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::io::Cursor;

use crate::db::{DailyCount, PathCount};

/// Substitute a single zero point for `today` when there is no data yet, so
/// charts never get an empty series.
pub fn with_today_fallback(totals: Vec<DailyCount>, today: NaiveDate) -> Vec<DailyCount> {
    if totals.is_empty() {
        vec![DailyCount { day: today, visitors: 0 }]
    } else {
        totals
    }
}

pub fn totals_newest_first(mut totals: Vec<DailyCount>) -> Vec<DailyCount> {
    totals.sort_by(|a, b| b.day.cmp(&a.day));
    totals
}

/// Newest day first; pages within a day stay in path order.
pub fn pages_newest_first(mut pages: Vec<PathCount>) -> Vec<PathCount> {
    pages.sort_by(|a, b| b.day.cmp(&a.day).then_with(|| a.path.cmp(&b.path)));
    pages
}

const WIDTH: u32 = 900;
const HEIGHT: u32 = 420;
const MARGIN_LEFT: i32 = 56;
const MARGIN_RIGHT: i32 = 20;
const MARGIN_TOP: i32 = 20;
const MARGIN_BOTTOM: i32 = 36;
const Y_TICKS: i64 = 5;
const GLYPH_SCALE: i32 = 2;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const TOTAL_LINE: Rgb<u8> = Rgb([20, 60, 140]);

const PAGE_PALETTE: &[Rgb<u8>] = &[
    Rgb([230, 120, 40]),
    Rgb([60, 160, 80]),
    Rgb([200, 60, 80]),
    Rgb([140, 90, 190]),
    Rgb([40, 170, 180]),
    Rgb([170, 140, 40]),
    Rgb([120, 120, 120]),
];

/// Render the visitor series as a PNG.
///
/// `totals` becomes the thick primary line. Each path in `pages` gets a thin
/// line of its own; days where a page had no visits plot as zero.
pub fn render_chart(totals: &[DailyCount], pages: &[PathCount]) -> Result<Vec<u8>, image::ImageError> {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let days: Vec<NaiveDate> = {
        let mut days: Vec<NaiveDate> = totals
            .iter()
            .map(|c| c.day)
            .chain(pages.iter().map(|c| c.day))
            .collect();
        days.sort();
        days.dedup();
        days
    };

    let peak = totals
        .iter()
        .map(|c| c.visitors)
        .chain(pages.iter().map(|c| c.visits))
        .max()
        .unwrap_or(0);
    let step = ((peak + Y_TICKS - 1) / Y_TICKS).max(1);
    let y_max = step * Y_TICKS;

    let plot = PlotArea::new(days.first().copied(), days.last().copied(), y_max);

    for tick in 0..=Y_TICKS {
        let value = tick * step;
        let y = plot.y(value);
        if tick > 0 {
            draw_line(&mut img, (plot.left, y), (plot.right, y), GRID, 0);
        }
        let label = value.to_string();
        let label_x = plot.left - 6 - text_width(&label);
        draw_text(&mut img, label_x, y - 5 * GLYPH_SCALE / 2, &label, AXIS);
    }

    draw_line(&mut img, (plot.left, plot.top), (plot.left, plot.bottom), AXIS, 0);
    draw_line(&mut img, (plot.left, plot.bottom), (plot.right, plot.bottom), AXIS, 0);

    if let (Some(first), Some(last)) = (days.first(), days.last()) {
        let label_y = plot.bottom + 10;
        let first_label = first.format("%Y-%m-%d").to_string();
        draw_text(&mut img, plot.x(*first) - text_width(&first_label) / 2, label_y, &first_label, AXIS);
        if last != first {
            let last_label = last.format("%Y-%m-%d").to_string();
            draw_text(&mut img, plot.x(*last) - text_width(&last_label) / 2, label_y, &last_label, AXIS);
        }
    }

    let mut by_path: BTreeMap<&str, BTreeMap<NaiveDate, i64>> = BTreeMap::new();
    for row in pages {
        by_path.entry(row.path.as_str()).or_default().insert(row.day, row.visits);
    }
    for (i, series) in by_path.values().enumerate() {
        let color = PAGE_PALETTE[i % PAGE_PALETTE.len()];
        let points: Vec<(i32, i32)> = days
            .iter()
            .map(|day| (plot.x(*day), plot.y(series.get(day).copied().unwrap_or(0))))
            .collect();
        draw_polyline(&mut img, &points, color, 0);
    }

    let total_points: Vec<(i32, i32)> = totals
        .iter()
        .map(|c| (plot.x(c.day), plot.y(c.visitors)))
        .collect();
    draw_polyline(&mut img, &total_points, TOTAL_LINE, 1);
    for &(x, y) in &total_points {
        fill_square(&mut img, x, y, 3, TOTAL_LINE);
    }

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

struct PlotArea {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
    first: Option<NaiveDate>,
    span_days: i64,
    y_max: i64,
}

impl PlotArea {
    fn new(first: Option<NaiveDate>, last: Option<NaiveDate>, y_max: i64) -> Self {
        let span_days = match (first, last) {
            (Some(f), Some(l)) => (l - f).num_days(),
            _ => 0,
        };
        Self {
            left: MARGIN_LEFT,
            right: WIDTH as i32 - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: HEIGHT as i32 - MARGIN_BOTTOM,
            first,
            span_days,
            y_max,
        }
    }

    fn x(&self, day: NaiveDate) -> i32 {
        let width = (self.right - self.left) as i64;
        match self.first {
            // Single day sits in the middle
            Some(_) if self.span_days == 0 => self.left + (width / 2) as i32,
            Some(first) => self.left + ((day - first).num_days() * width / self.span_days) as i32,
            None => self.left,
        }
    }

    fn y(&self, value: i64) -> i32 {
        let height = (self.bottom - self.top) as i64;
        self.bottom - (value * height / self.y_max) as i32
    }
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_square(img: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            put(img, cx + dx, cy + dy, color);
        }
    }
}

/// Bresenham line; `radius` > 0 thickens it with a square brush
fn draw_line(img: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>, radius: i32) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        fill_square(img, x, y, radius, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_polyline(img: &mut RgbImage, points: &[(i32, i32)], color: Rgb<u8>, radius: i32) {
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], color, radius);
    }
}

// 3x5 bitmap glyphs, one row per byte, high bit on the left
fn glyph(c: char) -> Option<[u8; 5]> {
    Some(match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        _ => return None,
    })
}

fn text_width(text: &str) -> i32 {
    text.chars().count() as i32 * 4 * GLYPH_SCALE
}

fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = glyph(c) else { continue };
        let origin_x = x + i as i32 * 4 * GLYPH_SCALE;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for sy in 0..GLYPH_SCALE {
                    for sx in 0..GLYPH_SCALE {
                        put(
                            img,
                            origin_x + col * GLYPH_SCALE + sx,
                            y + row as i32 * GLYPH_SCALE + sy,
                            color,
                        );
                    }
                }
            }
        }
    }
}
