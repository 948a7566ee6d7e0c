use log::debug;
use serde::Serialize;

use crate::error::BoundsError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Parses a uiautomator bounds string such as `[x1,y1][x2,y2]`.
    pub fn parse(raw: &str) -> Result<Self, BoundsError> {
        let joined = raw.replace("][", ",");
        let inner = joined.trim().trim_start_matches('[').trim_end_matches(']');
        let parts: Vec<&str> = inner.split(',').collect();
        if parts.len() != 4 {
            return Err(BoundsError::Malformed(raw.to_string()));
        }

        let mut coords = [0i32; 4];
        for (slot, part) in coords.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse::<i32>()
                .map_err(|_| BoundsError::ParseFailure {
                    raw: raw.to_string(),
                    part: part.trim().to_string(),
                })?;
        }

        let rect = Rect::new(coords[0], coords[1], coords[2], coords[3]);
        if rect.right < rect.left || rect.bottom < rect.top {
            return Err(BoundsError::Inverted(raw.to_string()));
        }
        Ok(rect)
    }

    /// Like [`Rect::parse`], but malformed input degrades to [`Rect::ZERO`].
    pub fn parse_lenient(raw: &str) -> Self {
        match Self::parse(raw) {
            Ok(rect) => rect,
            Err(err) => {
                debug!("{err}; using zero rect");
                Rect::ZERO
            }
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }

    pub fn as_array(&self) -> [i32; 4] {
        [self.left, self.top, self.right, self.bottom]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl ScreenSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Extracts `WIDTHxHEIGHT` from `wm size` style output. An
    /// `Override size` line wins over `Physical size`.
    pub fn parse_wm_size(raw: &str) -> Option<Self> {
        let mut physical = None;
        let mut overridden = None;
        for line in raw.lines() {
            let value = line.rsplit(':').next().unwrap_or(line).trim();
            let Some((w, h)) = value.split_once('x') else {
                continue;
            };
            let (Ok(width), Ok(height)) = (w.trim().parse::<i32>(), h.trim().parse::<i32>())
            else {
                continue;
            };
            if width <= 0 || height <= 0 {
                continue;
            }
            let size = ScreenSize::new(width, height);
            if line.to_ascii_lowercase().contains("override") {
                overridden = Some(size);
            } else {
                physical = Some(size);
            }
        }
        overridden.or(physical)
    }
}

/// The search area around a target: a quarter of the screen width to each
/// side and an eighth of its height above and below, clipped to the screen.
pub fn context_window(target: &Rect, screen: ScreenSize) -> Rect {
    let vertical = screen.height / 8;
    let horizontal = screen.width / 4;
    Rect {
        left: target.left.saturating_sub(horizontal).max(0),
        top: target.top.saturating_sub(vertical).max(0),
        right: target.right.saturating_add(horizontal).min(screen.width),
        bottom: target.bottom.saturating_add(vertical).min(screen.height),
    }
}
