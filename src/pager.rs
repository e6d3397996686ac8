/*
 *  pager.rs
 *
 *  KioskClock - tides, weather & time
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use std::ops::Range;

/// Forecast periods shown at once.
pub const WINDOW: usize = 8;

/// Viewport over the forecast periods plus the period shown in detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForecastPager {
    offset: usize,
    selected: usize,
}

impl ForecastPager {
    pub fn offset(&self) -> usize { self.offset }
    pub fn selected(&self) -> usize { self.selected }

    pub fn max_offset(len: usize) -> usize {
        len.saturating_sub(WINDOW)
    }

    /// Indices currently visible.
    pub fn visible(&self, len: usize) -> Range<usize> {
        let start = self.offset.min(len);
        start..(start + WINDOW).min(len)
    }

    pub fn shift_right(&mut self, len: usize) -> bool {
        if self.offset >= Self::max_offset(len) {
            return false;
        }
        self.offset += 1;
        if self.selected < self.offset {
            self.selected = self.offset;
        }
        true
    }

    pub fn shift_left(&mut self) -> bool {
        if self.offset == 0 {
            return false;
        }
        self.offset -= 1;
        let last = self.offset + WINDOW - 1;
        if self.selected > last {
            self.selected = last;
        }
        true
    }

    /// Select the period in visible slot `slot` (0 = leftmost).
    pub fn select_visible(&mut self, slot: usize, len: usize) -> bool {
        let idx = self.offset + slot;
        if slot >= WINDOW || idx >= len {
            return false;
        }
        self.selected = idx;
        true
    }

    /// Re-establish the cursors after the period list was replaced.
    pub fn clamp(&mut self, len: usize) {
        self.offset = self.offset.min(Self::max_offset(len));
        if len == 0 {
            self.selected = 0;
            return;
        }
        let vis = self.visible(len);
        self.selected = self.selected.clamp(vis.start, vis.end - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_never_leaves_range() {
        let mut p = ForecastPager::default();
        for _ in 0..20 {
            p.shift_right(14);
            assert!(p.offset() <= 14 - WINDOW);
        }
        assert_eq!(p.offset(), 6);
        assert_eq!(p.visible(14), 6..14);
        for _ in 0..20 {
            p.shift_left();
        }
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_short_list_does_not_scroll() {
        let mut p = ForecastPager::default();
        assert!(!p.shift_right(5));
        assert_eq!(p.visible(5), 0..5);
        assert!(!p.shift_left());
    }

    #[test]
    fn test_selection_follows_window() {
        let mut p = ForecastPager::default();
        assert!(p.select_visible(0, 14));
        p.shift_right(14);
        assert_eq!(p.selected(), 1);

        assert!(p.select_visible(7, 14));
        assert_eq!(p.selected(), 8);
        p.shift_left();
        assert_eq!(p.offset(), 0);
        assert_eq!(p.selected(), 7);
    }

    #[test]
    fn test_selection_kept_when_still_visible() {
        let mut p = ForecastPager::default();
        p.select_visible(5, 14);
        p.shift_right(14);
        p.shift_right(14);
        assert_eq!(p.selected(), 5);
    }

    #[test]
    fn test_select_out_of_range() {
        let mut p = ForecastPager::default();
        assert!(!p.select_visible(8, 14));
        assert!(!p.select_visible(4, 3));
        assert_eq!(p.selected(), 0);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut p = ForecastPager::default();
        for _ in 0..6 { p.shift_right(14); }
        p.select_visible(7, 14);
        p.clamp(10);
        assert_eq!(p.offset(), 2);
        assert_eq!(p.selected(), 9);
        p.clamp(0);
        assert_eq!((p.offset(), p.selected()), (0, 0));
    }
}
