//! A slot-array inventory window with add-ranges (§3: "Window"), grounded on
//! `include/inv/window.hpp`/`src/inv/window.cpp`.
//!
//! **Bug fix from the original.** `window::try_add` in `window.cpp` computes
//! `to_add` as `(count > room) ? count : room` — backwards from the clamp it
//! clearly means to express, so a stack with less room than the incoming
//! count absorbs *more* than it has space for. This port uses
//! `count.min(room)`.

use crate::{net::packet::RawSlot, world::block_info};

pub struct Window {
  wid:        u8,
  slots:      Vec<RawSlot>,
  add_ranges: Vec<(usize, usize)>,
}

fn compatible(a: &RawSlot, b: &RawSlot) -> bool {
  if a.id == -1 || b.id == -1 {
    return true;
  }
  a.id == b.id && a.damage == b.damage
}

impl Window {
  pub fn new(wid: u8, slot_count: usize) -> Self { Window { wid, slots: vec![RawSlot::EMPTY; slot_count], add_ranges: Vec::new() } }

  pub fn id(&self) -> u8 { self.wid }
  pub fn get(&self, index: usize) -> &RawSlot { &self.slots[index] }

  pub fn set(&mut self, index: usize, item: RawSlot) { self.slots[index] = item; }

  /// Registers an inclusive slot range tried, in order, by [`add`](Self::add).
  pub fn push_add_range(&mut self, start: usize, end: usize) { self.add_ranges.push((start, end)); }

  fn try_add(&mut self, index: usize, item: &RawSlot, count: usize) -> usize {
    let max_stack = block_info::from_id(item.id as u16).max_stack as usize;
    let slot = &mut self.slots[index];
    if slot.id == -1 {
      let to_add = count.min(max_stack);
      *slot = RawSlot { id: item.id, count: to_add as u8, damage: item.damage, nbt: item.nbt.clone() };
      return to_add;
    }
    if !compatible(slot, item) {
      return 0;
    }
    let room = max_stack.saturating_sub(slot.count as usize);
    let to_add = count.min(room);
    slot.count += to_add as u8;
    to_add
  }

  /// Tries every registered add-range in order, stacking into compatible
  /// non-full slots first and filling empties otherwise. Returns the number
  /// of items that did not fit.
  pub fn add(&mut self, item: RawSlot) -> usize {
    let mut left = item.count as usize;
    'ranges: for (start, end) in self.add_ranges.clone() {
      for i in start..=end {
        left -= self.try_add(i, &item, left);
        if left == 0 {
          break 'ranges;
        }
      }
    }
    left
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn stone(count: u8) -> RawSlot { RawSlot { id: 1, count, damage: 0, nbt: None } }

  #[test]
  fn adding_to_an_empty_slot_fills_it() {
    let mut w = Window::new(0, 9);
    w.push_add_range(0, 8);
    let left = w.add(stone(10));
    assert_eq!(left, 0);
    assert_eq!(w.get(0).count, 10);
  }

  #[test]
  fn stacking_respects_max_stack_not_incoming_count() {
    let mut w = Window::new(0, 9);
    w.push_add_range(0, 8);
    w.set(0, stone(60));
    let left = w.add(stone(10));
    // room is 4 (64 - 60); only 4 of the 10 incoming items fit here, the
    // remaining 6 spill into the next empty slot in the range.
    assert_eq!(w.get(0).count, 64);
    assert_eq!(w.get(1).count, 6);
    assert_eq!(left, 0);
  }

  #[test]
  fn incompatible_items_do_not_merge() {
    let mut w = Window::new(0, 9);
    w.push_add_range(0, 0);
    w.set(0, RawSlot { id: 2, count: 1, damage: 0, nbt: None });
    let left = w.add(stone(5));
    assert_eq!(left, 5);
  }

  #[test]
  fn overflow_beyond_all_ranges_is_reported_back() {
    let mut w = Window::new(0, 1);
    w.push_add_range(0, 0);
    let left = w.add(stone(100));
    assert_eq!(w.get(0).count, 64);
    assert_eq!(left, 36);
  }
}
