//! Binary-search maintenance of sorted sequences.
//!
//! All functions take the comparator by reference and accept unsized
//! comparators, so both concrete comparators and `SharedComparator` handles
//! (`&*shared`) can be passed.
//!
//! Batch functions expect their input run to already be sorted by the same
//! comparator. This is checked in debug builds only; an unsorted run produces
//! a wrongly ordered list.

use alloc::vec::Vec;
use cosync_core::{Comparator, Error, Result};
use core::cmp::Ordering;
use core::ops::Range;

/// Searches a sorted slice for `value`.
///
/// Returns `Ok(index)` of some element tying with `value`, or `Err(index)`
/// with the insertion point that keeps the slice sorted.
pub fn binary_search<T, C>(list: &[T], value: &T, comparer: &C) -> core::result::Result<usize, usize>
where
    C: Comparator<T> + ?Sized,
{
    list.binary_search_by(|probe| comparer.compare(probe, value))
}

/// Identity-aware search.
///
/// Ties under `comparer` are resolved by scanning the whole tie region for an
/// element `eq` to `value`. Returns `Ok(index)` of that element, otherwise
/// `Err(index)` pointing past the tie region.
pub fn binary_search_by_identity<T, C, E>(
    list: &[T],
    value: &T,
    comparer: &C,
    eq: &E,
) -> core::result::Result<usize, usize>
where
    C: Comparator<T> + ?Sized,
    E: Fn(&T, &T) -> bool + ?Sized,
{
    let ties = equal_range(list, value, comparer);
    match list[ties.clone()].iter().position(|probe| eq(probe, value)) {
        Some(offset) => Ok(ties.start + offset),
        None => Err(ties.end),
    }
}

/// Returns the first index whose element is not less than `value`.
pub fn lower_bound<T, C>(list: &[T], value: &T, comparer: &C) -> usize
where
    C: Comparator<T> + ?Sized,
{
    list.partition_point(|probe| comparer.compare(probe, value) == Ordering::Less)
}

/// Returns the first index whose element is greater than `value`.
pub fn upper_bound<T, C>(list: &[T], value: &T, comparer: &C) -> usize
where
    C: Comparator<T> + ?Sized,
{
    list.partition_point(|probe| comparer.compare(probe, value) != Ordering::Greater)
}

/// Returns the range of elements tying with `value`.
pub fn equal_range<T, C>(list: &[T], value: &T, comparer: &C) -> Range<usize>
where
    C: Comparator<T> + ?Sized,
{
    let start = lower_bound(list, value, comparer);
    let end = start + upper_bound(&list[start..], value, comparer);
    start..end
}

/// Returns true if the slice is sorted under `comparer`.
pub fn is_sorted<T, C>(list: &[T], comparer: &C) -> bool
where
    C: Comparator<T> + ?Sized,
{
    list.windows(2)
        .all(|pair| comparer.compare(&pair[0], &pair[1]) != Ordering::Greater)
}

/// Inserts one item after any elements it ties with. Returns its index.
pub fn insert_sorted<T, C>(list: &mut Vec<T>, item: T, comparer: &C) -> usize
where
    C: Comparator<T> + ?Sized,
{
    let index = upper_bound(list, &item, comparer);
    list.insert(index, item);
    index
}

/// Removes the element identical to `item`, returning its former index and
/// the removed element.
///
/// A missing element means the list and its source are out of sync and is
/// reported as an invariant violation.
pub fn remove_sorted<T, C, E>(list: &mut Vec<T>, item: &T, comparer: &C, eq: &E) -> Result<(usize, T)>
where
    C: Comparator<T> + ?Sized,
    E: Fn(&T, &T) -> bool + ?Sized,
{
    match binary_search_by_identity(list, item, comparer, eq) {
        Ok(index) => Ok((index, list.remove(index))),
        Err(_) => Err(Error::invariant("element to remove was not found in the sorted list")),
    }
}

/// Merges a sorted run into a sorted list.
///
/// Insertion points are found by divide and conquer: the middle item is
/// located first, which bounds the search windows of both halves. The list is
/// then rebuilt in a single merge pass, so every existing element moves at
/// most once. New items land after existing elements they tie with and keep
/// their relative order.
///
/// Returns the final index of each item, in input order (ascending).
pub fn insert_presorted_items<T, C>(list: &mut Vec<T>, items: Vec<T>, comparer: &C) -> Vec<usize>
where
    C: Comparator<T> + ?Sized,
{
    debug_assert!(is_sorted(&items, comparer), "batch is not sorted");
    if items.is_empty() {
        return Vec::new();
    }

    let mut positions = alloc::vec![0usize; items.len()];
    locate_insertion_points(list, &items, 0..items.len(), 0..list.len(), comparer, &mut positions);

    let old = core::mem::take(list);
    list.reserve(old.len() + items.len());
    let mut old_iter = old.into_iter();
    let mut consumed = 0usize;
    for (item, &position) in items.into_iter().zip(&positions) {
        list.extend(old_iter.by_ref().take(position - consumed));
        consumed = position;
        list.push(item);
    }
    list.extend(old_iter);

    positions
        .iter()
        .enumerate()
        .map(|(offset, position)| position + offset)
        .collect()
}

fn locate_insertion_points<T, C>(
    list: &[T],
    items: &[T],
    item_range: Range<usize>,
    window: Range<usize>,
    comparer: &C,
    positions: &mut [usize],
) where
    C: Comparator<T> + ?Sized,
{
    if item_range.is_empty() {
        return;
    }
    let mid = item_range.start + item_range.len() / 2;
    let position = window.start + upper_bound(&list[window.clone()], &items[mid], comparer);
    positions[mid] = position;

    locate_insertion_points(
        list,
        items,
        item_range.start..mid,
        window.start..position,
        comparer,
        positions,
    );
    locate_insertion_points(
        list,
        items,
        mid + 1..item_range.end,
        position..window.end,
        comparer,
        positions,
    );
}

/// Removes a sorted run of elements from a sorted list.
///
/// Every element is located before anything is removed, so a missing element
/// fails the whole call with an invariant violation and leaves the list
/// untouched. Duplicate identical elements each claim a distinct slot.
///
/// Returns the removed elements with their indices in the original list,
/// ascending by index.
pub fn remove_presorted_items<T, C, E>(
    list: &mut Vec<T>,
    items: &[T],
    comparer: &C,
    eq: &E,
) -> Result<Vec<(usize, T)>>
where
    C: Comparator<T> + ?Sized,
    E: Fn(&T, &T) -> bool + ?Sized,
{
    debug_assert!(is_sorted(items, comparer), "batch is not sorted");
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let mut taken = alloc::vec![false; list.len()];
    locate_removals(list, items, 0..items.len(), 0..list.len(), comparer, eq, &mut taken)?;

    let old = core::mem::take(list);
    let mut removed = Vec::with_capacity(items.len());
    for (index, element) in old.into_iter().enumerate() {
        if taken[index] {
            removed.push((index, element));
        } else {
            list.push(element);
        }
    }
    Ok(removed)
}

fn locate_removals<T, C, E>(
    list: &[T],
    items: &[T],
    item_range: Range<usize>,
    window: Range<usize>,
    comparer: &C,
    eq: &E,
    taken: &mut [bool],
) -> Result<()>
where
    C: Comparator<T> + ?Sized,
    E: Fn(&T, &T) -> bool + ?Sized,
{
    if item_range.is_empty() {
        return Ok(());
    }
    let mid = item_range.start + item_range.len() / 2;
    let value = &items[mid];
    let ties = equal_range(&list[window.clone()], value, comparer);
    let ties = window.start + ties.start..window.start + ties.end;

    let found = ties
        .clone()
        .find(|&index| !taken[index] && eq(&list[index], value))
        .ok_or_else(|| Error::invariant("element to remove was not found in the sorted list"))?;
    taken[found] = true;

    // Halves may still resolve inside the tie region of the middle item.
    locate_removals(
        list,
        items,
        item_range.start..mid,
        window.start..ties.end,
        comparer,
        eq,
        taken,
    )?;
    locate_removals(
        list,
        items,
        mid + 1..item_range.end,
        ties.start..window.end,
        comparer,
        eq,
        taken,
    )
}

/// Splits ascending indices into runs of consecutive values.
///
/// Returns ranges into `indices`, one per run.
pub fn contiguous_runs(indices: &[usize]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=indices.len() {
        if i == indices.len() || indices[i] != indices[i - 1] + 1 {
            if start < i {
                runs.push(start..i);
            }
            start = i;
        }
    }
    runs
}
