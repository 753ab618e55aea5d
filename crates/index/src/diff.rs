//! Minimal edit scripts between two sequences.
//!
//! Implements Myers' O(ND) difference algorithm ("An O(ND) Difference
//! Algorithm and Its Variations", 1986) with the linear-space middle-snake
//! refinement. Elements are first mapped to integer codes so the inner loops
//! compare integers only.

use alloc::vec;
use alloc::vec::Vec;
use core::hash::Hash;
use hashbrown::HashMap;

/// One hunk of an edit script.
///
/// `deleted_left` elements starting at `start_left` are replaced by
/// `inserted_right` elements taken from the right sequence at `start_right`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditOp {
    pub start_left: usize,
    pub start_right: usize,
    pub deleted_left: usize,
    pub inserted_right: usize,
}

impl EditOp {
    /// Creates an edit operation.
    #[inline]
    pub fn new(start_left: usize, start_right: usize, deleted_left: usize, inserted_right: usize) -> Self {
        Self {
            start_left,
            start_right,
            deleted_left,
            inserted_right,
        }
    }

    /// Net change in length caused by this op.
    #[inline]
    pub fn delta(&self) -> isize {
        self.inserted_right as isize - self.deleted_left as isize
    }
}

/// An ordered list of non-overlapping edit operations.
///
/// Every `start_left` refers to the original left sequence. When applying the
/// ops in order, shift each op's `start_left` by the cumulative `delta` of the
/// ops applied before it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditScript {
    ops: Vec<EditOp>,
}

impl EditScript {
    /// Returns the edit operations.
    #[inline]
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// Returns the number of edit operations.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the sequences were equal.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Returns an iterator over the edit operations.
    pub fn iter(&self) -> core::slice::Iter<'_, EditOp> {
        self.ops.iter()
    }

    /// Total number of deleted plus inserted elements.
    pub fn edit_count(&self) -> usize {
        self.ops.iter().map(|op| op.deleted_left + op.inserted_right).sum()
    }

    /// Applies the script to `left`, producing a copy of `right`.
    pub fn apply<T: Clone>(&self, left: &[T], right: &[T]) -> Vec<T> {
        let mut result = left.to_vec();
        let mut offset: isize = 0;
        for op in &self.ops {
            let at = (op.start_left as isize + offset) as usize;
            let inserted = &right[op.start_right..op.start_right + op.inserted_right];
            result.splice(at..at + op.deleted_left, inserted.iter().cloned());
            offset += op.delta();
        }
        result
    }
}

impl IntoIterator for EditScript {
    type Item = EditOp;
    type IntoIter = alloc::vec::IntoIter<EditOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a EditOp;
    type IntoIter = core::slice::Iter<'a, EditOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

/// Computes the minimal edit script turning `left` into `right`.
pub fn diff<T: Eq + Hash>(left: &[T], right: &[T]) -> EditScript {
    let mut cache: HashMap<&T, u32> = HashMap::new();
    let left_codes = hash_codes(left.iter(), &mut cache);
    let right_codes = hash_codes(right.iter(), &mut cache);
    diff_codes(&left_codes, &right_codes)
}

/// Computes the minimal edit script comparing elements by a hashable key.
pub fn diff_by_key<T, K, F>(left: &[T], right: &[T], key_fn: F) -> EditScript
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut cache: HashMap<K, u32> = HashMap::new();
    let left_codes = hash_codes(left.iter().map(&key_fn), &mut cache);
    let right_codes = hash_codes(right.iter().map(&key_fn), &mut cache);
    diff_codes(&left_codes, &right_codes)
}

fn hash_codes<K, I>(keys: I, cache: &mut HashMap<K, u32>) -> Vec<u32>
where
    K: Eq + Hash,
    I: Iterator<Item = K>,
{
    keys.map(|key| {
        let next = cache.len() as u32 + 1;
        *cache.entry(key).or_insert(next)
    })
    .collect()
}

/// Computes the minimal edit script using an equality function.
///
/// Elements are coded by a linear scan over the distinct values seen so far,
/// so prefer `diff` or `diff_by_key` when a hashable key is available.
pub fn diff_by<'a, T, F>(left: &'a [T], right: &'a [T], eq: F) -> EditScript
where
    F: Fn(&T, &T) -> bool,
{
    let mut distinct: Vec<&'a T> = Vec::new();
    let left_codes = code_by(left, &mut distinct, &eq);
    let right_codes = code_by(right, &mut distinct, &eq);
    diff_codes(&left_codes, &right_codes)
}

fn code_by<'a, T, F>(items: &'a [T], distinct: &mut Vec<&'a T>, eq: &F) -> Vec<u32>
where
    F: Fn(&T, &T) -> bool,
{
    items
        .iter()
        .map(|item| match distinct.iter().position(|d| eq(*d, item)) {
            Some(pos) => pos as u32 + 1,
            None => {
                distinct.push(item);
                distinct.len() as u32
            }
        })
        .collect()
}

/// Runs the diff over pre-computed element codes.
pub fn diff_codes(left: &[u32], right: &[u32]) -> EditScript {
    let mut left_data = DiffData::new(left);
    let mut right_data = DiffData::new(right);

    let max = left.len() + right.len() + 1;
    let mut vectors = SnakeVectors {
        down: vec![0; 2 * max + 2],
        up: vec![0; 2 * max + 2],
        max: max as isize,
    };

    let (left_len, right_len) = (left.len(), right.len());
    lcs(
        &mut left_data,
        0,
        left_len,
        &mut right_data,
        0,
        right_len,
        &mut vectors,
    );
    create_script(&left_data, &right_data)
}

/// One side of the comparison.
struct DiffData<'a> {
    codes: &'a [u32],
    modified: Vec<bool>,
}

impl<'a> DiffData<'a> {
    fn new(codes: &'a [u32]) -> Self {
        Self {
            codes,
            modified: vec![false; codes.len() + 2],
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.codes.len()
    }
}

/// Forward and reverse furthest-reaching vectors, indexed by diagonal.
struct SnakeVectors {
    down: Vec<usize>,
    up: Vec<usize>,
    max: isize,
}

/// Divide and conquer on the middle snake, marking modified elements.
fn lcs(
    left: &mut DiffData<'_>,
    mut lower_left: usize,
    mut upper_left: usize,
    right: &mut DiffData<'_>,
    mut lower_right: usize,
    mut upper_right: usize,
    vectors: &mut SnakeVectors,
) {
    // Common prefix
    while lower_left < upper_left
        && lower_right < upper_right
        && left.codes[lower_left] == right.codes[lower_right]
    {
        lower_left += 1;
        lower_right += 1;
    }
    // Common suffix
    while lower_left < upper_left
        && lower_right < upper_right
        && left.codes[upper_left - 1] == right.codes[upper_right - 1]
    {
        upper_left -= 1;
        upper_right -= 1;
    }

    if lower_left == upper_left {
        for flag in &mut right.modified[lower_right..upper_right] {
            *flag = true;
        }
    } else if lower_right == upper_right {
        for flag in &mut left.modified[lower_left..upper_left] {
            *flag = true;
        }
    } else {
        match middle_snake(
            left,
            lower_left,
            upper_left,
            right,
            lower_right,
            upper_right,
            vectors,
        ) {
            Some((x, y)) => {
                lcs(left, lower_left, x, right, lower_right, y, vectors);
                lcs(left, x, upper_left, right, y, upper_right, vectors);
            }
            None => {
                // No overlap found; treat the whole window as replaced.
                for flag in &mut left.modified[lower_left..upper_left] {
                    *flag = true;
                }
                for flag in &mut right.modified[lower_right..upper_right] {
                    *flag = true;
                }
            }
        }
    }
}

/// Finds the middle snake of the window, returning its start point.
fn middle_snake(
    left: &DiffData<'_>,
    lower_left: usize,
    upper_left: usize,
    right: &DiffData<'_>,
    lower_right: usize,
    upper_right: usize,
    vectors: &mut SnakeVectors,
) -> Option<(usize, usize)> {
    let (ll, ul, lr, ur) = (
        lower_left as isize,
        upper_left as isize,
        lower_right as isize,
        upper_right as isize,
    );
    let max = vectors.max;
    let down_k = ll - lr;
    let up_k = ul - ur;
    let delta = (ul - ll) - (ur - lr);
    let delta_is_odd = (delta & 1) != 0;
    let down_offset = max - down_k;
    let up_offset = max - up_k;
    let max_d = ((ul - ll + ur - lr) / 2) + 1;

    let down = &mut vectors.down;
    let up = &mut vectors.up;
    let at = |offset: isize, k: isize| (offset + k) as usize;

    down[at(down_offset, down_k + 1)] = lower_left;
    up[at(up_offset, up_k - 1)] = upper_left;

    for d in 0..=max_d {
        // Extend the forward path
        let mut k = down_k - d;
        while k <= down_k + d {
            let mut x = if k == down_k - d {
                down[at(down_offset, k + 1)] as isize
            } else {
                let mut x = down[at(down_offset, k - 1)] as isize + 1;
                if k < down_k + d && down[at(down_offset, k + 1)] as isize >= x {
                    x = down[at(down_offset, k + 1)] as isize;
                }
                x
            };
            let mut y = x - k;

            while x < ul && y < ur && left.codes[x as usize] == right.codes[y as usize] {
                x += 1;
                y += 1;
            }
            down[at(down_offset, k)] = x as usize;

            if delta_is_odd
                && up_k - d < k
                && k < up_k + d
                && up[at(up_offset, k)] <= down[at(down_offset, k)]
            {
                let x = down[at(down_offset, k)];
                return Some((x, (x as isize - k) as usize));
            }
            k += 2;
        }

        // Extend the reverse path
        let mut k = up_k - d;
        while k <= up_k + d {
            let mut x = if k == up_k + d {
                up[at(up_offset, k - 1)] as isize
            } else {
                let mut x = up[at(up_offset, k + 1)] as isize - 1;
                if k > up_k - d && (up[at(up_offset, k - 1)] as isize) < x {
                    x = up[at(up_offset, k - 1)] as isize;
                }
                x
            };
            let mut y = x - k;

            while x > ll && y > lr && left.codes[x as usize - 1] == right.codes[y as usize - 1] {
                x -= 1;
                y -= 1;
            }
            up[at(up_offset, k)] = x as usize;

            if !delta_is_odd
                && down_k - d <= k
                && k <= down_k + d
                && up[at(up_offset, k)] <= down[at(down_offset, k)]
            {
                let x = down[at(down_offset, k)];
                return Some((x, (x as isize - k) as usize));
            }
            k += 2;
        }
    }
    None
}

/// Collapses the modified flags into hunks.
fn create_script(left: &DiffData<'_>, right: &DiffData<'_>) -> EditScript {
    let mut ops = Vec::new();
    let (left_len, right_len) = (left.len(), right.len());
    let (mut item_left, mut item_right) = (0usize, 0usize);

    while item_left < left_len || item_right < right_len {
        if item_left < left_len
            && !left.modified[item_left]
            && item_right < right_len
            && !right.modified[item_right]
        {
            item_left += 1;
            item_right += 1;
        } else {
            let (start_left, start_right) = (item_left, item_right);
            while item_left < left_len && (item_right >= right_len || left.modified[item_left]) {
                item_left += 1;
            }
            while item_right < right_len && (item_left >= left_len || right.modified[item_right]) {
                item_right += 1;
            }
            if start_left < item_left || start_right < item_right {
                ops.push(EditOp::new(
                    start_left,
                    start_right,
                    item_left - start_left,
                    item_right - start_right,
                ));
            }
        }
    }
    EditScript { ops }
}
