//! Ordered-list editing shared by the transformation and contrast lists.
//!
//! Every operation returns a new list and leaves its input untouched.
//! Out-of-range indices leave the list as it was.

/// Direction of a single-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

pub fn append<T: Clone>(list: &[T], item: T) -> Vec<T> {
    let mut out = list.to_vec();
    out.push(item);
    out
}

pub fn replace_at<T: Clone>(list: &[T], index: usize, item: T) -> Vec<T> {
    let mut out = list.to_vec();
    if let Some(slot) = out.get_mut(index) {
        *slot = item;
    }
    out
}

pub fn remove_at<T: Clone>(list: &[T], index: usize) -> Vec<T> {
    let mut out = list.to_vec();
    if index < out.len() {
        out.remove(index);
    }
    out
}

/// Swap the item at `index` with its neighbour. Moving the first item up or
/// the last item down is a no-op.
pub fn move_item<T: Clone>(list: &[T], index: usize, direction: Direction) -> Vec<T> {
    let mut out = list.to_vec();
    let target = match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => index.checked_add(1).filter(|t| *t < out.len()),
    };
    if let Some(target) = target {
        if index < out.len() {
            out.swap(index, target);
        }
    }
    out
}

/// Drag-and-drop: take the item at `from` and drop it at position `to`.
/// A `to` past the end drops the item last.
pub fn reorder<T: Clone>(list: &[T], from: usize, to: usize) -> Vec<T> {
    let mut out = list.to_vec();
    if from >= out.len() {
        return out;
    }
    let item = out.remove(from);
    let to = to.min(out.len());
    out.insert(to, item);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort();
        v
    }

    #[test]
    fn move_is_a_permutation() {
        for n in 0..6u32 {
            let list: Vec<u32> = (0..n).collect();
            for i in 0..n as usize {
                for dir in [Direction::Up, Direction::Down] {
                    let moved = move_item(&list, i, dir);
                    assert_eq!(moved.len(), list.len());
                    assert_eq!(sorted(moved), list);
                }
            }
        }
    }

    #[test]
    fn boundary_moves_are_noops() {
        let list = vec!["a", "b", "c"];
        assert_eq!(move_item(&list, 0, Direction::Up), list);
        assert_eq!(move_item(&list, 2, Direction::Down), list);
        assert_eq!(move_item(&list, 7, Direction::Up), list);
    }

    #[test]
    fn move_swaps_neighbours() {
        let list = vec!["a", "b", "c"];
        assert_eq!(move_item(&list, 1, Direction::Up), vec!["b", "a", "c"]);
        assert_eq!(move_item(&list, 1, Direction::Down), vec!["a", "c", "b"]);
    }

    #[test]
    fn reorder_is_a_permutation() {
        let list: Vec<u32> = (0..5).collect();
        for from in 0..5 {
            for to in 0..7 {
                let out = reorder(&list, from, to);
                assert_eq!(sorted(out), list);
            }
        }
        assert_eq!(reorder(&list, 0, 3), vec![1, 2, 3, 0, 4]);
        assert_eq!(reorder(&list, 4, 0), vec![4, 0, 1, 2, 3]);
        assert_eq!(reorder(&list, 1, 99), vec![0, 2, 3, 4, 1]);
    }

    #[test]
    fn edits_leave_input_untouched() {
        let list = vec![1, 2, 3];
        assert_eq!(append(&list, 4), vec![1, 2, 3, 4]);
        assert_eq!(replace_at(&list, 1, 9), vec![1, 9, 3]);
        assert_eq!(remove_at(&list, 0), vec![2, 3]);
        assert_eq!(list, vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_edits_are_noops() {
        let list = vec![1, 2, 3];
        assert_eq!(replace_at(&list, 3, 9), list);
        assert_eq!(remove_at(&list, 3), list);
        assert_eq!(reorder(&list, 3, 0), list);
    }
}
