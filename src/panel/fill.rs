//! Carry known values across every row of a loan

/// Two-pass fill within contiguous groups of `rows` sharing a key.
///
/// The first pass carries the last seen value forward; the second carries
/// the first seen value backward over the still-empty prefix. Rows must be
/// ordered so that each group is contiguous.
pub fn fill_within_groups<T, K, V>(
    rows: &mut [T],
    key: impl Fn(&T) -> K,
    get: impl Fn(&T) -> Option<V>,
    set: impl Fn(&mut T, V),
) where
    K: PartialEq,
    V: Clone,
{
    let mut start = 0;
    while start < rows.len() {
        let group_key = key(&rows[start]);
        let mut end = start + 1;
        while end < rows.len() && key(&rows[end]) == group_key {
            end += 1;
        }
        fill_group(&mut rows[start..end], &get, &set);
        start = end;
    }
}

fn fill_group<T, V: Clone>(group: &mut [T], get: &impl Fn(&T) -> Option<V>, set: &impl Fn(&mut T, V)) {
    let mut carried: Option<V> = None;
    for row in group.iter_mut() {
        match get(row) {
            Some(value) => carried = Some(value),
            None => {
                if let Some(value) = &carried {
                    set(row, value.clone());
                }
            }
        }
    }

    let first_seen = group.iter().find_map(|row| get(row));
    if let Some(value) = first_seen {
        for row in group.iter_mut() {
            if get(row).is_some() {
                break;
            }
            set(row, value.clone());
        }
    }
}
