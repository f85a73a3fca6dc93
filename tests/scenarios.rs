//! Pins the concrete worked scenarios against known expected backing
//! indices, independent of the oracle comparison in `tests/oracle.rs`.

use shape_tracker::ShapeTracker;

fn all_addrs(st: &ShapeTracker) -> Vec<i64> {
    let n: usize = st.shape().iter().product();
    (0..n).map(|i| st.at(i).unwrap()).collect()
}

#[test]
fn test_scenario_permute_then_reshape_forces_general_path() {
    let mut st = ShapeTracker::new(&[2, 4]);
    st.permute(&[1, 0]).unwrap();
    st.reshape(&[8]).unwrap();
    assert_eq!(st.depth(), 2, "transposed strides are not contiguous");
    assert_eq!(all_addrs(&st), vec![0, 4, 1, 5, 2, 6, 3, 7]);
}

#[test]
fn test_scenario_reshape_then_expand_is_broadcast() {
    let mut st = ShapeTracker::new(&[2, 4]);
    st.reshape(&[2, 1, 4]).unwrap();
    st.expand(&[2, 2, 4]).unwrap();
    assert_eq!(st.shape(), &[2, 2, 4]);
    for i in 0..2i64 {
        for j in 0..2i64 {
            for k in 0..4i64 {
                assert_eq!(st.materialize(&[i, j, k]), 4 * i + k);
            }
        }
    }
}

#[test]
fn test_scenario_flip_reverses_first_axis() {
    let mut st = ShapeTracker::new(&[2, 4]);
    st.flip(&[0]).unwrap();
    assert_eq!(all_addrs(&st), vec![4, 5, 6, 7, 0, 1, 2, 3]);
}

#[test]
fn test_scenario_slice_offsets_both_axes() {
    let mut st = ShapeTracker::new(&[2, 4]);
    st.slice(&[(1, 2), (1, 3)]).unwrap();
    assert_eq!(st.shape(), &[1, 2]);
    for j in 0..2i64 {
        assert_eq!(st.materialize(&[0, j]), 5 + j);
    }
}

#[test]
fn test_scenario_negative_and_positive_stride() {
    let mut st = ShapeTracker::new(&[2, 4]);
    st.stride(&[-2, 1]).unwrap();
    assert_eq!(st.shape(), &[1, 4]);
    for k in 0..4i64 {
        assert_eq!(st.materialize(&[0, k]), 4 + k);
    }
}

#[test]
fn test_scenario_six_chained_transforms_match_oracle() {
    // permute(1,0); reshape(2,4) (forced to a new View, since the permute
    // left strides non-contiguous); slice; an intermediate reshape(2,1,2)
    // to line up axis counts; expand back out to (2,2,2).
    let mut st = ShapeTracker::new(&[2, 4]);
    st.permute(&[1, 0]).unwrap();
    assert_eq!(st.shape(), &[4, 2]);
    st.reshape(&[2, 4]).unwrap();
    assert_eq!(st.depth(), 2, "permute broke contiguity; reshape must push");
    st.slice(&[(0, 2), (1, 3)]).unwrap();
    st.reshape(&[2, 1, 2]).unwrap();
    st.expand(&[2, 2, 2]).unwrap();
    assert_eq!(st.shape(), &[2, 2, 2]);

    // Build the reference oracle over the same transform chain.
    let mut reference = Buf::new(&[2, 4]);
    reference.permute(&[1, 0]);
    reference.reshape(&[2, 4]);
    reference.slice(&[(0, 2), (1, 3)]);
    reference.reshape(&[2, 1, 2]);
    reference.expand(&[2, 2, 2]);

    let n: usize = st.shape().iter().product();
    for i in 0..n {
        assert_eq!(st.at(i).unwrap(), reference.data[i]);
    }
}

/// Minimal standalone reference oracle duplicating the one in
/// `tests/oracle.rs`, kept local so this file is self-contained.
struct Buf {
    data: Vec<i64>,
    shape: Vec<usize>,
}

impl Buf {
    fn new(shape: &[usize]) -> Self {
        let n: usize = shape.iter().product();
        Self {
            data: (0..n as i64).collect(),
            shape: shape.to_vec(),
        }
    }

    fn remap(&mut self, new_shape: &[usize], old_coords_of: impl Fn(&[usize]) -> Vec<usize>) {
        let n: usize = new_shape.iter().product();
        let mut new_data = Vec::with_capacity(n);
        for flat in 0..n {
            let new_coords = unravel(flat, new_shape);
            let old_coords = old_coords_of(&new_coords);
            let old_flat = ravel(&old_coords, &self.shape);
            new_data.push(self.data[old_flat]);
        }
        self.data = new_data;
        self.shape = new_shape.to_vec();
    }

    fn reshape(&mut self, new_shape: &[usize]) {
        self.shape = new_shape.to_vec();
    }

    fn permute(&mut self, axes: &[usize]) {
        let new_shape: Vec<usize> = axes.iter().map(|&a| self.shape[a]).collect();
        self.remap(&new_shape, |new_coords| {
            let mut old = vec![0usize; axes.len()];
            for (k, &a) in axes.iter().enumerate() {
                old[a] = new_coords[k];
            }
            old
        });
    }

    fn slice(&mut self, ranges: &[(usize, usize)]) {
        let new_shape: Vec<usize> = ranges.iter().map(|&(lo, hi)| hi - lo).collect();
        self.remap(&new_shape, |new_coords| {
            new_coords
                .iter()
                .zip(ranges.iter())
                .map(|(&c, &(lo, _))| c + lo)
                .collect()
        });
    }

    fn expand(&mut self, new_shape: &[usize]) {
        let old_shape = self.shape.clone();
        self.remap(new_shape, |new_coords| {
            new_coords
                .iter()
                .enumerate()
                .map(|(k, &c)| if old_shape[k] == 1 { 0 } else { c })
                .collect()
        });
    }
}

fn ravel(coords: &[usize], shape: &[usize]) -> usize {
    let mut flat = 0usize;
    for k in 0..coords.len() {
        let group: usize = shape[k + 1..].iter().product();
        flat += coords[k] * group;
    }
    flat
}

fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut coords = vec![0usize; shape.len()];
    for k in 0..shape.len() {
        let group: usize = shape[k + 1..].iter().product();
        coords[k] = flat / group.max(1);
        flat %= group.max(1);
    }
    coords
}
