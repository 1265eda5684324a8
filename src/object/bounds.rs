//! Python-style slice descriptor: `start:stop:step` with `None` meaning
//! "use the default for this direction".
//!
//! Grounded on `examples/original_source/src/vm/datatype/bounds.cpp`'s
//! `Bounds::Index`: negative components are relative to the sequence
//! length, and a negative step walks from the end.

#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
}

impl Bounds {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        Bounds { start, stop, step }
    }

    /// Resolves against a concrete sequence length, returning
    /// `(start, stop, step)` as a half-open `[start, stop)` walked by
    /// `step` (signed; the caller is responsible for reading `stop` as
    /// exclusive in whichever direction `step`'s sign indicates).
    pub fn resolve(&self, len: usize) -> (usize, usize, isize) {
        let len_i = len as i64;
        let step = self.step.unwrap_or(1);
        if step == 0 {
            return (0, 0, 1);
        }

        let clamp = |v: i64, lo: i64, hi: i64| v.max(lo).min(hi);

        if step > 0 {
            let default_start = 0;
            let default_stop = len_i;
            let mut start = self.start.unwrap_or(default_start);
            let mut stop = self.stop.unwrap_or(default_stop);
            if start < 0 {
                start += len_i;
            }
            if stop < 0 {
                stop += len_i;
            }
            start = clamp(start, 0, len_i);
            stop = clamp(stop, 0, len_i);
            (start as usize, stop.max(start) as usize, step as isize)
        } else {
            let default_start = len_i - 1;
            let default_stop = -1;
            let mut start = self.start.unwrap_or(default_start);
            let mut stop = self.stop.unwrap_or(default_stop);
            if start < 0 && self.start.is_some() {
                start += len_i;
            }
            if stop < 0 && self.stop.is_some() {
                stop += len_i;
            }
            start = clamp(start, -1, len_i - 1);
            let stop_clamped = if self.stop.is_some() {
                clamp(stop, -1, len_i - 1)
            } else {
                -1
            };
            (start as usize, (stop_clamped.max(-1)) as usize, step as isize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_forward_slice() {
        let b = Bounds::new(None, None, None);
        assert_eq!(b.resolve(5), (0, 5, 1));
    }

    #[test]
    fn stepped_forward_slice() {
        let b = Bounds::new(Some(1), Some(8), Some(2));
        assert_eq!(b.resolve(10), (1, 8, 2));
    }

    #[test]
    fn negative_indices() {
        let b = Bounds::new(Some(-3), None, None);
        assert_eq!(b.resolve(10), (7, 10, 1));
    }
}
