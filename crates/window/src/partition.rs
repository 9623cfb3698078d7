use tractscope_common::{Batch, Streamline};

/// Number of full batches of `batch_size` in `total` streamlines.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    total.checked_div(batch_size).unwrap_or(0)
}

/// Split streamlines into consecutive full batches.
///
/// A trailing remainder shorter than `batch_size` is dropped.
pub fn partition(streamlines: &[Streamline], batch_size: usize) -> Batches<'_> {
    Batches {
        streamlines,
        batch_size,
        next: 0,
        count: batch_count(streamlines.len(), batch_size),
    }
}

/// Iterator over the full batches of a streamline sequence.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    streamlines: &'a [Streamline],
    batch_size: usize,
    next: usize,
    count: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        let start = index * self.batch_size;
        self.next += 1;
        Some(Batch::new(
            index,
            &self.streamlines[start..start + self.batch_size],
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn streamlines(n: usize) -> Vec<Streamline> {
        (0..n)
            .map(|i| Streamline::new(vec![Vec3::splat(i as f32)]))
            .collect()
    }

    #[test]
    fn drops_incomplete_remainder() {
        let lines = streamlines(47);
        let batches: Vec<_> = partition(&lines, 20).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].index, 1);
        assert_eq!(batches[1].streamlines[0].points()[0].x, 20.0);
        assert_eq!(batches[1].len(), 20);
    }

    #[test]
    fn exact_multiple_keeps_every_batch() {
        let lines = streamlines(60);
        assert_eq!(partition(&lines, 20).len(), 3);
    }

    #[test]
    fn fewer_than_one_batch_yields_nothing() {
        let lines = streamlines(5);
        assert_eq!(partition(&lines, 20).count(), 0);
    }

    #[test]
    fn zero_batch_size_yields_nothing() {
        let lines = streamlines(5);
        assert_eq!(partition(&lines, 0).count(), 0);
        assert_eq!(batch_count(5, 0), 0);
    }

    #[test]
    fn batches_cover_streamlines_in_order() {
        let lines = streamlines(9);
        let firsts: Vec<f32> = partition(&lines, 3)
            .map(|b| b.streamlines[0].points()[0].x)
            .collect();
        assert_eq!(firsts, vec![0.0, 3.0, 6.0]);
    }
}
