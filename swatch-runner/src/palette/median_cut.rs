//! Modified median cut quantization
//!
//! Pixels are bucketed into a 5-bit-per-channel histogram. Boxes over that
//! histogram are split along their longest axis at the population median:
//! first by population until three quarters of the requested colors exist,
//! then by population * volume so large sparse regions also get a color.
//!
//! Every choice is made by a total order, so the same pixels always produce
//! the same palette.

const SIGBITS: usize = 5;
const SHIFT: usize = 8 - SIGBITS;
const SIDE: usize = 1 << SIGBITS;
const FRACTION_BY_POPULATION: f64 = 0.75;

/// One palette entry before rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedColor {
    /// Mean of the pixels in the box, per channel
    pub mean: [f64; 3],
    pub population: u64,
}

/// Quantizes pixels into at most `max_colors` colors, most populous first
pub fn quantize(pixels: &[[u8; 3]], max_colors: usize) -> Vec<QuantizedColor> {
    if pixels.is_empty() || max_colors == 0 {
        return Vec::new();
    }

    let histogram = Histogram::from_pixels(pixels);
    let Some(root) = ColorBox::fit([0; 3], [SIDE - 1; 3], &histogram) else {
        return Vec::new();
    };

    let by_population = ((max_colors as f64) * FRACTION_BY_POPULATION).ceil() as usize;

    let mut boxes = vec![root];
    split_until(&mut boxes, by_population, &histogram, |b| b.population);
    split_until(&mut boxes, max_colors, &histogram, |b| {
        b.population.saturating_mul(b.volume())
    });

    // Stable sort keeps split order among equally populated boxes
    boxes.sort_by(|a, b| b.population.cmp(&a.population));

    boxes
        .iter()
        .map(|b| QuantizedColor {
            mean: b.mean(&histogram),
            population: b.population,
        })
        .collect()
}

fn split_until(
    boxes: &mut Vec<ColorBox>,
    target: usize,
    histogram: &Histogram,
    priority: impl Fn(&ColorBox) -> u64,
) {
    let mut exhausted = Vec::new();

    while boxes.len() + exhausted.len() < target {
        // Highest priority wins, lowest position breaks ties
        let Some(position) = boxes
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| priority(a).cmp(&priority(b)).then(ib.cmp(ia)))
            .map(|(i, _)| i)
        else {
            break;
        };

        let candidate = boxes.remove(position);
        match candidate.split(histogram) {
            Some((lower, upper)) => {
                boxes.push(lower);
                boxes.push(upper);
            }
            None => exhausted.push(candidate),
        }
    }

    boxes.append(&mut exhausted);
}

fn index(coords: [usize; 3]) -> usize {
    (coords[0] << (2 * SIGBITS)) | (coords[1] << SIGBITS) | coords[2]
}

struct Histogram {
    counts: Vec<u64>,
    sums: Vec<[u64; 3]>,
}

impl Histogram {
    fn from_pixels(pixels: &[[u8; 3]]) -> Self {
        let mut histogram = Self {
            counts: vec![0; SIDE * SIDE * SIDE],
            sums: vec![[0; 3]; SIDE * SIDE * SIDE],
        };

        for pixel in pixels {
            let i = index(pixel.map(|c| (c as usize) >> SHIFT));
            histogram.counts[i] += 1;
            for (sum, channel) in histogram.sums[i].iter_mut().zip(pixel) {
                *sum += *channel as u64;
            }
        }

        histogram
    }
}

/// Inclusive box over histogram coordinates, shrunk to its populated bins
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    lo: [usize; 3],
    hi: [usize; 3],
    population: u64,
}

impl ColorBox {
    /// Builds the tightest box around the populated bins within `lo..=hi`
    fn fit(lo: [usize; 3], hi: [usize; 3], histogram: &Histogram) -> Option<Self> {
        let mut min = hi;
        let mut max = lo;
        let mut population = 0;

        for_each_bin(lo, hi, |coords, i| {
            let count = histogram.counts[i];
            if count > 0 {
                population += count;
                for axis in 0..3 {
                    min[axis] = min[axis].min(coords[axis]);
                    max[axis] = max[axis].max(coords[axis]);
                }
            }
        });

        (population > 0).then_some(Self {
            lo: min,
            hi: max,
            population,
        })
    }

    fn volume(&self) -> u64 {
        (0..3)
            .map(|axis| (self.hi[axis] - self.lo[axis] + 1) as u64)
            .product()
    }

    fn mean(&self, histogram: &Histogram) -> [f64; 3] {
        let mut totals = [0u64; 3];
        for_each_bin(self.lo, self.hi, |_, i| {
            for (total, sum) in totals.iter_mut().zip(histogram.sums[i]) {
                *total += sum;
            }
        });

        totals.map(|total| total as f64 / self.population as f64)
    }

    /// Splits along the longest axis at the population median
    ///
    /// Because the box is tight, its first and last slices are populated,
    /// so both halves are non-empty whenever the axis spans two or more slices.
    fn split(&self, histogram: &Histogram) -> Option<(Self, Self)> {
        let axis = (0..3).max_by_key(|&a| (self.hi[a] - self.lo[a], std::cmp::Reverse(a)))?;
        let (lo, hi) = (self.lo[axis], self.hi[axis]);
        if lo == hi {
            return None;
        }

        let mut slices = vec![0u64; hi - lo + 1];
        for_each_bin(self.lo, self.hi, |coords, i| {
            slices[coords[axis] - lo] += histogram.counts[i];
        });

        let half = self.population.div_ceil(2);
        let mut cumulative = 0;
        let mut cut = lo;
        for (offset, count) in slices.iter().enumerate() {
            cumulative += count;
            if cumulative >= half {
                cut = lo + offset;
                break;
            }
        }
        let cut = cut.min(hi - 1);

        let mut lower_hi = self.hi;
        lower_hi[axis] = cut;
        let mut upper_lo = self.lo;
        upper_lo[axis] = cut + 1;

        Some((
            Self::fit(self.lo, lower_hi, histogram)?,
            Self::fit(upper_lo, self.hi, histogram)?,
        ))
    }
}

fn for_each_bin(lo: [usize; 3], hi: [usize; 3], mut f: impl FnMut([usize; 3], usize)) {
    for r in lo[0]..=hi[0] {
        for g in lo[1]..=hi[1] {
            for b in lo[2]..=hi[2] {
                let coords = [r, g, b];
                f(coords, index(coords));
            }
        }
    }
}
