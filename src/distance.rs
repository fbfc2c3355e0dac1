use clap::ValueEnum;

/// How similar the counts at both sides of an overlap must be to merge.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    /// 0.5 * (1 - Pearson correlation)
    Pearson,
    /// 0.5 * (1 - Spearman rank correlation)
    Spearman,
    /// mean over samples of |x - y| / (x + y)
    Mac,
    /// merge on sequence overlap alone
    None,
}

/// Buffers reused over all boundary comparisons of a run.
#[derive(Default)]
pub struct Scratch {
    pub pred: Vec<f32>,
    pub succ: Vec<f32>,
    ranks: Ranks,
}

#[derive(Default)]
struct Ranks {
    x: Vec<f64>,
    y: Vec<f64>,
    order: Vec<usize>,
}

impl Scratch {
    pub fn new(nb_smp: usize) -> Self {
        Scratch {
            pred: Vec::with_capacity(nb_smp),
            succ: Vec::with_capacity(nb_smp),
            ranks: Ranks::default(),
        }
    }

    /// Distance between the vectors currently held in `pred` and `succ`.
    pub fn distance(&mut self, method: Compatibility) -> f64 {
        let Scratch { pred, succ, ranks } = self;
        match method {
            Compatibility::Pearson => {
                ranks.x.clear();
                ranks.x.extend(pred.iter().map(|&v| f64::from(v)));
                ranks.y.clear();
                ranks.y.extend(succ.iter().map(|&v| f64::from(v)));
                pearson_f64(&ranks.x, &ranks.y)
            }
            Compatibility::Spearman => {
                rank(pred, &mut ranks.x, &mut ranks.order);
                rank(succ, &mut ranks.y, &mut ranks.order);
                pearson_f64(&ranks.x, &ranks.y)
            }
            Compatibility::Mac => mac(pred, succ),
            Compatibility::None => 0.0,
        }
    }
}

/// NaN when either vector has no variance.
fn pearson_f64(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let r = sxy / (sxx * syy).sqrt();
    0.5 * (1.0 - r.clamp(-1.0, 1.0))
}

/// 1-based ranks into `ranks`; ties get the average of the ranks they span.
fn rank(v: &[f32], ranks: &mut Vec<f64>, order: &mut Vec<usize>) {
    order.clear();
    order.extend(0..v.len());
    order.sort_by(|&a, &b| v[a].total_cmp(&v[b]));
    ranks.clear();
    ranks.resize(v.len(), 0.0);
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && v[order[j]] == v[order[i]] {
            j += 1;
        }
        let avg = (i + j + 1) as f64 / 2.0;
        for &o in &order[i..j] {
            ranks[o] = avg;
        }
        i = j;
    }
}

/// Mean absolute contrast; samples where both counts agree add 0.
pub fn mac(x: &[f32], y: &[f32]) -> f64 {
    let sum: f64 = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a != b)
        .map(|(&a, &b)| (f64::from(a) - f64::from(b)).abs() / (f64::from(a) + f64::from(b)))
        .sum();
    sum / x.len() as f64
}
