//! Small numeric helpers for the peak-centering math.

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Line through two points; `None` when both share an x value.
pub fn line_through((x0, y0): (f64, f64), (x1, y1): (f64, f64)) -> Option<LineFit> {
    let dx = x1 - x0;
    if dx == 0.0 || !dx.is_finite() {
        return None;
    }
    let slope = (y1 - y0) / dx;
    Some(LineFit {
        slope,
        intercept: y0 - slope * x0,
    })
}

/// Ordinary least-squares line through `(x, y)` pairs.
///
/// `None` with fewer than two points or when all x values coincide.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mx = xs[..n].iter().sum::<f64>() / nf;
    let my = ys[..n].iter().sum::<f64>() / nf;
    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(LineFit {
        slope,
        intercept: my - slope * mx,
    })
}

/// Running sum of `values`.
pub fn cumulative_sum(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_recovers_exact_line() {
        let xs = [18.0, 40.0, 84.0];
        let ys: Vec<f64> = xs.iter().map(|x| 0.2 - 0.003 * x).collect();
        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope + 0.003).abs() < 1e-12);
        assert!((fit.eval(0.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn degenerate_fits() {
        assert!(fit_line(&[1.0], &[1.0]).is_none());
        assert!(fit_line(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        assert!(line_through((1.0, 0.0), (1.0, 5.0)).is_none());
    }

    #[test]
    fn cumulative_sum_accumulates() {
        assert_eq!(cumulative_sum(&[1.0, 2.0, 0.5]), vec![1.0, 3.0, 3.5]);
        assert!(cumulative_sum(&[]).is_empty());
    }
}
