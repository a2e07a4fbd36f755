/// The computations a worker knows how to run, keyed by the id carried in
/// every request.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Function {
    /// Σ i^t over the partition's range
    #[default]
    PowerSum = 1,
}

impl Function {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Evaluates the function over the inclusive range `start..=end`.
    pub fn evaluate(self, start: u64, end: u64, exponent: u32) -> f64 {
        match self {
            Function::PowerSum => power_sum(start, end, exponent),
        }
    }
}

impl TryFrom<u32> for Function {
    type Error = u32;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Function::PowerSum),
            other => Err(other),
        }
    }
}

fn power_sum(start: u64, end: u64, exponent: u32) -> f64 {
    let exponent = exponent as f64;
    (start..=end).map(|i| (i as f64).powf(exponent)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squares_of_pairs() {
        let sums: Vec<f64> = [(0, 1), (2, 3), (4, 5), (6, 7), (8, 9)]
            .into_iter()
            .map(|(start, end)| Function::PowerSum.evaluate(start, end, 2))
            .collect();

        assert_eq!(sums, vec![1., 13., 41., 85., 145.]);
    }

    #[test]
    fn zeroth_power_counts_terms() {
        // 0^0 is taken as 1
        assert_eq!(Function::PowerSum.evaluate(0, 9, 0), 10.);
    }

    #[test]
    fn matches_closed_form_for_cubes() {
        // Σ_{i=0}^{m} i^3 = (m(m+1)/2)^2
        let m = 999u64;
        let expected = ((m * (m + 1) / 2) as f64).powi(2);

        assert_eq!(Function::PowerSum.evaluate(0, m, 3), expected);
    }

    #[test]
    fn every_term_is_a_float_power() {
        let (start, end, exponent) = (1_000_000u64, 1_000_010u64, 7);
        let expected: f64 = (start..=end)
            .map(|i| (i as f64).powf(exponent as f64))
            .sum();

        assert_eq!(Function::PowerSum.evaluate(start, end, exponent), expected);
    }

    #[test]
    fn ids() {
        assert_eq!(Function::PowerSum.id(), 1);
        assert_eq!(Function::try_from(1), Ok(Function::PowerSum));
        assert_eq!(Function::try_from(2), Err(2));
    }
}
