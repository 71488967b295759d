use std::num::NonZero;

/// Queue depth of a channel receiver. A bounded receiver drops its oldest
/// entry when a new one arrives while full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unbounded,
    Bounded(NonZero<usize>),
}

impl<T> From<T> for Capacity
where
    T: Into<usize>,
{
    fn from(value: T) -> Self {
        match NonZero::new(value.into()) {
            Some(n) => Capacity::Bounded(n),
            None => Capacity::Unbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_usize() {
        assert_eq!(Capacity::from(0usize), Capacity::Unbounded);
        assert_eq!(
            Capacity::from(3usize),
            Capacity::Bounded(NonZero::new(3).unwrap())
        );
    }
}
