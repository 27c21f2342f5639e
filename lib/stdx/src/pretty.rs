use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;

/// Renders a slice as a human readable list: `a, b or c`
#[derive(Clone, PartialEq, Hash, Eq)]
pub struct List<C> {
    pub data: C,
    pub separator: &'static str,
    pub final_separator: &'static str,
    pub prefix: &'static str,
    pub postfix: &'static str,
}

impl<C> List<C> {
    pub fn new(contents: C) -> Self {
        Self { data: contents, separator: ", ", final_separator: " or ", prefix: "", postfix: "" }
    }

    pub fn surround(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self.postfix = prefix;
        self
    }

    pub fn with_final_separator(mut self, final_separator: &'static str) -> Self {
        self.final_separator = final_separator;
        self
    }
}

impl<C: Debug> Debug for List<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.data, f)
    }
}

impl<X: Display, T: Deref<Target = [X]>> Display for List<T> {
    #[inline]
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.data.deref() {
            [] => Ok(()),
            [x] => write!(f, "{}{}{}", self.prefix, x, self.postfix),
            [ref body @ .., second_last, last] => {
                for x in body {
                    write!(f, "{}{}{}{}", self.prefix, x, self.postfix, self.separator)?;
                }
                write!(
                    f,
                    "{}{}{}{}{}{}{}",
                    self.prefix,
                    second_last,
                    self.postfix,
                    self.final_separator,
                    self.prefix,
                    last,
                    self.postfix
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::List;

    #[test]
    fn lists() {
        assert_eq!(List::new(vec!["x"]).to_string(), "x");
        assert_eq!(List::new(vec!["x", "y", "z"]).surround("'").to_string(), "'x', 'y' or 'z'");
        assert_eq!(
            List::new(vec![1, 2]).with_final_separator(" and ").to_string(),
            "1 and 2"
        );
        assert_eq!(List::new(Vec::<u32>::new()).to_string(), "");
    }
}
