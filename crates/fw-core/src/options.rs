//! Ordered command-line token accumulator.

/// An ordered, growable sequence of command-line tokens.
///
/// Cloning yields an independent copy: mutating one list never affects
/// the other.
///
/// # Example
///
/// ```
/// use fw_core::OptionList;
///
/// let mut opts = OptionList::new();
/// opts.append(["-acodec", "aac"]);
/// opts.push("-vn");
/// assert_eq!(opts.find("-acodec", 1), Some(&["aac".to_string()][..]));
/// opts.remove("-acodec", 1);
/// assert_eq!(opts.get(), ["-vn"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    tokens: Vec<String>,
}

impl OptionList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any number of tokens and return the whole sequence so far.
    pub fn append<I, S>(&mut self, tokens: I) -> &[String]
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(tokens.into_iter().map(Into::into));
        &self.tokens
    }

    /// Append a single token.
    pub fn push(&mut self, token: impl Into<String>) -> &mut Self {
        self.tokens.push(token.into());
        self
    }

    /// The accumulated tokens.
    pub fn get(&self) -> &[String] {
        &self.tokens
    }

    /// Remove every token.
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the list holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Return the `n` tokens following the first occurrence of `key`.
    ///
    /// The slice is shorter than `n` when the list ends early; `None` means
    /// `key` is absent.
    pub fn find(&self, key: &str, n: usize) -> Option<&[String]> {
        let index = self.position(key)?;
        let start = index + 1;
        let end = (start + n).min(self.tokens.len());
        Some(&self.tokens[start..end])
    }

    /// Delete the first occurrence of `key` together with its `n` following tokens.
    pub fn remove(&mut self, key: &str, n: usize) {
        if let Some(index) = self.position(key) {
            let end = (index + 1 + n).min(self.tokens.len());
            self.tokens.drain(index..end);
        }
    }

    /// Whether `key` occurs in the list.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t == key)
    }
}

impl<S: Into<String>> FromIterator<S> for OptionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = OptionList::new();
        list.append(iter);
        list
    }
}

impl<S: Into<String>> Extend<S> for OptionList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.append(iter);
    }
}

impl<'a> IntoIterator for &'a OptionList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_flattens_and_returns_sequence() {
        let mut list = OptionList::new();
        assert_eq!(list.append(["-a"]).len(), 1);
        let all = list.append(vec!["-b".to_string(), "p1".to_string()]);
        assert_eq!(all, ["-a", "-b", "p1"]);
        list.push("-c").push("-d");
        assert_eq!(list.len(), 5);

        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.get().len(), 0);
    }

    #[test]
    fn find_returns_following_tokens() {
        let list: OptionList = ["-a", "-b", "p1", "p2", "-c"].into_iter().collect();
        assert_eq!(list.find("-b", 2), Some(&["p1".to_string(), "p2".to_string()][..]));
        assert_eq!(list.find("-b", 0), Some(&[][..]));
        assert_eq!(list.find("-c", 3), Some(&[][..]));
        assert_eq!(list.find("-x", 1), None);
    }

    #[test]
    fn remove_key_with_params() {
        let mut list: OptionList = ["-a", "-b", "p1", "p2", "-c"].into_iter().collect();
        assert!(list.find("-b", 2).is_some());
        list.remove("-b", 2);
        assert_eq!(list.get(), ["-a", "-c"]);

        // absent keys are a no-op
        list.remove("-z", 4);
        assert_eq!(list.get(), ["-a", "-c"]);
    }

    #[test]
    fn remove_only_first_occurrence() {
        let mut list: OptionList = ["-map", "0", "-map", "1"].into_iter().collect();
        list.remove("-map", 1);
        assert_eq!(list.get(), ["-map", "1"]);
    }

    #[test]
    fn clones_diverge() {
        let mut original: OptionList = ["-a", "1"].into_iter().collect();
        let mut copy = original.clone();

        original.push("-b");
        copy.remove("-a", 1);
        copy.push("-z");

        assert_eq!(original.get(), ["-a", "1", "-b"]);
        assert_eq!(copy.get(), ["-z"]);
    }
}
