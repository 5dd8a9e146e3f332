//! Problems: identified purely by their canonical URL.

use serde::{Deserialize, Serialize};

use crate::identity::{hash_tokens, Token};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub problem_url: String,
}

impl Problem {
    #[must_use]
    pub fn new(problem_url: impl Into<String>) -> Self {
        let problem_url = problem_url.into();
        let id = hash_tokens([Token::Borrowed(problem_url.as_str())]);
        Self { id, problem_url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_url_same_id() {
        let a = Problem::new("https://codeforces.com/contest/4/problem/A");
        let b = Problem::new("https://codeforces.com/contest/4/problem/A");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn different_url_different_id() {
        let a = Problem::new("https://codeforces.com/contest/4/problem/A");
        let b = Problem::new("https://codeforces.com/contest/4/problem/B");
        assert_ne!(a.id, b.id);
    }
}
