//! Heuristic query classification.
//!
//! A pure function of the query string: picks the search strategy, the
//! dense/sparse blend weight, and a complexity class that drives reranker
//! tier selection.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{QueryComplexity, SearchStrategy};

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]+""#).expect("quoted pattern compiles"));

static OPERATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(AND|OR|NOT)\b|\+|-").expect("operator pattern compiles"));

static CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z]+\.[a-zA-Z]+\(|function\s|class\s|=>|import\s|export\s")
        .expect("code pattern compiles")
});

static QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(what|how|why|when|where|who|which|can|does|is|are)\b")
        .expect("question pattern compiles")
});

static AGENTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tool|function|call|execute|invoke|run|api|endpoint)\b")
        .expect("agentic pattern compiles")
});

static CODE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_]+\(.*\)|[a-zA-Z0-9_]+\.[a-zA-Z0-9_]+")
        .expect("code syntax pattern compiles")
});

/// Features extracted from a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFeatures {
    /// Character length.
    pub length: usize,
    /// Whitespace-separated word count.
    pub word_count: usize,
    /// Contains a quoted substring.
    pub has_quotes: bool,
    /// Contains boolean operators.
    pub has_operators: bool,
    /// Contains code-like syntax.
    pub has_code: bool,
    /// Starts as a question.
    pub is_question: bool,
    /// Contains agentic/tool vocabulary.
    pub has_agentic: bool,
}

/// Full classification of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Selected search strategy.
    pub strategy: SearchStrategy,
    /// Dense weight for hybrid blending (0 = all sparse, 1 = all dense).
    pub alpha: f32,
    /// Complexity class.
    pub complexity: QueryComplexity,
    /// Extracted features.
    pub features: QueryFeatures,
    /// Raw complexity score behind the class.
    pub score: u32,
}

/// Stateless query classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    /// Creates a classifier.
    pub fn new() -> Self {
        Self
    }

    /// Picks strategy and alpha.
    ///
    /// Quoted substrings signal exact-match intent and go sparse; code-like
    /// syntax leans sparse inside hybrid; natural language leans dense.
    pub fn strategy(&self, query: &str) -> (SearchStrategy, f32) {
        if QUOTED.is_match(query) {
            return (SearchStrategy::Sparse, 0.1);
        }

        if CODE_SYNTAX.is_match(query) {
            return (SearchStrategy::Hybrid, 0.3);
        }

        (SearchStrategy::Hybrid, 0.7)
    }

    /// Extracts classification features.
    pub fn extract_features(&self, query: &str) -> QueryFeatures {
        QueryFeatures {
            length: query.chars().count(),
            word_count: query.split_whitespace().count(),
            has_quotes: QUOTED.is_match(query),
            has_operators: OPERATORS.is_match(query),
            has_code: CODE.is_match(query),
            is_question: QUESTION.is_match(query),
            has_agentic: AGENTIC.is_match(query),
        }
    }

    /// Full classification: strategy, alpha, complexity, features, score.
    pub fn classify(&self, query: &str) -> Classification {
        let features = self.extract_features(query);

        let mut score = 0u32;

        if features.length > 100 {
            score += 3;
        } else if features.length > 50 {
            score += 2;
        } else if features.length > 25 {
            score += 1;
        }

        if features.word_count > 12 {
            score += 2;
        } else if features.word_count > 8 {
            score += 1;
        }

        if features.has_quotes {
            score += 1;
        }
        if features.has_operators {
            score += 2;
        }
        if features.has_code {
            score += 3;
        }
        if features.is_question {
            score += 1;
        }
        if features.has_agentic {
            score += 2;
        }

        let complexity = if score >= 5 {
            QueryComplexity::Complex
        } else if score >= 2 {
            QueryComplexity::Moderate
        } else {
            QueryComplexity::Simple
        };

        let (strategy, alpha) = self.strategy(query);

        Classification {
            strategy,
            alpha,
            complexity,
            features,
            score,
        }
    }

    /// `true` when the query contains code patterns (routes to the code
    /// reranking tier).
    pub fn is_code_query(&self, query: &str) -> bool {
        self.extract_features(query).has_code
    }

    /// `true` when the query is agentic/tool-related.
    pub fn is_agentic_query(&self, query: &str) -> bool {
        self.extract_features(query).has_agentic
    }
}
