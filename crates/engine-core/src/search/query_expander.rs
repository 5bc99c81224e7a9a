use std::collections::{HashMap, HashSet};

/// Bidirectional technical-term synonym pairs. Each pair expands to
/// two table entries (term → synonym, synonym → term), giving ≈70 entries
/// from ~35 pairs.
const SYNONYM_PAIRS: &[(&str, &str)] = &[
    ("rust", "rustlang"),
    ("javascript", "js"),
    ("typescript", "ts"),
    ("python", "py"),
    ("golang", "go"),
    ("kubernetes", "k8s"),
    ("docker", "container"),
    ("database", "db"),
    ("postgresql", "postgres"),
    ("authentication", "auth"),
    ("authorization", "authz"),
    ("configuration", "config"),
    ("repository", "repo"),
    ("continuous integration", "ci"),
    ("continuous deployment", "cd"),
    ("application programming interface", "api"),
    ("machine learning", "ml"),
    ("artificial intelligence", "ai"),
    ("natural language processing", "nlp"),
    ("large language model", "llm"),
    ("microservice", "service"),
    ("function", "fn"),
    ("variable", "var"),
    ("object oriented programming", "oop"),
    ("version control", "vcs"),
    ("pull request", "pr"),
    ("command line interface", "cli"),
    ("graphical user interface", "gui"),
    ("user interface", "ui"),
    ("user experience", "ux"),
    ("representational state transfer", "rest"),
    ("structured query language", "sql"),
    ("javascript object notation", "json"),
    ("extensible markup language", "xml"),
    ("hypertext transfer protocol", "http"),
    ("transmission control protocol", "tcp"),
    ("internet protocol", "ip"),
    ("domain name system", "dns"),
    ("content delivery network", "cdn"),
    ("load balancer", "lb"),
    ("virtual machine", "vm"),
    ("operating system", "os"),
    ("central processing unit", "cpu"),
    ("graphics processing unit", "gpu"),
    ("random access memory", "ram"),
    ("solid state drive", "ssd"),
    ("integrated development environment", "ide"),
    ("software development kit", "sdk"),
    ("reciprocal rank fusion", "rrf"),
    ("approximate nearest neighbor", "ann"),
    ("term frequency inverse document frequency", "tf-idf"),
    ("spaced repetition", "srs"),
    ("knowledge base", "kb"),
    ("retrieval augmented generation", "rag"),
    ("neural network", "nn"),
    ("convolutional neural network", "cnn"),
];

/// Deterministic keyword expander applied only to the lexical search arm
///. Case-insensitive matches against both single words and multi-word
/// phrases (e.g. "continuous integration" ↔ "ci"); appends at most 5
/// synonyms per matching term, skipping anything already present in the
/// query.
pub struct QueryExpander {
    table: HashMap<String, Vec<String>>,
    max_phrase_words: usize,
}

impl QueryExpander {
    pub fn new() -> Self {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        let mut max_phrase_words = 1;
        for (a, b) in SYNONYM_PAIRS {
            max_phrase_words = max_phrase_words.max(a.split_whitespace().count()).max(b.split_whitespace().count());
            table.entry(normalize_phrase(a)).or_default().push(b.to_string());
            table.entry(normalize_phrase(b)).or_default().push(a.to_string());
        }
        Self { table, max_phrase_words }
    }

    /// Slides a window of 1..=`max_phrase_words` words across the query,
    /// trying the longest span first at each position so a phrase match
    /// (e.g. "machine learning") takes priority over a single-word match
    /// on one of its component words.
    pub fn expand(&self, query: &str) -> String {
        let tokens: Vec<&str> = query.split_whitespace().collect();
        let normalized: Vec<String> = tokens.iter().map(|w| normalize_word(w)).collect();

        let mut phrase_seen: HashSet<String> = HashSet::new();
        for len in 1..=normalized.len() {
            for start in 0..=normalized.len().saturating_sub(len) {
                phrase_seen.insert(normalized[start..start + len].join(" "));
            }
        }

        let mut appended = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let mut matched_len = 0;
            for len in (1..=self.max_phrase_words).rev() {
                if i + len > normalized.len() {
                    continue;
                }
                let span = normalized[i..i + len].join(" ");
                if let Some(synonyms) = self.table.get(&span) {
                    for synonym in synonyms.iter().take(5) {
                        let norm_synonym = normalize_phrase(synonym);
                        if phrase_seen.insert(norm_synonym) {
                            appended.push(synonym.clone());
                        }
                    }
                    matched_len = len;
                    break;
                }
            }
            i += matched_len.max(1);
        }

        if appended.is_empty() {
            query.to_string()
        } else {
            format!("{query} {}", appended.join(" "))
        }
    }
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

fn normalize_phrase(phrase: &str) -> String {
    phrase.split_whitespace().map(normalize_word).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_term_with_synonym() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("how does k8s scheduling work");
        assert!(expanded.contains("kubernetes"));
    }

    #[test]
    fn does_not_duplicate_terms_already_present() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("rust and rustlang interop");
        let rustlang_count = expanded.split_whitespace().filter(|w| w.eq_ignore_ascii_case("rustlang")).count();
        assert_eq!(rustlang_count, 1);
    }

    #[test]
    fn unmatched_query_is_unchanged() {
        let expander = QueryExpander::new();
        assert_eq!(expander.expand("banana bread recipe"), "banana bread recipe");
    }

    #[test]
    fn preserves_original_query_order_as_prefix() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("db migration");
        assert!(expanded.starts_with("db migration"));
    }

    #[test]
    fn expands_multi_word_phrase_to_its_abbreviation() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("setting up continuous integration pipelines");
        assert!(expanded.split_whitespace().any(|w| w.eq_ignore_ascii_case("ci")));
    }

    #[test]
    fn expands_longer_multi_word_phrase_to_its_abbreviation() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("what is machine learning good for");
        assert!(expanded.split_whitespace().any(|w| w.eq_ignore_ascii_case("ml")));
    }

    #[test]
    fn does_not_duplicate_a_phrase_already_present_in_the_query() {
        let expander = QueryExpander::new();
        let expanded = expander.expand("ci and continuous integration together");
        let occurrences = expanded.matches("continuous integration").count();
        assert_eq!(occurrences, 1);
    }
}
