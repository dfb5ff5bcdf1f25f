//! Query expansion: one query in, up to three tiers of variants out.
//!
//! Tier 1 keeps close to the user's wording, tier 2 specialises on the
//! detected keywords and domain, tier 3 pulls in related concepts the
//! knowledge store already knows about. Expansion is a pure function of the
//! query text and the concepts handed in; it never touches the network.

use std::collections::HashSet;

use crate::types::{Intent, QueryVariant};

/// Words ignored when extracting keywords.
pub(crate) const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "of", "to", "in", "on", "at", "for", "by", "with",
    "from", "is", "are", "was", "were", "be", "been", "it", "its", "this", "that", "these",
    "those", "what", "which", "who", "whom", "how", "why", "when", "where", "do", "does", "did",
    "can", "could", "should", "would", "i", "me", "my", "you", "your", "we", "our", "about",
    "into", "vs", "versus",
];

/// Abbreviations expanded in the lexical tier-1 variant.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("ai", "artificial intelligence"),
    ("ml", "machine learning"),
    ("nlp", "natural language processing"),
    ("db", "database"),
    ("os", "operating system"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("k8s", "kubernetes"),
    ("gpu", "graphics processing unit"),
    ("cpu", "central processing unit"),
    ("api", "application programming interface"),
    ("llm", "large language model"),
    ("usa", "united states"),
    ("uk", "united kingdom"),
];

/// Domain keyword table used for the domain guess.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "technology",
        &[
            "rust", "python", "javascript", "code", "programming", "software", "api", "database",
            "linux", "compiler", "server", "cloud", "kubernetes", "docker", "ai", "llm", "gpu",
            "algorithm",
        ],
    ),
    (
        "science",
        &[
            "physics", "chemistry", "biology", "quantum", "climate", "energy", "atom", "space",
            "planet", "theory", "evolution", "research",
        ],
    ),
    (
        "health",
        &[
            "health", "disease", "symptom", "treatment", "medicine", "diet", "vitamin", "sleep",
            "exercise", "vaccine", "doctor",
        ],
    ),
    (
        "finance",
        &[
            "stock", "market", "price", "invest", "investment", "bank", "tax", "crypto",
            "bitcoin", "inflation", "loan", "economy",
        ],
    ),
];

/// Result of the lightweight query analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnalysis {
    /// Lowercased tokens in order.
    pub tokens: Vec<String>,
    /// Tokens that survive stop-word filtering, deduplicated, in order.
    pub keywords: Vec<String>,
    /// Best-guess domain (`general` when nothing matches).
    pub domain: &'static str,
    /// Whether the query reads as a question.
    pub is_question: bool,
}

impl QueryAnalysis {
    /// Analyse query text.
    pub fn of(text: &str) -> Self {
        let tokens = tokenize(text);

        let mut seen = HashSet::new();
        let keywords: Vec<String> = tokens
            .iter()
            .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(&t.as_str()))
            .filter(|t| seen.insert((*t).clone()))
            .cloned()
            .collect();

        let domain = DOMAIN_KEYWORDS
            .iter()
            .map(|(domain, words)| {
                let hits = keywords
                    .iter()
                    .filter(|k| words.contains(&k.as_str()))
                    .count();
                (*domain, hits)
            })
            .filter(|(_, hits)| *hits > 0)
            // First domain wins ties so the guess is stable.
            .fold(None::<(&'static str, usize)>, |best, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
            .map_or("general", |(d, _)| d);

        let is_question = text.trim_end().ends_with('?')
            || tokens.first().is_some_and(|t| {
                matches!(
                    t.as_str(),
                    "what" | "why" | "how" | "when" | "where" | "who" | "which" | "is" | "can"
                )
            });

        Self {
            tokens,
            keywords,
            domain,
            is_question,
        }
    }
}

/// Turns a query into tiered variants.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    max_variants: usize,
    per_tier: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(9, 3)
    }
}

impl QueryExpander {
    /// Create an expander with the given overall and per-tier limits.
    pub fn new(max_variants: usize, per_tier: usize) -> Self {
        Self {
            max_variants,
            per_tier,
        }
    }

    /// Expand `query` into ordered, deduplicated variants.
    ///
    /// `related_concepts` come from the knowledge store; tier 3 is only
    /// produced when it is non-empty. The result never exceeds the
    /// configured maximum and never holds two variants that normalise to the
    /// same text.
    pub fn expand(&self, query: &str, related_concepts: &[String]) -> Vec<QueryVariant> {
        let original = collapse_whitespace(query);
        if original.is_empty() {
            return Vec::new();
        }
        let analysis = QueryAnalysis::of(&original);

        let mut candidates: Vec<QueryVariant> = Vec::new();

        let direct = [
            original.clone(),
            expand_abbreviations(&analysis.tokens),
            analysis.keywords.join(" "),
        ];
        self.push_tier(&mut candidates, Intent::Direct, direct);

        if !analysis.keywords.is_empty() {
            let keywords = analysis.keywords.join(" ");
            let expert = if analysis.domain == "general" {
                format!("{keywords} expert guide")
            } else {
                format!("{keywords} {} expert", analysis.domain)
            };
            let how_to = if original.to_lowercase().starts_with("how to") {
                format!("{original} step by step")
            } else {
                format!("how to {original}")
            };
            let conceptual = [expert, format!("{keywords} comparison"), how_to];
            self.push_tier(&mut candidates, Intent::Conceptual, conceptual);
        }

        if !related_concepts.is_empty() {
            let operational: Vec<String> = related_concepts
                .iter()
                .map(|c| collapse_whitespace(c))
                .filter(|c| !c.is_empty())
                .map(|c| format!("{original} {c}"))
                .collect();
            self.push_tier(&mut candidates, Intent::Operational, operational);
        }

        let mut variants = dedupe_variants(candidates);
        variants.truncate(self.max_variants);
        tracing::trace!(count = variants.len(), domain = analysis.domain, "expanded query");
        variants
    }

    fn push_tier(
        &self,
        out: &mut Vec<QueryVariant>,
        intent: Intent,
        texts: impl IntoIterator<Item = String>,
    ) {
        // Duplicates never consume a tier slot.
        let mut seen: HashSet<String> = out.iter().map(|v| normalize(&v.text)).collect();
        let mut added = 0;
        for text in texts {
            if added == self.per_tier {
                break;
            }
            let text = collapse_whitespace(&text);
            if text.is_empty() || !seen.insert(normalize(&text)) {
                continue;
            }
            out.push(QueryVariant::new(text, intent));
            added += 1;
        }
    }
}

/// Normalise variant text for duplicate detection: lowercase, collapsed whitespace.
pub fn normalize(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

/// Remove variants whose normalised text was already seen, keeping first-seen order.
fn dedupe_variants(variants: Vec<QueryVariant>) -> Vec<QueryVariant> {
    let mut seen = HashSet::new();
    variants
        .into_iter()
        .filter(|v| seen.insert(normalize(&v.text)))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn expand_abbreviations(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == t.as_str())
                .map_or(t.as_str(), |(_, long)| *long)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
