//! Result processing: clean, annotate and score raw provider hits.
//!
//! Turns [`RawHit`]s into [`EnrichedResult`]s. Every step is a pure
//! function of its inputs, so processing the same hits for the same
//! variant and query always yields the same output.

use std::collections::HashMap;

use scraper::Html;

use crate::expander::{QueryAnalysis, STOP_WORDS};
use crate::ranking::host_matches;
use crate::types::{clamp_unit, EnrichedResult, Entity, EntityKind, QueryVariant, RawHit};

/// Longest summary returned, in characters.
pub const MAX_SUMMARY_CHARS: usize = 200;

/// Weight of lexical overlap in the relevance estimate.
const OVERLAP_WEIGHT: f64 = 0.7;
/// Weight of the provider's own ordering in the relevance estimate.
const POSITION_WEIGHT: f64 = 0.3;

/// Keyword table for content categories.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("tutorial", &["tutorial", "guide", "how to", "learn", "step by step", "beginner"]),
    ("news", &["news", "breaking", "announced", "announces", "today", "report"]),
    ("research", &["study", "paper", "research", "journal", "findings", "arxiv"]),
    ("reference", &["definition", "encyclopedia", "documentation", "reference", "manual"]),
    ("opinion", &["opinion", "review", "blog", "editorial"]),
    ("discussion", &["forum", "question", "answers", "thread", "discussion"]),
];

/// Host suffixes mapped to a category tag.
const HOST_CATEGORIES: &[(&str, &str)] = &[
    ("wikipedia.org", "reference"),
    ("github.com", "code"),
    ("gitlab.com", "code"),
    ("docs.rs", "code"),
    ("stackoverflow.com", "discussion"),
    ("reddit.com", "discussion"),
    (".edu", "academic"),
    ("arxiv.org", "academic"),
    (".gov", "government"),
    ("reuters.com", "news"),
    ("bbc.co.uk", "news"),
    ("bbc.com", "news"),
    ("nytimes.com", "news"),
    ("apnews.com", "news"),
];

/// Stop words per Latin-script language, used for language voting.
const LANGUAGE_STOP_WORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "of", "to", "in", "that", "with", "for", "this"]),
    ("es", &["el", "la", "los", "las", "es", "y", "de", "que", "en", "por"]),
    ("fr", &["le", "la", "les", "est", "et", "des", "que", "une", "dans", "pour"]),
    ("de", &["der", "die", "das", "ist", "und", "nicht", "mit", "ein", "eine", "für"]),
    ("it", &["il", "lo", "gli", "è", "e", "di", "che", "una", "per", "con"]),
    ("pt", &["o", "os", "as", "é", "e", "do", "da", "que", "uma", "com"]),
];

/// Cleans and annotates raw hits.
#[derive(Debug, Clone, Default)]
pub struct ResultProcessor;

impl ResultProcessor {
    /// Create a processor.
    pub fn new() -> Self {
        Self
    }

    /// Enrich the hits returned for `variant`.
    ///
    /// `original_query` is the user's text, not the variant text: relevance
    /// always measures overlap with what the user actually asked. Hits
    /// whose link is empty are dropped.
    pub fn process(
        &self,
        hits: &[RawHit],
        variant: &QueryVariant,
        original_query: &str,
    ) -> Vec<EnrichedResult> {
        let analysis = QueryAnalysis::of(original_query);
        let query_terms: &[String] = if analysis.keywords.is_empty() {
            &analysis.tokens
        } else {
            &analysis.keywords
        };

        hits.iter()
            .filter(|hit| !hit.link.trim().is_empty())
            .enumerate()
            .map(|(position, hit)| self.enrich(hit, position, variant, query_terms))
            .collect()
    }

    fn enrich(
        &self,
        hit: &RawHit,
        position: usize,
        variant: &QueryVariant,
        query_terms: &[String],
    ) -> EnrichedResult {
        let title = clean_text(&hit.title);
        let snippet = clean_text(&hit.snippet);
        let link = hit.link.trim().to_owned();
        let source = source_host(&link);
        let combined = format!("{title} {snippet}");

        let overlap = lexical_overlap(query_terms, &combined);
        let relevance = (OVERLAP_WEIGHT * overlap + POSITION_WEIGHT * position_decay(position))
            * tier_factor(variant.tier());

        let mut result = EnrichedResult {
            entities: extract_entities(&combined),
            language: detect_language(&combined).to_owned(),
            summary: summarize(&snippet, query_terms),
            categories: categorize(&combined, &source),
            confidence: confidence(&title, &snippet, &link, hit.published.is_some()),
            relevance,
            title,
            snippet,
            link,
            source,
            published: hit.published,
            tier: variant.tier(),
        };
        result.clamp_scores();
        result
    }
}

/// Strip markup, decode entities, drop control and replacement characters,
/// and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    let text = if raw.contains('<') || raw.contains('&') {
        let fragment = Html::parse_fragment(raw);
        fragment.root_element().text().collect::<Vec<_>>().join("")
    } else {
        raw.to_owned()
    };

    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control() && *c != '\u{FFFD}' && *c != '\u{200B}')
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Position decay: `1 / (1 + 0.1 × position)`.
pub fn position_decay(position: usize) -> f64 {
    1.0 / (1.0 + position as f64 * 0.1)
}

/// Tier 1 evidence counts fully; inferred variants a little less.
fn tier_factor(tier: u8) -> f64 {
    match tier {
        1 => 1.0,
        2 => 0.9,
        _ => 0.8,
    }
}

/// Fraction of `query_terms` that occur as tokens of `text`.
fn lexical_overlap(query_terms: &[String], text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc_tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    let matched = query_terms
        .iter()
        .filter(|term| doc_tokens.iter().any(|t| t == *term))
        .count();
    matched as f64 / query_terms.len() as f64
}

fn confidence(title: &str, snippet: &str, link: &str, has_timestamp: bool) -> f64 {
    let mut score = 0.2;
    if !title.is_empty() {
        score += 0.2;
    }
    score += 0.3 * (snippet.chars().count() as f64 / 160.0).min(1.0);
    if link.starts_with("https://") {
        score += 0.15;
    }
    if has_timestamp {
        score += 0.15;
    }
    clamp_unit(score)
}

/// Lowercase host of `link` without a leading `www.`; empty if unparseable.
pub fn source_host(link: &str) -> String {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .map(|h| h.strip_prefix("www.").map(str::to_owned).unwrap_or(h))
        .unwrap_or_default()
}

/// Occurrence counts for entities, in first-seen order.
#[derive(Default)]
struct EntityTally {
    order: Vec<(String, EntityKind)>,
    counts: HashMap<(String, EntityKind), usize>,
}

impl EntityTally {
    fn record(&mut self, text: String, kind: EntityKind) {
        let key = (text, kind);
        let count = self.counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            self.order.push(key);
        }
        *count += 1;
    }

    /// Record a run of capitalised words as a name.
    ///
    /// Capitalisation at the start of a sentence is grammar, not evidence:
    /// a leading stop word is dropped and a lone sentence-initial word is
    /// ignored.
    fn flush_name(&mut self, run: &mut Vec<&str>, at_sentence_start: bool) {
        let mut words: &[&str] = &run[..];
        let mut at_start = at_sentence_start;
        if at_start
            && words
                .first()
                .is_some_and(|w| STOP_WORDS.contains(&w.to_lowercase().as_str()))
        {
            words = &words[1..];
            at_start = false;
        }
        if words.len() > 1 || (words.len() == 1 && !at_start) {
            self.record(words.join(" "), EntityKind::Name);
        }
        run.clear();
    }

    fn into_entities(self) -> Vec<Entity> {
        let max = self.counts.values().copied().max().unwrap_or(1) as f64;
        self.order
            .into_iter()
            .map(|key| {
                let score = self.counts.get(&key).copied().unwrap_or(1) as f64 / max;
                Entity {
                    text: key.0,
                    kind: key.1,
                    score: clamp_unit(score),
                }
            })
            .collect()
    }
}

/// Extract names, years and numbers, scored by relative frequency.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut tally = EntityTally::default();
    let mut run: Vec<&str> = Vec::new();
    let mut run_at_sentence_start = false;
    let mut sentence_start = true;

    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let ends_sentence = raw.ends_with(['.', '!', '?']);

        if word.is_empty() {
            tally.flush_name(&mut run, run_at_sentence_start);
        } else if word.chars().all(|c| c.is_ascii_digit()) {
            tally.flush_name(&mut run, run_at_sentence_start);
            let kind = match word.parse::<u32>() {
                Ok(year) if word.len() == 4 && (1000..3000).contains(&year) => EntityKind::Date,
                _ => EntityKind::Number,
            };
            tally.record(word.to_owned(), kind);
        } else if word.chars().next().is_some_and(char::is_uppercase) {
            if run.is_empty() {
                run_at_sentence_start = sentence_start;
            }
            run.push(word);
        } else {
            tally.flush_name(&mut run, run_at_sentence_start);
        }

        if ends_sentence {
            tally.flush_name(&mut run, run_at_sentence_start);
        }
        sentence_start = ends_sentence;
    }
    tally.flush_name(&mut run, run_at_sentence_start);
    tally.into_entities()
}

/// Guess the language of `text` as an ISO 639-1 code, `und` if unknown.
pub fn detect_language(text: &str) -> &'static str {
    let mut scripts: HashMap<&'static str, usize> = HashMap::new();
    let mut latin = 0usize;
    let mut persian_marks = 0usize;

    for c in text.chars() {
        let script = match c {
            'پ' | 'چ' | 'ژ' | 'گ' | 'ی' | 'ک' => {
                persian_marks += 1;
                Some("arabic")
            }
            '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' => Some("arabic"),
            '\u{0400}'..='\u{04FF}' => Some("ru"),
            '\u{0370}'..='\u{03FF}' => Some("el"),
            '\u{0590}'..='\u{05FF}' => Some("he"),
            '\u{0900}'..='\u{097F}' => Some("hi"),
            '\u{3040}'..='\u{30FF}' => Some("ja"),
            '\u{AC00}'..='\u{D7AF}' | '\u{1100}'..='\u{11FF}' => Some("ko"),
            '\u{4E00}'..='\u{9FFF}' => Some("zh"),
            c if c.is_alphabetic() => {
                latin += 1;
                None
            }
            _ => None,
        };
        if let Some(script) = script {
            *scripts.entry(script).or_insert(0) += 1;
        }
    }

    // Kana anywhere means Japanese even when Han characters dominate.
    if scripts.contains_key("ja") {
        return "ja";
    }
    if let Some((script, count)) = scripts
        .iter()
        .max_by_key(|(name, count)| (**count, std::cmp::Reverse(**name)))
    {
        if *count >= latin {
            return match *script {
                "arabic" if persian_marks > 0 => "fa",
                "arabic" => "ar",
                other => other,
            };
        }
    }
    if latin == 0 {
        return "und";
    }

    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    LANGUAGE_STOP_WORDS
        .iter()
        .map(|(lang, stops)| {
            let votes = words.iter().filter(|w| stops.contains(&w.as_str())).count();
            (*lang, votes)
        })
        .fold(("en", 0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Pick the first sentence mentioning a query term (else the first
/// sentence), capped at [`MAX_SUMMARY_CHARS`].
pub fn summarize(snippet: &str, query_terms: &[String]) -> String {
    let sentences = split_sentences(snippet);
    let chosen = sentences
        .iter()
        .find(|s| {
            let lower = s.to_lowercase();
            query_terms.iter().any(|t| lower.contains(t.as_str()))
        })
        .or_else(|| sentences.first())
        .map_or("", |s| s.as_str());

    if chosen.chars().count() <= MAX_SUMMARY_CHARS {
        return chosen.to_owned();
    }
    let mut truncated: String = chosen.chars().take(MAX_SUMMARY_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?' | '؟' | '。');
        if terminal && chars.peek().is_none_or(|n| n.is_whitespace()) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_owned());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_owned());
    }
    sentences
}

/// Category tags from content keywords and the source host.
pub fn categorize(text: &str, host: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut categories: Vec<String> = Vec::new();
    let mut push = |tag: &str| {
        if !categories.iter().any(|c| c == tag) {
            categories.push(tag.to_owned());
        }
    };

    for (suffix, tag) in HOST_CATEGORIES {
        if host_matches(host, suffix) {
            push(tag);
        }
    }
    for (tag, words) in CATEGORY_KEYWORDS {
        if words.iter().any(|w| contains_word(&lower, w)) {
            push(tag);
        }
    }
    categories
}

/// Whole-word (or whole-phrase) containment on lowercase text.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Intent;

    fn hit(title: &str, snippet: &str, link: &str) -> RawHit {
        RawHit {
            title: title.into(),
            snippet: snippet.into(),
            link: link.into(),
            published: None,
        }
    }

    fn direct(text: &str) -> QueryVariant {
        QueryVariant::new(text, Intent::Direct)
    }

    #[test]
    fn clean_text_strips_tags_and_entities() {
        assert_eq!(
            clean_text("<b>Rust</b> &amp; <i>async</i>\n\n  runtimes"),
            "Rust & async runtimes"
        );
    }

    #[test]
    fn clean_text_removes_control_characters() {
        assert_eq!(clean_text("a\u{0007}b\u{FFFD}c"), "abc");
    }

    #[test]
    fn process_drops_empty_links() {
        let hits = vec![hit("A", "a", "   "), hit("B", "b", "https://b.com")];
        let results = ResultProcessor::new().process(&hits, &direct("b"), "b");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].link, "https://b.com");
    }

    #[test]
    fn overlap_raises_relevance() {
        let hits = vec![
            hit("Cooking pasta", "Boil water", "https://food.com"),
            hit("Rust async runtime", "Tokio is a Rust async runtime", "https://tokio.rs"),
        ];
        let results =
            ResultProcessor::new().process(&hits, &direct("rust async runtime"), "rust async runtime");
        assert!(results[1].relevance > results[0].relevance);
    }

    #[test]
    fn earlier_position_scores_higher_for_equal_overlap() {
        let hits = vec![
            hit("Rust", "Rust language", "https://a.com"),
            hit("Rust", "Rust language", "https://b.com"),
        ];
        let results = ResultProcessor::new().process(&hits, &direct("rust"), "rust");
        assert!(results[0].relevance > results[1].relevance);
    }

    #[test]
    fn lower_tier_discounts_relevance() {
        let hits = vec![hit("Rust", "Rust language", "https://a.com")];
        let tier1 = ResultProcessor::new().process(&hits, &direct("rust"), "rust");
        let tier3 = ResultProcessor::new().process(
            &hits,
            &QueryVariant::new("rust ownership", Intent::Operational),
            "rust",
        );
        assert!(tier1[0].relevance > tier3[0].relevance);
        assert_eq!(tier3[0].tier, 3);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let hits: Vec<RawHit> = (0..30)
            .map(|i| hit("Rust rust RUST", "rust rust", &format!("https://r{i}.com")))
            .collect();
        for r in ResultProcessor::new().process(&hits, &direct("rust"), "rust") {
            assert!((0.0..=1.0).contains(&r.relevance));
            assert!((0.0..=1.0).contains(&r.confidence));
        }
    }

    #[test]
    fn processing_is_deterministic() {
        let hits = vec![hit("Tokio <b>Runtime</b>", "Async Rust since 2016.", "https://tokio.rs")];
        let p = ResultProcessor::new();
        assert_eq!(
            p.process(&hits, &direct("tokio"), "tokio"),
            p.process(&hits, &direct("tokio"), "tokio")
        );
    }

    #[test]
    fn source_host_strips_www() {
        assert_eq!(source_host("https://www.Example.com/page"), "example.com");
        assert_eq!(source_host("not a url"), "");
    }

    #[test]
    fn entities_extracted() {
        let entities = extract_entities("The Rust Foundation was formed in 2021 with 5 members.");
        let names: Vec<&str> = entities
            .iter()
            .filter(|e| e.kind == EntityKind::Name)
            .map(|e| e.text.as_str())
            .collect();
        assert!(names.contains(&"Rust Foundation"));
        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Date && e.text == "2021"));
        assert!(entities
            .iter()
            .any(|e| e.kind == EntityKind::Number && e.text == "5"));
    }

    #[test]
    fn sentence_initial_single_word_is_not_an_entity() {
        let entities = extract_entities("Today we ship. Nothing else.");
        assert!(entities.iter().all(|e| e.kind != EntityKind::Name));
    }

    #[test]
    fn repeated_entity_scores_highest() {
        let entities = extract_entities("we like Tokio and Tokio likes us, also Serde");
        let tokio = entities.iter().find(|e| e.text == "Tokio").expect("tokio");
        let serde = entities.iter().find(|e| e.text == "Serde").expect("serde");
        assert!((tokio.score - 1.0).abs() < f64::EPSILON);
        assert!(serde.score < tokio.score);
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("The quick fox and the lazy dog is here"), "en");
        assert_eq!(detect_language("El perro y la casa de los abuelos"), "es");
        assert_eq!(detect_language("Der Hund ist nicht mit der Katze"), "de");
        assert_eq!(detect_language("Привет мир"), "ru");
        assert_eq!(detect_language("سلام دنیا چطوری"), "fa");
        assert_eq!(detect_language("مرحبا بالعالم"), "ar");
        assert_eq!(detect_language("こんにちは世界"), "ja");
        assert_eq!(detect_language("你好世界"), "zh");
        assert_eq!(detect_language("안녕하세요"), "ko");
        assert_eq!(detect_language("1234 !!"), "und");
    }

    #[test]
    fn summary_prefers_sentence_with_query_term() {
        let summary = summarize(
            "Welcome to our site. Tokio is an async runtime. Contact us.",
            &["tokio".to_string()],
        );
        assert_eq!(summary, "Tokio is an async runtime.");
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let summary = summarize(&long, &[]);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn categories_from_host_and_keywords() {
        let cats = categorize("A beginner tutorial on ownership", "en.wikipedia.org");
        assert_eq!(cats, vec!["reference".to_string(), "tutorial".to_string()]);
        let cats = categorize("Stories", "cs.stanford.edu");
        assert_eq!(cats, vec!["academic".to_string()]);
    }

    #[test]
    fn category_keywords_match_whole_words() {
        assert!(categorize("newsletter signup", "example.com").is_empty());
    }

    #[test]
    fn host_categories_respect_label_boundaries() {
        assert!(categorize("Stories", "notgithub.com").is_empty());
        assert!(categorize("Stories", "fakewikipedia.org").is_empty());
        assert_eq!(categorize("Stories", "gist.github.com"), vec!["code".to_string()]);
        assert_eq!(categorize("Stories", "github.com"), vec!["code".to_string()]);
    }

    #[test]
    fn confidence_rewards_complete_hits() {
        let full = confidence("Title", &"x".repeat(200), "https://a.com", true);
        let bare = confidence("", "", "http://a.com", false);
        assert!((full - 1.0).abs() < 1e-9);
        assert!(full > bare);
    }
}
