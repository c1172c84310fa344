//! Keyword rule tables for heuristic classification
//!
//! Jurisdiction and sign inference are plain substring matches against
//! lowercase text. The tables are data, so callers can swap them out.

use crate::graph::{Category, Jurisdiction, Sign};

/// A keyword list mapped to a classification
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRule<T> {
    pub keywords: Vec<String>,
    pub value: T,
}

impl<T: Copy> KeywordRule<T> {
    pub fn new(value: T, keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            value,
        }
    }

    /// Whether any keyword occurs in `haystack` (already lowercase)
    pub fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }
}

/// Ordered rule tables. The first matching rule wins.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTable {
    pub jurisdictions: Vec<KeywordRule<Jurisdiction>>,
    pub negative_relations: KeywordRule<Sign>,
}

const BRITISH: &[&str] = &[
    "london", "england", "english", "british", "britain", "scotland", "edinburgh",
    "oxford", "cambridge", "golden dawn", "mathers", "westcott", "crowley", "yeats",
];

const FRENCH: &[&str] = &[
    "paris", "france", "french", "lyon", "martinist", "papus", "encausse", "peladan",
    "guaita", "levi",
];

const GERMAN: &[&str] = &[
    "berlin", "germany", "german", "munich", "vienna", "prussia", "thule", "reuss",
    "steiner", "hartmann",
];

const RUSSIAN: &[&str] = &[
    "moscow", "petersburg", "russia", "russian", "kiev", "blavatsky", "rasputin",
    "ouspensky", "gurdjieff",
];

/// Stems marking a hostile relationship
const NEGATIVE_STEMS: &[&str] = &["rival", "oppos", "conflict", "secess", "dissent"];

/// Closed category vocabulary; anything else is a Location
const CATEGORY_VOCABULARY: &[(&str, Category)] = &[
    ("person", Category::Person),
    ("organization", Category::Organization),
    ("event", Category::Event),
    ("publication", Category::Publication),
    ("concept", Category::Concept),
    ("myth", Category::Myth),
];

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            jurisdictions: vec![
                KeywordRule::new(Jurisdiction::British, BRITISH),
                KeywordRule::new(Jurisdiction::French, FRENCH),
                KeywordRule::new(Jurisdiction::German, GERMAN),
                KeywordRule::new(Jurisdiction::Russian, RUSSIAN),
            ],
            negative_relations: KeywordRule::new(Sign::Negative, NEGATIVE_STEMS),
        }
    }
}

impl RuleTable {
    /// Infer a jurisdiction from a node's id and label
    pub fn jurisdiction(&self, id: &str, label: &str) -> Jurisdiction {
        let haystack = format!("{} {}", id, label).to_lowercase();
        self.jurisdictions
            .iter()
            .find(|rule| rule.matches(&haystack))
            .map(|rule| rule.value)
            .unwrap_or(Jurisdiction::Other)
    }

    /// Infer a sign from relationship text: hostile stems give -1, all else +1
    pub fn sign(&self, relationship: &str) -> Sign {
        if self.negative_relations.matches(&relationship.to_lowercase()) {
            self.negative_relations.value
        } else {
            Sign::Positive
        }
    }
}

/// Map a type/category string onto the closed vocabulary
pub fn category(raw: &str) -> Category {
    let lowered = raw.trim().to_lowercase();
    CATEGORY_VOCABULARY
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, c)| *c)
        .unwrap_or(Category::Location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_stems_flip_sign() {
        let rules = RuleTable::default();
        assert_eq!(rules.sign("opposed"), Sign::Negative);
        assert_eq!(rules.sign("Bitter RIVALRY"), Sign::Negative);
        assert_eq!(rules.sign("secession from the lodge"), Sign::Negative);
        assert_eq!(rules.sign("dissented"), Sign::Negative);
        assert_eq!(rules.sign("armed conflict"), Sign::Negative);
        assert_eq!(rules.sign("founded"), Sign::Positive);
        assert_eq!(rules.sign(""), Sign::Positive);
    }

    #[test]
    fn jurisdiction_from_id_or_label() {
        let rules = RuleTable::default();
        assert_eq!(rules.jurisdiction("person:mathers", "S. L. Mathers"), Jurisdiction::British);
        assert_eq!(rules.jurisdiction("org:x", "Ordre Martiniste de Paris"), Jurisdiction::French);
        assert_eq!(rules.jurisdiction("place:munich", ""), Jurisdiction::German);
        assert_eq!(rules.jurisdiction("p1", "Helena Blavatsky"), Jurisdiction::Russian);
        assert_eq!(rules.jurisdiction("p2", "Someone in Cairo"), Jurisdiction::Other);
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = RuleTable::default();
        // both British and French keywords: table order decides
        assert_eq!(rules.jurisdiction("london-paris", ""), Jurisdiction::British);
    }

    #[test]
    fn rule_table_is_replaceable() {
        let rules = RuleTable {
            jurisdictions: vec![KeywordRule::new(Jurisdiction::German, &["alpha"])],
            negative_relations: KeywordRule::new(Sign::Negative, &["beta"]),
        };
        assert_eq!(rules.jurisdiction("alpha", ""), Jurisdiction::German);
        assert_eq!(rules.jurisdiction("london", ""), Jurisdiction::Other);
        assert_eq!(rules.sign("beta"), Sign::Negative);
        assert_eq!(rules.sign("opposed"), Sign::Positive);
    }

    #[test]
    fn category_vocabulary_is_case_insensitive() {
        assert_eq!(category("Person"), Category::Person);
        assert_eq!(category("ORGANIZATION"), Category::Organization);
        assert_eq!(category(" myth "), Category::Myth);
        assert_eq!(category("city"), Category::Location);
        assert_eq!(category(""), Category::Location);
    }
}
