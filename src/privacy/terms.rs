//! Fixed vocabularies the privacy analyzer matches against.

use super::RiskFactor;

/// A vocabulary with its scoring weight and redaction placeholder.
#[derive(Debug)]
pub struct TermCategory {
    pub name: &'static str,
    /// Added to the score once per distinct term found.
    pub weight: f64,
    /// Replacement used when sanitizing a query.
    pub placeholder: &'static str,
    /// Flag raised by any hit in this category.
    pub risk: Option<RiskFactor>,
    /// Hits are reported as sensitive entities rather than personal indicators.
    pub sensitive: bool,
    pub terms: &'static [&'static str],
}

pub const PRONOUNS: TermCategory = TermCategory {
    name: "pronoun",
    weight: 0.3,
    placeholder: "[user]",
    risk: None,
    sensitive: false,
    terms: &["i", "me", "my", "mine", "myself", "we", "us", "our", "ours"],
};

pub const VERBS: TermCategory = TermCategory {
    name: "verb",
    weight: 0.2,
    placeholder: "[action]",
    risk: None,
    sensitive: false,
    terms: &[
        "feel", "felt", "think", "thought", "remember", "remembered", "want", "wanted", "need",
        "needed", "love", "loved", "hate", "hated", "worry", "worried", "wish", "wished",
    ],
};

pub const FAMILY: TermCategory = TermCategory {
    name: "family",
    weight: 0.4,
    placeholder: "[relative]",
    risk: None,
    sensitive: true,
    terms: &[
        "mom", "dad", "mother", "father", "sister", "brother", "wife", "husband", "son",
        "daughter", "family", "grandma", "grandpa", "aunt", "uncle", "cousin", "partner",
    ],
};

pub const LOCATION: TermCategory = TermCategory {
    name: "location",
    weight: 0.3,
    placeholder: "[place]",
    risk: None,
    sensitive: true,
    terms: &[
        "home", "address", "street", "apartment", "neighborhood", "city", "office", "school",
    ],
};

pub const HEALTH: TermCategory = TermCategory {
    name: "health",
    weight: 0.6,
    placeholder: "[medical]",
    risk: Some(RiskFactor::Health),
    sensitive: true,
    terms: &[
        "health", "doctor", "hospital", "medication", "medicine", "diagnosis", "therapy",
        "symptom", "checkup", "prescription", "illness", "disease", "clinic", "surgery",
        "anxiety", "depression", "blood pressure",
    ],
};

pub const FINANCIAL: TermCategory = TermCategory {
    name: "financial",
    weight: 0.5,
    placeholder: "[finance]",
    risk: Some(RiskFactor::Financial),
    sensitive: true,
    terms: &[
        "bank", "salary", "income", "debt", "loan", "mortgage", "credit card", "account number",
        "tax", "invest", "investment", "budget", "payment",
    ],
};

pub const TEMPORAL: TermCategory = TermCategory {
    name: "temporal",
    weight: 0.2,
    placeholder: "[time]",
    risk: None,
    sensitive: false,
    terms: &[
        "yesterday", "today", "tomorrow", "tonight", "last week", "next week", "this morning",
        "birthday", "anniversary",
    ],
};

pub const CATEGORIES: [&TermCategory; 7] =
    [&PRONOUNS, &VERBS, &FAMILY, &LOCATION, &HEALTH, &FINANCIAL, &TEMPORAL];

/// Context tags that carry a risk flag on their own.
pub fn tag_risk(tag: &str) -> Option<RiskFactor> {
    match tag.to_lowercase().as_str() {
        "health" | "medical" => Some(RiskFactor::Health),
        "finance" | "financial" => Some(RiskFactor::Financial),
        _ => None,
    }
}

/// Placeholder for a single word or two-word phrase, if any category redacts it.
pub fn placeholder_for(term: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|c| c.terms.contains(&term))
        .map(|c| c.placeholder)
}
