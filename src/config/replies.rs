//! Built-in reply tables
//!
//! Each persona owns an ordered list of keyword rules. A rule fires when the
//! lower-cased input contains any of its keywords; rules are tried top to
//! bottom and the first one that fires supplies the reply.

/// A keyword rule and the reply it produces
#[derive(Debug, Clone, Copy)]
pub struct ReplyRule {
    /// Lower-case substrings, any of which triggers the rule
    pub keywords: &'static [&'static str],

    /// Reply text
    pub response: &'static str,
}

impl ReplyRule {
    /// Whether this rule fires for an already lower-cased input
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Ordered rules for a single persona plus its fallback reply
#[derive(Debug, Clone, Copy)]
pub struct ReplyTable {
    pub rules: &'static [ReplyRule],
    pub fallback: &'static str,
}

/// Reply for personas without a table
pub const UNKNOWN_PERSONA: &str = "Tell me more so I can help.";

pub const PROFESSIONAL: ReplyTable = ReplyTable {
    rules: &[
        ReplyRule {
            keywords: &["help", "how"],
            response: "Start with a short objective, list 3 steps, and set a deadline. Want me to draft it?",
        },
        ReplyRule {
            keywords: &["plan"],
            response: "I recommend: 1) Snapshot 2) Prioritize 3) Execute — I can create a checklist.",
        },
    ],
    fallback: "I can give concise plans, templates, and edits. Ask me for a 3-step plan.",
};

pub const FRIEND: ReplyTable = ReplyTable {
    rules: &[
        ReplyRule {
            keywords: &["sad", "down"],
            response: "I'm sorry you feel that way — want to talk about it? I'm here.",
        },
        ReplyRule {
            keywords: &["joke"],
            response: "Why did the coder quit? Because he didn’t get arrays 😉",
        },
    ],
    fallback: "I'm here to chat — tell me what's on your mind.",
};

pub const CODER: ReplyTable = ReplyTable {
    rules: &[
        ReplyRule {
            keywords: &["bug", "error"],
            response: "Paste the short error or function and I will suggest a fix.",
        },
        ReplyRule {
            keywords: &["react", "component"],
            response: "I can scaffold a React component for you — tell me props and behavior.",
        },
    ],
    fallback: "I can generate code snippets, explain errors, or help structure projects.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_lowercase() {
        for table in [PROFESSIONAL, FRIEND, CODER] {
            for rule in table.rules {
                for keyword in rule.keywords {
                    assert_eq!(*keyword, keyword.to_lowercase());
                }
            }
        }
    }

    #[test]
    fn test_rule_matches_any_keyword() {
        let rule = CODER.rules[0];
        assert!(rule.matches("there is an error here"));
        assert!(rule.matches("found a bug"));
        assert!(!rule.matches("all good"));
    }
}
