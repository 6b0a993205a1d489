use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::models::Solution;

/// Confidence given to solutions derived from the user's own code
pub const CONTEXT_CONFIDENCE: f64 = 0.95;

const MAX_TYPO_DISTANCE: usize = 2;

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "False", "finally", "for", "from", "global", "if", "import", "in", "is",
    "lambda", "None", "nonlocal", "not", "or", "pass", "raise", "return", "True", "try", "while",
    "with", "yield",
];

/// A problem spotted in the submitted code
#[derive(Debug, Clone, PartialEq)]
pub struct ContextFinding {
    pub issue: String,
    pub fix: String,
}

impl ContextFinding {
    pub fn into_solution(self, code_context: &str) -> Solution {
        Solution {
            fix: self.fix,
            explanation: self.issue,
            code_example: format!("# Based on your specific code:\n{}", code_context),
            confidence: CONTEXT_CONFIDENCE,
        }
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap_or_else(|e| panic!("invalid regex {pattern}: {e}")))
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\b[A-Za-z_]\w*\b")
}

fn undefined_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"name '(\w+)' is not defined")
}

fn list_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(\w+)\s*=\s*\[(.*?)\]")
}

/// Look at the submitted code for a more specific explanation of the error.
pub fn analyze(error_type: &str, error_message: &str, code_context: &str) -> Option<ContextFinding> {
    if code_context.trim().is_empty() {
        return None;
    }

    match error_type {
        "NameError" => find_typo(error_message, code_context),
        "IndexError" => find_out_of_range(code_context),
        _ => None,
    }
}

/// Identifiers in the context that are a small edit away from the undefined name
fn find_typo(error_message: &str, code_context: &str) -> Option<ContextFinding> {
    let undefined = undefined_name_re()
        .captures(error_message)?
        .get(1)?
        .as_str();

    let identifiers: BTreeSet<&str> = identifier_re()
        .find_iter(code_context)
        .map(|m| m.as_str())
        .filter(|ident| *ident != undefined && !KEYWORDS.contains(ident))
        .collect();

    let mut similar: Vec<(usize, &str)> = identifiers
        .into_iter()
        .map(|ident| (strsim::levenshtein(ident, undefined), ident))
        .filter(|(distance, _)| *distance <= MAX_TYPO_DISTANCE)
        .collect();
    similar.sort();

    let (_, best) = similar.first()?;
    let names: Vec<String> = similar.iter().map(|(_, name)| name.to_string()).collect();

    Some(ContextFinding {
        issue: format!("You might have a typo in variable name '{}'", undefined),
        fix: format!(
            "Did you mean '{}'? Similar variables found: {}",
            best,
            names.join(", ")
        ),
    })
}

/// Literal indices past the end of a list declared in the context.
/// The last offending access in the code is reported.
fn find_out_of_range(code_context: &str) -> Option<ContextFinding> {
    let mut finding = None;
    for caps in list_literal_re().captures_iter(code_context) {
        let name = &caps[1];
        let length = caps[2]
            .split(',')
            .filter(|item| !item.trim().is_empty())
            .count();

        let index_re = match Regex::new(&format!(r"\b{}\[(\d+)\]", regex::escape(name))) {
            Ok(re) => re,
            Err(_) => continue,
        };

        for index_caps in index_re.captures_iter(code_context) {
            let Ok(index) = index_caps[1].parse::<usize>() else {
                continue;
            };
            if index >= length {
                let fix = if length == 0 {
                    format!("The list '{}' appears to be empty", name)
                } else {
                    format!(
                        "The list '{}' appears to have {} items (indices 0-{})",
                        name,
                        length,
                        length - 1
                    )
                };
                finding = Some(ContextFinding {
                    issue: format!("Index {} is out of range for list '{}'", index, name),
                    fix,
                });
            }
        }
    }

    finding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typo_detected() {
        let code = "total = 10\nprint(totl)\n";
        let finding = analyze("NameError", "NameError: name 'totl' is not defined", code).unwrap();

        assert_eq!(finding.issue, "You might have a typo in variable name 'totl'");
        assert_eq!(
            finding.fix,
            "Did you mean 'total'? Similar variables found: total"
        );
    }

    #[test]
    fn test_typo_candidates_ordered_by_distance() {
        let code = "counter = 1\ncounts = 2\nprint(countr)\n";
        let finding =
            analyze("NameError", "NameError: name 'countr' is not defined", code).unwrap();

        assert!(finding.fix.starts_with("Did you mean 'counter'?"));
        assert!(finding.fix.ends_with("counter, counts"));
    }

    #[test]
    fn test_single_letter_typo() {
        let code = "y = 1\nprint(x)\n";
        let finding = analyze("NameError", "NameError: name 'x' is not defined", code).unwrap();

        assert_eq!(finding.issue, "You might have a typo in variable name 'x'");
        assert_eq!(finding.fix, "Did you mean 'y'? Similar variables found: y");
    }

    #[test]
    fn test_keywords_are_not_suggested() {
        let code = "iffy = True\nif iffy:\n    print(iff)\n";
        let finding = analyze("NameError", "NameError: name 'iff' is not defined", code).unwrap();
        assert_eq!(finding.fix, "Did you mean 'iffy'? Similar variables found: iffy");
    }

    #[test]
    fn test_index_out_of_range() {
        let code = "my_list = [1, 2, 3]\nprint(my_list[3])\n";
        let finding = analyze("IndexError", "IndexError: list index out of range", code).unwrap();

        assert_eq!(finding.issue, "Index 3 is out of range for list 'my_list'");
        assert_eq!(
            finding.fix,
            "The list 'my_list' appears to have 3 items (indices 0-2)"
        );
    }

    #[test]
    fn test_index_in_range() {
        let code = "my_list = [1, 2, 3]\nprint(my_list[2])\n";
        assert!(analyze("IndexError", "IndexError: list index out of range", code).is_none());
    }

    #[test]
    fn test_last_out_of_range_access_reported() {
        let code = "a = [1]\nb = [1, 2]\nprint(a[4])\nprint(b[7])\n";
        let finding = analyze("IndexError", "IndexError: list index out of range", code).unwrap();

        assert_eq!(finding.issue, "Index 7 is out of range for list 'b'");
        assert_eq!(finding.fix, "The list 'b' appears to have 2 items (indices 0-1)");
    }

    #[test]
    fn test_empty_list() {
        let code = "queue = []\nqueue[0]\n";
        let finding = analyze("IndexError", "IndexError: list index out of range", code).unwrap();
        assert_eq!(finding.fix, "The list 'queue' appears to be empty");
    }

    #[test]
    fn test_other_types_and_blank_context() {
        assert!(analyze("KeyError", "KeyError: 'a'", "d = {}\nd['a']").is_none());
        assert!(analyze("NameError", "NameError: name 'totl' is not defined", "  \n").is_none());
    }

    #[test]
    fn test_into_solution() {
        let finding = ContextFinding {
            issue: "issue".to_string(),
            fix: "fix".to_string(),
        };
        let solution = finding.into_solution("x = 1");
        assert_eq!(solution.explanation, "issue");
        assert_eq!(solution.fix, "fix");
        assert_eq!(solution.confidence, CONTEXT_CONFIDENCE);
        assert_eq!(solution.code_example, "# Based on your specific code:\nx = 1");
    }
}
