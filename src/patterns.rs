//! Built-in catalogue of recognizable error messages.
//!
//! Entries are tried in declaration order and the first regex that matches
//! the error message decides the error type.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Resource, Solution};

struct CannedSolution {
    fix: &'static str,
    explanation: &'static str,
    confidence: f64,
    code_example: &'static str,
}

struct PatternSpec {
    error_type: &'static str,
    pattern: &'static str,
    solutions: &'static [CannedSolution],
    concepts: &'static [&'static str],
    docs_url: &'static str,
}

const PYTHON_EXCEPTIONS: &str = "https://docs.python.org/3/library/exceptions.html";

const CATALOGUE: &[PatternSpec] = &[
    PatternSpec {
        error_type: "NameError",
        pattern: r"name '(\w+)' is not defined",
        solutions: &[CannedSolution {
            fix: "Define the variable before using it",
            explanation: "This error occurs when you try to use a variable that hasn't been defined yet.",
            confidence: 0.9,
            code_example: "# Wrong\nprint(total)\n\n# Correct\ntotal = 0\nprint(total)\n",
        }],
        concepts: &["variable scope", "variable declaration"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#NameError",
    },
    PatternSpec {
        error_type: "TypeError",
        pattern: r"unsupported operand type\(s\) for (\+|-|\*|/): '(\w+)' and '(\w+)'",
        solutions: &[CannedSolution {
            fix: "Convert variables to compatible types before operation",
            explanation: "This error occurs when you try to perform operations on incompatible types.",
            confidence: 0.85,
            code_example: "# Wrong\nresult = \"123\" + 456\n\n# Correct\nresult = int(\"123\") + 456  # numeric sum\nresult = \"123\" + str(456)  # string concatenation\n",
        }],
        concepts: &["type conversion", "operators"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#TypeError",
    },
    PatternSpec {
        error_type: "IndexError",
        pattern: r"list index out of range",
        solutions: &[CannedSolution {
            fix: "Check that the index is within the bounds of the list",
            explanation: "This error occurs when you try to access an index that doesn't exist in the list.",
            confidence: 0.95,
            code_example: "# Wrong\nitems = [1, 2, 3]\nprint(items[3])\n\n# Correct\nitems = [1, 2, 3]\nif len(items) > 3:\n    print(items[3])\nelse:\n    print(\"Index out of range\")\n",
        }],
        concepts: &["lists", "indexing", "bounds checking"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#IndexError",
    },
    PatternSpec {
        error_type: "KeyError",
        pattern: r"KeyError: '(\w+)'",
        solutions: &[CannedSolution {
            fix: "Check if the key exists before accessing it",
            explanation: "This error occurs when you try to access a dictionary with a key that doesn't exist.",
            confidence: 0.9,
            code_example: "# Wrong\nprices = {'a': 1, 'b': 2}\nprint(prices['c'])\n\n# Correct\nif 'c' in prices:\n    print(prices['c'])\n\n# Or with a default\nprint(prices.get('c', 0))\n",
        }],
        concepts: &["dictionaries", "key validation", "default values"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#KeyError",
    },
    PatternSpec {
        error_type: "SyntaxError",
        pattern: r"SyntaxError: invalid syntax",
        solutions: &[CannedSolution {
            fix: "Check your code for syntax errors",
            explanation: "This generic syntax error occurs when Python can't parse your code.",
            confidence: 0.7,
            code_example: "# Missing closing parenthesis\nprint(\"Hello\"\n\n# Missing colon after if/for/while\nif x > 5\n    print(x)\n",
        }],
        concepts: &["syntax", "code structure", "indentation"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#SyntaxError",
    },
    PatternSpec {
        error_type: "IndentationError",
        pattern: r"IndentationError: (unexpected indent|expected an indented block)",
        solutions: &[CannedSolution {
            fix: "Fix your code's indentation",
            explanation: "This error occurs when your code has inconsistent indentation.",
            confidence: 0.9,
            code_example: "# Wrong\nif x > 5:\nprint(\"big\")\n\n# Correct\nif x > 5:\n    print(\"big\")\n",
        }],
        concepts: &["indentation", "code blocks", "Python syntax"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#IndentationError",
    },
    PatternSpec {
        error_type: "ImportError",
        pattern: r"ImportError: No module named '(\w+)'",
        solutions: &[CannedSolution {
            fix: "Install the missing module or check the import statement",
            explanation: "This error occurs when Python can't find the module you're trying to import.",
            confidence: 0.85,
            code_example: "# Install the module\n# pip install requests\n\n# Or fix the spelling of the import\nimport os\n",
        }],
        concepts: &["imports", "modules", "package management"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#ImportError",
    },
    PatternSpec {
        error_type: "AttributeError",
        pattern: r"AttributeError: '(\w+)' object has no attribute '(\w+)'",
        solutions: &[CannedSolution {
            fix: "Check if the object has the attribute you're trying to access",
            explanation: "This error occurs when you try to access an attribute or method that doesn't exist for that object.",
            confidence: 0.85,
            code_example: "# Wrong\nx = 5\nx.append(10)\n\n# Correct\nx = [5]\nif hasattr(x, 'append'):\n    x.append(10)\n",
        }],
        concepts: &["object attributes", "methods", "type checking"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#AttributeError",
    },
    PatternSpec {
        error_type: "ZeroDivisionError",
        pattern: r"ZeroDivisionError: division by zero",
        solutions: &[CannedSolution {
            fix: "Check for zero before dividing",
            explanation: "This error occurs when you try to divide by zero.",
            confidence: 0.95,
            code_example: "# Wrong\nratio = 10 / 0\n\n# Correct\ndenominator = 0\nratio = 10 / denominator if denominator != 0 else None\n",
        }],
        concepts: &["division", "error checking", "defensive programming"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#ZeroDivisionError",
    },
    PatternSpec {
        error_type: "ValueError",
        pattern: r"ValueError: invalid literal for int\(\) with base 10: '(\w+)'",
        solutions: &[CannedSolution {
            fix: "Ensure the string can be converted to an integer",
            explanation: "This error occurs when you try to convert a string to an integer, but the string doesn't represent a valid integer.",
            confidence: 0.9,
            code_example: "# Wrong\nint(\"abc\")\n\n# Correct\ntry:\n    number = int(user_input)\nexcept ValueError:\n    number = 0\n",
        }],
        concepts: &["type conversion", "input validation", "exception handling"],
        docs_url: "https://docs.python.org/3/library/exceptions.html#ValueError",
    },
];

/// Compiled catalogue entry
pub struct ErrorPattern {
    spec: &'static PatternSpec,
    regex: Regex,
}

impl ErrorPattern {
    pub fn error_type(&self) -> &'static str {
        self.spec.error_type
    }

    pub fn solutions(&self) -> Vec<Solution> {
        self.spec
            .solutions
            .iter()
            .map(|s| Solution {
                fix: s.fix.to_string(),
                explanation: s.explanation.to_string(),
                code_example: s.code_example.to_string(),
                confidence: s.confidence,
            })
            .collect()
    }

    pub fn concepts(&self) -> Vec<String> {
        self.spec.concepts.iter().map(|c| c.to_string()).collect()
    }

    pub fn is_match(&self, message: &str) -> bool {
        self.regex.is_match(message)
    }

    /// Reference documentation for this error type
    pub fn documentation(&self) -> Resource {
        Resource {
            resource_type: "documentation".to_string(),
            title: format!("Python docs: {}", self.spec.error_type),
            description: format!(
                "Official description of when {} is raised",
                self.spec.error_type
            ),
            url: Some(self.spec.docs_url.to_string()),
        }
    }
}

fn catalogue() -> &'static [ErrorPattern] {
    static COMPILED: OnceLock<Vec<ErrorPattern>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        CATALOGUE
            .iter()
            .filter_map(|spec| match Regex::new(spec.pattern) {
                Ok(regex) => Some(ErrorPattern { spec, regex }),
                Err(e) => {
                    tracing::error!(error_type = spec.error_type, "bad catalogue pattern: {}", e);
                    None
                }
            })
            .collect()
    })
}

/// First catalogue entry matching the message
pub fn classify(message: &str) -> Option<&'static ErrorPattern> {
    catalogue().iter().find(|p| p.is_match(message))
}

pub fn find(error_type: &str) -> Option<&'static ErrorPattern> {
    catalogue().iter().find(|p| p.error_type() == error_type)
}

/// Generic guide used when an error type is not in the catalogue
pub fn generic_docs() -> Resource {
    Resource {
        resource_type: "documentation".to_string(),
        title: "Python built-in exceptions".to_string(),
        description: "Reference of every built-in exception and when it is raised".to_string(),
        url: Some(PYTHON_EXCEPTIONS.to_string()),
    }
}
